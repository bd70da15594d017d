use crate::error::EssenceError;
use crate::essence::store::EntryFormat;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct EntryName {
    pub number: u32,
    pub slug: String,
}

impl EntryName {
    pub fn dir_name(&self) -> String {
        format!("{:03}_{}", self.number, self.slug)
    }
}

fn numeric_prefix(name: &str) -> &str {
    name.split('_').next().unwrap_or_default()
}

/// Leading zeros are accepted; `007` and `7` both parse.
pub fn has_numeric_prefix(name: &str) -> bool {
    let prefix = numeric_prefix(name);
    !prefix.is_empty() && prefix.bytes().all(|b| b.is_ascii_digit())
}

pub fn has_metadata_file(dir: &Path) -> bool {
    EntryFormat::resolve(dir).is_some()
}

pub fn parse_entry_name(name: &str) -> Result<EntryName, EssenceError> {
    let Some((prefix, slug)) = name.split_once('_') else {
        return Err(EssenceError::NamingFormat(name.to_string()));
    };
    if !has_numeric_prefix(prefix) {
        return Err(EssenceError::NamingFormat(name.to_string()));
    }
    let number = prefix
        .parse::<u32>()
        .map_err(|_| EssenceError::NamingFormat(name.to_string()))?;
    Ok(EntryName {
        number,
        slug: slug.to_string(),
    })
}

pub fn is_valid_entry_dir(dir: &Path) -> bool {
    if !dir.is_dir() {
        return false;
    }
    let Some(name) = dir.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    has_numeric_prefix(name) && has_metadata_file(dir)
}
