use crate::essence::paths::EssencePaths;
use crate::essence::reconcile::list_dirs;
use crate::essence::store::{self, EntryRecord, FORMAT_VERSION};
use crate::essence::util::{now_iso8601, slugify};
use crate::essence::validator::{EntryName, parse_entry_name};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct CreatedEntry {
    pub name: EntryName,
    pub dir: PathBuf,
}

/// `max(existing numbers) + 1`; misnamed directories do not count.
pub fn next_number(conversations_dir: &Path) -> Result<u32> {
    let max = list_dirs(conversations_dir)?
        .iter()
        .filter_map(|(name, _)| parse_entry_name(name).ok())
        .map(|parsed| parsed.number)
        .max()
        .unwrap_or(0);
    Ok(max + 1)
}

pub fn create_entry(paths: &EssencePaths, title: &str) -> Result<CreatedEntry> {
    let title = title.trim();
    if title.is_empty() {
        anyhow::bail!("conversation title cannot be empty");
    }
    fs::create_dir_all(&paths.conversations_dir)
        .with_context(|| format!("failed to create {}", paths.conversations_dir.display()))?;

    let name = EntryName {
        number: next_number(&paths.conversations_dir)?,
        slug: slugify(title),
    };
    let dir = paths.conversations_dir.join(name.dir_name());
    fs::create_dir(&dir).with_context(|| format!("failed to create {}", dir.display()))?;

    let entry = EntryRecord {
        version: Some(toml::Value::String(FORMAT_VERSION.to_string())),
        title: Some(title.to_string()),
        abstract_text: None,
        created_at: Some(toml::Value::String(now_iso8601())),
        status: Some(toml::Value::String("active".to_string())),
        rounds: Some(toml::Value::Array(Vec::new())),
    };
    store::write_entry_metadata(&dir, &entry)
        .with_context(|| format!("failed to write conversation file in {}", dir.display()))?;
    log::info!("created conversation {}", name.dir_name());

    Ok(CreatedEntry { name, dir })
}
