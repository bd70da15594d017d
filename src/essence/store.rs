use crate::error::EssenceError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;

pub const PRIMARY_FILE: &str = "conversation.toml";
pub const LEGACY_FILE: &str = "conversation.json";
pub const CONVERSATIONS_KEY: &str = "conversations";
pub const FORMAT_VERSION: &str = "2.0.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryFormat {
    Primary,
    Legacy,
}

impl EntryFormat {
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Primary => PRIMARY_FILE,
            Self::Legacy => LEGACY_FILE,
        }
    }

    /// Primary wins when both files are present.
    pub fn resolve(entry_dir: &Path) -> Option<Self> {
        [Self::Primary, Self::Legacy]
            .into_iter()
            .find(|format| entry_dir.join(format.file_name()).is_file())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EntryRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<toml::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "abstract", default, skip_serializing_if = "Option::is_none")]
    pub abstract_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<toml::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<toml::Value>,
    /// Opaque to the index; any TOML value is accepted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rounds: Option<toml::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "abstract", default, skip_serializing_if = "Option::is_none")]
    pub abstract_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<toml::Value>,
}

impl ConversationSummary {
    pub fn from_entry(slug: &str, entry: &EntryRecord) -> Self {
        Self {
            slug: slug.to_string(),
            title: entry.title.clone(),
            abstract_text: entry.abstract_text.clone().or_else(|| entry.title.clone()),
            status: entry.status.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct IndexRecord {
    /// Every top-level field except `conversations`, carried through verbatim.
    pub fields: toml::Table,
    pub conversations: BTreeMap<u32, ConversationSummary>,
}

impl IndexRecord {
    pub fn default_template() -> Self {
        let mut docs = toml::Table::new();
        docs.insert(
            "readme".to_string(),
            toml::Value::String("__essence__/README.md".to_string()),
        );
        docs.insert(
            "changelog".to_string(),
            toml::Value::String("__essence__/CHANGELOG.md".to_string()),
        );

        let mut fields = toml::Table::new();
        fields.insert(
            "version".to_string(),
            toml::Value::String(FORMAT_VERSION.to_string()),
        );
        fields.insert("abstract".to_string(), toml::Value::String(String::new()));
        fields.insert("docs".to_string(), toml::Value::Table(docs));

        Self {
            fields,
            conversations: BTreeMap::new(),
        }
    }
}

pub fn format_number(number: u32) -> String {
    format!("{number:03}")
}

pub fn read_entry_metadata(entry_dir: &Path) -> Result<EntryRecord, EssenceError> {
    let Some(format) = EntryFormat::resolve(entry_dir) else {
        return Err(EssenceError::NotFound(entry_dir.to_path_buf()));
    };
    let path = entry_dir.join(format.file_name());
    let raw = fs::read_to_string(&path).map_err(|err| match err.kind() {
        ErrorKind::NotFound => EssenceError::NotFound(entry_dir.to_path_buf()),
        _ => EssenceError::io(&path, err),
    })?;

    match format {
        EntryFormat::Primary => {
            toml::from_str::<EntryRecord>(&raw).map_err(|err| EssenceError::parse(&path, err))
        }
        EntryFormat::Legacy => {
            let json: serde_json::Value =
                serde_json::from_str(&raw).map_err(|err| EssenceError::parse(&path, err))?;
            let Some(value @ toml::Value::Table(_)) = json_to_toml(json) else {
                return Err(EssenceError::parse(&path, "top-level value is not an object"));
            };
            value
                .try_into::<EntryRecord>()
                .map_err(|err| EssenceError::parse(&path, err))
        }
    }
}

/// JSON `null` has no TOML counterpart; null members are dropped.
fn json_to_toml(value: serde_json::Value) -> Option<toml::Value> {
    use serde_json::Value as Json;

    match value {
        Json::Null => None,
        Json::Bool(b) => Some(toml::Value::Boolean(b)),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Some(toml::Value::Integer(i)),
            None => n.as_f64().map(toml::Value::Float),
        },
        Json::String(s) => Some(toml::Value::String(s)),
        Json::Array(items) => Some(toml::Value::Array(
            items.into_iter().filter_map(json_to_toml).collect(),
        )),
        Json::Object(map) => Some(toml::Value::Table(
            map.into_iter()
                .filter_map(|(k, v)| json_to_toml(v).map(|v| (k, v)))
                .collect(),
        )),
    }
}

pub fn write_entry_metadata(entry_dir: &Path, entry: &EntryRecord) -> Result<(), EssenceError> {
    let path = entry_dir.join(PRIMARY_FILE);
    let rendered = toml::to_string(entry).map_err(|err| EssenceError::parse(&path, err))?;
    replace_file(&path, &rendered)
}

pub fn load_index(path: &Path) -> Result<IndexRecord, EssenceError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Ok(IndexRecord::default_template());
        }
        Err(err) => return Err(EssenceError::io(path, err)),
    };
    parse_index(&raw, path)
}

pub fn parse_index(raw: &str, path: &Path) -> Result<IndexRecord, EssenceError> {
    let mut fields: toml::Table = raw
        .parse()
        .map_err(|err: toml::de::Error| EssenceError::parse(path, err))?;

    let mut conversations = BTreeMap::new();
    match fields.remove(CONVERSATIONS_KEY) {
        None => {}
        Some(toml::Value::Table(table)) => {
            for (key, value) in table {
                let Ok(number) = key.parse::<u32>() else {
                    log::warn!(
                        "ignoring index entry with non-numeric key {key:?} in {}",
                        path.display()
                    );
                    continue;
                };
                match value.try_into::<ConversationSummary>() {
                    Ok(summary) => {
                        conversations.insert(number, summary);
                    }
                    Err(err) => log::warn!(
                        "ignoring malformed index entry {key} in {}: {err}",
                        path.display()
                    ),
                }
            }
        }
        Some(_) => log::warn!(
            "`{CONVERSATIONS_KEY}` in {} is not a table; treating it as empty",
            path.display()
        ),
    }

    Ok(IndexRecord {
        fields,
        conversations,
    })
}

pub fn write_index(path: &Path, index: &IndexRecord) -> Result<(), EssenceError> {
    replace_file(path, &render_index(index))
}

/// Manual top-level fields first, then one `[conversations.NNN]` section per
/// entry in numeric order. Rendered by hand so the layout stays stable.
pub fn render_index(index: &IndexRecord) -> String {
    let mut out = String::new();
    for (key, value) in &index.fields {
        if key == CONVERSATIONS_KEY {
            continue;
        }
        out.push_str(&format!("{} = {}\n", render_key(key), render_value(value)));
    }

    for (number, summary) in &index.conversations {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(&format!("[{CONVERSATIONS_KEY}.{}]\n", format_number(*number)));
        out.push_str(&format!("slug = {}\n", quote(&summary.slug)));
        if let Some(title) = &summary.title {
            out.push_str(&format!("title = {}\n", quote(title)));
        }
        if let Some(abstract_text) = &summary.abstract_text {
            out.push_str(&format!("abstract = {}\n", quote(abstract_text)));
        }
        if let Some(status) = &summary.status {
            out.push_str(&format!("status = {}\n", render_value(status)));
        }
    }
    out
}

fn render_key(key: &str) -> String {
    let bare = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if bare { key.to_string() } else { quote(key) }
}

fn render_value(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => quote(s),
        toml::Value::Integer(i) => i.to_string(),
        toml::Value::Float(f) if f.is_nan() => "nan".to_string(),
        toml::Value::Float(f) if f.is_infinite() => {
            if *f > 0.0 { "inf" } else { "-inf" }.to_string()
        }
        toml::Value::Float(f) => format!("{f:?}"),
        toml::Value::Boolean(b) => b.to_string(),
        toml::Value::Datetime(dt) => dt.to_string(),
        toml::Value::Array(items) => format!(
            "[{}]",
            items.iter().map(render_value).collect::<Vec<_>>().join(", ")
        ),
        toml::Value::Table(table) if table.is_empty() => "{}".to_string(),
        toml::Value::Table(table) => format!(
            "{{ {} }}",
            table
                .iter()
                .map(|(k, v)| format!("{} = {}", render_key(k), render_value(v)))
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            c if c.is_control() => out.push_str(&format!("\\u{:04X}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Whole-file replace: the new contents land in a sibling temp file that is
/// then renamed over `path`.
fn replace_file(path: &Path, contents: &str) -> Result<(), EssenceError> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(|err| EssenceError::io(parent, err))?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".essence-")
        .suffix(".tmp")
        .tempfile_in(parent)
        .map_err(|err| EssenceError::io(parent, err))?;
    tmp.write_all(contents.as_bytes())
        .map_err(|err| EssenceError::io(tmp.path(), err))?;
    tmp.as_file()
        .sync_all()
        .map_err(|err| EssenceError::io(tmp.path(), err))?;
    tmp.persist(path)
        .map_err(|err| EssenceError::io(path, err.error))?;
    Ok(())
}
