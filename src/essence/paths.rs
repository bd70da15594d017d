use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

pub const ESSENCE_DIR_NAME: &str = "__essence__";

#[derive(Debug, Clone)]
pub struct EssencePaths {
    pub essence_dir: PathBuf,
    pub conversations_dir: PathBuf,
    pub meta_file: PathBuf,
    pub logs_dir: PathBuf,
}

impl EssencePaths {
    /// Layout rooted at `essence_dir` with every default location.
    pub fn under(essence_dir: impl Into<PathBuf>) -> Self {
        let essence_dir = essence_dir.into();
        Self {
            conversations_dir: essence_dir.join("conversations"),
            meta_file: essence_dir.join("meta.toml"),
            logs_dir: essence_dir.join("logs"),
            essence_dir,
        }
    }
}

fn env_or_default_path(var: &str, fallback: PathBuf) -> PathBuf {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => fallback,
    }
}

pub fn resolve_paths() -> Result<EssencePaths> {
    let cwd = env::current_dir().context("current directory could not be resolved")?;
    let essence_dir = env_or_default_path("ESSENCE_DIR", cwd.join(ESSENCE_DIR_NAME));
    let defaults = EssencePaths::under(essence_dir);

    Ok(EssencePaths {
        conversations_dir: env_or_default_path(
            "ESSENCE_CONVERSATIONS_DIR",
            defaults.conversations_dir,
        ),
        meta_file: env_or_default_path("ESSENCE_META_FILE", defaults.meta_file),
        logs_dir: env_or_default_path("ESSENCE_LOGS_DIR", defaults.logs_dir),
        essence_dir: defaults.essence_dir,
    })
}
