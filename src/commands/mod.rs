pub mod cleanup;
pub mod create;
pub mod init;
pub mod list;
pub mod update_index;
pub mod verify;
pub mod watch;

use serde::Serialize;

use crate::essence::config::{self, EssenceConfig};
use crate::essence::paths::{self, EssencePaths};

#[derive(Debug, Clone, Serialize)]
pub struct CommandReport {
    pub command: String,
    pub ok: bool,
    pub details: Vec<String>,
    pub issues: Vec<String>,
}

impl CommandReport {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ok: true,
            details: Vec::new(),
            issues: Vec::new(),
        }
    }

    pub fn detail(&mut self, text: impl Into<String>) {
        self.details.push(text.into());
    }

    pub fn issue(&mut self, text: impl Into<String>) {
        self.ok = false;
        self.issues.push(text.into());
    }
}

/// Paths plus layered config, resolved once per command.
pub fn load_context() -> anyhow::Result<(EssencePaths, EssenceConfig)> {
    let paths = paths::resolve_paths()?;
    let cfg = config::load_config(&paths)?;
    Ok((paths, cfg))
}
