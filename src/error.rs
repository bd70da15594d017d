use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EssenceError {
    #[error("no conversation file in {}", .0.display())]
    NotFound(PathBuf),
    #[error("failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
    #[error("invalid conversation directory name: {0}")]
    NamingFormat(String),
    #[error("i/o failure on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("renumber target {to} for {from} is already occupied")]
    RenameCollision { from: String, to: String },
}

impl EssenceError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn parse(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Entry-level failures are recovered by skipping the entry.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_) | Self::Parse { .. } | Self::NamingFormat(_)
        )
    }
}
