use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{}: not a server directory (no server.properties present)", .0.display())]
    NotAServerDir(PathBuf),

    #[error("no level-name found in {}", .0.display())]
    MissingLevelName(PathBuf),

    #[error("I/O error while {context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("server directory does not exist: {}", .0.display())]
    MissingServerDir(PathBuf),

    #[error("source path does not exist: {}", .0.display())]
    MissingSource(PathBuf),

    #[error("I/O error while {context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    pub fn io(context: &'static str, source: std::io::Error) -> Self {
        Self::Io { context, source }
    }
}
