use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("failed to {action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("snapshot '{0}' not found")]
    NotFound(String),

    #[error("snapshot '{name}' is not a valid snapshot: {source}")]
    Parse {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to start {command}: {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid snapshot interval '{0}'")]
    InvalidInterval(String),

    #[error("automatic snapshots already running every {current}; stop them first")]
    SchedulerBusy { current: String },

    #[error("could not determine a base directory for snapshots")]
    NoBaseDirectory,
}

impl SnapshotError {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SnapshotError::Io {
            action,
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, SnapshotError>;
