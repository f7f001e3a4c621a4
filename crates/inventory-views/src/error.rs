//! Error types for the inventory views

use asset_pipeline::{BackupError, StorageError};
use std::fmt;

#[derive(Debug)]
pub enum ViewsError {
    Config(String),
    Io(Box<std::io::Error>),
    Json(serde_json::Error),
    Backup(BackupError),
    Storage(StorageError),
}

impl fmt::Display for ViewsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewsError::Config(msg) => write!(f, "Configuration error: {}", msg),
            ViewsError::Io(err) => write!(f, "IO error: {}", err),
            ViewsError::Json(err) => write!(f, "JSON error: {}", err),
            ViewsError::Backup(err) => write!(f, "{}", err),
            ViewsError::Storage(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for ViewsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ViewsError::Io(err) => Some(err.as_ref()),
            ViewsError::Json(err) => Some(err),
            ViewsError::Backup(err) => Some(err),
            ViewsError::Storage(err) => Some(err),
            ViewsError::Config(_) => None,
        }
    }
}

impl From<std::io::Error> for ViewsError {
    fn from(err: std::io::Error) -> Self {
        ViewsError::Io(Box::new(err))
    }
}

impl From<serde_json::Error> for ViewsError {
    fn from(err: serde_json::Error) -> Self {
        ViewsError::Json(err)
    }
}

impl From<BackupError> for ViewsError {
    fn from(err: BackupError) -> Self {
        ViewsError::Backup(err)
    }
}

impl From<StorageError> for ViewsError {
    fn from(err: StorageError) -> Self {
        ViewsError::Storage(err)
    }
}

impl From<tracing_subscriber::filter::ParseError> for ViewsError {
    fn from(err: tracing_subscriber::filter::ParseError) -> Self {
        ViewsError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ViewsError>;
