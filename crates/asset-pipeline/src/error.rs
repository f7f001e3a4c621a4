//! Error types for the asset pipeline
//!
//! None of these escape the public fetch/render operations: they are logged
//! and degrade to a missing asset or a placeholder node.

use std::fmt;

/// BlobStore open/get/put failure
#[derive(Debug)]
pub enum StorageError {
    Open(String),
    Io(Box<std::io::Error>),
    Codec(String),
    Unavailable(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Open(msg) => write!(f, "Store open error: {}", msg),
            StorageError::Io(err) => write!(f, "Store IO error: {}", err),
            StorageError::Codec(msg) => write!(f, "Store codec error: {}", msg),
            StorageError::Unavailable(msg) => write!(f, "Store unavailable: {}", msg),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::Io(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(Box::new(err))
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Codec(err.to_string())
    }
}

/// Display-handle creation or revocation failure at the platform boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleError {
    Exhausted(String),
    Revoke(String),
}

impl fmt::Display for HandleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandleError::Exhausted(msg) => write!(f, "Handle creation failed: {}", msg),
            HandleError::Revoke(msg) => write!(f, "Handle revocation failed: {}", msg),
        }
    }
}

impl std::error::Error for HandleError {}

/// A single item's view could not be built
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeBuildError(pub String);

impl NodeBuildError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

impl fmt::Display for NodeBuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node build error: {}", self.0)
    }
}

impl std::error::Error for NodeBuildError {}

/// Backup export/import failure
#[derive(Debug)]
pub enum BackupError {
    InvalidJson(String),
    MissingSection(&'static str),
    InvalidDataUrl(String),
    Storage(StorageError),
}

impl fmt::Display for BackupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackupError::InvalidJson(msg) => write!(f, "Invalid backup JSON: {}", msg),
            BackupError::MissingSection(name) => write!(f, "Backup is missing '{}'", name),
            BackupError::InvalidDataUrl(msg) => write!(f, "Invalid data URL: {}", msg),
            BackupError::Storage(err) => write!(f, "Backup storage error: {}", err),
        }
    }
}

impl std::error::Error for BackupError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BackupError::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StorageError> for BackupError {
    fn from(err: StorageError) -> Self {
        BackupError::Storage(err)
    }
}

impl From<serde_json::Error> for BackupError {
    fn from(err: serde_json::Error) -> Self {
        BackupError::InvalidJson(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;
