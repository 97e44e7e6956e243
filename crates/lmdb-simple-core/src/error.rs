use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DictError {
    /// The environment could not be created, accessed, or opened.
    #[error("Cannot open environment at {}: {reason}", path.display())]
    Open { path: PathBuf, reason: String },

    /// Operation against a closed handle, or a write against a read-only one.
    #[error("Invalid state: {0}")]
    State(String),

    #[error("Key not found: {}", display_key(.0))]
    KeyNotFound(Vec<u8>),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Engine failure inside a transaction, passed through as reported.
    #[error("Engine error: {0}")]
    Engine(#[from] lmdb::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, DictError>;

impl DictError {
    pub fn open(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        DictError::Open {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn closed() -> Self {
        DictError::State("Environment is not open".into())
    }

    pub fn read_only() -> Self {
        DictError::State("Database not opened for writing".into())
    }

    /// True for the recoverable "absent key" case.
    pub fn is_key_not_found(&self) -> bool {
        matches!(self, DictError::KeyNotFound(_))
    }

    pub fn is_state(&self) -> bool {
        matches!(self, DictError::State(_))
    }
}

fn display_key(key: &[u8]) -> String {
    match std::str::from_utf8(key) {
        Ok(s) => format!("{:?}", s),
        Err(_) => {
            let hex: String = key.iter().map(|b| format!("{:02x}", b)).collect();
            format!("0x{}", hex)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_not_found_display() {
        let err = DictError::KeyNotFound(b"one".to_vec());
        assert_eq!(err.to_string(), "Key not found: \"one\"");

        let err = DictError::KeyNotFound(vec![0xff, 0x00]);
        assert_eq!(err.to_string(), "Key not found: 0xff00");
    }

    #[test]
    fn test_classification() {
        assert!(DictError::KeyNotFound(vec![]).is_key_not_found());
        assert!(DictError::closed().is_state());
        assert!(DictError::read_only().is_state());
        assert!(!DictError::closed().is_key_not_found());
    }

    #[test]
    fn test_engine_error_passthrough() {
        let err: DictError = lmdb::Error::MapFull.into();
        assert!(matches!(err, DictError::Engine(lmdb::Error::MapFull)));
    }
}
