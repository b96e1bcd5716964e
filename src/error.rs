//! Crate-level error type.
//!
//! Selection and decision operations are total and never return these; they
//! surface only from storage, configuration, dataset loading, and sharing.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, MatchError>;

#[derive(Error, Debug)]
pub enum MatchError {
    /// SQLite-backed key-value store failure.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration file or flag could not be resolved.
    #[error("configuration error: {0}")]
    Config(String),

    /// Dataset file is unreadable or structurally invalid.
    #[error("dataset error: {0}")]
    Dataset(String),

    /// A persisted value failed to parse into its expected shape.
    #[error("malformed persisted state under '{key}': {detail}")]
    MalformedState { key: String, detail: String },

    /// No share collaborator is available.
    #[error("sharing is not available")]
    ShareUnavailable,

    /// The user dismissed the share sheet.
    #[error("sharing was cancelled")]
    ShareCancelled,

    #[error("share failed: {0}")]
    Share(String),

    /// The in-memory store lock was poisoned by a panicking writer.
    #[error("store lock poisoned")]
    Poisoned,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_state_message_names_key() {
        let e = MatchError::MalformedState {
            key: "liked".to_string(),
            detail: "expected a sequence".to_string(),
        };
        let msg = e.to_string();
        assert!(msg.contains("'liked'"));
        assert!(msg.contains("expected a sequence"));
    }

    #[test]
    fn test_json_error_converts() {
        let err = serde_json::from_str::<Vec<String>>("{").unwrap_err();
        let e: MatchError = err.into();
        assert!(matches!(e, MatchError::Json(_)));
    }

    #[test]
    fn test_io_error_converts() {
        let err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let e: MatchError = err.into();
        assert!(e.to_string().starts_with("io error"));
    }
}
