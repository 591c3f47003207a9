//! Error taxonomy for locus algebra and collection lifecycle failures.

use std::io;
use thiserror::Error;

/// Errors that can occur in locus construction, collection mutation,
/// and snapshot persistence.
#[derive(Error, Debug)]
pub enum LociError {
    // --- validation ---
    #[error("invalid interval: start ({start}) > end ({end})")]
    InvalidInterval { start: u64, end: u64 },

    #[error("invalid locus: {0}")]
    InvalidLocus(String),

    #[error("chromosome mismatch: '{a}' vs '{b}'")]
    ChromosomeMismatch { a: String, b: String },

    #[error("invalid snapshot name: '{0}'")]
    InvalidName(String),

    // --- lifecycle state ---
    #[error("collection '{name}' is {state}: {op} not allowed")]
    InvalidState {
        name: String,
        state: &'static str,
        op: &'static str,
    },

    #[error("cannot freeze empty collection '{0}'")]
    EmptyFreeze(String),

    #[error("snapshot '{0}' already exists (pass overwrite to replace it)")]
    SnapshotExists(String),

    // --- absence ---
    #[error("snapshot '{0}' not found")]
    SnapshotNotFound(String),

    // --- storage ---
    #[error("storage I/O error: {0}")]
    Storage(#[from] io::Error),

    #[error("snapshot encoding failed: {0}")]
    Encode(String),

    #[error("snapshot decoding failed: {0}")]
    Decode(String),
}

impl LociError {
    /// Returns true for the not-found class of errors.
    pub fn is_not_found(&self) -> bool {
        matches!(self, LociError::SnapshotNotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, LociError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LociError::InvalidInterval { start: 10, end: 5 };
        assert_eq!(err.to_string(), "invalid interval: start (10) > end (5)");

        let err = LociError::SnapshotNotFound("hg38_genes".to_string());
        assert!(err.is_not_found());
        assert!(err.to_string().contains("hg38_genes"));
    }
}
