//! Error types for AssayDB.

use thiserror::Error;

/// Result type alias using AssayError.
pub type Result<T> = std::result::Result<T, AssayError>;

/// Errors that can occur in AssayDB operations.
#[derive(Debug, Error)]
pub enum AssayError {
    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Storage errors
    #[error("Block index out of range: {index} (block count {count})")]
    BlockOutOfRange { index: u32, count: u32 },

    #[error("Block size mismatch: expected {expected}, got {actual}")]
    BlockSizeMismatch { expected: usize, actual: usize },

    #[error("Record size mismatch: expected {expected}, got {actual}")]
    RecordSizeMismatch { expected: usize, actual: usize },

    #[error("Heap file corrupted: {path}, reason: {reason}")]
    HeapCorrupted { path: String, reason: String },

    #[error("Cluster too small for one record: cluster={cluster}, record={record}")]
    ClusterTooSmall { cluster: usize, record: usize },

    // Index errors
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("Index meta corrupted: {path}, reason: {reason}")]
    MetaCorrupted { path: String, reason: String },

    // Configuration errors
    #[error("Invalid parameter: {name} = {value}")]
    InvalidParameter { name: String, value: String },

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error as IoError, ErrorKind};

    #[test]
    fn test_io_error_conversion() {
        let io_err = IoError::new(ErrorKind::NotFound, "file not found");
        let err: AssayError = io_err.into();
        assert!(matches!(err, AssayError::Io(_)));
        assert!(err.to_string().contains("I/O error"));
    }

    #[test]
    fn test_block_out_of_range_display() {
        let err = AssayError::BlockOutOfRange { index: 7, count: 3 };
        assert_eq!(
            err.to_string(),
            "Block index out of range: 7 (block count 3)"
        );
    }

    #[test]
    fn test_block_size_mismatch_display() {
        let err = AssayError::BlockSizeMismatch {
            expected: 220,
            actual: 219,
        };
        assert_eq!(err.to_string(), "Block size mismatch: expected 220, got 219");
    }

    #[test]
    fn test_heap_corrupted_display() {
        let err = AssayError::HeapCorrupted {
            path: "index_lh_primary.dat".to_string(),
            reason: "length not a multiple of block size".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Heap file corrupted: index_lh_primary.dat, reason: length not a multiple of block size"
        );
    }

    #[test]
    fn test_duplicate_key_display() {
        let err = AssayError::DuplicateKey("P0000042".to_string());
        assert_eq!(err.to_string(), "Duplicate key: P0000042");
    }

    #[test]
    fn test_meta_corrupted_display() {
        let err = AssayError::MetaCorrupted {
            path: "index_lhmeta.dat".to_string(),
            reason: "bad magic".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Index meta corrupted: index_lhmeta.dat, reason: bad magic"
        );
    }

    #[test]
    fn test_invalid_parameter_display() {
        let err = AssayError::InvalidParameter {
            name: "initial_group_count".to_string(),
            value: "0".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid parameter: initial_group_count = 0");
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_ok() -> Result<i32> {
            Ok(42)
        }

        fn returns_err() -> Result<i32> {
            Err(AssayError::Internal("test".to_string()))
        }

        assert!(returns_ok().is_ok());
        assert!(returns_err().is_err());
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<AssayError>();
    }
}
