//! Error types for model encoding and decoding.

use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors that can occur while encoding or decoding model types.
#[derive(Debug, Error)]
pub enum ModelError {
    /// CBOR encoding failed.
    #[error("encode error: {0}")]
    Encode(String),

    /// CBOR decoding failed.
    #[error("decode error: {0}")]
    Decode(String),

    /// A numeric wire code did not map to a known value.
    #[error("invalid {field} code: {code}")]
    InvalidCode {
        /// The field being decoded.
        field: &'static str,
        /// The unrecognized code.
        code: u8,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ModelError::InvalidCode {
            field: "status",
            code: 9,
        };
        assert_eq!(err.to_string(), "invalid status code: 9");
    }
}
