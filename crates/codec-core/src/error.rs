//! Error handling for the codec library

#![allow(missing_docs)]

use thiserror::Error;

/// Result type alias for codec operations
pub type Result<T> = std::result::Result<T, CodecError>;

/// Errors raised while converting sample buffers
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Linear input did not hold a whole number of 16-bit samples
    #[error("Odd linear buffer length: {len} bytes is not a whole number of 16-bit samples")]
    OddLinearLength { len: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CodecError::OddLinearLength { len: 161 };
        assert!(err.to_string().contains("161"));
    }
}
