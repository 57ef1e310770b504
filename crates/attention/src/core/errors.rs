//! Error types emitted by attention implementations.

use std::fmt;

/// Attention-specific error category.
#[derive(Debug)]
pub enum AttentionError {
    /// The supplied tensor shapes do not align with the documented contract.
    InvalidShape { context: String },
    /// A mask argument is malformed or forbids every key for some query.
    InvalidMask { context: String },
    /// The layer was constructed with inconsistent dimensions.
    InvalidConfig { context: String },
    /// A backend-specific failure propagated to the caller.
    Backend { message: String },
}

impl fmt::Display for AttentionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttentionError::InvalidShape { context } => {
                write!(f, "invalid tensor shape: {context}")
            }
            AttentionError::InvalidMask { context } => write!(f, "invalid mask: {context}"),
            AttentionError::InvalidConfig { context } => {
                write!(f, "invalid configuration: {context}")
            }
            AttentionError::Backend { message } => f.write_str(message),
        }
    }
}

impl std::error::Error for AttentionError {}

impl From<candle_core::Error> for AttentionError {
    fn from(err: candle_core::Error) -> Self {
        AttentionError::Backend {
            message: err.to_string(),
        }
    }
}
