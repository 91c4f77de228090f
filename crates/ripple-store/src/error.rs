#![forbid(unsafe_code)]

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("no value stored for key: {key}")]
    NoSuchElement { key: String },

    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("value stored for key {key} is not a {expected}")]
    TypeMismatch { key: String, expected: &'static str },
}

impl StoreError {
    #[must_use]
    pub fn missing(key: impl Into<String>) -> Self {
        Self::NoSuchElement { key: key.into() }
    }

    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn mismatch<T: ?Sized>(key: impl Into<String>) -> Self {
        Self::TypeMismatch {
            key: key.into(),
            expected: std::any::type_name::<T>(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
