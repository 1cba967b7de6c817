//! Error types surfaced by the registry, the codecs and the mapper.
//!
//! None of these are retried or replaced with a default value. Deciding
//! how to recover is left to the caller of [`ObjectMapper`](crate::mapper::ObjectMapper).

use thiserror::Error;

use crate::types::TypeSignature;

/// Maximum length of a value rendering embedded in an error message.
const MAX_VALUE_DISPLAY_LEN: usize = 100;

/// Errors that can occur while encoding or decoding a value.
#[derive(Debug, Error)]
pub enum Error {
    /// No registered codec matches the signature.
    #[error("no codec registered for signature {0}")]
    CodecNotFound(TypeSignature),

    /// A generic container codec was invoked without element type information.
    #[error("serializing raw {signature} is not supported for value: {value}")]
    UnsupportedRawGeneric {
        /// The offending signature, without its generics.
        signature: TypeSignature,
        /// The offending value (truncated for display).
        value: String,
    },

    /// The token sequence does not match the expected structure.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// A codec received a value that does not match its signature.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// The signature the codec handles.
        expected: String,
        /// The kind of value it received.
        actual: String,
    },

    /// The underlying byte stream failed.
    #[error("resource error: {0}")]
    Resource(#[from] std::io::Error),

    /// Failure raised by a user-registered codec.
    #[error(transparent)]
    Custom(#[from] anyhow::Error),
}

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// Creates a [`Error::MalformedInput`] error.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedInput(message.into())
    }

    /// Creates a [`Error::TypeMismatch`] error.
    #[must_use]
    pub fn type_mismatch(expected: impl ToString, actual: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.to_string(),
            actual: actual.into(),
        }
    }

    /// Creates a [`Error::UnsupportedRawGeneric`] error.
    ///
    /// The value is truncated to 100 characters for display.
    #[must_use]
    pub fn raw_generic(signature: &TypeSignature, value: impl std::fmt::Debug) -> Self {
        let rendered = format!("{value:?}");
        let value = if rendered.len() > MAX_VALUE_DISPLAY_LEN {
            let mut end = MAX_VALUE_DISPLAY_LEN;
            while !rendered.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}...", &rendered[..end])
        } else {
            rendered
        };

        Self::UnsupportedRawGeneric {
            signature: signature.clone(),
            value,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        if err.is_io() {
            Self::Resource(err.into())
        } else {
            Self::MalformedInput(err.to_string())
        }
    }
}

impl From<rmp_serde::decode::Error> for Error {
    fn from(err: rmp_serde::decode::Error) -> Self {
        match err {
            rmp_serde::decode::Error::InvalidMarkerRead(io)
            | rmp_serde::decode::Error::InvalidDataRead(io)
                if io.kind() != std::io::ErrorKind::UnexpectedEof =>
            {
                Self::Resource(io)
            }
            other => Self::MalformedInput(other.to_string()),
        }
    }
}

impl From<rmp_serde::encode::Error> for Error {
    fn from(err: rmp_serde::encode::Error) -> Self {
        Self::MalformedInput(err.to_string())
    }
}
