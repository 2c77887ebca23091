//! Bootstrap error types

use primordials_realm::VmError;
use thiserror::Error;

/// Errors that abort primordials installation. None of them are retried.
#[derive(Debug, Clone, Error)]
pub enum BootstrapError {
    /// An expected built-in property is absent
    #[error("missing intrinsic {owner}.{key}")]
    MissingIntrinsic { owner: String, key: String },

    /// A captured function slot holds something that cannot be called
    #[error("intrinsic {name} is not callable")]
    NotCallable { name: String },

    /// A property exists but has the wrong kind (data vs accessor, object)
    #[error("intrinsic {name} has the wrong shape: expected {expected}")]
    WrongShape { name: String, expected: &'static str },

    /// The registry already holds an entry with this name
    #[error("duplicate registry entry {0}")]
    DuplicateEntry(String),

    /// `Primordials::install` ran twice on the same realm
    #[error("primordials are already installed on this realm")]
    AlreadyInstalled,

    /// A realm operation failed during bootstrap
    #[error(transparent)]
    Vm(#[from] VmError),
}

impl BootstrapError {
    pub(crate) fn missing(owner: &str, key: impl std::fmt::Display) -> Self {
        Self::MissingIntrinsic {
            owner: owner.to_string(),
            key: key.to_string(),
        }
    }

    pub(crate) fn wrong_shape(name: impl Into<String>, expected: &'static str) -> Self {
        Self::WrongShape {
            name: name.into(),
            expected,
        }
    }
}

/// Result type for bootstrap steps
pub type BootstrapResult<T> = std::result::Result<T, BootstrapError>;
