//! Realm error types.
//!
//! Native built-ins report the ES error kinds directly; anything thrown by
//! a callback travels as [`VmError::Exception`] carrying the thrown value.
//! [`Realm::error_to_value`](crate::Realm::error_to_value) turns either form
//! into the value a `catch` or a rejection handler would see.

use crate::value::Value;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum VmError {
    #[error("TypeError: {0}")]
    TypeError(String),

    #[error("RangeError: {0}")]
    RangeError(String),

    /// Bad RegExp source or flags
    #[error("SyntaxError: {0}")]
    SyntaxError(String),

    /// Broken realm invariant; materialized as a plain `Error`
    #[error("InternalError: {0}")]
    InternalError(String),

    /// Native call depth exceeded `RealmConfig::max_native_depth`
    #[error("RangeError: Maximum call stack size exceeded")]
    StackOverflow,

    #[error("Uncaught {0}")]
    Exception(Box<ThrownValue>),
}

/// A value thrown by realm code, with a printable summary for logs
#[derive(Debug, Clone)]
pub struct ThrownValue {
    pub value: Value,
    pub summary: String,
}

impl std::fmt::Display for ThrownValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.summary)
    }
}

impl VmError {
    pub fn type_error(msg: impl Into<String>) -> Self {
        Self::TypeError(msg.into())
    }

    pub fn range_error(msg: impl Into<String>) -> Self {
        Self::RangeError(msg.into())
    }

    pub fn syntax_error(msg: impl Into<String>) -> Self {
        Self::SyntaxError(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::InternalError(msg.into())
    }

    /// Wrap a thrown value. Strings are kept verbatim in the summary.
    pub fn exception(value: Value) -> Self {
        let summary = match value.as_str() {
            Some(s) => s.to_string(),
            None => format!("{value:?}"),
        };
        Self::Exception(Box::new(ThrownValue { value, summary }))
    }

    pub fn thrown_value(&self) -> Option<&Value> {
        match self {
            Self::Exception(thrown) => Some(&thrown.value),
            _ => None,
        }
    }
}

pub type VmResult<T> = std::result::Result<T, VmError>;
