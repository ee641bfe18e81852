//! Uniform call result envelope
//!
//! Every operation crossing the platform boundary resolves to the
//! same shape: `{ "success": true, "value": ... }` on success, or
//! `{ "success": false, "error": <code> }` on failure, with the code
//! drawn from the closed set in [`codes`]. Callers branch on
//! `success` without inspecting anything else.

use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// Protocol error codes
pub mod codes {
    pub const INVALID_INPUT: u16 = 400;
    pub const INSUFFICIENT_BALANCE: u16 = 402;
    pub const FORBIDDEN: u16 = 403;
    pub const NOT_FOUND: u16 = 404;
    pub const INACTIVE: u16 = 409;
    pub const INTERNAL: u16 = 500;
}

/// Map an error to its protocol code
pub fn error_code(error: &LedgerError) -> u16 {
    match error {
        LedgerError::NotFound(_) => codes::NOT_FOUND,
        LedgerError::Forbidden(_) => codes::FORBIDDEN,
        LedgerError::InvalidInput(_) => codes::INVALID_INPUT,
        LedgerError::InsufficientBalance { .. } => codes::INSUFFICIENT_BALANCE,
        LedgerError::Inactive(_) => codes::INACTIVE,
        LedgerError::Config(_) | LedgerError::Io(_) | LedgerError::Internal(_) => codes::INTERNAL,
    }
}

/// Uniform result envelope for boundary callers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CallResult<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<u16>,
}

impl<T> CallResult<T> {
    /// Successful call with a value
    pub fn ok(value: T) -> Self {
        Self {
            success: true,
            value: Some(value),
            error: None,
        }
    }

    /// Successful call with no value (pure mutations)
    pub fn ok_empty() -> Self {
        Self {
            success: true,
            value: None,
            error: None,
        }
    }

    /// Failed call carrying the error's protocol code
    pub fn err(error: &LedgerError) -> Self {
        Self {
            success: false,
            value: None,
            error: Some(error_code(error)),
        }
    }

    /// Wrap a service result
    pub fn from_result(result: Result<T, LedgerError>) -> Self {
        match result {
            Ok(value) => Self::ok(value),
            Err(e) => Self::err(&e),
        }
    }

    /// Wrap an optional service result; `None` reports `NOT_FOUND`
    pub fn from_option(result: Result<Option<T>, LedgerError>, not_found_msg: &str) -> Self {
        match result {
            Ok(Some(value)) => Self::ok(value),
            Ok(None) => Self::err(&LedgerError::NotFound(not_found_msg.to_string())),
            Err(e) => Self::err(&e),
        }
    }
}

impl<T: Serialize> CallResult<T> {
    /// Serialize the envelope for boundary transports
    pub fn to_json_string(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}
