//! Failure taxonomy shared by every component that talks to the printer
//! server.
//!
//! The gateway converts whatever its transport produced into a
//! [`GatewayError`]; everything downstream only ever looks at the
//! [`ErrorClass`] and the human-readable message.

use serde::Serialize;

/// Coarse classification of a failed gateway request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorClass {
    /// 404: the resource (folder, file, job) does not exist.
    NotFound,
    /// 409: the command is not applicable in the printer's current state.
    Conflict,
    /// Timeouts, refused connections, gateway errors. Expected while the
    /// printer server restarts or reconnects.
    TransientNetwork,
    /// Anything else; the message is surfaced verbatim.
    Unclassified,
}

impl ErrorClass {
    /// Classify an HTTP status code.
    ///
    /// Status `0` is what a browser-style client reports when no response
    /// arrived at all, so it is treated like a refused connection.
    pub fn from_status(status: u16) -> Self {
        match status {
            404 => Self::NotFound,
            409 => Self::Conflict,
            0 | 502 | 503 | 504 => Self::TransientNetwork,
            _ => Self::Unclassified,
        }
    }
}

/// A classified failure returned by a gateway request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct GatewayError {
    /// HTTP status, when a response was received.
    pub status: Option<u16>,
    pub class: ErrorClass,
    /// Raw error description, kept for diagnostics.
    pub message: String,
}

impl GatewayError {
    /// Build an error from an HTTP status and message.
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            class: ErrorClass::from_status(status),
            message: message.into(),
        }
    }

    /// Build an error for a request that never produced a response.
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            class: ErrorClass::TransientNetwork,
            message: message.into(),
        }
    }

    /// Build an error for a response that could not be interpreted.
    pub fn unclassified(message: impl Into<String>) -> Self {
        Self {
            status: None,
            class: ErrorClass::Unclassified,
            message: message.into(),
        }
    }

    pub fn is_conflict(&self) -> bool {
        self.class == ErrorClass::Conflict
    }

    pub fn is_not_found(&self) -> bool {
        self.class == ErrorClass::NotFound
    }
}
