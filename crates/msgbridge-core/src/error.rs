//! Shared error type and the wire-level error-code taxonomy.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error codes carried in `error` envelopes (stable wire contract).
///
/// The string literals are part of the protocol and must round-trip exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // general
    /// Catch-all for failures without a more specific code.
    UnknownError,
    /// No handler registered for the inbound message type.
    HandlerNotFound,
    /// A registered handler failed.
    HandlerError,
    /// Inbound payload is not a valid envelope.
    InvalidMessage,

    // version control
    GitError,
    BranchExists,
    MergeConflict,

    // integrations
    AzureAuthFailed,
    AzureApiError,
    PrNotFound,
    GithubAuthFailed,
    GithubApiError,
}

/// Taxonomy group an [`ErrorCode`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    General,
    VersionControl,
    Integration,
}

impl ErrorCode {
    /// Every code, in declaration order.
    pub const ALL: [ErrorCode; 12] = [
        ErrorCode::UnknownError,
        ErrorCode::HandlerNotFound,
        ErrorCode::HandlerError,
        ErrorCode::InvalidMessage,
        ErrorCode::GitError,
        ErrorCode::BranchExists,
        ErrorCode::MergeConflict,
        ErrorCode::AzureAuthFailed,
        ErrorCode::AzureApiError,
        ErrorCode::PrNotFound,
        ErrorCode::GithubAuthFailed,
        ErrorCode::GithubApiError,
    ];

    /// String representation used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::UnknownError => "UNKNOWN_ERROR",
            ErrorCode::HandlerNotFound => "HANDLER_NOT_FOUND",
            ErrorCode::HandlerError => "HANDLER_ERROR",
            ErrorCode::InvalidMessage => "INVALID_MESSAGE",
            ErrorCode::GitError => "GIT_ERROR",
            ErrorCode::BranchExists => "BRANCH_EXISTS",
            ErrorCode::MergeConflict => "MERGE_CONFLICT",
            ErrorCode::AzureAuthFailed => "AZURE_AUTH_FAILED",
            ErrorCode::AzureApiError => "AZURE_API_ERROR",
            ErrorCode::PrNotFound => "PR_NOT_FOUND",
            ErrorCode::GithubAuthFailed => "GITHUB_AUTH_FAILED",
            ErrorCode::GithubApiError => "GITHUB_API_ERROR",
        }
    }

    pub fn category(self) -> ErrorCategory {
        match self {
            ErrorCode::UnknownError
            | ErrorCode::HandlerNotFound
            | ErrorCode::HandlerError
            | ErrorCode::InvalidMessage => ErrorCategory::General,
            ErrorCode::GitError | ErrorCode::BranchExists | ErrorCode::MergeConflict => {
                ErrorCategory::VersionControl
            }
            ErrorCode::AzureAuthFailed
            | ErrorCode::AzureApiError
            | ErrorCode::PrNotFound
            | ErrorCode::GithubAuthFailed
            | ErrorCode::GithubApiError => ErrorCategory::Integration,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorCode {
    type Err = MsgBridgeError;

    fn from_str(s: &str) -> Result<Self> {
        ErrorCode::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| MsgBridgeError::BadEnvelope(format!("unknown error code: {s}")))
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, MsgBridgeError>;

/// Unified error type used by core and host.
#[derive(Debug, Error)]
pub enum MsgBridgeError {
    /// `create_response` was called with a type missing from the mapping table.
    /// Raised to the caller, never sent over the channel.
    #[error("unknown request type: {0}")]
    UnknownRequestType(String),
    #[error("invalid envelope: {0}")]
    BadEnvelope(String),
    /// Handler failure. Displays the message verbatim so it can be forwarded as-is.
    #[error("{0}")]
    Handler(String),
    #[error("{message}")]
    Domain { code: ErrorCode, message: String },
    #[error("transport: {0}")]
    Transport(String),
    #[error("config: {0}")]
    Config(String),
    #[error("unsupported config version")]
    UnsupportedVersion,
    #[error("internal: {0}")]
    Internal(String),
}

impl MsgBridgeError {
    /// Shorthand for a handler failure with the given message.
    pub fn handler(msg: impl Into<String>) -> Self {
        MsgBridgeError::Handler(msg.into())
    }

    /// Shorthand for a domain failure carrying a taxonomy code.
    pub fn domain(code: ErrorCode, msg: impl Into<String>) -> Self {
        MsgBridgeError::Domain {
            code,
            message: msg.into(),
        }
    }

    /// Map to the closest wire-level code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            MsgBridgeError::BadEnvelope(_) => ErrorCode::InvalidMessage,
            MsgBridgeError::Handler(_) => ErrorCode::HandlerError,
            MsgBridgeError::Domain { code, .. } => *code,
            MsgBridgeError::UnknownRequestType(_)
            | MsgBridgeError::Transport(_)
            | MsgBridgeError::Config(_)
            | MsgBridgeError::UnsupportedVersion
            | MsgBridgeError::Internal(_) => ErrorCode::UnknownError,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn literals_round_trip_through_serde_and_from_str() {
        for code in ErrorCode::ALL {
            let json = serde_json::to_value(code).unwrap();
            assert_eq!(json, serde_json::Value::String(code.as_str().into()));
            let back: ErrorCode = serde_json::from_value(json).unwrap();
            assert_eq!(back, code);
            assert_eq!(code.as_str().parse::<ErrorCode>().unwrap(), code);
        }
    }

    #[test]
    fn wire_literals_are_stable() {
        assert_eq!(ErrorCode::UnknownError.as_str(), "UNKNOWN_ERROR");
        assert_eq!(ErrorCode::HandlerNotFound.as_str(), "HANDLER_NOT_FOUND");
        assert_eq!(ErrorCode::HandlerError.as_str(), "HANDLER_ERROR");
        assert_eq!(ErrorCode::GitError.as_str(), "GIT_ERROR");
        assert_eq!(ErrorCode::BranchExists.as_str(), "BRANCH_EXISTS");
        assert_eq!(ErrorCode::MergeConflict.as_str(), "MERGE_CONFLICT");
        assert_eq!(ErrorCode::AzureAuthFailed.as_str(), "AZURE_AUTH_FAILED");
        assert_eq!(ErrorCode::AzureApiError.as_str(), "AZURE_API_ERROR");
        assert_eq!(ErrorCode::PrNotFound.as_str(), "PR_NOT_FOUND");
        assert_eq!(ErrorCode::GithubAuthFailed.as_str(), "GITHUB_AUTH_FAILED");
        assert_eq!(ErrorCode::GithubApiError.as_str(), "GITHUB_API_ERROR");
    }

    #[test]
    fn unknown_literal_is_rejected() {
        assert!("NOPE".parse::<ErrorCode>().is_err());
    }

    #[test]
    fn categories() {
        assert_eq!(ErrorCode::HandlerError.category(), ErrorCategory::General);
        assert_eq!(ErrorCode::MergeConflict.category(), ErrorCategory::VersionControl);
        assert_eq!(ErrorCode::PrNotFound.category(), ErrorCategory::Integration);
    }

    #[test]
    fn handler_error_displays_verbatim() {
        let e = MsgBridgeError::handler("disk on fire");
        assert_eq!(e.to_string(), "disk on fire");
        assert_eq!(e.error_code(), ErrorCode::HandlerError);

        let d = MsgBridgeError::domain(ErrorCode::BranchExists, "branch main exists");
        assert_eq!(d.to_string(), "branch main exists");
        assert_eq!(d.error_code(), ErrorCode::BranchExists);
    }
}
