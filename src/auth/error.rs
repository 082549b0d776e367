// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Identity provider errors.

/// Errors returned by an [`AuthClient`](super::AuthClient) or
/// [`RecordClient`](super::RecordClient).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AuthClientError {
    #[error("Identity provider request failed: {0}")]
    Transport(String),

    #[error("Identity provider returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Identity provider response was invalid: {0}")]
    InvalidResponse(String),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("No active session")]
    NotSignedIn,

    #[error("Identity provider unavailable: {0}")]
    Unavailable(String),
}

impl AuthClientError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthClientError::Transport(_) => "provider_transport",
            AuthClientError::Status { .. } => "provider_status",
            AuthClientError::InvalidResponse(_) => "provider_invalid_response",
            AuthClientError::InvalidCredentials => "invalid_credentials",
            AuthClientError::NotSignedIn => "not_signed_in",
            AuthClientError::Unavailable(_) => "provider_unavailable",
        }
    }

    /// Whether the provider rejected the caller's credentials rather than
    /// failing to answer.
    pub fn is_auth_rejection(&self) -> bool {
        match self {
            AuthClientError::InvalidCredentials | AuthClientError::NotSignedIn => true,
            AuthClientError::Status { status, .. } => *status == 401 || *status == 403,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for AuthClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            AuthClientError::InvalidResponse(err.to_string())
        } else {
            AuthClientError::Transport(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_rejections() {
        assert!(AuthClientError::InvalidCredentials.is_auth_rejection());
        assert!(AuthClientError::NotSignedIn.is_auth_rejection());
        assert!(AuthClientError::Status {
            status: 401,
            message: "jwt expired".into()
        }
        .is_auth_rejection());
        assert!(!AuthClientError::Status {
            status: 500,
            message: "boom".into()
        }
        .is_auth_rejection());
        assert!(!AuthClientError::Transport("reset".into()).is_auth_rejection());
    }

    #[test]
    fn display_includes_status() {
        let err = AuthClientError::Status {
            status: 503,
            message: "maintenance".into(),
        };
        assert_eq!(err.to_string(), "Identity provider returned 503: maintenance");
        assert_eq!(err.error_code(), "provider_status");
    }
}
