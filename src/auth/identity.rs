// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Identity and session types mirrored from the identity provider.
//!
//! Both types are owned by the provider. The local copies are read-only
//! snapshots and are never treated as the source of truth.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Authenticated user record returned by the identity provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    /// Provider user ID (the key used for role lookups)
    pub id: String,

    /// Primary email address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Remaining provider-defined fields (metadata, timestamps, ...)
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl Identity {
    pub fn new(id: impl Into<String>, email: Option<&str>) -> Self {
        Self {
            id: id.into(),
            email: email.map(str::to_string),
            extra: HashMap::new(),
        }
    }
}

/// Provider-issued credential paired with an [`Identity`].
///
/// Tokens are skipped on serialization so a session can be exposed to
/// readers (status endpoints, logs) without leaking credentials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// User the session was issued for
    pub user: Identity,

    /// Bearer token for provider calls
    #[serde(skip_serializing, default)]
    pub access_token: String,

    /// Token used to obtain a fresh access token
    #[serde(skip_serializing, default)]
    pub refresh_token: Option<String>,

    /// Expiry as reported by the provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(user: Identity, access_token: impl Into<String>) -> Self {
        Self {
            user,
            access_token: access_token.into(),
            refresh_token: None,
            expires_at: None,
        }
    }

    pub fn with_refresh_token(mut self, token: impl Into<String>) -> Self {
        self.refresh_token = Some(token.into());
        self
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Sessions without a provider expiry never expire locally.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn identity_keeps_provider_fields() {
        let json = r#"{"id":"u-1","email":"ada@example.com","aud":"authenticated","app_metadata":{"provider":"email"}}"#;
        let identity: Identity = serde_json::from_str(json).unwrap();

        assert_eq!(identity.id, "u-1");
        assert_eq!(identity.email.as_deref(), Some("ada@example.com"));
        assert_eq!(identity.extra["aud"], "authenticated");
        assert_eq!(identity.extra["app_metadata"]["provider"], "email");
    }

    #[test]
    fn session_serialization_omits_tokens() {
        let session = Session::new(Identity::new("u-1", None), "secret-access")
            .with_refresh_token("secret-refresh");

        let json = serde_json::to_string(&session).unwrap();
        assert!(!json.contains("secret-access"));
        assert!(!json.contains("secret-refresh"));
        assert!(json.contains("u-1"));
    }

    #[test]
    fn session_expiry() {
        let now = Utc::now();
        let session = Session::new(Identity::new("u-1", None), "t");
        assert!(!session.is_expired_at(now));

        let expired = session.clone().with_expiry(now - Duration::seconds(1));
        assert!(expired.is_expired_at(now));

        let live = session.with_expiry(now + Duration::minutes(5));
        assert!(!live.is_expired_at(now));
    }
}
