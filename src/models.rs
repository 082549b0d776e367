// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response structures for the portal's REST surface. All
//! types derive `Serialize`/`Deserialize` and `ToSchema` for JSON handling
//! and OpenAPI documentation.
//!
//! ## Model Categories
//!
//! - **Session**: outward views of the mirrored identity (never tokens)
//! - **Events**: Founders Club events managed from the admin pages
//! - **Registrations**: attendee sign-ups for an event
//! - **Dashboard**: aggregate counts for the admin landing page

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::Identity;
use crate::session::SessionCacheState;

// =============================================================================
// Session Models
// =============================================================================

/// Public view of an identity.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct IdentityView {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl From<&Identity> for IdentityView {
    fn from(identity: &Identity) -> Self {
        Self {
            id: identity.id.clone(),
            email: identity.email.clone(),
        }
    }
}

/// Snapshot of the session cache.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct SessionView {
    /// Signed-in identity, absent when signed out.
    pub identity: Option<IdentityView>,
    /// Whether a session is cached.
    pub has_session: bool,
    /// Session expiry, when the provider reported one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// True only until the initial session fetch settles.
    pub is_loading: bool,
    /// Number of writes applied to the cache.
    pub revision: u64,
}

impl From<&SessionCacheState> for SessionView {
    fn from(state: &SessionCacheState) -> Self {
        Self {
            identity: state.identity.as_ref().map(IdentityView::from),
            has_session: state.session.is_some(),
            expires_at: state.session.as_ref().and_then(|s| s.expires_at),
            is_loading: state.is_loading,
            revision: state.revision,
        }
    }
}

/// Password sign-in request.
#[derive(Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

// =============================================================================
// Event Models
// =============================================================================

/// A Founders Club event.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct Event {
    pub id: i64,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub starts_at: DateTime<Utc>,
    /// Maximum number of registrations, unlimited when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u32>,
}

/// Request to create an event.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateEventRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    pub starts_at: DateTime<Utc>,
    #[serde(default)]
    pub capacity: Option<u32>,
}

/// Response for list endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EventListResponse {
    pub events: Vec<Event>,
}

// =============================================================================
// Registration Models
// =============================================================================

/// An attendee's registration for an event.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct Registration {
    pub id: i64,
    pub event_id: i64,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegistrationListResponse {
    pub event_id: i64,
    pub registrations: Vec<Registration>,
}

// =============================================================================
// Dashboard Models
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct DashboardStats {
    pub event_count: usize,
    pub registration_count: usize,
    pub upcoming_event_count: usize,
}

/// Admin landing page payload.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DashboardResponse {
    /// The operator who passed the admin check.
    pub operator: IdentityView,
    pub stats: DashboardStats,
    /// Next events by start time.
    pub upcoming: Vec<Event>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Session;
    use serde_json::json;

    #[test]
    fn session_view_never_exposes_tokens() {
        let identity = Identity::new("u-ada", Some("ada@example.com"));
        let state = SessionCacheState {
            identity: Some(identity.clone()),
            session: Some(Session::new(identity, "secret-token")),
            is_loading: false,
            revision: 3,
        };

        let body = serde_json::to_string(&SessionView::from(&state)).unwrap();
        assert!(!body.contains("secret-token"));
        assert!(body.contains("\"has_session\":true"));
        assert!(body.contains("ada@example.com"));
    }

    #[test]
    fn login_request_debug_redacts_password() {
        let request = LoginRequest {
            email: "ada@example.com".into(),
            password: "hunter2".into(),
        };
        let printed = format!("{request:?}");
        assert!(printed.contains("ada@example.com"));
        assert!(!printed.contains("hunter2"));
    }

    #[test]
    fn event_row_decodes_with_optional_columns_missing() {
        let row = json!({
            "id": 7,
            "title": "Demo night",
            "starts_at": "2026-11-02T18:00:00Z"
        });
        let event: Event = serde_json::from_value(row).unwrap();
        assert_eq!(event.id, 7);
        assert!(event.capacity.is_none());
        assert!(event.location.is_none());
    }
}
