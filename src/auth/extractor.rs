// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors for the operator's session.
//!
//! Use the `AdminPage` extractor in handlers to require an admin:
//!
//! ```rust,ignore
//! async fn dashboard(AdminPage(admin): AdminPage) -> impl IntoResponse {
//!     // admin is the Identity that passed the role check
//! }
//! ```

use std::convert::Infallible;

use axum::{extract::FromRequestParts, http::request::Parts, response::Redirect};
use tracing::debug;

use super::Identity;
use crate::session::GuardDecision;
use crate::state::AppState;

/// Extractor for admin-only pages.
///
/// Runs the admin guard for the current identity. Visitors without a
/// session are redirected to the login page; signed-in non-admins are
/// redirected home. Both redirects use `303 See Other`.
pub struct AdminPage(pub Identity);

impl FromRequestParts<AppState> for AdminPage {
    type Rejection = Redirect;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match state.guard.check().await {
            GuardDecision::Granted(identity) => Ok(AdminPage(identity)),
            GuardDecision::Denied(redirect) => {
                debug!(path = %parts.uri.path(), to = redirect.path(), "Admin page denied");
                Err(Redirect::to(redirect.path()))
            }
        }
    }
}

/// Extractor for the mirrored identity, if any.
///
/// Waits for the session cache to finish its initial load so handlers never
/// observe the transient "not yet known" state.
pub struct CurrentIdentity(pub Option<Identity>);

impl FromRequestParts<AppState> for CurrentIdentity {
    type Rejection = Infallible;

    async fn from_request_parts(_parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        state.session.wait_until_loaded().await;
        Ok(CurrentIdentity(state.session.identity()))
    }
}
