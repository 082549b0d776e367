// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;
use std::time::Instant;

use crate::auth::AuthProvider;
use crate::session::{AdminGuard, RoleStore, SessionStore, SessionSynchronizer};

/// Shared application state.
///
/// The session and role stores are process-wide: the portal mirrors a
/// single operator's session, the way a browser tab would.
#[derive(Clone)]
pub struct AppState {
    pub provider: Arc<AuthProvider>,
    pub session: Arc<SessionStore>,
    pub roles: Arc<RoleStore>,
    pub guard: AdminGuard<AuthProvider>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(provider: impl Into<AuthProvider>) -> Self {
        let provider = Arc::new(provider.into());
        let session = Arc::new(SessionStore::new());
        let roles = Arc::new(RoleStore::new());
        let guard = AdminGuard::new(
            Arc::clone(&provider),
            Arc::clone(&session),
            Arc::clone(&roles),
        );
        Self {
            provider,
            session,
            roles,
            guard,
            started_at: Instant::now(),
        }
    }

    /// Synchronizer wired to this state's provider and stores.
    pub fn synchronizer(&self) -> SessionSynchronizer<AuthProvider> {
        SessionSynchronizer::new(
            Arc::clone(&self.provider),
            Arc::clone(&self.session),
            Arc::clone(&self.roles),
        )
    }
}
