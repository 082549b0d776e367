// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Process-local cache of the current identity and session.
//!
//! Backed by a `tokio::sync::watch` channel: every mutation notifies all
//! receivers, so readers never poll.

use serde::Serialize;
use tokio::sync::watch;
use tracing::debug;

use crate::auth::{Identity, Session};

/// Snapshot of the session cache.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionCacheState {
    pub identity: Option<Identity>,
    pub session: Option<Session>,
    /// True until the first identity/session resolution completes.
    pub is_loading: bool,
    /// Incremented on every write.
    pub revision: u64,
}

impl Default for SessionCacheState {
    fn default() -> Self {
        Self {
            identity: None,
            session: None,
            is_loading: true,
            revision: 0,
        }
    }
}

/// Shared session cache. Inputs are accepted unconditionally.
pub struct SessionStore {
    state: watch::Sender<SessionCacheState>,
}

impl SessionStore {
    pub fn new() -> Self {
        let (state, _) = watch::channel(SessionCacheState::default());
        Self { state }
    }

    fn write(&self, apply: impl FnOnce(&mut SessionCacheState)) {
        self.state.send_modify(|state| {
            apply(state);
            state.revision += 1;
        });
    }

    pub fn set_identity(&self, identity: Option<Identity>) {
        self.write(|state| state.identity = identity);
    }

    pub fn set_session(&self, session: Option<Session>) {
        self.write(|state| state.session = session);
    }

    pub fn set_loading(&self, loading: bool) {
        self.write(|state| state.is_loading = loading);
    }

    /// Write identity and session as one update.
    pub fn replace(&self, identity: Option<Identity>, session: Option<Session>) {
        match (&identity, &session) {
            (None, Some(_)) => debug!("Session cached without a resolved identity"),
            (Some(identity), Some(session)) if identity.id != session.user.id => debug!(
                identity = %identity.id,
                session_user = %session.user.id,
                "Cached identity and session disagree"
            ),
            _ => {}
        }
        self.write(|state| {
            state.identity = identity;
            state.session = session;
        });
    }

    pub fn identity(&self) -> Option<Identity> {
        self.state.borrow().identity.clone()
    }

    pub fn session(&self) -> Option<Session> {
        self.state.borrow().session.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().is_loading
    }

    pub fn current_user_id(&self) -> Option<String> {
        self.state.borrow().identity.as_ref().map(|i| i.id.clone())
    }

    pub fn revision(&self) -> u64 {
        self.state.borrow().revision
    }

    pub fn snapshot(&self) -> SessionCacheState {
        self.state.borrow().clone()
    }

    /// Receiver notified on every mutation.
    pub fn subscribe(&self) -> watch::Receiver<SessionCacheState> {
        self.state.subscribe()
    }

    /// Resolve once the initial identity fetch has completed.
    pub async fn wait_until_loaded(&self) {
        let mut receiver = self.state.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = receiver.wait_for(|state| !state.is_loading).await;
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
