// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-process identity provider.
//!
//! Used in development mode (no `AUTH_URL` configured) and as the provider
//! double in tests. Besides accounts, roles and record tables it exposes
//! hooks to hold lookups open, inject failures and count role queries.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{Duration, Utc};
use serde_json::Value;
use tokio::sync::{broadcast, Semaphore};
use tracing::{debug, info};

use super::client::{AuthClient, RecordClient};
use super::error::AuthClientError;
use super::events::{AuthEvent, AuthEventKind, AuthSubscription, DEFAULT_EVENT_CAPACITY};
use super::identity::{Identity, Session};
use super::roles::RoleRecord;
use crate::records::RecordQuery;

/// Lifetime of sessions issued by the in-memory provider.
const SESSION_TTL_MINUTES: i64 = 60;

struct Account {
    password: String,
    identity: Identity,
}

#[derive(Default)]
struct Inner {
    accounts: HashMap<String, Account>,
    roles: HashMap<String, String>,
    tables: HashMap<String, Vec<Value>>,
    session: Option<Session>,
    fail_session_fetch: bool,
    fail_role_lookups: bool,
    issued_tokens: u64,
    next_row_id: u64,
}

/// A closed gate lets every waiter through; an open one parks them.
type Gate = Arc<Semaphore>;

async fn pass(gate: Option<Gate>) {
    if let Some(gate) = gate {
        // Gates never hand out permits; closing is the release signal.
        let _ = gate.acquire().await;
    }
}

/// In-memory [`AuthClient`] + [`RecordClient`].
pub struct MemoryAuthClient {
    inner: Mutex<Inner>,
    events: broadcast::Sender<AuthEvent>,
    role_lookups: AtomicUsize,
    role_gates: Mutex<HashMap<String, Gate>>,
    fetch_gate: Mutex<Option<Gate>>,
}

impl MemoryAuthClient {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(DEFAULT_EVENT_CAPACITY);
        Self {
            inner: Mutex::new(Inner::default()),
            events,
            role_lookups: AtomicUsize::new(0),
            role_gates: Mutex::new(HashMap::new()),
            fetch_gate: Mutex::new(None),
        }
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register an account that can sign in with `email` / `password`.
    pub fn add_account(&self, email: &str, password: &str, identity: Identity) {
        self.inner().accounts.insert(
            email.to_lowercase(),
            Account {
                password: password.to_string(),
                identity,
            },
        );
    }

    /// Set the role row for a user in the admin collection.
    pub fn set_role(&self, user_id: &str, role: &str) {
        self.inner()
            .roles
            .insert(user_id.to_string(), role.to_string());
    }

    pub fn remove_role(&self, user_id: &str) {
        self.inner().roles.remove(user_id);
    }

    /// Replace the rows of a record collection.
    pub fn seed_rows(&self, table: &str, rows: Vec<Value>) {
        self.inner().tables.insert(table.to_string(), rows);
    }

    /// Replace the provider-side session without emitting an event.
    pub fn set_session(&self, session: Option<Session>) {
        self.inner().session = session;
    }

    /// Publish an event to every subscriber.
    pub fn emit(&self, event: AuthEvent) {
        debug!(event = %event.kind, "Memory provider emitting auth event");
        // No subscribers is not an error for a push source.
        let _ = self.events.send(event);
    }

    /// Sign in and emit `SIGNED_IN`.
    pub fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthClientError> {
        let session = {
            let mut inner = self.inner();
            let identity = match inner.accounts.get(&email.to_lowercase()) {
                Some(account) if account.password == password => account.identity.clone(),
                _ => return Err(AuthClientError::InvalidCredentials),
            };
            inner.issued_tokens += 1;
            let session = Session::new(identity, format!("mem-access-{}", inner.issued_tokens))
                .with_refresh_token(format!("mem-refresh-{}", inner.issued_tokens))
                .with_expiry(Utc::now() + Duration::minutes(SESSION_TTL_MINUTES));
            inner.session = Some(session.clone());
            session
        };

        info!(user_id = %session.user.id, "Memory provider signed in");
        self.emit(AuthEvent::new(AuthEventKind::SignedIn, Some(session.clone())));
        Ok(session)
    }

    /// Sign out and emit `SIGNED_OUT`.
    pub fn sign_out(&self) {
        self.inner().session = None;
        self.emit(AuthEvent::signed_out());
    }

    /// Change the signed-in user's email and emit `USER_UPDATED`.
    pub fn update_email(&self, email: &str) -> Result<Session, AuthClientError> {
        let session = {
            let mut inner = self.inner();
            let session = inner.session.as_mut().ok_or(AuthClientError::NotSignedIn)?;
            session.user.email = Some(email.to_string());
            session.clone()
        };
        self.emit(AuthEvent::new(AuthEventKind::UserUpdated, Some(session.clone())));
        Ok(session)
    }

    /// Number of role lookups served so far.
    pub fn role_lookup_count(&self) -> usize {
        self.role_lookups.load(Ordering::SeqCst)
    }

    /// Make the next current-user/current-session calls fail.
    pub fn fail_session_fetch(&self, fail: bool) {
        self.inner().fail_session_fetch = fail;
    }

    /// Make role lookups fail.
    pub fn fail_role_lookups(&self, fail: bool) {
        self.inner().fail_role_lookups = fail;
    }

    /// Park role lookups for `user_id` until [`release_role_lookups`] is called.
    ///
    /// [`release_role_lookups`]: Self::release_role_lookups
    pub fn hold_role_lookups(&self, user_id: &str) {
        self.role_gates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(user_id.to_string(), Arc::new(Semaphore::new(0)));
    }

    pub fn release_role_lookups(&self, user_id: &str) {
        let gate = self
            .role_gates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(user_id);
        if let Some(gate) = gate {
            gate.close();
        }
    }

    /// Park current-user/current-session calls until released.
    pub fn hold_session_fetch(&self) {
        *self.fetch_gate.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(Arc::new(Semaphore::new(0)));
    }

    pub fn release_session_fetch(&self) {
        let gate = self
            .fetch_gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(gate) = gate {
            gate.close();
        }
    }

    fn fetch_gate(&self) -> Option<Gate> {
        self.fetch_gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn role_gate(&self, user_id: &str) -> Option<Gate> {
        self.role_gates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(user_id)
            .cloned()
    }
}

impl Default for MemoryAuthClient {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthClient for MemoryAuthClient {
    async fn current_user(&self) -> Result<Option<Identity>, AuthClientError> {
        pass(self.fetch_gate()).await;
        let inner = self.inner();
        if inner.fail_session_fetch {
            return Err(AuthClientError::Unavailable("session fetch disabled".into()));
        }
        Ok(inner.session.as_ref().map(|s| s.user.clone()))
    }

    async fn current_session(&self) -> Result<Option<Session>, AuthClientError> {
        pass(self.fetch_gate()).await;
        let inner = self.inner();
        if inner.fail_session_fetch {
            return Err(AuthClientError::Unavailable("session fetch disabled".into()));
        }
        Ok(inner.session.clone())
    }

    fn subscribe(&self) -> AuthSubscription {
        AuthSubscription::new(self.events.subscribe())
    }

    async fn query_role(&self, user_id: &str) -> Result<Option<RoleRecord>, AuthClientError> {
        self.role_lookups.fetch_add(1, Ordering::SeqCst);
        pass(self.role_gate(user_id)).await;

        let inner = self.inner();
        if inner.fail_role_lookups {
            return Err(AuthClientError::Unavailable("role lookup disabled".into()));
        }
        Ok(inner.roles.get(user_id).map(RoleRecord::new))
    }
}

impl RecordClient for MemoryAuthClient {
    async fn select(&self, query: &RecordQuery) -> Result<Vec<Value>, AuthClientError> {
        let inner = self.inner();
        Ok(inner
            .tables
            .get(query.table())
            .map(|rows| query.apply(rows))
            .unwrap_or_default())
    }

    async fn insert(&self, table: &str, mut row: Value) -> Result<Value, AuthClientError> {
        let Some(fields) = row.as_object_mut() else {
            return Err(AuthClientError::InvalidResponse(
                "rows must be JSON objects".into(),
            ));
        };

        let mut inner = self.inner();
        if !fields.contains_key("id") {
            inner.next_row_id += 1;
            fields.insert("id".to_string(), Value::from(inner.next_row_id));
        }
        inner
            .tables
            .entry(table.to_string())
            .or_default()
            .push(row.clone());
        Ok(row)
    }

    async fn delete(&self, query: &RecordQuery) -> Result<usize, AuthClientError> {
        let filters = query.filters_only();
        let mut inner = self.inner();
        let Some(rows) = inner.tables.get_mut(query.table()) else {
            return Ok(0);
        };
        let before = rows.len();
        rows.retain(|row| !filters.matches(row));
        Ok(before - rows.len())
    }

    async fn count(&self, query: &RecordQuery) -> Result<usize, AuthClientError> {
        let filters = query.filters_only();
        let inner = self.inner();
        Ok(inner
            .tables
            .get(query.table())
            .map(|rows| filters.apply(rows).len())
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::events::SubscriptionRecv;
    use serde_json::json;

    fn client_with_ada() -> MemoryAuthClient {
        let client = MemoryAuthClient::new();
        client.add_account(
            "ada@example.com",
            "hunter2",
            Identity::new("u-ada", Some("ada@example.com")),
        );
        client
    }

    #[tokio::test]
    async fn sign_in_rejects_wrong_password() {
        let client = client_with_ada();
        assert_eq!(
            client.sign_in_with_password("ada@example.com", "nope"),
            Err(AuthClientError::InvalidCredentials)
        );
        assert_eq!(client.current_user().await.unwrap(), None);
    }

    #[tokio::test]
    async fn sign_in_and_out_emit_events() {
        let client = client_with_ada();
        let mut subscription = client.subscribe();

        let session = client
            .sign_in_with_password("ADA@example.com", "hunter2")
            .unwrap();
        assert_eq!(session.user.id, "u-ada");
        assert!(session.expires_at.is_some());
        assert_eq!(client.current_user().await.unwrap().unwrap().id, "u-ada");

        client.sign_out();
        assert_eq!(client.current_session().await.unwrap(), None);

        match subscription.recv().await {
            SubscriptionRecv::Event(event) => assert_eq!(event.kind, AuthEventKind::SignedIn),
            other => panic!("unexpected {other:?}"),
        }
        match subscription.recv().await {
            SubscriptionRecv::Event(event) => {
                assert_eq!(event.kind, AuthEventKind::SignedOut);
                assert!(event.session.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn query_role_counts_lookups() {
        let client = MemoryAuthClient::new();
        client.set_role("u-1", "admin");

        assert_eq!(client.query_role("u-1").await.unwrap(), Some(RoleRecord::new("admin")));
        assert_eq!(client.query_role("u-2").await.unwrap(), None);
        assert_eq!(client.role_lookup_count(), 2);

        client.fail_role_lookups(true);
        assert!(client.query_role("u-1").await.is_err());
    }

    #[tokio::test]
    async fn held_role_lookup_waits_for_release() {
        let client = Arc::new(MemoryAuthClient::new());
        client.set_role("u-1", "admin");
        client.hold_role_lookups("u-1");

        let lookup = {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.query_role("u-1").await })
        };
        tokio::task::yield_now().await;
        assert!(!lookup.is_finished());

        client.release_role_lookups("u-1");
        let role = lookup.await.unwrap().unwrap();
        assert_eq!(role, Some(RoleRecord::new("admin")));
    }

    #[tokio::test]
    async fn records_insert_select_delete() {
        let client = MemoryAuthClient::new();
        let first = client
            .insert("events", json!({"title": "Demo Day"}))
            .await
            .unwrap();
        client
            .insert("events", json!({"title": "Pitch Night"}))
            .await
            .unwrap();
        assert_eq!(first["id"], 1);

        let all = RecordQuery::new("events");
        assert_eq!(client.count(&all).await.unwrap(), 2);

        let removed = client
            .delete(&RecordQuery::new("events").eq("id", 1))
            .await
            .unwrap();
        assert_eq!(removed, 1);

        let rows = client.select(&all).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["title"], "Pitch Night");
    }

    #[tokio::test]
    async fn insert_rejects_non_objects() {
        let client = MemoryAuthClient::new();
        assert!(client.insert("events", json!([1, 2])).await.is_err());
    }
}
