// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Admin route guard.
//!
//! Every admin-only page runs [`AdminGuard::check`] before rendering. The
//! guard resolves the current identity's admin role at most once per
//! identity (memoized in the [`RoleStore`]), shares in-flight lookups between
//! concurrent activations, and fails closed on any lookup error.
//!
//! ## States
//!
//! - `Loading` - the session cache has not resolved yet
//! - `Unchecked` - no determination cached for the current identity
//! - `Checking` - a lookup for the current identity is in flight
//! - `Granted` - the current identity holds a non-`user` role
//! - `Denied` - signed out (redirect to login) or not an admin (redirect home)

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::roles::{CommitOutcome, RoleStore};
use super::store::SessionStore;
use crate::auth::{AuthClient, Identity, Role};

/// Login page for visitors without a session.
pub const LOGIN_PATH: &str = "/auth/login";
/// Landing page for signed-in visitors without admin rights.
pub const HOME_PATH: &str = "/";

/// Where a denied visitor is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Redirect {
    Login,
    Home,
}

impl Redirect {
    pub fn path(self) -> &'static str {
        match self {
            Redirect::Login => LOGIN_PATH,
            Redirect::Home => HOME_PATH,
        }
    }
}

/// Render state of the guard for the current identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Loading,
    Unchecked,
    Checking,
    Granted,
    Denied(Redirect),
}

/// Final outcome of a guard activation.
#[derive(Debug, Clone, PartialEq)]
pub enum GuardDecision {
    Granted(Identity),
    Denied(Redirect),
}

impl GuardDecision {
    pub fn is_granted(&self) -> bool {
        matches!(self, GuardDecision::Granted(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LookupOutcome {
    Resolved(bool),
    Failed,
    Stale,
}

type InFlight = watch::Receiver<Option<LookupOutcome>>;

/// Shared admin guard; clones observe the same stores and in-flight lookups.
pub struct AdminGuard<A> {
    client: Arc<A>,
    session: Arc<SessionStore>,
    roles: Arc<RoleStore>,
    in_flight: Arc<Mutex<HashMap<String, InFlight>>>,
    /// Identity whose most recent lookup failed (not cached in the role store).
    failed: Arc<Mutex<Option<String>>>,
}

impl<A> Clone for AdminGuard<A> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            session: Arc::clone(&self.session),
            roles: Arc::clone(&self.roles),
            in_flight: Arc::clone(&self.in_flight),
            failed: Arc::clone(&self.failed),
        }
    }
}

impl<A: AuthClient> AdminGuard<A> {
    pub fn new(client: Arc<A>, session: Arc<SessionStore>, roles: Arc<RoleStore>) -> Self {
        Self {
            client,
            session,
            roles,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            failed: Arc::new(Mutex::new(None)),
        }
    }

    fn in_flight(&self) -> MutexGuard<'_, HashMap<String, InFlight>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn failed(&self) -> MutexGuard<'_, Option<String>> {
        self.failed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current render state, derived from the stores without any I/O.
    pub fn state(&self) -> GuardState {
        if self.session.is_loading() {
            return GuardState::Loading;
        }
        let Some(user_id) = self.session.current_user_id() else {
            return GuardState::Denied(Redirect::Login);
        };
        match self.roles.cached_for(&user_id) {
            Some(true) => GuardState::Granted,
            Some(false) => GuardState::Denied(Redirect::Home),
            None if self.in_flight().contains_key(&user_id) => GuardState::Checking,
            None if self.failed().as_deref() == Some(user_id.as_str()) => {
                GuardState::Denied(Redirect::Home)
            }
            None => GuardState::Unchecked,
        }
    }

    /// Resolve the guard for the current identity.
    ///
    /// Waits for the session cache to load, reuses a cached determination
    /// for the same identity, and otherwise performs (or joins) a single
    /// role lookup. Lookup errors deny access.
    pub async fn check(&self) -> GuardDecision {
        self.session.wait_until_loaded().await;

        loop {
            let Some(identity) = self.session.identity() else {
                info!("Admin page requested without a session, redirecting to login");
                return GuardDecision::Denied(Redirect::Login);
            };

            if let Some(is_admin) = self.roles.cached_for(&identity.id) {
                debug!(user_id = %identity.id, is_admin, "Reusing cached admin role");
                return decide(identity, is_admin);
            }

            match self.resolve(&identity.id).await {
                LookupOutcome::Resolved(is_admin) => return decide(identity, is_admin),
                LookupOutcome::Failed => {
                    info!(user_id = %identity.id, "Role lookup failed, denying admin access");
                    return GuardDecision::Denied(Redirect::Home);
                }
                LookupOutcome::Stale => {
                    debug!(user_id = %identity.id, "Identity changed during role lookup, re-evaluating");
                }
            }
        }
    }

    /// Join the in-flight lookup for `user_id`, starting one if none exists.
    ///
    /// The lookup runs on its own task, so a caller that is dropped midway
    /// (client disconnect) leaves no half-finished state behind: the task
    /// still commits its result, clears the loading flag and removes its
    /// in-flight entry.
    async fn resolve(&self, user_id: &str) -> LookupOutcome {
        let mut receiver = {
            let mut in_flight = self.in_flight();
            match in_flight.get(user_id) {
                Some(receiver) => receiver.clone(),
                None => {
                    let (sender, receiver) = watch::channel(None);
                    in_flight.insert(user_id.to_string(), receiver.clone());
                    self.spawn_lookup(user_id.to_string(), sender);
                    receiver
                }
            }
        };

        let outcome = match receiver.wait_for(Option::is_some).await {
            Ok(outcome) => (*outcome).unwrap_or(LookupOutcome::Failed),
            Err(_) => {
                warn!(user_id, "Role lookup task ended without a result");
                LookupOutcome::Failed
            }
        };
        outcome
    }

    fn spawn_lookup(&self, user_id: String, sender: watch::Sender<Option<LookupOutcome>>) {
        let guard = self.clone();
        tokio::spawn(async move {
            let outcome = guard.lookup(&user_id).await;
            guard.in_flight().remove(&user_id);
            sender.send_replace(Some(outcome));
        });
    }

    async fn lookup(&self, user_id: &str) -> LookupOutcome {
        let generation = self.roles.generation();
        self.roles.set_loading(true);
        debug!(user_id, "Resolving admin role");

        let result = self.client.query_role(user_id).await;
        self.roles.set_loading(false);

        let is_admin = match result {
            Ok(Some(record)) => match Role::parse(&record.role) {
                Some(role) => role.grants_admin(),
                None => {
                    warn!(user_id, role = %record.role, "Ambiguous role value");
                    return self.record_failure(user_id);
                }
            },
            Ok(None) => false,
            Err(e) => {
                warn!(user_id, error = %e, "Role lookup failed");
                return self.record_failure(user_id);
            }
        };

        let current = self.session.current_user_id();
        match self
            .roles
            .commit_lookup(generation, user_id, is_admin, current.as_deref())
        {
            CommitOutcome::Committed => {
                self.failed().take_if(|failed| failed.as_str() == user_id);
                LookupOutcome::Resolved(is_admin)
            }
            outcome => {
                debug!(user_id, ?outcome, "Discarding stale role lookup result");
                LookupOutcome::Stale
            }
        }
    }

    fn record_failure(&self, user_id: &str) -> LookupOutcome {
        *self.failed() = Some(user_id.to_string());
        LookupOutcome::Failed
    }
}

fn decide(identity: Identity, is_admin: bool) -> GuardDecision {
    if is_admin {
        GuardDecision::Granted(identity)
    } else {
        info!(user_id = %identity.id, "Non-admin visitor, redirecting home");
        GuardDecision::Denied(Redirect::Home)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{MemoryAuthClient, Session};
    use crate::session::SessionSynchronizer;

    struct Fixture {
        client: Arc<MemoryAuthClient>,
        session: Arc<SessionStore>,
        roles: Arc<RoleStore>,
        guard: AdminGuard<MemoryAuthClient>,
    }

    fn ada() -> Identity {
        Identity::new("u-ada", Some("ada@example.com"))
    }

    fn bob() -> Identity {
        Identity::new("u-bob", Some("bob@example.com"))
    }

    impl Fixture {
        fn new() -> Self {
            let client = Arc::new(MemoryAuthClient::new());
            client.set_role("u-ada", "admin");
            client.set_role("u-bob", "user");
            let session = Arc::new(SessionStore::new());
            let roles = Arc::new(RoleStore::new());
            let guard = AdminGuard::new(
                Arc::clone(&client),
                Arc::clone(&session),
                Arc::clone(&roles),
            );
            Self {
                client,
                session,
                roles,
                guard,
            }
        }

        fn sign_in_locally(&self, identity: Identity) {
            let session = Session::new(identity.clone(), "token");
            self.session.replace(Some(identity), Some(session));
            self.session.set_loading(false);
        }

        async fn settle(&self) {
            for _ in 0..10 {
                tokio::task::yield_now().await;
            }
        }
    }

    #[tokio::test]
    async fn unauthenticated_visitor_is_sent_to_login() {
        let fx = Fixture::new();
        fx.session.set_loading(false);

        assert_eq!(fx.guard.check().await, GuardDecision::Denied(Redirect::Login));
        assert_eq!(fx.guard.state(), GuardState::Denied(Redirect::Login));
        assert_eq!(fx.client.role_lookup_count(), 0);
    }

    #[tokio::test]
    async fn non_admin_is_sent_home() {
        let fx = Fixture::new();
        fx.sign_in_locally(bob());

        assert_eq!(fx.guard.check().await, GuardDecision::Denied(Redirect::Home));
        assert_eq!(fx.guard.state(), GuardState::Denied(Redirect::Home));
        assert_eq!(Redirect::Home.path(), "/");
    }

    #[tokio::test]
    async fn missing_role_row_is_denied() {
        let fx = Fixture::new();
        fx.client.remove_role("u-ada");
        fx.sign_in_locally(ada());

        assert_eq!(fx.guard.check().await, GuardDecision::Denied(Redirect::Home));
    }

    #[tokio::test]
    async fn blank_role_fails_closed() {
        let fx = Fixture::new();
        fx.client.set_role("u-ada", "  ");
        fx.sign_in_locally(ada());

        assert_eq!(fx.guard.check().await, GuardDecision::Denied(Redirect::Home));
        assert_eq!(fx.roles.subject_user_id(), None);
    }

    #[tokio::test]
    async fn admin_is_granted_with_single_lookup_across_pages() {
        let fx = Fixture::new();
        fx.sign_in_locally(ada());

        assert_eq!(fx.guard.state(), GuardState::Unchecked);
        assert_eq!(fx.guard.check().await, GuardDecision::Granted(ada()));
        assert_eq!(fx.guard.clone().check().await, GuardDecision::Granted(ada()));

        assert_eq!(fx.guard.state(), GuardState::Granted);
        assert_eq!(fx.client.role_lookup_count(), 1);
    }

    #[tokio::test]
    async fn concurrent_activations_share_one_lookup() {
        let fx = Fixture::new();
        fx.sign_in_locally(ada());
        fx.client.hold_role_lookups("u-ada");

        let first = tokio::spawn({
            let guard = fx.guard.clone();
            async move { guard.check().await }
        });
        let second = tokio::spawn({
            let guard = fx.guard.clone();
            async move { guard.check().await }
        });
        fx.settle().await;
        assert_eq!(fx.guard.state(), GuardState::Checking);

        fx.client.release_role_lookups("u-ada");
        assert!(first.await.unwrap().is_granted());
        assert!(second.await.unwrap().is_granted());
        assert_eq!(fx.client.role_lookup_count(), 1);
    }

    #[tokio::test]
    async fn dropped_activation_still_settles_lookup() {
        let fx = Fixture::new();
        fx.sign_in_locally(ada());
        fx.client.hold_role_lookups("u-ada");

        let abandoned = tokio::spawn({
            let guard = fx.guard.clone();
            async move { guard.check().await }
        });
        fx.settle().await;
        assert_eq!(fx.guard.state(), GuardState::Checking);
        assert!(fx.roles.is_loading());

        // The visitor disconnects while the lookup is parked.
        abandoned.abort();
        assert!(abandoned.await.unwrap_err().is_cancelled());

        fx.client.release_role_lookups("u-ada");
        let mut roles = fx.roles.subscribe();
        roles
            .wait_for(|entry| entry.is_resolved && !entry.is_loading)
            .await
            .unwrap();

        assert_eq!(fx.guard.state(), GuardState::Granted);
        assert!(!fx.roles.is_loading());
        assert!(fx.guard.in_flight().is_empty());

        assert!(fx.guard.check().await.is_granted());
        assert_eq!(fx.client.role_lookup_count(), 1);
    }

    #[tokio::test]
    async fn lookup_error_fails_closed_and_is_retried() {
        let fx = Fixture::new();
        fx.sign_in_locally(ada());
        fx.client.fail_role_lookups(true);

        assert_eq!(fx.guard.check().await, GuardDecision::Denied(Redirect::Home));
        assert_eq!(fx.guard.state(), GuardState::Denied(Redirect::Home));
        assert_eq!(fx.roles.subject_user_id(), None);

        fx.client.fail_role_lookups(false);
        assert_eq!(fx.guard.check().await, GuardDecision::Granted(ada()));
        assert_eq!(fx.client.role_lookup_count(), 2);
    }

    #[tokio::test]
    async fn identity_change_invalidates_granted_state() {
        let fx = Fixture::new();
        fx.sign_in_locally(ada());
        assert!(fx.guard.check().await.is_granted());

        fx.sign_in_locally(bob());
        assert_eq!(fx.guard.state(), GuardState::Unchecked);
        assert_eq!(fx.guard.check().await, GuardDecision::Denied(Redirect::Home));
        assert_eq!(fx.client.role_lookup_count(), 2);
    }

    #[tokio::test]
    async fn late_result_for_previous_identity_is_discarded() {
        let fx = Fixture::new();
        fx.sign_in_locally(ada());
        fx.client.hold_role_lookups("u-ada");

        let ada_check = tokio::spawn({
            let guard = fx.guard.clone();
            async move { guard.check().await }
        });
        fx.settle().await;

        // Bob replaces Ada while her lookup is parked; his completes first.
        fx.sign_in_locally(bob());
        assert_eq!(fx.guard.check().await, GuardDecision::Denied(Redirect::Home));

        fx.client.release_role_lookups("u-ada");
        let late = ada_check.await.unwrap();

        assert_eq!(late, GuardDecision::Denied(Redirect::Home));
        assert_eq!(fx.roles.subject_user_id().as_deref(), Some("u-bob"));
        assert!(!fx.roles.is_admin());
        assert_eq!(fx.roles.cached_for("u-ada"), None);
    }

    #[tokio::test]
    async fn check_waits_for_session_to_load() {
        let fx = Fixture::new();
        assert_eq!(fx.guard.state(), GuardState::Loading);

        let pending = tokio::spawn({
            let guard = fx.guard.clone();
            async move { guard.check().await }
        });
        fx.settle().await;
        assert!(!pending.is_finished());

        fx.sign_in_locally(ada());
        assert!(pending.await.unwrap().is_granted());
    }

    #[tokio::test]
    async fn sign_out_clears_role_before_next_activation() {
        let fx = Fixture::new();
        fx.client.add_account("ada@example.com", "pw", ada());
        fx.client.sign_in_with_password("ada@example.com", "pw").unwrap();

        let mut sync = SessionSynchronizer::new(
            Arc::clone(&fx.client),
            Arc::clone(&fx.session),
            Arc::clone(&fx.roles),
        )
        .spawn();

        assert!(fx.guard.check().await.is_granted());
        assert_eq!(fx.client.role_lookup_count(), 1);

        let mut receiver = fx.session.subscribe();
        receiver.borrow_and_update();
        fx.client.sign_out();
        receiver.changed().await.unwrap();

        assert_eq!(fx.roles.subject_user_id(), None);
        assert_eq!(fx.guard.check().await, GuardDecision::Denied(Redirect::Login));

        // Signing back in requires a fresh lookup.
        fx.client.sign_in_with_password("ada@example.com", "pw").unwrap();
        receiver.changed().await.unwrap();
        assert!(fx.guard.check().await.is_granted());
        assert_eq!(fx.client.role_lookup_count(), 2);

        sync.shutdown().await.unwrap();
    }
}
