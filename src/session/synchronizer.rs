// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Session Synchronizer
//!
//! Background task bridging the provider's auth event stream to the
//! [`SessionStore`] and [`RoleStore`].
//!
//! ## Strategy
//!
//! 1. Mark the session store as loading and fetch the current user and
//!    session concurrently.
//! 2. At the same time consume the provider's auth events. `SIGNED_OUT` and
//!    `USER_UPDATED` reset the role cache before the event's identity is
//!    written.
//! 3. An event applied while the initial fetch is still in flight supersedes
//!    that fetch: the fetch result is dropped, only `is_loading` is cleared.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken`. Once [`SynchronizerHandle::shutdown`]
//! returns, the task has exited and no further store writes can happen.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::roles::RoleStore;
use super::store::SessionStore;
use crate::auth::events::{AuthEvent, SubscriptionRecv};
use crate::auth::{AuthClient, AuthClientError, Identity, Session};

type InitialFetch = (
    Result<Option<Identity>, AuthClientError>,
    Result<Option<Session>, AuthClientError>,
);

/// Keeps the session and role caches consistent with the provider.
pub struct SessionSynchronizer<A> {
    client: Arc<A>,
    session: Arc<SessionStore>,
    roles: Arc<RoleStore>,
}

impl<A: AuthClient> SessionSynchronizer<A> {
    pub fn new(client: Arc<A>, session: Arc<SessionStore>, roles: Arc<RoleStore>) -> Self {
        Self {
            client,
            session,
            roles,
        }
    }

    /// Spawn the synchronizer as a background task.
    pub fn spawn(self) -> SynchronizerHandle {
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(self.run(shutdown.clone()));
        SynchronizerHandle {
            shutdown,
            task: Some(task),
        }
    }

    /// Run until the cancellation token is triggered or the provider closes
    /// its event stream.
    ///
    /// Should be spawned as a background task:
    /// ```rust,ignore
    /// tokio::spawn(synchronizer.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!("Session synchronizer starting");

        // Subscribe before fetching so no event between the two is lost.
        let mut subscription = self.client.subscribe();
        self.session.set_loading(true);

        let client = Arc::clone(&self.client);
        let initial = async move { tokio::join!(client.current_user(), client.current_session()) };
        tokio::pin!(initial);
        let mut seeded = false;
        let mut superseded = false;

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => break,

                fetched = &mut initial, if !seeded => {
                    seeded = true;
                    self.finish_initial(fetched, superseded);
                }

                received = subscription.recv() => match received {
                    SubscriptionRecv::Event(event) => {
                        self.apply_event(event);
                        superseded = !seeded;
                    }
                    SubscriptionRecv::Lagged(skipped) => {
                        warn!(skipped, "Missed auth events, resynchronizing");
                        self.resync().await;
                        superseded = !seeded;
                    }
                    SubscriptionRecv::Closed => {
                        info!("Auth event stream closed");
                        if !seeded {
                            let fetched = (&mut initial).await;
                            self.finish_initial(fetched, superseded);
                        }
                        break;
                    }
                },
            }
        }

        subscription.unsubscribe();
        info!("Session synchronizer stopped");
    }

    fn finish_initial(&self, fetched: InitialFetch, superseded: bool) {
        if superseded {
            debug!("Initial session fetch superseded by an auth event");
            self.session.set_loading(false);
        } else {
            self.apply_initial(fetched);
        }
    }

    fn apply_initial(&self, (user, session): InitialFetch) {
        match (user, session) {
            (Ok(user), Ok(session)) => {
                debug!(user_id = ?user.as_ref().map(|u| &u.id), "Initial session resolved");
                self.session.replace(user, session);
            }
            (user, session) => {
                let error = user.err().or(session.err());
                warn!(error = ?error, "Initial session fetch failed, treating as signed out");
                self.session.replace(None, None);
            }
        }
        self.session.set_loading(false);
    }

    /// Apply one auth event. The role reset, when required, is visible
    /// before the identity write.
    fn apply_event(&self, event: AuthEvent) {
        debug!(event = %event.kind, "Applying auth event");
        if event.kind.invalidates_role() {
            self.roles.reset();
        }
        let identity = event.identity();
        self.session.replace(identity, event.session);
    }

    /// After missed events, any of them may have been a sign-out: drop the
    /// role cache and re-read the provider's state.
    async fn resync(&self) {
        self.roles.reset();
        let fetched = tokio::join!(self.client.current_user(), self.client.current_session());
        match fetched {
            (Ok(user), Ok(session)) => self.session.replace(user, session),
            (user, session) => {
                let error = user.err().or(session.err());
                warn!(error = ?error, "Resync failed, treating as signed out");
                self.session.replace(None, None);
            }
        }
    }
}

/// Handle to a spawned [`SessionSynchronizer`].
pub struct SynchronizerHandle {
    shutdown: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl SynchronizerHandle {
    /// Cancel the synchronizer and wait for it to stop. Safe to call more
    /// than once; later calls return immediately.
    pub async fn shutdown(&mut self) -> Result<(), tokio::task::JoinError> {
        self.shutdown.cancel();
        match self.task.take() {
            Some(task) => task.await,
            None => Ok(()),
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for SynchronizerHandle {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
