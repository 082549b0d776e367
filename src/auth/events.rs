// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Auth state change events pushed by the identity provider.
//!
//! Providers publish events on a `tokio::sync::broadcast` channel. Each
//! consumer holds an [`AuthSubscription`], which can be cancelled any number
//! of times; once cancelled it yields no further events.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::identity::{Identity, Session};

/// Default capacity of a provider's event channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Kind of auth state change.
///
/// Only `SIGNED_OUT` and `USER_UPDATED` carry special meaning for the role
/// cache; every other kind is applied as an opaque state update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthEventKind {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
    PasswordRecovery,
    #[serde(untagged)]
    Other(String),
}

impl AuthEventKind {
    /// Whether a cached admin determination must be dropped before the
    /// event's state is applied.
    pub fn invalidates_role(&self) -> bool {
        matches!(self, AuthEventKind::SignedOut | AuthEventKind::UserUpdated)
    }
}

impl fmt::Display for AuthEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthEventKind::InitialSession => write!(f, "INITIAL_SESSION"),
            AuthEventKind::SignedIn => write!(f, "SIGNED_IN"),
            AuthEventKind::SignedOut => write!(f, "SIGNED_OUT"),
            AuthEventKind::TokenRefreshed => write!(f, "TOKEN_REFRESHED"),
            AuthEventKind::UserUpdated => write!(f, "USER_UPDATED"),
            AuthEventKind::PasswordRecovery => write!(f, "PASSWORD_RECOVERY"),
            AuthEventKind::Other(kind) => write!(f, "{kind}"),
        }
    }
}

/// A single auth state change with the provider's latest session.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthEvent {
    pub kind: AuthEventKind,
    pub session: Option<Session>,
}

impl AuthEvent {
    pub fn new(kind: AuthEventKind, session: Option<Session>) -> Self {
        Self { kind, session }
    }

    pub fn signed_out() -> Self {
        Self::new(AuthEventKind::SignedOut, None)
    }

    /// Identity carried by the event's session, if any.
    pub fn identity(&self) -> Option<Identity> {
        self.session.as_ref().map(|s| s.user.clone())
    }
}

/// Outcome of waiting on a subscription.
#[derive(Debug)]
pub enum SubscriptionRecv {
    Event(AuthEvent),
    /// The consumer fell behind and `skipped` events were dropped.
    Lagged(u64),
    /// The provider went away or the subscription was cancelled.
    Closed,
}

/// Standing subscription to a provider's auth state change stream.
pub struct AuthSubscription {
    receiver: Option<broadcast::Receiver<AuthEvent>>,
}

impl AuthSubscription {
    pub fn new(receiver: broadcast::Receiver<AuthEvent>) -> Self {
        Self {
            receiver: Some(receiver),
        }
    }

    /// Wait for the next event.
    pub async fn recv(&mut self) -> SubscriptionRecv {
        let Some(receiver) = self.receiver.as_mut() else {
            return SubscriptionRecv::Closed;
        };

        match receiver.recv().await {
            Ok(event) => SubscriptionRecv::Event(event),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Auth subscription lagged");
                SubscriptionRecv::Lagged(skipped)
            }
            Err(broadcast::error::RecvError::Closed) => {
                self.receiver = None;
                SubscriptionRecv::Closed
            }
        }
    }

    /// Stop receiving events. Repeated calls are no-ops.
    pub fn unsubscribe(&mut self) {
        if self.receiver.take().is_some() {
            debug!("Auth subscription cancelled");
        }
    }

    pub fn is_active(&self) -> bool {
        self.receiver.is_some()
    }
}

impl fmt::Debug for AuthSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSubscription")
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_sign_out_and_user_update_invalidate_role() {
        assert!(AuthEventKind::SignedOut.invalidates_role());
        assert!(AuthEventKind::UserUpdated.invalidates_role());
        assert!(!AuthEventKind::SignedIn.invalidates_role());
        assert!(!AuthEventKind::TokenRefreshed.invalidates_role());
        assert!(!AuthEventKind::Other("MFA_CHALLENGE_VERIFIED".into()).invalidates_role());
    }

    #[test]
    fn unknown_kinds_deserialize_opaquely() {
        let kind: AuthEventKind = serde_json::from_str(r#""SIGNED_OUT""#).unwrap();
        assert_eq!(kind, AuthEventKind::SignedOut);

        let kind: AuthEventKind = serde_json::from_str(r#""MFA_CHALLENGE_VERIFIED""#).unwrap();
        assert_eq!(kind, AuthEventKind::Other("MFA_CHALLENGE_VERIFIED".into()));
        assert_eq!(kind.to_string(), "MFA_CHALLENGE_VERIFIED");
    }

    #[tokio::test]
    async fn unsubscribe_is_idempotent() {
        let (tx, rx) = broadcast::channel(4);
        let mut subscription = AuthSubscription::new(rx);
        assert!(subscription.is_active());

        subscription.unsubscribe();
        subscription.unsubscribe();
        assert!(!subscription.is_active());

        tx.send(AuthEvent::signed_out()).ok();
        assert!(matches!(subscription.recv().await, SubscriptionRecv::Closed));
    }

    #[tokio::test]
    async fn reports_lag() {
        let (tx, rx) = broadcast::channel(1);
        let mut subscription = AuthSubscription::new(rx);

        tx.send(AuthEvent::signed_out()).unwrap();
        tx.send(AuthEvent::signed_out()).unwrap();

        assert!(matches!(subscription.recv().await, SubscriptionRecv::Lagged(1)));
        assert!(matches!(subscription.recv().await, SubscriptionRecv::Event(_)));
    }
}
