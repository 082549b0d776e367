// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Provider selection.
//!
//! ## Modes
//!
//! - **Hosted** (`AUTH_URL` set): [`RestAuthClient`] against the real provider
//! - **Development** (no `AUTH_URL`): [`MemoryAuthClient`] with a seeded account

use serde_json::Value;

use super::client::{AuthClient, RecordClient};
use super::error::AuthClientError;
use super::events::AuthSubscription;
use super::identity::{Identity, Session};
use super::memory::MemoryAuthClient;
use super::rest::RestAuthClient;
use super::roles::RoleRecord;
use crate::records::RecordQuery;

/// The identity provider the portal is wired to.
pub enum AuthProvider {
    Rest(RestAuthClient),
    Memory(MemoryAuthClient),
}

impl AuthProvider {
    pub fn mode(&self) -> &'static str {
        match self {
            AuthProvider::Rest(_) => "hosted",
            AuthProvider::Memory(_) => "development",
        }
    }

    /// Password sign-in; the provider emits `SIGNED_IN` on success.
    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthClientError> {
        match self {
            AuthProvider::Rest(client) => client.sign_in_with_password(email, password).await,
            AuthProvider::Memory(client) => client.sign_in_with_password(email, password),
        }
    }

    /// Sign out; the provider emits `SIGNED_OUT`.
    pub async fn sign_out(&self) -> Result<(), AuthClientError> {
        match self {
            AuthProvider::Rest(client) => client.sign_out().await,
            AuthProvider::Memory(client) => {
                client.sign_out();
                Ok(())
            }
        }
    }
}

impl From<MemoryAuthClient> for AuthProvider {
    fn from(client: MemoryAuthClient) -> Self {
        AuthProvider::Memory(client)
    }
}

impl From<RestAuthClient> for AuthProvider {
    fn from(client: RestAuthClient) -> Self {
        AuthProvider::Rest(client)
    }
}

impl AuthClient for AuthProvider {
    async fn current_user(&self) -> Result<Option<Identity>, AuthClientError> {
        match self {
            AuthProvider::Rest(client) => client.current_user().await,
            AuthProvider::Memory(client) => client.current_user().await,
        }
    }

    async fn current_session(&self) -> Result<Option<Session>, AuthClientError> {
        match self {
            AuthProvider::Rest(client) => client.current_session().await,
            AuthProvider::Memory(client) => client.current_session().await,
        }
    }

    fn subscribe(&self) -> AuthSubscription {
        match self {
            AuthProvider::Rest(client) => client.subscribe(),
            AuthProvider::Memory(client) => client.subscribe(),
        }
    }

    async fn query_role(&self, user_id: &str) -> Result<Option<RoleRecord>, AuthClientError> {
        match self {
            AuthProvider::Rest(client) => client.query_role(user_id).await,
            AuthProvider::Memory(client) => client.query_role(user_id).await,
        }
    }
}

impl RecordClient for AuthProvider {
    async fn select(&self, query: &RecordQuery) -> Result<Vec<Value>, AuthClientError> {
        match self {
            AuthProvider::Rest(client) => client.select(query).await,
            AuthProvider::Memory(client) => client.select(query).await,
        }
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value, AuthClientError> {
        match self {
            AuthProvider::Rest(client) => client.insert(table, row).await,
            AuthProvider::Memory(client) => client.insert(table, row).await,
        }
    }

    async fn delete(&self, query: &RecordQuery) -> Result<usize, AuthClientError> {
        match self {
            AuthProvider::Rest(client) => client.delete(query).await,
            AuthProvider::Memory(client) => client.delete(query).await,
        }
    }

    async fn count(&self, query: &RecordQuery) -> Result<usize, AuthClientError> {
        match self {
            AuthProvider::Rest(client) => client.count(query).await,
            AuthProvider::Memory(client) => client.count(query).await,
        }
    }
}
