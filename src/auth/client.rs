// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Seams to the remote identity provider and its relational backend.

use std::future::Future;

use serde_json::Value;

use super::error::AuthClientError;
use super::events::AuthSubscription;
use super::identity::{Identity, Session};
use super::roles::RoleRecord;
use crate::records::RecordQuery;

/// Remote identity provider.
///
/// Network failures on `current_user` / `current_session` are reported as
/// errors; callers that need a "null user" fallback apply it themselves.
pub trait AuthClient: Send + Sync + 'static {
    /// Currently authenticated user, or `None` when signed out.
    fn current_user(&self) -> impl Future<Output = Result<Option<Identity>, AuthClientError>> + Send;

    /// Currently active session, or `None` when signed out.
    fn current_session(
        &self,
    ) -> impl Future<Output = Result<Option<Session>, AuthClientError>> + Send;

    /// Open a standing subscription to auth state changes.
    fn subscribe(&self) -> AuthSubscription;

    /// Role row for `user_id` in the admin collection, `None` if absent.
    fn query_role(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<Option<RoleRecord>, AuthClientError>> + Send;
}

/// Generic record API over the provider's relational backend.
///
/// Every call either returns rows or fails with the backend error.
pub trait RecordClient: Send + Sync + 'static {
    fn select(
        &self,
        query: &RecordQuery,
    ) -> impl Future<Output = Result<Vec<Value>, AuthClientError>> + Send;

    /// Insert one row and return it as stored.
    fn insert(
        &self,
        table: &str,
        row: Value,
    ) -> impl Future<Output = Result<Value, AuthClientError>> + Send;

    /// Delete rows matching the query's filters; returns how many were removed.
    fn delete(
        &self,
        query: &RecordQuery,
    ) -> impl Future<Output = Result<usize, AuthClientError>> + Send;

    /// Number of rows matching the query's filters.
    fn count(
        &self,
        query: &RecordQuery,
    ) -> impl Future<Output = Result<usize, AuthClientError>> + Send;
}
