// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Relational record access used by the admin pages.
//!
//! Collections live in the provider's Postgres backend and are reached
//! through the provider's REST layer (see [`crate::auth::RecordClient`]).

pub mod query;

pub use query::{RecordQuery, SortOrder};

/// Collection holding admin accounts and their role.
pub const ADMINS_TABLE: &str = "admins";
/// Collection holding events.
pub const EVENTS_TABLE: &str = "events";
/// Collection holding event registrations.
pub const REGISTRATIONS_TABLE: &str = "registrations";
