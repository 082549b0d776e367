// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Session Module
//!
//! Client-side session state for the admin portal.
//!
//! ## Components
//!
//! - [`SessionStore`] - cached identity, session and loading flag
//! - [`RoleStore`] - cached admin determination keyed by user ID
//! - [`SessionSynchronizer`] - applies provider auth events to both stores
//! - [`AdminGuard`] - protects admin pages, memoizing role lookups
//!
//! ## Ordering
//!
//! Within one auth event the role cache is reset before the new identity is
//! written, so no reader sees a granted role next to a cleared identity.

pub mod guard;
pub mod roles;
pub mod store;
pub mod synchronizer;

pub use guard::{AdminGuard, GuardDecision, GuardState, Redirect, HOME_PATH, LOGIN_PATH};
pub use roles::{CommitOutcome, RoleCacheEntry, RoleStore};
pub use store::{SessionCacheState, SessionStore};
pub use synchronizer::{SessionSynchronizer, SynchronizerHandle};
