// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Founders Club Admin Portal - Session & Role Synchronization
//!
//! This crate keeps a process-local session cache consistent with a remote
//! identity provider and guards admin-only pages behind a memoized role
//! lookup.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Identity provider clients and request extractors
//! - `records` - Relational record queries (events, registrations, admins)
//! - `session` - Session cache, role cache, synchronizer and admin guard

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod records;
pub mod session;
pub mod state;
