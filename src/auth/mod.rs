// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Client side of the Founders Club identity provider.
//!
//! ## Auth Flow
//!
//! 1. The operator signs in through `/auth/login`
//! 2. The provider client stores the session and publishes `SIGNED_IN`
//! 3. The session synchronizer mirrors the new identity into the session
//!    cache (see [`crate::session`])
//! 4. Admin pages resolve the identity's role from the `admins` collection:
//!    - role `user` or no row → redirect home
//!    - any other role → access granted
//!
//! ## Providers
//!
//! - [`RestAuthClient`] - hosted provider over HTTPS
//! - [`MemoryAuthClient`] - in-process provider for development and tests

pub mod client;
pub mod error;
pub mod events;
pub mod extractor;
pub mod identity;
pub mod memory;
pub mod provider;
pub mod rest;
pub mod roles;

pub use client::{AuthClient, RecordClient};
pub use error::AuthClientError;
pub use events::{AuthEvent, AuthEventKind, AuthSubscription};
pub use extractor::{AdminPage, CurrentIdentity};
pub use identity::{Identity, Session};
pub use memory::MemoryAuthClient;
pub use provider::AuthProvider;
pub use rest::RestAuthClient;
pub use roles::{Role, RoleRecord};
