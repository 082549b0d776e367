// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Admin roles stored in the relational backend.

use serde::{Deserialize, Serialize};

/// Role row returned by the `admins` collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRecord {
    pub role: String,
}

impl RoleRecord {
    pub fn new(role: impl Into<String>) -> Self {
        Self { role: role.into() }
    }
}

/// Authorization tier of an identity.
///
/// ## Role Hierarchy
///
/// - `SuperAdmin` - Manages other admin accounts
/// - `Admin` - Full access to the admin area
/// - `Staff` - Any other non-`user` tier defined in the backend
/// - `User` - Ordinary member, no admin access
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    SuperAdmin,
    Admin,
    Staff(String),
    User,
}

impl Role {
    /// Parse a role string (case-insensitive).
    ///
    /// Returns `None` for blank values; those are ambiguous and must be
    /// treated as "no role" by callers.
    pub fn parse(s: &str) -> Option<Role> {
        let normalized = s.trim().to_lowercase();
        match normalized.as_str() {
            "" => None,
            "user" => Some(Role::User),
            "admin" => Some(Role::Admin),
            "superadmin" | "super_admin" => Some(Role::SuperAdmin),
            _ => Some(Role::Staff(normalized)),
        }
    }

    /// Every tier other than `user` may enter the admin area.
    pub fn grants_admin(&self) -> bool {
        !matches!(self, Role::User)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::SuperAdmin => write!(f, "superadmin"),
            Role::Admin => write!(f, "admin"),
            Role::Staff(name) => write!(f, "{name}"),
            Role::User => write!(f, "user"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(Role::parse("admin"), Some(Role::Admin));
        assert_eq!(Role::parse("ADMIN"), Some(Role::Admin));
        assert_eq!(Role::parse(" User "), Some(Role::User));
        assert_eq!(Role::parse("SuperAdmin"), Some(Role::SuperAdmin));
    }

    #[test]
    fn blank_role_is_ambiguous() {
        assert_eq!(Role::parse(""), None);
        assert_eq!(Role::parse("   "), None);
    }

    #[test]
    fn only_user_is_denied() {
        assert!(!Role::User.grants_admin());
        assert!(Role::Admin.grants_admin());
        assert!(Role::SuperAdmin.grants_admin());
        assert!(Role::parse("editor").unwrap().grants_admin());
    }

    #[test]
    fn display_round_trips_through_parse() {
        for role in [Role::Admin, Role::SuperAdmin, Role::User, Role::Staff("editor".into())] {
            assert_eq!(Role::parse(&role.to_string()), Some(role));
        }
    }
}
