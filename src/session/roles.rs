// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Process-local admin-role cache.
//!
//! The cache holds a single determination keyed by the user it was computed
//! for. An entry is only trustworthy while its subject matches the live
//! identity; callers go through [`RoleStore::cached_for`] for that check.

use serde::Serialize;
use tokio::sync::watch;
use tracing::debug;

/// Cached admin determination.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RoleCacheEntry {
    /// User the determination belongs to; `None` until a lookup completes.
    pub subject_user_id: Option<String>,
    pub is_admin: bool,
    pub is_resolved: bool,
    pub is_loading: bool,
    /// Incremented by every [`RoleStore::reset`].
    pub generation: u64,
}

/// Why a lookup result was not written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed,
    /// The store was reset while the lookup was in flight.
    Invalidated,
    /// The identity changed while the lookup was in flight.
    SubjectChanged,
}

/// Shared role cache.
pub struct RoleStore {
    entry: watch::Sender<RoleCacheEntry>,
}

impl RoleStore {
    pub fn new() -> Self {
        let (entry, _) = watch::channel(RoleCacheEntry::default());
        Self { entry }
    }

    pub fn set_resolved(&self, is_admin: bool, subject_user_id: Option<String>) {
        self.entry.send_modify(|entry| {
            entry.is_admin = is_admin;
            entry.is_resolved = subject_user_id.is_some();
            entry.subject_user_id = subject_user_id;
        });
    }

    pub fn set_loading(&self, loading: bool) {
        self.entry.send_if_modified(|entry| {
            let changed = entry.is_loading != loading;
            entry.is_loading = loading;
            changed
        });
    }

    /// Forget the cached determination; the next consumer re-resolves.
    pub fn reset(&self) {
        self.entry.send_modify(|entry| {
            entry.subject_user_id = None;
            entry.is_admin = false;
            entry.is_resolved = false;
            entry.is_loading = false;
            entry.generation += 1;
        });
        debug!("Role cache reset");
    }

    /// Cached `is_admin` for `user_id`, if the entry belongs to that user.
    pub fn cached_for(&self, user_id: &str) -> Option<bool> {
        let entry = self.entry.borrow();
        (entry.is_resolved && entry.subject_user_id.as_deref() == Some(user_id))
            .then_some(entry.is_admin)
    }

    /// Write a lookup result unless it went stale while in flight.
    ///
    /// `generation` is the value observed when the lookup started;
    /// `current_user_id` is the live identity at commit time.
    pub fn commit_lookup(
        &self,
        generation: u64,
        subject_user_id: &str,
        is_admin: bool,
        current_user_id: Option<&str>,
    ) -> CommitOutcome {
        let mut outcome = CommitOutcome::Committed;
        self.entry.send_if_modified(|entry| {
            if entry.generation != generation {
                outcome = CommitOutcome::Invalidated;
                return false;
            }
            if current_user_id != Some(subject_user_id) {
                outcome = CommitOutcome::SubjectChanged;
                return false;
            }
            entry.subject_user_id = Some(subject_user_id.to_string());
            entry.is_admin = is_admin;
            entry.is_resolved = true;
            true
        });
        outcome
    }

    pub fn generation(&self) -> u64 {
        self.entry.borrow().generation
    }

    pub fn is_admin(&self) -> bool {
        self.entry.borrow().is_admin
    }

    pub fn is_loading(&self) -> bool {
        self.entry.borrow().is_loading
    }

    pub fn subject_user_id(&self) -> Option<String> {
        self.entry.borrow().subject_user_id.clone()
    }

    pub fn snapshot(&self) -> RoleCacheEntry {
        self.entry.borrow().clone()
    }

    /// Receiver notified on every mutation.
    pub fn subscribe(&self) -> watch::Receiver<RoleCacheEntry> {
        self.entry.subscribe()
    }
}

impl Default for RoleStore {
    fn default() -> Self {
        Self::new()
    }
}
