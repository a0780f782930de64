//! In-progress signups, keyed by user.
//!
//! Entries carry a maximum age and are evicted on access once expired, by
//! the periodic sweeper, or on shutdown. Each user also gets a mutual
//! exclusion token so that duplicate interactions for the same user run one
//! after the other instead of racing.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use poise::serenity_prelude::UserId;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

use crate::error::SignupError;
use crate::onboarding::types::{Grade, ServerNumber};

/// Where a pending signup currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignupStage {
    GradeChosen,
    ServerChosen,
}

/// Selections made so far by one user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSignup {
    pub grade: Grade,
    pub server: Option<ServerNumber>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PendingSignup {
    fn new(grade: Grade, now: DateTime<Utc>) -> Self {
        Self {
            grade,
            server: None,
            started_at: now,
            updated_at: now,
        }
    }

    pub fn stage(&self) -> SignupStage {
        match self.server {
            None => SignupStage::GradeChosen,
            Some(_) => SignupStage::ServerChosen,
        }
    }

    fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.started_at >= ttl
    }
}

/// Held for the duration of one transition for one user
pub type UserGuard = OwnedMutexGuard<()>;

pub struct SessionStore {
    entries: DashMap<UserId, PendingSignup>,
    locks: DashMap<UserId, Arc<Mutex<()>>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: std::time::Duration) -> Self {
        Self {
            entries: DashMap::new(),
            locks: DashMap::new(),
            ttl: Duration::from_std(ttl).unwrap_or_else(|_| Duration::minutes(10)),
        }
    }

    /// Wait for and take the user's transition token
    pub async fn lock_user(&self, user_id: UserId) -> UserGuard {
        // Clone the Arc out so no map shard stays locked across the await
        let lock = self
            .locks
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();
        lock.lock_owned().await
    }

    /// Start (or restart) a signup with the chosen grade
    pub fn choose_grade(&self, user_id: UserId, grade: Grade) {
        self.choose_grade_at(user_id, grade, Utc::now());
    }

    fn choose_grade_at(&self, user_id: UserId, grade: Grade, now: DateTime<Utc>) {
        self.entries.insert(user_id, PendingSignup::new(grade, now));
        debug!("User {} chose grade {}", user_id, grade);
    }

    /// Record the server choice on an existing signup
    pub fn choose_server(
        &self,
        user_id: UserId,
        server: ServerNumber,
    ) -> Result<PendingSignup, SignupError> {
        self.choose_server_at(user_id, server, Utc::now())
    }

    fn choose_server_at(
        &self,
        user_id: UserId,
        server: ServerNumber,
        now: DateTime<Utc>,
    ) -> Result<PendingSignup, SignupError> {
        self.evict_if_expired(user_id, now)?;
        let mut entry = self
            .entries
            .get_mut(&user_id)
            .ok_or(SignupError::SessionExpired)?;
        entry.server = Some(server);
        entry.updated_at = now;
        debug!("User {} chose server {}", user_id, server);
        Ok(entry.value().clone())
    }

    /// Current selections, if the signup is still live
    pub fn get(&self, user_id: UserId) -> Option<PendingSignup> {
        self.get_at(user_id, Utc::now())
    }

    fn get_at(&self, user_id: UserId, now: DateTime<Utc>) -> Option<PendingSignup> {
        self.evict_if_expired(user_id, now).ok()?;
        self.entries.get(&user_id).map(|e| e.value().clone())
    }

    /// Remove and return the signup; the caller completes it
    pub fn take(&self, user_id: UserId) -> Result<PendingSignup, SignupError> {
        self.take_at(user_id, Utc::now())
    }

    fn take_at(&self, user_id: UserId, now: DateTime<Utc>) -> Result<PendingSignup, SignupError> {
        self.evict_if_expired(user_id, now)?;
        self.entries
            .remove(&user_id)
            .map(|(_, entry)| entry)
            .ok_or(SignupError::MissingSelection)
    }

    /// Put a taken signup back, keeping its original start time
    pub fn restore(&self, user_id: UserId, entry: PendingSignup) {
        self.entries.insert(user_id, entry);
    }

    pub fn discard(&self, user_id: UserId) {
        if self.entries.remove(&user_id).is_some() {
            debug!("Discarded pending signup for user {}", user_id);
        }
    }

    /// Number of signups in progress (expired ones included until swept)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop expired signups and idle lock tokens. Returns how many signups
    /// were evicted.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Utc::now())
    }

    fn sweep_at(&self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| !e.is_expired(now, self.ttl));
        let evicted = before.saturating_sub(self.entries.len());

        // A token only referenced by the map is not held by anyone
        self.locks
            .retain(|id, lock| Arc::strong_count(lock) > 1 || self.entries.contains_key(id));

        evicted
    }

    /// Forget everything (process shutdown)
    pub fn clear(&self) {
        self.entries.clear();
        self.locks.clear();
    }

    fn evict_if_expired(&self, user_id: UserId, now: DateTime<Utc>) -> Result<(), SignupError> {
        let expired = self
            .entries
            .remove_if(&user_id, |_, e| e.is_expired(now, self.ttl))
            .is_some();
        if expired {
            debug!("Pending signup for user {} expired", user_id);
            return Err(SignupError::SessionExpired);
        }
        Ok(())
    }
}

/// Shared session store type
pub type SharedSessionStore = Arc<SessionStore>;

pub fn create_session_store(ttl: std::time::Duration) -> SharedSessionStore {
    Arc::new(SessionStore::new(ttl))
}

/// Periodically evict abandoned signups
pub fn spawn_session_sweeper(
    store: SharedSessionStore,
    every: std::time::Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let evicted = store.sweep();
            if evicted > 0 {
                info!(
                    "Evicted {} abandoned signup(s), {} still in progress",
                    evicted,
                    store.len()
                );
            }
        }
    })
}
