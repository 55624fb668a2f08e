//! Store of record for users and analytics events
//!
//! In-memory tables guarded by a `parking_lot` RwLock, with append-only
//! JSONL persistence per event kind. Events are never updated or deleted;
//! all history is replayed from the logs at startup.
//!
//! This is the durable layer the cache accelerates. It has no cross-process
//! coherency and no guarantees beyond what the JSONL files provide.

mod persist;
mod query;

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use chrono::Utc;
use parking_lot::RwLock;
use serde_json::Value;

use crate::types::{ActivityEvent, ApiUsageEvent, HttpMethod, PageViewEvent, User};
use crate::validation::{ActivityRecord, PageViewRecord};

/// Configuration for the record store
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Path to the data directory
    pub data_dir: PathBuf,
    /// Disable to keep everything in memory (tests, ephemeral runs)
    pub persist: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            persist: true,
        }
    }
}

impl StoreConfig {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            persist: true,
        }
    }

    pub fn activities_path(&self) -> PathBuf {
        self.data_dir.join("activities.jsonl")
    }

    pub fn page_views_path(&self) -> PathBuf {
        self.data_dir.join("page_views.jsonl")
    }

    pub fn api_usage_path(&self) -> PathBuf {
        self.data_dir.join("api_usage.jsonl")
    }

    pub fn users_path(&self) -> PathBuf {
        self.data_dir.join("users.jsonl")
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in store operations
#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    Json(serde_json::Error),
    UnknownUser(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Io(e) => write!(f, "IO error: {}", e),
            StoreError::Json(e) => write!(f, "JSON error: {}", e),
            StoreError::UnknownUser(id) => write!(f, "Unknown user: {}", id),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Json(e)
    }
}

#[derive(Debug, Default)]
pub(crate) struct StoreInner {
    pub(crate) users: HashMap<String, User>,
    pub(crate) activities: Vec<ActivityEvent>,
    pub(crate) page_views: Vec<PageViewEvent>,
    pub(crate) api_usage: Vec<ApiUsageEvent>,
    /// Next event/user sequence number; ids double as cursors
    pub(crate) next_id: u64,
}

impl StoreInner {
    fn take_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

/// The store of record
#[derive(Debug)]
pub struct RecordStore {
    config: StoreConfig,
    pub(crate) inner: RwLock<StoreInner>,
}

impl RecordStore {
    /// Open (or create) a persistent store and replay its logs
    pub fn open(config: StoreConfig) -> StoreResult<Self> {
        let mut inner = StoreInner {
            next_id: 1,
            ..Default::default()
        };
        if config.persist {
            std::fs::create_dir_all(&config.data_dir)?;
            persist::load(&config, &mut inner)?;
        }
        Ok(Self {
            config,
            inner: RwLock::new(inner),
        })
    }

    /// In-memory store for tests and ephemeral runs
    pub fn in_memory() -> Self {
        Self {
            config: StoreConfig {
                data_dir: PathBuf::new(),
                persist: false,
            },
            inner: RwLock::new(StoreInner {
                next_id: 1,
                ..Default::default()
            }),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    // ---- users ----

    /// Create a user; the caller supplies a pre-hashed password if any
    pub fn create_user(
        &self,
        email: &str,
        name: Option<&str>,
        password_hash: Option<&str>,
    ) -> StoreResult<User> {
        let user = {
            let mut inner = self.inner.write();
            let id = format!("usr_{:06}", inner.take_id());
            let user = User {
                id,
                email: email.to_string(),
                name: name.map(str::to_string),
                password_hash: password_hash.map(str::to_string),
                created_at: Utc::now(),
            };
            inner.users.insert(user.id.clone(), user.clone());
            user
        };
        if self.config.persist {
            persist::append(&self.config.users_path(), &user)?;
        }
        Ok(user)
    }

    /// Return the user with this email, creating one if absent
    pub fn ensure_user(
        &self,
        email: &str,
        name: Option<&str>,
        password_hash: Option<&str>,
    ) -> StoreResult<User> {
        if let Some(user) = self.find_user_by_email(email) {
            return Ok(user);
        }
        self.create_user(email, name, password_hash)
    }

    pub fn user_exists(&self, user_id: &str) -> bool {
        self.inner.read().users.contains_key(user_id)
    }

    pub fn get_user(&self, user_id: &str) -> Option<User> {
        self.inner.read().users.get(user_id).cloned()
    }

    pub fn find_user_by_email(&self, email: &str) -> Option<User> {
        self.inner
            .read()
            .users
            .values()
            .find(|u| u.email == email)
            .cloned()
    }

    /// One lookup for a whole set of candidate user ids
    pub fn existing_user_ids<'a, I>(&self, ids: I) -> HashSet<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let inner = self.inner.read();
        ids.into_iter()
            .filter(|id| inner.users.contains_key(*id))
            .map(str::to_string)
            .collect()
    }

    // ---- single inserts ----

    /// Persist one activity event. The caller must have checked the user
    /// exists; unknown users get `StoreError::UnknownUser`.
    pub fn insert_activity(
        &self,
        user_id: &str,
        action: &str,
        metadata: Option<Value>,
    ) -> StoreResult<ActivityEvent> {
        let event = {
            let mut inner = self.inner.write();
            if !inner.users.contains_key(user_id) {
                return Err(StoreError::UnknownUser(user_id.to_string()));
            }
            let event = ActivityEvent {
                id: inner.take_id(),
                user_id: user_id.to_string(),
                action: action.to_string(),
                metadata,
                created_at: Utc::now(),
            };
            inner.activities.push(event.clone());
            event
        };
        if self.config.persist {
            persist::append(&self.config.activities_path(), &event)?;
        }
        Ok(event)
    }

    /// Persist one page view; `user_id` should already be resolved to a
    /// known user or `None`
    pub fn insert_page_view(
        &self,
        page: &str,
        user_id: Option<&str>,
        user_agent: Option<&str>,
        ip: Option<&str>,
    ) -> StoreResult<PageViewEvent> {
        let event = {
            let mut inner = self.inner.write();
            let event = PageViewEvent {
                id: inner.take_id(),
                page: page.to_string(),
                user_id: user_id.map(str::to_string),
                user_agent: user_agent.map(str::to_string),
                ip: ip.map(str::to_string),
                created_at: Utc::now(),
            };
            inner.page_views.push(event.clone());
            event
        };
        if self.config.persist {
            persist::append(&self.config.page_views_path(), &event)?;
        }
        Ok(event)
    }

    /// Persist one API usage event
    pub fn insert_api_usage(
        &self,
        user_id: &str,
        endpoint: &str,
        method: HttpMethod,
        status: u16,
        duration_ms: u32,
    ) -> StoreResult<ApiUsageEvent> {
        let event = {
            let mut inner = self.inner.write();
            if !inner.users.contains_key(user_id) {
                return Err(StoreError::UnknownUser(user_id.to_string()));
            }
            let event = ApiUsageEvent {
                id: inner.take_id(),
                user_id: user_id.to_string(),
                endpoint: endpoint.to_string(),
                method,
                status,
                duration_ms,
                created_at: Utc::now(),
            };
            inner.api_usage.push(event.clone());
            event
        };
        if self.config.persist {
            persist::append(&self.config.api_usage_path(), &event)?;
        }
        Ok(event)
    }

    // ---- batch inserts ----

    /// Bulk-insert page views with duplicate-skip semantics
    ///
    /// `user_id`s must already be resolved (unknown users nulled out by
    /// the writer). Rows identical to an earlier row in the same batch are
    /// skipped. Returns the count actually inserted.
    pub fn insert_page_views(&self, rows: &[PageViewRecord]) -> StoreResult<u64> {
        let mut seen = HashSet::new();
        let mut events = Vec::with_capacity(rows.len());
        {
            let mut inner = self.inner.write();
            for row in rows {
                let fingerprint = format!(
                    "{}|{}|{}|{}",
                    row.page,
                    row.user_id.as_deref().unwrap_or(""),
                    row.user_agent.as_deref().unwrap_or(""),
                    row.ip.as_deref().unwrap_or("")
                );
                if !seen.insert(fingerprint) {
                    continue;
                }
                let event = PageViewEvent {
                    id: inner.take_id(),
                    page: row.page.clone(),
                    user_id: row.user_id.clone(),
                    user_agent: row.user_agent.clone(),
                    ip: row.ip.clone(),
                    created_at: Utc::now(),
                };
                inner.page_views.push(event.clone());
                events.push(event);
            }
        }
        if self.config.persist {
            persist::append_all(&self.config.page_views_path(), &events)?;
        }
        Ok(events.len() as u64)
    }

    /// Bulk-insert activities with duplicate-skip semantics
    ///
    /// All rows must reference known users; the writer filters beforehand.
    pub fn insert_activities(&self, rows: &[ActivityRecord]) -> StoreResult<u64> {
        let mut seen = HashSet::new();
        let mut events = Vec::with_capacity(rows.len());
        {
            let mut inner = self.inner.write();
            for row in rows {
                let fingerprint = format!(
                    "{}|{}|{}",
                    row.user_id,
                    row.action,
                    row.metadata
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_default()
                );
                if !seen.insert(fingerprint) {
                    continue;
                }
                let event = ActivityEvent {
                    id: inner.take_id(),
                    user_id: row.user_id.clone(),
                    action: row.action.clone(),
                    metadata: row.metadata.clone(),
                    created_at: Utc::now(),
                };
                inner.activities.push(event.clone());
                events.push(event);
            }
        }
        if self.config.persist {
            persist::append_all(&self.config.activities_path(), &events)?;
        }
        Ok(events.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store_with_user() -> (RecordStore, User) {
        let store = RecordStore::in_memory();
        let user = store.create_user("alice@example.com", Some("Alice"), None).unwrap();
        (store, user)
    }

    #[test]
    fn test_create_and_find_user() {
        let (store, user) = store_with_user();

        assert!(store.user_exists(&user.id));
        assert!(!store.user_exists("usr_999999"));
        assert_eq!(
            store.find_user_by_email("alice@example.com").unwrap().id,
            user.id
        );
    }

    #[test]
    fn test_ensure_user_is_idempotent() {
        let store = RecordStore::in_memory();
        let a = store.ensure_user("a@example.com", None, None).unwrap();
        let b = store.ensure_user("a@example.com", Some("A"), None).unwrap();

        assert_eq!(a.id, b.id);
    }

    #[test]
    fn test_insert_activity_rejects_unknown_user() {
        let store = RecordStore::in_memory();
        let err = store.insert_activity("usr_000042", "login", None).unwrap_err();

        assert!(matches!(err, StoreError::UnknownUser(_)));
    }

    #[test]
    fn test_insert_activity_assigns_increasing_ids() {
        let (store, user) = store_with_user();
        let a = store.insert_activity(&user.id, "login", None).unwrap();
        let b = store.insert_activity(&user.id, "logout", None).unwrap();

        assert!(b.id > a.id);
    }

    #[test]
    fn test_existing_user_ids_set_lookup() {
        let (store, user) = store_with_user();
        let other = store.create_user("bob@example.com", None, None).unwrap();

        let found =
            store.existing_user_ids([user.id.as_str(), other.id.as_str(), "usr_nope"]);
        assert_eq!(found.len(), 2);
        assert!(found.contains(&user.id));
        assert!(!found.contains("usr_nope"));
    }

    #[test]
    fn test_batch_activities_skips_duplicates() {
        let (store, user) = store_with_user();
        let row = ActivityRecord {
            user_id: user.id.clone(),
            action: "export".to_string(),
            metadata: Some(json!({"k": 1})),
        };

        let inserted = store
            .insert_activities(&[row.clone(), row.clone()])
            .unwrap();
        assert_eq!(inserted, 1);
    }

    #[test]
    fn test_batch_page_views_counts_inserted() {
        let store = RecordStore::in_memory();
        let rows = vec![
            PageViewRecord {
                page: "/a".to_string(),
                user_id: None,
                user_agent: None,
                ip: None,
            },
            PageViewRecord {
                page: "/b".to_string(),
                user_id: None,
                user_agent: None,
                ip: None,
            },
        ];

        assert_eq!(store.insert_page_views(&rows).unwrap(), 2);
    }

    #[test]
    fn test_persistence_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::new(dir.path());

        let user_id = {
            let store = RecordStore::open(config.clone()).unwrap();
            let user = store.create_user("a@example.com", None, None).unwrap();
            store.insert_activity(&user.id, "login", None).unwrap();
            store
                .insert_page_view("/home", Some(&user.id), None, None)
                .unwrap();
            user.id
        };

        let reopened = RecordStore::open(config).unwrap();
        assert!(reopened.user_exists(&user_id));
        let inner = reopened.inner.read();
        assert_eq!(inner.activities.len(), 1);
        assert_eq!(inner.page_views.len(), 1);
        // Ids keep increasing after replay
        assert!(inner.next_id > inner.activities[0].id);
    }
}
