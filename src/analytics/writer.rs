//! Event Writer: best-effort ingestion into the store of record
//!
//! Single-event tracking never fails the calling request: persistence
//! errors are logged and swallowed here, and events referencing unknown
//! users are silently dropped. Batch operations have the opposite
//! contract — the caller is owed the batch outcome, so their errors
//! propagate.

use std::sync::Arc;

use serde_json::Value;

use crate::cache::CacheStore;
use crate::logging::Logger;
use crate::store::{RecordStore, StoreResult};
use crate::types::HttpMethod;
use crate::validation::{ActivityRecord, PageViewRecord};

/// Writes analytics events and keeps the cache coherent with them
pub struct EventWriter {
    store: Arc<RecordStore>,
    cache: Arc<CacheStore>,
    logger: Logger,
}

impl EventWriter {
    pub fn new(store: Arc<RecordStore>, cache: Arc<CacheStore>, logger: Logger) -> Self {
        Self {
            store,
            cache,
            logger: logger.with_field("service", "analytics"),
        }
    }

    /// Track one user activity. Unknown users are dropped, persistence
    /// errors swallowed; the caller's request must never fail because of
    /// analytics.
    pub fn track_activity(&self, user_id: &str, action: &str, metadata: Option<Value>) {
        if !self.store.user_exists(user_id) {
            self.logger.warn(&format!(
                "User {} not found, skipping activity tracking",
                user_id
            ));
            return;
        }

        match self.store.insert_activity(user_id, action, metadata) {
            Ok(_) => {
                // Fresh aggregates on the next read
                self.cache.invalidate_user(user_id);
            }
            Err(e) => {
                self.logger.error("Error tracking user activity", &e);
            }
        }
    }

    /// Track one page view. A user id that doesn't resolve is recorded as
    /// anonymous rather than dropped.
    pub fn track_page_view(
        &self,
        page: &str,
        user_id: Option<&str>,
        user_agent: Option<&str>,
        ip: Option<&str>,
    ) {
        let valid_user_id = user_id.filter(|id| self.store.user_exists(id));

        if let Err(e) = self
            .store
            .insert_page_view(page, valid_user_id, user_agent, ip)
        {
            self.logger.error("Error tracking page view", &e);
        }
    }

    /// Track one API call, best-effort
    pub fn track_api_usage(
        &self,
        user_id: &str,
        endpoint: &str,
        method: HttpMethod,
        status: u16,
        duration_ms: u32,
    ) {
        if let Err(e) =
            self.store
                .insert_api_usage(user_id, endpoint, method, status, duration_ms)
        {
            self.logger.error("Error tracking API usage", &e);
        }
    }

    /// Bulk-insert page views
    ///
    /// One set lookup resolves all referenced users; rows pointing at
    /// unknown users keep the view but lose the attribution. Returns the
    /// number actually inserted. Errors propagate: batches are explicit
    /// operations with a success contract.
    pub fn track_page_views_batch(&self, rows: &[PageViewRecord]) -> StoreResult<u64> {
        let valid_user_ids = self
            .store
            .existing_user_ids(rows.iter().filter_map(|r| r.user_id.as_deref()));

        let resolved: Vec<PageViewRecord> = rows
            .iter()
            .map(|row| PageViewRecord {
                page: row.page.clone(),
                user_id: row
                    .user_id
                    .as_ref()
                    .filter(|id| valid_user_ids.contains(*id))
                    .cloned(),
                user_agent: row.user_agent.clone(),
                ip: row.ip.clone(),
            })
            .collect();

        let inserted = self.store.insert_page_views(&resolved)?;

        for user_id in &valid_user_ids {
            self.cache.invalidate_user(user_id);
        }

        Ok(inserted)
    }

    /// Bulk-insert activities
    ///
    /// Activities require a valid user, so rows referencing unknown users
    /// are dropped from the batch. Returns the number actually inserted.
    pub fn track_activities_batch(&self, rows: &[ActivityRecord]) -> StoreResult<u64> {
        let valid_user_ids = self
            .store
            .existing_user_ids(rows.iter().map(|r| r.user_id.as_str()));

        let valid: Vec<ActivityRecord> = rows
            .iter()
            .filter(|row| valid_user_ids.contains(&row.user_id))
            .cloned()
            .collect();

        if valid.is_empty() {
            self.logger
                .warn("No valid users found for batch activity tracking");
            return Ok(0);
        }

        let inserted = self.store.insert_activities(&valid)?;

        for user_id in &valid_user_ids {
            self.cache.invalidate_user(user_id);
        }

        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheStore;
    use serde_json::json;
    use std::time::Duration;

    fn writer_with_user() -> (EventWriter, Arc<RecordStore>, Arc<CacheStore>, String) {
        let store = Arc::new(RecordStore::in_memory());
        let cache = Arc::new(CacheStore::new());
        let user = store.create_user("a@example.com", None, None).unwrap();
        let writer = EventWriter::new(store.clone(), cache.clone(), Logger::new(true));
        (writer, store, cache, user.id)
    }

    #[test]
    fn test_track_activity_persists_and_invalidates() {
        let (writer, store, cache, uid) = writer_with_user();
        cache.set(
            &CacheStore::analytics_key(&uid, "activity_stats", None),
            json!([1]),
            Duration::from_secs(60),
        );

        writer.track_activity(&uid, "login", None);

        assert_eq!(store.count_activities(Some(&uid)), 1);
        assert_eq!(
            cache.get(&CacheStore::analytics_key(&uid, "activity_stats", None)),
            None
        );
    }

    #[test]
    fn test_track_activity_silently_drops_unknown_user() {
        let (writer, store, _cache, _uid) = writer_with_user();

        writer.track_activity("usr_999999", "login", None);

        assert_eq!(store.count_activities(None), 0);
    }

    #[test]
    fn test_track_page_view_keeps_view_for_unknown_user() {
        let (writer, store, _cache, _uid) = writer_with_user();

        writer.track_page_view("/pricing", Some("usr_999999"), None, None);

        assert_eq!(store.count_page_views(None), 1);
        // Attribution dropped, view kept
        assert_eq!(store.count_page_views(Some("usr_999999")), 0);
    }

    #[test]
    fn test_batch_activities_inserts_only_valid_subset() {
        let (writer, store, _cache, uid) = writer_with_user();
        let rows = vec![
            ActivityRecord {
                user_id: uid.clone(),
                action: "login".to_string(),
                metadata: None,
            },
            ActivityRecord {
                user_id: "usr_999999".to_string(),
                action: "login".to_string(),
                metadata: None,
            },
            ActivityRecord {
                user_id: uid.clone(),
                action: "export".to_string(),
                metadata: None,
            },
        ];

        let inserted = writer.track_activities_batch(&rows).unwrap();

        assert_eq!(inserted, 2);
        assert_eq!(store.count_activities(Some(&uid)), 2);
    }

    #[test]
    fn test_batch_activities_all_unknown_is_zero_not_error() {
        let (writer, _store, _cache, _uid) = writer_with_user();
        let rows = vec![ActivityRecord {
            user_id: "usr_999999".to_string(),
            action: "login".to_string(),
            metadata: None,
        }];

        assert_eq!(writer.track_activities_batch(&rows).unwrap(), 0);
    }

    #[test]
    fn test_batch_page_views_nulls_out_unknown_users() {
        let (writer, store, _cache, uid) = writer_with_user();
        let rows = vec![
            PageViewRecord {
                page: "/a".to_string(),
                user_id: Some(uid.clone()),
                user_agent: None,
                ip: None,
            },
            PageViewRecord {
                page: "/b".to_string(),
                user_id: Some("usr_999999".to_string()),
                user_agent: None,
                ip: None,
            },
        ];

        let inserted = writer.track_page_views_batch(&rows).unwrap();

        assert_eq!(inserted, 2);
        assert_eq!(store.count_page_views(None), 2);
        assert_eq!(store.count_page_views(Some(&uid)), 1);
    }

    #[test]
    fn test_batch_invalidates_only_affected_users() {
        let (writer, store, cache, uid) = writer_with_user();
        let other = store.create_user("b@example.com", None, None).unwrap();
        let ttl = Duration::from_secs(60);
        cache.set(&CacheStore::user_key(&uid, "stats"), json!(1), ttl);
        cache.set(&CacheStore::user_key(&other.id, "stats"), json!(2), ttl);

        writer
            .track_activities_batch(&[ActivityRecord {
                user_id: uid.clone(),
                action: "login".to_string(),
                metadata: None,
            }])
            .unwrap();

        assert_eq!(cache.get(&CacheStore::user_key(&uid, "stats")), None);
        assert_eq!(
            cache.get(&CacheStore::user_key(&other.id, "stats")),
            Some(json!(2))
        );
    }
}
