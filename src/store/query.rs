//! Read-side query primitives for the Stats Reader
//!
//! All listings are ordered newest-first by creation time (id as the
//! tiebreak, which matches insertion order). Event ids double as cursor
//! values for cursor-based pagination.

use std::collections::{BTreeMap, HashMap};

use chrono::{Duration, Utc};

use super::RecordStore;
use crate::types::{ActivityListItem, EndpointStat, PageViewListItem, StatPoint};
use crate::utils::{day_label, day_of};

fn sorted_points(counts: HashMap<String, u64>) -> Vec<StatPoint> {
    let mut points: Vec<StatPoint> = counts
        .into_iter()
        .map(|(name, value)| StatPoint { name, value })
        .collect();
    // Count descending, name ascending as a deterministic tiebreak
    points.sort_by(|a, b| b.value.cmp(&a.value).then_with(|| a.name.cmp(&b.name)));
    points
}

impl RecordStore {
    /// Activity counts grouped by action, ordered by count descending
    pub fn activity_counts_by_action(&self, user_id: &str) -> Vec<StatPoint> {
        let inner = self.inner.read();
        let mut counts: HashMap<String, u64> = HashMap::new();
        for event in inner.activities.iter().filter(|e| e.user_id == user_id) {
            *counts.entry(event.action.clone()).or_insert(0) += 1;
        }
        sorted_points(counts)
    }

    /// Page-view counts grouped by page, optionally scoped to one user
    pub fn page_view_counts_by_page(&self, user_id: Option<&str>) -> Vec<StatPoint> {
        let inner = self.inner.read();
        let mut counts: HashMap<String, u64> = HashMap::new();
        for event in &inner.page_views {
            if let Some(uid) = user_id {
                if event.user_id.as_deref() != Some(uid) {
                    continue;
                }
            }
            *counts.entry(event.page.clone()).or_insert(0) += 1;
        }
        sorted_points(counts)
    }

    /// Per-calendar-day activity counts over the trailing `days` window,
    /// chronological, with short date labels
    pub fn daily_activity_counts(&self, user_id: Option<&str>, days: u32) -> Vec<StatPoint> {
        let start = Utc::now() - Duration::days(i64::from(days));
        let inner = self.inner.read();

        let mut buckets = BTreeMap::new();
        for event in &inner.activities {
            if let Some(uid) = user_id {
                if event.user_id != uid {
                    continue;
                }
            }
            if event.created_at < start {
                continue;
            }
            *buckets.entry(day_of(event.created_at)).or_insert(0u64) += 1;
        }

        buckets
            .into_iter()
            .map(|(date, value)| StatPoint {
                name: day_label(date),
                value,
            })
            .collect()
    }

    /// Average duration and call count per endpoint, ordered by count
    /// descending
    pub fn api_performance_by_endpoint(&self, user_id: Option<&str>) -> Vec<EndpointStat> {
        let inner = self.inner.read();
        let mut sums: HashMap<String, (u64, u64)> = HashMap::new();
        for event in &inner.api_usage {
            if let Some(uid) = user_id {
                if event.user_id != uid {
                    continue;
                }
            }
            let entry = sums.entry(event.endpoint.clone()).or_insert((0, 0));
            entry.0 += u64::from(event.duration_ms);
            entry.1 += 1;
        }

        let mut stats: Vec<EndpointStat> = sums
            .into_iter()
            .map(|(endpoint, (total, count))| EndpointStat {
                endpoint,
                avg_duration: ((total as f64) / (count as f64)).round() as u64,
                count,
            })
            .collect();
        stats.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.endpoint.cmp(&b.endpoint)));
        stats
    }

    pub fn count_activities(&self, user_id: Option<&str>) -> u64 {
        let inner = self.inner.read();
        inner
            .activities
            .iter()
            .filter(|e| user_id.map_or(true, |uid| e.user_id == uid))
            .count() as u64
    }

    pub fn count_page_views(&self, user_id: Option<&str>) -> u64 {
        let inner = self.inner.read();
        inner
            .page_views
            .iter()
            .filter(|e| user_id.map_or(true, |uid| e.user_id.as_deref() == Some(uid)))
            .count() as u64
    }

    /// Offset page of activities, newest first
    pub fn activities_page(
        &self,
        user_id: Option<&str>,
        offset: u64,
        limit: u64,
    ) -> Vec<ActivityListItem> {
        self.activity_listing(user_id)
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect()
    }

    /// Activities strictly after the cursor position in newest-first order.
    /// An unknown cursor yields an empty page.
    pub fn activities_after(
        &self,
        user_id: Option<&str>,
        cursor: u64,
        limit: u64,
    ) -> Vec<ActivityListItem> {
        let listing = self.activity_listing(user_id);
        match listing.iter().position(|item| item.id == cursor.to_string()) {
            Some(pos) => listing
                .into_iter()
                .skip(pos + 1)
                .take(limit as usize)
                .collect(),
            None => Vec::new(),
        }
    }

    /// Offset page of page views, newest first
    pub fn page_views_page(
        &self,
        user_id: Option<&str>,
        offset: u64,
        limit: u64,
    ) -> Vec<PageViewListItem> {
        self.page_view_listing(user_id)
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect()
    }

    /// Page views strictly after the cursor position in newest-first order
    pub fn page_views_after(
        &self,
        user_id: Option<&str>,
        cursor: u64,
        limit: u64,
    ) -> Vec<PageViewListItem> {
        let listing = self.page_view_listing(user_id);
        match listing.iter().position(|item| item.id == cursor.to_string()) {
            Some(pos) => listing
                .into_iter()
                .skip(pos + 1)
                .take(limit as usize)
                .collect(),
            None => Vec::new(),
        }
    }

    fn activity_listing(&self, user_id: Option<&str>) -> Vec<ActivityListItem> {
        let inner = self.inner.read();
        let mut items: Vec<ActivityListItem> = inner
            .activities
            .iter()
            .filter(|e| user_id.map_or(true, |uid| e.user_id == uid))
            .map(|e| ActivityListItem {
                id: e.id.to_string(),
                action: e.action.clone(),
                created_at: e.created_at,
                metadata: e.metadata.clone(),
            })
            .collect();
        items.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.len().cmp(&a.id.len()))
                .then_with(|| b.id.cmp(&a.id))
        });
        items
    }

    fn page_view_listing(&self, user_id: Option<&str>) -> Vec<PageViewListItem> {
        let inner = self.inner.read();
        let mut items: Vec<PageViewListItem> = inner
            .page_views
            .iter()
            .filter(|e| user_id.map_or(true, |uid| e.user_id.as_deref() == Some(uid)))
            .map(|e| PageViewListItem {
                id: e.id.to_string(),
                page: e.page.clone(),
                user_agent: e.user_agent.clone(),
                ip: e.ip.clone(),
                created_at: e.created_at,
            })
            .collect();
        items.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.len().cmp(&a.id.len()))
                .then_with(|| b.id.cmp(&a.id))
        });
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::RecordStore;

    fn seeded_store() -> (RecordStore, String) {
        let store = RecordStore::in_memory();
        let user = store.create_user("a@example.com", None, None).unwrap();
        (store, user.id)
    }

    #[test]
    fn test_activity_counts_ordered_desc() {
        let (store, uid) = seeded_store();
        for _ in 0..3 {
            store.insert_activity(&uid, "login", None).unwrap();
        }
        store.insert_activity(&uid, "export", None).unwrap();

        let points = store.activity_counts_by_action(&uid);
        assert_eq!(points[0].name, "login");
        assert_eq!(points[0].value, 3);
        assert_eq!(points[1].name, "export");
        assert_eq!(points[1].value, 1);
    }

    #[test]
    fn test_activity_counts_scoped_to_user() {
        let (store, uid) = seeded_store();
        let other = store.create_user("b@example.com", None, None).unwrap();
        store.insert_activity(&uid, "login", None).unwrap();
        store.insert_activity(&other.id, "login", None).unwrap();

        let points = store.activity_counts_by_action(&uid);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].value, 1);
    }

    #[test]
    fn test_page_view_counts_global_and_scoped() {
        let (store, uid) = seeded_store();
        store.insert_page_view("/a", Some(&uid), None, None).unwrap();
        store.insert_page_view("/a", None, None, None).unwrap();
        store.insert_page_view("/b", None, None, None).unwrap();

        let global = store.page_view_counts_by_page(None);
        assert_eq!(global[0].name, "/a");
        assert_eq!(global[0].value, 2);

        let scoped = store.page_view_counts_by_page(Some(&uid));
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].value, 1);
    }

    #[test]
    fn test_daily_counts_bucket_today() {
        let (store, uid) = seeded_store();
        store.insert_activity(&uid, "login", None).unwrap();
        store.insert_activity(&uid, "export", None).unwrap();

        let points = store.daily_activity_counts(Some(&uid), 7);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].value, 2);
        assert_eq!(points[0].name, day_label(day_of(Utc::now())));
    }

    #[test]
    fn test_api_performance_averages() {
        let (store, uid) = seeded_store();
        let method = crate::types::HttpMethod::GET;
        store
            .insert_api_usage(&uid, "/analytics/stats", method, 200, 100)
            .unwrap();
        store
            .insert_api_usage(&uid, "/analytics/stats", method, 200, 201)
            .unwrap();
        store
            .insert_api_usage(&uid, "/analytics/activity", method, 200, 50)
            .unwrap();

        let stats = store.api_performance_by_endpoint(Some(&uid));
        assert_eq!(stats[0].endpoint, "/analytics/stats");
        assert_eq!(stats[0].count, 2);
        assert_eq!(stats[0].avg_duration, 151); // round(150.5)
    }

    #[test]
    fn test_offset_page_returns_expected_slice() {
        let (store, uid) = seeded_store();
        for i in 0..25 {
            store
                .insert_activity(&uid, &format!("action_{:02}", i), None)
                .unwrap();
        }

        // Newest first: page 2 of size 10 is the 11th..20th most recent
        let page = store.activities_page(Some(&uid), 10, 10);
        assert_eq!(page.len(), 10);
        assert_eq!(page[0].action, "action_14");
        assert_eq!(page[9].action, "action_05");
    }

    #[test]
    fn test_cursor_page_follows_cursor() {
        let (store, uid) = seeded_store();
        for i in 0..5 {
            store
                .insert_activity(&uid, &format!("action_{}", i), None)
                .unwrap();
        }

        let first = store.activities_page(Some(&uid), 0, 2);
        let cursor: u64 = first[1].id.parse().unwrap();

        let next = store.activities_after(Some(&uid), cursor, 2);
        assert_eq!(next.len(), 2);
        assert_eq!(next[0].action, "action_2");
        assert_eq!(next[1].action, "action_1");
    }

    #[test]
    fn test_unknown_cursor_yields_empty_page() {
        let (store, uid) = seeded_store();
        store.insert_activity(&uid, "login", None).unwrap();

        assert!(store.activities_after(Some(&uid), 999_999, 10).is_empty());
    }
}
