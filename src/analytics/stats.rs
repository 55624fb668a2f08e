//! Stats Reader: cached aggregate queries
//!
//! Every query shape gets its own cache key and TTL and falls back to a
//! live aggregation on miss. Pagination parameters are part of the cache
//! key, never post-filtered from a larger cached set.

use std::sync::Arc;
use std::time::Duration;

use crate::cache::CacheStore;
use crate::store::{RecordStore, StoreResult};
use crate::types::{
    ActivityListItem, EndpointStat, PageInfo, PageViewListItem, Paginated, StatPoint,
};

/// TTLs per query shape. Daily data is the most dynamic, API performance
/// the least.
pub const ACTIVITY_STATS_TTL: Duration = Duration::from_secs(2 * 60);
pub const PAGEVIEW_STATS_TTL: Duration = Duration::from_secs(3 * 60);
pub const DAILY_ACTIVITY_TTL: Duration = Duration::from_secs(60);
pub const API_PERFORMANCE_TTL: Duration = Duration::from_secs(5 * 60);
pub const PAGINATED_TTL: Duration = Duration::from_secs(60);

/// Default and maximum page sizes for the paginated listings
pub const DEFAULT_PAGE_LIMIT: u64 = 50;
pub const MAX_PAGE_LIMIT: u64 = 100;

/// Serves aggregates through the cache, recomputing from the store of
/// record on miss
pub struct StatsReader {
    store: Arc<RecordStore>,
    cache: Arc<CacheStore>,
}

impl StatsReader {
    pub fn new(store: Arc<RecordStore>, cache: Arc<CacheStore>) -> Self {
        Self { store, cache }
    }

    fn scope(user_id: Option<&str>) -> &str {
        user_id.unwrap_or("global")
    }

    /// Activity counts grouped by action, count descending. TTL 2 min.
    pub async fn activity_stats(&self, user_id: &str) -> StoreResult<Vec<StatPoint>> {
        let key = CacheStore::analytics_key(user_id, "activity_stats", None);
        let store = self.store.clone();
        let user_id = user_id.to_string();
        self.cache
            .remember(&key, ACTIVITY_STATS_TTL, move || async move {
                Ok(store.activity_counts_by_action(&user_id))
            })
            .await
    }

    /// Page-view counts grouped by page, optionally scoped. TTL 3 min.
    pub async fn page_view_stats(&self, user_id: Option<&str>) -> StoreResult<Vec<StatPoint>> {
        let key = CacheStore::analytics_key(Self::scope(user_id), "pageview_stats", None);
        let store = self.store.clone();
        let user_id = user_id.map(str::to_string);
        self.cache
            .remember(&key, PAGEVIEW_STATS_TTL, move || async move {
                Ok(store.page_view_counts_by_page(user_id.as_deref()))
            })
            .await
    }

    /// Daily activity buckets over the trailing window. TTL 1 min.
    pub async fn daily_activity(
        &self,
        user_id: Option<&str>,
        days: u32,
    ) -> StoreResult<Vec<StatPoint>> {
        let key = CacheStore::analytics_key(
            Self::scope(user_id),
            &format!("daily_activity_{}days", days),
            None,
        );
        let store = self.store.clone();
        let user_id = user_id.map(str::to_string);
        self.cache
            .remember(&key, DAILY_ACTIVITY_TTL, move || async move {
                Ok(store.daily_activity_counts(user_id.as_deref(), days))
            })
            .await
    }

    /// Average duration and count per endpoint. TTL 5 min.
    pub async fn api_performance(&self, user_id: Option<&str>) -> StoreResult<Vec<EndpointStat>> {
        let key = CacheStore::analytics_key(Self::scope(user_id), "api_performance", None);
        let store = self.store.clone();
        let user_id = user_id.map(str::to_string);
        self.cache
            .remember(&key, API_PERFORMANCE_TTL, move || async move {
                Ok(store.api_performance_by_endpoint(user_id.as_deref()))
            })
            .await
    }

    /// Paginated activity listing. Cursor mode wins when a cursor is
    /// supplied; otherwise offset mode. TTL 1 min per distinct
    /// (user, page/limit/cursor) combination.
    pub async fn activity_stats_paginated(
        &self,
        user_id: Option<&str>,
        page: u64,
        limit: u64,
        cursor: Option<&str>,
    ) -> StoreResult<Paginated<ActivityListItem>> {
        let limit = limit.clamp(1, MAX_PAGE_LIMIT);
        let key = CacheStore::analytics_key(
            Self::scope(user_id),
            "activity_stats",
            Some(&page_params(page, limit, cursor)),
        );
        let store = self.store.clone();
        let user_id = user_id.map(str::to_string);
        let cursor = cursor.map(str::to_string);
        self.cache
            .remember(&key, PAGINATED_TTL, move || async move {
                let user_id = user_id.as_deref();
                match cursor {
                    Some(cursor) => {
                        let data = match cursor.parse::<u64>() {
                            Ok(id) => store.activities_after(user_id, id, limit),
                            Err(_) => Vec::new(),
                        };
                        Ok(cursor_page(data, limit, |item| item.id.clone()))
                    }
                    None => {
                        let total = store.count_activities(user_id);
                        let data = match page_offset(page, limit) {
                            Some(offset) => store.activities_page(user_id, offset, limit),
                            None => Vec::new(),
                        };
                        Ok(offset_page(data, page, limit, total))
                    }
                }
            })
            .await
    }

    /// Paginated page-view listing, same modes as activities
    pub async fn page_view_stats_paginated(
        &self,
        user_id: Option<&str>,
        page: u64,
        limit: u64,
        cursor: Option<&str>,
    ) -> StoreResult<Paginated<PageViewListItem>> {
        let limit = limit.clamp(1, MAX_PAGE_LIMIT);
        let key = CacheStore::analytics_key(
            Self::scope(user_id),
            "pageview_stats",
            Some(&page_params(page, limit, cursor)),
        );
        let store = self.store.clone();
        let user_id = user_id.map(str::to_string);
        let cursor = cursor.map(str::to_string);
        self.cache
            .remember(&key, PAGINATED_TTL, move || async move {
                let user_id = user_id.as_deref();
                match cursor {
                    Some(cursor) => {
                        let data = match cursor.parse::<u64>() {
                            Ok(id) => store.page_views_after(user_id, id, limit),
                            Err(_) => Vec::new(),
                        };
                        Ok(cursor_page(data, limit, |item| item.id.clone()))
                    }
                    None => {
                        let total = store.count_page_views(user_id);
                        let data = match page_offset(page, limit) {
                            Some(offset) => store.page_views_page(user_id, offset, limit),
                            None => Vec::new(),
                        };
                        Ok(offset_page(data, page, limit, total))
                    }
                }
            })
            .await
    }
}

/// Row offset for an offset-mode page. `None` when the offset would not
/// fit in u64; such a page is past the end of any data set.
fn page_offset(page: u64, limit: u64) -> Option<u64> {
    page.checked_sub(1).and_then(|p| p.checked_mul(limit))
}

fn page_params(page: u64, limit: u64, cursor: Option<&str>) -> String {
    match cursor {
        Some(c) => format!("page_{}_limit_{}_cursor_{}", page, limit, c),
        None => format!("page_{}_limit_{}", page, limit),
    }
}

fn offset_page<T>(data: Vec<T>, page: u64, limit: u64, total: u64) -> Paginated<T> {
    let total_pages = total.div_ceil(limit);
    Paginated {
        pagination: PageInfo::Offset {
            page,
            limit,
            total,
            total_pages,
            has_next: page < total_pages,
            has_prev: page > 1,
        },
        data,
    }
}

fn cursor_page<T>(data: Vec<T>, limit: u64, id_of: impl Fn(&T) -> String) -> Paginated<T> {
    let has_more = data.len() as u64 == limit;
    let next_cursor = if has_more {
        data.last().map(&id_of)
    } else {
        None
    };
    Paginated {
        pagination: PageInfo::Cursor {
            next_cursor,
            has_more,
        },
        data,
    }
}
