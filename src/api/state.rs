//! Shared application state
//!
//! One `AppState` is built at startup and handed to every handler behind
//! an `Arc`. All components share the same store and cache instances so
//! writes and invalidations are visible everywhere.

use std::sync::Arc;

use bcrypt::{hash, DEFAULT_COST};

use crate::analytics::{EventWriter, StatsReader};
use crate::api::auth::JwtAuth;
use crate::cache::CacheStore;
use crate::config::AppConfig;
use crate::logging::{Logger, Metrics};
use crate::rate_limit::RateLimiter;
use crate::store::{RecordStore, StoreConfig};

pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<RecordStore>,
    pub cache: Arc<CacheStore>,
    pub limiter: Arc<RateLimiter>,
    pub writer: EventWriter,
    pub stats: StatsReader,
    pub auth: JwtAuth,
    pub metrics: Metrics,
    pub logger: Logger,
}

impl AppState {
    /// Build production state: open the persistent store, seed configured
    /// users, wire every component to the shared store and cache.
    pub fn new(config: AppConfig) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let store = Arc::new(RecordStore::open(StoreConfig::new(&config.data_dir))?);
        Self::with_store(config, store)
    }

    /// Build state around an existing store (tests use an in-memory one)
    pub fn with_store(
        config: AppConfig,
        store: Arc<RecordStore>,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let logger = Logger::new(config.dev_mode);
        let auth = JwtAuth::from_config(&config)?;
        seed_users(&store, &config, &logger);

        let cache = Arc::new(CacheStore::new());
        let writer = EventWriter::new(store.clone(), cache.clone(), logger.clone());
        let stats = StatsReader::new(store.clone(), cache.clone());

        Ok(Self {
            config,
            store,
            cache,
            limiter: Arc::new(RateLimiter::new()),
            writer,
            stats,
            auth,
            metrics: Metrics::new(),
            logger,
        })
    }
}

/// Ensure every configured `email:password` pair has a user row with a
/// bcrypt hash. Existing users are left as-is.
fn seed_users(store: &RecordStore, config: &AppConfig, logger: &Logger) {
    for (email, password) in &config.users {
        if store.find_user_by_email(email).is_some() {
            continue;
        }
        let password_hash = match hash(password, DEFAULT_COST) {
            Ok(h) => h,
            Err(e) => {
                logger.error(&format!("Failed to hash password for {}", email), &e);
                continue;
            }
        };
        if let Err(e) = store.create_user(email, None, Some(&password_hash)) {
            logger.error(&format!("Failed to seed user {}", email), &e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_store_seeds_users_once() {
        let config = AppConfig {
            users: vec![("a@example.com".to_string(), "pw-one".to_string())],
            ..Default::default()
        };
        let store = Arc::new(RecordStore::in_memory());

        let state = AppState::with_store(config.clone(), store.clone()).unwrap();
        let user = store.find_user_by_email("a@example.com").unwrap();
        assert!(user.password_hash.is_some());

        // Re-seeding with the same email does not create a second user
        drop(state);
        let _again = AppState::with_store(config, store.clone()).unwrap();
        assert_eq!(
            store.find_user_by_email("a@example.com").unwrap().id,
            user.id
        );
    }
}
