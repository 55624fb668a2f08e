//! Server configuration
//!
//! All knobs come from `PULSE_*` environment variables with working
//! defaults for local development.

use std::path::PathBuf;

/// Application configuration, constructed once at process start
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Address the HTTP server binds to
    pub bind_addr: String,
    /// Directory for persisted event logs
    pub data_dir: PathBuf,
    /// Development mode: human-readable logs, error details in responses
    pub dev_mode: bool,
    /// JWT signing secret (min 32 chars); generated if unset
    pub jwt_secret: Option<String>,
    /// Access token lifetime in seconds
    pub access_token_ttl: i64,
    /// Seed users as (email, password) pairs
    pub users: Vec<(String, String)>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3040".to_string(),
            data_dir: PathBuf::from("data"),
            dev_mode: true,
            jwt_secret: None,
            access_token_ttl: 3600, // 1 hour
            users: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Build configuration from environment variables
    ///
    /// - `PULSE_BIND_ADDR`: listen address (default `127.0.0.1:3040`)
    /// - `PULSE_DATA_DIR`: event log directory (default `data`)
    /// - `PULSE_ENV`: `production` disables dev mode
    /// - `PULSE_JWT_SECRET`: token signing secret (min 32 chars)
    /// - `PULSE_ACCESS_TOKEN_TTL`: token lifetime in seconds (default 3600)
    /// - `PULSE_USERS`: comma-separated `email:password` pairs to seed
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("PULSE_BIND_ADDR") {
            config.bind_addr = addr;
        }

        if let Ok(dir) = std::env::var("PULSE_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }

        if let Ok(env) = std::env::var("PULSE_ENV") {
            config.dev_mode = env != "production";
        }

        if let Ok(secret) = std::env::var("PULSE_JWT_SECRET") {
            config.jwt_secret = Some(secret);
        }

        if let Ok(ttl) = std::env::var("PULSE_ACCESS_TOKEN_TTL") {
            if let Ok(seconds) = ttl.parse::<i64>() {
                config.access_token_ttl = seconds;
            }
        }

        // Format: "alice@example.com:password1,bob@example.com:password2"
        if let Ok(users_str) = std::env::var("PULSE_USERS") {
            for entry in users_str.split(',') {
                if let Some((email, password)) = entry.trim().split_once(':') {
                    if !email.is_empty() && !password.is_empty() {
                        config
                            .users
                            .push((email.to_string(), password.to_string()));
                    }
                }
            }
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.bind_addr, "127.0.0.1:3040");
        assert!(config.dev_mode);
        assert_eq!(config.access_token_ttl, 3600);
        assert!(config.users.is_empty());
    }
}
