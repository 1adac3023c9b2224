use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub fanout: FanoutConfig,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub env: String,
    pub port: u16,
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Fan-out worker pool and active-user policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FanoutConfig {
    /// Number of concurrent fan-out workers; bounds store load.
    #[serde(default = "default_fanout_workers")]
    pub workers: usize,
    /// Bounded depth of the in-process event queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Only fan out to followers active within this many days.
    #[serde(default = "default_active_window_days")]
    pub active_window_days: i64,
    /// Toggle for the active-user filter; disabling fans out to everyone.
    #[serde(default = "default_active_only")]
    pub active_only: bool,
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            workers: default_fanout_workers(),
            queue_capacity: default_queue_capacity(),
            active_window_days: default_active_window_days(),
            active_only: default_active_only(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Max cached feed pages across all users.
    #[serde(default = "default_feed_page_capacity")]
    pub feed_page_capacity: usize,
    /// Max cached posts.
    #[serde(default = "default_post_capacity")]
    pub post_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            feed_page_capacity: default_feed_page_capacity(),
            post_capacity: default_post_capacity(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Config {
            app: AppConfig {
                env: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
                port: std::env::var("APP_PORT")
                    .unwrap_or_else(|_| "8000".to_string())
                    .parse()?,
                log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")?,
                max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()?,
            },
            fanout: FanoutConfig {
                workers: std::env::var("FANOUT_WORKERS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or_else(default_fanout_workers),
                queue_capacity: std::env::var("FANOUT_QUEUE_CAPACITY")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or_else(default_queue_capacity),
                active_window_days: std::env::var("FANOUT_ACTIVE_WINDOW_DAYS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or_else(default_active_window_days),
                active_only: std::env::var("FANOUT_ACTIVE_ONLY")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or_else(default_active_only),
            },
            cache: CacheConfig {
                feed_page_capacity: std::env::var("CACHE_FEED_PAGE_CAPACITY")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or_else(default_feed_page_capacity),
                post_capacity: std::env::var("CACHE_POST_CAPACITY")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or_else(default_post_capacity),
            },
        })
    }
}

fn default_fanout_workers() -> usize {
    4
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_active_window_days() -> i64 {
    10
}

fn default_active_only() -> bool {
    true
}

fn default_feed_page_capacity() -> usize {
    10_000
}

fn default_post_capacity() -> usize {
    10_000
}
