use clap::Parser;
use std::time::Duration;

use crate::models::Period;
use crate::scheduler::RenderConfig;

// CLI argument structure
#[derive(Parser, Debug, Clone)]
#[command(name = "dashboard-refresh")]
#[command(about = "Adaptive refresh and caching controller for the analytics dashboard")]
pub struct Args {
    // Port for the control surface
    #[arg(short, long, default_value_t = 8080)]
    pub port: u16,

    // Report backend base url
    #[arg(short, long, default_value = "localhost:3000")]
    pub backend: String,

    // File holding the session bearer token
    #[arg(long, default_value = ".dashboard-session")]
    pub token_file: String,

    // Page this controller instance belongs to
    #[arg(long, default_value = "dashboard")]
    pub page_id: String,

    // Period shown on first load (7d, 30d, 90d)
    #[arg(long, default_value_t = Period::Month)]
    pub period: Period,

    // Cache TTL in seconds
    #[arg(short, long, default_value_t = 30)]
    pub cache_ttl: u64,

    // Max distinct periods kept in cache
    #[arg(long, default_value_t = 10)]
    pub cache_capacity: usize,

    // Rate limit max requests per window
    #[arg(long, default_value_t = 10)]
    pub rate_limit: usize,

    // Rate limit window in seconds
    #[arg(long, default_value_t = 60)]
    pub rate_window: u64,

    // Auto-refresh interval in seconds
    #[arg(long, default_value_t = 60)]
    pub refresh_interval: u64,

    // Render debounce in milliseconds
    #[arg(long, default_value_t = 150)]
    pub debounce_ms: u64,

    // Chart fade phase in milliseconds
    #[arg(long, default_value_t = 200)]
    pub fade_ms: u64,

    // Backend request timeout in seconds
    #[arg(long, default_value_t = 15)]
    pub request_timeout: u64,
}

/// Tunables for one dashboard controller.
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub cache_ttl: Duration,
    pub cache_capacity: usize,
    pub max_requests_per_window: usize,
    pub rate_window: Duration,
    pub refresh_interval: Duration,
    pub render: RenderConfig,
    pub initial_period: Period,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(30),
            cache_capacity: 10,
            max_requests_per_window: 10,
            rate_window: Duration::from_secs(60),
            refresh_interval: Duration::from_secs(60),
            render: RenderConfig::default(),
            initial_period: Period::Month,
        }
    }
}

impl From<&Args> for DashboardConfig {
    fn from(args: &Args) -> Self {
        Self {
            cache_ttl: Duration::from_secs(args.cache_ttl),
            cache_capacity: args.cache_capacity,
            max_requests_per_window: args.rate_limit,
            rate_window: Duration::from_secs(args.rate_window),
            refresh_interval: Duration::from_secs(args.refresh_interval.max(1)),
            render: RenderConfig {
                debounce: Duration::from_millis(args.debounce_ms),
                fade: Duration::from_millis(args.fade_ms),
                ..RenderConfig::default()
            },
            initial_period: args.period,
        }
    }
}
