use lazy_static::lazy_static;
use prometheus::{Counter, Gauge, Histogram, register_counter, register_gauge, register_histogram};


lazy_static! {
    pub static ref REFRESH_TOTAL: Counter =
        register_counter!("dashboard_refresh_total", "Refresh pipelines started").unwrap();
    pub static ref REFRESH_SKIPPED: Counter =
        register_counter!("dashboard_refresh_skipped_total", "Refresh triggers dropped while one was in flight").unwrap();
    pub static ref CACHE_HITS: Counter =
        register_counter!("dashboard_cache_hits_total", "Total cache hits").unwrap();
    pub static ref CACHE_MISSES: Counter =
        register_counter!("dashboard_cache_misses_total", "Total cache misses").unwrap();
    pub static ref CACHE_SIZE: Gauge =
        register_gauge!("dashboard_cache_size", "Current number of items in cache").unwrap();
    pub static ref RATE_LIMITED: Counter =
        register_counter!("dashboard_rate_limited_total", "Refreshes denied by the request limiter").unwrap();
    pub static ref FETCH_TOTAL: Counter =
        register_counter!("dashboard_fetch_total", "Report fetches sent to the backend").unwrap();
    pub static ref FETCH_ERRORS: Counter =
        register_counter!("dashboard_fetch_errors_total", "Report fetches that failed").unwrap();
    pub static ref FETCH_LATENCY: Histogram = register_histogram!(
        "dashboard_fetch_latency_seconds",
        "Report fetch latency in seconds"
    )
    .unwrap();
    pub static ref STALE_DISCARDS: Counter =
        register_counter!("dashboard_stale_period_discards_total", "Responses dropped because the period changed").unwrap();
    pub static ref UI_COMMITS: Counter =
        register_counter!("dashboard_ui_commits_total", "Batched UI updates applied").unwrap();
    pub static ref CHART_REBUILDS: Counter =
        register_counter!("dashboard_chart_rebuilds_total", "Chart destroy/recreate cycles").unwrap();
    pub static ref CHART_SKIPS: Counter =
        register_counter!("dashboard_chart_skips_total", "Updates whose chart data was unchanged").unwrap();
    pub static ref CHART_FAILURES: Counter =
        register_counter!("dashboard_chart_failures_total", "Chart constructions that failed").unwrap();
}
