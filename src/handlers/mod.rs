mod dashboard;
mod health;
mod metrics;

pub use dashboard::{
    change_period_handler, dismiss_notifications_handler, display_handler, refresh_handler,
    visibility_handler,
};
pub use health::health_handler;
pub use metrics::metrics_handler;
