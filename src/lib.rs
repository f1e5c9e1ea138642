//! Adaptive refresh and caching controller for the analytics dashboard.
//!
//! Keeps a dashboard populated with report data from a remote service while
//! avoiding redundant fetches (TTL cache), bounding request volume (sliding
//! window limiter), and coalescing UI work into debounced, flicker-free
//! batches (render scheduler).

pub mod cache;
pub mod config;
pub mod controller;
pub mod error;
mod flight;
pub mod gateway;
pub mod handlers;
pub mod loading;
pub mod metrics;
pub mod models;
pub mod rate_limit;
pub mod registry;
pub mod scheduler;
pub mod session;
pub mod state;
pub mod ui;

pub use config::{Args, DashboardConfig};
pub use controller::{Collaborators, DashboardController, RefreshOutcome};
pub use error::{ChartError, Error, FetchError};
pub use models::{Period, ReportPayload, UpdateSource};
