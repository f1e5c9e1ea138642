//! Dashboard data controller.
//!
//! `refresh(period)` walks: cache lookup, then (on a miss and only if the
//! request limiter allows it) a network fetch, then hands the result to the
//! render scheduler. At most one refresh pipeline runs at a time; triggers
//! arriving meanwhile are dropped. A response whose period is no longer the
//! selected one is cached but never rendered.

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::cache::TtlCache;
use crate::config::DashboardConfig;
use crate::error::FetchError;
use crate::flight::FlightGuard;
use crate::gateway::ReportFetcher;
use crate::loading::{FETCH_TAG, LoadingTracker};
use crate::metrics::{
    CACHE_HITS, CACHE_MISSES, CACHE_SIZE, FETCH_ERRORS, FETCH_LATENCY, FETCH_TOTAL, RATE_LIMITED,
    REFRESH_SKIPPED, REFRESH_TOTAL, STALE_DISCARDS,
};
use crate::models::{Period, ReportPayload, UpdateSource};
use crate::rate_limit::SlidingWindowLimiter;
use crate::registry;
use crate::scheduler::RenderScheduler;
use crate::session::SessionStore;
use crate::ui::{ChartRenderer, DisplaySink};

/// External collaborators a controller drives.
pub struct Collaborators {
    pub fetcher: Arc<dyn ReportFetcher>,
    pub session: Arc<dyn SessionStore>,
    pub display: Arc<dyn DisplaySink>,
    pub charts: Arc<dyn ChartRenderer>,
}

/// How a refresh trigger was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RefreshOutcome {
    /// Data handed to the render scheduler.
    Scheduled { source: UpdateSource },
    /// Another refresh was in flight; this trigger was dropped.
    AlreadyRunning,
    /// Limiter denied the fetch and nothing was cached for the period.
    RateLimited,
    /// Fetched, but the user had moved to another period meanwhile.
    StalePeriod,
    FetchFailed,
    AuthExpired,
    /// The controller was torn down; nothing was rendered.
    Destroyed,
}

pub struct DashboardController {
    page_id: String,
    config: DashboardConfig,
    fetcher: Arc<dyn ReportFetcher>,
    session: Arc<dyn SessionStore>,
    display: Arc<dyn DisplaySink>,
    cache: Mutex<TtlCache<Arc<ReportPayload>>>,
    limiter: Mutex<SlidingWindowLimiter>,
    scheduler: RenderScheduler,
    loading: Arc<LoadingTracker>,
    current_period: Mutex<Period>,
    visible: AtomicBool,
    refreshing: AtomicBool,
    follow_up: AtomicBool,
    destroyed: AtomicBool,
    auto_refresh: Mutex<Option<JoinHandle<()>>>,
}

impl DashboardController {
    /// The controller for `page_id`, created on first use. Later calls return
    /// the same instance and ignore `config` and `collaborators`.
    pub fn obtain(
        page_id: &str,
        config: DashboardConfig,
        collaborators: Collaborators,
    ) -> Arc<Self> {
        let mut created = false;
        let controller = registry::obtain(page_id, || {
            created = true;
            Arc::new(Self::new(page_id, config, collaborators))
        });
        if !created {
            debug!(page = page_id, "reusing existing dashboard controller");
        }
        controller
    }

    fn new(page_id: &str, config: DashboardConfig, collaborators: Collaborators) -> Self {
        let Collaborators {
            fetcher,
            session,
            display,
            charts,
        } = collaborators;
        let loading = LoadingTracker::new(Arc::clone(&display));
        let scheduler = RenderScheduler::new(
            config.render,
            Arc::clone(&display),
            charts,
            Arc::clone(&loading),
        );

        info!(
            page = page_id,
            ttl_secs = config.cache_ttl.as_secs(),
            max_requests = config.max_requests_per_window,
            window_secs = config.rate_window.as_secs(),
            "dashboard controller created"
        );

        Self {
            page_id: page_id.to_string(),
            cache: Mutex::new(TtlCache::new(config.cache_ttl, config.cache_capacity)),
            limiter: Mutex::new(SlidingWindowLimiter::new(
                config.max_requests_per_window,
                config.rate_window,
            )),
            current_period: Mutex::new(config.initial_period),
            config,
            fetcher,
            session,
            display,
            scheduler,
            loading,
            visible: AtomicBool::new(true),
            refreshing: AtomicBool::new(false),
            follow_up: AtomicBool::new(false),
            destroyed: AtomicBool::new(false),
            auto_refresh: Mutex::new(None),
        }
    }

    /// Initial load plus the periodic auto-refresh timer.
    pub async fn start(self: &Arc<Self>) -> RefreshOutcome {
        self.spawn_auto_refresh();
        self.refresh(self.current_period()).await
    }

    pub async fn refresh(&self, period: Period) -> RefreshOutcome {
        let outcome = self.refresh_once(period).await;
        if outcome != RefreshOutcome::AlreadyRunning {
            self.run_follow_ups().await;
        }
        outcome
    }

    pub async fn refresh_current(&self) -> RefreshOutcome {
        self.refresh(self.current_period()).await
    }

    /// Select a new period and refresh it. Nothing in flight is cancelled;
    /// a late response for the old period is discarded at the render boundary.
    pub async fn change_period(&self, period: Period) -> RefreshOutcome {
        let previous = std::mem::replace(&mut *self.current_period.lock(), period);
        if previous != period {
            info!(from = %previous, to = %period, "period changed");
        }

        let outcome = self.refresh(period).await;
        if outcome == RefreshOutcome::AlreadyRunning {
            self.follow_up.store(true, Ordering::Release);
            // the in-flight run may have ended before it saw the flag
            if !self.is_refreshing() {
                self.run_follow_ups().await;
            }
        }
        outcome
    }

    /// Visibility signal from the UI layer. Becoming visible again refreshes
    /// right away instead of waiting for the next timer tick.
    pub async fn set_visibility(&self, visible: bool) -> Option<RefreshOutcome> {
        let was_visible = self.visible.swap(visible, Ordering::AcqRel);
        if visible && !was_visible {
            info!(page = %self.page_id, "page visible again, refreshing");
            return Some(self.refresh_current().await);
        }
        if !visible && was_visible {
            debug!(page = %self.page_id, "page hidden, auto-refresh paused");
        }
        None
    }

    /// Stop timers, destroy charts and free this page's registry slot.
    /// A refresh still waiting on the network completes without rendering.
    pub async fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            debug!(page = %self.page_id, "dashboard controller already destroyed");
        }
        self.follow_up.store(false, Ordering::Release);
        self.stop_auto_refresh();
        self.scheduler.shutdown().await;
        if registry::release(&self.page_id, self) {
            info!(page = %self.page_id, "dashboard controller destroyed");
        }
    }

    pub fn current_period(&self) -> Period {
        *self.current_period.lock()
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing.load(Ordering::Acquire)
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    pub fn is_visible(&self) -> bool {
        self.visible.load(Ordering::Acquire)
    }

    pub fn is_loading(&self) -> bool {
        self.loading.is_loading()
    }

    pub fn page_id(&self) -> &str {
        &self.page_id
    }

    pub fn cache_age(&self, period: Period) -> Option<Duration> {
        self.cache.lock().age(&period.cache_key())
    }

    pub fn rate_limit_remaining(&self) -> usize {
        self.limiter.lock().remaining()
    }

    fn spawn_auto_refresh(self: &Arc<Self>) {
        let mut slot = self.auto_refresh.lock();
        if slot.as_ref().is_some_and(|timer| !timer.is_finished()) {
            return;
        }

        let every = self.config.refresh_interval;
        let weak: Weak<Self> = Arc::downgrade(self);
        *slot = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + every, every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(controller) = weak.upgrade() else {
                    break;
                };
                controller.auto_tick().await;
            }
        }));
        info!(page = %self.page_id, interval_secs = every.as_secs(), "auto-refresh started");
    }

    fn stop_auto_refresh(&self) {
        if let Some(timer) = self.auto_refresh.lock().take() {
            timer.abort();
            debug!(page = %self.page_id, "auto-refresh stopped");
        }
    }

    async fn auto_tick(&self) -> Option<RefreshOutcome> {
        if !self.is_visible() {
            debug!("page hidden, skipping auto-refresh");
            return None;
        }
        if self.is_refreshing() {
            debug!("refresh in flight, skipping auto-refresh");
            return None;
        }
        Some(self.refresh_current().await)
    }

    async fn refresh_once(&self, period: Period) -> RefreshOutcome {
        if self.is_destroyed() {
            debug!(%period, "controller destroyed, ignoring refresh");
            return RefreshOutcome::Destroyed;
        }
        let Some(_flight) = FlightGuard::try_acquire(&self.refreshing) else {
            REFRESH_SKIPPED.inc();
            debug!(%period, "refresh already in progress, dropping trigger");
            return RefreshOutcome::AlreadyRunning;
        };
        self.run_pipeline(period).await
    }

    async fn run_follow_ups(&self) {
        while self.follow_up.swap(false, Ordering::AcqRel) {
            let current = self.current_period();
            debug!(period = %current, "running refresh deferred by a period change");
            if self.refresh_once(current).await == RefreshOutcome::AlreadyRunning {
                self.follow_up.store(true, Ordering::Release);
                break;
            }
        }
    }

    async fn run_pipeline(&self, period: Period) -> RefreshOutcome {
        REFRESH_TOTAL.inc();
        let key = period.cache_key();

        let cached = self.cache.lock().get(&key);
        if let Some(payload) = cached {
            CACHE_HITS.inc();
            debug!(%period, "cache hit");
            return self.deliver(period, payload, UpdateSource::Cache);
        }
        CACHE_MISSES.inc();

        let permitted = self.limiter.lock().try_acquire();
        if !permitted {
            RATE_LIMITED.inc();
            let stale = self.cache.lock().get_stale(&key);
            return match stale {
                Some(payload) => {
                    info!(%period, "rate limited, serving cached report");
                    self.deliver(period, payload, UpdateSource::RateLimitedCache)
                }
                None => {
                    info!(%period, "rate limited and nothing cached, leaving display as is");
                    RefreshOutcome::RateLimited
                }
            };
        }

        let result = {
            let _loading = self.loading.begin(FETCH_TAG);
            let _timer = FETCH_LATENCY.start_timer();
            FETCH_TOTAL.inc();
            self.fetcher.fetch_report(period).await
        };
        if self.is_destroyed() {
            debug!(%period, "controller destroyed during fetch, dropping response");
            return RefreshOutcome::Destroyed;
        }

        match result {
            Ok(payload) => {
                let payload = Arc::new(payload);
                {
                    let mut cache = self.cache.lock();
                    cache.put(key, Arc::clone(&payload));
                    CACHE_SIZE.set(cache.len() as f64);
                }
                debug!(%period, "fetched report");
                self.deliver(period, payload, UpdateSource::Network)
            }
            Err(FetchError::AuthExpired) => {
                FETCH_ERRORS.inc();
                self.expire_session();
                RefreshOutcome::AuthExpired
            }
            Err(e) => {
                FETCH_ERRORS.inc();
                warn!(%period, error = %e, "report fetch failed, keeping current display");
                self.display
                    .notify_error("Could not refresh the dashboard. Showing the last data loaded.");
                RefreshOutcome::FetchFailed
            }
        }
    }

    fn deliver(
        &self,
        period: Period,
        payload: Arc<ReportPayload>,
        source: UpdateSource,
    ) -> RefreshOutcome {
        if self.is_destroyed() {
            return RefreshOutcome::Destroyed;
        }
        let current = self.current_period();
        if period != current {
            STALE_DISCARDS.inc();
            info!(%period, %current, "discarding report for a period no longer selected");
            return RefreshOutcome::StalePeriod;
        }
        self.scheduler.schedule_update(payload, source);
        RefreshOutcome::Scheduled { source }
    }

    fn expire_session(&self) {
        error!(page = %self.page_id, "session expired, redirecting to login");
        self.session.clear();
        self.cache.lock().clear();
        CACHE_SIZE.set(0.0);
        self.stop_auto_refresh();
        self.scheduler.cancel_pending();
        self.display.redirect_to_login();
    }
}
