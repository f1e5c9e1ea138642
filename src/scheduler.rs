//! Render scheduler: debounced, batched UI updates with chart diffing.
//!
//! Incoming data lands in a single pending slot (last write wins) and a short
//! debounce timer is cancelled and restarted on every write. When the timer
//! fires, the newest payload is applied as one batch: all text fields are
//! committed together, then charts are rebuilt only if their data changed.
//! A rebuild fades the chart containers down, swaps the chart handles and
//! fades them back up.

use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::error::ChartError;
use crate::flight::FlightGuard;
use crate::loading::{CHART_TAG, LoadingTracker};
use crate::metrics::{CHART_FAILURES, CHART_REBUILDS, CHART_SKIPS, UI_COMMITS};
use crate::models::{ChartSet, PendingUpdate, ReportPayload, UpdateSource};
use crate::ui::bindings::{CHART_CONTAINERS, chart_configs};
use crate::ui::{ChartHandle, ChartRenderer, DisplaySink, RenderBatch};

#[derive(Debug, Clone, Copy)]
pub struct RenderConfig {
    pub debounce: Duration,
    pub fade: Duration,
    pub faded_opacity: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(150),
            fade: Duration::from_millis(200),
            faded_opacity: 0.5,
        }
    }
}

#[derive(Clone)]
pub struct RenderScheduler {
    inner: Arc<Inner>,
}

struct Inner {
    config: RenderConfig,
    display: Arc<dyn DisplaySink>,
    charts: Arc<dyn ChartRenderer>,
    loading: Arc<LoadingTracker>,
    slot: Mutex<Slot>,
    updating: AtomicBool,
    closed: AtomicBool,
    widgets: tokio::sync::Mutex<ChartWidgets>,
    performed: AtomicUsize,
}

#[derive(Default)]
struct Slot {
    pending: Option<PendingUpdate>,
    timer: Option<JoinHandle<()>>,
}

// Live chart handles plus the data they were built from
#[derive(Default)]
struct ChartWidgets {
    handles: Vec<Box<dyn ChartHandle>>,
    snapshot: Option<ChartSet>,
    // usage categories the last commit wrote
    categories: BTreeSet<String>,
}

impl RenderScheduler {
    pub fn new(
        config: RenderConfig,
        display: Arc<dyn DisplaySink>,
        charts: Arc<dyn ChartRenderer>,
        loading: Arc<LoadingTracker>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                display,
                charts,
                loading,
                slot: Mutex::new(Slot::default()),
                updating: AtomicBool::new(false),
                closed: AtomicBool::new(false),
                widgets: tokio::sync::Mutex::new(ChartWidgets::default()),
                performed: AtomicUsize::new(0),
            }),
        }
    }

    /// Put `payload` in the pending slot and restart the debounce timer.
    /// Whatever was pending before is discarded without being rendered.
    /// Ignored once the scheduler has been shut down.
    pub fn schedule_update(&self, payload: Arc<ReportPayload>, source: UpdateSource) {
        let mut slot = self.inner.slot.lock();
        if self.inner.is_closed() {
            debug!(?source, "scheduler shut down, update ignored");
            return;
        }
        let update = PendingUpdate {
            payload,
            source,
            enqueued_at: Instant::now(),
        };
        if let Some(replaced) = slot.pending.replace(update) {
            debug!(
                source = ?replaced.source,
                waited_ms = replaced.enqueued_at.elapsed().as_millis() as u64,
                "superseded pending update"
            );
        }
        Inner::arm(&self.inner, &mut slot);
    }

    // drop pending work and stop the debounce timer
    pub fn cancel_pending(&self) {
        let mut slot = self.inner.slot.lock();
        slot.pending = None;
        if let Some(timer) = slot.timer.take() {
            timer.abort();
        }
    }

    /// Cancel pending work and destroy every chart this scheduler owns.
    /// A render already in progress finishes first and is then torn down;
    /// nothing is scheduled or rendered afterwards.
    pub async fn shutdown(&self) {
        {
            let _slot = self.inner.slot.lock();
            self.inner.closed.store(true, Ordering::Release);
        }
        self.cancel_pending();
        let mut widgets = self.inner.widgets.lock().await;
        destroy_all(&mut widgets.handles);
        widgets.snapshot = None;
        widgets.categories.clear();
        info!("render scheduler shut down");
    }

    pub fn has_pending(&self) -> bool {
        self.inner.slot.lock().pending.is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    pub fn is_updating(&self) -> bool {
        self.inner.updating.load(Ordering::Acquire)
    }

    pub fn performed_updates(&self) -> usize {
        self.inner.performed.load(Ordering::Acquire)
    }
}

impl Inner {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn arm(inner: &Arc<Inner>, slot: &mut Slot) {
        if let Some(timer) = slot.timer.take() {
            timer.abort();
        }
        let debounce = inner.config.debounce;
        let inner = Arc::clone(inner);
        slot.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            // the update runs detached so a later re-arm cannot abort it mid-render
            tokio::spawn(Inner::perform_update(inner));
        }));
    }

    async fn perform_update(inner: Arc<Inner>) {
        let Some(flight) = FlightGuard::try_acquire(&inner.updating) else {
            debug!("update already running, pending slot kept for the next cycle");
            return;
        };

        let update = inner.slot.lock().pending.take();
        if let Some(update) = update {
            inner.apply(update).await;
        }
        drop(flight);

        let mut slot = inner.slot.lock();
        if inner.is_closed() {
            return;
        }
        let timer_idle = slot.timer.as_ref().is_none_or(|t| t.is_finished());
        if slot.pending.is_some() && timer_idle {
            Inner::arm(&inner, &mut slot);
        }
    }

    async fn apply(&self, update: PendingUpdate) {
        let mut widgets = self.widgets.lock().await;
        // shutdown may have torn everything down while we waited for the lock
        if self.is_closed() {
            debug!(source = ?update.source, "scheduler shut down, dropping update");
            return;
        }

        let batch = RenderBatch::from_update(&update, &widgets.categories);
        widgets.categories = update.payload.usage.keys().cloned().collect();

        self.display.commit(&batch);
        UI_COMMITS.inc();
        self.performed.fetch_add(1, Ordering::AcqRel);
        debug!(source = ?update.source, fields = batch.texts.len(), "committed text fields");

        let charts = &update.payload.charts;
        if widgets.snapshot.as_ref() == Some(charts) {
            CHART_SKIPS.inc();
            debug!("chart data unchanged, skipping rebuild");
            return;
        }

        let _loading = self.loading.begin(CHART_TAG);
        self.fade_to(self.config.faded_opacity).await;
        self.rebuild(&mut widgets, charts);
        self.fade_to(1.0).await;
    }

    async fn fade_to(&self, opacity: f32) {
        for container in CHART_CONTAINERS {
            self.display.set_opacity(container, opacity);
        }
        tokio::time::sleep(self.config.fade).await;
    }

    fn rebuild(&self, widgets: &mut ChartWidgets, charts: &ChartSet) {
        destroy_all(&mut widgets.handles);
        widgets.snapshot = None;

        let built = self.build_all(charts).or_else(|e| {
            CHART_FAILURES.inc();
            warn!(error = %e, "chart construction failed, retrying full rebuild");
            self.build_all(charts)
        });

        match built {
            Ok(handles) => {
                widgets.handles = handles;
                widgets.snapshot = Some(charts.clone());
                CHART_REBUILDS.inc();
                debug!("charts rebuilt");
            }
            Err(e) => {
                CHART_FAILURES.inc();
                error!(error = %e, "chart rebuild failed twice, charts left empty");
            }
        }
    }

    // all charts or none: a failure tears down whatever was already built
    fn build_all(&self, charts: &ChartSet) -> Result<Vec<Box<dyn ChartHandle>>, ChartError> {
        let mut handles = Vec::with_capacity(CHART_CONTAINERS.len());
        for (target, config) in chart_configs(charts) {
            match self.charts.create_chart(target, &config) {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    destroy_all(&mut handles);
                    return Err(e);
                }
            }
        }
        Ok(handles)
    }
}

fn destroy_all(handles: &mut Vec<Box<dyn ChartHandle>>) {
    for handle in handles.drain(..) {
        debug!(container = handle.target(), "destroying chart");
        handle.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::payload;
    use crate::ui::bindings::{BALANCE, CATEGORY_CHART, TIMELINE_CHART};
    use crate::ui::{ChartConfig, MemoryCharts, MemoryDisplay};

    // fails the first `failures` creations aimed at `target`
    struct FlakyCharts {
        inner: MemoryCharts,
        target: &'static str,
        failures: AtomicUsize,
        attempts: AtomicUsize,
    }

    impl FlakyCharts {
        fn new(target: &'static str, failures: usize) -> Self {
            Self {
                inner: MemoryCharts::new(),
                target,
                failures: AtomicUsize::new(failures),
                attempts: AtomicUsize::new(0),
            }
        }
    }

    impl ChartRenderer for FlakyCharts {
        fn create_chart(
            &self,
            target: &str,
            config: &ChartConfig,
        ) -> Result<Box<dyn ChartHandle>, ChartError> {
            if target == self.target {
                self.attempts.fetch_add(1, Ordering::AcqRel);
                let left = self.failures.load(Ordering::Acquire);
                if left > 0 {
                    self.failures.store(left - 1, Ordering::Release);
                    return Err(ChartError::Construction {
                        target: target.to_string(),
                        reason: "canvas unavailable".to_string(),
                    });
                }
            }
            self.inner.create_chart(target, config)
        }
    }

    fn scheduler(
        charts: Arc<dyn ChartRenderer>,
    ) -> (RenderScheduler, Arc<MemoryDisplay>, Arc<LoadingTracker>) {
        let display = Arc::new(MemoryDisplay::new());
        let loading = LoadingTracker::new(display.clone());
        let scheduler = RenderScheduler::new(
            RenderConfig::default(),
            display.clone(),
            charts,
            loading.clone(),
        );
        (scheduler, display, loading)
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_secs(2)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn burst_within_debounce_renders_only_the_last_payload() {
        let charts = Arc::new(MemoryCharts::new());
        let (scheduler, display, _) = scheduler(charts.clone());

        scheduler.schedule_update(Arc::new(payload("R$ 1,00", &[1.0])), UpdateSource::Cache);
        tokio::time::sleep(Duration::from_millis(50)).await;
        scheduler.schedule_update(Arc::new(payload("R$ 2,00", &[2.0])), UpdateSource::Network);
        tokio::time::sleep(Duration::from_millis(50)).await;
        scheduler.schedule_update(Arc::new(payload("R$ 3,00", &[3.0])), UpdateSource::Network);
        settle().await;

        assert_eq!(scheduler.performed_updates(), 1);
        assert_eq!(display.commit_count(), 1);
        assert_eq!(display.text(BALANCE).as_deref(), Some("R$ 3,00"));
        assert_eq!(charts.created(), 2);
        assert_eq!(charts.live()[TIMELINE_CHART].series.datasets[0].data, vec![3.0]);
        assert!(!scheduler.has_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_renders_before_the_debounce_elapses() {
        let (scheduler, display, _) = scheduler(Arc::new(MemoryCharts::new()));
        scheduler.schedule_update(Arc::new(payload("R$ 1,00", &[1.0])), UpdateSource::Cache);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(display.commit_count(), 0);
        assert!(scheduler.has_pending());

        settle().await;
        assert_eq!(display.commit_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn identical_chart_data_skips_destroy_and_recreate() {
        let charts = Arc::new(MemoryCharts::new());
        let (scheduler, display, _) = scheduler(charts.clone());

        scheduler.schedule_update(Arc::new(payload("R$ 1,00", &[1.0, 2.0])), UpdateSource::Network);
        settle().await;
        let fades = display.opacity_history().len();

        scheduler.schedule_update(Arc::new(payload("R$ 9,00", &[1.0, 2.0])), UpdateSource::Cache);
        settle().await;

        assert_eq!(display.commit_count(), 2);
        assert_eq!(display.text(BALANCE).as_deref(), Some("R$ 9,00"));
        assert_eq!(charts.created(), 2);
        assert_eq!(charts.destroyed(), 0);
        assert_eq!(display.opacity_history().len(), fades);
    }

    #[tokio::test(start_paused = true)]
    async fn changed_chart_data_fades_and_rebuilds() {
        let charts = Arc::new(MemoryCharts::new());
        let (scheduler, display, _) = scheduler(charts.clone());

        scheduler.schedule_update(Arc::new(payload("R$ 1,00", &[1.0])), UpdateSource::Network);
        settle().await;
        scheduler.schedule_update(Arc::new(payload("R$ 1,00", &[5.0])), UpdateSource::Network);
        settle().await;

        assert_eq!(charts.created(), 4);
        assert_eq!(charts.destroyed(), 2);
        assert_eq!(charts.live().len(), 2);

        let history = display.opacity_history();
        let timeline: Vec<f32> = history
            .iter()
            .filter(|(c, _)| c == TIMELINE_CHART)
            .map(|(_, o)| *o)
            .collect();
        assert_eq!(timeline, vec![0.5, 1.0, 0.5, 1.0]);
        assert_eq!(display.opacity(CATEGORY_CHART), Some(1.0));
    }

    #[tokio::test(start_paused = true)]
    async fn chart_rebuild_shows_loading_until_faded_back() {
        let (scheduler, display, loading) = scheduler(Arc::new(MemoryCharts::new()));
        scheduler.schedule_update(Arc::new(payload("R$ 1,00", &[1.0])), UpdateSource::Network);

        // debounce done, first fade in progress
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(loading.is_loading());
        assert!(scheduler.is_updating());

        settle().await;
        assert!(!loading.is_loading());
        assert_eq!(display.loading_history(), vec![true, false]);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_construction_falls_back_to_full_rebuild() {
        let charts = Arc::new(FlakyCharts::new(TIMELINE_CHART, 1));
        let (scheduler, _, _) = scheduler(charts.clone());

        scheduler.schedule_update(Arc::new(payload("R$ 1,00", &[1.0])), UpdateSource::Network);
        settle().await;

        assert_eq!(charts.attempts.load(Ordering::Acquire), 2);
        let live = charts.inner.live();
        assert_eq!(live.len(), 2);
        assert!(live.contains_key(CATEGORY_CHART));
        // the half-built category chart from the first attempt was torn down
        assert_eq!(charts.inner.created(), 3);
        assert_eq!(charts.inner.destroyed(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn double_failure_leaves_no_partial_charts_and_text_still_updates() {
        let charts = Arc::new(FlakyCharts::new(TIMELINE_CHART, usize::MAX));
        let (scheduler, display, _) = scheduler(charts.clone());

        scheduler.schedule_update(Arc::new(payload("R$ 1,00", &[1.0])), UpdateSource::Network);
        settle().await;
        assert!(charts.inner.live().is_empty());
        assert_eq!(display.text(BALANCE).as_deref(), Some("R$ 1,00"));

        // same chart data again: no snapshot was stored, so it is retried
        scheduler.schedule_update(Arc::new(payload("R$ 2,00", &[1.0])), UpdateSource::Cache);
        settle().await;
        assert_eq!(charts.attempts.load(Ordering::Acquire), 4);
        assert_eq!(display.text(BALANCE).as_deref(), Some("R$ 2,00"));
    }

    #[tokio::test(start_paused = true)]
    async fn update_arriving_mid_render_runs_afterwards_not_interleaved() {
        let charts = Arc::new(MemoryCharts::new());
        let (scheduler, display, _) = scheduler(charts.clone());

        scheduler.schedule_update(Arc::new(payload("R$ 1,00", &[1.0])), UpdateSource::Network);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(scheduler.is_updating());

        scheduler.schedule_update(Arc::new(payload("R$ 2,00", &[2.0])), UpdateSource::Network);
        tokio::time::sleep(Duration::from_millis(200)).await;
        // first render still fading, second one waits
        assert_eq!(display.commit_count(), 1);
        assert!(scheduler.has_pending());

        settle().await;
        assert_eq!(scheduler.performed_updates(), 2);
        assert_eq!(display.text(BALANCE).as_deref(), Some("R$ 2,00"));
        assert_eq!(charts.live()[TIMELINE_CHART].series.datasets[0].data, vec![2.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_pending_and_destroys_charts() {
        let charts = Arc::new(MemoryCharts::new());
        let (scheduler, display, _) = scheduler(charts.clone());

        scheduler.schedule_update(Arc::new(payload("R$ 1,00", &[1.0])), UpdateSource::Network);
        settle().await;
        assert_eq!(charts.live().len(), 2);

        scheduler.schedule_update(Arc::new(payload("R$ 2,00", &[2.0])), UpdateSource::Network);
        scheduler.shutdown().await;
        settle().await;

        assert!(charts.live().is_empty());
        assert_eq!(display.commit_count(), 1);
        assert!(!scheduler.has_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_during_a_render_leaves_no_charts_behind() {
        let charts = Arc::new(MemoryCharts::new());
        let (scheduler, display, loading) = scheduler(charts.clone());

        scheduler.schedule_update(Arc::new(payload("R$ 1,00", &[1.0])), UpdateSource::Network);
        // debounce elapsed, first fade in progress
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(scheduler.is_updating());

        scheduler.shutdown().await;
        settle().await;

        assert!(scheduler.is_closed());
        assert!(charts.live().is_empty());
        assert_eq!(charts.created(), charts.destroyed());
        assert_eq!(display.commit_count(), 1);
        assert!(!loading.is_loading());
    }

    #[tokio::test(start_paused = true)]
    async fn updates_scheduled_after_shutdown_never_render() {
        let charts = Arc::new(MemoryCharts::new());
        let (scheduler, display, _) = scheduler(charts.clone());

        let racer = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move {
                for i in 0..5 {
                    let balance = format!("R$ {},00", i);
                    let report = Arc::new(payload(&balance, &[i as f64]));
                    scheduler.schedule_update(report, UpdateSource::Network);
                    tokio::task::yield_now().await;
                }
            })
        };
        scheduler.shutdown().await;
        racer.await.unwrap();
        scheduler.schedule_update(Arc::new(payload("R$ 9,00", &[9.0])), UpdateSource::Cache);
        settle().await;

        assert!(!scheduler.has_pending());
        assert_eq!(display.commit_count(), 0);
        assert_eq!(charts.created(), 0);
        assert_eq!(scheduler.performed_updates(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn category_dropped_by_the_next_report_is_zeroed() {
        let (scheduler, display, _) = scheduler(Arc::new(MemoryCharts::new()));

        scheduler.schedule_update(Arc::new(payload("R$ 1,00", &[1.0])), UpdateSource::Network);
        settle().await;
        assert_eq!(display.text("#usage-pricing").as_deref(), Some("2"));

        let mut week = payload("R$ 2,00", &[1.0]);
        week.usage.remove("pricing");
        scheduler.schedule_update(Arc::new(week), UpdateSource::Network);
        settle().await;

        assert_eq!(display.text(BALANCE).as_deref(), Some("R$ 2,00"));
        assert_eq!(display.text("#usage-pricing").as_deref(), Some("0"));
        assert_eq!(display.text("#usage-protest").as_deref(), Some("3"));
    }
}
