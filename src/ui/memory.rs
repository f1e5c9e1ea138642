// In-process UI layer. The binary serves its state over HTTP; tests inspect it directly.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::error::ChartError;
use crate::ui::{ChartConfig, ChartHandle, ChartRenderer, DisplaySink, RenderBatch};

const MAX_NOTIFICATIONS: usize = 20;

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub message: String,
    pub raised_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct MemoryDisplay {
    texts: DashMap<String, String>,
    opacity: DashMap<String, f32>,
    loading: AtomicBool,
    login_redirect: AtomicBool,
    commits: AtomicUsize,
    notifications: Mutex<Vec<Notification>>,
    loading_history: Mutex<Vec<bool>>,
    opacity_history: Mutex<Vec<(String, f32)>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DisplaySnapshot {
    pub texts: BTreeMap<String, String>,
    pub opacity: BTreeMap<String, f32>,
    pub loading: bool,
    pub login_redirect: bool,
    pub commits: usize,
    pub notifications: Vec<Notification>,
}

impl MemoryDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self, selector: &str) -> Option<String> {
        self.texts.get(selector).map(|v| v.value().clone())
    }

    pub fn opacity(&self, container: &str) -> Option<f32> {
        self.opacity.get(container).map(|v| *v.value())
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Acquire)
    }

    pub fn login_redirected(&self) -> bool {
        self.login_redirect.load(Ordering::Acquire)
    }

    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::Acquire)
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().clone()
    }

    pub fn dismiss_notifications(&self) -> usize {
        let mut notifications = self.notifications.lock();
        let dismissed = notifications.len();
        notifications.clear();
        dismissed
    }

    pub fn loading_history(&self) -> Vec<bool> {
        self.loading_history.lock().clone()
    }

    pub fn opacity_history(&self) -> Vec<(String, f32)> {
        self.opacity_history.lock().clone()
    }

    pub fn snapshot(&self) -> DisplaySnapshot {
        DisplaySnapshot {
            texts: self
                .texts
                .iter()
                .map(|e| (e.key().clone(), e.value().clone()))
                .collect(),
            opacity: self.opacity.iter().map(|e| (e.key().clone(), *e.value())).collect(),
            loading: self.is_loading(),
            login_redirect: self.login_redirected(),
            commits: self.commit_count(),
            notifications: self.notifications(),
        }
    }
}

impl DisplaySink for MemoryDisplay {
    fn commit(&self, batch: &RenderBatch) {
        for (selector, value) in &batch.texts {
            self.texts.insert(selector.clone(), value.clone());
        }
        self.commits.fetch_add(1, Ordering::AcqRel);
    }

    fn set_opacity(&self, container: &str, opacity: f32) {
        self.opacity.insert(container.to_string(), opacity);
        self.opacity_history.lock().push((container.to_string(), opacity));
    }

    fn set_loading(&self, visible: bool) {
        self.loading.store(visible, Ordering::Release);
        self.loading_history.lock().push(visible);
    }

    fn notify_error(&self, message: &str) {
        let mut notifications = self.notifications.lock();
        if notifications.len() == MAX_NOTIFICATIONS {
            notifications.remove(0);
        }
        notifications.push(Notification {
            message: message.to_string(),
            raised_at: Utc::now(),
        });
    }

    fn redirect_to_login(&self) {
        self.login_redirect.store(true, Ordering::Release);
    }
}

/// Chart "library" that keeps live chart configs in a map.
#[derive(Debug, Default)]
pub struct MemoryCharts {
    live: Arc<DashMap<String, ChartConfig>>,
    created: AtomicUsize,
    destroyed: Arc<AtomicUsize>,
}

struct MemoryChartHandle {
    target: String,
    live: Arc<DashMap<String, ChartConfig>>,
    destroyed: Arc<AtomicUsize>,
}

impl MemoryCharts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::Acquire)
    }

    pub fn destroyed(&self) -> usize {
        self.destroyed.load(Ordering::Acquire)
    }

    pub fn live(&self) -> BTreeMap<String, ChartConfig> {
        self.live
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }
}

impl ChartRenderer for MemoryCharts {
    fn create_chart(
        &self,
        target: &str,
        config: &ChartConfig,
    ) -> Result<Box<dyn ChartHandle>, ChartError> {
        if self.live.contains_key(target) {
            return Err(ChartError::Construction {
                target: target.to_string(),
                reason: "container already holds a chart".to_string(),
            });
        }
        self.live.insert(target.to_string(), config.clone());
        self.created.fetch_add(1, Ordering::AcqRel);
        Ok(Box::new(MemoryChartHandle {
            target: target.to_string(),
            live: Arc::clone(&self.live),
            destroyed: Arc::clone(&self.destroyed),
        }))
    }
}

impl ChartHandle for MemoryChartHandle {
    fn target(&self) -> &str {
        &self.target
    }

    fn destroy(self: Box<Self>) {
        self.live.remove(&self.target);
        self.destroyed.fetch_add(1, Ordering::AcqRel);
    }
}
