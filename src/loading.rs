//! Loading indicator driven by a set of in-flight operation tags.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use crate::ui::DisplaySink;

pub const FETCH_TAG: &str = "data-fetch";
pub const CHART_TAG: &str = "chart-rebuild";

/// The indicator is visible while any tag is active and hides only when the
/// last one ends. Tags are counted so overlapping uses of the same tag do not
/// hide it early.
pub struct LoadingTracker {
    active: Mutex<HashMap<String, usize>>,
    display: Arc<dyn DisplaySink>,
}

#[must_use = "the tag ends when the guard is dropped"]
pub struct LoadingGuard {
    tracker: Arc<LoadingTracker>,
    tag: String,
}

impl LoadingTracker {
    pub fn new(display: Arc<dyn DisplaySink>) -> Arc<Self> {
        Arc::new(Self {
            active: Mutex::new(HashMap::new()),
            display,
        })
    }

    pub fn begin(self: &Arc<Self>, tag: &str) -> LoadingGuard {
        let mut active = self.active.lock();
        let was_idle = active.is_empty();
        *active.entry(tag.to_string()).or_insert(0) += 1;
        if was_idle {
            self.display.set_loading(true);
        }
        LoadingGuard {
            tracker: Arc::clone(self),
            tag: tag.to_string(),
        }
    }

    pub fn is_loading(&self) -> bool {
        !self.active.lock().is_empty()
    }

    pub fn active_tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self.active.lock().keys().cloned().collect();
        tags.sort();
        tags
    }

    fn end(&self, tag: &str) {
        let mut active = self.active.lock();
        if let Some(count) = active.get_mut(tag) {
            *count -= 1;
            if *count == 0 {
                active.remove(tag);
            }
        }
        if active.is_empty() {
            self.display.set_loading(false);
        }
    }
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        self.tracker.end(&self.tag);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::MemoryDisplay;

    #[test]
    fn overlapping_operations_keep_indicator_visible() {
        let display = Arc::new(MemoryDisplay::new());
        let tracker = LoadingTracker::new(display.clone());

        let fetch = tracker.begin(FETCH_TAG);
        let charts = tracker.begin(CHART_TAG);
        assert!(display.is_loading());

        drop(fetch);
        assert!(display.is_loading());
        assert_eq!(tracker.active_tags(), vec![CHART_TAG.to_string()]);

        drop(charts);
        assert!(!display.is_loading());
        assert_eq!(display.loading_history(), vec![true, false]);
    }

    #[test]
    fn same_tag_twice_needs_two_ends() {
        let display = Arc::new(MemoryDisplay::new());
        let tracker = LoadingTracker::new(display.clone());

        let a = tracker.begin(FETCH_TAG);
        let b = tracker.begin(FETCH_TAG);
        drop(a);
        assert!(tracker.is_loading());
        drop(b);
        assert!(!tracker.is_loading());
        assert!(!display.is_loading());
    }
}
