//! Seams to the presentation layer.
//!
//! The controller never touches a concrete UI toolkit. Text-bound fields are
//! written through [`DisplaySink::commit`] in a single batch; charts are
//! created through a [`ChartRenderer`] and torn down through their handles.

pub mod bindings;
pub mod memory;

use serde::Serialize;
use std::collections::BTreeSet;

use crate::error::ChartError;
use crate::models::{ChartSeries, PendingUpdate};

pub use memory::{MemoryCharts, MemoryDisplay};

pub trait DisplaySink: Send + Sync {
    /// Apply every mutation in `batch` in one pass.
    fn commit(&self, batch: &RenderBatch);

    fn set_opacity(&self, container: &str, opacity: f32);

    fn set_loading(&self, visible: bool);

    /// Transient, dismissible error notification.
    fn notify_error(&self, message: &str);

    fn redirect_to_login(&self);
}

pub trait ChartRenderer: Send + Sync {
    fn create_chart(
        &self,
        target: &str,
        config: &ChartConfig,
    ) -> Result<Box<dyn ChartHandle>, ChartError>;
}

pub trait ChartHandle: Send {
    fn target(&self) -> &str;

    fn destroy(self: Box<Self>);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Doughnut,
    Line,
}

// What the chart library needs to draw one widget
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartConfig {
    pub kind: ChartKind,
    pub series: ChartSeries,
}

/// All text mutations produced by one update, gathered before anything is
/// written so the UI never shows a half-applied state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderBatch {
    pub texts: Vec<(String, String)>,
}

impl RenderBatch {
    pub fn set_text(&mut self, selector: impl Into<String>, value: impl Into<String>) {
        self.texts.push((selector.into(), value.into()));
    }

    /// Text for every bound field. Categories listed in `previous` that the
    /// new payload no longer carries are reset to zero, and a missing
    /// generation time clears the timestamp, so nothing from an earlier
    /// period stays on screen.
    pub fn from_update(update: &PendingUpdate, previous: &BTreeSet<String>) -> Self {
        let payload = &update.payload;
        let mut batch = RenderBatch::default();

        batch.set_text(bindings::BALANCE, payload.balance.as_str());
        let credits = payload
            .credits
            .map(|c| c.to_string())
            .unwrap_or_else(|| "-".to_string());
        batch.set_text(bindings::CREDITS, credits);
        batch.set_text(bindings::USAGE_TOTAL, payload.usage_total().to_string());
        for (category, count) in &payload.usage {
            batch.set_text(bindings::usage_selector(category), count.to_string());
        }
        for dropped in previous.iter().filter(|c| !payload.usage.contains_key(*c)) {
            batch.set_text(bindings::usage_selector(dropped), "0");
        }
        let last_updated = payload
            .generated_at
            .map(|at| at.format("%d/%m/%Y %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        batch.set_text(bindings::LAST_UPDATED, last_updated);
        batch.set_text(bindings::DATA_SOURCE, update.source.label());

        batch
    }
}
