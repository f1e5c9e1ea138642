// Selectors the controller writes into, and the chart containers it owns.

use crate::models::ChartSet;
use crate::ui::{ChartConfig, ChartKind};

pub const BALANCE: &str = "#available-balance";
pub const CREDITS: &str = "#available-credits";
pub const USAGE_TOTAL: &str = "#usage-total";
pub const LAST_UPDATED: &str = "#last-updated";
pub const DATA_SOURCE: &str = "#data-source";

pub const CATEGORY_CHART: &str = "usage-by-category-chart";
pub const TIMELINE_CHART: &str = "usage-timeline-chart";

pub const CHART_CONTAINERS: [&str; 2] = [CATEGORY_CHART, TIMELINE_CHART];

pub fn usage_selector(category: &str) -> String {
    format!("#usage-{}", category)
}

// one (container, config) pair per owned chart
pub fn chart_configs(charts: &ChartSet) -> [(&'static str, ChartConfig); 2] {
    [
        (
            CATEGORY_CHART,
            ChartConfig {
                kind: ChartKind::Doughnut,
                series: charts.by_category.clone(),
            },
        ),
        (
            TIMELINE_CHART,
            ChartConfig {
                kind: ChartKind::Line,
                series: charts.timeline.clone(),
            },
        ),
    ]
}
