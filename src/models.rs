use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::time::Instant;

// Reporting window selected in the period filter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Period {
    #[serde(rename = "7d")]
    Week,
    #[default]
    #[serde(rename = "30d")]
    Month,
    #[serde(rename = "90d")]
    Quarter,
}

impl Period {
    pub const ALL: [Period; 3] = [Period::Week, Period::Month, Period::Quarter];

    pub fn days(self) -> u32 {
        match self {
            Period::Week => 7,
            Period::Month => 30,
            Period::Quarter => 90,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Period::Week => "7d",
            Period::Month => "30d",
            Period::Quarter => "90d",
        }
    }

    // cache key for this period's report
    pub fn cache_key(self) -> String {
        self.as_str().to_string()
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "7d" | "7" => Ok(Period::Week),
            "30d" | "30" => Ok(Period::Month),
            "90d" | "90" => Ok(Period::Quarter),
            other => Err(format!("unknown period '{}' (expected 7d, 30d or 90d)", other)),
        }
    }
}

// Report payload returned by the backend for one period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportPayload {
    pub balance: String,
    #[serde(default)]
    pub credits: Option<u64>,
    #[serde(default)]
    pub usage: BTreeMap<String, u64>,
    pub charts: ChartSet,
    #[serde(default)]
    pub generated_at: Option<DateTime<Utc>>,
}

/// Chart-relevant subset of a payload. Two payloads with equal `ChartSet`s
/// render identical charts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSet {
    pub by_category: ChartSeries,
    pub timeline: ChartSeries,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChartSeries {
    pub labels: Vec<String>,
    #[serde(default)]
    pub datasets: Vec<Dataset>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub label: String,
    pub data: Vec<f64>,
    #[serde(default)]
    pub colors: Vec<String>,
}

impl ReportPayload {
    pub fn usage_total(&self) -> u64 {
        self.usage.values().sum()
    }

    /// Checks the shape the UI bindings rely on. Any violation means the
    /// backend sent something we must not render.
    pub fn validate(&self) -> Result<(), String> {
        if self.balance.trim().is_empty() {
            return Err("balance is empty".to_string());
        }

        for category in self.usage.keys() {
            let selector_safe = !category.is_empty()
                && category
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
            if !selector_safe {
                return Err(format!("invalid usage category '{}'", category));
            }
        }

        self.charts.by_category.validate("byCategory")?;
        self.charts.timeline.validate("timeline")
    }
}

impl ChartSeries {
    fn validate(&self, name: &str) -> Result<(), String> {
        let points = self.labels.len();
        for dataset in &self.datasets {
            if dataset.data.len() != points {
                return Err(format!(
                    "{}/{}: {} values for {} labels",
                    name,
                    dataset.label,
                    dataset.data.len(),
                    points
                ));
            }
            if dataset.data.iter().any(|v| !v.is_finite()) {
                return Err(format!("{}/{}: non-finite value", name, dataset.label));
            }
            let colors = dataset.colors.len();
            if colors > 1 && colors != points {
                return Err(format!(
                    "{}/{}: {} colors for {} labels",
                    name, dataset.label, colors, points
                ));
            }
        }
        Ok(())
    }
}

// Where the data handed to the render scheduler came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateSource {
    Cache,
    Network,
    RateLimitedCache,
}

impl UpdateSource {
    pub fn label(self) -> &'static str {
        match self {
            UpdateSource::Cache => "cache",
            UpdateSource::Network => "network",
            UpdateSource::RateLimitedCache => "cache (rate limited)",
        }
    }
}

// The single debounced unit of render work
#[derive(Debug, Clone)]
pub struct PendingUpdate {
    pub payload: Arc<ReportPayload>,
    pub source: UpdateSource,
    pub enqueued_at: Instant,
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn series(labels: &[&str], values: &[f64]) -> ChartSeries {
        ChartSeries {
            labels: labels.iter().map(|l| l.to_string()).collect(),
            datasets: vec![Dataset {
                label: "consultas".to_string(),
                data: values.to_vec(),
                colors: vec!["#4e73df".to_string()],
            }],
        }
    }

    pub fn payload(balance: &str, timeline: &[f64]) -> ReportPayload {
        let labels: Vec<String> = (1..=timeline.len()).map(|d| format!("d{}", d)).collect();
        let label_refs: Vec<&str> = labels.iter().map(String::as_str).collect();
        ReportPayload {
            balance: balance.to_string(),
            credits: Some(120),
            usage: BTreeMap::from([("protest".to_string(), 3), ("pricing".to_string(), 2)]),
            charts: ChartSet {
                by_category: series(&["protest", "pricing"], &[3.0, 2.0]),
                timeline: series(&label_refs, timeline),
            },
            generated_at: None,
        }
    }
}
