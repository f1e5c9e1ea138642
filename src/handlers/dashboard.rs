use axum::{
    Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

use crate::controller::RefreshOutcome;
use crate::models::Period;
use crate::state::AppState;
use crate::ui::ChartConfig;
use crate::ui::memory::DisplaySnapshot;

#[derive(Deserialize)]
pub struct VisibilityRequest {
    pub visible: bool,
}

#[derive(Serialize)]
pub struct VisibilityResponse {
    pub visible: bool,
    pub refresh: Option<RefreshOutcome>,
}

#[derive(Serialize)]
pub struct DisplayResponse {
    pub period: Period,
    pub loading: bool,
    pub cache_age_secs: BTreeMap<Period, f64>,
    pub display: DisplaySnapshot,
    pub charts: BTreeMap<String, ChartConfig>,
}

// everything the controller has written to the UI so far
pub async fn display_handler(State(state): State<AppState>) -> Json<DisplayResponse> {
    let cache_age_secs = Period::ALL
        .into_iter()
        .filter_map(|p| state.controller.cache_age(p).map(|age| (p, age.as_secs_f64())))
        .collect();

    Json(DisplayResponse {
        period: state.controller.current_period(),
        loading: state.controller.is_loading(),
        cache_age_secs,
        display: state.display.snapshot(),
        charts: state.charts.live(),
    })
}

// manual refresh of the selected period
pub async fn refresh_handler(State(state): State<AppState>) -> Json<RefreshOutcome> {
    Json(state.controller.refresh_current().await)
}

pub async fn change_period_handler(
    State(state): State<AppState>,
    Path(period): Path<Period>,
) -> Json<RefreshOutcome> {
    Json(state.controller.change_period(period).await)
}

pub async fn visibility_handler(
    State(state): State<AppState>,
    Json(req): Json<VisibilityRequest>,
) -> Json<VisibilityResponse> {
    let refresh = state.controller.set_visibility(req.visible).await;
    Json(VisibilityResponse {
        visible: req.visible,
        refresh,
    })
}

pub async fn dismiss_notifications_handler(
    State(state): State<AppState>,
) -> Json<serde_json::Value> {
    let dismissed = state.display.dismiss_notifications();
    info!(dismissed, "notifications dismissed");
    Json(serde_json::json!({ "dismissed": dismissed }))
}
