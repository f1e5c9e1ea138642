use axum::{Json, extract::State, response::IntoResponse};
use crate::state::AppState;

pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "page": state.controller.page_id(),
        "period": state.controller.current_period(),
        "visible": state.controller.is_visible(),
        "refreshing": state.controller.is_refreshing(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}
