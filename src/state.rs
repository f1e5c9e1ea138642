use std::sync::Arc;
use crate::controller::DashboardController;
use crate::ui::{MemoryCharts, MemoryDisplay};

// app's shared state
#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<DashboardController>,
    pub display: Arc<MemoryDisplay>, // what the controller has rendered so far
    pub charts: Arc<MemoryCharts>,   // live chart widgets
}
