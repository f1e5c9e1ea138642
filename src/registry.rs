//! Process-wide controller registry, one controller per page.
//!
//! A second construction for the same page gets the existing instance back,
//! so timers and network traffic are never doubled. Teardown frees the slot.

use dashmap::DashMap;
use lazy_static::lazy_static;
use std::sync::Arc;

use crate::controller::DashboardController;

lazy_static! {
    static ref CONTROLLERS: DashMap<String, Arc<DashboardController>> = DashMap::new();
}

// existing controller for the page, or the one `build` creates
pub(crate) fn obtain<F>(page_id: &str, build: F) -> Arc<DashboardController>
where
    F: FnOnce() -> Arc<DashboardController>,
{
    CONTROLLERS
        .entry(page_id.to_string())
        .or_insert_with(build)
        .value()
        .clone()
}

pub fn lookup(page_id: &str) -> Option<Arc<DashboardController>> {
    CONTROLLERS.get(page_id).map(|c| Arc::clone(c.value()))
}

// frees the slot only if it still holds this very controller
pub(crate) fn release(page_id: &str, controller: &DashboardController) -> bool {
    CONTROLLERS
        .remove_if(page_id, |_, held| std::ptr::eq(Arc::as_ptr(held), controller))
        .is_some()
}
