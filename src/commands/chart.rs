use crate::models::chart_types::Chart;
use crate::services::chart_service;
use crate::state::AppState;

/// Chart for the current collection, once every file has settled and no run
/// is in flight.
pub fn get_chart(state: &AppState) -> Option<Chart> {
    if state.store.is_running() {
        return None;
    }
    chart_service::build_chart(&state.store.snapshot())
}
