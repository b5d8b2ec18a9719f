//! Call counter snapshot.

use std::collections::BTreeMap;

use axum::Json;
use axum::extract::State;

use crate::state::AppState;

/// GET /chats/metrics - Process-lifetime call counters.
pub async fn get_metrics(State(state): State<AppState>) -> Json<BTreeMap<String, u64>> {
    Json(state.metrics.snapshot())
}

#[cfg(test)]
mod tests {
    use super::*;
    use forkline_types::agent::AgentMode;

    use crate::testing::test_state;

    #[tokio::test]
    async fn test_metrics_snapshot_reflects_counters() {
        let (state, _) = test_state(AgentMode::Stateful).await;
        state.metrics.inc("forks_created");
        state.metrics.inc("forks_created");

        let Json(snapshot) = get_metrics(State(state.clone())).await;
        assert_eq!(snapshot.get("forks_created"), Some(&2));
    }
}
