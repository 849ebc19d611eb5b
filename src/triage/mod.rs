pub mod error;
pub mod finalizer;
pub mod orchestrator;
pub mod planner;
pub mod schema;

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::shared::state::AppState;

pub use error::TriageError;
pub use orchestrator::TRIAGED_TAG;
pub use schema::{TicketCategory, TriagePlan, TriageVerdict};

const DEFAULT_BATCH_LIMIT: usize = 10;
const MAX_BATCH_LIMIT: usize = 50;

#[derive(Debug, Deserialize)]
pub struct RunQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct ForceQuery {
    pub force: Option<bool>,
}

pub async fn handle_run_batch(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RunQuery>,
) -> Result<Json<Value>, TriageError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_BATCH_LIMIT)
        .clamp(1, MAX_BATCH_LIMIT);
    let entries = orchestrator::run_batch(&state, limit).await?;
    Ok(Json(json!({
        "processed": entries.len(),
        "results": entries,
    })))
}

pub async fn handle_triage_ticket(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Query(query): Query<ForceQuery>,
) -> Result<Json<orchestrator::SingleRunReport>, TriageError> {
    let report = orchestrator::run_single(&state, id, query.force.unwrap_or(false)).await?;
    Ok(Json(report))
}

pub fn configure_triage_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/triage/run", post(handle_run_batch))
        .route("/api/tickets/:id/triage", post(handle_triage_ticket))
}
