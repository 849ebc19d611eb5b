use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use crate::helpdesk::{HelpdeskError, NewTicket, Ticket, TicketPriority, TicketStatus};
use crate::shared::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTicketRequest {
    pub subject: String,
    pub description: String,
    pub priority: Option<TicketPriority>,
    pub requester_email: Option<String>,
    pub tags: Option<Vec<String>>,
}

fn upstream_code(err: &HelpdeskError) -> StatusCode {
    match err {
        HelpdeskError::NotFound => StatusCode::NOT_FOUND,
        HelpdeskError::Forbidden(code) => {
            StatusCode::from_u16(code.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY)
        }
        HelpdeskError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        _ => StatusCode::BAD_GATEWAY,
    }
}

pub async fn list_tickets(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Ticket>>, (StatusCode, String)> {
    let status = match &query.status {
        Some(raw) => raw
            .parse::<TicketStatus>()
            .map_err(|e| (StatusCode::BAD_REQUEST, e))?,
        None => TicketStatus::Open,
    };
    let limit = query.limit.unwrap_or(25).clamp(1, 100);
    let tickets = state
        .helpdesk
        .list_tickets(limit, status)
        .await
        .map_err(|e| (upstream_code(&e), format!("helpdesk error: {e}")))?;
    Ok(Json(tickets))
}

pub async fn create_ticket(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateTicketRequest>,
) -> Result<Json<Ticket>, (StatusCode, String)> {
    if req.subject.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "subject is required".to_string()));
    }
    if req.description.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "description is required".to_string()));
    }

    let new_ticket = NewTicket {
        subject: req.subject,
        description: req.description,
        priority: req.priority,
        requester_email: req.requester_email,
        tags: req.tags.unwrap_or_default(),
    };
    let ticket = state
        .helpdesk
        .create_ticket(&new_ticket)
        .await
        .map_err(|e| (upstream_code(&e), format!("helpdesk error: {e}")))?;
    Ok(Json(ticket))
}

pub fn configure_tickets_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/tickets", get(list_tickets).post(create_ticket))
}
