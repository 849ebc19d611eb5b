use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use thiserror::Error;

use crate::helpdesk::HelpdeskError;
use crate::llm::OracleError;

#[derive(Debug, Error)]
pub enum TriageError {
    #[error("ticket not found")]
    TicketNotFound,
    #[error("ticket {0} already triaged; pass force=true to re-run")]
    AlreadyTriaged(u64),
    #[error("helpdesk request failed: {0}")]
    Helpdesk(HelpdeskError),
    #[error("oracle request failed: {0}")]
    Oracle(#[from] OracleError),
    #[error("triage verdict failed schema validation: {0}")]
    Schema(String),
}

impl From<HelpdeskError> for TriageError {
    fn from(err: HelpdeskError) -> Self {
        match err {
            HelpdeskError::NotFound => Self::TicketNotFound,
            other => Self::Helpdesk(other),
        }
    }
}

fn upstream_status(code: reqwest::StatusCode) -> StatusCode {
    StatusCode::from_u16(code.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY)
}

impl IntoResponse for TriageError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            Self::TicketNotFound => StatusCode::NOT_FOUND,
            Self::AlreadyTriaged(_) => StatusCode::CONFLICT,
            Self::Helpdesk(HelpdeskError::Forbidden(code)) => upstream_status(*code),
            Self::Helpdesk(HelpdeskError::RateLimited) => StatusCode::TOO_MANY_REQUESTS,
            Self::Helpdesk(_) => StatusCode::BAD_GATEWAY,
            Self::Oracle(_) | Self::Schema(_) => StatusCode::BAD_GATEWAY,
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
