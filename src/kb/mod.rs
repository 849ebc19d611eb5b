use std::path::Path;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::shared::state::AppState;

/// Fallback background knowledge when no knowledge file is configured.
pub const DEFAULT_KNOWLEDGE: &str = "\
Product: a metrics dashboard SaaS. Organizations have users, projects, \
dashboards, widgets and metrics. Widgets render one metric each and can be \
hidden or archived by an admin. Feature rollouts are gated per organization.\n\
Plans: free (3 dashboards), pro (unlimited dashboards, API access), \
enterprise (SSO, granular RBAC, audit log).\n\
Common issues: widgets stop rendering when hidden, archived, or when their \
metric has no recent samples; access errors usually mean a missing project \
permission rather than an outage; billing questions go to the billing team.\n\
Support policy: urgent priority is reserved for production outages and data \
loss; password and invoice requests are never handled over tickets.";

pub fn load_knowledge(path: Option<&Path>) -> String {
    match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(text) => text,
            Err(err) => {
                warn!(
                    "could not read knowledge file {}: {err}; using built-in text",
                    p.display()
                );
                DEFAULT_KNOWLEDGE.to_string()
            }
        },
        None => DEFAULT_KNOWLEDGE.to_string(),
    }
}

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
    #[serde(default)]
    pub attach_kb: bool,
}

#[derive(Debug, Serialize)]
pub struct AskResponse {
    pub answer: String,
}

/// Single-shot Q&A over the background knowledge. A convenience endpoint
/// beside the triage pipeline, not part of it.
pub async fn ask(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AskRequest>,
) -> Result<Json<AskResponse>, (StatusCode, String)> {
    if req.question.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "question is required".to_string()));
    }

    let prompt = if req.attach_kb {
        format!(
            "Answer the customer question using the product knowledge below.\n\n\
             Knowledge:\n{}\n\nQuestion: {}",
            state.knowledge, req.question
        )
    } else {
        format!("Answer the customer question briefly.\n\nQuestion: {}", req.question)
    };
    let schema = serde_json::json!({
        "type": "object",
        "properties": {"answer": {"type": "string"}},
        "required": ["answer"]
    });

    let raw = state
        .oracle
        .complete_structured(&prompt, &schema)
        .await
        .map_err(|e| (StatusCode::BAD_GATEWAY, format!("oracle error: {e}")))?;
    let answer = raw
        .get("answer")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .ok_or_else(|| (StatusCode::BAD_GATEWAY, "oracle returned no answer".to_string()))?;
    Ok(Json(AskResponse {
        answer: answer.to_string(),
    }))
}

pub fn configure_kb_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/ask", post(ask))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_knowledge_file_falls_back_to_default() {
        let text = load_knowledge(Some(Path::new("/definitely/not/here.md")));
        assert_eq!(text, DEFAULT_KNOWLEDGE);
        assert_eq!(load_knowledge(None), DEFAULT_KNOWLEDGE);
    }

    #[test]
    fn configured_knowledge_file_wins() {
        let file = tempfile::NamedTempFile::new().expect("temp file");
        std::fs::write(file.path(), "custom knowledge").expect("write");
        assert_eq!(load_knowledge(Some(file.path())), "custom knowledge");
    }
}
