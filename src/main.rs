use std::path::Path;
use std::sync::Arc;

use axum::routing::get;
use axum::{Json, Router};
use dotenvy::dotenv;
use log::info;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;

use triageserver::config::AppConfig;
use triageserver::evidence::Dataset;
use triageserver::helpdesk::HelpdeskClient;
use triageserver::kb;
use triageserver::llm::OpenAiOracle;
use triageserver::shared::state::AppState;
use triageserver::tickets;
use triageserver::triage;

async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::from_env();
    let evidence = Dataset::cached(Path::new(&config.evidence.dataset_path))?;
    info!(
        "evidence store loaded: {} orgs, {} users, {} widgets",
        evidence.orgs.len(),
        evidence.users.len(),
        evidence.widgets.len()
    );
    let knowledge = kb::load_knowledge(config.evidence.knowledge_path.as_deref().map(Path::new));

    let oracle = Arc::new(OpenAiOracle::new(
        config.llm.base_url.clone(),
        config.llm.api_key.clone(),
        config.llm.model.clone(),
    ));
    let helpdesk = HelpdeskClient::new(
        config.helpdesk.base_url.clone(),
        config.helpdesk.token.clone(),
    );
    let state = Arc::new(AppState {
        config: config.clone(),
        helpdesk,
        oracle,
        evidence,
        knowledge,
    });

    let app = Router::new()
        .merge(tickets::configure_tickets_routes())
        .merge(triage::configure_triage_routes())
        .merge(kb::configure_kb_routes())
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .with_state(state);

    info!(
        "Starting HTTP server on {}:{}",
        config.server.host, config.server.port
    );
    let listener =
        tokio::net::TcpListener::bind((config.server.host.as_str(), config.server.port)).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
