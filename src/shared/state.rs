use std::sync::Arc;

use crate::config::AppConfig;
use crate::evidence::Dataset;
use crate::helpdesk::HelpdeskClient;
use crate::llm::Oracle;

pub struct AppState {
    pub config: AppConfig,
    pub helpdesk: HelpdeskClient,
    pub oracle: Arc<dyn Oracle>,
    /// Loaded once at startup and immutable afterwards, so it needs no
    /// locking across requests.
    pub evidence: &'static Dataset,
    pub knowledge: String,
}
