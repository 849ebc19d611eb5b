pub mod checks;
pub mod extract;
pub mod store;

use serde::{Deserialize, Serialize};

pub use checks::{merge_context, run_checks, CheckResult, EvidenceReport};
pub use extract::extract_context;
pub use store::{Check, Dataset, StoreError};

/// Identifier set a triage run works against, merged from heuristic
/// extraction and planner-declared values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceContext {
    pub email: Option<String>,
    pub org_id: Option<String>,
    pub project_name: Option<String>,
    pub dashboard_name: Option<String>,
    pub widget_title: Option<String>,
    pub metric_id: Option<String>,
}
