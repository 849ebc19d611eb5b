use serde::Serialize;
use serde_json::Value;

use super::store::{Check, Dataset};
use super::EvidenceContext;

/// Scope every ticket-driven access check is verified against.
pub const PROJECT_SCOPE: &str = "viewer";

// The one org-level flag worth surfacing on dashboard tickets: the grid
// rollout is the usual suspect when rendering breaks.
const ORG_FLAG_KEY: &str = "widgets.grid_v2";

#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub name: String,
    pub ok: bool,
    pub details: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvidenceReport {
    pub context: EvidenceContext,
    pub checks: Vec<CheckResult>,
}

/// Merges heuristically extracted context with planner-declared values;
/// declared wins wherever it is non-empty. The org is re-derived from the
/// resolved user when the two disagree, since every later lookup scopes
/// through it.
pub fn merge_context(
    data: &Dataset,
    extracted: EvidenceContext,
    declared: EvidenceContext,
) -> EvidenceContext {
    fn pick(declared: Option<String>, extracted: Option<String>) -> Option<String> {
        declared.filter(|v| !v.trim().is_empty()).or(extracted)
    }

    let mut context = EvidenceContext {
        email: pick(declared.email, extracted.email),
        org_id: pick(declared.org_id, extracted.org_id),
        project_name: pick(declared.project_name, extracted.project_name),
        dashboard_name: pick(declared.dashboard_name, extracted.dashboard_name),
        widget_title: pick(declared.widget_title, extracted.widget_title),
        metric_id: pick(declared.metric_id, extracted.metric_id),
    };

    if let Some(email) = context.email.clone() {
        if let Some(user) = data.user_by_email(&email) {
            if context.org_id.as_deref() != Some(user.org_id.as_str()) {
                context.org_id = Some(user.org_id.clone());
            }
        }
    }

    context
}

/// Runs the applicable predicates in dependency order: user, then org
/// flag, then project and access scope, then dashboard, widget and metric.
/// A check whose prerequisite fields are absent is skipped entirely —
/// absence of evidence is not negative evidence.
pub fn run_checks(data: &Dataset, context: EvidenceContext) -> EvidenceReport {
    let mut context = context;
    let mut checks: Vec<CheckResult> = Vec::new();
    let mut push = |name: &str, check: Check| {
        checks.push(CheckResult {
            name: name.to_string(),
            ok: check.ok,
            details: check.details,
        });
    };

    if let Some(email) = context.email.clone() {
        push("user_is_active", data.user_is_active(&email));
    }

    if let Some(org_id) = context.org_id.clone() {
        push(
            "feature_flag_enabled",
            data.feature_flag_enabled(&org_id, ORG_FLAG_KEY),
        );

        if let Some(project) = context.project_name.clone() {
            push("project_by_name", data.project_by_name(&org_id, &project));
            if let Some(email) = context.email.clone() {
                push(
                    "user_has_project_scope",
                    data.user_has_project_scope(&email, &project, PROJECT_SCOPE),
                );
            }

            if let Some(dashboard) = context.dashboard_name.clone() {
                push(
                    "dashboard_by_name",
                    data.dashboard_by_name(&org_id, &project, &dashboard),
                );

                if let Some(widget) = context.widget_title.clone() {
                    let check = data.widget_is_visible(&org_id, &project, &dashboard, &widget);
                    if context.metric_id.is_none() {
                        context.metric_id = check
                            .details
                            .get("metric_id")
                            .and_then(Value::as_str)
                            .map(String::from);
                    }
                    push("widget_is_visible", check);
                }
            }
        }
    }

    if let Some(metric_id) = context.metric_id.clone() {
        push(
            "metric_has_recent_data",
            data.metric_has_recent_data(&metric_id, 1),
        );
    }

    EvidenceReport { context, checks }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dataset() -> Dataset {
        serde_json::from_value(json!({
            "orgs": [
                {"id": "org_1", "name": "Acme Inc", "active": true},
                {"id": "org_2", "name": "Globex", "active": true}
            ],
            "users": [
                {"id": "usr_1", "org_id": "org_1", "email": "jane@acme.com", "active": true}
            ],
            "projects": [
                {"id": "prj_1", "org_id": "org_1", "name": "Acme Sales", "active": true}
            ],
            "permissions": [
                {"user_id": "usr_1", "project_id": "prj_1", "scopes": ["viewer"]}
            ],
            "feature_flags": [
                {"key": "widgets.grid_v2", "enabled_for_orgs": [], "enabled": true}
            ],
            "dashboards": [
                {"id": "db_1", "project_id": "prj_1", "name": "Ops Overview", "active": true}
            ],
            "widgets": [
                {"id": "w_1", "dashboard_id": "db_1", "type": "timeseries", "metric_id": "m_1", "title": "Revenue", "visible": false, "archived": false}
            ]
        }))
        .expect("valid test dataset")
    }

    fn names(report: &EvidenceReport) -> Vec<&str> {
        report.checks.iter().map(|c| c.name.as_str()).collect()
    }

    #[test]
    fn missing_project_skips_dependent_checks() {
        let data = dataset();
        let context = EvidenceContext {
            email: Some("jane@acme.com".into()),
            org_id: Some("org_1".into()),
            dashboard_name: Some("Ops Overview".into()),
            widget_title: Some("Revenue".into()),
            ..EvidenceContext::default()
        };
        let report = run_checks(&data, context);
        assert_eq!(names(&report), vec!["user_is_active", "feature_flag_enabled"]);
    }

    #[test]
    fn full_context_runs_the_whole_chain_in_order() {
        let data = dataset();
        let context = EvidenceContext {
            email: Some("jane@acme.com".into()),
            org_id: Some("org_1".into()),
            project_name: Some("Acme Sales".into()),
            dashboard_name: Some("Ops Overview".into()),
            widget_title: Some("Revenue".into()),
            ..EvidenceContext::default()
        };
        let report = run_checks(&data, context);
        assert_eq!(
            names(&report),
            vec![
                "user_is_active",
                "feature_flag_enabled",
                "project_by_name",
                "user_has_project_scope",
                "dashboard_by_name",
                "widget_is_visible",
                "metric_has_recent_data",
            ]
        );
        // The hidden widget fails while the rest of the chain resolves.
        let widget = report.checks.iter().find(|c| c.name == "widget_is_visible").unwrap();
        assert!(!widget.ok);
        // The metric came off the widget lookup even though it failed.
        assert_eq!(report.context.metric_id.as_deref(), Some("m_1"));
    }

    #[test]
    fn declared_values_beat_extracted_ones() {
        let data = dataset();
        let extracted = EvidenceContext {
            email: Some("jane@acme.com".into()),
            project_name: Some("Acme Sales".into()),
            ..EvidenceContext::default()
        };
        let declared = EvidenceContext {
            project_name: Some("Billing".into()),
            widget_title: Some("".into()),
            ..EvidenceContext::default()
        };
        let merged = merge_context(&data, extracted, declared);
        assert_eq!(merged.project_name.as_deref(), Some("Billing"));
        // Empty declared strings do not shadow extracted values.
        assert_eq!(merged.widget_title, None);
        assert_eq!(merged.email.as_deref(), Some("jane@acme.com"));
    }

    #[test]
    fn org_follows_the_resolved_user() {
        let data = dataset();
        let extracted = EvidenceContext {
            email: Some("jane@acme.com".into()),
            org_id: Some("org_2".into()),
            ..EvidenceContext::default()
        };
        let merged = merge_context(&data, extracted, EvidenceContext::default());
        assert_eq!(merged.org_id.as_deref(), Some("org_1"));
    }
}
