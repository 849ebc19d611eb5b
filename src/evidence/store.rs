use std::fs;
use std::path::Path;

use chrono::{Days, NaiveDate, Utc};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("could not read dataset file: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not parse dataset file: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Org {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub plan: String,
    pub active: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: String,
    pub org_id: String,
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub role: String,
    pub active: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Project {
    pub id: String,
    pub org_id: String,
    pub name: String,
    #[serde(default)]
    pub visibility: String,
    pub active: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Permission {
    pub user_id: String,
    pub project_id: String,
    #[serde(default)]
    pub scopes: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeatureFlag {
    pub key: String,
    #[serde(default)]
    pub enabled_for_orgs: Vec<String>,
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Dashboard {
    pub id: String,
    pub project_id: String,
    pub name: String,
    #[serde(default)]
    pub owner_user_id: Option<String>,
    pub active: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Widget {
    pub id: String,
    pub dashboard_id: String,
    #[serde(rename = "type", default)]
    pub widget_type: String,
    #[serde(default)]
    pub metric_id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub filters: Value,
    pub visible: bool,
    #[serde(default)]
    pub archived: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Metric {
    pub id: String,
    pub project_id: String,
    pub name: String,
    #[serde(default)]
    pub retention_days: u32,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricSample {
    pub metric_id: String,
    pub date: String,
    #[serde(default)]
    pub count: u64,
}

/// The whole evidence dataset, deserialized once from the fixture file.
/// Collections the triage checks do not consume (alerts, incidents, audit
/// logs) are ignored on load.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub orgs: Vec<Org>,
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub permissions: Vec<Permission>,
    #[serde(default)]
    pub feature_flags: Vec<FeatureFlag>,
    #[serde(default)]
    pub dashboards: Vec<Dashboard>,
    #[serde(default)]
    pub widgets: Vec<Widget>,
    #[serde(default)]
    pub metrics: Vec<Metric>,
    #[serde(default)]
    pub metric_samples: Vec<MetricSample>,
}

static DATASET: OnceCell<Dataset> = OnceCell::new();

/// Outcome of a single predicate. The check runner wraps this with the
/// predicate name.
#[derive(Debug, Clone, Serialize)]
pub struct Check {
    pub ok: bool,
    pub details: Value,
}

impl Check {
    fn pass(details: Value) -> Self {
        Self { ok: true, details }
    }

    fn fail(details: Value) -> Self {
        Self { ok: false, details }
    }
}

impl Dataset {
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Loads the dataset on first call and serves the same immutable copy
    /// for the rest of the process lifetime. Restart to refresh.
    pub fn cached(path: &Path) -> Result<&'static Dataset, StoreError> {
        DATASET.get_or_try_init(|| Self::load(path))
    }

    pub(crate) fn user_by_email(&self, email: &str) -> Option<&User> {
        self.users.iter().find(|u| u.email.eq_ignore_ascii_case(email))
    }

    fn project_in_org(&self, org_id: &str, name: &str) -> Option<&Project> {
        self.projects
            .iter()
            .find(|p| p.org_id == org_id && p.name.eq_ignore_ascii_case(name))
    }

    fn dashboard_in_project(&self, project_id: &str, name: &str) -> Option<&Dashboard> {
        self.dashboards
            .iter()
            .find(|d| d.project_id == project_id && d.name.eq_ignore_ascii_case(name))
    }

    fn widget_in_dashboard(&self, dashboard_id: &str, title: &str) -> Option<&Widget> {
        self.widgets
            .iter()
            .find(|w| w.dashboard_id == dashboard_id && w.title.eq_ignore_ascii_case(title))
    }

    /// Resolves the project -> dashboard -> widget chain, failing closed
    /// with a reason naming the first missing parent.
    pub(crate) fn resolve_widget(
        &self,
        org_id: &str,
        project_name: &str,
        dashboard_name: &str,
        title: &str,
    ) -> Result<&Widget, Check> {
        let project = self
            .project_in_org(org_id, project_name)
            .ok_or_else(|| Check::fail(json!({"reason": "project_not_found", "project": project_name})))?;
        let dashboard = self
            .dashboard_in_project(&project.id, dashboard_name)
            .ok_or_else(|| Check::fail(json!({"reason": "dashboard_not_found", "dashboard": dashboard_name})))?;
        self.widget_in_dashboard(&dashboard.id, title)
            .ok_or_else(|| Check::fail(json!({"reason": "widget_not_found", "title": title})))
    }

    pub fn user_is_active(&self, email: &str) -> Check {
        match self.user_by_email(email) {
            Some(user) if user.active => Check::pass(json!({
                "user_id": user.id,
                "org_id": user.org_id,
                "role": user.role,
            })),
            Some(user) => Check::fail(json!({"reason": "user_inactive", "user_id": user.id})),
            None => Check::fail(json!({"reason": "user_not_found", "email": email})),
        }
    }

    pub fn user_has_project_scope(&self, email: &str, project_name: &str, scope: &str) -> Check {
        let Some(user) = self.user_by_email(email) else {
            return Check::fail(json!({"reason": "user_not_found", "email": email}));
        };
        let Some(project) = self.project_in_org(&user.org_id, project_name) else {
            return Check::fail(json!({"reason": "project_not_found", "project": project_name}));
        };
        let Some(permission) = self
            .permissions
            .iter()
            .find(|p| p.user_id == user.id && p.project_id == project.id)
        else {
            return Check::fail(json!({
                "reason": "no_permission",
                "user_id": user.id,
                "project_id": project.id,
            }));
        };
        if permission.scopes.iter().any(|s| s == scope) {
            Check::pass(json!({
                "user_id": user.id,
                "project_id": project.id,
                "scopes": permission.scopes,
            }))
        } else {
            Check::fail(json!({
                "reason": "scope_missing",
                "wanted": scope,
                "scopes": permission.scopes,
            }))
        }
    }

    pub fn project_by_name(&self, org_id: &str, name: &str) -> Check {
        match self.project_in_org(org_id, name) {
            Some(project) => Check::pass(json!({
                "project_id": project.id,
                "name": project.name,
                "visibility": project.visibility,
                "active": project.active,
            })),
            None => Check::fail(json!({"reason": "project_not_found", "project": name})),
        }
    }

    pub fn dashboard_by_name(&self, org_id: &str, project_name: &str, name: &str) -> Check {
        let Some(project) = self.project_in_org(org_id, project_name) else {
            return Check::fail(json!({"reason": "project_not_found", "project": project_name}));
        };
        match self.dashboard_in_project(&project.id, name) {
            Some(dashboard) => Check::pass(json!({
                "dashboard_id": dashboard.id,
                "name": dashboard.name,
                "project_id": project.id,
                "active": dashboard.active,
            })),
            None => Check::fail(json!({"reason": "dashboard_not_found", "dashboard": name})),
        }
    }

    pub fn widget_by_title(
        &self,
        org_id: &str,
        project_name: &str,
        dashboard_name: &str,
        title: &str,
    ) -> Check {
        match self.resolve_widget(org_id, project_name, dashboard_name, title) {
            Ok(widget) => Check::pass(json!({
                "widget_id": widget.id,
                "title": widget.title,
                "metric_id": widget.metric_id,
                "visible": widget.visible,
                "archived": widget.archived,
            })),
            Err(check) => check,
        }
    }

    pub fn widget_is_visible(
        &self,
        org_id: &str,
        project_name: &str,
        dashboard_name: &str,
        title: &str,
    ) -> Check {
        let widget = match self.resolve_widget(org_id, project_name, dashboard_name, title) {
            Ok(widget) => widget,
            Err(check) => return check,
        };
        let details = json!({
            "widget_id": widget.id,
            "metric_id": widget.metric_id,
            "visible": widget.visible,
            "archived": widget.archived,
        });
        if widget.visible && !widget.archived {
            Check::pass(details)
        } else {
            let mut details = details;
            let reason = if widget.archived { "widget_archived" } else { "widget_hidden" };
            details["reason"] = json!(reason);
            Check::fail(details)
        }
    }

    pub fn metric_has_recent_data(&self, metric_id: &str, days: u64) -> Check {
        if !self.metrics.iter().any(|m| m.id == metric_id) {
            return Check::fail(json!({"reason": "metric_not_found", "metric_id": metric_id}));
        }
        let mut latest: Option<NaiveDate> = None;
        let mut samples = 0usize;
        for sample in self.metric_samples.iter().filter(|s| s.metric_id == metric_id) {
            samples += 1;
            if let Ok(date) = NaiveDate::parse_from_str(&sample.date, "%Y-%m-%d") {
                latest = Some(latest.map_or(date, |best| best.max(date)));
            }
        }
        let today = Utc::now().date_naive();
        let cutoff = today.checked_sub_days(Days::new(days)).unwrap_or(today);
        match latest {
            Some(date) if date >= cutoff => Check::pass(json!({
                "metric_id": metric_id,
                "latest": date.to_string(),
                "samples": samples,
            })),
            Some(date) => Check::fail(json!({
                "reason": "no_recent_data",
                "metric_id": metric_id,
                "latest": date.to_string(),
                "samples": samples,
            })),
            None => Check::fail(json!({
                "reason": "no_recent_data",
                "metric_id": metric_id,
                "samples": samples,
            })),
        }
    }

    pub fn feature_flag_enabled(&self, org_id: &str, key: &str) -> Check {
        let Some(flag) = self.feature_flags.iter().find(|f| f.key == key) else {
            return Check::fail(json!({"reason": "flag_not_found", "key": key}));
        };
        if !flag.enabled {
            return Check::fail(json!({"reason": "flag_disabled", "key": key}));
        }
        if !flag.enabled_for_orgs.is_empty() && !flag.enabled_for_orgs.iter().any(|o| o == org_id)
        {
            return Check::fail(json!({
                "reason": "org_not_enrolled",
                "key": key,
                "org_id": org_id,
            }));
        }
        Check::pass(json!({"key": key, "org_id": org_id}))
    }
}
