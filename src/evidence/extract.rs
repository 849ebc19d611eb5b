use once_cell::sync::Lazy;
use regex::Regex;

use super::store::Dataset;
use super::EvidenceContext;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("email regex")
});

// Quoted segments between 3 and 80 chars are treated as candidate widget
// titles before any substring fallback.
static QUOTED_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#""([^"]{3,80})""#).expect("quote regex"));

/// Best-effort identifier guesses from raw ticket text. Purely literal:
/// nothing is inferred beyond substring containment against names the
/// store already knows.
pub fn extract_context(data: &Dataset, text: &str) -> EvidenceContext {
    let lower = text.to_lowercase();

    let email = EMAIL_RE.find(text).map(|m| m.as_str().to_lowercase());
    // Org only ever comes from a resolved user; an unknown email leaves it
    // unset rather than guessing.
    let org_id = email
        .as_deref()
        .and_then(|e| data.user_by_email(e))
        .map(|u| u.org_id.clone());

    let project_name = longest_match(&lower, data.projects.iter().map(|p| p.name.as_str()));
    let dashboard_name = longest_match(&lower, data.dashboards.iter().map(|d| d.name.as_str()));

    let quoted_title = QUOTED_RE
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .find_map(|m| {
            data.widgets
                .iter()
                .find(|w| w.title.eq_ignore_ascii_case(m.as_str()))
                .map(|w| w.title.clone())
        });
    let widget_title = quoted_title
        .or_else(|| longest_match(&lower, data.widgets.iter().map(|w| w.title.as_str())));

    // A metric is only trusted when the full chain resolves consistently;
    // it is then read off the resolved widget.
    let metric_id = match (&org_id, &project_name, &dashboard_name, &widget_title) {
        (Some(org), Some(project), Some(dashboard), Some(title)) => data
            .resolve_widget(org, project, dashboard, title)
            .ok()
            .and_then(|w| w.metric_id.clone()),
        _ => None,
    };

    EvidenceContext {
        email,
        org_id,
        project_name,
        dashboard_name,
        widget_title,
        metric_id,
    }
}

/// Longest known name appearing as a case-insensitive substring of the
/// text; length breaks ties toward the more specific name when one name
/// contains another.
fn longest_match<'a>(haystack_lower: &str, names: impl Iterator<Item = &'a str>) -> Option<String> {
    let mut best: Option<&str> = None;
    for name in names {
        if name.is_empty() || !haystack_lower.contains(&name.to_lowercase()) {
            continue;
        }
        if best.map_or(true, |b| name.len() > b.len()) {
            best = Some(name);
        }
    }
    best.map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dataset() -> Dataset {
        serde_json::from_value(json!({
            "orgs": [{"id": "org_1", "name": "Acme Inc", "plan": "pro", "active": true}],
            "users": [{"id": "usr_1", "org_id": "org_1", "email": "jane@acme.com", "active": true}],
            "projects": [
                {"id": "prj_1", "org_id": "org_1", "name": "Acme Sales", "active": true},
                {"id": "prj_2", "org_id": "org_1", "name": "Sales", "active": true}
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

    #[test]
    fn resolves_the_dashboard_example_ticket() {
        let data = dataset();
        let text = "Dashboard broken\nWidget \"Revenue\" on Acme Sales not loading for jane@acme.com";
        let ctx = extract_context(&data, text);
        assert_eq!(ctx.email.as_deref(), Some("jane@acme.com"));
        assert_eq!(ctx.org_id.as_deref(), Some("org_1"));
        assert_eq!(ctx.project_name.as_deref(), Some("Acme Sales"));
        assert_eq!(ctx.widget_title.as_deref(), Some("Revenue"));
    }

    #[test]
    fn prefers_the_longest_project_name() {
        let data = dataset();
        let ctx = extract_context(&data, "Numbers on acme sales look wrong");
        // Both "Sales" and "Acme Sales" are substrings; the longer wins.
        assert_eq!(ctx.project_name.as_deref(), Some("Acme Sales"));
    }

    #[test]
    fn unknown_email_leaves_org_unset() {
        let data = dataset();
        let ctx = extract_context(&data, "Login fails for ghost@nowhere.dev");
        assert_eq!(ctx.email.as_deref(), Some("ghost@nowhere.dev"));
        assert_eq!(ctx.org_id, None);
    }

    #[test]
    fn metric_requires_a_consistent_chain() {
        let data = dataset();
        let full = extract_context(
            &data,
            "jane@acme.com reports \"Revenue\" on Ops Overview in Acme Sales is stuck",
        );
        assert_eq!(full.metric_id.as_deref(), Some("m_1"));

        let partial = extract_context(&data, "jane@acme.com reports \"Revenue\" is stuck");
        assert_eq!(partial.metric_id, None);
    }
}
