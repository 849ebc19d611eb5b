use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::evidence::EvidenceContext;
use crate::helpdesk::TicketPriority;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketCategory {
    Billing,
    Bug,
    HowTo,
    Account,
    FeatureRequest,
    Other,
}

impl std::fmt::Display for TicketCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Billing => "billing",
            Self::Bug => "bug",
            Self::HowTo => "how_to",
            Self::Account => "account",
            Self::FeatureRequest => "feature_request",
            Self::Other => "other",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for TicketCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "billing" => Ok(Self::Billing),
            "bug" => Ok(Self::Bug),
            "how_to" => Ok(Self::HowTo),
            "account" => Ok(Self::Account),
            "feature_request" => Ok(Self::FeatureRequest),
            "other" => Ok(Self::Other),
            _ => Err(format!("Unknown category: {s}")),
        }
    }
}

/// Planner output. Parsed leniently, then sanitized: every identifier must
/// be a verbatim (case-insensitive) substring of the ticket text or it is
/// dropped, whatever the oracle claimed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TriagePlan {
    pub need_db: bool,
    pub notes: Option<String>,
    pub email: Option<String>,
    pub org_id: Option<String>,
    pub project_name: Option<String>,
    pub dashboard_name: Option<String>,
    pub widget_title: Option<String>,
    pub metric_id: Option<String>,
}

impl TriagePlan {
    /// Lenient read: malformed or extra fields are ignored, missing fields
    /// default, and `need_db` is yes only on the literal string "yes".
    pub fn from_value(raw: &Value) -> Self {
        fn field(raw: &Value, key: &str) -> Option<String> {
            raw.get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("null"))
                .map(String::from)
        }

        TriagePlan {
            need_db: raw
                .get("need_db")
                .and_then(Value::as_str)
                .map(|s| s.trim().eq_ignore_ascii_case("yes"))
                .unwrap_or(false),
            notes: field(raw, "notes"),
            email: field(raw, "email"),
            org_id: field(raw, "org_id"),
            project_name: field(raw, "project_name"),
            dashboard_name: field(raw, "dashboard_name"),
            widget_title: field(raw, "widget_title"),
            metric_id: field(raw, "metric_id"),
        }
    }

    /// Drops any identifier that is not literally present in the ticket
    /// text. This is what keeps hallucinated-but-plausible identifiers
    /// from driving evidence checks against the wrong entities.
    pub fn sanitize(mut self, ticket_text: &str) -> Self {
        let haystack = ticket_text.to_lowercase();
        let verbatim = |v: Option<String>| v.filter(|s| haystack.contains(&s.to_lowercase()));
        self.email = verbatim(self.email);
        self.org_id = verbatim(self.org_id);
        self.project_name = verbatim(self.project_name);
        self.dashboard_name = verbatim(self.dashboard_name);
        self.widget_title = verbatim(self.widget_title);
        self.metric_id = verbatim(self.metric_id);
        self
    }

    pub fn declared_context(&self) -> EvidenceContext {
        EvidenceContext {
            email: self.email.clone(),
            org_id: self.org_id.clone(),
            project_name: self.project_name.clone(),
            dashboard_name: self.dashboard_name.clone(),
            widget_title: self.widget_title.clone(),
            metric_id: self.metric_id.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriageVerdict {
    pub category: TicketCategory,
    pub priority: TicketPriority,
    pub language: String,
    pub tags: Vec<String>,
    pub summary: String,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_cause: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment_private: Option<String>,
}

fn required_str<'a>(obj: &'a Map<String, Value>, key: &str) -> Result<&'a str, String> {
    obj.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| format!("{key}: missing or not a string"))
}

fn optional_str(obj: &Map<String, Value>, key: &str) -> Result<Option<String>, String> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(format!("{key}: expected a string")),
    }
}

fn str_array(value: &Value, key: &str) -> Result<Vec<String>, String> {
    let items = value
        .as_array()
        .ok_or_else(|| format!("{key}: expected an array"))?;
    items
        .iter()
        .map(|item| {
            item.as_str()
                .map(String::from)
                .ok_or_else(|| format!("{key}: expected an array of strings"))
        })
        .collect()
}

impl TriageVerdict {
    /// Strict validation against the verdict schema. Returns the violated
    /// field on failure so the repair prompt can name it.
    pub fn from_value(raw: &Value) -> Result<Self, String> {
        let obj = raw
            .as_object()
            .ok_or_else(|| "expected a JSON object".to_string())?;

        let category = required_str(obj, "category")?
            .parse::<TicketCategory>()
            .map_err(|e| format!("category: {e}"))?;
        let priority = required_str(obj, "priority")?
            .parse::<TicketPriority>()
            .map_err(|e| format!("priority: {e}"))?;

        let language = required_str(obj, "language")?.trim().to_string();
        let lang_len = language.chars().count();
        if !(2..=8).contains(&lang_len) {
            return Err(format!("language: expected 2-8 characters, got {lang_len}"));
        }

        let tags = str_array(
            obj.get("tags").ok_or_else(|| "tags: missing".to_string())?,
            "tags",
        )?;
        if tags.len() > 10 {
            return Err(format!("tags: at most 10 allowed, got {}", tags.len()));
        }

        let summary = required_str(obj, "summary")?.trim().to_string();
        let summary_len = summary.chars().count();
        if !(10..=750).contains(&summary_len) {
            return Err(format!(
                "summary: expected 10-750 characters, got {summary_len}"
            ));
        }

        let confidence = obj
            .get("confidence")
            .and_then(Value::as_f64)
            .ok_or_else(|| "confidence: missing or not a number".to_string())?;
        if !(0.0..=1.0).contains(&confidence) {
            return Err(format!("confidence: expected 0..1, got {confidence}"));
        }

        let actions = match obj.get("actions") {
            None | Some(Value::Null) => None,
            Some(value) => Some(str_array(value, "actions")?),
        };

        Ok(TriageVerdict {
            category,
            priority,
            language,
            tags,
            summary,
            confidence,
            root_cause: optional_str(obj, "root_cause")?,
            actions,
            comment_private: optional_str(obj, "comment_private")?,
        })
    }
}

/// Schema handed to the oracle for the planning call.
pub fn plan_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "need_db": {"type": "string", "enum": ["yes", "no"]},
            "notes": {"type": ["string", "null"]},
            "email": {"type": ["string", "null"]},
            "org_id": {"type": ["string", "null"]},
            "project_name": {"type": ["string", "null"]},
            "dashboard_name": {"type": ["string", "null"]},
            "widget_title": {"type": ["string", "null"]},
            "metric_id": {"type": ["string", "null"]}
        },
        "required": ["need_db"]
    })
}

/// Schema handed to the oracle for the finalize call; mirrors the strict
/// validator above.
pub fn verdict_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "category": {"type": "string", "enum": ["billing", "bug", "how_to", "account", "feature_request", "other"]},
            "priority": {"type": "string", "enum": ["low", "normal", "high", "urgent"]},
            "language": {"type": "string", "minLength": 2, "maxLength": 8},
            "tags": {"type": "array", "items": {"type": "string"}, "maxItems": 10},
            "summary": {"type": "string", "minLength": 10, "maxLength": 750},
            "confidence": {"type": "number", "minimum": 0, "maximum": 1},
            "root_cause": {"type": ["string", "null"]},
            "actions": {"type": ["array", "null"], "items": {"type": "string"}},
            "comment_private": {"type": ["string", "null"]}
        },
        "required": ["category", "priority", "language", "tags", "summary", "confidence"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizer_nulls_identifiers_not_in_the_ticket() {
        let plan = TriagePlan {
            need_db: true,
            email: Some("jane@acme.com".into()),
            project_name: Some("Fraud Engine".into()),
            widget_title: Some("Revenue".into()),
            ..TriagePlan::default()
        };
        let text = "Dashboard broken\nWidget \"Revenue\" not loading for jane@acme.com";
        let sanitized = plan.sanitize(text);
        assert_eq!(sanitized.email.as_deref(), Some("jane@acme.com"));
        assert_eq!(sanitized.widget_title.as_deref(), Some("Revenue"));
        // Not present verbatim, so it goes, no matter how plausible.
        assert_eq!(sanitized.project_name, None);
    }

    #[test]
    fn sanitizer_matching_is_case_insensitive() {
        let plan = TriagePlan {
            project_name: Some("ACME SALES".into()),
            ..TriagePlan::default()
        };
        let sanitized = plan.sanitize("problems with acme sales again");
        assert_eq!(sanitized.project_name.as_deref(), Some("ACME SALES"));
    }

    #[test]
    fn need_db_defaults_to_no_on_anything_but_yes() {
        for raw in [
            json!({"need_db": "yes"}),
            json!({"need_db": " YES "}),
            json!({"need_db": "no"}),
            json!({"need_db": "maybe"}),
            json!({"need_db": true}),
            json!({}),
        ] {
            let plan = TriagePlan::from_value(&raw);
            let expected = raw["need_db"].as_str().map(|s| s.trim().eq_ignore_ascii_case("yes"));
            assert_eq!(plan.need_db, expected.unwrap_or(false), "input: {raw}");
        }
    }

    #[test]
    fn lenient_parse_skips_junk_fields() {
        let raw = json!({
            "need_db": "yes",
            "email": "  ",
            "org_id": "null",
            "project_name": 42,
            "widget_title": "Revenue",
            "unexpected": {"a": 1}
        });
        let plan = TriagePlan::from_value(&raw);
        assert!(plan.need_db);
        assert_eq!(plan.email, None);
        assert_eq!(plan.org_id, None);
        assert_eq!(plan.project_name, None);
        assert_eq!(plan.widget_title.as_deref(), Some("Revenue"));
    }

    fn valid_verdict() -> Value {
        json!({
            "category": "bug",
            "priority": "high",
            "language": "en",
            "tags": ["dashboard", "widget"],
            "summary": "The Revenue widget on the Ops Overview dashboard does not load.",
            "confidence": 0.82,
            "root_cause": "Widget is hidden",
            "actions": ["Unhide the widget"],
            "comment_private": null
        })
    }

    #[test]
    fn valid_verdict_passes() {
        let verdict = TriageVerdict::from_value(&valid_verdict()).expect("valid");
        assert_eq!(verdict.category, TicketCategory::Bug);
        assert_eq!(verdict.priority, TicketPriority::High);
        assert_eq!(verdict.tags.len(), 2);
        assert_eq!(verdict.comment_private, None);
    }

    #[test]
    fn verdict_bounds_are_enforced() {
        let mut short_summary = valid_verdict();
        short_summary["summary"] = json!("too short");
        assert!(TriageVerdict::from_value(&short_summary)
            .unwrap_err()
            .starts_with("summary"));

        let mut too_many_tags = valid_verdict();
        too_many_tags["tags"] = serde_json::to_value(vec!["a"; 11]).expect("serializable");
        assert!(TriageVerdict::from_value(&too_many_tags)
            .unwrap_err()
            .starts_with("tags"));

        let mut bad_category = valid_verdict();
        bad_category["category"] = json!("spam");
        assert!(TriageVerdict::from_value(&bad_category)
            .unwrap_err()
            .starts_with("category"));

        let mut bad_confidence = valid_verdict();
        bad_confidence["confidence"] = json!(1.5);
        assert!(TriageVerdict::from_value(&bad_confidence)
            .unwrap_err()
            .starts_with("confidence"));

        let mut bad_language = valid_verdict();
        bad_language["language"] = json!("x");
        assert!(TriageVerdict::from_value(&bad_language)
            .unwrap_err()
            .starts_with("language"));

        let mut typed_null = valid_verdict();
        typed_null["root_cause"] = json!(17);
        assert!(TriageVerdict::from_value(&typed_null)
            .unwrap_err()
            .starts_with("root_cause"));
    }
}
