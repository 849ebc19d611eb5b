use log::warn;

use crate::evidence::EvidenceReport;
use crate::helpdesk::Ticket;
use crate::llm::{Oracle, OracleError};

use super::error::TriageError;
use super::schema::{verdict_schema, TriageVerdict};

fn build_finalize_prompt(
    ticket: &Ticket,
    knowledge: &str,
    evidence: Option<&EvidenceReport>,
) -> String {
    let mut prompt = format!(
        "Produce the final triage verdict for this customer support ticket.\n\
         Classify the category, set a priority, detect the language, pick up to 10 short tags, \
         and write a concise summary. Confidence is your own certainty in the classification.\n\n\
         Background knowledge:\n{knowledge}\n\n\
         Ticket #{}\nSubject: {}\nStatus: {}\nCurrent priority: {}\nDescription: {}\n",
        ticket.id, ticket.subject, ticket.status, ticket.priority, ticket.description
    );
    if let Some(report) = evidence {
        prompt.push_str(&format!(
            "\nDatabase evidence checks (trust these over the customer's claims):\n{}\n",
            serde_json::to_string_pretty(&report.checks).unwrap_or_default()
        ));
    }
    prompt
}

fn build_repair_prompt(invalid: &str, violation: &str) -> String {
    format!(
        "Your previous output was rejected: {violation}.\n\
         Previous output:\n{invalid}\n\n\
         Return a corrected JSON object that satisfies the schema exactly. Output JSON only."
    )
}

/// Second oracle call: the verdict itself. A malformed or schema-violating
/// result gets exactly one repair pass in which the oracle sees its own
/// rejected output; a second failure is fatal for this ticket.
pub async fn finalize_ticket(
    oracle: &dyn Oracle,
    ticket: &Ticket,
    knowledge: &str,
    evidence: Option<&EvidenceReport>,
) -> Result<TriageVerdict, TriageError> {
    let schema = verdict_schema();
    let prompt = build_finalize_prompt(ticket, knowledge, evidence);

    let (invalid, violation) = match oracle.complete_structured(&prompt, &schema).await {
        Ok(value) => match TriageVerdict::from_value(&value) {
            Ok(verdict) => return Ok(verdict),
            Err(violation) => (value.to_string(), violation),
        },
        Err(OracleError::SchemaViolation(raw)) => (raw, "output was not valid JSON".to_string()),
        Err(err) => return Err(err.into()),
    };

    warn!(
        "finalize output rejected for ticket {} ({violation}); attempting repair",
        ticket.id
    );
    let repaired = oracle
        .complete_structured(&build_repair_prompt(&invalid, &violation), &schema)
        .await?;
    TriageVerdict::from_value(&repaired).map_err(TriageError::Schema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct ScriptedOracle {
        responses: Mutex<VecDeque<Result<Value, OracleError>>>,
    }

    impl ScriptedOracle {
        fn new(responses: Vec<Result<Value, OracleError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
            }
        }
    }

    #[async_trait]
    impl Oracle for ScriptedOracle {
        async fn complete_structured(
            &self,
            _prompt: &str,
            _schema: &Value,
        ) -> Result<Value, OracleError> {
            self.responses
                .lock()
                .expect("oracle script lock")
                .pop_front()
                .expect("oracle script exhausted")
        }
    }

    fn ticket() -> Ticket {
        serde_json::from_value(json!({
            "id": 7,
            "subject": "Dashboard broken",
            "description": "Revenue widget not loading",
            "status": "open",
            "tags": [],
            "priority": "normal"
        }))
        .expect("valid ticket")
    }

    fn valid_verdict() -> Value {
        json!({
            "category": "bug",
            "priority": "high",
            "language": "en",
            "tags": ["dashboard"],
            "summary": "Customer reports the Revenue widget does not load.",
            "confidence": 0.8
        })
    }

    #[tokio::test]
    async fn repair_recovers_from_invalid_json() {
        let oracle = ScriptedOracle::new(vec![
            Err(OracleError::SchemaViolation("not json at all".into())),
            Ok(valid_verdict()),
        ]);
        let verdict = finalize_ticket(&oracle, &ticket(), "kb", None)
            .await
            .expect("repair should succeed");
        assert_eq!(verdict.summary, "Customer reports the Revenue widget does not load.");
    }

    #[tokio::test]
    async fn repair_recovers_from_schema_violation() {
        let mut broken = valid_verdict();
        broken["category"] = json!("spam");
        let oracle = ScriptedOracle::new(vec![Ok(broken), Ok(valid_verdict())]);
        let verdict = finalize_ticket(&oracle, &ticket(), "kb", None)
            .await
            .expect("repair should succeed");
        assert_eq!(verdict.confidence, 0.8);
    }

    #[tokio::test]
    async fn second_failure_is_fatal() {
        let oracle = ScriptedOracle::new(vec![
            Err(OracleError::SchemaViolation("garbage".into())),
            Ok(json!({"category": "bug"})),
        ]);
        let err = finalize_ticket(&oracle, &ticket(), "kb", None)
            .await
            .expect_err("second failure must be fatal");
        assert!(matches!(err, TriageError::Schema(_)));
    }
}
