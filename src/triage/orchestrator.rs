use log::{debug, error, info};
use serde::Serialize;
use tokio::time::{sleep, Duration};

use crate::evidence::{extract_context, merge_context, run_checks, EvidenceReport};
use crate::helpdesk::{Ticket, TicketComment, TicketStatus, TicketUpdate};
use crate::shared::state::AppState;

use super::error::TriageError;
use super::schema::TriageVerdict;
use super::{finalizer, planner};

/// Tag marking a ticket as processed; the idempotency guard keys on it.
pub const TRIAGED_TAG: &str = "ai_triaged";

// Breather between tickets so a batch never bursts the helpdesk or the
// oracle rate limits.
const TICKET_PACING: Duration = Duration::from_millis(250);

#[derive(Debug)]
pub struct TriageOutcome {
    pub verdict: TriageVerdict,
    pub evidence: Option<EvidenceReport>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Updated,
    Error,
}

#[derive(Debug, Serialize)]
pub struct BatchEntry {
    pub id: u64,
    pub status: BatchStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SingleRunReport {
    pub id: u64,
    pub verdict: TriageVerdict,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence: Option<EvidenceReport>,
}

pub fn ticket_text(ticket: &Ticket) -> String {
    format!("{}\n{}", ticket.subject, ticket.description)
}

/// Plan, optionally gather evidence, finalize. Pure pipeline; the helpdesk
/// write-back happens in `process_ticket`.
pub async fn triage_ticket(state: &AppState, ticket: &Ticket) -> Result<TriageOutcome, TriageError> {
    let plan = planner::plan_ticket(state.oracle.as_ref(), ticket).await;
    debug!("plan for ticket {}: need_db={}", ticket.id, plan.need_db);

    let evidence = if plan.need_db {
        let extracted = extract_context(state.evidence, &ticket_text(ticket));
        let context = merge_context(state.evidence, extracted, plan.declared_context());
        Some(run_checks(state.evidence, context))
    } else {
        None
    };

    let verdict = finalizer::finalize_ticket(
        state.oracle.as_ref(),
        ticket,
        &state.knowledge,
        evidence.as_ref(),
    )
    .await?;
    Ok(TriageOutcome { verdict, evidence })
}

/// Tag union preserving first-seen order: existing tags, then the triage
/// markers, then whatever the verdict adds.
pub fn merged_tags(existing: &[String], verdict: &TriageVerdict) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    {
        let mut add = |tag: &str| {
            if !tag.is_empty() && !tags.iter().any(|t| t == tag) {
                tags.push(tag.to_string());
            }
        };
        for tag in existing {
            add(tag);
        }
        add(TRIAGED_TAG);
        add(&format!("cat_{}", verdict.category));
        for tag in &verdict.tags {
            add(tag);
        }
    }
    tags
}

pub fn private_comment(verdict: &TriageVerdict, evidence: Option<&EvidenceReport>) -> String {
    let mut body = format!(
        "Automated triage\n----------------\nCategory: {}\nPriority: {}\nConfidence: {:.2}\nSummary: {}\n",
        verdict.category, verdict.priority, verdict.confidence, verdict.summary
    );
    if let Some(cause) = &verdict.root_cause {
        body.push_str(&format!("Root cause: {cause}\n"));
    }
    if let Some(report) = evidence {
        body.push_str("Evidence:\n");
        for check in &report.checks {
            let mark = if check.ok { "ok" } else { "fail" };
            body.push_str(&format!("  [{mark}] {}: {}\n", check.name, check.details));
        }
    }
    if let Some(actions) = &verdict.actions {
        if !actions.is_empty() {
            body.push_str("Suggested actions:\n");
            for action in actions {
                body.push_str(&format!("  - {action}\n"));
            }
        }
    }
    if let Some(note) = &verdict.comment_private {
        body.push_str(&format!("Note: {note}\n"));
    }
    body
}

async fn apply_verdict(
    state: &AppState,
    ticket: &Ticket,
    outcome: &TriageOutcome,
) -> Result<(), TriageError> {
    let update = TicketUpdate {
        tags: Some(merged_tags(&ticket.tags, &outcome.verdict)),
        priority: Some(outcome.verdict.priority),
        comment: Some(TicketComment {
            body: private_comment(&outcome.verdict, outcome.evidence.as_ref()),
            public: false,
        }),
    };
    state.helpdesk.update_ticket(ticket.id, &update).await?;
    Ok(())
}

async fn process_ticket(state: &AppState, ticket: &Ticket) -> Result<TriageOutcome, TriageError> {
    let outcome = triage_ticket(state, ticket).await?;
    apply_verdict(state, ticket, &outcome).await?;
    Ok(outcome)
}

fn already_triaged(ticket: &Ticket) -> bool {
    ticket.tags.iter().any(|tag| tag == TRIAGED_TAG)
}

/// Triage one ticket by id. Rejects with a conflict when the ticket is
/// already tagged unless `force` is set.
pub async fn run_single(
    state: &AppState,
    id: u64,
    force: bool,
) -> Result<SingleRunReport, TriageError> {
    let ticket = state.helpdesk.get_ticket(id).await?;
    if already_triaged(&ticket) && !force {
        return Err(TriageError::AlreadyTriaged(id));
    }
    let outcome = process_ticket(state, &ticket).await?;
    info!(
        "ticket {} triaged: category={} priority={}",
        id, outcome.verdict.category, outcome.verdict.priority
    );
    Ok(SingleRunReport {
        id,
        verdict: outcome.verdict,
        evidence: outcome.evidence,
    })
}

/// Triage up to `limit` open tickets sequentially. Per-ticket failures are
/// recorded and the loop continues; only the initial listing can fail the
/// batch as a whole.
pub async fn run_batch(state: &AppState, limit: usize) -> Result<Vec<BatchEntry>, TriageError> {
    let tickets = state.helpdesk.list_tickets(limit, TicketStatus::Open).await?;
    let candidates: Vec<Ticket> = tickets
        .into_iter()
        .filter(|t| !already_triaged(t))
        .collect();
    info!("triage batch: {} candidate ticket(s)", candidates.len());

    let mut entries = Vec::with_capacity(candidates.len());
    for (index, ticket) in candidates.iter().enumerate() {
        if index > 0 {
            sleep(TICKET_PACING).await;
        }
        match process_ticket(state, ticket).await {
            Ok(_) => entries.push(BatchEntry {
                id: ticket.id,
                status: BatchStatus::Updated,
                detail: None,
            }),
            Err(err) => {
                error!("triage failed for ticket {}: {err}", ticket.id);
                entries.push(BatchEntry {
                    id: ticket.id,
                    status: BatchStatus::Error,
                    detail: Some(err.to_string()),
                });
            }
        }
    }
    Ok(entries)
}
