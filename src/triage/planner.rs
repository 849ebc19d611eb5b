use log::warn;

use crate::helpdesk::Ticket;
use crate::llm::Oracle;

use super::schema::{plan_schema, TriagePlan};

fn build_plan_prompt(ticket: &Ticket) -> String {
    format!(
        "You are triaging a customer support ticket for a metrics dashboard product.\n\
         Decide whether the claims in the ticket should be verified against the customer database.\n\
         Set need_db to \"yes\" only when the ticket makes checkable factual claims about a \
         specific user, organization, project, dashboard, widget or metric.\n\
         Extract an identifier ONLY when it appears verbatim in the ticket text below; \
         use null for anything that is not literally present. Do not guess or complete names.\n\n\
         Ticket #{}\nSubject: {}\nDescription: {}\n",
        ticket.id, ticket.subject, ticket.description
    )
}

/// First oracle call: is evidence-gathering warranted, and which literal
/// identifiers does the ticket carry? Never fails: an oracle error or
/// malformed output degrades to the default plan (no database pass).
pub async fn plan_ticket(oracle: &dyn Oracle, ticket: &Ticket) -> TriagePlan {
    let prompt = build_plan_prompt(ticket);
    let raw = match oracle.complete_structured(&prompt, &plan_schema()).await {
        Ok(value) => value,
        Err(err) => {
            warn!("planner oracle failed for ticket {}: {err}; continuing without evidence", ticket.id);
            return TriagePlan::default();
        }
    };
    let text = format!("{}\n{}", ticket.subject, ticket.description);
    TriagePlan::from_value(&raw).sanitize(&text)
}
