use log::debug;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    New,
    Open,
    Pending,
    Hold,
    Solved,
    Closed,
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::New => "new",
            Self::Open => "open",
            Self::Pending => "pending",
            Self::Hold => "hold",
            Self::Solved => "solved",
            Self::Closed => "closed",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for TicketStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(Self::New),
            "open" => Ok(Self::Open),
            "pending" => Ok(Self::Pending),
            "hold" => Ok(Self::Hold),
            "solved" => Ok(Self::Solved),
            "closed" => Ok(Self::Closed),
            _ => Err(format!("Unknown ticket status: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketPriority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

impl std::fmt::Display for TicketPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Urgent => "urgent",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for TicketPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "normal" => Ok(Self::Normal),
            "high" => Ok(Self::High),
            "urgent" => Ok(Self::Urgent),
            _ => Err(format!("Unknown ticket priority: {s}")),
        }
    }
}

/// Ticket entity as the helpdesk returns it. The triage core never mutates
/// one of these; it computes a `TicketUpdate` delta and hands it back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub id: u64,
    pub subject: String,
    #[serde(default)]
    pub description: String,
    pub status: TicketStatus,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub priority: TicketPriority,
}

/// Partial update; omitted fields are left untouched by the helpdesk.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TicketUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<TicketPriority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<TicketComment>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TicketComment {
    pub body: String,
    pub public: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewTicket {
    pub subject: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<TicketPriority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requester_email: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

#[derive(Debug, Error)]
pub enum HelpdeskError {
    #[error("ticket not found")]
    NotFound,
    #[error("helpdesk rejected the request with {0}")]
    Forbidden(StatusCode),
    #[error("helpdesk rate limit hit")]
    RateLimited,
    #[error("helpdesk returned {0}")]
    Upstream(StatusCode),
    #[error("helpdesk transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

pub struct HelpdeskClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl HelpdeskClient {
    pub fn new(base_url: String, token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            token,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn check_status(response: reqwest::Response) -> Result<reqwest::Response, HelpdeskError> {
        match response.status() {
            s if s.is_success() => Ok(response),
            StatusCode::NOT_FOUND => Err(HelpdeskError::NotFound),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(HelpdeskError::Forbidden(response.status()))
            }
            StatusCode::TOO_MANY_REQUESTS => Err(HelpdeskError::RateLimited),
            s => Err(HelpdeskError::Upstream(s)),
        }
    }

    /// Lists tickets newest-first. The provider caps the page size on its
    /// side; the status filter is re-applied client-side before truncation.
    pub async fn list_tickets(
        &self,
        limit: usize,
        status: TicketStatus,
    ) -> Result<Vec<Ticket>, HelpdeskError> {
        let url = self.url(&format!("/tickets?status={status}&limit={limit}"));
        debug!("helpdesk list: {url}");
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;
        let page: Vec<Ticket> = Self::check_status(response)?.json().await?;
        Ok(page
            .into_iter()
            .filter(|t| t.status == status)
            .take(limit)
            .collect())
    }

    pub async fn get_ticket(&self, id: u64) -> Result<Ticket, HelpdeskError> {
        let response = self
            .client
            .get(self.url(&format!("/tickets/{id}")))
            .bearer_auth(&self.token)
            .send()
            .await?;
        Ok(Self::check_status(response)?.json().await?)
    }

    pub async fn update_ticket(&self, id: u64, update: &TicketUpdate) -> Result<(), HelpdeskError> {
        let response = self
            .client
            .put(self.url(&format!("/tickets/{id}")))
            .bearer_auth(&self.token)
            .json(update)
            .send()
            .await?;
        Self::check_status(response)?;
        Ok(())
    }

    pub async fn create_ticket(&self, ticket: &NewTicket) -> Result<Ticket, HelpdeskError> {
        let response = self
            .client
            .post(self.url("/tickets"))
            .bearer_auth(&self.token)
            .json(ticket)
            .send()
            .await?;
        Ok(Self::check_status(response)?.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_strings() {
        for raw in ["new", "open", "pending", "hold", "solved", "closed"] {
            let status: TicketStatus = raw.parse().expect("known status");
            assert_eq!(status.to_string(), raw);
        }
        assert!("escalated".parse::<TicketStatus>().is_err());
    }

    #[test]
    fn update_serializes_only_set_fields() {
        let update = TicketUpdate {
            priority: Some(TicketPriority::High),
            ..TicketUpdate::default()
        };
        let value = serde_json::to_value(&update).expect("serializable");
        assert_eq!(value, serde_json::json!({"priority": "high"}));
    }
}
