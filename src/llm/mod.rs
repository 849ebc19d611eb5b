use async_trait::async_trait;
use log::debug;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle returned an empty response")]
    Empty,
    /// Carries the raw model output so callers can show it back in a
    /// repair prompt.
    #[error("oracle output was not valid JSON")]
    SchemaViolation(String),
    #[error("oracle endpoint returned {0}")]
    Upstream(reqwest::StatusCode),
    #[error("oracle transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// The language-model collaborator, reduced to its one contract: given a
/// prompt and a target schema, come back with parsed structured output or
/// fail. Swapped for a scripted stub in the test suite.
#[async_trait]
pub trait Oracle: Send + Sync {
    async fn complete_structured(&self, prompt: &str, schema: &Value)
        -> Result<Value, OracleError>;
}

pub struct OpenAiOracle {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiOracle {
    pub fn new(base_url: String, api_key: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key,
            model,
        }
    }
}

fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    trimmed.strip_suffix("```").unwrap_or(trimmed).trim()
}

#[async_trait]
impl Oracle for OpenAiOracle {
    async fn complete_structured(
        &self,
        prompt: &str,
        schema: &Value,
    ) -> Result<Value, OracleError> {
        let system = format!(
            "Respond with a single JSON object matching this schema:\n{schema}\nOutput only the JSON object, with no prose and no markdown fences."
        );
        let response = self
            .client
            .post(format!(
                "{}/chat/completions",
                self.base_url.trim_end_matches('/')
            ))
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "model": self.model,
                "messages": [
                    {"role": "system", "content": system},
                    {"role": "user", "content": prompt}
                ],
                "temperature": 0,
                "max_tokens": 1000
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(OracleError::Upstream(response.status()));
        }

        let result: Value = response.json().await?;
        let content = result["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or("")
            .trim()
            .to_string();
        if content.is_empty() {
            return Err(OracleError::Empty);
        }

        let cleaned = strip_code_fence(&content);
        debug!("oracle output: {cleaned}");
        serde_json::from_str(cleaned).map_err(|_| OracleError::SchemaViolation(content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_fenced_output() {
        assert_eq!(strip_code_fence("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fence("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fence("  {\"a\": 1} "), "{\"a\": 1}");
    }
}
