use std::env;

#[derive(Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub helpdesk: HelpdeskConfig,
    pub llm: LlmConfig,
    pub evidence: EvidenceConfig,
}

#[derive(Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Clone)]
pub struct HelpdeskConfig {
    pub base_url: String,
    pub token: String,
}

#[derive(Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

#[derive(Clone)]
pub struct EvidenceConfig {
    pub dataset_path: String,
    pub knowledge_path: Option<String>,
}

fn get_str(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

impl AppConfig {
    pub fn from_env() -> Self {
        AppConfig {
            server: ServerConfig {
                host: get_str("SERVER_HOST", "127.0.0.1"),
                port: env::var("SERVER_PORT")
                    .ok()
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(8080),
            },
            helpdesk: HelpdeskConfig {
                base_url: get_str("HELPDESK_BASE_URL", "http://localhost:3001"),
                token: get_str("HELPDESK_TOKEN", ""),
            },
            llm: LlmConfig {
                base_url: get_str("LLM_BASE_URL", "http://localhost:8081/v1"),
                api_key: get_str("LLM_API_KEY", "empty"),
                model: get_str("LLM_MODEL", "gpt-4o-mini"),
            },
            evidence: EvidenceConfig {
                dataset_path: get_str("MOCK_DB_PATH", "mock_db.json"),
                knowledge_path: env::var("KNOWLEDGE_PATH").ok(),
            },
        }
    }
}
