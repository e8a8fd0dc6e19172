use anyhow::Result;
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub llm: LLMConfig,
    pub storage: StorageConfig,
    pub drive: DriveConfig,
    pub parser: ParserConfig,
    pub auth: AuthConfig,
    pub limits: LimitsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub cors_allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LLMConfig {
    pub openai_api_key: String,
    pub anthropic_api_key: String,
    pub openrouter_api_key: String,
    pub default_provider: String,
    pub default_model: String,
    pub embedding_model: String,
}

impl LLMConfig {
    /// API key for a provider name, falling back to the default provider's key.
    pub fn api_key_for(&self, provider: &str) -> Option<String> {
        let key = match provider {
            "openai" => &self.openai_api_key,
            "anthropic" => &self.anthropic_api_key,
            "openrouter" => &self.openrouter_api_key,
            _ => return None,
        };
        if key.is_empty() {
            None
        } else {
            Some(key.clone())
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub s3_bucket: String,
    pub s3_region: String,
    pub s3_access_key_id: Option<String>,
    pub s3_secret_access_key: Option<String>,
    pub s3_endpoint: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DriveConfig {
    pub api_base: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParserConfig {
    pub api_base: String,
    pub api_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub secret: String,
    pub mode: String,
}

/// Timeout and retrieval budgets. The upstream services carry no timeouts of
/// their own; every external call in the pipeline is bounded by one of these.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    pub completion_timeout_secs: u64,
    pub embedding_timeout_secs: u64,
    pub search_timeout_secs: u64,
    pub parse_timeout_secs: u64,
    pub max_context_documents: usize,
    pub document_excerpt_chars: usize,
    pub max_playbook_entries: usize,
    pub max_drive_files: usize,
    pub similarity_threshold: f64,
    pub match_count: i32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            server: ServerConfig {
                port: env::var("PORT")
                    .unwrap_or_else(|_| "3000".to_string())
                    .parse()?,
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                cors_allowed_origins: env::var("ALLOWED_ORIGINS")
                    .unwrap_or_else(|_| "http://localhost:3000,http://localhost:5173".to_string())
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .collect(),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL")
                    .expect("DATABASE_URL must be set"),
                max_connections: env::var("DB_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()?,
                min_connections: env::var("DB_MIN_CONNECTIONS")
                    .unwrap_or_else(|_| "1".to_string())
                    .parse()?,
            },
            redis: RedisConfig {
                url: env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string()),
                enabled: env::var("USE_REDIS_EVENTS")
                    .unwrap_or_else(|_| "false".to_string())
                    .parse()?,
            },
            llm: LLMConfig {
                openai_api_key: env::var("OPENAI_API_KEY").unwrap_or_default(),
                anthropic_api_key: env::var("ANTHROPIC_API_KEY").unwrap_or_default(),
                openrouter_api_key: env::var("OPENROUTER_API_KEY").unwrap_or_default(),
                default_provider: env::var("LLM_PROVIDER").unwrap_or_else(|_| "openai".to_string()),
                default_model: env::var("LLM_MODEL").unwrap_or_else(|_| "gpt-4o".to_string()),
                embedding_model: env::var("EMBEDDING_MODEL")
                    .unwrap_or_else(|_| "text-embedding-3-small".to_string()),
            },
            storage: StorageConfig {
                s3_bucket: env::var("S3_BUCKET").unwrap_or_default(),
                s3_region: env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
                s3_access_key_id: env::var("AWS_ACCESS_KEY_ID").ok(),
                s3_secret_access_key: env::var("AWS_SECRET_ACCESS_KEY").ok(),
                s3_endpoint: env::var("S3_ENDPOINT").ok(),
            },
            drive: DriveConfig {
                api_base: env::var("DRIVE_API_BASE")
                    .unwrap_or_else(|_| "https://www.googleapis.com/drive/v3".to_string()),
            },
            parser: ParserConfig {
                api_base: env::var("PARSER_API_BASE")
                    .unwrap_or_else(|_| "http://localhost:8070".to_string()),
                api_key: env::var("PARSER_API_KEY").unwrap_or_default(),
            },
            auth: AuthConfig {
                secret: env::var("CREWCHAT_SECRET")
                    .expect("CREWCHAT_SECRET must be set"),
                mode: env::var("AUTH_MODE").unwrap_or_else(|_| "none".to_string()),
            },
            limits: LimitsConfig {
                completion_timeout_secs: env::var("COMPLETION_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "60".to_string())
                    .parse()?,
                embedding_timeout_secs: env::var("EMBEDDING_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()?,
                search_timeout_secs: env::var("SEARCH_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "15".to_string())
                    .parse()?,
                parse_timeout_secs: env::var("PARSE_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "45".to_string())
                    .parse()?,
                max_context_documents: env::var("MAX_CONTEXT_DOCUMENTS")
                    .unwrap_or_else(|_| "8".to_string())
                    .parse()?,
                document_excerpt_chars: env::var("DOCUMENT_EXCERPT_CHARS")
                    .unwrap_or_else(|_| "1500".to_string())
                    .parse()?,
                max_playbook_entries: env::var("MAX_PLAYBOOK_ENTRIES")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()?,
                max_drive_files: env::var("MAX_DRIVE_FILES")
                    .unwrap_or_else(|_| "3".to_string())
                    .parse()?,
                similarity_threshold: env::var("SIMILARITY_THRESHOLD")
                    .unwrap_or_else(|_| "0.75".to_string())
                    .parse()?,
                match_count: env::var("MATCH_COUNT")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()?,
            },
        })
    }
}
