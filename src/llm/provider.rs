use async_trait::async_trait;

use crate::types::{AppError, AppResult, LLMRequest, LLMResponse};

#[async_trait]
pub trait LLMAdapter: Send + Sync {
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse>;
}

/// Configuration for an LLM provider
pub struct LLMProviderConfig {
    pub name: String,
    pub api_key: String,
}

pub struct LLM {
    adapter: Box<dyn LLMAdapter>,
    provider_name: String,
}

impl LLM {
    pub fn new(provider: LLMProviderConfig) -> AppResult<Self> {
        let adapter: Box<dyn LLMAdapter> = match provider.name.as_str() {
            "openai" => Box::new(crate::llm::openai::OpenAIAdapter::new(&provider.api_key)),
            // OpenRouter speaks the OpenAI wire format on its own endpoint
            "openrouter" => Box::new(crate::llm::openai::OpenAIAdapter::with_base_url(
                &provider.api_key,
                "https://openrouter.ai/api/v1",
            )),
            "anthropic" => Box::new(crate::llm::anthropic::AnthropicAdapter::new(
                &provider.api_key,
            )),
            other => {
                return Err(AppError::InvalidRequest(format!(
                    "Unsupported LLM provider: {}",
                    other
                )))
            }
        };

        Ok(Self {
            adapter,
            provider_name: provider.name,
        })
    }

    pub fn provider_name(&self) -> &str {
        &self.provider_name
    }

    pub async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
        self.adapter.create_chat_completion(request).await
    }
}

/// Build an LLM client for an agent, honoring per-agent provider/model
/// overrides and falling back to the configured defaults.
pub fn llm_for_agent(
    config: &crate::config::Config,
    agent: &crate::models::Agent,
) -> AppResult<(LLM, String)> {
    let provider = agent
        .llm_provider
        .clone()
        .unwrap_or_else(|| config.llm.default_provider.clone());
    let model = agent
        .llm_model
        .clone()
        .unwrap_or_else(|| config.llm.default_model.clone());

    let api_key = config
        .llm
        .api_key_for(&provider)
        .ok_or_else(|| AppError::LLMApi(format!("No API key configured for {}", provider)))?;

    let llm = LLM::new(LLMProviderConfig {
        name: provider,
        api_key,
    })?;

    Ok((llm, model))
}
