//! Tool execution
//!
//! Runs the tools requested by intent classification sequentially, capturing
//! each failure as a structured result rather than aborting the batch.
//! Content-type derivation from tool results is rule-based, not
//! classifier-driven.

use base64::Engine;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::config::Config;
use crate::llm::LLM;
use crate::models::{ToolExecution, ToolKind};
use crate::storage::S3Client;
use crate::types::{AppError, AppResult, ContentType, LLMMessage, LLMRequest, ToolDefinition};
use crate::utils::with_timeout;

const IMAGES_API_BASE: &str = "https://api.openai.com/v1";
const IMAGE_MODEL: &str = "gpt-image-1";

pub struct ToolRunner<'a> {
    config: &'a Config,
    llm: &'a LLM,
    model: &'a str,
}

impl<'a> ToolRunner<'a> {
    pub fn new(config: &'a Config, llm: &'a LLM, model: &'a str) -> Self {
        Self { config, llm, model }
    }

    /// Execute the requested tools in order. Partial success is a normal
    /// outcome; every tool contributes a result entry either way.
    pub async fn execute(&self, tools: &[ToolKind], query: &str) -> Vec<ToolExecution> {
        let mut results = Vec::with_capacity(tools.len());

        for (i, kind) in tools.iter().enumerate() {
            let tool_id = format!("{}-{}", tool_name(*kind), i);
            let outcome = match kind {
                ToolKind::ImageGeneration => self.run_image_generation(query).await,
                ToolKind::WebResearch => self.run_web_research(query).await,
            };

            match outcome {
                Ok(output) => {
                    info!(tool = tool_name(*kind), "Tool succeeded");
                    results.push(ToolExecution {
                        tool_id,
                        kind: *kind,
                        success: true,
                        output: Some(output),
                        error: None,
                    });
                }
                Err(e) => {
                    warn!(tool = tool_name(*kind), error = %e, "Tool failed");
                    results.push(ToolExecution {
                        tool_id,
                        kind: *kind,
                        success: false,
                        output: None,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        results
    }

    /// Let the completion service refine the image prompt through a function
    /// call, then generate via the images endpoint.
    async fn run_image_generation(&self, query: &str) -> AppResult<serde_json::Value> {
        let tool_def = ToolDefinition {
            name: "generate_image".to_string(),
            description: "Generate an image from a detailed prompt".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "prompt": {"type": "string", "description": "Detailed image prompt"}
                },
                "required": ["prompt"]
            }),
        };

        let request = LLMRequest {
            provider: self.llm.provider_name().to_string(),
            model: self.model.to_string(),
            messages: vec![LLMMessage::user(format!(
                "The user asked for an image: {}\nCall generate_image with a refined prompt.",
                query
            ))],
            max_tokens: Some(256),
            temperature: Some(0.7),
            system_instruction: None,
            tools: Some(vec![tool_def]),
        };

        let response = with_timeout(
            "image prompt refinement",
            self.config.limits.completion_timeout_secs,
            self.llm.create_chat_completion(&request),
        )
        .await?;

        let prompt = response
            .tool_calls
            .iter()
            .find(|tc| tc.name == "generate_image")
            .and_then(|tc| tc.arguments.get("prompt"))
            .and_then(|p| p.as_str())
            .map(|s| s.to_string())
            .unwrap_or_else(|| query.to_string());

        let url = generate_image(self.config, &prompt).await?;

        Ok(json!({ "url": url, "prompt": prompt }))
    }

    /// Web research goes through the completion service as a black box that
    /// returns structured findings.
    async fn run_web_research(&self, query: &str) -> AppResult<serde_json::Value> {
        let request = LLMRequest {
            provider: self.llm.provider_name().to_string(),
            model: self.model.to_string(),
            messages: vec![LLMMessage::user(format!(
                "Research the following and respond with ONLY a JSON object \
                 {{\"summary\": string, \"sources\": [{{\"title\": string, \"url\": string}}]}}.\n\n\
                 Topic: {}",
                query
            ))],
            max_tokens: Some(1024),
            temperature: Some(0.2),
            system_instruction: None,
            tools: None,
        };

        let response = with_timeout(
            "web research",
            self.config.limits.completion_timeout_secs,
            self.llm.create_chat_completion(&request),
        )
        .await?;

        let trimmed = response.content.trim();
        let json_slice = match (trimmed.find('{'), trimmed.rfind('}')) {
            (Some(start), Some(end)) if start < end => &trimmed[start..=end],
            _ => {
                return Err(AppError::LLMApi(
                    "Web research returned no JSON object".to_string(),
                ))
            }
        };

        serde_json::from_str(json_slice)
            .map_err(|e| AppError::LLMApi(format!("Web research JSON invalid: {}", e)))
    }
}

fn tool_name(kind: ToolKind) -> &'static str {
    match kind {
        ToolKind::ImageGeneration => "image_generation",
        ToolKind::WebResearch => "web_research",
    }
}

#[derive(Deserialize)]
struct ImageResponse {
    data: Vec<ImageData>,
}

#[derive(Deserialize)]
struct ImageData {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    b64_json: Option<String>,
}

async fn generate_image(config: &Config, prompt: &str) -> AppResult<String> {
    let client = Client::new();
    let response = client
        .post(format!("{}/images/generations", IMAGES_API_BASE))
        .header(
            "Authorization",
            format!("Bearer {}", config.llm.openai_api_key),
        )
        .json(&json!({ "model": IMAGE_MODEL, "prompt": prompt, "n": 1 }))
        .send()
        .await
        .map_err(|e| AppError::LLMApi(format!("Image request failed: {}", e)))?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        return Err(AppError::LLMApi(format!(
            "Image API error ({}): {}",
            status, error_text
        )));
    }

    let parsed: ImageResponse = response
        .json()
        .await
        .map_err(|e| AppError::LLMApi(format!("Failed to parse image response: {}", e)))?;

    let data = parsed
        .data
        .into_iter()
        .next()
        .ok_or_else(|| AppError::LLMApi("Image response had no data".to_string()))?;

    if let Some(url) = data.url {
        return Ok(url);
    }

    // Base64 payloads land in object storage; message bodies carry a URL,
    // never megabytes of encoded pixels.
    let b64 = data
        .b64_json
        .ok_or_else(|| AppError::LLMApi("Image response had neither url nor data".to_string()))?;
    let image_bytes = base64::engine::general_purpose::STANDARD
        .decode(b64.as_bytes())
        .map_err(|e| AppError::LLMApi(format!("Invalid base64 image payload: {}", e)))?;

    let storage = S3Client::new(&config.storage)?;
    let path = format!("generated/{}.png", uuid::Uuid::new_v4());
    storage.upload(&path, &image_bytes, "image/png").await
}

/// Derive the message content type from successful tool results. One
/// dominant kind maps directly; multiple kinds become `Mixed`.
pub fn derive_content_type(results: &[ToolExecution]) -> ContentType {
    let mut kinds: Vec<ToolKind> = results
        .iter()
        .filter(|r| r.success)
        .map(|r| r.kind)
        .collect();
    kinds.sort_by_key(|k| *k as u8);
    kinds.dedup();

    match kinds.as_slice() {
        [] => ContentType::Text,
        [ToolKind::ImageGeneration] => ContentType::ImageGeneration,
        [ToolKind::WebResearch] => ContentType::WebResearch,
        _ => ContentType::Mixed,
    }
}

/// Human-readable rendering of a web research result. The raw JSON payload
/// stays in `tool_results`; the visible message body is always this summary.
pub fn summarize_web_research(output: &serde_json::Value) -> String {
    let summary = output
        .get("summary")
        .and_then(|s| s.as_str())
        .unwrap_or("Research complete.");

    let mut text = summary.to_string();

    if let Some(sources) = output.get("sources").and_then(|s| s.as_array()) {
        let rendered: Vec<String> = sources
            .iter()
            .filter_map(|s| {
                let title = s.get("title").and_then(|t| t.as_str())?;
                let url = s.get("url").and_then(|u| u.as_str()).unwrap_or("");
                Some(if url.is_empty() {
                    format!("- {}", title)
                } else {
                    format!("- {} ({})", title, url)
                })
            })
            .collect();

        if !rendered.is_empty() {
            text.push_str("\n\nSources:\n");
            text.push_str(&rendered.join("\n"));
        }
    }

    text
}

/// Rendering of tool results fed back into the final completion prompt.
pub fn render_tool_context(results: &[ToolExecution]) -> String {
    results
        .iter()
        .map(|r| {
            if r.success {
                format!(
                    "[{}] {}",
                    tool_name(r.kind),
                    r.output
                        .as_ref()
                        .map(|o| o.to_string())
                        .unwrap_or_else(|| "ok".to_string())
                )
            } else {
                format!(
                    "[{}] failed: {}",
                    tool_name(r.kind),
                    r.error.as_deref().unwrap_or("unknown error")
                )
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(kind: ToolKind, success: bool) -> ToolExecution {
        ToolExecution {
            tool_id: format!("{}-0", tool_name(kind)),
            kind,
            success,
            output: success.then(|| json!({"ok": true})),
            error: (!success).then(|| "boom".to_string()),
        }
    }

    #[test]
    fn derive_single_kinds() {
        assert_eq!(
            derive_content_type(&[result(ToolKind::ImageGeneration, true)]),
            ContentType::ImageGeneration
        );
        assert_eq!(
            derive_content_type(&[result(ToolKind::WebResearch, true)]),
            ContentType::WebResearch
        );
    }

    #[test]
    fn derive_mixed_kinds() {
        assert_eq!(
            derive_content_type(&[
                result(ToolKind::ImageGeneration, true),
                result(ToolKind::WebResearch, true),
            ]),
            ContentType::Mixed
        );
    }

    #[test]
    fn derive_ignores_failures() {
        assert_eq!(
            derive_content_type(&[
                result(ToolKind::ImageGeneration, false),
                result(ToolKind::WebResearch, true),
            ]),
            ContentType::WebResearch
        );
        assert_eq!(
            derive_content_type(&[result(ToolKind::WebResearch, false)]),
            ContentType::Text
        );
    }

    #[test]
    fn web_research_summary_is_human_readable() {
        let output = json!({
            "summary": "Rust adoption keeps growing.",
            "sources": [
                {"title": "Survey 2026", "url": "https://example.com/survey"},
                {"title": "Untitled note"}
            ]
        });
        let text = summarize_web_research(&output);
        assert!(text.starts_with("Rust adoption keeps growing."));
        assert!(text.contains("- Survey 2026 (https://example.com/survey)"));
        assert!(!text.contains('{'));
    }

    #[test]
    fn failed_tools_render_in_context() {
        let ctx = render_tool_context(&[result(ToolKind::WebResearch, false)]);
        assert!(ctx.contains("failed: boom"));
    }
}
