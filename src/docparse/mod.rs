// External document parse service client.
// Extracts plain text from uploaded PDF, DOCX, XLSX and similar attachments.

use reqwest::Client;
use serde::Deserialize;
use tracing::info;

use crate::types::{AppError, AppResult};

pub struct DocumentParser {
    client: Client,
    api_base: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
pub struct ParseResult {
    pub success: bool,
    #[serde(default)]
    pub extracted_text: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl DocumentParser {
    pub fn new(api_base: &str, api_key: &str) -> Self {
        Self {
            client: Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    pub fn from_config(config: &crate::config::Config) -> Self {
        Self::new(&config.parser.api_base, &config.parser.api_key)
    }

    /// Extract text from attachment bytes. Returns `Err` only for transport
    /// failures; extraction failures come back as `success: false` with an
    /// error string.
    pub async fn parse(
        &self,
        bytes: Vec<u8>,
        path: &str,
        file_name: &str,
        file_type: &str,
    ) -> AppResult<ParseResult> {
        info!(path = %path, file_name = %file_name, "Parsing attachment");

        let content_type = if file_type.is_empty() {
            mime_guess::from_path(file_name)
                .first_or_octet_stream()
                .to_string()
        } else {
            file_type.to_string()
        };

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(&content_type)
            .map_err(|e| AppError::Parse(format!("Invalid attachment type: {}", e)))?;

        let form = reqwest::multipart::Form::new()
            .text("path", path.to_string())
            .text("file_name", file_name.to_string())
            .text("file_type", file_type.to_string())
            .part("file", part);

        let response = self
            .client
            .post(format!("{}/parse", self.api_base))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AppError::Parse(format!("Parse request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Parse(format!(
                "Parse service error ({}): {}",
                status, error_text
            )));
        }

        response
            .json::<ParseResult>()
            .await
            .map_err(|e| AppError::Parse(format!("Failed to parse service response: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn parse_returns_extracted_text() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/parse")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"success": true, "extracted_text": "hello world"}"#)
            .create_async()
            .await;

        let parser = DocumentParser::new(&server.url(), "test-key");
        let result = parser
            .parse(b"fake bytes".to_vec(), "uploads/a.pdf", "a.pdf", "application/pdf")
            .await
            .unwrap();

        mock.assert_async().await;
        assert!(result.success);
        assert_eq!(result.extracted_text.as_deref(), Some("hello world"));
    }

    #[tokio::test]
    async fn parse_surfaces_service_errors() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/parse")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let parser = DocumentParser::new(&server.url(), "test-key");
        let result = parser
            .parse(b"fake bytes".to_vec(), "uploads/a.pdf", "a.pdf", "application/pdf")
            .await;

        assert!(result.is_err());
    }
}
