use async_trait::async_trait;
use personalens_core::{Error, Result};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::{status_error, transport_error, TurnRole, VisionReply, VisionRequest, VisionService};

const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicService {
    client: Client,
    api_key: String,
    api_base: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl AnthropicService {
    pub fn new(
        api_key: &str,
        api_base: Option<&str>,
        model: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            api_base: api_base
                .unwrap_or(ANTHROPIC_API_BASE)
                .trim_end_matches('/')
                .to_string(),
            model: model.to_string(),
            max_tokens,
            temperature,
        }
    }

    fn normalize_model(model: &str) -> &str {
        model.strip_prefix("anthropic/").unwrap_or(model)
    }

    fn build_request(&self, request: &VisionRequest) -> Value {
        let mut messages: Vec<Value> = request
            .history
            .iter()
            .map(|turn| {
                let role = match turn.role {
                    TurnRole::Operator => "user",
                    TurnRole::Persona => "assistant",
                };
                json!({ "role": role, "content": turn.text })
            })
            .collect();

        let mut blocks: Vec<Value> = Vec::new();
        if let Some(image) = &request.image_b64 {
            blocks.push(json!({
                "type": "image",
                "source": {
                    "type": "base64",
                    "media_type": "image/png",
                    "data": image,
                }
            }));
        }
        blocks.push(json!({ "type": "text", "text": request.prompt }));
        messages.push(json!({ "role": "user", "content": blocks }));

        json!({
            "model": Self::normalize_model(&self.model),
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
            "system": request.system,
            "messages": messages,
        })
    }

    fn parse_response(raw_body: &str) -> Result<String> {
        let resp: AnthropicResponse = serde_json::from_str(raw_body).map_err(|e| {
            let snippet: String = raw_body.chars().take(300).collect();
            Error::Provider(format!(
                "failed to parse Anthropic response: {e}. Body: {snippet}"
            ))
        })?;

        let text: String = resp
            .content
            .into_iter()
            .filter(|block| block.block_type == "text")
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("\n");

        if text.trim().is_empty() {
            return Err(Error::Provider(format!(
                "empty Anthropic response (stop_reason: {})",
                resp.stop_reason.as_deref().unwrap_or("unknown")
            )));
        }
        Ok(text)
    }
}

#[async_trait]
impl VisionService for AnthropicService {
    async fn respond(&self, request: &VisionRequest) -> Result<VisionReply> {
        let url = format!("{}/v1/messages", self.api_base);
        let body = self.build_request(request);
        info!(
            model = %Self::normalize_model(&self.model),
            history_turns = request.history.len(),
            has_image = request.image_b64.is_some(),
            "calling Anthropic"
        );

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error("Anthropic", e))?;

        let status = response.status();
        let raw_body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(status_error("Anthropic", status, &raw_body));
        }
        debug!(body_len = raw_body.len(), "Anthropic raw response");

        let text = Self::parse_response(&raw_body)?;
        Ok(VisionReply { text })
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<AnthropicBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_block_precedes_text() {
        let service = AnthropicService::new("key", None, "claude-sonnet-4-20250514", 1024, 0.7);
        let request = VisionRequest {
            system: "sys".to_string(),
            history: Vec::new(),
            image_b64: Some("aW1n".to_string()),
            prompt: "react".to_string(),
        };
        let body = service.build_request(&request);
        let blocks = body["messages"][0]["content"].as_array().unwrap();
        assert_eq!(blocks[0]["type"], "image");
        assert_eq!(blocks[0]["source"]["media_type"], "image/png");
        assert_eq!(blocks[1]["type"], "text");
        assert_eq!(body["system"], "sys");
    }

    #[test]
    fn response_concatenates_text_blocks() {
        let json = r#"{
            "content": [
                {"type": "text", "text": "Bel sito."},
                {"type": "text", "text": "Prenoterei."}
            ],
            "stop_reason": "end_turn"
        }"#;
        assert_eq!(
            AnthropicService::parse_response(json).unwrap(),
            "Bel sito.\nPrenoterei."
        );
    }

    #[test]
    fn model_prefix_is_stripped() {
        assert_eq!(
            AnthropicService::normalize_model("anthropic/claude-3-haiku"),
            "claude-3-haiku"
        );
    }
}
