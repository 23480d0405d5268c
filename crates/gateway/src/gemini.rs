use async_trait::async_trait;
use personalens_core::{Error, Result};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::{status_error, transport_error, TurnRole, VisionReply, VisionRequest, VisionService};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiService {
    client: Client,
    api_key: String,
    api_base: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl GeminiService {
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
                .unwrap_or(GEMINI_API_BASE)
                .trim_end_matches('/')
                .to_string(),
            model: model.to_string(),
            max_tokens,
            temperature,
        }
    }

    /// Config may store "gemini/gemini-2.5-flash"; the API expects the
    /// bare model name.
    fn normalize_model(model: &str) -> &str {
        model.strip_prefix("gemini/").unwrap_or(model)
    }

    fn build_request(&self, request: &VisionRequest) -> Value {
        let mut contents: Vec<Value> = request
            .history
            .iter()
            .map(|turn| {
                let role = match turn.role {
                    TurnRole::Operator => "user",
                    TurnRole::Persona => "model",
                };
                json!({ "role": role, "parts": [{ "text": turn.text }] })
            })
            .collect();

        let mut parts = vec![json!({ "text": request.prompt })];
        if let Some(image) = &request.image_b64 {
            parts.push(json!({
                "inlineData": {
                    "mimeType": "image/png",
                    "data": image,
                }
            }));
        }
        contents.push(json!({ "role": "user", "parts": parts }));

        json!({
            "contents": contents,
            "systemInstruction": { "parts": [{ "text": request.system }] },
            "generationConfig": {
                "temperature": self.temperature,
                "maxOutputTokens": self.max_tokens,
            }
        })
    }

    fn parse_response(raw_body: &str) -> Result<String> {
        let resp: GeminiResponse = serde_json::from_str(raw_body).map_err(|e| {
            let snippet: String = raw_body.chars().take(300).collect();
            Error::Provider(format!("failed to parse Gemini response: {e}. Body: {snippet}"))
        })?;

        let candidate = resp
            .candidates
            .and_then(|c| c.into_iter().next())
            .ok_or_else(|| Error::Provider("no candidates in Gemini response".to_string()))?;

        let text: String = candidate
            .content
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(Error::Provider(format!(
                "empty Gemini response (finishReason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            )));
        }
        Ok(text)
    }
}

#[async_trait]
impl VisionService for GeminiService {
    async fn respond(&self, request: &VisionRequest) -> Result<VisionReply> {
        let model = Self::normalize_model(&self.model);
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.api_base, model, self.api_key
        );

        let body = self.build_request(request);
        info!(
            model = %model,
            history_turns = request.history.len(),
            has_image = request.image_b64.is_some(),
            "calling Gemini"
        );

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error("Gemini", e))?;

        let status = response.status();
        let raw_body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(status_error("Gemini", status, &raw_body));
        }
        debug!(body_len = raw_body.len(), "Gemini raw response");

        let text = Self::parse_response(&raw_body)?;
        Ok(VisionReply { text })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: Option<String>,
}
