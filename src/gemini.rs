use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::json;
use thiserror::Error;
use tracing::{error, info};

use crate::config::Config;
use crate::interpret::{EditResponse, GenerateResponse};
use crate::models::EncodedPayload;
use crate::prompts::GenerateRequest;

#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("HTTP error: {0}")] Http(String),
    #[error("Other: {0}")] Other(String),
}

/// The two remote operations the editor depends on.
#[async_trait]
pub trait ImageService: Send + Sync {
    /// Image + instruction in, image-only modality out.
    async fn edit_image(&self, image: &EncodedPayload, instruction: &str) -> Result<EditResponse, GeminiError>;

    /// Prompt in, one JPEG out.
    async fn generate_image(&self, request: &GenerateRequest) -> Result<GenerateResponse, GeminiError>;
}

// Truncates base64 image data in JSON so logs stay readable
fn truncate_base64_in_json(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, val) in map.iter_mut() {
                if key == "data" || key == "bytesBase64Encoded" {
                    if let serde_json::Value::String(s) = val {
                        if s.len() > 100 {
                            *val = serde_json::Value::String(format!("{}...[truncated {} chars]", &s[..50], s.len() - 50));
                        }
                    }
                } else {
                    truncate_base64_in_json(val);
                }
            }
        }
        serde_json::Value::Array(arr) => {
            for val in arr.iter_mut() {
                truncate_base64_in_json(val);
            }
        }
        _ => {}
    }
}

fn loggable(value: &serde_json::Value) -> String {
    let mut copy = value.clone();
    truncate_base64_in_json(&mut copy);
    serde_json::to_string(&copy).unwrap_or_default()
}

pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
    edit_model: String,
    generate_model: String,
}

impl GeminiClient {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            api_key: config.api_key.clone(),
            base_url: config.api_base.trim_end_matches('/').to_string(),
            edit_model: config.edit_model.clone(),
            generate_model: config.generate_model.clone(),
        }
    }

    fn url(&self, model: &str, method: &str) -> String {
        format!("{}/models/{}:{}?key={}", self.base_url, model, method, self.api_key)
    }

    async fn post_json<T: DeserializeOwned>(&self, url: &str, body: &serde_json::Value) -> Result<T, GeminiError> {
        info!("🔗 Making request to: {}", url.replace(&self.api_key, "***"));
        info!("📤 Request body: {}", loggable(body));

        let response = self.client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| GeminiError::Http(e.to_string()))?;

        let status = response.status();
        info!("📥 Response status: {}", status);

        let response_text = response.text().await
            .map_err(|e| GeminiError::Http(e.to_string()))?;

        if !status.is_success() {
            error!("❌ API Error response: {}", response_text);
            return Err(GeminiError::Http(format!("status={} body={}", status, response_text)));
        }

        match serde_json::from_str::<serde_json::Value>(&response_text) {
            Ok(value) => info!("📥 Raw Gemini API response: {}", loggable(&value)),
            Err(_) => info!("📥 Raw Gemini API response ({} bytes, not JSON)", response_text.len()),
        }

        serde_json::from_str(&response_text)
            .map_err(|e| GeminiError::Other(format!("parse error: {}", e)))
    }
}

#[async_trait]
impl ImageService for GeminiClient {
    async fn edit_image(&self, image: &EncodedPayload, instruction: &str) -> Result<EditResponse, GeminiError> {
        let body = json!({
            "contents": [{
                "parts": [
                    { "inlineData": { "data": image.data, "mimeType": image.mime_type } },
                    { "text": instruction }
                ]
            }],
            "generationConfig": {
                "responseModalities": ["IMAGE"]
            }
        });
        self.post_json(&self.url(&self.edit_model, "generateContent"), &body).await
    }

    async fn generate_image(&self, request: &GenerateRequest) -> Result<GenerateResponse, GeminiError> {
        let body = json!({
            "instances": [{ "prompt": request.prompt }],
            "parameters": {
                "sampleCount": 1,
                "aspectRatio": request.aspect_ratio.as_str(),
                "outputOptions": { "mimeType": "image/jpeg" }
            }
        });
        self.post_json(&self.url(&self.generate_model, "predict"), &body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_payloads_are_truncated_for_logs() {
        let long = "A".repeat(500);
        let body = json!({
            "contents": [{ "parts": [{ "inlineData": { "data": long, "mimeType": "image/png" } }, { "text": "hi" }] }],
            "predictions": [{ "bytesBase64Encoded": "B".repeat(300) }]
        });
        let logged = loggable(&body);
        assert!(logged.contains("[truncated 450 chars]"));
        assert!(logged.contains("[truncated 250 chars]"));
        assert!(logged.contains("\"text\":\"hi\""));
        assert!(logged.len() < 500);
    }

    #[test]
    fn urls_target_the_configured_models() {
        let config = Config::from_lookup(|key| match key {
            "GEMINI_API_KEY" => Some("k123".into()),
            "GEMINI_API_BASE" => Some("http://localhost:9999/v1beta/".into()),
            _ => None,
        })
        .unwrap();
        let client = GeminiClient::new(&config);
        assert_eq!(
            client.url(&client.edit_model, "generateContent"),
            "http://localhost:9999/v1beta/models/gemini-2.5-flash-image:generateContent?key=k123"
        );
        assert_eq!(
            client.url(&client.generate_model, "predict"),
            "http://localhost:9999/v1beta/models/imagen-4.0-generate-001:predict?key=k123"
        );
    }
}
