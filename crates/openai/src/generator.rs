//! Image generator adapter: text-to-image and image-edit.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::Value;

use promptsmith_core::types::Quality;

use crate::error::{classify_image_failure, AdapterError};

const GENERATIONS_URL: &str = "https://api.openai.com/v1/images/generations";
const EDITS_URL: &str = "https://api.openai.com/v1/images/edits";
const IMAGE_SIZE: &str = "1024x1024";

/// The two generator operations the pipelines consume. Both return raw image
/// bytes; failures are categorized so callers can decide on retries.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn text_to_image(&self, prompt: &str, model: &str, quality: Quality) -> Result<Vec<u8>, AdapterError>;

    async fn image_edit(
        &self,
        base_image: &[u8],
        prompt: &str,
        model: &str,
        quality: Quality,
    ) -> Result<Vec<u8>, AdapterError>;
}

/// OpenAI image endpoints implementation.
pub struct OpenAiGenerator {
    http: reqwest::Client,
    api_key: String,
    default_model: String,
    generations_url: String,
    edits_url: String,
}

impl OpenAiGenerator {
    pub fn new(api_key: String, timeout: Duration, default_model: String) -> Result<Self, AdapterError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AdapterError::Network(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            api_key,
            default_model,
            generations_url: GENERATIONS_URL.to_string(),
            edits_url: EDITS_URL.to_string(),
        })
    }

    fn effective_model<'a>(&'a self, model: &'a str) -> &'a str {
        let trimmed = model.trim();
        if trimmed.is_empty() {
            &self.default_model
        } else {
            trimmed
        }
    }

    async fn decode_image_response(&self, response: reqwest::Response, what: &str) -> Result<Vec<u8>, AdapterError> {
        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<Value>()
                .await
                .ok()
                .and_then(|body| {
                    body.get("error")
                        .and_then(|e| e.get("message"))
                        .and_then(Value::as_str)
                        .map(String::from)
                })
                .unwrap_or_else(|| format!("{what} failed with status {status}"));
            return Err(classify_image_failure(status.as_u16(), &message));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| AdapterError::MalformedOutput(format!("{what} body was not JSON: {e}")))?;
        let item = payload
            .get("data")
            .and_then(Value::as_array)
            .and_then(|data| data.first())
            .ok_or_else(|| AdapterError::MalformedOutput(format!("{what} response did not include image data")))?;

        if let Some(b64) = item.get("b64_json").and_then(Value::as_str).filter(|s| !s.is_empty()) {
            return BASE64
                .decode(b64)
                .map_err(|e| AdapterError::MalformedOutput(format!("{what} returned undecodable base64: {e}")));
        }

        if let Some(url) = item.get("url").and_then(Value::as_str).filter(|s| !s.is_empty()) {
            let downloaded = self
                .http
                .get(url)
                .bearer_auth(&self.api_key)
                .send()
                .await
                .map_err(|e| AdapterError::from_reqwest(e, "Image download"))?;
            if !downloaded.status().is_success() {
                return Err(AdapterError::Upstream {
                    status: downloaded.status().as_u16(),
                    message: "Image download failed".into(),
                });
            }
            return downloaded
                .bytes()
                .await
                .map(|bytes| bytes.to_vec())
                .map_err(|e| AdapterError::from_reqwest(e, "Image download"));
        }

        Err(AdapterError::MalformedOutput(format!(
            "{what} returned neither b64_json nor a URL"
        )))
    }
}

#[async_trait]
impl Generator for OpenAiGenerator {
    async fn text_to_image(&self, prompt: &str, model: &str, quality: Quality) -> Result<Vec<u8>, AdapterError> {
        let model = self.effective_model(model);
        // `response_format` is only documented for DALL-E models; GPT Image
        // responses carry base64 content by default and take `quality`.
        let is_gpt_image = model.to_lowercase().starts_with("gpt-image");
        let mut body = serde_json::json!({
            "model": model,
            "prompt": prompt,
            "size": IMAGE_SIZE,
            "n": 1,
        });
        if is_gpt_image {
            body["quality"] = Value::String(quality.as_str().to_string());
        } else {
            body["response_format"] = Value::String("b64_json".to_string());
        }

        let response = self
            .http
            .post(&self.generations_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AdapterError::from_reqwest(e, "Image generation"))?;
        self.decode_image_response(response, "Image generation").await
    }

    async fn image_edit(
        &self,
        base_image: &[u8],
        prompt: &str,
        model: &str,
        quality: Quality,
    ) -> Result<Vec<u8>, AdapterError> {
        let model = self.effective_model(model);
        let is_gpt_image = model.to_lowercase().starts_with("gpt-image");

        let image_part = reqwest::multipart::Part::bytes(base_image.to_vec())
            .file_name("parent.png")
            .mime_str("image/png")
            .map_err(|e| AdapterError::from_reqwest(e, "Image edit"))?;

        let mut form = reqwest::multipart::Form::new()
            .text("model", model.to_string())
            .text("prompt", prompt.to_string())
            .text("size", IMAGE_SIZE)
            .text("n", "1")
            .part("image", image_part);
        if is_gpt_image {
            form = form.text("quality", quality.as_str());
        }

        let response = self
            .http
            .post(&self.edits_url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AdapterError::from_reqwest(e, "Image edit"))?;
        self.decode_image_response(response, "Image edit").await
    }
}
