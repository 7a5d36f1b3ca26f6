//! Shared client for the OpenAI Responses API plus the strict-JSON
//! extraction every text adapter uses.
//!
//! Model output is never trusted: the caller gets either a validated JSON
//! object or a [`AdapterError::MalformedOutput`] it can retry once before
//! falling back deterministically.

use std::time::Duration;

use serde_json::Value;

use crate::error::AdapterError;

const RESPONSES_URL: &str = "https://api.openai.com/v1/responses";

/// Thin client over `POST /v1/responses`.
#[derive(Clone)]
pub struct ResponsesClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl ResponsesClient {
    pub fn new(api_key: String, timeout: Duration) -> Result<Self, AdapterError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AdapterError::Network(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            api_key,
            base_url: RESPONSES_URL.to_string(),
        })
    }

    /// Override the endpoint, e.g. for a proxy.
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    /// Send an input message array and return the concatenated output text.
    pub async fn text(&self, model: &str, input: Value) -> Result<String, AdapterError> {
        let body = serde_json::json!({
            "model": model,
            "input": input,
        });

        let response = self
            .http
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AdapterError::from_reqwest(e, "Responses request"))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AdapterError::Upstream {
                status: status.as_u16(),
                message: format!("Responses request failed: {message}"),
            });
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| AdapterError::MalformedOutput(format!("Responses body was not JSON: {e}")))?;
        extract_output_text(&payload)
            .ok_or_else(|| AdapterError::MalformedOutput("Responses output did not contain text".into()))
    }
}

/// Pull the output text out of a Responses payload: `output_text` when
/// present, otherwise the concatenation of all text content parts.
pub fn extract_output_text(payload: &Value) -> Option<String> {
    if let Some(text) = payload.get("output_text").and_then(Value::as_str) {
        if !text.trim().is_empty() {
            return Some(text.to_string());
        }
    }

    let output = payload.get("output")?.as_array()?;
    let mut texts: Vec<&str> = Vec::new();
    for item in output {
        let Some(content) = item.get("content").and_then(Value::as_array) else {
            continue;
        };
        for part in content {
            let kind = part.get("type").and_then(Value::as_str);
            if matches!(kind, Some("output_text") | Some("text")) {
                if let Some(text) = part.get("text").and_then(Value::as_str) {
                    texts.push(text);
                }
            }
        }
    }
    if texts.is_empty() {
        None
    } else {
        Some(texts.join("\n"))
    }
}

/// Parse a strict JSON object out of model text, tolerating surrounding
/// prose or markdown fences but nothing else.
pub fn extract_json_object(raw: &str) -> Result<Value, AdapterError> {
    let trimmed = raw.trim();
    let candidate = if trimmed.starts_with('{') && trimmed.ends_with('}') {
        trimmed
    } else {
        let start = trimmed
            .find('{')
            .ok_or_else(|| AdapterError::MalformedOutput("No JSON object found in model output".into()))?;
        let end = trimmed
            .rfind('}')
            .ok_or_else(|| AdapterError::MalformedOutput("No JSON object found in model output".into()))?;
        if end <= start {
            return Err(AdapterError::MalformedOutput("No JSON object found in model output".into()));
        }
        &trimmed[start..=end]
    };

    let value: Value = serde_json::from_str(candidate)
        .map_err(|e| AdapterError::MalformedOutput(format!("Model output was not valid JSON: {e}")))?;
    if value.is_object() {
        Ok(value)
    } else {
        Err(AdapterError::MalformedOutput("Model output was not a JSON object".into()))
    }
}

/// Encode image bytes as a `data:` URL for multimodal input parts.
pub fn image_data_url(bytes: &[u8]) -> String {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    format!("data:image/png;base64,{}", STANDARD.encode(bytes))
}

/// Clamp a loosely typed numeric JSON field into [0, 1].
pub fn clamped_score(value: Option<&Value>, default: f64) -> f64 {
    value
        .and_then(Value::as_f64)
        .unwrap_or(default)
        .clamp(0.0, 1.0)
}

/// Read a string-array field, trimming entries and dropping blanks.
pub fn string_list(value: Option<&Value>, max_len: usize) -> Vec<String> {
    let Some(items) = value.and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .take(max_len)
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_output_text_field_first() {
        let payload = json!({"output_text": "hello", "output": []});
        assert_eq!(extract_output_text(&payload).unwrap(), "hello");
    }

    #[test]
    fn falls_back_to_content_parts() {
        let payload = json!({
            "output": [
                {"content": [{"type": "output_text", "text": "part one"}]},
                {"content": [{"type": "text", "text": "part two"}, {"type": "refusal", "text": "no"}]}
            ]
        });
        assert_eq!(extract_output_text(&payload).unwrap(), "part one\npart two");
    }

    #[test]
    fn missing_text_is_none() {
        assert!(extract_output_text(&json!({"output": []})).is_none());
        assert!(extract_output_text(&json!({})).is_none());
    }

    #[test]
    fn parses_bare_and_fenced_json() {
        let bare = extract_json_object("{\"a\": 1}").unwrap();
        assert_eq!(bare["a"], 1);
        let fenced = extract_json_object("```json\n{\"a\": 2}\n```").unwrap();
        assert_eq!(fenced["a"], 2);
        let prosed = extract_json_object("Sure! Here you go: {\"a\": 3} Hope that helps.").unwrap();
        assert_eq!(prosed["a"], 3);
    }

    #[test]
    fn rejects_non_objects_and_garbage() {
        assert!(extract_json_object("[1, 2]").is_err());
        assert!(extract_json_object("no json here").is_err());
        assert!(extract_json_object("{broken").is_err());
        assert!(extract_json_object("} {").is_err());
    }

    #[test]
    fn clamps_and_defaults_scores() {
        assert_eq!(clamped_score(Some(&json!(1.5)), 0.0), 1.0);
        assert_eq!(clamped_score(Some(&json!(-0.2)), 0.0), 0.0);
        assert_eq!(clamped_score(Some(&json!("nan")), 0.7), 0.7);
        assert_eq!(clamped_score(None, 0.3), 0.3);
    }

    #[test]
    fn string_lists_trim_and_cap() {
        let value = json!(["  a  ", "", "b", "c", "d"]);
        assert_eq!(string_list(Some(&value), 3), vec!["a", "b", "c"]);
        assert!(string_list(Some(&json!("not a list")), 3).is_empty());
    }

    #[test]
    fn data_urls_are_prefixed() {
        assert!(image_data_url(b"abc").starts_with("data:image/png;base64,"));
    }
}
