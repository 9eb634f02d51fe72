//! OpenRouter chat completions client.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use super::{Generator, require_credential};
use crate::constants::{DEFAULT_BASE_URL, DEFAULT_REQUEST_TIMEOUT_SECS};
use crate::core::GenerationError;

/// A model offered by the generation service.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
    /// USD per million prompt tokens.
    pub prompt_cost_per_million: Option<f64>,
    /// USD per million completion tokens.
    pub completion_cost_per_million: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    data: Vec<RawModel>,
}

#[derive(Debug, Deserialize)]
struct RawModel {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    pricing: Option<RawPricing>,
}

#[derive(Debug, Deserialize)]
struct RawPricing {
    #[serde(default)]
    prompt: Option<String>,
    #[serde(default)]
    completion: Option<String>,
}

/// Client for an OpenAI-compatible API rooted at `base_url`.
#[derive(Debug, Clone)]
pub struct OpenRouterClient {
    client: reqwest::Client,
    base_url: String,
}

impl OpenRouterClient {
    /// Build a client for `base_url` with a per-request `timeout`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder().timeout(timeout).build().map_err(|e| {
            GenerationError::Network {
                message: format!("Failed to build HTTP client: {e}"),
            }
        })?;

        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        Ok(Self {
            client,
            base_url,
        })
    }

    /// Build a client with the default endpoint and timeout.
    pub fn with_defaults() -> Result<Self, GenerationError> {
        Self::new(DEFAULT_BASE_URL, Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// List the models the service offers, with prices per million tokens.
    pub async fn list_models(
        &self,
        credential: Option<&str>,
    ) -> Result<Vec<ModelInfo>, GenerationError> {
        let key = require_credential(credential)?;

        let response = self
            .client
            .get(format!("{}models", self.base_url))
            .header("Authorization", format!("Bearer {key}"))
            .send()
            .await
            .map_err(|e| GenerationError::Network {
                message: e.to_string(),
            })?;

        let body = read_body(response).await?;
        parse_models_response(&body)
    }
}

#[async_trait]
impl Generator for OpenRouterClient {
    async fn generate(
        &self,
        instruction: &str,
        model: &str,
        credential: Option<&str>,
    ) -> Result<String, GenerationError> {
        let key = require_credential(credential)?;

        let request = serde_json::json!({
            "model": model,
            "messages": [
                { "role": "user", "content": instruction }
            ],
            "stream": false,
        });

        tracing::debug!("Requesting completion from {model}");
        let response = self
            .client
            .post(format!("{}chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {key}"))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| GenerationError::Network {
                message: e.to_string(),
            })?;

        let body = read_body(response).await?;
        parse_chat_response(&body)
    }
}

async fn read_body(response: reqwest::Response) -> Result<String, GenerationError> {
    let status = response.status().as_u16();
    let body = response.text().await.map_err(|e| GenerationError::Network {
        message: e.to_string(),
    })?;

    if !(200..300).contains(&status) {
        return Err(parse_http_error(status, &body));
    }
    Ok(body)
}

/// Map a non-success HTTP status to a [`GenerationError`].
fn parse_http_error(status: u16, body: &str) -> GenerationError {
    let message = error_message(body);
    match status {
        401 | 403 => GenerationError::Authentication {
            message,
        },
        _ => GenerationError::Service {
            status,
            message,
        },
    }
}

/// Pull `error.message` out of an error body, falling back to the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| value["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

fn parse_chat_response(body: &str) -> Result<String, GenerationError> {
    let response: ChatResponse =
        serde_json::from_str(body).map_err(|e| GenerationError::Parse {
            message: format!("Failed to parse response: {e}"),
        })?;

    response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content.unwrap_or_default())
        .ok_or_else(|| GenerationError::Parse {
            message: "Response contained no choices".to_string(),
        })
}

fn parse_models_response(body: &str) -> Result<Vec<ModelInfo>, GenerationError> {
    let response: ModelsResponse =
        serde_json::from_str(body).map_err(|e| GenerationError::Parse {
            message: format!("Failed to parse model list: {e}"),
        })?;

    Ok(response
        .data
        .into_iter()
        .map(|model| {
            let pricing = model.pricing.as_ref();
            ModelInfo {
                name: model.name.clone().unwrap_or_else(|| model.id.clone()),
                prompt_cost_per_million: pricing
                    .and_then(|p| p.prompt.as_deref())
                    .and_then(parse_price_per_million),
                completion_cost_per_million: pricing
                    .and_then(|p| p.completion.as_deref())
                    .and_then(parse_price_per_million),
                id: model.id,
            }
        })
        .collect())
}

/// Convert a per-token price string to USD per million tokens.
#[must_use]
pub fn parse_price_per_million(price: &str) -> Option<f64> {
    price.trim().parse::<f64>().ok().map(|p| p * 1_000_000.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_credential_fails_before_request() {
        // Unroutable base URL: reaching the network would be a different error.
        let client = OpenRouterClient::new("http://127.0.0.1:9/", Duration::from_millis(50)).unwrap();
        assert_eq!(
            client.generate("hi", "m", None).await,
            Err(GenerationError::MissingCredential)
        );
        assert_eq!(
            client.generate("hi", "m", Some("   ")).await,
            Err(GenerationError::MissingCredential)
        );
        assert_eq!(client.list_models(None).await, Err(GenerationError::MissingCredential));
    }

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let client = OpenRouterClient::new("https://example.test/api/v1", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url(), "https://example.test/api/v1/");
    }

    #[test]
    fn test_http_error_mapping() {
        let body = r#"{"error":{"message":"No auth credentials found","code":401}}"#;
        assert_eq!(
            parse_http_error(401, body),
            GenerationError::Authentication {
                message: "No auth credentials found".to_string()
            }
        );
        assert!(matches!(parse_http_error(403, "denied"), GenerationError::Authentication { .. }));
        assert_eq!(
            parse_http_error(502, "bad gateway"),
            GenerationError::Service {
                status: 502,
                message: "bad gateway".to_string()
            }
        );
    }

    #[test]
    fn test_parse_chat_response() {
        let body = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"Hello!"}}]}"#;
        assert_eq!(parse_chat_response(body).unwrap(), "Hello!");

        assert!(matches!(parse_chat_response(r#"{"choices":[]}"#), Err(GenerationError::Parse { .. })));
        assert!(matches!(parse_chat_response("<html>"), Err(GenerationError::Parse { .. })));
    }

    #[test]
    fn test_parse_models_response() {
        let body = r#"{"data":[
            {"id":"openai/gpt-4o","name":"GPT-4o","pricing":{"prompt":"0.0000025","completion":"0.00001"}},
            {"id":"free/model","pricing":{"prompt":"not-a-number"}}
        ]}"#;
        let models = parse_models_response(body).unwrap();
        assert_eq!(models.len(), 2);
        assert_eq!(models[0].name, "GPT-4o");
        assert!((models[0].prompt_cost_per_million.unwrap() - 2.5).abs() < 1e-9);
        assert!((models[0].completion_cost_per_million.unwrap() - 10.0).abs() < 1e-9);
        assert_eq!(models[1].name, "free/model");
        assert_eq!(models[1].prompt_cost_per_million, None);
        assert_eq!(models[1].completion_cost_per_million, None);
    }

    #[test]
    fn test_parse_price_per_million() {
        assert_eq!(parse_price_per_million("0"), Some(0.0));
        assert_eq!(parse_price_per_million("abc"), None);
    }
}
