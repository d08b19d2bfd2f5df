//! Google Gemini provider implementation

use super::types::{LlmRequest, LlmResponse, Usage};
use super::{LlmError, LlmService};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Gemini service implementation
pub struct GeminiService {
    client: Client,
    api_key: String,
    endpoint: String,
    model_id: String,
}

impl GeminiService {
    /// Build a client for `model` behind `base_url`.
    ///
    /// The key travels in the `x-goog-api-key` header so it never appears in
    /// a request URL, and therefore never in an error message.
    pub fn new(api_key: String, model: &str, base_url: &str) -> Result<Self, LlmError> {
        let endpoint = format!(
            "{}/v1beta/models/{}:generateContent",
            base_url.trim_end_matches('/'),
            model
        );

        // No client-level timeout: the bounded wait lives in `TimeoutService`
        // so it is reported with its own error kind.
        let client = Client::builder()
            .build()
            .map_err(|e| LlmError::unknown(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            endpoint,
            model_id: model.to_string(),
        })
    }

    fn translate_request(request: &LlmRequest) -> GeminiRequest {
        GeminiRequest {
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts: Some(vec![GeminiPart {
                    text: Some(request.prompt.clone()),
                }]),
            }],
            generation_config: Some(GeminiGenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
            }),
        }
    }

    fn normalize_response(resp: GeminiResponse) -> LlmResponse {
        let candidate = resp.candidates.into_iter().next();

        let end_turn = candidate
            .as_ref()
            .and_then(|c| c.finish_reason.as_deref())
            .is_some_and(|r| r == "STOP");

        // A candidate whose first part has no text counts as empty output,
        // not as a malformed envelope.
        let text = candidate
            .and_then(|c| c.content)
            .and_then(|c| c.parts)
            .map(|parts| {
                parts
                    .into_iter()
                    .next()
                    .and_then(|p| p.text)
                    .unwrap_or_default()
            });

        let usage = resp
            .usage_metadata
            .map(|u| Usage {
                input_tokens: u64::from(u.prompt_token_count),
                output_tokens: u64::from(u.candidates_token_count),
            })
            .unwrap_or_default();

        LlmResponse {
            text,
            end_turn,
            usage,
        }
    }
}

#[async_trait]
impl LlmService for GeminiService {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let gemini_request = Self::translate_request(request);

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&gemini_request)
            .send()
            .await
            .map_err(|e| {
                let e = e.without_url();
                if e.is_timeout() {
                    LlmError::network(format!("Request timeout: {e}"))
                } else if e.is_connect() {
                    LlmError::network(format!("Connection failed: {e}"))
                } else {
                    LlmError::unknown(format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| {
                LlmError::network(format!("Failed to read response: {}", e.without_url()))
            })?;

        if !status.is_success() {
            let message = serde_json::from_str::<GeminiErrorResponse>(&body)
                .map_or(body, |resp| resp.error.message);
            return Err(match status.as_u16() {
                400 => LlmError::invalid_request(format!("Gemini API error: {status} {message}")),
                401 | 403 => LlmError::auth(format!("Gemini API error: {status} {message}")),
                429 => LlmError::rate_limit(format!("Gemini API error: {status} {message}")),
                500..=599 => LlmError::server_error(format!("Gemini API error: {status} {message}")),
                _ => LlmError::unknown(format!("Gemini API error: {status} {message}")),
            });
        }

        let gemini_response: GeminiResponse = serde_json::from_str(&body)
            .map_err(|e| LlmError::unknown(format!("Failed to parse response: {e}")))?;

        Ok(Self::normalize_response(gemini_response))
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

// Gemini API types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parts: Option<Vec<GeminiPart>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    usage_metadata: Option<GeminiUsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: GeminiError,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::{LlmResponder, Responder};
    use crate::llm::LlmErrorKind;
    use serde_json::json;
    use std::sync::Arc;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const MODEL_PATH: &str = "/v1beta/models/gemini-2.0-flash:generateContent";

    fn service(server: &MockServer) -> GeminiService {
        GeminiService::new("test-key".to_string(), DEFAULT_MODEL, &server.uri())
            .expect("client builds")
    }

    fn request() -> LlmRequest {
        LlmRequest::prompt("Say hi")
            .with_temperature(0.7)
            .with_max_tokens(500)
    }

    #[tokio::test]
    async fn sends_prompt_and_generation_config() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(MODEL_PATH))
            .and(header("x-goog-api-key", "test-key"))
            .and(body_json(json!({
                "contents": [{ "role": "user", "parts": [{ "text": "Say hi" }] }],
                "generationConfig": { "temperature": 0.7, "maxOutputTokens": 500 }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": { "role": "model", "parts": [{ "text": "Hi there." }] },
                    "finishReason": "STOP"
                }],
                "usageMetadata": {
                    "promptTokenCount": 12,
                    "candidatesTokenCount": 3,
                    "totalTokenCount": 15
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let response = service(&server).complete(&request()).await.unwrap();

        assert_eq!(response.text.as_deref(), Some("Hi there."));
        assert!(response.end_turn);
        assert_eq!(response.usage.input_tokens, 12);
        assert_eq!(response.usage.output_tokens, 3);
    }

    #[tokio::test]
    async fn missing_candidates_yield_no_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(MODEL_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "promptFeedback": { "blockReason": "SAFETY" }
            })))
            .mount(&server)
            .await;

        let response = service(&server).complete(&request()).await.unwrap();
        assert_eq!(response.text, None);
        assert!(!response.end_turn);
    }

    #[tokio::test]
    async fn candidate_without_text_yields_empty_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(MODEL_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": { "role": "model", "parts": [{}] },
                    "finishReason": "MAX_TOKENS"
                }]
            })))
            .mount(&server)
            .await;

        let response = service(&server).complete(&request()).await.unwrap();
        assert_eq!(response.text.as_deref(), Some(""));
    }

    #[tokio::test]
    async fn error_status_is_classified() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(MODEL_PATH))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "error": { "code": 429, "message": "Quota exceeded", "status": "RESOURCE_EXHAUSTED" }
            })))
            .mount(&server)
            .await;

        let err = service(&server).complete(&request()).await.unwrap_err();
        assert_eq!(err.kind, LlmErrorKind::RateLimit);
        assert!(err.message.contains("429"));
        assert!(err.message.contains("Quota exceeded"));
    }

    #[tokio::test]
    async fn unparseable_error_body_is_kept_verbatim() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(MODEL_PATH))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
            .mount(&server)
            .await;

        let err = service(&server).complete(&request()).await.unwrap_err();
        assert_eq!(err.kind, LlmErrorKind::ServerError);
        assert!(err.message.ends_with("upstream down"));
    }

    #[tokio::test]
    async fn transport_errors_do_not_expose_the_key() {
        let key = "SECRET-KEY-123456";
        let svc = GeminiService::new(key.to_string(), DEFAULT_MODEL, "http://127.0.0.1:1")
            .unwrap();

        let err = svc.complete(&request()).await.unwrap_err();
        assert_eq!(err.kind, LlmErrorKind::Network);
        assert!(!err.message.contains(key));

        let reply = LlmResponder::new(Arc::new(svc))
            .respond("p", "t", &[])
            .await
            .unwrap();
        assert!(reply.starts_with("Error: "));
        assert!(!reply.contains(key));
    }

    #[test]
    fn endpoint_tolerates_trailing_slash() {
        let svc = GeminiService::new("k".to_string(), "gemini-x", "http://gw.local/").unwrap();
        assert_eq!(
            svc.endpoint,
            "http://gw.local/v1beta/models/gemini-x:generateContent"
        );
    }
}
