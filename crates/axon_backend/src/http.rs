//! HTTP adapter for OpenAI-compatible chat-completions endpoints.
//!
//! One request per transduction: the target schema and instructions go in
//! the system prompt, the source instance is the user message, and the
//! reply must be a single JSON object. Transient failures (timeout,
//! transport, server-side errors) are retried up to `max_retries` times -
//! retry policy belongs to this adapter, never to the engine core.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::{BackendError, BackendRequest, BackendResponse, GenerativeBackend};

/// Default model identifier, overridable per deployment.
const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Environment variables consulted by [`HttpBackend::from_env`].
const ENV_ENDPOINT: &str = "AXON_BACKEND_URL";
const ENV_API_KEY: &str = "AXON_BACKEND_KEY";
const ENV_MODEL: &str = "AXON_BACKEND_MODEL";

/// Configuration for the HTTP adapter.
#[derive(Debug, Clone)]
pub struct HttpBackendConfig {
    /// Chat-completions endpoint URL
    pub endpoint: String,

    /// Bearer token, if the endpoint requires one
    pub api_key: Option<String>,

    /// Model identifier sent with every request
    pub model: String,

    /// Sampling temperature (endpoint default when unset)
    pub temperature: Option<f32>,

    /// Retries for transient failures. 0 disables retry.
    pub max_retries: u32,
}

impl HttpBackendConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            temperature: None,
            max_retries: 1,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

/// Chat-completions backend.
pub struct HttpBackend {
    client: Client,
    config: HttpBackendConfig,
}

impl HttpBackend {
    pub fn new(config: HttpBackendConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Build from `AXON_BACKEND_URL` / `AXON_BACKEND_KEY` /
    /// `AXON_BACKEND_MODEL`. Returns None when no endpoint is configured.
    pub fn from_env() -> Option<Self> {
        let endpoint = std::env::var(ENV_ENDPOINT).ok()?;
        let mut config = HttpBackendConfig::new(endpoint);
        if let Ok(key) = std::env::var(ENV_API_KEY) {
            config = config.with_api_key(key);
        }
        if let Ok(model) = std::env::var(ENV_MODEL) {
            config = config.with_model(model);
        }
        Some(Self::new(config))
    }

    async fn call_once(&self, request: &BackendRequest) -> Result<BackendResponse, BackendError> {
        let body = build_body(&self.config, request);

        let mut http = self
            .client
            .post(&self.config.endpoint)
            .timeout(request.timeout)
            .json(&body);
        if let Some(key) = &self.config.api_key {
            http = http.bearer_auth(key);
        }

        let response = http.send().await.map_err(|e| {
            if e.is_timeout() {
                BackendError::Timeout(request.timeout)
            } else {
                BackendError::Http(e.to_string())
            }
        })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| BackendError::Http(format!("failed to read response body: {}", e)))?;

        if status.as_u16() == 429 || status.is_server_error() {
            return Err(BackendError::Http(format!("status {}: {}", status, snippet(&text))));
        }
        if status.is_client_error() {
            return Err(BackendError::Refused(format!(
                "status {}: {}",
                status,
                snippet(&text)
            )));
        }

        let parsed: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| BackendError::Malformed(format!("{} in: {}", e, snippet(&text))))?;
        let content = parsed
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| BackendError::Malformed("response carries no choices".to_string()))?;

        parse_content(content, request.want_explanation)
    }
}

#[async_trait]
impl GenerativeBackend for HttpBackend {
    fn name(&self) -> &str {
        "http"
    }

    fn is_ready(&self) -> bool {
        !self.config.endpoint.is_empty()
    }

    async fn transduce(
        &self,
        request: BackendRequest,
    ) -> Result<BackendResponse, BackendError> {
        if !self.is_ready() {
            return Err(BackendError::NotReady("no endpoint configured".to_string()));
        }

        let mut attempt = 0;
        loop {
            match self.call_once(&request).await {
                Ok(response) => {
                    debug!(model = %self.config.model, attempt, "backend call succeeded");
                    return Ok(response);
                }
                Err(e) if e.is_transient() && attempt < self.config.max_retries => {
                    attempt += 1;
                    warn!(attempt, error = %e, "transient backend failure, retrying");
                    tokio::time::sleep(std::time::Duration::from_millis(250 * attempt as u64))
                        .await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

// ============================================================================
// Request / Response plumbing
// ============================================================================

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: String,
}

fn build_body(config: &HttpBackendConfig, request: &BackendRequest) -> JsonValue {
    let mut body = json!({
        "model": config.model,
        "messages": [
            {"role": "system", "content": system_prompt(request)},
            {"role": "user", "content": request.source.to_string()},
        ],
    });
    if let Some(temperature) = config.temperature {
        body["temperature"] = json!(temperature);
    }
    body
}

fn system_prompt(request: &BackendRequest) -> String {
    let mut prompt = format!(
        "You transduce structured records: fill an instance of the target type \
         from the source instance the user provides.\n\n\
         Source type:\n{}\n\nTarget type:\n{}\n\nINSTRUCTIONS:\n{}\n\n",
        request.source_schema, request.target_schema, request.instructions,
    );
    if request.want_explanation {
        prompt.push_str(
            "Reply with a single JSON object of the form \
             {\"instance\": <target object>, \
             \"provenance\": {<target field>: [<source fields used>]}, \
             \"explanation\": {\"reasoning\": <string>, \"confidence\": <0.0-1.0>}}. ",
        );
    } else {
        prompt.push_str("Reply with a single JSON object conforming to the target type. ");
    }
    prompt.push_str("Set a field to null when the source gives no evidence for it.");
    prompt
}

/// Parse the model's text content into a structured response.
fn parse_content(content: &str, want_explanation: bool) -> Result<BackendResponse, BackendError> {
    let cleaned = strip_code_fences(content);
    let value: JsonValue = serde_json::from_str(cleaned)
        .map_err(|e| BackendError::Malformed(format!("{} in: {}", e, snippet(cleaned))))?;

    // Envelope form: {"instance": ..., "provenance": ..., "explanation": ...}.
    // Only recognized when requested or when envelope siblings are present,
    // so a target type with its own "instance" slot is not misread.
    let looks_enveloped = value.get("instance").is_some()
        && (want_explanation
            || value.get("provenance").is_some()
            || value.get("explanation").is_some());
    if looks_enveloped {
        let instance = value.get("instance").cloned().unwrap_or(JsonValue::Null);
        let provenance = value.get("provenance").and_then(parse_provenance);
        let explanation = value.get("explanation").cloned().filter(|v| !v.is_null());
        let mut response = BackendResponse::instance(instance);
        if let Some(provenance) = provenance {
            response = response.with_provenance(provenance);
        }
        if let Some(explanation) = explanation {
            response = response.with_explanation(explanation);
        }
        return Ok(response);
    }

    // Bare instance (also the fallback when the model skipped the envelope)
    Ok(BackendResponse::instance(value))
}

fn parse_provenance(value: &JsonValue) -> Option<BTreeMap<String, Vec<String>>> {
    let object = value.as_object()?;
    let mut provenance = BTreeMap::new();
    for (slot, sources) in object {
        let sources: Vec<String> = sources
            .as_array()?
            .iter()
            .filter_map(|s| s.as_str().map(|s| s.to_string()))
            .collect();
        provenance.insert(slot.clone(), sources);
    }
    Some(provenance)
}

/// Strip a surrounding markdown code fence, if present.
fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

fn snippet(text: &str) -> &str {
    let mut end = text.len().min(200);
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
