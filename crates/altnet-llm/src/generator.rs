use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, instrument, warn};

use altnet_core::{CollaboratorError, Generator};

use crate::chat::{ChatMessage, ChatRequest, ChatResponse};
use crate::tonal::{clean_tonal_modifier, TONAL_SYSTEM_PROMPT};

pub const DEFAULT_ENDPOINT: &str = "https://gen.pollinations.ai/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "openai";
pub const DEFAULT_TONAL_MODEL: &str = "nova-fast";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const ERROR_BODY_CHARS: usize = 200;
const TONAL_TEMPERATURE: f64 = 1.0;
const TONAL_MAX_TOKENS: u32 = 30;

#[derive(Clone, Debug)]
pub struct GeneratorConfig {
    /// Full chat-completions URL.
    pub endpoint: String,
    pub model: String,
    /// Model used for the short tonal-modifier call.
    pub tonal_model: String,
    pub api_key: Option<SecretString>,
    pub temperature: f64,
    pub max_tokens: u32,
    pub request_timeout: Duration,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            tonal_model: DEFAULT_TONAL_MODEL.to_string(),
            api_key: None,
            temperature: 0.85,
            max_tokens: 2048,
            request_timeout: Duration::from_secs(120),
        }
    }
}

/// [`Generator`] speaking an OpenAI-compatible chat-completions API.
pub struct HttpGenerator {
    client: Client,
    config: GeneratorConfig,
}

impl HttpGenerator {
    pub fn new(config: GeneratorConfig) -> Result<Self, CollaboratorError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| CollaboratorError::NotConfigured(format!("http client: {e}")))?;
        Ok(Self { client, config })
    }

    async fn complete(
        &self,
        model: &str,
        system: &str,
        user: &str,
        temperature: f64,
        max_tokens: u32,
    ) -> Result<String, CollaboratorError> {
        let body = ChatRequest {
            model,
            messages: vec![ChatMessage::system(system), ChatMessage::user(user)],
            temperature,
            max_tokens,
        };

        let mut req = self.client.post(&self.config.endpoint).json(&body);
        if let Some(key) = &self.config.api_key {
            req = req.bearer_auth(key.expose_secret());
        }

        let resp = req
            .send()
            .await
            .map_err(|e| transport_error(&e, self.config.request_timeout))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body: String = resp
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(ERROR_BODY_CHARS)
                .collect();
            return Err(CollaboratorError::from_status(status, body));
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| CollaboratorError::MalformedResponse(e.to_string()))?;
        parsed
            .into_text()
            .ok_or_else(|| CollaboratorError::MalformedResponse("response carried no content".into()))
    }
}

pub(crate) fn transport_error(e: &reqwest::Error, timeout: Duration) -> CollaboratorError {
    if e.is_timeout() {
        CollaboratorError::Timeout(timeout)
    } else {
        CollaboratorError::NetworkError(e.to_string())
    }
}

#[async_trait]
impl Generator for HttpGenerator {
    fn model(&self) -> &str {
        &self.config.model
    }

    #[instrument(skip(self, system, user), fields(model = %self.config.model))]
    async fn generate(&self, system: &str, user: &str) -> Result<String, CollaboratorError> {
        let text = self
            .complete(
                &self.config.model,
                system,
                user,
                self.config.temperature,
                self.config.max_tokens,
            )
            .await;
        if let Err(e) = &text {
            warn!(error = %e, kind = e.error_kind(), "generation request failed");
        }
        text
    }

    #[instrument(skip(self), fields(model = %self.config.tonal_model))]
    async fn tonal_modifier(&self, address: &str) -> Option<String> {
        match self
            .complete(
                &self.config.tonal_model,
                TONAL_SYSTEM_PROMPT,
                address,
                TONAL_TEMPERATURE,
                TONAL_MAX_TOKENS,
            )
            .await
        {
            Ok(raw) => clean_tonal_modifier(&raw),
            Err(e) => {
                debug!(error = %e, "tonal modifier unavailable");
                None
            }
        }
    }
}
