use std::time::Duration;

use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, instrument};

use altnet_core::{AssetResolver, CollaboratorError};

use crate::generator::transport_error;

pub const DEFAULT_PRIMARY_BASE: &str = "https://image.pollinations.ai/prompt";
pub const DEFAULT_FALLBACK_BASE: &str = "https://gen.pollinations.ai/image";

/// Characters `encodeURIComponent` leaves alone.
const PROMPT_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

#[derive(Clone, Debug)]
pub struct AssetConfig {
    pub primary_base: String,
    pub fallback_base: String,
    pub model: String,
    pub width: u32,
    pub height: u32,
    /// Sent as a bearer header on the verification request only; never
    /// embedded in the returned URL.
    pub api_key: Option<SecretString>,
    pub request_timeout: Duration,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            primary_base: DEFAULT_PRIMARY_BASE.to_string(),
            fallback_base: DEFAULT_FALLBACK_BASE.to_string(),
            model: "flux".to_string(),
            width: 768,
            height: 512,
            api_key: None,
            request_timeout: Duration::from_secs(60),
        }
    }
}

/// [`AssetResolver`] that builds a prompt URL on an image service, checks it
/// answers, and falls back to a second endpoint once.
pub struct HttpAssetResolver {
    client: Client,
    config: AssetConfig,
}

impl HttpAssetResolver {
    pub fn new(config: AssetConfig) -> Result<Self, CollaboratorError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| CollaboratorError::NotConfigured(format!("http client: {e}")))?;
        Ok(Self { client, config })
    }

    /// Image URL for `prompt` on the service rooted at `base`.
    pub fn image_url(&self, base: &str, prompt: &str) -> String {
        format!(
            "{}/{}?model={}&width={}&height={}&nologo=true",
            base.trim_end_matches('/'),
            utf8_percent_encode(prompt, PROMPT_SEGMENT),
            utf8_percent_encode(&self.config.model, PROMPT_SEGMENT),
            self.config.width,
            self.config.height,
        )
    }

    async fn verify(&self, url: &str) -> Result<(), CollaboratorError> {
        let mut req = self.client.get(url);
        if let Some(key) = &self.config.api_key {
            req = req.bearer_auth(key.expose_secret());
        }
        let resp = req
            .send()
            .await
            .map_err(|e| transport_error(&e, self.config.request_timeout))?;
        if resp.status().is_success() {
            Ok(())
        } else {
            let status = resp.status().as_u16();
            Err(CollaboratorError::from_status(status, String::new()))
        }
    }
}

#[async_trait]
impl AssetResolver for HttpAssetResolver {
    #[instrument(skip(self))]
    async fn resolve(&self, prompt: &str) -> Result<String, CollaboratorError> {
        let primary = self.image_url(&self.config.primary_base, prompt);
        match self.verify(&primary).await {
            Ok(()) => return Ok(primary),
            Err(e) => debug!(error = %e, "primary image endpoint failed, trying fallback"),
        }

        let fallback = self.image_url(&self.config.fallback_base, prompt);
        self.verify(&fallback).await?;
        Ok(fallback)
    }
}
