//! Settings type definitions.
//!
//! Field names are camelCase on disk. Every section carries
//! `#[serde(default)]` so a partial file only needs the values it changes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Root settings type, loaded from `~/.altnet/settings.json`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AltnetSettings {
    pub generator: GeneratorSettings,
    pub assets: AssetSettings,
    pub feed: FeedSettings,
    pub publish: PublishSettings,
    pub screenshots: ScreenshotSettings,
    pub store: StoreSettings,
    pub logging: LoggingSettings,
}

/// Page generation endpoint.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GeneratorSettings {
    /// Full chat-completions URL.
    pub endpoint: String,
    pub model: String,
    /// Model used for the one-line tonal modifier.
    pub tonal_model: String,
    /// Request a tonal modifier for every new lineage.
    pub tonal_modifiers: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub temperature: f64,
    pub max_tokens: u32,
    pub request_timeout_secs: u64,
    /// Replaces the built-in page instructions when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://gen.pollinations.ai/v1/chat/completions".to_string(),
            model: "openai".to_string(),
            tonal_model: "nova-fast".to_string(),
            tonal_modifiers: true,
            api_key: None,
            temperature: 0.85,
            max_tokens: 2048,
            request_timeout_secs: 120,
            system_prompt: None,
        }
    }
}

/// Image generation for `data-ai-prompt` placeholders.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AssetSettings {
    pub primary_base: String,
    pub fallback_base: String,
    pub model: String,
    pub width: u32,
    pub height: u32,
    /// Prompts resolved per page, 1 to 3.
    pub images_per_page: usize,
    pub timeout_secs: u64,
    /// Defaults to the generator key when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl Default for AssetSettings {
    fn default() -> Self {
        Self {
            primary_base: "https://image.pollinations.ai/prompt".to_string(),
            fallback_base: "https://gen.pollinations.ai/image".to_string(),
            model: "flux".to_string(),
            width: 768,
            height: 512,
            images_per_page: 2,
            timeout_secs: 60,
            api_key: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FeedSettings {
    pub limit: usize,
    pub welcome_limit: usize,
    pub cache_ttl_secs: u64,
    pub not_ready_retry_ms: u64,
    pub not_ready_attempts: u32,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            limit: 50,
            welcome_limit: 30,
            cache_ttl_secs: 300,
            not_ready_retry_ms: 1000,
            not_ready_attempts: 3,
        }
    }
}

/// What to do when an address has already been published.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Show the newest existing record instead of generating.
    #[default]
    Reuse,
    /// Generate again and store under a `~N` suffix.
    Regenerate,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PublishSettings {
    pub enabled: bool,
    pub author_name: String,
    pub max_packed_bytes: usize,
    pub duplicate_policy: DuplicatePolicy,
}

impl Default for PublishSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            author_name: "Anonymous".to_string(),
            max_packed_bytes: 40_000,
            duplicate_policy: DuplicatePolicy::Reuse,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScreenshotSettings {
    pub enabled: bool,
    pub timeout_secs: u64,
}

impl Default for ScreenshotSettings {
    fn default() -> Self {
        Self { enabled: true, timeout_secs: 15 }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreSettings {
    /// SQLite file; `~/.altnet/altnet.db` when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    pub level: String,
    pub json: bool,
    /// Per-module overrides, e.g. `{"altnet_store": "debug"}`.
    pub modules: BTreeMap<String, String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            json: false,
            modules: BTreeMap::new(),
        }
    }
}
