use async_trait::async_trait;

use crate::errors::CollaboratorError;

/// Turns a system and user instruction into free text that should contain
/// the labelled `===HTML===`, `===CSS===`, `===JS===` sections. Nothing
/// guarantees the labels are present or well-formed.
#[async_trait]
pub trait Generator: Send + Sync {
    fn model(&self) -> &str;

    async fn generate(&self, system: &str, user: &str) -> Result<String, CollaboratorError>;

    /// A short mood phrase for a new lineage. `None` when unavailable.
    async fn tonal_modifier(&self, address: &str) -> Option<String>;
}

/// Resolves a natural-language image prompt to a final image URL.
#[async_trait]
pub trait AssetResolver: Send + Sync {
    async fn resolve(&self, prompt: &str) -> Result<String, CollaboratorError>;
}

/// Captures a rendered document as an image reference (URL or data URL).
#[async_trait]
pub trait ScreenshotCapturer: Send + Sync {
    async fn capture(&self, document: &str) -> Result<String, CollaboratorError>;
}
