use altnet_core::{CollaboratorError, StoreError};
use altnet_render::RenderError;

/// Why a navigation produced no page.
#[derive(Debug, thiserror::Error)]
pub enum NavigateError {
    #[error("empty address")]
    EmptyAddress,

    #[error("generation failed: {0}")]
    Generation(#[source] CollaboratorError),

    #[error("render failed: {0}")]
    Render(#[from] RenderError),
}

impl NavigateError {
    /// Text for the error banner shown in place of the page.
    pub fn banner(&self) -> String {
        match self {
            Self::Generation(e) if matches!(e, CollaboratorError::AuthenticationFailed(_)) => {
                format!("Connection failed: {e}. Check the API key in settings.")
            }
            Self::Generation(e) => format!("Connection failed: {e}"),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Navigate(#[from] NavigateError),

    #[error("not found: {0}")]
    NotFound(String),
}
