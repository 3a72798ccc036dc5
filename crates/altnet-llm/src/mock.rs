use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use altnet_core::{AssetResolver, CollaboratorError, Generator, ScreenshotCapturer};

/// Pre-programmed generator replies for deterministic tests.
#[derive(Clone, Debug)]
pub enum MockReply {
    Text(String),
    Error(CollaboratorError),
    /// Wait a duration, then yield the inner reply.
    Delay(Duration, Box<MockReply>),
}

impl MockReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// A well-formed three-section page.
    pub fn page(html: &str, css: &str, js: &str) -> Self {
        Self::Text(format!("===HTML===\n{html}\n===CSS===\n{css}\n===JS===\n{js}"))
    }

    pub fn delayed(delay: Duration, inner: MockReply) -> Self {
        Self::Delay(delay, Box::new(inner))
    }
}

/// Mock generator returning its replies in sequence.
pub struct MockGenerator {
    replies: Vec<MockReply>,
    tonal: Option<String>,
    call_count: AtomicUsize,
    tonal_calls: AtomicUsize,
    prompts: Mutex<Vec<(String, String)>>,
}

impl MockGenerator {
    pub fn new(replies: Vec<MockReply>) -> Self {
        Self {
            replies,
            tonal: None,
            call_count: AtomicUsize::new(0),
            tonal_calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_tonal(mut self, tonal: impl Into<String>) -> Self {
        self.tonal = Some(tonal.into());
        self
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::Relaxed)
    }

    pub fn tonal_calls(&self) -> usize {
        self.tonal_calls.load(Ordering::Relaxed)
    }

    /// `(system, user)` pairs seen so far.
    pub fn prompts(&self) -> Vec<(String, String)> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl Generator for MockGenerator {
    fn model(&self) -> &str {
        "mock-model"
    }

    async fn generate(&self, system: &str, user: &str) -> Result<String, CollaboratorError> {
        let idx = self.call_count.fetch_add(1, Ordering::Relaxed);
        self.prompts.lock().push((system.to_string(), user.to_string()));

        let Some(reply) = self.replies.get(idx) else {
            return Err(CollaboratorError::InvalidRequest(format!(
                "MockGenerator: no reply configured for call {idx}"
            )));
        };

        let mut current = reply;
        loop {
            match current {
                MockReply::Text(text) => return Ok(text.clone()),
                MockReply::Error(e) => return Err(e.clone()),
                MockReply::Delay(duration, inner) => {
                    tokio::time::sleep(*duration).await;
                    current = inner;
                }
            }
        }
    }

    async fn tonal_modifier(&self, _address: &str) -> Option<String> {
        self.tonal_calls.fetch_add(1, Ordering::Relaxed);
        self.tonal.clone()
    }
}

/// Asset resolver answering `https://img.test/<prompt>` unless told to fail.
pub struct MockAssets {
    failing: bool,
    delay: Option<Duration>,
    calls: Mutex<Vec<String>>,
}

impl MockAssets {
    pub fn ok() -> Self {
        Self { failing: false, delay: None, calls: Mutex::new(Vec::new()) }
    }

    pub fn failing() -> Self {
        Self { failing: true, ..Self::ok() }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Prompts requested so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl AssetResolver for MockAssets {
    async fn resolve(&self, prompt: &str) -> Result<String, CollaboratorError> {
        self.calls.lock().push(prompt.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing {
            return Err(CollaboratorError::ServerError { status: 503, body: "mock".into() });
        }
        Ok(format!("https://img.test/{}", prompt.replace(' ', "-")))
    }
}

/// Screenshot capturer with a fixed outcome.
pub struct MockScreenshots {
    outcome: Result<String, CollaboratorError>,
    delay: Option<Duration>,
    call_count: AtomicUsize,
}

impl MockScreenshots {
    pub fn returning(reference: impl Into<String>) -> Self {
        Self { outcome: Ok(reference.into()), delay: None, call_count: AtomicUsize::new(0) }
    }

    pub fn failing(error: CollaboratorError) -> Self {
        Self { outcome: Err(error), delay: None, call_count: AtomicUsize::new(0) }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ScreenshotCapturer for MockScreenshots {
    async fn capture(&self, _document: &str) -> Result<String, CollaboratorError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.outcome.clone()
    }
}
