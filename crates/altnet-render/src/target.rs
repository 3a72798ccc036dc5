//! Where rendered views go.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::document::host_page;
use crate::view::{RenderMode, RenderedView};

/// Opaque handle to a mounted view.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RenderHandle(pub u64);

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unknown render handle {0:?}")]
    UnknownHandle(RenderHandle),
}

/// A surface that can display a rendered page.
pub trait RenderTarget: Send + Sync {
    fn mount(&self, title: &str, view: &RenderedView) -> Result<RenderHandle, RenderError>;

    /// Apply a frame height reported by an isolated page.
    fn resize(&self, handle: RenderHandle, height: f64) -> Result<(), RenderError>;
}

/// Keeps every mounted view in memory.
#[derive(Default)]
pub struct RecordingTarget {
    next: AtomicU64,
    mounted: Mutex<Vec<(RenderHandle, String, RenderedView)>>,
    heights: Mutex<Vec<(RenderHandle, f64)>>,
}

impl RecordingTarget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mounted(&self) -> Vec<RenderedView> {
        self.mounted.lock().iter().map(|(_, _, v)| v.clone()).collect()
    }

    pub fn titles(&self) -> Vec<String> {
        self.mounted.lock().iter().map(|(_, t, _)| t.clone()).collect()
    }

    pub fn last(&self) -> Option<RenderedView> {
        self.mounted.lock().last().map(|(_, _, v)| v.clone())
    }

    pub fn heights(&self) -> Vec<(RenderHandle, f64)> {
        self.heights.lock().clone()
    }
}

impl RenderTarget for RecordingTarget {
    fn mount(&self, title: &str, view: &RenderedView) -> Result<RenderHandle, RenderError> {
        let handle = RenderHandle(self.next.fetch_add(1, Ordering::Relaxed));
        self.mounted.lock().push((handle, title.to_string(), view.clone()));
        Ok(handle)
    }

    fn resize(&self, handle: RenderHandle, height: f64) -> Result<(), RenderError> {
        if !self.mounted.lock().iter().any(|(h, _, _)| *h == handle) {
            return Err(RenderError::UnknownHandle(handle));
        }
        self.heights.lock().push((handle, height));
        Ok(())
    }
}

/// Writes each mounted view as a standalone HTML page at a fixed path.
pub struct FileTarget {
    path: PathBuf,
    mounts: AtomicU64,
}

impl FileTarget {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            mounts: AtomicU64::new(0),
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl RenderTarget for FileTarget {
    fn mount(&self, title: &str, view: &RenderedView) -> Result<RenderHandle, RenderError> {
        let page = host_page(title, &view.markup, view.mode == RenderMode::Sandboxed);
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, page)?;
        info!(path = %self.path.display(), mode = ?view.mode, "page written");
        Ok(RenderHandle(self.mounts.fetch_add(1, Ordering::Relaxed)))
    }

    fn resize(&self, handle: RenderHandle, height: f64) -> Result<(), RenderError> {
        // Written pages size themselves through the embedded listener.
        debug!(?handle, height, "resize ignored for file target");
        Ok(())
    }
}
