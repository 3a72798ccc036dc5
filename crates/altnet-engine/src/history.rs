//! The persistent browsing history: every page shown, kept across runs so it
//! can be reopened without asking the generator again.

use std::sync::Arc;

use tracing::{debug, instrument};

use altnet_content::html::truncate_chars;
use altnet_content::{pack_content, unpack_content};
use altnet_core::{HistoryStore, NewVisit, StoreError, Visit, VisitId, HISTORY_CAPACITY};

/// Markup longer than this is cut before a visit is stored.
pub const MAX_VISIT_HTML_CHARS: usize = 50_000;

/// Cut the markup of a packed page to [`MAX_VISIT_HTML_CHARS`], keeping the
/// storage form. Styles and scripts are left whole.
pub fn trim_for_history(packed: &str) -> String {
    let parts = unpack_content(packed);
    if parts.html.chars().count() <= MAX_VISIT_HTML_CHARS {
        return packed.to_string();
    }
    if parts.css.is_empty() && parts.js.is_empty() {
        return truncate_chars(packed, MAX_VISIT_HTML_CHARS).to_string();
    }
    pack_content(truncate_chars(&parts.html, MAX_VISIT_HTML_CHARS), &parts.css, &parts.js)
}

#[derive(Clone)]
pub struct BrowsingHistory {
    store: Arc<dyn HistoryStore>,
}

impl BrowsingHistory {
    pub fn new(store: Arc<dyn HistoryStore>) -> Self {
        Self { store }
    }

    #[instrument(skip(self, visit), fields(address = %visit.address))]
    pub async fn record(&self, mut visit: NewVisit) -> Result<VisitId, StoreError> {
        let trimmed = trim_for_history(&visit.packed_content);
        if trimmed.len() < visit.packed_content.len() {
            debug!(from = visit.packed_content.len(), to = trimmed.len(), "visit content trimmed");
        }
        visit.packed_content = trimmed;
        self.store.add_visit(visit).await
    }

    /// Everything kept, newest first.
    pub async fn list(&self) -> Result<Vec<Visit>, StoreError> {
        self.store.visits(HISTORY_CAPACITY).await
    }

    pub async fn get(&self, id: &VisitId) -> Result<Option<Visit>, StoreError> {
        self.store.get_visit(id).await
    }

    pub async fn delete(&self, id: &VisitId) -> Result<bool, StoreError> {
        self.store.delete_visit(id).await
    }

    pub async fn clear(&self) -> Result<usize, StoreError> {
        self.store.clear_visits().await
    }
}
