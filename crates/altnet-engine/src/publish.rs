//! Turning a rendered page into a feed record.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use altnet_content::html::{derive_preview, extract_title};
use altnet_content::{pack_bounded, unpack_content, ContentParts};
use altnet_core::address::{disambiguated, normalize};
use altnet_core::{now_millis, NewPageRecord, RecordId, Store, StoreError};

use crate::feed::FeedCaches;

/// Largest packed content written to a record.
pub const DEFAULT_MAX_PACKED_BYTES: usize = 40_000;

#[derive(Clone, Debug)]
pub struct PublishConfig {
    pub enabled: bool,
    pub author_name: String,
    pub max_packed_bytes: usize,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            author_name: "Anonymous".to_string(),
            max_packed_bytes: DEFAULT_MAX_PACKED_BYTES,
        }
    }
}

/// A page ready to publish.
#[derive(Clone, Debug)]
pub struct PageDraft<'a> {
    /// Address as typed, used when the page has no heading.
    pub address: &'a str,
    pub storage_url: &'a str,
    pub parts: &'a ContentParts,
    pub model_id: &'a str,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Publication {
    pub record_id: RecordId,
    pub url: String,
    pub title: String,
    pub packed_content: String,
    pub timestamp: i64,
}

pub struct Publisher {
    store: Arc<dyn Store>,
    caches: Arc<FeedCaches>,
    config: PublishConfig,
}

impl Publisher {
    pub fn new(store: Arc<dyn Store>, caches: Arc<FeedCaches>, config: PublishConfig) -> Self {
        Self { store, caches, config }
    }

    pub fn config(&self) -> &PublishConfig {
        &self.config
    }

    /// Storage URL for a new page at `address`. A regenerated address that
    /// already has records gets a `~N` suffix; a failed count keeps the base.
    #[instrument(skip(self))]
    pub async fn storage_url(&self, address: &str, already_published: bool) -> String {
        let base = normalize(address);
        if !already_published {
            return base;
        }
        match self.store.count_records_with_prefix(&base).await {
            Ok(existing) => disambiguated(&base, existing),
            Err(e) => {
                warn!(url = %base, error = %e, "duplicate count failed, using base url");
                base
            }
        }
    }

    /// Insert the record and invalidate the listing caches.
    ///
    /// The preview is derived from the bounded packed form.
    #[instrument(skip(self, draft), fields(url = draft.storage_url))]
    pub async fn publish(&self, draft: PageDraft<'_>) -> Result<Publication, StoreError> {
        let packed = pack_bounded(draft.parts, self.config.max_packed_bytes);
        let stored_html = unpack_content(&packed).html;

        let title = match extract_title(&draft.parts.html) {
            t if t.is_empty() => draft.address.trim().to_string(),
            t => t,
        };
        let url = draft.storage_url.to_lowercase();
        let timestamp = now_millis();
        debug!(bytes = packed.len(), "packed content bounded");

        let record_id = self
            .store
            .insert_record(NewPageRecord {
                url: url.clone(),
                title: title.clone(),
                preview_text: derive_preview(&stored_html),
                packed_content: packed.clone(),
                author_name: self.config.author_name.clone(),
                model_id: draft.model_id.to_string(),
                timestamp,
            })
            .await?;
        self.caches.invalidate_listings();
        info!(record_id = %record_id, "page published");

        Ok(Publication { record_id, url, title, packed_content: packed, timestamp })
    }
}
