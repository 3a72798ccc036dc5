//! Feed listings served from the caches, with degraded fallbacks.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, instrument, warn};

use altnet_core::{ExplorationId, ExplorationTree, PageRecord, Store, StoreError};

use crate::cache::{KeyedTtlCache, TtlCache, DEFAULT_TTL};
use crate::error::EngineError;
use crate::lineage::{deduplicate, scrubber_key, scrubber_tree, virtual_reconstruct};

/// The deduplicated welcome cards and the raw listing they came from.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct WelcomeListing {
    pub entries: Vec<PageRecord>,
    pub all: Vec<PageRecord>,
}

/// The three listing caches. Publishing invalidates the first two.
pub struct FeedCaches {
    pub feed: TtlCache<Vec<PageRecord>>,
    pub welcome: TtlCache<WelcomeListing>,
    pub scrubbers: KeyedTtlCache<ExplorationTree>,
}

impl FeedCaches {
    pub fn new(ttl: Duration) -> Self {
        Self {
            feed: TtlCache::new(ttl),
            welcome: TtlCache::new(ttl),
            scrubbers: KeyedTtlCache::new(ttl),
        }
    }

    pub fn invalidate_listings(&self) {
        self.feed.invalidate();
        self.welcome.invalidate();
    }
}

impl Default for FeedCaches {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

#[derive(Clone, Debug)]
pub struct FeedConfig {
    pub limit: usize,
    pub welcome_limit: usize,
    pub not_ready_retry: Duration,
    pub not_ready_attempts: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            limit: 50,
            welcome_limit: 30,
            not_ready_retry: Duration::from_secs(1),
            not_ready_attempts: 3,
        }
    }
}

/// A listing plus the notice to show when it is stale or empty because the
/// store could not be read.
#[derive(Clone, Debug)]
pub struct FeedView<T> {
    pub data: Arc<T>,
    pub notice: Option<String>,
}

impl<T> FeedView<T> {
    fn fresh(data: Arc<T>) -> Self {
        Self { data, notice: None }
    }

    pub fn is_degraded(&self) -> bool {
        self.notice.is_some()
    }
}

fn degraded<T: Default>(stale: Option<Arc<T>>, error: &StoreError) -> FeedView<T> {
    match stale {
        Some(data) => FeedView {
            data,
            notice: Some(format!("Showing cached results ({error})")),
        },
        None => FeedView {
            data: Arc::default(),
            notice: Some(format!("Feed unavailable ({error})")),
        },
    }
}

pub struct FeedService {
    store: Arc<dyn Store>,
    caches: Arc<FeedCaches>,
    config: FeedConfig,
}

impl FeedService {
    pub fn new(store: Arc<dyn Store>, caches: Arc<FeedCaches>, config: FeedConfig) -> Self {
        Self { store, caches, config }
    }

    pub fn caches(&self) -> &Arc<FeedCaches> {
        &self.caches
    }

    /// Run a store read, retrying only while the store reports not ready.
    async fn read_with_retry<T, F, Fut>(&self, mut op: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Err(e) if e.is_not_ready() && attempt < self.config.not_ready_attempts => {
                    debug!(attempt, "store not ready, retrying");
                    tokio::time::sleep(self.config.not_ready_retry).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    async fn read_listing(&self, limit: usize) -> Result<Vec<PageRecord>, StoreError> {
        self.read_with_retry(|| self.store.recent_records(limit)).await
    }

    /// Most recent records, newest first.
    #[instrument(skip(self))]
    pub async fn feed(&self, force: bool) -> FeedView<Vec<PageRecord>> {
        match self
            .caches
            .feed
            .get_or_fetch(force, || self.read_listing(self.config.limit))
            .await
        {
            Ok(data) => FeedView::fresh(data),
            Err(e) => {
                warn!(error = %e, "feed listing failed");
                degraded(self.caches.feed.stale(), &e)
            }
        }
    }

    /// The feed grouped into lineages, most recently active first.
    pub async fn explorations(&self, force: bool) -> FeedView<Vec<ExplorationTree>> {
        let view = self.feed(force).await;
        FeedView {
            data: Arc::new(virtual_reconstruct(&view.data)),
            notice: view.notice,
        }
    }

    /// One card per lineage for the welcome screen.
    #[instrument(skip(self))]
    pub async fn welcome(&self, force: bool) -> FeedView<WelcomeListing> {
        let fetch = || async {
            let all = self.read_listing(self.config.welcome_limit).await?;
            Ok::<_, StoreError>(WelcomeListing { entries: deduplicate(&all), all })
        };
        match self.caches.welcome.get_or_fetch(force, fetch).await {
            Ok(data) => FeedView::fresh(data),
            Err(e) => {
                warn!(error = %e, "welcome listing failed");
                degraded(self.caches.welcome.stale(), &e)
            }
        }
    }

    /// The lineage tree for one feed card. Never empty: on a store failure
    /// the tree is built from `all` alone.
    #[instrument(skip(self, card, all), fields(record_id = %card.id))]
    pub async fn scrubber(&self, card: &PageRecord, all: &[PageRecord]) -> FeedView<ExplorationTree> {
        let key = scrubber_key(card);
        let fetch = || async {
            let explicit = match &card.exploration_id {
                Some(id) => self.read_with_retry(|| self.store.get_tree(id)).await?,
                None => None,
            };
            Ok::<_, StoreError>(scrubber_tree(card, explicit, all))
        };
        match self.caches.scrubbers.get_or_fetch(&key, false, fetch).await {
            Ok(tree) => FeedView::fresh(tree),
            Err(e) => {
                warn!(key = %key, error = %e, "scrubber tree read failed");
                FeedView {
                    data: Arc::new(scrubber_tree(card, None, all)),
                    notice: Some(format!("Lineage unavailable ({e})")),
                }
            }
        }
    }

    /// A lineage by id: persisted trees come from the store, virtual ids are
    /// rebuilt from the feed listing.
    #[instrument(skip(self), fields(exploration_id = %id))]
    pub async fn lineage(&self, id: &ExplorationId) -> Result<ExplorationTree, EngineError> {
        if id.is_virtual() {
            let listing = self.read_listing(self.config.limit).await?;
            return virtual_reconstruct(&listing)
                .into_iter()
                .find(|t| &t.exploration_id == id)
                .ok_or_else(|| EngineError::NotFound(format!("exploration {id}")));
        }
        self.read_with_retry(|| self.store.get_tree(id))
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("exploration {id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use altnet_core::{NodeId, RecordId};
    use altnet_store::MemoryStore;

    fn record(id: &str, url: &str, ts: i64) -> PageRecord {
        PageRecord {
            id: RecordId::from_raw(id),
            url: url.into(),
            title: url.into(),
            preview_text: String::new(),
            packed_content: String::new(),
            author_name: "Anonymous".into(),
            model_id: "m".into(),
            timestamp: ts,
            exploration_id: None,
            screenshot_ref: None,
        }
    }

    fn service(store: Arc<MemoryStore>) -> FeedService {
        FeedService::new(store, Arc::new(FeedCaches::default()), FeedConfig::default())
    }

    #[tokio::test]
    async fn feed_is_served_from_cache() {
        let store = Arc::new(MemoryStore::new());
        store.seed_record(record("r1", "a", 1));
        let feed = service(Arc::clone(&store));

        let first = feed.feed(false).await;
        let second = feed.feed(false).await;
        assert!(Arc::ptr_eq(&first.data, &second.data));
        assert_eq!(store.listing_reads(), 1);

        feed.feed(true).await;
        assert_eq!(store.listing_reads(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn not_ready_is_retried() {
        let store = Arc::new(MemoryStore::new());
        store.seed_record(record("r1", "a", 1));
        store.fail_next_reads_not_ready(2);
        let feed = service(Arc::clone(&store));

        let view = feed.feed(false).await;
        assert!(!view.is_degraded());
        assert_eq!(view.data.len(), 1);
        assert_eq!(store.listing_reads(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn not_ready_gives_up_after_attempts() {
        let store = Arc::new(MemoryStore::new());
        store.fail_next_reads_not_ready(5);
        let feed = service(Arc::clone(&store));

        let view = feed.feed(false).await;
        assert!(view.data.is_empty());
        assert!(view.notice.unwrap().starts_with("Feed unavailable"));
        assert_eq!(store.listing_reads(), 3);
    }

    #[tokio::test]
    async fn backend_failure_falls_back_to_stale() {
        let store = Arc::new(MemoryStore::new());
        store.seed_record(record("r1", "a", 1));
        let feed = service(Arc::clone(&store));
        feed.feed(false).await;

        store.set_failing(true);
        let view = feed.feed(true).await;
        assert_eq!(view.data.len(), 1);
        assert!(view.notice.unwrap().starts_with("Showing cached results"));
        // Backend errors are not retried.
        assert_eq!(store.listing_reads(), 2);
    }

    #[tokio::test]
    async fn welcome_deduplicates() {
        let store = Arc::new(MemoryStore::new());
        store.seed_record(record("r1", "a", 1));
        store.seed_record(record("r2", "a/b", 2));
        store.seed_record(record("r3", "z", 3));
        let feed = service(store);

        let view = feed.welcome(false).await;
        let ids: Vec<&str> = view.data.entries.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["r3", "r2"]);
        assert_eq!(view.data.all.len(), 3);
    }

    #[tokio::test]
    async fn invalidation_refetches_listings_but_not_scrubbers() {
        let store = Arc::new(MemoryStore::new());
        let card = record("r1", "a", 1);
        store.seed_record(card.clone());
        let feed = service(Arc::clone(&store));

        feed.feed(false).await;
        let tree = feed.scrubber(&card, std::slice::from_ref(&card)).await;
        feed.caches().invalidate_listings();

        feed.feed(false).await;
        assert_eq!(store.listing_reads(), 2);
        let again = feed.scrubber(&card, &[]).await;
        assert!(Arc::ptr_eq(&tree.data, &again.data));
    }

    #[tokio::test]
    async fn scrubber_uses_persisted_tree() {
        let store = Arc::new(MemoryStore::new());
        let mut card = record("r2", "a/b", 2);
        card.exploration_id = Some(ExplorationId::from_raw("expl_1"));
        let mut tree = virtual_reconstruct(&[record("r1", "a", 1), record("r2", "a/b", 2)]).remove(0);
        tree.exploration_id = ExplorationId::from_raw("expl_1");
        store.seed_tree(tree.clone());
        let feed = service(store);

        let view = feed.scrubber(&card, &[]).await;
        assert_eq!(*view.data, tree);
        assert!(view.data.nodes.contains_key(&NodeId::from_raw("r1")));
    }

    #[tokio::test]
    async fn scrubber_survives_store_failure() {
        let store = Arc::new(MemoryStore::new());
        store.set_failing(true);
        let mut card = record("r1", "a", 1);
        card.exploration_id = Some(ExplorationId::from_raw("expl_1"));
        let feed = service(store);

        let view = feed.scrubber(&card, &[]).await;
        assert_eq!(view.data.nodes.len(), 1);
        assert!(view.is_degraded());
    }

    #[tokio::test]
    async fn lineage_resolves_virtual_ids() {
        let store = Arc::new(MemoryStore::new());
        store.seed_record(record("r1", "a", 1));
        store.seed_record(record("r2", "a/b", 2));
        let feed = service(store);

        let tree = feed.lineage(&ExplorationId::virtual_for_url("a")).await.unwrap();
        assert_eq!(tree.nodes.len(), 2);

        let missing = feed.lineage(&ExplorationId::from_raw("expl_nope")).await;
        assert!(matches!(missing, Err(EngineError::NotFound(_))));
    }
}
