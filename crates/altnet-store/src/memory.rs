use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use altnet_core::{
    ExplorationId, ExplorationTree, HistoryStore, NewExploration, NewPageRecord, NewVisit, Node, NodeId, PageRecord,
    RecordId, Store, StoreError, Visit, VisitId, HISTORY_CAPACITY,
};

#[derive(Default)]
struct Inner {
    records: Vec<PageRecord>,
    trees: HashMap<ExplorationId, ExplorationTree>,
    visits: Vec<Visit>,
}

/// In-process [`Store`] and [`HistoryStore`] for tests and `--ephemeral` runs.
///
/// Reads can be made to fail on demand to exercise the degraded feed paths.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    not_ready_reads: AtomicUsize,
    failing: AtomicBool,
    listing_reads: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `n` reads fail with [`StoreError::NotReady`].
    pub fn fail_next_reads_not_ready(&self, n: usize) {
        self.not_ready_reads.store(n, Ordering::SeqCst);
    }

    /// While set, every read fails with a backend error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of `recent_records` calls served so far, failed ones included.
    pub fn listing_reads(&self) -> usize {
        self.listing_reads.load(Ordering::SeqCst)
    }

    /// Insert a fully formed record, bypassing id assignment.
    pub fn seed_record(&self, record: PageRecord) {
        self.inner.lock().records.push(record);
    }

    /// Insert a fully formed tree.
    pub fn seed_tree(&self, tree: ExplorationTree) {
        self.inner.lock().trees.insert(tree.exploration_id.clone(), tree);
    }

    pub fn record_count(&self) -> usize {
        self.inner.lock().records.len()
    }

    fn check_read(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("store unavailable".into()));
        }
        let pending = self
            .not_ready_reads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if pending.is_ok() {
            return Err(StoreError::NotReady);
        }
        Ok(())
    }
}

fn newest_first(records: &mut [PageRecord]) {
    records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| b.id.cmp(&a.id)));
}

#[async_trait]
impl Store for MemoryStore {
    async fn recent_records(&self, limit: usize) -> Result<Vec<PageRecord>, StoreError> {
        self.listing_reads.fetch_add(1, Ordering::SeqCst);
        self.check_read()?;
        let mut records = self.inner.lock().records.clone();
        newest_first(&mut records);
        records.truncate(limit);
        Ok(records)
    }

    async fn records_by_url(&self, url: &str) -> Result<Vec<PageRecord>, StoreError> {
        self.check_read()?;
        let mut records: Vec<PageRecord> = self
            .inner
            .lock()
            .records
            .iter()
            .filter(|r| r.url == url)
            .cloned()
            .collect();
        newest_first(&mut records);
        Ok(records)
    }

    async fn count_records_with_prefix(&self, prefix: &str) -> Result<usize, StoreError> {
        self.check_read()?;
        Ok(self
            .inner
            .lock()
            .records
            .iter()
            .filter(|r| r.url.starts_with(prefix))
            .count())
    }

    async fn get_record(&self, id: &RecordId) -> Result<Option<PageRecord>, StoreError> {
        self.check_read()?;
        Ok(self.inner.lock().records.iter().find(|r| &r.id == id).cloned())
    }

    async fn insert_record(&self, record: NewPageRecord) -> Result<RecordId, StoreError> {
        let id = RecordId::new();
        self.inner.lock().records.push(record.into_record(id.clone()));
        Ok(id)
    }

    async fn set_record_exploration(
        &self,
        id: &RecordId,
        exploration_id: &ExplorationId,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock();
        let record = inner
            .records
            .iter_mut()
            .find(|r| &r.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("record {id}")))?;
        if record.exploration_id.is_some() {
            return Ok(false);
        }
        record.exploration_id = Some(exploration_id.clone());
        Ok(true)
    }

    async fn set_record_screenshot(&self, id: &RecordId, screenshot_ref: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let record = inner
            .records
            .iter_mut()
            .find(|r| &r.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("record {id}")))?;
        record.screenshot_ref = Some(screenshot_ref.to_string());
        Ok(())
    }

    async fn get_tree(&self, id: &ExplorationId) -> Result<Option<ExplorationTree>, StoreError> {
        self.check_read()?;
        Ok(self.inner.lock().trees.get(id).cloned())
    }

    async fn create_tree(&self, tree: NewExploration) -> Result<ExplorationId, StoreError> {
        let id = ExplorationId::new();
        let root_id = tree.root.id.clone();
        let stored = ExplorationTree {
            exploration_id: id.clone(),
            root_url: tree.root_url,
            author_id: tree.author_id,
            author_name: tree.author_name,
            created_at: tree.created_at,
            tonal_modifier: tree.tonal_modifier,
            nodes: [(root_id, tree.root)].into_iter().collect(),
        };
        self.inner.lock().trees.insert(id.clone(), stored);
        Ok(id)
    }

    async fn append_node(&self, id: &ExplorationId, node: Node) -> Result<NodeId, StoreError> {
        let mut inner = self.inner.lock();
        let tree = inner
            .trees
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("exploration {id}")))?;
        let node_id = node.id.clone();
        tree.nodes.insert(node_id.clone(), node);
        Ok(node_id)
    }

    async fn set_node_screenshot(
        &self,
        id: &ExplorationId,
        node_id: &NodeId,
        screenshot_ref: &str,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let node = inner
            .trees
            .get_mut(id)
            .and_then(|t| t.nodes.get_mut(node_id))
            .ok_or_else(|| StoreError::NotFound(format!("node {node_id} in exploration {id}")))?;
        node.screenshot_ref = Some(screenshot_ref.to_string());
        Ok(())
    }
}

#[async_trait]
impl HistoryStore for MemoryStore {
    async fn add_visit(&self, visit: NewVisit) -> Result<VisitId, StoreError> {
        let id = VisitId::new();
        let mut inner = self.inner.lock();
        inner.visits.push(visit.into_visit(id.clone()));
        inner
            .visits
            .sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| b.id.cmp(&a.id)));
        inner.visits.truncate(HISTORY_CAPACITY);
        Ok(id)
    }

    async fn visits(&self, limit: usize) -> Result<Vec<Visit>, StoreError> {
        self.check_read()?;
        Ok(self.inner.lock().visits.iter().take(limit).cloned().collect())
    }

    async fn get_visit(&self, id: &VisitId) -> Result<Option<Visit>, StoreError> {
        self.check_read()?;
        Ok(self.inner.lock().visits.iter().find(|v| &v.id == id).cloned())
    }

    async fn delete_visit(&self, id: &VisitId) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock();
        let before = inner.visits.len();
        inner.visits.retain(|v| &v.id != id);
        Ok(inner.visits.len() < before)
    }

    async fn clear_visits(&self) -> Result<usize, StoreError> {
        Ok(std::mem::take(&mut self.inner.lock().visits).len())
    }
}
