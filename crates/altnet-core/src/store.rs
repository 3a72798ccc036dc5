use async_trait::async_trait;

use crate::errors::StoreError;
use crate::ids::{ExplorationId, NodeId, RecordId};
use crate::model::{ExplorationTree, NewExploration, NewPageRecord, Node, PageRecord};

/// The shared record and lineage store.
///
/// Consistency is eventual: a read issued right after a write may not observe
/// it. Mutation is append-only apart from the one-time exploration and
/// screenshot backfills.
#[async_trait]
pub trait Store: Send + Sync {
    /// Most recent `limit` records, newest first.
    async fn recent_records(&self, limit: usize) -> Result<Vec<PageRecord>, StoreError>;

    /// Records whose URL equals `url` exactly, newest first.
    async fn records_by_url(&self, url: &str) -> Result<Vec<PageRecord>, StoreError>;

    /// Number of records whose URL starts with `prefix` (plain string prefix).
    async fn count_records_with_prefix(&self, prefix: &str) -> Result<usize, StoreError>;

    async fn get_record(&self, id: &RecordId) -> Result<Option<PageRecord>, StoreError>;

    async fn insert_record(&self, record: NewPageRecord) -> Result<RecordId, StoreError>;

    /// Assign a record to its lineage. Returns `false`, leaving the record
    /// untouched, when it already has an exploration id.
    async fn set_record_exploration(
        &self,
        id: &RecordId,
        exploration_id: &ExplorationId,
    ) -> Result<bool, StoreError>;

    async fn set_record_screenshot(&self, id: &RecordId, screenshot_ref: &str) -> Result<(), StoreError>;

    async fn get_tree(&self, id: &ExplorationId) -> Result<Option<ExplorationTree>, StoreError>;

    async fn create_tree(&self, tree: NewExploration) -> Result<ExplorationId, StoreError>;

    /// Push a node into an existing tree's node map.
    async fn append_node(&self, id: &ExplorationId, node: Node) -> Result<NodeId, StoreError>;

    async fn set_node_screenshot(
        &self,
        id: &ExplorationId,
        node_id: &NodeId,
        screenshot_ref: &str,
    ) -> Result<(), StoreError>;
}
