use std::path::Path;

use async_trait::async_trait;

use altnet_core::{
    ExplorationId, ExplorationTree, HistoryStore, NewExploration, NewPageRecord, NewVisit, Node, NodeId, PageRecord,
    RecordId, Store, StoreError, Visit, VisitId,
};

use crate::database::Database;
use crate::error::DbError;
use crate::explorations::ExplorationRepo;
use crate::records::RecordRepo;
use crate::visits::VisitRepo;

/// [`Store`] and [`HistoryStore`] backed by one local SQLite file.
pub struct SqliteStore {
    records: RecordRepo,
    explorations: ExplorationRepo,
    visits: VisitRepo,
}

impl SqliteStore {
    pub fn new(db: Database) -> Self {
        Self {
            records: RecordRepo::new(db.clone()),
            explorations: ExplorationRepo::new(db.clone()),
            visits: VisitRepo::new(db),
        }
    }

    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Ok(Self::new(Database::open(path)?))
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        Ok(Self::new(Database::in_memory()?))
    }
}

fn store_err(e: DbError) -> StoreError {
    e.into()
}

#[async_trait]
impl Store for SqliteStore {
    async fn recent_records(&self, limit: usize) -> Result<Vec<PageRecord>, StoreError> {
        self.records.recent(limit).map_err(store_err)
    }

    async fn records_by_url(&self, url: &str) -> Result<Vec<PageRecord>, StoreError> {
        self.records.by_url(url).map_err(store_err)
    }

    async fn count_records_with_prefix(&self, prefix: &str) -> Result<usize, StoreError> {
        self.records.count_with_prefix(prefix).map_err(store_err)
    }

    async fn get_record(&self, id: &RecordId) -> Result<Option<PageRecord>, StoreError> {
        self.records.get(id).map_err(store_err)
    }

    async fn insert_record(&self, record: NewPageRecord) -> Result<RecordId, StoreError> {
        self.records.insert(&record).map_err(store_err)
    }

    async fn set_record_exploration(
        &self,
        id: &RecordId,
        exploration_id: &ExplorationId,
    ) -> Result<bool, StoreError> {
        self.records.set_exploration(id, exploration_id).map_err(store_err)
    }

    async fn set_record_screenshot(&self, id: &RecordId, screenshot_ref: &str) -> Result<(), StoreError> {
        self.records.set_screenshot(id, screenshot_ref).map_err(store_err)
    }

    async fn get_tree(&self, id: &ExplorationId) -> Result<Option<ExplorationTree>, StoreError> {
        self.explorations.get(id).map_err(store_err)
    }

    async fn create_tree(&self, tree: NewExploration) -> Result<ExplorationId, StoreError> {
        self.explorations.create(&tree).map_err(store_err)
    }

    async fn append_node(&self, id: &ExplorationId, node: Node) -> Result<NodeId, StoreError> {
        self.explorations.append_node(id, &node).map_err(store_err)
    }

    async fn set_node_screenshot(
        &self,
        id: &ExplorationId,
        node_id: &NodeId,
        screenshot_ref: &str,
    ) -> Result<(), StoreError> {
        self.explorations
            .set_node_screenshot(id, node_id, screenshot_ref)
            .map_err(store_err)
    }
}

#[async_trait]
impl HistoryStore for SqliteStore {
    async fn add_visit(&self, visit: NewVisit) -> Result<VisitId, StoreError> {
        self.visits.insert(&visit).map_err(store_err)
    }

    async fn visits(&self, limit: usize) -> Result<Vec<Visit>, StoreError> {
        self.visits.recent(limit).map_err(store_err)
    }

    async fn get_visit(&self, id: &VisitId) -> Result<Option<Visit>, StoreError> {
        self.visits.get(id).map_err(store_err)
    }

    async fn delete_visit(&self, id: &VisitId) -> Result<bool, StoreError> {
        self.visits.delete(id).map_err(store_err)
    }

    async fn clear_visits(&self) -> Result<usize, StoreError> {
        self.visits.clear().map_err(store_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(url: &str, ts: i64) -> NewPageRecord {
        NewPageRecord {
            url: url.into(),
            title: "T".into(),
            preview_text: String::new(),
            packed_content: "<p>x</p>".into(),
            author_name: "Anonymous".into(),
            model_id: "m".into(),
            timestamp: ts,
        }
    }

    fn root_node(record_id: &RecordId, url: &str, ts: i64) -> Node {
        Node {
            id: NodeId::new(),
            url: url.into(),
            title: "T".into(),
            parent_node_id: None,
            record_id: Some(record_id.clone()),
            timestamp: ts,
            diff_size: 0,
            concepts: Vec::new(),
            screenshot_ref: None,
            tonal_modifier: None,
        }
    }

    #[tokio::test]
    async fn store_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("altnet.db");

        let (record_id, exploration_id) = {
            let store = SqliteStore::open(&path).unwrap();
            let record_id = store.insert_record(page("wiki.alt", 5)).await.unwrap();
            let exploration_id = store
                .create_tree(NewExploration {
                    root_url: "wiki.alt".into(),
                    author_id: None,
                    author_name: "Anonymous".into(),
                    created_at: 5,
                    tonal_modifier: None,
                    root: root_node(&record_id, "wiki.alt", 5),
                })
                .await
                .unwrap();
            store.set_record_exploration(&record_id, &exploration_id).await.unwrap();
            (record_id, exploration_id)
        };

        let reopened = SqliteStore::open(&path).unwrap();
        let record = reopened.get_record(&record_id).await.unwrap().unwrap();
        assert_eq!(record.exploration_id.as_ref(), Some(&exploration_id));
        let tree = reopened.get_tree(&exploration_id).await.unwrap().unwrap();
        assert_eq!(tree.node_for_record(&record_id).unwrap().url, "wiki.alt");
    }

    #[tokio::test]
    async fn errors_map_to_store_errors() {
        let store = SqliteStore::in_memory().unwrap();
        let err = store
            .append_node(&ExplorationId::from_raw("expl_missing"), root_node(&RecordId::new(), "a", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn history_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("altnet.db");

        let kept = {
            let store = SqliteStore::open(&path).unwrap();
            let visit = |address: &str, ts| NewVisit {
                address: address.into(),
                title: String::new(),
                packed_content: "<p>x</p>".into(),
                model_id: "m".into(),
                timestamp: ts,
                record_id: None,
                exploration_id: None,
            };
            let dropped = store.add_visit(visit("a", 1)).await.unwrap();
            let kept = store.add_visit(visit("b", 2)).await.unwrap();
            assert!(store.delete_visit(&dropped).await.unwrap());
            kept
        };

        let reopened = SqliteStore::open(&path).unwrap();
        let visits = reopened.visits(10).await.unwrap();
        assert_eq!(visits.len(), 1);
        assert_eq!(visits[0].id, kept);
        assert_eq!(visits[0].display_title(), "b");
        assert_eq!(reopened.clear_visits().await.unwrap(), 1);
        assert!(reopened.get_visit(&kept).await.unwrap().is_none());
    }
}
