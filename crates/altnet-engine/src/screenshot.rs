//! Background screenshot capture and backfill.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use altnet_core::{ExplorationId, RecordId, ScreenshotCapturer, Store, StoreError};

/// Accepted reference sizes, in characters.
pub const MIN_REF_CHARS: usize = 200;
pub const MAX_REF_CHARS: usize = 120_000;

pub const DEFAULT_CAPTURE_TIMEOUT: Duration = Duration::from_secs(15);

/// References outside the accepted size range are discarded.
pub fn accept_screenshot(reference: &str) -> bool {
    (MIN_REF_CHARS..=MAX_REF_CHARS).contains(&reference.chars().count())
}

#[derive(Clone, Debug)]
pub struct BackfillJob {
    pub document: String,
    pub record_id: RecordId,
    pub exploration_id: Option<ExplorationId>,
    pub timeout: Duration,
}

/// Capture, then write the reference to the record and to the lineage node
/// linking it. Returns the stored reference, or `None` when skipped.
pub async fn backfill(store: &dyn Store, capturer: &dyn ScreenshotCapturer, job: BackfillJob) -> Option<String> {
    let reference = match tokio::time::timeout(job.timeout, capturer.capture(&job.document)).await {
        Ok(Ok(reference)) => reference,
        Ok(Err(e)) => {
            warn!(record_id = %job.record_id, error = %e, "screenshot capture failed");
            return None;
        }
        Err(_) => {
            warn!(record_id = %job.record_id, "screenshot capture timed out");
            return None;
        }
    };
    if !accept_screenshot(&reference) {
        debug!(record_id = %job.record_id, chars = reference.len(), "screenshot rejected by size");
        return None;
    }

    if let Err(e) = write_reference(store, &job, &reference).await {
        warn!(record_id = %job.record_id, error = %e, "screenshot backfill failed");
        return None;
    }
    info!(record_id = %job.record_id, "screenshot stored");
    Some(reference)
}

async fn write_reference(store: &dyn Store, job: &BackfillJob, reference: &str) -> Result<(), StoreError> {
    store.set_record_screenshot(&job.record_id, reference).await?;
    let Some(exploration_id) = &job.exploration_id else {
        return Ok(());
    };
    let node_id = store
        .get_tree(exploration_id)
        .await?
        .and_then(|tree| tree.node_for_record(&job.record_id).map(|n| n.id.clone()));
    match node_id {
        Some(node_id) => store.set_node_screenshot(exploration_id, &node_id, reference).await,
        None => {
            debug!(exploration_id = %exploration_id, "no node for screenshot");
            Ok(())
        }
    }
}

/// Run [`backfill`] as a detached task.
pub fn spawn_backfill(
    store: Arc<dyn Store>,
    capturer: Arc<dyn ScreenshotCapturer>,
    job: BackfillJob,
) -> JoinHandle<Option<String>> {
    tokio::spawn(async move { backfill(store.as_ref(), capturer.as_ref(), job).await })
}

#[cfg(test)]
mod tests {
    use super::*;
    use altnet_core::{CollaboratorError, ExplorationTree, Node, NodeId, PageRecord};
    use altnet_llm::MockScreenshots;
    use altnet_store::MemoryStore;

    fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        store.seed_record(PageRecord {
            id: RecordId::from_raw("r1"),
            url: "a".into(),
            title: "A".into(),
            preview_text: String::new(),
            packed_content: String::new(),
            author_name: "Anonymous".into(),
            model_id: "m".into(),
            timestamp: 1,
            exploration_id: Some(ExplorationId::from_raw("e1")),
            screenshot_ref: None,
        });
        let root = Node {
            id: NodeId::from_raw("n1"),
            url: "a".into(),
            title: "A".into(),
            parent_node_id: None,
            record_id: Some(RecordId::from_raw("r1")),
            timestamp: 1,
            diff_size: 0,
            concepts: Vec::new(),
            screenshot_ref: None,
            tonal_modifier: None,
        };
        store.seed_tree(ExplorationTree {
            exploration_id: ExplorationId::from_raw("e1"),
            root_url: "a".into(),
            author_id: None,
            author_name: "Anonymous".into(),
            created_at: 1,
            tonal_modifier: None,
            nodes: [(root.id.clone(), root)].into_iter().collect(),
        });
        store
    }

    fn job() -> BackfillJob {
        BackfillJob {
            document: "<p>a</p>".into(),
            record_id: RecordId::from_raw("r1"),
            exploration_id: Some(ExplorationId::from_raw("e1")),
            timeout: DEFAULT_CAPTURE_TIMEOUT,
        }
    }

    #[test]
    fn size_bounds() {
        assert!(!accept_screenshot(&"x".repeat(199)));
        assert!(accept_screenshot(&"x".repeat(200)));
        assert!(accept_screenshot(&"x".repeat(120_000)));
        assert!(!accept_screenshot(&"x".repeat(120_001)));
    }

    #[tokio::test]
    async fn writes_record_and_node() {
        let store = seeded();
        let reference = format!("data:image/jpeg;base64,{}", "A".repeat(300));
        let capturer = MockScreenshots::returning(&reference);

        let stored = backfill(&store, &capturer, job()).await;
        assert_eq!(stored.as_deref(), Some(reference.as_str()));

        let record = store.get_record(&RecordId::from_raw("r1")).await.unwrap().unwrap();
        assert_eq!(record.screenshot_ref.as_deref(), Some(reference.as_str()));
        let tree = store.get_tree(&ExplorationId::from_raw("e1")).await.unwrap().unwrap();
        assert_eq!(tree.nodes[&NodeId::from_raw("n1")].screenshot_ref.as_deref(), Some(reference.as_str()));
    }

    #[tokio::test]
    async fn small_reference_is_skipped() {
        let store = seeded();
        let capturer = MockScreenshots::returning("tiny");
        assert!(backfill(&store, &capturer, job()).await.is_none());
        let record = store.get_record(&RecordId::from_raw("r1")).await.unwrap().unwrap();
        assert!(record.screenshot_ref.is_none());
    }

    #[tokio::test]
    async fn capture_failure_is_skipped() {
        let store = seeded();
        let capturer = MockScreenshots::failing(CollaboratorError::ServerError { status: 500, body: "x".into() });
        assert!(backfill(&store, &capturer, job()).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_capture_times_out() {
        let store = seeded();
        let capturer = MockScreenshots::returning(&"x".repeat(500)).with_delay(Duration::from_secs(60));
        let handle = spawn_backfill(Arc::new(store), Arc::new(capturer), job());
        assert!(handle.await.unwrap().is_none());
    }
}
