pub mod address;
pub mod collaborators;
pub mod errors;
pub mod history;
pub mod ids;
pub mod model;
pub mod store;

pub use collaborators::{AssetResolver, Generator, ScreenshotCapturer};
pub use errors::{CollaboratorError, StoreError};
pub use history::{HistoryStore, HISTORY_CAPACITY};
pub use ids::{ExplorationId, NodeId, RecordId, VisitId};
pub use model::{ExplorationTree, NewExploration, NewPageRecord, NewVisit, Node, PageRecord, Visit};
pub use store::Store;

/// Milliseconds since the Unix epoch, the timestamp unit used on records and nodes.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
