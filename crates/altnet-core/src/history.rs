use async_trait::async_trait;

use crate::errors::StoreError;
use crate::ids::VisitId;
use crate::model::{NewVisit, Visit};

/// Visits kept; older ones are dropped when a new one is added.
pub const HISTORY_CAPACITY: usize = 200;

/// The local browsing history. Unlike [`crate::Store`] it is private to one
/// user and survives between runs.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Add a visit, keeping only the newest [`HISTORY_CAPACITY`].
    async fn add_visit(&self, visit: NewVisit) -> Result<VisitId, StoreError>;

    /// Newest first.
    async fn visits(&self, limit: usize) -> Result<Vec<Visit>, StoreError>;

    async fn get_visit(&self, id: &VisitId) -> Result<Option<Visit>, StoreError>;

    /// `false` when there was no such visit.
    async fn delete_visit(&self, id: &VisitId) -> Result<bool, StoreError>;

    /// Remove everything; returns how many visits were dropped.
    async fn clear_visits(&self) -> Result<usize, StoreError>;
}
