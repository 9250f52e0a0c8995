//! Installation repository: detail, history lists and the status log.

use async_trait::async_trait;

use super::error::RepositoryResult;
use crate::models::{
    ConsumptionRecord, FraudRecord, Installation, NewStatus, ServiceNote, StatusRecord,
};

/// Repository trait for installation-scoped reads and the status append.
///
/// History lookups for an unknown installation return empty lists rather than
/// `NotFound`; callers that need the distinction use [`get_installation`].
///
/// [`get_installation`]: InstallationRepository::get_installation
#[async_trait]
pub trait InstallationRepository: Send + Sync {
    // ==================== Health & Connection ====================

    /// Check if the backing store is reachable.
    async fn health_check(&self) -> RepositoryResult<bool>;

    // ==================== Installations ====================

    async fn get_installation(&self, installation_id: &str)
        -> RepositoryResult<Option<Installation>>;

    /// The `limit` most recent periods, most recent first.
    async fn fetch_consumption(
        &self,
        installation_id: &str,
        limit: i64,
    ) -> RepositoryResult<Vec<ConsumptionRecord>>;

    /// Every fraud event, most recent first.
    async fn fetch_frauds(&self, installation_id: &str) -> RepositoryResult<Vec<FraudRecord>>;

    /// The `limit` most recent service notes, most recent first.
    async fn fetch_service_notes(
        &self,
        installation_id: &str,
        limit: i64,
    ) -> RepositoryResult<Vec<ServiceNote>>;

    // ==================== Status History ====================

    /// Append a status row. Rows are never updated or deleted.
    async fn append_status(&self, status: &NewStatus) -> RepositoryResult<StatusRecord>;

    /// Most recent status row (latest timestamp, then latest insert).
    async fn fetch_current_status(
        &self,
        installation_id: &str,
    ) -> RepositoryResult<Option<StatusRecord>>;

    /// Every status row, most recent first.
    async fn fetch_status_history(
        &self,
        installation_id: &str,
    ) -> RepositoryResult<Vec<StatusRecord>>;
}
