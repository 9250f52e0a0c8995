//! Query repository: catalogues of precomputed queries and their results.

use async_trait::async_trait;

use super::error::RepositoryResult;
use crate::db::spatial::SpatialFilter;
use crate::models::{
    AuxiliaryQuery, AuxiliaryQueryHit, AuxiliaryQueryId, MainQuery, MainQueryHit, MainQueryId,
};

#[async_trait]
pub trait QueryRepository: Send + Sync {
    // ==================== Main Queries ====================

    /// Active main queries ordered by id.
    async fn list_main_queries(&self) -> RepositoryResult<Vec<MainQuery>>;

    async fn get_main_query(&self, id: MainQueryId) -> RepositoryResult<Option<MainQuery>>;

    /// Result rows joined to their installation, restricted by `filter` and
    /// ordered by installation id.
    async fn fetch_main_query_results(
        &self,
        id: MainQueryId,
        filter: &SpatialFilter,
    ) -> RepositoryResult<Vec<MainQueryHit>>;

    // ==================== Auxiliary Queries ====================

    /// Active auxiliary queries ordered by id.
    async fn list_auxiliary_queries(&self) -> RepositoryResult<Vec<AuxiliaryQuery>>;

    async fn get_auxiliary_query(
        &self,
        id: AuxiliaryQueryId,
    ) -> RepositoryResult<Option<AuxiliaryQuery>>;

    async fn fetch_auxiliary_query_results(
        &self,
        id: AuxiliaryQueryId,
        filter: &SpatialFilter,
    ) -> RepositoryResult<Vec<AuxiliaryQueryHit>>;
}
