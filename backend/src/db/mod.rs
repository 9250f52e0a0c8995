//! Database module for installations, inspection queries and area data.
//!
//! This module provides abstractions for database operations via the Repository pattern,
//! allowing different storage backends to be swapped easily.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Application Layer (REST API)                           │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼─────────────────────────────────────┐
//! │  Service Layer (services.rs) - Business Logic           │
//! │  - GeoJSON shaping, limits, fraud window                │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼─────────────────────────────────────┐
//! │  Repository Traits (repository/) - Abstract Interface   │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//!     ┌───────────────┴────────────────┐
//! ┌───▼──────────────────┐   ┌─────────▼───────────┐
//! │ Postgres/PostGIS     │   │ Local (in-memory)   │
//! └──────────────────────┘   └─────────────────────┘
//! ```
//!
//! # Modules
//! - `services`: High-level operations used by the HTTP handlers
//! - `repository`: Trait definitions for database operations
//! - `spatial`: Area and viewport filters shared by both backends
//! - `repositories::postgres`: Postgres implementation with Diesel ORM
//! - `repositories::local`: In-memory implementation for tests and local development
//! - `fixtures`: JSON seed data for the local repository
//! - `factory`: Factory for creating repository instances
//!
//! # Recommended Usage
//!
//! ```ignore
//! use sasi_backend::db::{services, RepositoryFactory};
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let repo = RepositoryFactory::from_env().await?;
//!     let queries = services::list_main_queries(repo.as_ref()).await?;
//!     Ok(())
//! }
//! ```

#[cfg(not(any(feature = "postgres-repo", feature = "local-repo")))]
compile_error!("Enable at least one repository backend feature.");

pub mod factory;
pub mod fixtures;
pub mod repo_config;
pub mod repositories;
pub mod repository;
pub mod services;
pub mod spatial;

// Postgres config is colocated with the repository implementation.
#[cfg(feature = "postgres-repo")]
pub use repositories::postgres::PostgresConfig;
#[cfg(not(feature = "postgres-repo"))]
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    _private: (),
}
#[cfg(not(feature = "postgres-repo"))]
impl PostgresConfig {
    pub fn from_env() -> Result<Self, String> {
        Err("Postgres repository feature not enabled".to_string())
    }
}

// ==================== Service Layer ====================

pub use services::{
    clamp_limit, compute_area_metrics, compute_area_metrics_at, get_auxiliary_query_results,
    get_consumption_history, get_current_status, get_fraud_history, get_installation,
    get_main_query_results, get_municipality_feature, get_service_notes, get_status_history,
    health_check, list_auxiliary_queries, list_main_queries, list_municipalities, update_status,
};

// ==================== Repository Pattern Exports ====================

pub use factory::{RepositoryFactory, RepositoryType};
pub use fixtures::{Fixture, FixtureError};
pub use repo_config::RepositoryConfig;
pub use repositories::LocalRepository;
#[cfg(feature = "postgres-repo")]
pub use repositories::PostgresRepository;
pub use repository::{
    AreaRepository, ErrorContext, FullRepository, InstallationRepository, QueryRepository,
    RepositoryError, RepositoryResult,
};
pub use spatial::SpatialFilter;
