//! Repository trait definitions for database operations.
//!
//! Responsibilities are split across focused traits:
//!
//! - [`error`]: Error types for repository operations
//! - [`installation`]: Installations, their history and the status log
//! - [`query`]: Main/auxiliary query catalogues and their spatial results
//! - [`area`]: Municipalities and area aggregates
//!
//! # Convenience Trait Bound
//!
//! For functions that need all repository capabilities, use the [`FullRepository`] trait bound:
//!
//! ```ignore
//! async fn my_service<R: FullRepository + ?Sized>(repo: &R) -> RepositoryResult<()> {
//!     let queries = repo.list_main_queries().await?;
//!     let total = repo.count_installations(&SpatialFilter::Unbounded).await?;
//!     Ok(())
//! }
//! ```

pub mod area;
pub mod error;
pub mod installation;
pub mod query;

pub use error::{ErrorContext, RepositoryError, RepositoryResult};

pub use area::AreaRepository;
pub use installation::InstallationRepository;
pub use query::QueryRepository;

/// Composite trait bound for a complete repository implementation.
///
/// Automatically implemented for any type that implements all three
/// repository traits.
pub trait FullRepository: InstallationRepository + QueryRepository + AreaRepository {}

impl<T> FullRepository for T where T: InstallationRepository + QueryRepository + AreaRepository {}
