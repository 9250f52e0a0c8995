//! JSON fixtures for the local repository.
//!
//! Installations, municipalities and query results are bulk-loaded by an
//! external process in production. Locally the same data comes from a JSON
//! document shaped like [`Fixture`] and loaded with [`Fixture::load_into`].

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use super::repositories::LocalRepository;
use super::repository::RepositoryError;
use crate::models::{
    AuxiliaryQuery, AuxiliaryQueryResult, ConsumptionRecord, FraudRecord, Installation, MainQuery,
    MainQueryResult, MunicipalityGeometry, ServiceNote, StatusRecord,
};

#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
    #[error("failed to read fixture {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse fixture: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("failed to load fixture: {0}")]
    Repository(#[from] RepositoryError),
}

/// A row that belongs to one installation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scoped<T> {
    pub installation_id: String,
    #[serde(flatten)]
    pub record: T,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Fixture {
    pub municipalities: Vec<MunicipalityGeometry>,
    pub installations: Vec<Installation>,
    pub main_queries: Vec<MainQuery>,
    pub main_query_results: Vec<MainQueryResult>,
    pub auxiliary_queries: Vec<AuxiliaryQuery>,
    pub auxiliary_query_results: Vec<AuxiliaryQueryResult>,
    pub consumption: Vec<Scoped<ConsumptionRecord>>,
    pub frauds: Vec<Scoped<FraudRecord>>,
    pub service_notes: Vec<Scoped<ServiceNote>>,
    pub status_history: Vec<StatusRecord>,
}

impl Fixture {
    pub fn from_json(text: &str) -> Result<Self, FixtureError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, FixtureError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| FixtureError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Insert every row into `repo`, parents before children.
    pub fn load_into(self, repo: &LocalRepository) -> Result<(), FixtureError> {
        let installations = self.installations.len();

        for municipality in self.municipalities {
            repo.insert_municipality(municipality)?;
        }
        for installation in self.installations {
            repo.insert_installation(installation)?;
        }
        for query in self.main_queries {
            repo.insert_main_query(query)?;
        }
        for query in self.auxiliary_queries {
            repo.insert_auxiliary_query(query)?;
        }
        for row in self.main_query_results {
            repo.insert_main_result(row)?;
        }
        for row in self.auxiliary_query_results {
            repo.insert_auxiliary_result(row)?;
        }
        for row in self.consumption {
            repo.insert_consumption(&row.installation_id, row.record)?;
        }
        for row in self.frauds {
            repo.insert_fraud(&row.installation_id, row.record)?;
        }
        for row in self.service_notes {
            repo.insert_service_note(&row.installation_id, row.record)?;
        }
        for row in self.status_history {
            repo.insert_status_record(row)?;
        }

        log::info!("Loaded fixture with {} installations", installations);
        Ok(())
    }
}
