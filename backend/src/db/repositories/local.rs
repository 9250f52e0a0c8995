//! In-memory local repository implementation.
//!
//! Stores every table in ordered maps so listings come out in the same order
//! the Postgres queries produce. Spatial filters are evaluated in process with
//! the `geo` crate via [`SpatialFilter::matcher`].

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::db::repository::*;
use crate::db::spatial::SpatialFilter;
use crate::models::*;

/// In-memory local repository.
///
/// # Example
/// ```ignore
/// let repo = LocalRepository::new();
/// repo.insert_installation(installation)?;
/// let hits = repo
///     .fetch_main_query_results(MainQueryId::new(1), &SpatialFilter::Unbounded)
///     .await?;
/// ```
#[derive(Clone)]
pub struct LocalRepository {
    data: Arc<RwLock<LocalData>>,
}

struct MainResultRow {
    target_type: TargetType,
    score: Option<f64>,
}

struct LocalData {
    installations: BTreeMap<String, Installation>,
    municipalities: BTreeMap<String, MunicipalityGeometry>,

    main_queries: BTreeMap<MainQueryId, MainQuery>,
    main_results: BTreeMap<(MainQueryId, String), MainResultRow>,
    auxiliary_queries: BTreeMap<AuxiliaryQueryId, AuxiliaryQuery>,
    auxiliary_results: BTreeMap<(AuxiliaryQueryId, String), Option<f64>>,

    consumption: HashMap<String, Vec<ConsumptionRecord>>,
    frauds: HashMap<String, Vec<FraudRecord>>,
    service_notes: HashMap<String, Vec<ServiceNote>>,
    // Insertion order doubles as the serial id used to break timestamp ties.
    status_history: Vec<StatusRecord>,

    is_healthy: bool,
}

impl Default for LocalData {
    fn default() -> Self {
        Self {
            installations: BTreeMap::new(),
            municipalities: BTreeMap::new(),
            main_queries: BTreeMap::new(),
            main_results: BTreeMap::new(),
            auxiliary_queries: BTreeMap::new(),
            auxiliary_results: BTreeMap::new(),
            consumption: HashMap::new(),
            frauds: HashMap::new(),
            service_notes: HashMap::new(),
            status_history: Vec::new(),
            is_healthy: true,
        }
    }
}

impl LocalRepository {
    /// Create a new empty local repository.
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(LocalData::default())),
        }
    }

    fn read(&self) -> RepositoryResult<RwLockReadGuard<'_, LocalData>> {
        let data = self.data.read()?;
        if !data.is_healthy {
            return Err(RepositoryError::connection_with_context(
                "Local store is not healthy",
                ErrorContext::new("read"),
            ));
        }
        Ok(data)
    }

    fn write(&self) -> RepositoryResult<RwLockWriteGuard<'_, LocalData>> {
        let data = self.data.write()?;
        if !data.is_healthy {
            return Err(RepositoryError::connection_with_context(
                "Local store is not healthy",
                ErrorContext::new("write"),
            ));
        }
        Ok(data)
    }

    /// Set the health status for testing connection failures.
    pub fn set_healthy(&self, healthy: bool) -> RepositoryResult<()> {
        self.data.write()?.is_healthy = healthy;
        Ok(())
    }

    // ==================== Seeding ====================

    pub fn insert_municipality(&self, municipality: MunicipalityGeometry) -> RepositoryResult<()> {
        let mut data = self.write()?;
        data.municipalities
            .insert(municipality.name.clone(), municipality);
        Ok(())
    }

    /// Insert or replace an installation.
    pub fn insert_installation(&self, installation: Installation) -> RepositoryResult<()> {
        let mut data = self.write()?;
        data.installations
            .insert(installation.installation_id.clone(), installation);
        Ok(())
    }

    /// Rejects colours the `main_queries` check constraint would reject.
    pub fn insert_main_query(&self, query: MainQuery) -> RepositoryResult<()> {
        if !query.has_valid_color() {
            return Err(RepositoryError::validation_with_context(
                format!("Invalid color '{}': expected #RRGGBB", query.color),
                ErrorContext::new("insert_main_query")
                    .with_entity("main_query")
                    .with_entity_id(query.id),
            ));
        }
        self.write()?.main_queries.insert(query.id, query);
        Ok(())
    }

    pub fn insert_auxiliary_query(&self, query: AuxiliaryQuery) -> RepositoryResult<()> {
        self.write()?.auxiliary_queries.insert(query.id, query);
        Ok(())
    }

    /// Upsert a main-query result. Both the query and the installation must exist.
    pub fn insert_main_result(&self, row: MainQueryResult) -> RepositoryResult<()> {
        let mut data = self.write()?;
        if !data.main_queries.contains_key(&row.query_id) {
            return Err(missing_reference("main_query", row.query_id));
        }
        ensure_installation(&data, &row.installation_id)?;
        data.main_results.insert(
            (row.query_id, row.installation_id),
            MainResultRow {
                target_type: row.target_type,
                score: row.score,
            },
        );
        Ok(())
    }

    /// Upsert an auxiliary-query result. Both the query and the installation
    /// must exist and the intensity must lie in `[0, 1]`.
    pub fn insert_auxiliary_result(&self, row: AuxiliaryQueryResult) -> RepositoryResult<()> {
        if !row.has_valid_intensity() {
            return Err(RepositoryError::validation_with_context(
                format!("Intensity {:?} is outside [0, 1]", row.intensity),
                ErrorContext::new("insert_auxiliary_result")
                    .with_entity("installation")
                    .with_entity_id(&row.installation_id),
            ));
        }
        let mut data = self.write()?;
        if !data.auxiliary_queries.contains_key(&row.query_id) {
            return Err(missing_reference("auxiliary_query", row.query_id));
        }
        ensure_installation(&data, &row.installation_id)?;
        data.auxiliary_results
            .insert((row.query_id, row.installation_id), row.intensity);
        Ok(())
    }

    pub fn insert_consumption(
        &self,
        installation_id: &str,
        record: ConsumptionRecord,
    ) -> RepositoryResult<()> {
        let mut data = self.write()?;
        ensure_installation(&data, installation_id)?;
        let rows = data
            .consumption
            .entry(installation_id.to_string())
            .or_default();
        // One row per (installation, reference_date).
        rows.retain(|r| r.reference_date != record.reference_date);
        rows.push(record);
        Ok(())
    }

    pub fn insert_fraud(&self, installation_id: &str, record: FraudRecord) -> RepositoryResult<()> {
        let mut data = self.write()?;
        ensure_installation(&data, installation_id)?;
        data.frauds
            .entry(installation_id.to_string())
            .or_default()
            .push(record);
        Ok(())
    }

    pub fn insert_service_note(
        &self,
        installation_id: &str,
        note: ServiceNote,
    ) -> RepositoryResult<()> {
        let mut data = self.write()?;
        ensure_installation(&data, installation_id)?;
        data.service_notes
            .entry(installation_id.to_string())
            .or_default()
            .push(note);
        Ok(())
    }

    /// Append a status row with an explicit timestamp (fixtures and tests).
    pub fn insert_status_record(&self, record: StatusRecord) -> RepositoryResult<()> {
        let mut data = self.write()?;
        ensure_installation(&data, &record.installation_id)?;
        data.status_history.push(record);
        Ok(())
    }

    pub fn installation_count(&self) -> RepositoryResult<usize> {
        Ok(self.read()?.installations.len())
    }
}

impl Default for LocalRepository {
    fn default() -> Self {
        Self::new()
    }
}

fn ensure_installation(data: &LocalData, installation_id: &str) -> RepositoryResult<()> {
    if data.installations.contains_key(installation_id) {
        Ok(())
    } else {
        Err(missing_reference("installation", installation_id))
    }
}

fn missing_reference(entity: &str, id: impl ToString) -> RepositoryError {
    RepositoryError::validation_with_context(
        format!("Referenced {} does not exist", entity),
        ErrorContext::default()
            .with_entity(entity)
            .with_entity_id(id),
    )
}

/// Status rows of one installation, most recent first.
fn status_rows<'a>(data: &'a LocalData, installation_id: &str) -> Vec<&'a StatusRecord> {
    let mut rows: Vec<(usize, &StatusRecord)> = data
        .status_history
        .iter()
        .enumerate()
        .filter(|(_, r)| r.installation_id == installation_id)
        .collect();
    rows.sort_by(|(ia, a), (ib, b)| b.updated_at.cmp(&a.updated_at).then(ib.cmp(ia)));
    rows.into_iter().map(|(_, r)| r).collect()
}

fn filtered_installations<'a>(
    data: &'a LocalData,
    filter: &SpatialFilter,
) -> Vec<&'a Installation> {
    let matcher = filter.matcher();
    data.installations
        .values()
        .filter(|i| matcher.matches(i))
        .collect()
}

#[async_trait]
impl InstallationRepository for LocalRepository {
    async fn health_check(&self) -> RepositoryResult<bool> {
        Ok(self.data.read()?.is_healthy)
    }

    async fn get_installation(
        &self,
        installation_id: &str,
    ) -> RepositoryResult<Option<Installation>> {
        Ok(self.read()?.installations.get(installation_id).cloned())
    }

    async fn fetch_consumption(
        &self,
        installation_id: &str,
        limit: i64,
    ) -> RepositoryResult<Vec<ConsumptionRecord>> {
        let data = self.read()?;
        let mut rows = data
            .consumption
            .get(installation_id)
            .cloned()
            .unwrap_or_default();
        rows.sort_by(|a, b| b.reference_date.cmp(&a.reference_date));
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn fetch_frauds(&self, installation_id: &str) -> RepositoryResult<Vec<FraudRecord>> {
        let data = self.read()?;
        let mut rows = data.frauds.get(installation_id).cloned().unwrap_or_default();
        // Same-day frauds: latest inserted first.
        rows.reverse();
        rows.sort_by(|a, b| b.fraud_date.cmp(&a.fraud_date));
        Ok(rows)
    }

    async fn fetch_service_notes(
        &self,
        installation_id: &str,
        limit: i64,
    ) -> RepositoryResult<Vec<ServiceNote>> {
        let data = self.read()?;
        let mut rows = data
            .service_notes
            .get(installation_id)
            .cloned()
            .unwrap_or_default();
        rows.sort_by(|a, b| {
            b.note_date
                .cmp(&a.note_date)
                .then_with(|| b.note_number.cmp(&a.note_number))
        });
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn append_status(&self, status: &NewStatus) -> RepositoryResult<StatusRecord> {
        let mut data = self.write()?;
        if !data.installations.contains_key(&status.installation_id) {
            return Err(RepositoryError::not_found_with_context(
                format!("Installation {} not found", status.installation_id),
                ErrorContext::new("append_status")
                    .with_entity("installation")
                    .with_entity_id(&status.installation_id),
            ));
        }
        let record = StatusRecord {
            installation_id: status.installation_id.clone(),
            status: status.status,
            user: status.user.clone(),
            updated_at: Utc::now(),
            notes: status.notes.clone(),
        };
        data.status_history.push(record.clone());
        Ok(record)
    }

    async fn fetch_current_status(
        &self,
        installation_id: &str,
    ) -> RepositoryResult<Option<StatusRecord>> {
        let data = self.read()?;
        Ok(status_rows(&data, installation_id).first().map(|r| (*r).clone()))
    }

    async fn fetch_status_history(
        &self,
        installation_id: &str,
    ) -> RepositoryResult<Vec<StatusRecord>> {
        let data = self.read()?;
        Ok(status_rows(&data, installation_id)
            .into_iter()
            .cloned()
            .collect())
    }
}

#[async_trait]
impl QueryRepository for LocalRepository {
    async fn list_main_queries(&self) -> RepositoryResult<Vec<MainQuery>> {
        let data = self.read()?;
        Ok(data
            .main_queries
            .values()
            .filter(|q| q.active)
            .cloned()
            .collect())
    }

    async fn get_main_query(&self, id: MainQueryId) -> RepositoryResult<Option<MainQuery>> {
        Ok(self.read()?.main_queries.get(&id).cloned())
    }

    async fn fetch_main_query_results(
        &self,
        id: MainQueryId,
        filter: &SpatialFilter,
    ) -> RepositoryResult<Vec<MainQueryHit>> {
        let data = self.read()?;
        let matcher = filter.matcher();
        let hits = data
            .main_results
            .iter()
            .filter(|((query_id, _), _)| *query_id == id)
            .filter_map(|((_, installation_id), row)| {
                let installation = data.installations.get(installation_id)?;
                matcher.matches(installation).then(|| MainQueryHit {
                    installation_id: installation.installation_id.clone(),
                    municipality: installation.municipality.clone(),
                    tariff_class: installation.tariff_class.clone(),
                    longitude: installation.longitude,
                    latitude: installation.latitude,
                    target_type: row.target_type,
                    score: row.score,
                })
            })
            .collect();
        Ok(hits)
    }

    async fn list_auxiliary_queries(&self) -> RepositoryResult<Vec<AuxiliaryQuery>> {
        let data = self.read()?;
        Ok(data
            .auxiliary_queries
            .values()
            .filter(|q| q.active)
            .cloned()
            .collect())
    }

    async fn get_auxiliary_query(
        &self,
        id: AuxiliaryQueryId,
    ) -> RepositoryResult<Option<AuxiliaryQuery>> {
        Ok(self.read()?.auxiliary_queries.get(&id).cloned())
    }

    async fn fetch_auxiliary_query_results(
        &self,
        id: AuxiliaryQueryId,
        filter: &SpatialFilter,
    ) -> RepositoryResult<Vec<AuxiliaryQueryHit>> {
        let data = self.read()?;
        let matcher = filter.matcher();
        let hits = data
            .auxiliary_results
            .iter()
            .filter(|((query_id, _), _)| *query_id == id)
            .filter_map(|((_, installation_id), intensity)| {
                let installation = data.installations.get(installation_id)?;
                matcher.matches(installation).then(|| AuxiliaryQueryHit {
                    installation_id: installation.installation_id.clone(),
                    municipality: installation.municipality.clone(),
                    tariff_class: installation.tariff_class.clone(),
                    longitude: installation.longitude,
                    latitude: installation.latitude,
                    intensity: *intensity,
                })
            })
            .collect();
        Ok(hits)
    }
}

#[async_trait]
impl AreaRepository for LocalRepository {
    async fn list_municipalities(&self) -> RepositoryResult<Vec<Municipality>> {
        let data = self.read()?;
        Ok(data
            .municipalities
            .values()
            .map(|m| Municipality {
                id: m.id,
                name: m.name.clone(),
            })
            .collect())
    }

    async fn get_municipality_geometry(
        &self,
        name: &str,
    ) -> RepositoryResult<Option<MunicipalityGeometry>> {
        Ok(self.read()?.municipalities.get(name).cloned())
    }

    async fn municipality_perimeter_km(&self, name: &str) -> RepositoryResult<Option<f64>> {
        let data = self.read()?;
        Ok(data.municipalities.get(name).map(|m| {
            m.geometry
                .to_multi_polygon()
                .map(|area| geodesic_perimeter_km(&area))
                .unwrap_or(0.0)
        }))
    }

    async fn polygon_perimeter_km(&self, polygon: &AreaPolygon) -> RepositoryResult<f64> {
        Ok(geodesic_perimeter_km(&polygon.to_multi_polygon()))
    }

    async fn count_installations(&self, filter: &SpatialFilter) -> RepositoryResult<i64> {
        let data = self.read()?;
        Ok(filtered_installations(&data, filter).len() as i64)
    }

    async fn count_fraud_installations(
        &self,
        filter: &SpatialFilter,
        since: NaiveDate,
    ) -> RepositoryResult<i64> {
        let data = self.read()?;
        let flagged: HashSet<&str> = filtered_installations(&data, filter)
            .into_iter()
            .filter(|i| {
                data.frauds
                    .get(&i.installation_id)
                    .is_some_and(|rows| rows.iter().any(|f| f.fraud_date >= since))
            })
            .map(|i| i.installation_id.as_str())
            .collect();
        Ok(flagged.len() as i64)
    }

    async fn tariff_distribution(
        &self,
        filter: &SpatialFilter,
    ) -> RepositoryResult<Vec<TariffBucket>> {
        let data = self.read()?;
        let mut counts: BTreeMap<&str, i64> = BTreeMap::new();
        for installation in filtered_installations(&data, filter) {
            let class = installation
                .tariff_class
                .as_deref()
                .unwrap_or(UNCLASSIFIED_TARIFF);
            *counts.entry(class).or_insert(0) += 1;
        }
        Ok(counts
            .into_iter()
            .map(|(class, count)| TariffBucket {
                tariff_class: class.to_string(),
                count,
            })
            .collect())
    }
}
