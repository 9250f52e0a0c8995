//! Postgres/PostGIS repository implementation using Diesel.
//!
//! Plain lookups use the Diesel DSL against [`schema`]. Every query that
//! depends on a [`SpatialFilter`] is assembled as parameterized SQL: the filter
//! renders its own `WHERE` fragment and bind values, which are appended to a
//! boxed `sql_query` in placeholder order.
//!
//! ## Features
//!
//! - Connection pooling with r2d2
//! - Automatic retry for transient failures
//! - Automatic migration execution (creates the PostGIS extension)
//!
//! ## Configuration
//!
//! Environment variables:
//! - `DATABASE_URL` or `PG_DATABASE_URL`: Connection string (required)
//! - `PG_POOL_MAX`: Maximum pool size (default: 10)
//! - `PG_POOL_MIN`: Minimum pool size (default: 1)
//! - `PG_CONN_TIMEOUT_SEC`: Connection timeout in seconds (default: 30)
//! - `PG_IDLE_TIMEOUT_SEC`: Idle connection timeout in seconds (default: 600)
//! - `PG_MAX_RETRIES`: Maximum retry attempts for transient failures (default: 3)
//! - `PG_RETRY_DELAY_MS`: Initial retry delay in milliseconds (default: 100)

use async_trait::async_trait;
use chrono::NaiveDate;
use diesel::pg::{Pg, PgConnection};
use diesel::prelude::*;
use diesel::query_builder::{BoxedSqlQuery, SqlQuery};
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::sql_query;
use diesel::sql_types::{Date, Float8, Int4, Text};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use std::time::Duration;
use tokio::task;

use crate::db::repository::{
    AreaRepository, ErrorContext, InstallationRepository, QueryRepository, RepositoryError,
    RepositoryResult,
};
use crate::db::spatial::{SpatialFilter, SqlBind};
use crate::models::*;

mod models;
mod schema;

use models::*;
use schema::*;

type PgPool = Pool<ConnectionManager<PgConnection>>;
type BoxedQuery = BoxedSqlQuery<'static, Pg, SqlQuery>;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("src/db/repositories/postgres/migrations");

/// Configuration for connecting to Postgres.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub database_url: String,
    pub max_pool_size: u32,
    pub min_pool_size: u32,
    pub connection_timeout_sec: u64,
    pub idle_timeout_sec: u64,
    /// Maximum number of retry attempts for transient failures
    pub max_retries: u32,
    /// Initial retry delay in milliseconds (doubles with each retry)
    pub retry_delay_ms: u64,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            max_pool_size: 10,
            min_pool_size: 1,
            connection_timeout_sec: 30,
            idle_timeout_sec: 600,
            max_retries: 3,
            retry_delay_ms: 100,
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl PostgresConfig {
    /// Create configuration from environment variables (see module docs).
    pub fn from_env() -> Result<Self, String> {
        let database_url = std::env::var("DATABASE_URL")
            .or_else(|_| std::env::var("PG_DATABASE_URL"))
            .map_err(|_| "DATABASE_URL or PG_DATABASE_URL must be set".to_string())?;

        let defaults = Self::default();
        Ok(Self {
            database_url,
            max_pool_size: env_or("PG_POOL_MAX", defaults.max_pool_size),
            min_pool_size: env_or("PG_POOL_MIN", defaults.min_pool_size),
            connection_timeout_sec: env_or("PG_CONN_TIMEOUT_SEC", defaults.connection_timeout_sec),
            idle_timeout_sec: env_or("PG_IDLE_TIMEOUT_SEC", defaults.idle_timeout_sec),
            max_retries: env_or("PG_MAX_RETRIES", defaults.max_retries),
            retry_delay_ms: env_or("PG_RETRY_DELAY_MS", defaults.retry_delay_ms),
        })
    }

    pub fn with_url(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            ..Default::default()
        }
    }
}

/// Diesel-backed repository for Postgres with PostGIS.
#[derive(Clone, Debug)]
pub struct PostgresRepository {
    pool: PgPool,
    config: PostgresConfig,
}

impl PostgresRepository {
    /// Create a new repository and run pending migrations. Blocks while the
    /// pool fills and migrations run.
    pub fn new(config: PostgresConfig) -> RepositoryResult<Self> {
        let manager = ConnectionManager::<PgConnection>::new(&config.database_url);

        let pool = Pool::builder()
            .max_size(config.max_pool_size)
            .min_idle(Some(config.min_pool_size))
            .connection_timeout(Duration::from_secs(config.connection_timeout_sec))
            .idle_timeout(Some(Duration::from_secs(config.idle_timeout_sec)))
            .test_on_check_out(true)
            .build(manager)
            .map_err(|e| {
                RepositoryError::connection_with_context(
                    e.to_string(),
                    ErrorContext::new("create_pool")
                        .with_details(format!("max_size={}", config.max_pool_size)),
                )
            })?;

        {
            let mut conn = pool.get()?;
            Self::run_migrations(&mut conn)?;
        }

        log::info!(
            "Postgres repository ready (pool max={}, min={})",
            config.max_pool_size,
            config.min_pool_size
        );
        Ok(Self { pool, config })
    }

    fn run_migrations(conn: &mut PgConnection) -> RepositoryResult<()> {
        let applied = conn.run_pending_migrations(MIGRATIONS).map_err(|e| {
            RepositoryError::internal_with_context(
                format!("Migration failed: {}", e),
                ErrorContext::new("run_migrations"),
            )
        })?;
        if !applied.is_empty() {
            log::info!("Applied {} database migration(s)", applied.len());
        }
        Ok(())
    }

    /// Execute a database operation on a pooled connection, retrying
    /// retryable failures with exponential backoff.
    async fn with_conn<T, F>(&self, f: F) -> RepositoryResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut PgConnection) -> RepositoryResult<T> + Send + 'static + Clone,
    {
        let pool = self.pool.clone();
        let max_retries = self.config.max_retries;
        let retry_delay_ms = self.config.retry_delay_ms;

        task::spawn_blocking(move || {
            let mut last_error = None;
            let mut retry_delay = Duration::from_millis(retry_delay_ms);

            for attempt in 0..=max_retries {
                if attempt > 0 {
                    log::warn!(
                        "Retrying database operation (attempt {}/{})",
                        attempt + 1,
                        max_retries + 1
                    );
                    std::thread::sleep(retry_delay);
                    retry_delay *= 2;
                }

                let mut conn = match pool.get() {
                    Ok(c) => c,
                    Err(e) => {
                        let err = RepositoryError::from(e);
                        if attempt < max_retries {
                            last_error = Some(err);
                            continue;
                        }
                        return Err(err);
                    }
                };

                match f.clone()(&mut conn) {
                    Ok(result) => return Ok(result),
                    Err(e) if e.is_retryable() && attempt < max_retries => {
                        last_error = Some(e);
                        continue;
                    }
                    Err(e) => return Err(e),
                }
            }

            Err(last_error.unwrap_or_else(|| {
                RepositoryError::internal("Max retries exceeded with no error captured")
            }))
        })
        .await
        .map_err(|e| {
            RepositoryError::internal_with_context(
                format!("Task join error: {}", e),
                ErrorContext::new("spawn_blocking"),
            )
        })?
    }
}

fn map_diesel_error(err: diesel::result::Error) -> RepositoryError {
    RepositoryError::from(err)
}

fn bind_all(mut query: BoxedQuery, binds: Vec<SqlBind>) -> BoxedQuery {
    for bind in binds {
        query = match bind {
            SqlBind::Float(value) => query.bind::<Float8, _>(value),
            SqlBind::Text(value) => query.bind::<Text, _>(value),
        };
    }
    query
}

const MAIN_RESULTS_SQL: &str = "SELECT i.installation_id, i.municipality, i.tariff_class, \
     ST_X(i.geom) AS longitude, ST_Y(i.geom) AS latitude, r.target_type, r.score \
     FROM main_query_results r \
     JOIN installations i ON i.installation_id = r.installation_id \
     WHERE r.query_id = $1 AND ";

const AUXILIARY_RESULTS_SQL: &str = "SELECT i.installation_id, i.municipality, i.tariff_class, \
     ST_X(i.geom) AS longitude, ST_Y(i.geom) AS latitude, r.intensity \
     FROM auxiliary_query_results r \
     JOIN installations i ON i.installation_id = r.installation_id \
     WHERE r.query_id = $1 AND ";

fn query_results_sql(prefix: &str, filter: &SpatialFilter) -> (String, Vec<SqlBind>) {
    let predicate = filter.to_sql("i", 2);
    (
        // Byte order, matching the in-memory BTreeMap.
        format!(
            "{}{} ORDER BY i.installation_id COLLATE \"C\"",
            prefix, predicate.clause
        ),
        predicate.binds,
    )
}

fn not_found_installation(operation: &str, installation_id: &str) -> RepositoryError {
    RepositoryError::not_found_with_context(
        format!("Installation {} not found", installation_id),
        ErrorContext::new(operation)
            .with_entity("installation")
            .with_entity_id(installation_id),
    )
}

#[async_trait]
impl InstallationRepository for PostgresRepository {
    async fn health_check(&self) -> RepositoryResult<bool> {
        self.with_conn(|conn| {
            sql_query("SELECT 1")
                .execute(conn)
                .map(|_| true)
                .map_err(map_diesel_error)
        })
        .await
    }

    async fn get_installation(
        &self,
        installation_id: &str,
    ) -> RepositoryResult<Option<Installation>> {
        let installation_id = installation_id.to_string();
        self.with_conn(move |conn| {
            installations::table
                .find(&installation_id)
                .select(InstallationRow::as_select())
                .first::<InstallationRow>(conn)
                .optional()
                .map(|row| row.map(Installation::from))
                .map_err(map_diesel_error)
        })
        .await
    }

    async fn fetch_consumption(
        &self,
        installation_id: &str,
        limit: i64,
    ) -> RepositoryResult<Vec<ConsumptionRecord>> {
        let installation_id = installation_id.to_string();
        self.with_conn(move |conn| {
            consumption_history::table
                .filter(consumption_history::installation_id.eq(&installation_id))
                .order(consumption_history::reference_date.desc())
                .limit(limit)
                .select(ConsumptionRow::as_select())
                .load::<ConsumptionRow>(conn)
                .map(|rows| rows.into_iter().map(ConsumptionRecord::from).collect())
                .map_err(map_diesel_error)
        })
        .await
    }

    async fn fetch_frauds(&self, installation_id: &str) -> RepositoryResult<Vec<FraudRecord>> {
        let installation_id = installation_id.to_string();
        self.with_conn(move |conn| {
            fraud_records::table
                .filter(fraud_records::installation_id.eq(&installation_id))
                .order((fraud_records::fraud_date.desc(), fraud_records::id.desc()))
                .select(FraudRow::as_select())
                .load::<FraudRow>(conn)
                .map(|rows| rows.into_iter().map(FraudRecord::from).collect())
                .map_err(map_diesel_error)
        })
        .await
    }

    async fn fetch_service_notes(
        &self,
        installation_id: &str,
        limit: i64,
    ) -> RepositoryResult<Vec<ServiceNote>> {
        let installation_id = installation_id.to_string();
        self.with_conn(move |conn| {
            service_notes::table
                .filter(service_notes::installation_id.eq(&installation_id))
                .order((
                    service_notes::note_date.desc(),
                    service_notes::note_number.desc(),
                ))
                .limit(limit)
                .select(ServiceNoteRow::as_select())
                .load::<ServiceNoteRow>(conn)
                .map(|rows| rows.into_iter().map(ServiceNote::from).collect())
                .map_err(map_diesel_error)
        })
        .await
    }

    async fn append_status(&self, status: &NewStatus) -> RepositoryResult<StatusRecord> {
        let status = status.clone();
        self.with_conn(move |conn| {
            conn.transaction::<_, RepositoryError, _>(|tx| {
                let exists: bool = diesel::select(diesel::dsl::exists(
                    installations::table.find(&status.installation_id),
                ))
                .get_result(tx)?;
                if !exists {
                    return Err(not_found_installation(
                        "append_status",
                        &status.installation_id,
                    ));
                }

                let row = NewStatusRow {
                    installation_id: &status.installation_id,
                    status: status.status.as_str(),
                    user_name: &status.user,
                    notes: status.notes.as_deref(),
                };
                let inserted: StatusRow = diesel::insert_into(installation_status::table)
                    .values(&row)
                    .returning(StatusRow::as_returning())
                    .get_result(tx)?;
                StatusRecord::try_from(inserted)
            })
        })
        .await
    }

    async fn fetch_current_status(
        &self,
        installation_id: &str,
    ) -> RepositoryResult<Option<StatusRecord>> {
        let installation_id = installation_id.to_string();
        self.with_conn(move |conn| {
            let row = installation_status::table
                .filter(installation_status::installation_id.eq(&installation_id))
                .order((
                    installation_status::updated_at.desc(),
                    installation_status::id.desc(),
                ))
                .select(StatusRow::as_select())
                .first::<StatusRow>(conn)
                .optional()
                .map_err(map_diesel_error)?;
            row.map(StatusRecord::try_from).transpose()
        })
        .await
    }

    async fn fetch_status_history(
        &self,
        installation_id: &str,
    ) -> RepositoryResult<Vec<StatusRecord>> {
        let installation_id = installation_id.to_string();
        self.with_conn(move |conn| {
            installation_status::table
                .filter(installation_status::installation_id.eq(&installation_id))
                .order((
                    installation_status::updated_at.desc(),
                    installation_status::id.desc(),
                ))
                .select(StatusRow::as_select())
                .load::<StatusRow>(conn)
                .map_err(map_diesel_error)?
                .into_iter()
                .map(StatusRecord::try_from)
                .collect()
        })
        .await
    }
}

#[async_trait]
impl QueryRepository for PostgresRepository {
    async fn list_main_queries(&self) -> RepositoryResult<Vec<MainQuery>> {
        self.with_conn(|conn| {
            main_queries::table
                .filter(main_queries::active.eq(true))
                .order(main_queries::id.asc())
                .select(MainQueryRow::as_select())
                .load::<MainQueryRow>(conn)
                .map(|rows| rows.into_iter().map(MainQuery::from).collect())
                .map_err(map_diesel_error)
        })
        .await
    }

    async fn get_main_query(&self, id: MainQueryId) -> RepositoryResult<Option<MainQuery>> {
        self.with_conn(move |conn| {
            main_queries::table
                .find(id.value())
                .select(MainQueryRow::as_select())
                .first::<MainQueryRow>(conn)
                .optional()
                .map(|row| row.map(MainQuery::from))
                .map_err(map_diesel_error)
        })
        .await
    }

    async fn fetch_main_query_results(
        &self,
        id: MainQueryId,
        filter: &SpatialFilter,
    ) -> RepositoryResult<Vec<MainQueryHit>> {
        let (sql, binds) = query_results_sql(MAIN_RESULTS_SQL, filter);
        self.with_conn(move |conn| {
            let query = sql_query(sql).into_boxed::<Pg>().bind::<Int4, _>(id.value());
            bind_all(query, binds)
                .load::<MainHitRow>(conn)
                .map_err(map_diesel_error)?
                .into_iter()
                .map(MainQueryHit::try_from)
                .collect()
        })
        .await
    }

    async fn list_auxiliary_queries(&self) -> RepositoryResult<Vec<AuxiliaryQuery>> {
        self.with_conn(|conn| {
            auxiliary_queries::table
                .filter(auxiliary_queries::active.eq(true))
                .order(auxiliary_queries::id.asc())
                .select(AuxiliaryQueryRow::as_select())
                .load::<AuxiliaryQueryRow>(conn)
                .map_err(map_diesel_error)?
                .into_iter()
                .map(AuxiliaryQuery::try_from)
                .collect()
        })
        .await
    }

    async fn get_auxiliary_query(
        &self,
        id: AuxiliaryQueryId,
    ) -> RepositoryResult<Option<AuxiliaryQuery>> {
        self.with_conn(move |conn| {
            auxiliary_queries::table
                .find(id.value())
                .select(AuxiliaryQueryRow::as_select())
                .first::<AuxiliaryQueryRow>(conn)
                .optional()
                .map_err(map_diesel_error)?
                .map(AuxiliaryQuery::try_from)
                .transpose()
        })
        .await
    }

    async fn fetch_auxiliary_query_results(
        &self,
        id: AuxiliaryQueryId,
        filter: &SpatialFilter,
    ) -> RepositoryResult<Vec<AuxiliaryQueryHit>> {
        let (sql, binds) = query_results_sql(AUXILIARY_RESULTS_SQL, filter);
        self.with_conn(move |conn| {
            let query = sql_query(sql).into_boxed::<Pg>().bind::<Int4, _>(id.value());
            bind_all(query, binds)
                .load::<AuxiliaryHitRow>(conn)
                .map(|rows| rows.into_iter().map(AuxiliaryQueryHit::from).collect())
                .map_err(map_diesel_error)
        })
        .await
    }
}

#[async_trait]
impl AreaRepository for PostgresRepository {
    async fn list_municipalities(&self) -> RepositoryResult<Vec<Municipality>> {
        self.with_conn(|conn| {
            municipalities::table
                .select((municipalities::id, municipalities::name))
                .order(municipalities::name.asc())
                .load::<(i32, String)>(conn)
                .map(|rows| {
                    rows.into_iter()
                        .map(|(id, name)| Municipality { id, name })
                        .collect()
                })
                .map_err(map_diesel_error)
        })
        .await
    }

    async fn get_municipality_geometry(
        &self,
        name: &str,
    ) -> RepositoryResult<Option<MunicipalityGeometry>> {
        let name = name.to_string();
        self.with_conn(move |conn| {
            let row = sql_query(
                "SELECT id, name, ST_AsGeoJSON(geom) AS geojson FROM municipalities WHERE name = $1",
            )
            .bind::<Text, _>(&name)
            .get_result::<MunicipalityGeometryRow>(conn)
            .optional()
            .map_err(map_diesel_error)?;

            row.map(|row| {
                let geometry: Geometry = serde_json::from_str(&row.geojson).map_err(|e| {
                    RepositoryError::internal_with_context(
                        format!("Invalid boundary GeoJSON: {}", e),
                        ErrorContext::new("get_municipality_geometry")
                            .with_entity("municipality")
                            .with_entity_id(&row.name),
                    )
                })?;
                Ok(MunicipalityGeometry {
                    id: row.id,
                    name: row.name,
                    geometry,
                })
            })
            .transpose()
        })
        .await
    }

    async fn municipality_perimeter_km(&self, name: &str) -> RepositoryResult<Option<f64>> {
        let name = name.to_string();
        self.with_conn(move |conn| {
            sql_query(
                "SELECT ST_Perimeter(geom::geography) / 1000.0 AS perimeter_km \
                 FROM municipalities WHERE name = $1",
            )
            .bind::<Text, _>(&name)
            .get_result::<PerimeterRow>(conn)
            .optional()
            .map(|row| row.and_then(|r| r.perimeter_km))
            .map_err(map_diesel_error)
        })
        .await
    }

    async fn polygon_perimeter_km(&self, polygon: &AreaPolygon) -> RepositoryResult<f64> {
        let geojson = polygon.to_geojson();
        self.with_conn(move |conn| {
            let row = sql_query(format!(
                "SELECT ST_Perimeter(ST_SetSRID(ST_GeomFromGeoJSON($1), {})::geography) / 1000.0 \
                 AS perimeter_km",
                SRID
            ))
            .bind::<Text, _>(&geojson)
            .get_result::<PerimeterRow>(conn)
            .map_err(map_diesel_error)?;
            Ok(row.perimeter_km.unwrap_or(0.0))
        })
        .await
    }

    async fn count_installations(&self, filter: &SpatialFilter) -> RepositoryResult<i64> {
        let predicate = filter.to_sql("i", 1);
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT COUNT(*) AS count FROM installations i WHERE {}",
                predicate.clause
            );
            bind_all(sql_query(sql).into_boxed::<Pg>(), predicate.binds)
                .get_result::<CountRow>(conn)
                .map(|row| row.count)
                .map_err(map_diesel_error)
        })
        .await
    }

    async fn count_fraud_installations(
        &self,
        filter: &SpatialFilter,
        since: NaiveDate,
    ) -> RepositoryResult<i64> {
        let predicate = filter.to_sql("i", 2);
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT COUNT(DISTINCT f.installation_id) AS count \
                 FROM fraud_records f \
                 JOIN installations i ON i.installation_id = f.installation_id \
                 WHERE f.fraud_date >= $1 AND {}",
                predicate.clause
            );
            let query = sql_query(sql).into_boxed::<Pg>().bind::<Date, _>(since);
            bind_all(query, predicate.binds)
                .get_result::<CountRow>(conn)
                .map(|row| row.count)
                .map_err(map_diesel_error)
        })
        .await
    }

    async fn tariff_distribution(
        &self,
        filter: &SpatialFilter,
    ) -> RepositoryResult<Vec<TariffBucket>> {
        let predicate = filter.to_sql("i", 2);
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT COALESCE(i.tariff_class, $1) AS tariff_class, COUNT(*) AS count \
                 FROM installations i WHERE {} GROUP BY 1",
                predicate.clause
            );
            let query = sql_query(sql)
                .into_boxed::<Pg>()
                .bind::<Text, _>(UNCLASSIFIED_TARIFF);
            bind_all(query, predicate.binds)
                .load::<TariffRow>(conn)
                .map(|rows| {
                    rows.into_iter()
                        .map(|r| TariffBucket {
                            tariff_class: r.tariff_class,
                            count: r.count,
                        })
                        .collect()
                })
                .map_err(map_diesel_error)
        })
        .await
    }
}
