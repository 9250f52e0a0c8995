use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use diesel::sql_types::{Float8, Int4, Int8, Nullable, Text};

use super::schema::{
    auxiliary_queries, consumption_history, fraud_records, installation_status, installations,
    main_queries, service_notes,
};
use crate::db::repository::{ErrorContext, RepositoryError, RepositoryResult};
use crate::models::{
    AuxiliaryQuery, AuxiliaryQueryHit, ConsumptionRecord, FraudRecord, Installation, MainQuery,
    MainQueryHit, ServiceNote, StatusRecord,
};

/// Parse a check-constrained text column into its enum.
fn parse_column<T: std::str::FromStr<Err = String>>(
    column: &str,
    value: &str,
) -> RepositoryResult<T> {
    value.parse().map_err(|e: String| {
        RepositoryError::internal_with_context(
            e,
            ErrorContext::new("decode_row").with_details(format!("column={}", column)),
        )
    })
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = installations)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct InstallationRow {
    pub installation_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub municipality: String,
    pub tariff_class: Option<String>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<InstallationRow> for Installation {
    fn from(row: InstallationRow) -> Self {
        Installation {
            installation_id: row.installation_id,
            latitude: row.latitude,
            longitude: row.longitude,
            municipality: row.municipality,
            tariff_class: row.tariff_class,
            address: row.address,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = main_queries)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct MainQueryRow {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub color: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<MainQueryRow> for MainQuery {
    fn from(row: MainQueryRow) -> Self {
        MainQuery {
            id: row.id.into(),
            name: row.name,
            description: row.description,
            color: row.color,
            active: row.active,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = auxiliary_queries)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct AuxiliaryQueryRow {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub return_type: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<AuxiliaryQueryRow> for AuxiliaryQuery {
    type Error = RepositoryError;

    fn try_from(row: AuxiliaryQueryRow) -> RepositoryResult<Self> {
        Ok(AuxiliaryQuery {
            id: row.id.into(),
            name: row.name,
            description: row.description,
            return_type: parse_column("return_type", &row.return_type)?,
            active: row.active,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = consumption_history)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ConsumptionRow {
    pub reference_date: NaiveDate,
    pub consumption: f64,
    pub demand: Option<f64>,
}

impl From<ConsumptionRow> for ConsumptionRecord {
    fn from(row: ConsumptionRow) -> Self {
        ConsumptionRecord {
            reference_date: row.reference_date,
            consumption: row.consumption,
            demand: row.demand,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = fraud_records)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct FraudRow {
    pub fraud_date: NaiveDate,
    pub fraud_type: Option<String>,
    pub recovered_value: Option<f64>,
    pub notes: Option<String>,
}

impl From<FraudRow> for FraudRecord {
    fn from(row: FraudRow) -> Self {
        FraudRecord {
            fraud_date: row.fraud_date,
            fraud_type: row.fraud_type,
            recovered_value: row.recovered_value,
            notes: row.notes,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = service_notes)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ServiceNoteRow {
    pub note_number: String,
    pub note_date: NaiveDate,
    pub service_type: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
}

impl From<ServiceNoteRow> for ServiceNote {
    fn from(row: ServiceNoteRow) -> Self {
        ServiceNote {
            note_number: row.note_number,
            note_date: row.note_date,
            service_type: row.service_type,
            description: row.description,
            status: row.status,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = installation_status)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct StatusRow {
    pub installation_id: String,
    pub status: String,
    pub user_name: String,
    pub updated_at: DateTime<Utc>,
    pub notes: Option<String>,
}

impl TryFrom<StatusRow> for StatusRecord {
    type Error = RepositoryError;

    fn try_from(row: StatusRow) -> RepositoryResult<Self> {
        Ok(StatusRecord {
            installation_id: row.installation_id,
            status: parse_column("status", &row.status)?,
            user: row.user_name,
            updated_at: row.updated_at,
            notes: row.notes,
        })
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = installation_status)]
pub struct NewStatusRow<'a> {
    pub installation_id: &'a str,
    pub status: &'a str,
    pub user_name: &'a str,
    pub notes: Option<&'a str>,
}

// ==================== Raw spatial queries ====================

#[derive(Debug, QueryableByName)]
pub struct MainHitRow {
    #[diesel(sql_type = Text)]
    pub installation_id: String,
    #[diesel(sql_type = Text)]
    pub municipality: String,
    #[diesel(sql_type = Nullable<Text>)]
    pub tariff_class: Option<String>,
    #[diesel(sql_type = Float8)]
    pub longitude: f64,
    #[diesel(sql_type = Float8)]
    pub latitude: f64,
    #[diesel(sql_type = Text)]
    pub target_type: String,
    #[diesel(sql_type = Nullable<Float8>)]
    pub score: Option<f64>,
}

impl TryFrom<MainHitRow> for MainQueryHit {
    type Error = RepositoryError;

    fn try_from(row: MainHitRow) -> RepositoryResult<Self> {
        Ok(MainQueryHit {
            installation_id: row.installation_id,
            municipality: row.municipality,
            tariff_class: row.tariff_class,
            longitude: row.longitude,
            latitude: row.latitude,
            target_type: parse_column("target_type", &row.target_type)?,
            score: row.score,
        })
    }
}

#[derive(Debug, QueryableByName)]
pub struct AuxiliaryHitRow {
    #[diesel(sql_type = Text)]
    pub installation_id: String,
    #[diesel(sql_type = Text)]
    pub municipality: String,
    #[diesel(sql_type = Nullable<Text>)]
    pub tariff_class: Option<String>,
    #[diesel(sql_type = Float8)]
    pub longitude: f64,
    #[diesel(sql_type = Float8)]
    pub latitude: f64,
    #[diesel(sql_type = Nullable<Float8>)]
    pub intensity: Option<f64>,
}

impl From<AuxiliaryHitRow> for AuxiliaryQueryHit {
    fn from(row: AuxiliaryHitRow) -> Self {
        AuxiliaryQueryHit {
            installation_id: row.installation_id,
            municipality: row.municipality,
            tariff_class: row.tariff_class,
            longitude: row.longitude,
            latitude: row.latitude,
            intensity: row.intensity,
        }
    }
}

#[derive(Debug, QueryableByName)]
pub struct CountRow {
    #[diesel(sql_type = Int8)]
    pub count: i64,
}

#[derive(Debug, QueryableByName)]
pub struct TariffRow {
    #[diesel(sql_type = Text)]
    pub tariff_class: String,
    #[diesel(sql_type = Int8)]
    pub count: i64,
}

#[derive(Debug, QueryableByName)]
pub struct PerimeterRow {
    #[diesel(sql_type = Nullable<Float8>)]
    pub perimeter_km: Option<f64>,
}

#[derive(Debug, QueryableByName)]
pub struct MunicipalityGeometryRow {
    #[diesel(sql_type = Int4)]
    pub id: i32,
    #[diesel(sql_type = Text)]
    pub name: String,
    #[diesel(sql_type = Text)]
    pub geojson: String,
}
