//! Installation records and their per-installation history.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A metered consumption point with a fixed location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Installation {
    pub installation_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub municipality: String,
    pub tariff_class: Option<String>,
    pub address: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

/// One billing period of consumption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumptionRecord {
    pub reference_date: NaiveDate,
    pub consumption: f64,
    pub demand: Option<f64>,
}

/// A confirmed fraud event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FraudRecord {
    pub fraud_date: NaiveDate,
    pub fraud_type: Option<String>,
    pub recovered_value: Option<f64>,
    pub notes: Option<String>,
}

/// A field service ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceNote {
    pub note_number: String,
    pub note_date: NaiveDate,
    pub service_type: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
}

/// Inspection status an analyst assigns to an installation.
///
/// Transitions are not validated: any value may follow any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusValue {
    #[serde(alias = "selecionado")]
    Selected,
    #[serde(alias = "nao_selecionado")]
    NotSelected,
    #[serde(alias = "verificar")]
    ToVerify,
}

impl StatusValue {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusValue::Selected => "selected",
            StatusValue::NotSelected => "not_selected",
            StatusValue::ToVerify => "to_verify",
        }
    }
}

impl fmt::Display for StatusValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatusValue {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "selected" | "selecionado" => Ok(StatusValue::Selected),
            "not_selected" | "nao_selecionado" => Ok(StatusValue::NotSelected),
            "to_verify" | "verificar" => Ok(StatusValue::ToVerify),
            other => Err(format!("Unknown installation status: {}", other)),
        }
    }
}

/// Status row to append to an installation's history.
#[derive(Debug, Clone, PartialEq)]
pub struct NewStatus {
    pub installation_id: String,
    pub status: StatusValue,
    pub user: String,
    pub notes: Option<String>,
}

/// A persisted status history row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub installation_id: String,
    pub status: StatusValue,
    pub user: String,
    pub updated_at: DateTime<Utc>,
    pub notes: Option<String>,
}
