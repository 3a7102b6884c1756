//! Database models for Doru

use serde::{Deserialize, Serialize};

/// Everything needed to insert a drugstore account
#[derive(Debug, Clone)]
pub struct NewDrugstore {
    pub name: String,
    pub email: String,
    pub phone_number: String,
    pub password_hash: String,
    pub confirmation_code: String,
    pub drugstore_name: String,
    pub address: String,
    pub city_id: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub photo_path: Option<String>,
}

/// Login lookup result
#[derive(Debug, Clone)]
pub struct Credentials {
    pub user_id: i64,
    pub password_hash: String,
    pub confirmed: bool,
}

/// Drugstore account as seen by its owner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrugstoreAccount {
    pub name: String,
    pub drugstore_name: String,
    pub phone_number: String,
    pub address: String,
    pub drugstore_photo_path: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub city_id: i64,
}

/// Public drugstore profile joined with city and contact data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrugstoreProfile {
    pub drugstore_name: String,
    pub address: String,
    pub drugstore_photo_path: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub city_name: String,
    pub email: String,
    pub phone_number: String,
}

/// Editable drugstore and owner fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrugstoreUpdate {
    pub name: String,
    pub phone_number: String,
    pub drugstore_name: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub city_id: i64,
}

/// One stored `drugstores_work_days` row, times as persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkDayRow {
    pub day: String,
    pub time_start: String,
    pub time_end: String,
}

/// Search result row before the schedule is attached
#[derive(Debug, Clone, PartialEq)]
pub struct DrugstoreSummary {
    pub drugstore_id: i64,
    pub name: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub phone_number: String,
}

/// Stocked drug as listed for a drugstore
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrugInfo {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub existence: bool,
    pub country_name: Option<String>,
}

/// Catalog drug with the current drugstore's stock, if any
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogDrug {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub country_name: Option<String>,
    pub price: Option<f64>,
    pub existence: Option<bool>,
}

/// Price and availability of one drug in one drugstore
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockEntry {
    pub drug_id: i64,
    pub price: f64,
    pub existence: bool,
}
