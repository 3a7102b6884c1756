//! Drugstore use cases: accounts, profiles, stock and search

use super::auth::{self, CONFIRMATION_CODE_LEN, PHOTO_NAME_LEN, SESSION_TOKEN_LEN};
use super::mailer::Mailer;
use super::photos::{PhotoSize, PhotoStore};
use crate::db::{
    CatalogDrug, Database, DrugInfo, DrugstoreAccount, DrugstoreProfile, DrugstoreSummary,
    DrugstoreUpdate, NewDrugstore, StockEntry, WorkDayRow,
};
use crate::error::{AppError, AppResult};
use crate::schedule::{self, normalize_time, storage_time, ScheduleView, Weekday};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, error, info, warn};

/// Id of an authenticated drugstore account
pub type UserId = i64;

const MIN_PASSWORD_LEN: usize = 8;

// ==================== Requests ====================

/// Opening hours of one weekday as sent and returned by the API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkDay {
    pub day: Weekday,
    pub from: String,
    pub until: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDrugstoreRequest {
    pub name: String,
    pub email: String,
    pub phone_number: String,
    pub password: String,
    pub drugstore_name: String,
    pub address: String,
    pub city_id: i64,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub work_days: Vec<WorkDay>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDrugstoreRequest {
    pub name: String,
    pub phone_number: String,
    pub drugstore_name: String,
    pub address: String,
    pub city_id: i64,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub work_day_schedule: Vec<WorkDay>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub password: String,
    pub new_password: String,
}

/// Price and availability of a drug in the caller's drugstore
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockRequest {
    pub drug_id: i64,
    pub price: f64,
    pub existence: bool,
}

// ==================== Views ====================

/// Issued on login; sent back as `Authorization: Bearer <token>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub token: String,
    pub user_id: UserId,
}

/// Drugstore as seen by its owner
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnDrugstoreInfo {
    #[serde(flatten)]
    pub account: DrugstoreAccount,
    pub drugstore_photo_url: Option<String>,
    pub work_days: Vec<WorkDay>,
}

/// Public drugstore page
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrugstoreProfileInfo {
    pub drugstore_id: i64,
    #[serde(flatten)]
    pub profile: DrugstoreProfile,
    pub drugstore_photo_url: Option<String>,
    pub drugstore_owner: bool,
    #[serde(flatten)]
    pub schedule: ScheduleView,
}

/// Drugstore search hit with its opening hours
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrugstoreListing {
    pub drugstore_id: i64,
    pub name: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub phone_number: String,
    #[serde(flatten)]
    pub schedule: ScheduleView,
}

/// Drugstore search hit with the chosen drugs it stocks
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrugstoreDrugs {
    #[serde(flatten)]
    pub drugstore: DrugstoreListing,
    pub drugs_info: Vec<DrugInfo>,
}

// ==================== Service ====================

#[derive(Debug, Clone)]
pub struct DrugstoreService {
    db: Database,
    mailer: Mailer,
    photos: PhotoStore,
    front_base_url: String,
}

impl DrugstoreService {
    pub fn new(db: Database, mailer: Mailer, photos: PhotoStore, front_base_url: &str) -> Self {
        Self {
            db,
            mailer,
            photos,
            front_base_url: front_base_url.trim_end_matches('/').to_string(),
        }
    }

    // ==================== Accounts ====================

    /// Create an unconfirmed drugstore account and mail the confirmation link
    pub async fn register(&self, request: CreateDrugstoreRequest, photo: Option<Vec<u8>>) -> AppResult<UserId> {
        let email = request.email.trim().to_lowercase();
        validate_email(&email)?;
        validate_password(&request.password)?;
        validate_details(&request.name, &request.drugstore_name, &request.address)?;
        validate_coordinates(request.latitude, request.longitude)?;
        let work_days = work_day_rows(&request.work_days)?;

        if self.db.email_exists(&email).await? {
            return Err(AppError::UserExists);
        }
        if !self.db.city_exists(request.city_id).await? {
            return Err(AppError::validation(format!("unknown city {}", request.city_id)));
        }

        let photo_path = match photo {
            Some(data) => Some(self.store_photo(data).await?),
            None => None,
        };

        let confirmation_code = auth::random_code(CONFIRMATION_CODE_LEN);
        let new_drugstore = NewDrugstore {
            name: request.name.trim().to_string(),
            email: email.clone(),
            phone_number: request.phone_number.trim().to_string(),
            password_hash: auth::hash_password(&request.password)?,
            confirmation_code: confirmation_code.clone(),
            drugstore_name: request.drugstore_name.trim().to_string(),
            address: request.address.trim().to_string(),
            city_id: request.city_id,
            latitude: request.latitude,
            longitude: request.longitude,
            photo_path: photo_path.clone(),
        };

        let id = match self.db.create_drugstore(new_drugstore, work_days).await {
            Ok(id) => id,
            Err(e) => {
                self.discard_photo(photo_path.as_deref()).await;
                return Err(e.into());
            }
        };

        if let Err(e) = self.send_confirmation(&email, &confirmation_code).await {
            warn!("Confirmation mail to {} failed, rolling back drugstore {}", email, id);
            self.discard_photo(photo_path.as_deref()).await;
            if let Err(delete_err) = self.db.delete_drugstore(id).await {
                error!("Failed to roll back drugstore {}: {:#}", id, delete_err);
            }
            return Err(AppError::Mail(e));
        }

        info!("Registered drugstore {} ({})", id, email);
        Ok(id)
    }

    async fn send_confirmation(&self, email: &str, code: &str) -> anyhow::Result<()> {
        let link = reqwest::Url::parse_with_params(
            &format!("{}/registration/confirmation", self.front_base_url),
            &[("email", email), ("code", code)],
        )
        .context("Invalid front.base_url")?;

        let text = format!("Follow the link to confirm your drugstore registration: {}", link);
        self.mailer.send(email, "Drugstore Confirmation", &text).await
    }

    pub async fn confirm_registration(&self, email: &str, code: &str) -> AppResult<()> {
        let email = email.trim().to_lowercase();
        if !self.db.confirm_user(&email, code.trim()).await? {
            return Err(AppError::InvalidConfirmation);
        }
        info!("Confirmed registration of {}", email);
        Ok(())
    }

    pub async fn login(&self, email: &str, password: &str) -> AppResult<Session> {
        let email = email.trim().to_lowercase();
        let credentials = self
            .db
            .get_credentials(&email)
            .await?
            .ok_or(AppError::Unauthorized)?;

        if !auth::verify_password(password, &credentials.password_hash) {
            debug!("Wrong password for {}", email);
            return Err(AppError::Unauthorized);
        }
        if !credentials.confirmed {
            return Err(AppError::EmailNotConfirmed);
        }

        let token = auth::random_code(SESSION_TOKEN_LEN);
        self.db.create_session(&token, credentials.user_id).await?;
        info!("User {} logged in", credentials.user_id);
        Ok(Session {
            token,
            user_id: credentials.user_id,
        })
    }

    pub async fn logout(&self, token: &str) -> AppResult<()> {
        self.db.delete_session(token).await?;
        Ok(())
    }

    /// Resolve a session token to its user
    pub async fn session_user(&self, token: &str) -> AppResult<Option<UserId>> {
        Ok(self.db.get_session_user(token).await?)
    }

    pub async fn change_password(&self, user: UserId, request: ChangePasswordRequest) -> AppResult<()> {
        let hash = self.db.get_password_hash(user).await?.ok_or(AppError::NotFound)?;
        if !auth::verify_password(&request.password, &hash) {
            return Err(AppError::PasswordMismatch);
        }
        validate_password(&request.new_password)?;

        let new_hash = auth::hash_password(&request.new_password)?;
        self.db.set_password_hash(user, &new_hash).await?;
        info!("User {} changed password", user);
        Ok(())
    }

    // ==================== Profiles ====================

    pub async fn own_info(&self, user: UserId) -> AppResult<OwnDrugstoreInfo> {
        let account = self
            .db
            .get_drugstore_account(user)
            .await?
            .ok_or(AppError::NotFound)?;

        let work_days = self
            .db
            .get_work_days(user)
            .await?
            .iter()
            .map(work_day_view)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|source| AppError::Schedule {
                drugstore_id: user,
                source,
            })?;

        Ok(OwnDrugstoreInfo {
            drugstore_photo_url: self.photo_url(account.drugstore_photo_path.as_deref()),
            account,
            work_days,
        })
    }

    /// Replace account details, all work days and optionally the photo
    pub async fn update_info(
        &self,
        user: UserId,
        request: UpdateDrugstoreRequest,
        photo: Option<Vec<u8>>,
    ) -> AppResult<()> {
        validate_details(&request.name, &request.drugstore_name, &request.address)?;
        validate_coordinates(request.latitude, request.longitude)?;
        let work_days = work_day_rows(&request.work_day_schedule)?;

        let old_photo = self
            .db
            .get_drugstore_account(user)
            .await?
            .ok_or(AppError::NotFound)?
            .drugstore_photo_path;
        if !self.db.city_exists(request.city_id).await? {
            return Err(AppError::validation(format!("unknown city {}", request.city_id)));
        }

        let update = DrugstoreUpdate {
            name: request.name.trim().to_string(),
            phone_number: request.phone_number.trim().to_string(),
            drugstore_name: request.drugstore_name.trim().to_string(),
            address: request.address.trim().to_string(),
            latitude: request.latitude,
            longitude: request.longitude,
            city_id: request.city_id,
        };
        let new_photo = match photo {
            Some(data) => Some(self.store_photo(data).await?),
            None => None,
        };

        if let Err(e) = self
            .db
            .update_drugstore_with_schedule(user, update, work_days, new_photo.clone())
            .await
        {
            self.discard_photo(new_photo.as_deref()).await;
            return Err(e.into());
        }
        if new_photo.is_some() {
            self.discard_photo(old_photo.as_deref()).await;
        }

        info!("Drugstore {} updated", user);
        Ok(())
    }

    /// Public profile; `drugstoreOwner` is set when the viewer owns it
    pub async fn profile(&self, drugstore_id: i64, viewer: Option<UserId>) -> AppResult<DrugstoreProfileInfo> {
        let profile = self
            .db
            .get_drugstore_profile(drugstore_id)
            .await?
            .ok_or(AppError::NotFound)?;

        let groups = self.db.get_schedule_groups(drugstore_id).await?;
        let schedule = schedule::assemble(&groups).map_err(|source| AppError::Schedule { drugstore_id, source })?;

        Ok(DrugstoreProfileInfo {
            drugstore_id,
            drugstore_photo_url: self.photo_url(profile.drugstore_photo_path.as_deref()),
            drugstore_owner: viewer == Some(drugstore_id),
            profile,
            schedule,
        })
    }

    // ==================== Stock ====================

    pub async fn search_drugs(&self, user: UserId, name: &str) -> AppResult<Vec<CatalogDrug>> {
        Ok(self.db.find_catalog_drugs(user, name).await?)
    }

    pub async fn add_drug(&self, user: UserId, request: StockRequest) -> AppResult<()> {
        validate_price(request.price)?;
        if !self.db.drug_exists(request.drug_id).await? {
            return Err(AppError::NotFound);
        }
        if self.db.get_stock(user, request.drug_id).await?.is_some() {
            return Err(AppError::validation(format!(
                "drug {} is already in stock",
                request.drug_id
            )));
        }

        self.db.add_stock(user, stock_entry(request)).await?;
        info!("Drugstore {} stocked drug {}", user, request.drug_id);
        Ok(())
    }

    pub async fn update_drug(&self, user: UserId, request: StockRequest) -> AppResult<()> {
        validate_price(request.price)?;
        if !self.db.update_stock(user, stock_entry(request)).await? {
            return Err(AppError::NotFound);
        }
        info!("Drugstore {} updated drug {}", user, request.drug_id);
        Ok(())
    }

    // ==================== Search ====================

    /// Drugstores whose name or address matches any token of the query
    pub async fn search_by_name(&self, query: &str) -> AppResult<Vec<DrugstoreListing>> {
        let tokens = search_tokens(query);
        let summaries = self.db.search_drugstores(&tokens).await?;

        let mut listings = Vec::with_capacity(summaries.len());
        for summary in summaries {
            if let Some(listing) = self.listing(summary).await? {
                listings.push(listing);
            }
        }
        Ok(listings)
    }

    /// Drugstores stocking every chosen drug, cheapest total first
    pub async fn search_by_drugs(&self, drug_ids: &[i64]) -> AppResult<Vec<DrugstoreDrugs>> {
        let drug_ids = unique_ids(drug_ids);
        let summaries = self.db.find_drugstores_with_all(&drug_ids).await?;
        self.with_drugs(summaries, &drug_ids).await
    }

    /// The chosen drugs stocked by one drugstore
    pub async fn search_by_drugs_in(&self, drug_ids: &[i64], drugstore_id: i64) -> AppResult<Vec<DrugstoreDrugs>> {
        let drug_ids = unique_ids(drug_ids);
        let summaries = self.db.find_drugstore_with_any(drugstore_id, &drug_ids).await?;
        self.with_drugs(summaries, &drug_ids).await
    }

    async fn with_drugs(&self, summaries: Vec<DrugstoreSummary>, drug_ids: &[i64]) -> AppResult<Vec<DrugstoreDrugs>> {
        let mut results = Vec::with_capacity(summaries.len());
        for summary in summaries {
            let drugstore_id = summary.drugstore_id;
            let Some(drugstore) = self.listing(summary).await? else {
                continue;
            };
            let drugs_info = self.db.get_stocked_drugs(drugstore_id, drug_ids).await?;
            results.push(DrugstoreDrugs { drugstore, drugs_info });
        }
        Ok(results)
    }

    /// Attach the schedule view; drugstores with corrupt schedules are skipped
    async fn listing(&self, summary: DrugstoreSummary) -> AppResult<Option<DrugstoreListing>> {
        let groups = self.db.get_schedule_groups(summary.drugstore_id).await?;
        match schedule::assemble(&groups) {
            Ok(schedule) => Ok(Some(DrugstoreListing {
                drugstore_id: summary.drugstore_id,
                name: summary.name,
                address: summary.address,
                latitude: summary.latitude,
                longitude: summary.longitude,
                phone_number: summary.phone_number,
                schedule,
            })),
            Err(e) => {
                warn!(
                    drugstore_id = summary.drugstore_id,
                    error = %e,
                    "Excluding drugstore with corrupt schedule from results"
                );
                Ok(None)
            }
        }
    }

    // ==================== Photos ====================

    async fn store_photo(&self, data: Vec<u8>) -> AppResult<String> {
        let name = auth::random_code(PHOTO_NAME_LEN);
        self.photos.store(&name, data).await?;
        Ok(name)
    }

    async fn discard_photo(&self, name: Option<&str>) {
        if let Some(name) = name {
            if let Err(e) = self.photos.delete(name).await {
                warn!("Failed to delete photo {}: {}", name, e);
            }
        }
    }

    fn photo_url(&self, name: Option<&str>) -> Option<String> {
        name.map(|name| self.photos.url(name, PhotoSize::Small))
    }
}

// ==================== Validation ====================

fn validate_email(email: &str) -> AppResult<()> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(AppError::validation(format!("invalid email: {}", email))),
    }
}

fn validate_password(password: &str) -> AppResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

fn validate_details(name: &str, drugstore_name: &str, address: &str) -> AppResult<()> {
    for (field, value) in [("name", name), ("drugstoreName", drugstore_name), ("address", address)] {
        if value.trim().is_empty() {
            return Err(AppError::validation(format!("{} must not be empty", field)));
        }
    }
    Ok(())
}

fn validate_coordinates(latitude: f64, longitude: f64) -> AppResult<()> {
    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return Err(AppError::validation("coordinates out of range"));
    }
    Ok(())
}

fn validate_price(price: f64) -> AppResult<()> {
    if !price.is_finite() || price < 0.0 {
        return Err(AppError::validation("price must be a non-negative number"));
    }
    Ok(())
}

/// Validate declared work days and convert them to storage rows
fn work_day_rows(work_days: &[WorkDay]) -> AppResult<Vec<WorkDayRow>> {
    let mut seen = HashSet::new();
    work_days
        .iter()
        .map(|wd| {
            if !seen.insert(wd.day) {
                return Err(AppError::validation(format!("{} declared twice", wd.day)));
            }
            let invalid = |e: schedule::ScheduleError| AppError::validation(format!("{}: {}", wd.day, e));
            Ok(WorkDayRow {
                day: wd.day.as_str().to_string(),
                time_start: storage_time(&wd.from).map_err(invalid)?,
                time_end: storage_time(&wd.until).map_err(invalid)?,
            })
        })
        .collect()
}

fn work_day_view(row: &WorkDayRow) -> Result<WorkDay, schedule::ScheduleError> {
    Ok(WorkDay {
        day: row.day.parse()?,
        from: normalize_time(&row.time_start)?,
        until: normalize_time(&row.time_end)?,
    })
}

fn stock_entry(request: StockRequest) -> StockEntry {
    StockEntry {
        drug_id: request.drug_id,
        price: request.price,
        existence: request.existence,
    }
}

/// Lowercase query tokens split on commas and whitespace
fn search_tokens(query: &str) -> Vec<String> {
    query
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn unique_ids(ids: &[i64]) -> Vec<i64> {
    let mut ids = ids.to_vec();
    ids.sort_unstable();
    ids.dedup();
    ids
}
