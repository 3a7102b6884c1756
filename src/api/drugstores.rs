//! Drugstore registration, profiles, stock and search endpoints

use super::{AppState, CurrentUser};
use crate::db::CatalogDrug;
use crate::error::{AppError, AppResult};
use crate::services::drugstores::{
    CreateDrugstoreRequest, DrugstoreDrugs, DrugstoreListing, DrugstoreProfileInfo,
    OwnDrugstoreInfo, StockRequest, UpdateDrugstoreRequest,
};
use axum::extract::{Json, Multipart, Path, Query, State};
use axum::http::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Registered {
    drugstore_id: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrugSearchRequest {
    drug_name: String,
}

#[derive(Deserialize)]
pub struct NameQuery {
    #[serde(default)]
    name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChosenDrugs {
    drugs_id: Vec<i64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChosenDrugsInDrugstore {
    drugs_id: Vec<i64>,
    drugstore_id: i64,
}

/// POST /drugstore/registration with `drugstore` JSON part and optional `image`
pub async fn register(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<Registered>)> {
    let (request, image) = read_upload::<CreateDrugstoreRequest>(multipart, "drugstore").await?;
    let drugstore_id = state.drugstores.register(request, image).await?;
    Ok((StatusCode::CREATED, Json(Registered { drugstore_id })))
}

pub async fn own_info(State(state): State<Arc<AppState>>, user: CurrentUser) -> AppResult<Json<OwnDrugstoreInfo>> {
    Ok(Json(state.drugstores.own_info(user.id).await?))
}

/// POST /drugstore/edit with `updateDrugstoreInfo` JSON part and optional `image`
pub async fn edit(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    multipart: Multipart,
) -> AppResult<StatusCode> {
    let (request, image) = read_upload::<UpdateDrugstoreRequest>(multipart, "updateDrugstoreInfo").await?;
    state.drugstores.update_info(user.id, request, image).await?;
    Ok(StatusCode::OK)
}

pub async fn profile(
    State(state): State<Arc<AppState>>,
    viewer: Option<CurrentUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<DrugstoreProfileInfo>> {
    let viewer = viewer.map(|user| user.id);
    Ok(Json(state.drugstores.profile(id, viewer).await?))
}

pub async fn search_drugs(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Json(request): Json<DrugSearchRequest>,
) -> AppResult<Json<Vec<CatalogDrug>>> {
    Ok(Json(state.drugstores.search_drugs(user.id, &request.drug_name).await?))
}

pub async fn add_drug(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Json(request): Json<StockRequest>,
) -> AppResult<StatusCode> {
    state.drugstores.add_drug(user.id, request).await?;
    Ok(StatusCode::CREATED)
}

pub async fn update_drug(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Json(request): Json<StockRequest>,
) -> AppResult<StatusCode> {
    state.drugstores.update_drug(user.id, request).await?;
    Ok(StatusCode::OK)
}

pub async fn search_by_name(
    State(state): State<Arc<AppState>>,
    Query(query): Query<NameQuery>,
) -> AppResult<Json<Vec<DrugstoreListing>>> {
    Ok(Json(state.drugstores.search_by_name(&query.name).await?))
}

/// 404 when no drugstore stocks all chosen drugs
pub async fn search_by_drugs(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChosenDrugs>,
) -> AppResult<Json<Vec<DrugstoreDrugs>>> {
    let results = state.drugstores.search_by_drugs(&request.drugs_id).await?;
    if results.is_empty() {
        return Err(AppError::NotFound);
    }
    Ok(Json(results))
}

pub async fn search_by_drugs_in(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChosenDrugsInDrugstore>,
) -> AppResult<Json<Vec<DrugstoreDrugs>>> {
    let results = state
        .drugstores
        .search_by_drugs_in(&request.drugs_id, request.drugstore_id)
        .await?;
    Ok(Json(results))
}

/// Read a JSON part named `payload_field` and an optional `image` part
async fn read_upload<T: DeserializeOwned>(
    mut multipart: Multipart,
    payload_field: &str,
) -> AppResult<(T, Option<Vec<u8>>)> {
    let mut payload = None;
    let mut image = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::validation(format!("Multipart error: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::validation(format!("Read error: {}", e)))?;

        if name == payload_field {
            let parsed = serde_json::from_slice::<T>(&data)
                .map_err(|e| AppError::validation(format!("Invalid {}: {}", payload_field, e)))?;
            payload = Some(parsed);
        } else if name == "image" {
            // browsers send an empty part when no file was chosen
            if !data.is_empty() {
                image = Some(data.to_vec());
            }
        } else {
            debug!("Ignoring multipart field {:?}", name);
        }
    }

    let payload = payload.ok_or_else(|| AppError::validation(format!("Missing {} part", payload_field)))?;
    Ok((payload, image))
}
