//! Login, logout, registration confirmation and password change

use super::{AppState, CurrentUser};
use crate::error::AppResult;
use crate::services::drugstores::{ChangePasswordRequest, Session};
use axum::extract::{Json, Query, State};
use axum::http::StatusCode;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Deserialize)]
pub struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Deserialize)]
pub struct ConfirmationParams {
    email: String,
    code: String,
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> AppResult<Json<Session>> {
    let session = state.drugstores.login(&request.email, &request.password).await?;
    Ok(Json(session))
}

pub async fn logout(State(state): State<Arc<AppState>>, user: CurrentUser) -> AppResult<StatusCode> {
    state.drugstores.logout(&user.token).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn confirm_registration(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ConfirmationParams>,
) -> AppResult<StatusCode> {
    state
        .drugstores
        .confirm_registration(&params.email, &params.code)
        .await?;
    Ok(StatusCode::OK)
}

pub async fn change_password(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Json(request): Json<ChangePasswordRequest>,
) -> AppResult<StatusCode> {
    state.drugstores.change_password(user.id, request).await?;
    Ok(StatusCode::OK)
}
