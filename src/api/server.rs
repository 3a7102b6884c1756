//! HTTP server and routing table

use super::{auth, drugstores};
use crate::config::Config;
use crate::services::DrugstoreService;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Multipart bodies carry a photo of up to 10MB plus the JSON part
const MAX_BODY_SIZE: usize = 12 * 1024 * 1024;

/// Shared state for API handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub drugstores: DrugstoreService,
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    let images = ServeDir::new(&state.config.images.dir);

    Router::new()
        .route("/health", get(health))
        .route("/registration/confirmation", get(auth::confirm_registration))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/drugstore/registration", post(drugstores::register))
        .route("/drugstore/get-info", get(drugstores::own_info))
        .route("/drugstore/edit", post(drugstores::edit))
        .route("/drugstore/change-self-password", post(auth::change_password))
        .route("/drugstore/search", get(drugstores::search_by_name))
        .route("/drugstore/search-by-chosen-drugs", post(drugstores::search_by_drugs))
        .route(
            "/drugstore/search-by-chosen-drugs-and-drugstore",
            post(drugstores::search_by_drugs_in),
        )
        .route("/drugstore/drug/search", post(drugstores::search_drugs))
        .route("/drugstore/drug/add", post(drugstores::add_drug))
        .route("/drugstore/drug/update", post(drugstores::update_drug))
        .route("/drugstore/:id", get(drugstores::profile))
        .nest_service("/images", images)
        .with_state(Arc::new(state))
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Start the API server in the background
pub fn start_server(config: Config, drugstores: DrugstoreService) -> JoinHandle<()> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let app = router(AppState { config, drugstores });

    tokio::spawn(async move {
        let listener = match tokio::net::TcpListener::bind(&addr).await {
            Ok(l) => l,
            Err(e) => {
                error!("Failed to bind API server to {}: {}", addr, e);
                return;
            }
        };

        info!("API server listening on {}", addr);

        if let Err(e) = axum::serve(listener, app).await {
            error!("API server error: {}", e);
        }
    })
}

/// Health check endpoint
async fn health() -> &'static str {
    "OK"
}
