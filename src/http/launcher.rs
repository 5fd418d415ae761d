use std::sync::Arc;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::routing::post;
use axum::{Json, Router};
use tracing::error;

use crate::launcher::{LaunchError, LauncherService};
use crate::models::launcher::{EscrowLaunched, EscrowRequest};

use super::HttpError;

pub fn router(service: Arc<LauncherService>) -> Router {
    Router::new()
        .route("/check-escrow", post(check_escrow))
        .route("/escrow", post(create_escrow))
        .with_state(service)
}

async fn check_escrow(
    State(service): State<Arc<LauncherService>>,
    body: Result<Json<EscrowRequest>, JsonRejection>,
) -> Result<Json<bool>, HttpError> {
    let Json(request) = body.map_err(|rejection| HttpError::bad_request(rejection.body_text()))?;
    let funded = service.check_escrow(request).await?;
    Ok(Json(funded))
}

async fn create_escrow(
    State(service): State<Arc<LauncherService>>,
    body: Result<Json<EscrowRequest>, JsonRejection>,
) -> Result<Json<EscrowLaunched>, HttpError> {
    let Json(request) = body.map_err(|rejection| HttpError::bad_request(rejection.body_text()))?;
    let launched = service.create_escrow(request).await?;
    Ok(Json(launched))
}

impl From<LaunchError> for HttpError {
    fn from(err: LaunchError) -> Self {
        match &err {
            LaunchError::Chain(_)
            | LaunchError::Payments(_)
            | LaunchError::Pricing(_)
            | LaunchError::Storage(_) => error!("Escrow request failed: {err}"),
            _ => {}
        }
        HttpError::bad_request(err.to_string())
    }
}
