//! Faucet endpoints. Every outcome, including a rejected request, is a 200 JSON reply.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use tracing::debug;

use crate::faucet::{FaucetRejection, FaucetService};
use crate::models::faucet::{FaucetReply, FaucetRequestBody, FaucetStats, QueueView, StatsQuery};
use crate::models::parse_chain_id;

use super::ClientAddress;

pub fn router(service: Arc<FaucetService>) -> Router {
    Router::new()
        .route("/stats", get(stats))
        .route("/queue", get(queue))
        .route("/faucet", post(request_funds))
        .with_state(service)
}

async fn stats(
    State(service): State<Arc<FaucetService>>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<FaucetStats>, Json<FaucetReply>> {
    let chain_id = query.chain_id.as_deref().and_then(parse_chain_id);
    service
        .stats(chain_id)
        .await
        .map(Json)
        .map_err(|rejection| Json(FaucetReply::rejected(rejection.to_string())))
}

async fn queue(State(service): State<Arc<FaucetService>>) -> Json<QueueView> {
    Json(QueueView {
        last_send: service.queue().await,
    })
}

async fn request_funds(
    State(service): State<Arc<FaucetService>>,
    client: ClientAddress,
    body: Result<Json<FaucetRequestBody>, JsonRejection>,
) -> Json<FaucetReply> {
    let body = match body {
        Ok(Json(body)) => body,
        Err(rejection) => {
            debug!("Unreadable faucet request: {}", rejection.body_text());
            return Json(FaucetReply::rejected(FaucetRejection::InvalidChain.to_string()));
        }
    };

    let client_ip = client.resolve(service.trust_forwarded_for());
    match service
        .request_funds(body.chain_id, &body.address, client_ip)
        .await
    {
        Ok(tx_hash) => Json(FaucetReply::sent(tx_hash.to_string())),
        Err(rejection) => Json(FaucetReply::rejected(rejection.to_string())),
    }
}
