use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::extract::{ConnectInfo, FromRequestParts, State};
use axum::http::Method;
use axum::http::StatusCode;
use axum::http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::state::AppState;

mod faucet;
mod launcher;

pub fn router(state: AppState, static_dir: Option<&Path>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([ACCEPT, AUTHORIZATION, CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    let mut router = Router::new()
        .route("/health", get(health_live))
        .with_state(state.clone());
    if let Some(service) = &state.faucet {
        router = router.merge(faucet::router(service.clone()));
    }
    if let Some(service) = &state.launcher {
        router = router.merge(launcher::router(service.clone()));
    }
    if let Some(dir) = static_dir {
        // Client-side routes all resolve to the bundle's entry page.
        let bundle = ServeDir::new(dir).fallback(ServeFile::new(dir.join("index.html")));
        router = router.fallback_service(bundle);
    }

    router.layer(TraceLayer::new_for_http()).layer(cors)
}

async fn health_live(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "live",
        uptime_seconds: state.start_time.elapsed().as_secs(),
        faucet: state.faucet.as_ref().map(|service| service.network_count()),
        launcher: state.launcher.as_ref().map(|service| service.network_count()),
    })
}

/// Network counts per service; `null` when the service is disabled.
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_seconds: u64,
    faucet: Option<usize>,
    launcher: Option<usize>,
}

/// The socket peer and the first `X-Forwarded-For` hop, if either is known.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientAddress {
    pub peer: Option<IpAddr>,
    pub forwarded_for: Option<IpAddr>,
}

impl ClientAddress {
    pub fn resolve(&self, trust_forwarded_for: bool) -> Option<IpAddr> {
        if trust_forwarded_for {
            self.forwarded_for.or(self.peer)
        } else {
            self.peer
        }
    }
}

impl<S> FromRequestParts<S> for ClientAddress
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        let forwarded_for = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .and_then(|first| first.trim().parse().ok());
        Ok(Self {
            peer,
            forwarded_for,
        })
    }
}

/// Plain-text error response.
#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    message: String,
}

impl HttpError {
    pub fn new(status: StatusCode, message: String) -> Self {
        assert!(status != StatusCode::OK, "Error status cannot be 200");
        assert!(!message.is_empty(), "Error message cannot be empty");
        Self { status, message }
    }

    pub fn bad_request(message: String) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        info!("HTTP error: {}", self.message);
        (self.status, self.message).into_response()
    }
}


#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use alloy::primitives::Address;
    use axum::http::StatusCode;
    use tower::ServiceExt;

    use super::test_support::{body_json, body_text, get};
    use super::*;
    use crate::chain::testing::FakeGateway;
    use crate::faucet::{FaucetNetwork, FaucetService, FaucetSettings};

    fn faucet_only() -> AppState {
        let settings = FaucetSettings {
            amount: alloy::primitives::U256::from(1),
            daily_limit: 10,
            ip_waiting_time_seconds: 0,
            address_waiting_time_seconds: 0,
            blocklist_capacity: 100,
            trust_forwarded_for: false,
        };
        let network = FaucetNetwork {
            chain_id: 1338,
            title: "Localhost".to_string(),
            hmt_address: Address::repeat_byte(0x70),
            gateway: Arc::new(FakeGateway::new(Address::repeat_byte(0xfa))),
        };
        AppState::new(Some(FaucetService::new(settings, vec![network], None)), None)
    }

    #[tokio::test]
    async fn health_reports_enabled_services() {
        let response = router(faucet_only(), None)
            .oneshot(get("/health"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "live");
        assert_eq!(body["faucet"], 1);
        assert!(body["launcher"].is_null());
    }

    #[tokio::test]
    async fn disabled_service_routes_are_absent() {
        let response = router(faucet_only(), None)
            .oneshot(super::test_support::post_json("/escrow", "{}"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_paths_serve_the_client_bundle() {
        let dir = std::env::temp_dir().join(format!("human-api-bundle-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("index.html"), "<html>faucet</html>").unwrap();

        let app = router(faucet_only(), Some(&dir));
        let response = app.clone().oneshot(get("/some/client/route")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "<html>faucet</html>");

        let response = app.oneshot(get("/queue")).await.unwrap();
        assert_eq!(body_json(response).await["lastSend"], serde_json::json!([]));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn forwarded_for_is_opt_in() {
        let address = ClientAddress {
            peer: Some("10.0.0.1".parse().unwrap()),
            forwarded_for: Some("203.0.113.9".parse().unwrap()),
        };
        assert_eq!(address.resolve(false), address.peer);
        assert_eq!(address.resolve(true), address.forwarded_for);

        let direct = ClientAddress {
            forwarded_for: None,
            ..address
        };
        assert_eq!(direct.resolve(true), direct.peer);
    }
}
