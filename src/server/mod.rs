use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

mod handlers;
mod state;

pub use handlers::{AppError, AUTH_STATE_COOKIE, LOGIN_PATH};
pub use state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // WACI: store the documents and send the browser to the wallet
        .route("/issuer/waci-issuance", post(handlers::waci_issuance))
        .route("/verifier/waci-share", post(handlers::waci_share))
        .route("/issuer/waci-issuance-v2", post(handlers::waci_issuance_v2))
        .route("/verifier/waci-share-v2", post(handlers::waci_share_v2))
        // Where the wallet returns the holder once the thread completed
        .route(
            "/issuer/waci-issuance/:id",
            get(handlers::waci_issuance_callback),
        )
        .route("/verifier/waci-share/:id", get(handlers::waci_share_callback))
        // Authorization code bridge
        .route("/issuer/oidc/issuance", post(handlers::initiate_issuance))
        .route(
            "/issuer/oidc/authorize-response",
            post(handlers::authorize_response),
        )
        .route(
            "/:id/.well-known/openid-configuration",
            get(handlers::well_known_configuration),
        )
        .route("/:id/issuer/oidc/authorize", get(handlers::authorize))
        .route("/:id/issuer/oidc/token", post(handlers::token))
        .route("/:id/issuer/oidc/credential", post(handlers::credential))
        // Loopback for DIDComm transports
        .route("/didcomm/actions", post(handlers::didcomm_action))
        .route("/health", get(handlers::health))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            axum::http::StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(30),
        ))
}
