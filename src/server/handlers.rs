use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Form, Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{error, info};

use super::AppState;
use crate::{
    bridge::{
        auth_session_ttl, AuthorizationRequest, BridgeError, CredentialRequest,
        InitiateIssuanceForm, TokenRequest,
    },
    core::{
        key::CorrelationKey,
        message::InboundMessage,
        store::get_json,
    },
    exchange::{
        self,
        invitation::{IssuanceForm, ShareForm},
    },
    orchestrator::{received_presentation, ActionError, Disposition},
};

pub const AUTH_STATE_COOKIE: &str = "state";
pub const LOGIN_PATH: &str = "/issuer/oidc/login";

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "waci-adapter"
    }))
}

/// POST /issuer/waci-issuance
///
/// Stores the issuance documents and sends the browser to the wallet with the invitation.
pub async fn waci_issuance(
    State(state): State<Arc<AppState>>,
    Form(form): Form<IssuanceForm>,
) -> Result<Response, AppError> {
    let (invitation, redirect) = state.initiator.initiate_issuance(&form).await?;
    info!("waci issuance redirect: invitation={} url={redirect}", invitation.id);
    Ok(found(&redirect))
}

/// POST /verifier/waci-share
pub async fn waci_share(
    State(state): State<Arc<AppState>>,
    Form(form): Form<ShareForm>,
) -> Result<Response, AppError> {
    let (invitation, redirect) = state.initiator.initiate_share(&form).await?;
    info!("waci share redirect: invitation={} url={redirect}", invitation.id);
    Ok(found(&redirect))
}

/// POST /issuer/waci-issuance-v2
///
/// [waci_issuance] with a DIDComm v2 invitation sent from the adapter's DID.
pub async fn waci_issuance_v2(
    State(state): State<Arc<AppState>>,
    Form(form): Form<IssuanceForm>,
) -> Result<Response, AppError> {
    let (invitation, redirect) = state.initiator.initiate_issuance_v2(&form).await?;
    info!("waci issuance v2 redirect: invitation={} url={redirect}", invitation.id);
    Ok(found(&redirect))
}

/// POST /verifier/waci-share-v2
pub async fn waci_share_v2(
    State(state): State<Arc<AppState>>,
    Form(form): Form<ShareForm>,
) -> Result<Response, AppError> {
    let (invitation, redirect) = state.initiator.initiate_share_v2(&form).await?;
    info!("waci share v2 redirect: invitation={} url={redirect}", invitation.id);
    Ok(found(&redirect))
}

/// GET /issuer/waci-issuance/:id
///
/// Where the wallet sends the holder once the credential has been issued on thread `id`.
pub async fn waci_issuance_callback(
    State(state): State<Arc<AppState>>,
    Path(thread_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let issued = interaction_outcome(&state, &thread_id).await?;
    Ok(Json(json!({
        "message": "Successfully Sent Credential to holder",
        "thread_id": thread_id,
        "credential_response": issued,
    })))
}

/// GET /verifier/waci-share/:id
pub async fn waci_share_callback(
    State(state): State<Arc<AppState>>,
    Path(thread_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let received = interaction_outcome(&state, &thread_id).await?;
    let presentation = received_presentation(&received).map(|presentation| presentation.into_json());
    Ok(Json(json!({
        "message": "Successfully Received Presentation",
        "thread_id": thread_id,
        "presentation": presentation,
    })))
}

async fn interaction_outcome(state: &AppState, thread_id: &str) -> Result<Value, AppError> {
    get_json(
        state.store.as_ref(),
        &CorrelationKey::interaction_outcome(thread_id),
    )
    .await
    .map_err(|e| {
        if e.is_not_found() {
            AppError::NotFound(format!("failed to get interaction data for '{thread_id}'"))
        } else {
            AppError::Internal(format!("failed to get interaction data: {e}"))
        }
    })
}

/// POST /issuer/oidc/issuance
pub async fn initiate_issuance(
    State(state): State<Arc<AppState>>,
    Form(form): Form<InitiateIssuanceForm>,
) -> Result<Response, AppError> {
    let redirect = state.bridge.initiate_issuance(form).await?;
    Ok(found(redirect.as_str()))
}

/// GET /:id/.well-known/openid-configuration
pub async fn well_known_configuration(
    State(state): State<Arc<AppState>>,
    Path(issuer_id): Path<String>,
) -> Response {
    oidc_response(state.bridge.configuration(&issuer_id).await)
}

/// GET /:id/issuer/oidc/authorize
///
/// Remembers the request behind a `state` cookie and sends the browser to the login page.
pub async fn authorize(
    State(state): State<Arc<AppState>>,
    Query(request): Query<AuthorizationRequest>,
) -> Result<Response, AppError> {
    let auth_state = state.bridge.authorize(request).await?;

    let cookie = Cookie::build((AUTH_STATE_COOKIE, auth_state))
        .path("/")
        .http_only(true)
        .max_age(time::Duration::seconds(auth_session_ttl().num_seconds()))
        .build();
    Ok((CookieJar::new().add(cookie), found(LOGIN_PATH)).into_response())
}

/// POST /issuer/oidc/authorize-response
pub async fn authorize_response(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<Response, AppError> {
    let auth_state = jar.get(AUTH_STATE_COOKIE).map(|cookie| cookie.value());
    let redirect = state.bridge.send_authorize_response(auth_state).await?;
    Ok(found(redirect.as_str()))
}

/// POST /:id/issuer/oidc/token
pub async fn token(
    State(state): State<Arc<AppState>>,
    Path(issuer_id): Path<String>,
    Form(request): Form<TokenRequest>,
) -> Response {
    oidc_response(state.bridge.token(&issuer_id, request).await)
}

/// POST /:id/issuer/oidc/credential
pub async fn credential(
    State(state): State<Arc<AppState>>,
    Path(issuer_id): Path<String>,
    headers: HeaderMap,
    Form(request): Form<CredentialRequest>,
) -> Response {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    oidc_response(
        state
            .bridge
            .credential(&issuer_id, authorization, request)
            .await,
    )
}

/// POST /didcomm/actions
///
/// Loopback for transports: queues the message as an action and returns the decision.
pub async fn didcomm_action(
    State(state): State<Arc<AppState>>,
    Json(message): Json<InboundMessage>,
) -> Result<Json<Disposition>, AppError> {
    let disposition = state.actions.submit(message).await.map_err(|e| match e {
        ActionError::Closed => AppError::Unavailable(e.to_string()),
        ActionError::Dropped => AppError::Internal(e.to_string()),
    })?;
    Ok(Json(disposition))
}

fn found(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(location) => (StatusCode::FOUND, [(header::LOCATION, location)]).into_response(),
        Err(_) => AppError::Internal("invalid redirect location".into()).into_response(),
    }
}

/// Bridge responses are JSON and never cached.
fn oidc_response<T: Serialize>(result: Result<T, BridgeError>) -> Response {
    let (status, body) = match result {
        Ok(body) => match serde_json::to_value(body) {
            Ok(body) => (StatusCode::OK, body),
            Err(e) => {
                error!("failed to encode response: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({"error": "response_write_error"}),
                )
            }
        },
        Err(e) => (e.status(), json!({ "error": e.to_string() })),
    };

    let mut response = (status, Json(body)).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    response
}

pub enum AppError {
    BadRequest(String),
    NotFound(String),
    Forbidden(String),
    Internal(String),
    Unavailable(String),
}

impl From<exchange::Error> for AppError {
    fn from(e: exchange::Error) -> Self {
        match e {
            exchange::Error::NotFound(_) => AppError::NotFound(e.to_string()),
            exchange::Error::Decode(_) | exchange::Error::Validation(_) => {
                AppError::BadRequest(e.to_string())
            }
            exchange::Error::Signing(_) | exchange::Error::Storage(_) => {
                error!("{e}");
                AppError::Internal(e.to_string())
            }
        }
    }
}

impl From<BridgeError> for AppError {
    fn from(e: BridgeError) -> Self {
        let message = e.to_string();
        match e.status() {
            StatusCode::BAD_REQUEST => AppError::BadRequest(message),
            StatusCode::FORBIDDEN => AppError::Forbidden(message),
            StatusCode::NOT_FOUND => AppError::NotFound(message),
            _ => AppError::Internal(message),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
