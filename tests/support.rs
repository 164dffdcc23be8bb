#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, Response},
    Router,
};
use serde_json::Value;
use waci_adapter::{
    config::Config,
    core::{
        message::InboundMessage,
        store::{CorrelationStore, MemoryStore},
    },
    orchestrator::{self, ActionSender, Orchestrator},
    server::{create_router, AppState},
    signer::{DocumentSigner, Ed25519Signer},
};

pub const EXTERNAL_URL: &str = "https://adapter.example.com";

pub fn credential_manifest() -> Value {
    serde_json::from_str(include_str!("fixtures/credential_manifest.json")).unwrap()
}

pub fn credential_response() -> Value {
    serde_json::from_str(include_str!("fixtures/credential_response.json")).unwrap()
}

pub fn credential() -> Value {
    serde_json::from_str(include_str!("fixtures/credential.json")).unwrap()
}

pub fn presentation_definition() -> Value {
    serde_json::from_str(include_str!("fixtures/presentation_definition.json")).unwrap()
}

pub fn config() -> Config {
    Config::new(EXTERNAL_URL.parse().unwrap())
}

pub fn signer() -> DocumentSigner {
    DocumentSigner::new(Arc::new(Ed25519Signer::generate().unwrap()))
}

pub fn message(value: Value) -> InboundMessage {
    serde_json::from_value(value).unwrap()
}

/// A running orchestrator sharing `store`, and the sender feeding it.
pub fn orchestrator(store: Arc<MemoryStore>, signer: DocumentSigner) -> ActionSender {
    let (actions, rx) = orchestrator::channel(8);
    tokio::spawn(Orchestrator::from_config(&config(), store, signer).run(rx));
    actions
}

/// The router over `store`, with an orchestrator answering its loopback actions.
pub fn app(store: Arc<dyn CorrelationStore>, signer: DocumentSigner) -> Router {
    let config = config();
    let (actions, rx) = orchestrator::channel(8);
    tokio::spawn(Orchestrator::from_config(&config, store.clone(), signer.clone()).run(rx));
    create_router(Arc::new(AppState::new(&config, store, signer, actions)))
}

pub fn form_request(method: &str, uri: &str, fields: &[(&str, &str)]) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(serde_urlencoded::to_string(fields).unwrap()))
        .unwrap()
}

pub fn location(response: &Response<Body>) -> String {
    response.headers()[header::LOCATION]
        .to_str()
        .unwrap()
        .to_owned()
}

pub async fn json_body(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
