use std::sync::Arc;

use serde_json::Value as Json;

use crate::{
    bridge::AuthorizationBridge,
    config::Config,
    core::store::CorrelationStore,
    exchange::{CredentialIdTemplate, Initiator},
    orchestrator::ActionSender,
    signer::DocumentSigner,
};

/// Shared state of the HTTP surface.
#[derive(Debug)]
pub struct AppState {
    pub store: Arc<dyn CorrelationStore>,
    pub initiator: Initiator,
    pub bridge: AuthorizationBridge,
    pub actions: ActionSender,
}

impl AppState {
    pub fn new(
        config: &Config,
        store: Arc<dyn CorrelationStore>,
        signer: DocumentSigner,
        actions: ActionSender,
    ) -> Self {
        let mut initiator = Initiator::new(store.clone())
            .with_services(
                config
                    .invitation_service
                    .iter()
                    .map(|service| Json::String(service.clone()))
                    .collect(),
            )
            .with_did(signer.did());
        if let Some(label) = &config.invitation_label {
            initiator = initiator.with_label(label.clone());
        }

        Self {
            bridge: AuthorizationBridge::new(store.clone(), signer, config.external_url.clone())
                .with_credential_id_template(CredentialIdTemplate::new(
                    config.credential_id_placeholder.clone(),
                )),
            initiator,
            store,
            actions,
        }
    }
}
