//! The event loop reacting to inbound protocol actions.
//!
//! Each action is classified into a [Phase] and handled to completion before the next one is
//! received. A failure only stops the action that caused it.

use std::{fmt, sync::Arc};

use anyhow::{bail, Context, Result};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::{
    config::{BaseUrl, Config},
    core::{
        credential::Presentation,
        key::CorrelationKey,
        message::{Continuation, InboundMessage, MessageType, PresentationAck, WebRedirect},
        presentation_definition::PresentationDefinition,
        record::ExchangeRecord,
        store::{put_json, CorrelationStore},
    },
    exchange::{Assembler, CredentialIdTemplate},
    signer::DocumentSigner,
};

pub mod action;

pub use action::{channel, Action, ActionError, ActionSender, Disposition};

/// The step of a WACI interaction an inbound message belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Connection,
    PresentationPropose,
    PresentationSubmit,
    CredentialPropose,
    CredentialRequest,
    Unsupported,
}

impl Phase {
    pub fn of(message_type: &MessageType) -> Self {
        match message_type {
            MessageType::DidExchangeRequest => Phase::Connection,
            MessageType::ProposePresentation => Phase::PresentationPropose,
            MessageType::Presentation => Phase::PresentationSubmit,
            MessageType::ProposeCredential => Phase::CredentialPropose,
            MessageType::RequestCredential => Phase::CredentialRequest,
            MessageType::Other(_) => Phase::Unsupported,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Connection => "connection",
            Phase::PresentationPropose => "presentation-propose",
            Phase::PresentationSubmit => "presentation-submit",
            Phase::CredentialPropose => "credential-propose",
            Phase::CredentialRequest => "credential-request",
            Phase::Unsupported => "unsupported",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Drives WACI interactions from inbound protocol actions.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    store: Arc<dyn CorrelationStore>,
    assembler: Assembler,
    external_url: BaseUrl,
}

impl Orchestrator {
    pub fn new(store: Arc<dyn CorrelationStore>, assembler: Assembler, external_url: BaseUrl) -> Self {
        Self {
            store,
            assembler,
            external_url,
        }
    }

    /// An orchestrator issuing with the configured credential id placeholder.
    pub fn from_config(
        config: &Config,
        store: Arc<dyn CorrelationStore>,
        signer: DocumentSigner,
    ) -> Self {
        let assembler = Assembler::new(signer).with_credential_id_template(
            CredentialIdTemplate::new(config.credential_id_placeholder.clone()),
        );
        Self::new(store, assembler, config.external_url.clone())
    }

    /// Consume actions until every sender is gone.
    pub async fn run(self, mut actions: mpsc::Receiver<Action>) {
        info!("listening for protocol actions");
        while let Some(action) = actions.recv().await {
            self.handle(action).await;
        }
        info!("action stream closed");
    }

    /// Decide a single action.
    pub async fn handle(&self, action: Action) {
        let message_type = action.message.message_type();
        let phase = Phase::of(&message_type);
        let thread_id = action.message.thread_id().ok().map(ToOwned::to_owned);
        info!(
            %phase,
            thread_id = thread_id.as_deref().unwrap_or("-"),
            "received action message: type={}",
            action.message.type_uri()
        );

        match self.dispatch(phase, &action.message).await {
            Ok(Some(continuation)) => action.proceed(continuation),
            Ok(None) => {
                warn!(%phase, "unsupported message type '{}'", action.message.type_uri());
                let reason = format!(
                    "unsupported message type '{}'",
                    action.message.type_uri()
                );
                action.stop(reason);
            }
            Err(e) => {
                error!(
                    %phase,
                    thread_id = thread_id.as_deref().unwrap_or("-"),
                    "action aborted: {e:#}"
                );
                action.stop(format!("{e:#}"));
            }
        }
    }

    /// Compute the continuation for `message` in `phase`.
    ///
    /// Returns `None` for messages the adapter does not take part in.
    pub async fn dispatch(
        &self,
        phase: Phase,
        message: &InboundMessage,
    ) -> Result<Option<Continuation>> {
        let continuation = match phase {
            Phase::Connection => Continuation::Accept,
            Phase::PresentationPropose => self.propose_presentation(message).await?,
            Phase::PresentationSubmit => self.submit_presentation(message).await?,
            Phase::CredentialPropose => self.propose_credential(message).await?,
            Phase::CredentialRequest => self.request_credential(message).await?,
            Phase::Unsupported => return Ok(None),
        };
        Ok(Some(continuation))
    }

    async fn propose_presentation(&self, message: &InboundMessage) -> Result<Continuation> {
        let thread_id = message.thread_id().context("failed to get thread ID")?;
        let invitation_id = message
            .invitation_id()
            .context("propose-presentation does not reference an invitation")?;

        let record = ExchangeRecord::load(self.store.as_ref(), invitation_id)
            .await
            .with_context(|| format!("no exchange for invitation '{invitation_id}'"))?;
        let Some(definition) = record.presentation_definition.clone() else {
            bail!("invitation '{invitation_id}' has no presentation definition")
        };
        let definition = PresentationDefinition::try_from(definition)
            .context("failed to decode presentation definition")?;

        ExchangeRecord::rekey(self.store.as_ref(), invitation_id, thread_id)
            .await
            .context("failed to save presentation definition")?;

        debug!(
            "requesting presentation for definition '{}'",
            definition.id()
        );
        Ok(Continuation::RequestPresentation(
            self.assembler.build_presentation_request(&definition),
        ))
    }

    async fn submit_presentation(&self, message: &InboundMessage) -> Result<Continuation> {
        let thread_id = message.thread_id().context("failed to get thread ID")?;

        put_json(
            self.store.as_ref(),
            &CorrelationKey::interaction_outcome(thread_id),
            message,
        )
        .await
        .context("failed to save received presentation")?;

        let url = self
            .external_url
            .with_segments(["verifier", "waci-share", thread_id]);
        Ok(Continuation::AcknowledgePresentation(PresentationAck {
            web_redirect: WebRedirect::ok(url),
        }))
    }

    async fn propose_credential(&self, message: &InboundMessage) -> Result<Continuation> {
        let thread_id = message.thread_id().context("failed to get thread ID")?;
        let invitation_id = message
            .invitation_id()
            .context("propose-credential does not reference an invitation")?;

        let record = ExchangeRecord::load(self.store.as_ref(), invitation_id)
            .await
            .context("failed to get WACI issuance data")?;
        let (manifest, response, credential) = issuance_documents(&record)?;

        let response = self
            .assembler
            .build_response_presentation(response, credential, false)
            .await
            .context("failed to prepare response")?;
        let offer = self
            .assembler
            .build_credential_offer(manifest, &response.into_json())
            .context("failed to prepare offer credential message")?;

        ExchangeRecord::rekey(self.store.as_ref(), invitation_id, thread_id)
            .await
            .context("failed to save interaction data")?;

        Ok(Continuation::OfferCredential(offer))
    }

    async fn request_credential(&self, message: &InboundMessage) -> Result<Continuation> {
        let thread_id = message.thread_id().context("failed to get thread ID")?;

        let record = ExchangeRecord::load(self.store.as_ref(), thread_id)
            .await
            .context("failed to get WACI issuance data")?;
        let (_, response, credential) = issuance_documents(&record)?;

        // The id has to be in place before anything is signed.
        let (mut response, mut credential) = (response.clone(), credential.clone());
        if let Some(id) = self
            .assembler
            .credential_id_template()
            .assign_all([&mut response, &mut credential])
        {
            debug!(%thread_id, "issuing credential {id}");
        }

        let response = self
            .assembler
            .build_response_presentation(&response, &credential, true)
            .await
            .context("failed to prepare response")?;
        let response = response.into_json();

        let url = self
            .external_url
            .with_segments(["issuer", "waci-issuance", thread_id]);
        let issuance = self
            .assembler
            .build_credential_issuance(&response, url.as_str())
            .context("failed to prepare issue credential message")?;

        put_json(
            self.store.as_ref(),
            &CorrelationKey::interaction_outcome(thread_id),
            &response,
        )
        .await
        .context("failed to save issued credential")?;

        Ok(Continuation::IssueCredential(issuance))
    }
}

fn issuance_documents(
    record: &ExchangeRecord,
) -> Result<(&serde_json::Value, &serde_json::Value, &serde_json::Value)> {
    let manifest = record
        .credential_manifest
        .as_ref()
        .context("exchange has no credential manifest")?;
    let response = record
        .credential_response
        .as_ref()
        .context("exchange has no credential response")?;
    let credential = record
        .credential
        .as_ref()
        .context("exchange has no credential to issue")?;
    Ok((manifest, response, credential))
}

/// The first verifiable presentation attached to a received `presentation` message.
///
/// Version 2 messages attach under `presentations~attach`, version 3 under `attachments`.
pub fn received_presentation(outcome: &serde_json::Value) -> Option<Presentation> {
    ["presentations~attach", "attachments"]
        .into_iter()
        .filter_map(|field| outcome.get(field)?.as_array())
        .flatten()
        .filter_map(|attachment| attachment.get("data")?.get("json").cloned())
        .find_map(|json| Presentation::try_from(json).ok())
}
