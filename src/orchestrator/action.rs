use serde::Serialize;
use tokio::sync::{mpsc, oneshot};

use crate::core::message::{Continuation, InboundMessage};

/// The decision taken on an inbound action.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Disposition {
    Continue { continuation: Continuation },
    Stop { reason: String },
}

/// An inbound protocol message waiting for a decision.
///
/// Dropping an action without deciding fails the submitter with [`ActionError::Dropped`].
#[derive(Debug)]
pub struct Action {
    pub message: InboundMessage,
    control: oneshot::Sender<Disposition>,
}

impl Action {
    pub fn new(message: InboundMessage) -> (Self, oneshot::Receiver<Disposition>) {
        let (control, decision) = oneshot::channel();
        (Self { message, control }, decision)
    }

    /// Let the protocol proceed with `continuation`.
    pub fn proceed(self, continuation: Continuation) {
        self.decide(Disposition::Continue { continuation })
    }

    /// Abort the protocol for this message.
    pub fn stop(self, reason: impl Into<String>) {
        self.decide(Disposition::Stop {
            reason: reason.into(),
        })
    }

    fn decide(self, disposition: Disposition) {
        // The submitter may have given up waiting.
        let _ = self.control.send(disposition);
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("the action stream is closed")]
    Closed,
    #[error("the action was dropped without a decision")]
    Dropped,
}

/// The producing side of the action stream, handed to transports.
#[derive(Debug, Clone)]
pub struct ActionSender {
    tx: mpsc::Sender<Action>,
}

impl ActionSender {
    /// Queue `message` and wait for the orchestrator's decision.
    pub async fn submit(&self, message: InboundMessage) -> Result<Disposition, ActionError> {
        let (action, decision) = Action::new(message);
        self.tx
            .send(action)
            .await
            .map_err(|_| ActionError::Closed)?;
        decision.await.map_err(|_| ActionError::Dropped)
    }
}

/// A bounded action stream with room for `capacity` pending actions.
pub fn channel(capacity: usize) -> (ActionSender, mpsc::Receiver<Action>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (ActionSender { tx }, rx)
}
