//! An issuer and verifier adapter for [WACI] credential exchanges over DIDComm.
//!
//! [WACI]: <https://identity.foundation/waci-didcomm/>
//!
//! # Overview
//!
//! A browser form starts an interaction: the adapter stores the documents of the exchange under
//! a fresh invitation id and redirects the holder to their wallet with an out-of-band invitation.
//! The wallet then drives the exchange over DIDComm. Every inbound protocol message reaches the
//! [`Orchestrator`](orchestrator::Orchestrator) as an [`Action`](orchestrator::Action), which
//! answers with the next protocol message or stops the thread.
//!
//! ```ignore
//! use waci_adapter::{
//!     config::Config,
//!     core::store::MemoryStore,
//!     orchestrator::{self, Orchestrator},
//!     signer::{DocumentSigner, Ed25519Signer},
//! };
//!
//! let config = Config::new("https://adapter.example.com".parse()?);
//! let store = Arc::new(MemoryStore::default());
//! let signer = DocumentSigner::new(Arc::new(Ed25519Signer::generate()?));
//!
//! let (actions, rx) = orchestrator::channel(config.action_queue_capacity);
//! tokio::spawn(Orchestrator::from_config(&config, store.clone(), signer).run(rx));
//!
//! // A DIDComm transport hands each inbound message over and relays the decision.
//! let disposition = actions.submit(message).await?;
//! ```
//!
//! The [`bridge`] module additionally serves credentials to wallets speaking an
//! authorization-code flow, and [`server`] exposes everything over HTTP.

pub mod bridge;
pub mod config;
pub mod core;
pub mod exchange;
pub mod orchestrator;
pub mod server;
pub mod signer;
