//! Assembly of the artifacts exchanged with the holder and the invitations that start an
//! exchange.

pub mod assembler;
pub mod error;
pub mod invitation;

pub use assembler::{Assembler, CredentialIdTemplate};
pub use error::Error;
pub use invitation::{Initiator, Invitation, InvitationV2, OutOfBand};
