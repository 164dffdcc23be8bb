pub mod credential;
pub mod credential_manifest;
pub mod key;
pub mod message;
pub mod presentation_definition;
pub mod record;
pub mod store;
