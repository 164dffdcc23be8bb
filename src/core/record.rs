use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use super::{
    key::CorrelationKey,
    store::{get_json, CorrelationStore, StoreError},
};

/// The documents backing one WACI interaction.
///
/// Created when the invitation is issued and stored under the invitation id. When the
/// holder's wallet picks the invitation up, the record is copied under the protocol thread id
/// so the later phases of the interaction can find it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presentation_definition: Option<Json>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_manifest: Option<Json>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_response: Option<Json>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<Json>,
}

impl ExchangeRecord {
    /// Load the record stored under `id` in the issuance-data namespace.
    pub async fn load(store: &dyn CorrelationStore, id: &str) -> Result<Self, StoreError> {
        get_json(store, &CorrelationKey::issuance_data(id)).await
    }

    /// Copy the record stored under `from` to `to`, leaving the original in place.
    ///
    /// The stored bytes are copied verbatim so no field can be lost on the way. Returns the
    /// decoded record.
    pub async fn rekey(
        store: &dyn CorrelationStore,
        from: &str,
        to: &str,
    ) -> Result<Self, StoreError> {
        let from = CorrelationKey::issuance_data(from).as_storage_key();
        let bytes = store.get(&from).await?;
        let record = serde_json::from_slice(&bytes)
            .map_err(|source| StoreError::Decode { key: from, source })?;
        store
            .put(&CorrelationKey::issuance_data(to).as_storage_key(), bytes)
            .await?;
        Ok(record)
    }
}
