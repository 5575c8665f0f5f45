//! Versioned JSON document format for persisted store contents.
//!
//! ```text
//! {
//!   "version": 1,
//!   "models": [ ... ],
//!   "connections": [ ... ],
//!   "next_connection_id": 3
//! }
//! ```

use serde::{Deserialize, Serialize};

use super::{Result, StoreError, StoreState};
use crate::providers::ProviderConnection;
use crate::types::ModelRecord;

/// Version written by [`encode`] and the only one [`decode`] accepts.
pub const VERSION: u32 = 1;

#[derive(Serialize)]
struct DocumentRef<'a> {
    version: u32,
    models: Vec<&'a ModelRecord>,
    connections: Vec<&'a ProviderConnection>,
    next_connection_id: u64,
}

#[derive(Deserialize)]
struct Header {
    version: u32,
}

#[derive(Deserialize)]
struct Document {
    #[serde(default)]
    models: Vec<ModelRecord>,
    #[serde(default)]
    connections: Vec<ProviderConnection>,
    #[serde(default)]
    next_connection_id: u64,
}

/// Serialize store contents as a pretty-printed document.
pub fn encode(state: &StoreState) -> Result<Vec<u8>> {
    let doc = DocumentRef {
        version: VERSION,
        models: state.models.values().collect(),
        connections: state.connections.values().collect(),
        next_connection_id: state.next_connection_id,
    };
    Ok(serde_json::to_vec_pretty(&doc)?)
}

/// Parse a document produced by [`encode`].
///
/// The connection counter is raised past the highest stored id so a
/// hand-edited document cannot cause id reuse.
pub fn decode(bytes: &[u8]) -> Result<StoreState> {
    let header: Header = serde_json::from_slice(bytes)?;
    if header.version != VERSION {
        return Err(StoreError::UnsupportedVersion(header.version));
    }

    let doc: Document = serde_json::from_slice(bytes)?;
    let highest = doc.connections.iter().map(|c| c.id.0).max().unwrap_or(0);

    let mut state = StoreState {
        next_connection_id: doc.next_connection_id.max(highest + 1),
        ..StoreState::default()
    };
    for model in doc.models {
        state.models.insert(model.id.clone(), model);
    }
    for connection in doc.connections {
        state.connections.insert(connection.id, connection);
    }
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{ConnectionForm, ConnectionId, ProviderKind};
    use crate::types::ModelForm;

    fn sample_state() -> StoreState {
        let mut state = StoreState::default();
        let model = ModelRecord::from_form(ModelForm::new("m1", "One").base("llama3"), "u1", 5);
        state.models.insert(model.id.clone(), model);

        let form = ConnectionForm::new(ProviderKind::OpenAi, "oai", "https://api.openai.com/v1")
            .api_key("sk-test");
        let conn = ProviderConnection::from_form(ConnectionId(4), form, 5).unwrap();
        state.connections.insert(conn.id, conn);
        state.next_connection_id = 5;
        state
    }

    #[test]
    fn encoded_document_carries_version() {
        let bytes = encode(&sample_state()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(value["version"], 1);
        assert_eq!(value["connections"][0]["type"], "openai");
        assert_eq!(value["next_connection_id"], 5);
    }

    #[test]
    fn decode_restores_encoded_state() {
        let state = sample_state();
        let decoded = decode(&encode(&state).unwrap()).unwrap();
        assert_eq!(decoded, state);
    }

    #[test]
    fn decode_rejects_unknown_version() {
        let err = decode(br#"{"version": 2, "models": []}"#).unwrap_err();
        assert!(matches!(err, StoreError::UnsupportedVersion(2)));
    }

    #[test]
    fn decode_raises_stale_connection_counter() {
        let mut state = sample_state();
        state.next_connection_id = 1;
        let decoded = decode(&encode(&state).unwrap()).unwrap();
        assert_eq!(decoded.next_connection_id, 5);
    }

    #[test]
    fn decode_rejects_malformed_json() {
        let err = decode(b"not json").unwrap_err();
        assert!(matches!(err, StoreError::Serialization(_)));
    }
}
