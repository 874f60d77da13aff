//! Transaction metadata: JSON to metadatum conversion, CIP-25 envelopes and status records.
//!
//! Metadatum text is limited to 64 bytes per string; longer strings become arrays of
//! chunks split on character boundaries. Map keys must fit in one chunk.

use ciborium::value::{Integer, Value as Cbor};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::ledger::transaction::to_bytes;
use crate::ledger::{AssetName, LedgerError, LedgerResult, PolicyId};

/// Maximum bytes in one metadatum text or byte string.
pub const MAX_METADATUM_TEXT: usize = 64;

/// Convert a JSON value to a metadatum.
///
/// Objects become maps, integers become integers. Floats and booleans are carried as
/// their text form and `null` as the empty string.
pub fn json_to_metadatum(value: &serde_json::Value) -> LedgerResult<Cbor> {
    use serde_json::Value as Json;

    Ok(match value {
        Json::Null => Cbor::Text(String::new()),
        Json::Bool(b) => Cbor::Text(b.to_string()),
        Json::Number(n) => {
            if let Some(i) = n.as_i64() {
                Cbor::Integer(Integer::from(i))
            } else if let Some(u) = n.as_u64() {
                Cbor::Integer(Integer::from(u))
            } else {
                Cbor::Text(n.to_string())
            }
        }
        Json::String(s) => text(s),
        Json::Array(items) => Cbor::Array(
            items
                .iter()
                .map(json_to_metadatum)
                .collect::<LedgerResult<Vec<_>>>()?,
        ),
        Json::Object(map) => {
            let mut entries = Vec::with_capacity(map.len());
            for (key, item) in map {
                entries.push((key_text(key)?, json_to_metadatum(item)?));
            }
            Cbor::Map(entries)
        }
    })
}

/// Text metadatum, chunked when longer than the per-string limit.
pub fn text(s: &str) -> Cbor {
    if s.len() <= MAX_METADATUM_TEXT {
        return Cbor::Text(s.to_string());
    }
    let mut chunks = Vec::new();
    let mut current = String::new();
    for ch in s.chars() {
        if current.len() + ch.len_utf8() > MAX_METADATUM_TEXT {
            chunks.push(Cbor::Text(std::mem::take(&mut current)));
        }
        current.push(ch);
    }
    if !current.is_empty() {
        chunks.push(Cbor::Text(current));
    }
    Cbor::Array(chunks)
}

fn key_text(key: &str) -> LedgerResult<Cbor> {
    if key.len() > MAX_METADATUM_TEXT {
        return Err(LedgerError::InvalidMetadata(format!(
            "key '{}…' exceeds {} bytes",
            key.chars().take(16).collect::<String>(),
            MAX_METADATUM_TEXT
        )));
    }
    Ok(Cbor::Text(key.to_string()))
}

/// CIP-25 envelope: `{ policy_id_hex: { asset_name: payload } }`.
pub fn cip25_envelope(
    policy_id: &PolicyId,
    asset_name: &AssetName,
    payload: &serde_json::Value,
) -> LedgerResult<Cbor> {
    if !payload.is_object() {
        return Err(LedgerError::InvalidMetadata("mint metadata must be a JSON object".into()));
    }
    let asset_key = match std::str::from_utf8(asset_name.as_bytes()) {
        Ok(name) => Cbor::Text(name.to_string()),
        Err(_) => Cbor::Text(asset_name.to_hex()),
    };
    Ok(Cbor::Map(vec![(
        Cbor::Text(policy_id.to_hex()),
        Cbor::Map(vec![(asset_key, json_to_metadatum(payload)?)]),
    )]))
}

/// Status update record carried under the status label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRecord {
    pub status: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    /// RFC 3339 timestamp; filled in at build time when absent.
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl StatusRecord {
    pub fn to_metadatum(&self) -> Cbor {
        let mut entries = vec![(Cbor::Text("status".into()), text(&self.status))];
        for (key, value) in [
            ("description", &self.description),
            ("note", &self.note),
            ("timestamp", &self.timestamp),
        ] {
            if let Some(v) = value {
                entries.push((Cbor::Text(key.into()), text(v)));
            }
        }
        Cbor::Map(entries)
    }
}

/// Encode labelled metadata and enforce the size ceiling. Returns the encoded size.
pub fn check_size(metadata: &BTreeMap<u64, Cbor>, max: usize) -> LedgerResult<usize> {
    let map = Cbor::Map(
        metadata
            .iter()
            .map(|(label, datum)| (Cbor::Integer(Integer::from(*label)), datum.clone()))
            .collect(),
    );
    let size = to_bytes(&map)?.len();
    if size > max {
        return Err(LedgerError::MetadataTooLarge { size, max });
    }
    Ok(size)
}
