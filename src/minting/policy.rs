//! Batch-unique minting policies.
//!
//! The compiled script template is parameterized with the funding input reference and
//! the token name. Because the same transaction spends that input, the ledger's own
//! double-spend rule guarantees no second mint can ever share the policy.
//!
//! # Encoding
//! ```text
//! params   = [ Constr0[ Constr0[tx_hash], output_index ], token_name ]   (Plutus data)
//! applied  = UPLC application of each param to the template program, CBOR-wrapped once
//! policyId = blake2b-224(0x02 || applied)
//! unit     = hex(policyId) || hex(token_name)
//! ```
//!
//! Templates are accepted wrapped once (as `plutus.json` compiled code) or twice (as
//! `cborHex` in a text envelope) and kept wrapped once.

use ciborium::value::Value as Cbor;

use crate::ledger::hash::blake2b_224;
use crate::ledger::transaction::{plutus_constr, to_bytes, uint};
use crate::ledger::{
    AssetName, AssetUnit, LedgerError, LedgerResult, OutputRef, PolicyId, SpendableInput,
};

/// Language tag prefixed to Plutus V2 scripts before hashing.
pub const PLUTUS_V2_TAG: u8 = 0x02;

/// A compiled, unparameterized minting script.
#[derive(Clone, PartialEq, Eq)]
pub struct ScriptTemplate(Vec<u8>);

impl ScriptTemplate {
    pub fn from_bytes(bytes: Vec<u8>) -> LedgerResult<Self> {
        if bytes.is_empty() {
            return Err(LedgerError::InvalidScript("script template is empty".into()));
        }
        let inner = unwrap_bytes(&bytes)
            .ok_or_else(|| LedgerError::InvalidScript("template is not a CBOR byte string".into()))?;
        match unwrap_bytes(&inner) {
            Some(_) => Ok(Self(inner)),
            None => Ok(Self(bytes)),
        }
    }

    pub fn from_hex(s: &str) -> LedgerResult<Self> {
        let bytes = hex::decode(s.trim())
            .map_err(|e| LedgerError::InvalidScript(format!("template hex: {}", e)))?;
        Self::from_bytes(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for ScriptTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ScriptTemplate({} bytes)", self.0.len())
    }
}

/// Contents of `bytes` when it is exactly one CBOR byte string.
fn unwrap_bytes(bytes: &[u8]) -> Option<Vec<u8>> {
    let mut reader = bytes;
    match ciborium::de::from_reader::<Cbor, _>(&mut reader) {
        Ok(Cbor::Bytes(inner)) if reader.is_empty() => Some(inner),
        _ => None,
    }
}

/// `OutputReference` as Plutus data.
fn output_reference(out_ref: &OutputRef) -> Cbor {
    plutus_constr(vec![
        plutus_constr(vec![Cbor::Bytes(out_ref.tx_hash.as_bytes().to_vec())]),
        uint(u64::from(out_ref.index)),
    ])
}

/// A template bound to one input and one token name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundPolicy {
    /// Parameterized script, as attached to the witness set.
    pub script: Vec<u8>,
    pub policy_id: PolicyId,
    pub unit: AssetUnit,
    /// The input the policy is bound to; the mint must spend it.
    pub out_ref: OutputRef,
}

/// Parameterize `template` with `input` and `token_name`.
pub fn bind(
    input: &SpendableInput,
    token_name: &[u8],
    template: &ScriptTemplate,
) -> LedgerResult<BoundPolicy> {
    if token_name.is_empty() {
        return Err(LedgerError::InvalidTokenName("token name must not be empty".into()));
    }
    let asset_name = AssetName::new(token_name).map_err(LedgerError::InvalidTokenName)?;

    let params = to_bytes(&Cbor::Array(vec![
        output_reference(&input.out_ref),
        Cbor::Bytes(token_name.to_vec()),
    ]))?;
    let script = uplc::tx::apply_params_to_script(&params, template.as_bytes())
        .map_err(|e| LedgerError::InvalidScript(format!("applying parameters: {}", e)))?;

    let policy_id = PolicyId(blake2b_224(&[&[PLUTUS_V2_TAG], &script]));

    tracing::debug!(
        policy_id = %policy_id,
        out_ref = %input.out_ref,
        token = %asset_name.display_name(),
        "Bound minting policy"
    );

    Ok(BoundPolicy {
        script,
        policy_id,
        unit: AssetUnit::new(policy_id, asset_name),
        out_ref: input.out_ref,
    })
}
