//! Transaction model and its CBOR wire encoding.
//!
//! # Layout
//! ```text
//! transaction = [ body, witness_set, is_valid, auxiliary_data / null ]
//! body        = { 0: inputs, 1: outputs, 2: fee, 7: aux_data_hash, 9: mint,
//!                 11: script_data_hash, 13: collateral, 14: required_signers,
//!                 16: collateral_return, 17: total_collateral }
//! witness_set = { 0: [[vkey, signature]], 5: redeemers, 6: [plutus_v2_script] }
//! ```
//!
//! Map keys are emitted in ascending order and integers in their shortest form, so the
//! same transaction always encodes to the same bytes and therefore the same id.

use ciborium::value::{Integer, Value as Cbor};
use std::collections::BTreeMap;
use std::fmt;

use crate::ledger::address::Address;
use crate::ledger::hash::blake2b_256;
use crate::ledger::types::{AssetUnit, LedgerError, LedgerResult, OutputRef, TxHash, Value};

/// Redeemer tag for minting purposes.
const REDEEMER_TAG_MINT: u64 = 1;

/// CBOR tag for Plutus `Constr 0`.
const PLUTUS_CONSTR_0: u64 = 121;

/// Language id of Plutus V2 in cost model maps.
const PLUTUS_V2_LANGUAGE: u64 = 1;

/// An output paying `value` to `address`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutput {
    pub address: Address,
    pub value: Value,
}

impl TxOutput {
    pub fn new(address: Address, value: Value) -> Self {
        Self { address, value }
    }

    pub fn to_cbor(&self) -> Cbor {
        Cbor::Array(vec![
            Cbor::Bytes(self.address.as_bytes().to_vec()),
            value_to_cbor(&self.value),
        ])
    }
}

/// Execution budget for a script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExUnits {
    pub mem: u64,
    pub steps: u64,
}

/// Plutus minting script attached to a transaction, with one mint redeemer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptWitness {
    /// Serialized (parameterized) script.
    pub script: Vec<u8>,
    pub ex_units: ExUnits,
    /// Pre-encoded language views (cost model) for the script-data hash.
    pub language_views: Vec<u8>,
}

/// Plutus V2 cost model parameters, in the ledger's canonical order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CostModel(Vec<i64>);

impl CostModel {
    pub fn new(parameters: Vec<i64>) -> LedgerResult<Self> {
        if parameters.is_empty() {
            return Err(LedgerError::InvalidScript("cost model is empty".into()));
        }
        Ok(Self(parameters))
    }

    pub fn parameters(&self) -> &[i64] {
        &self.0
    }

    /// Language views for the script-data hash: `{ 1: [parameters] }`.
    pub fn language_views(&self) -> LedgerResult<Vec<u8>> {
        let costs = self.0.iter().map(|c| Cbor::Integer(Integer::from(*c))).collect();
        to_bytes(&Cbor::Map(vec![(uint(PLUTUS_V2_LANGUAGE), Cbor::Array(costs))]))
    }
}

impl ScriptWitness {
    fn redeemers(&self) -> Cbor {
        Cbor::Array(vec![Cbor::Array(vec![
            uint(REDEEMER_TAG_MINT),
            uint(0),
            plutus_constr(Vec::new()),
            Cbor::Array(vec![uint(self.ex_units.mem), uint(self.ex_units.steps)]),
        ])])
    }

    fn script_data_hash(&self) -> LedgerResult<[u8; 32]> {
        let redeemers = to_bytes(&self.redeemers())?;
        Ok(blake2b_256(&[&redeemers, &self.language_views]))
    }
}

/// A verification key and its signature over the transaction id.
#[derive(Clone, PartialEq, Eq)]
pub struct VKeyWitness {
    pub vkey: [u8; 32],
    pub signature: [u8; 64],
}

impl VKeyWitness {
    /// Zeroed witness of the right shape, used for size estimation.
    pub fn placeholder() -> Self {
        Self {
            vkey: [0u8; 32],
            signature: [0u8; 64],
        }
    }
}

impl fmt::Debug for VKeyWitness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VKeyWitness")
            .field("vkey", &hex::encode(self.vkey))
            .finish()
    }
}

/// A fully assembled transaction awaiting its key witness.
#[derive(Debug, Clone, PartialEq)]
pub struct UnsignedTransaction {
    pub inputs: Vec<OutputRef>,
    pub outputs: Vec<TxOutput>,
    pub fee: u64,
    pub mint: BTreeMap<AssetUnit, i64>,
    /// Metadata by label.
    pub metadata: BTreeMap<u64, Cbor>,
    pub collateral: Vec<OutputRef>,
    pub required_signers: Vec<[u8; 28]>,
    /// Returned from collateral if the script fails; set when collateral holds tokens.
    pub collateral_return: Option<TxOutput>,
    pub total_collateral: Option<u64>,
    pub script: Option<ScriptWitness>,
}

impl UnsignedTransaction {
    pub fn new(inputs: Vec<OutputRef>, outputs: Vec<TxOutput>) -> Self {
        Self {
            inputs,
            outputs,
            fee: 0,
            mint: BTreeMap::new(),
            metadata: BTreeMap::new(),
            collateral: Vec::new(),
            required_signers: Vec::new(),
            collateral_return: None,
            total_collateral: None,
            script: None,
        }
    }

    /// Auxiliary data (plain metadata map), if any metadata is attached.
    pub fn auxiliary_data(&self) -> Option<Cbor> {
        if self.metadata.is_empty() {
            return None;
        }
        Some(Cbor::Map(
            self.metadata
                .iter()
                .map(|(label, datum)| (uint(*label), datum.clone()))
                .collect(),
        ))
    }

    pub fn body(&self) -> LedgerResult<Cbor> {
        let mut entries = Vec::new();

        entries.push((uint(0), refs_to_cbor(&self.inputs)));
        entries.push((
            uint(1),
            Cbor::Array(self.outputs.iter().map(TxOutput::to_cbor).collect()),
        ));
        entries.push((uint(2), uint(self.fee)));

        if let Some(aux) = self.auxiliary_data() {
            let aux_hash = blake2b_256(&[&to_bytes(&aux)?]);
            entries.push((uint(7), Cbor::Bytes(aux_hash.to_vec())));
        }

        if !self.mint.is_empty() {
            entries.push((uint(9), mint_to_cbor(&self.mint)));
        }

        if let Some(script) = &self.script {
            entries.push((uint(11), Cbor::Bytes(script.script_data_hash()?.to_vec())));
        }

        if !self.collateral.is_empty() {
            entries.push((uint(13), refs_to_cbor(&self.collateral)));
        }

        if !self.required_signers.is_empty() {
            entries.push((
                uint(14),
                Cbor::Array(
                    self.required_signers
                        .iter()
                        .map(|h| Cbor::Bytes(h.to_vec()))
                        .collect(),
                ),
            ));
        }

        if let Some(output) = &self.collateral_return {
            entries.push((uint(16), output.to_cbor()));
        }
        if let Some(total) = self.total_collateral {
            entries.push((uint(17), uint(total)));
        }

        Ok(Cbor::Map(entries))
    }

    pub fn body_bytes(&self) -> LedgerResult<Vec<u8>> {
        to_bytes(&self.body()?)
    }

    /// Transaction id: blake2b-256 of the serialized body.
    pub fn id(&self) -> LedgerResult<TxHash> {
        Ok(TxHash(blake2b_256(&[&self.body_bytes()?])))
    }

    fn witness_set(&self, vkeys: &[VKeyWitness]) -> Cbor {
        let mut entries = Vec::new();
        if !vkeys.is_empty() {
            entries.push((
                uint(0),
                Cbor::Array(
                    vkeys
                        .iter()
                        .map(|w| {
                            Cbor::Array(vec![
                                Cbor::Bytes(w.vkey.to_vec()),
                                Cbor::Bytes(w.signature.to_vec()),
                            ])
                        })
                        .collect(),
                ),
            ));
        }
        if let Some(script) = &self.script {
            entries.push((uint(5), script.redeemers()));
            entries.push((uint(6), Cbor::Array(vec![Cbor::Bytes(script.script.clone())])));
        }
        Cbor::Map(entries)
    }

    /// Serialize the complete transaction with the given key witnesses.
    pub fn encode_with(&self, vkeys: &[VKeyWitness]) -> LedgerResult<Vec<u8>> {
        let tx = Cbor::Array(vec![
            self.body()?,
            self.witness_set(vkeys),
            Cbor::Bool(true),
            self.auxiliary_data().unwrap_or(Cbor::Null),
        ]);
        to_bytes(&tx)
    }

    /// Attach a key witness produced over `id`.
    pub fn into_signed(self, id: TxHash, witness: VKeyWitness) -> LedgerResult<SignedTransaction> {
        let bytes = self.encode_with(std::slice::from_ref(&witness))?;
        Ok(SignedTransaction { id, bytes, tx: self })
    }
}

/// A transaction ready for submission.
#[derive(Clone)]
pub struct SignedTransaction {
    id: TxHash,
    bytes: Vec<u8>,
    tx: UnsignedTransaction,
}

impl SignedTransaction {
    pub fn id(&self) -> TxHash {
        self.id
    }

    /// Serialized transaction bytes as submitted to the ledger.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    pub fn transaction(&self) -> &UnsignedTransaction {
        &self.tx
    }
}

impl fmt::Debug for SignedTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignedTransaction")
            .field("id", &self.id)
            .field("size", &self.bytes.len())
            .finish()
    }
}

pub(crate) fn uint(n: u64) -> Cbor {
    Cbor::Integer(Integer::from(n))
}

/// Plutus data `Constr 0 fields`.
pub(crate) fn plutus_constr(fields: Vec<Cbor>) -> Cbor {
    Cbor::Tag(PLUTUS_CONSTR_0, Box::new(Cbor::Array(fields)))
}

pub(crate) fn to_bytes(value: &Cbor) -> LedgerResult<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::ser::into_writer(value, &mut buf)
        .map_err(|e| LedgerError::Encoding(e.to_string()))?;
    Ok(buf)
}

fn refs_to_cbor(refs: &[OutputRef]) -> Cbor {
    let mut sorted = refs.to_vec();
    sorted.sort();
    Cbor::Array(
        sorted
            .iter()
            .map(|r| {
                Cbor::Array(vec![
                    Cbor::Bytes(r.tx_hash.as_bytes().to_vec()),
                    uint(u64::from(r.index)),
                ])
            })
            .collect(),
    )
}

/// Encode a value: bare coin, or `[coin, { policy: { name: qty } }]`.
pub(crate) fn value_to_cbor(value: &Value) -> Cbor {
    let nonzero: Vec<(&AssetUnit, u64)> = value
        .assets
        .iter()
        .filter(|(_, q)| **q > 0)
        .map(|(u, q)| (u, *q))
        .collect();
    if nonzero.is_empty() {
        return uint(value.coin);
    }
    let grouped = group_by_policy(nonzero.into_iter().map(|(u, q)| (u, Cbor::Integer(Integer::from(q)))));
    Cbor::Array(vec![uint(value.coin), grouped])
}

fn mint_to_cbor(mint: &BTreeMap<AssetUnit, i64>) -> Cbor {
    group_by_policy(
        mint.iter()
            .map(|(u, q)| (u, Cbor::Integer(Integer::from(*q)))),
    )
}

fn group_by_policy<'a>(entries: impl Iterator<Item = (&'a AssetUnit, Cbor)>) -> Cbor {
    let mut policies: BTreeMap<[u8; 28], Vec<(Cbor, Cbor)>> = BTreeMap::new();
    for (unit, qty) in entries {
        policies
            .entry(unit.policy_id.0)
            .or_default()
            .push((Cbor::Bytes(unit.asset_name.as_bytes().to_vec()), qty));
    }
    Cbor::Map(
        policies
            .into_iter()
            .map(|(policy, assets)| (Cbor::Bytes(policy.to_vec()), Cbor::Map(assets)))
            .collect(),
    )
}
