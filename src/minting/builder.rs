//! Mint and status-transfer transaction assembly.
//!
//! # Balancing
//! Fees are computed in a single pass over an upper-bound rendition of the final
//! transaction: the fee field holds [`FEE_PLACEHOLDER`], the change output holds every
//! available lovelace, and the witness set holds a zeroed key witness. The real values
//! can only encode shorter, so the computed fee always covers the final size.
//!
//! # Collateral
//! A mint pledges its funding input as collateral. When that input also carries other
//! tokens, the transaction returns them (and the lovelace above the required collateral)
//! through a collateral return output, and states the total collateral.

use ciborium::value::Value as Cbor;
use std::collections::BTreeMap;

use crate::config::{MintingConfig, ProtocolConfig};
use crate::ledger::transaction::{
    CostModel, ExUnits, ScriptWitness, TxOutput, UnsignedTransaction, VKeyWitness,
};
use crate::ledger::{Address, AssetUnit, LedgerError, LedgerResult, SpendableInput, Value};
use crate::minting::fees::{collateral_required, estimate_fee, min_output};
use crate::minting::metadata::{check_size, cip25_envelope};
use crate::minting::policy::BoundPolicy;
use crate::minting::selector::UtxoSelector;

/// Widest fee the ledger could plausibly charge; encodes in five bytes.
const FEE_PLACEHOLDER: u64 = u32::MAX as u64;

/// Builds unsigned mint and status-transfer transactions.
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    protocol: ProtocolConfig,
    mint_label: u64,
    status_label: u64,
    ex_units: ExUnits,
    selector: UtxoSelector,
}

impl TransactionBuilder {
    pub fn new(protocol: ProtocolConfig, minting: &MintingConfig) -> Self {
        Self {
            protocol,
            mint_label: minting.mint_label,
            status_label: minting.status_label,
            ex_units: ExUnits {
                mem: minting.redeemer_mem,
                steps: minting.redeemer_steps,
            },
            selector: UtxoSelector::new(minting.min_pure_lovelace),
        }
    }

    /// Mint one `policy.unit`, spending exactly `selected` and returning the rest to
    /// `change_address`.
    pub fn build_mint(
        &self,
        selected: &SpendableInput,
        policy: &BoundPolicy,
        payload: &serde_json::Value,
        change_address: &Address,
        cost_model: &CostModel,
    ) -> LedgerResult<UnsignedTransaction> {
        if selected.out_ref != policy.out_ref {
            return Err(LedgerError::InvalidScript(format!(
                "policy is bound to {}, not {}",
                policy.out_ref, selected.out_ref
            )));
        }
        let signer = change_address.payment_key_hash().ok_or_else(|| {
            LedgerError::InvalidAddress("change address has no payment key credential".into())
        })?;

        let mut metadata = BTreeMap::new();
        metadata.insert(
            self.mint_label,
            cip25_envelope(&policy.policy_id, &policy.unit.asset_name, payload)?,
        );
        check_size(&metadata, self.protocol.max_metadata_bytes)?;

        let mut change = selected.value.clone();
        change.add_asset(policy.unit.clone(), 1);

        let mut tx = UnsignedTransaction::new(
            vec![selected.out_ref],
            vec![TxOutput::new(change_address.clone(), change)],
        );
        tx.mint.insert(policy.unit.clone(), 1);
        tx.metadata = metadata;
        tx.collateral = vec![selected.out_ref];
        tx.required_signers = vec![signer];
        tx.script = Some(ScriptWitness {
            script: policy.script.clone(),
            ex_units: self.ex_units,
            language_views: cost_model.language_views()?,
        });

        let returns_collateral = !selected.value.is_pure();
        if returns_collateral {
            // widest rendition until the fee is known
            tx.collateral_return = Some(TxOutput::new(change_address.clone(), selected.value.clone()));
            tx.total_collateral = Some(FEE_PLACEHOLDER);
        }

        let mut tx = self.balance(tx, 0, selected.value.coin, 0)?;
        if returns_collateral {
            self.settle_collateral(&mut tx, selected, change_address)?;
        }

        tracing::debug!(
            unit = %policy.unit,
            out_ref = %selected.out_ref,
            fee = tx.fee,
            total_collateral = ?tx.total_collateral,
            "Built mint transaction"
        );
        Ok(tx)
    }

    /// Size the collateral return of a balanced transaction whose collateral holds tokens.
    fn settle_collateral(
        &self,
        tx: &mut UnsignedTransaction,
        collateral: &SpendableInput,
        return_address: &Address,
    ) -> LedgerResult<()> {
        let total = collateral_required(&self.protocol, tx.fee)?;
        let available = collateral.value.coin;

        let mut returned = TxOutput::new(return_address.clone(), collateral.value.clone());
        let floor = min_output(&self.protocol, &returned)?;
        let required = total
            .checked_add(floor)
            .ok_or(LedgerError::Overflow("required collateral"))?;
        if available < required {
            return Err(LedgerError::InsufficientFunds { available, required });
        }
        returned.value.coin = available - total;

        tx.collateral_return = Some(returned);
        tx.total_collateral = Some(total);
        Ok(())
    }

    /// Move one `unit` to `recipient`, recording `payload` under the status label.
    ///
    /// Spends the canonical-first input carrying `unit`, plus one funding input when
    /// that input alone cannot pay for the transaction.
    pub fn build_status_transfer(
        &self,
        unit: &AssetUnit,
        recipient: &Address,
        payload: Cbor,
        inputs: &[SpendableInput],
        change_address: &Address,
    ) -> LedgerResult<UnsignedTransaction> {
        let asset_input = inputs
            .iter()
            .filter(|i| i.value.quantity_of(unit) > 0)
            .min_by_key(|i| i.out_ref)
            .ok_or_else(|| LedgerError::AssetNotHeld(unit.to_string()))?;

        let mut metadata = BTreeMap::new();
        metadata.insert(self.status_label, payload);
        check_size(&metadata, self.protocol.max_metadata_bytes)?;

        match self.assemble_transfer(unit, recipient, &metadata, &[asset_input], change_address) {
            Err(LedgerError::InsufficientFunds { available, required }) => {
                let funding = match self.selector.select_excluding(inputs, &[asset_input.out_ref]) {
                    Ok(selection) => selection.input,
                    Err(LedgerError::NoFundsAvailable) => {
                        return Err(LedgerError::InsufficientFunds { available, required })
                    }
                    Err(e) => return Err(e),
                };
                tracing::debug!(
                    unit = %unit,
                    funding = %funding.out_ref,
                    "Asset input cannot cover the transfer, adding a funding input"
                );
                self.assemble_transfer(
                    unit,
                    recipient,
                    &metadata,
                    &[asset_input, &funding],
                    change_address,
                )
            }
            other => other,
        }
    }

    fn assemble_transfer(
        &self,
        unit: &AssetUnit,
        recipient: &Address,
        metadata: &BTreeMap<u64, Cbor>,
        spent: &[&SpendableInput],
        change_address: &Address,
    ) -> LedgerResult<UnsignedTransaction> {
        let mut total = Value::default();
        for input in spent {
            total.merge(&input.value)?;
        }

        let (outputs, change_index, reserved) = if recipient == change_address {
            (vec![TxOutput::new(change_address.clone(), total.clone())], 0, 0)
        } else {
            let mut remaining = total.clone();
            remaining.take_asset(unit, 1)?;
            let mut delivered = TxOutput::new(
                recipient.clone(),
                Value::lovelace(0).with_asset(unit.clone(), 1),
            );
            delivered.value.coin = min_output(&self.protocol, &delivered)?;
            let reserved = delivered.value.coin;
            (
                vec![delivered, TxOutput::new(change_address.clone(), remaining)],
                1,
                reserved,
            )
        };

        let mut tx = UnsignedTransaction::new(spent.iter().map(|i| i.out_ref).collect(), outputs);
        tx.metadata = metadata.clone();

        let tx = self.balance(tx, change_index, total.coin, reserved)?;

        tracing::debug!(
            unit = %unit,
            recipient = %recipient,
            inputs = tx.inputs.len(),
            fee = tx.fee,
            "Built status transfer"
        );
        Ok(tx)
    }

    /// Set the fee and change coin, checking funds and the size ceiling.
    ///
    /// `available` is the lovelace spent by the inputs; `reserved` is what the
    /// non-change outputs already hold.
    fn balance(
        &self,
        mut tx: UnsignedTransaction,
        change_index: usize,
        available: u64,
        reserved: u64,
    ) -> LedgerResult<UnsignedTransaction> {
        let placeholder = [VKeyWitness::placeholder()];

        tx.fee = FEE_PLACEHOLDER;
        set_change(&mut tx, change_index, available)?;
        let size = tx.encode_with(&placeholder)?.len();
        let fee = estimate_fee(
            &self.protocol,
            size,
            tx.script.as_ref().map(|s| s.ex_units),
        )?;

        let change_floor = min_output(&self.protocol, &tx.outputs[change_index])?;
        let required = reserved
            .checked_add(change_floor)
            .and_then(|r| r.checked_add(fee))
            .ok_or(LedgerError::Overflow("required lovelace"))?;
        if available < required {
            return Err(LedgerError::InsufficientFunds { available, required });
        }

        tx.fee = fee;
        set_change(&mut tx, change_index, available - reserved - fee)?;

        let final_size = tx.encode_with(&placeholder)?.len();
        if final_size > self.protocol.max_tx_size {
            return Err(LedgerError::TransactionTooLarge {
                size: final_size,
                max: self.protocol.max_tx_size,
            });
        }
        Ok(tx)
    }
}

fn set_change(tx: &mut UnsignedTransaction, index: usize, coin: u64) -> LedgerResult<()> {
    let output = tx
        .outputs
        .get_mut(index)
        .ok_or_else(|| LedgerError::Encoding("change output missing".into()))?;
    output.value.coin = coin;
    Ok(())
}
