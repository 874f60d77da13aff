//! Linear fee and minimum-output calculations.
//!
//! ```text
//! fee        = min_fee_a * size + min_fee_b + ceil(price_mem * mem) + ceil(price_step * steps)
//! min_output = max(min_output_lovelace, (160 + output_size) * coins_per_utxo_byte)
//! collateral = ceil(fee * collateral_percent / 100)
//! ```

use crate::config::ProtocolConfig;
use crate::ledger::transaction::{to_bytes, ExUnits, TxOutput};
use crate::ledger::{LedgerError, LedgerResult};

/// Per-entry overhead the ledger charges on top of the serialized output.
const UTXO_ENTRY_OVERHEAD: u64 = 160;

/// Fee for a transaction of `size` bytes running scripts within `ex_units`.
pub fn estimate_fee(
    protocol: &ProtocolConfig,
    size: usize,
    ex_units: Option<ExUnits>,
) -> LedgerResult<u64> {
    let size_fee = protocol
        .min_fee_a
        .checked_mul(size as u64)
        .and_then(|f| f.checked_add(protocol.min_fee_b))
        .ok_or(LedgerError::Overflow("size fee"))?;

    let script_fee = match ex_units {
        Some(units) => {
            let mem = (protocol.price_mem * units.mem as f64).ceil();
            let steps = (protocol.price_step * units.steps as f64).ceil();
            let total = mem + steps;
            if !total.is_finite() || total < 0.0 || total > u64::MAX as f64 {
                return Err(LedgerError::Overflow("script fee"));
            }
            mem as u64 + steps as u64
        }
        None => 0,
    };

    size_fee
        .checked_add(script_fee)
        .ok_or(LedgerError::Overflow("fee"))
}

/// Minimum lovelace `output` must hold, measured with its coin at the widest encoding.
pub fn min_output(protocol: &ProtocolConfig, output: &TxOutput) -> LedgerResult<u64> {
    let mut widest = output.clone();
    widest.value.coin = u64::MAX;
    let size = to_bytes(&widest.to_cbor())?.len() as u64;

    let by_size = UTXO_ENTRY_OVERHEAD
        .checked_add(size)
        .and_then(|s| s.checked_mul(protocol.coins_per_utxo_byte))
        .ok_or(LedgerError::Overflow("minimum output"))?;

    Ok(by_size.max(protocol.min_output_lovelace))
}

/// Collateral the ledger demands of a script transaction paying `fee`.
pub fn collateral_required(protocol: &ProtocolConfig, fee: u64) -> LedgerResult<u64> {
    fee.checked_mul(protocol.collateral_percent)
        .map(|scaled| scaled.div_ceil(100))
        .ok_or(LedgerError::Overflow("collateral"))
}
