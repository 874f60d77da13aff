//! Funding input selection.
//!
//! Selection is a pure function of the input *set*: candidates are ordered by
//! [`OutputRef`] before choosing, so provider ordering never changes the result. This
//! keeps the minting policy (which is parameterized by the chosen input) stable across
//! retries against an unchanged snapshot.

use crate::ledger::{LedgerError, LedgerResult, OutputRef, SpendableInput};

/// The chosen input and whether the preferred policy could be honoured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub input: SpendableInput,
    /// True when no pure input above the threshold existed.
    pub fallback: bool,
}

/// Picks one funding input.
#[derive(Debug, Clone, Copy)]
pub struct UtxoSelector {
    min_pure_lovelace: u64,
}

impl UtxoSelector {
    pub fn new(min_pure_lovelace: u64) -> Self {
        Self { min_pure_lovelace }
    }

    /// Prefer the canonical-first pure input holding more than the threshold; otherwise
    /// fall back to the canonical-first input of all.
    pub fn select(&self, inputs: &[SpendableInput]) -> LedgerResult<Selection> {
        self.select_excluding(inputs, &[])
    }

    /// Like [`select`](Self::select), ignoring inputs already committed elsewhere.
    pub fn select_excluding(
        &self,
        inputs: &[SpendableInput],
        excluded: &[OutputRef],
    ) -> LedgerResult<Selection> {
        let eligible = || inputs.iter().filter(|i| !excluded.contains(&i.out_ref));

        let preferred = eligible()
            .filter(|i| i.value.is_pure() && i.value.coin > self.min_pure_lovelace)
            .min_by_key(|i| i.out_ref);

        if let Some(input) = preferred {
            return Ok(Selection {
                input: input.clone(),
                fallback: false,
            });
        }

        let first = eligible()
            .min_by_key(|i| i.out_ref)
            .ok_or(LedgerError::NoFundsAvailable)?;

        tracing::warn!(
            out_ref = %first.out_ref,
            coin = first.value.coin,
            pure = first.value.is_pure(),
            threshold = self.min_pure_lovelace,
            "No pure input above threshold, falling back to first available input"
        );

        Ok(Selection {
            input: first.clone(),
            fallback: true,
        })
    }
}
