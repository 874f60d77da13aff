//! Custodial wallet identity and transaction signing.
//!
//! # Security
//! - The seed phrase is supplied per request and never stored
//! - Intermediate seed buffers are wiped once the signing key is derived
//! - The signing key wipes itself on drop
//! - Key material is never logged, serialized or included in errors

use bip39::{Language, Mnemonic};
use ed25519_dalek::{Signer, SigningKey};
use std::fmt;
use zeroize::Zeroize;

use crate::ledger::address::{Address, Network};
use crate::ledger::hash::blake2b_224;
use crate::ledger::transaction::{SignedTransaction, UnsignedTransaction, VKeyWitness};
use crate::ledger::types::{LedgerError, LedgerResult};

/// Signing identity derived from a seed phrase, scoped to one request.
pub struct WalletContext {
    signing_key: SigningKey,
    network: Network,
    address: Address,
}

impl WalletContext {
    /// Derive the signing key and enterprise address from a BIP-39 English mnemonic.
    ///
    /// The first 32 bytes of the BIP-39 seed (empty passphrase) form the Ed25519 secret.
    /// Fails with [`LedgerError::InvalidSeed`] whatever the underlying reason, so the
    /// phrase never leaks through an error message.
    pub fn derive(seed_phrase: &str, network: Network) -> LedgerResult<Self> {
        let mut normalized = seed_phrase
            .split_whitespace()
            .map(str::to_lowercase)
            .collect::<Vec<_>>()
            .join(" ");

        let parsed = Mnemonic::parse_in_normalized(Language::English, &normalized);
        normalized.zeroize();
        let mnemonic = parsed.map_err(|_| LedgerError::InvalidSeed)?;

        let mut seed = mnemonic.to_seed("");
        let mut secret = [0u8; 32];
        secret.copy_from_slice(&seed[..32]);
        seed.zeroize();

        let signing_key = SigningKey::from_bytes(&secret);
        secret.zeroize();

        let vkey = signing_key.verifying_key().to_bytes();
        let address = Address::enterprise(network, blake2b_224(&[&vkey]));

        tracing::debug!(address = %address, network = %network, "Wallet derived");

        Ok(Self {
            signing_key,
            network,
            address,
        })
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// Payment key hash, used as the required signer of script transactions.
    pub fn key_hash(&self) -> [u8; 28] {
        blake2b_224(&[&self.verifying_key_bytes()])
    }

    pub fn verifying_key_bytes(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// Sign the transaction id (blake2b-256 of the body) and attach the key witness.
    ///
    /// Ed25519 signatures are deterministic: the same body always yields the same bytes.
    pub fn sign(&self, tx: UnsignedTransaction) -> LedgerResult<SignedTransaction> {
        let id = tx.id()?;
        let signature = self.signing_key.sign(id.as_bytes());
        let witness = VKeyWitness {
            vkey: self.verifying_key_bytes(),
            signature: signature.to_bytes(),
        };
        tx.into_signed(id, witness)
    }
}

impl fmt::Debug for WalletContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletContext")
            .field("network", &self.network)
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}
