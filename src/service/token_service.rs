//! Token lifecycle operations: mint and status update.
//!
//! Each operation runs list → select/bind → build → sign → submit against one gateway and
//! one wallet. The caller owns serialization per wallet (see
//! [`WalletSessions`](crate::service::WalletSessions)); nothing here holds state between calls.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;

use crate::config::ServiceConfig;
use crate::ledger::{
    Address, AssetUnit, CostModel, GatewayError, GatewayFactory, LedgerError, LedgerGateway,
    LedgerResult, Network, SecretString, SpendableInput, WalletContext,
};
use crate::minting::{bind, ScriptTemplate, StatusRecord, TransactionBuilder, UtxoSelector};
use crate::observability::metrics;
use crate::resilience::{RetryPolicy, SubmissionRetryEngine};
use crate::service::outcome::{run_value, ServiceResult};

/// A request to mint one new batch token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintOrder {
    pub token_name: String,
    /// CIP-25 payload placed under the policy id and asset name.
    pub metadata: serde_json::Value,
    /// Script template override; the configured template is used when absent.
    #[serde(default)]
    pub script_cbor_hex: Option<String>,
}

/// A request to record a new status for an existing token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub asset_unit: String,
    pub record: StatusRecord,
    /// Send the token back to the custodial address.
    pub self_transfer: bool,
    /// Required when `self_transfer` is false.
    #[serde(default)]
    pub recipient_address: Option<String>,
}

/// Drives mint and status-update operations.
pub struct TokenService {
    network: Network,
    factory: Arc<dyn GatewayFactory>,
    builder: TransactionBuilder,
    selector: UtxoSelector,
    engine: SubmissionRetryEngine,
    default_template: Option<ScriptTemplate>,
    /// Configured, or read from the first provider that answers.
    cost_model: OnceCell<CostModel>,
}

impl TokenService {
    pub fn new(config: &ServiceConfig, factory: Arc<dyn GatewayFactory>) -> LedgerResult<Self> {
        let default_template = config
            .minting
            .script_template_hex
            .as_deref()
            .map(ScriptTemplate::from_hex)
            .transpose()?;
        let configured_costs = config
            .minting
            .plutus_v2_cost_model
            .clone()
            .map(CostModel::new)
            .transpose()?;

        Ok(Self {
            network: config.ledger.network,
            factory,
            builder: TransactionBuilder::new(config.protocol.clone(), &config.minting),
            selector: UtxoSelector::new(config.minting.min_pure_lovelace),
            engine: SubmissionRetryEngine::new(RetryPolicy::from_config(&config.retries)),
            default_template,
            cost_model: OnceCell::new_with(configured_costs),
        })
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn engine(&self) -> &SubmissionRetryEngine {
        &self.engine
    }

    /// Derive the custodial wallet for this call.
    pub fn wallet(&self, seed: &SecretString) -> LedgerResult<WalletContext> {
        WalletContext::derive(seed.expose(), self.network)
    }

    /// Connect a gateway with the call's provider key.
    pub fn gateway(&self, provider_key: &SecretString) -> Result<Arc<dyn LedgerGateway>, GatewayError> {
        self.factory.connect(self.network, provider_key)
    }

    /// Mint one token named `order.token_name` under a freshly bound policy.
    pub async fn mint(
        &self,
        gateway: &dyn LedgerGateway,
        wallet: &WalletContext,
        order: &MintOrder,
        cancel: &CancellationToken,
    ) -> ServiceResult {
        let start = Instant::now();
        let result = match self.try_mint(gateway, wallet, order, cancel).await {
            Ok(result) | Err(result) => result,
        };
        self.finish("mint", &result, start);
        result
    }

    /// Move a held token (to itself or to a recipient) with a status record attached.
    pub async fn update_status(
        &self,
        gateway: &dyn LedgerGateway,
        wallet: &WalletContext,
        update: &StatusUpdate,
        cancel: &CancellationToken,
    ) -> ServiceResult {
        let start = Instant::now();
        let result = match self.try_update_status(gateway, wallet, update, cancel).await {
            Ok(result) | Err(result) => result,
        };
        self.finish("update_status", &result, start);
        result
    }

    async fn try_mint(
        &self,
        gateway: &dyn LedgerGateway,
        wallet: &WalletContext,
        order: &MintOrder,
        cancel: &CancellationToken,
    ) -> Result<ServiceResult, ServiceResult> {
        let token_name = order.token_name.as_str();
        if token_name.trim().is_empty() {
            return Err(ServiceResult::invalid_input("tokenName must not be empty"));
        }
        if token_name.trim() != token_name {
            return Err(ServiceResult::invalid_input(
                "tokenName must not start or end with whitespace",
            ));
        }
        if !order.metadata.is_object() {
            return Err(ServiceResult::invalid_input("metadata must be a JSON object"));
        }
        let template = self.template(order.script_cbor_hex.as_deref())?;

        let inputs = self.spendable_inputs(gateway, wallet.address(), cancel).await?;
        let selection = self.selector.select(&inputs)?;
        let policy = bind(&selection.input, token_name.as_bytes(), &template)?;
        let cost_model = self.cost_model(gateway, cancel).await?;
        let tx = self.builder.build_mint(
            &selection.input,
            &policy,
            &order.metadata,
            wallet.address(),
            &cost_model,
        )?;
        let signed = wallet.sign(tx)?;

        tracing::info!(
            unit = %policy.unit,
            policy_id = %policy.policy_id,
            tx_hash = %signed.id(),
            size = signed.size(),
            fallback_input = selection.fallback,
            "Submitting mint"
        );
        let outcome = self.engine.submit(gateway, &signed, cancel).await;
        Ok(ServiceResult::from_submission(outcome, &policy.unit))
    }

    async fn try_update_status(
        &self,
        gateway: &dyn LedgerGateway,
        wallet: &WalletContext,
        update: &StatusUpdate,
        cancel: &CancellationToken,
    ) -> Result<ServiceResult, ServiceResult> {
        let unit: AssetUnit = update.asset_unit.parse()?;
        if update.record.status.trim().is_empty() {
            return Err(ServiceResult::invalid_input("metadata.status must not be empty"));
        }
        let recipient = self.recipient(wallet, update)?;

        let mut record = update.record.clone();
        if record.timestamp.is_none() {
            record.timestamp = Some(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true));
        }

        let inputs = self.spendable_inputs(gateway, wallet.address(), cancel).await?;
        let tx = self.builder.build_status_transfer(
            &unit,
            &recipient,
            record.to_metadatum(),
            &inputs,
            wallet.address(),
        )?;
        let signed = wallet.sign(tx)?;

        tracing::info!(
            unit = %unit,
            status = %record.status,
            recipient = %recipient,
            tx_hash = %signed.id(),
            "Submitting status update"
        );
        let outcome = self.engine.submit(gateway, &signed, cancel).await;
        Ok(ServiceResult::from_submission(outcome, &unit))
    }

    async fn spendable_inputs(
        &self,
        gateway: &dyn LedgerGateway,
        address: &Address,
        cancel: &CancellationToken,
    ) -> Result<Vec<SpendableInput>, ServiceResult> {
        let outcome = self
            .engine
            .run("list_inputs", cancel, move || gateway.list_spendable_inputs(address))
            .await;
        let inputs = run_value(outcome)?;
        tracing::debug!(address = %address, count = inputs.len(), "Listed spendable inputs");
        Ok(inputs)
    }

    async fn cost_model(
        &self,
        gateway: &dyn LedgerGateway,
        cancel: &CancellationToken,
    ) -> Result<CostModel, ServiceResult> {
        self.cost_model
            .get_or_try_init(|| async {
                let outcome = self
                    .engine
                    .run("cost_model", cancel, move || gateway.plutus_v2_cost_model())
                    .await;
                run_value(outcome)
            })
            .await
            .cloned()
    }

    fn template(&self, override_hex: Option<&str>) -> Result<ScriptTemplate, ServiceResult> {
        match override_hex.map(str::trim).filter(|s| !s.is_empty()) {
            Some(hex) => Ok(ScriptTemplate::from_hex(hex)?),
            None => self
                .default_template
                .clone()
                .ok_or_else(|| ServiceResult::invalid_input("no minting script supplied or configured")),
        }
    }

    fn recipient(&self, wallet: &WalletContext, update: &StatusUpdate) -> Result<Address, ServiceResult> {
        if update.self_transfer {
            return Ok(wallet.address().clone());
        }
        let raw = update
            .recipient_address
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                ServiceResult::invalid_input("recipientAddress is required when selfTransfer is false")
            })?;
        let address: Address = raw.parse()?;
        if address.network_id() != self.network.network_id() {
            return Err(LedgerError::InvalidAddress(format!(
                "recipient is not a {} address",
                self.network
            ))
            .into());
        }
        Ok(address)
    }

    fn finish(&self, operation: &'static str, result: &ServiceResult, start: Instant) {
        metrics::record_token_operation(operation, result.outcome_label());
        let elapsed_ms = start.elapsed().as_millis() as u64;
        match result {
            ServiceResult::Success { tx_hash, unit, .. } => {
                tracing::info!(operation, tx_hash = %tx_hash, unit = %unit, elapsed_ms, "Operation succeeded")
            }
            ServiceResult::RetryLater { suggested_wait_ms, reason } => tracing::warn!(
                operation,
                suggested_wait_ms,
                reason = %reason,
                elapsed_ms,
                "Operation deferred"
            ),
            ServiceResult::Unconfirmed { tx_hash, unit, reason, .. } => tracing::warn!(
                operation,
                tx_hash = %tx_hash,
                unit = %unit,
                reason = %reason,
                elapsed_ms,
                "Operation outcome unknown, transaction may be on chain"
            ),
            ServiceResult::PermanentFailure { kind, reason } => {
                tracing::warn!(operation, kind = %kind, reason = %reason, elapsed_ms, "Operation failed")
            }
        }
    }
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("network", &self.network)
            .field("engine", &self.engine)
            .field("default_template", &self.default_template)
            .finish_non_exhaustive()
    }
}
