//! Blockfrost-compatible REST provider.
//!
//! # Responsibilities
//! - List unspent outputs at an address (paginated; 404 means "nothing there")
//! - Submit CBOR transactions
//! - Read the current Plutus V2 cost model
//! - Bound every call with a deadline
//! - Classify provider responses into [`GatewayError`] once
//!
//! The access key travels only in the `project_id` header, marked sensitive.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::LedgerConfig;
use crate::ledger::address::{Address, Network};
use crate::ledger::gateway::{GatewayError, GatewayFactory, LedgerGateway, RejectionKind};
use crate::ledger::secret::SecretString;
use crate::ledger::transaction::{CostModel, SignedTransaction};
use crate::ledger::types::{AssetUnit, OutputRef, SpendableInput, TxHash, Value};
use crate::observability::metrics;
use crate::resilience::timeouts::bounded;

const PROJECT_ID_HEADER: &str = "project_id";

/// Upper bound on listing pages, so a misbehaving provider cannot loop us forever.
pub const MAX_PAGES: u32 = 100;

/// Ledger messages that mean an input was already consumed or never existed.
const CONFLICT_MARKERS: &[&str] = &[
    "BadInputsUTxO",
    "ValueNotConservedUTxO",
    "already been spent",
    "All inputs are spent",
];

/// Gateway bound to one provider key.
#[derive(Clone)]
pub struct BlockfrostGateway {
    client: reqwest::Client,
    base_url: String,
    headers: HeaderMap,
    page_size: u32,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct AmountEntry {
    unit: String,
    quantity: String,
}

#[derive(Debug, Deserialize)]
struct UtxoEntry {
    tx_hash: String,
    output_index: u32,
    amount: Vec<AmountEntry>,
}

#[derive(Debug, Deserialize)]
struct EpochParameters {
    #[serde(default)]
    cost_models_raw: Option<HashMap<String, Vec<i64>>>,
}

impl BlockfrostGateway {
    pub fn new(
        client: reqwest::Client,
        base_url: &str,
        provider_key: &SecretString,
        page_size: u32,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let mut key = HeaderValue::from_str(provider_key.expose().trim())
            .map_err(|_| GatewayError::Decode("provider key is not a valid header value".into()))?;
        key.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(PROJECT_ID_HEADER, key);

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            headers,
            page_size,
            timeout,
        })
    }

    async fn fetch_page(
        &self,
        address: &Address,
        page: u32,
    ) -> Result<Vec<UtxoEntry>, GatewayError> {
        let url = format!("{}/addresses/{}/utxos", self.base_url, address.to_bech32());
        let response = self
            .client
            .get(&url)
            .headers(self.headers.clone())
            .query(&[("page", page), ("count", self.page_size)])
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            // unused address
            return Ok(Vec::new());
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_response(status, &body));
        }

        response
            .json::<Vec<UtxoEntry>>()
            .await
            .map_err(|e| GatewayError::Decode(format!("utxo listing: {}", e)))
    }

    async fn list_all(&self, address: &Address) -> Result<Vec<SpendableInput>, GatewayError> {
        let mut inputs = Vec::new();
        for page in 1..=MAX_PAGES {
            let entries = self.fetch_page(address, page).await?;
            let last = (entries.len() as u32) < self.page_size;
            for entry in entries {
                inputs.push(entry.into_input()?);
            }
            if last {
                return Ok(inputs);
            }
        }
        tracing::warn!(
            address = %address,
            pages = MAX_PAGES,
            count = inputs.len(),
            "Input listing reached the page limit, later inputs are ignored"
        );
        Ok(inputs)
    }

    async fn fetch_cost_model(&self) -> Result<CostModel, GatewayError> {
        let response = self
            .client
            .get(format!("{}/epochs/latest/parameters", self.base_url))
            .headers(self.headers.clone())
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_response(status, &body));
        }

        let parameters = response
            .json::<EpochParameters>()
            .await
            .map_err(|e| GatewayError::Decode(format!("epoch parameters: {}", e)))?;
        let costs = parameters
            .cost_models_raw
            .and_then(|mut models| models.remove("PlutusV2"))
            .ok_or_else(|| GatewayError::Decode("epoch parameters carry no PlutusV2 cost model".into()))?;
        CostModel::new(costs).map_err(|e| GatewayError::Decode(e.to_string()))
    }

    async fn post_transaction(&self, tx: &SignedTransaction) -> Result<TxHash, GatewayError> {
        let response = self
            .client
            .post(format!("{}/tx/submit", self.base_url))
            .headers(self.headers.clone())
            .header(CONTENT_TYPE, "application/cbor")
            .body(tx.bytes().to_vec())
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;
        if !status.is_success() {
            return Err(classify_response(status, &body));
        }

        let id: String = serde_json::from_str(&body)
            .map_err(|e| GatewayError::Decode(format!("submit response: {}", e)))?;
        TxHash::from_hex(&id).map_err(GatewayError::Decode)
    }
}

#[async_trait]
impl LedgerGateway for BlockfrostGateway {
    async fn list_spendable_inputs(
        &self,
        address: &Address,
    ) -> Result<Vec<SpendableInput>, GatewayError> {
        let start = Instant::now();
        let result = bounded(self.timeout, self.list_all(address)).await;
        metrics::record_ledger_request("list_inputs", result_label(&result), start);

        match &result {
            Ok(inputs) => tracing::debug!(address = %address, count = inputs.len(), "Listed spendable inputs"),
            Err(e) => tracing::warn!(address = %address, error = %e, "Input listing failed"),
        }
        result
    }

    async fn submit(&self, tx: &SignedTransaction) -> Result<TxHash, GatewayError> {
        let start = Instant::now();
        let result = bounded(self.timeout, self.post_transaction(tx)).await;
        metrics::record_ledger_request("submit", result_label(&result), start);

        if let Ok(accepted) = &result {
            if *accepted != tx.id() {
                tracing::warn!(expected = %tx.id(), reported = %accepted, "Provider reported a different transaction id");
            }
        }
        result
    }

    async fn plutus_v2_cost_model(&self) -> Result<CostModel, GatewayError> {
        let start = Instant::now();
        let result = bounded(self.timeout, self.fetch_cost_model()).await;
        metrics::record_ledger_request("cost_model", result_label(&result), start);
        if let Ok(model) = &result {
            tracing::debug!(parameters = model.parameters().len(), "Fetched Plutus V2 cost model");
        }
        result
    }
}

impl std::fmt::Debug for BlockfrostGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockfrostGateway")
            .field("base_url", &self.base_url)
            .field("page_size", &self.page_size)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl UtxoEntry {
    fn into_input(self) -> Result<SpendableInput, GatewayError> {
        let tx_hash = TxHash::from_hex(&self.tx_hash).map_err(GatewayError::Decode)?;
        let mut value = Value::default();
        for amount in self.amount {
            let quantity: u64 = amount.quantity.parse().map_err(|_| {
                GatewayError::Decode(format!("quantity '{}' for {}", amount.quantity, amount.unit))
            })?;
            if amount.unit == "lovelace" {
                value.coin = value.coin.saturating_add(quantity);
            } else {
                let unit: AssetUnit = amount
                    .unit
                    .parse()
                    .map_err(|e: crate::ledger::LedgerError| GatewayError::Decode(e.to_string()))?;
                value.add_asset(unit, quantity);
            }
        }
        Ok(SpendableInput::new(OutputRef::new(tx_hash, self.output_index), value))
    }
}

fn transport_error(e: reqwest::Error) -> GatewayError {
    GatewayError::Network(e.without_url().to_string())
}

fn result_label<T>(result: &Result<T, GatewayError>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(e) => e.label(),
    }
}

/// Map a non-success provider response onto the failure taxonomy.
pub fn classify_response(status: StatusCode, body: &str) -> GatewayError {
    let reason = provider_message(body);
    match status.as_u16() {
        400 => {
            let kind = if CONFLICT_MARKERS.iter().any(|m| body.contains(m)) {
                RejectionKind::Conflict
            } else {
                RejectionKind::Other
            };
            GatewayError::Rejected { kind, reason }
        }
        401 | 403 => GatewayError::Unauthorized,
        408 | 425 | 429 => GatewayError::Network(format!("HTTP {}: {}", status.as_u16(), reason)),
        code if (500..600).contains(&code) => {
            GatewayError::Network(format!("HTTP {}: {}", code, reason))
        }
        code => GatewayError::Decode(format!("unexpected HTTP {}: {}", code, reason)),
    }
}

/// The provider's `message` field when the body is a JSON error, else the raw body.
fn provider_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        message: serde_json::Value,
    }

    let message = match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            message: serde_json::Value::String(s),
        }) => s,
        Ok(ErrorBody { message }) => message.to_string(),
        Err(_) => body.trim().to_string(),
    };
    // ledger traces can be very long
    message.chars().take(512).collect()
}

/// Creates [`BlockfrostGateway`]s sharing one connection pool.
#[derive(Debug, Clone)]
pub struct BlockfrostFactory {
    client: reqwest::Client,
    base_url: Option<String>,
    page_size: u32,
    timeout: Duration,
}

impl BlockfrostFactory {
    pub fn from_config(config: &LedgerConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("provenance-mint/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(transport_error)?;
        Ok(Self {
            client,
            base_url: config.provider_url.clone(),
            page_size: config.page_size,
            timeout: Duration::from_secs(config.request_timeout_secs),
        })
    }
}

impl GatewayFactory for BlockfrostFactory {
    fn connect(
        &self,
        network: Network,
        provider_key: &SecretString,
    ) -> Result<Arc<dyn LedgerGateway>, GatewayError> {
        if provider_key.is_empty() {
            return Err(GatewayError::Unauthorized);
        }
        let base_url = self
            .base_url
            .as_deref()
            .unwrap_or_else(|| network.default_provider_url());
        let gateway = BlockfrostGateway::new(
            self.client.clone(),
            base_url,
            provider_key,
            self.page_size,
            self.timeout,
        )?;
        Ok(Arc::new(gateway))
    }
}
