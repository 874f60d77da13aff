//! Shared utilities for integration testing.
#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use ciborium::value::Value as Cbor;
use serde::Deserialize;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

use provenance_mint::config::ServiceConfig;
use provenance_mint::ledger::hash::blake2b_256;
use provenance_mint::ledger::{
    Address, CostModel, GatewayError, GatewayFactory, LedgerGateway, Network, OutputRef,
    SecretString, SignedTransaction, SpendableInput, TxHash, Value, WalletContext,
};

/// BIP-39 reference vector; never funded on any network.
pub const TEST_MNEMONIC: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

/// Always-succeeds Plutus V2 program, CBOR-wrapped twice as in a text envelope.
pub const TEMPLATE_HEX: &str = "4e4d01000033222220051200120011";

/// Short stand-in for a Plutus V2 cost model.
pub const COST_MODEL: [i64; 4] = [205_665, 812, 1, 1];

pub fn cost_model() -> CostModel {
    CostModel::new(COST_MODEL.to_vec()).unwrap()
}

pub const PROVIDER_KEY: &str = "preprodTestKey";

pub fn test_wallet() -> WalletContext {
    WalletContext::derive(TEST_MNEMONIC, Network::Preprod).unwrap()
}

/// Preprod config with the test template and millisecond retry delays.
pub fn test_config() -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.minting.script_template_hex = Some(TEMPLATE_HEX.to_string());
    config.retries.base_delay_ms = 5;
    config.retries.max_delay_ms = 20;
    config.ledger.request_timeout_secs = 5;
    config
}

pub fn pure_input(byte: u8, index: u32, coin: u64) -> SpendableInput {
    SpendableInput::new(OutputRef::new(TxHash([byte; 32]), index), Value::lovelace(coin))
}

/// Transaction id of a full serialized transaction.
pub fn tx_id_of(bytes: &[u8]) -> TxHash {
    let tx: Cbor = ciborium::de::from_reader(bytes).unwrap();
    let Cbor::Array(parts) = tx else { panic!("transaction is not an array") };
    let mut body = Vec::new();
    ciborium::ser::into_writer(&parts[0], &mut body).unwrap();
    TxHash(blake2b_256(&[&body]))
}

pub fn network_error() -> GatewayError {
    GatewayError::Network("connection reset".into())
}

/// In-memory gateway answering from scripts and counting calls.
#[derive(Default)]
pub struct ScriptedGateway {
    inputs: Mutex<Vec<SpendableInput>>,
    listing_failures: Mutex<VecDeque<GatewayError>>,
    submit_results: Mutex<VecDeque<Result<(), GatewayError>>>,
    submit_delay: Mutex<Option<Duration>>,
    pub list_calls: AtomicU32,
    pub submit_calls: AtomicU32,
    pub cost_model_calls: AtomicU32,
    pub submitted: Mutex<Vec<SignedTransaction>>,
}

impl ScriptedGateway {
    pub fn with_inputs(inputs: Vec<SpendableInput>) -> Self {
        let gateway = Self::default();
        *gateway.inputs.lock().unwrap() = inputs;
        gateway
    }

    /// Queue the result of the next submission. Unscripted submissions succeed.
    pub fn then_submit(self, result: Result<(), GatewayError>) -> Self {
        self.submit_results.lock().unwrap().push_back(result);
        self
    }

    pub fn then_fail_listing(self, error: GatewayError) -> Self {
        self.listing_failures.lock().unwrap().push_back(error);
        self
    }

    pub fn with_submit_delay(self, delay: Duration) -> Self {
        *self.submit_delay.lock().unwrap() = Some(delay);
        self
    }

    pub fn set_inputs(&self, inputs: Vec<SpendableInput>) {
        *self.inputs.lock().unwrap() = inputs;
    }

    pub fn submits(&self) -> u32 {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn listings(&self) -> u32 {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LedgerGateway for ScriptedGateway {
    async fn list_spendable_inputs(
        &self,
        _address: &Address,
    ) -> Result<Vec<SpendableInput>, GatewayError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.listing_failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        Ok(self.inputs.lock().unwrap().clone())
    }

    async fn submit(&self, tx: &SignedTransaction) -> Result<TxHash, GatewayError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.submit_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.submitted.lock().unwrap().push(tx.clone());
        let scripted = self.submit_results.lock().unwrap().pop_front();
        match scripted {
            Some(Err(error)) => Err(error),
            _ => Ok(tx.id()),
        }
    }

    async fn plutus_v2_cost_model(&self) -> Result<CostModel, GatewayError> {
        self.cost_model_calls.fetch_add(1, Ordering::SeqCst);
        Ok(cost_model())
    }
}

/// Hands out one shared [`ScriptedGateway`] and remembers the keys it was given.
pub struct ScriptedFactory {
    pub gateway: Arc<ScriptedGateway>,
    pub keys_seen: Mutex<Vec<String>>,
}

impl ScriptedFactory {
    pub fn new(gateway: ScriptedGateway) -> Arc<Self> {
        Arc::new(Self {
            gateway: Arc::new(gateway),
            keys_seen: Mutex::new(Vec::new()),
        })
    }
}

impl GatewayFactory for ScriptedFactory {
    fn connect(
        &self,
        _network: Network,
        provider_key: &SecretString,
    ) -> Result<Arc<dyn LedgerGateway>, GatewayError> {
        if provider_key.is_empty() {
            return Err(GatewayError::Unauthorized);
        }
        self.keys_seen.lock().unwrap().push(provider_key.expose().to_string());
        Ok(self.gateway.clone())
    }
}

/// A Blockfrost look-alike bound to an ephemeral port.
pub struct MockBlockfrost {
    pub addr: SocketAddr,
    pub state: Arc<MockState>,
}

#[derive(Default)]
pub struct MockState {
    /// Blockfrost-shaped utxo entries.
    pub utxos: Mutex<Vec<serde_json::Value>>,
    /// Scripted (status, body) answers for submissions; unscripted ones succeed.
    pub submit_answers: Mutex<VecDeque<(u16, String)>>,
    pub submitted: Mutex<Vec<Vec<u8>>>,
    pub list_calls: AtomicU32,
    pub submit_calls: AtomicU32,
    pub pages_requested: Mutex<Vec<u32>>,
}

#[derive(Deserialize)]
struct PageQuery {
    page: Option<u32>,
    count: Option<u32>,
}

impl MockBlockfrost {
    pub async fn start() -> Self {
        let state = Arc::new(MockState::default());
        let app = Router::new()
            .route("/api/v0/addresses/{address}/utxos", get(mock_utxos))
            .route("/api/v0/tx/submit", post(mock_submit))
            .route("/api/v0/epochs/latest/parameters", get(mock_parameters))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self { addr, state }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}/api/v0", self.addr)
    }

    pub fn add_utxo(&self, tx_hash: TxHash, index: u32, amounts: &[(&str, u64)]) {
        let amount: Vec<_> = amounts
            .iter()
            .map(|(unit, quantity)| serde_json::json!({ "unit": unit, "quantity": quantity.to_string() }))
            .collect();
        self.state.utxos.lock().unwrap().push(serde_json::json!({
            "tx_hash": tx_hash.to_hex(),
            "output_index": index,
            "amount": amount,
        }));
    }

    pub fn answer_submit(&self, status: u16, body: &str) {
        self.state
            .submit_answers
            .lock()
            .unwrap()
            .push_back((status, body.to_string()));
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("project_id")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == PROVIDER_KEY)
}

fn forbidden() -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(serde_json::json!({ "status_code": 403, "error": "Forbidden", "message": "Invalid project token." })),
    )
        .into_response()
}

async fn mock_utxos(
    State(state): State<Arc<MockState>>,
    Path(_address): Path<String>,
    Query(query): Query<PageQuery>,
    headers: HeaderMap,
) -> Response {
    state.list_calls.fetch_add(1, Ordering::SeqCst);
    if !authorized(&headers) {
        return forbidden();
    }
    let page = query.page.unwrap_or(1).max(1);
    let count = query.count.unwrap_or(100).max(1) as usize;
    state.pages_requested.lock().unwrap().push(page);

    let utxos = state.utxos.lock().unwrap().clone();
    if utxos.is_empty() {
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "status_code": 404, "error": "Not Found", "message": "The requested component has not been found." })),
        )
            .into_response();
    }
    let slice: Vec<_> = utxos
        .into_iter()
        .skip((page as usize - 1) * count)
        .take(count)
        .collect();
    Json(slice).into_response()
}

async fn mock_parameters(headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return forbidden();
    }
    Json(serde_json::json!({
        "epoch": 120,
        "min_fee_a": 44,
        "min_fee_b": 155381,
        "cost_models_raw": { "PlutusV2": COST_MODEL },
    }))
    .into_response()
}

async fn mock_submit(State(state): State<Arc<MockState>>, headers: HeaderMap, body: Bytes) -> Response {
    state.submit_calls.fetch_add(1, Ordering::SeqCst);
    if !authorized(&headers) {
        return forbidden();
    }
    state.submitted.lock().unwrap().push(body.to_vec());

    let scripted = state.submit_answers.lock().unwrap().pop_front();
    match scripted {
        Some((status, answer)) => (
            StatusCode::from_u16(status).unwrap(),
            [("content-type", "application/json")],
            answer,
        )
            .into_response(),
        None => Json(tx_id_of(&body).to_hex()).into_response(),
    }
}
