//! Request handlers for `/mint`, `/transfer` and `/health`.
//!
//! Each operation runs on its own task holding the wallet session. If the client goes away
//! the task's token is cancelled: a submission already in flight still completes, but no
//! further attempt starts. The request deadline cancels the same token and then waits for
//! the task, so an answer that arrives late is still returned to the caller.

use axum::{
    extract::{rejection::JsonRejection, State},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::http::server::AppState;
use crate::ledger::{LedgerGateway, SecretString, WalletContext};
use crate::minting::StatusRecord;
use crate::service::{FailureKind, MintOrder, ServiceResult, SessionGuard, StatusUpdate};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintBody {
    pub blockfrost_key: SecretString,
    pub secret_seed: SecretString,
    pub token_name: String,
    pub metadata: serde_json::Value,
    #[serde(default)]
    pub cbor_hex: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferBody {
    pub blockfrost_key: SecretString,
    pub secret_seed: SecretString,
    pub asset_unit: String,
    pub metadata: StatusRecord,
    #[serde(default = "default_self_transfer")]
    pub self_transfer: bool,
    #[serde(default)]
    pub recipient_address: Option<String>,
}

fn default_self_transfer() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
    pub network: String,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: if state.shutdown.is_triggered() { "draining" } else { "ok" },
        version: env!("CARGO_PKG_VERSION"),
        network: state.service.network().to_string(),
    })
}

pub async fn mint(
    State(state): State<AppState>,
    body: Result<Json<MintBody>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return ServiceResult::invalid_input(rejection.body_text()).into_response(),
    };
    let order = MintOrder {
        token_name: body.token_name,
        metadata: body.metadata,
        script_cbor_hex: body.cbor_hex,
    };

    let call = match Call::open(&state, &body.secret_seed, &body.blockfrost_key).await {
        Ok(call) => call,
        Err(result) => return result.into_response(),
    };
    let service = state.service.clone();
    call.run(move |gateway, wallet, cancel| async move {
        service.mint(gateway.as_ref(), &wallet, &order, &cancel).await
    })
    .await
    .into_response()
}

pub async fn transfer(
    State(state): State<AppState>,
    body: Result<Json<TransferBody>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return ServiceResult::invalid_input(rejection.body_text()).into_response(),
    };
    let update = StatusUpdate {
        asset_unit: body.asset_unit,
        record: body.metadata,
        self_transfer: body.self_transfer,
        recipient_address: body.recipient_address,
    };

    let call = match Call::open(&state, &body.secret_seed, &body.blockfrost_key).await {
        Ok(call) => call,
        Err(result) => return result.into_response(),
    };
    let service = state.service.clone();
    call.run(move |gateway, wallet, cancel| async move {
        service.update_status(gateway.as_ref(), &wallet, &update, &cancel).await
    })
    .await
    .into_response()
}

/// Everything one operation needs, with the wallet session held.
struct Call {
    wallet: WalletContext,
    gateway: Arc<dyn LedgerGateway>,
    session: SessionGuard,
    cancel: CancellationToken,
    deadline: Duration,
}

impl Call {
    async fn open(
        state: &AppState,
        seed: &SecretString,
        provider_key: &SecretString,
    ) -> Result<Self, ServiceResult> {
        let wallet = state.service.wallet(seed)?;
        let gateway = state.service.gateway(provider_key)?;
        let session = state.sessions.acquire(wallet.address()).await;
        Ok(Self {
            wallet,
            gateway,
            session,
            cancel: state.shutdown.child(),
            deadline: state.request_deadline,
        })
    }

    async fn run<F, Fut>(self, operation: F) -> ServiceResult
    where
        F: FnOnce(Arc<dyn LedgerGateway>, WalletContext, CancellationToken) -> Fut,
        Fut: Future<Output = ServiceResult> + Send + 'static,
    {
        let Call {
            wallet,
            gateway,
            session,
            cancel,
            deadline,
        } = self;

        // Dropping the handler cancels the task's token; the task itself runs on.
        let abandon = cancel.clone().drop_guard();
        let expire = cancel.clone();
        let fut = operation(gateway, wallet, cancel);
        let mut task = tokio::spawn(async move {
            let _session = session;
            fut.await
        });

        let joined = tokio::select! {
            joined = &mut task => joined,
            _ = tokio::time::sleep(deadline) => {
                tracing::warn!(
                    deadline_secs = deadline.as_secs(),
                    "Request deadline reached, no further provider attempt will start"
                );
                expire.cancel();
                task.await
            }
        };

        let result = match joined {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(error = %e, "Operation task failed");
                ServiceResult::failure(FailureKind::Internal, "operation task failed")
            }
        };
        abandon.disarm();
        result
    }
}
