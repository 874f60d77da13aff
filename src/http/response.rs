//! HTTP rendering of service results.
//!
//! - `success` → 200
//! - `retry_later` → 409 with `Retry-After` in whole seconds, rounded up
//! - `unconfirmed` → 202, the transaction id is in the body
//! - `permanent_failure` → status chosen by [`FailureKind::http_status`]
//!
//! The JSON body is the serialized [`ServiceResult`] in every case.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use crate::service::ServiceResult;

pub fn status_code(result: &ServiceResult) -> StatusCode {
    match result {
        ServiceResult::Success { .. } => StatusCode::OK,
        ServiceResult::RetryLater { .. } => StatusCode::CONFLICT,
        ServiceResult::Unconfirmed { .. } => StatusCode::ACCEPTED,
        ServiceResult::PermanentFailure { kind, .. } => {
            StatusCode::from_u16(kind.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// `Retry-After` seconds for a suggested wait; never zero.
pub fn retry_after_secs(suggested_wait_ms: u64) -> u64 {
    suggested_wait_ms.div_ceil(1000).max(1)
}

impl IntoResponse for ServiceResult {
    fn into_response(self) -> Response {
        let status = status_code(&self);
        let retry_after = match &self {
            ServiceResult::RetryLater {
                suggested_wait_ms, ..
            } => Some(retry_after_secs(*suggested_wait_ms)),
            _ => None,
        };

        let mut response = (status, Json(self)).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::FailureKind;

    #[test]
    fn test_retry_after_rounds_up() {
        assert_eq!(retry_after_secs(20_000), 20);
        assert_eq!(retry_after_secs(20_001), 21);
        assert_eq!(retry_after_secs(0), 1);
    }

    #[test]
    fn test_retry_later_response() {
        let response = ServiceResult::RetryLater {
            suggested_wait_ms: 1_500,
            reason: "input spent".into(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(response.headers()[header::RETRY_AFTER], "2");
    }

    #[test]
    fn test_unconfirmed_is_accepted() {
        let unit: crate::ledger::AssetUnit = format!("{}{}", "ab".repeat(28), hex::encode("Coffee#1"))
            .parse()
            .unwrap();
        let response = ServiceResult::Unconfirmed {
            tx_hash: crate::ledger::TxHash([1; 32]),
            policy_id: unit.policy_id,
            unit,
            reason: "BadInputsUTxO".into(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert!(response.headers().get(header::RETRY_AFTER).is_none());
    }

    #[test]
    fn test_failure_status_by_kind() {
        let cases = [
            (FailureKind::InvalidSeed, StatusCode::BAD_REQUEST),
            (FailureKind::Unauthorized, StatusCode::UNAUTHORIZED),
            (FailureKind::NoFunds, StatusCode::UNPROCESSABLE_ENTITY),
            (FailureKind::Rejected, StatusCode::BAD_GATEWAY),
            (FailureKind::Network, StatusCode::SERVICE_UNAVAILABLE),
            (FailureKind::Internal, StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (kind, expected) in cases {
            let response = ServiceResult::failure(kind, "x").into_response();
            assert_eq!(response.status(), expected, "{}", kind);
            assert!(response.headers().get(header::RETRY_AFTER).is_none());
        }
    }
}
