// Copyright (c) James Kassemi, SC, US. All rights reserved.

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use core_types::Slot;
use log::debug;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};

use crate::{OracleError, SlotOracle};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(3);

/// Solana JSON-RPC `getSlot` client.
pub struct RpcSlotOracle {
    client: Client,
    endpoint: Url,
    commitment: String,
    next_id: AtomicU64,
}

impl RpcSlotOracle {
    pub fn new(endpoint: &str, commitment: impl Into<String>) -> Result<Self, OracleError> {
        Self::with_timeout(endpoint, commitment, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(
        endpoint: &str,
        commitment: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, OracleError> {
        let endpoint = Url::parse(endpoint).map_err(|err| OracleError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            detail: err.to_string(),
        })?;
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint,
            commitment: commitment.into(),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn request(&self) -> RpcRequest<'_> {
        RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method: "getSlot",
            params: [CommitmentParam {
                commitment: &self.commitment,
            }],
        }
    }
}

#[async_trait]
impl SlotOracle for RpcSlotOracle {
    async fn current_slot(&self) -> Result<Slot, OracleError> {
        let request = self.request();
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json::<RpcResponse>()
            .await?;
        let slot = response.into_slot()?;
        debug!("[slot-oracle] getSlot id={} -> {}", request.id, slot);
        Ok(slot)
    }

    fn describe(&self) -> String {
        format!("solana rpc {}", self.endpoint)
    }
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'static str,
    params: [CommitmentParam<'a>; 1],
}

#[derive(Debug, Serialize)]
struct CommitmentParam<'a> {
    commitment: &'a str,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Slot>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

impl RpcResponse {
    fn into_slot(self) -> Result<Slot, OracleError> {
        if let Some(err) = self.error {
            return Err(OracleError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        self.result.ok_or(OracleError::MissingResult)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_matches_json_rpc_shape() {
        let oracle = RpcSlotOracle::new("https://api.devnet.solana.com", "confirmed").unwrap();
        let first = serde_json::to_value(oracle.request()).unwrap();
        assert_eq!(first["jsonrpc"], "2.0");
        assert_eq!(first["method"], "getSlot");
        assert_eq!(first["params"][0]["commitment"], "confirmed");
        let second = serde_json::to_value(oracle.request()).unwrap();
        assert_eq!(second["id"].as_u64(), first["id"].as_u64().map(|id| id + 1));
    }

    #[test]
    fn decodes_result_and_error_payloads() {
        let ok: RpcResponse =
            serde_json::from_str(r#"{"jsonrpc":"2.0","result":321456789,"id":1}"#).unwrap();
        assert_eq!(ok.into_slot().unwrap(), 321_456_789);

        let err: RpcResponse = serde_json::from_str(
            r#"{"jsonrpc":"2.0","error":{"code":-32005,"message":"Node is behind"},"id":1}"#,
        )
        .unwrap();
        assert!(matches!(
            err.into_slot(),
            Err(OracleError::Rpc { code: -32005, .. })
        ));

        let empty: RpcResponse = serde_json::from_str(r#"{"jsonrpc":"2.0","id":1}"#).unwrap();
        assert!(matches!(empty.into_slot(), Err(OracleError::MissingResult)));
    }

    #[test]
    fn rejects_malformed_endpoint() {
        let err = RpcSlotOracle::new("not a url", "confirmed").err().unwrap();
        assert!(matches!(err, OracleError::InvalidEndpoint { .. }));
    }

    #[tokio::test]
    async fn unreachable_endpoint_surfaces_request_error() {
        let oracle = RpcSlotOracle::with_timeout(
            "http://127.0.0.1:9/",
            "confirmed",
            Duration::from_millis(200),
        )
        .unwrap();
        let err = oracle.current_slot().await.unwrap_err();
        assert!(matches!(err, OracleError::Request(_)));
    }
}
