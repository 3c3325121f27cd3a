// Copyright (c) James Kassemi, SC, US. All rights reserved.

use core_types::{Decision, RejectReason};
use http_body_util::Full;
use hyper::{
    Response, StatusCode,
    body::Bytes,
    header::{CONTENT_TYPE, HeaderValue},
};
use serde::Serialize;
use serde_json::json;

pub type ApiResponse = Response<Full<Bytes>>;

const JSON: &str = "application/json";
const PROMETHEUS_TEXT: &str = "text/plain; version=0.0.4";

pub fn json<T: Serialize>(status: StatusCode, body: &T) -> ApiResponse {
    match serde_json::to_vec(body) {
        Ok(bytes) => with_type(status, bytes, JSON),
        Err(err) => {
            log::error!("[sale-api] failed to encode response: {}", err);
            with_type(
                StatusCode::INTERNAL_SERVER_ERROR,
                br#"{"error":"internal error"}"#.to_vec(),
                JSON,
            )
        }
    }
}

pub fn ok() -> ApiResponse {
    json(StatusCode::OK, &json!({ "ok": true }))
}

pub fn error(status: StatusCode, message: &str) -> ApiResponse {
    json(status, &json!({ "error": message }))
}

pub fn prometheus(text: String) -> ApiResponse {
    with_type(StatusCode::OK, text.into_bytes(), PROMETHEUS_TEXT)
}

fn with_type(status: StatusCode, body: Vec<u8>, content_type: &'static str) -> ApiResponse {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

pub fn reject_status(reason: RejectReason) -> StatusCode {
    match reason {
        RejectReason::NotConfigured | RejectReason::SaleNotLive => StatusCode::BAD_REQUEST,
        RejectReason::NotWhitelisted => StatusCode::FORBIDDEN,
        RejectReason::WalletLimitExceeded
        | RejectReason::CooldownActive
        | RejectReason::SlotCollision => StatusCode::TOO_MANY_REQUESTS,
    }
}

pub fn decision(decision: &Decision) -> ApiResponse {
    match decision {
        Decision::Accepted { note: None, .. } => ok(),
        Decision::Accepted {
            note: Some(note), ..
        } => json(
            StatusCode::OK,
            &json!({ "ok": true, "note": note.label() }),
        ),
        Decision::Rejected(reason) => error(reject_status(*reason), reason.message()),
    }
}
