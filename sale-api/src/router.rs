// Copyright (c) James Kassemi, SC, US. All rights reserved.

use std::sync::Arc;

use admission::{AdmissionEngine, ConfigStoreError, PurchaseAttempt};
use chrono::Utc;
use core_types::{AppConfig, SaleConfig};
use event_sink::EventLog;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::{Method, Request, StatusCode, body::Body};
use log::{debug, info, warn};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::{error::Category, json};

use crate::response::{self, ApiResponse};

pub const MAX_BODY_BYTES: usize = 64 * 1024;
pub const METRICS_PATH: &str = "/metrics";

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Clone)]
pub struct ApiSettings {
    /// Path prefix for sale routes, e.g. `/api/sale`.
    pub prefix: String,
    pub enable_dev_routes: bool,
}

impl ApiSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            prefix: config.api_prefix.clone(),
            enable_dev_routes: config.enable_dev_routes,
        }
    }
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Rules,
    Purchase,
    Events,
    Health,
    DevReset,
    Metrics,
}

impl Route {
    fn allows(self, method: &Method) -> bool {
        match self {
            Route::Rules => *method == Method::GET || *method == Method::POST,
            Route::Purchase | Route::DevReset => *method == Method::POST,
            Route::Events | Route::Health | Route::Metrics => *method == Method::GET,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PurchaseRequest {
    #[serde(default)]
    buyer: String,
    #[serde(default)]
    amount: Option<f64>,
}

enum BodyError {
    TooLarge,
    Read(String),
    Syntax,
    Data(serde_json::Error),
}

/// HTTP front for one [`AdmissionEngine`]. Transport-agnostic: anything implementing
/// [`hyper::body::Body`] can be routed, so tests drive it with in-memory bodies.
pub struct SaleApi {
    engine: Arc<AdmissionEngine>,
    events: Arc<EventLog>,
    settings: ApiSettings,
}

impl SaleApi {
    pub fn new(engine: Arc<AdmissionEngine>, events: Arc<EventLog>, settings: ApiSettings) -> Self {
        Self {
            engine,
            events,
            settings,
        }
    }

    pub fn engine(&self) -> &Arc<AdmissionEngine> {
        &self.engine
    }

    fn route(&self, path: &str) -> Option<Route> {
        if path == METRICS_PATH {
            return Some(Route::Metrics);
        }
        let rest = path.strip_prefix(self.settings.prefix.as_str())?;
        match rest.trim_end_matches('/') {
            "/rules" => Some(Route::Rules),
            "/purchase" => Some(Route::Purchase),
            "/events" => Some(Route::Events),
            "/health" => Some(Route::Health),
            "/dev/reset" if self.settings.enable_dev_routes => Some(Route::DevReset),
            _ => None,
        }
    }

    pub async fn handle<B>(&self, req: Request<B>) -> ApiResponse
    where
        B: Body,
        B::Error: Into<BoxError>,
    {
        let Some(route) = self.route(req.uri().path()) else {
            return response::error(StatusCode::NOT_FOUND, "not found");
        };
        if !route.allows(req.method()) {
            return response::error(StatusCode::METHOD_NOT_ALLOWED, "method not allowed");
        }

        match (route, req.method() == Method::GET) {
            (Route::Rules, true) => self.get_rules(),
            (Route::Rules, false) => self.post_rules(req).await,
            (Route::Purchase, _) => self.purchase(req).await,
            (Route::Events, _) => response::json(
                StatusCode::OK,
                &json!({ "events": self.events.recent() }),
            ),
            (Route::Health, _) => self.health(),
            (Route::DevReset, _) => self.dev_reset().await,
            (Route::Metrics, _) => match self.engine.metrics().render() {
                Ok(text) => response::prometheus(text),
                Err(err) => {
                    warn!("[sale-api] metrics render failed: {}", err);
                    response::error(StatusCode::INTERNAL_SERVER_ERROR, "metrics unavailable")
                }
            },
        }
    }

    fn get_rules(&self) -> ApiResponse {
        match self.engine.config() {
            Ok(config) => response::json(StatusCode::OK, &json!({ "config": &*config })),
            Err(err) => response::error(StatusCode::NOT_FOUND, &err.to_string()),
        }
    }

    async fn post_rules<B>(&self, req: Request<B>) -> ApiResponse
    where
        B: Body,
        B::Error: Into<BoxError>,
    {
        let config: SaleConfig = match read_json(req).await {
            Ok(config) => config,
            Err(BodyError::Data(err)) => {
                debug!("[sale-api] rules body rejected: {}", err);
                return response::error(StatusCode::BAD_REQUEST, "invalid config");
            }
            Err(err) => return body_error(err),
        };
        match self.engine.set_config(config, Utc::now()) {
            Ok(_) => response::ok(),
            Err(ConfigStoreError::InvalidConfig(_)) => {
                response::error(StatusCode::BAD_REQUEST, "invalid config")
            }
            Err(err) => response::error(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string()),
        }
    }

    async fn purchase<B>(&self, req: Request<B>) -> ApiResponse
    where
        B: Body,
        B::Error: Into<BoxError>,
    {
        let body: PurchaseRequest = match read_json(req).await {
            Ok(body) => body,
            Err(err) => return body_error(err),
        };
        // Ids are matched byte for byte; only blank ones are refused.
        if body.buyer.trim().is_empty() {
            return response::error(StatusCode::BAD_REQUEST, "missing buyer");
        }
        let attempt = PurchaseAttempt::new(body.buyer).with_amount(body.amount);
        let decision = self.engine.evaluate_attempt(&attempt, Utc::now()).await;
        response::decision(&decision)
    }

    fn health(&self) -> ApiResponse {
        response::json(
            StatusCode::OK,
            &json!({
                "ok": true,
                "configured": self.engine.config().is_ok(),
                "slots_claimed": self.engine.slots_claimed(),
                "slot_oracle": self.engine.oracle_status().snapshot(),
            }),
        )
    }

    async fn dev_reset(&self) -> ApiResponse {
        let summary = self.engine.reset(Utc::now()).await;
        info!("[sale-api] dev reset requested");
        response::json(
            StatusCode::OK,
            &json!({ "ok": true, "wallets": summary.wallets, "slots": summary.slots }),
        )
    }
}

async fn read_json<T, B>(req: Request<B>) -> Result<T, BodyError>
where
    T: DeserializeOwned,
    B: Body,
    B::Error: Into<BoxError>,
{
    let bytes = match Limited::new(req.into_body(), MAX_BODY_BYTES).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(err) if err.downcast_ref::<LengthLimitError>().is_some() => {
            return Err(BodyError::TooLarge);
        }
        Err(err) => return Err(BodyError::Read(err.to_string())),
    };
    serde_json::from_slice(&bytes).map_err(|err| match err.classify() {
        Category::Data => BodyError::Data(err),
        Category::Io | Category::Syntax | Category::Eof => BodyError::Syntax,
    })
}

fn body_error(err: BodyError) -> ApiResponse {
    match err {
        BodyError::TooLarge => response::error(StatusCode::PAYLOAD_TOO_LARGE, "payload too large"),
        BodyError::Read(detail) => {
            warn!("[sale-api] failed to read request body: {}", detail);
            response::error(StatusCode::BAD_REQUEST, "invalid request")
        }
        BodyError::Syntax | BodyError::Data(_) => {
            response::error(StatusCode::BAD_REQUEST, "invalid request")
        }
    }
}
