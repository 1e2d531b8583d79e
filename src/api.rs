use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, ResponseError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info_span, warn, Instrument};
use uuid::Uuid;

use crate::error::{DecideError, ValidationError};
use crate::inference::{AdapterState, PpoInference};
use crate::metrics;
use crate::request_validation::validate_decision_payload;
use crate::schema::DecisionResponse;

/// Shared handler state. Built once at startup and injected via `web::Data`.
pub struct AppState {
    model_version: String,
    inference: Option<Arc<PpoInference>>,
}

impl AppState {
    pub fn ready(inference: Arc<PpoInference>) -> Self {
        Self {
            model_version: inference.version().to_string(),
            inference: Some(inference),
        }
    }

    /// State before a policy is loaded: health reports not ready and
    /// decisions are refused.
    pub fn uninitialized(model_version: impl Into<String>) -> Self {
        Self {
            model_version: model_version.into(),
            inference: None,
        }
    }

    pub fn adapter_state(&self) -> AdapterState {
        match &self.inference {
            Some(inference) => inference.state(),
            None => AdapterState::Uninitialized,
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Decide(#[from] DecideError),
    #[error("Model not loaded")]
    NotReady,
    #[error("Evaluation task failed: {0}")]
    Blocking(String),
}

impl ApiError {
    fn reason(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation",
            ApiError::Decide(DecideError::Shape(_)) => "shape",
            ApiError::Decide(DecideError::Inference(_)) => "inference",
            ApiError::NotReady => "not_ready",
            ApiError::Blocking(_) => "blocking",
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotReady => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorBody {
            detail: self.to_string(),
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub model_version: String,
    pub device: String,
}

pub async fn health_check(data: web::Data<AppState>) -> HttpResponse {
    match &data.inference {
        Some(inference) => HttpResponse::Ok().json(HealthResponse {
            status: "ok".to_string(),
            model_version: inference.version().to_string(),
            device: inference.device().to_string(),
        }),
        None => HttpResponse::ServiceUnavailable().json(HealthResponse {
            status: "uninitialized".to_string(),
            model_version: data.model_version.clone(),
            device: "none".to_string(),
        }),
    }
}

pub async fn decide(
    data: web::Data<AppState>,
    body: web::Bytes,
) -> Result<HttpResponse, ApiError> {
    let request_id = Uuid::new_v4();
    let result = decide_inner(&data, &body)
        .instrument(info_span!("decide", %request_id))
        .await;
    if let Err(e) = &result {
        metrics::inc_rejected(e.reason());
        warn!(%request_id, reason = e.reason(), error = %e, "Decision request rejected");
    }
    result
}

async fn decide_inner(data: &AppState, body: &[u8]) -> Result<HttpResponse, ApiError> {
    let inference = data.inference.clone().ok_or(ApiError::NotReady)?;

    let request = validate_decision_payload(body)?;
    let features = request.features();

    let worker = inference.clone();
    let decision = web::block(move || worker.decide(&features))
        .await
        .map_err(|e| ApiError::Blocking(e.to_string()))??;

    metrics::record_decision(decision.action, decision.latency_ms);
    debug!(
        action = %decision.action,
        confidence = decision.confidence,
        latency_ms = decision.latency_ms,
        "Decision made"
    );

    Ok(HttpResponse::Ok().json(DecisionResponse::assemble(
        &request,
        &decision,
        inference.version(),
    )))
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/health").route(web::get().to(health_check)))
        .service(web::resource("/decide").route(web::post().to(decide)));
}
