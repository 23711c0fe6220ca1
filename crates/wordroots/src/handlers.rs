use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use lexicon_types::normalize_term;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::error::DerivationError;
use crate::model::{Meta, WordResponse};
use crate::pipeline::{
    DEFAULT_MAX_DERIVATIONS, DerivationEngine, DerivationRequest, MAX_DERIVATIONS_RANGE,
};
use crate::titles::TitleLookup;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<DerivationEngine>,
    pub titles: Arc<dyn TitleLookup>,
    pub disable_cache: bool,
}

#[derive(Deserialize)]
pub struct WordQuery {
    pub max_derivations: Option<usize>,
    pub include_rules: Option<bool>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/healthz", get(healthz))
        .route("/api/word/{term}", get(word))
        .with_state(state)
}

async fn healthz() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}

async fn word(
    State(state): State<AppState>,
    Path(term): Path<String>,
    Query(params): Query<WordQuery>,
) -> Result<Response, ApiError> {
    let max_derivations = params.max_derivations.unwrap_or(DEFAULT_MAX_DERIVATIONS);
    if !MAX_DERIVATIONS_RANGE.contains(&max_derivations) {
        return Err(ApiError::bad_request(format!(
            "max_derivations must be between {} and {}",
            MAX_DERIVATIONS_RANGE.start(),
            MAX_DERIVATIONS_RANGE.end()
        )));
    }
    let request = DerivationRequest {
        max_derivations,
        include_rules: params.include_rules.unwrap_or(false),
    };

    let normalized = normalize_term(&term);
    let (derivations, titles) = tokio::join!(
        state.engine.collect(&normalized, request),
        state.titles.collect(&normalized)
    );
    let derivations = derivations?;

    let mut sources = state.titles.availability();
    sources.insert("wordnet".to_string(), true);
    sources.insert("datamuse".to_string(), true);

    let response = WordResponse {
        base: term,
        normalized,
        derivations,
        titles,
        meta: Meta { sources },
    };

    if state.disable_cache {
        Ok(Json(response).into_response())
    } else {
        Ok((
            [(
                header::CACHE_CONTROL,
                HeaderValue::from_static("public, max-age=300"),
            )],
            Json(response),
        )
            .into_response())
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unavailable(#[from] DerivationError),
}

impl ApiError {
    fn bad_request<T: Into<String>>(msg: T) -> Self {
        ApiError::BadRequest(msg.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unavailable(err) => {
                error!("word lookup failed: {err}");
                StatusCode::SERVICE_UNAVAILABLE
            }
        };
        let body = Json(ErrorResponse {
            error: self.to_string(),
        });
        (status, body).into_response()
    }
}
