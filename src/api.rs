// src/api.rs
//! HTTP surface: on-demand cycle trigger, subscriber management, health, metrics.

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use shuttle_axum::axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::cycle::{format_report, CycleError, CycleReport, CycleRunner};
use crate::notify::ChatId;

#[derive(Clone)]
pub struct AppState {
    pub runner: Arc<CycleRunner>,
    /// `None` when no recorder is installed (tests); `/metrics` then answers 404.
    pub metrics: Option<PrometheusHandle>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/status", get(status))
        .route("/cycle", post(run_cycle))
        .route("/subscribers", get(list_subscribers))
        .route(
            "/subscribers/{chat_id}",
            put(add_subscriber).delete(remove_subscriber),
        )
        .route("/metrics", get(render_metrics))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Serialize)]
struct ErrorOut {
    error: String,
}

fn error(status: StatusCode, msg: impl Into<String>) -> Response {
    (status, Json(ErrorOut { error: msg.into() })).into_response()
}

#[derive(Serialize)]
struct CycleOut {
    report: CycleReport,
    text: String,
}

async fn run_cycle(State(state): State<AppState>) -> Response {
    match state.runner.run_cycle().await {
        Ok(report) => {
            let text = format_report(&report);
            Json(CycleOut { report, text }).into_response()
        }
        Err(e @ CycleError::AlreadyRunning) => error(StatusCode::CONFLICT, e.to_string()),
        Err(e) => {
            tracing::error!(target: "api", error = %e, "on-demand cycle failed");
            error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

#[derive(Serialize)]
struct StatusOut {
    running: bool,
    subscribers: usize,
    min_score: u8,
    keywords: Vec<String>,
}

async fn status(State(state): State<AppState>) -> Json<StatusOut> {
    let s = state.runner.settings();
    Json(StatusOut {
        running: state.runner.is_running(),
        subscribers: state.runner.subscribers().list().len(),
        min_score: s.min_score,
        keywords: s.keywords.clone(),
    })
}

async fn list_subscribers(State(state): State<AppState>) -> Json<Vec<ChatId>> {
    Json(state.runner.subscribers().list())
}

async fn add_subscriber(State(state): State<AppState>, Path(chat_id): Path<i64>) -> Response {
    match state.runner.subscribers().add(ChatId(chat_id)) {
        Ok(true) => StatusCode::CREATED.into_response(),
        Ok(false) => StatusCode::OK.into_response(),
        Err(e) => error(StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}")),
    }
}

async fn remove_subscriber(State(state): State<AppState>, Path(chat_id): Path<i64>) -> Response {
    match state.runner.subscribers().remove(ChatId(chat_id)) {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => error(StatusCode::NOT_FOUND, format!("chat {chat_id} is not subscribed")),
        Err(e) => error(StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}")),
    }
}

async fn render_metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(h) => h.render().into_response(),
        None => error(StatusCode::NOT_FOUND, "metrics recorder not installed"),
    }
}
