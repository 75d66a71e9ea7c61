//! HTTP routes and handlers.
//!
//! Device-facing endpoints (firmware check/download, question polling,
//! message relay) plus the admin question-management JSON API. Validation
//! and authorization happen here; the handlers delegate the actual work
//! to the core components and the fan-out engine.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{delete, get, post};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use quizlink_core::registry::{DEFAULT_VERSION, Presence, presence};
use quizlink_core::{FirmwareDescriptor, UpdateDecision};

use crate::relay::relay_message;
use crate::state::AppState;

/// Header carrying the shared relay secret. Takes precedence over the
/// `secret` body field.
pub const RELAY_SECRET_HEADER: &str = "x-relay-secret";

const DEFAULT_ANSWER_LIMIT: usize = 50;

/// Assemble the full application router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/answers", get(answers))
        .route("/firmware/check/{device_id}", get(firmware_check))
        .route("/firmware/download/{version}", get(firmware_download))
        .route("/firmware/register", post(firmware_register))
        .route("/firmware/versions", get(firmware_versions))
        .route("/firmware/versions/{version}", delete(firmware_delete))
        .route("/get-questions", get(get_questions))
        .route("/relay", post(relay))
        .route("/admin/send-question", post(admin_send_question))
        .route("/admin/resend-question", post(admin_resend_question))
        .route("/admin/delete-question", post(admin_delete_question))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// `{ ok: false, error }` with the given status.
fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "ok": false, "error": message }))).into_response()
}

/// Map a core failure (in practice: a write-through that could not
/// persist) to an internal error response.
fn internal_error(e: &quizlink_core::Error) -> Response {
    warn!(error = %e, "Request failed");
    error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
}

/// `GET /health`
async fn health() -> Json<serde_json::Value> {
    Json(json!({ "ok": true }))
}

/// `GET /stats`
async fn stats(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({
        "received": state.stats.received(),
        "sent": state.stats.sent(),
        "bots": state.settings.bots.len(),
        "answers": state.answers.len().await,
        "devices": state.registry.devices().await.len(),
    }))
}

#[derive(Debug, Deserialize)]
struct AnswersQuery {
    device_id: Option<String>,
    limit: Option<usize>,
}

/// `GET /answers` — newest-first answer events, optionally filtered by
/// device and truncated to `limit`.
async fn answers(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AnswersQuery>,
) -> Json<serde_json::Value> {
    let all = state.answers.snapshot().await;
    let total = all.len();

    let filtered: Vec<_> = all
        .into_iter()
        .filter(|a| {
            query
                .device_id
                .as_deref()
                .is_none_or(|device_id| a.device_id == device_id)
        })
        .take(query.limit.unwrap_or(DEFAULT_ANSWER_LIMIT))
        .collect();

    let matched = filtered.len();
    Json(json!({
        "ok": true,
        "answers": filtered,
        "total": total,
        "filtered": matched,
    }))
}

#[derive(Debug, Deserialize)]
struct CheckQuery {
    current_version: Option<String>,
}

/// `GET /firmware/check/{device_id}` — record the reported version and
/// negotiate an update.
async fn firmware_check(
    State(state): State<Arc<AppState>>,
    Path(device_id): Path<String>,
    Query(query): Query<CheckQuery>,
) -> Response {
    let current_version = query
        .current_version
        .unwrap_or_else(|| DEFAULT_VERSION.to_string());

    match state
        .negotiator
        .check_update(&device_id, &current_version)
        .await
    {
        Ok(UpdateDecision::UpdateAvailable { version, firmware }) => Json(json!({
            "ok": true,
            "update_available": true,
            "current_version": current_version,
            "latest_version": version,
            "firmware_url": firmware.url,
            "firmware_size": firmware.size,
            "firmware_checksum": firmware.checksum,
            "description": firmware.description,
        }))
        .into_response(),
        Ok(UpdateDecision::UpToDate) => Json(json!({
            "ok": true,
            "update_available": false,
            "current_version": current_version,
            "message": "Device is already on the latest version",
        }))
        .into_response(),
        Err(e) => internal_error(&e),
    }
}

/// `GET /firmware/download/{version}` — redirect to the binary's URL.
async fn firmware_download(
    State(state): State<Arc<AppState>>,
    Path(version): Path<String>,
) -> Response {
    match state.catalog.get(&version).await {
        Some(firmware) => Redirect::temporary(&firmware.url).into_response(),
        None => error_response(StatusCode::NOT_FOUND, "Firmware version not found"),
    }
}

#[derive(Debug, Deserialize)]
struct RegisterRequest {
    version: Option<String>,
    url: Option<String>,
    #[serde(default)]
    size: Option<u64>,
    #[serde(default)]
    checksum: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

/// `POST /firmware/register`
async fn firmware_register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Response {
    let (Some(version), Some(url)) = (req.version.filter(|v| !v.is_empty()), req.url.filter(|u| !u.is_empty()))
    else {
        return error_response(StatusCode::BAD_REQUEST, "Version and URL required");
    };

    let descriptor = FirmwareDescriptor {
        url,
        size: req.size.unwrap_or(0),
        checksum: req.checksum.unwrap_or_default(),
        description: req.description.unwrap_or_default(),
        release_date: String::new(),
    };

    match state.catalog.register(&version, descriptor).await {
        Ok(_) => Json(json!({
            "ok": true,
            "message": format!("Firmware version {version} registered"),
        }))
        .into_response(),
        Err(e) => internal_error(&e),
    }
}

#[derive(Debug, Serialize)]
struct DeviceStatusEntry {
    current_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_seen: Option<DateTime<Utc>>,
    status: Presence,
}

/// `GET /firmware/versions` — the catalog plus every known device with
/// its derived presence.
async fn firmware_versions(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let now = Utc::now();
    let device_versions: BTreeMap<String, DeviceStatusEntry> = state
        .registry
        .devices()
        .await
        .into_iter()
        .map(|(device_id, record)| {
            let entry = DeviceStatusEntry {
                status: presence(record.last_seen, now),
                current_version: record.current_version,
                last_seen: record.last_seen,
            };
            (device_id, entry)
        })
        .collect();

    Json(json!({
        "ok": true,
        "versions": state.catalog.versions().await,
        "device_versions": device_versions,
    }))
}

/// `DELETE /firmware/versions/{version}` — deleting an unknown version is
/// still an `ok` response.
async fn firmware_delete(
    State(state): State<Arc<AppState>>,
    Path(version): Path<String>,
) -> Response {
    match state.catalog.unregister(&version).await {
        Ok(_) => Json(json!({
            "ok": true,
            "message": format!("Firmware version {version} deleted"),
        }))
        .into_response(),
        Err(e) => internal_error(&e),
    }
}

#[derive(Debug, Deserialize)]
struct QuestionsQuery {
    device_id: Option<String>,
    date: Option<String>,
}

/// `GET /get-questions` — every poll counts as device activity, whatever
/// the device already reported.
async fn get_questions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<QuestionsQuery>,
) -> Response {
    let Some(device_id) = query.device_id.filter(|d| !d.is_empty()) else {
        return error_response(StatusCode::BAD_REQUEST, "device_id required");
    };

    if let Err(e) = state.registry.record_activity(&device_id).await {
        return internal_error(&e);
    }

    let questions: Vec<_> = state
        .questions
        .snapshot()
        .await
        .into_iter()
        .filter(|q| query.date.as_deref().is_none_or(|date| q.date == date))
        .collect();

    let count = questions.len();
    Json(json!({
        "ok": true,
        "questions": questions,
        "count": count,
    }))
    .into_response()
}

#[derive(Debug, Deserialize)]
struct RelayRequest {
    #[serde(default)]
    secret: Option<String>,
    #[serde(default)]
    device_id: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(rename = "type", default)]
    kind: Option<String>,
}

/// `POST /relay` — the device message ingress.
async fn relay(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<RelayRequest>,
) -> Response {
    let Some(message) = req.message.filter(|m| !m.is_empty()) else {
        return error_response(StatusCode::BAD_REQUEST, "no_message");
    };

    let presented = headers
        .get(RELAY_SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .or(req.secret.as_deref());
    if presented != Some(state.settings.secret.as_str()) {
        return error_response(StatusCode::UNAUTHORIZED, "unauthorized");
    }

    let device_id = req.device_id.unwrap_or_default();
    let kind = req.kind.unwrap_or_default();

    let report = relay_message(&state, &device_id, &message, &kind).await;
    Json(json!({ "ok": true, "sent": report.sent })).into_response()
}

#[derive(Debug, Deserialize)]
struct SendQuestionRequest {
    message: Option<String>,
    answer: Option<String>,
    date: Option<String>,
    channel: Option<String>,
}

/// `POST /admin/send-question` — broadcast a question and record it.
async fn admin_send_question(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SendQuestionRequest>,
) -> Response {
    let (Some(message), Some(answer), Some(date), Some(channel)) = (
        req.message.filter(|v| !v.is_empty()),
        req.answer.filter(|v| !v.is_empty()),
        req.date.filter(|v| !v.is_empty()),
        req.channel.filter(|v| !v.is_empty()),
    ) else {
        return error_response(StatusCode::BAD_REQUEST, "Missing required fields");
    };

    let Some(bot) = state.bot_for_channel(&channel) else {
        return error_response(StatusCode::NOT_FOUND, "No bot found for this channel");
    };

    let text = format!("Q: {message}|{answer}|{date}");
    if let Err(e) = state.sender.send_message(&bot.token, &channel, &text).await {
        warn!(channel = %channel, error = %e, "Failed to send question");
        return error_response(StatusCode::BAD_GATEWAY, &e.to_string());
    }

    let record = quizlink_core::history::QuestionRecord {
        question: message,
        answer,
        date,
        channel,
        time: Utc::now().format("%H:%M:%S").to_string(),
        message: text,
    };

    match state.questions.push(record).await {
        Ok(_) => {
            info!("Question sent and recorded");
            Json(json!({ "ok": true })).into_response()
        }
        Err(e) => internal_error(&e),
    }
}

#[derive(Debug, Deserialize)]
struct QuestionIndexRequest {
    id: Option<usize>,
}

/// `POST /admin/resend-question` — re-dispatch the stored outbound text
/// without creating a new record.
async fn admin_resend_question(
    State(state): State<Arc<AppState>>,
    Json(req): Json<QuestionIndexRequest>,
) -> Response {
    let Some(question) = (match req.id {
        Some(id) => state.questions.get(id).await,
        None => None,
    }) else {
        return error_response(StatusCode::NOT_FOUND, "Question not found");
    };

    let Some(bot) = state.bot_for_channel(&question.channel) else {
        return error_response(StatusCode::NOT_FOUND, "No bot found for this channel");
    };

    if let Err(e) = state
        .sender
        .send_message(&bot.token, &question.channel, &question.message)
        .await
    {
        warn!(channel = %question.channel, error = %e, "Failed to resend question");
        return error_response(StatusCode::BAD_GATEWAY, &e.to_string());
    }

    Json(json!({ "ok": true })).into_response()
}

/// `POST /admin/delete-question`
async fn admin_delete_question(
    State(state): State<Arc<AppState>>,
    Json(req): Json<QuestionIndexRequest>,
) -> Response {
    let removed = match req.id {
        Some(id) => match state.questions.delete(id).await {
            Ok(removed) => removed,
            Err(e) => return internal_error(&e),
        },
        None => false,
    };

    if removed {
        Json(json!({ "ok": true })).into_response()
    } else {
        error_response(StatusCode::NOT_FOUND, "Question not found")
    }
}
