//! HTTP route handlers for the dashboard

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde_json::{json, Value};

use super::state::{DashboardState, HealthSnapshot, LaunchRequest};
use super::{page, run, sse};
use crate::engine::stop_pair;
use crate::plan::discover_plan_files;

/// Build the dashboard router
pub fn router() -> Router<DashboardState> {
    Router::new()
        .route("/", get(index))
        .route("/api/health", get(health))
        .route("/api/configs", get(configs))
        .route("/api/feed", get(sse::feed))
        .route("/api/launch", post(launch))
        .route("/api/stop", post(stop))
}

fn error_reply(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

async fn index(State(state): State<DashboardState>) -> Html<String> {
    let configs = discover_plan_files(&state.root);
    Html(page::render(&state.defaults, &configs))
}

async fn health(State(state): State<DashboardState>) -> Json<HealthSnapshot> {
    Json(state.snapshot())
}

/// GET /api/configs - plan files under the dashboard root
async fn configs(State(state): State<DashboardState>) -> Json<Value> {
    Json(json!({ "files": discover_plan_files(&state.root) }))
}

/// POST /api/launch - start a plan in the background
async fn launch(State(state): State<DashboardState>, Json(body): Json<Value>) -> Response {
    let request = match LaunchRequest::from_json(&body, &state.defaults) {
        Ok(request) => request,
        Err(message) => return error_reply(StatusCode::BAD_REQUEST, &message),
    };

    let (handle, signal) = stop_pair();
    let ticket = match state.begin(handle) {
        Ok(ticket) => ticket,
        Err(_) => return error_reply(StatusCode::CONFLICT, "A plan is already running"),
    };

    tracing::info!(
        config = %request.config_path,
        plan_id = %request.plan_id,
        "Launching plan from dashboard"
    );
    tokio::spawn(run::run_plan(state.clone(), ticket, request, signal));

    (StatusCode::ACCEPTED, Json(json!({ "accepted": true }))).into_response()
}

/// POST /api/stop - interrupt the active run
async fn stop(State(state): State<DashboardState>) -> Response {
    match state.stop() {
        Ok(()) => Json(json!({ "stopped": true })).into_response(),
        Err(_) => error_reply(StatusCode::CONFLICT, "No execution is currently running"),
    }
}
