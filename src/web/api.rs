//! Defines the Axum routes emulating the printer's HTTP API.

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    extract::State,
    http::{Method, StatusCode, Uri, header},
    response::{IntoResponse, Response},
    routing::post,
};

use crate::config::UploadConfig;
use crate::printer::Printer;
use crate::protocol::Command;
use crate::scheduler::Scheduler;
use crate::web::HELP_PAGE;
use crate::web::upload::drain_throttled;

pub struct AppStateInner {
    pub printer: Printer,
    pub scheduler: Scheduler,
    pub upload: UploadConfig,
}
pub type AppState = Arc<AppStateInner>;

impl AppStateInner {
    pub fn new(printer: Printer, scheduler: Scheduler, upload: UploadConfig) -> AppState {
        Arc::new(Self { printer, scheduler, upload })
    }
}

/// Every reply is `text/html`, like the real device.
fn html(status: StatusCode, body: impl Into<String>) -> Response {
    (status, [(header::CONTENT_TYPE, "text/html")], body.into()).into_response()
}

fn ok() -> Response {
    html(StatusCode::OK, "OK")
}

fn not_found() -> Response {
    html(StatusCode::NOT_FOUND, "Not Found")
}

/// Creates the Axum router. All GETs go through [`dispatch`]; the only
/// other route is `POST /upload`.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/upload", post(upload).fallback(dispatch))
        .fallback(dispatch)
        .with_state(state)
}

/// Handler for every request except `POST /upload`.
async fn dispatch(State(state): State<AppState>, method: Method, uri: Uri) -> Response {
    state.printer.tick().await;
    if method != Method::GET {
        tracing::debug!("{} {} not found", method, uri);
        return not_found();
    }

    let command = Command::from_uri(&uri);
    match &command {
        Command::Inquiry => {
            let status = state.printer.inquiry().await;
            tracing::info!("Response: {}", status);
            return html(StatusCode::OK, status);
        }
        Command::Unknown => {
            tracing::debug!("Unrecognised request {}, serving help", uri);
            return html(StatusCode::OK, HELP_PAGE);
        }
        Command::MalformedTarget(heater) => {
            tracing::debug!("Ignoring malformed {} target in {}", heater, uri);
        }
        Command::RawCode(code) => {
            tracing::debug!("Ignoring raw code {:?}", code);
        }
        Command::PrintState(_) | Command::SetTarget { .. } => {}
    }
    if let Some(mutation) = command.mutation() {
        state.scheduler.schedule(mutation);
    }
    tracing::info!("Response: OK");
    ok()
}

/// Handler for `POST /upload`. Drains the body at the simulated storage
/// bandwidth and discards it.
async fn upload(State(state): State<AppState>, body: Body) -> Response {
    state.printer.tick().await;
    match drain_throttled(body, &state.upload).await {
        Ok(bytes) => {
            tracing::info!("Upload complete: {} bytes", bytes);
            ok()
        }
        Err(e) => {
            tracing::warn!("Upload aborted: {}", e);
            html(StatusCode::BAD_REQUEST, "Bad Request")
        }
    }
}
