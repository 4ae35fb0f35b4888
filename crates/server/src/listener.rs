// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP control plane.
//!
//! One task per connection, one exchange per connection. Unknown paths get
//! 404, malformed bodies 400, unknown uploads 404, conflicts 409, anything
//! else that fails 500 with `{error}`.

use crate::AppState;
use plr_core::{Clock, CoordinatorError, PipelineProgress, UploadId};
use plr_engine::{IntakeError, RuntimeError};
use plr_proto::{
    read_request, write_response, ApiError, CompleteResponse, DeadItemsResponse, HealthResponse,
    HttpRequest, InitializeBody, InitializeResponse, ProtocolError, QueueHealth, Route,
    SheetCompleteBody, SheetListResponse, SheetView, TileCompleteBody, UploadParams,
    UploadResponse,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

pub(crate) async fn run_listener<C: Clock>(
    tcp: TcpListener,
    state: Arc<AppState<C>>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            result = tcp.accept() => match result {
                Ok((stream, peer)) => {
                    debug!(%peer, "connection accepted");
                    let state = Arc::clone(&state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, state).await {
                            debug!(error = %e, "connection error");
                        }
                    });
                }
                Err(e) => error!(error = %e, "accept failed"),
            },
        }
    }
}

async fn handle_connection<C: Clock>(
    stream: tokio::net::TcpStream,
    state: Arc<AppState<C>>,
) -> Result<(), ProtocolError> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    let request = match read_request(&mut reader).await {
        Ok(request) => request,
        Err(e) => {
            let body = encode(&ApiError::new(e.to_string()));
            return write_response(&mut writer, 400, &body).await;
        }
    };

    let (status, body) = route_request(&request, &state).await;
    write_response(&mut writer, status, &body).await
}

/// Dispatch one parsed request. Exposed to tests so routing is checked
/// without a socket.
pub async fn route_request<C: Clock>(
    request: &HttpRequest,
    state: &Arc<AppState<C>>,
) -> (u16, Vec<u8>) {
    let Some(route) = Route::parse(&request.method, &request.path) else {
        return (404, encode(&ApiError::new("not found")));
    };

    match route {
        Route::Upload => handle_upload(request, state).await,
        Route::Initialize(upload_id) => handle_initialize(upload_id, request, state).await,
        Route::SheetComplete(upload_id) => {
            let body: SheetCompleteBody = match parse_body(request) {
                Ok(body) => body,
                Err(response) => return response,
            };
            progress_response(
                state
                    .pool
                    .sheet_complete(&upload_id, body.sheet_number, body.valid_sheets)
                    .await,
            )
        }
        Route::TileComplete(upload_id) => {
            let body: TileCompleteBody = match parse_body(request) {
                Ok(body) => body,
                Err(response) => return response,
            };
            progress_response(state.pool.tile_complete(&upload_id, body.sheet_number).await)
        }
        Route::MarkerComplete(upload_id) => {
            let body: TileCompleteBody = match parse_body(request) {
                Ok(body) => body,
                Err(response) => return response,
            };
            progress_response(state.pool.marker_complete(&upload_id, body.sheet_number).await)
        }
        Route::RetryDispatch(upload_id) => {
            progress_response(state.pool.retry_dispatch(&upload_id).await)
        }
        Route::Progress(upload_id) => match state.pool.progress(&upload_id).await {
            Ok(progress) => (200, encode::<PipelineProgress>(&progress)),
            Err(e) => runtime_error_response(&e),
        },
        Route::Sheets(upload_id) => handle_sheets(upload_id, state),
        Route::QueueDead(name) => handle_queue_dead(&name, state),
        Route::Health => handle_health(state),
    }
}

async fn handle_upload<C: Clock>(
    request: &HttpRequest,
    state: &Arc<AppState<C>>,
) -> (u16, Vec<u8>) {
    let params = match UploadParams::from_query(request) {
        Ok(params) => params,
        Err(message) => return (400, encode(&ApiError::new(message))),
    };
    let intake_request = plr_engine::IntakeRequest {
        upload_id: params.upload_id,
        plan_id: params.plan_id,
        project_id: params.project_id,
        organization_id: params.organization_id,
    };
    match state.intake.handle_upload(intake_request, &request.body).await {
        Ok(outcome) => (
            200,
            encode(&UploadResponse {
                success: true,
                upload_id: outcome.upload_id,
                total_sheets: outcome.total_sheets,
            }),
        ),
        Err(e @ IntakeError::InvalidPdf) | Err(e @ IntakeError::BadPageCount(_)) => {
            (400, encode(&ApiError::new(e.to_string())))
        }
        Err(e @ IntakeError::Duplicate(_)) => (409, encode(&ApiError::new(e.to_string()))),
        Err(e) => {
            error!(error = %e, "upload intake failed");
            (500, encode(&ApiError::new(e.to_string())))
        }
    }
}

async fn handle_initialize<C: Clock>(
    upload_id: UploadId,
    request: &HttpRequest,
    state: &Arc<AppState<C>>,
) -> (u16, Vec<u8>) {
    let body: InitializeBody = match parse_body(request) {
        Ok(body) => body,
        Err(response) => return response,
    };
    if body.upload_id != upload_id {
        return (400, encode(&ApiError::new("uploadId in body does not match path")));
    }
    match state.pool.initialize(&upload_id, body.total_sheets, body.timeout_ms).await {
        Ok(coordinator_state) => {
            (200, encode(&InitializeResponse { success: true, state: coordinator_state }))
        }
        Err(e) => runtime_error_response(&e),
    }
}

fn handle_sheets<C: Clock>(upload_id: UploadId, state: &Arc<AppState<C>>) -> (u16, Vec<u8>) {
    let sheets = state.store.sheets_for_upload(&upload_id);
    if sheets.is_empty() && state.store.get_job(&upload_id).is_none() {
        return (404, encode(&ApiError::new(format!("unknown upload {upload_id}"))));
    }
    let sheets: Vec<SheetView> = sheets.into_iter().map(SheetView::from).collect();
    (200, encode(&SheetListResponse { sheets }))
}

fn handle_queue_dead<C: Clock>(name: &str, state: &Arc<AppState<C>>) -> (u16, Vec<u8>) {
    let items = if name == state.metadata.name() {
        to_values(&state.metadata.dead_items())
    } else if name == state.tiles.name() {
        to_values(&state.tiles.dead_items())
    } else if name == state.markers.name() {
        to_values(&state.markers.dead_items())
    } else {
        return (404, encode(&ApiError::new(format!("unknown queue {name}"))));
    };
    (200, encode(&DeadItemsResponse { items }))
}

fn handle_health<C: Clock>(state: &Arc<AppState<C>>) -> (u16, Vec<u8>) {
    let queues = [
        state.metadata.stats(),
        state.tiles.stats(),
        state.markers.stats(),
    ]
    .into_iter()
    .map(|s| QueueHealth { name: s.name, depth: s.depth, in_flight: s.in_flight, dead: s.dead })
    .collect();
    (
        200,
        encode(&HealthResponse {
            status: "ok".to_string(),
            uptime_secs: state.start_time.elapsed().as_secs(),
            active_coordinators: state.pool.active(),
            queues,
        }),
    )
}

fn progress_response(result: Result<PipelineProgress, RuntimeError>) -> (u16, Vec<u8>) {
    match result {
        Ok(progress) => (200, encode(&CompleteResponse::from(&progress))),
        Err(e) => runtime_error_response(&e),
    }
}

fn runtime_error_response(e: &RuntimeError) -> (u16, Vec<u8>) {
    let status = match e {
        RuntimeError::Coordinator(CoordinatorError::NotInitialized(_)) => 404,
        RuntimeError::Coordinator(CoordinatorError::AlreadyInitializedDifferently { .. })
        | RuntimeError::Coordinator(CoordinatorError::NotRetryable { .. }) => 409,
        RuntimeError::Coordinator(CoordinatorError::SheetOutOfRange { .. })
        | RuntimeError::Coordinator(CoordinatorError::InvalidTotalSheets) => 400,
        _ => 500,
    };
    if status == 500 {
        error!(error = %e, "handler failed");
    }
    (status, encode(&ApiError::new(e.to_string())))
}

fn parse_body<T: serde::de::DeserializeOwned>(
    request: &HttpRequest,
) -> Result<T, (u16, Vec<u8>)> {
    serde_json::from_slice(&request.body)
        .map_err(|e| (400, encode(&ApiError::new(format!("invalid body: {e}")))))
}

fn encode<T: Serialize>(value: &T) -> Vec<u8> {
    serde_json::to_vec(value).unwrap_or_else(|_| b"{}".to_vec())
}

fn to_values<T: Serialize>(items: &[T]) -> Vec<serde_json::Value> {
    items
        .iter()
        .map(|item| serde_json::to_value(item).unwrap_or(serde_json::Value::Null))
        .collect()
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;
