// SPDX-License-Identifier: MIT

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use futures::stream::Stream;
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::time::Duration;
use tokio_stream::StreamExt;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::adk::error::ConductorError;
use crate::conductor::orchestrator::Orchestrator;
use crate::conductor::types::ExecutionStatus;

type ApiError = (StatusCode, Json<Value>);

pub fn router(orchestrator: Orchestrator) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/executions", post(create_execution))
        .route("/api/executions/{id}", get(get_execution))
        .route("/api/executions/{id}/tasks", get(list_tasks))
        .route("/api/executions/{id}/workflow", get(get_workflow))
        .route("/api/executions/{id}/approve", post(approve_execution))
        .route("/api/executions/{id}/events", get(stream_events))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(orchestrator)
}

pub async fn serve(
    orchestrator: Orchestrator,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = router(orchestrator);

    log::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn api_error(err: ConductorError) -> ApiError {
    let status = match &err {
        ConductorError::NotFound { .. } => StatusCode::NOT_FOUND,
        ConductorError::InvalidState { .. } | ConductorError::ExecutionBusy(_) => {
            StatusCode::CONFLICT
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "error": err.to_string() })))
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Deserialize)]
struct ExecutionRequest {
    input: String,
}

async fn create_execution(
    State(orchestrator): State<Orchestrator>,
    Json(payload): Json<ExecutionRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    if payload.input.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "input must not be empty" })),
        ));
    }

    let execution = orchestrator.submit(payload.input).await.map_err(api_error)?;
    let id = execution.id.clone();

    tokio::spawn(async move {
        log::info!("Planning execution {}", id);
        if let Err(e) = orchestrator.run(&id).await {
            log::error!("Planning of {} failed: {}", id, e);
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "id": execution.id, "status": execution.status })),
    ))
}

async fn get_execution(
    State(orchestrator): State<Orchestrator>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let execution = orchestrator
        .store()
        .get_execution(&id)
        .await
        .map_err(api_error)?;
    Ok(Json(json!(execution)))
}

async fn list_tasks(
    State(orchestrator): State<Orchestrator>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let store = orchestrator.store();
    store.get_execution(&id).await.map_err(api_error)?;
    let tasks = store.list_tasks(&id).await.map_err(api_error)?;
    Ok(Json(json!(tasks)))
}

async fn get_workflow(
    State(orchestrator): State<Orchestrator>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let store = orchestrator.store();
    let execution = store.get_execution(&id).await.map_err(api_error)?;
    let workflow_id = execution
        .workflow_id
        .ok_or_else(|| api_error(ConductorError::not_found("Workflow", &id)))?;
    let workflow = store.get_workflow(&workflow_id).await.map_err(api_error)?;
    Ok(Json(json!(workflow)))
}

async fn approve_execution(
    State(orchestrator): State<Orchestrator>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let execution = orchestrator
        .store()
        .get_execution(&id)
        .await
        .map_err(api_error)?;

    // Claimed before answering, so a concurrent approval gets 409
    let guard = orchestrator.acquire(&id).map_err(api_error)?;

    if execution.status != ExecutionStatus::Paused {
        return Err(api_error(ConductorError::InvalidState {
            id,
            status: execution.status.to_string(),
            expected: ExecutionStatus::Paused.to_string(),
        }));
    }

    let exec_id = id.clone();
    tokio::spawn(async move {
        log::info!("Execution {} approved, resuming", exec_id);
        if let Err(e) = orchestrator.resume_acquired(guard).await {
            log::error!("Execution {} failed: {}", exec_id, e);
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "id": id, "status": ExecutionStatus::Running })),
    ))
}

async fn stream_events(
    State(orchestrator): State<Orchestrator>,
    Path(id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError> {
    orchestrator
        .store()
        .get_execution(&id)
        .await
        .map_err(api_error)?;

    let stream = orchestrator
        .events()
        .subscribe_execution(&id)
        .map(|event| Event::default().json_data(event));

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}
