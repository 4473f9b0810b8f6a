//! HTTP boundary for the Kiln pipeline
//!
//! Exposes the pipeline over plain JSON endpoints: `/exec` runs one full
//! pipeline invocation for a prompt, `/run` executes an ad-hoc snippet under
//! the same safety filter and deadline, and `/health` answers liveness
//! probes. The pipeline is built once at startup and shared across requests;
//! every invocation gets its own workspace, so concurrent requests never
//! share filesystem state.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use kiln_core::pipeline::ExecutionOutcome;
use kiln_core::{Pipeline, PipelineError, PipelineReport};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
}

impl AppState {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self { pipeline }
    }
}

#[derive(Debug, Deserialize)]
pub struct ExecRequest {
    pub prompt: String,
}

#[derive(Debug, Serialize)]
pub struct ExecResponse {
    /// One line the chat layer can paste into a reply.
    pub summary: String,
    pub report: PipelineReport,
}

#[derive(Debug, Deserialize)]
pub struct RunRequest {
    pub code: String,
    #[serde(default = "default_language")]
    pub language: String,
}

#[derive(Debug, Serialize)]
pub struct RunResponse {
    pub status: String,
    pub output: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

fn default_language() -> String {
    "python".to_string()
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/exec", post(exec_handler))
        .route("/run", post(run_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn exec_handler(
    State(state): State<AppState>,
    Json(request): Json<ExecRequest>,
) -> Result<Json<ExecResponse>, (StatusCode, Json<ErrorBody>)> {
    if request.prompt.trim().is_empty() {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "prompt is required",
        ));
    }

    let report = state.pipeline.run(&request.prompt).await.map_err(|e| {
        log::error!("Pipeline invocation failed: {}", e);
        let status = match e {
            PipelineError::LLMError(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        error_response(status, &e.to_string())
    })?;

    Ok(Json(ExecResponse {
        summary: report.summary(),
        report,
    }))
}

async fn run_handler(
    State(state): State<AppState>,
    Json(request): Json<RunRequest>,
) -> Result<Json<RunResponse>, (StatusCode, Json<ErrorBody>)> {
    let language = request.language.to_lowercase();
    if !matches!(language.as_str(), "python" | "python3" | "py") {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            &format!("Unsupported language for execution: {}", request.language),
        ));
    }

    let outcome = state.pipeline.run_snippet(&request.code).await.map_err(|e| {
        log::error!("Snippet execution failed: {}", e);
        error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
    })?;

    Ok(Json(run_response_from(outcome)))
}

fn run_response_from(outcome: ExecutionOutcome) -> RunResponse {
    match outcome {
        ExecutionOutcome::NotRun => RunResponse {
            status: "success".to_string(),
            output: String::new(),
            error: String::new(),
        },
        ExecutionOutcome::Refused { message } => RunResponse {
            status: "refused".to_string(),
            output: String::new(),
            error: message,
        },
        ExecutionOutcome::Completed { exit_code, output } => match exit_code {
            Some(0) => RunResponse {
                status: "success".to_string(),
                output,
                error: String::new(),
            },
            code => RunResponse {
                status: "error".to_string(),
                output,
                error: format!("Execution failed with exit code {:?}", code),
            },
        },
        ExecutionOutcome::TimedOut {
            timeout_secs,
            output,
        } => RunResponse {
            status: "timeout".to_string(),
            output,
            error: format!(
                "Code execution timed out after {} seconds; the process was terminated",
                timeout_secs
            ),
        },
        ExecutionOutcome::Failed { error } => RunResponse {
            status: "error".to_string(),
            output: String::new(),
            error,
        },
    }
}

fn error_response(status: StatusCode, message: &str) -> (StatusCode, Json<ErrorBody>) {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
}

/// Resolves when ctrl-c is received, for graceful shutdown.
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for shutdown signal: {}", e);
    }
    log::info!("Shutdown signal received");
}
