// HTTP route handlers for the CodeSphere API

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use codesphere_common::types::{ExecutionRequest, JudgeRequest, Language, Limits, RunResponse, TestCase};
use codesphere_engine::recipe::recipe;
use codesphere_engine::EngineError;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunBody {
    pub code: String,
    pub language: String,
    #[serde(default)]
    pub input: String,
    pub time_limit: Option<u64>,
    pub memory_limit: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JudgeBody {
    pub code: String,
    pub language: String,
    pub test_cases: Vec<TestCase>,
    pub time_limit: Option<u64>,
    pub memory_limit: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LanguageInfo {
    pub language: Language,
    pub source_file: &'static str,
    pub compile_command: Option<&'static str>,
    pub run_command: &'static str,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

fn rejected(e: &EngineError) -> Response {
    warn!(error = %e, "Request rejected");
    error_response(StatusCode::BAD_REQUEST, e.to_string())
}

/// POST /run - Compile and execute once against the given input
pub async fn run(State(state): State<Arc<AppState>>, Json(body): Json<RunBody>) -> Response {
    let language: Language = match body.language.parse() {
        Ok(language) => language,
        Err(e) => return rejected(&EngineError::from(e)),
    };

    let request = ExecutionRequest::new(
        language,
        body.code,
        body.input,
        Limits::new(body.time_limit, body.memory_limit),
    );

    match state.engine.run_code(&request).await {
        Ok(outcome) => (StatusCode::OK, Json(RunResponse::from(&outcome))).into_response(),
        Err(e) if e.is_validation() => rejected(&e),
        Err(e) => {
            error!(job_id = %request.id, error = %e, "Run failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Execution failed")
        }
    }
}

/// POST /judge - Grade a submission against ordered test cases
pub async fn judge(State(state): State<Arc<AppState>>, Json(body): Json<JudgeBody>) -> Response {
    let language: Language = match body.language.parse() {
        Ok(language) => language,
        Err(e) => return rejected(&EngineError::from(e)),
    };

    let request = JudgeRequest::new(
        language,
        body.code,
        body.test_cases,
        Limits::new(body.time_limit, body.memory_limit),
    );

    info!(
        job_id = %request.id,
        language = %request.language,
        test_cases = request.test_cases.len(),
        "Judge request received"
    );

    match state.engine.judge_submission(&request).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) if e.is_validation() => rejected(&e),
        Err(e) => {
            // Details stay in the logs
            error!(job_id = %request.id, error = %e, "Judging failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Judging failed")
        }
    }
}

/// GET /health - Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /languages - Supported languages and how each is built
pub async fn list_languages() -> Json<Vec<LanguageInfo>> {
    Json(
        Language::ALL
            .iter()
            .map(|&language| {
                let r = recipe(language);
                LanguageInfo {
                    language,
                    source_file: r.source_file,
                    compile_command: r.compile_command,
                    run_command: r.run_command,
                }
            })
            .collect(),
    )
}
