use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use codesphere_common::config::{MAX_SOURCE_CODE_BYTES, MAX_TEST_INPUT_BYTES};
use std::sync::Arc;

use crate::handlers;
use crate::AppState;

/// Room for the source, a handful of maximal inputs and the JSON around them
const BODY_LIMIT_BYTES: usize = MAX_SOURCE_CODE_BYTES + 4 * MAX_TEST_INPUT_BYTES;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/run", post(handlers::run))
        .route("/judge", post(handlers::judge))
        .route("/health", get(handlers::health_check))
        .route("/languages", get(handlers::list_languages))
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
}
