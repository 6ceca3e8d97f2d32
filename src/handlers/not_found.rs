use axum::http::{Method, Uri};
use log::debug;

use crate::error::ApiError;

/// Router fallback: every unmatched request gets the 404 envelope.
pub async fn not_found(method: Method, uri: Uri) -> ApiError {
    debug!("{} {}: no matching route", method, uri.path());
    ApiError::NotFound(format!(
        "The requested URL {} was not found on the server",
        uri.path()
    ))
}
