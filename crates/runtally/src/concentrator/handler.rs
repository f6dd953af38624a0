//! Progress postback endpoint.

use crate::error::RecorderError;
use crate::model::ProgressInfo;
use crate::recorder::ResultRecorder;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use std::backtrace::Backtrace;
use std::sync::Arc;

/// Handle one postback. The path is ignored.
///
/// A `POST` with a positive `Content-Length` is decoded as a
/// [`ProgressInfo`] and merged into the recorder. Anything that fails to
/// decode gets a `500` with a diagnostic body; the listener keeps serving.
/// A `POST` without a usable length is accepted and changes nothing.
pub(crate) async fn handle_postback(
    State(recorder): State<Arc<ResultRecorder>>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if method != Method::POST {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    let length = content_length(&headers);
    if length == 0 {
        return StatusCode::OK.into_response();
    }
    let payload = body.get(..length).unwrap_or(&body);

    let decoded = ProgressInfo::from_json_slice(payload)
        .map_err(|err| RecorderError::protocol(format!("invalid progress postback: {err}")));
    match decoded {
        Ok(progress) => {
            tracing::debug!(task = %progress.id, status = ?progress.status, "progress postback");
            recorder.post_task_progress([progress]);
            StatusCode::OK.into_response()
        }
        Err(err) => {
            tracing::error!(error = %err, "rejected progress postback");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                diagnostic_body(&err),
            )
                .into_response()
        }
    }
}

fn content_length(headers: &HeaderMap) -> usize {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(0)
}

fn diagnostic_body(err: &dyn std::error::Error) -> String {
    let mut lines = vec![
        "Error processing progress postback.".to_string(),
        "EXCEPTION:".to_string(),
        err.to_string(),
    ];
    let mut source = err.source();
    while let Some(cause) = source {
        lines.push(format!("caused by: {cause}"));
        source = cause.source();
    }
    lines.push(Backtrace::force_capture().to_string());
    lines.join("\n")
}
