//! Periodic forwarding of the run summary to an upstream collector.
//!
//! Best effort: a failed post is logged and the next tick tries again after
//! the same interval. There is no backoff.

use crate::config::ForwardingInfo;
use crate::error::{RecorderError, RecorderResult};
use crate::model::RunSummary;
use crate::recorder::ResultRecorder;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

const FORWARD_TIMEOUT: Duration = Duration::from_secs(30);

/// Resolved forwarding settings, captured once when the worker starts.
#[derive(Debug)]
pub struct ForwardTarget {
    client: reqwest::Client,
    url: String,
    headers: HeaderMap,
    interval: Duration,
}

impl ForwardTarget {
    pub fn new(info: &ForwardingInfo) -> RecorderResult<Self> {
        let interval = info.interval()?;
        let headers = merged_headers(info)?;
        let client = reqwest::Client::builder()
            .timeout(FORWARD_TIMEOUT)
            .build()
            .map_err(|err| RecorderError::server(format!("failed to build http client: {err}")))?;
        Ok(Self {
            client,
            url: info.url.clone(),
            headers,
            interval,
        })
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Post one snapshot. Never fails: problems are logged.
    pub async fn forward(&self, summary: &RunSummary) {
        let body = match serde_json::to_vec(summary) {
            Ok(body) => body,
            Err(err) => {
                tracing::error!(error = %err, "failed to encode summary for forwarding");
                return;
            }
        };
        let sent = self
            .client
            .post(&self.url)
            .headers(self.headers.clone())
            .body(body)
            .send()
            .await;
        match sent {
            Ok(response) if response.status().is_success() => {
                tracing::debug!(url = %self.url, "summary forwarded");
            }
            Ok(response) => {
                tracing::warn!(url = %self.url, status = %response.status(), "collector rejected summary");
            }
            Err(err) => {
                tracing::error!(url = %self.url, error = %err, "failed to forward summary");
            }
        }
    }
}

/// `Content-Type: application/json`, overridden or extended by the
/// configured headers.
pub fn merged_headers(info: &ForwardingInfo) -> RecorderResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    for (name, value) in &info.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|err| RecorderError::config(format!("invalid header name {name}: {err}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|err| RecorderError::config(format!("invalid value for {name}: {err}")))?;
        headers.insert(name, value);
    }
    Ok(headers)
}

/// Worker loop: capture settings, signal `ready`, then post, sleep, repeat
/// until cancelled.
pub(crate) async fn run_forwarder(
    recorder: Arc<ResultRecorder>,
    info: ForwardingInfo,
    cancel: CancellationToken,
    ready: oneshot::Sender<RecorderResult<()>>,
) {
    let target = match ForwardTarget::new(&info) {
        Ok(target) => target,
        Err(err) => {
            let _ = ready.send(Err(err));
            return;
        }
    };
    let _ = ready.send(Ok(()));
    tracing::info!(url = %target.url, interval = ?target.interval, "summary forwarder started");

    loop {
        let summary = recorder.summary();
        tokio::select! {
            () = cancel.cancelled() => break,
            () = target.forward(&summary) => {}
        }
        tokio::select! {
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(target.interval) => {}
        }
    }
    tracing::info!("summary forwarder stopped");
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn configured_headers_override_content_type() {
        let mut info = ForwardingInfo::new("http://collector/runs", Duration::from_secs(1));
        info.headers
            .insert("Content-Type".to_string(), "application/vnd.run+json".to_string());
        info.headers
            .insert("X-Run-Token".to_string(), "abc".to_string());
        let headers = merged_headers(&info).unwrap();
        assert_eq!(headers.get(CONTENT_TYPE).unwrap(), "application/vnd.run+json");
        assert_eq!(headers.get("x-run-token").unwrap(), "abc");
        assert_eq!(headers.len(), 2);
    }

    #[test]
    fn invalid_header_name_is_a_config_error() {
        let mut info = ForwardingInfo::new("http://collector/runs", Duration::from_secs(1));
        info.headers.insert("bad header".to_string(), "x".to_string());
        assert!(matches!(
            merged_headers(&info),
            Err(RecorderError::Config { .. })
        ));
    }
}
