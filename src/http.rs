use crate::error::{Error, Result, UPSTREAM_FALLBACK};
use reqwest::{Client, header};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| Error::config(format!("build HTTP client: {e}")))?;

        Ok(Self { client })
    }

    /// POST a JSON body once and return the raw response text.
    ///
    /// Transport failures, timeouts and non-2xx statuses all come back as
    /// [`Error::Upstream`]. No retries.
    pub async fn post_json_raw(
        &self,
        url: &str,
        body: &str,
        headers: &[(&str, &str)],
    ) -> Result<String> {
        let mut req = self
            .client
            .post(url)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body.to_string());
        for (k, v) in headers {
            req = req.header(*k, *v);
        }

        match req.send().await {
            Ok(resp) => self.handle_response(resp).await,
            Err(e) => {
                warn!(
                    timeout = e.is_timeout(),
                    connect = e.is_connect(),
                    "upstream request failed: {e}"
                );
                Err(Error::upstream(UPSTREAM_FALLBACK))
            }
        }
    }

    async fn handle_response(&self, resp: reqwest::Response) -> Result<String> {
        let status = resp.status();

        if status.is_success() {
            return resp.text().await.map_err(|e| {
                warn!("reading upstream body failed: {e}");
                Error::upstream(UPSTREAM_FALLBACK)
            });
        }

        let body = resp.text().await.unwrap_or_default();
        debug!(status = status.as_u16(), %body, "upstream returned error status");
        let message = provider_error_message(&body).unwrap_or_else(|| UPSTREAM_FALLBACK.into());
        Err(Error::upstream_with_status(message, status.as_u16()))
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorDetail {
    Object { message: Option<String> },
    Text(String),
}

/// Pull `error.message` (or a bare `error` string) out of a provider error body.
pub fn provider_error_message(body: &str) -> Option<String> {
    let envelope: ErrorEnvelope = serde_json::from_str(body).ok()?;
    let message = match envelope.error {
        ErrorDetail::Object { message } => message?,
        ErrorDetail::Text(text) => text,
    };
    let message = message.trim();
    (!message.is_empty()).then(|| message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn google_error_body() {
        let body = r#"{"error":{"code":400,"message":"API key not valid. Please pass a valid API key.","status":"INVALID_ARGUMENT"}}"#;
        assert_eq!(
            provider_error_message(body).as_deref(),
            Some("API key not valid. Please pass a valid API key.")
        );
    }

    #[test]
    fn bare_string_error() {
        assert_eq!(
            provider_error_message(r#"{"error":"quota exhausted"}"#).as_deref(),
            Some("quota exhausted")
        );
    }

    #[test]
    fn unusable_bodies_yield_none() {
        assert!(provider_error_message("").is_none());
        assert!(provider_error_message("<html>Bad Gateway</html>").is_none());
        assert!(provider_error_message(r#"{"error":{"code":503}}"#).is_none());
        assert!(provider_error_message(r#"{"error":{"message":"   "}}"#).is_none());
        assert!(provider_error_message(r#"{"detail":"nope"}"#).is_none());
    }
}
