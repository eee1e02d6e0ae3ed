//! HTTP send helper with failure classification and optional retry.
//!
//! Every gateway read goes through [`send_json`] instead of calling
//! `reqwest::RequestBuilder::send()` directly, so that each response is
//! classified the same way:
//!
//! * connection errors, timeouts, HTTP 429 and 5xx are transient and
//!   retried up to `max_retries` times with exponential backoff, then
//!   reported as [`GatewayError::Unavailable`];
//! * HTTP 404 is reported as [`Fetched::NotFound`] so callers can treat
//!   absence as a domain outcome;
//! * any other 4xx is [`GatewayError::Unavailable`] without retry;
//! * a 2xx body that is not JSON is [`GatewayError::Malformed`] without
//!   retry.
//!
//! ```ignore
//! let fetched = retry::send_json(DataService::IndexReading, 0, || {
//!     client.get(&url).timeout(timeout)
//! })
//! .await?;
//! ```

use std::time::Duration;

use crate::{DataService, GatewayError};

/// Maximum length of the response body preview included in error logs.
const BODY_PREVIEW_LEN: usize = 300;

/// Upper bound on a single backoff delay.
const MAX_BACKOFF: Duration = Duration::from_secs(8);

/// Outcome of a successful exchange with a service.
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched {
    /// A 2xx response with a JSON body.
    Body(serde_json::Value),
    /// The service answered 404 for this key.
    NotFound,
}

/// Sends a request and parses the response body as JSON.
///
/// The `build_request` closure is called on each attempt to construct a
/// fresh [`reqwest::RequestBuilder`], since builders are consumed by
/// `.send()`.
///
/// # Errors
///
/// Returns [`GatewayError::Unavailable`] on transport failure or a non-2xx
/// status other than 404, and [`GatewayError::Malformed`] if a 2xx body is
/// not valid JSON.
#[allow(clippy::future_not_send)]
pub async fn send_json<F>(
    service: DataService,
    max_retries: u32,
    build_request: F,
) -> Result<Fetched, GatewayError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let Some(response) = send_inner(service, &build_request, max_retries).await? else {
        return Ok(Fetched::NotFound);
    };

    let url = response.url().to_string();
    let status = response.status();

    let text = response
        .text()
        .await
        .map_err(|e| GatewayError::Unavailable {
            service,
            message: format!("failed to read response body from {url}: {e}"),
        })?;

    match serde_json::from_str(&text) {
        Ok(value) => Ok(Fetched::Body(value)),
        Err(json_err) => {
            let preview = if text.len() > BODY_PREVIEW_LEN {
                format!(
                    "{}...",
                    text.chars().take(BODY_PREVIEW_LEN).collect::<String>()
                )
            } else {
                text.clone()
            };
            log::error!(
                "{service}: JSON parse failed\n  \
                 url: {url}\n  \
                 status: {status}\n  \
                 received: {} bytes\n  \
                 parse error: {json_err}\n  \
                 body preview: {preview}",
                text.len(),
            );
            Err(GatewayError::Malformed {
                service,
                message: format!("JSON parse failed: {json_err}"),
            })
        }
    }
}

/// Core retry loop. Returns `Ok(None)` for HTTP 404 and `Ok(Some(response))`
/// for any 2xx/3xx response.
#[allow(clippy::future_not_send)]
async fn send_inner<F>(
    service: DataService,
    build_request: &F,
    max_retries: u32,
) -> Result<Option<reqwest::Response>, GatewayError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut attempt = 0;

    loop {
        if attempt > 0 {
            let delay = backoff(attempt);
            log::warn!("{service}: retry {attempt}/{max_retries} in {delay:?}...");
            tokio::time::sleep(delay).await;
        }

        let retries_left = attempt < max_retries;
        attempt += 1;

        match build_request().send().await {
            Err(e) => {
                if is_transient(&e) && retries_left {
                    log::warn!("{service}: transient error: {e}");
                    continue;
                }
                return Err(GatewayError::Unavailable {
                    service,
                    message: e.to_string(),
                });
            }
            Ok(response) => match classify_status(response.status()) {
                StatusClass::Success => return Ok(Some(response)),
                StatusClass::NotFound => return Ok(None),
                StatusClass::Transient if retries_left => {
                    log::warn!("{service}: HTTP {}", response.status());
                }
                StatusClass::Transient | StatusClass::Permanent => {
                    return Err(GatewayError::Unavailable {
                        service,
                        message: format!("HTTP {}", response.status()),
                    });
                }
            },
        }
    }
}

/// How a response status is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// 2xx or 3xx.
    Success,
    /// 404: the key has no record.
    NotFound,
    /// 429 or 5xx: worth retrying.
    Transient,
    /// Any other 4xx.
    Permanent,
}

/// Classifies an HTTP status code.
#[must_use]
pub fn classify_status(status: reqwest::StatusCode) -> StatusClass {
    if status == reqwest::StatusCode::NOT_FOUND {
        StatusClass::NotFound
    } else if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        StatusClass::Transient
    } else if status.is_client_error() {
        StatusClass::Permanent
    } else {
        StatusClass::Success
    }
}

/// Exponential backoff: 1s, 2s, 4s, capped at [`MAX_BACKOFF`].
fn backoff(attempt: u32) -> Duration {
    let secs = 1u64 << attempt.saturating_sub(1).min(3);
    Duration::from_secs(secs).min(MAX_BACKOFF)
}

/// Returns `true` if the error is likely transient and worth retrying.
fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || e.is_request() || e.is_body()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn classifies_statuses() {
        assert_eq!(classify_status(StatusCode::OK), StatusClass::Success);
        assert_eq!(classify_status(StatusCode::NOT_FOUND), StatusClass::NotFound);
        assert_eq!(
            classify_status(StatusCode::SERVICE_UNAVAILABLE),
            StatusClass::Transient
        );
        assert_eq!(
            classify_status(StatusCode::TOO_MANY_REQUESTS),
            StatusClass::Transient
        );
        assert_eq!(classify_status(StatusCode::BAD_REQUEST), StatusClass::Permanent);
    }

    #[test]
    fn backoff_doubles_and_caps() {
        assert_eq!(backoff(1), Duration::from_secs(1));
        assert_eq!(backoff(2), Duration::from_secs(2));
        assert_eq!(backoff(3), Duration::from_secs(4));
        assert_eq!(backoff(10), MAX_BACKOFF);
    }

    #[tokio::test]
    async fn unreachable_host_is_unavailable() {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(200))
            .build()
            .unwrap();

        let result = send_json(DataService::IndexReading, 0, || {
            client
                .get("http://127.0.0.1:9/api/v1/ndvi/1/1")
                .timeout(Duration::from_millis(500))
        })
        .await;

        assert!(matches!(
            result,
            Err(GatewayError::Unavailable {
                service: DataService::IndexReading,
                ..
            })
        ));
    }
}
