use reqwest::{Client, RequestBuilder};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::{AgentConfig, AgentError};

/// Default `retry-after` when a 429 carries no usable header
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Utility for issuing a single JSON request to a provider.
///
/// Never retries: the refinement loop treats every failure as terminal.
pub struct HttpTransport;

impl HttpTransport {
    /// Send a prepared request and decode the JSON body of a successful reply
    pub async fn send_json(
        request: RequestBuilder,
        config: &AgentConfig,
    ) -> Result<(serde_json::Value, Duration), AgentError> {
        let request = match config.timeout {
            Some(timeout) => request.timeout(timeout),
            None => request,
        };

        let start = Instant::now();
        let response = request
            .send()
            .await
            .map_err(|e| Self::map_send_error(e, config))?;

        let status = response.status().as_u16();
        debug!(status, elapsed_ms = start.elapsed().as_millis(), "Provider responded");

        if status == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<u64>().ok())
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
            return Err(AgentError::RateLimited {
                retry_after: Duration::from_secs(retry_after),
            });
        }

        if !response.status().is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AgentError::Api {
                status,
                message: truncate(&message, 500).to_string(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| Self::map_send_error(e, config))?;
        let value = serde_json::from_str(&body).map_err(|e| {
            AgentError::InvalidResponse(format!(
                "response body is not JSON ({}): {}",
                e,
                truncate(&body, 200)
            ))
        })?;

        Ok((value, start.elapsed()))
    }

    pub fn client() -> Client {
        Client::new()
    }

    fn map_send_error(e: reqwest::Error, config: &AgentConfig) -> AgentError {
        if e.is_timeout() {
            AgentError::Timeout(config.timeout.unwrap_or_default())
        } else {
            AgentError::Network(e)
        }
    }
}

fn truncate(s: &str, max_len: usize) -> &str {
    if s.len() <= max_len {
        return s;
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
