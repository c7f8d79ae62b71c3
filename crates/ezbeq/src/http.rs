use std::time::Duration;

use reqwest::{Method, StatusCode};
use tracing::debug;

use crate::{EzBeqClient, EzBeqError};

/// Fixed-attempt retry with a constant pause between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            delay: Duration::from_secs(2),
        }
    }
}

impl EzBeqClient {
    /// Send a request under the retry policy and return the response body.
    ///
    /// Transport and body-read failures are retried, as is any status outside
    /// `200..204`. A 404 is returned at once and never retried.
    pub(crate) async fn send_with_retry(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&serde_json::Value>,
    ) -> Result<String, EzBeqError> {
        let url = format!("{}{}", self.base_url, path);
        let attempts = self.retry.attempts.max(1);
        let mut last_err: Option<EzBeqError> = None;

        for attempt in 1..=attempts {
            let mut request = self.client.request(method.clone(), &url);
            if !query.is_empty() {
                request = request.query(query);
            }
            if let Some(body) = body {
                request = request.json(body);
            }

            match request.send().await {
                Err(e) => {
                    debug!(%method, url = %url, attempt, error = %e, "ezbeq request failed");
                    last_err = Some(EzBeqError::Network(e.to_string()));
                }
                Ok(resp) => {
                    let status = resp.status();
                    if status == StatusCode::NOT_FOUND {
                        return Err(EzBeqError::NotFound {
                            endpoint: path.to_string(),
                        });
                    }
                    match resp.text().await {
                        Err(e) => {
                            debug!(url = %url, attempt, error = %e, "reading ezbeq response failed");
                            last_err = Some(EzBeqError::Network(format!("read body: {e}")));
                        }
                        Ok(text) if (200..204).contains(&status.as_u16()) => return Ok(text),
                        Ok(text) => {
                            debug!(url = %url, attempt, status = status.as_u16(), "ezbeq returned error status");
                            last_err = Some(EzBeqError::Status {
                                status: status.as_u16(),
                                body: text,
                            });
                        }
                    }
                }
            }

            if attempt < attempts {
                tokio::time::sleep(self.retry.delay).await;
            }
        }

        Err(last_err.unwrap_or_else(|| EzBeqError::Network("no attempt made".into())))
    }
}
