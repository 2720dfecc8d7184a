use crate::config::{Credentials, HttpConfig};
use crate::error::{Error, Result};
use crate::util;
use log::debug;
use reqwest::StatusCode;

/// GET-only HTTP client that retries timeouts and server errors.
pub struct HttpFetcher {
    client: reqwest::Client,
    credentials: Option<Credentials>,
    config: HttpConfig,
}

impl HttpFetcher {
    pub fn new(config: HttpConfig, credentials: Option<Credentials>) -> HttpFetcher {
        return HttpFetcher {
            client: reqwest::Client::new(),
            credentials,
            config,
        };
    }

    pub fn config(&self) -> &HttpConfig {
        return &self.config;
    }

    /// Fetches `url`, making at most `retries + 1` attempts.
    ///
    /// A timeout or a 5xx response moves on to the next attempt after a
    /// linearly growing pause. Any other non-200 status and any transport
    /// error is returned straight away.
    pub async fn get(&self, url: &str) -> Result<String> {
        let attempts = u64::from(self.config.retries) + 1;
        let mut last_error = None;

        for attempt in 0..attempts {
            if attempt > 0 {
                debug!("Retrying request {} (attempt {}/{})", url, attempt + 1, attempts);
                tokio::time::sleep(self.config.retry_backoff * attempt as u32).await;
            }

            let err = match tokio::time::timeout(self.config.timeout, self.attempt(url)).await {
                Ok(Ok(body)) => return Ok(body),
                Ok(Err(err)) => err,
                Err(_) => Error::Timeout {
                    url: url.to_string(),
                },
            };
            if !is_retryable(&err) {
                return Err(err);
            }
            debug!("Request {} failed: {}", url, err);
            last_error = Some(err);
        }

        return Err(last_error.unwrap_or_else(|| Error::Timeout {
            url: url.to_string(),
        }));
    }

    async fn attempt(&self, url: &str) -> Result<String> {
        let mut request = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, util::user_agent());
        if let Some(credentials) = &self.credentials {
            request = request.basic_auth(&credentials.username, Some(&credentials.password));
        }

        let response = request.send().await.map_err(|e| transport_error(url, e))?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(Error::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        return response.text().await.map_err(|e| transport_error(url, e));
    }
}

fn transport_error(url: &str, source: reqwest::Error) -> Error {
    if source.is_timeout() {
        return Error::Timeout {
            url: url.to_string(),
        };
    }
    return Error::Network {
        url: url.to_string(),
        source,
    };
}

fn is_retryable(err: &Error) -> bool {
    return match err {
        Error::Timeout { .. } => true,
        Error::HttpStatus { status, .. } => *status >= 500,
        _ => false,
    };
}
