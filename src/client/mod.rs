//! Upstream commerce API client.
//!
//! Cursor-paginated HTTP client with a shared token-bucket rate limit and
//! retry with exponential backoff for transient failures. HTTP 429 and 5xx
//! responses and transport errors are retried up to the configured attempt
//! count; other 4xx responses and undecodable payloads fail immediately.

pub mod rate_limit;
pub mod records;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use metrics::counter;
use rand::{Rng, thread_rng};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tokio::time::sleep;
use tracing::{debug, warn};
use url::Url;

use crate::config::UpstreamConfig;
use crate::error::SyncError;
pub use rate_limit::RateLimiter;

/// Base backoff before the first retry.
const RETRY_BASE: Duration = Duration::from_millis(500);
/// Upper bound on a single retry backoff.
const RETRY_MAX: Duration = Duration::from_secs(30);

/// Optional filters applied to an upstream list call.
#[derive(Debug, Clone, Default)]
pub struct FetchFilter {
    pub begin_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub location_id: Option<String>,
}

impl FetchFilter {
    /// Filter for a half-open date window `[begin, end)`.
    pub fn date_range(begin: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            begin_time: Some(begin),
            end_time: Some(end),
            location_id: None,
        }
    }
}

/// One page of raw upstream records plus the cursor for the next page.
#[derive(Debug, Clone, Deserialize)]
pub struct Page {
    #[serde(default)]
    pub records: Vec<JsonValue>,
    #[serde(default)]
    pub cursor: Option<String>,
}

/// Client for the upstream paginated commerce API.
pub struct UpstreamClient {
    http: reqwest::Client,
    config: UpstreamConfig,
    limiter: Arc<RateLimiter>,
}

impl UpstreamClient {
    /// Create a client sharing the given process-wide rate limiter.
    pub fn new(config: UpstreamConfig, limiter: Arc<RateLimiter>) -> Result<Self, SyncError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("merchsync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(SyncError::from_transport)?;
        Ok(Self {
            http,
            config,
            limiter,
        })
    }

    /// The shared rate limiter, for callers that issue their own requests.
    pub fn limiter(&self) -> Arc<RateLimiter> {
        Arc::clone(&self.limiter)
    }

    /// Fetch a single page, retrying transient failures with backoff.
    pub async fn fetch_page(
        &self,
        path: &str,
        filter: &FetchFilter,
        cursor: Option<&str>,
    ) -> Result<Page, SyncError> {
        let url = self.build_url(path, filter, cursor)?;
        let mut last_transient: Option<SyncError> = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let backoff = retry_backoff(attempt, last_transient.as_ref());
                counter!("upstream_retries_total", "path" => path.to_string()).increment(1);
                warn!(
                    path,
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    "Retrying upstream request after transient failure"
                );
                sleep(backoff).await;
            }

            self.limiter.acquire().await;
            counter!("upstream_requests_total", "path" => path.to_string()).increment(1);

            match self.send(url.clone()).await {
                Ok(page) => return Ok(page),
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => last_transient = Some(err),
            }
        }

        Err(last_transient.unwrap_or_else(|| SyncError::TransientNetwork {
            message: format!("upstream request to {path} failed"),
            retry_after_secs: None,
        }))
    }

    /// Drain every page for the given path and filter.
    pub async fn fetch_all(
        &self,
        path: &str,
        filter: &FetchFilter,
    ) -> Result<Vec<JsonValue>, SyncError> {
        let mut records = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let page = self.fetch_page(path, filter, cursor.as_deref()).await?;
            debug!(
                path,
                page_records = page.records.len(),
                has_more = page.cursor.is_some(),
                "Fetched upstream page"
            );
            records.extend(page.records);
            match page.cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        Ok(records)
    }

    fn build_url(
        &self,
        path: &str,
        filter: &FetchFilter,
        cursor: Option<&str>,
    ) -> Result<Url, SyncError> {
        let mut url = Url::parse(&format!(
            "{}/v1/{}",
            self.config.base_url.trim_end_matches('/'),
            path
        ))
        .map_err(|e| SyncError::FatalRequest {
            status: 0,
            message: format!("invalid upstream url: {e}"),
        })?;

        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("limit", &self.config.page_size.to_string());
            if let Some(cursor) = cursor {
                pairs.append_pair("cursor", cursor);
            }
            if let Some(begin) = &filter.begin_time {
                pairs.append_pair("begin_time", &begin.to_rfc3339());
            }
            if let Some(end) = &filter.end_time {
                pairs.append_pair("end_time", &end.to_rfc3339());
            }
            if let Some(location_id) = &filter.location_id {
                pairs.append_pair("location_id", location_id);
            }
        }

        Ok(url)
    }

    async fn send(&self, url: Url) -> Result<Page, SyncError> {
        let mut request = self.http.get(url);
        if let Some(token) = &self.config.access_token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }

        let response = request.send().await.map_err(SyncError::from_transport)?;
        let status = response.status();

        if status.is_success() {
            let body = response.text().await.map_err(SyncError::from_transport)?;
            return serde_json::from_str(&body)
                .map_err(|e| SyncError::MalformedPayload(format!("{e} in list response")));
        }

        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok());
            return Err(SyncError::TransientNetwork {
                message: "upstream rate limited the request".to_string(),
                retry_after_secs: retry_after,
            });
        }

        let body = response.text().await.unwrap_or_default();
        if status.is_server_error() {
            Err(SyncError::TransientNetwork {
                message: format!("upstream server error {status}: {}", truncate(&body)),
                retry_after_secs: None,
            })
        } else {
            Err(SyncError::FatalRequest {
                status: status.as_u16(),
                message: truncate(&body),
            })
        }
    }
}

/// Exponential backoff with jitter; a server Retry-After hint wins when larger.
fn retry_backoff(attempt: u32, last_error: Option<&SyncError>) -> Duration {
    let exp = RETRY_BASE
        .saturating_mul(2_u32.saturating_pow(attempt.saturating_sub(1)))
        .min(RETRY_MAX);
    let jitter = exp.mul_f64(thread_rng().gen_range(0.0..0.1));
    let mut backoff = exp + jitter;

    if let Some(SyncError::TransientNetwork {
        retry_after_secs: Some(secs),
        ..
    }) = last_error
    {
        backoff = backoff.max(Duration::from_secs(*secs));
    }

    backoff
}

fn truncate(body: &str) -> String {
    if body.chars().count() > 200 {
        let prefix: String = body.chars().take(200).collect();
        format!("{prefix}...")
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_exponentially() {
        let b1 = retry_backoff(1, None);
        let b2 = retry_backoff(2, None);
        let b3 = retry_backoff(3, None);
        assert!(b1 >= Duration::from_millis(500) && b1 <= Duration::from_millis(550));
        assert!(b2 >= Duration::from_millis(1000) && b2 <= Duration::from_millis(1100));
        assert!(b3 >= Duration::from_millis(2000) && b3 <= Duration::from_millis(2200));
    }

    #[test]
    fn retry_after_hint_takes_precedence_when_larger() {
        let err = SyncError::TransientNetwork {
            message: "rate limited".into(),
            retry_after_secs: Some(10),
        };
        let backoff = retry_backoff(1, Some(&err));
        assert!(backoff >= Duration::from_secs(10));
    }

    #[test]
    fn backoff_is_capped() {
        let backoff = retry_backoff(20, None);
        assert!(backoff <= RETRY_MAX + RETRY_MAX.mul_f64(0.1));
    }

    #[test]
    fn page_parses_with_missing_cursor() {
        let page: Page = serde_json::from_str(r#"{"records": [{"id": "a"}]}"#).unwrap();
        assert_eq!(page.records.len(), 1);
        assert!(page.cursor.is_none());
    }
}
