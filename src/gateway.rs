//! Fetch gateway: the only place that talks to the report backend.
//!
//! The gateway is a pure I/O boundary. It authenticates, maps HTTP outcomes
//! onto [`FetchError`], and validates the payload shape. It never retries and
//! never writes the cache.

use async_trait::async_trait;
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::error::{Error, FetchError};
use crate::models::{Period, ReportPayload};
use crate::session::SessionStore;

#[async_trait]
pub trait ReportFetcher: Send + Sync {
    async fn fetch_report(&self, period: Period) -> Result<ReportPayload, FetchError>;
}

/// reqwest-backed fetcher for `GET {base}/api/dashboard/summary?period=..`.
pub struct HttpReportFetcher {
    client: reqwest::Client,
    base_url: String,
    session: Arc<dyn SessionStore>,
}

impl HttpReportFetcher {
    pub fn new(
        base_url: &str,
        session: Arc<dyn SessionStore>,
        timeout: Duration,
    ) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(2)
            .timeout(timeout)
            .build()?;

        // add http:// if not present
        let trimmed = base_url.trim().trim_end_matches('/');
        let base_url = if trimmed.starts_with("http") {
            trimmed.to_string()
        } else {
            format!("http://{}", trimmed)
        };

        Ok(Self {
            client,
            base_url,
            session,
        })
    }

    fn report_url(&self, period: Period) -> String {
        format!("{}/api/dashboard/summary?period={}", self.base_url, period)
    }
}

#[async_trait]
impl ReportFetcher for HttpReportFetcher {
    async fn fetch_report(&self, period: Period) -> Result<ReportPayload, FetchError> {
        let token = self.session.credential().ok_or(FetchError::AuthExpired)?;
        let url = self.report_url(period);
        debug!(%url, "fetching report");

        let resp = self
            .client
            .get(&url)
            .bearer_auth(token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        check_status(status, &body)?;
        decode_payload(&body)
    }
}

pub(crate) fn check_status(status: StatusCode, body: &str) -> Result<(), FetchError> {
    if status == StatusCode::UNAUTHORIZED {
        return Err(FetchError::AuthExpired);
    }
    if !status.is_success() {
        let mut message: String = body.chars().take(200).collect();
        if message.trim().is_empty() {
            message = status.canonical_reason().unwrap_or("unknown").to_string();
        }
        return Err(FetchError::Status {
            status: status.as_u16(),
            message,
        });
    }
    Ok(())
}

pub(crate) fn decode_payload(body: &str) -> Result<ReportPayload, FetchError> {
    let payload: ReportPayload =
        serde_json::from_str(body).map_err(|e| FetchError::Malformed(e.to_string()))?;
    payload.validate().map_err(FetchError::Malformed)?;
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MemorySessionStore;

    #[test]
    fn unauthorized_is_auth_expired() {
        let err = check_status(StatusCode::UNAUTHORIZED, "").unwrap_err();
        assert_eq!(err, FetchError::AuthExpired);
        assert!(!err.is_transient());
    }

    #[test]
    fn other_failures_are_transient() {
        let err = check_status(StatusCode::BAD_GATEWAY, "").unwrap_err();
        assert!(err.is_transient());
        assert_eq!(
            err,
            FetchError::Status {
                status: 502,
                message: "Bad Gateway".to_string()
            }
        );

        let err = check_status(StatusCode::FORBIDDEN, "nope").unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 403, .. }));
        assert!(check_status(StatusCode::OK, "").is_ok());
    }

    #[test]
    fn missing_fields_are_malformed_not_rendered() {
        let err = decode_payload(r#"{"balance": "R$ 1,00"}"#).unwrap_err();
        assert!(matches!(err, FetchError::Malformed(_)));
        assert!(err.is_transient());
    }

    #[test]
    fn invalid_shape_is_malformed() {
        let body = r#"{
            "balance": "R$ 1,00",
            "charts": {
                "byCategory": {"labels": ["a"], "datasets": [{"label": "x", "data": [1, 2]}]},
                "timeline": {"labels": []}
            }
        }"#;
        assert!(matches!(decode_payload(body), Err(FetchError::Malformed(_))));
    }

    #[tokio::test]
    async fn no_credential_fails_before_any_request() {
        let session = Arc::new(MemorySessionStore::default());
        let fetcher =
            HttpReportFetcher::new("127.0.0.1:9", session, Duration::from_secs(1)).unwrap();
        assert_eq!(fetcher.report_url(Period::Week), "http://127.0.0.1:9/api/dashboard/summary?period=7d");
        assert_eq!(fetcher.fetch_report(Period::Week).await, Err(FetchError::AuthExpired));
    }
}
