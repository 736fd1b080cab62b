//! HTTP client that opens long-lived stream connections.
//!
//! Each call performs one authenticated GET, checks the status, and wraps the
//! response body in a [`StatusStream`]. Initial connection attempts are
//! retried on timeouts, connect failures and server-side errors; after that
//! the stream is the caller's (or [`StreamDriver`](crate::stream::driver::StreamDriver)'s)
//! to drive.

use std::io;
use std::time::Duration;

use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::{StreamExt, TryStreamExt};
use reqwest::header::{HeaderValue, InvalidHeaderValue, AUTHORIZATION};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tokio_util::io::StreamReader;
use tracing::debug;

use crate::retry::{retry_async, RetryPolicy};
use crate::stream::reader::StatusStream;

const ERROR_BODY_SNIPPET_LEN: usize = 220;
/// Public sample of all statuses.
pub const SAMPLE_ENDPOINT: &str = "https://stream.twitter.com/1.1/statuses/sample.json";
/// Statuses matching a [`FilterQuery`].
pub const FILTER_ENDPOINT: &str = "https://stream.twitter.com/1.1/statuses/filter.json";
/// Account-scoped user stream.
pub const USER_ENDPOINT: &str = "https://userstream.twitter.com/1.1/user.json";

/// Buffered reader over a streaming HTTP response body.
pub type ResponseBody = StreamReader<BoxStream<'static, io::Result<Bytes>>, Bytes>;

/// Default connection settings.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct StreamDefaults;

impl StreamDefaults {
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
    pub const MAX_ATTEMPTS: usize = 3;
    pub const BACKOFF: Duration = Duration::from_millis(250);
    pub const MAX_BACKOFF: Duration = Duration::from_secs(2);
    pub const JITTER: Duration = Duration::from_millis(100);
}

/// Options for [`StreamClient::with_options`].
#[derive(Clone, Debug)]
pub struct StreamClientOptions {
    /// TCP and TLS connect timeout. The body itself has no timeout.
    pub connect_timeout: Duration,
    /// Retry policy for opening a connection. Does not apply once the body is
    /// streaming.
    pub retry_policy: RetryPolicy,
}

impl Default for StreamClientOptions {
    fn default() -> Self {
        Self {
            connect_timeout: StreamDefaults::CONNECT_TIMEOUT,
            retry_policy: RetryPolicy {
                max_attempts: StreamDefaults::MAX_ATTEMPTS,
                initial_backoff: StreamDefaults::BACKOFF,
                max_backoff: StreamDefaults::MAX_BACKOFF,
                jitter: StreamDefaults::JITTER,
            },
        }
    }
}

/// Endpoint URLs used by a [`StreamClient`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Endpoints {
    pub sample: String,
    pub filter: String,
    pub user: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            sample: SAMPLE_ENDPOINT.to_string(),
            filter: FILTER_ENDPOINT.to_string(),
            user: USER_ENDPOINT.to_string(),
        }
    }
}

impl Endpoints {
    /// Derives all three endpoints from one base URL, as a mock server or
    /// proxy would expose them.
    pub fn from_base_url(base_url: &str) -> Self {
        let base = base_url.trim_end().trim_end_matches('/');
        Self {
            sample: format!("{base}/1.1/statuses/sample.json"),
            filter: format!("{base}/1.1/statuses/filter.json"),
            user: format!("{base}/1.1/user.json"),
        }
    }
}

/// Predicates for the filter stream.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FilterQuery {
    /// Account ids whose statuses to deliver.
    pub follow: Vec<i64>,
    /// Keywords to track.
    pub track: Vec<String>,
    /// Bounding boxes as `(longitude, latitude)` pairs, south-west corner
    /// first.
    pub locations: Vec<(f64, f64)>,
    /// Number of backlog statuses to deliver on connect.
    pub count: Option<i32>,
}

impl FilterQuery {
    /// Query tracking `keywords`.
    pub fn track<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            track: keywords.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Query following the accounts in `ids`.
    pub fn follow(ids: impl IntoIterator<Item = i64>) -> Self {
        Self {
            follow: ids.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Requests `count` backlog statuses.
    pub fn with_count(mut self, count: i32) -> Self {
        self.count = Some(count);
        self
    }

    fn validate(&self) -> Result<(), StreamClientError> {
        if self.follow.is_empty() && self.track.is_empty() && self.locations.is_empty() {
            return Err(StreamClientError::InvalidFilter(
                "at least one of follow, track, or locations must be set".to_string(),
            ));
        }
        if self.locations.len() % 2 != 0 {
            return Err(StreamClientError::InvalidFilter(
                "locations must come in south-west/north-east pairs".to_string(),
            ));
        }
        Ok(())
    }

    fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(count) = self.count {
            params.push(("count", count.to_string()));
        }
        if !self.follow.is_empty() {
            let follow: Vec<String> = self.follow.iter().map(i64::to_string).collect();
            params.push(("follow", follow.join(",")));
        }
        if !self.track.is_empty() {
            params.push(("track", self.track.join(",")));
        }
        if !self.locations.is_empty() {
            let locations: Vec<String> = self
                .locations
                .iter()
                .map(|(longitude, latitude)| format!("{longitude},{latitude}"))
                .collect();
            params.push(("locations", locations.join(",")));
        }
        params
    }
}

/// Entry point for opening stream connections.
#[derive(Clone)]
pub struct StreamClient {
    http: Client,
    token: SecretString,
    endpoints: Endpoints,
    retry_policy: RetryPolicy,
}

impl StreamClient {
    /// Creates a client with default options.
    pub fn new(token: SecretString) -> Result<Self, StreamClientError> {
        Self::with_options(token, StreamClientOptions::default())
    }

    /// Creates a client with explicit options.
    pub fn with_options(
        token: SecretString,
        options: StreamClientOptions,
    ) -> Result<Self, StreamClientError> {
        let http = Client::builder()
            .connect_timeout(options.connect_timeout)
            .build()
            .map_err(StreamClientError::Http)?;

        Ok(Self {
            http,
            token,
            endpoints: Endpoints::default(),
            retry_policy: options.retry_policy,
        })
    }

    /// Replaces the endpoint URLs.
    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Endpoint URLs in use.
    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Opens the sample stream.
    pub async fn sample(&self) -> Result<StatusStream<ResponseBody>, StreamClientError> {
        let body = self.open(&self.endpoints.sample, &[]).await?;
        Ok(StatusStream::new(body))
    }

    /// Opens the filter stream.
    pub async fn filter(
        &self,
        query: &FilterQuery,
    ) -> Result<StatusStream<ResponseBody>, StreamClientError> {
        query.validate()?;
        let body = self.open(&self.endpoints.filter, &query.to_params()).await?;
        Ok(StatusStream::new(body))
    }

    /// Opens the user stream for the authenticated account.
    pub async fn user(&self) -> Result<StatusStream<ResponseBody>, StreamClientError> {
        let body = self.open(&self.endpoints.user, &[]).await?;
        Ok(StatusStream::user(body))
    }

    async fn open(
        &self,
        endpoint: &str,
        params: &[(&'static str, String)],
    ) -> Result<ResponseBody, StreamClientError> {
        retry_async(
            &self.retry_policy,
            |attempt| async move { self.open_attempt(endpoint, params, attempt).await },
            StreamClientError::is_retryable,
        )
        .await
    }

    async fn open_attempt(
        &self,
        endpoint: &str,
        params: &[(&'static str, String)],
        attempt: usize,
    ) -> Result<ResponseBody, StreamClientError> {
        let authorization = HeaderValue::from_str(&format!("Bearer {}", self.token.expose_secret()))?;

        let response = self
            .http
            .get(endpoint)
            .query(params)
            .header(AUTHORIZATION, authorization)
            .send()
            .await
            .map_err(StreamClientError::Http)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StreamClientError::HttpStatus {
                status,
                body: summarize_error_body(&body),
            });
        }

        debug!(
            event = "stream_connected",
            endpoint,
            attempt,
            status = status.as_u16()
        );
        let body = response.bytes_stream().map_err(io::Error::other).boxed();
        Ok(StreamReader::new(body))
    }
}

/// Errors produced while opening a stream connection.
#[derive(Debug, Error)]
pub enum StreamClientError {
    /// HTTP transport error.
    #[error("request failed: {0}")]
    Http(reqwest::Error),

    /// The server refused the connection.
    #[error("http status {status}: {body}")]
    HttpStatus { status: StatusCode, body: String },

    /// Token could not be converted to a valid HTTP header value.
    #[error("invalid authorization header: {0}")]
    InvalidAuthHeader(#[from] InvalidHeaderValue),

    /// Filter query has no predicate or malformed locations.
    #[error("invalid filter query: {0}")]
    InvalidFilter(String),
}

impl StreamClientError {
    /// Returns true for failures a later attempt may not hit: timeouts,
    /// connect failures, 5xx, 420 and 429.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(err) => err.is_timeout() || err.is_connect(),
            Self::HttpStatus { status, .. } => {
                status.is_server_error()
                    || *status == StatusCode::TOO_MANY_REQUESTS
                    || status.as_u16() == 420
            }
            Self::InvalidAuthHeader(_) | Self::InvalidFilter(_) => false,
        }
    }
}

fn summarize_error_body(body: &str) -> String {
    body.trim().chars().take(ERROR_BODY_SNIPPET_LEN).collect()
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;
    use secrecy::SecretString;

    use super::{
        summarize_error_body, Endpoints, FilterQuery, StreamClient, StreamClientError,
        FILTER_ENDPOINT, SAMPLE_ENDPOINT, USER_ENDPOINT,
    };

    #[test]
    fn stream_client_uses_production_endpoints_by_default() {
        let client = StreamClient::new(SecretString::new("token".to_string())).expect("client");
        assert_eq!(client.endpoints().sample, SAMPLE_ENDPOINT);
        assert_eq!(client.endpoints().filter, FILTER_ENDPOINT);
        assert_eq!(client.endpoints().user, USER_ENDPOINT);
    }

    #[test]
    fn endpoints_from_base_url_trims_trailing_slash_and_whitespace() {
        let endpoints = Endpoints::from_base_url("http://127.0.0.1:8080/  \n");
        assert_eq!(endpoints.sample, "http://127.0.0.1:8080/1.1/statuses/sample.json");
        assert_eq!(endpoints.user, "http://127.0.0.1:8080/1.1/user.json");
    }

    #[test]
    fn filter_params_join_predicates() {
        let mut query = FilterQuery::track(["rust", "tokio"]).with_count(10);
        query.follow = vec![12, 34];
        query.locations = vec![(-122.75, 36.8), (-121.75, 37.8)];

        let params = query.to_params();
        assert_eq!(
            params,
            vec![
                ("count", "10".to_string()),
                ("follow", "12,34".to_string()),
                ("track", "rust,tokio".to_string()),
                ("locations", "-122.75,36.8,-121.75,37.8".to_string()),
            ]
        );
    }

    #[test]
    fn filter_validation_requires_a_predicate() {
        assert!(FilterQuery::default().validate().is_err());
        assert!(FilterQuery::follow([1]).validate().is_ok());

        let query = FilterQuery {
            locations: vec![(0.0, 0.0)],
            ..FilterQuery::default()
        };
        assert!(matches!(
            query.validate(),
            Err(StreamClientError::InvalidFilter(_))
        ));
    }

    #[test]
    fn retryable_statuses() {
        let retryable = |code: u16| StreamClientError::HttpStatus {
            status: StatusCode::from_u16(code).expect("status"),
            body: String::new(),
        };
        assert!(retryable(503).is_retryable());
        assert!(retryable(429).is_retryable());
        assert!(retryable(420).is_retryable());
        assert!(!retryable(401).is_retryable());
        assert!(!StreamClientError::InvalidFilter(String::new()).is_retryable());
    }

    #[test]
    fn error_body_is_truncated() {
        let body = "x".repeat(500);
        assert_eq!(summarize_error_body(&body).len(), 220);
        assert_eq!(summarize_error_body("  Unauthorized\n"), "Unauthorized");
    }
}
