//! Fetching file metadata from the Drive API.
//!
//! This module defines two structs, [`DriveClient`] and [`ClientBuilder`].
//! `DriveClient` executes metadata requests and implements [`Executor`], so
//! it can be handed to a [`Dispatcher`](crate::Dispatcher) directly.
//! `ClientBuilder` exposes a finer level of granularity for building
//! a `DriveClient`.
#![allow(clippy::module_name_repetitions)]
use std::time::Duration;

use async_trait::async_trait;
use http::{
    StatusCode,
    header::{self, HeaderMap, HeaderValue},
};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use tokio::time::sleep;
use typed_builder::TypedBuilder;
use url::Url;

use crate::{ErrorKind, Executor, RemoteError, Request, Result, retry::RetryExt};

/// Default endpoint of the Drive v3 API
pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/drive/v3/";
/// Default number of retries of a failed call, 0.
///
/// Retries bypass the rate limit, so they are opt-in.
pub const DEFAULT_MAX_RETRIES: u64 = 0;
/// Default wait time before the first retry, 1 second.
pub const DEFAULT_RETRY_WAIT_TIME: Duration = Duration::from_secs(1);
/// Default user agent, `metafetch/<PKG_VERSION>`.
pub const DEFAULT_USER_AGENT: &str = concat!("metafetch/", env!("CARGO_PKG_VERSION"));

/// Builder for [`DriveClient`].
///
/// ```
/// use metafetch_lib::{ClientBuilder, Result};
///
/// # fn main() -> Result<()> {
/// let client = ClientBuilder::builder()
///     .base_url("http://localhost:8080/drive/v3/")
///     .max_retries(2u64)
///     .build()
///     .client()?;
/// # Ok(())
/// # }
/// ```
#[derive(TypedBuilder, Debug, Clone)]
#[builder(field_defaults(default, setter(into)))]
#[builder(builder_method(doc = "
Create a builder for building `ClientBuilder`.

On the builder call, call methods with same name as its fields to set their values.

Finally, call `.build()` to create the instance of `ClientBuilder`.
"))]
pub struct ClientBuilder {
    /// OAuth access token sent as bearer token with every request.
    ///
    /// The token is read once before a batch starts and never refreshed.
    token: Option<SecretString>,
    /// Endpoint of the API, e.g. `https://www.googleapis.com/drive/v3/`.
    ///
    /// Metadata of a file `ID` is requested from `{base_url}/files/ID`.
    #[builder(default = DEFAULT_BASE_URL.to_string())]
    base_url: String,
    /// Maximum number of retries per request before returning an error.
    #[builder(default = DEFAULT_MAX_RETRIES)]
    max_retries: u64,
    /// Wait time before the first retry. Doubles with every attempt.
    #[builder(default = DEFAULT_RETRY_WAIT_TIME)]
    retry_wait_time: Duration,
    /// User-agent used for requests.
    #[builder(default = DEFAULT_USER_AGENT.to_string())]
    user_agent: String,
    /// Response timeout per request.
    timeout: Option<Duration>,
    /// Sets the default [headers] for every request. See also [here].
    ///
    /// [headers]: https://docs.rs/http/latest/http/header/struct.HeaderName.html
    /// [here]: https://docs.rs/reqwest/latest/reqwest/struct.ClientBuilder.html#method.default_headers
    custom_headers: HeaderMap,
    /// Also find files on shared drives
    #[builder(default = true)]
    supports_all_drives: bool,
}

impl Default for ClientBuilder {
    #[inline]
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ClientBuilder {
    /// Instantiates a [`DriveClient`].
    ///
    /// # Errors
    ///
    /// Returns an `Err` if:
    /// - The user-agent or the token are no valid header values.
    /// - The base URL is invalid.
    /// - The request client cannot be created.
    ///   See [here](https://docs.rs/reqwest/latest/reqwest/struct.ClientBuilder.html#errors).
    pub fn client(self) -> Result<DriveClient> {
        let Self {
            token,
            base_url,
            max_retries,
            retry_wait_time,
            user_agent,
            timeout,
            custom_headers: mut headers,
            supports_all_drives,
        } = self;

        headers.insert(header::USER_AGENT, HeaderValue::from_str(&user_agent)?);
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("application/json"),
        );

        if let Some(token) = token
            .as_ref()
            .map(ExposeSecret::expose_secret)
            .filter(|token| !token.is_empty())
        {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))?;
            value.set_sensitive(true);
            headers.insert(header::AUTHORIZATION, value);
        } else {
            log::warn!("No access token given, requests are sent unauthenticated");
        }

        let builder = reqwest::ClientBuilder::new()
            .gzip(true)
            .default_headers(headers);

        let reqwest_client = (match timeout {
            Some(t) => builder.timeout(t),
            None => builder,
        })
        .build()
        .map_err(ErrorKind::BuildRequestClient)?;

        Ok(DriveClient {
            reqwest_client,
            base_url: parse_base_url(&base_url)?,
            max_retries,
            retry_wait_time,
            supports_all_drives,
        })
    }
}

/// Parse the API endpoint so that paths can be appended to it
fn parse_base_url(base_url: &str) -> Result<Url> {
    let url = Url::parse(base_url)
        .map_err(|e| ErrorKind::InvalidBaseUrl(base_url.to_string(), e.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(ErrorKind::InvalidBaseUrl(
            base_url.to_string(),
            "URL cannot be a base".to_string(),
        ));
    }
    Ok(url)
}

/// Fetches file metadata from the Drive API.
///
/// See [`ClientBuilder`] which contains sane defaults for all configuration
/// options.
#[derive(Debug, Clone)]
pub struct DriveClient {
    /// Underlying `reqwest` client instance that handles the HTTP requests.
    reqwest_client: reqwest::Client,
    /// Endpoint of the API.
    base_url: Url,
    /// Maximum number of retries per request before returning an error.
    max_retries: u64,
    /// Wait time before the first retry.
    retry_wait_time: Duration,
    /// Also find files on shared drives.
    supports_all_drives: bool,
}

/// Error body of the Drive API, e.g.
/// `{"error": {"code": 404, "message": "File not found: abc."}}`
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: Option<u16>,
    message: String,
}

/// Outcome of a single attempt
#[derive(Debug)]
enum Failure {
    /// The API answered with an error status
    Response(RemoteError),
    /// No usable response
    Transport(reqwest::Error),
}

impl RetryExt for Failure {
    fn should_retry(&self) -> bool {
        match self {
            Self::Response(e) => e.should_retry(),
            Self::Transport(e) => e.should_retry(),
        }
    }
}

impl From<Failure> for RemoteError {
    fn from(failure: Failure) -> Self {
        match failure {
            Failure::Response(e) => e,
            Failure::Transport(e) => RemoteError::transport(e.to_string()),
        }
    }
}

impl DriveClient {
    /// URL of the metadata resource for `request`
    #[must_use]
    pub fn files_url(&self, request: &Request) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["files", request.key.as_str()]);
        }
        {
            let mut query = url.query_pairs_mut();
            if let Some(fields) = &request.fields {
                query.append_pair("fields", fields.as_str());
            }
            if self.supports_all_drives {
                query.append_pair("supportsAllDrives", "true");
            }
        }
        if url.query() == Some("") {
            url.set_query(None);
        }
        url
    }

    /// Fetch the metadata for a single request, retrying transient
    /// failures.
    ///
    /// # Errors
    ///
    /// Returns the status code and message of the last failed attempt.
    pub async fn get_metadata(&self, request: &Request) -> std::result::Result<Value, RemoteError> {
        let url = self.files_url(request);
        let mut retries: u64 = 0;
        let mut wait = self.retry_wait_time;

        loop {
            match self.fetch(&url).await {
                Err(failure) if retries < self.max_retries && failure.should_retry() => {
                    log::debug!(
                        "Retrying {} in {}ms: {}",
                        request.key,
                        wait.as_millis(),
                        RemoteError::from(failure)
                    );
                    sleep(wait).await;
                    retries += 1;
                    wait *= 2;
                }
                outcome => return outcome.map_err(RemoteError::from),
            }
        }
    }

    async fn fetch(&self, url: &Url) -> std::result::Result<Value, Failure> {
        let response = self
            .reqwest_client
            .get(url.clone())
            .send()
            .await
            .map_err(Failure::Transport)?;

        let status = response.status();
        if status.is_success() {
            return response.json().await.map_err(Failure::Transport);
        }

        let body = response.text().await.unwrap_or_default();
        Err(Failure::Response(api_error(status, &body)))
    }
}

/// Build the error of a failed response, preferring the message sent by the
/// API over the canonical reason of the status code
fn api_error(status: StatusCode, body: &str) -> RemoteError {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(ApiErrorBody { error }) => {
            RemoteError::new(error.code.unwrap_or(status.as_u16()), error.message)
        }
        Err(_) => {
            let body = body.trim();
            let message = if body.is_empty() {
                status.canonical_reason().unwrap_or("Unknown status code")
            } else {
                body
            };
            RemoteError::new(status.as_u16(), message)
        }
    }
}

#[async_trait]
impl Executor for DriveClient {
    async fn execute(&self, request: &Request) -> std::result::Result<Value, RemoteError> {
        self.get_metadata(request).await
    }
}
