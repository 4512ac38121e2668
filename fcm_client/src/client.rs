//! A client connection to the clustering service.

use futures::future::{BoxFuture, FutureExt};
use reqwest::{self, StatusCode};
use std::env;
use std::time::Duration;
use tracing::{debug, debug_span};
use tracing_futures::Instrument;
use url::Url;

use crate::errors::*;
use crate::payload::ClusteringRequest;
use crate::presenter::ClusteringResult;

/// The endpoint used when none is configured. This is where the reference
/// service listens when run locally.
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:5000/run_fcm";

/// The environment variable which can override `DEFAULT_ENDPOINT`.
pub const ENDPOINT_ENV_VAR: &str = "FCM_ENDPOINT";

/// Something which can submit clustering requests. `Client` is the real
/// implementation; tests and user interfaces may supply their own.
pub trait Submit {
    /// Submit `request`, resolving once the service has answered. This is
    /// attempted exactly once.
    fn submit<'a>(
        &'a self,
        request: &'a ClusteringRequest,
    ) -> BoxFuture<'a, Result<ClusteringResult>>;
}

/// Options controlling how we talk to the service. This uses a "builder"
/// pattern, so you can write:
///
/// ```
/// use std::time::Duration;
/// use fcm_client::ClientOptions;
///
/// let options = ClientOptions::default().timeout(Duration::from_secs(120));
/// ```
#[derive(Clone, Debug, Default)]
pub struct ClientOptions {
    /// How long to wait for the whole exchange before giving up.
    timeout: Option<Duration>,
}

impl ClientOptions {
    /// Set an optional timeout, after which a submission fails with
    /// `Error::Timeout`. By default we wait as long as it takes.
    pub fn timeout<D: Into<Option<Duration>>>(mut self, timeout: D) -> Self {
        self.timeout = timeout.into();
        self
    }
}

/// A client connection to the clustering service.
#[derive(Clone, Debug)]
pub struct Client {
    endpoint: Url,
    http: reqwest::Client,
}

impl Client {
    /// Create a new `Client` which posts requests to `endpoint`.
    pub fn new(endpoint: &str) -> Result<Client> {
        Client::with_options(endpoint, &ClientOptions::default())
    }

    /// Create a new `Client`, honoring `options`.
    pub fn with_options(endpoint: &str, options: &ClientOptions) -> Result<Client> {
        let endpoint =
            Url::parse(endpoint).map_err(|source| Error::InvalidEndpoint { source })?;
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Client {
            endpoint,
            http: builder.build()?,
        })
    }

    /// Create a new `Client` using the endpoint in `FCM_ENDPOINT`, or
    /// `DEFAULT_ENDPOINT` if that isn't set.
    pub fn from_env(options: &ClientOptions) -> Result<Client> {
        match env::var(ENDPOINT_ENV_VAR) {
            Ok(endpoint) => Client::with_options(&endpoint, options),
            Err(_) => Client::with_options(DEFAULT_ENDPOINT, options),
        }
    }

    /// The URL we post requests to.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Post `request` and parse the response.
    async fn post(&self, request: &ClusteringRequest) -> Result<ClusteringResult> {
        let url = &self.endpoint;
        debug!(
            "POST {} {} ({} bytes of data)",
            url_without_credentials(url),
            request.algorithm(),
            request.data.len(),
        );
        let res = self
            .http
            .post(url.clone())
            .json(request)
            .send()
            .await
            .map_err(|e| Error::could_not_access_url(url, e))?;
        self.handle_response_and_deserialize(url, res).await
    }

    /// Handle a response from the server, deserializing it as JSON.
    async fn handle_response_and_deserialize(
        &self,
        url: &Url,
        res: reqwest::Response,
    ) -> Result<ClusteringResult> {
        if res.status().is_success() {
            let body = res
                .text()
                .await
                .map_err(|e| Error::could_not_access_url(url, e))?;
            debug!("Success body: {}", &body);
            let value = serde_json::from_str(&body)
                .map_err(|e| Error::malformed_response(url, e))?;
            Ok(ClusteringResult(value))
        } else {
            self.response_to_err(url, res).await
        }
    }

    async fn response_to_err<T>(&self, url: &Url, res: reqwest::Response) -> Result<T> {
        let status: StatusCode = res.status();
        let body = res
            .text()
            .await
            .map_err(|e| Error::could_not_access_url(url, e))?;
        debug!("Error status: {} body: {}", status, body);
        Err(Error::server_failed(url, status, body))
    }
}

impl Submit for Client {
    fn submit<'a>(
        &'a self,
        request: &'a ClusteringRequest,
    ) -> BoxFuture<'a, Result<ClusteringResult>> {
        let span = debug_span!(
            "submit",
            endpoint = %url_without_credentials(&self.endpoint),
            fcm_type = %request.algorithm(),
        );
        self.post(request).instrument(span).boxed()
    }
}

#[test]
fn invalid_endpoint_is_a_config_error() {
    let err = Client::new("not a url").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
}

#[test]
fn default_endpoint_parses() {
    let client = Client::new(DEFAULT_ENDPOINT).unwrap();
    assert_eq!(client.endpoint().path(), "/run_fcm");
}
