//! HTTP plumbing shared by the document and account clients

use std::time::Duration;

use percent_encoding::AsciiSet;
use percent_encoding::NON_ALPHANUMERIC;
use percent_encoding::utf8_percent_encode;
use reqwest::Client;
use reqwest::RequestBuilder;
use reqwest::Response;
use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::config::Config;
use crate::error::Error;
use crate::error::Result;

/// Characters left alone in a path segment
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Error body of the remote store
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetails,
}

#[derive(Debug, Deserialize)]
struct ErrorDetails {
    message: String,
}

/// HTTP client bound to the endpoint of the remote store
#[derive(Clone, Debug)]
pub(crate) struct Http {
    /// Connection pool
    client: Client,

    /// Base URL, always ending in `/`
    endpoint: Url,

    /// Deadline of every call
    timeout: Duration,
}

impl Http {
    /// Create the client for a configuration
    pub(crate) fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|err| Error::Config(format!("Could not create HTTP client: {err}")))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            timeout: config.remote_timeout,
        })
    }

    /// URL of a path below the endpoint, path segments are escaped
    pub(crate) fn url(&self, segments: &[&str]) -> Result<Url> {
        let path = segments
            .iter()
            .map(|segment| utf8_percent_encode(segment, PATH_SEGMENT).to_string())
            .collect::<Vec<_>>()
            .join("/");

        self.endpoint
            .join(&path)
            .map_err(|err| Error::Config(format!("Invalid URL for `{path}`: {err}")))
    }

    /// URL of an RPC-style path, for example `v1/documents:commit`
    pub(crate) fn rpc_url(&self, path: &str) -> Result<Url> {
        self.endpoint
            .join(path)
            .map_err(|err| Error::Config(format!("Invalid URL for `{path}`: {err}")))
    }

    /// The underlying client, to build requests
    pub(crate) fn client(&self) -> &Client {
        &self.client
    }

    /// Send a request, within the deadline
    ///
    /// Non-success answers become [`Error::Rejected`]
    pub(crate) async fn send(&self, request: RequestBuilder) -> Result<Response> {
        self.within_deadline(exchange(request)).await
    }

    /// Send a request and parse its JSON answer, all within one deadline
    pub(crate) async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        self.within_deadline(async {
            exchange(request)
                .await?
                .json::<T>()
                .await
                .map_err(transport_error)
        })
        .await
    }

    async fn within_deadline<T>(&self, call: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| Error::Timeout)?
    }
}

/// Send a request, reading the error body of a non-success answer
async fn exchange(request: RequestBuilder) -> Result<Response> {
    let response = request.send().await.map_err(transport_error)?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = match response.json::<ErrorBody>().await {
        Ok(body) => body.error.message,
        Err(_) => status
            .canonical_reason()
            .unwrap_or("Unknown error")
            .to_string(),
    };

    Err(Error::Rejected {
        status: status.as_u16(),
        message,
    })
}

/// Is this the store saying the token is not (or no longer) valid?
pub(crate) fn is_unauthenticated(err: &Error) -> bool {
    matches!(err, Error::Rejected { status, .. } if *status == StatusCode::UNAUTHORIZED.as_u16())
}

/// Is this the store saying the document does not exist?
pub(crate) fn is_not_found(err: &Error) -> bool {
    matches!(err, Error::Rejected { status, .. } if *status == StatusCode::NOT_FOUND.as_u16())
}

fn transport_error(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::Timeout
    } else if err.is_decode() {
        Error::Codec(err.to_string())
    } else {
        Error::Unreachable(err.to_string())
    }
}
