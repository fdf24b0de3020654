//! Client configuration

use std::time::Duration;

use url::Url;

use crate::error::Error;
use crate::error::Result;
use crate::local::LocalBackend;
use crate::utils::env_var;

/// Default endpoint of the remote document store
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:6000/";

/// Default deadline of a remote call
pub const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default number of notes per batch write
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Client configuration
#[derive(Clone, Debug)]
pub struct Config {
    /// Base URL of the remote document store
    pub endpoint: Url,

    /// Deadline of every remote call, expiry counts as a remote failure
    pub remote_timeout: Duration,

    /// Maximum number of notes per batch write
    pub batch_size: usize,

    /// Which local store to use
    pub local: LocalBackend,
}

impl Config {
    /// Default configuration for an endpoint
    ///
    /// # Errors
    ///
    /// Will return `Err` when the endpoint is not a valid base URL
    pub fn with_endpoint(endpoint: &str) -> Result<Self> {
        Ok(Self {
            endpoint: parse_endpoint(endpoint)?,
            remote_timeout: DEFAULT_REMOTE_TIMEOUT,
            batch_size: DEFAULT_BATCH_SIZE,
            local: LocalBackend::detect(),
        })
    }

    /// Configuration from the environment, a `.env` file is loaded first
    ///
    /// - `NOTESYNC_ENDPOINT`: base URL of the remote document store
    /// - `NOTESYNC_TIMEOUT_SECS`: deadline of a remote call
    /// - `NOTESYNC_BATCH_SIZE`: notes per batch write
    /// - `NOTESYNC_LOCAL_STORE`: `memory` or `sqlite:<path>`
    ///
    /// # Errors
    ///
    /// Will return `Err` when any of the set variables is invalid
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let endpoint = env_var("NOTESYNC_ENDPOINT");
        let mut config = Self::with_endpoint(endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT))?;

        if let Some(timeout) = env_var("NOTESYNC_TIMEOUT_SECS") {
            let seconds = timeout
                .parse::<u64>()
                .ok()
                .filter(|seconds| *seconds > 0)
                .ok_or_else(|| {
                    Error::Config(format!("Invalid NOTESYNC_TIMEOUT_SECS `{timeout}`"))
                })?;

            config.remote_timeout = Duration::from_secs(seconds);
        }

        if let Some(batch_size) = env_var("NOTESYNC_BATCH_SIZE") {
            config.batch_size = batch_size
                .parse::<usize>()
                .ok()
                .filter(|batch_size| *batch_size > 0)
                .ok_or_else(|| {
                    Error::Config(format!("Invalid NOTESYNC_BATCH_SIZE `{batch_size}`"))
                })?;
        }

        if let Some(local) = env_var("NOTESYNC_LOCAL_STORE") {
            config.local = LocalBackend::parse(&local).ok_or_else(|| {
                Error::Config(format!("Invalid NOTESYNC_LOCAL_STORE `{local}`"))
            })?;
        }

        Ok(config)
    }
}

/// Parse an endpoint, making sure relative paths join below it
fn parse_endpoint(endpoint: &str) -> Result<Url> {
    let mut endpoint =
        Url::parse(endpoint).map_err(|err| Error::Config(format!("Invalid endpoint: {err}")))?;

    if endpoint.cannot_be_a_base() {
        return Err(Error::Config(format!("Endpoint `{endpoint}` can not be a base")));
    }

    if !endpoint.path().ends_with('/') {
        let path = format!("{}/", endpoint.path());
        endpoint.set_path(&path);
    }

    Ok(endpoint)
}
