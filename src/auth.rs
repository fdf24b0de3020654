//! Account client
//!
//! Signs users up and in at the remote store and moves the session gate along

use serde::Deserialize;
use serde::Serialize;

use crate::config::Config;
use crate::error::Error;
use crate::error::Result;
use crate::remote::Http;
use crate::session::Identity;
use crate::session::SessionGate;

/// Minimum length of a password
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Credentials sent to the account endpoints
#[derive(Debug, Serialize)]
struct CredentialsRequest<'a> {
    email: &'a str,
    password: &'a str,
}

/// Answer of the account endpoints
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionResponse {
    id_token: String,
    local_id: String,
}

/// Account client
#[derive(Clone, Debug)]
pub struct AuthClient {
    /// Connection to the store
    http: Http,

    /// Gate to report sessions to
    session: SessionGate,
}

impl AuthClient {
    /// Create a client reporting to the session gate
    ///
    /// # Errors
    ///
    /// Will return `Err` when the HTTP client can not be created
    pub fn new(config: &Config, session: SessionGate) -> Result<Self> {
        Ok(Self {
            http: Http::new(config)?,
            session,
        })
    }

    /// Create an account and sign in with it
    ///
    /// # Errors
    ///
    /// Will return `Err` for invalid credentials or when the store refuses them
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<Identity> {
        self.authenticate("v1/accounts:signUp", email, password).await
    }

    /// Sign in with an existing account
    ///
    /// # Errors
    ///
    /// Will return `Err` for invalid credentials or when the store refuses them
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Identity> {
        self.authenticate("v1/accounts:signInWithPassword", email, password)
            .await
    }

    /// Sign out, nothing is sent to the store
    ///
    /// # Errors
    ///
    /// Will return `Err` when the new state can not be persisted
    pub async fn sign_out(&self) -> Result<()> {
        self.session.sign_out().await
    }

    async fn authenticate(&self, path: &str, email: &str, password: &str) -> Result<Identity> {
        validate_credentials(email, password)?;

        let request = self
            .http
            .client()
            .post(self.http.rpc_url(path)?)
            .json(&CredentialsRequest {
                email: email.trim(),
                password,
            });

        let response = self.http.send_json::<SessionResponse>(request).await?;

        let identity = Identity {
            user_id: response.local_id,
            id_token: response.id_token,
        };

        self.session.sign_in(identity.clone()).await?;

        Ok(identity)
    }
}

/// Check credentials before bothering the store
fn validate_credentials(email: &str, password: &str) -> Result<()> {
    let email = email.trim();

    let valid_email = email
        .split_once('@')
        .is_some_and(|(user, domain)| !user.is_empty() && !domain.is_empty());

    if !valid_email {
        return Err(Error::InvalidCredentials("Invalid email address".to_string()));
    }

    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(Error::InvalidCredentials(format!(
            "Password needs at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }

    Ok(())
}
