//! Account API
//!
//! Email and password accounts, answered with an ID token for the document API

use axum::Extension;
use serde::Deserialize;
use serde::Serialize;

use crate::auth::MIN_PASSWORD_LENGTH;
use crate::password::hash;
use crate::password::verify;
use crate::server::storage::CreateUserValues;
use crate::server::storage::Storage;
use crate::server::users::User;
use crate::server::users::is_valid_email;
use crate::server::users::normalize_email;

use super::Error;
use super::Form;
use super::JwtKeys;
use super::Success;
use super::current_user::TOKEN_LIFETIME;
use super::current_user::generate_token;

/// Credentials of an account
#[derive(Debug, Deserialize)]
pub struct CredentialsForm {
    /// Email address of the user
    email: String,

    /// Password of the user
    password: String,
}

/// A session for the outside world
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    /// Token to send as `Authorization: Bearer` on document calls
    id_token: String,

    /// ID of the user, the owner to put in documents
    local_id: String,

    /// Normalized email address
    email: String,

    /// Seconds until the token expires
    expires_in: String,
}

impl SessionResponse {
    fn for_user(jwt_keys: &JwtKeys, user: &User) -> Result<Self, Error> {
        Ok(Self {
            id_token: generate_token(jwt_keys, user)?,
            local_id: user.id.to_string(),
            email: user.email.clone(),
            expires_in: TOKEN_LIFETIME.to_string(),
        })
    }
}

/// Create an account and start a session for it
///
/// Request:
/// ```sh
/// curl -v -H 'Content-Type: application/json' \
///     -d '{ "email": "someone@example.com", "password": "verysecret" }' \
///     http://localhost:6000/v1/accounts:signUp
/// ```
///
/// Response:
/// ```json
/// { "idToken": "some token", "localId": "...", "email": "someone@example.com", "expiresIn": "3600" }
/// ```
pub async fn sign_up<S: Storage>(
    Extension(jwt_keys): Extension<JwtKeys>,
    Extension(storage): Extension<S>,
    Form(form): Form<CredentialsForm>,
) -> Result<Success<SessionResponse>, Error> {
    let email = normalize_email(&form.email);

    if !is_valid_email(&email) {
        return Err(Error::bad_request("INVALID_EMAIL"));
    }

    if form.password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(Error::bad_request(format!(
            "WEAK_PASSWORD : Password should be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }

    let hashed_password = hash(&form.password).map_err(Error::internal_server_error)?;

    let values = CreateUserValues {
        email: &email,
        hashed_password: &hashed_password,
    };

    let user = storage
        .create_user(&values)
        .await
        .map_err(|_| Error::bad_request("EMAIL_EXISTS"))?;

    tracing::info!("Created account {}", user.id);

    Ok(Success::ok(SessionResponse::for_user(&jwt_keys, &user)?))
}

/// Start a session for an existing account
///
/// Request:
/// ```sh
/// curl -v -H 'Content-Type: application/json' \
///     -d '{ "email": "someone@example.com", "password": "verysecret" }' \
///     http://localhost:6000/v1/accounts:signInWithPassword
/// ```
///
/// Response: same as [`sign_up`]
pub async fn sign_in_with_password<S: Storage>(
    Extension(jwt_keys): Extension<JwtKeys>,
    Extension(storage): Extension<S>,
    Form(form): Form<CredentialsForm>,
) -> Result<Success<SessionResponse>, Error> {
    let user = storage
        .find_single_user_by_email(&normalize_email(&form.email))
        .await
        .map_err(Error::internal_server_error)?;

    match user {
        Some(user) if verify(&user.hashed_password, &form.password) => {
            Ok(Success::ok(SessionResponse::for_user(&jwt_keys, &user)?))
        }
        _ => Err(Error::bad_request("INVALID_LOGIN_CREDENTIALS")),
    }
}
