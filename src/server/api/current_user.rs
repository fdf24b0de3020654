//! Current user service
//!
//! Get the current user from the request based on the Authorization header

use axum::Extension;
use axum::RequestPartsExt;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::TypedHeader;
use axum_extra::headers::Authorization;
use axum_extra::headers::authorization::Bearer;
use jsonwebtoken::DecodingKey;
use jsonwebtoken::EncodingKey;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

use crate::server::users::User;

use super::Error;

/// How long a token is valid, in seconds
pub const TOKEN_LIFETIME: i64 = 3600;

/// The keys used for encoding/decoding JWT tokens
#[derive(Clone)]
pub struct JwtKeys {
    /// The encoding key
    encoding: EncodingKey,

    /// The decoding key
    decoding: DecodingKey,
}

impl JwtKeys {
    /// Create new encoding/decoding keys, derived from a secret
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }
}

/// The JWT claims to identifies a user
#[derive(Debug, Deserialize, Serialize)]
struct Claims {
    /// The user ID
    sub: Uuid,

    /// When the token was issued
    iat: i64,

    /// When the token expires
    exp: i64,
}

/// Current user service
///
/// Only the ID is known, documents are matched against it
#[derive(Clone, Debug)]
pub struct CurrentUser {
    /// The user ID, as found in the `userId` field of documents
    pub id: String,
}

/// Generate a token for the outside world for a given user
pub fn generate_token(jwt_keys: &JwtKeys, user: &User) -> Result<String, Error> {
    use jsonwebtoken::Header;
    use jsonwebtoken::encode;

    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: user.id,
        iat: now,
        exp: now + TOKEN_LIFETIME,
    };

    encode(&Header::default(), &claims, &jwt_keys.encoding).map_err(Error::internal_server_error)
}

impl<B> FromRequestParts<B> for CurrentUser
where
    B: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &B) -> Result<Self, Self::Rejection> {
        use jsonwebtoken::Validation;
        use jsonwebtoken::decode;

        // Extract the token from the authorization header
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| Error::unauthorized("Missing ID token"))?;

        let Extension(jwt_keys) = parts
            .extract::<Extension<JwtKeys>>()
            .await
            .map_err(|_| Error::internal_server_error("Could not get JWT keys"))?;

        let validation = Validation::default();

        // Decode the user data
        let token_data = decode::<Claims>(bearer.token(), &jwt_keys.decoding, &validation)
            .map_err(|err| Error::unauthorized(format!("Invalid ID token: {err}")))?;

        Ok(CurrentUser {
            id: token_data.claims.sub.to_string(),
        })
    }
}
