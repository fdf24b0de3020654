//! Development document store
//!
//! Speaks the same wire format as the hosted store the client talks to: email and password
//! accounts, bearer ID tokens and typed-field documents owned by users.
//!
//! Everything is kept in memory and lost on shutdown.

use axum::Extension;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::password::generate;
use crate::utils::env_var_or_else;

use self::api::JwtKeys;
use self::storage::Storage;

pub mod api;
pub mod graceful_shutdown;
pub mod storage;
pub mod users;

/// Create and setup the app with its dependencies
pub fn setup_app() -> Router {
    create_router(storage::setup(), setup_jwt_keys())
}

/// Create the router of the document store
pub fn create_router<S: Storage>(storage: S, jwt_keys: JwtKeys) -> Router {
    api::router::<S>()
        .fallback(api::fallback)
        .layer(TraceLayer::new_for_http())
        .layer(Extension(storage))
        .layer(Extension(jwt_keys))
}

fn setup_jwt_keys() -> JwtKeys {
    let jwt_secret = env_var_or_else("JWT_SECRET", || {
        let jwt_secret = generate();
        tracing::info!("`JWT_SECRET` is not set, generating temporary one: {jwt_secret}");
        jwt_secret
    });

    JwtKeys::new(jwt_secret.as_bytes())
}
