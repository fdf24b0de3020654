//! All API endpoint setup

use axum::Router;
use axum::routing::get;
use axum::routing::post;

pub use current_user::CurrentUser;
pub use current_user::JwtKeys;
pub use request::Form;
pub use request::PathParameters;
pub use request::parse_segment;
pub use response::Error;
pub use response::Success;

use crate::server::storage::Storage;

mod accounts;
mod current_user;
mod documents;
mod request;
mod response;

/// Get the Axum router for all API routes
pub fn router<S: Storage>() -> Router {
    let accounts = Router::new()
        .route("/accounts:signUp", post(accounts::sign_up::<S>))
        .route(
            "/accounts:signInWithPassword",
            post(accounts::sign_in_with_password::<S>),
        );

    let documents = Router::new()
        .route("/documents:commit", post(documents::commit::<S>))
        .route(
            "/documents/{collection}",
            get(documents::list::<S>).post(documents::create::<S>),
        )
        .route(
            "/documents/{collection}/{id}",
            get(documents::single::<S>)
                .patch(documents::upsert::<S>)
                .delete(documents::delete::<S>),
        );

    Router::new().nest("/v1", accounts.merge(documents))
}

/// Answer for every unknown route
pub async fn fallback() -> Error {
    Error::not_found("Unknown route")
}
