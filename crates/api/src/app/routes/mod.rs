use axum::{routing::post, Router};

pub mod dispatch;
pub mod subscriptions;
pub mod system;

/// Router for the web hook endpoints.
pub fn router() -> Router {
    Router::new()
        .nest("/subscriptions", subscriptions::router())
        .route("/dispatch", post(dispatch::dispatch))
}
