use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};

use webhooks_tasks::CancellationToken;

use crate::actions::from_names;
use crate::app::{dto, errors};
use crate::app::services::AppServices;

/// Fire an action. Responds once every matching delivery is enqueued.
pub async fn dispatch(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::DispatchRequest>,
) -> axum::response::Response {
    let actions = match from_names(body.actions.as_slice()) {
        Ok(actions) if !actions.is_empty() => actions,
        Ok(_) => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "validation_error",
                "at least one action is required",
            )
        }
        Err(e) => return errors::domain_error_to_response(e),
    };

    // Deliveries outlive the request; nothing cancels them but shutdown.
    let token = CancellationToken::new();
    match services
        .caller
        .invoke_subscriptions(actions, &body.payload, &token)
        .await
    {
        Ok(report) => (StatusCode::ACCEPTED, Json(report)).into_response(),
        Err(e) => errors::caller_error_to_response(e),
    }
}
