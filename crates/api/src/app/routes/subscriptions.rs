use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get},
    Json, Router,
};

use webhooks_core::{Subscription, SubscriptionId};
use webhooks_infra::SubscriptionStore;

use crate::actions::from_names;
use crate::app::{dto, errors};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_subscriptions).post(subscribe))
        .route("/:id", delete(unsubscribe))
}

pub async fn list_subscriptions(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::ListQuery>,
) -> axum::response::Response {
    match services.store.get_subscriptions(query.limit(), query.offset()).await {
        Ok(page) => {
            let items = page.iter().map(dto::subscription_to_json).collect::<Vec<_>>();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn subscribe(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::SubscribeRequest>,
) -> axum::response::Response {
    let actions = match from_names(body.actions.as_slice()) {
        Ok(actions) => actions,
        Err(e) => return errors::domain_error_to_response(e),
    };

    let mut subscription = match Subscription::new(body.client_id, &body.callback_uri, actions) {
        Ok(s) => s,
        Err(e) => return errors::domain_error_to_response(e),
    };
    if let Some(id) = body.id {
        subscription = subscription.with_id(id);
    }

    match services.store.subscribe(subscription).await {
        Ok(stored) => (StatusCode::CREATED, Json(dto::subscription_to_json(&stored))).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn unsubscribe(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: SubscriptionId = match id.parse() {
        Ok(id) => id,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.store.unsubscribe(id).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => errors::json_error(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("subscription {id} not found"),
        ),
        Err(e) => errors::store_error_to_response(e),
    }
}
