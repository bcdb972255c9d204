//! Order endpoints

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use trade_core::OrderRequest;
use trade_services::OrderServiceError;
use tracing::{error, info, warn};

use crate::AppState;

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, error: impl ToString) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
        .into_response()
}

/// Create order routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_orders).post(create_order))
        .route("/orders/", get(list_orders).post(create_order))
}

/// Submit a new order
async fn create_order(
    State(state): State<AppState>,
    payload: Result<Json<OrderRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            warn!("Rejected order payload: {}", rejection.body_text());
            return error_response(rejection.status(), rejection.body_text());
        }
    };

    match state.order_service.create_order(request).await {
        Ok(order) => (StatusCode::OK, Json(order)).into_response(),
        Err(OrderServiceError::Invalid(e)) => {
            info!("Order failed validation: {}", e);
            error_response(StatusCode::UNPROCESSABLE_ENTITY, e)
        }
        Err(e @ OrderServiceError::Storage(_)) => {
            error!("Failed to create order: {}", e);
            error_response(StatusCode::BAD_REQUEST, e)
        }
    }
}

/// List every stored order
async fn list_orders(State(state): State<AppState>) -> Response {
    match state.order_service.list_orders() {
        Ok(orders) => (StatusCode::OK, Json(orders)).into_response(),
        Err(e) => {
            error!("Failed to fetch orders: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e)
        }
    }
}
