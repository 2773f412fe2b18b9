use axum::{Json, Router, extract::State, routing::post};

use crate::{
    dto::webhook::{BankTransferNotification, WebhookAck},
    services::payment_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/webhook", post(bank_webhook))
}

#[utoipa::path(
    post,
    path = "/api/payment/webhook",
    request_body = BankTransferNotification,
    responses(
        (status = 200, description = "Always acknowledged, success flag carries the result", body = WebhookAck),
    ),
    tag = "Payment"
)]
pub async fn bank_webhook(
    State(state): State<AppState>,
    Json(payload): Json<BankTransferNotification>,
) -> Json<WebhookAck> {
    Json(payment_service::handle_notification(&state, payload).await)
}
