use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Inbound bank-transfer notification, delivered at-least-once.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BankTransferNotification {
    /// Free-text transfer description typed by the customer.
    pub content: String,
    pub transfer_amount: i64,
    /// Bank-side reference for this transaction.
    pub reference_code: String,
}

/// Provider-mandated acknowledgement shape; always sent with HTTP 200 so the
/// provider does not retry-storm on internal failures.
#[derive(Debug, Serialize, ToSchema)]
pub struct WebhookAck {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl WebhookAck {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}
