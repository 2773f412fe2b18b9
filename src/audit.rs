//! Append-only audit trail for order and payment mutations, written through
//! the raw sqlx pool outside the business transaction.

use serde_json::Value;
use uuid::Uuid;

use crate::{db::DbPool, error::AppResult};

pub const ACTION_ORDER_CREATE: &str = "order_create";
pub const ACTION_ORDER_CANCEL: &str = "order_cancel";
pub const ACTION_STATUS_FORCED: &str = "order_status_forced";
pub const ACTION_PAYMENT_RECONCILED: &str = "payment_reconciled";
/// Notification acknowledged but matched no order; the audit row is the
/// manual-review queue for these.
pub const ACTION_PAYMENT_UNRESOLVED: &str = "payment_unresolved";

/// `user_id` is None for system-initiated entries (webhook deliveries).
pub async fn log_audit(
    pool: &DbPool,
    user_id: Option<Uuid>,
    action: &str,
    resource: Option<&str>,
    metadata: Option<Value>,
) -> AppResult<()> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO audit_logs (id, user_id, action, resource, metadata)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(action)
    .bind(resource)
    .bind(metadata)
    .execute(pool)
    .await?;

    Ok(())
}
