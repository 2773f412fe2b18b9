use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::{LockType, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, QueryFilter, QuerySelect, Set,
    TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::{self, log_audit},
    dto::webhook::{BankTransferNotification, WebhookAck},
    entity::{
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders},
        payment_events::{self, ActiveModel as PaymentEventActive, Entity as PaymentEvents},
    },
    error::{AppError, AppResult},
    reconcile,
    services::append_note,
    state::AppState,
    status::PaymentStatus,
};

#[derive(Debug)]
enum ReconcileOutcome {
    /// No pending order matched; acknowledged and queued for manual review.
    Unresolved,
    /// The (order, reference) pair was already processed.
    Duplicate { order_code: String },
    PartiallyPaid { order_code: String, shortfall: i64 },
    Paid { order_code: String },
}

/// Consume one bank-transfer notification. Always produces an
/// acknowledgement: the provider's retry behavior on non-success responses
/// is outside our control, so internal failures are logged and flagged for
/// manual reconciliation instead of surfaced.
pub async fn handle_notification(
    state: &AppState,
    payload: BankTransferNotification,
) -> WebhookAck {
    if payload.content.trim().is_empty() || payload.transfer_amount <= 0 {
        tracing::warn!(
            reference = %payload.reference_code,
            amount = payload.transfer_amount,
            "webhook notification missing content or amount"
        );
        return WebhookAck::failed("Notification missing content or amount");
    }

    // Reconciliation is idempotent, so a store-layer failure is retried once.
    let result = match reconcile_once(state, &payload).await {
        Err(AppError::OrmError(err)) => {
            tracing::warn!(error = %err, "reconciliation failed, retrying once");
            reconcile_once(state, &payload).await
        }
        other => other,
    };

    match result {
        Ok(ReconcileOutcome::Unresolved) => {
            WebhookAck::ok("Transaction received but no order matched")
        }
        Ok(ReconcileOutcome::Duplicate { order_code }) => {
            tracing::info!(%order_code, reference = %payload.reference_code, "duplicate notification ignored");
            WebhookAck::ok("Notification already processed")
        }
        Ok(ReconcileOutcome::PartiallyPaid { order_code, shortfall }) => {
            tracing::info!(%order_code, shortfall, "partial payment recorded");
            WebhookAck::ok("Payment incomplete")
        }
        Ok(ReconcileOutcome::Paid { order_code }) => {
            tracing::info!(%order_code, "payment reconciled in full");
            WebhookAck::ok("Payment recorded")
        }
        Err(err) => {
            tracing::error!(error = %err, reference = %payload.reference_code, "webhook reconciliation failed");
            WebhookAck::failed("Internal error, queued for manual review")
        }
    }
}

async fn reconcile_once(
    state: &AppState,
    payload: &BankTransferNotification,
) -> AppResult<ReconcileOutcome> {
    let txn = state.orm.begin().await?;

    // Paid and cancelled orders are never reconsidered.
    let candidates = Orders::find()
        .filter(
            Condition::any()
                .add(OrderCol::PaymentStatus.eq(PaymentStatus::Unpaid.as_str()))
                .add(OrderCol::PaymentStatus.eq(PaymentStatus::PartiallyPaid.as_str())),
        )
        .lock(LockType::Update)
        .all(&txn)
        .await?;

    let hits = reconcile::matching_indices(
        &payload.content,
        candidates.iter().map(|o| o.order_code.as_str()),
    );

    let Some(&first) = hits.first() else {
        tracing::warn!(
            content = %payload.content,
            amount = payload.transfer_amount,
            reference = %payload.reference_code,
            "transfer did not match any pending order, flagging for manual review"
        );
        if let Err(err) = log_audit(
            &state.pool,
            None,
            audit::ACTION_PAYMENT_UNRESOLVED,
            Some("orders"),
            Some(serde_json::json!({
                "content": payload.content,
                "amount": payload.transfer_amount,
                "reference_code": payload.reference_code,
            })),
        )
        .await
        {
            tracing::warn!(error = %err, "audit log failed");
        }
        return Ok(ReconcileOutcome::Unresolved);
    };

    if hits.len() > 1 {
        let codes: Vec<&str> = hits
            .iter()
            .map(|&i| candidates[i].order_code.as_str())
            .collect();
        tracing::warn!(
            candidates = ?codes,
            reference = %payload.reference_code,
            "transfer matched multiple pending orders, taking the first"
        );
    }

    let order = candidates
        .into_iter()
        .nth(first)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("candidate index out of range")))?;

    let current = PaymentStatus::parse(&order.payment_status).unwrap_or(PaymentStatus::Unpaid);
    let (next, fragment) = if payload.transfer_amount >= order.total_amount {
        (
            PaymentStatus::Paid,
            format!("[Bank] Paid in full. Ref: {}", payload.reference_code),
        )
    } else {
        (
            PaymentStatus::PartiallyPaid,
            format!(
                "[Bank] Short transfer: received {} of {}. Ref: {}",
                payload.transfer_amount, order.total_amount, payload.reference_code
            ),
        )
    };

    // Claim the (order, reference) idempotency key before touching the
    // order; a duplicate delivery stops here without appending anything.
    let inserted = PaymentEvents::insert(PaymentEventActive {
        event_id: Set(Uuid::new_v4()),
        order_id: Set(order.order_id),
        reference_code: Set(payload.reference_code.clone()),
        amount: Set(payload.transfer_amount),
        outcome: Set(next.as_str().into()),
        created_at: NotSet,
    })
    .on_conflict(
        OnConflict::columns([
            payment_events::Column::OrderId,
            payment_events::Column::ReferenceCode,
        ])
        .do_nothing()
        .to_owned(),
    )
    .exec_without_returning(&txn)
    .await?;
    if inserted == 0 {
        return Ok(ReconcileOutcome::Duplicate {
            order_code: order.order_code,
        });
    }

    let order_code = order.order_code.clone();
    let order_id = order.order_id;
    let shortfall = order.total_amount - payload.transfer_amount;
    let note = append_note(order.note.as_deref(), &fragment);
    let advance = current.can_advance_to(next);

    let mut active: OrderActive = order.into();
    if advance {
        active.payment_status = Set(next.as_str().into());
    }
    active.note = Set(Some(note));
    active.updated_at = Set(Utc::now().into());
    active.update(&txn).await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        None,
        audit::ACTION_PAYMENT_RECONCILED,
        Some("orders"),
        Some(serde_json::json!({
            "order_id": order_id,
            "order_code": order_code,
            "amount": payload.transfer_amount,
            "reference_code": payload.reference_code,
            "payment_status": next.as_str(),
        })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    if next == PaymentStatus::Paid {
        Ok(ReconcileOutcome::Paid { order_code })
    } else {
        Ok(ReconcileOutcome::PartiallyPaid {
            order_code,
            shortfall,
        })
    }
}
