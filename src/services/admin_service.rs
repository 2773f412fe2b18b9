use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use crate::{
    audit::{self, log_audit},
    dto::orders::OrderList,
    entity::orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::Order,
    response::{ApiResponse, Meta},
    routes::admin::ForceOrderStatusRequest,
    routes::params::{OrderListQuery, SortOrder},
    state::AppState,
    status::OrderStatus,
};

pub async fn list_all_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = query.pagination.normalize();

    let mut condition = Condition::all();
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(OrderCol::Status.eq(status.clone()));
    }
    if let Some(payment_status) = query.payment_status.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(OrderCol::PaymentStatus.eq(payment_status.clone()));
    }

    let mut finder = Orders::find().filter(condition);
    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Order::from)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Orders",
        OrderList { items: orders },
        Some(meta),
    ))
}

/// Raw status overwrite for admin tooling.
///
/// Deliberately named "force": this writes the status column directly and
/// does NOT run the compensating cancel transaction, so forcing "cancelled"
/// here restocks nothing and releases no voucher use. Whether it should is
/// an open product question; keeping it a separate, loudly-named operation
/// keeps the gap visible instead of accidental.
pub async fn force_order_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: ForceOrderStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    ensure_admin(user)?;
    if OrderStatus::parse(&payload.status).is_none() {
        return Err(AppError::BadRequest("Invalid order status".into()));
    }

    let existing = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    let previous = existing.status.clone();

    let mut active: OrderActive = existing.into();
    active.status = Set(payload.status);
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&state.orm).await?;

    tracing::info!(
        order_id = %order.order_id,
        from = %previous,
        to = %order.status,
        "admin forced order status, bypassing compensation"
    );

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        audit::ACTION_STATUS_FORCED,
        Some("orders"),
        Some(serde_json::json!({
            "order_id": order.order_id,
            "from": previous,
            "to": order.status,
        })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Order status updated",
        Order::from(order),
        Some(Meta::empty()),
    ))
}
