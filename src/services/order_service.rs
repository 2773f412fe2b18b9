use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, FromQueryResult,
    JoinType, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set,
    TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::{self, log_audit},
    dto::orders::{
        CancelOrderRequest, CancelOrderResponse, CostBreakdown, CreateOrderRequest,
        CreateOrderResponse, OrderDetail, OrderList, PreviewOrderRequest, PreviewOrderResponse,
        VoucherInfo,
    },
    entity::{
        addresses::{Column as AddressCol, Entity as Addresses, Model as AddressModel},
        cart_items::{self, Column as CartCol, Entity as CartItems},
        order_items::{ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems},
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders},
        product_variants::{self, Column as VariantCol, Entity as ProductVariants},
        products::{Column as ProdCol, Entity as Products},
        vouchers::{Column as VoucherCol, Entity as Vouchers, Model as VoucherModel},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Order, OrderItem, ShippingAddress},
    pricing::{self, PricedLine},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    services::append_note,
    state::AppState,
    status::{OrderStatus, PaymentStatus},
    voucher::{self, VoucherOutcome, VoucherRejection},
};

/// One cart line joined with its variant and product, priced server-side.
#[derive(Debug, FromQueryResult)]
struct CartRow {
    variant_id: Uuid,
    product_id: Uuid,
    quantity: i32,
    base_price: i64,
    price_modifier: i64,
}

impl CartRow {
    fn unit_price(&self) -> i64 {
        self.base_price + self.price_modifier
    }

    fn priced_line(&self) -> PricedLine {
        PricedLine {
            variant_id: self.variant_id,
            quantity: self.quantity,
            unit_price: self.unit_price(),
        }
    }
}

async fn load_cart_rows<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    lock: bool,
) -> AppResult<Vec<CartRow>> {
    let mut finder = CartItems::find()
        .select_only()
        .column_as(CartCol::VariantId, "variant_id")
        .column_as(CartCol::Quantity, "quantity")
        .column_as(VariantCol::ProductId, "product_id")
        .column_as(VariantCol::PriceModifier, "price_modifier")
        .column_as(ProdCol::BasePrice, "base_price")
        .join(JoinType::InnerJoin, cart_items::Relation::Variant.def())
        .join(JoinType::InnerJoin, product_variants::Relation::Product.def())
        .filter(CartCol::UserId.eq(user_id));
    if lock {
        finder = finder.lock(LockType::Update);
    }
    Ok(finder.into_model::<CartRow>().all(conn).await?)
}

async fn load_owned_address<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    address_id: Uuid,
) -> AppResult<AddressModel> {
    Addresses::find()
        .filter(
            Condition::all()
                .add(AddressCol::AddressId.eq(address_id))
                .add(AddressCol::UserId.eq(user_id)),
        )
        .one(conn)
        .await?
        .ok_or(AppError::NotFound)
}

fn address_snapshot(address: &AddressModel) -> ShippingAddress {
    let parts: Vec<&str> = [
        address.street.as_deref(),
        address.ward.as_deref(),
        address.district.as_deref(),
        address.city.as_deref(),
    ]
    .into_iter()
    .flatten()
    .collect();
    ShippingAddress {
        recipient_name: address.recipient_name.clone(),
        phone: address.phone.clone(),
        full_address: (!parts.is_empty()).then(|| parts.join(", ")),
        city: address.city.clone(),
    }
}

async fn load_active_voucher<C: ConnectionTrait>(
    conn: &C,
    code: &str,
    lock: bool,
) -> AppResult<Option<VoucherModel>> {
    let mut finder = Vouchers::find().filter(
        Condition::all()
            .add(VoucherCol::Code.eq(code))
            .add(VoucherCol::IsActive.eq(true)),
    );
    if lock {
        finder = finder.lock(LockType::Update);
    }
    Ok(finder.one(conn).await?)
}

/// Quote the current cart without committing anything. Shares every pricing
/// rule with [`create`]; a voucher problem here comes back as an invalid
/// `voucher_info`, not an error, so the storefront can render it inline.
pub async fn preview(
    state: &AppState,
    user: &AuthUser,
    payload: PreviewOrderRequest,
) -> AppResult<ApiResponse<PreviewOrderResponse>> {
    let rows = load_cart_rows(&state.orm, user.user_id, false).await?;
    if rows.is_empty() {
        return Err(AppError::EmptyCart);
    }
    let lines: Vec<PricedLine> = rows.iter().map(CartRow::priced_line).collect();
    let subtotal = pricing::merchandise_subtotal(&lines)?;

    let address = match payload.address_id {
        Some(id) => Some(load_owned_address(&state.orm, user.user_id, id).await?),
        None => None,
    };
    let snapshot = address.as_ref().map(address_snapshot);

    let (discount, voucher_info) = match payload.voucher_code.as_deref() {
        Some(code) => match load_active_voucher(&state.orm, code, false).await? {
            None => (
                0,
                Some(VoucherInfo {
                    valid: false,
                    voucher_id: None,
                    code: code.to_string(),
                    discount_value: 0,
                    message: Some(VoucherRejection::NotFound.to_string()),
                }),
            ),
            Some(v) => match voucher::validate(&v, subtotal, Utc::now()) {
                VoucherOutcome::Valid { discount_amount } => (
                    discount_amount,
                    Some(VoucherInfo {
                        valid: true,
                        voucher_id: Some(v.voucher_id),
                        code: v.code,
                        discount_value: discount_amount,
                        message: None,
                    }),
                ),
                VoucherOutcome::Rejected(rejection) => (
                    0,
                    Some(VoucherInfo {
                        valid: false,
                        voucher_id: None,
                        code: v.code,
                        discount_value: 0,
                        message: Some(rejection.to_string()),
                    }),
                ),
            },
        },
        None => (0, None),
    };

    let method = payload.shipping_method.unwrap_or_default();
    let city = address.as_ref().and_then(|a| a.city.as_deref());
    let quote = pricing::quote(&lines, city, method, discount)?;

    Ok(ApiResponse::success(
        "Order preview",
        PreviewOrderResponse {
            merchandise_subtotal: quote.merchandise_subtotal,
            shipping_fee: quote.shipping_fee,
            shipping_address: snapshot,
            discount_amount: quote.discount_amount,
            voucher_info,
            final_total: quote.final_total,
        },
        Some(Meta::empty()),
    ))
}

/// Commit the cart as an order. Everything from the pricing recomputation to
/// the cart clear happens in one transaction; any failure rolls the whole
/// thing back.
pub async fn create(
    state: &AppState,
    user: &AuthUser,
    payload: CreateOrderRequest,
) -> AppResult<ApiResponse<CreateOrderResponse>> {
    let txn = state.orm.begin().await?;

    let rows = load_cart_rows(&txn, user.user_id, true).await?;
    if rows.is_empty() {
        return Err(AppError::EmptyCart);
    }
    let lines: Vec<PricedLine> = rows.iter().map(CartRow::priced_line).collect();
    let subtotal = pricing::merchandise_subtotal(&lines)?;

    let address = match payload.address_id {
        Some(id) => Some(load_owned_address(&txn, user.user_id, id).await?),
        None => None,
    };
    let snapshot = address.as_ref().map(address_snapshot).unwrap_or_default();

    let voucher = match payload.voucher_code.as_deref() {
        Some(code) => Some(
            load_active_voucher(&txn, code, true)
                .await?
                .ok_or(AppError::VoucherRejected(VoucherRejection::NotFound))?,
        ),
        None => None,
    };
    let discount = match &voucher {
        Some(v) => match voucher::validate(v, subtotal, Utc::now()) {
            VoucherOutcome::Valid { discount_amount } => discount_amount,
            VoucherOutcome::Rejected(rejection) => {
                return Err(AppError::VoucherRejected(rejection));
            }
        },
        None => 0,
    };

    let method = payload.shipping_method.unwrap_or_default();
    let city = address.as_ref().and_then(|a| a.city.as_deref());
    let quote = pricing::quote(&lines, city, method, discount)?;

    let order_id = Uuid::new_v4();
    let order_code = build_order_code(order_id);

    let order = OrderActive {
        order_id: Set(order_id),
        order_code: Set(order_code),
        user_id: Set(user.user_id),
        status: Set(OrderStatus::Pending.as_str().into()),
        payment_status: Set(PaymentStatus::Unpaid.as_str().into()),
        total_amount: Set(quote.final_total),
        payment_method: Set(payload.payment_method.unwrap_or_else(|| "bank_transfer".into())),
        shipping_method: Set(method.as_str().into()),
        shipping_fee: Set(quote.shipping_fee),
        discount_amount: Set(quote.discount_amount),
        voucher_id: Set(voucher.as_ref().map(|v| v.voucher_id)),
        shipping_address: Set(serde_json::to_value(&snapshot).map_err(anyhow::Error::from)?),
        note: Set(payload.note),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let items: Vec<OrderItemActive> = lines
        .iter()
        .map(|line| OrderItemActive {
            item_id: Set(Uuid::new_v4()),
            order_id: Set(order.order_id),
            variant_id: Set(line.variant_id),
            quantity: Set(line.quantity),
            price_at_purchase: Set(line.unit_price),
            created_at: NotSet,
        })
        .collect();
    OrderItems::insert_many(items).exec(&txn).await?;

    for row in &rows {
        // Check-and-decrement as one statement so two concurrent checkouts
        // cannot both pass a read-then-write stock check.
        let res = ProductVariants::update_many()
            .col_expr(
                VariantCol::StockQuantity,
                Expr::col(VariantCol::StockQuantity).sub(row.quantity),
            )
            .filter(VariantCol::VariantId.eq(row.variant_id))
            .filter(VariantCol::StockQuantity.gte(row.quantity))
            .exec(&txn)
            .await?;
        if res.rows_affected == 0 {
            let available = ProductVariants::find_by_id(row.variant_id)
                .one(&txn)
                .await?
                .map(|v| v.stock_quantity)
                .unwrap_or(0);
            return Err(AppError::InsufficientStock {
                variant_id: row.variant_id,
                available,
            });
        }

        // sold_count moves in lockstep with stock for the same quantity.
        Products::update_many()
            .col_expr(
                ProdCol::SoldCount,
                Expr::col(ProdCol::SoldCount).add(i64::from(row.quantity)),
            )
            .filter(ProdCol::ProductId.eq(row.product_id))
            .exec(&txn)
            .await?;
    }

    if let Some(v) = &voucher {
        // Row-level guarded increment; used_count can never pass usage_limit
        // even under concurrent commits.
        let res = Vouchers::update_many()
            .col_expr(VoucherCol::UsedCount, Expr::col(VoucherCol::UsedCount).add(1))
            .filter(VoucherCol::VoucherId.eq(v.voucher_id))
            .filter(
                Condition::any()
                    .add(VoucherCol::UsageLimit.is_null())
                    .add(Expr::col(VoucherCol::UsedCount).lt(Expr::col(VoucherCol::UsageLimit))),
            )
            .exec(&txn)
            .await?;
        if res.rows_affected == 0 {
            return Err(AppError::VoucherRejected(VoucherRejection::UsageExhausted));
        }
    }

    // Clearing the cart inside the same transaction keeps it from
    // interleaving with concurrent cart mutations.
    CartItems::delete_many()
        .filter(CartCol::UserId.eq(user.user_id))
        .exec(&txn)
        .await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        audit::ACTION_ORDER_CREATE,
        Some("orders"),
        Some(serde_json::json!({
            "order_id": order.order_id,
            "order_code": order.order_code,
            "total_amount": order.total_amount,
        })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    let payment_url = build_payment_url(state, order.total_amount, &order.order_code);

    Ok(ApiResponse::success(
        "Order created",
        CreateOrderResponse {
            order_id: order.order_id,
            order_code: order.order_code,
            status: order.status,
            payment_status: order.payment_status,
            payment_url,
        },
        Some(Meta::empty()),
    ))
}

/// Cancel an order, reversing every commit side effect exactly once.
/// Retried once on a store-layer failure; the compensating transaction is
/// idempotent because a committed cancel flips the status out of the
/// cancellable window.
pub async fn cancel(
    state: &AppState,
    user: &AuthUser,
    order_id: Uuid,
    payload: CancelOrderRequest,
) -> AppResult<ApiResponse<CancelOrderResponse>> {
    match cancel_once(state, user, order_id, &payload).await {
        Err(AppError::OrmError(err)) => {
            tracing::warn!(error = %err, %order_id, "cancel transaction failed, retrying once");
            cancel_once(state, user, order_id, &payload).await
        }
        other => other,
    }
}

async fn cancel_once(
    state: &AppState,
    user: &AuthUser,
    order_id: Uuid,
    payload: &CancelOrderRequest,
) -> AppResult<ApiResponse<CancelOrderResponse>> {
    let txn = state.orm.begin().await?;

    let order = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::OrderId.eq(order_id))
                .add(OrderCol::UserId.eq(user.user_id)),
        )
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    // Admin tooling can force arbitrary status strings; anything that does
    // not parse into a cancellable state is treated as not cancellable.
    if !OrderStatus::parse(&order.status).is_some_and(|s| s.can_cancel()) {
        return Err(AppError::CancelNotAllowed);
    }

    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.order_id))
        .all(&txn)
        .await?;

    let reason = payload.reason.as_deref().unwrap_or("no reason given");
    let note = append_note(order.note.as_deref(), &format!("Cancelled: {reason}"));

    // A paid order keeps its payment obligation: it moves to refunding,
    // never back to unpaid.
    let payment_status = match PaymentStatus::parse(&order.payment_status) {
        Some(PaymentStatus::Paid) => PaymentStatus::Refunding,
        Some(other) => other,
        None => PaymentStatus::Unpaid,
    };

    let voucher_id = order.voucher_id;
    let mut active: OrderActive = order.into();
    active.status = Set(OrderStatus::Cancelled.as_str().into());
    active.payment_status = Set(payment_status.as_str().into());
    active.note = Set(Some(note));
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;

    // Exact inverse of the commit-time stock/sold_count movements.
    let variant_ids: Vec<Uuid> = items.iter().map(|i| i.variant_id).collect();
    let variants = ProductVariants::find()
        .filter(VariantCol::VariantId.is_in(variant_ids))
        .all(&txn)
        .await?;
    for item in &items {
        ProductVariants::update_many()
            .col_expr(
                VariantCol::StockQuantity,
                Expr::col(VariantCol::StockQuantity).add(item.quantity),
            )
            .filter(VariantCol::VariantId.eq(item.variant_id))
            .exec(&txn)
            .await?;

        if let Some(variant) = variants.iter().find(|v| v.variant_id == item.variant_id) {
            Products::update_many()
                .col_expr(
                    ProdCol::SoldCount,
                    Expr::col(ProdCol::SoldCount).sub(i64::from(item.quantity)),
                )
                .filter(ProdCol::ProductId.eq(variant.product_id))
                .exec(&txn)
                .await?;
        }
    }

    if let Some(vid) = voucher_id {
        Vouchers::update_many()
            .col_expr(VoucherCol::UsedCount, Expr::col(VoucherCol::UsedCount).sub(1))
            .filter(VoucherCol::VoucherId.eq(vid))
            .filter(VoucherCol::UsedCount.gt(0))
            .exec(&txn)
            .await?;
    }

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        audit::ACTION_ORDER_CANCEL,
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.order_id, "reason": reason })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Order cancelled",
        CancelOrderResponse {
            order_id: order.order_id,
            status: order.status,
            payment_status: order.payment_status,
        },
        Some(Meta::empty()),
    ))
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination.normalize();
    let mut condition = Condition::all().add(OrderCol::UserId.eq(user.user_id));
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(OrderCol::Status.eq(status.clone()));
    }
    if let Some(payment_status) = query.payment_status.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(OrderCol::PaymentStatus.eq(payment_status.clone()));
    }

    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);

    let mut finder = Orders::find().filter(condition);
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
        "Ok",
        OrderList { items: orders },
        Some(meta),
    ))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderDetail>> {
    let order = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::OrderId.eq(id))
                .add(OrderCol::UserId.eq(user.user_id)),
        )
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let items: Vec<OrderItem> = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.order_id))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(OrderItem::from)
        .collect();

    // Recomputed from frozen prices, never from the live catalog.
    let subtotal: i64 = items
        .iter()
        .map(|i| i.price_at_purchase * i64::from(i.quantity))
        .sum();
    let cost_breakdown = CostBreakdown {
        subtotal,
        shipping_fee: order.shipping_fee,
        discount: order.discount_amount,
        total_amount: order.total_amount,
    };

    Ok(ApiResponse::success(
        "OK",
        OrderDetail {
            order: Order::from(order),
            items,
            cost_breakdown,
        },
        Some(Meta::empty()),
    ))
}

fn build_order_code(order_id: Uuid) -> String {
    let simple = order_id.simple().to_string();
    format!("DH{}", simple[..8].to_uppercase())
}

fn build_payment_url(state: &AppState, amount: i64, order_code: &str) -> String {
    format!(
        "https://qr.sepay.vn/img?bank={}&acc={}&template=compact&amount={}&des={}",
        state.config.bank_code, state.config.bank_account, amount, order_code
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_code_is_short_uppercase_and_prefixed() {
        let code = build_order_code(Uuid::new_v4());
        assert!(code.starts_with("DH"));
        assert_eq!(code.len(), 10);
        assert!(code[2..].chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }
}
