use std::sync::LazyLock;

use chrono::{Duration, Utc};
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ConnectionTrait, EntityTrait, Set, Statement};
use uuid::Uuid;

use storefront_checkout_api::{
    config::AppConfig,
    db::{create_orm_conn, create_pool, run_migrations},
    dto::orders::{CancelOrderRequest, CreateOrderRequest, PreviewOrderRequest},
    entity::{
        addresses::ActiveModel as AddressActive,
        cart_items::ActiveModel as CartItemActive,
        product_variants::{ActiveModel as VariantActive, Entity as ProductVariants},
        products::{ActiveModel as ProductActive, Entity as Products},
        vouchers::{ActiveModel as VoucherActive, Entity as Vouchers},
        Orders,
    },
    error::AppError,
    middleware::auth::AuthUser,
    pricing::ShippingMethod,
    routes::admin::ForceOrderStatusRequest,
    services::{admin_service, order_service},
    state::AppState,
};

// Full checkout round trip: preview -> create -> cancel, checking that every
// side effect (stock, sold_count, voucher uses, cart) is applied and then
// reversed exactly.
#[tokio::test]
async fn preview_create_and_cancel_round_trip() -> anyhow::Result<()> {
    let Some((state, _db)) = setup_state().await? else {
        return Ok(());
    };

    let user = user_auth();
    let (product_id, variant_id) = seed_variant(&state, "Linen Shirt", 480_000, 20_000, 50).await?;
    let address_id = seed_address(&state, user.user_id, "Hà Nội").await?;
    seed_voucher(&state, "SALE10", "percent", 10, 0, None).await?;
    add_to_cart(&state, user.user_id, variant_id, 2).await?;

    // Preview: 2 x 500,000 + 15,000 metro shipping - 10% voucher
    let preview = order_service::preview(
        &state,
        &user,
        PreviewOrderRequest {
            address_id: Some(address_id),
            voucher_code: Some("SALE10".into()),
            shipping_method: Some(ShippingMethod::Standard),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(preview.merchandise_subtotal, 1_000_000);
    assert_eq!(preview.shipping_fee, 15_000);
    assert_eq!(preview.discount_amount, 100_000);
    assert_eq!(preview.final_total, 915_000);
    assert!(preview.voucher_info.unwrap().valid);

    // Create commits the same numbers
    let created = order_service::create(
        &state,
        &user,
        CreateOrderRequest {
            address_id: Some(address_id),
            payment_method: None,
            shipping_method: Some(ShippingMethod::Standard),
            voucher_code: Some("SALE10".into()),
            note: Some("gift wrap please".into()),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(created.status, "pending");
    assert_eq!(created.payment_status, "unpaid");
    assert!(created.order_code.starts_with("DH"));
    assert!(created.payment_url.contains(&created.order_code));
    assert!(created.payment_url.contains("amount=915000"));

    let order = Orders::find_by_id(created.order_id)
        .one(&state.orm)
        .await?
        .unwrap();
    assert_eq!(order.total_amount, 915_000);
    assert_eq!(order.shipping_fee, 15_000);
    assert_eq!(order.discount_amount, 100_000);

    assert_eq!(variant_stock(&state, variant_id).await?, 48);
    assert_eq!(product_sold(&state, product_id).await?, 2);
    assert_eq!(voucher_used(&state, "SALE10").await?, 1);
    assert_eq!(cart_count(&state, user.user_id).await?, 0);

    // Cancel reverses every side effect exactly once
    let cancelled = order_service::cancel(
        &state,
        &user,
        created.order_id,
        CancelOrderRequest {
            reason: Some("changed mind".into()),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(cancelled.status, "cancelled");
    assert_eq!(cancelled.payment_status, "unpaid");

    assert_eq!(variant_stock(&state, variant_id).await?, 50);
    assert_eq!(product_sold(&state, product_id).await?, 0);
    assert_eq!(voucher_used(&state, "SALE10").await?, 0);

    let order = Orders::find_by_id(created.order_id)
        .one(&state.orm)
        .await?
        .unwrap();
    let note = order.note.unwrap();
    assert!(note.contains("gift wrap please"), "prior note preserved: {note}");
    assert!(note.contains("changed mind"), "reason appended: {note}");

    // Cancelled is terminal
    let again = order_service::cancel(
        &state,
        &user,
        created.order_id,
        CancelOrderRequest { reason: None },
    )
    .await;
    assert!(matches!(again, Err(AppError::CancelNotAllowed)));

    Ok(())
}

#[tokio::test]
async fn insufficient_stock_rolls_back_everything() -> anyhow::Result<()> {
    let Some((state, _db)) = setup_state().await? else {
        return Ok(());
    };

    let user = user_auth();
    let (_, variant_id) = seed_variant(&state, "Canvas Tote", 180_000, 0, 1).await?;
    add_to_cart(&state, user.user_id, variant_id, 2).await?;

    let result = order_service::create(
        &state,
        &user,
        CreateOrderRequest {
            address_id: None,
            payment_method: None,
            shipping_method: None,
            voucher_code: None,
            note: None,
        },
    )
    .await;

    match result {
        Err(AppError::InsufficientStock {
            variant_id: failed,
            available,
        }) => {
            assert_eq!(failed, variant_id);
            assert_eq!(available, 1);
        }
        other => panic!("expected InsufficientStock, got {other:?}"),
    }

    // Nothing persisted: stock untouched, cart intact, no order created
    assert_eq!(variant_stock(&state, variant_id).await?, 1);
    assert_eq!(cart_count(&state, user.user_id).await?, 1);
    assert_eq!(Orders::find().all(&state.orm).await?.len(), 0);

    Ok(())
}

// Two concurrent checkouts over a variant with one unit left: exactly one
// commits, the other fails with InsufficientStock.
#[tokio::test]
async fn concurrent_checkouts_cannot_oversell() -> anyhow::Result<()> {
    let Some((state, _db)) = setup_state().await? else {
        return Ok(());
    };

    let alice = user_auth();
    let bob = user_auth();
    let (_, variant_id) = seed_variant(&state, "Basic Tee", 250_000, 0, 1).await?;
    add_to_cart(&state, alice.user_id, variant_id, 1).await?;
    add_to_cart(&state, bob.user_id, variant_id, 1).await?;

    let request = || CreateOrderRequest {
        address_id: None,
        payment_method: None,
        shipping_method: None,
        voucher_code: None,
        note: None,
    };
    let (a, b) = tokio::join!(
        order_service::create(&state, &alice, request()),
        order_service::create(&state, &bob, request()),
    );

    let successes = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
    assert_eq!(successes, 1, "exactly one checkout must win");
    for result in [a, b] {
        if let Err(err) = result {
            assert!(
                matches!(err, AppError::InsufficientStock { available: 0, .. }),
                "loser fails with InsufficientStock, got {err:?}"
            );
        }
    }
    assert_eq!(variant_stock(&state, variant_id).await?, 0);

    Ok(())
}

#[tokio::test]
async fn voucher_usage_limit_is_never_exceeded() -> anyhow::Result<()> {
    let Some((state, _db)) = setup_state().await? else {
        return Ok(());
    };

    let first = user_auth();
    let second = user_auth();
    let (_, variant_id) = seed_variant(&state, "Linen Shirt", 500_000, 0, 10).await?;
    seed_voucher(&state, "LAST1", "fixed", 50_000, 0, Some(1)).await?;
    add_to_cart(&state, first.user_id, variant_id, 1).await?;
    add_to_cart(&state, second.user_id, variant_id, 1).await?;

    let request = || CreateOrderRequest {
        address_id: None,
        payment_method: None,
        shipping_method: None,
        voucher_code: Some("LAST1".into()),
        note: None,
    };
    // The voucher row is locked during commit, so concurrent checkouts
    // serialize on it: one claims the last use, the other is rejected.
    let (a, b) = tokio::join!(
        order_service::create(&state, &first, request()),
        order_service::create(&state, &second, request()),
    );
    let successes = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
    assert_eq!(successes, 1, "exactly one checkout may claim the last use");
    for result in [a, b] {
        if let Err(err) = result {
            assert!(
                matches!(err, AppError::VoucherRejected(_)),
                "loser is rejected on the voucher, got {err:?}"
            );
        }
    }
    assert_eq!(voucher_used(&state, "LAST1").await?, 1);
    // the failed checkout rolled back its stock decrement too
    assert_eq!(variant_stock(&state, variant_id).await?, 9);

    Ok(())
}

#[tokio::test]
async fn admin_force_status_bypasses_compensation() -> anyhow::Result<()> {
    let Some((state, _db)) = setup_state().await? else {
        return Ok(());
    };

    let user = user_auth();
    let admin = AuthUser {
        user_id: Uuid::new_v4(),
        role: "admin".into(),
    };
    let (_, variant_id) = seed_variant(&state, "Basic Tee", 250_000, 0, 5).await?;
    add_to_cart(&state, user.user_id, variant_id, 1).await?;

    let created = order_service::create(
        &state,
        &user,
        CreateOrderRequest {
            address_id: None,
            payment_method: None,
            shipping_method: None,
            voucher_code: None,
            note: None,
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(variant_stock(&state, variant_id).await?, 4);

    // Non-admin is rejected outright
    let forbidden = admin_service::force_order_status(
        &state,
        &user,
        created.order_id,
        ForceOrderStatusRequest {
            status: "cancelled".into(),
        },
    )
    .await;
    assert!(matches!(forbidden, Err(AppError::Forbidden)));

    // Forcing "cancelled" overwrites the column but restocks nothing;
    // the raw overwrite knowingly skips the compensating transaction.
    let forced = admin_service::force_order_status(
        &state,
        &admin,
        created.order_id,
        ForceOrderStatusRequest {
            status: "cancelled".into(),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(forced.status, "cancelled");
    assert_eq!(variant_stock(&state, variant_id).await?, 4);

    // And the user can no longer route a real cancel through it
    let cancel = order_service::cancel(
        &state,
        &user,
        created.order_id,
        CancelOrderRequest { reason: None },
    )
    .await;
    assert!(matches!(cancel, Err(AppError::CancelNotAllowed)));

    Ok(())
}

// ---- helpers ----

// Each test truncates the shared database, so they must not interleave.
static DB_LOCK: LazyLock<tokio::sync::Mutex<()>> = LazyLock::new(|| tokio::sync::Mutex::new(()));

type DbGuard = tokio::sync::MutexGuard<'static, ()>;

async fn setup_state() -> anyhow::Result<Option<(AppState, DbGuard)>> {
    let guard = DB_LOCK.lock().await;

    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!(
                "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
            );
            return Ok(None);
        }
    };

    let orm = create_orm_conn(&database_url).await?;
    run_migrations(&orm).await?;

    // Clean tables between runs
    let backend = orm.get_database_backend();
    orm.execute(Statement::from_string(
        backend,
        "TRUNCATE TABLE payment_events, order_items, orders, cart_items, addresses, vouchers, product_variants, products, audit_logs RESTART IDENTITY CASCADE",
    ))
    .await?;

    let pool = create_pool(&database_url).await?;
    let config = AppConfig {
        database_url,
        host: "127.0.0.1".into(),
        port: 0,
        bank_code: "MB".into(),
        bank_account: "0000000000".into(),
    };

    Ok(Some((AppState { pool, orm, config }, guard)))
}

fn user_auth() -> AuthUser {
    AuthUser {
        user_id: Uuid::new_v4(),
        role: "user".into(),
    }
}

async fn seed_variant(
    state: &AppState,
    name: &str,
    base_price: i64,
    price_modifier: i64,
    stock: i32,
) -> anyhow::Result<(Uuid, Uuid)> {
    let product = ProductActive {
        product_id: Set(Uuid::new_v4()),
        name: Set(format!("{name} {}", Uuid::new_v4())),
        description: Set(None),
        base_price: Set(base_price),
        sold_count: Set(0),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    let variant = VariantActive {
        variant_id: Set(Uuid::new_v4()),
        product_id: Set(product.product_id),
        sku: Set(Uuid::new_v4().to_string()),
        size: Set(Some("M".into())),
        color_name: Set(None),
        stock_quantity: Set(stock),
        price_modifier: Set(price_modifier),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok((product.product_id, variant.variant_id))
}

async fn seed_address(state: &AppState, user_id: Uuid, city: &str) -> anyhow::Result<Uuid> {
    let address = AddressActive {
        address_id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        recipient_name: Set(Some("Test Recipient".into())),
        phone: Set(Some("0900000000".into())),
        street: Set(Some("1 Pho Hue".into())),
        ward: Set(None),
        district: Set(Some("Hai Ba Trung".into())),
        city: Set(Some(city.into())),
        is_default: Set(true),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;
    Ok(address.address_id)
}

async fn seed_voucher(
    state: &AppState,
    code: &str,
    discount_type: &str,
    discount_value: i64,
    min_order_value: i64,
    usage_limit: Option<i32>,
) -> anyhow::Result<()> {
    VoucherActive {
        voucher_id: NotSet,
        code: Set(code.into()),
        discount_type: Set(discount_type.into()),
        discount_value: Set(discount_value),
        min_order_value: Set(min_order_value),
        valid_from: Set((Utc::now() - Duration::days(1)).into()),
        valid_to: Set((Utc::now() + Duration::days(30)).into()),
        usage_limit: Set(usage_limit),
        used_count: Set(0),
        is_active: Set(true),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;
    Ok(())
}

async fn add_to_cart(
    state: &AppState,
    user_id: Uuid,
    variant_id: Uuid,
    quantity: i32,
) -> anyhow::Result<()> {
    CartItemActive {
        cart_item_id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        variant_id: Set(variant_id),
        quantity: Set(quantity),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;
    Ok(())
}

async fn variant_stock(state: &AppState, variant_id: Uuid) -> anyhow::Result<i32> {
    Ok(ProductVariants::find_by_id(variant_id)
        .one(&state.orm)
        .await?
        .map(|v| v.stock_quantity)
        .expect("variant exists"))
}

async fn product_sold(state: &AppState, product_id: Uuid) -> anyhow::Result<i64> {
    Ok(Products::find_by_id(product_id)
        .one(&state.orm)
        .await?
        .map(|p| p.sold_count)
        .expect("product exists"))
}

async fn voucher_used(state: &AppState, code: &str) -> anyhow::Result<i32> {
    use sea_orm::{ColumnTrait, QueryFilter};
    use storefront_checkout_api::entity::vouchers::Column as VoucherCol;
    Ok(Vouchers::find()
        .filter(VoucherCol::Code.eq(code))
        .one(&state.orm)
        .await?
        .map(|v| v.used_count)
        .expect("voucher exists"))
}

async fn cart_count(state: &AppState, user_id: Uuid) -> anyhow::Result<usize> {
    use sea_orm::{ColumnTrait, QueryFilter};
    use storefront_checkout_api::entity::cart_items::Column as CartCol;
    use storefront_checkout_api::entity::CartItems;
    Ok(CartItems::find()
        .filter(CartCol::UserId.eq(user_id))
        .all(&state.orm)
        .await?
        .len())
}
