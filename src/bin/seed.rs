use storefront_checkout_api::{config::AppConfig, db::create_pool};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    // Ensure migrations are applied.
    sqlx::migrate!("./migrations").run(&pool).await?;

    seed_catalog(&pool).await?;
    seed_vouchers(&pool).await?;

    println!("Seed completed");
    Ok(())
}

async fn seed_catalog(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let products = [
        ("Basic Tee", "Soft cotton tee", 250_000i64, &["S", "M", "L"][..]),
        ("Linen Shirt", "Breathable summer shirt", 500_000, &["M", "L"][..]),
        ("Canvas Tote", "Everyday carry bag", 180_000, &["One size"][..]),
    ];

    for (name, desc, base_price, sizes) in products {
        let product_id = Uuid::new_v4();
        let inserted = sqlx::query(
            r#"
            INSERT INTO products (product_id, name, description, base_price)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(product_id)
        .bind(name)
        .bind(desc)
        .bind(base_price)
        .execute(pool)
        .await?;

        if inserted.rows_affected() == 0 {
            continue;
        }

        for (i, size) in sizes.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO product_variants (variant_id, product_id, sku, size, stock_quantity, price_modifier)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (sku) DO NOTHING
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(product_id)
            .bind(format!("{}-{}", name.replace(' ', "-").to_uppercase(), size))
            .bind(size)
            .bind(50)
            .bind((i as i64) * 20_000)
            .execute(pool)
            .await?;
        }

        println!("Seeded product {name}");
    }

    Ok(())
}

async fn seed_vouchers(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO vouchers (code, discount_type, discount_value, min_order_value, valid_from, valid_to, usage_limit)
        VALUES
            ('SALE10', 'percent', 10, 0, now() - interval '1 day', now() + interval '90 days', NULL),
            ('WELCOME50K', 'fixed', 50000, 300000, now() - interval '1 day', now() + interval '30 days', 100)
        ON CONFLICT (code) DO NOTHING
        "#,
    )
    .execute(pool)
    .await?;

    println!("Seeded vouchers");
    Ok(())
}
