use crate::domain::catalog::{
    CartItem, Order, OrderStatus, Product, ProductVariant, VariantImage,
};
use crate::storage::memory::Snapshot;
use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use sqlx::types::Json;
use uuid::Uuid;

const PRODUCT_NAMESPACE: u128 = 0x5EED_0001 << 64;
const VARIANT_NAMESPACE: u128 = 0x5EED_0002 << 64;
const ORDER_NAMESPACE: u128 = 0x5EED_0003 << 64;

const STATUS_CYCLE: [OrderStatus; 5] = [
    OrderStatus::Delivered,
    OrderStatus::Shipped,
    OrderStatus::Processing,
    OrderStatus::Pending,
    OrderStatus::Cancelled,
];

const INSERT_BATCH: usize = 200;

/// Deterministic demo catalog: `size` products (every third one with two variants) and
/// `2 * size` orders spread over every status.
pub fn build_demo_catalog(size: usize, now: DateTime<Utc>) -> anyhow::Result<Snapshot> {
    anyhow::ensure!(
        (1..=500).contains(&size),
        "seed size must be 1..=500 (got {size})"
    );

    let mut products = Vec::with_capacity(size);
    let mut variants = Vec::new();

    for i in 1..=size {
        let n = i as u128;
        let product_id = Uuid::from_u128(PRODUCT_NAMESPACE | n);
        products.push(Product {
            id: product_id,
            name: format!("Demo Product {i:04}"),
            price: 10.0 + i as f64,
            image_cover: format!("https://cdn.example.com/products/{i:04}/cover.jpg"),
            ratings_count: (i % 5 != 0).then_some(((i * 7) % 50) as i64),
            created_at: now - Duration::hours(i as i64),
        });

        if i % 3 == 0 {
            for k in 0..2u128 {
                let images = if k == 0 {
                    vec![VariantImage {
                        url: format!("https://cdn.example.com/products/{i:04}/v{k}.jpg"),
                    }]
                } else {
                    Vec::new()
                };
                variants.push(ProductVariant {
                    id: Uuid::from_u128(VARIANT_NAMESPACE | (n << 8) | k),
                    product_id,
                    price: 12.5 + i as f64 + k as f64,
                    sku: format!("DEMO-{i:04}-{k}"),
                    images,
                });
            }
        }
    }

    let mut orders = Vec::with_capacity(size * 2);
    for j in 1..=size * 2 {
        let mut cart_items = vec![demo_line(&products, &variants, j * 3)];
        if j % 4 == 0 {
            cart_items.push(demo_line(&products, &variants, j * 5 + 1));
        }
        orders.push(Order {
            id: Uuid::from_u128(ORDER_NAMESPACE | j as u128),
            status: STATUS_CYCLE[j % STATUS_CYCLE.len()],
            cart_items,
            created_at: now - Duration::minutes(j as i64),
        });
    }

    Ok(Snapshot {
        products,
        variants,
        orders,
    })
}

fn demo_line(products: &[Product], variants: &[ProductVariant], seed: usize) -> CartItem {
    let product = &products[seed % products.len()];
    let own: Vec<&ProductVariant> = variants
        .iter()
        .filter(|v| v.product_id == product.id)
        .collect();
    let variant_id = if own.is_empty() {
        None
    } else {
        Some(own[seed % own.len()].id)
    };

    CartItem {
        product_id: product.id,
        variant_id,
        quantity: (seed % 4) as i32 + 1,
    }
}

/// Writes `snapshot` in one transaction. Rows that already exist are left untouched.
pub async fn persist_snapshot(pool: &sqlx::PgPool, snapshot: &Snapshot) -> anyhow::Result<u64> {
    let mut tx = pool.begin().await.context("begin transaction failed")?;
    let mut affected: u64 = 0;

    for chunk in snapshot.products.chunks(INSERT_BATCH) {
        let mut qb = sqlx::QueryBuilder::new(
            "INSERT INTO products (id, name, price, image_cover, ratings_count, created_at) ",
        );
        qb.push_values(chunk, |mut b, p| {
            b.push_bind(p.id)
                .push_bind(&p.name)
                .push_bind(p.price)
                .push_bind(&p.image_cover)
                .push_bind(p.ratings_count)
                .push_bind(p.created_at);
        });
        qb.push(" ON CONFLICT (id) DO NOTHING");
        affected += qb
            .build()
            .persistent(false)
            .execute(&mut *tx)
            .await
            .context("batch insert products failed")?
            .rows_affected();
    }

    for chunk in snapshot.variants.chunks(INSERT_BATCH) {
        let mut qb = sqlx::QueryBuilder::new(
            "INSERT INTO product_variants (id, product_id, price, sku, images) ",
        );
        qb.push_values(chunk, |mut b, v| {
            b.push_bind(v.id)
                .push_bind(v.product_id)
                .push_bind(v.price)
                .push_bind(&v.sku)
                .push_bind(Json(&v.images));
        });
        qb.push(" ON CONFLICT (id) DO NOTHING");
        affected += qb
            .build()
            .persistent(false)
            .execute(&mut *tx)
            .await
            .context("batch insert product_variants failed")?
            .rows_affected();
    }

    for order in &snapshot.orders {
        let res = sqlx::query(
            "INSERT INTO orders (id, status, created_at) VALUES ($1, $2, $3) \
             ON CONFLICT (id) DO NOTHING",
        )
        .persistent(false)
        .bind(order.id)
        .bind(order.status.as_str())
        .bind(order.created_at)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("insert order failed (id={})", order.id))?;

        if res.rows_affected() == 0 {
            continue;
        }
        affected += 1;

        for (line_no, item) in order.cart_items.iter().enumerate() {
            sqlx::query(
                "INSERT INTO order_items (order_id, line_no, product_id, variant_id, quantity) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .persistent(false)
            .bind(order.id)
            .bind(line_no as i32)
            .bind(item.product_id)
            .bind(item.variant_id)
            .bind(item.quantity)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("insert order_items failed (order_id={})", order.id))?;
            affected += 1;
        }
    }

    tx.commit().await.context("commit transaction failed")?;
    Ok(affected)
}

pub async fn seed_demo_catalog(pool: &sqlx::PgPool, size: usize) -> anyhow::Result<u64> {
    let snapshot = build_demo_catalog(size, Utc::now())?;
    let affected = persist_snapshot(pool, &snapshot).await?;
    tracing::info!(
        size,
        products = snapshot.products.len(),
        variants = snapshot.variants.len(),
        orders = snapshot.orders.len(),
        affected,
        "seeded demo catalog"
    );
    Ok(affected)
}
