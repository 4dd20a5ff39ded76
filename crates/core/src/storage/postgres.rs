use crate::domain::catalog::{LineEntry, OrderStatus, Product, ProductVariant, VariantImage};
use crate::storage::CatalogStore;
use anyhow::Context;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use uuid::Uuid;

type ProductRow = (Uuid, String, f64, String, Option<i64>, DateTime<Utc>);
type VariantRow = (Uuid, Uuid, f64, String, Json<Vec<VariantImage>>);

const PRODUCT_COLUMNS: &str = "id, name, price, image_cover, ratings_count, created_at";
const VARIANT_COLUMNS: &str = "id, product_id, price, sku, images";

#[derive(Debug, Clone)]
pub struct PgCatalogStore {
    pool: sqlx::PgPool,
}

impl PgCatalogStore {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl CatalogStore for PgCatalogStore {
    async fn eligible_line_entries(
        &self,
        statuses: &[OrderStatus],
    ) -> anyhow::Result<Vec<LineEntry>> {
        let statuses: Vec<String> = statuses.iter().map(|s| s.as_str().to_string()).collect();

        let rows = sqlx::query_as::<_, (Uuid, Uuid, Option<Uuid>, i32)>(
            "SELECT oi.order_id, oi.product_id, oi.variant_id, oi.quantity \
             FROM order_items oi \
             JOIN orders o ON o.id = oi.order_id \
             WHERE o.status = ANY($1) \
             ORDER BY oi.order_id ASC, oi.line_no ASC",
        )
        .persistent(false)
        .bind(&statuses)
        .fetch_all(&self.pool)
        .await
        .context("select eligible order_items failed")?;

        Ok(rows
            .into_iter()
            .map(|(order_id, product_id, variant_id, quantity)| LineEntry {
                order_id,
                product_id,
                variant_id,
                quantity,
            })
            .collect())
    }

    async fn products_by_ids(&self, ids: &[Uuid]) -> anyhow::Result<Vec<Product>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ANY($1)"
        ))
        .persistent(false)
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .context("select products by id failed")?;

        Ok(rows.into_iter().map(product_from_row).collect())
    }

    async fn variants_by_ids(&self, ids: &[Uuid]) -> anyhow::Result<Vec<ProductVariant>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, VariantRow>(&format!(
            "SELECT {VARIANT_COLUMNS} FROM product_variants WHERE id = ANY($1)"
        ))
        .persistent(false)
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .context("select product_variants by id failed")?;

        Ok(rows.into_iter().map(variant_from_row).collect())
    }

    async fn variants_for_products(
        &self,
        product_ids: &[Uuid],
    ) -> anyhow::Result<Vec<ProductVariant>> {
        if product_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, VariantRow>(&format!(
            "SELECT {VARIANT_COLUMNS} FROM product_variants \
             WHERE product_id = ANY($1) \
             ORDER BY product_id ASC, sku ASC"
        ))
        .persistent(false)
        .bind(product_ids)
        .fetch_all(&self.pool)
        .await
        .context("select product_variants by product failed")?;

        Ok(rows.into_iter().map(variant_from_row).collect())
    }

    async fn newest_products(
        &self,
        exclude: &[Uuid],
        limit: usize,
    ) -> anyhow::Result<Vec<Product>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE NOT (id = ANY($1)) \
             ORDER BY created_at DESC, id ASC \
             LIMIT $2"
        ))
        .persistent(false)
        .bind(exclude)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .context("select newest products failed")?;

        Ok(rows.into_iter().map(product_from_row).collect())
    }

    async fn most_reviewed_products(&self, limit: usize) -> anyhow::Result<Vec<Product>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             ORDER BY COALESCE(ratings_count, 0) DESC, created_at DESC, id ASC \
             LIMIT $1"
        ))
        .persistent(false)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .context("select most reviewed products failed")?;

        Ok(rows.into_iter().map(product_from_row).collect())
    }
}

fn product_from_row(row: ProductRow) -> Product {
    let (id, name, price, image_cover, ratings_count, created_at) = row;
    Product {
        id,
        name,
        price,
        image_cover,
        ratings_count,
        created_at,
    }
}

fn variant_from_row(row: VariantRow) -> ProductVariant {
    let (id, product_id, price, sku, Json(images)) = row;
    ProductVariant {
        id,
        product_id,
        price,
        sku,
        images,
    }
}
