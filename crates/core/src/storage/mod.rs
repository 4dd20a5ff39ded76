pub mod memory;
pub mod postgres;

use crate::domain::catalog::{LineEntry, OrderStatus, Product, ProductVariant};
use anyhow::Context;
use uuid::Uuid;

pub use memory::InMemoryCatalogStore;
pub use postgres::PgCatalogStore;

pub async fn migrate(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("sqlx migrations failed")?;
    Ok(())
}

/// Read-only view of the catalog and order log.
///
/// Every call reads a fresh snapshot; implementations must not cache between calls.
#[async_trait::async_trait]
pub trait CatalogStore: Send + Sync {
    /// Cart lines of every order whose status is in `statuses`, one entry per line.
    async fn eligible_line_entries(&self, statuses: &[OrderStatus])
        -> anyhow::Result<Vec<LineEntry>>;

    async fn products_by_ids(&self, ids: &[Uuid]) -> anyhow::Result<Vec<Product>>;

    async fn variants_by_ids(&self, ids: &[Uuid]) -> anyhow::Result<Vec<ProductVariant>>;

    /// All variants owned by any of `product_ids`.
    async fn variants_for_products(
        &self,
        product_ids: &[Uuid],
    ) -> anyhow::Result<Vec<ProductVariant>>;

    /// Newest products first (ties by id ascending), skipping `exclude`.
    async fn newest_products(&self, exclude: &[Uuid], limit: usize)
        -> anyhow::Result<Vec<Product>>;

    /// Products by ratings count descending (missing counts as 0), newest first on ties.
    async fn most_reviewed_products(&self, limit: usize) -> anyhow::Result<Vec<Product>>;
}
