use crate::domain::catalog::{LineEntry, Order, OrderStatus, Product, ProductVariant};
use crate::storage::CatalogStore;
use std::cmp::Reverse;
use std::collections::HashSet;
use std::sync::RwLock;
use uuid::Uuid;

/// Catalog held in process memory; backs tests and the worker's dry-run seeding.
#[derive(Debug, Default)]
pub struct InMemoryCatalogStore {
    inner: RwLock<Snapshot>,
}

#[derive(Debug, Default, Clone)]
pub struct Snapshot {
    pub products: Vec<Product>,
    pub variants: Vec<ProductVariant>,
    pub orders: Vec<Order>,
}

impl InMemoryCatalogStore {
    pub fn new(products: Vec<Product>, variants: Vec<ProductVariant>, orders: Vec<Order>) -> Self {
        Self {
            inner: RwLock::new(Snapshot {
                products,
                variants,
                orders,
            }),
        }
    }

    fn read(&self) -> anyhow::Result<std::sync::RwLockReadGuard<'_, Snapshot>> {
        self.inner
            .read()
            .map_err(|_| anyhow::anyhow!("in-memory catalog lock poisoned"))
    }
}

#[async_trait::async_trait]
impl CatalogStore for InMemoryCatalogStore {
    async fn eligible_line_entries(
        &self,
        statuses: &[OrderStatus],
    ) -> anyhow::Result<Vec<LineEntry>> {
        let snapshot = self.read()?;
        Ok(snapshot
            .orders
            .iter()
            .filter(|order| statuses.contains(&order.status))
            .flat_map(|order| {
                order.cart_items.iter().map(move |item| LineEntry {
                    order_id: order.id,
                    product_id: item.product_id,
                    variant_id: item.variant_id,
                    quantity: item.quantity,
                })
            })
            .collect())
    }

    async fn products_by_ids(&self, ids: &[Uuid]) -> anyhow::Result<Vec<Product>> {
        let snapshot = self.read()?;
        Ok(snapshot
            .products
            .iter()
            .filter(|p| ids.contains(&p.id))
            .cloned()
            .collect())
    }

    async fn variants_by_ids(&self, ids: &[Uuid]) -> anyhow::Result<Vec<ProductVariant>> {
        let snapshot = self.read()?;
        Ok(snapshot
            .variants
            .iter()
            .filter(|v| ids.contains(&v.id))
            .cloned()
            .collect())
    }

    async fn variants_for_products(
        &self,
        product_ids: &[Uuid],
    ) -> anyhow::Result<Vec<ProductVariant>> {
        let snapshot = self.read()?;
        let mut out: Vec<ProductVariant> = snapshot
            .variants
            .iter()
            .filter(|v| product_ids.contains(&v.product_id))
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            a.product_id
                .cmp(&b.product_id)
                .then_with(|| a.sku.cmp(&b.sku))
        });
        Ok(out)
    }

    async fn newest_products(
        &self,
        exclude: &[Uuid],
        limit: usize,
    ) -> anyhow::Result<Vec<Product>> {
        let snapshot = self.read()?;
        let exclude: HashSet<&Uuid> = exclude.iter().collect();
        let mut out: Vec<Product> = snapshot
            .products
            .iter()
            .filter(|p| !exclude.contains(&p.id))
            .cloned()
            .collect();
        out.sort_by_key(|p| (Reverse(p.created_at), p.id));
        out.truncate(limit);
        Ok(out)
    }

    async fn most_reviewed_products(&self, limit: usize) -> anyhow::Result<Vec<Product>> {
        let snapshot = self.read()?;
        let mut out = snapshot.products.clone();
        out.sort_by_key(|p| (Reverse(p.ratings_count.unwrap_or(0)), Reverse(p.created_at), p.id));
        out.truncate(limit);
        Ok(out)
    }
}
