use crate::domain::catalog::{Product, ProductVariant, ProductWithVariants};
use crate::error::{AggregationFailure, StageContext};
use crate::storage::CatalogStore;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use uuid::Uuid;

pub const DEFAULT_NEW_ARRIVALS_LIMIT: usize = 5;
pub const DEFAULT_MOST_REVIEWED_LIMIT: usize = 4;

/// Newest products first, each with its variants.
pub async fn list_new_arrivals(
    store: &dyn CatalogStore,
    limit: NonZeroUsize,
) -> Result<Vec<ProductWithVariants>, AggregationFailure> {
    let products = store
        .newest_products(&[], limit.get())
        .await
        .stage("new_arrivals")?;
    attach_variants(store, products).await
}

/// Products with the most ratings first, each with its variants.
pub async fn list_most_reviewed(
    store: &dyn CatalogStore,
    limit: NonZeroUsize,
) -> Result<Vec<ProductWithVariants>, AggregationFailure> {
    let products = store
        .most_reviewed_products(limit.get())
        .await
        .stage("most_reviewed")?;
    attach_variants(store, products).await
}

async fn attach_variants(
    store: &dyn CatalogStore,
    products: Vec<Product>,
) -> Result<Vec<ProductWithVariants>, AggregationFailure> {
    let ids: Vec<Uuid> = products.iter().map(|p| p.id).collect();
    let variants = if ids.is_empty() {
        Vec::new()
    } else {
        store
            .variants_for_products(&ids)
            .await
            .stage("listing_variants")?
    };

    let mut by_product: HashMap<Uuid, Vec<ProductVariant>> = HashMap::new();
    for v in variants {
        by_product.entry(v.product_id).or_default().push(v);
    }

    Ok(products
        .into_iter()
        .map(|product| {
            let product_variants = by_product.remove(&product.id).unwrap_or_default();
            ProductWithVariants {
                product,
                product_variants,
            }
        })
        .collect())
}
