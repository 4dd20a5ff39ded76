//! Best-sellers ranking.
//!
//! Sales are summed per `(product, variant)` pair over orders that count as sold, the top
//! pairs are joined with the catalog for display, and a short list is padded with the
//! newest products that are not already ranked.

use crate::domain::catalog::{LineEntry, OrderStatus, Product, ProductVariant};
use crate::domain::ranking::{RankedItem, SalesTotal};
use crate::error::{AggregationFailure, StageContext};
use crate::storage::CatalogStore;
use std::collections::{HashMap, HashSet};
use std::num::NonZeroUsize;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct BestSellersRanker {
    store: Arc<dyn CatalogStore>,
}

impl BestSellersRanker {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self { store }
    }

    /// Ranked best sellers followed by newest-first backfill, at most `top_n` entries.
    pub async fn rank(&self, top_n: NonZeroUsize) -> Result<Vec<RankedItem>, AggregationFailure> {
        let top_n = top_n.get();

        let lines = self
            .store
            .eligible_line_entries(&OrderStatus::SOLD)
            .await
            .stage("line_entries")?;
        let totals = aggregate_sales(&lines, top_n);

        let mut out = self.resolve_ranked(&totals).await?;
        let ranked_len = out.len();

        if ranked_len < top_n {
            let exclude = unique_product_ids(out.iter().map(|item| item.product_id));
            let extras = self
                .store
                .newest_products(&exclude, top_n - ranked_len)
                .await
                .stage("backfill_products")?;

            let extra_ids: Vec<Uuid> = extras.iter().map(|p| p.id).collect();
            let with_variants = self.products_with_variants(&extra_ids).await?;

            out.extend(extras.into_iter().map(|product| {
                let has_variants = with_variants.contains(&product.id);
                backfill_item(product, has_variants)
            }));
        }

        tracing::debug!(
            top_n,
            eligible_lines = lines.len(),
            ranked = ranked_len,
            backfilled = out.len() - ranked_len,
            "best sellers computed"
        );

        Ok(out)
    }

    async fn resolve_ranked(
        &self,
        totals: &[SalesTotal],
    ) -> Result<Vec<RankedItem>, AggregationFailure> {
        if totals.is_empty() {
            return Ok(Vec::new());
        }

        let product_ids = unique_product_ids(totals.iter().map(|t| t.product_id));
        let variant_ids: Vec<Uuid> = totals.iter().filter_map(|t| t.variant_id).collect();

        let products: HashMap<Uuid, Product> = self
            .store
            .products_by_ids(&product_ids)
            .await
            .stage("ranked_products")?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();
        let variants: HashMap<Uuid, ProductVariant> = self
            .store
            .variants_by_ids(&variant_ids)
            .await
            .stage("ranked_variants")?
            .into_iter()
            .map(|v| (v.id, v))
            .collect();
        let with_variants = self.products_with_variants(&product_ids).await?;

        let mut out = Vec::with_capacity(totals.len());
        for total in totals {
            let Some(product) = products.get(&total.product_id) else {
                tracing::warn!(
                    product_id = %total.product_id,
                    total_sold = total.total_sold,
                    "sold product missing from catalog; leaving slot to backfill"
                );
                continue;
            };
            let variant = total.variant_id.and_then(|id| variants.get(&id));
            out.push(ranked_item(
                product,
                variant,
                total.total_sold,
                with_variants.contains(&product.id),
            ));
        }

        Ok(out)
    }

    async fn products_with_variants(
        &self,
        product_ids: &[Uuid],
    ) -> Result<HashSet<Uuid>, AggregationFailure> {
        if product_ids.is_empty() {
            return Ok(HashSet::new());
        }

        Ok(self
            .store
            .variants_for_products(product_ids)
            .await
            .stage("variant_links")?
            .into_iter()
            .map(|v| v.product_id)
            .collect())
    }
}

/// Sums quantities per `(product, variant)` pair and keeps the `top_n` best.
///
/// Ties on `total_sold` are broken by product id ascending, then variant id ascending with
/// the variant-less entry first.
pub fn aggregate_sales(lines: &[LineEntry], top_n: usize) -> Vec<SalesTotal> {
    let mut groups: HashMap<(Uuid, Option<Uuid>), i64> = HashMap::new();
    for line in lines {
        *groups.entry((line.product_id, line.variant_id)).or_insert(0) +=
            i64::from(line.quantity);
    }

    let mut totals: Vec<SalesTotal> = groups
        .into_iter()
        .map(|((product_id, variant_id), total_sold)| SalesTotal {
            product_id,
            variant_id,
            total_sold,
        })
        .collect();

    totals.sort_by(|a, b| {
        b.total_sold
            .cmp(&a.total_sold)
            .then_with(|| a.product_id.cmp(&b.product_id))
            .then_with(|| a.variant_id.cmp(&b.variant_id))
    });
    totals.truncate(top_n);
    totals
}

fn ranked_item(
    product: &Product,
    variant: Option<&ProductVariant>,
    total_sold: i64,
    has_variants: bool,
) -> RankedItem {
    let price = variant.map_or(product.price, |v| v.price);
    let image = variant
        .and_then(ProductVariant::first_image_url)
        .unwrap_or(product.image_cover.as_str())
        .to_string();

    RankedItem {
        product_id: product.id,
        name: product.name.clone(),
        price,
        image,
        total_sold,
        has_variants,
        variant: variant.cloned(),
    }
}

fn backfill_item(product: Product, has_variants: bool) -> RankedItem {
    RankedItem {
        product_id: product.id,
        name: product.name,
        price: product.price,
        image: product.image_cover,
        total_sold: 0,
        has_variants,
        variant: None,
    }
}

fn unique_product_ids(ids: impl Iterator<Item = Uuid>) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    ids.filter(|id| seen.insert(*id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::{CartItem, Order, VariantImage};
    use crate::storage::InMemoryCatalogStore;
    use chrono::{TimeZone, Utc};

    fn id(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    fn top(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    fn product(n: u128, day: u32) -> Product {
        Product {
            id: id(n),
            name: format!("Product {n}"),
            price: 100.0 + n as f64,
            image_cover: format!("https://img/cover-{n}.png"),
            ratings_count: None,
            created_at: Utc.with_ymd_and_hms(2026, 3, day, 12, 0, 0).unwrap(),
        }
    }

    fn variant(n: u128, product: u128, images: &[&str]) -> ProductVariant {
        ProductVariant {
            id: id(n),
            product_id: id(product),
            price: 50.0 + n as f64,
            sku: format!("SKU-{n}"),
            images: images
                .iter()
                .map(|url| VariantImage {
                    url: url.to_string(),
                })
                .collect(),
        }
    }

    fn order(n: u128, status: OrderStatus, lines: &[(u128, Option<u128>, i32)]) -> Order {
        Order {
            id: id(n),
            status,
            cart_items: lines
                .iter()
                .map(|&(product, variant, quantity)| CartItem {
                    product_id: id(product),
                    variant_id: variant.map(id),
                    quantity,
                })
                .collect(),
            created_at: Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).unwrap(),
        }
    }

    fn line(product: u128, variant: Option<u128>, quantity: i32) -> LineEntry {
        LineEntry {
            order_id: id(999),
            product_id: id(product),
            variant_id: variant.map(id),
            quantity,
        }
    }

    fn ranker(store: InMemoryCatalogStore) -> BestSellersRanker {
        BestSellersRanker::new(Arc::new(store))
    }

    #[test]
    fn aggregate_sums_per_product_variant_pair() {
        let lines = vec![
            line(1, None, 2),
            line(1, None, 3),
            line(1, Some(10), 4),
            line(2, Some(20), 1),
            line(1, None, 1),
        ];
        let totals = aggregate_sales(&lines, 10);
        assert_eq!(
            totals,
            vec![
                SalesTotal {
                    product_id: id(1),
                    variant_id: None,
                    total_sold: 6
                },
                SalesTotal {
                    product_id: id(1),
                    variant_id: Some(id(10)),
                    total_sold: 4
                },
                SalesTotal {
                    product_id: id(2),
                    variant_id: Some(id(20)),
                    total_sold: 1
                },
            ]
        );
    }

    #[test]
    fn aggregate_breaks_ties_by_product_then_variant() {
        let lines = vec![
            line(3, None, 5),
            line(2, Some(21), 5),
            line(2, Some(20), 5),
            line(2, None, 5),
            line(1, Some(10), 1),
        ];
        let totals = aggregate_sales(&lines, 3);
        let keys: Vec<_> = totals.iter().map(|t| (t.product_id, t.variant_id)).collect();
        assert_eq!(
            keys,
            vec![(id(2), None), (id(2), Some(id(20))), (id(2), Some(id(21)))]
        );
    }

    #[tokio::test]
    async fn ranks_by_total_sold_without_backfill_when_catalog_is_exhausted() {
        let store = InMemoryCatalogStore::new(
            vec![product(1, 1), product(2, 2)],
            vec![variant(21, 2, &["https://img/v21-a.png", "https://img/v21-b.png"])],
            vec![
                order(100, OrderStatus::Delivered, &[(1, None, 2)]),
                order(101, OrderStatus::Delivered, &[(1, None, 3)]),
                order(102, OrderStatus::Delivered, &[(1, None, 1), (2, Some(21), 5)]),
            ],
        );

        let out = ranker(store).rank(top(5)).await.unwrap();
        assert_eq!(out.len(), 2);

        assert_eq!(out[0].product_id, id(1));
        assert_eq!(out[0].total_sold, 6);
        assert_eq!(out[0].variant, None);
        assert_eq!(out[0].price, 101.0);
        assert_eq!(out[0].image, "https://img/cover-1.png");
        assert!(!out[0].has_variants);

        assert_eq!(out[1].product_id, id(2));
        assert_eq!(out[1].total_sold, 5);
        assert_eq!(out[1].variant.as_ref().map(|v| v.id), Some(id(21)));
        assert_eq!(out[1].price, 71.0);
        assert_eq!(out[1].image, "https://img/v21-a.png");
        assert!(out[1].has_variants);
    }

    #[tokio::test]
    async fn backfills_with_newest_unranked_products() {
        let store = InMemoryCatalogStore::new(
            vec![product(1, 1), product(2, 2), product(3, 3), product(4, 4)],
            vec![variant(30, 3, &[])],
            vec![order(100, OrderStatus::Shipped, &[(2, None, 7)])],
        );

        let out = ranker(store).rank(top(5)).await.unwrap();
        let ids: Vec<_> = out.iter().map(|item| item.product_id).collect();
        assert_eq!(ids, vec![id(2), id(4), id(3), id(1)]);
        assert_eq!(out[0].total_sold, 7);

        for item in &out[1..] {
            assert_eq!(item.total_sold, 0);
            assert_eq!(item.variant, None);
        }
        let backfilled_3 = &out[2];
        assert!(backfilled_3.has_variants);
        assert_eq!(backfilled_3.price, 103.0);
        assert_eq!(backfilled_3.image, "https://img/cover-3.png");
    }

    #[tokio::test]
    async fn backfill_stops_at_top_n() {
        let store = InMemoryCatalogStore::new(
            (1..=8).map(|n| product(n, n as u32)).collect(),
            vec![],
            vec![order(100, OrderStatus::Processing, &[(1, None, 1)])],
        );

        let out = ranker(store).rank(top(3)).await.unwrap();
        let ids: Vec<_> = out.iter().map(|item| item.product_id).collect();
        assert_eq!(ids, vec![id(1), id(8), id(7)]);
    }

    #[tokio::test]
    async fn cancelled_and_pending_orders_never_count() {
        let store = InMemoryCatalogStore::new(
            vec![product(1, 1), product(2, 2)],
            vec![],
            vec![
                order(100, OrderStatus::Cancelled, &[(1, None, 50)]),
                order(101, OrderStatus::Pending, &[(1, None, 50)]),
                order(102, OrderStatus::Delivered, &[(2, None, 1)]),
            ],
        );

        let out = ranker(store).rank(top(5)).await.unwrap();
        assert_eq!(out[0].product_id, id(2));
        assert_eq!(out[0].total_sold, 1);
        assert_eq!(out[1].product_id, id(1));
        assert_eq!(out[1].total_sold, 0);
    }

    #[tokio::test]
    async fn variant_without_images_falls_back_to_cover() {
        let store = InMemoryCatalogStore::new(
            vec![product(1, 1)],
            vec![variant(10, 1, &[])],
            vec![order(100, OrderStatus::Delivered, &[(1, Some(10), 2)])],
        );

        let out = ranker(store).rank(top(1)).await.unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].image, "https://img/cover-1.png");
        assert_eq!(out[0].price, 60.0);
        assert!(out[0].variant.is_some());
    }

    #[tokio::test]
    async fn variants_of_one_product_rank_separately() {
        let store = InMemoryCatalogStore::new(
            vec![product(1, 1), product(2, 2)],
            vec![variant(10, 1, &["https://img/v10.png"]), variant(11, 1, &[])],
            vec![order(
                100,
                OrderStatus::Delivered,
                &[(1, Some(10), 3), (1, Some(11), 2)],
            )],
        );

        let out = ranker(store).rank(top(5)).await.unwrap();
        let keys: Vec<_> = out
            .iter()
            .map(|item| (item.product_id, item.variant.as_ref().map(|v| v.id)))
            .collect();
        assert_eq!(
            keys,
            vec![(id(1), Some(id(10))), (id(1), Some(id(11))), (id(2), None)]
        );
    }

    #[tokio::test]
    async fn deleted_variant_keeps_slot_with_base_fields() {
        let store = InMemoryCatalogStore::new(
            vec![product(1, 1)],
            vec![],
            vec![order(100, OrderStatus::Delivered, &[(1, Some(77), 4)])],
        );

        let out = ranker(store).rank(top(5)).await.unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].total_sold, 4);
        assert_eq!(out[0].variant, None);
        assert_eq!(out[0].price, 101.0);
        assert_eq!(out[0].image, "https://img/cover-1.png");
        assert!(!out[0].has_variants);
    }

    #[tokio::test]
    async fn deleted_product_slot_is_backfilled() {
        let store = InMemoryCatalogStore::new(
            vec![product(1, 1), product(2, 2)],
            vec![],
            vec![order(
                100,
                OrderStatus::Delivered,
                &[(9, None, 100), (1, None, 1)],
            )],
        );

        let out = ranker(store).rank(top(2)).await.unwrap();
        let ids: Vec<_> = out.iter().map(|item| item.product_id).collect();
        assert_eq!(ids, vec![id(1), id(2)]);
        assert_eq!(out[1].total_sold, 0);
    }

    #[tokio::test]
    async fn empty_history_is_all_backfill() {
        let store = InMemoryCatalogStore::new(
            vec![product(1, 1), product(2, 2)],
            vec![],
            vec![],
        );
        let out = ranker(store).rank(top(5)).await.unwrap();
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|item| item.total_sold == 0));

        let empty = ranker(InMemoryCatalogStore::default());
        assert!(empty.rank(top(5)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn repeated_invocations_are_identical() {
        let store = InMemoryCatalogStore::new(
            (1..=6).map(|n| product(n, n as u32)).collect(),
            vec![variant(10, 1, &["https://img/v10.png"])],
            vec![
                order(100, OrderStatus::Delivered, &[(1, Some(10), 2), (2, None, 2)]),
                order(101, OrderStatus::Shipped, &[(3, None, 2)]),
            ],
        );
        let ranker = ranker(store);

        let first = ranker.rank(top(5)).await.unwrap();
        let second = ranker.rank(top(5)).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 5);
    }

    struct FailingStore;

    #[async_trait::async_trait]
    impl CatalogStore for FailingStore {
        async fn eligible_line_entries(
            &self,
            _statuses: &[OrderStatus],
        ) -> anyhow::Result<Vec<LineEntry>> {
            anyhow::bail!("connection reset by peer")
        }

        async fn products_by_ids(&self, _ids: &[Uuid]) -> anyhow::Result<Vec<Product>> {
            unreachable!()
        }

        async fn variants_by_ids(&self, _ids: &[Uuid]) -> anyhow::Result<Vec<ProductVariant>> {
            unreachable!()
        }

        async fn variants_for_products(
            &self,
            _product_ids: &[Uuid],
        ) -> anyhow::Result<Vec<ProductVariant>> {
            unreachable!()
        }

        async fn newest_products(
            &self,
            _exclude: &[Uuid],
            _limit: usize,
        ) -> anyhow::Result<Vec<Product>> {
            unreachable!()
        }

        async fn most_reviewed_products(&self, _limit: usize) -> anyhow::Result<Vec<Product>> {
            unreachable!()
        }
    }

    #[tokio::test]
    async fn store_failure_surfaces_as_aggregation_failure() {
        let err = BestSellersRanker::new(Arc::new(FailingStore))
            .rank(top(5))
            .await
            .unwrap_err();
        assert_eq!(err.stage, "line_entries");
        assert!(format!("{err:#}").contains("connection reset by peer"));
    }
}
