use crate::domain::catalog::ProductVariant;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A best-sellers slot: sales rank blended with the catalog fields needed for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedItem {
    #[serde(rename = "_id")]
    pub product_id: Uuid,
    pub name: String,
    pub price: f64,
    pub image: String,
    pub total_sold: i64,
    pub has_variants: bool,
    pub variant: Option<ProductVariant>,
}

/// Units sold for one `(product, variant)` pair across eligible orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SalesTotal {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub total_sold: i64,
}
