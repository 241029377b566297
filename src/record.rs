use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_BRAND: &str = "Unbranded";
pub const DEFAULT_WARRANTY: &str = "Standard 1-year manufacturer warranty";
pub const DEFAULT_SHIPPING: &str = "Standard shipping, 3-5 business days";
pub const DEFAULT_RETURN_POLICY: &str = "30-day return policy, item must be in original condition";
pub const IN_STOCK: &str = "In Stock";
pub const OUT_OF_STOCK: &str = "Out of Stock";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Dimensions {
    pub width: f64,
    pub height: f64,
    pub depth: f64,
}

impl Default for Dimensions {
    fn default() -> Self {
        Self {
            width: 10.0,
            height: 10.0,
            depth: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Review {
    pub rating: f64,
    pub comment: String,
    pub date: String,
    pub reviewer_name: String,
    pub reviewer_email: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Meta {
    pub created_at: String,
    pub updated_at: String,
    pub barcode: String,
    pub qr_code: String,
}

/// A product as delivered by the source. Only id, title, price, category
/// and stock are required, everything else may be missing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRecord {
    pub id: u64,
    pub title: String,
    pub price: f64,
    pub category: String,
    pub stock: i64,
    pub description: Option<String>,
    pub discount_percentage: Option<f64>,
    pub rating: Option<f64>,
    pub brand: Option<String>,
    pub thumbnail: Option<String>,
    pub sku: Option<String>,
    pub tags: Option<Vec<String>>,
    pub weight: Option<f64>,
    pub dimensions: Option<Dimensions>,
    pub warranty_information: Option<String>,
    pub shipping_information: Option<String>,
    pub availability_status: Option<String>,
    pub reviews: Option<Vec<Review>>,
    pub return_policy: Option<String>,
    pub minimum_order_quantity: Option<u32>,
    pub meta: Option<Meta>,
}

/// A product with every field populated.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: u64,
    pub title: String,
    pub description: String,
    pub price: f64,
    pub discount_percentage: f64,
    pub rating: f64,
    pub category: String,
    pub brand: String,
    pub stock: u64,
    pub availability_status: String,
    pub thumbnail: String,
    pub sku: String,
    pub tags: Vec<String>,
    pub weight: f64,
    pub dimensions: Dimensions,
    pub warranty_information: String,
    pub shipping_information: String,
    pub reviews: Vec<Review>,
    pub return_policy: String,
    pub minimum_order_quantity: u32,
    pub meta: Meta,
}

impl Record {
    pub fn discounted_price(&self) -> f64 {
        self.price * (1.0 - self.discount_percentage / 100.0)
    }
}

#[derive(Debug, Deserialize)]
pub struct RawPage {
    pub products: Vec<RawRecord>,
    pub total: usize,
    pub skip: usize,
    pub limit: usize,
}

#[derive(Debug, Clone)]
pub struct Page {
    pub records: Vec<Record>,
    pub total: usize,
    pub skip: usize,
    pub limit: usize,
}

impl Page {
    pub fn from_raw(raw: RawPage, now: DateTime<Utc>) -> Self {
        let records: Vec<Record> = raw
            .products
            .into_iter()
            .map(|r| normalize(r, now))
            .collect();
        // A source may report limit 0 once skip runs past the end.
        let limit = raw.limit.max(1);
        let total = raw.total.max(raw.skip + records.len());
        Self {
            records,
            total,
            skip: raw.skip,
            limit,
        }
    }
}

// Empty strings and zeros count as missing, like the upstream data does.
fn present(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

fn positive(value: Option<f64>) -> Option<f64> {
    value.filter(|v| *v > 0.0 && v.is_finite())
}

fn non_negative(value: f64) -> f64 {
    if value.is_finite() { value.max(0.0) } else { 0.0 }
}

/// Pseudo random but stable weight in [0, 10) for records without one.
pub fn synthesized_weight(id: u64) -> f64 {
    let mixed = id.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15) >> 33;
    (mixed % 1000) as f64 / 100.0
}

pub fn availability_for(stock: u64) -> &'static str {
    if stock > 0 { IN_STOCK } else { OUT_OF_STOCK }
}

/// Fills every missing field of `raw` with a default.
pub fn normalize(raw: RawRecord, now: DateTime<Utc>) -> Record {
    let id = raw.id;
    let stock = raw.stock.max(0) as u64;
    let timestamp = now.to_rfc3339_opts(SecondsFormat::Millis, true);

    Record {
        id,
        title: raw.title,
        description: raw.description.unwrap_or_default(),
        price: non_negative(raw.price),
        discount_percentage: raw
            .discount_percentage
            .map(non_negative)
            .unwrap_or(0.0)
            .min(100.0),
        rating: raw.rating.map(non_negative).unwrap_or(0.0),
        category: raw.category,
        brand: present(raw.brand).unwrap_or_else(|| DEFAULT_BRAND.to_string()),
        stock,
        availability_status: present(raw.availability_status)
            .unwrap_or_else(|| availability_for(stock).to_string()),
        thumbnail: raw.thumbnail.unwrap_or_default(),
        sku: present(raw.sku).unwrap_or_else(|| format!("SKU-{id}")),
        tags: raw.tags.unwrap_or_default(),
        weight: positive(raw.weight).unwrap_or_else(|| synthesized_weight(id)),
        dimensions: raw
            .dimensions
            .map(|d| Dimensions {
                width: non_negative(d.width),
                height: non_negative(d.height),
                depth: non_negative(d.depth),
            })
            .unwrap_or_default(),
        warranty_information: present(raw.warranty_information)
            .unwrap_or_else(|| DEFAULT_WARRANTY.to_string()),
        shipping_information: present(raw.shipping_information)
            .unwrap_or_else(|| DEFAULT_SHIPPING.to_string()),
        reviews: raw
            .reviews
            .unwrap_or_default()
            .into_iter()
            .map(|review| Review {
                rating: non_negative(review.rating),
                ..review
            })
            .collect(),
        return_policy: present(raw.return_policy)
            .unwrap_or_else(|| DEFAULT_RETURN_POLICY.to_string()),
        minimum_order_quantity: raw.minimum_order_quantity.filter(|q| *q > 0).unwrap_or(1),
        meta: {
            let meta = raw.meta.unwrap_or_default();
            Meta {
                created_at: present(Some(meta.created_at)).unwrap_or_else(|| timestamp.clone()),
                updated_at: present(Some(meta.updated_at)).unwrap_or(timestamp),
                barcode: present(Some(meta.barcode)).unwrap_or_else(|| format!("BARCODE-{id}")),
                qr_code: present(Some(meta.qr_code)).unwrap_or_else(|| format!("QRCODE-{id}")),
            }
        },
    }
}
