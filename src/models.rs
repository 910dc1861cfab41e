// Data structures shared by the catalog pipeline, the session layer and the HTTP surface

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub const SPEC_BODY_TYPE: &str = "body_type";
pub const SPEC_FUEL_TYPE: &str = "fuel_type";
pub const SPEC_TRANSMISSION: &str = "transmission";
pub const SPEC_STEERING_SIDE: &str = "steering_side";
pub const SPEC_REGIONAL: &str = "regional_specification";
pub const SPEC_COLOR: &str = "color";

/// Listing identifier. The API hands out numeric ids; generated ids are strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ListingId {
    Number(i64),
    Text(String),
}

impl ListingId {
    pub fn generated() -> Self {
        ListingId::Text(format!("generated-{}", uuid::Uuid::new_v4()))
    }

    pub fn as_number(&self) -> Option<i64> {
        match self {
            ListingId::Number(n) => Some(*n),
            ListingId::Text(s) => s.parse().ok(),
        }
    }
}

impl fmt::Display for ListingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListingId::Number(n) => write!(f, "{}", n),
            ListingId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for ListingId {
    fn from(value: i64) -> Self {
        ListingId::Number(value)
    }
}

impl From<&str> for ListingId {
    fn from(value: &str) -> Self {
        match value.parse::<i64>() {
            Ok(n) => ListingId::Number(n),
            Err(_) => ListingId::Text(value.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingImage {
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_path: Option<String>,
}

impl ListingImage {
    pub fn from_uri(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            filename: None,
            full_path: None,
        }
    }
}

/// One backend specification value attached to a car, e.g. `fuel_type` -> `Hybrid`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecificationValue {
    pub key: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
}

/// Normalized car record consumed by every listing surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub id: ListingId,
    pub stock_id: String,
    pub brand: String,
    pub brand_id: Option<i64>,
    pub model: String,
    pub model_id: Option<i64>,
    pub trim: String,
    pub trim_id: Option<i64>,
    pub year: Option<i32>,
    pub year_id: Option<i64>,
    pub price: Option<f64>,
    pub color: String,
    pub images: Vec<ListingImage>,
    pub specifications: BTreeMap<String, String>,
    pub specification_values: Vec<SpecificationValue>,
    pub slug: String,
}

impl Listing {
    pub fn specification(&self, key: &str) -> Option<&str> {
        self.specifications.get(key).map(String::as_str)
    }

    pub fn body_type(&self) -> Option<&str> {
        self.specification(SPEC_BODY_TYPE)
    }

    pub fn fuel_type(&self) -> Option<&str> {
        self.specification(SPEC_FUEL_TYPE)
    }

    pub fn transmission(&self) -> Option<&str> {
        self.specification(SPEC_TRANSMISSION)
    }

    pub fn steering_side(&self) -> Option<&str> {
        self.specification(SPEC_STEERING_SIDE)
    }

    pub fn regional_specification(&self) -> Option<&str> {
        self.specification(SPEC_REGIONAL)
    }

    /// "Price on request" listings carry no price.
    pub fn is_price_on_request(&self) -> bool {
        self.price.is_none()
    }

    pub fn title(&self) -> String {
        let mut parts = Vec::with_capacity(4);
        if let Some(year) = self.year {
            parts.push(year.to_string());
        }
        parts.push(self.brand.clone());
        parts.push(self.model.clone());
        if !self.trim.is_empty() {
            parts.push(self.trim.clone());
        }
        parts.join(" ")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Brand {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default, alias = "logo_url")]
    pub logo: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CarModel {
    pub id: i64,
    pub name: String,
    #[serde(default, alias = "brand_id")]
    pub brand_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trim {
    pub id: i64,
    pub name: String,
    #[serde(default, alias = "model_id", alias = "carModelId")]
    pub model_id: Option<i64>,
}

/// A selectable value for one specification key, e.g. all known body types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecificationOption {
    pub id: i64,
    #[serde(alias = "value")]
    pub name: String,
}

/// User-chosen constraints. Empty vectors mean "no constraint" for that dimension.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterSelection {
    pub brands: Vec<String>,
    pub brand_ids: Vec<i64>,
    pub models: Vec<String>,
    pub model_ids: Vec<i64>,
    pub trims: Vec<String>,
    pub trim_ids: Vec<i64>,
    pub years: Vec<String>,
    pub year_ids: Vec<i64>,
    pub specifications: BTreeMap<String, Vec<String>>,
    #[serde(rename = "minPriceAED")]
    pub min_price_aed: Option<f64>,
    #[serde(rename = "maxPriceAED")]
    pub max_price_aed: Option<f64>,
}

impl FilterSelection {
    pub fn is_empty(&self) -> bool {
        self.brands.is_empty()
            && self.brand_ids.is_empty()
            && self.models.is_empty()
            && self.model_ids.is_empty()
            && self.trims.is_empty()
            && self.trim_ids.is_empty()
            && self.years.is_empty()
            && self.year_ids.is_empty()
            && self.specifications.values().all(Vec::is_empty)
            && self.min_price_aed.is_none()
            && self.max_price_aed.is_none()
    }

    pub fn with_brand(mut self, name: &str) -> Self {
        self.brands.push(name.to_string());
        self
    }

    pub fn with_brand_id(mut self, id: i64) -> Self {
        self.brand_ids.push(id);
        self
    }

    pub fn with_specification(mut self, key: &str, value: &str) -> Self {
        self.specifications
            .entry(key.to_string())
            .or_default()
            .push(value.to_string());
        self
    }

    pub fn with_price_range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min_price_aed = min;
        self.max_price_aed = max;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingSource {
    Live,
    Fallback,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogPage {
    pub listings: Vec<Listing>,
    pub total: usize,
    pub page: u32,
    pub source: ListingSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistItem {
    pub car_id: ListingId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub car: Option<Listing>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub user: serde_json::Value,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogPost {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, alias = "image_url", alias = "imageUrl")]
    pub image: Option<String>,
    #[serde(default, alias = "published_at", alias = "createdAt")]
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticPage {
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, alias = "body")]
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn listing_id_accepts_numbers_and_strings() {
        let n: ListingId = serde_json::from_value(json!(42)).unwrap();
        let s: ListingId = serde_json::from_value(json!("stock-7")).unwrap();
        assert_eq!(n, ListingId::Number(42));
        assert_eq!(s, ListingId::Text("stock-7".into()));
        assert_eq!(ListingId::from("17").as_number(), Some(17));
    }

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(ListingId::generated(), ListingId::generated());
    }

    #[test]
    fn filter_selection_reads_frontend_keys() {
        let selection: FilterSelection = serde_json::from_value(json!({
            "brands": ["BYD"],
            "brandIds": [3],
            "specifications": { "fuel_type": ["Hybrid"] },
            "minPriceAED": 50000
        }))
        .unwrap();
        assert_eq!(selection.brand_ids, vec![3]);
        assert_eq!(selection.min_price_aed, Some(50000.0));
        assert!(!selection.is_empty());
        assert!(FilterSelection::default().is_empty());
    }

    #[test]
    fn selection_with_only_empty_spec_lists_is_empty() {
        let mut selection = FilterSelection::default();
        selection.specifications.insert("color".into(), Vec::new());
        assert!(selection.is_empty());
    }
}
