//! Turns raw car records of any known API shape into canonical [`Listing`]s.
//!
//! Every field is resolved by trying the nested relation object first
//! (`Brand.name`), then the flat field (`brand`), then a fixed default.
//! Input records are only borrowed; normalization never mutates them.

use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

use crate::images::ImageResolver;
use crate::models::{
    Listing, ListingId, ListingImage, SpecificationValue, SPEC_BODY_TYPE, SPEC_COLOR,
    SPEC_FUEL_TYPE, SPEC_REGIONAL, SPEC_STEERING_SIDE, SPEC_TRANSMISSION,
};

pub const UNKNOWN_BRAND: &str = "Unknown Brand";
pub const UNKNOWN_MODEL: &str = "Unknown Model";

/// Defaulted specification fields: (key, alternate backend keys, flat property, default).
const DEFAULTED_SPECS: [(&str, &[&str], &str, &str); 5] = [
    (SPEC_BODY_TYPE, &[], "bodyType", "SUV"),
    (SPEC_FUEL_TYPE, &[], "fuelType", "Electric"),
    (SPEC_TRANSMISSION, &[], "transmission", "Automatic"),
    (SPEC_STEERING_SIDE, &["steering"], "steeringSide", "Left hand drive"),
    (SPEC_REGIONAL, &[], "regionalSpecification", "China"),
];

const KNOWN_COLORS: [&str; 14] = [
    "white", "black", "silver", "grey", "gray", "red", "blue", "green", "yellow", "orange",
    "brown", "beige", "gold", "purple",
];

#[derive(Debug, Error, PartialEq)]
pub enum NormalizeError {
    #[error("car record is not an object (got {0})")]
    NotAnObject(&'static str),
}

/// Normalizes one raw record. Falsy input (`null`, `false`, `0`, `""`) gives `None`.
pub fn normalize_listing(raw: &Value, images: &ImageResolver) -> Option<Listing> {
    match try_normalize(raw, images) {
        Ok(listing) => listing,
        Err(e) => {
            tracing::warn!(error = %e, "Dropping car record that could not be normalized");
            None
        }
    }
}

pub fn try_normalize(raw: &Value, images: &ImageResolver) -> Result<Option<Listing>, NormalizeError> {
    if is_falsy(raw) {
        return Ok(None);
    }
    let car = raw.as_object().ok_or(NormalizeError::NotAnObject(kind_of(raw)))?;

    let brand = relation_name(car, &["Brand", "brand"]).unwrap_or_else(|| UNKNOWN_BRAND.to_string());
    let model = relation_name(car, &["CarModel", "carModel", "model"])
        .unwrap_or_else(|| UNKNOWN_MODEL.to_string());
    let trim = relation_name(car, &["Trim", "trim"]).unwrap_or_default();
    let year = resolve_year(car);

    let specification_values = collect_specification_values(car);
    let specifications = build_specifications(car, &specification_values);

    let slug = string_field(car, &["slug"]).unwrap_or_else(|| synthesize_slug(year, &brand, &model, &trim));
    let color = string_field(car, &["color", "colour"])
        .or_else(|| {
            specification_values
                .iter()
                .find(|v| v.key == SPEC_COLOR || v.key == "exterior_color")
                .map(|v| v.name.clone())
        })
        .or_else(|| infer_color(&slug))
        .unwrap_or_default();

    Ok(Some(Listing {
        id: resolve_id(car),
        stock_id: string_field(car, &["stockId", "stock_id", "stockNumber"]).unwrap_or_default(),
        brand_id: relation_id(car, &["Brand", "brand"], &["brandId", "brand_id"]),
        model_id: relation_id(car, &["CarModel", "carModel", "model"], &["carModelId", "modelId", "model_id"]),
        trim_id: relation_id(car, &["Trim", "trim"], &["trimId", "trim_id"]),
        year_id: relation_id(car, &["Year"], &["yearId", "year_id"]),
        brand,
        model,
        trim,
        year,
        price: number_field(car, &["price", "priceAED", "price_aed"]),
        color,
        images: resolve_images(car, images),
        specifications,
        specification_values,
        slug,
    }))
}

/// Normalizes a batch, dropping records that fail instead of aborting.
pub fn normalize_batch(raw: &[Value], images: &ImageResolver) -> Vec<Listing> {
    let listings: Vec<Listing> = raw
        .iter()
        .enumerate()
        .filter_map(|(index, car)| match try_normalize(car, images) {
            Ok(listing) => listing,
            Err(e) => {
                tracing::warn!(index, error = %e, "Dropping car record from batch");
                None
            }
        })
        .collect();
    tracing::debug!(received = raw.len(), normalized = listings.len(), "Normalized listing batch");
    listings
}

/// Keeps the first listing for every id.
pub fn dedup_by_id(listings: Vec<Listing>) -> Vec<Listing> {
    let mut seen = HashSet::new();
    listings
        .into_iter()
        .filter(|listing| seen.insert(listing.id.clone()))
        .collect()
}

pub fn synthesize_slug(year: Option<i32>, brand: &str, model: &str, trim: &str) -> String {
    let year = year.map(|y| y.to_string()).unwrap_or_default();
    let joined = [year.as_str(), brand, model, trim]
        .iter()
        .filter(|part| !part.trim().is_empty())
        .map(|part| part.trim().to_lowercase())
        .collect::<Vec<_>>()
        .join("-");

    let mut slug = String::with_capacity(joined.len());
    for ch in joined.chars() {
        if ch.is_alphanumeric() {
            slug.push(ch);
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_matches('-').to_string()
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn resolve_id(car: &Map<String, Value>) -> ListingId {
    ["id", "carId", "car_id"]
        .iter()
        .filter_map(|key| car.get(*key))
        .find_map(|value| match value {
            Value::Number(n) => n.as_i64().map(ListingId::Number),
            Value::String(s) if !s.trim().is_empty() => Some(ListingId::from(s.trim())),
            _ => None,
        })
        .unwrap_or_else(ListingId::generated)
}

fn non_empty_str(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn string_field(car: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().filter_map(|key| car.get(*key)).find_map(|value| match value {
        Value::Number(n) => Some(n.to_string()),
        other => non_empty_str(other),
    })
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.replace(',', "").trim().parse().ok(),
        _ => None,
    }
}

fn number_field(car: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter().filter_map(|key| car.get(*key)).find_map(as_number)
}

fn as_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Name from a nested relation object, or the flat string under the same key.
fn relation_name(car: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().filter_map(|key| car.get(*key)).find_map(|value| match value {
        Value::Object(relation) => relation.get("name").and_then(non_empty_str),
        other => non_empty_str(other),
    })
}

fn relation_id(car: &Map<String, Value>, relation_keys: &[&str], flat_keys: &[&str]) -> Option<i64> {
    relation_keys
        .iter()
        .filter_map(|key| car.get(*key).and_then(Value::as_object))
        .find_map(|relation| relation.get("id").and_then(as_id))
        .or_else(|| flat_keys.iter().filter_map(|key| car.get(*key)).find_map(as_id))
}

fn resolve_year(car: &Map<String, Value>) -> Option<i32> {
    let nested = car.get("Year").and_then(Value::as_object).and_then(|year| {
        year.get("year")
            .or_else(|| year.get("name"))
            .and_then(as_number)
    });
    nested
        .or_else(|| car.get("year").and_then(as_number))
        .map(|y| y as i32)
}

fn collect_specification_values(car: &Map<String, Value>) -> Vec<SpecificationValue> {
    let Some(entries) = ["SpecificationValues", "specificationValues"]
        .iter()
        .find_map(|key| car.get(*key).and_then(Value::as_array))
    else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| {
            let key = entry
                .get("Specification")
                .or_else(|| entry.get("specification"))
                .and_then(|spec| spec.get("key"))
                .or_else(|| entry.get("key"))
                .and_then(non_empty_str)?;
            let name = entry
                .get("name")
                .or_else(|| entry.get("value"))
                .and_then(non_empty_str)?;
            Some(SpecificationValue {
                key,
                name,
                id: entry.get("id").and_then(as_id),
            })
        })
        .collect()
}

fn build_specifications(
    car: &Map<String, Value>,
    values: &[SpecificationValue],
) -> BTreeMap<String, String> {
    let existing = car.get("specifications").and_then(Value::as_object);
    let mut specs = BTreeMap::new();

    for value in values {
        specs.entry(value.key.clone()).or_insert_with(|| value.name.clone());
    }

    for (key, alternates, flat_property, default) in DEFAULTED_SPECS {
        let from_values = values
            .iter()
            .find(|v| v.key == key || alternates.contains(&v.key.as_str()))
            .map(|v| v.name.clone());
        let resolved = from_values
            .or_else(|| existing.and_then(|m| m.get(key)).and_then(non_empty_str))
            .or_else(|| car.get(flat_property).and_then(non_empty_str))
            .unwrap_or_else(|| default.to_string());
        specs.insert(key.to_string(), resolved);
    }

    for alternate in DEFAULTED_SPECS.iter().flat_map(|(_, alternates, _, _)| alternates.iter()) {
        specs.remove(*alternate);
    }
    specs
}

fn infer_color(slug: &str) -> Option<String> {
    let words: Vec<&str> = slug.split(|c: char| !c.is_alphanumeric()).collect();
    KNOWN_COLORS
        .iter()
        .find(|color| words.iter().any(|w| w.eq_ignore_ascii_case(color)))
        .map(|color| {
            let mut chars = color.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
}

fn resolve_images(car: &Map<String, Value>, resolver: &ImageResolver) -> Vec<ListingImage> {
    let from_car_images: Vec<ListingImage> = car
        .get("CarImages")
        .and_then(Value::as_array)
        .map(|entries| entries.iter().filter_map(|e| car_image(e, resolver)).collect())
        .unwrap_or_default();
    if !from_car_images.is_empty() {
        return from_car_images;
    }

    for key in ["images", "Images"] {
        if let Some(entries) = car.get(key).and_then(Value::as_array) {
            let resolved: Vec<ListingImage> = entries.iter().filter_map(|e| loose_image(e, resolver)).collect();
            if !resolved.is_empty() {
                return resolved;
            }
        }
    }

    if let Some(image) = car.get("image").and_then(|e| loose_image(e, resolver)) {
        return vec![image];
    }

    vec![resolver.placeholder()]
}

fn car_image(entry: &Value, resolver: &ImageResolver) -> Option<ListingImage> {
    let file = entry.get("FileSystem").or_else(|| entry.get("fileSystem"));
    let path = file
        .and_then(|f| f.get("path"))
        .or_else(|| entry.get("path"))
        .and_then(non_empty_str)?;
    let filename = file
        .and_then(|f| f.get("filename").or_else(|| f.get("originalName")))
        .and_then(non_empty_str);
    Some(ListingImage {
        uri: resolver.primary_uri(&path),
        filename,
        full_path: Some(path),
    })
}

fn loose_image(entry: &Value, resolver: &ImageResolver) -> Option<ListingImage> {
    let resolve = |path: &str| {
        if resolver.is_placeholder(path) {
            path.to_string()
        } else {
            resolver.primary_uri(path)
        }
    };
    match entry {
        Value::String(path) if !path.trim().is_empty() => Some(ListingImage::from_uri(resolve(path))),
        Value::Object(fields) => {
            let path = ["uri", "url", "path"]
                .iter()
                .find_map(|key| fields.get(*key).and_then(non_empty_str))?;
            Some(ListingImage {
                uri: resolve(&path),
                filename: fields.get("filename").and_then(non_empty_str),
                full_path: fields.get("fullPath").and_then(non_empty_str),
            })
        }
        _ => None,
    }
}
