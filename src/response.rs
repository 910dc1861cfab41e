//! Locates record arrays inside listing API responses.
//!
//! The listing API nests its arrays inconsistently: `data` may be the array
//! itself, or wrap it as `data.data`, `data.cars`, or under some other key.

use serde_json::Value;

const CAR_MARKER_KEYS: [&str; 4] = ["Brand", "brand", "CarModel", "model"];

/// Raw car records found in one response, plus the reported total.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingBatch {
    pub cars: Vec<Value>,
    pub total: usize,
}

impl ListingBatch {
    pub fn is_empty(&self) -> bool {
        self.cars.is_empty()
    }
}

pub fn unwrap_listings(response: &Value) -> ListingBatch {
    let Some(cars) = find_car_array(response) else {
        tracing::debug!("No car array found in listing response");
        return ListingBatch::default();
    };

    // An empty array is "no data" whatever the pagination block claims
    let total = if cars.is_empty() {
        0
    } else {
        total_items(response).unwrap_or(cars.len())
    };
    ListingBatch {
        cars: cars.clone(),
        total,
    }
}

/// Generic record lookup for brand/model/trim/spec-value lists.
pub fn unwrap_records(response: &Value) -> Vec<Value> {
    if let Some(items) = response.as_array() {
        return items.clone();
    }
    let Some(data) = response.get("data") else {
        return Vec::new();
    };
    if let Some(items) = data.as_array() {
        return items.clone();
    }
    ["data", "rows", "items", "results"]
        .iter()
        .find_map(|key| data.get(*key).and_then(Value::as_array))
        .cloned()
        .unwrap_or_default()
}

/// Single-object payloads: `{data: {...}}` or the bare object.
pub fn unwrap_object(response: &Value) -> Option<&Value> {
    match response.get("data") {
        Some(data) if data.is_object() => Some(data.get("data").filter(|d| d.is_object()).unwrap_or(data)),
        Some(_) => None,
        None if response.is_object() => Some(response),
        None => None,
    }
}

fn find_car_array(response: &Value) -> Option<&Vec<Value>> {
    if let Some(items) = response.as_array() {
        return Some(items);
    }

    let data = response.get("data")?;
    if let Some(items) = data.as_array() {
        return Some(items);
    }
    if let Some(items) = data.get("data").and_then(Value::as_array) {
        return Some(items);
    }
    if let Some(items) = data.get("cars").and_then(Value::as_array) {
        return Some(items);
    }

    let fields = data.as_object()?;
    for value in fields.values() {
        if looks_like_car_array(value) {
            return value.as_array();
        }
        if let Some(nested) = value.as_object() {
            if let Some(found) = nested.values().find(|v| looks_like_car_array(v)) {
                return found.as_array();
            }
        }
    }
    None
}

fn looks_like_car_array(value: &Value) -> bool {
    value
        .as_array()
        .and_then(|items| items.first())
        .and_then(Value::as_object)
        .is_some_and(|first| CAR_MARKER_KEYS.iter().any(|k| first.contains_key(*k)))
}

fn total_items(response: &Value) -> Option<usize> {
    let from = |v: &Value| {
        v.get("pagination")
            .and_then(|p| p.get("totalItems"))
            .and_then(Value::as_u64)
            .map(|n| n as usize)
    };
    from(response).or_else(|| response.get("data").and_then(from))
}
