//! Client-side matching of normalized listings against a [`FilterSelection`].
//!
//! Dimensions combine with AND, values inside one dimension with OR. Each
//! dimension tries relation ids first and falls back to a case-insensitive
//! name comparison that also accepts a substring in either direction.

use crate::models::{FilterSelection, Listing, SPEC_COLOR, SPEC_STEERING_SIDE};

pub fn apply(listings: Vec<Listing>, selection: &FilterSelection) -> Vec<Listing> {
    if selection.is_empty() {
        return listings;
    }
    let before = listings.len();
    let kept: Vec<Listing> = listings
        .into_iter()
        .filter(|listing| matches(listing, selection))
        .collect();
    tracing::debug!(before, after = kept.len(), "Applied filter selection");
    kept
}

pub fn matches(listing: &Listing, selection: &FilterSelection) -> bool {
    let year_name = listing.year.map(|y| y.to_string()).unwrap_or_default();

    relation_matches(listing.brand_id, &listing.brand, &selection.brand_ids, &selection.brands)
        && relation_matches(listing.model_id, &listing.model, &selection.model_ids, &selection.models)
        && relation_matches(listing.trim_id, &listing.trim, &selection.trim_ids, &selection.trims)
        && relation_matches(listing.year_id, &year_name, &selection.year_ids, &selection.years)
        && selection
            .specifications
            .iter()
            .all(|(key, wanted)| specification_matches(listing, key, wanted))
        && price_matches(listing.price, selection.min_price_aed, selection.max_price_aed)
}

/// Case-insensitive exact match, or either side containing the other.
pub fn name_matches(selected: &str, value: &str) -> bool {
    let selected = selected.trim().to_lowercase();
    let value = value.trim().to_lowercase();
    if selected.is_empty() || value.is_empty() {
        return false;
    }
    selected == value || selected.contains(&value) || value.contains(&selected)
}

fn relation_matches(id: Option<i64>, name: &str, wanted_ids: &[i64], wanted_names: &[String]) -> bool {
    if wanted_ids.is_empty() && wanted_names.is_empty() {
        return true;
    }
    if let Some(id) = id {
        if wanted_ids.contains(&id) {
            return true;
        }
    }
    wanted_names.iter().any(|wanted| name_matches(wanted, name))
}

fn specification_matches(listing: &Listing, key: &str, wanted: &[String]) -> bool {
    if wanted.is_empty() {
        return true;
    }

    let from_values: Vec<&str> = listing
        .specification_values
        .iter()
        .filter(|v| v.key == key || (key == SPEC_STEERING_SIDE && v.key == "steering"))
        .map(|v| v.name.as_str())
        .collect();

    let candidates: Vec<&str> = if !from_values.is_empty() {
        from_values
    } else {
        direct_property(listing, key).into_iter().collect()
    };

    wanted
        .iter()
        .any(|w| candidates.iter().any(|value| name_matches(w, value)))
}

fn direct_property<'a>(listing: &'a Listing, key: &str) -> Option<&'a str> {
    if key == SPEC_COLOR && !listing.color.is_empty() {
        return Some(listing.color.as_str());
    }
    listing.specification(key)
}

// Unpriced listings never satisfy a price bound
fn price_matches(price: Option<f64>, min: Option<f64>, max: Option<f64>) -> bool {
    if min.is_none() && max.is_none() {
        return true;
    }
    let Some(price) = price else {
        return false;
    };
    min.is_none_or(|min| price >= min) && max.is_none_or(|max| price <= max)
}
