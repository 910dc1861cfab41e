// Static substitute catalog for when the listing API is down or empty.
// This is a demo aid: no retry, no backoff, just a fixed payload.

use once_cell::sync::Lazy;
use serde_json::{json, Value};

use crate::filter::{matches, name_matches};
use crate::images::ImageResolver;
use crate::models::{FilterSelection, Listing, ListingId};
use crate::normalizer::normalize_batch;

static MOCK_CARS: Lazy<Vec<Value>> = Lazy::new(|| {
    vec![
        mock_car(900001, 3, "BYD", "Song Plus", "Flagship", 2024, Some(139900), "SUV", "Electric"),
        mock_car(900002, 3, "BYD", "Seal", "Performance", 2024, Some(169900), "Sedan", "Electric"),
        mock_car(900003, 3, "BYD", "Atto 3", "Extended Range", 2023, Some(114900), "SUV", "Electric"),
        mock_car(900004, 7, "Toyota", "Land Cruiser", "GXR", 2024, Some(315000), "SUV", "Petrol"),
        mock_car(900005, 9, "Nissan", "Patrol", "LE Platinum", 2023, None, "SUV", "Petrol"),
        mock_car(900006, 12, "Kia", "EV9", "GT-Line", 2024, Some(289000), "SUV", "Electric"),
        mock_car(900007, 14, "Hyundai", "Tucson", "Hybrid", 2024, Some(124500), "SUV", "Hybrid"),
        mock_car(900008, 21, "Geely", "Coolray", "Sport", 2023, Some(79900), "Crossover", "Petrol"),
    ]
});

#[allow(clippy::too_many_arguments)]
fn mock_car(
    id: i64,
    brand_id: i64,
    brand: &str,
    model: &str,
    trim: &str,
    year: i32,
    price: Option<i64>,
    body_type: &str,
    fuel_type: &str,
) -> Value {
    json!({
        "id": id,
        "stockId": format!("MOCK-{}", id),
        "Brand": { "id": brand_id, "name": brand },
        "CarModel": { "name": model },
        "Trim": { "name": trim },
        "Year": { "year": year },
        "price": price,
        "CarImages": [],
        "SpecificationValues": [
            { "name": body_type, "Specification": { "key": "body_type" } },
            { "name": fuel_type, "Specification": { "key": "fuel_type" } }
        ]
    })
}

/// The full substitute catalog, normalized like live data.
pub fn mock_catalog(images: &ImageResolver) -> Vec<Listing> {
    normalize_batch(&MOCK_CARS, images)
}

/// When a guaranteed brand is selected (by name, or by one of its mock brand
/// ids) but nothing real matched it, append that brand's mock listings under
/// fresh ids. Only mocks that satisfy the whole selection are added.
pub fn inject_guaranteed_brands(
    mut results: Vec<Listing>,
    selection: &FilterSelection,
    guaranteed: &[String],
    images: &ImageResolver,
) -> Vec<Listing> {
    if selection.brands.is_empty() && selection.brand_ids.is_empty() {
        return results;
    }
    let catalog = mock_catalog(images);

    for brand in guaranteed.iter().map(|b| b.trim()) {
        let mocks: Vec<&Listing> = catalog.iter().filter(|l| l.brand.eq_ignore_ascii_case(brand)).collect();
        let by_name = selection.brands.iter().any(|w| w.trim().eq_ignore_ascii_case(brand));
        let by_id = mocks
            .iter()
            .any(|l| l.brand_id.is_some_and(|id| selection.brand_ids.contains(&id)));
        if !(by_name || by_id) || results.iter().any(|l| name_matches(brand, &l.brand)) {
            continue;
        }

        let synthetic: Vec<Listing> = mocks
            .into_iter()
            .filter(|l| matches(l, selection))
            .map(|l| Listing {
                id: ListingId::generated(),
                ..l.clone()
            })
            .collect();
        if synthetic.is_empty() {
            tracing::debug!(brand, "No mock listing of guaranteed brand satisfies the selection");
            continue;
        }
        tracing::warn!(brand, injected = synthetic.len(), "No live listings for guaranteed brand, injecting mock listings");
        results.extend(synthetic);
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn resolver() -> ImageResolver {
        ImageResolver::new(vec!["https://cdn.test".into()], "placeholder.png")
    }

    #[test]
    fn mock_catalog_covers_several_brands_with_placeholder_images() {
        let catalog = mock_catalog(&resolver());
        assert_eq!(catalog.len(), 8);
        let brands: HashSet<&str> = catalog.iter().map(|l| l.brand.as_str()).collect();
        assert!(brands.len() >= 5);
        assert!(catalog.iter().all(|l| l.images[0].uri == "placeholder.png"));
        assert!(catalog.iter().any(|l| l.fuel_type() == Some("Hybrid")));
    }

    #[test]
    fn injects_byd_with_fresh_ids_when_no_real_match() {
        let r = resolver();
        let selection = FilterSelection::default().with_brand("BYD");
        let results = inject_guaranteed_brands(Vec::new(), &selection, &["BYD".into()], &r);
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|l| l.brand == "BYD"));
        assert!(results.iter().all(|l| matches!(&l.id, ListingId::Text(s) if s.starts_with("generated-"))));
        let ids: HashSet<_> = results.iter().map(|l| l.id.clone()).collect();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn leaves_results_alone_when_real_match_exists() {
        let r = resolver();
        let real = mock_catalog(&r).into_iter().take(1).collect::<Vec<_>>();
        let selection = FilterSelection::default().with_brand("byd");
        let results = inject_guaranteed_brands(real.clone(), &selection, &["BYD".into()], &r);
        assert_eq!(results, real);
    }

    #[test]
    fn non_guaranteed_brands_are_never_injected() {
        let selection = FilterSelection::default().with_brand("Kia");
        let results = inject_guaranteed_brands(Vec::new(), &selection, &["BYD".into()], &resolver());
        assert!(results.is_empty());
    }

    #[test]
    fn injected_listings_respect_the_rest_of_the_selection() {
        let r = resolver();
        let selection = FilterSelection::default()
            .with_brand("BYD")
            .with_specification("body_type", "Sedan");
        let results = inject_guaranteed_brands(Vec::new(), &selection, &["BYD".into()], &r);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].model, "Seal");
        assert!(results.iter().all(|l| matches(l, &selection)));

        let out_of_budget = FilterSelection::default()
            .with_brand("BYD")
            .with_price_range(Some(500000.0), None);
        assert!(inject_guaranteed_brands(Vec::new(), &out_of_budget, &["BYD".into()], &r).is_empty());
    }

    #[test]
    fn brand_id_of_a_guaranteed_brand_also_triggers_injection() {
        let selection = FilterSelection::default().with_brand_id(3);
        let results = inject_guaranteed_brands(Vec::new(), &selection, &["BYD".into()], &resolver());
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|l| l.brand == "BYD"));
    }
}
