use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use showroom_rust::catalog::Catalog;
use showroom_rust::config::Settings;
use showroom_rust::dealer_api::{DealerApi, Section};
use showroom_rust::images::ImageResolver;
use showroom_rust::models::{FilterSelection, ListingId, ListingSource};

fn catalog_for(server: &MockServer) -> Catalog {
    let settings = Settings::for_base_url(&server.uri());
    let api = Arc::new(DealerApi::new(&settings.api).unwrap());
    Catalog::new(
        api,
        ImageResolver::from_settings(&settings.images),
        settings.api.page_size,
        &settings.cache,
        settings.fallback.clone(),
    )
}

#[tokio::test]
async fn live_listing_is_normalized_with_defaults() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/car/list"))
        .and(header("x-api-key", "test-api-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": 1, "Brand": {"name": "BYD"}, "CarModel": {"name": "Song"}, "Year": {"year": 2024}}],
            "success": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let page = catalog_for(&server).search(&FilterSelection::default(), 1).await;

    assert_eq!(page.source, ListingSource::Live);
    assert_eq!(page.total, 1);
    let car = &page.listings[0];
    assert_eq!(car.id, ListingId::Number(1));
    assert_eq!(car.brand, "BYD");
    assert_eq!(car.model, "Song");
    assert_eq!(car.year, Some(2024));
    assert_eq!(car.fuel_type(), Some("Electric"));
    assert_eq!(car.images[0].uri, "/static/car-placeholder.png");
}

#[tokio::test]
async fn empty_nested_payload_falls_back_to_mock_catalog() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/car/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"data": []}, "success": true})))
        .mount(&server)
        .await;

    let page = catalog_for(&server).search(&FilterSelection::default(), 1).await;

    assert_eq!(page.source, ListingSource::Fallback);
    assert_eq!(page.listings.len(), 8);
    assert_eq!(page.total, 8);
}

#[tokio::test]
async fn server_error_is_treated_as_no_data() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/car/list"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let selection = FilterSelection::default().with_specification("fuel_type", "hybrid");
    let page = catalog_for(&server).search(&selection, 1).await;

    assert_eq!(page.source, ListingSource::Fallback);
    assert_eq!(page.listings.len(), 1);
    assert_eq!(page.listings[0].brand, "Hyundai");
}

#[tokio::test]
async fn selected_byd_is_injected_when_live_results_have_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/car/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": [{"id": 44, "Brand": {"id": 7, "name": "Toyota"}, "CarModel": {"name": "Camry"}, "Year": {"year": 2023}}]
        })))
        .mount(&server)
        .await;

    let selection = FilterSelection::default().with_brand("BYD");
    let page = catalog_for(&server).search(&selection, 1).await;

    assert_eq!(page.source, ListingSource::Live);
    assert_eq!(page.listings.len(), 3);
    assert_eq!(page.total, 3);
    assert!(page.listings.iter().all(|l| l.brand == "BYD"));
    assert!(page
        .listings
        .iter()
        .all(|l| matches!(&l.id, ListingId::Text(id) if id.starts_with("generated-"))));
}

#[tokio::test]
async fn brand_ids_are_forwarded_and_matched_client_side() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/car/list"))
        .and(query_param("brandIds", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "data": [
                    {"id": 1, "Brand": {"id": 3, "name": "byd"}, "CarModel": {"name": "Seal"}},
                    {"id": 2, "Brand": {"id": 7, "name": "Toyota"}, "CarModel": {"name": "Camry"}}
                ],
                "pagination": {"totalItems": 40}
            }
        })))
        .mount(&server)
        .await;

    let page = catalog_for(&server)
        .search(&FilterSelection::default().with_brand_id(3), 1)
        .await;

    assert_eq!(page.listings.len(), 1);
    assert_eq!(page.listings[0].id, ListingId::Number(1));
    // The server total no longer applies once rows were dropped locally
    assert_eq!(page.total, 1);
}

#[tokio::test]
async fn brands_are_cached_between_calls() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/brand/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"id": 3, "name": "BYD"},
                {"id": 7, "name": "Toyota", "logo": "brands/toyota.png"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let catalog = catalog_for(&server);
    assert_eq!(catalog.brands().await.len(), 2);
    assert_eq!(catalog.brands().await.len(), 2);

    let popular = catalog.popular_brands().await;
    assert_eq!(popular[0].name, "Toyota");
}

#[tokio::test]
async fn brands_fall_back_to_mock_brands() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/brand/list"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let brands = catalog_for(&server).brands().await;
    let names: Vec<&str> = brands.iter().map(|b| b.name.as_str()).collect();
    assert_eq!(names, ["BYD", "Toyota", "Nissan", "Kia", "Hyundai", "Geely"]);
}

#[tokio::test]
async fn sections_request_their_sort_order() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/car/list"))
        .and(query_param("sort", "created_desc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": 5, "Brand": {"name": "Kia"}, "CarModel": {"name": "EV6"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let catalog = catalog_for(&server);
    let first = catalog.section(Section::JustArrived).await;
    let second = catalog.section(Section::JustArrived).await;
    assert_eq!(first.len(), 1);
    assert_eq!(first, second);
}

#[tokio::test]
async fn detail_falls_back_to_mock_listing_by_id() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/car/900004"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let car = catalog_for(&server).listing("900004").await.unwrap();
    assert_eq!(car.brand, "Toyota");
}

#[tokio::test]
async fn superseded_search_is_discarded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/car/list"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"data": [{"id": 1, "Brand": {"name": "BYD"}}]}))
                .set_delay(std::time::Duration::from_millis(200)),
        )
        .mount(&server)
        .await;

    let catalog = catalog_for(&server);
    let selection = FilterSelection::default();
    let (slow, fast) = tokio::join!(catalog.search_latest("tab-1", &selection, 1), async {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        catalog.search_latest("tab-1", &selection, 2).await
    });

    assert!(slow.is_none());
    assert_eq!(fast.map(|p| p.page), Some(2));
}

#[tokio::test]
async fn searches_from_different_callers_both_complete() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/car/list"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"data": [{"id": 1, "Brand": {"name": "BYD"}}]}))
                .set_delay(std::time::Duration::from_millis(200)),
        )
        .mount(&server)
        .await;

    let catalog = catalog_for(&server);
    let selection = FilterSelection::default();
    let (first, second) = tokio::join!(catalog.search_latest("alice", &selection, 1), async {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        catalog.search_latest("bob", &selection, 2).await
    });

    assert_eq!(first.map(|p| p.page), Some(1));
    assert_eq!(second.map(|p| p.page), Some(2));
}

#[tokio::test]
async fn guaranteed_brand_is_not_injected_past_other_constraints() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/car/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [
            {"id": 1, "Brand": {"name": "Toyota"}, "CarModel": {"name": "Camry"}, "price": 120000}
        ]})))
        .mount(&server)
        .await;
    let catalog = catalog_for(&server);

    let expensive = FilterSelection::default()
        .with_brand("BYD")
        .with_price_range(Some(500000.0), None);
    let page = catalog.search(&expensive, 1).await;
    assert!(page.listings.is_empty());
    assert_eq!(page.total, 0);

    let sedans = FilterSelection::default()
        .with_brand("BYD")
        .with_specification("body_type", "Sedan");
    let page = catalog.search(&sedans, 1).await;
    assert_eq!(page.listings.len(), 1);
    assert_eq!(page.listings[0].model, "Seal");
    assert_eq!(page.total, 1);
}

#[tokio::test]
async fn detail_lookup_never_escapes_the_car_path() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/profile"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"id": 1}})))
        .expect(0)
        .mount(&server)
        .await;

    assert!(catalog_for(&server).listing("../auth/profile").await.is_none());
}

#[tokio::test]
async fn detail_slug_is_sent_as_one_encoded_segment() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/car/byd%20seal%3F"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {
            "id": 5, "Brand": {"name": "BYD"}, "CarModel": {"name": "Seal"}
        }})))
        .expect(1)
        .mount(&server)
        .await;

    let car = catalog_for(&server).listing("byd seal?").await.unwrap();
    assert_eq!(car.model, "Seal");
}
