use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use showroom_rust::config::Settings;
use showroom_rust::content;
use showroom_rust::dealer_api::DealerApi;
use showroom_rust::enquiry::{submit_enquiry, EnquiryError, EnquiryForm, EnquiryOutcome};
use showroom_rust::models::ListingId;

fn api_for(server: &MockServer) -> DealerApi {
    DealerApi::new(&Settings::for_base_url(&server.uri()).api).unwrap()
}

fn form() -> EnquiryForm {
    EnquiryForm {
        name: "Amal Haddad".into(),
        email: "amal@example.ae".into(),
        phone: "+971 50 123 4567".into(),
        message: "Is the Seal still available?".into(),
        car_id: Some(ListingId::Number(12)),
    }
}

#[tokio::test]
async fn accepted_enquiry_is_submitted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/enquiry"))
        .and(body_partial_json(json!({"carId": 12, "email": "amal@example.ae"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = submit_enquiry(&api_for(&server), &form()).await.unwrap();
    assert_eq!(outcome, EnquiryOutcome::Submitted);
}

#[tokio::test]
async fn conflict_means_already_inquired() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/enquiry"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({"message": "Enquiry already exists"})))
        .mount(&server)
        .await;

    let outcome = submit_enquiry(&api_for(&server), &form()).await.unwrap();
    assert_eq!(outcome, EnquiryOutcome::AlreadyInquired);
}

#[tokio::test]
async fn invalid_form_never_reaches_the_server() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/enquiry"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let bad = EnquiryForm {
        email: "a@b..com".into(),
        ..form()
    };
    let err = submit_enquiry(&api_for(&server), &bad).await.unwrap_err();
    match err {
        EnquiryError::Invalid(errors) => assert_eq!(errors.get("email"), Some("Enter a valid email address")),
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[tokio::test]
async fn other_server_errors_are_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/enquiry"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = submit_enquiry(&api_for(&server), &form()).await.unwrap_err();
    assert!(matches!(err, EnquiryError::Api(ref e) if e.status_code() == Some(500)));
}

#[tokio::test]
async fn blogs_and_pages_are_fetched() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/blog/list"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"rows": [
            {"id": 1, "title": "Charging at home", "slug": "charging-at-home"}
        ]}})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/page/privacy-policy"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"title": "Privacy", "content": "<p>…</p>"}})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/page/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let api = api_for(&server);
    let posts = content::blogs(&api, 2, 10).await.unwrap();
    assert_eq!(posts[0].slug.as_deref(), Some("charging-at-home"));

    let page = content::static_page(&api, "privacy-policy").await.unwrap().unwrap();
    assert_eq!(page.slug, "privacy-policy");
    assert!(content::static_page(&api, "missing").await.unwrap().is_none());
}
