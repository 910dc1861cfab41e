// Handlers for catalog, home, content and enquiry endpoints

use axum::{
    extract::{Json as JsonExtract, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use serde_json::json;

use crate::{
    content,
    dealer_api::Section,
    enquiry::{self, EnquiryForm},
    error::{AppError, AppResult},
    models::FilterSelection,
    AppState,
};

const DEFAULT_BLOG_PAGE_SIZE: u32 = 10;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    #[serde(default)]
    page: Option<u32>,
    /// Identifies the searching client; only its own newer searches supersede it.
    #[serde(default)]
    client_id: Option<String>,
    #[serde(flatten)]
    selection: FilterSelection,
}

#[derive(Debug, Deserialize)]
pub struct BlogQuery {
    page: Option<u32>,
    limit: Option<u32>,
}

pub async fn get_brands(State(state): State<AppState>) -> impl IntoResponse {
    let brands = state.catalog.brands().await;
    Json(json!({ "success": true, "brands": brands }))
}

pub async fn get_models(State(state): State<AppState>, Path(brand_id): Path<i64>) -> impl IntoResponse {
    let models = state.catalog.models(brand_id).await;
    Json(json!({ "success": true, "models": models }))
}

pub async fn get_trims(State(state): State<AppState>, Path(model_id): Path<i64>) -> impl IntoResponse {
    let trims = state.catalog.trims(model_id).await;
    Json(json!({ "success": true, "trims": trims }))
}

pub async fn get_specification_options(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> impl IntoResponse {
    let options = state.catalog.specification_options(&key).await;
    Json(json!({ "success": true, "key": key, "options": options }))
}

/// 204 when a newer search from the same `clientId` overtook this one; the client
/// keeps the newer result. Without a `clientId` every search is answered.
pub async fn search_cars(
    State(state): State<AppState>,
    JsonExtract(request): JsonExtract<SearchRequest>,
) -> Response {
    let page = request.page.unwrap_or(1);
    tracing::info!(page, filtered = !request.selection.is_empty(), "[HANDLER] /api/cars/search");

    let result = match request.client_id.as_deref() {
        Some(caller) => state.catalog.search_latest(caller, &request.selection, page).await,
        None => Some(state.catalog.search(&request.selection, page).await),
    };
    match result {
        Some(result) => Json(json!({ "success": true, "result": result })).into_response(),
        None => {
            tracing::debug!(page, "Search superseded by a newer request");
            StatusCode::NO_CONTENT.into_response()
        }
    }
}

pub async fn get_car(State(state): State<AppState>, Path(slug): Path<String>) -> AppResult<impl IntoResponse> {
    let car = state
        .catalog
        .listing(&slug)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Car '{}'", slug)))?;
    Ok(Json(json!({ "success": true, "car": car })))
}

pub async fn get_home(State(state): State<AppState>) -> impl IntoResponse {
    let feed = state.catalog.home_feed().await;
    Json(json!({ "success": true, "home": feed }))
}

async fn section_response(state: &AppState, section: Section) -> Json<serde_json::Value> {
    let cars = state.catalog.section(section).await;
    Json(json!({ "success": true, "section": section.as_str(), "cars": cars }))
}

pub async fn get_hot_deals(State(state): State<AppState>) -> impl IntoResponse {
    section_response(&state, Section::HotDeals).await
}

pub async fn get_just_arrived(State(state): State<AppState>) -> impl IntoResponse {
    section_response(&state, Section::JustArrived).await
}

pub async fn get_most_popular(State(state): State<AppState>) -> impl IntoResponse {
    section_response(&state, Section::MostPopular).await
}

pub async fn get_popular_brands(State(state): State<AppState>) -> impl IntoResponse {
    let brands = state.catalog.popular_brands().await;
    Json(json!({ "success": true, "brands": brands }))
}

pub async fn get_blogs(State(state): State<AppState>, Query(query): Query<BlogQuery>) -> AppResult<impl IntoResponse> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(DEFAULT_BLOG_PAGE_SIZE).max(1);
    let posts = content::blogs(&state.api, page, limit).await?;
    Ok(Json(json!({ "success": true, "page": page, "posts": posts })))
}

pub async fn get_static_page(State(state): State<AppState>, Path(slug): Path<String>) -> AppResult<impl IntoResponse> {
    let page = content::static_page(&state.api, &slug)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Page '{}'", slug)))?;
    Ok(Json(json!({ "success": true, "page": page })))
}

pub async fn submit_enquiry(
    State(state): State<AppState>,
    JsonExtract(form): JsonExtract<EnquiryForm>,
) -> AppResult<impl IntoResponse> {
    let outcome = enquiry::submit_enquiry(&state.api, &form).await?;
    Ok(Json(json!({ "success": true, "outcome": outcome })))
}
