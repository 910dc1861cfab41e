// Thin client for the dealership REST API (catalog, auth, wishlist, enquiries, content)

use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde_json::{json, Value};
use std::sync::RwLock;
use std::time::Duration;

use crate::config::ApiSettings;
use crate::error::ApiError;
use crate::models::{FilterSelection, ListingId};

const API_KEY_HEADER: &str = "x-api-key";

/// Home-page sections, each a differently sorted slice of the car list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    HotDeals,
    JustArrived,
    MostPopular,
}

impl Section {
    pub fn as_str(&self) -> &'static str {
        match self {
            Section::HotDeals => "hot-deals",
            Section::JustArrived => "just-arrived",
            Section::MostPopular => "most-popular",
        }
    }

    fn sort(&self) -> &'static str {
        match self {
            Section::HotDeals => "discount_desc",
            Section::JustArrived => "created_desc",
            Section::MostPopular => "views_desc",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CarQuery {
    pub page: u32,
    pub limit: u32,
    pub section: Option<Section>,
    pub search: Option<String>,
}

pub struct DealerApi {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    bearer: RwLock<Option<String>>,
}

impl DealerApi {
    pub fn new(settings: &ApiSettings) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(concat!("showroom_rust/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(client, settings))
    }

    pub fn with_client(client: Client, settings: &ApiSettings) -> Self {
        Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            bearer: RwLock::new(None),
        }
    }

    pub fn http_client(&self) -> &Client {
        &self.client
    }

    pub fn set_bearer_token(&self, token: Option<String>) {
        let mut write_guard = self.bearer.write().unwrap_or_else(|e| e.into_inner());
        *write_guard = token;
    }

    pub fn has_bearer_token(&self) -> bool {
        self.bearer.read().unwrap_or_else(|e| e.into_inner()).is_some()
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let mut request = request;
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }
        let bearer = self.bearer.read().unwrap_or_else(|e| e.into_inner()).clone();
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        request
    }

    async fn send(&self, request: RequestBuilder) -> Result<Value, ApiError> {
        let response = self.authorize(request).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::debug!(status = %status, body = %body, "API error response");
            return Err(match status {
                StatusCode::UNAUTHORIZED => ApiError::Unauthorized(error_message(&body)),
                StatusCode::CONFLICT => ApiError::Conflict(error_message(&body)),
                other => ApiError::Status {
                    status: other.as_u16(),
                    body,
                },
            });
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))
    }

    /// `path` plus one caller-supplied segment, percent-encoded. Segments that
    /// could climb or split the path are rejected before any request is made.
    fn url_with_segment(&self, path: &str, segment: &str) -> Result<Url, ApiError> {
        let segment = segment.trim();
        if segment.is_empty() || segment == "." || segment == ".." || segment.contains(['/', '\\']) {
            return Err(ApiError::InvalidPath(segment.to_string()));
        }
        let mut url = Url::parse(&self.url(path)).map_err(|e| ApiError::InvalidPath(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidPath(self.base_url.clone()))?
            .push(segment);
        Ok(url)
    }

    async fn get_segment(&self, path: &str, segment: &str) -> Result<Value, ApiError> {
        let url = self.url_with_segment(path, segment)?;
        tracing::debug!(%url, "GET");
        self.send(self.client.get(url)).await
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Value, ApiError> {
        tracing::debug!(path, ?query, "GET");
        self.send(self.client.get(self.url(path)).query(query)).await
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value, ApiError> {
        tracing::debug!(path, "POST");
        self.send(self.client.post(self.url(path)).json(body)).await
    }

    // --- Catalog ---

    pub async fn fetch_brands(&self) -> Result<Value, ApiError> {
        self.get("brand/list", &[]).await
    }

    pub async fn fetch_models(&self, brand_id: i64) -> Result<Value, ApiError> {
        self.get("carmodel/list", &[("brandId", brand_id.to_string())]).await
    }

    pub async fn fetch_trims(&self, model_id: i64) -> Result<Value, ApiError> {
        self.get("trim/list", &[("modelId", model_id.to_string())]).await
    }

    pub async fn fetch_specification_values(&self, key: &str) -> Result<Value, ApiError> {
        self.get_segment("specification-value/by-specification", key).await
    }

    /// Car list. Server-side filter params are sent as hints only; results are
    /// still matched client-side since the backend applies them inconsistently.
    pub async fn search_cars(&self, query: &CarQuery, selection: &FilterSelection) -> Result<Value, ApiError> {
        let mut params = vec![
            ("page", query.page.max(1).to_string()),
            ("limit", query.limit.to_string()),
        ];
        if let Some(section) = query.section {
            params.push(("sort", section.sort().to_string()));
        }
        if let Some(search) = query.search.as_ref().filter(|s| !s.trim().is_empty()) {
            params.push(("search", search.trim().to_string()));
        }
        push_ids(&mut params, "brandIds", &selection.brand_ids);
        push_ids(&mut params, "modelIds", &selection.model_ids);
        push_ids(&mut params, "trimIds", &selection.trim_ids);
        push_ids(&mut params, "yearIds", &selection.year_ids);
        if let Some(min) = selection.min_price_aed {
            params.push(("minPrice", min.to_string()));
        }
        if let Some(max) = selection.max_price_aed {
            params.push(("maxPrice", max.to_string()));
        }
        self.get("car/list", &params).await
    }

    pub async fn fetch_car(&self, slug_or_id: &str) -> Result<Value, ApiError> {
        self.get_segment("car", slug_or_id).await
    }

    // --- Auth ---

    pub async fn login(&self, email: &str, password: &str) -> Result<Value, ApiError> {
        self.post("auth/login", &json!({ "email": email, "password": password })).await
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<Value, ApiError> {
        self.post("auth/refresh", &json!({ "refreshToken": refresh_token })).await
    }

    pub async fn logout(&self) -> Result<Value, ApiError> {
        self.post("auth/logout", &json!({})).await
    }

    pub async fn profile(&self) -> Result<Value, ApiError> {
        self.get("auth/profile", &[]).await
    }

    // --- Wishlist ---

    pub async fn fetch_wishlist(&self) -> Result<Value, ApiError> {
        self.get("wishlist", &[]).await
    }

    pub async fn add_to_wishlist(&self, car_id: &ListingId) -> Result<Value, ApiError> {
        self.post("wishlist", &json!({ "carId": car_id })).await
    }

    pub async fn remove_from_wishlist(&self, car_id: &ListingId) -> Result<Value, ApiError> {
        tracing::debug!(%car_id, "DELETE wishlist entry");
        let url = self.url_with_segment("wishlist", &car_id.to_string())?;
        self.send(self.client.delete(url))
            .await
    }

    // --- Enquiries & content ---

    pub async fn submit_enquiry(&self, payload: &Value) -> Result<Value, ApiError> {
        self.post("enquiry", payload).await
    }

    pub async fn fetch_blogs(&self, page: u32, limit: u32) -> Result<Value, ApiError> {
        self.get("blog/list", &[("page", page.max(1).to_string()), ("limit", limit.to_string())])
            .await
    }

    pub async fn fetch_static_page(&self, slug: &str) -> Result<Value, ApiError> {
        self.get_segment("page", slug).await
    }
}

fn push_ids(params: &mut Vec<(&'static str, String)>, key: &'static str, ids: &[i64]) {
    if !ids.is_empty() {
        let joined = ids.iter().map(i64::to_string).collect::<Vec<_>>().join(",");
        params.push((key, joined));
    }
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("error"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}
