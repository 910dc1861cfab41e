//! Listing pipeline: fetch, unwrap, normalize, filter, and fall back to the
//! mock catalog when the API is down or empty.

use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::cache::TtlCache;
use crate::config::{CacheSettings, FallbackSettings};
use crate::dealer_api::{CarQuery, DealerApi, Section};
use crate::error::ApiError;
use crate::fallback::{inject_guaranteed_brands, mock_catalog};
use crate::filter;
use crate::images::ImageResolver;
use crate::models::{
    Brand, CarModel, CatalogPage, FilterSelection, Listing, ListingSource, SpecificationOption, Trim,
};
use crate::normalizer::{dedup_by_id, normalize_batch, normalize_listing};
use crate::response::{unwrap_listings, unwrap_object, unwrap_records, ListingBatch};
use crate::sequencing::RequestSequencer;

const POPULAR_BRAND_COUNT: usize = 12;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HomeFeed {
    pub hot_deals: Vec<Listing>,
    pub just_arrived: Vec<Listing>,
    pub most_popular: Vec<Listing>,
    pub popular_brands: Vec<Brand>,
}

pub struct Catalog {
    api: Arc<DealerApi>,
    images: ImageResolver,
    page_size: u32,
    fallback: FallbackSettings,
    brands: TtlCache<(), Vec<Brand>>,
    popular: TtlCache<Section, Vec<Listing>>,
    new_arrivals: TtlCache<Section, Vec<Listing>>,
    // One sequencer per caller, so one client's search never supersedes another's
    searches: Mutex<HashMap<String, Arc<RequestSequencer>>>,
}

impl Catalog {
    pub fn new(
        api: Arc<DealerApi>,
        images: ImageResolver,
        page_size: u32,
        cache: &CacheSettings,
        fallback: FallbackSettings,
    ) -> Self {
        Self {
            api,
            images,
            page_size: page_size.max(1),
            fallback,
            brands: TtlCache::new("brands", Duration::from_secs(cache.brands_ttl_secs)),
            popular: TtlCache::new("popular", Duration::from_secs(cache.popular_ttl_secs)),
            new_arrivals: TtlCache::new("new_arrivals", Duration::from_secs(cache.new_arrivals_ttl_secs)),
            searches: Mutex::new(HashMap::new()),
        }
    }

    pub fn images(&self) -> &ImageResolver {
        &self.images
    }

    async fn fetch_batch(&self, query: &CarQuery, selection: &FilterSelection) -> ListingBatch {
        match self.api.search_cars(query, selection).await {
            Ok(response) => unwrap_listings(&response),
            Err(e) => {
                tracing::warn!(error = %e, status = ?e.status_code(), "Car list request failed, treating as no data");
                ListingBatch::default()
            }
        }
    }

    /// Filtered page of listings. Never fails: API trouble yields the mock catalog.
    pub async fn search(&self, selection: &FilterSelection, page: u32) -> CatalogPage {
        let query = CarQuery {
            page: page.max(1),
            limit: self.page_size,
            ..CarQuery::default()
        };
        let batch = self.fetch_batch(&query, selection).await;

        let (listings, total, source) = if batch.is_empty() {
            if !self.fallback.use_mock_catalog {
                (Vec::new(), 0, ListingSource::Live)
            } else {
                tracing::warn!(page, "No live listings, serving mock catalog");
                let mocks = filter::apply(mock_catalog(&self.images), selection);
                let total = mocks.len();
                (mocks, total, ListingSource::Fallback)
            }
        } else {
            let normalized = dedup_by_id(normalize_batch(&batch.cars, &self.images));
            let received = normalized.len();
            let kept = filter::apply(normalized, selection);
            // The server total only holds if client-side matching removed nothing
            let total = if kept.len() == received { batch.total } else { kept.len() };
            (kept, total, ListingSource::Live)
        };

        let before = listings.len();
        let listings = inject_guaranteed_brands(listings, selection, &self.fallback.guaranteed_brands, &self.images);
        let total = total + (listings.len() - before);

        tracing::info!(page, count = listings.len(), total, ?source, "Catalog search complete");
        CatalogPage {
            listings,
            total,
            page: page.max(1),
            source,
        }
    }

    /// Like [`Catalog::search`], but returns `None` if the same caller started
    /// a newer search meanwhile. Searches from different callers never interfere.
    pub async fn search_latest(&self, caller: &str, selection: &FilterSelection, page: u32) -> Option<CatalogPage> {
        let sequencer = self.sequencer_for(caller);
        let ticket = sequencer.issue();
        let result = self.search(selection, page).await;
        sequencer.accept(ticket, result)
    }

    fn sequencer_for(&self, caller: &str) -> Arc<RequestSequencer> {
        let mut searches = self.searches.lock().unwrap_or_else(|e| e.into_inner());
        searches.entry(caller.to_string()).or_default().clone()
    }

    pub async fn section(&self, section: Section) -> Vec<Listing> {
        let cache = match section {
            Section::JustArrived => &self.new_arrivals,
            Section::HotDeals | Section::MostPopular => &self.popular,
        };
        let fetched = cache
            .get_or_try_insert_with(section, || async {
                let query = CarQuery {
                    page: 1,
                    limit: self.page_size,
                    section: Some(section),
                    search: None,
                };
                let batch = self.fetch_batch(&query, &FilterSelection::default()).await;
                if batch.is_empty() {
                    return Err(());
                }
                Ok(dedup_by_id(normalize_batch(&batch.cars, &self.images)))
            })
            .await;

        match fetched {
            Ok(listings) => listings,
            Err(()) if self.fallback.use_mock_catalog => {
                tracing::warn!(section = section.as_str(), "Section empty, serving mock catalog");
                mock_catalog(&self.images)
            }
            Err(()) => Vec::new(),
        }
    }

    pub async fn hot_deals(&self) -> Vec<Listing> {
        self.section(Section::HotDeals).await
    }

    pub async fn just_arrived(&self) -> Vec<Listing> {
        self.section(Section::JustArrived).await
    }

    pub async fn most_popular(&self) -> Vec<Listing> {
        self.section(Section::MostPopular).await
    }

    pub async fn brands(&self) -> Vec<Brand> {
        let fetched = self
            .brands
            .get_or_try_insert_with((), || async {
                let response = self.api.fetch_brands().await?;
                let brands: Vec<Brand> = parse_records(&response, "brand");
                if brands.is_empty() {
                    return Err(ApiError::Decode("brand list was empty".into()));
                }
                Ok::<_, ApiError>(brands)
            })
            .await;

        match fetched {
            Ok(brands) => brands,
            Err(e) => {
                tracing::warn!(error = %e, "Brand list unavailable, deriving brands from mock catalog");
                self.mock_brands()
            }
        }
    }

    /// Brands with a logo first, capped for the home carousel.
    pub async fn popular_brands(&self) -> Vec<Brand> {
        let mut brands = self.brands().await;
        brands.sort_by_key(|b| b.logo.is_none());
        brands.truncate(POPULAR_BRAND_COUNT);
        brands
    }

    pub async fn models(&self, brand_id: i64) -> Vec<CarModel> {
        match self.api.fetch_models(brand_id).await {
            Ok(response) => parse_records(&response, "model"),
            Err(e) => {
                tracing::warn!(brand_id, error = %e, "Model list request failed");
                Vec::new()
            }
        }
    }

    pub async fn trims(&self, model_id: i64) -> Vec<Trim> {
        match self.api.fetch_trims(model_id).await {
            Ok(response) => parse_records(&response, "trim"),
            Err(e) => {
                tracing::warn!(model_id, error = %e, "Trim list request failed");
                Vec::new()
            }
        }
    }

    pub async fn specification_options(&self, key: &str) -> Vec<SpecificationOption> {
        match self.api.fetch_specification_values(key).await {
            Ok(response) => parse_records(&response, "specification value"),
            Err(e) => {
                tracing::warn!(key, error = %e, "Specification value request failed");
                Vec::new()
            }
        }
    }

    /// One listing by slug or id. Falls back to the mock catalog when configured.
    pub async fn listing(&self, slug_or_id: &str) -> Option<Listing> {
        match self.api.fetch_car(slug_or_id).await {
            Ok(response) => {
                if let Some(mut listing) = unwrap_object(&response).and_then(|car| normalize_listing(car, &self.images)) {
                    self.verify_cover_image(&mut listing).await;
                    return Some(listing);
                }
            }
            Err(e) => tracing::warn!(slug_or_id, error = %e, "Car detail request failed"),
        }
        if !self.fallback.use_mock_catalog {
            return None;
        }
        mock_catalog(&self.images)
            .into_iter()
            .find(|l| l.slug == slug_or_id || l.id.to_string() == slug_or_id)
    }

    /// All home sections, fetched concurrently.
    pub async fn home_feed(&self) -> HomeFeed {
        let (hot_deals, just_arrived, most_popular, popular_brands) = futures::join!(
            self.hot_deals(),
            self.just_arrived(),
            self.most_popular(),
            self.popular_brands(),
        );
        HomeFeed {
            hot_deals,
            just_arrived,
            most_popular,
            popular_brands,
        }
    }

    // Detail pages check every origin for the cover image
    async fn verify_cover_image(&self, listing: &mut Listing) {
        if !self.images.has_fallback_origins() {
            return;
        }
        let Some(cover) = listing.images.first_mut() else { return };
        let Some(path) = cover.full_path.clone() else { return };
        cover.uri = self.images.resolve_first_reachable(self.api.http_client(), &path).await;
    }

    fn mock_brands(&self) -> Vec<Brand> {
        let mut brands: Vec<Brand> = Vec::new();
        for listing in mock_catalog(&self.images) {
            let Some(id) = listing.brand_id else { continue };
            if brands.iter().all(|b| b.id != id) {
                brands.push(Brand {
                    id,
                    name: listing.brand,
                    slug: None,
                    logo: None,
                });
            }
        }
        brands
    }
}

fn parse_records<T: serde::de::DeserializeOwned>(response: &Value, what: &str) -> Vec<T> {
    unwrap_records(response)
        .into_iter()
        .filter_map(|record| match serde_json::from_value(record) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                tracing::debug!(what, error = %e, "Skipping malformed record");
                None
            }
        })
        .collect()
}
