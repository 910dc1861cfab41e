use anyhow::{Context, Result};
use axum::{extract::FromRef, Router};
use std::sync::Arc;
use tower_http::{services::ServeDir, trace::TraceLayer};

pub mod cache;
pub mod catalog;
pub mod config;
pub mod content;
pub mod dealer_api;
pub mod enquiry;
pub mod error;
pub mod fallback;
pub mod filter;
pub mod images;
pub mod models;
pub mod normalizer;
pub mod response;
pub mod routes;
pub mod sequencing;
pub mod session;
pub mod storage;
pub mod wishlist;

use crate::catalog::Catalog;
use crate::config::Settings;
use crate::dealer_api::DealerApi;
use crate::images::ImageResolver;
use crate::session::{RefreshPolicy, SessionManager};
use crate::storage::KeyValueStore;
use crate::wishlist::WishlistManager;

// Shared state handed to every handler
#[derive(Clone, FromRef)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub api: Arc<DealerApi>,
    pub catalog: Arc<Catalog>,
    pub session: Arc<SessionManager>,
    pub wishlist: Arc<WishlistManager>,
}

impl AppState {
    /// Wires the API client, session, wishlist and catalog together.
    /// Does not touch the network; call [`SessionManager::restore`] afterwards.
    pub fn build(settings: Settings, store: Arc<dyn KeyValueStore>) -> Result<Self> {
        let api = Arc::new(DealerApi::new(&settings.api).context("Failed to build listing API client")?);
        let images = ImageResolver::from_settings(&settings.images);

        let session = SessionManager::new(api.clone(), store, RefreshPolicy::from(&settings.session));
        let wishlist = WishlistManager::new(api.clone(), session.clone(), images.clone());
        wishlist.spawn_session_listener();

        let catalog = Arc::new(Catalog::new(
            api.clone(),
            images,
            settings.api.page_size,
            &settings.cache,
            settings.fallback.clone(),
        ));

        Ok(Self {
            settings: Arc::new(settings),
            api,
            catalog,
            session,
            wishlist,
        })
    }
}

/// Full application router: JSON API, static assets and request tracing.
pub fn create_app(state: AppState) -> Router {
    routes::create_router(state)
        .nest_service("/static", ServeDir::new("static"))
        .layer(TraceLayer::new_for_http())
}
