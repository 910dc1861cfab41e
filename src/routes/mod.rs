// Route definitions

use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::AppState;

mod api;
mod auth;

pub fn create_router(app_state: AppState) -> Router {
    let api_router = Router::new()
        // Catalog
        .route("/brands", get(api::get_brands))
        .route("/brands/:id/models", get(api::get_models))
        .route("/models/:id/trims", get(api::get_trims))
        .route("/specifications/:key", get(api::get_specification_options))
        .route("/cars/search", post(api::search_cars))
        .route("/cars/:slug", get(api::get_car))
        // Home sections
        .route("/home", get(api::get_home))
        .route("/home/hot-deals", get(api::get_hot_deals))
        .route("/home/just-arrived", get(api::get_just_arrived))
        .route("/home/most-popular", get(api::get_most_popular))
        .route("/home/popular-brands", get(api::get_popular_brands))
        // Content
        .route("/blogs", get(api::get_blogs))
        .route("/pages/:slug", get(api::get_static_page))
        .route("/enquiries", post(api::submit_enquiry))
        // Session and wishlist
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/status", get(auth::status))
        .route("/auth/profile", get(auth::profile))
        .route("/auth/login-prompt/dismiss", post(auth::dismiss_login_prompt))
        .route("/wishlist", get(auth::get_wishlist).post(auth::add_to_wishlist))
        .route("/wishlist/:car_id", delete(auth::remove_from_wishlist));

    Router::new().nest("/api", api_router).with_state(app_state)
}
