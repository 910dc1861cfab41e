// Handlers for login state and the signed-in user's wishlist

use axum::{
    extract::{Json as JsonExtract, Path, State},
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use serde_json::json;

use crate::{
    error::AppResult,
    models::ListingId,
    session::SessionState,
    wishlist::RemoveOutcome,
    AppState,
};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistRequest {
    car_id: ListingId,
}

pub async fn login(
    State(state): State<AppState>,
    JsonExtract(request): JsonExtract<LoginRequest>,
) -> AppResult<impl IntoResponse> {
    let session = state.session.login(request.email.trim(), &request.password).await?;
    Ok(Json(json!({
        "success": true,
        "user": session.user,
        "expiresAt": session.expires_at,
    })))
}

pub async fn logout(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    state.session.logout().await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn status(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let (label, expires_at) = match state.session.state() {
        SessionState::LoggedOut => ("loggedOut", None),
        SessionState::LoggedIn { expires_at } => ("loggedIn", expires_at),
        SessionState::Refreshing => ("refreshing", None),
    };
    let user = state.session.current_session().map(|s| s.user);
    let prompt_dismissed = state.session.login_prompt_dismissed().await?;
    Ok(Json(json!({
        "success": true,
        "authenticated": state.session.is_authenticated(),
        "state": label,
        "expiresAt": expires_at,
        "user": user,
        "loginPromptDismissed": prompt_dismissed,
    })))
}

pub async fn profile(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let user = state.session.profile().await?;
    Ok(Json(json!({ "success": true, "user": user })))
}

pub async fn dismiss_login_prompt(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    state.session.dismiss_login_prompt().await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn get_wishlist(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let items = state.wishlist.refresh().await?;
    Ok(Json(json!({ "success": true, "items": items })))
}

pub async fn add_to_wishlist(
    State(state): State<AppState>,
    JsonExtract(request): JsonExtract<WishlistRequest>,
) -> AppResult<impl IntoResponse> {
    let items = state.wishlist.add(&request.car_id).await?;
    Ok(Json(json!({ "success": true, "items": items })))
}

pub async fn remove_from_wishlist(
    State(state): State<AppState>,
    Path(car_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let car_id = ListingId::from(car_id.as_str());
    let outcome = state.wishlist.remove(&car_id).await?;
    let items = state.wishlist.items().await;
    Ok(Json(json!({
        "success": true,
        "removed": outcome == RemoveOutcome::Removed,
        "items": items,
    })))
}
