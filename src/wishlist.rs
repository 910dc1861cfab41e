// Wishlist kept in memory and synchronized with the remote wishlist endpoint

use serde_json::Value;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;

use crate::dealer_api::DealerApi;
use crate::error::SessionError;
use crate::images::ImageResolver;
use crate::models::{ListingId, WishlistItem};
use crate::normalizer::normalize_listing;
use crate::response::{unwrap_object, unwrap_records};
use crate::sequencing::LifecycleGuard;
use crate::session::{SessionEvent, SessionManager};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    /// Another removal of the same car is still running.
    AlreadyInFlight,
}

pub struct WishlistManager {
    api: Arc<DealerApi>,
    session: Arc<SessionManager>,
    images: ImageResolver,
    items: RwLock<Vec<WishlistItem>>,
    removing: Mutex<HashSet<String>>,
    // Replaced on every clear; fetches started before a clear must not repopulate
    generation: Mutex<LifecycleGuard>,
}

/// Holds a car id in the in-flight removal set until dropped.
struct RemovalGuard<'a> {
    set: &'a Mutex<HashSet<String>>,
    key: String,
}

impl<'a> RemovalGuard<'a> {
    fn acquire(set: &'a Mutex<HashSet<String>>, key: String) -> Option<Self> {
        let inserted = set.lock().unwrap_or_else(|e| e.into_inner()).insert(key.clone());
        // Only build the guard on success: dropping one releases the key
        if inserted {
            Some(Self { set, key })
        } else {
            None
        }
    }
}

impl Drop for RemovalGuard<'_> {
    fn drop(&mut self) {
        self.set.lock().unwrap_or_else(|e| e.into_inner()).remove(&self.key);
    }
}

impl WishlistManager {
    pub fn new(api: Arc<DealerApi>, session: Arc<SessionManager>, images: ImageResolver) -> Arc<Self> {
        Arc::new(Self {
            api,
            session,
            images,
            items: RwLock::new(Vec::new()),
            removing: Mutex::new(HashSet::new()),
            generation: Mutex::new(LifecycleGuard::new()),
        })
    }

    pub async fn items(&self) -> Vec<WishlistItem> {
        self.items.read().await.clone()
    }

    pub async fn contains(&self, car_id: &ListingId) -> bool {
        self.items.read().await.iter().any(|item| &item.car_id == car_id)
    }

    fn current_generation(&self) -> LifecycleGuard {
        self.generation.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub async fn clear(&self) {
        {
            let mut generation = self.generation.lock().unwrap_or_else(|e| e.into_inner());
            generation.cancel();
            *generation = LifecycleGuard::new();
        }
        self.items.write().await.clear();
    }

    pub async fn refresh(&self) -> Result<Vec<WishlistItem>, SessionError> {
        if !self.session.is_authenticated() {
            self.clear().await;
            return Ok(Vec::new());
        }
        let generation = self.current_generation();
        let response = self.api.fetch_wishlist().await?;
        let items: Vec<WishlistItem> = unwrap_records(&response)
            .iter()
            .filter_map(|record| self.parse_item(record))
            .collect();

        let mut current = self.items.write().await;
        if !generation.commit(items, |items| *current = items) {
            tracing::debug!("Wishlist cleared while fetching, dropping stale result");
        }
        tracing::debug!(count = current.len(), "Wishlist fetched");
        Ok(current.clone())
    }

    /// Adds a car. Uses the echoed entry when the server returns one, otherwise refetches.
    pub async fn add(&self, car_id: &ListingId) -> Result<Vec<WishlistItem>, SessionError> {
        if !self.session.is_authenticated() {
            return Err(SessionError::NotLoggedIn);
        }
        let response = self.api.add_to_wishlist(car_id).await?;

        match unwrap_object(&response).and_then(|body| self.parse_item(body)) {
            Some(item) if &item.car_id == car_id => {
                let mut items = self.items.write().await;
                if !items.iter().any(|existing| existing.car_id == item.car_id) {
                    items.push(item);
                }
                tracing::info!(%car_id, "Added to wishlist");
                Ok(items.clone())
            }
            _ => {
                tracing::debug!(%car_id, "Add response did not echo the car, refetching wishlist");
                self.refresh().await
            }
        }
    }

    pub async fn remove(&self, car_id: &ListingId) -> Result<RemoveOutcome, SessionError> {
        if !self.session.is_authenticated() {
            return Err(SessionError::NotLoggedIn);
        }
        let Some(_guard) = RemovalGuard::acquire(&self.removing, car_id.to_string()) else {
            tracing::debug!(%car_id, "Removal already in flight, skipping");
            return Ok(RemoveOutcome::AlreadyInFlight);
        };

        let response = self.api.remove_from_wishlist(car_id).await?;
        let echoed = unwrap_object(&response)
            .and_then(echoed_car_id)
            .is_some_and(|echoed| &echoed == car_id);

        if echoed {
            self.items.write().await.retain(|item| &item.car_id != car_id);
        } else {
            self.refresh().await?;
        }
        tracing::info!(%car_id, "Removed from wishlist");
        Ok(RemoveOutcome::Removed)
    }

    /// Refetches on login and clears on logout or expiry.
    pub fn spawn_session_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let mut events = self.session.subscribe();
        let manager = Arc::downgrade(self);
        tokio::spawn(async move {
            loop {
                let event = match events.recv().await {
                    Ok(event) => event,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Wishlist listener lagged behind session events");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => return,
                };
                let Some(manager) = manager.upgrade() else {
                    return;
                };
                match event {
                    SessionEvent::LoggedIn => {
                        if let Err(e) = manager.refresh().await {
                            tracing::warn!(error = %e, "Wishlist refetch after login failed");
                        }
                    }
                    SessionEvent::LoggedOut | SessionEvent::Expired => manager.clear().await,
                    SessionEvent::Refreshed => {}
                }
            }
        })
    }

    fn parse_item(&self, record: &Value) -> Option<WishlistItem> {
        let car = record
            .get("Car")
            .or_else(|| record.get("car"))
            .filter(|c| c.is_object())
            .and_then(|c| normalize_listing(c, &self.images));
        let car_id = echoed_car_id(record).or_else(|| car.as_ref().map(|c| c.id.clone()))?;
        Some(WishlistItem { car_id, car })
    }
}

fn echoed_car_id(record: &Value) -> Option<ListingId> {
    let to_id = |v: &Value| match v {
        Value::Number(n) => n.as_i64().map(ListingId::Number),
        Value::String(s) if !s.is_empty() => Some(ListingId::from(s.as_str())),
        _ => None,
    };
    ["carId", "car_id"]
        .iter()
        .find_map(|k| record.get(*k).and_then(to_id))
        .or_else(|| {
            record
                .get("Car")
                .or_else(|| record.get("car"))
                .and_then(|c| c.get("id"))
                .and_then(to_id)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn removal_guard_blocks_duplicates_until_dropped() {
        let set = Mutex::new(HashSet::new());
        let first = RemovalGuard::acquire(&set, "7".into());
        assert!(first.is_some());
        assert!(RemovalGuard::acquire(&set, "7".into()).is_none());
        assert!(RemovalGuard::acquire(&set, "8".into()).is_some());
        drop(first);
        assert!(RemovalGuard::acquire(&set, "7".into()).is_some());
    }

    #[test]
    fn echoed_id_is_found_flat_or_nested() {
        assert_eq!(echoed_car_id(&json!({"carId": 5})), Some(ListingId::Number(5)));
        assert_eq!(echoed_car_id(&json!({"car_id": "12"})), Some(ListingId::Number(12)));
        assert_eq!(echoed_car_id(&json!({"Car": {"id": 3}})), Some(ListingId::Number(3)));
        assert_eq!(echoed_car_id(&json!({"message": "ok"})), None);
    }
}
