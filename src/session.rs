//! Bearer-token session: login, logout, persisted restore and a periodic
//! refresh loop with bounded retries.
//!
//! State machine: `LoggedOut -> LoggedIn -> Refreshing -> LoggedIn`, or
//! `Refreshing -> LoggedOut` once every refresh attempt has failed. Every
//! transition is persisted to the [`KeyValueStore`] and announced on a
//! broadcast channel so dependents (the wishlist) can refetch or clear.

use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::SessionSettings;
use crate::dealer_api::DealerApi;
use crate::error::{ApiError, SessionError};
use crate::models::AuthSession;
use crate::response::unwrap_object;
use crate::storage::{
    load_json, save_json, KeyValueStore, KEY_ACCESS_TOKEN, KEY_LOGIN_PROMPT_DISMISSED,
    KEY_REFRESH_TOKEN, KEY_USER,
};

// Refresh this long before the token's own `exp`, if it is sooner than the interval
const EXPIRY_MARGIN: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    LoggedOut,
    LoggedIn { expires_at: Option<DateTime<Utc>> },
    Refreshing,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    LoggedIn,
    Refreshed,
    LoggedOut,
    /// Refresh gave up; the user has to log in again.
    Expired,
}

#[derive(Debug, Clone)]
pub struct RefreshPolicy {
    pub interval: Duration,
    pub retry_delay: Duration,
    pub max_attempts: u32,
}

impl From<&SessionSettings> for RefreshPolicy {
    fn from(settings: &SessionSettings) -> Self {
        Self {
            interval: settings.refresh_interval(),
            retry_delay: settings.retry_delay(),
            max_attempts: settings.max_refresh_attempts.max(1),
        }
    }
}

struct Inner {
    state: SessionState,
    session: Option<AuthSession>,
    timer: Option<JoinHandle<()>>,
}

pub struct SessionManager {
    api: Arc<DealerApi>,
    store: Arc<dyn KeyValueStore>,
    policy: RefreshPolicy,
    inner: Mutex<Inner>,
    // Serializes refresh rounds; held across the network calls
    refresh_lock: tokio::sync::Mutex<()>,
    events: broadcast::Sender<SessionEvent>,
}

#[derive(Debug, Deserialize)]
struct ExpiryClaims {
    exp: i64,
}

impl SessionManager {
    pub fn new(api: Arc<DealerApi>, store: Arc<dyn KeyValueStore>, policy: RefreshPolicy) -> Arc<Self> {
        let (events, _) = broadcast::channel(16);
        Arc::new(Self {
            api,
            store,
            policy,
            inner: Mutex::new(Inner {
                state: SessionState::LoggedOut,
                session: None,
                timer: None,
            }),
            refresh_lock: tokio::sync::Mutex::new(()),
            events,
        })
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn state(&self) -> SessionState {
        self.inner().state.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        !matches!(self.inner().state, SessionState::LoggedOut)
    }

    pub fn current_session(&self) -> Option<AuthSession> {
        self.inner().session.clone()
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    pub async fn login(self: &Arc<Self>, email: &str, password: &str) -> Result<AuthSession, SessionError> {
        tracing::info!(email, "Logging in");
        let response = self.api.login(email, password).await.map_err(|e| match e {
            ApiError::Unauthorized(message) => SessionError::LoginRejected(message),
            other => SessionError::Api(other),
        })?;

        let session = parse_session(&response, None)
            .ok_or_else(|| SessionError::LoginRejected("Login response carried no token".into()))?;

        self.persist(&session).await?;
        self.install(session.clone());
        self.start_refresh_loop();
        self.emit(SessionEvent::LoggedIn);
        tracing::info!(expires_at = ?session.expires_at, "Login succeeded");
        Ok(session)
    }

    /// Rehydrates a persisted session, refreshing straight away if it already expired.
    pub async fn restore(self: &Arc<Self>) -> Result<SessionState, SessionError> {
        let access = self.store.get(KEY_ACCESS_TOKEN).await?;
        let refresh = self.store.get(KEY_REFRESH_TOKEN).await?;
        let (Some(access_token), Some(refresh_token)) = (access, refresh) else {
            tracing::debug!("No persisted session found");
            return Ok(SessionState::LoggedOut);
        };

        let user: Value = load_json(self.store.as_ref(), KEY_USER).await?.unwrap_or(Value::Null);
        let expires_at = token_expiry(&access_token);
        let session = AuthSession {
            access_token,
            refresh_token,
            user,
            expires_at,
        };
        self.install(session);
        tracing::info!(?expires_at, "Restored persisted session");

        if expires_at.is_some_and(|at| at <= Utc::now()) {
            tracing::info!("Persisted token already expired, refreshing");
            if let Err(e) = self.refresh_token().await {
                tracing::warn!(error = %e, "Could not refresh restored session");
                return Ok(self.state());
            }
        } else {
            self.emit(SessionEvent::LoggedIn);
        }
        self.start_refresh_loop();
        Ok(self.state())
    }

    pub async fn logout(&self) -> Result<(), SessionError> {
        if self.is_authenticated() {
            if let Err(e) = self.api.logout().await {
                tracing::warn!(error = %e, "Remote logout failed, clearing local session anyway");
            }
        }
        self.clear(SessionEvent::LoggedOut).await
    }

    /// One refresh round: up to `max_attempts` tries with a fixed delay between them.
    /// Exhaustion forces `LoggedOut` and emits [`SessionEvent::Expired`].
    ///
    /// Only one round runs at a time. A caller that waited on a round which
    /// already replaced its token gets that result instead of refreshing again.
    pub async fn refresh_token(&self) -> Result<AuthSession, SessionError> {
        let observed = self
            .inner()
            .session
            .as_ref()
            .map(|s| s.access_token.clone())
            .ok_or(SessionError::NotLoggedIn)?;
        let _round = self.refresh_lock.lock().await;

        let previous = {
            let mut inner = self.inner();
            let Some(session) = inner.session.clone() else {
                return Err(SessionError::NotLoggedIn);
            };
            if session.access_token != observed {
                tracing::debug!("Token already refreshed by a concurrent caller");
                return Ok(session);
            }
            inner.state = SessionState::Refreshing;
            session
        };

        let attempts = self.policy.max_attempts;
        for attempt in 1..=attempts {
            match self.api.refresh(&previous.refresh_token).await {
                Ok(response) => match parse_session(&response, Some(&previous)) {
                    Some(session) => {
                        self.persist(&session).await?;
                        {
                            let mut inner = self.inner();
                            inner.state = SessionState::LoggedIn {
                                expires_at: session.expires_at,
                            };
                            inner.session = Some(session.clone());
                        }
                        self.api.set_bearer_token(Some(session.access_token.clone()));
                        self.emit(SessionEvent::Refreshed);
                        tracing::info!(attempt, "Token refreshed");
                        return Ok(session);
                    }
                    None => tracing::warn!(attempt, "Refresh response carried no token"),
                },
                Err(e) => tracing::warn!(attempt, error = %e, "Token refresh attempt failed"),
            }
            if attempt < attempts {
                tokio::time::sleep(self.policy.retry_delay).await;
            }
        }

        tracing::error!(attempts, "Token refresh exhausted, forcing logout");
        self.clear(SessionEvent::Expired).await?;
        Err(SessionError::RefreshExhausted { attempts })
    }

    pub async fn profile(&self) -> Result<Value, SessionError> {
        if !self.is_authenticated() {
            return Err(SessionError::NotLoggedIn);
        }
        let response = self.api.profile().await?;
        let user = unwrap_object(&response).cloned().unwrap_or(Value::Null);
        save_json(self.store.as_ref(), KEY_USER, &user).await?;
        if let Some(session) = self.inner().session.as_mut() {
            session.user = user.clone();
        }
        Ok(user)
    }

    pub async fn login_prompt_dismissed(&self) -> Result<bool, SessionError> {
        Ok(load_json(self.store.as_ref(), KEY_LOGIN_PROMPT_DISMISSED)
            .await?
            .unwrap_or(false))
    }

    pub async fn dismiss_login_prompt(&self) -> Result<(), SessionError> {
        save_json(self.store.as_ref(), KEY_LOGIN_PROMPT_DISMISSED, &true).await?;
        Ok(())
    }

    async fn persist(&self, session: &AuthSession) -> Result<(), SessionError> {
        self.store.set(KEY_ACCESS_TOKEN, session.access_token.clone()).await?;
        self.store.set(KEY_REFRESH_TOKEN, session.refresh_token.clone()).await?;
        save_json(self.store.as_ref(), KEY_USER, &session.user).await?;
        Ok(())
    }

    fn install(&self, session: AuthSession) {
        self.api.set_bearer_token(Some(session.access_token.clone()));
        let mut inner = self.inner();
        inner.state = SessionState::LoggedIn {
            expires_at: session.expires_at,
        };
        inner.session = Some(session);
    }

    fn start_refresh_loop(self: &Arc<Self>) {
        let old_timer = self.inner().timer.take();
        if let Some(old) = old_timer {
            old.abort();
        }
        let timer = self.spawn_refresh_loop();
        self.inner().timer = Some(timer);
    }

    async fn clear(&self, event: SessionEvent) -> Result<(), SessionError> {
        self.api.set_bearer_token(None);
        let timer = {
            let mut inner = self.inner();
            inner.state = SessionState::LoggedOut;
            inner.session = None;
            inner.timer.take()
        };
        let removed = async {
            self.store.remove(KEY_ACCESS_TOKEN).await?;
            self.store.remove(KEY_REFRESH_TOKEN).await?;
            self.store.remove(KEY_USER).await
        }
        .await;
        self.emit(event);
        // Last: this may be the refresh loop's own task
        if let Some(timer) = timer {
            timer.abort();
        }
        removed.map_err(SessionError::from)
    }

    fn next_refresh_delay(&self) -> Duration {
        let expires_at = self.inner().session.as_ref().and_then(|s| s.expires_at);
        refresh_delay(self.policy.interval, expires_at, Utc::now())
    }

    fn spawn_refresh_loop(self: &Arc<Self>) -> JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            loop {
                let Some(delay) = weak.upgrade().map(|m| m.next_refresh_delay()) else {
                    return;
                };
                tracing::debug!(?delay, "Next token refresh scheduled");
                tokio::time::sleep(delay).await;

                let Some(manager) = weak.upgrade() else {
                    return;
                };
                if let Err(e) = manager.refresh_token().await {
                    tracing::warn!(error = %e, "Scheduled refresh failed, stopping refresh loop");
                    return;
                }
            }
        })
    }
}

/// Time until the next refresh: the fixed interval, or sooner if the token
/// expires within that interval plus the safety margin.
pub fn refresh_delay(interval: Duration, expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Duration {
    let Some(expires_at) = expires_at else {
        return interval;
    };
    let until_margin = (expires_at - now)
        .to_std()
        .unwrap_or_default()
        .saturating_sub(EXPIRY_MARGIN);
    interval.min(until_margin)
}

/// Reads the `exp` claim without verifying the signature; the server does that.
pub fn token_expiry(token: &str) -> Option<DateTime<Utc>> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    let data = decode::<ExpiryClaims>(token, &DecodingKey::from_secret(&[]), &validation).ok()?;
    Utc.timestamp_opt(data.claims.exp, 0).single()
}

/// Extracts tokens from a login/refresh payload. Missing refresh token or user
/// are carried over from `previous` (refresh responses often omit them).
pub fn parse_session(response: &Value, previous: Option<&AuthSession>) -> Option<AuthSession> {
    let body = unwrap_object(response)?;
    let pick = |keys: &[&str]| {
        keys.iter()
            .find_map(|k| body.get(*k).and_then(Value::as_str))
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    let access_token = pick(&["accessToken", "access_token", "token"])?;
    let refresh_token = pick(&["refreshToken", "refresh_token"])
        .or_else(|| previous.map(|p| p.refresh_token.clone()))?;
    let user = body
        .get("user")
        .or_else(|| body.get("User"))
        .cloned()
        .or_else(|| previous.map(|p| p.user.clone()))
        .unwrap_or(Value::Null);
    let expires_at = token_expiry(&access_token).or_else(|| {
        body.get("expiresIn")
            .or_else(|| body.get("expires_in"))
            .and_then(Value::as_i64)
            .map(|secs| Utc::now() + chrono::Duration::seconds(secs))
    });

    Some(AuthSession {
        access_token,
        refresh_token,
        user,
        expires_at,
    })
}
