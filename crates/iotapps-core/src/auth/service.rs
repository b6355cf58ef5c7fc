//! API key lifecycle: login, persistence, refresh before expiry, logout.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use chrono::{DateTime, Utc};
use futures::channel::oneshot;
use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::ApiError;
use crate::models::{
    ApiResponseBase, AuthorizationParams, KeyType, LoginResponse, PasswordParams,
    SendPasscodeRequest, SendPasscodeResponse, PASSCODE_DELIVERY_SMS,
};

use super::events::LiteEvent;
use super::session::{parse_key_expire, refresh_delay, Session};
use super::store::KeyValueStore;
use super::transport::CredentialTransport;
use super::AuthError;

type LoginWait = Shared<BoxFuture<'static, bool>>;

/// Observable state of the expiry timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerStatus {
    Unarmed,
    /// A refresh is scheduled at `fires_at`, ahead of the key's expiry
    Armed { fires_at: DateTime<Utc> },
    /// The timer fired and its refresh is in flight
    Fired,
}

enum ExpiryTimer {
    Unarmed,
    Armed {
        generation: u64,
        fires_at: DateTime<Utc>,
        handle: JoinHandle<()>,
    },
    Fired,
}

impl ExpiryTimer {
    fn status(&self) -> TimerStatus {
        match self {
            ExpiryTimer::Unarmed => TimerStatus::Unarmed,
            ExpiryTimer::Armed { fires_at, .. } => TimerStatus::Armed {
                fires_at: *fires_at,
            },
            ExpiryTimer::Fired => TimerStatus::Fired,
        }
    }

    fn cancel(&mut self) {
        if let ExpiryTimer::Armed { handle, .. } = std::mem::replace(self, ExpiryTimer::Unarmed) {
            handle.abort();
        }
    }
}

struct State {
    session: Session,
    timer: ExpiryTimer,
    next_generation: u64,
    /// Shared by every `ensure_authenticated` caller until the next login
    pending_login: Option<LoginWait>,
}

struct Inner {
    transport: Arc<dyn CredentialTransport>,
    store: Arc<dyn KeyValueStore>,
    state: Mutex<State>,
    on_login: LiteEvent,
    on_logout: LiteEvent,
    on_need_relogin: LiteEvent,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.lock().timer.cancel();
    }
}

/// Result of `AuthService::login_by_key`.
///
/// Unlike the other login calls, a failed key exchange is reported as a
/// value rather than an `Err`.
#[derive(Debug)]
#[must_use]
pub enum LoginByKeyOutcome {
    LoggedIn(LoginResponse),
    Failed(AuthError),
}

impl LoginByKeyOutcome {
    pub fn is_logged_in(&self) -> bool {
        matches!(self, LoginByKeyOutcome::LoggedIn(_))
    }

    pub fn into_result(self) -> Result<LoginResponse, AuthError> {
        match self {
            LoginByKeyOutcome::LoggedIn(response) => Ok(response),
            LoginByKeyOutcome::Failed(err) => Err(err),
        }
    }
}

/// Owns the API key of the process.
///
/// The key, its expiry and the last username are mirrored into a
/// `KeyValueStore` so a restarted host resumes the session. A timer refreshes
/// the key two minutes before it expires; if that fails the session is
/// dropped and `on_need_relogin` fires.
///
/// Clones share the same session. Concurrent `login*` calls are not
/// serialized: each runs its own logout then exchange, and the last one to
/// complete wins.
#[derive(Clone)]
pub struct AuthService {
    inner: Arc<Inner>,
}

impl AuthService {
    /// Create the service and resume a persisted session, if any.
    ///
    /// Must be called from within a Tokio runtime when the store may hold a
    /// key with an expiry, since the refresh timer is armed right away.
    pub fn new(transport: Arc<dyn CredentialTransport>, store: Arc<dyn KeyValueStore>) -> Self {
        let (session, unreadable_expiry) = Session::load(store.as_ref());
        let service = Self {
            inner: Arc::new(Inner {
                transport,
                store,
                state: Mutex::new(State {
                    session,
                    timer: ExpiryTimer::Unarmed,
                    next_generation: 0,
                    pending_login: None,
                }),
                on_login: LiteEvent::new(),
                on_logout: LiteEvent::new(),
                on_need_relogin: LiteEvent::new(),
            }),
        };
        service.restore(unreadable_expiry);
        service
    }

    /// Arm the timer for a persisted key. The stored key lifetime is kept.
    fn restore(&self, unreadable_expiry: Option<String>) {
        let expires_at = {
            let state = self.inner.lock();
            if !state.session.is_authenticated() {
                debug!("API key was not found in storage");
                return;
            }
            state.session.expires_at()
        };

        if let Some(raw) = unreadable_expiry {
            self.on_expired(AuthError::Expired(format!("unreadable stored expiry '{}'", raw)));
            return;
        }

        debug!("API key restored from storage");
        let active = match expires_at {
            Some(expires_at) => self.schedule_refresh(expires_at, false),
            None => true,
        };
        if active {
            self.inner.on_login.trigger();
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.inner.lock()
    }

    // ===== Events =====

    /// Fired when a key has been obtained
    pub fn on_login(&self) -> &LiteEvent {
        &self.inner.on_login
    }

    pub fn on_logout(&self) -> &LiteEvent {
        &self.inner.on_logout
    }

    /// Fired when the key is gone for a reason other than an explicit logout:
    /// it expired, its refresh failed, or the server rejected it
    pub fn on_need_relogin(&self) -> &LiteEvent {
        &self.inner.on_need_relogin
    }

    // ===== Accessors =====

    pub fn is_authenticated(&self) -> bool {
        self.lock().session.is_authenticated()
    }

    pub fn api_key(&self) -> Option<String> {
        self.lock().session.token().map(str::to_string)
    }

    pub fn api_key_expire(&self) -> Option<DateTime<Utc>> {
        self.lock().session.expires_at()
    }

    pub fn api_key_expire_period(&self) -> Option<i64> {
        self.lock().session.expire_period_ms()
    }

    pub fn last_username(&self) -> Option<String> {
        self.lock().session.last_username().map(str::to_string)
    }

    pub fn session(&self) -> Session {
        self.lock().session.clone()
    }

    pub fn expiry_timer(&self) -> TimerStatus {
        self.lock().timer.status()
    }

    // ===== Login =====

    /// Log in with username and password, replacing the current session
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        admin: bool,
    ) -> Result<LoginResponse, AuthError> {
        self.logout_local();
        let key_type = admin.then_some(KeyType::Admin);
        let response = self
            .inner
            .transport
            .login_by_password(username, password, key_type)
            .await?;

        info!(username = username, "Logged in");
        let key = issued_key(&response)?;
        self.complete_login(key, response.key_expire.as_deref(), Some(username));
        Ok(response)
    }

    /// Log in with username and a one-time passcode from `send_passcode`
    pub async fn login_by_passcode(
        &self,
        username: &str,
        passcode: &str,
        admin: bool,
    ) -> Result<LoginResponse, AuthError> {
        self.logout_local();
        let response = self
            .inner
            .transport
            .login_by_passcode(username, passcode, KeyType::for_admin(admin))
            .await?;

        info!(username = username, "Logged in by passcode");
        let key = issued_key(&response)?;
        self.complete_login(key, response.key_expire.as_deref(), Some(username));
        Ok(response)
    }

    /// Log in with an existing (possibly temporary) key.
    ///
    /// When the server does not issue a new key the supplied one stays
    /// active. Transport failures are returned as `LoginByKeyOutcome::Failed`.
    pub async fn login_by_key(&self, api_key: &str, admin: bool) -> LoginByKeyOutcome {
        self.logout_local();
        let response = match self
            .inner
            .transport
            .login_by_key(Some(api_key), Some(KeyType::for_admin(admin)))
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Login by key failed");
                return LoginByKeyOutcome::Failed(e.into());
            }
        };

        info!("Logged in by API key");
        let key = response.key.clone().unwrap_or_else(|| api_key.to_string());
        self.complete_login(key, response.key_expire.as_deref(), None);
        LoginByKeyOutcome::LoggedIn(response)
    }

    /// Store a freshly issued key and arm its expiry timer. `on_login` fires
    /// unless the key turned out to be already expired.
    fn complete_login(&self, key: String, key_expire: Option<&str>, username: Option<&str>) {
        {
            let mut state = self.lock();
            state.session.set_token(key);
            state.session.set_last_username(username.map(str::to_string));
            state.session.persist(self.inner.store.as_ref());
        }

        if self.arm_expiry(key_expire) {
            self.inner.on_login.trigger();
        }
    }

    /// Exchange the current key for a fresh one with a new expiry.
    ///
    /// The result is installed even if `logout_local` or another login ran
    /// while the exchange was in flight.
    pub async fn refresh_token(&self) -> Result<LoginResponse, AuthError> {
        let current = self.api_key().ok_or(AuthError::NotAuthenticated)?;
        let response = self
            .inner
            .transport
            .login_by_key(Some(&current), None)
            .await?;

        debug!("API key has been refreshed");
        let key = response.key.clone().unwrap_or(current);
        {
            let mut state = self.lock();
            state.session.set_token(key);
            state.session.persist(self.inner.store.as_ref());
        }
        self.arm_expiry(response.key_expire.as_deref());
        Ok(response)
    }

    /// Request a temporary key for bootstrap flows. The session is untouched.
    pub async fn get_temp_token(&self) -> Result<LoginResponse, AuthError> {
        let response = self
            .inner
            .transport
            .login_by_key(None, Some(KeyType::Temporary))
            .await?;
        debug!("Temporary API key has been requested");
        Ok(response)
    }

    /// Resolves `true` once a key is available.
    ///
    /// Returns at once when authenticated. Otherwise every caller shares a
    /// single wait that completes on the next `on_login`.
    pub async fn ensure_authenticated(&self) -> bool {
        let wait = {
            let mut state = self.lock();
            if state.session.is_authenticated() {
                return true;
            }
            state
                .pending_login
                .get_or_insert_with(|| self.wait_for_login())
                .clone()
        };
        wait.await
    }

    fn wait_for_login(&self) -> LoginWait {
        let (tx, rx) = oneshot::channel::<()>();
        let tx = Mutex::new(Some(tx));
        let inner = Arc::downgrade(&self.inner);

        self.inner.on_login.once(move || {
            if let Some(inner) = inner.upgrade() {
                inner.lock().pending_login = None;
            }
            let sender = tx.lock().unwrap_or_else(|p| p.into_inner()).take();
            if let Some(sender) = sender {
                let _ = sender.send(());
            }
        });

        rx.map(|received| received.is_ok()).boxed().shared()
    }

    // ===== Passcodes and passwords =====

    /// Send a one-time passcode by SMS. An empty username is rejected
    /// without contacting the server.
    pub async fn send_passcode(
        &self,
        username: &str,
        admin: bool,
        brand: Option<&str>,
    ) -> Result<SendPasscodeResponse, AuthError> {
        if username.is_empty() {
            return Err(AuthError::Validation(format!(
                "Username can not be empty [{}]",
                username
            )));
        }

        let request = SendPasscodeRequest {
            username: username.to_string(),
            delivery_type: PASSCODE_DELIVERY_SMS,
            key_type: KeyType::for_admin(admin),
            brand: brand.map(str::to_string),
        };
        Ok(self.inner.transport.send_passcode(&request).await?)
    }

    /// Change the password of the logged in user, waiting for a login first.
    /// With two-factor auth the first call sends a passcode and fails; call
    /// again with `params.passcode`.
    pub async fn set_new_password(
        &self,
        new_password: &str,
        old_password: &str,
        params: &PasswordParams,
    ) -> Result<ApiResponseBase, AuthError> {
        self.ensure_authenticated().await;
        let key = self.api_key().ok_or(AuthError::NotAuthenticated)?;
        Ok(self
            .inner
            .transport
            .set_new_password(&key, new_password, old_password, params)
            .await?)
    }

    /// Set a new password using a temporary key from the reset flow
    pub async fn set_new_password_by_temp_key(
        &self,
        new_password: &str,
        temp_key: &str,
        params: &PasswordParams,
    ) -> Result<ApiResponseBase, AuthError> {
        Ok(self
            .inner
            .transport
            .set_new_password_by_temp_key(temp_key, new_password, params)
            .await?)
    }

    /// URL approving or denying a third-party OAuth authorization request
    pub async fn authorization_url(
        &self,
        approved: bool,
        params: &AuthorizationParams,
    ) -> Result<String, AuthError> {
        Ok(self
            .inner
            .transport
            .authorization_url(approved, params)
            .await?)
    }

    // ===== Logout =====

    /// Forget the key on this client only. Always succeeds.
    pub fn logout_local(&self) {
        {
            let mut state = self.lock();
            state.timer.cancel();
            state.session.clear_token();
            state.session.persist(self.inner.store.as_ref());
        }
        self.inner.on_logout.trigger();
        debug!("Logged out locally");
    }

    /// Annul the key on the server for every client, then log out locally.
    /// On failure the local session is left as it was.
    pub async fn logout_global(&self) -> Result<ApiResponseBase, AuthError> {
        let key = self.api_key().ok_or(AuthError::NotAuthenticated)?;
        let response = self.inner.transport.logout(&key).await?;
        info!("Logged out from all clients");
        self.logout_local();
        Ok(response)
    }

    /// The server rejected the key: drop the session and ask for a new login
    pub fn handle_unauthorized(&self) {
        warn!("API key rejected by server");
        self.expire();
    }

    fn expire(&self) {
        self.logout_local();
        self.inner.on_need_relogin.trigger();
    }

    // ===== Expiry timer =====

    /// Arm the refresh timer for `key_expire`. Returns whether the session
    /// is still active afterwards.
    ///
    /// No expiry leaves the key without a timer. An expiry that cannot be
    /// parsed, or that falls inside the grace period, expires the session.
    fn arm_expiry(&self, key_expire: Option<&str>) -> bool {
        match key_expire.filter(|raw| !raw.trim().is_empty()) {
            None => {
                let mut state = self.lock();
                state.timer.cancel();
                state.session.clear_expiry();
                state.session.persist(self.inner.store.as_ref());
                true
            }
            Some(raw) => match parse_key_expire(raw) {
                Some(expires_at) => self.arm_expiry_at(expires_at),
                None => {
                    self.on_expired(AuthError::Expired(format!("unreadable expiry '{}'", raw)));
                    false
                }
            },
        }
    }

    fn arm_expiry_at(&self, expires_at: DateTime<Utc>) -> bool {
        self.schedule_refresh(expires_at, true)
    }

    /// Schedule the refresh ahead of `expires_at`. With `issued` the expiry
    /// and key lifetime are recorded in the session too.
    fn schedule_refresh(&self, expires_at: DateTime<Utc>, issued: bool) -> bool {
        let now = Utc::now();
        let Some(delay) = refresh_delay(expires_at, now) else {
            self.on_expired(AuthError::Expired(format!("expires at {}", expires_at)));
            return false;
        };

        let mut state = self.lock();
        state.timer.cancel();
        if issued {
            state.session.set_expiry(expires_at, now);
            state.session.persist(self.inner.store.as_ref());
        }

        let generation = state.next_generation;
        state.next_generation += 1;
        let fires_at = now
            + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
        let handle = spawn_expiry_timer(Arc::downgrade(&self.inner), generation, delay);
        state.timer = ExpiryTimer::Armed {
            generation,
            fires_at,
            handle,
        };
        debug!(expires_at = %expires_at, fires_at = %fires_at, "Armed API key refresh timer");
        true
    }

    fn on_expired(&self, err: AuthError) {
        debug!(error = %err, "API key has expired");
        self.expire();
    }

    async fn on_expiry_timer(&self, generation: u64) {
        {
            let mut state = self.lock();
            let current = matches!(
                state.timer,
                ExpiryTimer::Armed { generation: armed, .. } if armed == generation
            );
            if !current {
                return;
            }
            // Dropping our own handle detaches rather than aborts.
            state.timer = ExpiryTimer::Fired;
        }

        debug!("API key is about to expire, refreshing");
        if let Err(e) = self.refresh_token().await {
            warn!(error = %e, "API key refresh failed");
            // A logout or a newer login while the refresh was in flight
            // already replaced this timer.
            let superseded = !matches!(self.lock().timer, ExpiryTimer::Fired);
            if superseded {
                debug!("Session changed during refresh, keeping it");
                return;
            }
            self.expire();
        }
    }
}

fn spawn_expiry_timer(
    inner: Weak<Inner>,
    generation: u64,
    delay: std::time::Duration,
) -> JoinHandle<()> {
    // The deadline is fixed now, not when the task is first polled.
    let sleep = tokio::time::sleep(delay);
    tokio::spawn(async move {
        sleep.await;
        if let Some(inner) = inner.upgrade() {
            AuthService { inner }.on_expiry_timer(generation).await;
        }
    })
}

fn issued_key(response: &LoginResponse) -> Result<String, AuthError> {
    response.key.clone().ok_or_else(|| {
        AuthError::Transport(ApiError::InvalidResponse(
            "login response did not include an API key".to_string(),
        ))
    })
}
