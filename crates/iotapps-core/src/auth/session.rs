use chrono::{DateTime, Duration, SecondsFormat, TimeZone, Utc};
use tracing::warn;

use super::store::KeyValueStore;

// ============================================================================
// Storage keys
// ============================================================================

pub const STORAGE_API_KEY: &str = "Auth-Key";
pub const STORAGE_API_KEY_EXPIRE: &str = "Auth-KeyExpire";
pub const STORAGE_API_KEY_EXPIRE_PERIOD: &str = "Auth-KeyExpirePeriod";
pub const STORAGE_LAST_USERNAME: &str = "Auth-Username";

/// Refresh this many minutes before the key expires, so the refresh finishes
/// before the server invalidates the key.
pub const API_KEY_EXPIRE_GRACE_MINUTES: i64 = 2;

/// Longest timer delay we schedule. Keys living longer are refreshed early.
pub const MAX_TIMER_DELAY_MS: i64 = 0x7FFF_FFFE;

/// The current credential and its expiry.
///
/// Invariant: without a token there is no expiry state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    token: Option<String>,
    expires_at: Option<DateTime<Utc>>,
    expire_period_ms: Option<i64>,
    last_username: Option<String>,
}

impl Session {
    /// Read the persisted session. Unreadable entries are treated as absent.
    ///
    /// Also returns the stored expiry when a token has one that cannot be
    /// parsed, so the caller can expire the session.
    pub fn load(store: &dyn KeyValueStore) -> (Self, Option<String>) {
        let read = |key: &str| match store.get(key) {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(e) => {
                warn!(key = key, error = %e, "Failed to read session entry");
                None
            }
        };

        let last_username = read(STORAGE_LAST_USERNAME);
        let Some(token) = read(STORAGE_API_KEY) else {
            let session = Self {
                last_username,
                ..Self::default()
            };
            return (session, None);
        };

        let raw_expire = read(STORAGE_API_KEY_EXPIRE);
        let expires_at = raw_expire.as_deref().and_then(parse_key_expire);
        let unreadable = raw_expire.filter(|_| expires_at.is_none());

        let session = Self {
            token: Some(token),
            expires_at,
            expire_period_ms: read(STORAGE_API_KEY_EXPIRE_PERIOD).and_then(|raw| raw.parse().ok()),
            last_username,
        };
        (session, unreadable)
    }

    /// Write every field, removing the absent ones
    pub fn persist(&self, store: &dyn KeyValueStore) {
        let expires_at = self
            .expires_at
            .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true));
        let period = self.expire_period_ms.map(|p| p.to_string());

        let entries = [
            (STORAGE_API_KEY, self.token.as_deref()),
            (STORAGE_API_KEY_EXPIRE, expires_at.as_deref()),
            (STORAGE_API_KEY_EXPIRE_PERIOD, period.as_deref()),
            (STORAGE_LAST_USERNAME, self.last_username.as_deref()),
        ];
        for (key, value) in entries {
            let result = match value {
                Some(value) => store.set(key, value),
                None => store.remove(key),
            };
            if let Err(e) = result {
                warn!(key = key, error = %e, "Failed to persist session entry");
            }
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Key lifetime in milliseconds, as measured when it was issued
    pub fn expire_period_ms(&self) -> Option<i64> {
        self.expire_period_ms
    }

    pub fn last_username(&self) -> Option<&str> {
        self.last_username.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// Install a new token. Any previous expiry is cleared.
    pub fn set_token(&mut self, token: String) {
        self.token = Some(token);
        self.clear_expiry();
    }

    /// Record the expiry of the current token. Ignored without a token.
    pub fn set_expiry(&mut self, expires_at: DateTime<Utc>, now: DateTime<Utc>) {
        if self.token.is_none() {
            return;
        }
        self.expires_at = Some(expires_at);
        self.expire_period_ms = Some((expires_at - now).num_milliseconds());
    }

    pub fn clear_expiry(&mut self) {
        self.expires_at = None;
        self.expire_period_ms = None;
    }

    pub fn set_last_username(&mut self, username: Option<String>) {
        self.last_username = username;
    }

    /// Forget the token and its expiry. The last username is kept.
    pub fn clear_token(&mut self) {
        self.token = None;
        self.clear_expiry();
    }

    pub fn time_until_expiry(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.expires_at.map(|t| t - now)
    }

    /// Get minutes remaining until expiry (for display)
    pub fn minutes_until_expiry(&self, now: DateTime<Utc>) -> Option<i64> {
        self.time_until_expiry(now).map(|d| d.num_minutes().max(0))
    }
}

/// Parse a key expiration given as RFC 3339, RFC 2822 or epoch milliseconds
pub fn parse_key_expire(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Some(t.with_timezone(&Utc));
    }
    if let Ok(t) = DateTime::parse_from_rfc2822(raw) {
        return Some(t.with_timezone(&Utc));
    }
    raw.parse::<i64>()
        .ok()
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
}

/// How long to wait before refreshing a key that expires at `expires_at`.
///
/// Returns `None` when the key is already inside the grace period.
pub fn refresh_delay(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> Option<std::time::Duration> {
    let delay = expires_at - now - Duration::minutes(API_KEY_EXPIRE_GRACE_MINUTES);
    let ms = delay.num_milliseconds();
    if ms <= 0 {
        return None;
    }
    let ms = ms.min(MAX_TIMER_DELAY_MS);
    Some(std::time::Duration::from_millis(ms as u64))
}
