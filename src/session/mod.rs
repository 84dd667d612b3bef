//! Encrypted, cookie-backed browser session.
//!
//! The whole session lives client-side in one sealed cookie. [`Session::load`]
//! never fails: a missing, tampered, wrongly keyed or expired cookie simply yields
//! an anonymous session. Mutations become visible to the browser only after
//! [`Session::save`] or [`Session::destroy`], when the session is turned into
//! response parts.

mod cookie;
mod seal;

use axum::{
    http::{header::InvalidHeaderValue, header::SET_COOKIE, HeaderMap, HeaderValue},
    response::{IntoResponseParts, ResponseParts},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{
    convert::Infallible,
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::{SystemTime, UNIX_EPOCH},
};
use thiserror::Error;
use tracing::{debug, error};

use crate::credential::Credential;

pub const DEFAULT_COOKIE_NAME: &str = "_session";
pub const DEFAULT_TTL_SECONDS: u64 = 14 * 24 * 60 * 60;
pub const MIN_SECRET_LEN: usize = 32;
/// Browsers drop cookies above this size.
pub const MAX_COOKIE_BYTES: usize = 4096;

const LOGIN_INFO_KEY: &str = "loginInfo";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session secret must be at least {} characters", MIN_SECRET_LEN)]
    WeakSecret,
    #[error("invalid session cookie name: {0:?}")]
    InvalidCookieName(String),
    #[error("failed to serialize session: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to seal session")]
    Seal,
    #[error("session cookie is {0} bytes, limit is {max}", max = MAX_COOKIE_BYTES)]
    TooLarge(usize),
    #[error("invalid Set-Cookie header: {0}")]
    InvalidHeader(#[from] InvalidHeaderValue),
}

/// Cookie name, key and attributes for the session cookie.
#[derive(Clone)]
pub struct SessionConfig {
    cookie_name: String,
    key: [u8; 32],
    secure: bool,
    ttl_seconds: u64,
}

impl SessionConfig {
    /// # Errors
    /// Returns an error if the secret is shorter than [`MIN_SECRET_LEN`] or the
    /// cookie name is not a valid cookie token.
    pub fn new(cookie_name: impl Into<String>, secret: SecretString) -> Result<Self, SessionError> {
        let cookie_name = cookie_name.into();
        if !cookie::valid_name(&cookie_name) {
            return Err(SessionError::InvalidCookieName(cookie_name));
        }
        if secret.expose_secret().chars().count() < MIN_SECRET_LEN {
            return Err(SessionError::WeakSecret);
        }
        Ok(Self {
            cookie_name,
            key: seal::derive_key(secret.expose_secret()),
            secure: false,
            ttl_seconds: DEFAULT_TTL_SECONDS,
        })
    }

    #[must_use]
    pub const fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    #[must_use]
    pub const fn with_ttl_seconds(mut self, ttl_seconds: u64) -> Self {
        self.ttl_seconds = ttl_seconds;
        self
    }

    #[must_use]
    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    #[must_use]
    pub const fn secure(&self) -> bool {
        self.secure
    }

    #[must_use]
    pub const fn ttl_seconds(&self) -> u64 {
        self.ttl_seconds
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("cookie_name", &self.cookie_name)
            .field("key", &"***")
            .field("secure", &self.secure)
            .field("ttl_seconds", &self.ttl_seconds)
            .finish()
    }
}

type ConfigResolver = dyn Fn(&HeaderMap) -> Result<SessionConfig, SessionError> + Send + Sync;

/// Session configuration, either fixed or computed from each request.
#[derive(Clone)]
pub enum SessionOptions {
    Fixed(SessionConfig),
    PerRequest(Arc<ConfigResolver>),
}

impl SessionOptions {
    pub fn per_request<F>(resolver: F) -> Self
    where
        F: Fn(&HeaderMap) -> Result<SessionConfig, SessionError> + Send + Sync + 'static,
    {
        Self::PerRequest(Arc::new(resolver))
    }

    /// # Errors
    /// Returns an error if a per-request resolver fails.
    pub fn resolve(&self, headers: &HeaderMap) -> Result<SessionConfig, SessionError> {
        match self {
            Self::Fixed(config) => Ok(config.clone()),
            Self::PerRequest(resolver) => resolver(headers),
        }
    }

    /// Resolve the configuration and load the request's session with it.
    ///
    /// # Errors
    /// Returns an error if a per-request resolver fails.
    pub fn load(&self, headers: &HeaderMap) -> Result<Session, SessionError> {
        Ok(Session::load(headers, self.resolve(headers)?))
    }
}

impl From<SessionConfig> for SessionOptions {
    fn from(config: SessionConfig) -> Self {
        Self::Fixed(config)
    }
}

impl fmt::Debug for SessionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(config) => f.debug_tuple("Fixed").field(config).finish(),
            Self::PerRequest(_) => f.write_str("PerRequest(..)"),
        }
    }
}

/// Everything a session may hold: the typed `loginInfo` plus any caller-added keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    #[serde(rename = "loginInfo", default, skip_serializing_if = "Option::is_none")]
    pub login_info: Option<Credential>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Serialize)]
struct SealedRef<'a> {
    exp: u64,
    data: &'a SessionData,
}

#[derive(Deserialize)]
struct Sealed {
    exp: u64,
    data: SessionData,
}

enum CookieUpdate {
    Set(String),
    Clear,
}

struct Inner {
    data: SessionData,
    pending: Option<CookieUpdate>,
}

/// Live handle on the current request's session. Clones share the same state.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Mutex<Inner>>,
    config: Arc<SessionConfig>,
}

impl Session {
    /// Decrypt the session cookie found in `headers`, falling back to an empty session.
    #[must_use]
    pub fn load(headers: &HeaderMap, config: SessionConfig) -> Self {
        let data = cookie::read(headers, config.cookie_name())
            .and_then(|sealed| open(&config, &sealed))
            .unwrap_or_default();

        Self {
            inner: Arc::new(Mutex::new(Inner {
                data,
                pending: None,
            })),
            config: Arc::new(config),
        }
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn login_info(&self) -> Option<Credential> {
        self.lock().data.login_info.clone()
    }

    pub fn set_login_info(&self, credential: Option<Credential>) {
        self.lock().data.login_info = credential;
    }

    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.lock().data.login_info.is_none()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        let inner = self.lock();
        if key == LOGIN_INFO_KEY {
            return inner
                .data
                .login_info
                .as_ref()
                .and_then(|credential| serde_json::to_value(credential).ok());
        }
        inner.data.extra.get(key).cloned()
    }

    /// Set an arbitrary key. `loginInfo` is routed to the typed credential; a value
    /// that is not a valid credential is dropped (logged at debug level) and the
    /// stored credential is kept.
    pub fn insert(&self, key: impl Into<String>, value: Value) -> Option<Value> {
        let key = key.into();
        if key == LOGIN_INFO_KEY {
            let previous = self.get(LOGIN_INFO_KEY);
            match serde_json::from_value(value) {
                Ok(credential) => self.lock().data.login_info = Some(credential),
                Err(err) => debug!("ignoring {LOGIN_INFO_KEY} that is not a credential: {err}"),
            }
            return previous;
        }
        self.lock().data.extra.insert(key, value)
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        if key == LOGIN_INFO_KEY {
            let previous = self.get(LOGIN_INFO_KEY);
            self.lock().data.login_info = None;
            return previous;
        }
        self.lock().data.extra.remove(key)
    }

    /// Snapshot of the current fields.
    #[must_use]
    pub fn data(&self) -> SessionData {
        self.lock().data.clone()
    }

    /// Replace every field: keys absent from `data` are dropped.
    pub fn replace(&self, data: SessionData) {
        self.lock().data = data;
    }

    /// Seal the current fields into the pending `Set-Cookie`.
    ///
    /// # Errors
    /// Returns an error if the session cannot be serialized or sealed, or if the
    /// resulting cookie exceeds [`MAX_COOKIE_BYTES`].
    pub fn save(&self) -> Result<(), SessionError> {
        let mut inner = self.lock();
        let exp = unix_now().saturating_add(self.config.ttl_seconds);
        let plaintext = serde_json::to_vec(&SealedRef {
            exp,
            data: &inner.data,
        })?;
        let sealed = seal::seal(&self.config.key, self.config.cookie_name(), &plaintext)?;

        let size = self.config.cookie_name().len() + 1 + sealed.len();
        if size > MAX_COOKIE_BYTES {
            return Err(SessionError::TooLarge(size));
        }

        inner.pending = Some(CookieUpdate::Set(sealed));
        Ok(())
    }

    /// Clear every field and schedule removal of the cookie.
    pub fn destroy(&self) {
        let mut inner = self.lock();
        inner.data = SessionData::default();
        inner.pending = Some(CookieUpdate::Clear);
    }

    /// Take the pending `Set-Cookie` value, if the session was saved or destroyed
    /// since the last call.
    ///
    /// # Errors
    /// Returns an error if the header value cannot be built.
    pub fn take_set_cookie(&self) -> Result<Option<HeaderValue>, SessionError> {
        let pending = self.lock().pending.take();
        let header = match pending {
            Some(CookieUpdate::Set(sealed)) => Some(cookie::set_header(&self.config, &sealed)?),
            Some(CookieUpdate::Clear) => Some(cookie::clear_header(&self.config)?),
            None => None,
        };
        Ok(header)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("anonymous", &self.is_anonymous())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl IntoResponseParts for Session {
    type Error = Infallible;

    fn into_response_parts(self, mut res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        match self.take_set_cookie() {
            Ok(Some(cookie)) => {
                res.headers_mut().append(SET_COOKIE, cookie);
            }
            Ok(None) => {}
            Err(err) => error!("Failed to build session cookie: {err}"),
        }
        Ok(res)
    }
}

fn open(config: &SessionConfig, sealed: &str) -> Option<SessionData> {
    let Some(plaintext) = seal::unseal(&config.key, config.cookie_name(), sealed) else {
        debug!("discarding unreadable session cookie");
        return None;
    };
    let sealed: Sealed = serde_json::from_slice(&plaintext).ok()?;
    if sealed.exp <= unix_now() {
        debug!("discarding expired session cookie");
        return None;
    }
    Some(sealed.data)
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs())
}
