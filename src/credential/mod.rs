//! Access/refresh token pair and the decision of when it must be refreshed.

mod flight;
mod lifecycle;

pub use self::flight::RefreshFlights;
pub use self::lifecycle::{access_token, access_token_with};

use serde::{Deserialize, Serialize};
use std::{
    fmt,
    time::{SystemTime, UNIX_EPOCH},
};

/// A token whose expiry falls within this window is refreshed before use.
pub const EXPIRY_MARGIN_MS: i64 = 30_000;

/// Tokens stored in a session.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: String,
    /// Absolute expiry of `access_token`, in milliseconds since the Unix epoch.
    /// Never a duration.
    pub expires: i64,
}

impl Credential {
    /// Whether the access token expires before `now_ms + EXPIRY_MARGIN_MS`.
    #[must_use]
    pub const fn expires_soon(&self, now_ms: i64) -> bool {
        self.expires < now_ms.saturating_add(EXPIRY_MARGIN_MS)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"***")
            .field("refresh_token", &"***")
            .field("expires", &self.expires)
            .finish()
    }
}

/// Milliseconds since the Unix epoch.
#[must_use]
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| {
            i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX)
        })
}

/// Convert a backend-supplied lifetime (ms) into an absolute expiry.
#[must_use]
pub fn expires_at(duration_ms: i64) -> i64 {
    now_millis().saturating_add(duration_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential(expires: i64) -> Credential {
        Credential {
            access_token: "a".to_string(),
            refresh_token: "r".to_string(),
            expires,
        }
    }

    #[test]
    fn expires_soon_respects_margin() {
        let now = 1_000_000;
        assert!(credential(now).expires_soon(now));
        assert!(credential(now + EXPIRY_MARGIN_MS - 1).expires_soon(now));
        assert!(!credential(now + EXPIRY_MARGIN_MS).expires_soon(now));
        assert!(!credential(now + 900_000).expires_soon(now));
    }

    #[test]
    fn expires_at_is_absolute() {
        let before = now_millis();
        let at = expires_at(900_000);
        assert!(at >= before + 900_000);
        assert!(at <= now_millis() + 900_000);
    }

    #[test]
    fn debug_redacts_tokens() {
        let debug = format!("{:?}", credential(42));
        assert!(!debug.contains("\"a\""));
        assert!(debug.contains("***"));
        assert!(debug.contains("42"));
    }
}
