//! Raw `Cookie` / `Set-Cookie` header handling for the session cookie.

use axum::http::{
    header::{InvalidHeaderValue, COOKIE},
    HeaderMap, HeaderValue,
};

use super::SessionConfig;

/// RFC 6265 cookie-name token.
pub(super) fn valid_name(name: &str) -> bool {
    !name.is_empty()
        && name.bytes().all(|b| {
            b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
        })
}

/// Find the value of cookie `name` across all `Cookie` headers.
pub(super) fn read(headers: &HeaderMap, name: &str) -> Option<String> {
    for header in headers.get_all(COOKIE) {
        let Ok(value) = header.to_str() else {
            continue;
        };
        for pair in value.split(';') {
            let mut parts = pair.trim().splitn(2, '=');
            let Some(key) = parts.next() else {
                continue;
            };
            let Some(val) = parts.next() else {
                continue;
            };
            if key.trim() == name {
                return Some(val.trim().to_string());
            }
        }
    }
    None
}

/// Build an `HttpOnly` cookie carrying the sealed session.
pub(super) fn set_header(config: &SessionConfig, sealed: &str) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!(
        "{}={sealed}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        config.cookie_name(),
        config.ttl_seconds()
    );
    if config.secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub(super) fn clear_header(config: &SessionConfig) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!(
        "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0",
        config.cookie_name()
    );
    if config.secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}
