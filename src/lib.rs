//! # Atrium (server-rendered portal for a headless content backend)
//!
//! `atrium` serves a small set of pages whose data comes from a Directus-style
//! backend. Users log in against the backend; the resulting credential lives in an
//! encrypted, authenticated cookie and never touches a server-side store.
//!
//! ## Session & credential lifecycle
//!
//! - **[`session`]** seals the per-browser session into a ChaCha20-Poly1305 cookie.
//!   Missing, tampered or expired cookies load as an empty (anonymous) session.
//! - **[`backend`]** talks to the backend and normalizes every answer into an
//!   [`backend::Envelope`]: non-2xx answers are values (`ok == false`), not errors.
//! - **[`credential`]** decides whether the stored access token is usable, refreshing
//!   it once when it expires within 30 seconds.
//! - **[`gate`]** wraps page loaders: a loader only runs with a valid token,
//!   otherwise the browser is sent to `/login?redirect=<path>`.

pub mod api;
pub mod backend;
pub mod cli;
pub mod credential;
pub mod error;
pub mod gate;
pub mod session;

pub use error::{Error, NeedLogin};

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
