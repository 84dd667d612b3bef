use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;
use thiserror::Error;

use crate::session::SessionError;

/// Why a request can only continue after a fresh interactive login.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NeedLogin {
    /// The session never held a credential.
    NeverLoggedIn,
    /// The backend rejected the stored refresh token.
    RefreshFailed,
}

impl fmt::Display for NeedLogin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NeverLoggedIn => write!(f, "never logged in"),
            Self::RefreshFailed => write!(f, "refresh failure"),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("login required: {0}")]
    NeedLogin(NeedLogin),

    /// An Authorization header was required but the caller supplied no token.
    #[error("missing access token")]
    MissingAccessToken,

    #[error("backend request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid backend url: {0}")]
    Url(#[from] url::ParseError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl Error {
    #[must_use]
    pub const fn need_login(&self) -> Option<NeedLogin> {
        match self {
            Self::NeedLogin(reason) => Some(*reason),
            _ => None,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match self {
            Self::NeedLogin(_) => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "message": self.to_string() }))).into_response()
    }
}
