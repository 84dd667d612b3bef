//! Guard for pages that need a signed-in user.
//!
//! [`protect`] loads the session, makes sure it holds a usable access token and
//! only then runs the page loader. Anyone who has to log in again is redirected to
//! `/login?redirect=<original path>`.

use axum::{
    http::{HeaderMap, Uri},
    response::{IntoResponse, Redirect, Response},
};
use std::future::Future;
use tracing::{debug, warn};
use url::form_urlencoded;

use crate::{
    backend::Backend,
    credential,
    session::{Session, SessionOptions},
    Error,
};

pub const LOGIN_PAGE: &str = "/login";

/// What a protected page loader gets to work with.
#[derive(Debug, Clone)]
pub struct PageContext {
    /// Live handle; a `save()` here reaches the response.
    pub session: Session,
    /// Valid for at least the refresh margin.
    pub access_token: String,
    pub uri: Uri,
    pub headers: HeaderMap,
}

/// Run `loader` only if the request's session holds a usable access token.
///
/// A token close to expiry is refreshed first and the refreshed session saved; the
/// resulting `Set-Cookie` is attached to whatever the loader returns.
///
/// # Errors
/// Session configuration failures and transport errors. A missing or rejected
/// login is not an error: it becomes a redirect to the login page.
pub async fn protect<L, Fut, R>(
    headers: &HeaderMap,
    uri: &Uri,
    backend: &Backend,
    options: &SessionOptions,
    loader: L,
) -> Result<Response, Error>
where
    L: FnOnce(PageContext) -> Fut,
    Fut: Future<Output = R>,
    R: IntoResponse,
{
    let session = options.load(headers)?;

    let token = credential::access_token_with(&session, backend, save_refreshed).await;

    let access_token = match token {
        Ok(access_token) => access_token,
        Err(Error::NeedLogin(reason)) => {
            debug!("login required ({reason}), redirecting");
            return Ok(redirect_to_login(uri).into_response());
        }
        Err(err) => return Err(err),
    };

    let context = PageContext {
        session: session.clone(),
        access_token,
        uri: uri.clone(),
        headers: headers.clone(),
    };

    let response = loader(context).await;

    Ok((session, response).into_response())
}

/// Refresh hook persisting the new credential. Failures are logged, not returned.
pub fn save_refreshed(session: &Session) {
    if let Err(err) = session.save() {
        warn!("Failed to save refreshed session: {err}");
    }
}

/// `307` to the login page, remembering where the user wanted to go.
#[must_use]
pub fn redirect_to_login(uri: &Uri) -> Redirect {
    let target = uri
        .path_and_query()
        .map_or_else(|| uri.path(), |path_and_query| path_and_query.as_str());
    let encoded: String = form_urlencoded::byte_serialize(target.as_bytes()).collect();
    Redirect::temporary(&format!("{LOGIN_PAGE}?redirect={encoded}"))
}
