use tracing::{debug, instrument, warn};

use super::now_millis;
use crate::{backend::Backend, session::Session, Error, NeedLogin};

/// Return a usable access token for `session`, refreshing it first if needed.
///
/// # Errors
/// See [`access_token_with`].
pub async fn access_token(session: &Session, backend: &Backend) -> Result<String, Error> {
    access_token_with(session, backend, |_| {}).await
}

/// Return a usable access token for `session`.
///
/// A token expiring within [`super::EXPIRY_MARGIN_MS`] is refreshed once; on
/// success the session's credential is replaced and `on_refresh` runs exactly
/// once so the caller can persist the session. A fresh token is returned as is,
/// without touching the network.
///
/// # Errors
/// - [`Error::NeedLogin`] if the session holds no credential or the backend
///   rejects the refresh token; the stored credential is left untouched.
/// - Transport errors from the refresh call.
#[instrument(skip_all)]
pub async fn access_token_with<F>(
    session: &Session,
    backend: &Backend,
    on_refresh: F,
) -> Result<String, Error>
where
    F: FnOnce(&Session),
{
    let Some(credential) = session.login_info() else {
        return Err(Error::NeedLogin(NeedLogin::NeverLoggedIn));
    };

    if !credential.expires_soon(now_millis()) {
        return Ok(credential.access_token);
    }

    debug!("access token expires at {}, refreshing", credential.expires);

    let refresh_token = credential.refresh_token;
    let outcome = backend
        .flights()
        .run(&refresh_token, || backend.refresh(&refresh_token))
        .await?;

    let msg = outcome.msg.clone();
    let Some(fresh) = outcome.into_payload() else {
        warn!("refresh rejected: {msg}");
        return Err(Error::NeedLogin(NeedLogin::RefreshFailed));
    };

    let access_token = fresh.access_token.clone();
    session.set_login_info(Some(fresh));
    on_refresh(session);

    Ok(access_token)
}
