use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::{Backend, Envelope};
use crate::{
    credential::{expires_at, Credential},
    Error,
};

pub const LOGIN_PATH: &str = "/auth/login";
pub const REFRESH_PATH: &str = "/auth/refresh";

/// Token pair as issued by the backend. `expires` is a lifetime in milliseconds.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: String,
    pub expires: i64,
}

impl TokenGrant {
    /// Pin the lifetime to an absolute expiry, measured from now.
    #[must_use]
    pub fn into_credential(self) -> Credential {
        Credential {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires: expires_at(self.expires),
        }
    }
}

#[derive(Serialize)]
struct LoginBody<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RefreshBody<'a> {
    refresh_token: &'a str,
    mode: &'static str,
}

impl Backend {
    /// Exchange credentials for a token pair.
    ///
    /// # Errors
    /// Only transport failures; a rejected login is an envelope with `ok == false`.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<Envelope<Credential>, Error> {
        let grant: Envelope<TokenGrant> = self
            .post_anonymous(LOGIN_PATH, &LoginBody { email, password })
            .await?;
        Ok(grant.map(TokenGrant::into_credential))
    }

    /// Exchange a refresh token for a new pair. The old refresh token is spent.
    ///
    /// # Errors
    /// Only transport failures; a rejected refresh is an envelope with `ok == false`.
    #[instrument(skip_all)]
    pub async fn refresh(&self, refresh_token: &str) -> Result<Envelope<Credential>, Error> {
        let grant: Envelope<TokenGrant> = self
            .post_anonymous(
                REFRESH_PATH,
                &RefreshBody {
                    refresh_token,
                    mode: "json",
                },
            )
            .await?;
        Ok(grant.map(TokenGrant::into_credential))
    }
}
