//! HTTP transport to the content backend.
//!
//! Every call resolves its Authorization the same way and every answer comes back
//! as an [`Envelope`]. A non-2xx status is a value (`ok == false`), never an error;
//! only network or decoding failures surface as [`Error::Http`].

mod assets;
mod auth;
mod envelope;
mod users;

pub use self::assets::file_link;
pub use self::auth::{TokenGrant, LOGIN_PATH, REFRESH_PATH};
pub use self::envelope::Envelope;
pub use self::users::{UserInfo, CURRENT_USER_PATH};

use reqwest::{Client, RequestBuilder};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument};
use url::Url;

use self::envelope::DataBody;
use crate::{
    credential::{self, RefreshFlights},
    session::Session,
    Error,
};

pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8055";

/// Where the bearer token of a call comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TokenSource {
    /// Ask the access token lifecycle, if a session is supplied.
    #[default]
    Resolve,
    /// Use this value as is, `None` included; no lookup happens.
    Given(Option<String>),
}

#[derive(Debug, Clone, Default)]
pub struct TransportOptions<'a> {
    pub no_authorization_header: bool,
    pub access_token: TokenSource,
    /// Query parameters, repeated keys allowed.
    pub params: Vec<(String, String)>,
    pub session: Option<&'a Session>,
}

impl<'a> TransportOptions<'a> {
    /// Authorize with the session's (possibly refreshed) access token.
    #[must_use]
    pub fn with_session(session: &'a Session) -> Self {
        Self {
            session: Some(session),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            access_token: TokenSource::Given(Some(token.into())),
            ..Self::default()
        }
    }

    /// No Authorization header and no token lookup.
    #[must_use]
    pub fn anonymous() -> Self {
        Self {
            no_authorization_header: true,
            access_token: TokenSource::Given(None),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }
}

/// Client for one backend origin. Cheap to clone.
#[derive(Clone)]
pub struct Backend {
    client: Client,
    host: String,
    flights: Arc<RefreshFlights>,
}

impl Backend {
    /// # Errors
    /// Returns an error if `host` is not an absolute URL or the HTTP client cannot
    /// be built.
    pub fn new(host: &str) -> Result<Self, Error> {
        let parsed = Url::parse(host)?;
        if parsed.cannot_be_a_base() {
            return Err(Error::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase));
        }

        let client = Client::builder().user_agent(crate::APP_USER_AGENT).build()?;

        Ok(Self {
            client,
            host: host.trim_end_matches('/').to_string(),
            flights: Arc::new(RefreshFlights::new()),
        })
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    pub(crate) fn flights(&self) -> &RefreshFlights {
        &self.flights
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.host)
    }

    /// POST a JSON body.
    ///
    /// # Errors
    /// Returns [`Error::MissingAccessToken`] when a header is required but no token
    /// is available, [`Error::NeedLogin`] when token resolution needs a login, and
    /// [`Error::Http`] on network or decoding failures.
    #[instrument(skip(self, body, options))]
    pub async fn post<T, B>(
        &self,
        path: &str,
        body: &B,
        options: TransportOptions<'_>,
    ) -> Result<Envelope<T>, Error>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        debug!("POST {path}");
        let token = self.resolve_token(&options).await?;
        let request = self.client.post(self.url(path)).json(body);
        self.dispatch(request, &options, token).await
    }

    /// GET a JSON resource.
    ///
    /// # Errors
    /// Same as [`Backend::post`].
    #[instrument(skip(self, options))]
    pub async fn get<T>(&self, path: &str, options: TransportOptions<'_>) -> Result<Envelope<T>, Error>
    where
        T: DeserializeOwned,
    {
        debug!("GET {path}");
        let token = self.resolve_token(&options).await?;
        let request = self.client.get(self.url(path));
        self.dispatch(request, &options, token).await
    }

    /// POST without any token handling. Login and refresh go through here so the
    /// token lifecycle never calls back into itself.
    pub(crate) async fn post_anonymous<T, B>(&self, path: &str, body: &B) -> Result<Envelope<T>, Error>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        debug!("POST {path}");
        let request = self.client.post(self.url(path)).json(body);
        self.dispatch(request, &TransportOptions::anonymous(), None)
            .await
    }

    async fn resolve_token(&self, options: &TransportOptions<'_>) -> Result<Option<String>, Error> {
        match (&options.access_token, options.session) {
            (TokenSource::Given(token), _) => Ok(token.clone()),
            (TokenSource::Resolve, Some(session)) => {
                credential::access_token(session, self).await.map(Some)
            }
            (TokenSource::Resolve, None) => Ok(None),
        }
    }

    async fn dispatch<T>(
        &self,
        mut request: RequestBuilder,
        options: &TransportOptions<'_>,
        token: Option<String>,
    ) -> Result<Envelope<T>, Error>
    where
        T: DeserializeOwned,
    {
        if !options.params.is_empty() {
            request = request.query(&options.params);
        }

        if !options.no_authorization_header {
            let token = token
                .filter(|token| !token.is_empty())
                .ok_or(Error::MissingAccessToken)?;
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            debug!("backend answered {status}");
            return Ok(Envelope::failure(status));
        }

        let body: DataBody<T> = response.json().await?;
        Ok(Envelope::success(status, body.data))
    }
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend")
            .field("host", &self.host)
            .finish_non_exhaustive()
    }
}
