use serde::{Deserialize, Serialize};
use tracing::instrument;
use utoipa::ToSchema;

use super::{Backend, Envelope, TransportOptions};
use crate::{session::Session, Error};

pub const CURRENT_USER_PATH: &str = "/users/me";

const USER_FIELDS: [&str; 3] = ["first_name", "last_name", "avatar"];

/// Profile fields shown on pages. `avatar` is a file id, see [`super::file_link`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UserInfo {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar: Option<String>,
}

impl Backend {
    /// Fetch the signed-in user's profile.
    ///
    /// # Errors
    /// [`Error::NeedLogin`] when the session has no usable credential, otherwise
    /// transport failures only.
    #[instrument(skip_all)]
    pub async fn current_user(&self, session: &Session) -> Result<Envelope<UserInfo>, Error> {
        let options = USER_FIELDS
            .iter()
            .fold(TransportOptions::with_session(session), |options, field| {
                options.param("fields[]", *field)
            });
        self.get(CURRENT_USER_PATH, options).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{
        credential::{now_millis, Credential},
        session::SessionConfig,
    };
    use axum::http::HeaderMap;
    use secrecy::SecretString;
    use serde_json::json;
    use std::net::TcpListener;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn can_bind_localhost() -> bool {
        TcpListener::bind("127.0.0.1:0").is_ok()
    }

    #[tokio::test]
    async fn current_user_requests_profile_fields() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(CURRENT_USER_PATH))
            .and(header("Authorization", "Bearer A"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"first_name": "Ada", "last_name": "Lovelace", "avatar": null}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let config = SessionConfig::new(
            "_session",
            SecretString::from("0123456789abcdef0123456789abcdef"),
        )
        .unwrap();
        let session = Session::load(&HeaderMap::new(), config);
        session.set_login_info(Some(Credential {
            access_token: "A".to_string(),
            refresh_token: "R".to_string(),
            expires: now_millis() + 600_000,
        }));

        let backend = Backend::new(&server.uri()).unwrap();
        let envelope = backend.current_user(&session).await.unwrap();

        assert!(envelope.ok);
        assert_eq!(
            envelope.payload(),
            Some(&UserInfo {
                first_name: Some("Ada".to_string()),
                last_name: Some("Lovelace".to_string()),
                avatar: None,
            })
        );

        let requests = server.received_requests().await.unwrap_or_default();
        let query = requests
            .first()
            .and_then(|request| request.url.query().map(str::to_string))
            .unwrap_or_default();
        for field in USER_FIELDS {
            assert!(query.contains(field), "missing {field} in {query}");
        }
    }
}
