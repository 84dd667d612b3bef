//! Data for the server-rendered pages.

use axum::{
    extract::{Extension, Query},
    http::{HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::message;
use crate::{
    api::AppState,
    backend::{Backend, UserInfo},
    credential,
    gate::{self, PageContext},
    Error,
};

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HomeProps {
    pub is_login: bool,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub signed_in: Option<SignedIn>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SignedIn {
    pub user_info: Option<UserInfo>,
    pub access_token: String,
}

impl HomeProps {
    const fn anonymous() -> Self {
        Self {
            is_login: false,
            signed_in: None,
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProfileProps {
    pub user_info: UserInfo,
    pub access_token: String,
    pub avatar_url: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Default)]
pub struct LoginQuery {
    pub redirect: Option<String>,
}

/// Home page. Not gated: without a usable login it simply renders anonymously.
pub async fn home(headers: HeaderMap, Extension(state): Extension<AppState>) -> Response {
    let session = match state.sessions.load(&headers) {
        Ok(session) => session,
        Err(err) => {
            warn!("Failed to load session: {}", err);
            return Json(HomeProps::anonymous()).into_response();
        }
    };

    let access_token =
        match credential::access_token_with(&session, &state.backend, gate::save_refreshed).await {
            Ok(access_token) => access_token,
            Err(err) => {
                debug!("rendering home anonymously: {err}");
                return Json(HomeProps::anonymous()).into_response();
            }
        };

    let user_info = match state.backend.current_user(&session).await {
        Ok(envelope) => envelope.into_payload(),
        Err(err) => {
            warn!("Failed to fetch current user: {}", err);
            None
        }
    };

    let props = HomeProps {
        is_login: true,
        signed_in: Some(SignedIn {
            user_info,
            access_token,
        }),
    };

    (session, Json(props)).into_response()
}

pub async fn login(Query(query): Query<LoginQuery>) -> Json<LoginQuery> {
    Json(query)
}

/// Profile page, only for signed-in users.
///
/// # Errors
/// Session configuration or transport failures.
pub async fn profile(
    headers: HeaderMap,
    uri: Uri,
    Extension(state): Extension<AppState>,
) -> Result<Response, Error> {
    let backend = state.backend.clone();
    gate::protect(&headers, &uri, &state.backend, &state.sessions, |context| {
        load_profile(backend, context)
    })
    .await
}

async fn load_profile(backend: Backend, context: PageContext) -> Result<Response, Error> {
    let envelope = backend.current_user(&context.session).await?;

    let msg = envelope.msg.clone();
    let Some(user_info) = envelope.into_payload() else {
        warn!("Failed to fetch current user: {msg}");
        return Ok(message(StatusCode::BAD_GATEWAY, msg));
    };

    let avatar_url = user_info
        .avatar
        .as_deref()
        .map(|file_id| backend.file_link(file_id, Some(&context.access_token)));

    Ok(Json(ProfileProps {
        user_info,
        access_token: context.access_token,
        avatar_url,
    })
    .into_response())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn anonymous_home_is_minimal() {
        assert_eq!(
            serde_json::to_value(HomeProps::anonymous()).unwrap(),
            json!({"isLogin": false})
        );
    }

    #[test]
    fn signed_in_home_uses_camel_case() {
        let props = HomeProps {
            is_login: true,
            signed_in: Some(SignedIn {
                user_info: None,
                access_token: "A".to_string(),
            }),
        };
        assert_eq!(
            serde_json::to_value(props).unwrap(),
            json!({"isLogin": true, "userInfo": null, "accessToken": "A"})
        );
    }
}
