use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, error, instrument};
use utoipa::ToSchema;

use super::{message, valid_email, Message};
use crate::{api::AppState, Error};

#[derive(ToSchema, Serialize, Deserialize)]
pub struct LoginRequest {
    /// Email address of the backend user.
    pub username: String,
    pub password: String,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

#[utoipa::path(
    post,
    path= "/api/login",
    request_body = LoginRequest,
    responses (
        (status = 200, description = "Logged in, session cookie set", body = Message, content_type = "application/json"),
        (status = 400, description = "Missing payload or malformed email", body = Message),
        (status = 401, description = "Backend rejected the credentials", body = Message),
        (status = 500, description = "Backend unreachable", body = Message),
    ),
    tag= "auth"
)]
// axum handler for login
#[instrument(skip_all)]
pub async fn login(
    headers: HeaderMap,
    Extension(state): Extension<AppState>,
    payload: Option<Json<LoginRequest>>,
) -> Response {
    let request: LoginRequest = match payload {
        Some(Json(payload)) => payload,
        None => return message(StatusCode::BAD_REQUEST, "Missing payload"),
    };

    debug!("request: {:?}", request);

    if !valid_email(&request.username) {
        return message(StatusCode::BAD_REQUEST, "Invalid email");
    }

    let session = match state.sessions.load(&headers) {
        Ok(session) => session,
        Err(err) => return Error::from(err).into_response(),
    };

    let envelope = match state
        .backend
        .login(&request.username, &request.password)
        .await
    {
        Ok(envelope) => envelope,
        Err(err) => {
            error!("Login request failed: {}", err);
            return message(StatusCode::INTERNAL_SERVER_ERROR, err.to_string());
        }
    };

    let msg = envelope.msg.clone();
    let Some(credential) = envelope.into_payload() else {
        debug!("login rejected: {msg}");
        return message(StatusCode::UNAUTHORIZED, msg);
    };

    session.set_login_info(Some(credential));
    if let Err(err) = session.save() {
        error!("Failed to save session: {}", err);
        return Error::from(err).into_response();
    }

    (session, message(StatusCode::OK, msg)).into_response()
}
