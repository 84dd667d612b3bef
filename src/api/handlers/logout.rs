use axum::{
    extract::Extension,
    http::HeaderMap,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;

use crate::{api::AppState, Error};

#[utoipa::path(
    post,
    path= "/api/logout",
    responses (
        (status = 200, description = "Session destroyed, cookie removed"),
    ),
    tag= "auth"
)]
// axum handler for logout
pub async fn logout(headers: HeaderMap, Extension(state): Extension<AppState>) -> Response {
    match state.sessions.load(&headers) {
        Ok(session) => {
            session.destroy();
            (session, Json(json!({}))).into_response()
        }
        Err(err) => Error::from(err).into_response(),
    }
}
