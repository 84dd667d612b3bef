#![allow(clippy::needless_for_each)]

use utoipa::OpenApi;

use super::handlers::{health, login, logout, Message};

#[derive(OpenApi)]
#[openapi(
    paths(health::health, login::login, logout::logout),
    components(
        schemas(health::Health, login::LoginRequest, Message)
    ),
    tags(
        (name = "atrium", description = "Session-backed portal for a headless content backend"),
        (name = "auth", description = "Login and logout"),
        (name = "health", description = "Liveness"),
    )
)]
struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}
