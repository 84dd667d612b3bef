use anyhow::Result;
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    routing::{get, post},
    Extension, Router,
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;
use utoipa_swagger_ui::SwaggerUi;

use crate::{backend::Backend, session::SessionOptions};

pub mod handlers;
mod openapi;

pub use openapi::openapi;

/// Shared by every handler through an `Extension` layer.
#[derive(Clone, Debug)]
pub struct AppState {
    pub backend: Backend,
    pub sessions: SessionOptions,
}

/// Build the application router.
#[must_use]
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::pages::home))
        .route("/login", get(handlers::pages::login))
        .route("/profile", get(handlers::pages::profile))
        .route("/api/login", post(handlers::login))
        .route("/api/logout", post(handlers::logout))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(state)),
        )
        .route("/health", get(handlers::health).options(handlers::health))
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, state: AppState) -> Result<()> {
    let app = router(state);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", err);
            }
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::session::SessionConfig;
    use axum::{
        body::to_bytes,
        http::{header::SET_COOKIE, Method, StatusCode},
    };
    use secrecy::SecretString;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn state() -> AppState {
        let config = SessionConfig::new(
            "_session",
            SecretString::from("0123456789abcdef0123456789abcdef"),
        )
        .unwrap();
        AppState {
            backend: Backend::new("http://127.0.0.1:1").unwrap(),
            sessions: config.into(),
        }
    }

    async fn call(request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Value) {
        let response = router(state()).oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, headers, json)
    }

    #[tokio::test]
    async fn request_id_is_propagated() {
        let request = Request::builder()
            .uri("/login")
            .body(Body::empty())
            .unwrap();
        let (status, headers, _) = call(request).await;
        assert_eq!(status, StatusCode::OK);
        let id = headers.get("x-request-id").unwrap().to_str().unwrap();
        assert!(Ulid::from_string(id).is_ok());

        let request = Request::builder()
            .uri("/login")
            .header("x-request-id", "given")
            .body(Body::empty())
            .unwrap();
        let (_, headers, _) = call(request).await;
        assert_eq!(headers.get("x-request-id").unwrap(), "given");
    }

    #[tokio::test]
    async fn login_page_echoes_redirect() {
        let request = Request::builder()
            .uri("/login?redirect=%2Fprofile")
            .body(Body::empty())
            .unwrap();
        let (status, _, json) = call(request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, json!({"redirect": "/profile"}));

        let request = Request::builder()
            .uri("/login")
            .body(Body::empty())
            .unwrap();
        let (_, _, json) = call(request).await;
        assert_eq!(json, json!({"redirect": null}));
    }

    #[tokio::test]
    async fn anonymous_home() {
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let (status, headers, json) = call(request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, json!({"isLogin": false}));
        assert!(headers.get(SET_COOKIE).is_none());
    }

    #[tokio::test]
    async fn anonymous_profile_redirects() {
        let request = Request::builder()
            .uri("/profile")
            .body(Body::empty())
            .unwrap();
        let response = router(state()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(
            response.headers().get("location").unwrap(),
            "/login?redirect=%2Fprofile"
        );
    }

    #[tokio::test]
    async fn login_rejects_malformed_email() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/login")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"username":"ada","password":"pw"}"#))
            .unwrap();
        let (status, headers, json) = call(request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json, json!({"message": "Invalid email"}));
        assert!(headers.get(SET_COOKIE).is_none());
    }

    #[tokio::test]
    async fn login_without_payload() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/login")
            .body(Body::empty())
            .unwrap();
        let (status, _, json) = call(request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json, json!({"message": "Missing payload"}));
    }

    #[tokio::test]
    async fn login_with_unreachable_backend() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/login")
            .header("content-type", "application/json")
            .body(Body::from(
                r#"{"username":"ada@example.com","password":"pw"}"#,
            ))
            .unwrap();
        let (status, headers, json) = call(request).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(json["message"].is_string());
        assert!(headers.get(SET_COOKIE).is_none());
    }

    #[tokio::test]
    async fn logout_clears_cookie() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/logout")
            .body(Body::empty())
            .unwrap();
        let (status, headers, json) = call(request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, json!({}));
        let cookie = headers.get(SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cookie.starts_with("_session=;"));
        assert!(cookie.contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn health_is_outside_state_layers() {
        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let (status, headers, json) = call(request).await;
        assert_eq!(status, StatusCode::OK);
        assert!(headers.contains_key("X-App"));
        assert_eq!(json["name"], env!("CARGO_PKG_NAME"));
    }

    #[tokio::test]
    async fn serves_openapi_document() {
        let request = Request::builder()
            .uri("/api-docs/openapi.json")
            .body(Body::empty())
            .unwrap();
        let (status, _, json) = call(request).await;
        assert_eq!(status, StatusCode::OK);
        assert!(json["paths"]["/api/login"].is_object());
    }
}
