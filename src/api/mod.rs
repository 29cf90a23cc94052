use crate::api::handlers::{
    health,
    pin::{PinConfig, PinState, RateLimiter, SessionStore, SlidingWindowLimiter},
};
use anyhow::{Context, Result, anyhow};
use axum::{
    Extension,
    body::Body,
    extract::MatchedPath,
    http::{
        HeaderName, HeaderValue, Method, Request,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::{get, options},
};
use secrecy::SecretString;
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{Span, info, info_span};
use ulid::Ulid;
use url::Url;
use utoipa_axum::router::OpenApiRouter;
use utoipa_swagger_ui::SwaggerUi;

pub(crate) mod handlers;
// OpenAPI router wiring and route registration live in openapi.rs.
mod openapi;

pub use openapi::openapi;

/// Build the API router with all documented routes registered.
#[must_use]
pub fn router() -> OpenApiRouter {
    openapi::api_router()
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(
    port: u16,
    dsn: String,
    pin_config: PinConfig,
    pepper: SecretString,
    admin_key: SecretString,
) -> Result<()> {
    // Connect to database
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&dsn)
        .await
        .context("Failed to connect to database")?;

    // Session store and rate limiter are owned here and injected, so the
    // handlers never reach for process-wide state.
    let sessions = Arc::new(SessionStore::new(pin_config.session_ttl()));
    let rate_limiter: Arc<dyn RateLimiter> = Arc::new(SlidingWindowLimiter::new(
        pin_config.verify_window(),
        pin_config.verify_window_max_attempts(),
    ));
    let reap_interval = pin_config.session_reap_interval();
    let pin_state = Arc::new(PinState::new(
        pin_config,
        Arc::clone(&sessions),
        rate_limiter,
        pepper,
        admin_key,
    ));

    // Expired sessions are refused on access; the reaper only reclaims memory.
    let _reaper = SessionStore::spawn_reaper(Arc::clone(&sessions), reap_interval);

    let kiosk_origin = kiosk_origin(pin_state.config().kiosk_base_url())?;
    let cors = CorsLayer::new()
        .allow_headers([
            CONTENT_TYPE,
            AUTHORIZATION,
            HeaderName::from_static("x-custode-admin-key"),
        ])
        .allow_methods([Method::GET, Method::POST])
        .allow_origin(AllowOrigin::exact(kiosk_origin))
        .allow_credentials(true);

    // Build the router from OpenAPI-wired routes, then extend it with non-doc routes like `/` and
    // preflight-only `OPTIONS /health`. The spec stays in openapi.rs for the `openapi` binary.
    let (router, api_doc) = router().split_for_parts();
    let app = router
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", api_doc))
        .route(
            "/",
            get(|| async { concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION")) }),
        )
        .route("/health", options(health::health))
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
                .layer(cors)
                .layer(Extension(pin_state.clone()))
                .layer(Extension(pool.clone())),
        );

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
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

fn kiosk_origin(kiosk_base_url: &str) -> Result<HeaderValue> {
    let parsed = Url::parse(kiosk_base_url)
        .with_context(|| format!("Invalid kiosk base URL: {kiosk_base_url}"))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| anyhow!("Kiosk base URL must include a valid host: {kiosk_base_url}"))?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    let origin = format!("{}://{}{}", parsed.scheme(), host, port);
    HeaderValue::from_str(&origin).context("Failed to build kiosk origin header")
}

#[cfg(test)]
mod tests {
    use super::kiosk_origin;

    #[test]
    fn kiosk_origin_strips_path_and_keeps_port() -> anyhow::Result<()> {
        let origin = kiosk_origin("https://kiosk.custode.dev/app/")?;
        assert_eq!(origin.to_str()?, "https://kiosk.custode.dev");

        let origin = kiosk_origin("http://localhost:5173")?;
        assert_eq!(origin.to_str()?, "http://localhost:5173");
        Ok(())
    }

    #[test]
    fn kiosk_origin_rejects_garbage() {
        assert!(kiosk_origin("not a url").is_err());
    }
}
