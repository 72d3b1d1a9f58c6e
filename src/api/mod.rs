use crate::{
    api::handlers::{auth as auth_handlers, health},
    auth::{middleware, Argon2Verifier, AuthConfig, Authenticator},
    store::{PgAccountStore, PgSessionStore},
};
use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    middleware::{from_fn, from_fn_with_state},
    routing::get,
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{error, info, info_span, Span};
use ulid::Ulid;
use utoipa_swagger_ui::SwaggerUi;

pub mod error;
pub mod handlers;
mod openapi;

pub use openapi::{openapi, ApiDoc};

/// Build the application router around an [`Authenticator`].
///
/// `/api/1/auth/user` runs the full chain including Basic login;
/// `/api/1/auth` only accepts an existing session.
pub fn router(auth: Arc<Authenticator>) -> Router {
    let login_routes = Router::new()
        .route("/auth/user", get(auth_handlers::current_user))
        .route_layer(
            ServiceBuilder::new()
                .layer(from_fn_with_state(auth.clone(), middleware::require_api_key))
                .layer(from_fn_with_state(auth.clone(), middleware::login))
                .layer(from_fn_with_state(auth.clone(), middleware::require_session))
                .layer(from_fn(middleware::require_second_factor)),
        );

    let session_routes = Router::new()
        .route("/auth", get(auth_handlers::session_token))
        .route_layer(
            ServiceBuilder::new()
                .layer(from_fn_with_state(auth.clone(), middleware::require_api_key))
                .layer(from_fn_with_state(auth.clone(), middleware::require_session))
                .layer(from_fn(middleware::require_second_factor)),
        );

    Router::new()
        .nest("/api/1", login_routes.merge(session_routes))
        .route("/health", get(health::health))
        .with_state(auth)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi()))
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, dsn: String, auth_config: AuthConfig) -> Result<()> {
    // Connect to database
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&dsn)
        .await
        .context("Failed to connect to database")?;

    let auth = Arc::new(Authenticator::new(
        auth_config,
        Arc::new(PgAccountStore::new(pool.clone())),
        Arc::new(PgSessionStore::new(pool)),
        Arc::new(Argon2Verifier),
    ));

    let app = router(auth).layer(
        ServiceBuilder::new()
            .layer(SetRequestHeaderLayer::if_not_present(
                HeaderName::from_static("x-request-id"),
                |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
            ))
            .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                "x-request-id",
            )))
            .layer(TraceLayer::new_for_http().make_span_with(make_span)),
    );

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {err}");
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

