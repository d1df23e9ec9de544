use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Request},
    http::{header, HeaderValue, Method},
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, patch, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

pub mod config;
pub mod errors;
pub mod extractors;
pub mod handlers;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod services;
pub mod utils;

pub use config::Config;
pub use services::AppState;

use config::UploadBackend;

/// Multipart framing on top of the image itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Adds Content-Security-Policy and nosniff headers to all responses
async fn csp_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    response.headers_mut().insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    response.headers_mut().insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static(
            "default-src 'self'; \
             img-src 'self' data: https:; \
             connect-src 'self'; \
             frame-ancestors 'none'",
        ),
    );
    response
}

pub fn create_router(app_state: Arc<AppState>) -> Router {
    let mut router = Router::new()
        .route("/health", get(handlers::health_check))
        // Metrics endpoint with Basic Auth protection
        .route(
            "/metrics",
            get(handlers::metrics_handler)
                .layer(middleware::from_fn(handlers::metrics_auth_middleware)),
        )
        .nest("/api/auth", auth_routes(app_state.clone()))
        .nest("/api/forms", form_routes(app_state.clone()))
        .nest("/api/public", public_routes())
        .nest("/api/upload", upload_routes(app_state.clone()));

    // Local uploads are served straight from disk
    if app_state.config.upload.backend == UploadBackend::Local {
        router = router.nest_service(
            &app_state.config.upload.public_path,
            ServeDir::new(&app_state.config.upload.dir),
        );
    }

    let cors = cors_layer(app_state.config.cors_origin.as_deref());

    router
        .with_state(app_state)
        .layer(middleware::from_fn(csp_middleware))
        .layer(middleware::from_fn(
            middlewares::metrics::metrics_middleware,
        ))
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(
            middlewares::trace::trace_context_middleware,
        ))
}

fn cors_layer(origin: Option<&str>) -> CorsLayer {
    let allow_origin = match origin.map(HeaderValue::from_str) {
        Some(Ok(origin)) => AllowOrigin::exact(origin),
        Some(Err(_)) => {
            tracing::warn!("CORS_ORIGIN is not a valid header value, allowing any origin");
            AllowOrigin::from(Any)
        }
        None => AllowOrigin::from(Any),
    };

    CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_origin(allow_origin)
}

fn auth_routes(app_state: Arc<AppState>) -> Router<Arc<AppState>> {
    let public_routes = Router::new()
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login));

    let protected_routes = Router::new()
        .route("/me", get(handlers::auth::me))
        .route_layer(middleware::from_fn_with_state(
            app_state,
            middlewares::auth::auth_middleware,
        ));

    public_routes.merge(protected_routes)
}

fn form_routes(app_state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/",
            get(handlers::forms::list_forms).post(handlers::forms::create_form),
        )
        .route(
            "/{id}",
            get(handlers::forms::get_form)
                .put(handlers::forms::update_form)
                .delete(handlers::forms::delete_form),
        )
        .route("/{id}/publish", patch(handlers::forms::set_published))
        .route(
            "/{id}/submissions",
            get(handlers::submissions::list_submissions),
        )
        .route(
            "/{id}/submissions/{submission_id}",
            get(handlers::submissions::get_submission)
                .delete(handlers::submissions::delete_submission),
        )
        .route_layer(middleware::from_fn_with_state(
            app_state,
            middlewares::auth::auth_middleware,
        ))
}

fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/forms/{public_id}", get(handlers::public::get_public_form))
        .route(
            "/forms/{public_id}/submit",
            post(handlers::public::submit_form),
        )
}

fn upload_routes(app_state: Arc<AppState>) -> Router<Arc<AppState>> {
    let body_limit = app_state.config.upload.max_bytes + MULTIPART_OVERHEAD_BYTES;

    Router::new()
        .route("/image", post(handlers::upload::upload_image))
        .route("/image/{filename}", delete(handlers::upload::delete_image))
        .layer(DefaultBodyLimit::max(body_limit))
        .route_layer(middleware::from_fn_with_state(
            app_state,
            middlewares::auth::auth_middleware,
        ))
}
