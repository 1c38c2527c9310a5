//! HTTP surface.
//!
//! A thin axum layer over [`Linksy`]: handlers authenticate, throttle and
//! translate JSON, the facade does the work. Every failure leaves as
//! `{error, code}` with a status derived from the error kind.

pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use tower_http::trace::TraceLayer;

use crate::error::{Error, JsonError};
use crate::service::Linksy;

pub type AppState = Arc<Linksy>;

/// Error wrapper that renders as a JSON response.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

pub fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::InvalidArgument(_) | Error::InvalidConfig(_) | Error::ReferenceViolation(_) => {
            StatusCode::BAD_REQUEST
        }
        Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::QuotaExceeded { .. } => StatusCode::FORBIDDEN,
        Error::SlugTaken(_) => StatusCode::CONFLICT,
        Error::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        Error::Io(_)
        | Error::Json(_)
        | Error::TomlParse(_)
        | Error::TomlSerialize(_)
        | Error::LockFailed(_)
        | Error::OperationFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let status = status_for(&err);
        if err.is_internal() {
            tracing::error!(error = %err, "request failed");
        } else {
            tracing::debug!(error = %err, status = status.as_u16(), "request rejected");
        }

        let mut response = (status, Json(JsonError::from(&err))).into_response();
        if let Error::RateLimited { retry_after_secs } = err {
            if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        // Owner API
        .route("/api/links", get(routes::list_links).post(routes::create_link))
        .route(
            "/api/links/:id",
            get(routes::get_link)
                .patch(routes::update_link)
                .delete(routes::delete_link),
        )
        .route("/api/links/:id/tasks", post(routes::add_task))
        .route(
            "/api/links/:id/tasks/:task_id",
            patch(routes::update_task).delete(routes::delete_task),
        )
        .route("/api/analytics/:link_id", get(routes::analytics))
        // Public flow
        .route("/api/links/slug/:slug", get(routes::public_link))
        .route("/l/:slug", get(routes::landing))
        .route("/api/visits", post(routes::record_visit))
        .route("/api/claims", post(routes::claim))
        .route("/api/verify/:task_id", post(routes::verify))
        .route("/api/open/:task_id", post(routes::open_task))
        .route("/api/webhooks/social-callback", post(routes::social_callback))
        .route("/api/gate/:visit_id", get(routes::gate))
        // Administration
        .route("/api/admin/completions/:id", patch(routes::review_completion))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until Ctrl-C.
pub async fn serve(app: Linksy, addr: SocketAddr) -> anyhow::Result<()> {
    let state: AppState = Arc::new(app);
    let router = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "linksy listening");

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("linksy stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
