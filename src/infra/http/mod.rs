mod catalog;
mod images;
mod middleware;
mod multipart;

use std::sync::Arc;

use axum::{
    Router,
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    middleware as axum_middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use sqlx::Error as SqlxError;

use crate::{
    application::{
        books::BookService,
        error::{ErrorReport, HttpError},
        games::GameService,
        images::AssetResolver,
    },
    infra::db::PostgresRepositories,
};

use self::middleware::{log_responses, set_request_context};

#[derive(Clone)]
pub struct HttpState {
    pub resolver: AssetResolver,
    pub books: Arc<BookService>,
    pub games: Arc<GameService>,
    pub db: Arc<PostgresRepositories>,
    /// Maximum multipart body size in bytes.
    pub upload_limit: u64,
}

pub fn build_router(state: HttpState) -> Router {
    let body_limit = usize::try_from(state.upload_limit).unwrap_or(usize::MAX);

    let catalog_routes = Router::new()
        .route("/books", post(catalog::create_book))
        .route(
            "/books/{id}",
            get(catalog::show_book)
                .put(catalog::update_book)
                .delete(catalog::delete_book),
        )
        .route("/games", post(catalog::create_game))
        .route(
            "/games/{id}",
            get(catalog::show_game)
                .put(catalog::update_game)
                .delete(catalog::delete_game),
        )
        .layer(DefaultBodyLimit::max(body_limit));

    Router::new()
        .route("/images/{namespace}/{filename}", get(images::serve_image))
        .route("/_health/db", get(db_health))
        .merge(catalog_routes)
        .fallback(not_found)
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}

/// Shared 404 used by the fallback and by handlers that delegate to it.
pub(crate) async fn not_found() -> Response {
    HttpError::new(
        "infra::http::not_found",
        StatusCode::NOT_FOUND,
        "Not found",
        "no route or asset matched the request",
    )
    .into_response()
}

async fn db_health(State(state): State<HttpState>) -> Response {
    db_health_response(state.db.health_check().await)
}

fn db_health_response(result: Result<(), SqlxError>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::db_health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_health_check_reports_unavailable() {
        let response = db_health_response(Err(SqlxError::PoolTimedOut));
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let report = response.extensions().get::<ErrorReport>().expect("report");
        assert_eq!(report.source, "infra::http::db_health");
    }

    #[test]
    fn healthy_database_returns_no_content() {
        assert_eq!(db_health_response(Ok(())).status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn not_found_attaches_report() {
        let response = not_found().await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.extensions().get::<ErrorReport>().is_some());
    }
}
