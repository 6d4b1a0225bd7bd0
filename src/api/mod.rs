//! API handlers for Bookshelf REST endpoints

pub mod books;
pub mod health;
pub mod openapi;

use axum::{
    async_trait,
    body::to_bytes,
    extract::{FromRequest, FromRequestParts, Path, Request},
    http::{header::CONTENT_TYPE, request::Parts, Uri},
    routing::get,
    Router,
};

use crate::{error::AppError, middleware, models::book::BookDraft, AppState};

/// Largest accepted request body
pub const MAX_BODY_BYTES: usize = 1 << 20;

/// Create the application router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    let book_routes = get(books::get_book)
        .put(books::update_book)
        .delete(books::delete_book)
        .fallback(method_not_allowed);

    let routes = Router::new()
        .route("/health", get(health::health_check).fallback(method_not_allowed))
        .route(
            "/api/books",
            get(books::list_books)
                .post(books::create_book)
                .fallback(method_not_allowed),
        )
        .route("/api/books/:id", book_routes.clone())
        .route("/api/books/:id/", book_routes)
        .fallback(not_found)
        .with_state(state.clone());

    let router = routes.merge(openapi::create_openapi_router());

    middleware::apply(router, state)
}

async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}

async fn not_found(uri: Uri) -> AppError {
    if uri.path().starts_with("/api/books/") {
        AppError::NotFound("book not found".to_string())
    } else {
        AppError::NotFound("resource not found".to_string())
    }
}

/// Validate a book identifier taken from the request path
pub fn parse_book_id(raw: &str) -> Result<&str, AppError> {
    if raw.is_empty() || raw.contains('/') {
        return Err(AppError::NotFound("book not found".to_string()));
    }
    Ok(raw)
}

/// Book identifier from the `:id` path segment.
///
/// Runs before any body extractor, so a bad id is reported ahead of
/// content-type or payload errors.
pub struct BookId(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for BookId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|_| AppError::NotFound("book not found".to_string()))?;
        parse_book_id(&raw)?;
        Ok(Self(raw))
    }
}

/// JSON book payload for write requests.
///
/// Requires an `application/json` content type and caps the body at
/// [`MAX_BODY_BYTES`]. Field validation happens in the catalog service.
pub struct BookPayload(pub BookDraft);

#[async_trait]
impl<S> FromRequest<S> for BookPayload
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, _state: &S) -> Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("application/json"));

        if !is_json {
            return Err(AppError::UnsupportedMediaType(
                "content type must be application/json".to_string(),
            ));
        }

        // An over-long body is reported like a truncated, unparseable one
        let body = to_bytes(req.into_body(), MAX_BODY_BYTES)
            .await
            .map_err(|_| AppError::BadRequest("invalid JSON payload".to_string()))?;

        let draft = serde_json::from_slice(&body)
            .map_err(|_| AppError::BadRequest("invalid JSON payload".to_string()))?;

        Ok(Self(draft))
    }
}
