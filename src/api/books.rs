//! Book endpoints

use axum::{
    extract::State,
    http::{header::LOCATION, StatusCode},
    response::IntoResponse,
    Json,
};

use crate::{
    error::AppResult,
    lifecycle::RequestContext,
    models::book::{Book, BookDraft},
    AppState,
};

use super::{BookId, BookPayload};

/// List all books
#[utoipa::path(
    get,
    path = "/api/books",
    tag = "books",
    responses(
        (status = 200, description = "Books ordered by id", body = Vec<Book>),
        (status = 504, description = "Request timed out", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_books(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> AppResult<Json<Vec<Book>>> {
    let books = state.services.catalog.list(&ctx).await?;
    Ok(Json(books))
}

/// Get a book by ID
#[utoipa::path(
    get,
    path = "/api/books/{id}",
    tag = "books",
    params(("id" = String, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Book details", body = Book),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_book(
    State(state): State<AppState>,
    BookId(id): BookId,
    ctx: RequestContext,
) -> AppResult<Json<Book>> {
    let book = state.services.catalog.get(&ctx, &id).await?;
    Ok(Json(book))
}

/// Create a book
#[utoipa::path(
    post,
    path = "/api/books",
    tag = "books",
    request_body = BookDraft,
    responses(
        (status = 201, description = "Book created, URL in the Location header", body = Book),
        (status = 400, description = "Invalid payload", body = crate::error::ErrorResponse),
        (status = 415, description = "Content type is not JSON", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_book(
    State(state): State<AppState>,
    ctx: RequestContext,
    BookPayload(draft): BookPayload,
) -> AppResult<impl IntoResponse> {
    let book = state.services.catalog.create(&ctx, draft).await?;
    let location = format!("/api/books/{}", book.id);
    Ok((StatusCode::CREATED, [(LOCATION, location)], Json(book)))
}

/// Replace a book
#[utoipa::path(
    put,
    path = "/api/books/{id}",
    tag = "books",
    params(("id" = String, Path, description = "Book ID")),
    request_body = BookDraft,
    responses(
        (status = 200, description = "Book updated", body = Book),
        (status = 400, description = "Invalid payload", body = crate::error::ErrorResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_book(
    State(state): State<AppState>,
    BookId(id): BookId,
    ctx: RequestContext,
    BookPayload(draft): BookPayload,
) -> AppResult<Json<Book>> {
    let book = state.services.catalog.update(&ctx, &id, draft).await?;
    Ok(Json(book))
}

/// Delete a book
#[utoipa::path(
    delete,
    path = "/api/books/{id}",
    tag = "books",
    params(("id" = String, Path, description = "Book ID")),
    responses(
        (status = 204, description = "Book deleted"),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_book(
    State(state): State<AppState>,
    BookId(id): BookId,
    ctx: RequestContext,
) -> AppResult<StatusCode> {
    state.services.catalog.delete(&ctx, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
