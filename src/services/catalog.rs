//! Catalog service: book operations bound to a request lifecycle

use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    lifecycle::RequestContext,
    models::book::{Book, BookDraft},
    repository::Repository,
};

fn book_not_found() -> AppError {
    AppError::NotFound("book not found".to_string())
}

/// Trim and validate a client draft
fn prepare_draft(draft: BookDraft) -> AppResult<BookDraft> {
    let draft = draft.trimmed();
    draft
        .validate()
        .map_err(|_| AppError::Validation("title and author are required".to_string()))?;
    Ok(draft)
}

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
}

impl CatalogService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// List all books in id order
    pub async fn list(&self, ctx: &RequestContext) -> AppResult<Vec<Book>> {
        let books = self.repository.books.list().await?;
        ctx.deliver(books)
    }

    pub async fn get(&self, ctx: &RequestContext, id: &str) -> AppResult<Book> {
        let book = self.repository.books.get(id).await?;
        ctx.check()?;
        book.ok_or_else(book_not_found)
    }

    /// Create a book. The store keeps the record even if the request
    /// expired while it was being written.
    ///
    /// Mutations are logged as soon as the store applies them, before the
    /// lifecycle check decides what the client sees.
    pub async fn create(&self, ctx: &RequestContext, draft: BookDraft) -> AppResult<Book> {
        let draft = prepare_draft(draft)?;
        let book = self.repository.books.create(draft).await?;
        tracing::info!(id = %book.id, "Book created");
        ctx.deliver(book)
    }

    pub async fn update(&self, ctx: &RequestContext, id: &str, draft: BookDraft) -> AppResult<Book> {
        let draft = prepare_draft(draft)?;
        let book = self.repository.books.update(id, draft).await?;
        if book.is_some() {
            tracing::info!(id, "Book updated");
        }
        ctx.check()?;
        book.ok_or_else(book_not_found)
    }

    pub async fn delete(&self, ctx: &RequestContext, id: &str) -> AppResult<()> {
        let existed = self.repository.books.delete(id).await?;
        if existed {
            tracing::info!(id, "Book deleted");
        }
        ctx.check()?;
        if !existed {
            return Err(book_not_found());
        }
        Ok(())
    }
}
