//! Repository layer for book storage

pub mod books;

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    error::AppResult,
    models::book::{Book, BookDraft},
};

pub use books::MemoryBookRepository;

/// Storage contract for book records.
///
/// Every method returns `AppResult` so that fallible backends fit behind the
/// same interface; the in-memory backend only fails on a poisoned lock.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BookRepository: Send + Sync {
    /// All books, ordered by ascending numeric id
    async fn list(&self) -> AppResult<Vec<Book>>;

    async fn get(&self, id: &str) -> AppResult<Option<Book>>;

    /// Store a draft under a freshly allocated id
    async fn create(&self, draft: BookDraft) -> AppResult<Book>;

    /// Replace every field but the id; `None` when the id is unknown
    async fn update(&self, id: &str, draft: BookDraft) -> AppResult<Option<Book>>;

    /// Remove a book, reporting whether it existed
    async fn delete(&self, id: &str) -> AppResult<bool>;
}

/// Main repository struct holding the storage backends
#[derive(Clone)]
pub struct Repository {
    pub books: Arc<dyn BookRepository>,
}

impl Repository {
    pub fn new(books: Arc<dyn BookRepository>) -> Self {
        Self { books }
    }

    /// Create a memory-resident repository seeded with the given books
    pub fn in_memory(seed: Vec<Book>) -> Self {
        Self::new(Arc::new(MemoryBookRepository::new(seed)))
    }
}
