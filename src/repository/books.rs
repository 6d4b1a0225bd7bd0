//! In-memory book storage

use std::{
    cmp::Ordering,
    collections::HashMap,
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use async_trait::async_trait;

use super::BookRepository;
use crate::{
    error::{AppError, AppResult},
    models::book::{Book, BookDraft},
};

#[derive(Debug)]
struct BookStore {
    books: HashMap<String, Book>,
    /// Strictly greater than every numeric id ever stored
    next_id: u64,
}

/// Book store guarded by a single readers-writer lock.
///
/// Reads share the lock; create, update and delete take it exclusively, so
/// id allocation and insertion happen atomically.
#[derive(Debug, Clone)]
pub struct MemoryBookRepository {
    store: Arc<RwLock<BookStore>>,
}

impl MemoryBookRepository {
    /// Build a store from seed records, keeping their ids.
    ///
    /// Numeric seed ids advance the allocator past themselves; other ids are
    /// stored as-is. Records with an empty id are skipped.
    pub fn new(seed: Vec<Book>) -> Self {
        let mut store = BookStore {
            books: HashMap::with_capacity(seed.len()),
            next_id: 1,
        };

        for book in seed {
            if book.id.is_empty() {
                tracing::warn!(title = %book.title, "Skipping seed book without id");
                continue;
            }
            if let Ok(id) = book.id.parse::<u64>() {
                if id >= store.next_id {
                    store.next_id = id.saturating_add(1);
                }
            }
            store.books.insert(book.id.clone(), book);
        }

        Self {
            store: Arc::new(RwLock::new(store)),
        }
    }

    fn read(&self) -> AppResult<RwLockReadGuard<'_, BookStore>> {
        self.store
            .read()
            .map_err(|_| AppError::Internal("book store lock poisoned".to_string()))
    }

    fn write(&self) -> AppResult<RwLockWriteGuard<'_, BookStore>> {
        self.store
            .write()
            .map_err(|_| AppError::Internal("book store lock poisoned".to_string()))
    }
}

impl Default for MemoryBookRepository {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

/// Numeric ids in value order, then any non-numeric ids lexicographically
fn compare_ids(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

#[async_trait]
impl BookRepository for MemoryBookRepository {
    async fn list(&self) -> AppResult<Vec<Book>> {
        let store = self.read()?;
        let mut books: Vec<Book> = store.books.values().cloned().collect();
        books.sort_by(|a, b| compare_ids(&a.id, &b.id));
        Ok(books)
    }

    async fn get(&self, id: &str) -> AppResult<Option<Book>> {
        Ok(self.read()?.books.get(id).cloned())
    }

    async fn create(&self, draft: BookDraft) -> AppResult<Book> {
        let mut store = self.write()?;

        let id = store.next_id;
        store.next_id = id
            .checked_add(1)
            .ok_or_else(|| AppError::Internal("book id space exhausted".to_string()))?;

        let book = draft.into_book(id.to_string());
        store.books.insert(book.id.clone(), book.clone());
        Ok(book)
    }

    async fn update(&self, id: &str, draft: BookDraft) -> AppResult<Option<Book>> {
        let mut store = self.write()?;

        let Some(slot) = store.books.get_mut(id) else {
            return Ok(None);
        };
        *slot = draft.into_book(id.to_string());
        Ok(Some(slot.clone()))
    }

    async fn delete(&self, id: &str) -> AppResult<bool> {
        Ok(self.write()?.books.remove(id).is_some())
    }
}
