//! Book model

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// Book record as stored in the catalogue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    /// Decimal identifier assigned by the store, immutable once set
    pub id: String,
    pub title: String,
    pub author: String,
    /// Free-form ISBN, may be empty
    pub isbn: String,
    pub published_year: i32,
}

/// Client-supplied book data for create and update requests.
///
/// Any `id` field in the payload is ignored; identity always comes from the
/// store (create) or the request path (update).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookDraft {
    #[validate(length(min = 1, message = "title is required"))]
    #[serde(default)]
    pub title: String,
    #[validate(length(min = 1, message = "author is required"))]
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub isbn: String,
    #[serde(default)]
    pub published_year: i32,
}

impl BookDraft {
    pub fn new(title: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            author: author.into(),
            ..Self::default()
        }
    }

    /// Strip surrounding whitespace from the text fields
    pub fn trimmed(self) -> Self {
        Self {
            title: self.title.trim().to_string(),
            author: self.author.trim().to_string(),
            isbn: self.isbn.trim().to_string(),
            published_year: self.published_year,
        }
    }

    /// Build the stored record for the given identifier
    pub fn into_book(self, id: String) -> Book {
        Book {
            id,
            title: self.title,
            author: self.author,
            isbn: self.isbn,
            published_year: self.published_year,
        }
    }
}

/// Sample books loaded into a fresh store
pub fn seed_data() -> Vec<Book> {
    vec![
        Book {
            id: "1".to_string(),
            title: "The Go Programming Language".to_string(),
            author: "Alan A. A. Donovan".to_string(),
            isbn: "9780134190440".to_string(),
            published_year: 2015,
        },
        Book {
            id: "2".to_string(),
            title: "Introducing Go".to_string(),
            author: "Caleb Doxsey".to_string(),
            isbn: "9781491941959".to_string(),
            published_year: 2016,
        },
        Book {
            id: "3".to_string(),
            title: "Concurrency in Go".to_string(),
            author: "Katherine Cox-Buday".to_string(),
            isbn: "9781491941195".to_string(),
            published_year: 2017,
        },
        Book {
            id: "4".to_string(),
            title: "Go in Practice".to_string(),
            author: "Matt Butcher".to_string(),
            isbn: "9781633430075".to_string(),
            published_year: 2016,
        },
    ]
}
