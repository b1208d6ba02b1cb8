use std::sync::Once;

use sqlx::any::{AnyPoolOptions, AnyRow};
use sqlx::{AnyPool, Row};
use thiserror::Error;
use tracing::{error, info};

use crate::models::{Book, NewBook, NewUser};

static DRIVERS: Once = Once::new();

/// Error kinds at the store-adapter boundary. The handlers map each kind to
/// a distinct response code instead of collapsing everything into one.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("conflicts with an existing record")]
    Conflict,
    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Conflict,
            _ => StoreError::Database(err),
        }
    }
}

/// Which backend the pool is talking to. Production uses Postgres; tests use
/// in-memory SQLite. Only the auto-increment primary-key DDL differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Backend {
    Postgres,
    Sqlite,
}

impl Backend {
    fn from_url(url: &str) -> Self {
        if url.starts_with("sqlite") {
            Backend::Sqlite
        } else {
            Backend::Postgres
        }
    }
}

/// Store owns the pooled database handle; handlers hold clones of it (the
/// pool itself is the shared resource) rather than a process-wide singleton.
#[derive(Clone)]
pub struct Store {
    pool: AnyPool,
    backend: Backend,
}

impl Store {
    /// Open a pooled connection and synchronize the schema. A schema-sync
    /// failure is logged but does not fail the connect call; only failure to
    /// open the connection itself is an error.
    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        DRIVERS.call_once(sqlx::any::install_default_drivers);

        let pool = AnyPoolOptions::new().max_connections(5).connect(url).await?;
        let store = Self {
            pool,
            backend: Backend::from_url(url),
        };

        if let Err(err) = store.ensure_schema().await {
            error!("schema synchronization failed: {err}");
        }

        Ok(store)
    }

    /// Create any missing tables matching the declared record shapes. Purely
    /// additive and idempotent; existing columns are never dropped or altered.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        info!("synchronizing schema");

        let id_column = match self.backend {
            Backend::Postgres => "BIGINT GENERATED ALWAYS AS IDENTITY PRIMARY KEY",
            Backend::Sqlite => "INTEGER PRIMARY KEY AUTOINCREMENT",
        };

        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS books (
                id {id_column},
                author TEXT,
                title TEXT,
                publisher TEXT
            )"
        ))
        .execute(&self.pool)
        .await?;

        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS users (
                id {id_column},
                name TEXT,
                email TEXT,
                phone TEXT,
                password TEXT
            )"
        ))
        .execute(&self.pool)
        .await?;

        // Duplicate registrations are rejected at the store level.
        sqlx::query("CREATE UNIQUE INDEX IF NOT EXISTS users_email_idx ON users (email)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Insert a book and return its store-assigned id.
    pub async fn insert_book(&self, book: &NewBook) -> Result<i64, StoreError> {
        let row = sqlx::query(
            "INSERT INTO books (author, title, publisher) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(book.author.as_deref())
        .bind(book.title.as_deref())
        .bind(book.publisher.as_deref())
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get("id")?)
    }

    pub async fn list_books(&self) -> Result<Vec<Book>, StoreError> {
        let rows = sqlx::query("SELECT id, author, title, publisher FROM books ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(book_from_row).collect()
    }

    pub async fn get_book(&self, id: i64) -> Result<Book, StoreError> {
        let row = sqlx::query("SELECT id, author, title, publisher FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => book_from_row(&row),
            None => Err(StoreError::NotFound),
        }
    }

    /// Hard delete. Deleting an unknown id is reported as NotFound rather
    /// than silently succeeding.
    pub async fn delete_book(&self, id: i64) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// Insert a user. The password, if any, arrives already hashed; this
    /// layer never sees plaintext credentials.
    pub async fn insert_user(
        &self,
        user: &NewUser,
        password_hash: Option<&str>,
    ) -> Result<i64, StoreError> {
        let row = sqlx::query(
            "INSERT INTO users (name, email, phone, password) VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(user.name.as_deref())
        .bind(user.email.as_deref())
        .bind(user.phone.as_deref())
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get("id")?)
    }

    /// Get the underlying pool (tests inspect table contents directly).
    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }
}

fn book_from_row(row: &AnyRow) -> Result<Book, StoreError> {
    Ok(Book {
        id: row.try_get("id")?,
        author: row.try_get("author")?,
        title: row.try_get("title")?,
        publisher: row.try_get("publisher")?,
    })
}

#[cfg(test)]
pub(crate) async fn connect_test_store() -> Store {
    // Each test gets its own uniquely named shared-cache in-memory database.
    let url = format!(
        "sqlite:file:memdb_{}?mode=memory&cache=shared",
        uuid::Uuid::new_v4().simple()
    );
    Store::connect(&url)
        .await
        .expect("failed to create test database")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn insert_then_list_returns_matching_record() {
        let store = connect_test_store().await;

        let id = store
            .insert_book(&NewBook {
                author: Some("Mary Shelley".into()),
                title: Some("Frankenstein".into()),
                publisher: None,
            })
            .await
            .expect("failed to insert book");
        assert!(id > 0);

        let books = store.list_books().await.expect("failed to list books");
        assert_eq!(books.len(), 1);
        assert_eq!(books[0].id, id);
        assert_eq!(books[0].author.as_deref(), Some("Mary Shelley"));
        assert_eq!(books[0].title.as_deref(), Some("Frankenstein"));
        assert_eq!(books[0].publisher, None);
    }

    #[tokio::test]
    async fn inserted_ids_are_fresh_and_distinct() {
        let store = connect_test_store().await;

        let first = store.insert_book(&NewBook::default()).await.unwrap();
        let second = store.insert_book(&NewBook::default()).await.unwrap();

        assert!(first > 0);
        assert!(second > 0);
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn get_unknown_book_is_not_found() {
        let store = connect_test_store().await;

        let err = store.get_book(9999).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[tokio::test]
    async fn delete_removes_record_and_repeat_fails() {
        let store = connect_test_store().await;

        let id = store
            .insert_book(&NewBook {
                title: Some("Dune".into()),
                ..Default::default()
            })
            .await
            .unwrap();

        store.delete_book(id).await.expect("failed to delete book");

        assert!(store.list_books().await.unwrap().is_empty());
        assert!(matches!(
            store.get_book(id).await.unwrap_err(),
            StoreError::NotFound
        ));
        assert!(matches!(
            store.delete_book(id).await.unwrap_err(),
            StoreError::NotFound
        ));
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let store = connect_test_store().await;

        let user = NewUser {
            email: Some("ada@example.com".into()),
            ..Default::default()
        };

        store.insert_user(&user, None).await.unwrap();
        let err = store.insert_user(&user, None).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict));
    }

    #[tokio::test]
    async fn schema_sync_is_idempotent() {
        let store = connect_test_store().await;

        let id = store.insert_book(&NewBook::default()).await.unwrap();

        // Running the sync again must not touch existing rows.
        store.ensure_schema().await.expect("schema sync failed");

        let books = store.list_books().await.unwrap();
        assert_eq!(books.len(), 1);
        assert_eq!(books[0].id, id);
    }
}
