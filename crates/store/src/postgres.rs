use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{
    PgPool, Postgres, Row,
    postgres::{PgPoolOptions, PgRow},
};

use crate::{
    Author, AuthorDraft, AuthorId, Book, BookDraft, BookId, NewOrder, Order, OrderChanges, OrderId,
    Result, StoreError, UserId,
    store::{
        AuthorRepository, BookRepository, OrderRepository, OrderStore, StockLedger,
        StoreTransaction, TransactionalStore,
    },
};

/// SQLSTATE raised when `lock_timeout` expires.
const LOCK_NOT_AVAILABLE: &str = "55P03";

/// PostgreSQL-backed store.
///
/// Stock rows are locked with `SELECT ... FOR UPDATE`, which serializes
/// order placements per book across every process sharing the database.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
    lock_timeout: Option<Duration>,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            lock_timeout: None,
        }
    }

    /// Connects a pool of at most `max_connections` to `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        tracing::info!(max_connections, "Connected to PostgreSQL");
        Ok(Self::new(pool))
    }

    /// Bounds how long a transaction of this store waits for a row lock.
    ///
    /// Applied per transaction with `SET LOCAL lock_timeout`; expiry is
    /// reported as [`StoreError::LockTimeout`].
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = Some(timeout);
        self
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_author(row: PgRow) -> Result<Author> {
        Ok(Author {
            id: AuthorId::new(row.try_get("id")?),
            name: row.try_get("name")?,
            nationality: row.try_get("nationality")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_book(row: PgRow) -> Result<Book> {
        Ok(Book {
            id: BookId::new(row.try_get("id")?),
            title: row.try_get("title")?,
            author_id: AuthorId::new(row.try_get("author_id")?),
            stock: row.try_get("stock")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_order(row: PgRow) -> Result<Order> {
        Ok(Order {
            id: OrderId::new(row.try_get("id")?),
            book_id: BookId::new(row.try_get("book_id")?),
            user_id: UserId::new(row.try_get("user_id")?),
            quantity: row.try_get("quantity")?,
            status: row.try_get("status")?,
            ordered_at: row.try_get("ordered_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

fn not_found(entity: &'static str, id: i64) -> StoreError {
    StoreError::NotFound { entity, id }
}

/// An open PostgreSQL transaction.
///
/// Tracks which book rows it has locked so that stock writes on rows it
/// does not hold are rejected before reaching the database.
pub struct PostgresTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
    locked: HashSet<BookId>,
}

#[async_trait]
impl TransactionalStore for PostgresStore {
    type Transaction = PostgresTransaction;

    async fn begin(&self) -> Result<PostgresTransaction> {
        let mut tx = self.pool.begin().await?;

        if let Some(timeout) = self.lock_timeout {
            set_lock_timeout(&mut tx, timeout).await?;
        }

        Ok(PostgresTransaction {
            tx,
            locked: HashSet::new(),
        })
    }
}

/// Sets `lock_timeout` for the rest of the transaction.
async fn set_lock_timeout(
    tx: &mut sqlx::Transaction<'static, Postgres>,
    timeout: Duration,
) -> Result<()> {
    // Zero would disable the timeout.
    let millis = timeout.as_millis().max(1);
    // SET does not accept bind parameters.
    sqlx::query(&format!("SET LOCAL lock_timeout = '{millis}ms'"))
        .execute(&mut **tx)
        .await?;
    Ok(())
}

#[async_trait]
impl StockLedger for PostgresTransaction {
    async fn lock_and_read_stock(&mut self, book_id: BookId) -> Result<i32> {
        let stock: Option<i32> =
            sqlx::query_scalar("SELECT stock FROM books WHERE id = $1 FOR UPDATE")
                .bind(book_id.as_i64())
                .fetch_optional(&mut *self.tx)
                .await
                .map_err(|e| {
                    if let sqlx::Error::Database(ref db_err) = e
                        && db_err.code().as_deref() == Some(LOCK_NOT_AVAILABLE)
                    {
                        return StoreError::LockTimeout;
                    }
                    StoreError::from(e)
                })?;

        let stock = stock.ok_or_else(|| StoreError::book_not_found(book_id))?;
        self.locked.insert(book_id);
        Ok(stock)
    }

    async fn decrement_stock(&mut self, book_id: BookId, amount: i32) -> Result<()> {
        if !self.locked.contains(&book_id) {
            return Err(StoreError::RowNotLocked(book_id));
        }

        let result =
            sqlx::query("UPDATE books SET stock = stock - $1, updated_at = NOW() WHERE id = $2")
                .bind(amount)
                .bind(book_id.as_i64())
                .execute(&mut *self.tx)
                .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::book_not_found(book_id));
        }
        Ok(())
    }

    async fn limit_lock_wait(&mut self, timeout: Duration) -> Result<()> {
        set_lock_timeout(&mut self.tx, timeout).await
    }
}

#[async_trait]
impl OrderStore for PostgresTransaction {
    async fn insert_order(&mut self, order: &NewOrder) -> Result<OrderId> {
        let row = sqlx::query(
            r#"
            INSERT INTO orders (book_id, user_id, quantity, status, ordered_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            RETURNING id
            "#,
        )
        .bind(order.book_id.as_i64())
        .bind(order.user_id.as_i64())
        .bind(order.quantity)
        .bind(&order.status)
        .bind(order.ordered_at)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or_else(|| StoreError::IdentityRetrieval("insert returned no row".to_string()))?;

        let id: i64 = row
            .try_get("id")
            .map_err(|e| StoreError::IdentityRetrieval(e.to_string()))?;
        Ok(OrderId::new(id))
    }
}

#[async_trait]
impl StoreTransaction for PostgresTransaction {
    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

#[async_trait]
impl AuthorRepository for PostgresStore {
    async fn create_author(&self, draft: AuthorDraft) -> Result<Author> {
        let row = sqlx::query(
            r#"
            INSERT INTO authors (name, nationality)
            VALUES ($1, $2)
            RETURNING id, name, nationality, created_at, updated_at
            "#,
        )
        .bind(&draft.name)
        .bind(&draft.nationality)
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_author(row)
    }

    async fn list_authors(&self) -> Result<Vec<Author>> {
        let rows = sqlx::query(
            "SELECT id, name, nationality, created_at, updated_at FROM authors ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_author).collect()
    }

    async fn get_author(&self, id: AuthorId) -> Result<Option<Author>> {
        let row: Option<PgRow> = sqlx::query(
            "SELECT id, name, nationality, created_at, updated_at FROM authors WHERE id = $1",
        )
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_author).transpose()
    }

    async fn update_author(&self, id: AuthorId, draft: AuthorDraft) -> Result<Author> {
        let row: Option<PgRow> = sqlx::query(
            r#"
            UPDATE authors
            SET name = $1, nationality = $2, updated_at = $3
            WHERE id = $4
            RETURNING id, name, nationality, created_at, updated_at
            "#,
        )
        .bind(&draft.name)
        .bind(&draft.nationality)
        .bind(Utc::now())
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_author)
            .transpose()?
            .ok_or_else(|| not_found("author", id.as_i64()))
    }

    async fn delete_author(&self, id: AuthorId) -> Result<Author> {
        let row: Option<PgRow> = sqlx::query(
            "DELETE FROM authors WHERE id = $1 RETURNING id, name, nationality, created_at, updated_at",
        )
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_author)
            .transpose()?
            .ok_or_else(|| not_found("author", id.as_i64()))
    }
}

#[async_trait]
impl BookRepository for PostgresStore {
    async fn create_book(&self, draft: BookDraft) -> Result<Book> {
        let row = sqlx::query(
            r#"
            INSERT INTO books (title, author_id, stock)
            VALUES ($1, $2, $3)
            RETURNING id, title, author_id, stock, created_at, updated_at
            "#,
        )
        .bind(&draft.title)
        .bind(draft.author_id.as_i64())
        .bind(draft.stock)
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_book(row)
    }

    async fn list_books(&self) -> Result<Vec<Book>> {
        let rows = sqlx::query(
            "SELECT id, title, author_id, stock, created_at, updated_at FROM books ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_book).collect()
    }

    async fn get_book(&self, id: BookId) -> Result<Option<Book>> {
        let row: Option<PgRow> = sqlx::query(
            "SELECT id, title, author_id, stock, created_at, updated_at FROM books WHERE id = $1",
        )
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_book).transpose()
    }

    async fn update_book(&self, id: BookId, draft: BookDraft) -> Result<Book> {
        // UPDATE takes the same row lock as SELECT ... FOR UPDATE.
        let row: Option<PgRow> = sqlx::query(
            r#"
            UPDATE books
            SET title = $1, author_id = $2, stock = $3, updated_at = $4
            WHERE id = $5
            RETURNING id, title, author_id, stock, created_at, updated_at
            "#,
        )
        .bind(&draft.title)
        .bind(draft.author_id.as_i64())
        .bind(draft.stock)
        .bind(Utc::now())
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_book)
            .transpose()?
            .ok_or_else(|| StoreError::book_not_found(id))
    }

    async fn delete_book(&self, id: BookId) -> Result<Book> {
        let row: Option<PgRow> = sqlx::query(
            "DELETE FROM books WHERE id = $1 RETURNING id, title, author_id, stock, created_at, updated_at",
        )
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_book)
            .transpose()?
            .ok_or_else(|| StoreError::book_not_found(id))
    }
}

#[async_trait]
impl OrderRepository for PostgresStore {
    async fn list_orders(&self) -> Result<Vec<Order>> {
        let rows = sqlx::query(
            r#"
            SELECT id, book_id, user_id, quantity, status, ordered_at, updated_at
            FROM orders
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_order).collect()
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        let row: Option<PgRow> = sqlx::query(
            r#"
            SELECT id, book_id, user_id, quantity, status, ordered_at, updated_at
            FROM orders
            WHERE id = $1
            "#,
        )
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_order).transpose()
    }

    async fn update_order(&self, id: OrderId, changes: OrderChanges) -> Result<Order> {
        let row: Option<PgRow> = sqlx::query(
            r#"
            UPDATE orders
            SET book_id = $1, user_id = $2, quantity = $3, status = $4, updated_at = $5
            WHERE id = $6
            RETURNING id, book_id, user_id, quantity, status, ordered_at, updated_at
            "#,
        )
        .bind(changes.book_id.as_i64())
        .bind(changes.user_id.as_i64())
        .bind(changes.quantity)
        .bind(&changes.status)
        .bind(changes.updated_at)
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_order)
            .transpose()?
            .ok_or_else(|| not_found("order", id.as_i64()))
    }

    async fn delete_order(&self, id: OrderId) -> Result<Order> {
        let row: Option<PgRow> = sqlx::query(
            r#"
            DELETE FROM orders
            WHERE id = $1
            RETURNING id, book_id, user_id, quantity, status, ordered_at, updated_at
            "#,
        )
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_order)
            .transpose()?
            .ok_or_else(|| not_found("order", id.as_i64()))
    }
}
