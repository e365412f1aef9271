use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::{
    Author, AuthorDraft, AuthorId, Book, BookDraft, BookId, NewOrder, Order, OrderChanges, OrderId,
    Result, StoreError,
    store::{
        AuthorRepository, BookRepository, OrderRepository, OrderStore, StockLedger,
        StoreTransaction, TransactionalStore,
    },
};

/// A book row behind its row lock. `None` once the book has been deleted.
type BookRow = Arc<Mutex<Option<Book>>>;

#[derive(Debug, Default)]
struct Sequences {
    author: AtomicI64,
    book: AtomicI64,
    order: AtomicI64,
}

impl Sequences {
    fn next(counter: &AtomicI64) -> i64 {
        counter.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[derive(Debug, Default)]
struct Faults {
    begin: AtomicBool,
    stock_lookup: AtomicBool,
    insert: AtomicBool,
    identity: AtomicBool,
    decrement: AtomicBool,
    commit: AtomicBool,
    commit_delay_ms: AtomicU64,
}

#[derive(Debug, Default)]
struct Counters {
    begins: AtomicUsize,
    commits: AtomicUsize,
    rollbacks: AtomicUsize,
}

/// Snapshot of how often the transaction capability was used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CallCounts {
    /// Calls to `begin`, including failed ones.
    pub begins: usize,
    /// Successful commits.
    pub commits: usize,
    /// Explicit rollbacks.
    pub rollbacks: usize,
}

/// In-memory store for tests and database-less runs.
///
/// Each book row sits behind its own async mutex, which plays the part of
/// the database row lock: a transaction holds the guard from its locked
/// read until commit or rollback. Writes are staged in the transaction and
/// applied on commit only. This is sound only while every writer goes
/// through the same process.
///
/// Failures can be injected at each step of a transaction to exercise
/// rollback paths.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    authors: Arc<RwLock<BTreeMap<AuthorId, Author>>>,
    books: Arc<RwLock<BTreeMap<BookId, BookRow>>>,
    orders: Arc<RwLock<BTreeMap<OrderId, Order>>>,
    sequences: Arc<Sequences>,
    faults: Arc<Faults>,
    counters: Arc<Counters>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the committed stock of a book, or None if it doesn't exist.
    ///
    /// Waits for the book's row lock like any other reader.
    pub async fn stock_of(&self, book_id: BookId) -> Option<i32> {
        let row = self.row(book_id).await?;
        let guard = row.lock().await;
        guard.as_ref().map(|book| book.stock)
    }

    /// Returns the number of committed orders.
    pub async fn order_count(&self) -> usize {
        self.orders.read().await.len()
    }

    /// Returns transaction usage counters.
    pub fn call_counts(&self) -> CallCounts {
        CallCounts {
            begins: self.counters.begins.load(Ordering::SeqCst),
            commits: self.counters.commits.load(Ordering::SeqCst),
            rollbacks: self.counters.rollbacks.load(Ordering::SeqCst),
        }
    }

    /// Configures `begin` to fail.
    pub fn set_fail_on_begin(&self, fail: bool) {
        self.faults.begin.store(fail, Ordering::SeqCst);
    }

    /// Configures locked stock reads to fail.
    pub fn set_fail_on_stock_lookup(&self, fail: bool) {
        self.faults.stock_lookup.store(fail, Ordering::SeqCst);
    }

    /// Configures order inserts to fail before writing.
    pub fn set_fail_on_insert(&self, fail: bool) {
        self.faults.insert.store(fail, Ordering::SeqCst);
    }

    /// Configures order inserts to lose the generated identifier after writing.
    pub fn set_fail_on_identity(&self, fail: bool) {
        self.faults.identity.store(fail, Ordering::SeqCst);
    }

    /// Configures stock decrements to fail.
    pub fn set_fail_on_decrement(&self, fail: bool) {
        self.faults.decrement.store(fail, Ordering::SeqCst);
    }

    /// Configures commits to fail. Nothing of the transaction is applied.
    pub fn set_fail_on_commit(&self, fail: bool) {
        self.faults.commit.store(fail, Ordering::SeqCst);
    }

    /// Makes every commit wait before applying, while still holding its locks.
    pub fn set_commit_delay(&self, delay: Duration) {
        self.faults
            .commit_delay_ms
            .store(
                u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                Ordering::SeqCst,
            );
    }

    async fn row(&self, book_id: BookId) -> Option<BookRow> {
        self.books.read().await.get(&book_id).cloned()
    }

    async fn rows(&self) -> Vec<BookRow> {
        self.books.read().await.values().cloned().collect()
    }

    async fn author_exists(&self, author_id: AuthorId) -> bool {
        self.authors.read().await.contains_key(&author_id)
    }

    async fn book_exists(&self, book_id: BookId) -> bool {
        match self.row(book_id).await {
            Some(row) => row.lock().await.is_some(),
            None => false,
        }
    }
}

fn fk_violation(constraint: &str) -> StoreError {
    StoreError::ForeignKeyViolation {
        constraint: Some(constraint.to_string()),
    }
}

/// Mirrors the `authors_name_lower_key` unique index.
fn ensure_unique_name(
    authors: &BTreeMap<AuthorId, Author>,
    name: &str,
    except: Option<AuthorId>,
) -> Result<()> {
    let wanted = name.to_lowercase();
    if authors
        .values()
        .any(|author| Some(author.id) != except && author.name.to_lowercase() == wanted)
    {
        return Err(StoreError::UniqueViolation {
            constraint: Some("authors_name_lower_key".to_string()),
        });
    }
    Ok(())
}

fn not_found(entity: &'static str, id: i64) -> StoreError {
    StoreError::NotFound { entity, id }
}

/// An open in-memory transaction.
///
/// Holds the row guards of every book it locked. Dropping it releases them
/// and discards staged writes.
pub struct InMemoryTransaction {
    store: InMemoryStore,
    locks: HashMap<BookId, OwnedMutexGuard<Option<Book>>>,
    staged_stock: HashMap<BookId, i32>,
    staged_orders: Vec<Order>,
}

#[async_trait]
impl TransactionalStore for InMemoryStore {
    type Transaction = InMemoryTransaction;

    async fn begin(&self) -> Result<InMemoryTransaction> {
        self.counters.begins.fetch_add(1, Ordering::SeqCst);

        if self.faults.begin.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "cannot begin transaction".to_string(),
            ));
        }

        Ok(InMemoryTransaction {
            store: self.clone(),
            locks: HashMap::new(),
            staged_stock: HashMap::new(),
            staged_orders: Vec::new(),
        })
    }
}

#[async_trait]
impl StockLedger for InMemoryTransaction {
    async fn lock_and_read_stock(&mut self, book_id: BookId) -> Result<i32> {
        if self.store.faults.stock_lookup.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("stock lookup failed".to_string()));
        }

        if let Some(stock) = self.staged_stock.get(&book_id) {
            return Ok(*stock);
        }

        let row = self
            .store
            .row(book_id)
            .await
            .ok_or_else(|| StoreError::book_not_found(book_id))?;

        let guard = row.lock_owned().await;
        // The book may have been deleted while this transaction waited.
        let stock = guard
            .as_ref()
            .map(|book| book.stock)
            .ok_or_else(|| StoreError::book_not_found(book_id))?;

        self.locks.insert(book_id, guard);
        self.staged_stock.insert(book_id, stock);
        Ok(stock)
    }

    async fn decrement_stock(&mut self, book_id: BookId, amount: i32) -> Result<()> {
        if self.store.faults.decrement.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("stock update failed".to_string()));
        }

        let stock = self
            .staged_stock
            .get_mut(&book_id)
            .ok_or(StoreError::RowNotLocked(book_id))?;

        if *stock < amount {
            return Err(StoreError::CheckViolation(format!(
                "stock of book {book_id} would become negative"
            )));
        }
        *stock -= amount;
        Ok(())
    }
}

#[async_trait]
impl OrderStore for InMemoryTransaction {
    async fn insert_order(&mut self, order: &NewOrder) -> Result<OrderId> {
        if self.store.faults.insert.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("order insert failed".to_string()));
        }

        let book_exists = match self.locks.get(&order.book_id) {
            Some(guard) => guard.is_some(),
            None => self.store.book_exists(order.book_id).await,
        };
        if !book_exists {
            return Err(fk_violation("orders_book_id_fkey"));
        }

        // Like a database sequence, the id is consumed even if the
        // transaction never commits.
        let id = OrderId::new(Sequences::next(&self.store.sequences.order));

        if self.store.faults.identity.load(Ordering::SeqCst) {
            return Err(StoreError::IdentityRetrieval(format!(
                "generated id of order for book {} was not returned",
                order.book_id
            )));
        }

        self.staged_orders.push(order.clone().into_order(id));
        Ok(id)
    }
}

#[async_trait]
impl StoreTransaction for InMemoryTransaction {
    async fn commit(self) -> Result<()> {
        let InMemoryTransaction {
            store,
            mut locks,
            staged_stock,
            staged_orders,
        } = self;

        let delay = store.faults.commit_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        if store.faults.commit.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("commit failed".to_string()));
        }

        let now = Utc::now();
        for (book_id, stock) in staged_stock {
            if let Some(guard) = locks.get_mut(&book_id)
                && let Some(book) = guard.as_mut()
                && book.stock != stock
            {
                book.stock = stock;
                book.updated_at = now;
            }
        }

        {
            let mut orders = store.orders.write().await;
            for order in staged_orders {
                orders.insert(order.id, order);
            }
        }

        store.counters.commits.fetch_add(1, Ordering::SeqCst);
        // Row locks are released here, after every write is visible.
        drop(locks);
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.store.counters.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl AuthorRepository for InMemoryStore {
    async fn create_author(&self, draft: AuthorDraft) -> Result<Author> {
        let mut authors = self.authors.write().await;
        ensure_unique_name(&authors, &draft.name, None)?;

        let now = Utc::now();
        let author = Author {
            id: AuthorId::new(Sequences::next(&self.sequences.author)),
            name: draft.name,
            nationality: draft.nationality,
            created_at: now,
            updated_at: now,
        };
        authors.insert(author.id, author.clone());
        Ok(author)
    }

    async fn list_authors(&self) -> Result<Vec<Author>> {
        Ok(self.authors.read().await.values().cloned().collect())
    }

    async fn get_author(&self, id: AuthorId) -> Result<Option<Author>> {
        Ok(self.authors.read().await.get(&id).cloned())
    }

    async fn update_author(&self, id: AuthorId, draft: AuthorDraft) -> Result<Author> {
        let mut authors = self.authors.write().await;
        ensure_unique_name(&authors, &draft.name, Some(id))?;
        let author = authors
            .get_mut(&id)
            .ok_or_else(|| not_found("author", id.as_i64()))?;

        author.name = draft.name;
        author.nationality = draft.nationality;
        author.updated_at = Utc::now();
        Ok(author.clone())
    }

    async fn delete_author(&self, id: AuthorId) -> Result<Author> {
        for row in self.rows().await {
            if let Some(book) = row.lock().await.as_ref()
                && book.author_id == id
            {
                return Err(fk_violation("books_author_id_fkey"));
            }
        }

        self.authors
            .write()
            .await
            .remove(&id)
            .ok_or_else(|| not_found("author", id.as_i64()))
    }
}

#[async_trait]
impl BookRepository for InMemoryStore {
    async fn create_book(&self, draft: BookDraft) -> Result<Book> {
        if !self.author_exists(draft.author_id).await {
            return Err(fk_violation("books_author_id_fkey"));
        }
        if draft.stock < 0 {
            return Err(StoreError::CheckViolation(
                "books_stock_non_negative".to_string(),
            ));
        }

        let now = Utc::now();
        let book = Book {
            id: BookId::new(Sequences::next(&self.sequences.book)),
            title: draft.title,
            author_id: draft.author_id,
            stock: draft.stock,
            created_at: now,
            updated_at: now,
        };
        self.books
            .write()
            .await
            .insert(book.id, Arc::new(Mutex::new(Some(book.clone()))));
        Ok(book)
    }

    async fn list_books(&self) -> Result<Vec<Book>> {
        let mut books = Vec::new();
        for row in self.rows().await {
            if let Some(book) = row.lock().await.as_ref() {
                books.push(book.clone());
            }
        }
        Ok(books)
    }

    async fn get_book(&self, id: BookId) -> Result<Option<Book>> {
        match self.row(id).await {
            Some(row) => Ok(row.lock().await.clone()),
            None => Ok(None),
        }
    }

    async fn update_book(&self, id: BookId, draft: BookDraft) -> Result<Book> {
        if !self.author_exists(draft.author_id).await {
            return Err(fk_violation("books_author_id_fkey"));
        }
        if draft.stock < 0 {
            return Err(StoreError::CheckViolation(
                "books_stock_non_negative".to_string(),
            ));
        }

        let row = self
            .row(id)
            .await
            .ok_or_else(|| StoreError::book_not_found(id))?;
        let mut guard = row.lock().await;
        let book = guard
            .as_mut()
            .ok_or_else(|| StoreError::book_not_found(id))?;

        book.title = draft.title;
        book.author_id = draft.author_id;
        book.stock = draft.stock;
        book.updated_at = Utc::now();
        Ok(book.clone())
    }

    async fn delete_book(&self, id: BookId) -> Result<Book> {
        let row = self
            .row(id)
            .await
            .ok_or_else(|| StoreError::book_not_found(id))?;
        let mut guard = row.lock().await;

        if guard.is_none() {
            return Err(StoreError::book_not_found(id));
        }
        if self
            .orders
            .read()
            .await
            .values()
            .any(|order| order.book_id == id)
        {
            return Err(fk_violation("orders_book_id_fkey"));
        }

        self.books.write().await.remove(&id);
        guard.take().ok_or_else(|| StoreError::book_not_found(id))
    }
}

#[async_trait]
impl OrderRepository for InMemoryStore {
    async fn list_orders(&self) -> Result<Vec<Order>> {
        Ok(self.orders.read().await.values().cloned().collect())
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.orders.read().await.get(&id).cloned())
    }

    async fn update_order(&self, id: OrderId, changes: OrderChanges) -> Result<Order> {
        if !self.book_exists(changes.book_id).await {
            return Err(fk_violation("orders_book_id_fkey"));
        }

        let mut orders = self.orders.write().await;
        let order = orders
            .get_mut(&id)
            .ok_or_else(|| not_found("order", id.as_i64()))?;

        changes.apply_to(order);
        Ok(order.clone())
    }

    async fn delete_order(&self, id: OrderId) -> Result<Order> {
        self.orders
            .write()
            .await
            .remove(&id)
            .ok_or_else(|| not_found("order", id.as_i64()))
    }
}
