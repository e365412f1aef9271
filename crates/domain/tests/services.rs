//! Integration tests for the catalog and order record services.

use std::sync::Arc;

use common::{AuthorId, BookId, OrderId, UserId};
use domain::{
    AuthorService, BookService, DomainError, OrderService, PlaceOrder, UpdateOrder,
    ValidationError,
};
use store::{AuthorDraft, BookDraft, InMemoryStore};

fn author(name: &str) -> AuthorDraft {
    AuthorDraft {
        name: name.to_string(),
        nationality: "Vietnamese".to_string(),
    }
}

fn book(author_id: AuthorId, stock: i32) -> BookDraft {
    BookDraft {
        title: "Dumb Luck".to_string(),
        author_id,
        stock,
    }
}

mod authors {
    use super::*;

    #[tokio::test]
    async fn names_are_unique_ignoring_case() {
        let service = AuthorService::new(InMemoryStore::new());
        service.create_author(author("Vu Trong Phung")).await.unwrap();

        let err = service
            .create_author(author("VU TRONG PHUNG"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_creates_keep_names_unique() {
        let service = Arc::new(AuthorService::new(InMemoryStore::new()));

        let handles: Vec<_> = ["Bao Ninh", "BAO NINH", "bao ninh", "Bao ninh"]
            .into_iter()
            .map(|name| {
                let service = Arc::clone(&service);
                tokio::spawn(async move { service.create_author(author(name)).await })
            })
            .collect();

        let mut created = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => created += 1,
                Err(err) => assert!(matches!(err, DomainError::Conflict(_))),
            }
        }

        assert_eq!(created, 1);
        assert_eq!(service.list_authors().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn blank_name_is_rejected() {
        let service = AuthorService::new(InMemoryStore::new());

        let err = service.create_author(author("   ")).await.unwrap_err();
        assert!(matches!(
            err,
            DomainError::Validation(ValidationError::Blank { field: "name" })
        ));
    }

    #[tokio::test]
    async fn update_may_keep_own_name() {
        let service = AuthorService::new(InMemoryStore::new());
        let created = service.create_author(author("Nam Cao")).await.unwrap();

        let updated = service
            .update_author(created.id, author("nam cao"))
            .await
            .unwrap();
        assert_eq!(updated.name, "nam cao");

        service.create_author(author("Ho Xuan Huong")).await.unwrap();
        let err = service
            .update_author(created.id, author("Ho Xuan Huong"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[tokio::test]
    async fn missing_author_is_not_found() {
        let service = AuthorService::new(InMemoryStore::new());

        let err = service.get_author(AuthorId::new(3)).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound { entity: "author", id: 3 }));

        let err = service
            .update_author(AuthorId::new(3), author("Anyone"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));

        let err = service.get_author(AuthorId::new(0)).await.unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[tokio::test]
    async fn author_with_books_cannot_be_deleted() {
        let store = InMemoryStore::new();
        let authors = AuthorService::new(store.clone());
        let books = BookService::new(store.clone());

        let created = authors.create_author(author("Thach Lam")).await.unwrap();
        let created_book = books.create_book(book(created.id, 1)).await.unwrap();

        let err = authors.delete_author(created.id).await.unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));

        books.delete_book(created_book.id).await.unwrap();
        let deleted = authors.delete_author(created.id).await.unwrap();
        assert_eq!(deleted.id, created.id);
        assert!(authors.list_authors().await.unwrap().is_empty());
    }
}

mod books {
    use super::*;

    #[tokio::test]
    async fn unknown_author_is_invalid_reference() {
        let service = BookService::new(InMemoryStore::new());

        let err = service
            .create_book(book(AuthorId::new(42), 1))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidReference(_)));
    }

    #[tokio::test]
    async fn field_rules_are_enforced() {
        let store = InMemoryStore::new();
        let authors = AuthorService::new(store.clone());
        let service = BookService::new(store);
        let author_id = authors.create_author(author("Kim Lan")).await.unwrap().id;

        let err = service.create_book(book(author_id, -1)).await.unwrap_err();
        assert!(matches!(
            err,
            DomainError::Validation(ValidationError::NegativeStock(-1))
        ));

        let mut untitled = book(author_id, 1);
        untitled.title = String::new();
        let err = service.create_book(untitled).await.unwrap_err();
        assert!(matches!(
            err,
            DomainError::Validation(ValidationError::Blank { field: "title" })
        ));

        let err = service
            .create_book(book(AuthorId::new(0), 1))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::Validation(ValidationError::NonPositiveId { .. })
        ));
    }

    #[tokio::test]
    async fn update_replaces_stock_level() {
        let store = InMemoryStore::new();
        let authors = AuthorService::new(store.clone());
        let service = BookService::new(store.clone());
        let author_id = authors.create_author(author("Lan Khai")).await.unwrap().id;
        let created = service.create_book(book(author_id, 3)).await.unwrap();

        let updated = service
            .update_book(created.id, book(author_id, 12))
            .await
            .unwrap();

        assert_eq!(updated.stock, 12);
        assert_eq!(store.stock_of(created.id).await, Some(12));
        assert_eq!(service.get_book(created.id).await.unwrap().stock, 12);
    }

    #[tokio::test]
    async fn book_with_orders_cannot_be_deleted() {
        let store = InMemoryStore::new();
        let authors = AuthorService::new(store.clone());
        let books = BookService::new(store.clone());
        let orders = OrderService::new(store.clone());

        let author_id = authors.create_author(author("Nhat Linh")).await.unwrap().id;
        let book_id = books.create_book(book(author_id, 3)).await.unwrap().id;
        orders
            .place_order(PlaceOrder::new(book_id, UserId::new(1), 1, "pending"))
            .await
            .unwrap();

        let err = books.delete_book(book_id).await.unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));

        let err = books.delete_book(BookId::new(99)).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound { entity: "book", .. }));
    }
}

mod orders {
    use super::*;

    async fn placed_order(store: &InMemoryStore) -> (BookId, OrderId) {
        let authors = AuthorService::new(store.clone());
        let books = BookService::new(store.clone());
        let author_id = authors.create_author(author("Khai Hung")).await.unwrap().id;
        let book_id = books.create_book(book(author_id, 10)).await.unwrap().id;

        let order = OrderService::new(store.clone())
            .place_order(PlaceOrder::new(book_id, UserId::new(5), 2, "pending"))
            .await
            .unwrap();
        (book_id, order.id)
    }

    #[tokio::test]
    async fn update_does_not_adjust_stock() {
        let store = InMemoryStore::new();
        let (book_id, order_id) = placed_order(&store).await;
        let service = OrderService::new(store.clone());

        let updated = service
            .update_order(UpdateOrder {
                order_id,
                book_id,
                user_id: UserId::new(5),
                quantity: 50,
                status: "shipped".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(updated.quantity, 50);
        assert_eq!(updated.status, "shipped");
        assert!(updated.updated_at >= updated.ordered_at);
        assert_eq!(store.stock_of(book_id).await, Some(8));
    }

    #[tokio::test]
    async fn update_to_unknown_book_is_invalid_reference() {
        let store = InMemoryStore::new();
        let (_, order_id) = placed_order(&store).await;
        let service = OrderService::new(store);

        let err = service
            .update_order(UpdateOrder {
                order_id,
                book_id: BookId::new(777),
                user_id: UserId::new(5),
                quantity: 1,
                status: "pending".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidReference(_)));
    }

    #[tokio::test]
    async fn get_list_and_delete() {
        let store = InMemoryStore::new();
        let (_, order_id) = placed_order(&store).await;
        let service = OrderService::new(store);

        assert_eq!(service.get_order(order_id).await.unwrap().quantity, 2);
        assert_eq!(service.list_orders().await.unwrap().len(), 1);

        let deleted = service.delete_order(order_id).await.unwrap();
        assert_eq!(deleted.id, order_id);
        assert!(service.list_orders().await.unwrap().is_empty());

        let err = service.get_order(order_id).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound { entity: "order", .. }));

        let err = service.delete_order(order_id).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }
}
