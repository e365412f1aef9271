use std::sync::Arc;

use common::{BookId, UserId};
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{OrderFulfillment, PlaceOrder};
use store::{AuthorDraft, AuthorRepository, BookDraft, BookRepository, InMemoryStore};

async fn seeded_store(stock: i32) -> (InMemoryStore, BookId) {
    let store = InMemoryStore::new();
    let author = store
        .create_author(AuthorDraft {
            name: "Bench Author".to_string(),
            nationality: String::new(),
        })
        .await
        .unwrap();
    let book = store
        .create_book(BookDraft {
            title: "Bench Book".to_string(),
            author_id: author.id,
            stock,
        })
        .await
        .unwrap();
    (store, book.id)
}

fn bench_place_order(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (store, book_id) = rt.block_on(seeded_store(i32::MAX));
    let fulfillment = OrderFulfillment::new(store);

    c.bench_function("domain/place_order", |b| {
        b.iter(|| {
            rt.block_on(async {
                fulfillment
                    .place_order(PlaceOrder::new(book_id, UserId::new(1), 1, "pending"))
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_insufficient_stock(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (store, book_id) = rt.block_on(seeded_store(0));
    let fulfillment = OrderFulfillment::new(store);

    c.bench_function("domain/place_order_rejected", |b| {
        b.iter(|| {
            rt.block_on(async {
                fulfillment
                    .place_order(PlaceOrder::new(book_id, UserId::new(1), 1, "pending"))
                    .await
                    .unwrap_err();
            });
        });
    });
}

fn bench_contended_book(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
        .unwrap();

    c.bench_function("domain/place_order_contended_x16", |b| {
        b.iter(|| {
            rt.block_on(async {
                let (store, book_id) = seeded_store(16).await;
                let fulfillment = Arc::new(OrderFulfillment::new(store));
                let handles: Vec<_> = (0..16)
                    .map(|_| {
                        let fulfillment = Arc::clone(&fulfillment);
                        tokio::spawn(async move {
                            fulfillment
                                .place_order(PlaceOrder::new(book_id, UserId::new(1), 1, "pending"))
                                .await
                        })
                    })
                    .collect();
                for handle in handles {
                    handle.await.unwrap().unwrap();
                }
            });
        });
    });
}

criterion_group!(
    benches,
    bench_place_order,
    bench_insufficient_stock,
    bench_contended_book
);
criterion_main!(benches);
