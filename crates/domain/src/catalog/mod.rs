//! Author and book catalog services.

mod author;
mod book;

pub use author::AuthorService;
pub use book::BookService;
