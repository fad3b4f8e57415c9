//! Articles, authors and engagement analytics.

mod commands;
mod queries;
mod service;

pub use commands::{ArticlePatch, NewArticle, NewAuthor, estimate_read_time};
pub use service::{ContentService, Counter};
