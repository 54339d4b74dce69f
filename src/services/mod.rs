mod text_cache;

pub use text_cache::{CacheEntry, CacheReport, DocumentSource, TextCache};
