pub mod catalog;
pub mod error;
pub mod library;
pub mod normalize;
pub mod otruyen;
pub mod query_cache;
