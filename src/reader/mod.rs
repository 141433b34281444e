pub mod controls;
pub mod image_cache;
pub mod prefetch;
pub mod session;
