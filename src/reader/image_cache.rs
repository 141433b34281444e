use image::DynamicImage;
use std::collections::HashMap;

pub const MAX_MEMORY_PAGES: usize = 50;

/// Decoded page images keyed by URL.
///
/// There is no per-entry eviction: the insert that pushes the cache past its limit
/// empties it.
pub struct ImageCache {
    pages: HashMap<String, DynamicImage>,
    limit: usize,
}

impl ImageCache {
    pub fn new(limit: usize) -> Self {
        Self {
            pages: HashMap::new(),
            limit,
        }
    }

    pub fn get(&self, url: &str) -> Option<&DynamicImage> {
        self.pages.get(url)
    }

    /// Returns `true` when this insert overflowed the limit and cleared the cache.
    pub fn insert(&mut self, url: String, image: DynamicImage) -> bool {
        self.pages.insert(url, image);
        if self.pages.len() > self.limit {
            log::debug!(
                "image cache passed {} entries, clearing {}",
                self.limit,
                self.pages.len()
            );
            self.pages.clear();
            return true;
        }
        false
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

impl Default for ImageCache {
    fn default() -> Self {
        Self::new(MAX_MEMORY_PAGES)
    }
}
