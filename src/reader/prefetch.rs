use image::DynamicImage;
use std::collections::HashSet;
use std::ops::Range;

use super::image_cache::ImageCache;
use crate::backend::error::ApiError;

pub const DEFAULT_RADIUS: usize = 3;

/// Page indices within `radius` of `current`, clipped to the chapter.
pub fn window(current: usize, len: usize, radius: usize) -> Range<usize> {
    if len == 0 {
        return 0..0;
    }
    let current = current.min(len - 1);
    current.saturating_sub(radius)..current.saturating_add(radius).saturating_add(1).min(len)
}

/// Keeps the pages around the reader's position decoded ahead of time.
///
/// `plan` is re-run after every position change; it only hands out URLs that are
/// neither decoded, in flight, nor already failed in this chapter.
pub struct PrefetchManager {
    radius: usize,
    cache: ImageCache,
    prefetched: HashSet<String>,
    in_flight: HashSet<String>,
    failed: HashSet<String>,
}

impl PrefetchManager {
    /// The cache always holds at least one full window.
    pub fn new(radius: usize, cache_limit: usize) -> Self {
        let window_len = radius.saturating_mul(2).saturating_add(1);
        Self {
            radius,
            cache: ImageCache::new(cache_limit.max(window_len)),
            prefetched: HashSet::new(),
            in_flight: HashSet::new(),
            failed: HashSet::new(),
        }
    }

    pub fn radius(&self) -> usize {
        self.radius
    }

    /// URLs to decode for `current`. Returned URLs are marked in flight.
    pub fn plan(&mut self, current: usize, urls: &[String]) -> Vec<String> {
        let mut requests = Vec::new();
        for url in &urls[window(current, urls.len(), self.radius)] {
            if self.prefetched.contains(url)
                || self.in_flight.contains(url)
                || self.failed.contains(url)
            {
                continue;
            }
            self.in_flight.insert(url.clone());
            requests.push(url.clone());
        }
        requests
    }

    /// Returns `true` when this result overflowed the cache. Everything decoded so
    /// far, this image included, is gone and the window has to be planned again.
    pub fn complete(&mut self, url: &str, result: Result<DynamicImage, ApiError>) -> bool {
        self.in_flight.remove(url);
        match result {
            Ok(image) => {
                if self.cache.insert(url.to_string(), image) {
                    self.prefetched.clear();
                    return true;
                }
                self.prefetched.insert(url.to_string());
            }
            Err(err) => {
                log::warn!("prefetch of {url} failed: {err}");
                self.failed.insert(url.to_string());
            }
        }
        false
    }

    /// Failed pages get another chance when a chapter is (re)entered. In-flight
    /// decodes keep running and land in the cache when they finish.
    pub fn reset_chapter(&mut self) {
        self.failed.clear();
    }

    pub fn image(&self, url: &str) -> Option<&DynamicImage> {
        self.cache.get(url)
    }

    #[cfg(test)]
    pub fn is_prefetched(&self, url: &str) -> bool {
        self.prefetched.contains(url)
    }

    #[cfg(test)]
    pub fn is_in_flight(&self, url: &str) -> bool {
        self.in_flight.contains(url)
    }

    #[cfg(test)]
    pub fn prefetched_len(&self) -> usize {
        self.prefetched.len()
    }

    #[cfg(test)]
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }
}

impl Default for PrefetchManager {
    fn default() -> Self {
        Self::new(DEFAULT_RADIUS, super::image_cache::MAX_MEMORY_PAGES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urls(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("https://cdn.example/ch/{i}.jpg")).collect()
    }

    fn pixel() -> DynamicImage {
        DynamicImage::new_rgb8(1, 1)
    }

    #[test]
    fn window_is_clipped_to_chapter() {
        assert_eq!(window(0, 10, 3), 0..4);
        assert_eq!(window(5, 10, 3), 2..9);
        assert_eq!(window(9, 10, 3), 6..10);
        assert_eq!(window(1, 2, 3), 0..2);
        assert_eq!(window(0, 0, 3), 0..0);
    }

    #[test]
    fn plans_exactly_the_window() {
        let pages = urls(20);
        for k in [0, 2, 10, 19] {
            let mut manager = PrefetchManager::default();
            let planned = manager.plan(k, &pages);
            let expected: Vec<String> = (k.saturating_sub(3)..=(k + 3).min(19))
                .map(|i| pages[i].clone())
                .collect();
            assert_eq!(planned, expected, "window around page {k}");
        }
    }

    #[test]
    fn never_rerequests_prefetched_or_in_flight_urls() {
        let pages = urls(10);
        let mut manager = PrefetchManager::default();

        let first = manager.plan(0, &pages);
        assert_eq!(first.len(), 4);
        // Still in flight: nothing new for the same window.
        assert!(manager.plan(0, &pages).is_empty());

        for url in &first {
            manager.complete(url, Ok(pixel()));
        }
        assert!(manager.is_prefetched(&pages[3]));

        let next = manager.plan(1, &pages);
        assert_eq!(next, vec![pages[4].clone()]);
    }

    #[test]
    fn failures_are_dropped_until_chapter_reset() {
        let pages = urls(3);
        let mut manager = PrefetchManager::default();

        let planned = manager.plan(0, &pages);
        manager.complete(&planned[0], Err(ApiError::Image("truncated".into())));
        assert!(!manager.is_prefetched(&pages[0]));
        assert!(!manager.is_in_flight(&pages[0]));
        assert!(manager.plan(0, &pages).is_empty());

        manager.reset_chapter();
        assert_eq!(manager.plan(0, &pages), vec![pages[0].clone()]);
    }

    #[test]
    fn fifty_first_insert_clears_cache_and_prefetched_set() {
        let pages = urls(51);
        let mut manager = PrefetchManager::new(3, 50);

        for url in &pages[..50] {
            assert!(!manager.complete(url, Ok(pixel())));
        }
        assert_eq!(manager.cached_len(), 50);
        assert_eq!(manager.prefetched_len(), 50);

        assert!(manager.complete(&pages[50], Ok(pixel())));
        assert_eq!(manager.cached_len(), 0);
        assert_eq!(manager.prefetched_len(), 0);
        assert!(manager.image(&pages[0]).is_none());
    }

    #[test]
    fn cache_limit_never_drops_below_one_window() {
        let pages = urls(10);
        let mut manager = PrefetchManager::new(1, 1);

        let planned = manager.plan(4, &pages);
        assert_eq!(planned.len(), 3);
        for url in &planned {
            assert!(!manager.complete(url, Ok(pixel())));
        }
        assert_eq!(manager.cached_len(), 3);

        let next = manager.plan(5, &pages);
        assert_eq!(next, vec![pages[6].clone()]);
        assert!(manager.complete(&pages[6], Ok(pixel())));
        assert!(manager.image(&pages[5]).is_none());
    }

    #[test]
    fn late_completions_from_old_chapter_are_harmless() {
        let old = urls(4);
        let mut manager = PrefetchManager::default();
        let pending = manager.plan(0, &old);

        manager.reset_chapter();
        let new: Vec<String> = (0..4).map(|i| format!("https://cdn.example/next/{i}.jpg")).collect();
        let planned = manager.plan(0, &new);
        assert_eq!(planned.len(), 4);

        manager.complete(&pending[0], Ok(pixel()));
        assert!(manager.image(&old[0]).is_some());
        assert!(manager.is_in_flight(&new[0]));
    }
}
