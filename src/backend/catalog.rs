use image::DynamicImage;
use std::time::Duration;

use super::error::ApiError;
use super::normalize::{self, CatalogPage, Category, ChapterKey, ChapterManifest, MangaDetail};
use super::otruyen::{ListKind, OTruyenClient};
use super::query_cache::{QueryCache, QueryKey, RetryPolicy};
use crate::config::Config;

/// Listing and detail queries retry less than the client-wide default.
const PAGE_QUERY_RETRIES: u32 = 2;

/// Everything the views need to talk to the API: the gateway client behind the
/// shared query cache. Cheap to clone into background tasks.
#[derive(Clone)]
pub struct Catalog {
    client: OTruyenClient,
    cache: QueryCache,
    retry: RetryPolicy,
    min_search_length: usize,
}

impl Catalog {
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        Ok(Self {
            client: OTruyenClient::new(&config.api)?,
            cache: QueryCache::new(Duration::from_secs(config.cache.gc_secs)),
            retry: RetryPolicy::from_config(&config.cache),
            min_search_length: config.search.min_length,
        })
    }

    pub fn search_enabled(&self, keyword: &str) -> bool {
        keyword.trim().chars().count() >= self.min_search_length
    }

    pub async fn home(&self) -> Result<CatalogPage, ApiError> {
        let client = self.client.clone();
        let value = self
            .cache
            .fetch(
                QueryKey::Home,
                self.retry.with_max_retries(PAGE_QUERY_RETRIES),
                move || {
                    let client = client.clone();
                    async move { client.home().await }
                },
            )
            .await?;
        normalize::catalog_page(&value)
    }

    pub async fn list(&self, kind: ListKind, page: u32) -> Result<CatalogPage, ApiError> {
        let client = self.client.clone();
        let value = self
            .cache
            .fetch(
                QueryKey::List { kind, page },
                self.retry.with_max_retries(PAGE_QUERY_RETRIES),
                move || {
                    let client = client.clone();
                    async move { client.list(kind, page).await }
                },
            )
            .await?;
        normalize::catalog_page(&value)
    }

    pub async fn categories(&self) -> Result<Vec<Category>, ApiError> {
        let client = self.client.clone();
        let value = self
            .cache
            .fetch(QueryKey::Categories, self.retry, move || {
                let client = client.clone();
                async move { client.categories().await }
            })
            .await?;
        normalize::categories(&value)
    }

    pub async fn by_category(&self, slug: &str, page: u32) -> Result<CatalogPage, ApiError> {
        let client = self.client.clone();
        let owned = slug.to_string();
        let value = self
            .cache
            .fetch(
                QueryKey::Category {
                    slug: owned.clone(),
                    page,
                },
                self.retry,
                move || {
                    let client = client.clone();
                    let slug = owned.clone();
                    async move { client.category(&slug, page).await }
                },
            )
            .await?;
        normalize::catalog_page(&value)
    }

    pub async fn detail(&self, slug: &str) -> Result<MangaDetail, ApiError> {
        let client = self.client.clone();
        let owned = slug.to_string();
        let value = self
            .cache
            .fetch(
                QueryKey::Detail(owned.clone()),
                self.retry.with_max_retries(PAGE_QUERY_RETRIES),
                move || {
                    let client = client.clone();
                    let slug = owned.clone();
                    async move { client.detail(&slug).await }
                },
            )
            .await?;
        normalize::manga_detail(&value)
    }

    /// Keywords below the minimum length short-circuit to an empty page.
    pub async fn search(&self, keyword: &str) -> Result<CatalogPage, ApiError> {
        let keyword = keyword.trim().to_string();
        if !self.search_enabled(&keyword) {
            return Ok(CatalogPage::default());
        }

        let client = self.client.clone();
        let owned = keyword.clone();
        let value = self
            .cache
            .fetch(QueryKey::Search(keyword), self.retry, move || {
                let client = client.clone();
                let keyword = owned.clone();
                async move { client.search(&keyword).await }
            })
            .await?;
        normalize::catalog_page(&value)
    }

    pub async fn chapter(&self, key: &ChapterKey) -> Result<ChapterManifest, ApiError> {
        let client = self.client.clone();
        let url = key.as_str().to_string();
        let value = self
            .cache
            .fetch(QueryKey::Chapter(key.clone()), self.retry, move || {
                let client = client.clone();
                let url = url.clone();
                async move { client.chapter(&url).await }
            })
            .await?;
        normalize::chapter_manifest(&value, key)
    }

    /// Images bypass the query cache; page images are cached decoded by the reader.
    pub async fn image(&self, url: &str) -> Result<DynamicImage, ApiError> {
        self.client.fetch_image(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn short_searches_are_not_sent() {
        let mut config = Config::default();
        // Unroutable: any request that slipped through would fail.
        config.api.base_url = "http://127.0.0.1:9".into();
        let catalog = Catalog::new(&config).unwrap();

        assert!(!catalog.search_enabled(" ab "));
        assert!(catalog.search_enabled("abc"));
        let page = catalog.search("ab").await.unwrap();
        assert!(page.items.is_empty());
        assert!(page.pagination.is_none());
    }
}
