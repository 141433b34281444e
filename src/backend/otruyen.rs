use image::DynamicImage;
use serde_json::Value;
use std::io::Cursor;
use std::time::Duration;

use super::error::ApiError;
use crate::config::ApiConfig;

/// The `/danh-sach/{type}` listings the API exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListKind {
    New,
    Upcoming,
    Ongoing,
    Completed,
}

impl ListKind {
    pub const ALL: [ListKind; 4] = [
        ListKind::New,
        ListKind::Upcoming,
        ListKind::Ongoing,
        ListKind::Completed,
    ];

    pub fn slug(self) -> &'static str {
        match self {
            ListKind::New => "truyen-moi",
            ListKind::Upcoming => "sap-ra-mat",
            ListKind::Ongoing => "dang-phat-hanh",
            ListKind::Completed => "hoan-thanh",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ListKind::New => "New Releases",
            ListKind::Upcoming => "Coming Soon",
            ListKind::Ongoing => "Ongoing",
            ListKind::Completed => "Completed",
        }
    }
}

/// Thin client over the OTruyen endpoints. Every call returns the raw JSON body;
/// shaping happens in `normalize`.
#[derive(Clone)]
pub struct OTruyenClient {
    http: reqwest::Client,
    base_url: String,
}

fn build_client(config: &ApiConfig) -> Result<reqwest::Client, ApiError> {
    reqwest::Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(ApiError::from)
}

impl OTruyenClient {
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        Ok(Self {
            http: build_client(config)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn home_url(&self) -> String {
        format!("{}/home", self.base_url)
    }

    pub fn list_url(&self, kind: ListKind, page: u32) -> String {
        format!("{}/danh-sach/{}?page={}", self.base_url, kind.slug(), page)
    }

    pub fn categories_url(&self) -> String {
        format!("{}/the-loai", self.base_url)
    }

    pub fn category_url(&self, slug: &str, page: u32) -> String {
        format!(
            "{}/the-loai/{}?page={}",
            self.base_url,
            urlencoding::encode(slug),
            page
        )
    }

    pub fn detail_url(&self, slug: &str) -> String {
        format!("{}/truyen-tranh/{}", self.base_url, urlencoding::encode(slug))
    }

    pub fn search_url(&self, keyword: &str) -> String {
        format!(
            "{}/tim-kiem?keyword={}",
            self.base_url,
            urlencoding::encode(keyword)
        )
    }

    pub async fn home(&self) -> Result<Value, ApiError> {
        self.get_json(&self.home_url()).await
    }

    pub async fn list(&self, kind: ListKind, page: u32) -> Result<Value, ApiError> {
        self.get_json(&self.list_url(kind, page)).await
    }

    pub async fn categories(&self) -> Result<Value, ApiError> {
        self.get_json(&self.categories_url()).await
    }

    pub async fn category(&self, slug: &str, page: u32) -> Result<Value, ApiError> {
        self.get_json(&self.category_url(slug, page)).await
    }

    pub async fn detail(&self, slug: &str) -> Result<Value, ApiError> {
        self.get_json(&self.detail_url(slug)).await
    }

    pub async fn search(&self, keyword: &str) -> Result<Value, ApiError> {
        self.get_json(&self.search_url(keyword)).await
    }

    /// Chapter payloads live on a separate host; the key is already a full URL.
    pub async fn chapter(&self, chapter_api_url: &str) -> Result<Value, ApiError> {
        self.get_json(chapter_api_url).await
    }

    pub async fn fetch_image(&self, url: &str) -> Result<DynamicImage, ApiError> {
        if url.is_empty() {
            return Err(ApiError::Image("empty image url".into()));
        }

        let response = self.http.get(url).send().await?.error_for_status()?;
        let bytes = response.bytes().await?;

        let image = image::ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| ApiError::Image(e.to_string()))?
            .decode()?;
        Ok(image)
    }

    async fn get_json(&self, url: &str) -> Result<Value, ApiError> {
        log::debug!("GET {url}");
        let response = self
            .http
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json::<Value>().await?)
    }
}
