//! Shapes raw OTruyen payloads into the records the UI and reader work with.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use super::error::ApiError;

/// Used when a listing payload does not name its image CDN.
pub const DEFAULT_CDN: &str = "https://img.otruyenapi.com";

/// Opaque chapter identity: the chapter's API URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChapterKey(String);

impl ChapterKey {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChapterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MangaStatus {
    Ongoing,
    Completed,
    Hiatus,
    Cancelled,
    #[default]
    Unknown,
}

impl MangaStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "ongoing" => MangaStatus::Ongoing,
            "completed" => MangaStatus::Completed,
            "hiatus" => MangaStatus::Hiatus,
            "cancelled" => MangaStatus::Cancelled,
            _ => MangaStatus::Unknown,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MangaStatus::Ongoing => "Ongoing",
            MangaStatus::Completed => "Completed",
            MangaStatus::Hiatus => "Hiatus",
            MangaStatus::Cancelled => "Cancelled",
            MangaStatus::Unknown => "Unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MangaSummary {
    pub id: String,
    pub slug: String,
    pub title: String,
    pub latest_chapter: Option<String>,
    pub cover_url: String,
    pub genres: Vec<String>,
    pub status: MangaStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub total_items: u32,
    pub per_page: u32,
    pub current_page: u32,
}

impl Pagination {
    pub fn total_pages(&self) -> u32 {
        if self.per_page == 0 {
            return 1;
        }
        self.total_items.div_ceil(self.per_page).max(1)
    }

    pub fn has_next(&self) -> bool {
        self.current_page < self.total_pages()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogPage {
    pub items: Vec<MangaSummary>,
    pub pagination: Option<Pagination>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterEntry {
    pub key: ChapterKey,
    pub name: String,
    pub title: Option<String>,
}

impl ChapterEntry {
    pub fn display_name(&self) -> String {
        let name = format_chapter_name(&self.name);
        match &self.title {
            Some(title) => format!("{name} - {title}"),
            None => name,
        }
    }
}

/// Sibling chapters of one manga in API order (oldest first).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChapterIndex {
    entries: Vec<ChapterEntry>,
}

impl ChapterIndex {
    pub fn new(entries: Vec<ChapterEntry>) -> Self {
        Self { entries }
    }

    pub fn position(&self, key: &ChapterKey) -> Option<usize> {
        self.entries.iter().position(|e| &e.key == key)
    }

    pub fn get(&self, idx: usize) -> Option<&ChapterEntry> {
        self.entries.get(idx)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ChapterEntry] {
        &self.entries
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MangaDetail {
    pub id: String,
    pub slug: String,
    pub title: String,
    pub origin_names: Vec<String>,
    pub authors: Vec<String>,
    pub status: MangaStatus,
    pub genres: Vec<String>,
    pub description: String,
    pub cover_url: String,
    pub updated_at: Option<String>,
    pub chapters: ChapterIndex,
}

impl MangaDetail {
    pub fn summary(&self) -> MangaSummary {
        MangaSummary {
            id: self.id.clone(),
            slug: self.slug.clone(),
            title: self.title.clone(),
            latest_chapter: self
                .chapters
                .entries()
                .last()
                .map(|c| format_chapter_name(&c.name)),
            cover_url: self.cover_url.clone(),
            genres: self.genres.clone(),
            status: self.status,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRef {
    pub index: usize,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterManifest {
    pub key: ChapterKey,
    pub manga_name: String,
    pub chapter_name: String,
    pub chapter_title: Option<String>,
    pub pages: Vec<PageRef>,
}

impl ChapterManifest {
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn last_index(&self) -> usize {
        self.pages.len().saturating_sub(1)
    }

    pub fn urls(&self) -> Vec<String> {
        self.pages.iter().map(|p| p.url.clone()).collect()
    }

    pub fn index_of(&self, url: &str) -> Option<usize> {
        self.pages.iter().find(|p| p.url == url).map(|p| p.index)
    }
}

// Raw payloads. Arrays are optional because the API sends `null` for empty lists.

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ListData {
    #[serde(default)]
    items: Option<Vec<MangaItem>>,
    #[serde(default)]
    params: Option<ListParams>,
    #[serde(rename = "APP_DOMAIN_CDN_IMAGE", default)]
    cdn: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListParams {
    #[serde(default)]
    pagination: Option<PaginationPayload>,
}

#[derive(Debug, Deserialize)]
struct PaginationPayload {
    #[serde(rename = "totalItems", default)]
    total_items: u32,
    #[serde(rename = "totalItemsPerPage", default)]
    per_page: u32,
    #[serde(rename = "currentPage", default)]
    current_page: u32,
}

#[derive(Debug, Deserialize)]
struct MangaItem {
    #[serde(rename = "_id", default)]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    slug: String,
    #[serde(default)]
    thumb_url: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    category: Option<Vec<CategoryItem>>,
    #[serde(rename = "chaptersLatest", default)]
    chapters_latest: Option<Vec<ChapterItem>>,
}

#[derive(Debug, Deserialize)]
struct CategoryItem {
    #[serde(rename = "_id", alias = "id", default)]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    slug: String,
}

#[derive(Debug, Deserialize)]
struct CategoryList {
    #[serde(default)]
    items: Option<Vec<CategoryItem>>,
}

#[derive(Debug, Deserialize)]
struct DetailData {
    #[serde(default)]
    item: Option<DetailItem>,
    #[serde(rename = "APP_DOMAIN_CDN_IMAGE", default)]
    cdn: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DetailItem {
    #[serde(rename = "_id", default)]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    slug: String,
    #[serde(default)]
    origin_name: Option<Vec<String>>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    thumb_url: Option<String>,
    #[serde(default)]
    author: Option<Vec<String>>,
    #[serde(default)]
    category: Option<Vec<CategoryItem>>,
    #[serde(default)]
    chapters: Option<Vec<ServerPayload>>,
    #[serde(rename = "updatedAt", default)]
    updated_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ServerPayload {
    #[serde(default)]
    server_data: Option<Vec<ChapterItem>>,
}

#[derive(Debug, Deserialize)]
struct ChapterItem {
    #[serde(default)]
    chapter_name: String,
    #[serde(default)]
    chapter_title: Option<String>,
    #[serde(default)]
    chapter_api_data: String,
}

#[derive(Debug, Deserialize)]
struct ChapterData {
    #[serde(default)]
    domain_cdn: Option<String>,
    #[serde(default)]
    item: Option<ChapterPayload>,
}

#[derive(Debug, Deserialize)]
struct ChapterPayload {
    #[serde(default)]
    comic_name: String,
    #[serde(default)]
    chapter_name: String,
    #[serde(default)]
    chapter_title: Option<String>,
    #[serde(default)]
    chapter_path: String,
    #[serde(default)]
    chapter_image: Option<Vec<ImagePayload>>,
}

#[derive(Debug, Deserialize)]
struct ImagePayload {
    #[serde(default)]
    image_file: String,
}

fn data_of<'a, T: Deserialize<'a>>(value: &'a Value, what: &str) -> Result<T, ApiError> {
    let envelope = Envelope::<T>::deserialize(value)?;
    envelope
        .data
        .ok_or_else(|| ApiError::NotFound(format!("{what}: response has no data")))
}

fn non_empty(text: Option<String>) -> Option<String> {
    text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
}

fn cdn_or_default(cdn: Option<String>) -> String {
    non_empty(cdn).unwrap_or_else(|| DEFAULT_CDN.to_string())
}

pub fn cover_url(thumb: &str, cdn: &str) -> String {
    if thumb.is_empty() {
        return String::new();
    }
    if thumb.starts_with("http") {
        return thumb.to_string();
    }
    format!(
        "{}/uploads/comics/{}",
        cdn.trim_end_matches('/'),
        thumb.trim_start_matches('/')
    )
}

pub fn page_url(cdn: &str, chapter_path: &str, image_file: &str) -> String {
    format!(
        "{}/{}/{}",
        cdn.trim_end_matches('/'),
        chapter_path.trim_matches('/'),
        image_file.trim_start_matches('/')
    )
}

pub fn format_chapter_name(name: &str) -> String {
    if name.to_lowercase().contains("chapter") {
        name.to_string()
    } else {
        format!("Chapter {name}")
    }
}

/// Flattens the HTML blurb the detail endpoint returns into plain text.
pub fn strip_html(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                text.push(' ');
            }
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }

    let decoded = text
        .replace("&nbsp;", " ")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&");

    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn summary_from(item: MangaItem, cdn: &str) -> MangaSummary {
    let latest_chapter = item
        .chapters_latest
        .as_ref()
        .and_then(|c| c.first())
        .map(|c| format_chapter_name(&c.chapter_name));

    MangaSummary {
        id: item.id,
        slug: item.slug,
        title: item.name,
        latest_chapter,
        cover_url: cover_url(item.thumb_url.as_deref().unwrap_or_default(), cdn),
        genres: item
            .category
            .unwrap_or_default()
            .into_iter()
            .map(|c| c.name)
            .collect(),
        status: MangaStatus::parse(item.status.as_deref().unwrap_or_default()),
    }
}

/// `/home`, `/danh-sach/*`, `/the-loai/{slug}` and `/tim-kiem` all share this shape.
pub fn catalog_page(value: &Value) -> Result<CatalogPage, ApiError> {
    let data: ListData = data_of(value, "listing")?;
    let cdn = cdn_or_default(data.cdn);

    let items = data
        .items
        .unwrap_or_default()
        .into_iter()
        .filter(|item| !item.slug.is_empty())
        .map(|item| summary_from(item, &cdn))
        .collect();

    let pagination = data
        .params
        .and_then(|p| p.pagination)
        .map(|p| Pagination {
            total_items: p.total_items,
            per_page: p.per_page,
            current_page: p.current_page.max(1),
        });

    Ok(CatalogPage { items, pagination })
}

pub fn categories(value: &Value) -> Result<Vec<Category>, ApiError> {
    let data: CategoryList = data_of(value, "categories")?;
    Ok(data
        .items
        .unwrap_or_default()
        .into_iter()
        .filter(|c| !c.slug.is_empty())
        .map(|c| Category {
            id: c.id,
            name: c.name,
            slug: c.slug,
        })
        .collect())
}

pub fn manga_detail(value: &Value) -> Result<MangaDetail, ApiError> {
    let data: DetailData = data_of(value, "manga")?;
    let cdn = cdn_or_default(data.cdn);
    let item = data
        .item
        .ok_or_else(|| ApiError::NotFound("manga: response has no item".into()))?;

    let chapters = item
        .chapters
        .unwrap_or_default()
        .into_iter()
        .next()
        .and_then(|server| server.server_data)
        .unwrap_or_default()
        .into_iter()
        .filter(|c| !c.chapter_api_data.is_empty())
        .map(|c| ChapterEntry {
            key: ChapterKey::new(c.chapter_api_data),
            name: c.chapter_name,
            title: non_empty(c.chapter_title),
        })
        .collect();

    Ok(MangaDetail {
        id: item.id,
        slug: item.slug,
        title: item.name,
        origin_names: item
            .origin_name
            .unwrap_or_default()
            .into_iter()
            .filter(|n| !n.trim().is_empty())
            .collect(),
        authors: item
            .author
            .unwrap_or_default()
            .into_iter()
            .filter(|a| !a.trim().is_empty())
            .collect(),
        status: MangaStatus::parse(item.status.as_deref().unwrap_or_default()),
        genres: item
            .category
            .unwrap_or_default()
            .into_iter()
            .map(|c| c.name)
            .collect(),
        description: strip_html(item.content.as_deref().unwrap_or_default()),
        cover_url: cover_url(item.thumb_url.as_deref().unwrap_or_default(), &cdn),
        updated_at: item.updated_at,
        chapters: ChapterIndex::new(chapters),
    })
}

pub fn chapter_manifest(value: &Value, key: &ChapterKey) -> Result<ChapterManifest, ApiError> {
    let data: ChapterData = data_of(value, "chapter")?;
    let item = data
        .item
        .ok_or_else(|| ApiError::NotFound(format!("chapter {key}")))?;
    let cdn = non_empty(data.domain_cdn)
        .ok_or_else(|| ApiError::Malformed(format!("chapter {key}: no domain_cdn")))?;

    let pages: Vec<PageRef> = item
        .chapter_image
        .unwrap_or_default()
        .into_iter()
        .filter(|img| !img.image_file.is_empty())
        .enumerate()
        .map(|(index, img)| PageRef {
            index,
            url: page_url(&cdn, &item.chapter_path, &img.image_file),
        })
        .collect();

    if pages.is_empty() {
        return Err(ApiError::NotFound(format!("chapter {key}: no pages")));
    }

    Ok(ChapterManifest {
        key: key.clone(),
        manga_name: item.comic_name,
        chapter_name: item.chapter_name,
        chapter_title: non_empty(item.chapter_title),
        pages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn home_payload() -> Value {
        json!({
            "status": "success",
            "data": {
                "items": [
                    {
                        "_id": "66a1",
                        "name": "Dao Hai Tac",
                        "slug": "dao-hai-tac",
                        "thumb_url": "dao-hai-tac-thumb.jpg",
                        "status": "ongoing",
                        "category": [{"id": "c1", "name": "Action", "slug": "action"}],
                        "chaptersLatest": [{"chapter_name": "1120", "chapter_api_data": "https://sv1.example/c/1"}]
                    },
                    {
                        "_id": "66a2",
                        "name": "Finished One",
                        "slug": "finished-one",
                        "thumb_url": "https://cdn.other/cover.png",
                        "status": "completed",
                        "category": null,
                        "chaptersLatest": null
                    }
                ],
                "params": {"pagination": {"totalItems": 45, "totalItemsPerPage": 24, "currentPage": 1}},
                "APP_DOMAIN_CDN_IMAGE": "https://img.example/"
            }
        })
    }

    #[test]
    fn normalizes_listing() {
        let page = catalog_page(&home_payload()).unwrap();
        assert_eq!(page.items.len(), 2);

        let first = &page.items[0];
        assert_eq!(first.slug, "dao-hai-tac");
        assert_eq!(
            first.cover_url,
            "https://img.example/uploads/comics/dao-hai-tac-thumb.jpg"
        );
        assert_eq!(first.latest_chapter.as_deref(), Some("Chapter 1120"));
        assert_eq!(first.genres, vec!["Action".to_string()]);
        assert_eq!(first.status, MangaStatus::Ongoing);

        let second = &page.items[1];
        assert_eq!(second.cover_url, "https://cdn.other/cover.png");
        assert_eq!(second.latest_chapter, None);
        assert!(second.genres.is_empty());

        let pagination = page.pagination.unwrap();
        assert_eq!(pagination.total_pages(), 2);
        assert!(pagination.has_next());
    }

    #[test]
    fn listing_without_data_is_not_found() {
        let err = catalog_page(&json!({"status": "error"})).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn normalizes_detail_and_chapter_index() {
        let payload = json!({
            "data": {
                "item": {
                    "_id": "66a1",
                    "name": "Dao Hai Tac",
                    "slug": "dao-hai-tac",
                    "origin_name": ["One Piece", ""],
                    "content": "<p>Luffy &amp; crew</p><p>set sail.</p>",
                    "status": "ongoing",
                    "thumb_url": "dao-hai-tac-thumb.jpg",
                    "author": ["Oda Eiichiro"],
                    "category": [{"id": "c1", "name": "Action", "slug": "action"}],
                    "chapters": [{
                        "server_name": "Server #1",
                        "server_data": [
                            {"chapter_name": "1", "chapter_title": "", "chapter_api_data": "https://sv1.example/c/1"},
                            {"chapter_name": "2", "chapter_title": "Romance Dawn", "chapter_api_data": "https://sv1.example/c/2"}
                        ]
                    }],
                    "updatedAt": "2026-01-01T00:00:00.000Z"
                },
                "APP_DOMAIN_CDN_IMAGE": "https://img.example"
            }
        });

        let detail = manga_detail(&payload).unwrap();
        assert_eq!(detail.origin_names, vec!["One Piece".to_string()]);
        assert_eq!(detail.description, "Luffy & crew set sail.");
        assert_eq!(detail.chapters.len(), 2);
        assert_eq!(
            detail
                .chapters
                .position(&ChapterKey::new("https://sv1.example/c/2")),
            Some(1)
        );
        let first = detail.chapters.get(0).unwrap();
        assert_eq!(first.title, None);
        assert_eq!(first.display_name(), "Chapter 1");
        assert_eq!(
            detail.chapters.get(1).unwrap().display_name(),
            "Chapter 2 - Romance Dawn"
        );
        assert_eq!(detail.summary().latest_chapter.as_deref(), Some("Chapter 2"));
    }

    #[test]
    fn builds_chapter_manifest_urls() {
        let key = ChapterKey::new("https://sv1.example/c/1");
        let payload = json!({
            "data": {
                "domain_cdn": "https://sv1.cdn.example/",
                "item": {
                    "comic_name": "Dao Hai Tac",
                    "chapter_name": "1",
                    "chapter_path": "/uploads/20240101/abc/chapter_1",
                    "chapter_image": [
                        {"image_page": 0, "image_file": "page_0.jpg"},
                        {"image_page": 1, "image_file": "page_1.jpg"}
                    ]
                }
            }
        });

        let manifest = chapter_manifest(&payload, &key).unwrap();
        assert_eq!(manifest.len(), 2);
        assert_eq!(manifest.last_index(), 1);
        assert_eq!(
            manifest.pages[1].url,
            "https://sv1.cdn.example/uploads/20240101/abc/chapter_1/page_1.jpg"
        );
        assert_eq!(manifest.index_of(&manifest.pages[0].url.clone()), Some(0));
    }

    #[test]
    fn chapter_without_item_or_pages_is_not_found() {
        let key = ChapterKey::new("https://sv1.example/c/404");
        let missing = json!({"data": {"domain_cdn": "https://cdn"}});
        assert!(chapter_manifest(&missing, &key).unwrap_err().is_not_found());

        let empty = json!({"data": {"domain_cdn": "https://cdn", "item": {"chapter_path": "p", "chapter_image": []}}});
        assert!(chapter_manifest(&empty, &key).unwrap_err().is_not_found());
    }

    #[test]
    fn chapter_names_and_statuses() {
        assert_eq!(format_chapter_name("12"), "Chapter 12");
        assert_eq!(format_chapter_name("Chapter 12.5"), "Chapter 12.5");
        assert_eq!(MangaStatus::parse("Completed"), MangaStatus::Completed);
        assert_eq!(MangaStatus::parse("coming_soon").label(), "Unknown");
    }

    #[test]
    fn categories_skip_entries_without_slug() {
        let payload = json!({"data": {"items": [
            {"_id": "1", "name": "Action", "slug": "action"},
            {"_id": "2", "name": "Broken", "slug": ""}
        ]}});
        let list = categories(&payload).unwrap();
        assert_eq!(
            list,
            vec![Category {
                id: "1".into(),
                name: "Action".into(),
                slug: "action".into()
            }]
        );
    }
}
