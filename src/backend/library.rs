use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use super::normalize::{ChapterKey, MangaStatus, MangaSummary};

/// Bookmarks and reading history, saved as one JSON file.
#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Library {
    pub manga_ids: HashSet<String>,
    #[serde(default)]
    pub manga_cache: Vec<BookmarkedManga>,
    #[serde(default)]
    pub history: Vec<ReadingProgress>,
    #[serde(skip)]
    path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookmarkedManga {
    pub id: String,
    pub slug: String,
    pub title: String,
    pub status: String,
    pub cover_url: String,
    #[serde(default)]
    pub latest_chapter: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadingProgress {
    pub manga_id: String,
    pub manga_slug: String,
    pub manga_title: String,
    pub chapter_key: ChapterKey,
    pub chapter_name: String,
    pub page: usize,
    pub read_at: u64,
}

impl From<&MangaSummary> for BookmarkedManga {
    fn from(manga: &MangaSummary) -> Self {
        BookmarkedManga {
            id: manga.id.clone(),
            slug: manga.slug.clone(),
            title: manga.title.clone(),
            status: manga.status.label().to_string(),
            cover_url: manga.cover_url.clone(),
            latest_chapter: manga.latest_chapter.clone(),
            genres: manga.genres.clone(),
        }
    }
}

impl From<&ReadingProgress> for MangaSummary {
    fn from(progress: &ReadingProgress) -> Self {
        MangaSummary {
            id: progress.manga_id.clone(),
            slug: progress.manga_slug.clone(),
            title: progress.manga_title.clone(),
            latest_chapter: None,
            cover_url: String::new(),
            genres: Vec::new(),
            status: MangaStatus::Unknown,
        }
    }
}

impl From<&BookmarkedManga> for MangaSummary {
    fn from(bm: &BookmarkedManga) -> Self {
        MangaSummary {
            id: bm.id.clone(),
            slug: bm.slug.clone(),
            title: bm.title.clone(),
            latest_chapter: bm.latest_chapter.clone(),
            cover_url: bm.cover_url.clone(),
            genres: bm.genres.clone(),
            status: MangaStatus::parse(&bm.status),
        }
    }
}

fn default_library_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("truyen-tui")
        .join("library.json")
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

impl Library {
    pub fn load() -> Self {
        Self::load_from(default_library_path())
    }

    /// Unreadable or corrupt files start an empty library rather than failing.
    pub fn load_from(path: impl Into<PathBuf>) -> Self {
        let path = path.into();

        let mut library = match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str::<Library>(&content).unwrap_or_else(|e| {
                log::warn!("Ignoring corrupt library {}: {e}", path.display());
                Library::default()
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Library::default(),
            Err(e) => {
                log::warn!("Failed to read library {}: {e}", path.display());
                Library::default()
            }
        };

        library.path = path;
        library
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(&self.path, content)
    }

    fn persist(&self) {
        if let Err(e) = self.save() {
            log::error!("Failed to save library {}: {e}", self.path.display());
        }
    }

    pub fn add(&mut self, manga: &MangaSummary) {
        self.manga_ids.insert(manga.id.clone());

        if !self.manga_cache.iter().any(|m| m.id == manga.id) {
            self.manga_cache.push(BookmarkedManga::from(manga));
        }

        self.persist();
    }

    pub fn remove(&mut self, manga_id: &str) {
        self.manga_ids.remove(manga_id);
        self.manga_cache.retain(|m| m.id != manga_id);
        self.persist();
    }

    pub fn is_bookmarked(&self, manga_id: &str) -> bool {
        self.manga_ids.contains(manga_id)
    }

    pub fn toggle(&mut self, manga: &MangaSummary) -> bool {
        if self.is_bookmarked(&manga.id) {
            self.remove(&manga.id);
            false
        } else {
            self.add(manga);
            true
        }
    }

    pub fn bookmarked(&self) -> Vec<MangaSummary> {
        self.manga_cache.iter().map(MangaSummary::from).collect()
    }

    /// One entry per manga; the latest update moves to the front of `recent`.
    pub fn update_progress(
        &mut self,
        manga: &MangaSummary,
        chapter_key: &ChapterKey,
        chapter_name: &str,
        page: usize,
    ) {
        self.history.retain(|h| h.manga_id != manga.id);
        self.history.push(ReadingProgress {
            manga_id: manga.id.clone(),
            manga_slug: manga.slug.clone(),
            manga_title: manga.title.clone(),
            chapter_key: chapter_key.clone(),
            chapter_name: chapter_name.to_string(),
            page,
            read_at: unix_now(),
        });
        self.persist();
    }

    pub fn progress(&self, manga_id: &str) -> Option<&ReadingProgress> {
        self.history.iter().find(|h| h.manga_id == manga_id)
    }

    pub fn recent(&self) -> Vec<&ReadingProgress> {
        self.history.iter().rev().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manga(id: &str) -> MangaSummary {
        MangaSummary {
            id: id.to_string(),
            slug: format!("{id}-slug"),
            title: format!("Title {id}"),
            latest_chapter: Some("Chapter 3".into()),
            cover_url: String::new(),
            genres: vec!["Action".into()],
            status: MangaStatus::Completed,
        }
    }

    #[test]
    fn bookmarks_survive_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("library.json");

        let mut library = Library::load_from(&path);
        assert!(library.toggle(&manga("a")));
        library.add(&manga("b"));
        library.add(&manga("b"));
        assert!(!library.toggle(&manga("a")));

        let reloaded = Library::load_from(&path);
        assert!(!reloaded.is_bookmarked("a"));
        assert!(reloaded.is_bookmarked("b"));
        let listed = reloaded.bookmarked();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].status, MangaStatus::Completed);
        assert_eq!(listed[0].slug, "b-slug");
    }

    #[test]
    fn progress_is_replaced_per_manga() {
        let dir = tempfile::tempdir().unwrap();
        let mut library = Library::load_from(dir.path().join("library.json"));
        let ch1 = ChapterKey::new("https://sv1.example/c/1");
        let ch2 = ChapterKey::new("https://sv1.example/c/2");

        library.update_progress(&manga("a"), &ch1, "1", 4);
        library.update_progress(&manga("b"), &ch1, "1", 0);
        library.update_progress(&manga("a"), &ch2, "2", 7);

        let progress = library.progress("a").unwrap();
        assert_eq!(progress.chapter_key, ch2);
        assert_eq!(progress.page, 7);
        assert_eq!(library.history.len(), 2);

        let recent: Vec<_> = library.recent().iter().map(|h| h.manga_id.clone()).collect();
        assert_eq!(recent, vec!["a".to_string(), "b".to_string()]);

        let reloaded = Library::load_from(library.path().to_path_buf());
        assert_eq!(reloaded.progress("a").map(|p| p.page), Some(7));
    }

    #[test]
    fn corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("library.json");
        fs::write(&path, "{ not json").unwrap();

        let library = Library::load_from(&path);
        assert!(library.bookmarked().is_empty());
        assert!(library.recent().is_empty());
    }
}
