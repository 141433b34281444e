use std::collections::HashMap;

use crate::backend::error::ApiError;
use crate::backend::normalize::{ChapterIndex, ChapterKey, ChapterManifest};
use crate::config::ChapterLanding;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadingMode {
    #[default]
    Single,
    Double,
    Webtoon,
}

impl ReadingMode {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "double" => ReadingMode::Double,
            "webtoon" | "continuous" => ReadingMode::Webtoon,
            _ => ReadingMode::Single,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ReadingMode::Single => "Single",
            ReadingMode::Double => "Double",
            ReadingMode::Webtoon => "Webtoon",
        }
    }

    fn next(self) -> Self {
        match self {
            ReadingMode::Single => ReadingMode::Double,
            ReadingMode::Double => ReadingMode::Webtoon,
            ReadingMode::Webtoon => ReadingMode::Single,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageFit {
    #[default]
    Width,
    Height,
    Original,
}

impl PageFit {
    pub fn label(self) -> &'static str {
        match self {
            PageFit::Width => "Fit width",
            PageFit::Height => "Fit height",
            PageFit::Original => "Original",
        }
    }

    fn next(self) -> Self {
        match self {
            PageFit::Width => PageFit::Height,
            PageFit::Height => PageFit::Original,
            PageFit::Original => PageFit::Width,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageLoadState {
    Loading,
    Loaded,
    Errored,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChapterStatus {
    Loading,
    Ready(ChapterManifest),
    Failed(ApiError),
}

/// What a navigation call did, so the event loop knows which effect to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Stay,
    Page(usize),
    Chapter(ChapterKey),
}

/// A terminal is "mobile" when its pixel width is at or under the breakpoint.
pub fn is_mobile_width(width_px: u32, breakpoint_px: u32) -> bool {
    width_px <= breakpoint_px
}

/// Where the reader is: which chapter is loaded, which page is shown, and how.
///
/// Every chapter switch bumps `generation`; manifests fetched for an older
/// generation are rejected by `apply_manifest`.
pub struct ReaderSession {
    chapter_key: ChapterKey,
    generation: u64,
    status: ChapterStatus,
    chapters: ChapterIndex,
    current_page: usize,
    mode: ReadingMode,
    page_fit: PageFit,
    mobile: bool,
    fullscreen: bool,
    landing: ChapterLanding,
    land_on_last: bool,
    image_states: HashMap<usize, ImageLoadState>,
}

impl ReaderSession {
    pub fn new(chapter_key: ChapterKey, mode: ReadingMode, landing: ChapterLanding) -> Self {
        Self {
            chapter_key,
            generation: 0,
            status: ChapterStatus::Loading,
            chapters: ChapterIndex::default(),
            current_page: 0,
            mode,
            page_fit: PageFit::default(),
            mobile: false,
            fullscreen: false,
            landing,
            land_on_last: false,
            image_states: HashMap::new(),
        }
    }

    pub fn chapter_key(&self) -> &ChapterKey {
        &self.chapter_key
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn status(&self) -> &ChapterStatus {
        &self.status
    }

    pub fn manifest(&self) -> Option<&ChapterManifest> {
        match &self.status {
            ChapterStatus::Ready(manifest) => Some(manifest),
            _ => None,
        }
    }

    pub fn chapters(&self) -> &ChapterIndex {
        &self.chapters
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn page_count(&self) -> usize {
        self.manifest().map_or(0, ChapterManifest::len)
    }

    pub fn mode(&self) -> ReadingMode {
        self.mode
    }

    pub fn page_fit(&self) -> PageFit {
        self.page_fit
    }

    pub fn is_mobile(&self) -> bool {
        self.mobile
    }

    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }

    pub fn page_urls(&self) -> Vec<String> {
        self.manifest().map(ChapterManifest::urls).unwrap_or_default()
    }

    pub fn set_chapter_index(&mut self, chapters: ChapterIndex) {
        self.chapters = chapters;
    }

    /// Position of the active chapter among its siblings.
    pub fn chapter_position(&self) -> Option<usize> {
        self.chapters.position(&self.chapter_key)
    }

    pub fn has_next_chapter(&self) -> bool {
        self.chapter_position()
            .is_some_and(|i| i + 1 < self.chapters.len())
    }

    pub fn has_previous_chapter(&self) -> bool {
        self.chapter_position().is_some_and(|i| i > 0)
    }

    pub fn next_page(&mut self) -> Navigation {
        let Some(last) = self.manifest().map(ChapterManifest::last_index) else {
            return Navigation::Stay;
        };

        if self.current_page < last {
            self.current_page += 1;
            Navigation::Page(self.current_page)
        } else {
            self.next_chapter()
        }
    }

    pub fn previous_page(&mut self) -> Navigation {
        if self.manifest().is_none() {
            return Navigation::Stay;
        }

        if self.current_page > 0 {
            self.current_page -= 1;
            return Navigation::Page(self.current_page);
        }

        let navigation = self.previous_chapter();
        if matches!(navigation, Navigation::Chapter(_)) && self.landing == ChapterLanding::Last {
            self.land_on_last = true;
        }
        navigation
    }

    /// Out-of-range pages are ignored.
    pub fn go_to_page(&mut self, page: usize) -> Navigation {
        match self.manifest().map(ChapterManifest::last_index) {
            Some(last) if page <= last => {
                self.current_page = page;
                Navigation::Page(page)
            }
            _ => Navigation::Stay,
        }
    }

    pub fn next_chapter(&mut self) -> Navigation {
        match self.chapter_position() {
            Some(i) if i + 1 < self.chapters.len() => self.switch_to(i + 1),
            _ => Navigation::Stay,
        }
    }

    pub fn previous_chapter(&mut self) -> Navigation {
        match self.chapter_position() {
            Some(i) if i > 0 => self.switch_to(i - 1),
            _ => Navigation::Stay,
        }
    }

    fn switch_to(&mut self, idx: usize) -> Navigation {
        match self.chapters.get(idx).map(|entry| entry.key.clone()) {
            Some(key) => self.go_to_chapter(key),
            None => Navigation::Stay,
        }
    }

    pub fn go_to_chapter(&mut self, key: ChapterKey) -> Navigation {
        log::info!("switching to chapter {key}");
        self.chapter_key = key.clone();
        self.generation += 1;
        self.status = ChapterStatus::Loading;
        self.current_page = 0;
        self.land_on_last = false;
        self.image_states.clear();
        Navigation::Chapter(key)
    }

    /// Reloads the active chapter after a failure.
    pub fn retry(&mut self) -> Navigation {
        self.go_to_chapter(self.chapter_key.clone())
    }

    /// Returns `false` when the result belongs to a chapter load that has since
    /// been superseded.
    pub fn apply_manifest(
        &mut self,
        generation: u64,
        result: Result<ChapterManifest, ApiError>,
    ) -> bool {
        if generation != self.generation {
            log::debug!(
                "dropping chapter result for generation {generation}, current is {}",
                self.generation
            );
            return false;
        }

        self.status = match result {
            Ok(manifest) => {
                self.current_page = if self.land_on_last {
                    manifest.last_index()
                } else {
                    0
                };
                ChapterStatus::Ready(manifest)
            }
            Err(err) => {
                log::warn!("chapter {} failed to load: {err}", self.chapter_key);
                ChapterStatus::Failed(err)
            }
        };
        self.land_on_last = false;
        true
    }

    /// Re-run on every viewport reclassification.
    pub fn set_mobile(&mut self, mobile: bool) {
        self.mobile = mobile;
        if mobile && self.mode != ReadingMode::Webtoon {
            log::debug!("mobile viewport, forcing webtoon mode");
            self.mode = ReadingMode::Webtoon;
        }
    }

    /// Mobile viewports only accept webtoon mode.
    pub fn set_reading_mode(&mut self, mode: ReadingMode) -> bool {
        if self.mobile && mode != ReadingMode::Webtoon {
            return false;
        }
        self.mode = mode;
        true
    }

    pub fn cycle_reading_mode(&mut self) -> bool {
        self.set_reading_mode(self.mode.next())
    }

    pub fn cycle_page_fit(&mut self) {
        self.page_fit = self.page_fit.next();
    }

    pub fn toggle_fullscreen(&mut self) {
        self.fullscreen = !self.fullscreen;
    }

    pub fn exit_fullscreen(&mut self) {
        self.fullscreen = false;
    }

    pub fn mark_image(&mut self, page: usize, state: ImageLoadState) {
        if page < self.page_count() {
            self.image_states.insert(page, state);
        }
    }

    /// Marks the page showing `url` in the active chapter, if any.
    pub fn mark_url(&mut self, url: &str, state: ImageLoadState) -> Option<usize> {
        let page = self.manifest()?.index_of(url)?;
        self.mark_image(page, state);
        Some(page)
    }

    pub fn image_state(&self, page: usize) -> Option<ImageLoadState> {
        self.image_states.get(&page).copied()
    }

    #[cfg(test)]
    pub fn loaded_state_count(&self) -> usize {
        self.image_states.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::normalize::{ChapterEntry, PageRef};

    fn key(n: usize) -> ChapterKey {
        ChapterKey::new(format!("https://sv1.example/chapter/{n}"))
    }

    fn index(n: usize) -> ChapterIndex {
        ChapterIndex::new(
            (0..n)
                .map(|i| ChapterEntry {
                    key: key(i),
                    name: (i + 1).to_string(),
                    title: None,
                })
                .collect(),
        )
    }

    fn manifest(key: &ChapterKey, pages: usize) -> ChapterManifest {
        ChapterManifest {
            key: key.clone(),
            manga_name: "Test".into(),
            chapter_name: "1".into(),
            chapter_title: None,
            pages: (0..pages)
                .map(|index| PageRef {
                    index,
                    url: format!("{key}/{index}.jpg"),
                })
                .collect(),
        }
    }

    /// Session on chapter `at` of `chapters`, with `pages` pages loaded.
    fn loaded(at: usize, chapters: usize, pages: usize) -> ReaderSession {
        let mut session = ReaderSession::new(key(at), ReadingMode::Single, ChapterLanding::First);
        session.set_chapter_index(index(chapters));
        assert!(session.apply_manifest(session.generation(), Ok(manifest(&key(at), pages))));
        session
    }

    #[test]
    fn page_navigation_scenario() {
        let mut session = loaded(0, 1, 5);
        session.go_to_page(2);

        assert_eq!(session.next_page(), Navigation::Page(3));
        assert_eq!(session.go_to_page(10), Navigation::Stay);
        assert_eq!(session.current_page(), 3);
        assert_eq!(session.go_to_page(4), Navigation::Page(4));
        assert_eq!(session.next_page(), Navigation::Stay);
        assert_eq!(session.current_page(), 4);
    }

    #[test]
    fn last_page_advances_to_next_chapter() {
        let mut session = loaded(0, 3, 2);
        session.go_to_page(1);
        session.mark_image(1, ImageLoadState::Loaded);

        let generation = session.generation();
        assert_eq!(session.next_page(), Navigation::Chapter(key(1)));
        assert_eq!(session.chapter_key(), &key(1));
        assert_eq!(session.current_page(), 0);
        assert_eq!(session.generation(), generation + 1);
        assert_eq!(session.loaded_state_count(), 0);
        assert_eq!(session.status(), &ChapterStatus::Loading);
    }

    #[test]
    fn first_page_goes_back_to_previous_chapter_page_zero() {
        let mut session = loaded(1, 3, 4);
        assert_eq!(session.previous_page(), Navigation::Chapter(key(0)));
        session.apply_manifest(session.generation(), Ok(manifest(&key(0), 6)));
        assert_eq!(session.current_page(), 0);

        // First chapter, first page: nothing before it.
        assert_eq!(session.previous_page(), Navigation::Stay);
    }

    #[test]
    fn previous_chapter_can_land_on_last_page() {
        let mut session = ReaderSession::new(key(1), ReadingMode::Single, ChapterLanding::Last);
        session.set_chapter_index(index(2));
        session.apply_manifest(0, Ok(manifest(&key(1), 3)));

        assert_eq!(session.previous_page(), Navigation::Chapter(key(0)));
        session.apply_manifest(session.generation(), Ok(manifest(&key(0), 6)));
        assert_eq!(session.current_page(), 5);

        // Forward navigation still lands on page 0.
        session.go_to_page(5);
        session.next_page();
        session.apply_manifest(session.generation(), Ok(manifest(&key(1), 3)));
        assert_eq!(session.current_page(), 0);
    }

    #[test]
    fn chapter_boundaries_are_no_ops() {
        let mut session = loaded(0, 2, 1);
        assert!(!session.has_previous_chapter());
        assert_eq!(session.previous_chapter(), Navigation::Stay);
        assert_eq!(session.next_chapter(), Navigation::Chapter(key(1)));
        assert!(!session.has_next_chapter());
        assert_eq!(session.next_chapter(), Navigation::Stay);
    }

    #[test]
    fn unknown_chapter_position_disables_chapter_navigation() {
        let mut session = ReaderSession::new(
            ChapterKey::new("https://elsewhere/ch"),
            ReadingMode::Single,
            ChapterLanding::First,
        );
        session.set_chapter_index(index(3));
        session.apply_manifest(0, Ok(manifest(session.chapter_key(), 1)));
        assert_eq!(session.chapter_position(), None);
        assert_eq!(session.next_page(), Navigation::Stay);
        assert_eq!(session.next_chapter(), Navigation::Stay);
    }

    #[test]
    fn navigation_waits_for_manifest() {
        let mut session = ReaderSession::new(key(0), ReadingMode::Single, ChapterLanding::First);
        session.set_chapter_index(index(2));
        assert_eq!(session.next_page(), Navigation::Stay);
        assert_eq!(session.go_to_page(0), Navigation::Stay);
        assert_eq!(session.previous_page(), Navigation::Stay);
    }

    #[test]
    fn stale_manifests_are_discarded() {
        let mut session = loaded(0, 3, 2);
        session.next_chapter();
        let stale = session.generation();
        session.next_chapter();

        assert!(!session.apply_manifest(stale, Ok(manifest(&key(1), 9))));
        assert_eq!(session.status(), &ChapterStatus::Loading);

        assert!(session.apply_manifest(session.generation(), Ok(manifest(&key(2), 2))));
        assert_eq!(session.page_count(), 2);
    }

    #[test]
    fn failed_load_can_be_retried() {
        let mut session = ReaderSession::new(key(0), ReadingMode::Single, ChapterLanding::First);
        session.apply_manifest(0, Err(ApiError::NotFound("chapter".into())));
        assert!(matches!(session.status(), ChapterStatus::Failed(e) if e.is_not_found()));
        assert_eq!(session.next_page(), Navigation::Stay);

        assert_eq!(session.retry(), Navigation::Chapter(key(0)));
        assert_eq!(session.generation(), 1);
        assert_eq!(session.status(), &ChapterStatus::Loading);
    }

    #[test]
    fn image_states_track_pages_by_url() {
        let mut session = loaded(0, 1, 3);
        let url = session.page_urls()[2].clone();
        assert_eq!(session.mark_url(&url, ImageLoadState::Errored), Some(2));
        assert_eq!(session.image_state(2), Some(ImageLoadState::Errored));
        assert_eq!(session.mark_url("https://other/0.jpg", ImageLoadState::Loaded), None);

        session.mark_image(7, ImageLoadState::Loaded);
        assert_eq!(session.image_state(7), None);
    }

    #[test]
    fn mobile_forces_webtoon() {
        let mut session = loaded(0, 1, 3);
        assert_eq!(session.mode(), ReadingMode::Single);

        session.set_mobile(true);
        assert_eq!(session.mode(), ReadingMode::Webtoon);
        assert!(!session.set_reading_mode(ReadingMode::Single));
        assert!(!session.cycle_reading_mode());
        assert_eq!(session.mode(), ReadingMode::Webtoon);

        session.set_mobile(false);
        assert!(session.cycle_reading_mode());
        assert_eq!(session.mode(), ReadingMode::Single);
        assert!(is_mobile_width(768, 768));
        assert!(!is_mobile_width(769, 768));
    }

    #[test]
    fn page_index_stays_in_bounds() {
        let pages = 7;
        let mut session = loaded(0, 1, pages);
        let mut seed: u64 = 0x5eed;

        for _ in 0..2000 {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            match (seed >> 33) % 3 {
                0 => {
                    session.next_page();
                }
                1 => {
                    session.previous_page();
                }
                _ => {
                    let before = session.current_page();
                    let target = ((seed >> 40) % 12) as usize;
                    session.go_to_page(target);
                    if target >= pages {
                        assert_eq!(session.current_page(), before);
                    }
                }
            }
            assert!(session.current_page() < pages);
        }
    }

    #[test]
    fn fullscreen_and_fit_toggle() {
        let mut session = loaded(0, 1, 1);
        session.toggle_fullscreen();
        assert!(session.is_fullscreen());
        session.exit_fullscreen();
        assert!(!session.is_fullscreen());

        session.cycle_page_fit();
        assert_eq!(session.page_fit(), PageFit::Height);
        assert_eq!(ReadingMode::parse("Webtoon"), ReadingMode::Webtoon);
    }
}
