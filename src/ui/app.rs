use image::DynamicImage;
use ratatui::widgets::ListState;
use ratatui_image::{picker::Picker, protocol::StatefulProtocol};
use std::collections::HashMap;
use std::time::Instant;

use crate::backend::error::ApiError;
use crate::backend::library::{Library, ReadingProgress};
use crate::backend::normalize::{
    CatalogPage, Category, ChapterKey, ChapterManifest, MangaDetail, MangaSummary, Pagination,
};
use crate::backend::otruyen::ListKind;
use crate::config::Config;
use crate::reader::controls::ControlsController;
use crate::reader::prefetch::{self, PrefetchManager};
use crate::reader::session::{
    self, ChapterStatus, ImageLoadState, Navigation, ReaderSession, ReadingMode,
};

/// Terminal cell size used when the picker can't report one.
const FALLBACK_FONT_SIZE: (u16, u16) = (8, 16);

#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub enum Tab {
    #[default]
    Home,
    Browse,
    Bookmarks,
    History,
    Search,
}

impl Tab {
    pub const ALL: [Tab; 5] = [Tab::Home, Tab::Browse, Tab::Bookmarks, Tab::History, Tab::Search];

    pub fn title(self) -> &'static str {
        match self {
            Tab::Home => "Home",
            Tab::Browse => "Browse",
            Tab::Bookmarks => "Bookmarks",
            Tab::History => "History",
            Tab::Search => "Search",
        }
    }

    pub fn index(self) -> usize {
        Tab::ALL.iter().position(|t| *t == self).unwrap_or_default()
    }

    pub fn next(self) -> Self {
        Tab::ALL[(self.index() + 1) % Tab::ALL.len()]
    }

    pub fn previous(self) -> Self {
        Tab::ALL[(self.index() + Tab::ALL.len() - 1) % Tab::ALL.len()]
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub enum Focus {
    #[default]
    Header,
    Content,
}

#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Home,
    MangaDetail,
    Reader,
}

#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub enum AppState {
    #[default]
    Loading,
    Ready,
}

#[derive(Clone, PartialEq, Eq)]
pub enum BrowseSource {
    List(ListKind),
    Category(Category),
}

impl BrowseSource {
    pub fn label(&self) -> &str {
        match self {
            BrowseSource::List(kind) => kind.label(),
            BrowseSource::Category(category) => &category.name,
        }
    }
}

pub struct BrowseState {
    pub sources: Vec<BrowseSource>,
    pub source_state: ListState,
    pub results: Vec<MangaSummary>,
    pub pagination: Option<Pagination>,
    pub page: u32,
    pub offset: usize,
    pub loading: bool,
    pub focus_results: bool,
}

impl BrowseState {
    fn new() -> Self {
        let mut source_state = ListState::default();
        source_state.select(Some(0));
        Self {
            sources: ListKind::ALL.into_iter().map(BrowseSource::List).collect(),
            source_state,
            results: Vec::new(),
            pagination: None,
            page: 1,
            offset: 0,
            loading: false,
            focus_results: false,
        }
    }

    pub fn selected_source(&self) -> Option<&BrowseSource> {
        self.source_state
            .selected()
            .and_then(|idx| self.sources.get(idx))
    }
}

pub struct DetailState {
    pub slug: String,
    pub summary: MangaSummary,
    pub detail: Option<MangaDetail>,
    pub error: Option<ApiError>,
    pub chapter_list_state: ListState,
}

impl DetailState {
    /// Chapters are listed newest first; returns the API-order index of the selection.
    pub fn selected_chapter(&self) -> Option<usize> {
        let detail = self.detail.as_ref()?;
        let shown = self.chapter_list_state.selected()?;
        detail.chapters.len().checked_sub(shown + 1)
    }
}

/// Work the event loop has to start after a reader transition.
#[derive(Debug, PartialEq, Eq)]
pub enum ReaderEffect {
    None,
    Decode(Vec<String>),
    LoadChapter { key: ChapterKey, generation: u64 },
}

/// Reader screen state: the session plus the derived prefetch and overlay state.
pub struct ReaderView {
    pub session: ReaderSession,
    pub prefetch: PrefetchManager,
    pub controls: ControlsController,
    pub manga: Option<MangaSummary>,
    pub protocols: HashMap<usize, StatefulProtocol>,
    pub scroll_rows: u32,
    pub page_rows: u16,
    pub show_chapter_list: bool,
    pub chapter_list_state: ListState,
    pub resume_page: Option<usize>,
}

impl ReaderView {
    pub fn new(
        key: ChapterKey,
        manga: Option<MangaSummary>,
        config: &Config,
        mobile: bool,
        now: Instant,
    ) -> Self {
        let mut session = ReaderSession::new(
            key,
            ReadingMode::parse(&config.reader.default_mode),
            config.reader.previous_chapter_landing,
        );
        session.set_mobile(mobile);

        Self {
            session,
            prefetch: PrefetchManager::new(
                config.reader.prefetch_radius,
                config.reader.image_cache_limit,
            ),
            controls: ControlsController::new(config.controls.clone(), now),
            manga,
            protocols: HashMap::new(),
            scroll_rows: 0,
            page_rows: 1,
            show_chapter_list: false,
            chapter_list_state: ListState::default(),
            resume_page: None,
        }
    }

    pub fn initial_load(&self) -> ReaderEffect {
        ReaderEffect::LoadChapter {
            key: self.session.chapter_key().clone(),
            generation: self.session.generation(),
        }
    }

    /// Derived effects after any position change: plan the prefetch window, mark
    /// what it requested as loading, and drop page protocols that fell out of it.
    pub fn on_reader_changed(&mut self) -> Vec<String> {
        let urls = self.session.page_urls();
        let current = self.session.current_page();
        let planned = self.prefetch.plan(current, &urls);
        for url in &planned {
            self.session.mark_url(url, ImageLoadState::Loading);
        }

        let keep = prefetch::window(current, urls.len(), self.prefetch.radius());
        self.protocols.retain(|page, _| keep.contains(page));
        planned
    }

    pub fn navigate(&mut self, navigation: Navigation, now: Instant) -> ReaderEffect {
        match navigation {
            Navigation::Stay => ReaderEffect::None,
            Navigation::Page(page) => {
                self.controls.reveal(now);
                if self.session.mode() == ReadingMode::Webtoon {
                    self.scroll_rows = self.page_top(page);
                }
                ReaderEffect::Decode(self.on_reader_changed())
            }
            Navigation::Chapter(key) => {
                self.prefetch.reset_chapter();
                self.protocols.clear();
                self.scroll_rows = 0;
                self.controls.reset_scroll();
                self.show_chapter_list = false;
                ReaderEffect::LoadChapter {
                    key,
                    generation: self.session.generation(),
                }
            }
        }
    }

    pub fn chapter_loaded(
        &mut self,
        generation: u64,
        result: Result<ChapterManifest, ApiError>,
    ) -> Vec<String> {
        if !self.session.apply_manifest(generation, result) {
            return Vec::new();
        }
        if matches!(self.session.status(), ChapterStatus::Ready(_)) {
            if let Some(page) = self.resume_page.take() {
                self.session.go_to_page(page);
            }
        }
        if self.session.mode() == ReadingMode::Webtoon {
            self.align_scroll();
        }
        self.on_reader_changed()
    }

    /// Decode results never move the reader. A result that overflows the image
    /// cache takes the window's images with it, so the window is planned again.
    pub fn image_decoded(
        &mut self,
        url: &str,
        result: Result<DynamicImage, ApiError>,
    ) -> ReaderEffect {
        let state = if result.is_ok() {
            ImageLoadState::Loaded
        } else {
            ImageLoadState::Errored
        };
        if self.prefetch.complete(url, result) {
            return ReaderEffect::Decode(self.on_reader_changed());
        }
        self.session.mark_url(url, state);
        ReaderEffect::None
    }

    /// Render protocol for `page`, built from the decoded image on first use.
    pub fn protocol(
        &mut self,
        page: usize,
        picker: Option<&Picker>,
    ) -> Option<&mut StatefulProtocol> {
        if !self.protocols.contains_key(&page) {
            let url = self.session.manifest()?.pages.get(page)?.url.clone();
            let image = self.prefetch.image(&url)?.clone();
            self.protocols.insert(page, picker?.new_resize_protocol(image));
        }
        self.protocols.get_mut(&page)
    }

    /// First strip row of `page` in webtoon mode.
    fn page_top(&self, page: usize) -> u32 {
        u32::try_from(page)
            .unwrap_or(u32::MAX)
            .saturating_mul(u32::from(self.page_rows))
    }

    /// Puts the strip at the top of the current page.
    pub fn align_scroll(&mut self) {
        self.scroll_rows = self.page_top(self.session.current_page());
    }

    /// Webtoon scrolling: moves the strip and lets the page under the top edge
    /// become the current page.
    pub fn scroll_by(&mut self, delta_rows: i32, row_px: u32, now: Instant) -> ReaderEffect {
        let last_row = self.page_top(self.session.page_count()).saturating_sub(1);
        self.scroll_rows = (i64::from(self.scroll_rows) + i64::from(delta_rows))
            .clamp(0, i64::from(last_row)) as u32;

        self.controls.scrolled(
            self.scroll_rows.saturating_mul(row_px),
            now,
            self.session.is_mobile(),
        );

        let page = (self.scroll_rows / u32::from(self.page_rows.max(1))) as usize;
        if page != self.session.current_page() {
            if let Navigation::Page(_) = self.session.go_to_page(page) {
                return ReaderEffect::Decode(self.on_reader_changed());
            }
        }
        ReaderEffect::None
    }

    pub fn scroll_to_top(&mut self, row_px: u32, now: Instant) -> ReaderEffect {
        self.scroll_rows = 0;
        self.scroll_by(0, row_px, now)
    }

    pub fn set_mobile(&mut self, mobile: bool) {
        self.session.set_mobile(mobile);
    }

    pub fn toggle_chapter_list(&mut self) {
        self.show_chapter_list = !self.show_chapter_list;
        if self.show_chapter_list {
            self.chapter_list_state.select(self.session.chapter_position());
        }
    }
}

pub struct App {
    pub config: Config,
    pub state: AppState,
    pub loading_message: String,
    pub view: View,
    pub tab: Tab,
    pub focus: Focus,
    pub home: Vec<MangaSummary>,
    pub home_offset: usize,
    pub browse: BrowseState,
    pub bookmark_offset: usize,
    pub history_state: ListState,
    pub search_query: String,
    pub last_search_query: String,
    pub search_results: Vec<MangaSummary>,
    pub search_offset: usize,
    pub searching: bool,
    pub search_debounce: Option<Instant>,
    pub detail: Option<DetailState>,
    pub reader: Option<ReaderView>,
    pub library: Library,
    pub picker: Option<Picker>,
    pub cover_states: HashMap<String, StatefulProtocol>,
    pub terminal_width: u16,
    pub status_message: Option<String>,
}

impl App {
    pub fn new(config: Config, library: Library) -> Self {
        let picker = Picker::from_query_stdio().ok();
        let mut history_state = ListState::default();
        history_state.select(Some(0));

        Self {
            config,
            state: AppState::Loading,
            loading_message: "Initializing...".to_string(),
            view: View::Home,
            tab: Tab::Home,
            focus: Focus::Header,
            home: Vec::new(),
            home_offset: 0,
            browse: BrowseState::new(),
            bookmark_offset: 0,
            history_state,
            search_query: String::new(),
            last_search_query: String::new(),
            search_results: Vec::new(),
            search_offset: 0,
            searching: false,
            search_debounce: None,
            detail: None,
            reader: None,
            library,
            picker,
            cover_states: HashMap::new(),
            terminal_width: 0,
            status_message: None,
        }
    }

    pub fn set_loading(&mut self, message: &str) {
        self.state = AppState::Loading;
        self.loading_message = message.to_string();
    }

    pub fn set_ready(&mut self) {
        self.state = AppState::Ready;
    }

    pub fn add_cover_image(&mut self, manga_id: &str, image: DynamicImage) {
        if let Some(ref picker) = self.picker {
            let protocol = picker.new_resize_protocol(image);
            self.cover_states.insert(manga_id.to_string(), protocol);
        }
    }

    fn font_size(&self) -> (u16, u16) {
        self.picker
            .as_ref()
            .map(|p| p.font_size())
            .unwrap_or(FALLBACK_FONT_SIZE)
    }

    /// Pixel height of one terminal row; webtoon scroll offsets are measured in it.
    pub fn row_px(&self) -> u32 {
        u32::from(self.font_size().1.max(1))
    }

    pub fn is_mobile(&self) -> bool {
        let width_px = u32::from(self.terminal_width) * u32::from(self.font_size().0);
        session::is_mobile_width(width_px, self.config.reader.mobile_breakpoint_px)
    }

    /// Reclassifies the viewport; the reader re-applies its mode rule every time.
    pub fn resize(&mut self, width: u16) {
        self.terminal_width = width;
        let mobile = self.is_mobile();
        if let Some(reader) = self.reader.as_mut() {
            reader.set_mobile(mobile);
        }
    }

    pub fn set_home(&mut self, result: Result<CatalogPage, ApiError>) {
        match result {
            Ok(page) => self.home = page.items,
            Err(err) => {
                log::error!("home failed: {err}");
                self.status_message = Some(format!("Could not load home: {err}"));
            }
        }
    }

    pub fn set_categories(&mut self, result: Result<Vec<Category>, ApiError>) {
        match result {
            Ok(categories) => {
                self.browse
                    .sources
                    .retain(|s| matches!(s, BrowseSource::List(_)));
                self.browse
                    .sources
                    .extend(categories.into_iter().map(BrowseSource::Category));
            }
            Err(err) => log::warn!("categories failed: {err}"),
        }
    }

    pub fn set_browse_results(&mut self, page: u32, result: Result<CatalogPage, ApiError>) {
        self.browse.loading = false;
        match result {
            Ok(catalog) => {
                self.browse.page = page;
                self.browse.results = catalog.items;
                self.browse.pagination = catalog.pagination;
                self.browse.offset = 0;
            }
            Err(err) => {
                self.status_message = Some(format!("Could not load list: {err}"));
            }
        }
    }

    pub fn set_search_results(&mut self, query: &str, result: Result<CatalogPage, ApiError>) {
        if query != self.last_search_query {
            return;
        }
        self.searching = false;
        self.search_offset = 0;
        match result {
            Ok(page) => self.search_results = page.items,
            Err(err) => {
                self.search_results.clear();
                self.status_message = Some(format!("Search failed: {err}"));
            }
        }
    }

    pub fn bookmarked(&self) -> Vec<MangaSummary> {
        self.library.bookmarked()
    }

    pub fn open_manga(&mut self, manga: MangaSummary) {
        let mut chapter_list_state = ListState::default();
        chapter_list_state.select(Some(0));
        self.detail = Some(DetailState {
            slug: manga.slug.clone(),
            summary: manga,
            detail: None,
            error: None,
            chapter_list_state,
        });
        self.view = View::MangaDetail;
    }

    /// Feeds a detail result to whichever screens are waiting on that manga.
    pub fn set_detail(&mut self, slug: &str, result: Result<MangaDetail, ApiError>) {
        if let Some(reader) = self.reader.as_mut() {
            let wants_index = reader
                .manga
                .as_ref()
                .is_some_and(|m| m.slug == slug)
                && reader.session.chapters().is_empty();
            if let (true, Ok(detail)) = (wants_index, &result) {
                reader.session.set_chapter_index(detail.chapters.clone());
                reader.manga = Some(detail.summary());
            }
        }

        if let Some(state) = self.detail.as_mut().filter(|d| d.slug == slug) {
            match result {
                Ok(detail) => {
                    state.summary = detail.summary();
                    state.detail = Some(detail);
                    state.error = None;
                }
                Err(err) => state.error = Some(err),
            }
        }
    }

    pub fn toggle_bookmark(&mut self) {
        if let Some(state) = &self.detail {
            let added = self.library.toggle(&state.summary);
            self.status_message = Some(if added {
                format!("Bookmarked {}", state.summary.title)
            } else {
                format!("Removed {} from bookmarks", state.summary.title)
            });
        }
    }

    /// Opens the reader on `key`. The chapter index comes from the open detail view
    /// when it is for the same manga.
    pub fn open_reader(&mut self, key: ChapterKey, manga: Option<MangaSummary>) -> ReaderEffect {
        let mobile = self.is_mobile();
        let mut reader = ReaderView::new(key, manga, &self.config, mobile, Instant::now());

        if let (Some(state), Some(manga)) = (&self.detail, &reader.manga) {
            if let Some(detail) = state.detail.as_ref().filter(|d| d.slug == manga.slug) {
                reader.session.set_chapter_index(detail.chapters.clone());
            }
        }

        let effect = reader.initial_load();
        self.reader = Some(reader);
        self.view = View::Reader;
        effect
    }

    /// Reopens the chapter a history entry points at, on the page it was left.
    pub fn resume(&mut self, progress: &ReadingProgress) -> ReaderEffect {
        let manga = MangaSummary::from(progress);
        let effect = self.open_reader(progress.chapter_key.clone(), Some(manga));
        if let Some(reader) = self.reader.as_mut() {
            reader.resume_page = Some(progress.page);
        }
        effect
    }

    pub fn record_progress(&mut self) {
        let Some(reader) = &self.reader else {
            return;
        };
        let (Some(manga), Some(manifest)) = (&reader.manga, reader.session.manifest()) else {
            return;
        };
        // Command-line placeholders have no id until the detail arrives.
        if manga.id.is_empty() {
            return;
        }
        self.library.update_progress(
            manga,
            reader.session.chapter_key(),
            &manifest.chapter_name,
            reader.session.current_page(),
        );
    }

    pub fn go_back(&mut self) {
        match self.view {
            View::Reader => {
                self.reader = None;
                self.view = if self.detail.is_some() {
                    View::MangaDetail
                } else {
                    View::Home
                };
            }
            View::MangaDetail => {
                self.detail = None;
                self.view = View::Home;
            }
            View::Home => {}
        }
    }
}
