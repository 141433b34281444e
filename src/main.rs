mod backend;
mod config;
mod reader;
mod ui;

use backend::catalog::Catalog;
use backend::error::ApiError;
use backend::library::Library;
use backend::normalize::{
    CatalogPage, Category, ChapterKey, ChapterManifest, MangaDetail, MangaStatus, MangaSummary,
};
use config::Config;
use image::DynamicImage;
use reader::session::{ChapterStatus, Navigation, ReadingMode};
use ui::app::{App, BrowseSource, Focus, ReaderEffect, Tab, View};
use ui::ui::ui;

use clap::Parser;
use crossterm::{
    event::{
        DisableMouseCapture, EnableMouseCapture, Event, EventStream, KeyCode, KeyEvent,
        KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures::StreamExt;
use ratatui::{backend::CrosstermBackend, Terminal};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use std::{error::Error, fs, io};
use tokio::sync::mpsc;

/// Rows moved per wheel notch or arrow key in webtoon mode.
const SCROLL_STEP: i32 = 3;
/// Covers requested ahead of a carousel's offset.
const COVER_LOOKAHEAD: usize = 8;

#[derive(Parser, Debug)]
#[command(name = "truyen-tui", about = "Terminal manga reader for the OTruyen catalog")]
struct Args {
    /// Config file (defaults to ~/.config/truyen-tui/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the API base URL
    #[arg(long)]
    base_url: Option<String>,

    /// Open the reader directly on a chapter URL
    #[arg(long)]
    chapter: Option<String>,

    /// Manga slug; opens its detail page, or supplies the chapter list for --chapter
    #[arg(long)]
    manga: Option<String>,
}

enum BackgroundTask {
    CoverLoaded { manga_id: String, image: DynamicImage },
    CoverFailed { manga_id: String },
    CategoriesLoaded(Result<Vec<Category>, ApiError>),
    BrowseLoaded {
        source: BrowseSource,
        page: u32,
        result: Result<CatalogPage, ApiError>,
    },
    SearchResults {
        query: String,
        result: Result<CatalogPage, ApiError>,
    },
    DetailLoaded {
        slug: String,
        result: Result<MangaDetail, ApiError>,
    },
    ChapterLoaded {
        generation: u64,
        result: Result<ChapterManifest, ApiError>,
    },
    PageDecoded {
        url: String,
        result: Result<DynamicImage, ApiError>,
    },
}

/// Starts background requests and remembers which covers are already on the way.
struct Loader {
    catalog: Catalog,
    tx: mpsc::UnboundedSender<BackgroundTask>,
    pending_covers: HashSet<String>,
}

impl Loader {
    fn preload_covers(&mut self, app: &App, mangas: &[MangaSummary], offset: usize) {
        for manga in mangas.iter().skip(offset).take(COVER_LOOKAHEAD) {
            if manga.cover_url.is_empty()
                || app.cover_states.contains_key(&manga.id)
                || self.pending_covers.contains(&manga.id)
            {
                continue;
            }
            self.pending_covers.insert(manga.id.clone());

            let catalog = self.catalog.clone();
            let manga_id = manga.id.clone();
            let cover_url = manga.cover_url.clone();
            let tx = self.tx.clone();
            tokio::spawn(async move {
                let task = match catalog.image(&cover_url).await {
                    Ok(image) => BackgroundTask::CoverLoaded { manga_id, image },
                    Err(err) => {
                        log::debug!("cover {cover_url} failed: {err}");
                        BackgroundTask::CoverFailed { manga_id }
                    }
                };
                let _ = tx.send(task);
            });
        }
    }

    fn spawn_categories(&self) {
        let catalog = self.catalog.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = catalog.categories().await;
            let _ = tx.send(BackgroundTask::CategoriesLoaded(result));
        });
    }

    fn spawn_browse(&self, source: BrowseSource, page: u32) {
        let catalog = self.catalog.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = match &source {
                BrowseSource::List(kind) => catalog.list(*kind, page).await,
                BrowseSource::Category(category) => catalog.by_category(&category.slug, page).await,
            };
            let _ = tx.send(BackgroundTask::BrowseLoaded { source, page, result });
        });
    }

    fn spawn_search(&self, query: String) {
        let catalog = self.catalog.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = catalog.search(&query).await;
            let _ = tx.send(BackgroundTask::SearchResults { query, result });
        });
    }

    fn spawn_detail(&self, slug: String) {
        let catalog = self.catalog.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = catalog.detail(&slug).await;
            let _ = tx.send(BackgroundTask::DetailLoaded { slug, result });
        });
    }

    fn spawn_chapter(&self, key: ChapterKey, generation: u64) {
        let catalog = self.catalog.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = catalog.chapter(&key).await;
            let _ = tx.send(BackgroundTask::ChapterLoaded { generation, result });
        });
    }

    fn spawn_page_decoders(&self, urls: Vec<String>) {
        for url in urls {
            let catalog = self.catalog.clone();
            let tx = self.tx.clone();
            tokio::spawn(async move {
                let result = catalog.image(&url).await;
                let _ = tx.send(BackgroundTask::PageDecoded { url, result });
            });
        }
    }

    fn apply(&self, effect: ReaderEffect) {
        match effect {
            ReaderEffect::None => {}
            ReaderEffect::Decode(urls) => self.spawn_page_decoders(urls),
            ReaderEffect::LoadChapter { key, generation } => self.spawn_chapter(key, generation),
        }
    }
}

fn init_logging() {
    let Some(dir) = dirs::cache_dir().map(|d| d.join("truyen-tui")) else {
        return;
    };
    if fs::create_dir_all(&dir).is_err() {
        return;
    }
    // The terminal belongs to the UI, so logs only ever go to the file.
    if let Ok(file) = fs::File::create(dir.join("truyen-tui.log")) {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();
    }
}

/// Stand-in for a manga known only by slug; the detail response replaces it.
fn placeholder_summary(slug: String) -> MangaSummary {
    MangaSummary {
        id: String::new(),
        title: slug.clone(),
        slug,
        latest_chapter: None,
        cover_url: String::new(),
        genres: Vec::new(),
        status: MangaStatus::Unknown,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_logging();

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(base_url) = args.base_url {
        config.api.base_url = base_url;
    }
    let catalog = Catalog::new(&config)?;
    log::info!("starting against {}", config.api.base_url);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(config, Library::load());
    app.resize(terminal.size()?.width);

    let (task_tx, mut task_rx) = mpsc::unbounded_channel::<BackgroundTask>();
    let mut loader = Loader {
        catalog,
        tx: task_tx,
        pending_covers: HashSet::new(),
    };

    app.set_loading("Fetching latest updates...");
    terminal.draw(|f| ui(f, &mut app))?;

    let home = loader.catalog.home().await;
    app.set_home(home);
    let home = app.home.clone();
    loader.preload_covers(&app, &home, 0);
    loader.spawn_categories();

    match (args.chapter, args.manga) {
        (Some(chapter), manga) => {
            let placeholder = manga.map(|slug| {
                loader.spawn_detail(slug.clone());
                placeholder_summary(slug)
            });
            let effect = app.open_reader(ChapterKey::new(chapter), placeholder);
            loader.apply(effect);
        }
        (None, Some(slug)) => {
            loader.spawn_detail(slug.clone());
            app.open_manga(placeholder_summary(slug));
        }
        (None, None) => {}
    }

    app.set_ready();

    let res = run_app(&mut terminal, &mut app, &mut task_rx, &mut loader).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        log::error!("terminal error: {err}");
        eprintln!("{err}");
    }
    Ok(())
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    task_rx: &mut mpsc::UnboundedReceiver<BackgroundTask>,
    loader: &mut Loader,
) -> io::Result<()> {
    let mut event_stream = EventStream::new();
    let debounce = Duration::from_millis(app.config.search.debounce_ms);

    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Some(debounce_time) = app.search_debounce {
            if debounce_time.elapsed() >= debounce {
                app.search_debounce = None;
                trigger_search(app, loader);
            }
        }

        if let Some(reader) = app.reader.as_mut() {
            reader.controls.tick(Instant::now());
        }

        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(50)) => {}

            Some(Ok(event)) = event_stream.next() => {
                match event {
                    Event::Key(key) if key.kind == KeyEventKind::Press => {
                        if should_quit(app, &key) {
                            return Ok(());
                        }
                        app.status_message = None;
                        match app.view {
                            View::Home => handle_home_input(app, key.code, loader),
                            View::MangaDetail => handle_detail_input(app, key.code, loader),
                            View::Reader => handle_reader_input(app, key.code, loader),
                        }
                    }
                    Event::Mouse(mouse) if app.view == View::Reader => {
                        handle_reader_mouse(app, mouse, terminal.size()?.width, loader);
                    }
                    Event::Resize(width, _) => app.resize(width),
                    _ => {}
                }
            }

            Some(task) = task_rx.recv() => handle_task(app, task, loader),
        }
    }
}

fn should_quit(app: &App, key: &KeyEvent) -> bool {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return true;
    }
    let typing = app.view == View::Home && app.tab == Tab::Search && app.focus == Focus::Header;
    key.code == KeyCode::Char('q') && !typing
}

fn handle_task(app: &mut App, task: BackgroundTask, loader: &mut Loader) {
    match task {
        BackgroundTask::CoverLoaded { manga_id, image } => {
            app.add_cover_image(&manga_id, image);
            loader.pending_covers.remove(&manga_id);
        }
        BackgroundTask::CoverFailed { manga_id } => {
            loader.pending_covers.remove(&manga_id);
        }
        BackgroundTask::CategoriesLoaded(result) => app.set_categories(result),
        BackgroundTask::BrowseLoaded { source, page, result } => {
            if app.browse.selected_source() != Some(&source) {
                return;
            }
            app.set_browse_results(page, result);
            let results = app.browse.results.clone();
            loader.preload_covers(app, &results, 0);
        }
        BackgroundTask::SearchResults { query, result } => {
            app.set_search_results(&query, result);
            let results = app.search_results.clone();
            loader.preload_covers(app, &results, 0);
        }
        BackgroundTask::DetailLoaded { slug, result } => {
            app.set_detail(&slug, result);
            if let Some(state) = &app.detail {
                let summary = [state.summary.clone()];
                loader.preload_covers(app, &summary, 0);
            }
            app.record_progress();
        }
        BackgroundTask::ChapterLoaded { generation, result } => {
            let Some(reader) = app.reader.as_mut() else {
                return;
            };
            let urls = reader.chapter_loaded(generation, result);
            loader.spawn_page_decoders(urls);
            app.record_progress();
        }
        BackgroundTask::PageDecoded { url, result } => {
            if let Some(reader) = app.reader.as_mut() {
                let effect = reader.image_decoded(&url, result);
                loader.apply(effect);
            }
        }
    }
}

fn trigger_search(app: &mut App, loader: &Loader) {
    let query = app.search_query.trim().to_string();
    if !loader.catalog.search_enabled(&query) {
        app.search_results.clear();
        app.last_search_query.clear();
        app.searching = false;
        return;
    }
    if query == app.last_search_query {
        return;
    }
    app.searching = true;
    app.last_search_query = query.clone();
    loader.spawn_search(query);
}

fn open_manga(app: &mut App, manga: MangaSummary, loader: &mut Loader) {
    loader.spawn_detail(manga.slug.clone());
    loader.preload_covers(app, std::slice::from_ref(&manga), 0);
    app.open_manga(manga);
}

fn scroll_carousel(
    app: &App,
    mangas: &[MangaSummary],
    offset: usize,
    forward: bool,
    loader: &mut Loader,
) -> usize {
    let next = if forward {
        (offset + 1).min(mangas.len().saturating_sub(1))
    } else {
        offset.saturating_sub(1)
    };
    loader.preload_covers(app, mangas, next);
    next
}

fn handle_home_input(app: &mut App, key: KeyCode, loader: &mut Loader) {
    if app.focus == Focus::Header {
        match key {
            KeyCode::Left => app.tab = app.tab.previous(),
            KeyCode::Right => app.tab = app.tab.next(),
            KeyCode::Tab | KeyCode::Down => app.focus = Focus::Content,
            KeyCode::Char(c) if app.tab == Tab::Search => {
                app.search_query.push(c);
                app.search_debounce = Some(Instant::now());
            }
            KeyCode::Backspace if app.tab == Tab::Search => {
                app.search_query.pop();
                if app.search_query.is_empty() {
                    app.search_results.clear();
                    app.last_search_query.clear();
                    app.search_debounce = None;
                } else {
                    app.search_debounce = Some(Instant::now());
                }
            }
            KeyCode::Enter if app.tab == Tab::Search => {
                app.search_debounce = None;
                trigger_search(app, loader);
            }
            KeyCode::Esc if app.tab == Tab::Search => {
                app.search_query.clear();
                app.search_results.clear();
                app.last_search_query.clear();
            }
            _ => {}
        }
        return;
    }

    match app.tab {
        Tab::Home => {
            let home = app.home.clone();
            handle_carousel_input(app, key, &home, home_offset, loader);
        }
        Tab::Bookmarks => {
            let bookmarked = app.bookmarked();
            handle_carousel_input(app, key, &bookmarked, bookmark_offset, loader);
        }
        Tab::Search => {
            let results = app.search_results.clone();
            handle_carousel_input(app, key, &results, search_offset, loader);
        }
        Tab::Browse => handle_browse_input(app, key, loader),
        Tab::History => handle_history_input(app, key, loader),
    }
}

fn home_offset(app: &mut App) -> &mut usize {
    &mut app.home_offset
}

fn bookmark_offset(app: &mut App) -> &mut usize {
    &mut app.bookmark_offset
}

fn search_offset(app: &mut App) -> &mut usize {
    &mut app.search_offset
}

fn handle_carousel_input(
    app: &mut App,
    key: KeyCode,
    mangas: &[MangaSummary],
    offset: fn(&mut App) -> &mut usize,
    loader: &mut Loader,
) {
    match key {
        KeyCode::Up | KeyCode::Esc => app.focus = Focus::Header,
        KeyCode::Left | KeyCode::Right => {
            let current = *offset(app);
            let next = scroll_carousel(app, mangas, current, key == KeyCode::Right, loader);
            *offset(app) = next;
        }
        KeyCode::Enter => {
            if let Some(manga) = mangas.get(*offset(app)).cloned() {
                open_manga(app, manga, loader);
            }
        }
        _ => {}
    }
}

fn load_browse_page(app: &mut App, page: u32, loader: &Loader) {
    if let Some(source) = app.browse.selected_source().cloned() {
        app.browse.loading = true;
        loader.spawn_browse(source, page);
    }
}

fn handle_browse_input(app: &mut App, key: KeyCode, loader: &mut Loader) {
    if !app.browse.focus_results {
        let selected = app.browse.source_state.selected().unwrap_or(0);
        match key {
            KeyCode::Up if selected == 0 => app.focus = Focus::Header,
            KeyCode::Up => app.browse.source_state.select(Some(selected - 1)),
            KeyCode::Down => {
                if selected + 1 < app.browse.sources.len() {
                    app.browse.source_state.select(Some(selected + 1));
                }
            }
            KeyCode::Enter | KeyCode::Right => {
                app.browse.results.clear();
                app.browse.pagination = None;
                app.browse.focus_results = true;
                load_browse_page(app, 1, loader);
            }
            KeyCode::Esc => app.focus = Focus::Header,
            _ => {}
        }
        return;
    }

    match key {
        KeyCode::Esc | KeyCode::Up => app.browse.focus_results = false,
        KeyCode::Left | KeyCode::Right => {
            let results = app.browse.results.clone();
            let current = app.browse.offset;
            app.browse.offset =
                scroll_carousel(app, &results, current, key == KeyCode::Right, loader);
        }
        KeyCode::Char('n') => {
            if app.browse.pagination.is_some_and(|p| p.has_next()) && !app.browse.loading {
                load_browse_page(app, app.browse.page + 1, loader);
            }
        }
        KeyCode::Char('p') => {
            if app.browse.page > 1 && !app.browse.loading {
                load_browse_page(app, app.browse.page - 1, loader);
            }
        }
        KeyCode::Enter => {
            if let Some(manga) = app.browse.results.get(app.browse.offset).cloned() {
                open_manga(app, manga, loader);
            }
        }
        _ => {}
    }
}

fn handle_history_input(app: &mut App, key: KeyCode, loader: &mut Loader) {
    let entries = app.library.recent().len();
    let selected = app.history_state.selected().unwrap_or(0);
    match key {
        KeyCode::Up if selected == 0 => app.focus = Focus::Header,
        KeyCode::Up => app.history_state.select(Some(selected - 1)),
        KeyCode::Down => {
            if selected + 1 < entries {
                app.history_state.select(Some(selected + 1));
            }
        }
        KeyCode::Esc => app.focus = Focus::Header,
        KeyCode::Enter => {
            let Some(progress) = app.library.recent().get(selected).map(|p| (*p).clone()) else {
                return;
            };
            loader.spawn_detail(progress.manga_slug.clone());
            let effect = app.resume(&progress);
            loader.apply(effect);
        }
        _ => {}
    }
}

fn handle_detail_input(app: &mut App, key: KeyCode, loader: &mut Loader) {
    let Some(state) = app.detail.as_mut() else {
        return;
    };
    let chapter_count = state.detail.as_ref().map_or(0, |d| d.chapters.len());

    match key {
        KeyCode::Esc => app.go_back(),
        KeyCode::Up => {
            let selected = state.chapter_list_state.selected().unwrap_or(0);
            if selected > 0 {
                state.chapter_list_state.select(Some(selected - 1));
            }
        }
        KeyCode::Down => {
            let selected = state.chapter_list_state.selected().unwrap_or(0);
            if selected + 1 < chapter_count {
                state.chapter_list_state.select(Some(selected + 1));
            }
        }
        KeyCode::Enter => {
            let chapter = state.selected_chapter().and_then(|idx| {
                state
                    .detail
                    .as_ref()
                    .and_then(|d| d.chapters.get(idx))
                    .map(|c| c.key.clone())
            });
            if let Some(key) = chapter {
                let summary = state.summary.clone();
                let effect = app.open_reader(key, Some(summary));
                loader.apply(effect);
            }
        }
        KeyCode::Char('c') => {
            let summary = state.summary.clone();
            let first = state
                .detail
                .as_ref()
                .and_then(|d| d.chapters.get(0))
                .map(|c| c.key.clone());
            let effect = match app.library.progress(&summary.id).cloned() {
                Some(progress) => app.resume(&progress),
                None => match first {
                    Some(key) => app.open_reader(key, Some(summary)),
                    None => return,
                },
            };
            loader.apply(effect);
        }
        KeyCode::Char('b') => app.toggle_bookmark(),
        KeyCode::Char('r') if state.error.is_some() => {
            state.error = None;
            loader.spawn_detail(state.slug.clone());
        }
        _ => {}
    }
}

fn handle_reader_input(app: &mut App, key: KeyCode, loader: &mut Loader) {
    let now = Instant::now();
    let row_px = app.row_px();

    if key == KeyCode::Esc {
        match app.reader.as_mut() {
            Some(reader) if reader.show_chapter_list => reader.show_chapter_list = false,
            Some(reader) if reader.session.is_fullscreen() => reader.session.exit_fullscreen(),
            _ => app.go_back(),
        }
        return;
    }

    let Some(reader) = app.reader.as_mut() else {
        return;
    };

    if reader.show_chapter_list {
        let selected = reader.chapter_list_state.selected().unwrap_or(0);
        match key {
            KeyCode::Char('c') => reader.show_chapter_list = false,
            KeyCode::Up => reader.chapter_list_state.select(Some(selected.saturating_sub(1))),
            KeyCode::Down => {
                if selected + 1 < reader.session.chapters().len() {
                    reader.chapter_list_state.select(Some(selected + 1));
                }
            }
            KeyCode::Enter => {
                if let Some(entry) = reader.session.chapters().get(selected).cloned() {
                    let navigation = reader.session.go_to_chapter(entry.key);
                    let effect = reader.navigate(navigation, now);
                    loader.apply(effect);
                }
            }
            _ => {}
        }
        return;
    }

    let mobile = reader.session.is_mobile();
    let webtoon = reader.session.mode() == ReadingMode::Webtoon;
    let effect = match key {
        KeyCode::Left | KeyCode::Char('h') if !mobile => {
            let navigation = reader.session.previous_page();
            reader.navigate(navigation, now)
        }
        KeyCode::Right | KeyCode::Char('l') if !mobile => {
            let navigation = reader.session.next_page();
            reader.navigate(navigation, now)
        }
        KeyCode::Up | KeyCode::Char('k') if webtoon => reader.scroll_by(-SCROLL_STEP, row_px, now),
        KeyCode::Down | KeyCode::Char('j') if webtoon => reader.scroll_by(SCROLL_STEP, row_px, now),
        KeyCode::PageDown | KeyCode::Char(' ') if webtoon => {
            reader.scroll_by(i32::from(reader.page_rows), row_px, now)
        }
        KeyCode::PageUp if webtoon => reader.scroll_by(-i32::from(reader.page_rows), row_px, now),
        KeyCode::Char('t') if webtoon => reader.scroll_to_top(row_px, now),
        KeyCode::Char('n') => {
            let navigation = reader.session.next_chapter();
            reader.navigate(navigation, now)
        }
        KeyCode::Char('p') => {
            let navigation = reader.session.previous_chapter();
            reader.navigate(navigation, now)
        }
        KeyCode::Char('r') if matches!(reader.session.status(), ChapterStatus::Failed(_)) => {
            let navigation = reader.session.retry();
            reader.navigate(navigation, now)
        }
        KeyCode::Char('m') => {
            if reader.session.cycle_reading_mode() {
                reader.align_scroll();
            } else {
                app.status_message = Some("Only webtoon mode is available on narrow screens".into());
            }
            ReaderEffect::None
        }
        KeyCode::Char('w') => {
            reader.session.cycle_page_fit();
            reader.protocols.clear();
            ReaderEffect::None
        }
        KeyCode::Char('f') => {
            reader.session.toggle_fullscreen();
            ReaderEffect::None
        }
        KeyCode::Char('c') => {
            reader.toggle_chapter_list();
            ReaderEffect::None
        }
        _ => ReaderEffect::None,
    };

    finish_reader_effect(app, effect, loader);
}

fn finish_reader_effect(app: &mut App, effect: ReaderEffect, loader: &Loader) {
    let page_changed = matches!(effect, ReaderEffect::Decode(_));
    loader.apply(effect);
    if page_changed {
        app.record_progress();
    }
}

fn handle_reader_mouse(app: &mut App, mouse: MouseEvent, width: u16, loader: &Loader) {
    let now = Instant::now();
    let row_px = app.row_px();
    let Some(reader) = app.reader.as_mut() else {
        return;
    };
    let mobile = reader.session.is_mobile();
    let webtoon = reader.session.mode() == ReadingMode::Webtoon;

    let effect = match mouse.kind {
        MouseEventKind::Moved => {
            reader.controls.reveal(now);
            ReaderEffect::None
        }
        MouseEventKind::ScrollDown if webtoon => reader.scroll_by(SCROLL_STEP, row_px, now),
        MouseEventKind::ScrollUp if webtoon => reader.scroll_by(-SCROLL_STEP, row_px, now),
        MouseEventKind::Down(MouseButton::Left) if mobile => {
            reader.controls.tapped(now, true);
            ReaderEffect::None
        }
        MouseEventKind::Down(MouseButton::Left) if !webtoon => {
            reader.controls.reveal(now);
            // Outer thirds of the page turn it.
            let navigation = if mouse.column < width / 3 {
                reader.session.previous_page()
            } else if mouse.column >= width - width / 3 {
                reader.session.next_page()
            } else {
                Navigation::Stay
            };
            reader.navigate(navigation, now)
        }
        _ => ReaderEffect::None,
    };

    finish_reader_effect(app, effect, loader);
}
