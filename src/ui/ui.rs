use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Tabs},
    Frame,
};
use ratatui_image::{protocol::StatefulProtocol, Resize, StatefulImage};
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use super::app::{App, AppState, Focus, Tab, View};
use super::reader::draw_reader;
use crate::backend::normalize::MangaSummary;

const CARD_WIDTH: u16 = 35;
const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

pub fn ui(f: &mut Frame, app: &mut App) {
    let area = f.area();
    match (app.state, app.view) {
        (AppState::Loading, _) => draw_loading_screen(f, area, &app.loading_message),
        (AppState::Ready, View::Home) => draw_main_ui(f, app),
        (AppState::Ready, View::MangaDetail) => draw_detail(f, app),
        (AppState::Ready, View::Reader) => draw_reader(f, app),
    }
}

fn spinner() -> &'static str {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    SPINNER_FRAMES[(millis / 100) as usize % SPINNER_FRAMES.len()]
}

pub(super) fn draw_loading_screen(f: &mut Frame, area: Rect, message: &str) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title("Truyen Reader")
        .border_style(Style::default().fg(Color::Cyan));

    let inner = block.inner(area);
    f.render_widget(block, area);

    let center_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(40),
            Constraint::Length(3),
            Constraint::Length(2),
            Constraint::Percentage(40),
        ])
        .split(inner);

    let loading_text = Line::from(vec![
        Span::styled(
            format!(" {} ", spinner()),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            "Loading...",
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ),
    ]);

    let loading_paragraph = Paragraph::new(loading_text).alignment(Alignment::Center);
    f.render_widget(loading_paragraph, center_layout[1]);

    let message = Paragraph::new(message)
        .style(Style::default().fg(Color::DarkGray))
        .alignment(Alignment::Center);
    f.render_widget(message, center_layout[2]);
}

fn draw_main_ui(f: &mut Frame, app: &mut App) {
    let area = f.area();

    let root = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // header/tabs
            Constraint::Min(10),   // content
            Constraint::Length(3), // footer
        ])
        .split(area);

    draw_header(f, root[0], app);

    let focused = app.focus == Focus::Content;
    match app.tab {
        Tab::Home => draw_manga_section(
            f,
            root[1],
            "Latest Updates",
            &app.home,
            &mut app.home_offset,
            focused,
            &mut app.cover_states,
        ),
        Tab::Browse => draw_browse(f, root[1], app),
        Tab::Bookmarks => {
            let bookmarked = app.bookmarked();
            draw_manga_section(
                f,
                root[1],
                "Bookmarks",
                &bookmarked,
                &mut app.bookmark_offset,
                focused,
                &mut app.cover_states,
            );
        }
        Tab::History => draw_history(f, root[1], app),
        Tab::Search => draw_search(f, root[1], app),
    }

    let hints: &[(&str, &str)] = match (app.tab, app.focus) {
        (_, Focus::Header) => &[
            ("←/→", "tab"),
            ("↓", "content"),
            ("q", "quit"),
        ],
        (Tab::Browse, Focus::Content) if !app.browse.focus_results => &[
            ("↑/↓", "source"),
            ("Enter", "open list"),
            ("q", "quit"),
        ],
        (Tab::Browse, Focus::Content) => &[
            ("←/→", "scroll"),
            ("n/p", "page"),
            ("Enter", "open"),
            ("Esc", "sources"),
        ],
        (Tab::History, Focus::Content) => &[
            ("↑/↓", "select"),
            ("Enter", "resume"),
            ("q", "quit"),
        ],
        _ => &[
            ("←/→", "scroll"),
            ("↑", "tabs"),
            ("Enter", "open"),
            ("q", "quit"),
        ],
    };
    draw_footer(f, root[2], hints, app.status_message.as_deref());
}

fn draw_header(f: &mut Frame, area: Rect, app: &App) {
    let titles: Vec<&str> = Tab::ALL.iter().map(|t| t.title()).collect();

    let header_style = if app.focus == Focus::Header {
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::White)
    };

    let tabs = Tabs::new(titles)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Truyen Reader")
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .select(app.tab.index())
        .style(Style::default().fg(Color::DarkGray))
        .highlight_style(header_style);

    f.render_widget(tabs, area);
}

fn focus_style(focused: bool) -> Style {
    if focused {
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::White)
    }
}

fn draw_browse(f: &mut Frame, area: Rect, app: &mut App) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(26), Constraint::Min(10)])
        .split(area);

    let sources_focused = app.focus == Focus::Content && !app.browse.focus_results;
    let items: Vec<ListItem> = app
        .browse
        .sources
        .iter()
        .map(|s| ListItem::new(s.label().to_string()))
        .collect();
    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Sources")
                .border_style(focus_style(sources_focused)),
        )
        .highlight_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
        .highlight_symbol("▶ ");
    f.render_stateful_widget(list, columns[0], &mut app.browse.source_state);

    let label = app
        .browse
        .selected_source()
        .map(|s| s.label().to_string())
        .unwrap_or_default();
    let title = match (&app.browse.pagination, app.browse.loading) {
        (_, true) => format!("{label} · {} loading", spinner()),
        (Some(p), false) => format!("{label} · page {}/{}", p.current_page, p.total_pages()),
        (None, false) => label,
    };

    let results_focused = app.focus == Focus::Content && app.browse.focus_results;
    draw_manga_section(
        f,
        columns[1],
        &title,
        &app.browse.results,
        &mut app.browse.offset,
        results_focused,
        &mut app.cover_states,
    );
}

fn draw_history(f: &mut Frame, area: Rect, app: &mut App) {
    let items: Vec<ListItem> = app
        .library
        .recent()
        .into_iter()
        .map(|entry| {
            ListItem::new(Line::from(vec![
                Span::styled(
                    entry.manga_title.clone(),
                    Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
                ),
                Span::styled(
                    format!("  Chapter {} · page {}", entry.chapter_name, entry.page + 1),
                    Style::default().fg(Color::DarkGray),
                ),
            ]))
        })
        .collect();

    let block = Block::default()
        .borders(Borders::ALL)
        .title("Continue Reading")
        .border_style(focus_style(app.focus == Focus::Content));

    if items.is_empty() {
        let empty = Paragraph::new("Nothing read yet")
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        f.render_widget(empty, area);
        return;
    }

    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
        .highlight_symbol("▶ ");
    f.render_stateful_widget(list, area, &mut app.history_state);
}

fn draw_search(f: &mut Frame, area: Rect, app: &mut App) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(8)])
        .split(area);

    let input = Paragraph::new(Line::from(vec![
        Span::styled("🔍 ", Style::default().fg(Color::Yellow)),
        Span::raw(app.search_query.clone()),
        Span::styled(
            if app.focus == Focus::Header { "▏" } else { "" },
            Style::default().fg(Color::Yellow),
        ),
    ]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title("Search")
            .border_style(focus_style(app.focus == Focus::Header)),
    );
    f.render_widget(input, layout[0]);

    let typed = app.search_query.trim().chars().count();
    if typed > 0 && typed < app.config.search.min_length {
        let hint = Paragraph::new(format!(
            "Type at least {} characters to search",
            app.config.search.min_length
        ))
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::DarkGray))
        .block(Block::default().borders(Borders::ALL));
        f.render_widget(hint, layout[1]);
        return;
    }

    let title = if app.searching {
        format!("Results {} searching", spinner())
    } else {
        format!("Results ({})", app.search_results.len())
    };
    draw_manga_section(
        f,
        layout[1],
        &title,
        &app.search_results,
        &mut app.search_offset,
        app.focus == Focus::Content,
        &mut app.cover_states,
    );
}

fn draw_manga_section(
    f: &mut Frame,
    area: Rect,
    title: &str,
    mangas: &[MangaSummary],
    offset: &mut usize,
    focused: bool,
    cover_states: &mut HashMap<String, StatefulProtocol>,
) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(title.to_string())
        .border_style(focus_style(focused));

    let inner = block.inner(area);
    f.render_widget(block, area);

    if mangas.is_empty() {
        let empty = Paragraph::new("No manga available")
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::DarkGray));
        f.render_widget(empty, inner);
        return;
    }

    let max_offset = mangas.len().saturating_sub(1);
    if *offset > max_offset {
        *offset = max_offset;
    }

    let cards_visible = cards_visible(inner.width);
    let card_areas = Layout::default()
        .direction(Direction::Horizontal)
        .constraints((0..cards_visible).map(|_| Constraint::Length(CARD_WIDTH)))
        .split(inner);

    for (i, card_area) in card_areas.iter().enumerate() {
        let Some(manga) = mangas.get(*offset + i) else {
            break;
        };
        draw_manga_card(
            f,
            *card_area,
            manga,
            focused && i == 0,
            cover_states.get_mut(&manga.id),
        );
    }

    if *offset > 0 {
        let left_indicator = Paragraph::new("◀").style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );
        let left_area = Rect::new(inner.x, inner.y + inner.height / 2, 1, 1);
        f.render_widget(left_indicator, left_area);
    }

    if *offset + cards_visible < mangas.len() {
        let right_indicator = Paragraph::new("▶").style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );
        let right_area = Rect::new(
            inner.x + inner.width.saturating_sub(1),
            inner.y + inner.height / 2,
            1,
            1,
        );
        f.render_widget(right_indicator, right_area);
    }
}

pub fn cards_visible(width: u16) -> usize {
    (width / CARD_WIDTH).max(1) as usize
}

fn draw_manga_card(
    f: &mut Frame,
    area: Rect,
    manga: &MangaSummary,
    selected: bool,
    cover_state: Option<&mut StatefulProtocol>,
) {
    let border_style = if selected {
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style);

    let inner = block.inner(area);
    f.render_widget(block, area);

    if inner.height < 4 || inner.width < 5 {
        return;
    }

    let card_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(8), // cover
            Constraint::Length(2), // title
            Constraint::Min(2),    // genres
            Constraint::Length(1), // status/latest chapter
        ])
        .split(inner);

    draw_cover(f, card_layout[0], cover_state);

    let title = truncate_text(&manga.title, inner.width.saturating_sub(2) as usize);
    let title_paragraph = Paragraph::new(title).style(
        Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::BOLD),
    );
    f.render_widget(title_paragraph, card_layout[1]);

    let genre_lines = wrap_text(
        &manga.genres.join(" · "),
        inner.width.saturating_sub(1) as usize,
        (card_layout[2].height as usize).max(1),
    );
    let genres = Paragraph::new(genre_lines.join("\n")).style(Style::default().fg(Color::DarkGray));
    f.render_widget(genres, card_layout[2]);

    let mut status_line = vec![
        Span::styled("★ ", Style::default().fg(Color::Yellow)),
        Span::styled(manga.status.label(), Style::default().fg(Color::Cyan)),
    ];
    if let Some(latest) = &manga.latest_chapter {
        status_line.push(Span::styled(
            format!("  Ch. {latest}"),
            Style::default().fg(Color::DarkGray),
        ));
    }
    f.render_widget(Paragraph::new(Line::from(status_line)), card_layout[3]);
}

fn draw_cover(f: &mut Frame, area: Rect, cover_state: Option<&mut StatefulProtocol>) {
    if let Some(state) = cover_state {
        let image_widget = StatefulImage::new().resize(Resize::Scale(None));
        f.render_stateful_widget(image_widget, area, state);
        return;
    }

    let placeholder = vec![
        Line::from(""),
        Line::from(""),
        Line::from(Span::styled("📚", Style::default().fg(Color::Magenta))),
        Line::from(Span::styled("Loading...", Style::default().fg(Color::DarkGray))),
    ];
    let image_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));
    let image_paragraph = Paragraph::new(placeholder)
        .block(image_block)
        .alignment(Alignment::Center);
    f.render_widget(image_paragraph, area);
}

fn draw_detail(f: &mut Frame, app: &mut App) {
    let area = f.area();
    let Some(state) = app.detail.as_mut() else {
        return;
    };

    let root = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(10), Constraint::Length(3)])
        .split(area);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(CARD_WIDTH), Constraint::Min(20)])
        .split(root[0]);

    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(18), Constraint::Min(3)])
        .split(columns[0]);
    draw_cover(f, left[0], app.cover_states.get_mut(&state.summary.id));

    let bookmarked = app.library.is_bookmarked(&state.summary.id);
    let mut meta = vec![Line::from(Span::styled(
        if bookmarked { "★ Bookmarked" } else { "☆ Not bookmarked" },
        Style::default().fg(Color::Yellow),
    ))];
    if let Some(progress) = app.library.progress(&state.summary.id) {
        meta.push(Line::from(Span::styled(
            format!("Last read: Ch. {} p.{}", progress.chapter_name, progress.page + 1),
            Style::default().fg(Color::Cyan),
        )));
    }
    f.render_widget(
        Paragraph::new(meta).block(Block::default().borders(Borders::ALL)),
        left[1],
    );

    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(12), Constraint::Min(5)])
        .split(columns[1]);

    let block = Block::default()
        .borders(Borders::ALL)
        .title(state.summary.title.clone())
        .border_style(Style::default().fg(Color::Cyan));
    let text_width = block.inner(right[0]).width as usize;

    let body = match (&state.detail, &state.error) {
        (Some(detail), _) => {
            let mut lines = vec![
                Line::from(vec![
                    Span::styled("Status: ", Style::default().fg(Color::Yellow)),
                    Span::raw(detail.status.label()),
                ]),
                Line::from(vec![
                    Span::styled("Authors: ", Style::default().fg(Color::Yellow)),
                    Span::raw(detail.authors.join(", ")),
                ]),
                Line::from(vec![
                    Span::styled("Genres: ", Style::default().fg(Color::Yellow)),
                    Span::raw(detail.genres.join(", ")),
                ]),
            ];
            if !detail.origin_names.is_empty() {
                lines.push(Line::from(vec![
                    Span::styled("Also known as: ", Style::default().fg(Color::Yellow)),
                    Span::raw(truncate_text(&detail.origin_names.join(", "), text_width)),
                ]));
            }
            if let Some(updated) = &detail.updated_at {
                lines.push(Line::from(vec![
                    Span::styled("Updated: ", Style::default().fg(Color::Yellow)),
                    Span::raw(updated.clone()),
                ]));
            }
            lines.push(Line::from(""));
            lines.extend(
                wrap_text(&detail.description, text_width, 4)
                    .into_iter()
                    .map(|l| Line::from(Span::styled(l, Style::default().fg(Color::DarkGray)))),
            );
            lines
        }
        (None, Some(err)) if err.is_not_found() => vec![Line::from("Manga not found.")],
        (None, Some(err)) => vec![
            Line::from(format!("Could not load manga: {err}")),
            Line::from("Press r to retry."),
        ],
        (None, None) => vec![Line::from(format!("{} Loading details...", spinner()))],
    };
    f.render_widget(Paragraph::new(body).block(block), right[0]);

    let progress_key = app
        .library
        .progress(&state.summary.id)
        .map(|p| p.chapter_key.clone());
    let items: Vec<ListItem> = state
        .detail
        .as_ref()
        .map(|d| {
            d.chapters
                .entries()
                .iter()
                .rev()
                .map(|c| {
                    let marker = if progress_key.as_ref() == Some(&c.key) { "● " } else { "  " };
                    ListItem::new(format!("{marker}{}", c.display_name()))
                })
                .collect()
        })
        .unwrap_or_default();
    let chapter_count = items.len();
    draw_chapter_list(
        f,
        right[1],
        &format!("Chapters ({chapter_count})"),
        items,
        &mut state.chapter_list_state,
    );

    draw_footer(
        f,
        root[1],
        &[
            ("↑/↓", "select"),
            ("Enter", "read"),
            ("c", "continue"),
            ("b", "bookmark"),
            ("Esc", "back"),
        ],
        app.status_message.as_deref(),
    );
}

pub(super) fn draw_chapter_list(
    f: &mut Frame,
    area: Rect,
    title: &str,
    items: Vec<ListItem>,
    state: &mut ListState,
) {
    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(title.to_string())
                .border_style(Style::default().fg(Color::Yellow)),
        )
        .highlight_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
        .highlight_symbol("▶ ");
    f.render_stateful_widget(list, area, state);
}

pub(super) fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        text.to_string()
    } else {
        format!(
            "{}...",
            text.chars()
                .take(max_len.saturating_sub(3))
                .collect::<String>()
        )
    }
}

fn wrap_text(text: &str, width: usize, max_lines: usize) -> Vec<String> {
    if width == 0 || max_lines == 0 {
        return vec![];
    }

    let mut lines = Vec::new();
    let mut current_line = String::new();

    for word in text.split_whitespace() {
        if current_line.is_empty() {
            current_line = word.to_string();
        } else if current_line.chars().count() + 1 + word.chars().count() <= width {
            current_line.push(' ');
            current_line.push_str(word);
        } else {
            lines.push(current_line);
            if lines.len() >= max_lines {
                if let Some(last) = lines.last_mut() {
                    let char_count = last.chars().count();
                    if char_count > 3 {
                        *last = last.chars().take(char_count - 3).collect::<String>() + "...";
                    }
                }
                return lines;
            }
            current_line = word.to_string();
        }
    }

    if !current_line.is_empty() && lines.len() < max_lines {
        lines.push(current_line);
    }

    lines
}

pub(super) fn draw_footer(f: &mut Frame, area: Rect, hints: &[(&str, &str)], status: Option<&str>) {
    let text = match status {
        Some(message) => Line::from(Span::styled(
            message.to_string(),
            Style::default().fg(Color::Green),
        )),
        None => Line::from(
            hints
                .iter()
                .flat_map(|(key, action)| {
                    [
                        Span::styled(key.to_string(), Style::default().fg(Color::Yellow)),
                        Span::raw(format!(": {action}  ")),
                    ]
                })
                .collect::<Vec<_>>(),
        ),
    };

    let p = Paragraph::new(text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .alignment(Alignment::Center);
    f.render_widget(p, area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_keeps_short_text() {
        assert_eq!(truncate_text("Naruto", 10), "Naruto");
        assert_eq!(truncate_text("Dragon Ball Super", 10), "Dragon ...");
    }

    #[test]
    fn wrap_stops_at_line_budget() {
        let lines = wrap_text("one two three four five six", 9, 2);
        assert_eq!(lines, vec!["one two", "th..."]);
    }

    #[test]
    fn at_least_one_card_fits() {
        assert_eq!(cards_visible(10), 1);
        assert_eq!(cards_visible(CARD_WIDTH * 3 + 4), 3);
    }
}
