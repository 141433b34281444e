use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, ListItem, Paragraph},
    Frame,
};
use ratatui_image::{picker::Picker, Resize, StatefulImage};

use super::app::{App, ReaderView};
use super::ui::{draw_chapter_list, draw_footer, draw_loading_screen, truncate_text};
use crate::reader::session::{ChapterStatus, ImageLoadState, PageFit, ReadingMode};

pub fn draw_reader(f: &mut Frame, app: &mut App) {
    let area = f.area();
    let App { reader, picker, .. } = app;
    let Some(reader) = reader.as_mut() else {
        return;
    };

    match reader.session.status().clone() {
        ChapterStatus::Loading => draw_loading_screen(f, area, "Loading chapter..."),
        ChapterStatus::Failed(err) => {
            let (title, detail) = if err.is_not_found() {
                (
                    "Chapter Not Found",
                    "This chapter does not exist or has been removed.".to_string(),
                )
            } else {
                ("Could not load chapter", err.to_string())
            };
            draw_failure(f, area, title, &detail);
        }
        ChapterStatus::Ready(manifest) => {
            let chrome = reader.controls.visible() && !reader.session.is_fullscreen();
            let body = if chrome {
                let layout = Layout::default()
                    .direction(Direction::Vertical)
                    .constraints([
                        Constraint::Length(3),
                        Constraint::Min(5),
                        Constraint::Length(3),
                    ])
                    .split(area);

                let chapter = match &manifest.chapter_title {
                    Some(title) => format!("Chapter {}: {title}", manifest.chapter_name),
                    None => format!("Chapter {}", manifest.chapter_name),
                };
                draw_reader_header(f, layout[0], reader, &manifest.manga_name, &chapter);
                draw_reader_footer(f, layout[2], reader);
                layout[1]
            } else {
                area
            };

            draw_pages(f, body, reader, picker.as_ref());

            if reader.controls.show_scroll_to_top() {
                let hint = Paragraph::new(" ↑ t: top ").style(
                    Style::default()
                        .fg(Color::Black)
                        .bg(Color::Yellow)
                        .add_modifier(Modifier::BOLD),
                );
                let width = 10.min(body.width);
                let hint_area = Rect::new(
                    body.x + body.width.saturating_sub(width + 1),
                    body.y + body.height.saturating_sub(2),
                    width,
                    1,
                );
                f.render_widget(hint, hint_area);
            }

            if reader.show_chapter_list {
                draw_chapter_overlay(f, area, reader);
            }
        }
    }
}

fn draw_failure(f: &mut Frame, area: Rect, title: &str, detail: &str) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(title.to_string())
        .border_style(Style::default().fg(Color::Red));

    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            title.to_string(),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(Span::styled(detail.to_string(), Style::default().fg(Color::DarkGray))),
        Line::from(""),
        Line::from(vec![
            Span::styled("r", Style::default().fg(Color::Yellow)),
            Span::raw(": retry  "),
            Span::styled("Esc", Style::default().fg(Color::Yellow)),
            Span::raw(": back"),
        ]),
    ];
    let paragraph = Paragraph::new(lines)
        .block(block)
        .alignment(Alignment::Center);
    f.render_widget(paragraph, area);
}

fn draw_reader_header(f: &mut Frame, area: Rect, reader: &ReaderView, manga: &str, chapter: &str) {
    let mode = if reader.session.is_mobile() {
        format!("{} (mobile)", reader.session.mode().label())
    } else {
        reader.session.mode().label().to_string()
    };
    let line = Line::from(vec![
        Span::styled(
            chapter.to_string(),
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("  ·  {mode}  ·  {}", reader.session.page_fit().label()),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let title = truncate_text(manga, area.width.saturating_sub(4) as usize);
    let header = Paragraph::new(line).block(
        Block::default()
            .borders(Borders::ALL)
            .title(title)
            .border_style(Style::default().fg(Color::Cyan)),
    );
    f.render_widget(header, area);
}

fn draw_reader_footer(f: &mut Frame, area: Rect, reader: &ReaderView) {
    let session = &reader.session;
    let page = format!("{} / {}", session.current_page() + 1, session.page_count());
    let mut hints: Vec<(&str, &str)> = vec![(page.as_str(), "page")];
    if !session.is_mobile() {
        hints.push(("←/→", "turn"));
    }
    if session.mode() == ReadingMode::Webtoon {
        hints.push(("↑/↓", "scroll"));
    }
    if session.has_previous_chapter() {
        hints.push(("p", "prev ch."));
    }
    if session.has_next_chapter() {
        hints.push(("n", "next ch."));
    }
    hints.extend([
        ("m", "mode"),
        ("w", "fit"),
        ("c", "chapters"),
        ("f", "fullscreen"),
        ("Esc", "back"),
    ]);
    draw_footer(f, area, &hints, None);
}

fn page_resize(fit: PageFit) -> Resize {
    match fit {
        PageFit::Width => Resize::Scale(None),
        PageFit::Height => Resize::Fit(None),
        PageFit::Original => Resize::Crop(None),
    }
}

fn draw_pages(f: &mut Frame, area: Rect, reader: &mut ReaderView, picker: Option<&Picker>) {
    let current = reader.session.current_page();
    match reader.session.mode() {
        ReadingMode::Single => draw_page(f, area, reader, current, picker),
        ReadingMode::Double => {
            let halves = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
                .split(area);
            draw_page(f, halves[0], reader, current, picker);
            if current + 1 < reader.session.page_count() {
                draw_page(f, halves[1], reader, current + 1, picker);
            }
        }
        ReadingMode::Webtoon => draw_strip(f, area, reader, picker),
    }
}

/// Pages stacked one viewport tall each, shifted by the scroll offset.
fn draw_strip(f: &mut Frame, area: Rect, reader: &mut ReaderView, picker: Option<&Picker>) {
    reader.page_rows = area.height.max(1);
    let rows = i64::from(reader.page_rows);
    let scroll = i64::from(reader.scroll_rows);

    let first = (scroll / rows) as usize;
    for page in first..reader.session.page_count() {
        let top = page as i64 * rows - scroll;
        if top >= i64::from(area.height) {
            break;
        }
        let visible_top = top.max(0);
        let visible_bottom = (top + rows).min(i64::from(area.height));
        if visible_bottom <= visible_top {
            continue;
        }
        let slot = Rect::new(
            area.x,
            area.y + visible_top as u16,
            area.width,
            (visible_bottom - visible_top) as u16,
        );
        draw_page(f, slot, reader, page, picker);
    }
}

fn draw_page(
    f: &mut Frame,
    area: Rect,
    reader: &mut ReaderView,
    page: usize,
    picker: Option<&Picker>,
) {
    let resize = page_resize(reader.session.page_fit());
    let state = reader.session.image_state(page);
    if let Some(protocol) = reader.protocol(page, picker) {
        f.render_stateful_widget(StatefulImage::new().resize(resize), area, protocol);
        return;
    }

    let (symbol, message, color) = match state {
        Some(ImageLoadState::Errored) => ("⚠", format!("Failed to load page {}", page + 1), Color::Red),
        Some(ImageLoadState::Loaded) if picker.is_none() => (
            "🖼",
            format!("Page {} (terminal has no image support)", page + 1),
            Color::DarkGray,
        ),
        _ => ("📖", format!("Loading page {}...", page + 1), Color::DarkGray),
    };
    let placeholder = Paragraph::new(vec![
        Line::from(""),
        Line::from(Span::styled(symbol, Style::default().fg(Color::Magenta))),
        Line::from(Span::styled(message, Style::default().fg(color))),
    ])
    .alignment(Alignment::Center)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray)),
    );
    f.render_widget(placeholder, area);
}

fn draw_chapter_overlay(f: &mut Frame, area: Rect, reader: &mut ReaderView) {
    let width = (area.width * 3 / 5).max(20).min(area.width);
    let height = (area.height * 3 / 4).max(5).min(area.height);
    let popup = Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    );

    let active = reader.session.chapter_position();
    let items: Vec<ListItem> = reader
        .session
        .chapters()
        .entries()
        .iter()
        .enumerate()
        .map(|(idx, chapter)| {
            let style = if Some(idx) == active {
                Style::default().fg(Color::Yellow)
            } else {
                Style::default()
            };
            ListItem::new(chapter.display_name()).style(style)
        })
        .collect();

    f.render_widget(Clear, popup);
    draw_chapter_list(f, popup, "Chapters", items, &mut reader.chapter_list_state);
}
