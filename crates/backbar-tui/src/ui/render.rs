use ratatui::{
    layout::{Constraint, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph},
    Frame,
};

use crate::app::{App, AppState, Tab};

use super::styles;
use super::tabs::cabinet;

/// Key bindings shown in the help popup, grouped by section.
const HELP_SECTIONS: &[(&str, &[(&str, &str)])] = &[
    (
        "Navigation",
        &[
            ("1/2 ←/→", "Cabinet / Shopping list"),
            ("↑/↓ j/k", "Move selection"),
            ("Tab", "List / detail focus"),
            ("/", "Search by name"),
            ("s / c", "Sort order / category filter"),
        ],
    ),
    (
        "Bottles",
        &[
            ("a", "Add from catalog"),
            ("+ / -", "Level up / down 10%"),
            ("w", "Toggle shopping list"),
            ("x", "Remove from this list"),
            ("d", "Delete ingredient"),
            ("r", "Rename"),
            ("p / P", "Purchased / purchase all"),
            ("z", "Undo last change"),
        ],
    ),
    (
        "Pantry",
        &[
            ("u", "Sync now"),
            ("L", "Sign out (keep local data)"),
            ("q", "Quit"),
        ],
    ),
];

pub fn render(frame: &mut Frame, app: &App) {
    let [title, tabs, body, status] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Length(3),
        Constraint::Min(10),
        Constraint::Length(2),
    ])
    .areas(frame.area());

    render_title_bar(frame, app, title);
    render_tabs(frame, app, tabs);
    cabinet::render(frame, app, body);
    render_status_bar(frame, app, status);

    match app.state {
        AppState::ShowingHelp => render_help_popup(frame),
        AppState::ConfirmingQuit => render_quit_popup(frame),
        AppState::Renaming => render_rename_popup(frame, app),
        AppState::Adding => render_add_popup(frame, app),
        _ => {}
    }
}

/// Spans with `right` pushed to the right edge of a line `width` wide.
fn spread<'a>(mut left: Vec<Span<'a>>, right: Span<'a>, width: u16) -> Line<'a> {
    let used: usize = left.iter().map(|s| s.content.chars().count()).sum::<usize>()
        + right.content.chars().count();
    left.push(Span::raw(" ".repeat((width as usize).saturating_sub(used + 1))));
    left.push(right);
    Line::from(left)
}

fn underlined() -> Block<'static> {
    Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::muted_style())
}

fn render_title_bar(frame: &mut Frame, app: &App, area: Rect) {
    let who = app.session.user().unwrap_or_else(|| "signed out".to_string());
    let line = spread(
        vec![Span::styled("  backbar", styles::title_style())],
        Span::styled(format!("{} · [?] Help", who), styles::muted_style()),
        area.width,
    );
    frame.render_widget(Paragraph::new(line).block(underlined()), area);
}

fn render_tabs(frame: &mut Frame, app: &App, area: Rect) {
    let mut spans = vec![Span::raw(" ")];
    for (i, tab) in [Tab::Cabinet, Tab::Shopping].into_iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled(" | ", styles::muted_style()));
        }
        let style = if tab == app.current_tab {
            styles::tab_style(true)
        } else {
            styles::muted_style()
        };
        spans.push(Span::styled(format!("[{}] {}", i + 1, tab.title()), style));
    }

    let searching = matches!(app.state, AppState::Searching);
    let line = if searching || !app.search_query.is_empty() {
        let cursor = if searching { "▌" } else { "" };
        let search = format!("/{}{}", app.search_query, cursor);
        spread(spans, Span::styled(search, styles::search_style()), area.width)
    } else {
        Line::from(spans)
    };
    frame.render_widget(Paragraph::new(line).block(underlined()), area);
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let left = match (app.undo_notice(), app.status_message.as_deref()) {
        (Some(notice), _) => Span::styled(
            format!(" {} - [z] undo ({}s) ", notice.label, notice.remaining.as_secs() + 1),
            styles::highlight_style(),
        ),
        (None, Some(msg)) => Span::styled(format!(" {} ", msg), styles::muted_style()),
        (None, None) => Span::raw(" "),
    };
    let right = Span::styled(
        format!(" {} · [z] undo | [u] sync | [q]uit ", app.sync_summary()),
        styles::muted_style(),
    );
    let line = spread(vec![left], right, area.width);
    frame.render_widget(Paragraph::new(line).style(styles::status_bar_style()), area);
}

/// Clear a centered `width` x `height` area, draw a bordered frame with an
/// optional title and return the inner area.
fn open_popup(frame: &mut Frame, width: u16, height: u16, title: Option<String>) -> Rect {
    let area = centered_rect_fixed(width, height, frame.area());
    frame.render_widget(Clear, area);

    let mut block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));
    if let Some(title) = title {
        block = block.title(title).title_style(styles::title_style());
    }
    let inner = block.inner(area);
    frame.render_widget(block, area);
    inner
}

fn render_help_popup(frame: &mut Frame) {
    let mut lines = vec![
        Line::from(vec![
            Span::styled("  backbar ", styles::title_style()),
            Span::styled(env!("CARGO_PKG_VERSION"), styles::muted_style()),
        ]),
    ];
    for (section, keys) in HELP_SECTIONS {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(format!(" {}", section), styles::highlight_style())));
        lines.extend(keys.iter().map(|(key, desc)| {
            Line::from(vec![
                Span::styled(format!("  {:<10}", key), styles::help_key_style()),
                Span::styled(*desc, styles::help_desc_style()),
            ])
        }));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled("  [?]/[Esc] close", styles::muted_style())));

    let height = lines.len() as u16 + 2;
    let inner = open_popup(frame, 52, height, None);
    frame.render_widget(Paragraph::new(lines), inner);
}

fn input_line(label: &str, value: &str) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!(" {}: [", label), styles::muted_style()),
        Span::styled(format!("{}▌", value), styles::selected_style()),
        Span::styled("]", styles::muted_style()),
    ])
}

fn render_rename_popup(frame: &mut Frame, app: &App) {
    let inner = open_popup(frame, 52, 6, Some(" Rename ".to_string()));
    let lines = vec![
        Line::from(""),
        input_line("New name", &app.input),
        Line::from(""),
        Line::from(Span::styled(" [Enter] save · [Esc] cancel", styles::muted_style())),
    ];
    frame.render_widget(Paragraph::new(lines), inner);
}

fn render_add_popup(frame: &mut Frame, app: &App) {
    let title = format!(" Add to {} ", app.current_tab.title());
    let inner = open_popup(frame, 52, 16, Some(title));
    let [input, list, hint] = Layout::vertical([
        Constraint::Length(2),
        Constraint::Min(3),
        Constraint::Length(1),
    ])
    .areas(inner);

    frame.render_widget(Paragraph::new(input_line("Name", &app.input)), input);

    let typed = app.input.trim();
    let items: Vec<ListItem> = app
        .add_candidates()
        .into_iter()
        .enumerate()
        .map(|(i, name)| {
            let label = if name == typed {
                format!("  + \"{}\"", name)
            } else {
                format!("  {}", name)
            };
            let style = if i == app.suggestion_selection {
                styles::selected_style()
            } else {
                styles::list_item_style()
            };
            ListItem::new(label).style(style)
        })
        .collect();
    frame.render_widget(List::new(items), list);

    frame.render_widget(
        Paragraph::new(Span::styled(
            " [↑/↓] choose · [Enter] add · [Esc] cancel",
            styles::muted_style(),
        )),
        hint,
    );
}

fn render_quit_popup(frame: &mut Frame) {
    let inner = open_popup(frame, 40, 5, Some(" Quit ".to_string()));
    let lines = vec![
        Line::from(""),
        Line::from(vec![
            Span::styled("  Close backbar? ", styles::highlight_style()),
            Span::styled("[y]", styles::help_key_style()),
            Span::styled(" yes  ", styles::muted_style()),
            Span::styled("[n]", styles::help_key_style()),
            Span::styled(" no", styles::muted_style()),
        ]),
    ];
    frame.render_widget(Paragraph::new(lines), inner);
}

fn centered_rect_fixed(width: u16, height: u16, r: Rect) -> Rect {
    let x = r.x + r.width.saturating_sub(width) / 2;
    let y = r.y + r.height.saturating_sub(height) / 2;
    Rect::new(x, y, width.min(r.width), height.min(r.height))
}
