use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Gauge, Paragraph, Row, Table, TableState, Wrap},
    Frame,
};

use backbar_core::models::IngredientEntry;
use backbar_core::utils::truncate_string;

use crate::app::{App, Focus, Tab};
use crate::ui::styles;

/// Render the Cabinet or Shopping tab - ingredient table with detail panel
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(area);

    let visible = app.visible();
    render_ingredient_table(frame, app, &visible, chunks[0]);
    render_ingredient_detail(frame, app, visible.get(app.selection), chunks[1]);
}

fn render_ingredient_table(frame: &mut Frame, app: &App, visible: &[IngredientEntry], area: Rect) {
    let focused = matches!(app.focus, Focus::List);
    let sort_indicator = if app.sort_ascending { " ▲" } else { " ▼" };

    let header = Row::new([
        Cell::from(format!("Name{}", sort_indicator)),
        Cell::from("Level"),
        Cell::from("Category"),
        Cell::from(""),
    ])
    .style(styles::title_style())
    .height(1);

    let rows: Vec<Row> = visible
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let style = if i == app.selection {
                styles::selected_style()
            } else {
                styles::list_item_style()
            };

            // Marks the entry's membership in the other list
            let flag = match app.current_tab {
                Tab::Cabinet if entry.wanted => "🛒",
                Tab::Shopping if entry.owned => "✓",
                _ => "",
            };

            Row::new(vec![
                Cell::from(truncate_string(&entry.name, 32)),
                Cell::from(Span::styled(
                    entry.quantity_display(),
                    styles::quantity_style(entry),
                )),
                Cell::from(entry.category.display_name()),
                Cell::from(flag),
            ])
            .style(style)
        })
        .collect();

    let widths = [
        Constraint::Fill(3),
        Constraint::Length(6),
        Constraint::Fill(1),
        Constraint::Length(2),
    ];

    let mut title = format!(" {} ({}) ", app.current_tab.title(), visible.len());
    if let Some(category) = app.category_filter {
        title.push_str(&format!("- {} ", category.display_name()));
    }
    if !app.search_query.is_empty() {
        title.push_str(&format!("- \"{}\" ", app.search_query));
    }

    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .title(title)
                .title_style(styles::muted_style())
                .borders(Borders::ALL)
                .border_style(styles::border_style(focused)),
        )
        .row_highlight_style(styles::selected_style());

    let mut state = TableState::default();
    if !visible.is_empty() {
        state.select(Some(app.selection));
    }

    frame.render_stateful_widget(table, area, &mut state);

    if visible.is_empty() {
        let hint = match app.current_tab {
            Tab::Cabinet => "No bottles yet - press [a] to add one",
            Tab::Shopping => "Nothing to buy - press [a] to add",
        };
        let inner = Rect::new(area.x + 2, area.y + 2, area.width.saturating_sub(4), 1);
        frame.render_widget(Paragraph::new(Span::styled(hint, styles::muted_style())), inner);
    }
}

fn render_ingredient_detail(
    frame: &mut Frame,
    app: &App,
    selected: Option<&IngredientEntry>,
    area: Rect,
) {
    let focused = matches!(app.focus, Focus::Detail);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(focused));

    let Some(entry) = selected else {
        let paragraph = Paragraph::new(Span::styled(
            "Select an ingredient from the list",
            styles::muted_style(),
        ))
        .block(block.title(" No Ingredient Selected "));
        frame.render_widget(paragraph, area);
        return;
    };

    let block = block
        .title(format!(" {} ", entry.name))
        .title_style(styles::title_style());
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(2), Constraint::Min(4)])
        .split(inner);

    let gauge = Gauge::default()
        .gauge_style(styles::quantity_style(entry))
        .ratio(entry.quantity.clamp(0.0, 1.0))
        .label(entry.quantity_display());
    frame.render_widget(gauge, Rect { height: 1, ..chunks[0] });

    let placeholder = "-";
    let yes_no = |value: bool| if value { "Yes" } else { "No" };
    let impact = entry
        .impact_score
        .map(|s| s.to_string())
        .unwrap_or_else(|| placeholder.to_string());
    let sync = match app.store.remote_id(&entry.id) {
        Some(remote_id) => format!("Pantry item #{}", remote_id),
        None if entry.owned && app.session.is_authenticated() => "Pending".to_string(),
        None => "Local only".to_string(),
    };

    let field = |label: &str, value: String| {
        Line::from(vec![
            Span::styled(format!("{:<12}", label), styles::highlight_style()),
            Span::raw(value),
        ])
    };

    let lines = vec![
        field("Category", entry.category.display_name().to_string()),
        field("In cabinet", yes_no(entry.owned).to_string()),
        field("Shopping", yes_no(entry.wanted).to_string()),
        field("Impact", impact),
        field("Sync", sync),
        Line::from(""),
        Line::from(Span::styled("Image", styles::highlight_style())),
        Line::from(Span::styled(
            entry.image_url.clone().unwrap_or_else(|| placeholder.to_string()),
            styles::muted_style(),
        )),
    ];

    let paragraph = Paragraph::new(lines).wrap(Wrap { trim: true });
    frame.render_widget(paragraph, chunks[1]);
}
