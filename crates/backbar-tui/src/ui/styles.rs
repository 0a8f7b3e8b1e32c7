//! Colors and text styles. Warm bar tones: amber labels, brass accents,
//! lime for healthy bottle levels and cherry for nearly empty ones.

use ratatui::style::{Color, Modifier, Style};

use backbar_core::models::IngredientEntry;

pub const AMBER: Color = Color::Rgb(176, 112, 48);
pub const BRASS: Color = Color::Rgb(192, 160, 64);
pub const LIME: Color = Color::Rgb(120, 168, 72);
pub const CHERRY: Color = Color::Rgb(192, 64, 64);
pub const SMOKE: Color = Color::Rgb(128, 120, 116);
pub const OAK: Color = Color::Rgb(56, 44, 40);
pub const CHARCOAL: Color = Color::Rgb(32, 28, 28);

/// Bottle levels (percent) at or below which the level is shown as low.
const LEVEL_EMPTY_MAX: u8 = 15;
const LEVEL_LOW_MAX: u8 = 40;

fn fg(color: Color) -> Style {
    Style::default().fg(color)
}

fn bold(color: Color) -> Style {
    fg(color).add_modifier(Modifier::BOLD)
}

pub fn title_style() -> Style {
    bold(AMBER)
}

pub fn selected_style() -> Style {
    Style::default().bg(OAK).add_modifier(Modifier::BOLD)
}

pub fn list_item_style() -> Style {
    fg(Color::White)
}

pub fn muted_style() -> Style {
    fg(SMOKE)
}

pub fn highlight_style() -> Style {
    fg(BRASS)
}

pub fn search_style() -> Style {
    fg(BRASS).add_modifier(Modifier::ITALIC)
}

pub fn tab_style(selected: bool) -> Style {
    match selected {
        true => bold(AMBER).add_modifier(Modifier::UNDERLINED),
        false => list_item_style(),
    }
}

pub fn border_style(focused: bool) -> Style {
    fg(if focused { AMBER } else { SMOKE })
}

pub fn status_bar_style() -> Style {
    fg(Color::White).bg(CHARCOAL)
}

pub fn help_key_style() -> Style {
    bold(BRASS)
}

pub fn help_desc_style() -> Style {
    list_item_style()
}

/// Level color for a bottle: cherry when nearly empty, brass when low.
pub fn quantity_style(entry: &IngredientEntry) -> Style {
    match entry.quantity_percent() {
        p if p <= LEVEL_EMPTY_MAX => fg(CHERRY),
        p if p <= LEVEL_LOW_MAX => fg(BRASS),
        _ => fg(LIME),
    }
}
