//! Keyboard input handling for the TUI.
//!
//! This module handles all keyboard events and translates them into
//! application state changes and cabinet store operations.

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent};

use crate::app::{can_add_name_char, App, AppState, Focus, Tab, PAGE_SCROLL_SIZE, QUANTITY_STEP};

/// Handle keyboard input. Returns true if the app should quit.
pub fn handle_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    match app.state {
        AppState::ShowingHelp => {
            if matches!(key.code, KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q')) {
                app.state = AppState::Normal;
            }
            return Ok(false);
        }
        AppState::ConfirmingQuit => {
            match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                    app.state = AppState::Quitting;
                    return Ok(true);
                }
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                    app.state = AppState::Normal;
                }
                _ => {}
            }
            return Ok(false);
        }
        AppState::Searching => {
            handle_search_input(app, key);
            return Ok(false);
        }
        AppState::Renaming => {
            handle_rename_input(app, key);
            return Ok(false);
        }
        AppState::Adding => {
            handle_add_input(app, key);
            return Ok(false);
        }
        AppState::Normal | AppState::Quitting => {}
    }

    match key.code {
        KeyCode::Char('q') => app.state = AppState::ConfirmingQuit,
        KeyCode::Char('?') => app.state = AppState::ShowingHelp,
        KeyCode::Char('1') => app.switch_tab(Tab::Cabinet),
        KeyCode::Char('2') => app.switch_tab(Tab::Shopping),
        KeyCode::Left | KeyCode::Right => app.switch_tab(app.current_tab.next()),
        KeyCode::Tab | KeyCode::BackTab => {
            app.focus = match app.focus {
                Focus::List => Focus::Detail,
                Focus::Detail => Focus::List,
            };
        }
        KeyCode::Esc => {
            if !app.search_query.is_empty() {
                app.search_query.clear();
                app.selection = 0;
            } else {
                app.focus = Focus::List;
            }
        }

        // Navigation
        KeyCode::Char('j') | KeyCode::Down => app.select_next(1),
        KeyCode::Char('k') | KeyCode::Up => app.select_prev(1),
        KeyCode::PageDown => app.select_next(PAGE_SCROLL_SIZE),
        KeyCode::PageUp => app.select_prev(PAGE_SCROLL_SIZE),
        KeyCode::Home => app.selection = 0,
        KeyCode::End => app.select_last(),

        // View
        KeyCode::Char('/') => app.state = AppState::Searching,
        KeyCode::Char('s') => app.toggle_sort(),
        KeyCode::Char('c') => app.cycle_category(),

        // Actions
        KeyCode::Char('a') => app.start_add(),
        KeyCode::Char('r') => app.start_rename(),
        KeyCode::Char('w') => app.toggle_wanted(),
        KeyCode::Char('x') => app.remove_from_list(),
        KeyCode::Char('d') | KeyCode::Delete => app.delete_selected(),
        KeyCode::Char('+') | KeyCode::Char('=') => app.adjust_selected(QUANTITY_STEP),
        KeyCode::Char('-') => app.adjust_selected(-QUANTITY_STEP),
        KeyCode::Char('p') => app.purchase_selected(),
        KeyCode::Char('P') => app.purchase_all(),
        KeyCode::Char('z') => app.undo(),
        KeyCode::Char('u') => app.sync_now(),
        KeyCode::Char('L') => app.sign_out(),
        _ => {}
    }
    Ok(false)
}

fn handle_search_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.state = AppState::Normal;
            app.search_query.clear();
            app.selection = 0;
        }
        KeyCode::Enter => {
            // Keep search query active
            app.state = AppState::Normal;
        }
        KeyCode::Backspace => {
            app.search_query.pop();
            app.selection = 0;
        }
        KeyCode::Char(c) if can_add_name_char(app.search_query.chars().count(), c) => {
            app.search_query.push(c);
            app.selection = 0;
        }
        _ => {}
    }
}

fn handle_rename_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.cancel_input(),
        KeyCode::Enter => app.commit_rename(),
        KeyCode::Backspace => {
            app.input.pop();
        }
        KeyCode::Char(c) if can_add_name_char(app.input.chars().count(), c) => {
            app.input.push(c);
        }
        _ => {}
    }
}

fn handle_add_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.cancel_input(),
        KeyCode::Enter => app.commit_add(),
        KeyCode::Down | KeyCode::Tab => {
            let count = app.add_candidates().len();
            if count > 0 {
                app.suggestion_selection = (app.suggestion_selection + 1) % count;
            }
        }
        KeyCode::Up | KeyCode::BackTab => {
            let count = app.add_candidates().len();
            if count > 0 {
                app.suggestion_selection = (app.suggestion_selection + count - 1) % count;
            }
        }
        KeyCode::Backspace => {
            app.input.pop();
            app.suggestion_selection = 0;
        }
        KeyCode::Char(c) if can_add_name_char(app.input.chars().count(), c) => {
            app.input.push(c);
            app.suggestion_selection = 0;
        }
        _ => {}
    }
}
