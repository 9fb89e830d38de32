use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use std::path::PathBuf;

use crate::app::{App, InputMode, Screen};
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key).await?,
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.tick_animation(),
        AppEvent::Completed(completion) => app.apply_completion(completion),
    }
    Ok(())
}

async fn handle_key(app: &mut App, key: KeyEvent) -> Result<()> {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return Ok(());
    }

    match app.input_mode {
        InputMode::Normal => match app.screen {
            Screen::Home => handle_home(app, key),
            Screen::Chat => handle_chat_normal(app, key),
        },
        InputMode::Editing => handle_composer(app, key),
        InputMode::Upload => handle_upload_path(app, key).await,
    }

    Ok(())
}

fn handle_home(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Enter | KeyCode::Char('c') => app.enter_chat(),
        KeyCode::Char('t') => app.toggle_theme(),
        _ => {}
    }
}

fn handle_chat_normal(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Esc | KeyCode::Char('h') => app.leave_chat(),
        KeyCode::Char('t') => app.toggle_theme(),

        // Upload controls are locked while a request is in flight
        KeyCode::Char('u') => {
            if app.is_busy() {
                app.notice = Some("Wait for the current request to finish".to_string());
            } else {
                app.upload_path.clear();
                app.input_mode = InputMode::Upload;
            }
        }

        KeyCode::Char('i') | KeyCode::Tab | KeyCode::Enter => {
            let can_ask = app.session().is_some_and(|s| s.can_ask());
            if can_ask {
                app.input_mode = InputMode::Editing;
                app.composer_cursor = app.composer.chars().count();
            } else if app.session().is_some_and(|s| s.document().is_none()) && !app.is_busy() {
                app.notice = Some("Upload a PDF first (press u)".to_string());
            }
        }

        KeyCode::Char('r') => app.retry(),
        KeyCode::Char('x') => app.dismiss_error(),

        KeyCode::Char('j') | KeyCode::Down => app.scroll_down(),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_up(),
        KeyCode::PageDown => (0..10).for_each(|_| app.scroll_down()),
        KeyCode::PageUp => (0..10).for_each(|_| app.scroll_up()),
        KeyCode::Char('G') | KeyCode::End => app.scroll_to_bottom(),
        _ => {}
    }
}

fn handle_composer(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Enter => {
            app.submit_question();
            if app.is_busy() {
                app.input_mode = InputMode::Normal;
            }
        }
        KeyCode::Backspace => {
            if app.composer_cursor > 0 {
                app.composer_cursor -= 1;
                let byte_pos = char_to_byte_index(&app.composer, app.composer_cursor);
                app.composer.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            let char_count = app.composer.chars().count();
            if app.composer_cursor < char_count {
                let byte_pos = char_to_byte_index(&app.composer, app.composer_cursor);
                app.composer.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            app.composer_cursor = app.composer_cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.composer.chars().count();
            app.composer_cursor = (app.composer_cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            app.composer_cursor = 0;
        }
        KeyCode::End => {
            app.composer_cursor = app.composer.chars().count();
        }
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(&app.composer, app.composer_cursor);
            app.composer.insert(byte_pos, c);
            app.composer_cursor += 1;
        }
        _ => {}
    }
}

async fn handle_upload_path(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Enter => {
            app.input_mode = InputMode::Normal;
            let path = expand_home(app.upload_path.trim());
            if !path.as_os_str().is_empty() {
                app.upload(&path).await;
            }
        }
        KeyCode::Backspace => {
            app.upload_path.pop();
        }
        KeyCode::Char(c) => {
            app.upload_path.push(c);
        }
        _ => {}
    }
}

/// Expand a leading `~/` to the home directory
fn expand_home(input: &str) -> PathBuf {
    match input.strip_prefix("~/").zip(dirs::home_dir()) {
        Some((rest, home)) => home.join(rest),
        None => PathBuf::from(input),
    }
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    if app.screen != Screen::Chat {
        return;
    }
    match mouse.kind {
        MouseEventKind::ScrollDown => app.scroll_down(),
        MouseEventKind::ScrollUp => app.scroll_up(),
        _ => {}
    }
}
