use std::sync::mpsc::Sender;
use std::sync::Arc;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tracing::debug;

use crate::app::{App, UiMode, UiUpdate};
use crate::backend::QaClient;
use crate::commands::{commands_list, execute_command, filter_commands, parse_command};

const PAGE_SIZE: usize = 10;

/// The question box is a single line, so pasted line breaks become spaces.
pub fn handle_paste(app: &mut App, text: String) {
    if matches!(app.mode, UiMode::Normal) {
        let flattened: String = text
            .lines()
            .map(str::trim_end)
            .collect::<Vec<_>>()
            .join(" ");
        app.insert_str(&flattened);
    }
}

pub fn handle_key(app: &mut App, key: KeyEvent, client: &Arc<dyn QaClient>, tx: &Sender<UiUpdate>) {
    if handle_overlay_keys(app, key) {
        return;
    }

    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Char('c') if ctrl => {
            app.should_quit = true;
        }
        KeyCode::Char('u') if ctrl => {
            app.clear_input();
        }
        KeyCode::Char('w') if ctrl => {
            app.delete_word();
        }
        KeyCode::Char('a') if ctrl => {
            app.cursor = 0;
            app.mark_dirty();
        }
        KeyCode::Char('e') if ctrl => {
            app.cursor = app.input.len();
            app.mark_dirty();
        }
        KeyCode::Char('/') if app.input.is_empty() => {
            app.mode = UiMode::CommandPalette;
            app.command_query.clear();
            app.command_selected = 0;
            app.command_offset = 0;
            app.mark_dirty();
        }
        KeyCode::Up if app.input.is_empty() => scroll_up(app, 1),
        KeyCode::Down if app.input.is_empty() => scroll_down(app, 1),
        KeyCode::PageUp if app.input.is_empty() => scroll_up(app, PAGE_SIZE),
        KeyCode::PageDown if app.input.is_empty() => scroll_down(app, PAGE_SIZE),
        KeyCode::Home if app.input.is_empty() => {
            app.scroll_from_bottom = usize::MAX;
            app.auto_scroll = false;
            app.mark_dirty();
        }
        KeyCode::End if app.input.is_empty() => {
            app.scroll_from_bottom = 0;
            app.auto_scroll = true;
            app.mark_dirty();
        }
        KeyCode::Enter => {
            let content = app.input.trim().to_string();
            if content.starts_with('/') {
                if let Some((cmd, arg)) = parse_command(&content) {
                    app.clear_input();
                    execute_command(app, &cmd, arg);
                } else {
                    app.set_toast("Unknown command");
                }
                return;
            }
            if let Some(payload) = app.submit_input() {
                let client = Arc::clone(client);
                let tx = tx.clone();
                std::thread::spawn(move || {
                    let outcome = client.ask(&payload);
                    if tx.send(UiUpdate::Reply(outcome)).is_err() {
                        debug!("reply dropped, event loop has exited");
                    }
                });
            }
        }
        KeyCode::Backspace => app.backspace(),
        KeyCode::Left => app.move_left(),
        KeyCode::Right => app.move_right(),
        KeyCode::Char(ch) => {
            if !ctrl && !key.modifiers.contains(KeyModifiers::ALT) {
                app.insert_char(ch);
            }
        }
        _ => {}
    }
}

fn scroll_up(app: &mut App, by: usize) {
    app.scroll_from_bottom = app.scroll_from_bottom.saturating_add(by);
    app.auto_scroll = false;
    app.mark_dirty();
}

fn scroll_down(app: &mut App, by: usize) {
    app.scroll_from_bottom = app.scroll_from_bottom.saturating_sub(by);
    if app.scroll_from_bottom == 0 {
        app.auto_scroll = true;
    }
    app.mark_dirty();
}

pub fn handle_overlay_keys(app: &mut App, key: KeyEvent) -> bool {
    match app.mode {
        UiMode::CommandPalette => {
            let commands = filter_commands(&commands_list(), &app.command_query);
            let max_index = commands.len().saturating_sub(1);
            match key.code {
                KeyCode::Esc => {
                    app.mode = UiMode::Normal;
                }
                KeyCode::Up => {
                    app.command_selected = app.command_selected.saturating_sub(1);
                }
                KeyCode::Down => {
                    if app.command_selected + 1 < commands.len() {
                        app.command_selected += 1;
                    }
                }
                KeyCode::PageUp => {
                    app.command_selected = app.command_selected.saturating_sub(PAGE_SIZE);
                }
                KeyCode::PageDown => {
                    app.command_selected = (app.command_selected + PAGE_SIZE).min(max_index);
                }
                KeyCode::Backspace => {
                    app.command_query.pop();
                    app.command_selected = 0;
                    app.command_offset = 0;
                }
                KeyCode::Enter => {
                    app.mode = UiMode::Normal;
                    if let Some(cmd) = commands.get(app.command_selected) {
                        execute_command(app, cmd, None);
                    }
                    app.command_query.clear();
                    app.command_offset = 0;
                }
                KeyCode::Char(ch) => {
                    if !key.modifiers.contains(KeyModifiers::CONTROL) && !key.modifiers.contains(KeyModifiers::ALT) {
                        app.command_query.push(ch);
                        app.command_selected = 0;
                        app.command_offset = 0;
                    }
                }
                _ => {}
            }
            // Clamp against the list as filtered after this key.
            let visible = filter_commands(&commands_list(), &app.command_query).len();
            if visible == 0 {
                app.command_selected = 0;
                app.command_offset = 0;
            } else {
                if app.command_selected >= visible {
                    app.command_selected = visible - 1;
                }
                if app.command_selected < app.command_offset {
                    app.command_offset = app.command_selected;
                } else if app.command_selected >= app.command_offset + PAGE_SIZE {
                    app.command_offset = app.command_selected + 1 - PAGE_SIZE;
                }
            }
            app.mark_dirty();
            true
        }
        UiMode::References => {
            match key.code {
                KeyCode::Esc | KeyCode::Enter => app.mode = UiMode::Normal,
                KeyCode::Up => app.references_scroll = app.references_scroll.saturating_sub(1),
                KeyCode::Down => app.references_scroll = app.references_scroll.saturating_add(1),
                KeyCode::PageUp => app.references_scroll = app.references_scroll.saturating_sub(PAGE_SIZE),
                KeyCode::PageDown => app.references_scroll = app.references_scroll.saturating_add(PAGE_SIZE),
                _ => {}
            }
            app.mark_dirty();
            true
        }
        UiMode::HelpAbout => {
            if matches!(key.code, KeyCode::Esc | KeyCode::Enter) {
                app.mode = UiMode::Normal;
                app.mark_dirty();
            }
            true
        }
        UiMode::Normal => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ChatResponse, TransportError};
    use crate::conversation::OutboundPayload;
    use crate::session::{ChatSession, SessionState};
    use pretty_assertions::assert_eq;
    use std::sync::mpsc;
    use std::time::Duration;

    struct CannedClient;

    impl QaClient for CannedClient {
        fn ask(&self, payload: &OutboundPayload) -> Result<ChatResponse, TransportError> {
            Ok(ChatResponse {
                chat_response: format!("You asked **{}**", payload.question),
                references: Vec::new(),
            })
        }
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(ch: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(ch), KeyModifiers::CONTROL)
    }

    fn setup() -> (App, Arc<dyn QaClient>, Sender<UiUpdate>, mpsc::Receiver<UiUpdate>) {
        let (tx, rx) = mpsc::channel();
        let app = App::new(ChatSession::default(), "http://127.0.0.1:8000/chat".to_string());
        (app, Arc::new(CannedClient), tx, rx)
    }

    fn type_text(app: &mut App, client: &Arc<dyn QaClient>, tx: &Sender<UiUpdate>, text: &str) {
        for ch in text.chars() {
            handle_key(app, key(KeyCode::Char(ch)), client, tx);
        }
    }

    #[test]
    fn enter_sends_question_in_background() {
        let (mut app, client, tx, rx) = setup();
        type_text(&mut app, &client, &tx, "bail");
        handle_key(&mut app, key(KeyCode::Enter), &client, &tx);
        assert_eq!(app.session.state(), SessionState::AwaitingResponse);

        let UiUpdate::Reply(outcome) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        app.apply_reply(outcome);
        let last = app.session.conversation().last().unwrap();
        assert_eq!(
            last.safe_html().map(|h| h.as_str()),
            Some("<p>You asked <strong>bail</strong></p>")
        );
    }

    #[test]
    fn paste_collapses_line_breaks() {
        let (mut app, _, _, _) = setup();
        handle_paste(&mut app, "line one\r\nline two\n".to_string());
        assert_eq!(app.input, "line one line two");
    }

    #[test]
    fn control_keys_edit_input() {
        let (mut app, client, tx, _rx) = setup();
        type_text(&mut app, &client, &tx, "charge sheet");
        handle_key(&mut app, ctrl('w'), &client, &tx);
        assert_eq!(app.input, "charge ");
        handle_key(&mut app, ctrl('a'), &client, &tx);
        assert_eq!(app.cursor, 0);
        handle_key(&mut app, ctrl('e'), &client, &tx);
        assert_eq!(app.cursor, app.input.len());
        handle_key(&mut app, ctrl('u'), &client, &tx);
        assert!(app.input.is_empty());
        handle_key(&mut app, ctrl('c'), &client, &tx);
        assert!(app.should_quit);
    }

    #[test]
    fn slash_opens_palette_and_esc_closes_it() {
        let (mut app, client, tx, _rx) = setup();
        handle_key(&mut app, key(KeyCode::Char('/')), &client, &tx);
        assert_eq!(app.mode, UiMode::CommandPalette);
        type_text(&mut app, &client, &tx, "ab");
        assert_eq!(app.command_query, "ab");
        handle_key(&mut app, key(KeyCode::Esc), &client, &tx);
        assert_eq!(app.mode, UiMode::Normal);
    }

    #[test]
    fn palette_enter_runs_selected_command() {
        let (mut app, client, tx, _rx) = setup();
        handle_key(&mut app, key(KeyCode::Char('/')), &client, &tx);
        type_text(&mut app, &client, &tx, "about");
        handle_key(&mut app, key(KeyCode::Enter), &client, &tx);
        assert_eq!(app.mode, UiMode::HelpAbout);
        handle_key(&mut app, key(KeyCode::Esc), &client, &tx);
        assert_eq!(app.mode, UiMode::Normal);
    }

    #[test]
    fn typed_slash_command_is_executed_not_sent() {
        let (mut app, client, tx, _rx) = setup();
        app.insert_str("/quit");
        handle_key(&mut app, key(KeyCode::Enter), &client, &tx);
        assert!(app.should_quit);
        assert!(app.session.conversation().is_empty());
    }

    #[test]
    fn scrolling_only_when_input_is_empty() {
        let (mut app, client, tx, _rx) = setup();
        handle_key(&mut app, key(KeyCode::PageUp), &client, &tx);
        assert_eq!(app.scroll_from_bottom, PAGE_SIZE);
        assert!(!app.auto_scroll);
        handle_key(&mut app, key(KeyCode::End), &client, &tx);
        assert_eq!(app.scroll_from_bottom, 0);
        assert!(app.auto_scroll);
    }
}
