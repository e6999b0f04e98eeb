use std::time::Instant;

use ratatui::text::Line;
use tracing::warn;

use crate::backend::{ChatResponse, TransportError};
use crate::conversation::OutboundPayload;
use crate::session::{ChatSession, SubmitError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiMode {
    Normal,
    CommandPalette,
    References,
    HelpAbout,
}

/// Sent from request threads back to the event loop.
#[derive(Debug)]
pub enum UiUpdate {
    Reply(Result<ChatResponse, TransportError>),
}

#[derive(Debug, Clone)]
pub struct CommandItem {
    pub name: &'static str,
    pub shortcut: Option<&'static str>,
    pub description: &'static str,
    pub action: &'static str,
}

pub struct App {
    pub session: ChatSession,
    pub endpoint: String,
    pub input: String,
    /// Byte offset into `input`, always on a char boundary.
    pub cursor: usize,
    pub should_quit: bool,
    pub mode: UiMode,
    pub command_query: String,
    pub command_selected: usize,
    pub command_offset: usize,
    pub references_scroll: usize,
    pub scroll_from_bottom: usize,
    pub auto_scroll: bool,
    pub dirty: bool,
    pub toast: Option<(String, Instant)>,
    pub needs_clear: bool,
    pub timeline_revision: u64,
    pub timeline_cache_rev: u64,
    pub timeline_cache_width: usize,
    pub timeline_cache: Vec<Line<'static>>,
    pub spinner_index: usize,
}

impl App {
    pub fn new(session: ChatSession, endpoint: String) -> Self {
        Self {
            session,
            endpoint,
            input: String::new(),
            cursor: 0,
            should_quit: false,
            mode: UiMode::Normal,
            command_query: String::new(),
            command_selected: 0,
            command_offset: 0,
            references_scroll: 0,
            scroll_from_bottom: 0,
            auto_scroll: true,
            dirty: true,
            toast: None,
            needs_clear: false,
            timeline_revision: 0,
            timeline_cache_rev: u64::MAX,
            timeline_cache_width: 0,
            timeline_cache: Vec::new(),
            spinner_index: 0,
        }
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn set_toast(&mut self, msg: impl Into<String>) {
        self.toast = Some((msg.into(), Instant::now()));
        self.mark_dirty();
    }

    fn timeline_changed(&mut self) {
        self.timeline_revision = self.timeline_revision.saturating_add(1);
        if self.auto_scroll {
            self.scroll_from_bottom = 0;
        }
        self.mark_dirty();
    }

    /// Hands the typed question to the session. The input is kept while a
    /// previous question is still pending.
    pub fn submit_input(&mut self) -> Option<OutboundPayload> {
        match self.session.submit(&self.input) {
            Ok(payload) => {
                self.clear_input();
                self.auto_scroll = true;
                self.scroll_from_bottom = 0;
                self.timeline_changed();
                Some(payload)
            }
            Err(SubmitError::EmptyInput) => None,
            Err(err) => {
                self.set_toast(err.to_string());
                None
            }
        }
    }

    pub fn apply_reply(&mut self, outcome: Result<ChatResponse, TransportError>) {
        if let Err(err) = self.session.settle(outcome) {
            warn!(error = %err, "reply arrived with no pending question");
            return;
        }
        self.timeline_changed();
    }

    pub fn new_conversation(&mut self) {
        match self.session.reset() {
            Ok(()) => {
                self.needs_clear = true;
                self.clear_input();
                self.scroll_from_bottom = 0;
                self.auto_scroll = true;
                self.timeline_changed();
            }
            Err(err) => self.set_toast(err.to_string()),
        }
    }

    pub fn clear_input(&mut self) {
        self.input.clear();
        self.cursor = 0;
        self.mark_dirty();
    }

    pub fn insert_char(&mut self, ch: char) {
        self.input.insert(self.cursor, ch);
        self.cursor += ch.len_utf8();
        self.mark_dirty();
    }

    pub fn insert_str(&mut self, text: &str) {
        self.input.insert_str(self.cursor, text);
        self.cursor += text.len();
        self.mark_dirty();
    }

    pub fn backspace(&mut self) {
        if let Some((idx, _)) = self.input[..self.cursor].char_indices().next_back() {
            self.input.remove(idx);
            self.cursor = idx;
            self.mark_dirty();
        }
    }

    pub fn move_left(&mut self) {
        if let Some((idx, _)) = self.input[..self.cursor].char_indices().next_back() {
            self.cursor = idx;
            self.mark_dirty();
        }
    }

    pub fn move_right(&mut self) {
        if let Some(ch) = self.input[self.cursor..].chars().next() {
            self.cursor += ch.len_utf8();
            self.mark_dirty();
        }
    }

    pub fn delete_word(&mut self) {
        if self.cursor == 0 {
            return;
        }
        let before = self.input[..self.cursor].trim_end();
        let word_start = before.rfind(' ').map(|i| i + 1).unwrap_or(0);
        let after = self.input[self.cursor..].to_string();
        self.input = format!("{}{}", &before[..word_start], after);
        self.cursor = word_start;
        self.mark_dirty();
    }
}
