use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, BorderType, Borders, Clear, Paragraph, Wrap};
use ratatui::{Frame, Terminal};

use textwrap::wrap;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::app::{App, UiMode};
use crate::commands::{commands_list, filter_commands};
use crate::constants::*;
use crate::conversation::{Conversation, Message, Role};
use crate::render::{Block as ResponseBlock, Inline};
use crate::session::SessionState;

pub fn render_ui(terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>, app: &mut App) -> anyhow::Result<()> {
    terminal.draw(|frame| {
        let size = frame.size();
        let base = Block::default().style(Style::default().bg(COLOR_BG));
        frame.render_widget(base, size);

        let inner_width = size.width.saturating_sub(2) as usize;
        let overlay_lines = build_inline_overlay(app);
        let status_line = format_status_line(app);

        let max_input_lines = 3usize;
        let input_content_width = inner_width.saturating_sub(4).max(8);
        let input_lines = wrap_input(&app.input, input_content_width);
        let input_start = input_lines.len().saturating_sub(max_input_lines);
        let visible_input_lines = input_lines[input_start..].to_vec();

        let overlay_height = overlay_lines.as_ref().map(|l| l.len() as u16).unwrap_or(0);
        let input_count = (visible_input_lines.len() as u16).max(1);
        let unified_height = (overlay_height + input_count + 1 + 2)
            .min(size.height.saturating_sub(3))
            .max(4);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(1), Constraint::Length(unified_height)])
            .split(size);
        let timeline_area = chunks[0];
        let input_area = chunks[1];

        if app.session.conversation().is_empty() && !app.session.is_awaiting() {
            render_splash(frame, timeline_area);
        } else {
            render_timeline(frame, timeline_area, app);
        }

        render_input_box(
            frame,
            input_area,
            app,
            overlay_lines,
            visible_input_lines,
            input_start,
            input_content_width,
            status_line,
        );

        render_overlay(frame, size, app);
    })?;
    Ok(())
}

fn title_line() -> Line<'static> {
    Line::from(vec![
        Span::styled("Apna ", Style::default().fg(Color::White).add_modifier(Modifier::BOLD)),
        Span::styled("Waqeel", Style::default().fg(COLOR_AMBER).add_modifier(Modifier::BOLD)),
    ])
}

fn render_timeline(frame: &mut Frame, area: Rect, app: &mut App) {
    // Borders take two columns and two rows.
    let timeline_lines = build_timeline_lines_cached(app, area.width.saturating_sub(2) as usize);
    let view_height = area.height.saturating_sub(2) as usize;
    let total_lines = timeline_lines.len();
    let max_scroll = total_lines.saturating_sub(view_height);
    if app.scroll_from_bottom > max_scroll {
        app.scroll_from_bottom = max_scroll;
    }
    let start = total_lines.saturating_sub(view_height + app.scroll_from_bottom);
    let end = (start + view_height).min(total_lines);
    let timeline_text = Text::from(timeline_lines[start..end].to_vec());

    let timeline = Paragraph::new(timeline_text).block(
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(COLOR_BORDER))
            .title(title_line())
            .style(Style::default().bg(COLOR_BG_ALT)),
    );
    frame.render_widget(timeline, area);
}

pub fn build_timeline_lines_cached(app: &mut App, width: usize) -> Vec<Line<'static>> {
    if app.session.is_awaiting() {
        return build_timeline_lines(app.session.conversation(), true, width, app.spinner_index);
    }
    if app.timeline_cache_rev == app.timeline_revision && app.timeline_cache_width == width {
        return app.timeline_cache.clone();
    }
    let lines = build_timeline_lines(app.session.conversation(), false, width, app.spinner_index);
    app.timeline_cache = lines.clone();
    app.timeline_cache_rev = app.timeline_revision;
    app.timeline_cache_width = width;
    lines
}

pub fn build_timeline_lines(
    conversation: &Conversation,
    awaiting: bool,
    width: usize,
    spinner_index: usize,
) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = Vec::new();
    let content_width = width.saturating_sub(2).max(10);

    for message in conversation.messages() {
        if !lines.is_empty() {
            lines.push(Line::from(""));
        }
        match message.role() {
            Role::User => {
                lines.push(Line::from(vec![
                    Span::styled("> ", Style::default().fg(COLOR_AMBER).add_modifier(Modifier::BOLD)),
                    Span::styled("You", Style::default().fg(COLOR_AMBER).add_modifier(Modifier::BOLD)),
                ]));
                let body: Vec<Line> = wrap_plain_lines(message.content(), content_width)
                    .into_iter()
                    .map(|l| Line::from(Span::styled(l, Style::default().fg(COLOR_TEXT))))
                    .collect();
                lines.extend(indent_lines(body, 2));
            }
            Role::Assistant => {
                lines.push(Line::from(vec![
                    Span::styled("> ", Style::default().fg(Color::White).add_modifier(Modifier::BOLD)),
                    Span::styled("Waqeel", Style::default().fg(Color::White).add_modifier(Modifier::BOLD)),
                ]));
                lines.extend(indent_lines(assistant_body(message, content_width), 2));
            }
        }
    }

    if awaiting {
        if !lines.is_empty() {
            lines.push(Line::from(""));
        }
        let spinner = SPINNER_FRAMES[spinner_index % SPINNER_FRAMES.len()];
        lines.push(Line::from(vec![
            Span::styled(spinner, Style::default().fg(COLOR_AMBER)),
            Span::raw(" "),
            Span::styled("Thinking...", Style::default().fg(COLOR_TEXT_DIM).add_modifier(Modifier::ITALIC)),
        ]));
    }
    lines
}

fn assistant_body(message: &Message, width: usize) -> Vec<Line<'static>> {
    let mut body = match message.rendered() {
        Some(rendered) => render_blocks(&rendered.blocks, width),
        None => wrap_plain_lines(message.content(), width)
            .into_iter()
            .map(|l| Line::from(Span::styled(l, Style::default().fg(COLOR_ERROR))))
            .collect(),
    };
    if !message.references().is_empty() {
        body.push(Line::from(""));
        body.push(Line::from(Span::styled(
            "References:",
            Style::default().fg(COLOR_TEXT_MUTED).add_modifier(Modifier::BOLD),
        )));
        for reference in message.references() {
            body.push(Line::from(vec![
                Span::styled("• ", Style::default().fg(COLOR_TEXT_DIM)),
                Span::styled(
                    reference.title.clone(),
                    Style::default().fg(COLOR_AMBER).add_modifier(Modifier::UNDERLINED),
                ),
            ]));
        }
    }
    body
}

fn render_input_box(
    frame: &mut Frame,
    rect: Rect,
    app: &App,
    overlay_lines: Option<Vec<Line<'static>>>,
    input_lines: Vec<String>,
    input_start: usize,
    input_content_width: usize,
    status_line: Line<'static>,
) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(COLOR_BORDER))
        .title(Line::from(Span::styled("Question", Style::default().fg(COLOR_TEXT_DIM))))
        .style(Style::default().bg(COLOR_BG_ALT));
    frame.render_widget(block.clone(), rect);
    let inner = block.inner(rect);

    let mut input_spans: Vec<Line> = Vec::new();
    if app.input.is_empty() {
        input_spans.push(Line::from(vec![
            Span::styled("› ", Style::default().fg(COLOR_AMBER).add_modifier(Modifier::BOLD)),
            Span::styled(INPUT_PLACEHOLDER, Style::default().fg(COLOR_TEXT_DIM)),
        ]));
    } else {
        for (idx, line) in input_lines.iter().enumerate() {
            let prefix = if idx == 0 && input_start == 0 {
                Span::styled("› ", Style::default().fg(COLOR_AMBER).add_modifier(Modifier::BOLD))
            } else {
                Span::raw("  ")
            };
            input_spans.push(Line::from(vec![
                prefix,
                Span::styled(line.clone(), Style::default().fg(COLOR_TEXT)),
            ]));
        }
    }

    let overlay_height = overlay_lines.as_ref().map(|l| l.len() as u16).unwrap_or(0);
    // Status keeps its row; the overlay gives way before the input does.
    let available = inner.height.saturating_sub(1);
    let input_height = (input_spans.len() as u16).min(available.max(1));
    let overlay_height = overlay_height.min(available.saturating_sub(input_height));

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(overlay_height),
            Constraint::Length(input_height),
            Constraint::Length(1),
        ])
        .split(inner);

    if let Some(lines) = overlay_lines {
        let para = Paragraph::new(Text::from(lines)).style(Style::default().bg(COLOR_BG_ALT));
        frame.render_widget(para, chunks[0]);
    }
    let para = Paragraph::new(Text::from(input_spans)).style(Style::default().bg(COLOR_BG_ALT));
    frame.render_widget(para, chunks[1]);
    frame.render_widget(Paragraph::new(status_line), chunks[2]);

    if matches!(app.mode, UiMode::Normal) {
        let input_rect = chunks[1];
        let (cur_row, cur_col) = compute_cursor_position(&app.input, app.cursor, input_content_width);
        let visible_row = cur_row.saturating_sub(input_start);
        if (visible_row as u16) < input_rect.height {
            frame.set_cursor(
                input_rect.x + 2 + cur_col as u16,
                input_rect.y + visible_row as u16,
            );
        }
    }
}

pub fn render_overlay(frame: &mut Frame, rect: Rect, app: &App) {
    match app.mode {
        UiMode::HelpAbout => {
            let lines = vec![
                Line::from(Span::styled(APP_TITLE, Style::default().fg(COLOR_AMBER).add_modifier(Modifier::BOLD))),
                Line::from(format!("Version {}", env!("CARGO_PKG_VERSION"))),
                Line::from(""),
                Line::from("Answers come from a legal question-answering service."),
                Line::from(Span::styled(
                    "They are guidance, not legal advice.",
                    Style::default().fg(COLOR_TEXT_MUTED),
                )),
                Line::from(""),
                Line::from(vec![
                    Span::styled("Service ", Style::default().fg(COLOR_TEXT_DIM)),
                    Span::styled(app.endpoint.clone(), Style::default().fg(COLOR_TEXT)),
                ]),
            ];
            render_modal(frame, rect, "About", lines);
        }
        UiMode::References => {
            let mut lines = references_lines(app.session.conversation());
            let visible = rect.height.saturating_sub(8) as usize;
            let max_scroll = lines.len().saturating_sub(visible);
            let skip = app.references_scroll.min(max_scroll);
            lines.drain(..skip);
            lines.truncate(visible.max(1));
            render_modal(frame, rect, "Legal References", lines);
        }
        UiMode::Normal => {
            if let Some((msg, _)) = &app.toast {
                render_modal(frame, rect, "Info", vec![Line::from(msg.clone())]);
            }
        }
        UiMode::CommandPalette => {}
    }
}

/// Every reference received in this conversation, oldest first.
pub fn references_lines(conversation: &Conversation) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for (idx, reference) in conversation.references().enumerate() {
        lines.push(Line::from(vec![
            Span::styled(format!("{:>2}. ", idx + 1), Style::default().fg(COLOR_TEXT_DIM)),
            Span::styled(reference.title.clone(), Style::default().fg(COLOR_AMBER).add_modifier(Modifier::BOLD)),
        ]));
        lines.push(Line::from(vec![
            Span::raw("    "),
            Span::styled(
                reference.url.clone(),
                Style::default().fg(COLOR_CYAN).add_modifier(Modifier::UNDERLINED),
            ),
        ]));
    }
    lines
}

pub fn render_splash(frame: &mut Frame, rect: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(COLOR_BORDER))
        .title(title_line())
        .style(Style::default().bg(COLOR_BG_ALT));
    frame.render_widget(block.clone(), rect);
    let inner = block.inner(rect);
    let logo: &[&str] = if inner.width < 60 { &W_LOGO } else { &WAQEEL_LOGO };

    let mut lines: Vec<Line> = logo
        .iter()
        .map(|row| Line::from(Span::styled(*row, Style::default().fg(COLOR_AMBER).add_modifier(Modifier::BOLD))))
        .collect();
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        EMPTY_TITLE,
        Style::default().fg(COLOR_TEXT).add_modifier(Modifier::BOLD),
    )));
    for row in wrap_plain_lines(EMPTY_SUBTITLE, inner.width.saturating_sub(4).max(10) as usize) {
        lines.push(Line::from(Span::styled(row, Style::default().fg(COLOR_TEXT_MUTED))));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "Type / for commands",
        Style::default().fg(COLOR_TEXT_DIM),
    )));

    let width = lines
        .iter()
        .map(line_width)
        .max()
        .unwrap_or(1)
        .min(inner.width as usize) as u16;
    let height = lines.len().min(inner.height as usize) as u16;
    let area = centered_rect(width, height, inner);
    frame.render_widget(Paragraph::new(lines), area);
}

fn render_modal(frame: &mut Frame, rect: Rect, title: &str, lines: Vec<Line>) {
    let width = rect.width.saturating_sub(6);
    let height = (lines.len() as u16 + 4).min(rect.height.saturating_sub(4));
    let area = centered_rect(width, height, rect);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(COLOR_BORDER))
        .title(Span::styled(title.to_string(), Style::default().fg(COLOR_TEXT_DIM)))
        .style(Style::default().bg(COLOR_BG_ALT));
    let para = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false })
        .style(Style::default().fg(COLOR_TEXT).bg(COLOR_BG_ALT));
    frame.render_widget(Clear, area);
    frame.render_widget(para, area);
}

fn centered_rect(width: u16, height: u16, rect: Rect) -> Rect {
    let x = rect.x + (rect.width.saturating_sub(width)) / 2;
    let y = rect.y + (rect.height.saturating_sub(height)) / 2;
    Rect { x, y, width, height }
}

fn line_width(line: &Line) -> usize {
    line.spans.iter().map(|s| UnicodeWidthStr::width(s.content.as_ref())).sum()
}

fn build_inline_overlay(app: &App) -> Option<Vec<Line<'static>>> {
    if app.mode != UiMode::CommandPalette {
        return None;
    }
    let commands = filter_commands(&commands_list(), &app.command_query);
    let mut lines = vec![Line::from(vec![
        Span::styled("/", Style::default().fg(COLOR_PURPLE)),
        Span::styled(app.command_query.clone(), Style::default().fg(COLOR_TEXT)),
    ])];
    if commands.is_empty() {
        lines.push(Line::from(Span::styled("No commands found.", Style::default().fg(COLOR_TEXT_DIM))));
        return Some(lines);
    }
    let max_items = 10usize;
    let selected = app.command_selected.min(commands.len().saturating_sub(1));
    let offset = app.command_offset.min(commands.len().saturating_sub(1));
    let end = (offset + max_items).min(commands.len());
    for (idx, cmd) in commands.iter().enumerate().skip(offset).take(end - offset) {
        let is_selected = idx == selected;
        let style = if is_selected {
            Style::default().fg(Color::Black).bg(COLOR_AMBER).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(COLOR_TEXT)
        };
        lines.push(Line::from(vec![
            Span::styled(if is_selected { "› " } else { "  " }, style),
            Span::styled(format!("/{:<10}", cmd.name), style),
            Span::styled(cmd.description, style),
        ]));
    }
    if end < commands.len() {
        lines.push(Line::from(Span::styled("...", Style::default().fg(COLOR_TEXT_DIM))));
    }
    Some(lines)
}

pub fn format_status_line(app: &App) -> Line<'static> {
    let (label, color) = match app.session.state() {
        SessionState::AwaitingResponse => ("THINKING", COLOR_WARNING),
        SessionState::Idle => ("READY", COLOR_GREEN),
    };
    Line::from(vec![
        Span::styled(
            format!(" {label} "),
            Style::default().fg(Color::Black).bg(color).add_modifier(Modifier::BOLD),
        ),
        Span::styled(" | ", Style::default().fg(COLOR_TEXT_DIM)),
        Span::styled(app.endpoint.clone(), Style::default().fg(COLOR_TEXT_MUTED)),
        Span::styled(" | ", Style::default().fg(COLOR_TEXT_DIM)),
        Span::styled(
            format!("history {}", app.session.max_history()),
            Style::default().fg(COLOR_TEXT_MUTED),
        ),
        Span::styled(" | ", Style::default().fg(COLOR_TEXT_DIM)),
        Span::styled(
            format!("{} messages", app.session.conversation().len()),
            Style::default().fg(COLOR_TEXT_MUTED),
        ),
    ])
}

/// Splits by display width so the cursor math below agrees with what is drawn.
fn wrap_input(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_width = 0usize;
    for ch in text.chars() {
        let ch_width = UnicodeWidthChar::width(ch).unwrap_or(1);
        if current_width + ch_width > width && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
            current_width = 0;
        }
        current.push(ch);
        current_width += ch_width;
    }
    lines.push(current);
    lines
}

fn compute_cursor_position(text: &str, cursor: usize, width: usize) -> (usize, usize) {
    let mut row = 0usize;
    let mut col = 0usize;
    for (idx, ch) in text.char_indices() {
        if idx >= cursor {
            break;
        }
        let ch_width = UnicodeWidthChar::width(ch).unwrap_or(1);
        if col + ch_width > width && col > 0 {
            row += 1;
            col = 0;
        }
        col += ch_width;
    }
    (row, col)
}

fn wrap_plain_lines(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for raw in text.split('\n') {
        if raw.is_empty() {
            lines.push(String::new());
            continue;
        }
        for line in wrap(raw, width) {
            lines.push(line.to_string());
        }
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

fn indent_lines(lines: Vec<Line<'static>>, indent: usize) -> Vec<Line<'static>> {
    let prefix = Span::raw(" ".repeat(indent));
    lines
        .into_iter()
        .map(|line| {
            let mut spans = Vec::with_capacity(line.spans.len() + 1);
            spans.push(prefix.clone());
            spans.extend(line.spans);
            Line::from(spans)
        })
        .collect()
}

/// Draws a rendered answer from its block tree. Text is unescaped for display;
/// nothing here looks at the HTML fragment.
pub fn render_blocks(blocks: &[ResponseBlock], width: usize) -> Vec<Line<'static>> {
    let mut renderer = BlockRenderer::new(width);
    for (idx, block) in blocks.iter().enumerate() {
        if idx > 0 && matches!(block, ResponseBlock::Heading { .. }) {
            renderer.blank_line();
        }
        renderer.block(block);
    }
    renderer.finish()
}

struct BlockRenderer {
    width: usize,
    lines: Vec<Line<'static>>,
    current_spans: Vec<Span<'static>>,
    current_width: usize,
    pending_space: bool,
    pending_item_prefix: Option<(String, Style)>,
    style_stack: Vec<Style>,
}

impl BlockRenderer {
    fn new(width: usize) -> Self {
        Self {
            width: width.max(10),
            lines: Vec::new(),
            current_spans: Vec::new(),
            current_width: 0,
            pending_space: false,
            pending_item_prefix: None,
            style_stack: vec![Style::default().fg(COLOR_TEXT)],
        }
    }

    fn finish(mut self) -> Vec<Line<'static>> {
        self.new_line();
        if self.lines.is_empty() {
            self.lines.push(Line::from(""));
        }
        self.lines
    }

    fn block(&mut self, block: &ResponseBlock) {
        match block {
            ResponseBlock::Heading { content, .. } => {
                self.with_style(Style::default().fg(COLOR_PURPLE).add_modifier(Modifier::BOLD), |r| {
                    r.inlines(content)
                });
                self.new_line();
                if !content.is_empty() {
                    self.blank_line();
                }
            }
            ResponseBlock::List(items) => {
                for item in items {
                    self.pending_item_prefix = Some(("• ".to_string(), Style::default().fg(COLOR_TEXT)));
                    self.inlines(item);
                    self.new_line();
                }
            }
            ResponseBlock::Paragraph(content) => {
                self.inlines(content);
                self.new_line();
            }
        }
    }

    fn inlines(&mut self, nodes: &[Inline]) {
        for node in nodes {
            match node {
                Inline::Text(text) => {
                    let style = self.current_style();
                    self.push_text(&text.to_display(), style);
                }
                Inline::Code(children) => {
                    self.with_style(Style::default().fg(COLOR_GREEN), |r| r.inlines(children));
                }
                Inline::Strong(children) => self.with_style(
                    Style::default().fg(COLOR_ORANGE).add_modifier(Modifier::BOLD),
                    |r| r.inlines(children),
                ),
                Inline::Emphasis(children) => self.with_style(
                    Style::default().fg(COLOR_YELLOW).add_modifier(Modifier::ITALIC),
                    |r| r.inlines(children),
                ),
                Inline::Link { label, .. } => self.with_style(
                    Style::default().fg(COLOR_CYAN).add_modifier(Modifier::UNDERLINED),
                    |r| r.inlines(label),
                ),
            }
        }
    }

    fn with_style(&mut self, style: Style, draw: impl FnOnce(&mut Self)) {
        self.style_stack.push(self.current_style().patch(style));
        draw(self);
        self.style_stack.pop();
    }

    fn current_style(&self) -> Style {
        self.style_stack.last().copied().unwrap_or_else(|| Style::default().fg(COLOR_TEXT))
    }

    fn new_line(&mut self) {
        self.pending_space = false;
        self.pending_item_prefix = None;
        if !self.current_spans.is_empty() {
            self.lines.push(Line::from(std::mem::take(&mut self.current_spans)));
        }
        self.current_width = 0;
    }

    fn blank_line(&mut self) {
        self.new_line();
        if self.lines.last().is_some_and(|l| line_width(l) > 0) {
            self.lines.push(Line::from(""));
        }
    }

    fn push_span(&mut self, text: &str, style: Style) {
        if text.is_empty() {
            return;
        }
        if self.current_spans.is_empty() {
            if let Some((prefix, prefix_style)) = self.pending_item_prefix.take() {
                self.current_width += UnicodeWidthStr::width(prefix.as_str());
                self.current_spans.push(Span::styled(prefix, prefix_style));
            }
        }
        self.current_spans.push(Span::styled(text.to_string(), style));
        self.current_width += UnicodeWidthStr::width(text);
    }

    fn wrap_line(&mut self) {
        if !self.current_spans.is_empty() {
            self.lines.push(Line::from(std::mem::take(&mut self.current_spans)));
        }
        self.current_width = 0;
        self.pending_space = false;
    }

    fn push_word(&mut self, word: &str, style: Style) {
        let word_width = UnicodeWidthStr::width(word);
        if self.current_width > 0 && self.pending_space && self.current_width + 1 + word_width > self.width {
            self.wrap_line();
        } else if self.current_width > 0 && self.pending_space {
            self.push_span(" ", Style::default().fg(COLOR_TEXT));
        }
        self.pending_space = false;

        if word_width <= self.width {
            self.push_span(word, style);
            return;
        }

        let mut chunk = String::new();
        let mut chunk_width = 0usize;
        for ch in word.chars() {
            let ch_width = UnicodeWidthChar::width(ch).unwrap_or(1);
            if chunk_width + ch_width > self.width && !chunk.is_empty() {
                self.push_span(&chunk, style);
                self.wrap_line();
                chunk.clear();
                chunk_width = 0;
            }
            chunk.push(ch);
            chunk_width += ch_width;
        }
        self.push_span(&chunk, style);
    }

    fn push_text(&mut self, text: &str, style: Style) {
        let mut token = String::new();
        for ch in text.chars() {
            if ch.is_whitespace() {
                if !token.is_empty() {
                    self.push_word(&token, style);
                    token.clear();
                }
                self.pending_space = true;
            } else {
                token.push(ch);
            }
        }
        if !token.is_empty() {
            self.push_word(&token, style);
        }
    }
}
