use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Wrap},
};
use bugscribe_core::{Mode, Sender};
use crate::app::App;

const INPUT_PLACEHOLDER: &str = "Debug anything";
const MAX_INPUT_ROWS: usize = 6;

fn user_label() -> Span<'static> {
    Span::styled("You:", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
}

fn assistant_label() -> Span<'static> {
    Span::styled("BugScribe:", Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
}

fn code_style() -> Style {
    Style::default().fg(Color::Green)
}

/// Opening or closing code fence; returns the info string (language tag)
fn fence_info(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    trimmed
        .strip_prefix("```")
        .or_else(|| trimmed.strip_prefix("~~~"))
        .map(str::trim)
}

/// Style a whole assistant reply. Fenced code blocks are kept verbatim in the
/// code style and their fence lines are dimmed; everything else goes through
/// [`parse_markdown_line`]. An unclosed fence runs to the end of the text.
fn markdown_lines(text: &str) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    let mut in_fence = false;

    // A reveal can stop between '\r' and '\n'
    for line in text.lines().map(|l| l.strip_suffix('\r').unwrap_or(l)) {
        if let Some(info) = fence_info(line) {
            let marker = if in_fence || info.is_empty() {
                "───".to_string()
            } else {
                format!("─── {info}")
            };
            lines.push(Line::from(Span::styled(marker, Style::default().fg(Color::DarkGray))));
            in_fence = !in_fence;
        } else if in_fence {
            lines.push(Line::from(Span::styled(line.to_string(), code_style())));
        } else {
            lines.push(parse_markdown_line(line));
        }
    }

    lines
}

/// Style one line of assistant text: `#` headings, `-`/`*` bullets, `**bold**`
/// and `` `code` `` spans. Unclosed markers are kept literally.
fn parse_markdown_line(text: &str) -> Line<'static> {
    let trimmed = text.trim_start();

    if let Some(heading) = trimmed.strip_prefix('#') {
        let heading = heading.trim_start_matches('#').trim();
        return Line::from(Span::styled(
            heading.to_string(),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ));
    }

    let mut spans: Vec<Span<'static>> = Vec::new();
    let body = match trimmed.strip_prefix("- ").or_else(|| trimmed.strip_prefix("* ")) {
        Some(rest) => {
            let indent = text.len() - trimmed.len();
            spans.push(Span::raw(format!("{}• ", " ".repeat(indent))));
            rest
        }
        None => text,
    };

    spans.extend(parse_inline(body));

    if spans.is_empty() {
        Line::default()
    } else {
        Line::from(spans)
    }
}

fn parse_inline(text: &str) -> Vec<Span<'static>> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut chars = text.chars().peekable();
    let mut current_text = String::new();

    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();

                let mut bold_text = String::new();
                let mut found_close = false;
                while let Some(c) = chars.next() {
                    if c == '*' && chars.peek() == Some(&'*') {
                        chars.next();
                        found_close = true;
                        break;
                    }
                    bold_text.push(c);
                }

                if found_close && !bold_text.is_empty() {
                    if !current_text.is_empty() {
                        spans.push(Span::raw(std::mem::take(&mut current_text)));
                    }
                    spans.push(Span::styled(
                        bold_text,
                        Style::default().add_modifier(Modifier::BOLD),
                    ));
                } else {
                    current_text.push_str("**");
                    current_text.push_str(&bold_text);
                    if found_close {
                        current_text.push_str("**");
                    }
                }
            }
            '`' => {
                let mut code = String::new();
                let mut found_close = false;
                for c in chars.by_ref() {
                    if c == '`' {
                        found_close = true;
                        break;
                    }
                    code.push(c);
                }

                if found_close && !code.is_empty() {
                    if !current_text.is_empty() {
                        spans.push(Span::raw(std::mem::take(&mut current_text)));
                    }
                    spans.push(Span::styled(code, code_style()));
                } else {
                    current_text.push('`');
                    current_text.push_str(&code);
                    if found_close {
                        current_text.push('`');
                    }
                }
            }
            _ => current_text.push(c),
        }
    }

    if !current_text.is_empty() {
        spans.push(Span::raw(current_text));
    }

    spans
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    let input_rows = app.input.split('\n').count().clamp(1, MAX_INPUT_ROWS) as u16;

    // Main layout: header, chat, input, footer
    let [header_area, chat_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(input_rows + 2),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_chat(app, frame, chat_area);
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(" BugScribe ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(format!("→ {} ", app.api_url), Style::default().fg(Color::Gray)),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::Black));
    frame.render_widget(header, area);
}

/// Every visible line of the conversation, including the pending reply
fn chat_lines(app: &App) -> Vec<Line<'static>> {
    let state = app.coordinator.state();
    let mut lines: Vec<Line<'static>> = Vec::new();

    for msg in state.messages() {
        match msg.sender {
            Sender::User => {
                lines.push(Line::from(user_label()));
                for line in msg.text.lines() {
                    lines.push(Line::from(line.to_string()));
                }
            }
            Sender::Assistant => {
                lines.push(Line::from(assistant_label()));
                lines.extend(markdown_lines(&msg.text));
            }
        }
        lines.push(Line::default());
    }

    match state.mode() {
        Mode::Idle => {}
        Mode::AwaitingResponse => {
            lines.push(Line::from(assistant_label()));
            let caption = app.coordinator.caption().unwrap_or("Thinking...");
            lines.push(Line::from(vec![
                Span::styled(format!("{} ", app.spinner()), Style::default().fg(Color::Yellow)),
                Span::styled(
                    caption.to_string(),
                    Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
                ),
            ]));
        }
        Mode::Revealing => {
            lines.push(Line::from(assistant_label()));
            let buffer = state.reveal_buffer();
            let mut partial = markdown_lines(buffer);
            // A just-revealed newline puts the caret at the start of a fresh row
            if buffer.is_empty() || buffer.ends_with('\n') {
                partial.push(Line::default());
            }
            if let Some(last) = partial.last_mut() {
                last.spans.push(Span::styled("▌", Style::default().fg(Color::Yellow)));
            }
            lines.extend(partial);
        }
    }

    lines
}

/// Rows a set of lines takes once wrapped to `width`
fn wrapped_height(lines: &[Line], width: u16) -> u16 {
    let width = usize::from(width.max(1));
    let rows: usize = lines
        .iter()
        .map(|line| line.width().max(1).div_ceil(width))
        .sum();
    u16::try_from(rows).unwrap_or(u16::MAX)
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    // Store area for mouse hit-testing
    app.chat_area = Some(area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Conversation ");

    let lines = chat_lines(app);
    if lines.is_empty() {
        let placeholder = Paragraph::new(Text::from(Span::styled(
            "Paste an error log or stack trace to get started.",
            Style::default().fg(Color::DarkGray),
        )))
        .block(block);
        frame.render_widget(placeholder, area);
        app.update_chat_metrics(area.height.saturating_sub(2), 0);
        return;
    }

    // Inner size minus borders
    let inner_width = area.width.saturating_sub(2);
    let inner_height = area.height.saturating_sub(2);
    app.update_chat_metrics(inner_height, wrapped_height(&lines, inner_width));

    let chat = Paragraph::new(Text::from(lines))
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let locked = app.input_locked();
    let border_color = if locked { Color::DarkGray } else { Color::Yellow };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Ask ");

    if app.input.is_empty() {
        let placeholder = if locked {
            app.coordinator.caption().unwrap_or(INPUT_PLACEHOLDER)
        } else {
            INPUT_PLACEHOLDER
        };
        let paragraph = Paragraph::new(Span::styled(
            placeholder.to_string(),
            Style::default().fg(Color::DarkGray),
        ))
        .block(block);
        frame.render_widget(paragraph, area);
        if !locked {
            frame.set_cursor_position((area.x + 1, area.y + 1));
        }
        return;
    }

    let inner_width = area.width.saturating_sub(2) as usize;
    let inner_height = area.height.saturating_sub(2) as usize;

    // Locate the cursor as (row, column) within the multi-line input
    let before: String = app.input.chars().take(app.input_cursor).collect();
    let cursor_row = before.matches('\n').count();
    let cursor_col = before.rsplit('\n').next().map(|s| s.chars().count()).unwrap_or(0);

    // Scroll offsets that keep the cursor visible
    let row_offset = cursor_row.saturating_sub(inner_height.saturating_sub(1));
    let col_offset = if inner_width == 0 {
        0
    } else if cursor_col >= inner_width {
        cursor_col - inner_width + 1
    } else {
        0
    };

    let visible: Vec<Line> = app
        .input
        .split('\n')
        .skip(row_offset)
        .take(inner_height.max(1))
        .map(|line| Line::from(line.chars().skip(col_offset).take(inner_width).collect::<String>()))
        .collect();

    let style = if locked {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default().fg(Color::Cyan)
    };
    let input = Paragraph::new(visible).style(style).block(block);
    frame.render_widget(input, area);

    if !locked {
        let x = area.x + 1 + (cursor_col - col_offset) as u16;
        let y = area.y + 1 + (cursor_row - row_offset) as u16;
        frame.set_cursor_position((x, y));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let (mode_text, mode_style) = match app.mode() {
        Mode::Idle => (" READY ", Style::default().bg(Color::Blue).fg(Color::White)),
        Mode::AwaitingResponse => (" WAITING ", Style::default().bg(Color::Yellow).fg(Color::Black)),
        Mode::Revealing => (" TYPING ", Style::default().bg(Color::Green).fg(Color::Black)),
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let mut spans = vec![Span::styled(mode_text, mode_style), Span::raw(" ")];
    if !app.input_locked() {
        spans.extend([
            Span::styled(" Enter ", key_style),
            Span::styled(" send ", label_style),
            Span::styled(" Shift+Enter ", key_style),
            Span::styled(" newline ", label_style),
        ]);
    }
    spans.extend([
        Span::styled(" PgUp/PgDn ", key_style),
        Span::styled(" scroll ", label_style),
        Span::styled(" Esc ", key_style),
        Span::styled(" quit ", label_style),
    ]);

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}
