//! UI rendering with ratatui.
//!
//! Two columns: the thread list on the left, the chat with its input line on
//! the right. Dialogs are drawn as centered overlays.

use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style, Stylize};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{
    Block, Borders, Clear, List, ListItem, ListState, Paragraph, Scrollbar, ScrollbarOrientation,
    ScrollbarState, Wrap,
};
use ratatui::Frame;

use epsimo_core::{Message, Role};

use crate::app::{App, Focus, InputMode, STREAM_ERROR_TEXT};
use crate::markdown::render_markdown;
use crate::stream::StreamStatus;

/// Horizontal padding for chat content.
const CHAT_PADDING: u16 = 2;

const KEY: Style = Style::new().fg(Color::Yellow);

/// Render the UI.
pub fn render(frame: &mut Frame, app: &App) {
    let area = frame.area();

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Header bar
            Constraint::Min(5),    // Threads + chat
            Constraint::Length(1), // Status bar
        ])
        .split(area);

    render_header_bar(frame, app, rows[0]);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(28), Constraint::Percentage(72)])
        .split(rows[1]);

    render_threads_panel(frame, app, columns[0]);
    render_chat_column(frame, app, columns[1]);
    render_status_bar(frame, app, rows[2]);

    match &app.input_mode {
        InputMode::Normal => {}
        InputMode::NewThread => render_input_dialog(
            frame,
            app,
            area,
            " New Thread ",
            "Thread name:",
            "Enter to create, Esc to cancel",
        ),
        InputMode::EditingMessage(_) => render_input_dialog(
            frame,
            app,
            area,
            " Edit Message ",
            "New text:",
            "Enter to keep as draft, Esc to cancel",
        ),
    }
}

/// Truncate a string in the middle with an ellipsis if it exceeds `max_len` characters.
fn truncate_middle(s: &str, max_len: usize) -> String {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= max_len {
        return s.to_string();
    }
    if max_len < 5 {
        return chars[..max_len].iter().collect();
    }
    let keep = (max_len - 1) / 2;
    let start: String = chars[..keep].iter().collect();
    let end: String = chars[chars.len() - keep..].iter().collect();
    format!("{start}…{end}")
}

/// Render the header bar with project, credits and backend.
fn render_header_bar(frame: &mut Frame, app: &App, area: Rect) {
    let mut left = vec![Span::styled(
        "EPSIMO",
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
    )];
    if let Some(project) = app.project_name() {
        left.push(Span::raw(format!("  {project}")));
    }
    if let Some(credits) = app.credits {
        let style = if credits.remaining() == 0 {
            Style::default().fg(Color::Red)
        } else {
            Style::default().fg(Color::Green)
        };
        left.push(Span::styled(
            format!("  {}/{} threads left", credits.remaining(), credits.thread_max),
            style,
        ));
    }

    let (state, state_style) = if app.refresh_error.is_some() {
        ("offline", Style::default().fg(Color::Red))
    } else {
        ("online", Style::default().fg(Color::Green))
    };
    let url = truncate_middle(app.backend_url(), (area.width as usize / 2).saturating_sub(12));
    let right_width = url.chars().count() + state.len() + 3;
    let left_width: usize = left.iter().map(Span::width).sum();
    let gap = (area.width as usize).saturating_sub(left_width + right_width);

    left.push(Span::raw(" ".repeat(gap)));
    left.push(Span::raw(url));
    left.push(Span::raw(" ["));
    left.push(Span::styled(state, state_style));
    left.push(Span::raw("]"));

    let header = Paragraph::new(Line::from(left)).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn border_style(focused: bool) -> Style {
    if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::Gray)
    }
}

/// Render the thread list.
fn render_threads_panel(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .title(" Threads ")
        .borders(Borders::ALL)
        .border_style(border_style(app.focus == Focus::Threads));

    let active = app.thread_id();
    let items: Vec<ListItem> = app
        .threads
        .iter()
        .map(|thread| {
            let style = if Some(&thread.thread_id) == active {
                Style::default().fg(Color::Green)
            } else {
                Style::default()
            };
            ListItem::new(Line::from(Span::styled(thread.name.clone(), style)))
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    let mut state = ListState::default();
    state.select(app.selected_thread);
    frame.render_stateful_widget(list, area, &mut state);
}

/// Chat lines for one message.
fn message_lines(
    msg: &Message,
    edited: bool,
    selected: bool,
    width: usize,
    lines: &mut Vec<Line<'static>>,
) {
    let color = match &msg.role {
        Role::Human => Color::Cyan,
        role if role.is_assistant() => Color::Green,
        _ => Color::Magenta,
    };
    let mut label = vec![Span::styled(
        format!("[{}]", msg.role.as_str()),
        Style::default().fg(color).add_modifier(Modifier::BOLD),
    )];
    if edited {
        label.push(Span::styled(" (edited)", Style::default().fg(Color::Yellow)));
    }
    if selected {
        label.insert(0, Span::styled("▶ ", Style::default().fg(Color::Yellow)));
    }
    lines.push(Line::from(label));

    let text = msg.text();
    if msg.role == Role::Human {
        lines.extend(
            text.lines()
                .map(|l| Line::from(Span::styled(l.to_string(), Style::default().fg(Color::White)))),
        );
    } else {
        lines.extend(render_markdown(&text, width));
    }
    lines.push(Line::from(""));
}

/// Render the right column containing chat and input as one unit.
fn render_chat_column(frame: &mut Frame, app: &App, area: Rect) {
    let is_focused = app.focus == Focus::Chat;

    let title = match (&app.resolved.thread, &app.resolved.assistant) {
        (Some(thread), Some(assistant)) => format!(" {} · {} ", thread.name, assistant.name),
        (Some(thread), None) => format!(" {} ", thread.name),
        (None, Some(assistant)) => format!(" New chat · {} ", assistant.name),
        (None, None) => " Chat ".to_string(),
    };

    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(border_style(is_focused));
    let inner_area = block.inner(area);
    frame.render_widget(block, area);

    let inner_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(1),    // Chat messages
            Constraint::Length(1), // Separator line
            Constraint::Length(1), // Input line
        ])
        .split(inner_area);

    let chat_area_full = inner_layout[0];
    let chat_area = Rect::new(
        chat_area_full.x + CHAT_PADDING,
        chat_area_full.y,
        chat_area_full.width.saturating_sub(CHAT_PADDING * 2 + 1), // +1 for scrollbar
        chat_area_full.height,
    );
    let content_width = chat_area.width as usize;

    let messages = app.rendered_messages();
    let status = app.stream_status();

    if messages.is_empty() && !app.store.is_loading() && status == StreamStatus::Idle {
        let help = if app.thread_id().is_some() || app.resolved.assistant.is_some() {
            "Type a message and press Enter to send"
        } else {
            "Select a thread and press Enter, or type to start a new chat"
        };
        let text = Paragraph::new(help)
            .style(Style::default().fg(Color::DarkGray))
            .wrap(Wrap { trim: true });
        frame.render_widget(text, chat_area);
    } else {
        let mut lines: Vec<Line> = Vec::new();
        for (i, msg) in messages.iter().enumerate() {
            let edited = app.editor.draft_for(&msg.id).is_some();
            let selected = app.selected_message == Some(i);
            message_lines(msg, edited, selected, content_width, &mut lines);
        }

        if status == StreamStatus::Inflight || app.store.is_loading() {
            lines.push(Line::from(vec![
                Span::styled(app.spinner_char(), Style::default().fg(Color::Yellow)),
                Span::styled(" Thinking...", Style::default().fg(Color::DarkGray)),
            ]));
        }
        if status == StreamStatus::Error {
            lines.push(Line::from(Span::styled(
                STREAM_ERROR_TEXT,
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            )));
        }
        if app.can_continue() {
            lines.push(Line::from(vec![
                Span::styled("▼ ", Style::default().fg(Color::Blue)),
                Span::styled("Continue conversation ", Style::default().fg(Color::Blue)),
                Span::styled("[c]", KEY),
            ]));
        }
        if app.last_run_id.is_some() && status != StreamStatus::Inflight {
            lines.push(Line::from(vec![
                Span::styled("Rate this answer ", Style::default().fg(Color::DarkGray)),
                Span::styled("[+]", KEY),
                Span::styled(" / ", Style::default().fg(Color::DarkGray)),
                Span::styled("[-]", KEY),
            ]));
        }

        let text = Text::from(lines);
        let visible_lines = chat_area.height as usize;
        let total_wrapped_lines = calculate_wrapped_line_count(&text, content_width);

        // chat_scroll counts lines up from the bottom.
        let max_scroll = total_wrapped_lines.saturating_sub(visible_lines);
        let effective_scroll = app.chat_scroll.min(max_scroll);
        let scroll_offset = max_scroll.saturating_sub(effective_scroll);

        let paragraph = Paragraph::new(text)
            .wrap(Wrap { trim: false })
            .scroll((u16::try_from(scroll_offset).unwrap_or(u16::MAX), 0));
        frame.render_widget(paragraph, chat_area);

        if total_wrapped_lines > visible_lines {
            let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
                .begin_symbol(Some("▲"))
                .end_symbol(Some("▼"));
            let mut scrollbar_state = ScrollbarState::new(total_wrapped_lines)
                .position(scroll_offset)
                .viewport_content_length(visible_lines);
            frame.render_stateful_widget(scrollbar, chat_area_full, &mut scrollbar_state);
        }
    }

    render_input_line(frame, app, inner_layout[1], inner_layout[2], is_focused);
}

/// Render the input line at the bottom of the chat column.
fn render_input_line(frame: &mut Frame, app: &App, separator_area: Rect, input_area: Rect, is_focused: bool) {
    let separator = Paragraph::new("─".repeat(separator_area.width as usize))
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(separator, separator_area);

    let in_dialog = app.input_mode != InputMode::Normal;
    let prompt = if !is_focused {
        "│ "
    } else if app.command_mode {
        ": "
    } else {
        "> "
    };
    let prompt_color = if is_focused && !app.command_mode {
        Color::Cyan
    } else {
        Color::DarkGray
    };
    let input_text = if in_dialog { "" } else { app.input.as_str() };

    let line = Line::from(vec![
        Span::styled(prompt, Style::default().fg(prompt_color)),
        Span::styled(input_text, Style::default().fg(Color::White)),
    ]);
    frame.render_widget(Paragraph::new(line), input_area);

    if is_focused && !in_dialog && !app.command_mode && !app.stream.is_inflight() {
        let column = u16::try_from(app.cursor_position).unwrap_or(u16::MAX);
        frame.set_cursor_position((input_area.x + 2 + column, input_area.y));
    }
}

/// Render the status bar.
fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let mode = if app.command_mode {
        Span::styled(" COMMAND ", Style::default().fg(Color::Black).bg(Color::Blue))
    } else {
        Span::styled(" INPUT ", Style::default().fg(Color::Black).bg(Color::Green))
    };

    let mut spans = vec![mode];
    if !app.editor.is_empty() {
        spans.push(Span::styled(
            format!(" {} draft(s) ", app.editor.len()),
            Style::default().fg(Color::Black).bg(Color::Yellow),
        ));
    }

    if let Some(ref error) = app.error_message {
        spans.push(Span::styled(" ERROR: ", Style::default().fg(Color::Red).bold()));
        spans.push(Span::styled(error.clone(), Style::default().fg(Color::Red)));
    } else if let Some(ref refresh_error) = app.refresh_error {
        spans.push(Span::styled(" ⚠ ", Style::default().fg(Color::Yellow).bold()));
        spans.push(Span::styled(refresh_error.clone(), Style::default().fg(Color::Yellow)));
    } else if let Some(ref status) = app.status_message {
        spans.push(Span::styled(format!(" {status}"), Style::default().fg(Color::Green)));
    } else if app.command_mode {
        for (key, action) in [
            ("q", "quit"),
            ("n", "new"),
            ("o", "open"),
            ("[/]", "select msg"),
            ("e", "edit"),
            ("u/U", "undo edit/all"),
            ("s", "save edits"),
            ("c", "continue"),
            ("Enter", "type"),
        ] {
            spans.push(Span::raw(" "));
            spans.push(Span::styled(key, KEY));
            spans.push(Span::raw(format!(":{action}")));
        }
    } else {
        for (key, action) in [
            ("Enter", "send/open"),
            ("Esc", "commands"),
            ("↑/↓", "threads"),
            ("Tab", "focus"),
            ("PgUp/PgDn", "scroll"),
        ] {
            spans.push(Span::raw(" "));
            spans.push(Span::styled(key, KEY));
            spans.push(Span::raw(format!(":{action}")));
        }
    }

    let status_bar = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(status_bar, area);
}

/// Render a single-field input dialog.
fn render_input_dialog(frame: &mut Frame, app: &App, area: Rect, title: &str, label: &str, help: &str) {
    let dialog_width = 60.min(area.width.saturating_sub(4));
    let dialog_height = 9.min(area.height.saturating_sub(4));
    let dialog_area = Rect::new(
        area.x + area.width.saturating_sub(dialog_width) / 2,
        area.y + area.height.saturating_sub(dialog_height) / 2,
        dialog_width,
        dialog_height,
    );

    frame.render_widget(Clear, dialog_area);

    let block = Block::default()
        .title(title.to_string())
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));
    let inner = block.inner(dialog_area);
    frame.render_widget(block, dialog_area);

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Label
            Constraint::Length(1), // Spacer
            Constraint::Length(3), // Input box
            Constraint::Length(1), // Help text
        ])
        .split(inner);

    frame.render_widget(
        Paragraph::new(label.to_string()).style(Style::default().fg(Color::White)),
        layout[0],
    );

    // Show the tail of long input so the cursor stays visible.
    let room = layout[2].width.saturating_sub(2) as usize;
    let skip = app.cursor_position.saturating_sub(room.saturating_sub(1));
    let visible: String = app.input.chars().skip(skip).collect();
    let input = Paragraph::new(visible)
        .style(Style::default().fg(Color::Yellow))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        );
    frame.render_widget(input, layout[2]);

    frame.render_widget(
        Paragraph::new(help.to_string()).style(Style::default().fg(Color::DarkGray)),
        layout[3],
    );

    let column = u16::try_from(app.cursor_position - skip).unwrap_or(0);
    frame.set_cursor_position((layout[2].x + column + 1, layout[2].y + 1));
}

/// Calculate the number of visual lines after text wrapping.
fn calculate_wrapped_line_count(text: &Text, available_width: usize) -> usize {
    if available_width == 0 {
        return text.lines.len();
    }
    text.lines
        .iter()
        .map(|line| line.width().div_ceil(available_width).max(1))
        .sum()
}
