//! Markdown rendering for assistant replies.
//!
//! Produces styled ratatui lines; fenced code blocks are highlighted with
//! syntect and framed, long code lines are clipped to the view width.

use std::sync::OnceLock;

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use syntect::easy::HighlightLines;
use syntect::highlighting::{FontStyle, Theme, ThemeSet};
use syntect::parsing::SyntaxSet;
use syntect::util::LinesWithEndings;

const CODE_THEME: &str = "base16-ocean.dark";
const FRAME: Style = Style::new().fg(Color::DarkGray);

/// Render `text` as markdown, fitting code blocks into `width` columns.
pub fn render_markdown(text: &str, width: usize) -> Vec<Line<'static>> {
    let mut writer = LineWriter::new(width);
    let parser = Parser::new_ext(text, Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TABLES);
    for event in parser {
        writer.event(event);
    }
    writer.finish()
}

// =============================================================================
// Syntax highlighting
// =============================================================================

struct Highlighter {
    syntaxes: SyntaxSet,
    theme: Theme,
}

/// Syntax definitions are loaded once per process.
fn highlighter() -> &'static Highlighter {
    static HIGHLIGHTER: OnceLock<Highlighter> = OnceLock::new();
    HIGHLIGHTER.get_or_init(|| {
        let mut themes = ThemeSet::load_defaults();
        Highlighter {
            syntaxes: SyntaxSet::load_defaults_newlines(),
            theme: themes.themes.remove(CODE_THEME).unwrap_or_default(),
        }
    })
}

fn to_ratatui(style: syntect::highlighting::Style) -> Style {
    let fg = style.foreground;
    let mut out = Style::default().fg(Color::Rgb(fg.r, fg.g, fg.b));
    for (font, modifier) in [
        (FontStyle::BOLD, Modifier::BOLD),
        (FontStyle::ITALIC, Modifier::ITALIC),
        (FontStyle::UNDERLINE, Modifier::UNDERLINED),
    ] {
        if style.font_style.contains(font) {
            out = out.add_modifier(modifier);
        }
    }
    out
}

/// Highlight `code`, one span list per source line.
fn highlight(code: &str, lang: &str) -> Vec<Vec<Span<'static>>> {
    let hl = highlighter();
    let syntax = hl
        .syntaxes
        .find_syntax_by_token(lang)
        .unwrap_or_else(|| hl.syntaxes.find_syntax_plain_text());
    let mut lines = HighlightLines::new(syntax, &hl.theme);

    LinesWithEndings::from(code)
        .map(|line| match lines.highlight_line(line, &hl.syntaxes) {
            Ok(ranges) => ranges
                .into_iter()
                .map(|(style, piece)| (to_ratatui(style), piece.trim_end_matches(['\r', '\n'])))
                .filter(|(_, piece)| !piece.is_empty())
                .map(|(style, piece)| Span::styled(piece.to_string(), style))
                .collect(),
            Err(_) => vec![Span::raw(line.trim_end_matches(['\r', '\n']).to_string())],
        })
        .collect()
}

/// Keep at most `max` characters of `spans`, marking the cut with an ellipsis.
fn clip(spans: Vec<Span<'static>>, max: usize) -> Vec<Span<'static>> {
    let total: usize = spans.iter().map(|s| s.content.chars().count()).sum();
    if total <= max {
        return spans;
    }
    let mut budget = max.saturating_sub(1);
    let mut out = Vec::new();
    for span in spans {
        if budget == 0 {
            break;
        }
        let len = span.content.chars().count();
        if len <= budget {
            budget -= len;
            out.push(span);
        } else {
            out.push(Span::styled(
                span.content.chars().take(budget).collect::<String>(),
                span.style,
            ));
            budget = 0;
        }
    }
    out.push(Span::styled("…", FRAME));
    out
}

// =============================================================================
// Line assembly
// =============================================================================

struct LineWriter {
    width: usize,
    lines: Vec<Line<'static>>,
    spans: Vec<Span<'static>>,
    styles: Vec<Style>,
    /// Language and accumulated text of the open code block.
    code: Option<(String, String)>,
    /// One entry per open list: the next number for ordered lists.
    lists: Vec<Option<u64>>,
    quote_depth: usize,
    link: Option<String>,
}

impl LineWriter {
    fn new(width: usize) -> Self {
        Self {
            width,
            lines: Vec::new(),
            spans: Vec::new(),
            styles: vec![Style::default()],
            code: None,
            lists: Vec::new(),
            quote_depth: 0,
            link: None,
        }
    }

    fn style(&self) -> Style {
        self.styles.last().copied().unwrap_or_default()
    }

    fn push_style(&mut self, f: impl FnOnce(Style) -> Style) {
        let next = f(self.style());
        self.styles.push(next);
    }

    fn pop_style(&mut self) {
        if self.styles.len() > 1 {
            self.styles.pop();
        }
    }

    fn break_line(&mut self) {
        if self.spans.is_empty() {
            return;
        }
        let mut spans = Vec::with_capacity(self.spans.len() + 1);
        if self.quote_depth > 0 {
            spans.push(Span::styled("│ ".repeat(self.quote_depth), Style::new().fg(Color::Blue)));
        }
        spans.append(&mut self.spans);
        self.lines.push(Line::from(spans));
    }

    fn blank(&mut self) {
        self.break_line();
        if self.lines.last().is_some_and(|l| !l.spans.is_empty()) {
            self.lines.push(Line::default());
        }
    }

    fn text(&mut self, text: &str) {
        if let Some((_, body)) = self.code.as_mut() {
            body.push_str(text);
            return;
        }
        let style = self.style();
        for (i, piece) in text.split('\n').enumerate() {
            if i > 0 {
                self.break_line();
            }
            if !piece.is_empty() {
                self.spans.push(Span::styled(piece.to_string(), style));
            }
        }
    }

    fn event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) => self.text(&text),
            Event::Code(code) => self.spans.push(Span::styled(
                code.to_string(),
                Style::new().fg(Color::Yellow).bg(Color::Rgb(40, 40, 40)),
            )),
            Event::SoftBreak | Event::HardBreak => self.break_line(),
            Event::Rule => {
                self.break_line();
                self.lines
                    .push(Line::from(Span::styled("─".repeat(self.width.min(60)), FRAME)));
            }
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Heading { level, .. } => {
                self.blank();
                let marker = match level {
                    HeadingLevel::H1 => "# ",
                    HeadingLevel::H2 => "## ",
                    _ => "### ",
                };
                self.spans
                    .push(Span::styled(marker, Style::new().fg(Color::Magenta)));
                self.push_style(|s| s.fg(Color::Magenta).add_modifier(Modifier::BOLD));
            }
            Tag::BlockQuote(_) => {
                self.break_line();
                self.quote_depth += 1;
                self.push_style(|s| s.fg(Color::Blue));
            }
            Tag::CodeBlock(kind) => {
                self.break_line();
                let lang = match kind {
                    CodeBlockKind::Fenced(lang) => lang.split_whitespace().next().unwrap_or("").to_string(),
                    CodeBlockKind::Indented => String::new(),
                };
                self.code = Some((lang, String::new()));
            }
            Tag::List(start) => {
                self.break_line();
                self.lists.push(start);
            }
            Tag::Item => {
                let indent = "  ".repeat(self.lists.len().saturating_sub(1));
                let bullet = match self.lists.last_mut() {
                    Some(Some(n)) => {
                        *n += 1;
                        format!("{indent}{}. ", *n - 1)
                    }
                    _ => format!("{indent}• "),
                };
                self.spans.push(Span::styled(bullet, Style::new().fg(Color::Cyan)));
            }
            Tag::Emphasis => self.push_style(|s| s.add_modifier(Modifier::ITALIC)),
            Tag::Strong => self.push_style(|s| s.add_modifier(Modifier::BOLD)),
            Tag::Strikethrough => self.push_style(|s| s.add_modifier(Modifier::CROSSED_OUT)),
            Tag::Link { dest_url, .. } => {
                self.link = Some(dest_url.to_string());
                self.push_style(|s| s.fg(Color::Blue).add_modifier(Modifier::UNDERLINED));
            }
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Heading(_) => {
                self.pop_style();
                self.break_line();
            }
            TagEnd::Paragraph => self.blank(),
            TagEnd::BlockQuote(_) => {
                self.pop_style();
                self.break_line();
                self.quote_depth = self.quote_depth.saturating_sub(1);
            }
            TagEnd::CodeBlock => {
                if let Some((lang, body)) = self.code.take() {
                    self.code_block(&lang, &body);
                }
            }
            TagEnd::List(_) => {
                self.break_line();
                self.lists.pop();
                if self.lists.is_empty() {
                    self.blank();
                }
            }
            TagEnd::Item => self.break_line(),
            TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough => self.pop_style(),
            TagEnd::Link => {
                self.pop_style();
                if let Some(url) = self.link.take() {
                    self.spans.push(Span::styled(format!(" ({url})"), FRAME));
                }
            }
            _ => {}
        }
    }

    fn code_block(&mut self, lang: &str, body: &str) {
        let rule = "─".repeat(self.width.saturating_sub(2).min(44));
        let header = if lang.is_empty() {
            vec![Span::styled(format!("┌{rule}"), FRAME)]
        } else {
            vec![
                Span::styled("┌─ ", FRAME),
                Span::styled(lang.to_string(), Style::new().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
            ]
        };
        self.lines.push(Line::from(header));

        let highlighted = highlight(body, lang);
        let digits = if highlighted.len() > 1 {
            highlighted.len().to_string().len()
        } else {
            0
        };
        // "│ " + number + " │ "
        let gutter = 2 + if digits > 0 { digits + 3 } else { 0 };
        let room = self.width.saturating_sub(gutter + 1).max(1);

        for (n, spans) in highlighted.into_iter().enumerate() {
            let mut line = vec![Span::styled("│ ", FRAME)];
            if digits > 0 {
                line.push(Span::styled(
                    format!("{:>digits$}", n + 1),
                    Style::new().fg(Color::Rgb(100, 100, 100)),
                ));
                line.push(Span::styled(" │ ", FRAME));
            }
            line.extend(clip(spans, room));
            self.lines.push(Line::from(line));
        }

        self.lines.push(Line::from(Span::styled(format!("└{rule}"), FRAME)));
        self.lines.push(Line::default());
    }

    fn finish(mut self) -> Vec<Line<'static>> {
        self.break_line();
        while self.lines.last().is_some_and(|l| l.spans.is_empty()) {
            self.lines.pop();
        }
        self.lines
    }
}
