use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{
        Block, Borders, Clear, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState, Wrap,
    },
    Frame,
};

use crate::app::{App, InputMode, Sender, Theme};
use crate::files::FileKind;
use crate::format::{self, Block as MdBlock, Document, Inline};

/// Colors for one theme. Dark mirrors the usual terminal look; light flips
/// foregrounds for bright backgrounds.
struct Palette {
    fg: Color,
    dim: Color,
    accent: Color,
    user: Color,
    assistant: Color,
    code_fg: Color,
    code_bg: Color,
    border: Color,
}

impl Palette {
    fn for_theme(theme: Theme) -> Self {
        match theme {
            Theme::Dark => Palette {
                fg: Color::Gray,
                dim: Color::DarkGray,
                accent: Color::Cyan,
                user: Color::Green,
                assistant: Color::Magenta,
                code_fg: Color::Rgb(180, 180, 180),
                code_bg: Color::Rgb(45, 45, 45),
                border: Color::DarkGray,
            },
            Theme::Light => Palette {
                fg: Color::Black,
                dim: Color::DarkGray,
                accent: Color::Blue,
                user: Color::Blue,
                assistant: Color::Magenta,
                code_fg: Color::Rgb(60, 60, 70),
                code_bg: Color::Rgb(230, 232, 236),
                border: Color::Gray,
            },
        }
    }
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let palette = Palette::for_theme(app.theme);
    let area = frame.area();

    let preview_height = if app.uploaded_file.is_some() { 1 } else { 0 };
    let [header_area, chat_area, preview_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(preview_height),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area, &palette);
    render_transcript(app, frame, chat_area, &palette);
    render_preview(app, frame, preview_area, &palette);
    render_input(app, frame, input_area, &palette);
    render_footer(app, frame, footer_area, &palette);

    if app.confirm_clear {
        render_confirm_clear(frame, area, &palette);
    } else if app.attach_input.is_some() {
        render_attach_popup(app, frame, area, &palette);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect, palette: &Palette) {
    let mut spans = vec![
        Span::styled(" Quill ", Style::default().fg(palette.accent).bold()),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(palette.dim),
        ),
    ];
    if app.search_mode {
        spans.push(Span::raw(" "));
        spans.push(Span::styled(
            "[web search]",
            Style::default().fg(palette.accent),
        ));
    }
    if app.is_typing() {
        spans.push(Span::raw(" "));
        spans.push(Span::styled("[waiting]", Style::default().fg(palette.dim)));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_transcript(app: &mut App, frame: &mut Frame, area: Rect, palette: &Palette) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.border));
    let inner = block.inner(area);
    app.chat_height = inner.height;
    app.chat_width = inner.width;

    let lines = transcript_lines(app, palette);
    let total = lines.len() as u16;
    let max_scroll = total.saturating_sub(inner.height);
    if app.follow {
        app.scroll = max_scroll;
    } else {
        app.scroll = app.scroll.min(max_scroll);
    }

    let paragraph = Paragraph::new(Text::from(lines))
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.scroll, 0));
    frame.render_widget(paragraph, area);

    if total > inner.height {
        let mut state = ScrollbarState::new(max_scroll as usize).position(app.scroll as usize);
        frame.render_stateful_widget(
            Scrollbar::new(ScrollbarOrientation::VerticalRight),
            area,
            &mut state,
        );
    }
}

/// Project transcript records and the transient typing placeholder into
/// styled lines. Assistant records always go through the formatter.
fn transcript_lines(app: &App, palette: &Palette) -> Vec<Line<'static>> {
    let mut lines = Vec::new();

    for msg in &app.transcript {
        match msg.sender {
            Sender::User => {
                lines.push(Line::from(Span::styled(
                    "You",
                    Style::default().fg(palette.user).bold(),
                )));
                // Attachment preview comes before the message text
                if let Some(att) = &msg.attachment {
                    let label = match att.kind {
                        FileKind::Image => format!("[image: {}]", att.name),
                        FileKind::Other => format!("[file: {}]", att.name),
                    };
                    lines.push(Line::from(Span::styled(
                        label,
                        Style::default().fg(palette.dim).italic(),
                    )));
                }
                for line in msg.text.lines() {
                    lines.push(Line::from(Span::styled(
                        line.to_string(),
                        Style::default().fg(palette.fg),
                    )));
                }
            }
            Sender::Assistant => {
                lines.push(Line::from(Span::styled(
                    "Quill",
                    Style::default().fg(palette.assistant).bold(),
                )));
                lines.extend(document_lines(&format::parse(&msg.text), palette));
            }
        }
        lines.push(Line::default());
    }

    if app.is_typing() {
        lines.push(Line::from(Span::styled(
            "Quill",
            Style::default().fg(palette.assistant).bold(),
        )));
        let dots = ".".repeat(app.animation_frame as usize + 1);
        lines.push(Line::from(Span::styled(
            format!("Thinking{}", dots),
            Style::default().fg(palette.dim).italic(),
        )));
    }

    lines
}

fn document_lines(doc: &Document, palette: &Palette) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for block in &doc.blocks {
        match block {
            MdBlock::Code { lang, text } => {
                lines.push(Line::from(Span::styled(
                    format!("┌─ {} ", lang),
                    Style::default().fg(palette.dim),
                )));
                for code_line in text.lines() {
                    lines.push(Line::from(vec![
                        Span::styled("│ ", Style::default().fg(palette.dim)),
                        Span::styled(
                            code_line.to_string(),
                            Style::default().fg(palette.code_fg).bg(palette.code_bg),
                        ),
                    ]));
                }
                lines.push(Line::from(Span::styled("└─", Style::default().fg(palette.dim))));
            }
            MdBlock::List { ordered, items } => {
                for (i, item) in items.iter().enumerate() {
                    let marker = if *ordered {
                        format!("{}. ", i + 1)
                    } else {
                        "• ".to_string()
                    };
                    let mut spans = vec![Span::styled(marker, Style::default().fg(palette.accent))];
                    spans.extend(item.iter().map(|inline| inline_span(inline, palette)));
                    lines.push(Line::from(spans));
                }
            }
            MdBlock::Paragraph(inlines) => {
                lines.extend(paragraph_lines(inlines, palette));
            }
        }
    }
    lines
}

/// Paragraph inlines may carry embedded newlines in their text runs; each one
/// starts a new display line.
fn paragraph_lines(inlines: &[Inline], palette: &Palette) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    let mut spans: Vec<Span<'static>> = Vec::new();

    for inline in inlines {
        match inline {
            Inline::Text(t) => {
                let mut parts = t.split('\n');
                if let Some(first) = parts.next() {
                    if !first.is_empty() {
                        spans.push(Span::styled(
                            first.to_string(),
                            Style::default().fg(palette.fg),
                        ));
                    }
                }
                for part in parts {
                    lines.push(Line::from(std::mem::take(&mut spans)));
                    if !part.is_empty() {
                        spans.push(Span::styled(
                            part.to_string(),
                            Style::default().fg(palette.fg),
                        ));
                    }
                }
            }
            other => spans.push(inline_span(other, palette)),
        }
    }
    if !spans.is_empty() {
        lines.push(Line::from(spans));
    }
    lines
}

fn inline_span(inline: &Inline, palette: &Palette) -> Span<'static> {
    match inline {
        Inline::Text(t) => Span::styled(flatten(t), Style::default().fg(palette.fg)),
        Inline::Code(t) => Span::styled(
            flatten(t),
            Style::default().fg(palette.code_fg).bg(palette.code_bg),
        ),
        Inline::Bold(t) => Span::styled(
            flatten(t),
            Style::default().fg(palette.fg).add_modifier(Modifier::BOLD),
        ),
        Inline::Italic(t) => Span::styled(
            flatten(t),
            Style::default().fg(palette.fg).add_modifier(Modifier::ITALIC),
        ),
    }
}

fn flatten(text: &str) -> String {
    text.replace('\n', " ")
}

fn render_preview(app: &App, frame: &mut Frame, area: Rect, palette: &Palette) {
    let Some(file) = &app.uploaded_file else { return };
    let label = match file.kind {
        FileKind::Image => format!(" attached image: {} ", file.name),
        FileKind::Other => format!(" attached file: {} ", file.name),
    };
    let line = Line::from(vec![
        Span::styled(label, Style::default().fg(palette.accent)),
        Span::styled("Ctrl+X to remove", Style::default().fg(palette.dim)),
    ]);
    frame.render_widget(Paragraph::new(line), area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect, palette: &Palette) {
    let editing = app.input_mode == InputMode::Editing;
    let border_color = if editing { palette.accent } else { palette.border };
    let title = if app.search_mode {
        " Message (web search) "
    } else {
        " Message "
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);
    let inner = block.inner(area);

    let content = if app.input.is_empty() {
        let placeholder = if app.search_mode {
            "Search the web..."
        } else {
            "Type your message here..."
        };
        Line::from(Span::styled(
            placeholder,
            Style::default().fg(palette.dim).italic(),
        ))
    } else {
        Line::from(Span::styled(
            app.input.clone(),
            Style::default().fg(palette.fg),
        ))
    };
    frame.render_widget(Paragraph::new(content).block(block), area);

    let popup_open = app.confirm_clear || app.attach_input.is_some();
    if editing && !popup_open && inner.width > 0 {
        let x = inner.x + (app.cursor.min(inner.width.saturating_sub(1) as usize)) as u16;
        frame.set_cursor(x, inner.y);
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect, palette: &Palette) {
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().fg(palette.dim);

    let hints: Vec<(&str, &str)> = if app.confirm_clear {
        vec![(" y ", " clear "), (" n ", " keep ")]
    } else if app.attach_input.is_some() {
        vec![(" Enter ", " attach "), (" Esc ", " cancel ")]
    } else if app.input_mode == InputMode::Editing {
        vec![
            (" Enter ", " send "),
            (" Esc ", " stop typing "),
            (" C-w ", " web "),
            (" C-a ", " attach "),
            (" C-t ", " theme "),
            (" C-l ", " clear "),
            (" C-c ", " quit "),
        ]
    } else {
        vec![
            (" i ", " type "),
            (" j/k ", " scroll "),
            (" w ", " web "),
            (" a ", " attach "),
            (" t ", " theme "),
            (" c ", " clear "),
            (" q ", " quit "),
        ]
    };

    let spans: Vec<Span> = hints
        .into_iter()
        .flat_map(|(key, label)| {
            [
                Span::styled(key, key_style),
                Span::styled(label, label_style),
            ]
        })
        .collect();
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_confirm_clear(frame: &mut Frame, area: Rect, palette: &Palette) {
    let popup = centered_rect(area, 44, 4);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.accent))
        .title(" Clear history ");
    let text = Text::from(vec![
        Line::from("Clear the chat history? This cannot be undone."),
        Line::from(Span::styled(
            "y to clear, n to keep",
            Style::default().fg(palette.dim),
        )),
    ]);
    frame.render_widget(Clear, popup);
    frame.render_widget(
        Paragraph::new(text).block(block).wrap(Wrap { trim: true }),
        popup,
    );
}

fn render_attach_popup(app: &App, frame: &mut Frame, area: Rect, palette: &Palette) {
    let Some(buffer) = &app.attach_input else { return };
    let popup = centered_rect(area, 56, 3);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.accent))
        .title(" Attach file (path) ");
    let inner = block.inner(popup);

    frame.render_widget(Clear, popup);
    frame.render_widget(
        Paragraph::new(Line::from(buffer.clone())).block(block),
        popup,
    );
    if inner.width > 0 {
        let x = inner.x + (buffer.chars().count().min(inner.width.saturating_sub(1) as usize)) as u16;
        frame.set_cursor(x, inner.y);
    }
}

fn centered_rect(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}
