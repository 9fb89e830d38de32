use docchat_core::{render as render_blocks, Block as ContentBlock, PendingOperation, Role, Session};
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};
use crate::app::{App, InputMode, Screen, Theme};

/// Colors for one theme. Passed down to every render function.
#[derive(Debug, Clone, Copy)]
pub struct Palette {
    pub background: Color,
    pub text: Color,
    pub muted: Color,
    pub accent: Color,
    pub user: Color,
    pub assistant: Color,
    pub error: Color,
    pub bar: Color,
}

impl Palette {
    pub fn for_theme(theme: Theme) -> Self {
        match theme {
            Theme::Dark => Self {
                background: Color::Black,
                text: Color::Gray,
                muted: Color::DarkGray,
                accent: Color::Cyan,
                user: Color::Cyan,
                assistant: Color::Magenta,
                error: Color::LightRed,
                bar: Color::DarkGray,
            },
            Theme::Light => Self {
                background: Color::White,
                text: Color::Black,
                muted: Color::Gray,
                accent: Color::Blue,
                user: Color::Blue,
                assistant: Color::Magenta,
                error: Color::Red,
                bar: Color::Gray,
            },
        }
    }
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();
    let palette = Palette::for_theme(app.theme);

    frame.render_widget(
        Block::default().style(Style::default().bg(palette.background).fg(palette.text)),
        area,
    );

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, &palette, frame, header_area);

    match app.screen {
        Screen::Home => render_home_screen(&palette, frame, body_area),
        Screen::Chat => render_chat_screen(app, &palette, frame, body_area),
    }

    render_footer(app, &palette, frame, footer_area);

    if app.input_mode == InputMode::Upload {
        render_upload_prompt(app, &palette, frame, area);
    }
}

fn render_header(app: &App, palette: &Palette, frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(" Intelligent Document Chat ", Style::default().fg(palette.accent).bold()),
        Span::styled(format!("{} ", app.service_url), Style::default().fg(palette.muted)),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(palette.muted),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(palette.bar));
    frame.render_widget(header, area);
}

fn render_footer(app: &App, palette: &Palette, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing | InputMode::Upload => Style::default().bg(Color::Yellow).fg(Color::Black),
    };

    let mode_text = match (app.screen, app.input_mode) {
        (Screen::Home, _) => " HOME ",
        (Screen::Chat, InputMode::Normal) => " CHAT ",
        (Screen::Chat, InputMode::Editing) => " ASK ",
        (Screen::Chat, InputMode::Upload) => " UPLOAD ",
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(palette.background).fg(palette.text);

    let pairs: Vec<(&str, &str)> = match (app.screen, app.input_mode) {
        (Screen::Home, _) => vec![(" Enter ", " start chat "), (" t ", " theme "), (" q ", " quit ")],
        (Screen::Chat, InputMode::Normal) => {
            let mut pairs = vec![(" u ", " upload "), (" i ", " ask "), (" j/k ", " scroll ")];
            if app.session().is_some_and(Session::can_retry) {
                pairs.push((" r ", " retry "));
            }
            if app.session().is_some_and(|s| s.last_failure().is_some()) || app.notice.is_some() {
                pairs.push((" x ", " dismiss "));
            }
            pairs.extend([(" t ", " theme "), (" Esc ", " home "), (" q ", " quit ")]);
            pairs
        }
        (Screen::Chat, InputMode::Editing) => vec![(" Enter ", " send "), (" Esc ", " cancel ")],
        (Screen::Chat, InputMode::Upload) => vec![(" Enter ", " upload "), (" Esc ", " cancel ")],
    };

    let mut spans = vec![Span::styled(mode_text, mode_style)];
    for (key, label) in pairs {
        spans.push(Span::styled(key, key_style));
        spans.push(Span::styled(label, label_style));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_home_screen(palette: &Palette, frame: &mut Frame, area: Rect) {
    let heading = Style::default().fg(palette.accent).add_modifier(Modifier::BOLD);
    let body = Style::default().fg(palette.text);
    let muted = Style::default().fg(palette.muted);

    let lines = vec![
        Line::default(),
        Line::from(Span::styled("Chat with your PDF", heading)),
        Line::default(),
        Line::from(Span::styled(
            "Upload a document and ask questions about it. Answers come from a retrieval service \
             that reads the document, finds the relevant passages, and writes a reply.",
            body,
        )),
        Line::default(),
        Line::from(Span::styled("  • One document per session", body)),
        Line::from(Span::styled("  • Answers grounded in the uploaded text", body)),
        Line::from(Span::styled("  • Nothing is kept after you leave the chat", body)),
        Line::default(),
        Line::from(Span::styled("Press Enter to start.", muted)),
    ];

    let home = Paragraph::new(Text::from(lines))
        .block(Block::default().borders(Borders::ALL).border_style(muted))
        .wrap(Wrap { trim: false });
    frame.render_widget(home, area);
}

/// Lines for one assistant answer, laid out from the parsed blocks.
fn answer_lines(content: &str, palette: &Palette) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for block in render_blocks(content) {
        match block {
            ContentBlock::Paragraph(text) => {
                lines.push(Line::from(Span::styled(text, Style::default().fg(palette.text))));
            }
            ContentBlock::BulletList(items) => {
                for item in items {
                    lines.push(Line::from(vec![
                        Span::styled("  • ", Style::default().fg(palette.assistant)),
                        Span::styled(item, Style::default().fg(palette.text)),
                    ]));
                }
            }
            ContentBlock::Spacer => lines.push(Line::default()),
        }
    }
    lines
}

fn transcript_text(session: &Session, palette: &Palette, animation_frame: u8) -> Text<'static> {
    if session.transcript().is_empty() && session.is_idle() {
        return Text::from(vec![
            Line::from(Span::styled(
                "Ready! Upload a PDF document to start the conversation.",
                Style::default().fg(palette.text),
            )),
            Line::from(Span::styled("Press u and enter the path of the file.", Style::default().fg(palette.muted))),
        ]);
    }

    let mut lines: Vec<Line> = Vec::new();

    for msg in session.transcript() {
        let (label, color) = match msg.role() {
            Role::User => ("You", palette.user),
            Role::Assistant => ("AI", palette.assistant),
        };
        lines.push(Line::from(vec![
            Span::styled(format!("{}:", label), Style::default().fg(color).add_modifier(Modifier::BOLD)),
            Span::styled(format!(" {}", msg.display_time()), Style::default().fg(palette.muted)),
        ]));

        match msg.role() {
            Role::User => {
                for line in msg.content().lines() {
                    lines.push(Line::from(line.to_string()));
                }
            }
            Role::Assistant => lines.extend(answer_lines(msg.content(), palette)),
        }
        lines.push(Line::default());
    }

    let activity = match session.pending() {
        PendingOperation::None => None,
        PendingOperation::Ingesting => Some("Analyzing document"),
        PendingOperation::Querying => Some("Thinking"),
    };
    if let Some(activity) = activity {
        lines.push(Line::from(Span::styled(
            "AI:",
            Style::default().fg(palette.assistant).add_modifier(Modifier::BOLD),
        )));
        // Animated ellipsis: cycles through ".", "..", "..."
        let dots = ".".repeat((animation_frame as usize) + 1);
        lines.push(Line::from(Span::styled(
            format!("{}{}", activity, dots),
            Style::default().fg(palette.muted).add_modifier(Modifier::ITALIC),
        )));
    }

    Text::from(lines)
}

fn render_chat_screen(app: &mut App, palette: &Palette, frame: &mut Frame, area: Rect) {
    let Some(chat) = app.chat.as_ref() else { return };
    let session = chat.session();

    let status = status_line(app, session, palette);
    let status_height = if status.is_some() { 1 } else { 0 };
    let composer_height = if session.document().is_some() { 3 } else { 0 };

    let [chat_area, status_area, input_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(status_height),
        Constraint::Length(composer_height),
    ])
    .areas(area);

    let title = match session.document() {
        Some(doc) => format!(" Analyzing: {} ", doc.name),
        None => " Upload a document to begin ".to_string(),
    };
    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.accent))
        .title(title);

    let chat_widget = Paragraph::new(transcript_text(session, palette, app.animation_frame))
        .block(chat_block)
        .wrap(Wrap { trim: true })
        .scroll((chat.scroll, 0));
    frame.render_widget(chat_widget, chat_area);

    if let Some(status) = status {
        frame.render_widget(Paragraph::new(status), status_area);
    }

    if composer_height > 0 {
        render_composer(app, palette, frame, input_area);
    }

    // Store chat area dimensions for scroll calculations (inner size minus borders)
    app.chat_height = chat_area.height.saturating_sub(2);
    app.chat_width = chat_area.width.saturating_sub(2);
}

/// Inline error indicator: the session's last failure, or a local notice.
fn status_line(app: &App, session: &Session, palette: &Palette) -> Option<Line<'static>> {
    let error_style = Style::default().fg(palette.error).add_modifier(Modifier::BOLD);
    let hint_style = Style::default().fg(palette.muted);

    if let Some(notice) = &app.notice {
        return Some(Line::from(vec![
            Span::styled(" ! ", error_style),
            Span::styled(notice.clone(), Style::default().fg(palette.error)),
        ]));
    }

    let failure = session.last_failure()?;
    let hint = if session.can_retry() {
        "  (r to retry, x to dismiss)"
    } else {
        "  (x to dismiss)"
    };
    let what = if failure.turn.is_some() {
        "Your question was not answered: "
    } else {
        "Upload failed: "
    };
    Some(Line::from(vec![
        Span::styled(" ! ", error_style),
        Span::styled(format!("{}{}", what, failure.error), Style::default().fg(palette.error)),
        Span::styled(hint, hint_style),
    ]))
}

fn render_composer(app: &App, palette: &Palette, frame: &mut Frame, area: Rect) {
    let busy = app.is_busy();
    let editing = app.input_mode == InputMode::Editing;

    let border_color = if busy {
        palette.muted
    } else if editing {
        Color::Yellow
    } else {
        palette.accent
    };
    let title = if busy {
        " Waiting for the answer... "
    } else {
        " Ask about your document (i to type) "
    };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Calculate visible portion of input with horizontal scrolling
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.composer_cursor;
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = app.composer
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let text_color = if busy { palette.muted } else { palette.user };
    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(text_color))
        .block(input_block);
    frame.render_widget(input, area);

    if editing {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_upload_prompt(app: &App, palette: &Palette, frame: &mut Frame, area: Rect) {
    // Calculate popup size and position (centered)
    let popup_width = 70.min(area.width.saturating_sub(4));
    let popup_height = 7;

    let popup_x = (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = (area.height.saturating_sub(popup_height)) / 2;
    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height);

    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Select Document ")
        .style(Style::default().bg(palette.background));

    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let instructions = Paragraph::new("Path to a PDF file. Enter to upload, Esc to cancel.")
        .style(Style::default().fg(palette.muted));
    frame.render_widget(instructions, Rect::new(inner.x, inner.y, inner.width, 1));

    // Show the tail of long paths so the cursor end stays visible
    let width = inner.width as usize;
    let char_count = app.upload_path.chars().count();
    let visible: String = app.upload_path
        .chars()
        .skip(char_count.saturating_sub(width.saturating_sub(1)))
        .collect();

    let input_area = Rect::new(inner.x, inner.y + 2, inner.width, 1);
    frame.render_widget(
        Paragraph::new(visible.clone()).style(Style::default().fg(palette.accent)),
        input_area,
    );
    let cursor_x = visible.chars().count().min(width) as u16;
    frame.set_cursor_position((input_area.x + cursor_x, input_area.y));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_answer_lines_follow_blocks() {
        let palette = Palette::for_theme(Theme::Dark);
        let lines = answer_lines("Totals:\n- $100\n- $200\n\nDone", &palette);
        let rendered: Vec<String> = lines
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect();
        assert_eq!(rendered, vec!["Totals:", "  • $100", "  • $200", "", "Done"]);
    }

    #[test]
    fn test_palettes_differ() {
        let dark = Palette::for_theme(Theme::Dark);
        let light = Palette::for_theme(Theme::Light);
        assert_ne!(dark.background, light.background);
    }
}
