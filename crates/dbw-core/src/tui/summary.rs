//! Block between the header and the command list: commit, duration, start time,
//! builder, docs link,
//! and the two distinct failure surfaces. The error banner carries the server's
//! build error; the fatal notice carries a transport failure that stopped polling.

use crate::app::BuildView;
use crate::model::{format_duration, truncate};
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::Frame;

pub fn lines<'a>(view: &BuildView<'a>, width: u16) -> Vec<Line<'a>> {
    let max = width.saturating_sub(12) as usize;
    let mut lines = Vec::new();

    let mut meta = Vec::new();
    if let Some(commit) = view.commit {
        meta.push(Span::styled("commit ", Style::default().fg(Color::DarkGray)));
        meta.push(Span::styled(
            truncate(commit, 12),
            Style::default().fg(Color::Blue),
        ));
    }
    if let Some(length) = view.length {
        if !meta.is_empty() {
            meta.push(Span::raw("  "));
        }
        meta.push(Span::styled("took ", Style::default().fg(Color::DarkGray)));
        meta.push(Span::raw(format_duration(length as i64)));
    }
    if !meta.is_empty() {
        lines.push(Line::from(meta));
    }

    let mut origin = Vec::new();
    if let Some(started) = view.started {
        origin.push(Span::styled("started ", Style::default().fg(Color::DarkGray)));
        origin.push(Span::raw(started.format("%Y-%m-%d %H:%M UTC").to_string()));
    }
    if let Some(builder) = view.builder {
        if !origin.is_empty() {
            origin.push(Span::raw("  "));
        }
        origin.push(Span::styled("on ", Style::default().fg(Color::DarkGray)));
        origin.push(Span::raw(builder));
    }
    if !origin.is_empty() {
        lines.push(Line::from(origin));
    }

    if let Some(url) = view.docs_url {
        lines.push(Line::from(vec![
            Span::styled("docs   ", Style::default().fg(Color::DarkGray)),
            Span::styled(
                truncate(url, max),
                Style::default()
                    .fg(Color::Green)
                    .add_modifier(Modifier::UNDERLINED),
            ),
            Span::styled("  (o)", Style::default().fg(Color::DarkGray)),
        ]));
    }

    if let Some(error) = view.error_banner {
        lines.push(Line::from(vec![
            Span::styled(
                "✗ ",
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            ),
            Span::styled(error, Style::default().fg(Color::Red)),
        ]));
    }

    if let Some(fatal) = view.fatal_notice {
        lines.push(Line::from(vec![
            Span::styled(
                "■ polling stopped: ",
                Style::default()
                    .fg(Color::Magenta)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(fatal, Style::default().fg(Color::Magenta)),
        ]));
    }

    lines
}

/// Rows needed for `lines` plus the bottom border, or 0 when there is nothing to show.
pub fn height(view: &BuildView<'_>, width: u16) -> u16 {
    let n = lines(view, width).len() as u16;
    if n == 0 {
        0
    } else {
        n + 1
    }
}

pub fn render(f: &mut Frame, area: Rect, view: &BuildView<'_>) {
    if area.height == 0 {
        return;
    }
    let paragraph = Paragraph::new(lines(view, area.width))
        .wrap(Wrap { trim: true })
        .block(
            Block::default()
                .borders(Borders::BOTTOM)
                .border_style(Style::default().fg(Color::DarkGray)),
        );
    f.render_widget(paragraph, area);
}
