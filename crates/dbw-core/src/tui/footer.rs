use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

use crate::app::{BuildViewModel, NARROW_WIDTH_THRESHOLD};

pub fn hints(state: &BuildViewModel, narrow: bool) -> &'static [(&'static str, &'static str)] {
    if state.has_overlay() {
        &[("j/k", "scroll"), ("g/G", "top/end"), ("q", "close")]
    } else if state.is_legacy() {
        if state.legacy_output_visible() {
            &[("e", "full output"), ("o", "docs"), ("q", "quit")]
        } else {
            &[("Enter", "show output"), ("o", "docs"), ("q", "quit")]
        }
    } else if narrow {
        &[
            ("j/k", "nav"),
            ("Enter", "exp/col"),
            ("e", "out"),
            ("o", "docs"),
            ("q", "quit"),
        ]
    } else {
        &[
            ("↑↓/jk", "navigate"),
            ("Enter/Space", "expand"),
            ("e", "output"),
            ("o", "open docs"),
            ("c", "commit"),
            ("q", "quit"),
        ]
    }
}

pub fn render(f: &mut Frame, area: Rect, state: &BuildViewModel) {
    let narrow = area.width < NARROW_WIDTH_THRESHOLD;

    // Notification display
    let line = if let Some(notif) = state.notifications.last() {
        Line::from(vec![
            Span::styled("★ ", Style::default().fg(Color::Yellow)),
            Span::styled(&notif.message, Style::default().fg(Color::Yellow)),
        ])
    } else {
        let mut spans: Vec<Span> = Vec::new();
        for (i, (key, desc)) in hints(state, narrow).iter().enumerate() {
            if i > 0 {
                spans.push(Span::raw(" "));
            }
            spans.push(Span::styled(*key, Style::default().fg(Color::Cyan)));
            spans.push(Span::styled(
                format!(" {desc}"),
                Style::default().fg(Color::DarkGray),
            ));
        }
        Line::from(spans)
    };

    let footer = Paragraph::new(line).block(
        Block::default()
            .borders(Borders::TOP)
            .border_style(Style::default().fg(Color::DarkGray)),
    );
    f.render_widget(footer, area);
}
