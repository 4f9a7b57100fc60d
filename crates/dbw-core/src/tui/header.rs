use crate::app::{BuildView, BuildViewModel};
use crate::tui::spinner;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

/// Icon, text and color for the build's overall state.
pub fn state_badge(view: &BuildView<'_>, spinner_frame: usize) -> (String, Color) {
    if view.cancelled {
        ("⊘ cancelled".to_string(), Color::Yellow)
    } else if view.finished && view.success {
        ("✓ passed".to_string(), Color::Green)
    } else if view.finished {
        ("✗ failed".to_string(), Color::Red)
    } else {
        (
            format!("{} {}", spinner::frame(spinner_frame), view.state_label),
            Color::Yellow,
        )
    }
}

pub fn render(f: &mut Frame, area: Rect, state: &BuildViewModel) {
    let view = state.view();

    let mut spans = vec![
        Span::styled(
            format!(" dbw {} ", state.config.version_string),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("│ "),
    ];

    if let Some(project) = view.project {
        spans.push(Span::styled(
            project,
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ));
        spans.push(Span::raw(" "));
    }
    if let Some(version) = view.version {
        spans.push(Span::styled(
            format!("[{version}] "),
            Style::default().fg(Color::Yellow),
        ));
    }
    spans.push(Span::styled(
        format!("#{}", state.config.build_id),
        Style::default().fg(Color::DarkGray),
    ));
    spans.push(Span::raw("  "));

    let (badge, color) = state_badge(&view, state.spinner_frame);
    spans.push(Span::styled(
        badge,
        Style::default().fg(color).add_modifier(Modifier::BOLD),
    ));

    if state.polling_stopped {
        if !view.finished {
            spans.push(Span::styled(
                "  polling stopped",
                Style::default().fg(Color::DarkGray),
            ));
        }
    } else if state.next_poll_in > 0 {
        spans.push(Span::styled(
            format!("  {}s", state.next_poll_in),
            Style::default().fg(Color::DarkGray),
        ));
    }

    // Error indicator
    if state.error_message().is_some() {
        spans.push(Span::raw(" "));
        spans.push(Span::styled(
            "!",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ));
    }

    let header = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::BOTTOM)
            .border_style(Style::default().fg(Color::DarkGray)),
    );

    f.render_widget(header, area);
}
