use crate::app::{
    Body, BuildViewModel, CommandDetail, CommandView, LegacyView, INLINE_OUTPUT_LINES,
    NARROW_WIDTH_THRESHOLD,
};
use crate::model::{format_duration, truncate, CommandStatus};
use crate::parser::tail_lines;
use crate::tui::spinner;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

/// Quick-select labels stop at 9.
const QUICK_SELECT_MAX: usize = 9;

pub fn status_icon(status: CommandStatus) -> (&'static str, Color) {
    match status {
        CommandStatus::Running => ("⟳", Color::Yellow),
        CommandStatus::Succeeded => ("✓", Color::Green),
        CommandStatus::Failed => ("✗", Color::Red),
    }
}

pub fn render(f: &mut Frame, area: Rect, state: &BuildViewModel) {
    let view = state.view();
    let width = area.width as usize;

    let (lines, cursor_line) = match &view.body {
        Body::Empty => (
            vec![Line::from(Span::styled(
                format!("{} Waiting for the first snapshot…", spinner::frame(state.spinner_frame)),
                Style::default().fg(Color::DarkGray),
            ))],
            0,
        ),
        Body::Legacy(legacy) => (legacy_lines(legacy, width), 0),
        Body::Commands(commands) if commands.is_empty() => (
            vec![Line::from(Span::styled(
                "No commands yet",
                Style::default().fg(Color::DarkGray),
            ))],
            0,
        ),
        Body::Commands(commands) => {
            let narrow = area.width < NARROW_WIDTH_THRESHOLD;
            let mut lines = Vec::new();
            let mut cursor_line = 0;
            for command in commands {
                if command.index == state.cursor {
                    cursor_line = lines.len();
                }
                lines.push(command_line(command, command.index == state.cursor, narrow, width));
                if let Some(detail) = &command.detail {
                    lines.extend(detail_lines(detail, width));
                }
            }
            (lines, cursor_line)
        }
    };

    // Keep the selected row on screen
    let visible_height = area.height as usize;
    let scroll = if cursor_line >= visible_height {
        cursor_line - visible_height + 1
    } else {
        0
    };

    let visible: Vec<Line> = lines.into_iter().skip(scroll).take(visible_height).collect();
    f.render_widget(Paragraph::new(visible), area);
}

fn command_line(command: &CommandView<'_>, is_selected: bool, narrow: bool, max_width: usize) -> Line<'static> {
    let (icon, icon_color) = status_icon(command.status);
    let arrow = if command.detail.is_some() { "▼" } else { "▶" };
    let idx_label = if command.index < QUICK_SELECT_MAX {
        format!("{}", command.index + 1)
    } else {
        " ".to_string()
    };

    let suffix = match &command.detail {
        Some(CommandDetail {
            run_time: Some(secs),
            ..
        }) if !narrow => format!(" {}", format_duration(*secs as i64)),
        _ => String::new(),
    };
    let prefix_width = idx_label.len() + 5;
    let title_max = max_width.saturating_sub(prefix_width + suffix.len() + 1);

    let select_style = if is_selected {
        Style::default().add_modifier(Modifier::REVERSED)
    } else {
        Style::default()
    };

    Line::from(vec![
        Span::styled(
            format!("{idx_label}{arrow} {icon} "),
            Style::default().fg(icon_color),
        ),
        Span::styled(truncate(command.description, title_max), select_style),
        Span::styled(suffix, Style::default().fg(Color::DarkGray)),
    ])
}

fn detail_lines(detail: &CommandDetail<'_>, max_width: usize) -> Vec<Line<'static>> {
    let indent = "     ";
    let text_max = max_width.saturating_sub(indent.len());
    let mut lines = Vec::new();

    let (tail, truncated) = tail_lines(detail.output, INLINE_OUTPUT_LINES);
    if truncated {
        lines.push(Line::from(Span::styled(
            format!("{indent}… e for full output"),
            Style::default().fg(Color::DarkGray),
        )));
    }
    for line in tail.lines() {
        lines.push(Line::from(Span::styled(
            format!("{indent}{}", truncate(line, text_max)),
            Style::default().fg(Color::Gray),
        )));
    }

    let mut result = Vec::new();
    if let Some(code) = detail.exit_code {
        let color = if code == 0 { Color::Green } else { Color::Red };
        result.push(Span::styled(
            format!("{indent}exit code {code}"),
            Style::default().fg(color),
        ));
    }
    if let Some(secs) = detail.run_time {
        let lead = if result.is_empty() { indent } else { "  " };
        result.push(Span::styled(
            format!("{lead}ran {}", format_duration(secs as i64)),
            Style::default().fg(Color::DarkGray),
        ));
    }
    if !result.is_empty() {
        lines.push(Line::from(result));
    }
    lines
}

fn legacy_lines(legacy: &LegacyView<'_>, max_width: usize) -> Vec<Line<'static>> {
    if legacy.disclosure_button {
        return vec![Line::from(vec![
            Span::styled(
                "[ Show build output ]",
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled("  Enter", Style::default().fg(Color::DarkGray)),
        ])];
    }

    let mut lines = Vec::new();
    let sections = [
        ("setup", legacy.setup, Color::Gray),
        ("setup error", legacy.setup_error, Color::Red),
        ("output", legacy.output, Color::Gray),
    ];
    for (title, blob, color) in sections {
        let Some(text) = blob.filter(|t| !t.trim().is_empty()) else {
            continue;
        };
        lines.push(Line::from(Span::styled(
            title.to_string(),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )));
        let (tail, truncated) = tail_lines(text, INLINE_OUTPUT_LINES);
        if truncated {
            lines.push(Line::from(Span::styled(
                "  … e for full output",
                Style::default().fg(Color::DarkGray),
            )));
        }
        for line in tail.lines() {
            lines.push(Line::from(Span::styled(
                format!("  {}", truncate(line, max_width.saturating_sub(2))),
                Style::default().fg(color),
            )));
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn icons_per_status() {
        assert_eq!(status_icon(CommandStatus::Running).0, "⟳");
        assert_eq!(status_icon(CommandStatus::Succeeded).1, Color::Green);
        assert_eq!(status_icon(CommandStatus::Failed).1, Color::Red);
    }

    #[test]
    fn detail_shows_tail_and_exit_code() {
        let output = (1..=20).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n");
        let detail = CommandDetail {
            output: &output,
            run_time: Some(4),
            exit_code: Some(2),
        };
        let lines = detail_lines(&detail, 80);
        // truncation hint + tail + exit code
        assert_eq!(lines.len(), 1 + INLINE_OUTPUT_LINES + 1);
        assert!(lines.last().unwrap().to_string().contains("exit code 2"));
    }

    #[test]
    fn detail_shows_successful_exit_and_run_time() {
        let detail = CommandDetail {
            output: "done",
            run_time: Some(65),
            exit_code: Some(0),
        };
        let rendered: Vec<String> = detail_lines(&detail, 40).iter().map(ToString::to_string).collect();
        assert_eq!(rendered, vec!["     done", "     exit code 0  ran 1m 5s"]);
    }

    #[test]
    fn running_detail_has_no_result_line() {
        let detail = CommandDetail {
            output: "collecting packages",
            run_time: None,
            exit_code: None,
        };
        assert_eq!(detail_lines(&detail, 40).len(), 1);
    }

    #[test]
    fn hidden_legacy_output_is_one_button() {
        let legacy = LegacyView {
            disclosure_button: true,
            setup: None,
            setup_error: None,
            output: None,
        };
        let lines = legacy_lines(&legacy, 80);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].to_string().contains("Show build output"));
    }

    #[test]
    fn revealed_legacy_output_skips_empty_sections() {
        let legacy = LegacyView {
            disclosure_button: false,
            setup: Some(""),
            setup_error: None,
            output: Some("building html"),
        };
        let rendered: Vec<String> = legacy_lines(&legacy, 80).iter().map(ToString::to_string).collect();
        assert_eq!(rendered, vec!["output", "  building html"]);
    }
}
