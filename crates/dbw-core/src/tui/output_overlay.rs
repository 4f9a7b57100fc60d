use crate::app::OutputOverlay;
use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui::Frame;

/// Rows available for output inside the overlay for a terminal of `area_height` rows.
pub fn visible_height(area_height: u16) -> usize {
    (area_height * 8 / 10).max(6).min(area_height).saturating_sub(2) as usize
}

pub fn render(f: &mut Frame, overlay: &OutputOverlay) {
    let area = f.area();

    // ~90% width, ~80% height, centered
    let width = (area.width * 9 / 10).max(area.width.min(20)).min(area.width);
    let height = (area.height * 8 / 10).max(6).min(area.height);
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    let overlay_area = Rect::new(x, y, width, height);

    f.render_widget(Clear, overlay_area);

    let inner_height = visible_height(area.height);

    let total = overlay.lines.len();
    let scroll_info = if total > inner_height {
        format!(
            " [{}-{}/{}] ",
            overlay.scroll + 1,
            (overlay.scroll + inner_height).min(total),
            total,
        )
    } else {
        String::new()
    };

    let title = format!(" {} {}", overlay.title, scroll_info);
    let hints = " j/k scroll | g/G top/end | q close ";

    let block = Block::default()
        .title(title)
        .title_bottom(Line::from(hints).centered())
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .style(Style::default().bg(Color::Black));

    let visible_lines: Vec<Line> = if total == 0 {
        vec![Line::from(Span::styled(
            "(no output)",
            Style::default().fg(Color::DarkGray),
        ))]
    } else {
        overlay
            .lines
            .iter()
            .skip(overlay.scroll)
            .take(inner_height)
            .map(|l| Line::from(Span::raw(l.as_str())))
            .collect()
    };

    let paragraph = Paragraph::new(visible_lines)
        .block(block)
        .wrap(Wrap { trim: false });

    f.render_widget(paragraph, overlay_area);
}
