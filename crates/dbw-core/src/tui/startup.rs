//! Animated startup screen.
//!
//! Each phase (load snapshot, fetch build) is driven by `tokio::select!` to run the
//! async future concurrently with an 80ms spinner tick, re-rendering the startup
//! screen on each tick so the animation stays smooth even during slow network calls.

use crate::error::FetchError;
use crate::model::{Build, BuildId};
use crate::parser::parse_build;
use crate::traits::StatusEndpoint;
use crate::tui::spinner;
use color_eyre::eyre::{eyre, Report, Result};
use ratatui::backend::Backend;
use ratatui::layout::{Constraint, Layout};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Terminal;
use std::future::Future;
use std::time::Duration;

pub const ASCII_ART: &[&str] = &[
    "██████╗ ██████╗ ██╗    ██╗",
    "██╔══██╗██╔══██╗██║    ██║",
    "██║  ██║██████╔╝██║ █╗ ██║",
    "██║  ██║██╔══██╗██║███╗██║",
    "██████╔╝██████╔╝╚███╔███╔╝",
    "╚═════╝ ╚═════╝  ╚══╝╚══╝ ",
];

/// Interpolate a 3-stop gradient: Teal -> Blue -> Indigo across `total_lines`.
fn gradient_color(line_idx: usize, total_lines: usize) -> Color {
    if total_lines <= 1 {
        return Color::Rgb(0, 200, 180);
    }
    let t = line_idx as f64 / (total_lines - 1) as f64;

    let (r, g, b) = if t <= 0.5 {
        // Teal (0, 200, 180) -> Blue (40, 120, 255)
        let s = t * 2.0;
        (
            (40.0 * s) as u8,
            (200.0 + (120.0 - 200.0) * s) as u8,
            (180.0 + (255.0 - 180.0) * s) as u8,
        )
    } else {
        // Blue (40, 120, 255) -> Indigo (110, 60, 230)
        let s = (t - 0.5) * 2.0;
        (
            (40.0 + (110.0 - 40.0) * s) as u8,
            (120.0 + (60.0 - 120.0) * s) as u8,
            (255.0 + (230.0 - 255.0) * s) as u8,
        )
    };

    Color::Rgb(r, g, b)
}

#[derive(Clone)]
enum PhaseStatus {
    InProgress,
    Done,
    Failed(String),
}

#[derive(Clone)]
struct StartupPhase {
    label: String,
    detail: Option<String>,
    status: PhaseStatus,
}

/// A pre-fetched snapshot to show before the first poll.
pub struct SnapshotSource {
    /// Shown next to the phase label, usually the file path.
    pub label: String,
    pub contents: String,
}

pub struct StartupResult {
    /// `None` when the first fetch failed transiently; the poller will retry.
    pub build: Option<Build>,
}

fn render_startup<B: Backend>(terminal: &mut Terminal<B>, phases: &[StartupPhase], frame: usize) {
    if let Err(e) = terminal.draw(|f| {
        let area = f.area();
        let art_height = ASCII_ART.len() as u16;
        let total_lines = art_height + 1 + phases.len() as u16;
        let top_offset = (area.height.saturating_sub(total_lines) / 2).saturating_sub(4);
        let vertical = Layout::vertical([
            Constraint::Length(top_offset),
            Constraint::Length(total_lines),
            Constraint::Min(0),
        ])
        .split(area);

        let mut lines: Vec<Line> = ASCII_ART
            .iter()
            .enumerate()
            .map(|(i, line)| {
                let color = gradient_color(i, ASCII_ART.len());
                Line::from(Span::styled(*line, Style::default().fg(color)))
            })
            .collect();

        lines.push(Line::from(""));

        lines.extend(phases.iter().map(|phase| {
            let (icon, icon_style) = match &phase.status {
                PhaseStatus::InProgress => (
                    spinner::frame(frame).to_string(),
                    Style::default().fg(Color::Yellow),
                ),
                PhaseStatus::Done => ("\u{2713}".to_string(), Style::default().fg(Color::Green)),
                PhaseStatus::Failed(_) => ("\u{2717}".to_string(), Style::default().fg(Color::Red)),
            };

            let mut spans = vec![
                Span::styled(format!("  {icon} "), icon_style),
                Span::styled(&phase.label, Style::default().fg(Color::White)),
            ];

            if let Some(detail) = &phase.detail {
                spans.push(Span::raw("  "));
                spans.push(Span::styled(detail, Style::default().fg(Color::DarkGray)));
            }

            if let PhaseStatus::Failed(msg) = &phase.status {
                spans.push(Span::raw("  "));
                spans.push(Span::styled(msg, Style::default().fg(Color::Red)));
            }

            Line::from(spans)
        }));

        f.render_widget(Paragraph::new(lines), vertical[1]);
    }) {
        tracing::warn!("startup render failed: {e}");
    }
}

async fn run_phase<B, F, T, E>(
    terminal: &mut Terminal<B>,
    phases: &mut Vec<StartupPhase>,
    label: &str,
    fut: F,
) -> Result<T, E>
where
    B: Backend,
    F: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    phases.push(StartupPhase {
        label: label.to_string(),
        detail: None,
        status: PhaseStatus::InProgress,
    });
    render_startup(terminal, phases, 0);

    let mut ticker = tokio::time::interval(Duration::from_millis(80));
    let mut frame = 0usize;
    tokio::pin!(fut);

    loop {
        tokio::select! {
            result = &mut fut => {
                let idx = phases.len() - 1;
                match &result {
                    Ok(_) => phases[idx].status = PhaseStatus::Done,
                    Err(e) => phases[idx].status = PhaseStatus::Failed(e.to_string()),
                }
                render_startup(terminal, phases, frame);
                return result;
            }
            _ = ticker.tick() => {
                frame += 1;
                render_startup(terminal, phases, frame);
            }
        }
    }
}

fn set_detail<B: Backend>(terminal: &mut Terminal<B>, phases: &mut [StartupPhase], detail: String) {
    if let Some(phase) = phases.last_mut() {
        phase.detail = Some(detail);
    }
    render_startup(terminal, phases, 0);
}

/// Show the startup screen while the first snapshot is obtained.
///
/// With a `snapshot`, that is parsed and nothing is fetched; it must describe
/// `build_id`. Otherwise the build is
/// fetched once; a transient failure is tolerated (the poller retries), while a
/// missing build aborts startup.
pub async fn run_startup<B: Backend>(
    terminal: &mut Terminal<B>,
    endpoint: &dyn StatusEndpoint,
    build_id: &BuildId,
    snapshot: Option<SnapshotSource>,
) -> Result<StartupResult> {
    let mut phases: Vec<StartupPhase> = Vec::new();

    if let Some(source) = snapshot {
        let build = run_phase(terminal, &mut phases, "Loading snapshot", async {
            let build = parse_build(&source.contents)?;
            if build.id != *build_id {
                return Err(eyre!(
                    "snapshot is for build #{}, not #{build_id}",
                    build.id
                ));
            }
            Ok::<_, Report>(build)
        })
        .await?;
        set_detail(
            terminal,
            &mut phases,
            format!("{} ({})", source.label, build.state.label()),
        );
        return Ok(StartupResult { build: Some(build) });
    }

    let result = run_phase(
        terminal,
        &mut phases,
        &format!("Fetching build #{build_id}"),
        async {
            let body = endpoint.fetch_build(build_id).await?;
            parse_build(&body)
        },
    )
    .await;

    match result {
        Ok(build) => {
            set_detail(terminal, &mut phases, build.state.label().to_string());
            Ok(StartupResult { build: Some(build) })
        }
        Err(e @ FetchError::NotFound(_)) => Err(e.into()),
        Err(e) => {
            tracing::warn!("initial fetch failed, continuing: {e}");
            set_detail(terminal, &mut phases, "(will retry)".to_string());
            Ok(StartupResult { build: None })
        }
    }
}
