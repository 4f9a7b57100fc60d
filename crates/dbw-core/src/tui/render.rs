use crate::app::BuildViewModel;
use crate::tui::{commands, footer, header, output_overlay, summary};
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Style};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::Frame;

pub fn render(f: &mut Frame, state: &BuildViewModel) {
    let view = state.view();
    let summary_height = summary::height(&view, f.area().width);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),              // header
            Constraint::Length(summary_height), // commit, docs, banners
            Constraint::Min(1),                 // commands
            Constraint::Length(2),              // footer
        ])
        .split(f.area());

    header::render(f, chunks[0], state);
    summary::render(f, chunks[1], &view);
    commands::render(f, chunks[2], state);
    footer::render(f, chunks[3], state);

    // Error toast
    if let Some(err) = state.error_message() {
        let area = f.area();
        if area.height > 6 && area.width >= 4 {
            let err_area = Rect {
                x: area.x + 1,
                y: area.y + area.height.saturating_sub(5),
                width: area.width.saturating_sub(2),
                height: 3,
            };
            let err_widget = Paragraph::new(err.to_owned())
                .style(Style::default().fg(Color::Red))
                .block(
                    Block::default()
                        .title(" Error ")
                        .borders(Borders::ALL)
                        .border_style(Style::default().fg(Color::Red)),
                )
                .wrap(Wrap { trim: true });
            f.render_widget(err_widget, err_area);
        }
    }

    // Overlay (drawn on top of everything)
    if let Some(overlay) = state.overlay() {
        output_overlay::render(f, overlay);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::AppConfig;
    use crate::model::{Build, BuildId, BuildState, Command};
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;

    fn make_vm() -> BuildViewModel {
        BuildViewModel::new(AppConfig {
            build_id: BuildId::new("24011"),
            version_string: "v0.3.0".to_string(),
        })
    }

    fn make_build(state: &str, success: bool) -> Build {
        Build {
            id: BuildId::new("24011"),
            state: BuildState::from(state.to_string()),
            success,
            commit: Some("a1b2c3d".to_string()),
            commit_url: None,
            length: Some(63),
            docs_url: Some("https://pip.example.org/en/latest/".to_string()),
            error: None,
            commands: Some(vec![
                Command {
                    id: Some(1),
                    description: "git clone".to_string(),
                    command: None,
                    output: "Cloning into '.'...".to_string(),
                    exit_code: Some(0),
                    run_time: Some(2),
                },
                Command {
                    id: Some(2),
                    description: "sphinx-build -b html".to_string(),
                    command: None,
                    output: "Running Sphinx v7.2\nbuild succeeded.".to_string(),
                    exit_code: if success { Some(0) } else { None },
                    run_time: Some(40),
                },
            ]),
            output: None,
            setup: None,
            setup_error: None,
            project: Some("pip".to_string()),
            version: Some("latest".to_string()),
            date: None,
            builder: None,
        }
    }

    fn draw(vm: &BuildViewModel) -> String {
        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
        terminal.draw(|f| render(f, vm)).unwrap();
        let buffer = terminal.backend().buffer();
        let area = buffer.area;
        (0..area.height)
            .map(|y| {
                (0..area.width)
                    .map(|x| buffer.cell((x, y)).map_or(" ", |c| c.symbol()))
                    .collect::<String>()
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn empty_state_renders_placeholder() {
        let screen = draw(&make_vm());
        assert!(screen.contains("Waiting for the first snapshot"));
    }

    #[test]
    fn running_build_hides_docs_link() {
        let mut vm = make_vm();
        vm.ingest(make_build("building", false));
        let screen = draw(&vm);
        assert!(screen.contains("pip"));
        assert!(screen.contains("building"));
        assert!(screen.contains("git clone"));
        assert!(screen.contains("build succeeded."));
        assert!(!screen.contains("pip.example.org"));
    }

    #[test]
    fn finished_build_shows_docs_link() {
        let mut vm = make_vm();
        vm.ingest(make_build("finished", true));
        let screen = draw(&vm);
        assert!(screen.contains("passed"));
        assert!(screen.contains("pip.example.org"));
        assert!(screen.contains("took 1m 3s"));
    }

    #[test]
    fn banners_render_separately() {
        let mut vm = make_vm();
        let mut build = make_build("finished", false);
        build.error = Some("Sphinx exited with status 2".to_string());
        vm.ingest(build);
        vm.set_fatal("build 24011 not found".to_string());
        let screen = draw(&vm);
        assert!(screen.contains("Sphinx exited with status 2"));
        assert!(screen.contains("polling stopped: build 24011 not found"));
    }

    #[test]
    fn overlay_draws_on_top() {
        let mut vm = make_vm();
        vm.ingest(make_build("building", false));
        vm.cursor = 1;
        assert!(vm.open_output_overlay());
        let screen = draw(&vm);
        assert!(screen.contains("sphinx-build -b html"));
        assert!(screen.contains("Running Sphinx v7.2"));
    }
}
