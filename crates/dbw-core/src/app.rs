//! View model: the single source of truth for what the terminal renders.
//!
//! Server state arrives only through [`BuildViewModel::ingest`] (initial snapshot)
//! and [`BuildViewModel::apply`] (polled snapshots carrying a fetch sequence number).
//! Everything the renderer needs is derived from that state by [`BuildViewModel::view`];
//! the only user-driven mutations of build presentation are
//! [`BuildViewModel::toggle_command`] and [`BuildViewModel::show_legacy_output`].
//! After each change, subscribers are told which [`Region`]s are affected.

use crate::model::{Build, BuildId, BuildState, Command, CommandStatus};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::time::Instant;

pub const DEFAULT_POLL_INTERVAL: u64 = 5;
pub const DEFAULT_MAX_RETRIES: u32 = 5;

pub const NOTIFICATION_TTL_SECS: u64 = 5;
/// Must match the length of `BRAILLE_FRAMES` in `tui::spinner`.
pub const SPINNER_FRAME_COUNT: usize = 10;
/// Below 60 cols, run times and key hints don't fit; switch to the compact layout.
pub const NARROW_WIDTH_THRESHOLD: u16 = 60;
/// Long enough to read; short enough to not permanently obscure the command list.
pub const ERROR_TTL_SECS: u64 = 10;
/// Tail of an expanded command's output shown inline. The overlay shows all of it.
pub const INLINE_OUTPUT_LINES: usize = 12;
/// Keeps tail. Prevents OOM on huge build logs.
pub const OVERLAY_MAX_LINES: usize = 5000;

/// Parts of the screen that a state change can affect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    /// State label, result, commit, length, docs link.
    Status,
    ErrorBanner,
    FatalNotice,
    /// The whole command list (or legacy section) changed shape.
    Commands,
    Command(usize),
    LegacyOutput,
}

const ALL_BUILD_REGIONS: [Region; 4] = [
    Region::Status,
    Region::ErrorBanner,
    Region::Commands,
    Region::LegacyOutput,
];

/// Identity used to remember a user's expand/collapse choice across snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum CommandKey {
    Id(u64),
    Index(usize),
}

fn command_key(index: usize, command: &Command) -> CommandKey {
    command.id.map_or(CommandKey::Index(index), CommandKey::Id)
}

/// Running commands and the last command start expanded; everything else collapsed.
fn default_expanded(commands: &[Command], index: usize) -> bool {
    index + 1 == commands.len()
        || commands
            .get(index)
            .is_some_and(|c| c.status() == CommandStatus::Running)
}

fn changed_regions(old: &Build, new: &Build) -> Vec<Region> {
    let mut regions = Vec::new();

    let status = |b: &Build| {
        (
            b.state.clone(),
            b.success,
            b.commit.clone(),
            b.commit_url.clone(),
            b.length,
            b.docs_url.clone(),
            b.project.clone(),
            b.version.clone(),
            b.date,
            b.builder.clone(),
        )
    };
    if status(old) != status(new) {
        regions.push(Region::Status);
    }
    if old.error_message() != new.error_message() {
        regions.push(Region::ErrorBanner);
    }

    let (old_cmds, new_cmds) = (old.commands(), new.commands());
    if old.is_legacy() != new.is_legacy() || old_cmds.len() != new_cmds.len() {
        regions.push(Region::Commands);
    } else {
        regions.extend(
            old_cmds
                .iter()
                .zip(new_cmds)
                .enumerate()
                .filter(|(_, (a, b))| a != b)
                .map(|(i, _)| Region::Command(i)),
        );
    }

    if old.output != new.output || old.setup != new.setup || old.setup_error != new.setup_error {
        regions.push(Region::LegacyOutput);
    }
    regions
}

// ── Derived presentation ──

#[derive(Debug, Clone, PartialEq)]
pub struct BuildView<'a> {
    pub build_id: Option<&'a BuildId>,
    pub state_label: &'a str,
    pub finished: bool,
    pub cancelled: bool,
    pub success: bool,
    pub project: Option<&'a str>,
    pub version: Option<&'a str>,
    pub commit: Option<&'a str>,
    pub length: Option<u64>,
    pub started: Option<DateTime<Utc>>,
    pub builder: Option<&'a str>,
    /// Only populated for finished, successful builds.
    pub docs_url: Option<&'a str>,
    /// Build-domain error reported by the server.
    pub error_banner: Option<&'a str>,
    /// Transport-domain failure; polling has stopped.
    pub fatal_notice: Option<&'a str>,
    pub body: Body<'a>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Body<'a> {
    /// Nothing ingested yet.
    Empty,
    Legacy(LegacyView<'a>),
    Commands(Vec<CommandView<'a>>),
}

/// Blobs are `Some` only once the disclosure has been used.
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyView<'a> {
    pub disclosure_button: bool,
    pub setup: Option<&'a str>,
    pub setup_error: Option<&'a str>,
    pub output: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommandView<'a> {
    pub index: usize,
    pub description: &'a str,
    pub status: CommandStatus,
    /// `Some` only when the command is expanded.
    pub detail: Option<CommandDetail<'a>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommandDetail<'a> {
    pub output: &'a str,
    pub run_time: Option<u64>,
    pub exit_code: Option<i32>,
}

// ── Front-end state ──

#[derive(Debug, Clone)]
pub struct Notification {
    pub message: String,
    pub timestamp: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OverlaySource {
    Command(CommandKey),
    Legacy,
}

pub struct OutputOverlay {
    pub title: String,
    pub lines: Vec<String>,
    pub scroll: usize,
    source: OverlaySource,
}

/// Immutable configuration set at startup.
pub struct AppConfig {
    pub build_id: BuildId,
    pub version_string: String,
}

type Subscriber = Box<dyn FnMut(&[Region]) + Send>;

pub struct BuildViewModel {
    pub config: AppConfig,

    build: Option<Build>,
    last_seq: Option<u64>,
    /// User toggles only. Commands without an entry use `default_expanded`.
    expanded_overrides: HashMap<CommandKey, bool>,
    legacy_output_visible: bool,
    fatal: Option<String>,
    subscribers: Vec<Subscriber>,

    // Navigation
    pub cursor: usize,

    // Polling
    pub next_poll_in: u64,
    pub poll_interval: u64,
    pub polling_stopped: bool,

    // Transient UI
    pub notifications: Vec<Notification>,
    error: Option<(String, Instant)>,
    pub spinner_frame: usize,
    pub should_quit: bool,
    overlay: Option<OutputOverlay>,

    pub desktop_notify: bool,
}

impl BuildViewModel {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            build: None,
            last_seq: None,
            expanded_overrides: HashMap::new(),
            legacy_output_visible: false,
            fatal: None,
            subscribers: Vec::new(),
            cursor: 0,
            next_poll_in: 0,
            poll_interval: DEFAULT_POLL_INTERVAL,
            polling_stopped: false,
            notifications: Vec::new(),
            error: None,
            spinner_frame: 0,
            should_quit: false,
            overlay: None,
            desktop_notify: true,
        }
    }

    /// Register a callback invoked after every state change with the affected regions.
    pub fn subscribe(&mut self, callback: impl FnMut(&[Region]) + Send + 'static) {
        self.subscribers.push(Box::new(callback));
    }

    fn publish(&mut self, regions: &[Region]) {
        for subscriber in &mut self.subscribers {
            subscriber(regions);
        }
    }

    // --- Snapshot ingestion ---

    /// Apply an unsequenced snapshot, such as the one supplied at startup.
    pub fn ingest(&mut self, build: Build) {
        self.replace(build);
    }

    /// Apply a polled snapshot. Returns `false` when it was discarded because a
    /// logically later fetch has already been applied.
    pub fn apply(&mut self, seq: u64, build: Build) -> bool {
        if let Some(last) = self.last_seq {
            if seq <= last {
                tracing::debug!(seq, last, "discarding out-of-order snapshot");
                return false;
            }
        }
        self.last_seq = Some(seq);
        self.replace(build)
    }

    fn replace(&mut self, next: Build) -> bool {
        let regions = match &self.build {
            Some(current) if current.id == next.id => {
                if current.state.is_terminal() && !next.state.is_terminal() {
                    tracing::warn!(
                        build_id = %next.id,
                        state = next.state.label(),
                        "ignoring snapshot that leaves a terminal state"
                    );
                    return false;
                }
                changed_regions(current, &next)
            }
            Some(_) => {
                // Different build: per-command UI state belongs to the old one.
                self.expanded_overrides.clear();
                self.cursor = 0;
                ALL_BUILD_REGIONS.to_vec()
            }
            None => ALL_BUILD_REGIONS.to_vec(),
        };

        self.prune_overrides(next.commands());
        self.build = Some(next);
        self.clamp_cursor();
        self.refresh_overlay();

        if !regions.is_empty() {
            self.publish(&regions);
        }
        true
    }

    /// Drop toggles for commands that are no longer in the list. Keyed commands
    /// keep their toggle wherever they moved; keyless ones are reset by position.
    fn prune_overrides(&mut self, commands: &[Command]) {
        let live_ids: HashSet<u64> = commands.iter().filter_map(|c| c.id).collect();
        self.expanded_overrides.retain(|key, _| match *key {
            CommandKey::Id(id) => live_ids.contains(&id),
            CommandKey::Index(i) => commands.get(i).is_some_and(|c| c.id.is_none()),
        });
    }

    pub fn last_seq(&self) -> Option<u64> {
        self.last_seq
    }

    pub fn build(&self) -> Option<&Build> {
        self.build.as_ref()
    }

    pub fn commands(&self) -> &[Command] {
        self.build.as_ref().map_or(&[], Build::commands)
    }

    // --- Derived fields ---

    pub fn finished(&self) -> bool {
        self.build.as_ref().is_some_and(|b| b.state.is_terminal())
    }

    pub fn cancelled(&self) -> bool {
        self.build
            .as_ref()
            .is_some_and(|b| b.state == BuildState::Cancelled)
    }

    pub fn success(&self) -> bool {
        self.finished() && self.build.as_ref().is_some_and(|b| b.success)
    }

    pub fn docs_url(&self) -> Option<&str> {
        let build = self.build.as_ref()?;
        if build.state == BuildState::Finished && build.success {
            build.docs_url.as_deref().filter(|u| !u.is_empty())
        } else {
            None
        }
    }

    pub fn is_legacy(&self) -> bool {
        self.build.as_ref().is_some_and(Build::is_legacy)
    }

    // --- User actions ---

    pub fn is_expanded(&self, index: usize) -> bool {
        let commands = self.commands();
        let Some(command) = commands.get(index) else {
            return false;
        };
        self.expanded_overrides
            .get(&command_key(index, command))
            .copied()
            .unwrap_or_else(|| default_expanded(commands, index))
    }

    /// Flip the detail view of one command. Out-of-range indices are ignored.
    pub fn toggle_command(&mut self, index: usize) {
        if self.is_legacy() {
            return;
        }
        let Some(command) = self.commands().get(index) else {
            return;
        };
        let key = command_key(index, command);
        let expanded = !self.is_expanded(index);
        self.expanded_overrides.insert(key, expanded);
        self.publish(&[Region::Command(index)]);
    }

    pub fn toggle_current(&mut self) {
        self.toggle_command(self.cursor);
    }

    /// One-way: once shown, legacy output stays visible for this view model.
    pub fn show_legacy_output(&mut self) {
        if !self.legacy_output_visible {
            self.legacy_output_visible = true;
            self.publish(&[Region::LegacyOutput]);
        }
    }

    pub fn legacy_output_visible(&self) -> bool {
        self.legacy_output_visible
    }

    // --- Transport failures ---

    /// Record that polling gave up. Not dismissible.
    pub fn set_fatal(&mut self, message: String) {
        self.fatal = Some(message);
        self.polling_stopped = true;
        self.publish(&[Region::FatalNotice]);
    }

    pub fn fatal_notice(&self) -> Option<&str> {
        self.fatal.as_deref()
    }

    // --- Presentation ---

    pub fn view(&self) -> BuildView<'_> {
        let build = self.build.as_ref();
        let body = match build {
            None => Body::Empty,
            Some(b) if b.is_legacy() => {
                let visible = self.legacy_output_visible;
                Body::Legacy(LegacyView {
                    disclosure_button: !visible,
                    setup: b.setup.as_deref().filter(|_| visible),
                    setup_error: b.setup_error.as_deref().filter(|_| visible),
                    output: b.output.as_deref().filter(|_| visible),
                })
            }
            Some(b) => Body::Commands(
                b.commands()
                    .iter()
                    .enumerate()
                    .map(|(index, c)| CommandView {
                        index,
                        description: c.label(),
                        status: c.status(),
                        detail: self.is_expanded(index).then_some(CommandDetail {
                            output: &c.output,
                            run_time: c.run_time,
                            exit_code: c.exit_code,
                        }),
                    })
                    .collect(),
            ),
        };

        BuildView {
            build_id: build.map(|b| &b.id),
            state_label: build.map_or("waiting", |b| b.state.label()),
            finished: self.finished(),
            cancelled: self.cancelled(),
            success: self.success(),
            project: build.and_then(|b| b.project.as_deref()),
            version: build.and_then(|b| b.version.as_deref()),
            commit: build.and_then(|b| b.commit.as_deref()),
            length: build.and_then(|b| b.length),
            started: build.and_then(|b| b.date),
            builder: build.and_then(|b| b.builder.as_deref()),
            docs_url: self.docs_url(),
            error_banner: build.and_then(Build::error_message),
            fatal_notice: self.fatal_notice(),
            body,
        }
    }

    // --- Navigation ---

    pub fn move_cursor_up(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
        }
    }

    pub fn move_cursor_down(&mut self) {
        let len = self.commands().len();
        if len > 0 && self.cursor < len - 1 {
            self.cursor += 1;
        }
    }

    /// Jump to a command by position. Out-of-range indices are ignored.
    pub fn select(&mut self, index: usize) {
        if index < self.commands().len() {
            self.cursor = index;
        }
    }

    fn clamp_cursor(&mut self) {
        let len = self.commands().len();
        if self.cursor >= len {
            self.cursor = len.saturating_sub(1);
        }
    }

    // --- Notifications and errors ---

    pub fn add_notification(&mut self, message: String) {
        self.notifications.push(Notification {
            message,
            timestamp: Instant::now(),
        });
    }

    pub fn prune_notifications(&mut self) {
        let now = Instant::now();
        self.notifications
            .retain(|n| now.duration_since(n.timestamp).as_secs() < NOTIFICATION_TTL_SECS);
    }

    pub fn advance_spinner(&mut self) {
        self.spinner_frame = (self.spinner_frame + 1) % SPINNER_FRAME_COUNT;
    }

    pub fn set_error(&mut self, msg: String) {
        self.error = Some((msg, Instant::now()));
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    pub fn prune_error(&mut self) {
        if let Some((_, ts)) = &self.error {
            if ts.elapsed().as_secs() >= ERROR_TTL_SECS {
                self.error = None;
            }
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error.as_ref().map(|(msg, _)| msg.as_str())
    }

    // --- Output overlay ---

    pub fn overlay(&self) -> Option<&OutputOverlay> {
        self.overlay.as_ref()
    }

    pub fn has_overlay(&self) -> bool {
        self.overlay.is_some()
    }

    /// Full output of the command under the cursor, or the legacy log once revealed.
    /// Returns `false` when there is nothing to show.
    pub fn open_output_overlay(&mut self) -> bool {
        let source = if self.is_legacy() {
            if !self.legacy_output_visible {
                return false;
            }
            OverlaySource::Legacy
        } else {
            let Some(command) = self.commands().get(self.cursor) else {
                return false;
            };
            OverlaySource::Command(command_key(self.cursor, command))
        };
        let Some((title, text)) = self.overlay_text(source) else {
            return false;
        };
        self.overlay = Some(OutputOverlay {
            title,
            lines: overlay_lines(&text),
            scroll: 0,
            source,
        });
        true
    }

    fn overlay_text(&self, source: OverlaySource) -> Option<(String, String)> {
        let build = self.build.as_ref()?;
        match source {
            OverlaySource::Legacy => {
                let text = [&build.setup, &build.setup_error, &build.output]
                    .into_iter()
                    .filter_map(|blob| blob.as_deref())
                    .collect::<Vec<_>>()
                    .join("\n");
                Some((format!("Build #{} output", build.id), text))
            }
            OverlaySource::Command(key) => {
                let commands = build.commands();
                let command = commands
                    .iter()
                    .enumerate()
                    .find(|(i, c)| command_key(*i, c) == key)
                    .map(|(_, c)| c)?;
                Some((command.label().to_string(), command.output.clone()))
            }
        }
    }

    /// Keep an open overlay in sync with the latest snapshot; close it when its
    /// command disappeared.
    fn refresh_overlay(&mut self) {
        let Some(source) = self.overlay.as_ref().map(|o| o.source) else {
            return;
        };
        match self.overlay_text(source) {
            Some((_, text)) => {
                if let Some(overlay) = self.overlay.as_mut() {
                    overlay.lines = overlay_lines(&text);
                    let max_scroll = overlay.lines.len().saturating_sub(1);
                    overlay.scroll = overlay.scroll.min(max_scroll);
                }
            }
            None => self.overlay = None,
        }
    }

    pub fn close_overlay(&mut self) {
        self.overlay = None;
    }

    pub fn scroll_overlay_up(&mut self, amount: usize) {
        if let Some(overlay) = self.overlay.as_mut() {
            overlay.scroll = overlay.scroll.saturating_sub(amount);
        }
    }

    pub fn scroll_overlay_down(&mut self, amount: usize, visible_height: usize) {
        if let Some(overlay) = self.overlay.as_mut() {
            let max_scroll = overlay.lines.len().saturating_sub(visible_height);
            overlay.scroll = (overlay.scroll + amount).min(max_scroll);
        }
    }

    pub fn scroll_overlay_to_top(&mut self) {
        if let Some(overlay) = self.overlay.as_mut() {
            overlay.scroll = 0;
        }
    }

    pub fn scroll_overlay_to_bottom(&mut self, visible_height: usize) {
        if let Some(overlay) = self.overlay.as_mut() {
            overlay.scroll = overlay.lines.len().saturating_sub(visible_height);
        }
    }
}

fn overlay_lines(text: &str) -> Vec<String> {
    let lines: Vec<String> = text.lines().map(str::to_string).collect();
    if lines.len() > OVERLAY_MAX_LINES {
        lines[lines.len() - OVERLAY_MAX_LINES..].to_vec()
    } else {
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::{Arc, Mutex};

    fn make_command(id: Option<u64>, description: &str, exit_code: Option<i32>) -> Command {
        Command {
            id,
            description: description.to_string(),
            command: None,
            output: format!("output of {description}"),
            exit_code,
            run_time: exit_code.map(|_| 3),
        }
    }

    fn make_build(id: &str, state: &str, commands: Vec<Command>) -> Build {
        Build {
            id: BuildId::new(id),
            state: BuildState::from(state.to_string()),
            success: false,
            commit: Some("a1b2c3d".to_string()),
            commit_url: None,
            length: None,
            docs_url: None,
            error: None,
            commands: Some(commands),
            output: None,
            setup: None,
            setup_error: None,
            project: Some("docs".to_string()),
            version: Some("latest".to_string()),
            date: None,
            builder: None,
        }
    }

    fn legacy_build(id: &str) -> Build {
        let mut build = make_build(id, "finished", vec![]);
        build.commands = None;
        build.success = true;
        build.setup = Some("creating virtualenv".to_string());
        build.output = Some("building html\nbuild succeeded".to_string());
        build
    }

    fn three_commands() -> Vec<Command> {
        vec![
            make_command(Some(10), "git clone", Some(0)),
            make_command(Some(11), "pip install", Some(0)),
            make_command(Some(12), "sphinx-build", None),
        ]
    }

    fn view_model() -> BuildViewModel {
        BuildViewModel::new(AppConfig {
            build_id: BuildId::new("1"),
            version_string: String::new(),
        })
    }

    fn recorded(vm: &mut BuildViewModel) -> Arc<Mutex<Vec<Vec<Region>>>> {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        vm.subscribe(move |regions| sink.lock().unwrap().push(regions.to_vec()));
        log
    }

    // --- Derived state ---

    #[test]
    fn nothing_ingested_is_empty_and_unfinished() {
        let vm = view_model();
        let view = vm.view();
        assert_eq!(view.body, Body::Empty);
        assert_eq!(view.state_label, "waiting");
        assert!(!vm.finished());
        assert!(!vm.success());
    }

    #[test]
    fn in_progress_is_not_finished() {
        let mut vm = view_model();
        vm.ingest(make_build("1", "installing", three_commands()));
        assert!(!vm.finished());
        assert!(!vm.cancelled());
        assert_eq!(vm.view().state_label, "installing");
    }

    #[test]
    fn success_is_false_until_finished() {
        let mut vm = view_model();
        let mut build = make_build("1", "building", three_commands());
        build.success = true;
        vm.ingest(build);
        assert!(!vm.success());
    }

    #[test]
    fn cancelled_is_finished_and_cancelled() {
        let mut vm = view_model();
        vm.ingest(make_build("1", "cancelled", three_commands()));
        assert!(vm.finished());
        assert!(vm.cancelled());
        assert!(!vm.success());
    }

    #[test]
    fn finished_never_reverts_for_same_build() {
        let mut vm = view_model();
        let states = ["triggered", "cloning", "building", "finished"];
        for (seq, state) in states.iter().enumerate() {
            assert!(!vm.finished());
            vm.apply(seq as u64 + 1, make_build("1", state, three_commands()));
        }
        assert!(vm.finished());
        assert!(!vm.apply(10, make_build("1", "building", three_commands())));
        assert!(vm.finished());
    }

    // --- Docs link gating ---

    #[test]
    fn docs_link_hidden_while_building() {
        let mut vm = view_model();
        let mut build = make_build("1", "building", vec![]);
        build.docs_url = Some("https://x".to_string());
        vm.ingest(build);
        assert_eq!(vm.view().docs_url, None);
    }

    #[test]
    fn docs_link_shown_when_finished_successfully() {
        let mut vm = view_model();
        let mut build = make_build("1", "finished", vec![]);
        build.success = true;
        build.docs_url = Some("https://x".to_string());
        vm.ingest(build);
        assert_eq!(vm.view().docs_url, Some("https://x"));
    }

    #[test]
    fn docs_link_hidden_when_finished_unsuccessfully() {
        let mut vm = view_model();
        let mut build = make_build("1", "finished", vec![]);
        build.docs_url = Some("https://x".to_string());
        vm.ingest(build);
        assert_eq!(vm.view().docs_url, None);
    }

    // --- Ingestion ---

    #[test]
    fn ingest_is_idempotent() {
        let build = make_build("1", "building", three_commands());

        let mut once = view_model();
        once.ingest(build.clone());

        let mut twice = view_model();
        twice.ingest(build.clone());
        twice.ingest(build);

        assert_eq!(once.view(), twice.view());
        assert_eq!(once.finished(), twice.finished());
    }

    #[test]
    fn reingest_keeps_user_toggles() {
        let build = make_build("1", "building", three_commands());
        let mut vm = view_model();
        vm.ingest(build.clone());
        vm.toggle_command(0);
        assert!(vm.is_expanded(0));
        vm.ingest(build);
        assert!(vm.is_expanded(0));
        assert!(!vm.is_expanded(1));
    }

    #[test]
    fn identical_snapshot_publishes_nothing() {
        let build = make_build("1", "building", three_commands());
        let mut vm = view_model();
        vm.ingest(build.clone());
        let log = recorded(&mut vm);
        vm.ingest(build);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn out_of_order_response_is_discarded() {
        let first = make_build("1", "cloning", three_commands()[..1].to_vec());
        let second = make_build("1", "building", three_commands());

        let mut only_second = view_model();
        only_second.apply(2, second.clone());

        let mut vm = view_model();
        assert!(vm.apply(2, second));
        assert!(!vm.apply(1, first));

        assert_eq!(vm.view(), only_second.view());
        assert_eq!(vm.last_seq(), Some(2));
    }

    #[test]
    fn repeated_sequence_number_is_discarded() {
        let mut vm = view_model();
        assert!(vm.apply(1, make_build("1", "cloning", vec![])));
        assert!(!vm.apply(1, make_build("1", "building", vec![])));
        assert_eq!(vm.view().state_label, "cloning");
    }

    #[test]
    fn publishes_only_changed_command() {
        let mut vm = view_model();
        vm.ingest(make_build("1", "building", three_commands()));
        let log = recorded(&mut vm);

        let mut commands = three_commands();
        commands[2].output.push_str("\nreading sources... [ 50%]");
        vm.ingest(make_build("1", "building", commands));

        assert_eq!(*log.lock().unwrap(), vec![vec![Region::Command(2)]]);
    }

    #[test]
    fn new_command_publishes_list_change() {
        let mut vm = view_model();
        vm.ingest(make_build("1", "building", three_commands()[..2].to_vec()));
        let log = recorded(&mut vm);
        vm.ingest(make_build("1", "building", three_commands()));
        assert_eq!(*log.lock().unwrap(), vec![vec![Region::Commands]]);
    }

    #[test]
    fn state_and_error_changes_publish_their_regions() {
        let mut vm = view_model();
        vm.ingest(make_build("1", "building", three_commands()));
        let log = recorded(&mut vm);

        let mut build = make_build("1", "finished", three_commands());
        build.error = Some("Sphinx exited with status 2".to_string());
        vm.ingest(build);

        assert_eq!(
            *log.lock().unwrap(),
            vec![vec![Region::Status, Region::ErrorBanner]]
        );
    }

    // --- Expand / collapse ---

    #[test]
    fn running_and_last_commands_start_expanded() {
        let mut vm = view_model();
        let mut commands = three_commands();
        commands[2].exit_code = Some(0);
        commands.insert(1, make_command(Some(20), "still running", None));
        vm.ingest(make_build("1", "building", commands));
        assert!(!vm.is_expanded(0));
        assert!(vm.is_expanded(1));
        assert!(!vm.is_expanded(2));
        assert!(vm.is_expanded(3));
    }

    #[test]
    fn toggle_twice_restores_flag() {
        let mut vm = view_model();
        vm.ingest(make_build("1", "building", three_commands()));
        for index in 0..3 {
            let original = vm.is_expanded(index);
            vm.toggle_command(index);
            assert_ne!(vm.is_expanded(index), original);
            vm.toggle_command(index);
            assert_eq!(vm.is_expanded(index), original);
        }
    }

    #[test]
    fn toggle_out_of_range_is_noop() {
        let mut vm = view_model();
        vm.ingest(make_build("1", "building", three_commands()));
        let log = recorded(&mut vm);
        let before = format!("{:?}", vm.view());
        vm.toggle_command(99);
        assert_eq!(format!("{:?}", vm.view()), before);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn toggle_publishes_command_region() {
        let mut vm = view_model();
        vm.ingest(make_build("1", "building", three_commands()));
        let log = recorded(&mut vm);
        vm.toggle_command(1);
        assert_eq!(*log.lock().unwrap(), vec![vec![Region::Command(1)]]);
    }

    #[test]
    fn collapsed_command_hides_details() {
        let mut vm = view_model();
        vm.ingest(make_build("1", "building", three_commands()));
        let Body::Commands(commands) = vm.view().body else {
            panic!("expected command list");
        };
        assert_eq!(commands.len(), 3);
        assert_eq!(commands[0].description, "git clone");
        assert!(commands[0].detail.is_none());
        let detail = commands[2].detail.as_ref().expect("last command expanded");
        assert_eq!(detail.output, "output of sphinx-build");
        assert_eq!(detail.exit_code, None);
    }

    #[test]
    fn previous_last_command_collapses_when_next_arrives() {
        let mut vm = view_model();
        let mut commands = three_commands();
        commands[2].exit_code = Some(0);
        vm.ingest(make_build("1", "building", commands.clone()));
        assert!(vm.is_expanded(2));
        commands.push(make_command(Some(13), "upload", None));
        vm.ingest(make_build("1", "uploading", commands));
        assert!(!vm.is_expanded(2));
        assert!(vm.is_expanded(3));
    }

    #[test]
    fn regression_keeps_toggles_by_identity() {
        let mut vm = view_model();
        vm.ingest(make_build("1", "building", three_commands()));
        vm.toggle_command(1); // pip install, id 11
        assert!(vm.is_expanded(1));

        // Server drops the first command; pip install moves to index 0.
        let shorter = three_commands()[1..].to_vec();
        vm.ingest(make_build("1", "building", shorter));
        assert_eq!(vm.commands().len(), 2);
        assert!(vm.is_expanded(0));
    }

    #[test]
    fn regression_resets_keyless_toggles_by_index() {
        let keyless = |desc: &str| make_command(None, desc, Some(0));
        let mut vm = view_model();
        vm.ingest(make_build(
            "1",
            "building",
            vec![keyless("a"), keyless("b"), keyless("c")],
        ));
        vm.toggle_command(0);
        vm.toggle_command(2); // last → collapsed
        assert!(vm.is_expanded(0));
        assert!(!vm.is_expanded(2));

        vm.ingest(make_build("1", "building", vec![keyless("a"), keyless("b")]));
        assert!(vm.is_expanded(0));
        assert!(vm.is_expanded(1)); // new last, default

        vm.ingest(make_build(
            "1",
            "building",
            vec![keyless("a"), keyless("b"), keyless("c")],
        ));
        // The toggle for removed index 2 was dropped, so it is back to default.
        assert!(vm.is_expanded(2));
    }

    #[test]
    fn regression_clamps_cursor() {
        let mut vm = view_model();
        vm.ingest(make_build("1", "building", three_commands()));
        vm.cursor = 2;
        vm.ingest(make_build("1", "building", three_commands()[..1].to_vec()));
        assert_eq!(vm.cursor, 0);
    }

    #[test]
    fn different_build_resets_toggles() {
        let mut vm = view_model();
        vm.ingest(make_build("1", "finished", three_commands()));
        vm.toggle_command(0);
        vm.ingest(make_build("2", "building", three_commands()));
        assert!(!vm.is_expanded(0));
        assert!(!vm.finished());
    }

    // --- Legacy shape ---

    #[test]
    fn legacy_build_never_shows_command_list() {
        let mut vm = view_model();
        vm.ingest(legacy_build("1"));
        match vm.view().body {
            Body::Legacy(legacy) => {
                assert!(legacy.disclosure_button);
                assert_eq!(legacy.output, None);
                assert_eq!(legacy.setup, None);
            }
            other => panic!("expected legacy body, got {other:?}"),
        }
    }

    #[test]
    fn structured_build_never_shows_disclosure() {
        let mut vm = view_model();
        vm.ingest(make_build("1", "finished", three_commands()));
        vm.show_legacy_output();
        assert!(matches!(vm.view().body, Body::Commands(_)));
    }

    #[test]
    fn show_legacy_output_reveals_blobs_and_latches() {
        let mut vm = view_model();
        vm.ingest(legacy_build("1"));
        vm.show_legacy_output();
        vm.show_legacy_output();
        vm.ingest(legacy_build("1"));
        assert!(vm.legacy_output_visible());
        match vm.view().body {
            Body::Legacy(legacy) => {
                assert!(!legacy.disclosure_button);
                assert_eq!(legacy.setup, Some("creating virtualenv"));
                assert_eq!(legacy.output, Some("building html\nbuild succeeded"));
                assert_eq!(legacy.setup_error, None);
            }
            other => panic!("expected legacy body, got {other:?}"),
        }
    }

    #[test]
    fn legacy_latch_publishes_once() {
        let mut vm = view_model();
        vm.ingest(legacy_build("1"));
        let log = recorded(&mut vm);
        vm.show_legacy_output();
        vm.show_legacy_output();
        assert_eq!(*log.lock().unwrap(), vec![vec![Region::LegacyOutput]]);
    }

    #[test]
    fn toggle_ignored_for_legacy_build() {
        let mut vm = view_model();
        vm.ingest(legacy_build("1"));
        let log = recorded(&mut vm);
        vm.toggle_command(0);
        assert!(log.lock().unwrap().is_empty());
    }

    // --- Banners ---

    #[test]
    fn error_banner_independent_of_result() {
        for (state, success) in [("building", false), ("finished", true), ("finished", false)] {
            let mut vm = view_model();
            let mut build = make_build("1", state, vec![]);
            build.success = success;
            build.error = Some("Config file not found".to_string());
            vm.ingest(build);
            assert_eq!(vm.view().error_banner, Some("Config file not found"));
        }
    }

    #[test]
    fn empty_error_has_no_banner() {
        let mut vm = view_model();
        let mut build = make_build("1", "finished", vec![]);
        build.error = Some(String::new());
        vm.ingest(build);
        assert_eq!(vm.view().error_banner, None);
    }

    #[test]
    fn fatal_notice_is_separate_from_build_error() {
        let mut vm = view_model();
        let mut build = make_build("1", "building", vec![]);
        build.error = Some("build error".to_string());
        vm.ingest(build);
        let log = recorded(&mut vm);
        vm.set_fatal("build 1 not found".to_string());

        let view = vm.view();
        assert_eq!(view.error_banner, Some("build error"));
        assert_eq!(view.fatal_notice, Some("build 1 not found"));
        assert!(vm.polling_stopped);
        assert_eq!(*log.lock().unwrap(), vec![vec![Region::FatalNotice]]);
    }

    // --- Cursor ---

    #[test]
    fn cursor_moves_within_commands() {
        let mut vm = view_model();
        vm.ingest(make_build("1", "building", three_commands()));
        vm.move_cursor_up();
        assert_eq!(vm.cursor, 0);
        vm.move_cursor_down();
        vm.move_cursor_down();
        vm.move_cursor_down();
        assert_eq!(vm.cursor, 2);
    }

    #[test]
    fn cursor_down_on_empty_state() {
        let mut vm = view_model();
        vm.move_cursor_down();
        assert_eq!(vm.cursor, 0);
    }

    #[test]
    fn select_ignores_out_of_range() {
        let mut vm = view_model();
        vm.ingest(make_build("1", "building", three_commands()));
        vm.select(2);
        assert_eq!(vm.cursor, 2);
        vm.select(3);
        assert_eq!(vm.cursor, 2);
    }

    #[test]
    fn toggle_current_uses_cursor() {
        let mut vm = view_model();
        vm.ingest(make_build("1", "building", three_commands()));
        vm.move_cursor_down();
        vm.toggle_current();
        assert!(vm.is_expanded(1));
    }

    // --- Overlay ---

    #[test]
    fn overlay_follows_growing_output() {
        let mut vm = view_model();
        vm.ingest(make_build("1", "building", three_commands()));
        vm.cursor = 2;
        assert!(vm.open_output_overlay());
        assert_eq!(vm.overlay().unwrap().lines, vec!["output of sphinx-build"]);

        let mut commands = three_commands();
        commands[2].output.push_str("\nbuild succeeded");
        vm.ingest(make_build("1", "building", commands));
        assert_eq!(vm.overlay().unwrap().lines.len(), 2);
    }

    #[test]
    fn overlay_closes_when_command_disappears() {
        let mut vm = view_model();
        vm.ingest(make_build("1", "building", three_commands()));
        vm.cursor = 2;
        assert!(vm.open_output_overlay());
        vm.ingest(make_build("1", "building", three_commands()[..2].to_vec()));
        assert!(!vm.has_overlay());
    }

    #[test]
    fn legacy_overlay_requires_disclosure() {
        let mut vm = view_model();
        vm.ingest(legacy_build("1"));
        assert!(!vm.open_output_overlay());
        vm.show_legacy_output();
        assert!(vm.open_output_overlay());
        assert_eq!(
            vm.overlay().unwrap().lines,
            vec!["creating virtualenv", "building html", "build succeeded"]
        );
    }

    #[test]
    fn overlay_scroll_is_clamped() {
        let mut vm = view_model();
        let mut commands = three_commands();
        commands[0].output = (0..50).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n");
        vm.ingest(make_build("1", "building", commands));
        assert!(vm.open_output_overlay());
        vm.scroll_overlay_down(100, 10);
        assert_eq!(vm.overlay().unwrap().scroll, 40);
        vm.scroll_overlay_up(5);
        assert_eq!(vm.overlay().unwrap().scroll, 35);
        vm.scroll_overlay_to_top();
        assert_eq!(vm.overlay().unwrap().scroll, 0);
        vm.scroll_overlay_to_bottom(10);
        assert_eq!(vm.overlay().unwrap().scroll, 40);
    }

    #[test]
    fn error_lifecycle() {
        let mut vm = view_model();
        assert!(vm.error_message().is_none());
        vm.set_error("could not open browser".to_string());
        assert_eq!(vm.error_message(), Some("could not open browser"));
        vm.clear_error();
        assert!(vm.error_message().is_none());
    }
}
