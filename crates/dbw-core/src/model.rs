//! Build resource as served by the status endpoint.
//!
//! Everything here is a read-only projection of server state. Client-only UI
//! state (which commands are expanded, whether legacy output was revealed) lives
//! in [`crate::app::BuildViewModel`], never on these types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use std::fmt;

/// Format a duration in seconds into a human-readable string (e.g. "2m 5s").
pub fn format_duration(secs: i64) -> String {
    let secs = secs.max(0);
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    }
}

/// Unicode-width-aware truncation with ellipsis.
/// Returns `""` when `max_width` is 0.
pub fn truncate(s: &str, max_width: usize) -> String {
    use unicode_width::UnicodeWidthStr;
    if max_width == 0 {
        return String::new();
    }
    if UnicodeWidthStr::width(s) <= max_width {
        s.to_string()
    } else {
        let mut result = String::new();
        let mut width = 0;
        for c in s.chars() {
            let cw = unicode_width::UnicodeWidthChar::width(c).unwrap_or(0);
            if width + cw + 1 > max_width {
                result.push('\u{2026}');
                break;
            }
            result.push(c);
            width += cw;
        }
        result
    }
}

/// Opaque build identifier. The endpoint may send it as a number or a string;
/// either way it is only ever compared and displayed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BuildId(String);

impl BuildId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BuildId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for BuildId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Number(u64),
            Text(String),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Number(n) => BuildId(n.to_string()),
            RawId::Text(s) => BuildId(s),
        })
    }
}

/// Lifecycle state. Only the two terminal states are known to the client;
/// every other server value is carried verbatim as a progress label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(from = "String")]
pub enum BuildState {
    Finished,
    Cancelled,
    InProgress(String),
}

impl From<String> for BuildState {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "finished" => BuildState::Finished,
            "cancelled" => BuildState::Cancelled,
            _ => BuildState::InProgress(raw),
        }
    }
}

impl BuildState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, BuildState::Finished | BuildState::Cancelled)
    }

    pub fn label(&self) -> &str {
        match self {
            BuildState::Finished => "finished",
            BuildState::Cancelled => "cancelled",
            BuildState::InProgress(label) => label,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    Running,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Command {
    /// Stable key, when the server provides one. Expand state follows it across
    /// snapshots; keyless commands fall back to their position.
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub description: String,
    /// Raw command line. Shown when `description` is blank.
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub output: String,
    #[serde(default)]
    pub exit_code: Option<i32>,
    /// Seconds.
    #[serde(default)]
    pub run_time: Option<u64>,
}

impl Command {
    pub fn label(&self) -> &str {
        if self.description.trim().is_empty() {
            self.command.as_deref().unwrap_or_default()
        } else {
            &self.description
        }
    }

    pub fn status(&self) -> CommandStatus {
        match self.exit_code {
            None => CommandStatus::Running,
            Some(0) => CommandStatus::Succeeded,
            Some(_) => CommandStatus::Failed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Build {
    pub id: BuildId,
    pub state: BuildState,
    #[serde(default, deserialize_with = "null_as_false")]
    pub success: bool,
    #[serde(default)]
    pub commit: Option<String>,
    #[serde(default)]
    pub commit_url: Option<String>,
    /// Elapsed seconds, present once finished.
    #[serde(default)]
    pub length: Option<u64>,
    #[serde(default)]
    pub docs_url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub commands: Option<Vec<Command>>,

    // Legacy shape: builds from before structured commands carry monolithic blobs.
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub setup: Option<String>,
    #[serde(default)]
    pub setup_error: Option<String>,

    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    /// Build start. Unparseable timestamps are dropped rather than failing the
    /// whole snapshot.
    #[serde(default, deserialize_with = "lenient_datetime")]
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub builder: Option<String>,
}

impl Build {
    /// A legacy resource has monolithic output and no structured commands. When
    /// both are present the command list wins.
    pub fn is_legacy(&self) -> bool {
        self.output.is_some() && self.commands.as_ref().is_none_or(Vec::is_empty)
    }

    pub fn commands(&self) -> &[Command] {
        self.commands.as_deref().unwrap_or_default()
    }

    /// `error`, unless it is missing or blank.
    pub fn error_message(&self) -> Option<&str> {
        self.error
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
    }
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn lenient_datetime<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error> {
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .or_else(|_| {
                // Naive timestamps are treated as UTC.
                chrono::NaiveDateTime::parse_from_str(&s, "%Y-%m-%dT%H:%M:%S%.f")
                    .map(|naive| naive.and_utc())
            })
            .ok()
    }))
}

fn null_as_false<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}
