use crate::error::FetchError;
use crate::model::Build;

pub fn parse_build(json: &str) -> Result<Build, FetchError> {
    let build: Build = serde_json::from_str(json)?;
    Ok(build)
}

/// Takes the last `max_lines` lines of command output.
/// Returns `(text, was_truncated)`.
pub fn tail_lines(raw: &str, max_lines: usize) -> (String, bool) {
    let lines: Vec<&str> = raw.lines().collect();
    if lines.len() > max_lines {
        let truncated = &lines[lines.len() - max_lines..];
        (truncated.join("\n"), true)
    } else {
        (raw.trim_end_matches('\n').to_string(), false)
    }
}
