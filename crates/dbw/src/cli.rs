use clap::Parser;
use reqwest::Url;
use std::path::PathBuf;

const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "+", env!("BUILD_NUMBER"));

pub const DEFAULT_ENDPOINT: &str = "https://readthedocs.org/api/v2/build";

#[derive(Parser, Debug)]
#[command(name = "dbw", version = VERSION, about = "Documentation build watcher TUI")]
pub struct Cli {
    /// Build to watch
    pub build_id: String,

    /// Base URL of the build-status API; the build is fetched from <ENDPOINT>/<BUILD_ID>/
    #[arg(short, long, default_value = DEFAULT_ENDPOINT, value_parser = validate_endpoint)]
    pub endpoint: Url,

    /// Poll interval in seconds
    #[arg(short, long, default_value_t = 5, value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: u64,

    /// Consecutive failed fetches tolerated before polling stops
    #[arg(short = 'r', long, default_value_t = 5)]
    pub max_retries: u32,

    /// Per-request timeout in seconds
    #[arg(short, long, default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: u64,

    /// Show this build resource (JSON file) before the first poll
    #[arg(short, long)]
    pub snapshot: Option<PathBuf>,

    /// Disable desktop notifications
    #[arg(long)]
    pub no_notify: bool,

    /// Enable verbose logging to $XDG_STATE_HOME/dbw/debug.log
    #[arg(long)]
    pub verbose: bool,
}

/// Accepts absolute http(s) base URLs. Build ids are appended as path segments, so
/// query strings and fragments are rejected. A trailing slash is dropped.
pub fn validate_endpoint(endpoint: &str) -> Result<Url, String> {
    let invalid = |reason: &str| {
        format!("Invalid endpoint '{endpoint}': {reason}. Expected e.g. '{DEFAULT_ENDPOINT}'.")
    };
    let mut url = Url::parse(endpoint).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(invalid("missing host"));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(invalid("query strings and fragments are not allowed"));
    }
    url.path_segments_mut()
        .map_err(|()| invalid("not a base URL"))?
        .pop_if_empty();
    Ok(url)
}

/// Build ids are path segments; anything that would change the URL shape is rejected.
pub fn validate_build_id(id: &str) -> Result<(), String> {
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return Err(format!(
            "Invalid build id '{id}'. Expected letters, digits, '-' or '_'."
        ));
    }
    Ok(())
}
