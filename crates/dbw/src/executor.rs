use async_trait::async_trait;
use color_eyre::eyre::{eyre, Result};
use dbw_core::error::FetchError;
use dbw_core::model::BuildId;
use dbw_core::traits::StatusEndpoint;
use reqwest::{StatusCode, Url};
use std::time::Duration;

const USER_AGENT: &str = concat!("dbw/", env!("CARGO_PKG_VERSION"));

/// Fetches build resources over HTTP(S).
pub struct HttpEndpoint {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpEndpoint {
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self> {
        if base_url.cannot_be_a_base() {
            return Err(eyre!("Endpoint {base_url} cannot take a build id path"));
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| eyre!("Failed to build HTTP client: {e}"))?;
        Ok(Self { client, base_url })
    }
}

/// `{base}/{id}/`, tolerating a trailing slash on `base`. The id is one encoded path
/// segment.
pub fn build_url(base_url: &Url, id: &BuildId) -> Url {
    let mut url = base_url.clone();
    // Bases that cannot take path segments are rejected by `HttpEndpoint::new`
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.pop_if_empty().push(id.as_str()).push("");
    }
    url
}

/// Map a non-success HTTP status to a fetch error.
pub fn classify_status(status: StatusCode, id: &BuildId) -> FetchError {
    if status == StatusCode::NOT_FOUND {
        FetchError::NotFound(id.clone())
    } else if status.is_server_error() {
        FetchError::Transient(format!("server error: {status}"))
    } else {
        FetchError::Transient(format!("unexpected response: {status}"))
    }
}

fn classify_reqwest_error(e: &reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Transient("request timed out".to_string())
    } else if e.is_connect() {
        FetchError::Transient(format!("connection failed: {e}"))
    } else {
        FetchError::Transient(format!("request failed: {e}"))
    }
}

#[async_trait]
impl StatusEndpoint for HttpEndpoint {
    async fn fetch_build(&self, id: &BuildId) -> Result<String, FetchError> {
        let start = std::time::Instant::now();
        let url = build_url(&self.base_url, id);
        let response = self
            .client
            .get(url.clone())
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(%url, %status, "build fetch rejected");
            return Err(classify_status(status, id));
        }

        let body = response
            .text()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;

        tracing::debug!(
            %url,
            elapsed_ms = start.elapsed().as_millis(),
            bytes = body.len(),
            "build fetched"
        );
        Ok(body)
    }

    fn open_in_browser(&self, url: &str) -> Result<()> {
        open_in_browser_impl(url)
    }
}

fn open_in_browser_impl(url: &str) -> Result<()> {
    use std::process::{Command, Stdio};

    // Only hand http(s) URLs from the server to the OS opener
    if !url.starts_with("https://") && !url.starts_with("http://") {
        return Err(eyre!("Refusing to open non-HTTP URL: {url}"));
    }

    if cfg!(target_os = "windows") {
        // Empty "" title parameter keeps the URL from being read as a window title
        return Command::new("cmd")
            .args(["/C", "start", "", url])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map(|_| ())
            .map_err(|e| eyre!("Failed to open browser: {e}"));
    }

    let cmds: &[&str] = if cfg!(target_os = "macos") {
        &["open"]
    } else if std::env::var_os("WSL_DISTRO_NAME").is_some() {
        &["wslview", "xdg-open"]
    } else {
        &["xdg-open"]
    };

    for cmd in cmds {
        match Command::new(cmd)
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(_) => return Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(eyre!("Failed to open browser with {cmd}: {e}")),
        }
    }

    Err(eyre!(
        "No browser opener found. On WSL install wslu; on Linux install xdg-utils."
    ))
}
