use crate::error::FetchError;
use crate::model::BuildId;
use async_trait::async_trait;
use color_eyre::eyre::Result;

/// Read-only access to the build-status endpoint.
#[async_trait]
pub trait StatusEndpoint: Send + Sync {
    /// Raw response body for one build. Schema validation is the parser's job.
    async fn fetch_build(&self, id: &BuildId) -> Result<String, FetchError>;
    fn open_in_browser(&self, url: &str) -> Result<()>;
}
