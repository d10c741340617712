use async_trait::async_trait;

use crate::error::MonitorError;
use crate::types::{AuthorInfo, Post};

/// The feed-fetching collaborator. Implementations return a bounded,
/// newest-first batch per call and are restartable on every run.
#[async_trait]
pub trait PostSource: Send + Sync {
    /// Newest submissions in a subreddit, at most `limit` of them.
    async fn new_posts(&self, subreddit: &str, limit: u32) -> Result<Vec<Post>, MonitorError>;

    /// Submissions carrying exactly `flair`, filtered server-side.
    async fn flair_posts(
        &self,
        subreddit: &str,
        flair: &str,
        limit: u32,
    ) -> Result<Vec<Post>, MonitorError>;

    /// Account metadata for the quality filter.
    async fn author_info(&self, username: &str) -> Result<AuthorInfo, MonitorError>;
}
