pub mod api;
pub mod retry;

pub use api::RedditClient;
pub use retry::{RetryConfig, RetryExecutor};
