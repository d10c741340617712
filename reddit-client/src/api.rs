use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use redmon_core::{
    AuthorInfo, MonitorError, Post, PostSource, RedditApiError, RedditConfig,
};

use crate::retry::{RetryConfig, RetryExecutor};

const REDDIT_API_BASE: &str = "https://oauth.reddit.com";
const TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";

/// Refresh the cached token this long before Reddit says it expires.
const TOKEN_SLACK: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Deserialize)]
pub struct Listing<T> {
    pub data: ListingData<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListingData<T> {
    pub children: Vec<ListingChild<T>>,
    pub after: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListingChild<T> {
    pub data: T,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PostData {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub selftext: String,
    pub author: Option<String>,
    pub subreddit: String,
    pub permalink: String,
    pub created_utc: f64,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub link_flair_text: Option<String>,
    #[serde(default)]
    pub stickied: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserData {
    pub name: String,
    pub created_utc: f64,
    pub link_karma: Option<i64>,
    pub comment_karma: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

fn utc_from_epoch(secs: f64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs as i64, 0).unwrap_or_default()
}

impl From<PostData> for Post {
    fn from(data: PostData) -> Self {
        // Reddit reports deleted accounts as the literal string "[deleted]"
        let author = data.author.filter(|name| name != "[deleted]");
        Post {
            id: data.id,
            title: data.title,
            body: data.selftext,
            author,
            subreddit: data.subreddit,
            permalink: data.permalink,
            created_utc: utc_from_epoch(data.created_utc),
            score: data.score,
        }
    }
}

#[derive(Debug)]
struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// Authenticated Reddit API client using application-only OAuth.
#[derive(Debug)]
pub struct RedditClient {
    http: Client,
    config: RedditConfig,
    token: Mutex<Option<CachedToken>>,
    retry: RetryExecutor,
}

impl RedditClient {
    pub fn new(config: RedditConfig) -> Result<Self, MonitorError> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            config,
            token: Mutex::new(None),
            retry: RetryExecutor::new(RetryConfig::reddit()),
        })
    }

    /// Return a valid bearer token, fetching a fresh one when the cached
    /// token is absent or close to expiry.
    async fn access_token(&self) -> Result<String, MonitorError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() {
                return Ok(token.token.clone());
            }
            debug!("Cached Reddit token expired, requesting a new one");
        }

        let response = self
            .http
            .post(TOKEN_URL)
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(RedditApiError::AuthenticationFailed {
                reason: format!("token endpoint returned {}", status),
            }
            .into());
        }
        if !status.is_success() {
            return Err(RedditApiError::ServerError {
                status_code: status.as_u16(),
            }
            .into());
        }

        let token: TokenResponse =
            response
                .json()
                .await
                .map_err(|e| RedditApiError::InvalidResponse {
                    details: format!("token response: {}", e),
                })?;

        let expires_at = Instant::now()
            + Duration::from_secs(token.expires_in).saturating_sub(TOKEN_SLACK);
        info!("Obtained Reddit access token (expires in {}s)", token.expires_in);
        *cached = Some(CachedToken {
            token: token.access_token.clone(),
            expires_at,
        });
        Ok(token.access_token)
    }

    async fn get(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<Response, MonitorError> {
        let token = self.access_token().await?;
        let url = format!("{}{}", REDDIT_API_BASE, endpoint);

        debug!("Reddit API request: GET {}", endpoint);
        let response = match self.http.get(&url).bearer_auth(&token).query(query).send().await
        {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                return Err(RedditApiError::RequestTimeout.into());
            }
            Err(e) => return Err(MonitorError::Network(e)),
        };

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        match status {
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(60);
                warn!("Reddit rate limit hit, retry-after {}s", retry_after);
                Err(RedditApiError::RateLimitExceeded { retry_after }.into())
            }
            StatusCode::UNAUTHORIZED => {
                // Token may have been revoked early; drop it so the next
                // attempt fetches a fresh one.
                *self.token.lock().await = None;
                Err(RedditApiError::InvalidToken.into())
            }
            StatusCode::FORBIDDEN => Err(RedditApiError::Forbidden {
                resource: endpoint.to_string(),
            }
            .into()),
            StatusCode::NOT_FOUND => Err(RedditApiError::NotFound {
                resource: endpoint.to_string(),
            }
            .into()),
            status if status.is_server_error() => Err(RedditApiError::ServerError {
                status_code: status.as_u16(),
            }
            .into()),
            status => Err(RedditApiError::InvalidResponse {
                details: format!("unexpected status {} for {}", status, endpoint),
            }
            .into()),
        }
    }

    async fn fetch_posts(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<Post>, MonitorError> {
        let response = self.get(endpoint, query).await?;
        let listing: Listing<PostData> =
            response
                .json()
                .await
                .map_err(|e| RedditApiError::InvalidResponse {
                    details: format!("post listing: {}", e),
                })?;

        Ok(listing
            .data
            .children
            .into_iter()
            .filter(|child| !child.data.stickied)
            .map(|child| child.data.into())
            .collect())
    }
}

#[async_trait]
impl PostSource for RedditClient {
    async fn new_posts(&self, subreddit: &str, limit: u32) -> Result<Vec<Post>, MonitorError> {
        let endpoint = format!("/r/{}/new", subreddit);
        let query = [("limit", limit.to_string())];
        self.retry
            .execute("fetch_new_posts", || self.fetch_posts(&endpoint, &query))
            .await
    }

    async fn flair_posts(
        &self,
        subreddit: &str,
        flair: &str,
        limit: u32,
    ) -> Result<Vec<Post>, MonitorError> {
        let endpoint = format!("/r/{}/search", subreddit);
        let query = [
            ("q", format!("flair_name:\"{}\"", flair)),
            ("restrict_sr", "true".to_string()),
            ("sort", "new".to_string()),
            ("t", "day".to_string()),
            ("limit", limit.to_string()),
        ];

        let response = self
            .retry
            .execute("search_flair_posts", || self.get(&endpoint, &query))
            .await?;
        let listing: Listing<PostData> =
            response
                .json()
                .await
                .map_err(|e| RedditApiError::InvalidResponse {
                    details: format!("flair search listing: {}", e),
                })?;

        // Flair search is fuzzy; keep only exact flair matches.
        Ok(listing
            .data
            .children
            .into_iter()
            .filter(|child| {
                !child.data.stickied
                    && child.data.link_flair_text.as_deref() == Some(flair)
            })
            .map(|child| child.data.into())
            .collect())
    }

    async fn author_info(&self, username: &str) -> Result<AuthorInfo, MonitorError> {
        let endpoint = format!("/user/{}/about", username);
        let response = self
            .retry
            .execute("fetch_author_info", || self.get(&endpoint, &[]))
            .await?;

        let about: ListingChild<UserData> =
            response
                .json()
                .await
                .map_err(|e| RedditApiError::InvalidResponse {
                    details: format!("user about: {}", e),
                })?;

        Ok(AuthorInfo {
            created_utc: utc_from_epoch(about.data.created_utc),
            link_karma: about.data.link_karma,
            comment_karma: about.data.comment_karma,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_LISTING: &str = r#"{
        "kind": "Listing",
        "data": {
            "after": "t3_abc",
            "children": [
                {
                    "kind": "t3",
                    "data": {
                        "id": "1abc",
                        "title": "Two free tickets for tonight",
                        "selftext": "Can't make it anymore, first come first served",
                        "author": "gig_goer",
                        "subreddit": "glasgow",
                        "permalink": "/r/glasgow/comments/1abc/two_free_tickets/",
                        "created_utc": 1735689600.0,
                        "score": 12,
                        "link_flair_text": "Ticket share. No adverts, free tickets only",
                        "stickied": false
                    }
                },
                {
                    "kind": "t3",
                    "data": {
                        "id": "2def",
                        "title": "Weekly discussion thread",
                        "selftext": "",
                        "author": "AutoModerator",
                        "subreddit": "glasgow",
                        "permalink": "/r/glasgow/comments/2def/weekly/",
                        "created_utc": 1735689700.0,
                        "stickied": true
                    }
                }
            ]
        }
    }"#;

    #[test]
    fn parses_post_listing() {
        let listing: Listing<PostData> = serde_json::from_str(SAMPLE_LISTING).unwrap();
        assert_eq!(listing.data.children.len(), 2);
        assert_eq!(listing.data.after.as_deref(), Some("t3_abc"));

        let first = &listing.data.children[0].data;
        assert_eq!(first.id, "1abc");
        assert_eq!(first.score, 12);
        assert_eq!(
            first.link_flair_text.as_deref(),
            Some("Ticket share. No adverts, free tickets only")
        );
        assert!(!first.stickied);

        // Missing score defaults to 0
        let second = &listing.data.children[1].data;
        assert_eq!(second.score, 0);
        assert!(second.stickied);
    }

    #[test]
    fn converts_post_data_to_post() {
        let listing: Listing<PostData> = serde_json::from_str(SAMPLE_LISTING).unwrap();
        let post: Post = listing.data.children[0].data.clone().into();

        assert_eq!(post.id, "1abc");
        assert_eq!(post.author.as_deref(), Some("gig_goer"));
        assert_eq!(post.created_utc.timestamp(), 1735689600);
        assert_eq!(
            post.url(),
            "https://reddit.com/r/glasgow/comments/1abc/two_free_tickets/"
        );
    }

    #[test]
    fn deleted_author_becomes_none() {
        let data = PostData {
            id: "3ghi".to_string(),
            title: "gone".to_string(),
            selftext: String::new(),
            author: Some("[deleted]".to_string()),
            subreddit: "glasgow".to_string(),
            permalink: "/r/glasgow/comments/3ghi/gone/".to_string(),
            created_utc: 1735689600.0,
            score: 1,
            link_flair_text: None,
            stickied: false,
        };

        let post: Post = data.into();
        assert!(post.author.is_none());
        assert_eq!(post.author_or_unknown(), "unknown");
    }

    #[test]
    fn parses_user_about() {
        let body = r#"{
            "kind": "t2",
            "data": {
                "name": "gig_goer",
                "created_utc": 16000000.0,
                "link_karma": 250,
                "comment_karma": 730
            }
        }"#;
        let about: ListingChild<UserData> = serde_json::from_str(body).unwrap();
        assert_eq!(about.data.name, "gig_goer");
        assert_eq!(about.data.link_karma, Some(250));
    }
}
