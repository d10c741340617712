use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A submission as fetched from a feed. Read-only to the filter pipeline.
#[derive(Debug, Clone)]
pub struct Post {
    pub id: String,
    pub title: String,
    pub body: String,
    /// `None` when the account is deleted or suspended.
    pub author: Option<String>,
    pub subreddit: String,
    pub permalink: String,
    pub created_utc: DateTime<Utc>,
    pub score: i64,
}

impl Post {
    /// Title and body concatenated. Used both for keyword search and as the
    /// deduplication fingerprint.
    pub fn search_text(&self) -> String {
        format!("{} {}", self.title, self.body)
    }

    pub fn author_or_unknown(&self) -> &str {
        self.author.as_deref().unwrap_or("unknown")
    }

    pub fn url(&self) -> String {
        format!("https://reddit.com{}", self.permalink)
    }
}

/// Account metadata, fetched lazily for the quality filter.
#[derive(Debug, Clone)]
pub struct AuthorInfo {
    pub created_utc: DateTime<Utc>,
    pub link_karma: Option<i64>,
    pub comment_karma: Option<i64>,
}

impl AuthorInfo {
    /// Combined karma with missing components treated as zero.
    pub fn total_karma(&self) -> i64 {
        self.link_karma.unwrap_or(0) + self.comment_karma.unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Keyword,
    FlairPriority,
}

/// A post that passed the pipeline (or the flair bypass), flattened for the
/// notification channels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchedPost {
    pub id: String,
    pub title: String,
    pub author: String,
    pub subreddit: String,
    pub url: String,
    pub created_utc: DateTime<Utc>,
    pub matched_keywords: Vec<String>,
    pub match_kind: MatchKind,
    pub score: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn post() -> Post {
        Post {
            id: "abc123".to_string(),
            title: "Free tickets".to_string(),
            body: "Two spare for tonight".to_string(),
            author: None,
            subreddit: "glasgow".to_string(),
            permalink: "/r/glasgow/comments/abc123".to_string(),
            created_utc: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            score: 3,
        }
    }

    #[test]
    fn search_text_joins_title_and_body() {
        assert_eq!(post().search_text(), "Free tickets Two spare for tonight");
    }

    #[test]
    fn deleted_author_maps_to_unknown() {
        assert_eq!(post().author_or_unknown(), "unknown");
    }

    #[test]
    fn url_prefixes_permalink() {
        assert_eq!(post().url(), "https://reddit.com/r/glasgow/comments/abc123");
    }

    #[test]
    fn total_karma_treats_missing_components_as_zero() {
        let info = AuthorInfo {
            created_utc: Utc::now(),
            link_karma: Some(7),
            comment_karma: None,
        };
        assert_eq!(info.total_karma(), 7);
    }
}
