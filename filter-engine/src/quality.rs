use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use redmon_core::{AuthorInfo, FilterConfig, Post, PostSource};

/// Outcome of a single filter check. `Indeterminate` means the data needed to
/// decide could not be fetched; callers must treat it as a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Exclude,
    Indeterminate,
}

/// Author-quality check. Disabled filtering passes everything; a deleted or
/// suspended author is excluded unconditionally; a metadata fetch failure
/// fails open.
pub async fn check_author<S: PostSource + ?Sized>(
    post: &Post,
    config: &FilterConfig,
    source: &S,
    now: DateTime<Utc>,
) -> Verdict {
    if !config.enable_user_filtering {
        return Verdict::Pass;
    }
    let Some(author) = post.author.as_deref() else {
        debug!(post_id = %post.id, "author deleted or suspended");
        return Verdict::Exclude;
    };
    match source.author_info(author).await {
        Ok(info) => evaluate_author(&info, config, now),
        Err(e) => {
            warn!(author, error = %e, "could not fetch author metadata, failing open");
            Verdict::Indeterminate
        }
    }
}

/// Pure part of the quality check: account age and combined karma minimums.
pub fn evaluate_author(info: &AuthorInfo, config: &FilterConfig, now: DateTime<Utc>) -> Verdict {
    let age_days = (now - info.created_utc).num_days();
    if age_days < config.min_account_age_days {
        debug!(age_days, min = config.min_account_age_days, "account too young");
        return Verdict::Exclude;
    }
    if info.total_karma() < config.min_user_karma {
        debug!(
            karma = info.total_karma(),
            min = config.min_user_karma,
            "karma below minimum"
        );
        return Verdict::Exclude;
    }
    Verdict::Pass
}

/// Score check. Independent of the user-filtering toggle.
pub fn evaluate_score(post: &Post, config: &FilterConfig) -> Verdict {
    if post.score < config.min_post_score {
        debug!(score = post.score, min = config.min_post_score, "score below minimum");
        Verdict::Exclude
    } else {
        Verdict::Pass
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};
    use redmon_core::{MonitorError, RedditApiError};
    use std::collections::HashSet;

    fn config() -> FilterConfig {
        FilterConfig {
            keywords: vec!["giveaway".to_string()],
            exclusion_keywords: vec![],
            regex_keywords: false,
            min_account_age_days: 7,
            min_user_karma: 10,
            min_post_score: 1,
            similarity_threshold: 0.8,
            enable_user_filtering: true,
            enable_deduplication: true,
            days_to_check: 7,
            lenient_subreddits: HashSet::new(),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 15, 12, 0, 0).unwrap()
    }

    fn post(author: Option<&str>, score: i64) -> Post {
        Post {
            id: "abc".to_string(),
            title: "giveaway".to_string(),
            body: String::new(),
            author: author.map(str::to_string),
            subreddit: "glasgow".to_string(),
            permalink: "/r/glasgow/comments/abc".to_string(),
            created_utc: now() - Duration::hours(1),
            score,
        }
    }

    fn author(age_days: i64, link: Option<i64>, comment: Option<i64>) -> AuthorInfo {
        AuthorInfo {
            created_utc: now() - Duration::days(age_days),
            link_karma: link,
            comment_karma: comment,
        }
    }

    struct StubSource(Result<AuthorInfo, ()>);

    #[async_trait]
    impl PostSource for StubSource {
        async fn new_posts(&self, _: &str, _: u32) -> Result<Vec<Post>, MonitorError> {
            Ok(vec![])
        }
        async fn flair_posts(&self, _: &str, _: &str, _: u32) -> Result<Vec<Post>, MonitorError> {
            Ok(vec![])
        }
        async fn author_info(&self, _: &str) -> Result<AuthorInfo, MonitorError> {
            self.0
                .clone()
                .map_err(|_| MonitorError::RedditApi(RedditApiError::RequestTimeout))
        }
    }

    #[test]
    fn young_account_is_excluded() {
        assert_eq!(
            evaluate_author(&author(3, Some(100), Some(100)), &config(), now()),
            Verdict::Exclude
        );
    }

    #[test]
    fn account_exactly_at_minimum_age_passes() {
        assert_eq!(
            evaluate_author(&author(7, Some(100), Some(100)), &config(), now()),
            Verdict::Pass
        );
    }

    #[test]
    fn karma_sums_with_missing_components_as_zero() {
        // 5 link + nothing = 5, below the minimum of 10.
        assert_eq!(
            evaluate_author(&author(30, Some(5), None), &config(), now()),
            Verdict::Exclude
        );
        assert_eq!(
            evaluate_author(&author(30, Some(5), Some(5)), &config(), now()),
            Verdict::Pass
        );
    }

    #[test]
    fn score_below_minimum_is_excluded() {
        assert_eq!(evaluate_score(&post(Some("a"), 0), &config()), Verdict::Exclude);
        assert_eq!(evaluate_score(&post(Some("a"), 1), &config()), Verdict::Pass);
    }

    #[tokio::test]
    async fn disabled_filtering_passes_even_deleted_authors() {
        let mut cfg = config();
        cfg.enable_user_filtering = false;
        let source = StubSource(Err(()));
        assert_eq!(check_author(&post(None, 5), &cfg, &source, now()).await, Verdict::Pass);
    }

    #[tokio::test]
    async fn deleted_author_is_excluded_unconditionally() {
        let source = StubSource(Ok(author(100, Some(100), Some(100))));
        assert_eq!(
            check_author(&post(None, 5), &config(), &source, now()).await,
            Verdict::Exclude
        );
    }

    #[tokio::test]
    async fn metadata_fetch_failure_is_indeterminate() {
        let source = StubSource(Err(()));
        assert_eq!(
            check_author(&post(Some("alice"), 5), &config(), &source, now()).await,
            Verdict::Indeterminate
        );
    }
}
