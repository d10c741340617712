use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use redmon_core::{Post, StateError};

/// Match-log retention. Entries older than this are pruned on every update.
pub const MATCH_RETENTION_DAYS: i64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRecord {
    pub timestamp: DateTime<Utc>,
    pub post_id: String,
    pub subreddit: String,
    pub title: String,
    pub author: String,
    pub score: i64,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created_utc: DateTime<Utc>,
    pub matched_keywords: Vec<String>,
    pub url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CounterStat {
    pub count: u64,
    pub last_match: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserStat {
    pub count: u64,
    pub last_post: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterStats {
    pub total_posts_checked: u64,
    pub keyword_matches: u64,
    pub excluded_by_keywords: u64,
    pub excluded_by_user_quality: u64,
    pub excluded_by_score: u64,
    pub excluded_by_deduplication: u64,
}

/// Which pipeline stage a counter bump belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterStage {
    Checked,
    KeywordMatch,
    ExcludedKeyword,
    ExcludedQuality,
    ExcludedScore,
    ExcludedDedup,
}

/// The persisted analytics document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalyticsState {
    #[serde(default)]
    pub matches: Vec<MatchRecord>,
    #[serde(default)]
    pub keywords_stats: HashMap<String, CounterStat>,
    #[serde(default)]
    pub subreddit_stats: HashMap<String, CounterStat>,
    #[serde(default)]
    pub user_stats: HashMap<String, UserStat>,
    #[serde(default)]
    pub filter_stats: FilterStats,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

/// Aggregate figures for the run-end log line, computed from a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub total_posts_checked: u64,
    pub total_matches: usize,
    pub matches_last_7_days: usize,
    /// Matches found per post checked, as a percentage.
    pub filter_efficiency: f64,
    pub avg_daily_matches: f64,
}

/// Running counters and the rolling 30-day match log. Counters only ever go
/// up; they are loaded from the persisted document and never reset implicitly.
#[derive(Debug)]
pub struct Analytics {
    path: PathBuf,
    state: AnalyticsState,
}

impl Analytics {
    /// Load from `path`, falling back to an empty default when the file is
    /// absent or unreadable.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let state = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<AnalyticsState>(&raw) {
                Ok(state) => {
                    debug!(matches = state.matches.len(), "loaded analytics");
                    state
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "unreadable analytics, starting fresh");
                    AnalyticsState::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => AnalyticsState::default(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not read analytics, starting fresh");
                AnalyticsState::default()
            }
        };
        Self { path, state }
    }

    pub fn bump(&mut self, stage: FilterStage) {
        let stats = &mut self.state.filter_stats;
        match stage {
            FilterStage::Checked => stats.total_posts_checked += 1,
            FilterStage::KeywordMatch => stats.keyword_matches += 1,
            FilterStage::ExcludedKeyword => stats.excluded_by_keywords += 1,
            FilterStage::ExcludedQuality => stats.excluded_by_user_quality += 1,
            FilterStage::ExcludedScore => stats.excluded_by_score += 1,
            FilterStage::ExcludedDedup => stats.excluded_by_deduplication += 1,
        }
    }

    /// Bump one inclusion keyword's counter. An item matching several keywords
    /// contributes to each of their counters.
    pub fn record_keyword_hit(&mut self, keyword: &str, now: DateTime<Utc>) {
        let stat = self
            .state
            .keywords_stats
            .entry(keyword.to_string())
            .or_default();
        stat.count += 1;
        stat.last_match = Some(now);
    }

    /// Append a match to the log, update per-subreddit and per-author
    /// counters, then prune the log to the retention window.
    pub fn record_match(
        &mut self,
        post: &Post,
        subreddit: &str,
        matched_keywords: &[String],
        now: DateTime<Utc>,
    ) {
        self.state.matches.push(MatchRecord {
            timestamp: now,
            post_id: post.id.clone(),
            subreddit: subreddit.to_string(),
            title: post.title.clone(),
            author: post.author_or_unknown().to_string(),
            score: post.score,
            created_utc: post.created_utc,
            matched_keywords: matched_keywords.to_vec(),
            url: post.url(),
        });

        let sub = self
            .state
            .subreddit_stats
            .entry(subreddit.to_string())
            .or_default();
        sub.count += 1;
        sub.last_match = Some(now);

        let user = self
            .state
            .user_stats
            .entry(post.author_or_unknown().to_string())
            .or_default();
        user.count += 1;
        user.last_post = Some(now);

        let cutoff = now - chrono::Duration::days(MATCH_RETENTION_DAYS);
        self.state.matches.retain(|m| m.timestamp > cutoff);
    }

    /// Read-only view of the current state, for reporting.
    pub fn snapshot(&self) -> &AnalyticsState {
        &self.state
    }

    pub fn summary(&self, now: DateTime<Utc>) -> RunSummary {
        let seven_days_ago = now - chrono::Duration::days(7);
        let recent = self
            .state
            .matches
            .iter()
            .filter(|m| m.timestamp > seven_days_ago)
            .count();
        let checked = self.state.filter_stats.total_posts_checked;
        let total = self.state.matches.len();
        RunSummary {
            total_posts_checked: checked,
            total_matches: total,
            matches_last_7_days: recent,
            filter_efficiency: if checked > 0 {
                total as f64 / checked as f64 * 100.0
            } else {
                0.0
            },
            avg_daily_matches: recent as f64 / 7.0,
        }
    }

    /// Persist the document, stamping `last_updated`. Temp-file-and-rename, so
    /// readers never see a partial write.
    pub fn save(&mut self, now: DateTime<Utc>) -> Result<(), StateError> {
        self.state.last_updated = Some(now);
        let body =
            serde_json::to_string_pretty(&self.state).map_err(|e| StateError::WriteFailed {
                path: self.path.display().to_string(),
                reason: e.to_string(),
            })?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, body).map_err(|e| StateError::WriteFailed {
            path: tmp.display().to_string(),
            reason: e.to_string(),
        })?;
        fs::rename(&tmp, &self.path).map_err(|e| StateError::WriteFailed {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use std::env;

    fn temp_path() -> PathBuf {
        env::temp_dir().join(format!("test_analytics_{}.json", uuid::Uuid::new_v4()))
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 15, 12, 0, 0).unwrap()
    }

    fn post(id: &str, author: Option<&str>) -> Post {
        Post {
            id: id.to_string(),
            title: "Free tickets".to_string(),
            body: "spare pair".to_string(),
            author: author.map(str::to_string),
            subreddit: "glasgow".to_string(),
            permalink: format!("/r/glasgow/comments/{id}"),
            created_utc: now() - Duration::hours(2),
            score: 5,
        }
    }

    #[test]
    fn missing_file_loads_default() {
        let analytics = Analytics::load(temp_path());
        assert!(analytics.snapshot().matches.is_empty());
        assert_eq!(analytics.snapshot().filter_stats.total_posts_checked, 0);
    }

    #[test]
    fn record_match_updates_subreddit_and_user_stats() {
        let mut analytics = Analytics::load(temp_path());
        analytics.record_match(&post("a1", Some("alice")), "glasgow", &["free ticket".into()], now());
        analytics.record_match(&post("a2", Some("alice")), "glasgow", &["giveaway".into()], now());

        let state = analytics.snapshot();
        assert_eq!(state.matches.len(), 2);
        assert_eq!(state.subreddit_stats["glasgow"].count, 2);
        assert_eq!(state.user_stats["alice"].count, 2);
        assert_eq!(state.user_stats["alice"].last_post, Some(now()));
    }

    #[test]
    fn deleted_author_is_counted_as_unknown() {
        let mut analytics = Analytics::load(temp_path());
        analytics.record_match(&post("a1", None), "glasgow", &["free ticket".into()], now());
        assert_eq!(analytics.snapshot().user_stats["unknown"].count, 1);
        assert_eq!(analytics.snapshot().matches[0].author, "unknown");
    }

    #[test]
    fn match_log_is_pruned_to_thirty_days() {
        let mut analytics = Analytics::load(temp_path());
        analytics.record_match(
            &post("old", Some("alice")),
            "glasgow",
            &["free ticket".into()],
            now() - Duration::days(31),
        );
        analytics.record_match(&post("new", Some("bob")), "glasgow", &["giveaway".into()], now());

        let ids: Vec<_> = analytics
            .snapshot()
            .matches
            .iter()
            .map(|m| m.post_id.as_str())
            .collect();
        assert_eq!(ids, vec!["new"]);
        // Counters are untouched by pruning.
        assert_eq!(analytics.snapshot().subreddit_stats["glasgow"].count, 2);
    }

    #[test]
    fn keyword_hits_accumulate_per_keyword() {
        let mut analytics = Analytics::load(temp_path());
        analytics.record_keyword_hit("free ticket", now());
        analytics.record_keyword_hit("free ticket", now() + Duration::minutes(1));
        analytics.record_keyword_hit("giveaway", now());

        let state = analytics.snapshot();
        assert_eq!(state.keywords_stats["free ticket"].count, 2);
        assert_eq!(
            state.keywords_stats["free ticket"].last_match,
            Some(now() + Duration::minutes(1))
        );
        assert_eq!(state.keywords_stats["giveaway"].count, 1);
    }

    #[test]
    fn counters_survive_save_and_load() {
        let path = temp_path();
        let mut analytics = Analytics::load(&path);
        analytics.bump(FilterStage::Checked);
        analytics.bump(FilterStage::Checked);
        analytics.bump(FilterStage::ExcludedDedup);
        analytics.record_match(&post("a1", Some("alice")), "glasgow", &["giveaway".into()], now());
        analytics.save(now()).unwrap();

        let reloaded = Analytics::load(&path);
        let stats = &reloaded.snapshot().filter_stats;
        assert_eq!(stats.total_posts_checked, 2);
        assert_eq!(stats.excluded_by_deduplication, 1);
        assert_eq!(reloaded.snapshot().matches.len(), 1);
        assert_eq!(reloaded.snapshot().last_updated, Some(now()));

        fs::remove_file(&path).ok();
    }

    #[test]
    fn summary_computes_efficiency_and_recency() {
        let mut analytics = Analytics::load(temp_path());
        for _ in 0..10 {
            analytics.bump(FilterStage::Checked);
        }
        analytics.record_match(
            &post("old", Some("a")),
            "glasgow",
            &["giveaway".into()],
            now() - Duration::days(10),
        );
        analytics.record_match(&post("new", Some("b")), "glasgow", &["giveaway".into()], now());

        let summary = analytics.summary(now());
        assert_eq!(summary.total_posts_checked, 10);
        assert_eq!(summary.total_matches, 2);
        assert_eq!(summary.matches_last_7_days, 1);
        assert!((summary.filter_efficiency - 20.0).abs() < f64::EPSILON);
        assert!((summary.avg_daily_matches - 1.0 / 7.0).abs() < f64::EPSILON);
    }

    #[test]
    fn summary_with_nothing_checked_has_zero_efficiency() {
        let analytics = Analytics::load(temp_path());
        let summary = analytics.summary(now());
        assert_eq!(summary.filter_efficiency, 0.0);
        assert_eq!(summary.avg_daily_matches, 0.0);
    }
}
