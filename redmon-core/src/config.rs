use std::collections::{HashMap, HashSet};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

use crate::error::ConfigError;

const DEFAULT_KEYWORDS: &str = "free ticket,cheap ticket,giveaway,free entry,discount";
const DEFAULT_EXCLUSION_KEYWORDS: &str = "sold,taken,gone,closed,no longer available,found";
const DEFAULT_SUBREDDITS: &str = "glasgow,glasgowmarket";
const DEFAULT_LENIENT_SUBREDDITS: &str = "glasgowmarket";
const DEFAULT_PRIORITY_FLAIRS: &str = "glasgow=Ticket share. No adverts, free tickets only";
const DEFAULT_USER_AGENT: &str = "redmon/0.1";

/// Everything the filter pipeline consults. Built once at startup and never
/// mutated afterwards.
#[derive(Debug, Clone)]
pub struct FilterConfig {
    /// Inclusion keywords, in configuration order.
    pub keywords: Vec<String>,
    /// Exclusion keywords, lowercased; matched as plain substrings.
    pub exclusion_keywords: Vec<String>,
    /// When set, inclusion keywords are compiled as regex patterns instead of
    /// word-boundary literals.
    pub regex_keywords: bool,
    pub min_account_age_days: i64,
    pub min_user_karma: i64,
    pub min_post_score: i64,
    /// Jaccard threshold for cross-author deduplication, in [0, 1].
    pub similarity_threshold: f64,
    pub enable_user_filtering: bool,
    pub enable_deduplication: bool,
    /// Base lookback window in days.
    pub days_to_check: i64,
    /// Subreddits whose effective window is doubled.
    pub lenient_subreddits: HashSet<String>,
}

impl FilterConfig {
    /// Effective time window for a subreddit. Lenient subreddits get twice the
    /// base window.
    pub fn effective_window(&self, subreddit: &str) -> chrono::Duration {
        let base = chrono::Duration::hours(self.days_to_check * 24);
        if self.lenient_subreddits.contains(subreddit) {
            base * 2
        } else {
            base
        }
    }
}

#[derive(Debug, Clone)]
pub struct RedditConfig {
    pub client_id: String,
    pub client_secret: String,
    pub user_agent: String,
}

#[derive(Debug, Clone, Default)]
pub struct NotifyConfig {
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
    pub discord_webhook_url: Option<String>,
    pub slack_webhook_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub subreddits: Vec<String>,
    /// subreddit -> flair string for the priority path.
    pub priority_flairs: HashMap<String, String>,
    pub check_interval: Duration,
    pub max_posts_per_run: u32,
    pub filter: FilterConfig,
    pub reddit: RedditConfig,
    pub notify: NotifyConfig,
    pub seen_posts_file: PathBuf,
    pub analytics_file: PathBuf,
}

impl Config {
    /// Build the full configuration from environment variables, applying the
    /// documented defaults. Missing credentials or an empty keyword list are
    /// fatal.
    pub fn from_env() -> Result<Self, ConfigError> {
        let regex_keywords = parse_bool(&var_or("ENABLE_REGEX_KEYWORDS", "false"));

        let mut keywords = parse_list(&var_or("KEYWORDS", DEFAULT_KEYWORDS));
        if !regex_keywords {
            // Literal keywords are matched case-insensitively; normalize once.
            keywords = keywords.into_iter().map(|k| k.to_lowercase()).collect();
        }
        if keywords.is_empty() {
            return Err(ConfigError::ValidationFailed {
                reason: "no keywords specified in KEYWORDS".to_string(),
            });
        }

        let exclusion_keywords = parse_list(&var_or("EXCLUSION_KEYWORDS", DEFAULT_EXCLUSION_KEYWORDS))
            .into_iter()
            .map(|k| k.to_lowercase())
            .collect();

        let filter = FilterConfig {
            keywords,
            exclusion_keywords,
            regex_keywords,
            min_account_age_days: parse_num("MIN_ACCOUNT_AGE_DAYS", 7)?,
            min_user_karma: parse_num("MIN_USER_KARMA", 10)?,
            min_post_score: parse_num("MIN_POST_SCORE", 0)?,
            similarity_threshold: parse_num("SIMILARITY_THRESHOLD", 0.8)?,
            enable_user_filtering: parse_bool(&var_or("ENABLE_USER_FILTERING", "true")),
            enable_deduplication: parse_bool(&var_or("ENABLE_DEDUPLICATION", "true")),
            days_to_check: parse_num("DAYS_TO_CHECK", 7)?,
            lenient_subreddits: parse_list(&var_or("LENIENT_SUBREDDITS", DEFAULT_LENIENT_SUBREDDITS))
                .into_iter()
                .collect(),
        };

        let reddit = RedditConfig {
            client_id: required("REDDIT_CLIENT_ID")?,
            client_secret: required("REDDIT_CLIENT_SECRET")?,
            user_agent: var_or("REDDIT_USER_AGENT", DEFAULT_USER_AGENT),
        };

        let notify = NotifyConfig {
            telegram_bot_token: var_opt("TELEGRAM_BOT_TOKEN"),
            telegram_chat_id: var_opt("TELEGRAM_CHAT_ID"),
            discord_webhook_url: var_opt("DISCORD_WEBHOOK_URL"),
            slack_webhook_url: var_opt("SLACK_WEBHOOK_URL"),
        };

        let check_interval_minutes: u64 = parse_num("CHECK_INTERVAL_MINUTES", 15)?;

        Ok(Self {
            subreddits: parse_list(&var_or("SUBREDDITS", DEFAULT_SUBREDDITS)),
            priority_flairs: parse_flairs(&var_or("PRIORITY_FLAIRS", DEFAULT_PRIORITY_FLAIRS)),
            check_interval: Duration::from_secs(check_interval_minutes * 60),
            max_posts_per_run: parse_num("MAX_POSTS_PER_RUN", 50)?,
            filter,
            reddit,
            notify,
            seen_posts_file: PathBuf::from(var_or("SEEN_POSTS_FILE", "seen_posts.json")),
            analytics_file: PathBuf::from(var_or("ANALYTICS_FILE", "analytics.json")),
        })
    }
}

fn var_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn var_or(key: &str, default: &str) -> String {
    var_opt(key).unwrap_or_else(|| default.to_string())
}

fn required(key: &str) -> Result<String, ConfigError> {
    var_opt(key).ok_or_else(|| ConfigError::MissingEnvironmentVariable {
        var_name: key.to_string(),
    })
}

fn parse_num<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match var_opt(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
            field: key.to_string(),
            value: raw,
        }),
        None => Ok(default),
    }
}

fn parse_bool(raw: &str) -> bool {
    raw.trim().eq_ignore_ascii_case("true")
}

/// Split a comma-separated list, trimming entries and dropping empties.
fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse `subreddit=flair` pairs separated by `;`. Flair strings may contain
/// commas, so the list separator cannot be `,` here. Malformed pairs are
/// dropped with a warning.
fn parse_flairs(raw: &str) -> HashMap<String, String> {
    raw.split(';')
        .filter(|pair| !pair.trim().is_empty())
        .filter_map(|pair| {
            let parsed = pair.split_once('=').and_then(|(sub, flair)| {
                let (sub, flair) = (sub.trim(), flair.trim());
                if sub.is_empty() || flair.is_empty() {
                    None
                } else {
                    Some((sub.to_string(), flair.to_string()))
                }
            });
            if parsed.is_none() {
                warn!(pair, "ignoring malformed subreddit=flair pair");
            }
            parsed
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_list_trims_and_drops_empties() {
        assert_eq!(
            parse_list(" free ticket, giveaway ,,discount"),
            vec!["free ticket", "giveaway", "discount"]
        );
        assert!(parse_list("").is_empty());
    }

    #[test]
    fn parse_flairs_allows_commas_in_flair() {
        let flairs = parse_flairs("glasgow=Ticket share. No adverts, free tickets only");
        assert_eq!(
            flairs.get("glasgow").map(String::as_str),
            Some("Ticket share. No adverts, free tickets only")
        );
    }

    #[test]
    fn parse_flairs_ignores_malformed_pairs() {
        let flairs = parse_flairs("glasgow=A;bad-pair;=no-sub;edinburgh=B;");
        assert_eq!(flairs.len(), 2);
        assert_eq!(flairs.get("glasgow").map(String::as_str), Some("A"));
        assert_eq!(flairs.get("edinburgh").map(String::as_str), Some("B"));
    }

    #[test]
    fn parse_bool_is_case_insensitive() {
        assert!(parse_bool("True"));
        assert!(parse_bool(" true "));
        assert!(!parse_bool("1"));
        assert!(!parse_bool("false"));
    }

    #[test]
    fn lenient_subreddits_double_the_window() {
        let filter = FilterConfig {
            keywords: vec!["free".to_string()],
            exclusion_keywords: vec![],
            regex_keywords: false,
            min_account_age_days: 7,
            min_user_karma: 10,
            min_post_score: 0,
            similarity_threshold: 0.8,
            enable_user_filtering: true,
            enable_deduplication: true,
            days_to_check: 7,
            lenient_subreddits: ["glasgowmarket".to_string()].into_iter().collect(),
        };
        assert_eq!(filter.effective_window("glasgow"), chrono::Duration::days(7));
        assert_eq!(
            filter.effective_window("glasgowmarket"),
            chrono::Duration::days(14)
        );
    }
}
