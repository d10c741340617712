use chrono::{DateTime, Utc};
use tracing::debug;

use crate::dedupe;
use crate::keyword::{KeywordMatcher, KeywordOutcome};
use crate::quality::{self, Verdict};
use redmon_core::{FilterConfig, Post, PostSource};
use state_store::{Analytics, FilterStage, SeenStore};

/// Terminal outcome for one post run through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    AlreadySeen,
    TooOld,
    ExcludedQuality,
    ExcludedScore,
    ExcludedDuplicate,
    ExcludedKeyword,
    NoMatch,
    Matched(Vec<String>),
}

/// Run one post through seen-check, time window, quality, score,
/// deduplication, and keyword matching, in that order. Every post that gets
/// past the first two checks ends with exactly one SeenRecord write,
/// matched or not.
pub async fn process_post<S: PostSource + ?Sized>(
    post: &Post,
    matcher: &KeywordMatcher,
    config: &FilterConfig,
    source: &S,
    seen: &mut SeenStore,
    analytics: &mut Analytics,
    now: DateTime<Utc>,
) -> Outcome {
    analytics.bump(FilterStage::Checked);

    if seen.has(&post.id) {
        return Outcome::AlreadySeen;
    }

    // A too-old post is deliberately not recorded: it stays eligible for
    // re-check on later runs for as long as the fetcher still returns it.
    if now - post.created_utc > config.effective_window(&post.subreddit) {
        debug!(post_id = %post.id, "outside time window");
        return Outcome::TooOld;
    }

    let text = post.search_text();
    let author = post.author_or_unknown().to_string();

    match quality::check_author(post, config, source, now).await {
        Verdict::Exclude => {
            analytics.bump(FilterStage::ExcludedQuality);
            seen.record(&post.id, &text, &author, now);
            return Outcome::ExcludedQuality;
        }
        Verdict::Pass | Verdict::Indeterminate => {}
    }

    if quality::evaluate_score(post, config) == Verdict::Exclude {
        analytics.bump(FilterStage::ExcludedScore);
        seen.record(&post.id, &text, &author, now);
        return Outcome::ExcludedScore;
    }

    if dedupe::check(post, seen, config) == Verdict::Exclude {
        analytics.bump(FilterStage::ExcludedDedup);
        seen.record(&post.id, &text, &author, now);
        return Outcome::ExcludedDuplicate;
    }

    let outcome = matcher.evaluate(&text, analytics, now);
    seen.record(&post.id, &text, &author, now);
    match outcome {
        KeywordOutcome::Excluded => Outcome::ExcludedKeyword,
        KeywordOutcome::NoMatch => Outcome::NoMatch,
        KeywordOutcome::Matched(keywords) => {
            analytics.record_match(post, &post.subreddit, &keywords, now);
            Outcome::Matched(keywords)
        }
    }
}
