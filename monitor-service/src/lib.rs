use std::time::Duration;

use chrono::Utc;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use filter_engine::{process_post, KeywordMatcher, Outcome};
use notifier::Notifier;
use redmon_core::{Config, MatchKind, MatchedPost, MonitorError, Post, PostSource};
use state_store::{Analytics, SeenStore};

/// How many posts one flair search asks for.
const FLAIR_SEARCH_LIMIT: u32 = 20;

/// Delay before restarting the loop after a failed run.
const ERROR_BACKOFF: Duration = Duration::from_secs(60);

/// Drives the whole monitoring cycle: eviction, the priority-flair sweep,
/// the per-subreddit filter pipeline, notification fan-out, and state saves.
pub struct Monitor<S: PostSource> {
    config: Config,
    source: S,
    notifier: Notifier,
    matcher: KeywordMatcher,
    seen: SeenStore,
    analytics: Analytics,
}

impl<S: PostSource> Monitor<S> {
    pub fn new(config: Config, source: S, notifier: Notifier) -> Self {
        let now = Utc::now();
        let matcher = KeywordMatcher::compile(&config.filter);
        let seen = SeenStore::load(&config.seen_posts_file, now);
        let analytics = Analytics::load(&config.analytics_file);
        info!(
            "Monitor ready: {} subreddit(s), {} seen post(s) loaded",
            config.subreddits.len(),
            seen.len()
        );
        Self {
            config,
            source,
            notifier,
            matcher,
            seen,
            analytics,
        }
    }

    /// Run one complete monitoring cycle. Per-subreddit fetch failures are
    /// reported and skipped; the cycle itself keeps going.
    pub async fn run_once(&mut self) -> Result<(), MonitorError> {
        let now = Utc::now();

        let removed = self.seen.cleanup(self.config.filter.days_to_check, now);
        if removed > 0 {
            info!("Evicted {} expired seen record(s)", removed);
            if let Err(e) = self.seen.save(now) {
                warn!("Could not persist seen state after eviction: {}", e);
            }
        }

        let mut matches = Vec::new();

        for (subreddit, flair) in self.config.priority_flairs.clone() {
            match self.flair_sweep(&subreddit, &flair).await {
                Ok(mut flair_matches) => matches.append(&mut flair_matches),
                Err(e) => {
                    error!("Flair sweep for r/{} failed: {}", subreddit, e);
                    self.notifier
                        .notify_error(&format!("flair sweep of r/{}", subreddit), &e.to_string())
                        .await;
                }
            }
        }

        for subreddit in self.config.subreddits.clone() {
            match self.sweep_subreddit(&subreddit).await {
                Ok(mut sub_matches) => matches.append(&mut sub_matches),
                Err(e) => {
                    error!("Sweep of r/{} failed: {}", subreddit, e);
                    self.notifier
                        .notify_error(&format!("sweep of r/{}", subreddit), &e.to_string())
                        .await;
                }
            }
        }

        if matches.is_empty() {
            debug!("No new matches this cycle");
        } else {
            info!("Found {} new match(es)", matches.len());
            let delivered = self.notifier.notify(&matches).await;
            if delivered.is_empty() && self.notifier.channel_count() > 0 {
                warn!("No channel accepted this batch of matches");
            }
        }

        let now = Utc::now();
        if let Err(e) = self.seen.save(now) {
            error!("Could not persist seen state: {}", e);
        }
        if let Err(e) = self.analytics.save(now) {
            error!("Could not persist analytics: {}", e);
        }

        let summary = self.analytics.summary(now);
        info!(
            "Cycle complete: {} checked total, {} matched in the last 7 days, {:.1}% filter efficiency",
            summary.total_posts_checked,
            summary.matches_last_7_days,
            summary.filter_efficiency
        );

        Ok(())
    }

    /// Flair-tagged posts bypass the keyword and quality filters entirely.
    /// They still respect the seen store and the base time window.
    async fn flair_sweep(
        &mut self,
        subreddit: &str,
        flair: &str,
    ) -> Result<Vec<MatchedPost>, MonitorError> {
        let posts = self
            .source
            .flair_posts(subreddit, flair, FLAIR_SEARCH_LIMIT)
            .await?;
        debug!(
            "Flair search on r/{} returned {} post(s)",
            subreddit,
            posts.len()
        );

        let now = Utc::now();
        // The flair path always uses the base window, never the lenient
        // doubling, so reposts in lenient subreddits cannot slip back in.
        let window = chrono::Duration::hours(24 * self.config.filter.days_to_check);

        let mut matches = Vec::new();
        for post in posts {
            if self.seen.has(&post.id) {
                continue;
            }
            if now - post.created_utc > window {
                continue;
            }

            self.seen.record(
                &post.id,
                &post.search_text(),
                post.author_or_unknown(),
                now,
            );

            let matched_keywords = vec![format!("flair:{}", flair)];
            self.analytics.record_match(&post, subreddit, &matched_keywords, now);
            info!(
                "Priority flair match in r/{}: {} (u/{})",
                subreddit,
                post.title,
                post.author_or_unknown()
            );
            matches.push(to_matched(&post, matched_keywords, MatchKind::FlairPriority));
        }

        Ok(matches)
    }

    async fn sweep_subreddit(&mut self, subreddit: &str) -> Result<Vec<MatchedPost>, MonitorError> {
        let posts = self
            .source
            .new_posts(subreddit, self.config.max_posts_per_run)
            .await?;
        debug!("r/{} returned {} new post(s)", subreddit, posts.len());

        let mut matches = Vec::new();
        for post in posts {
            let now = Utc::now();
            let outcome = process_post(
                &post,
                &self.matcher,
                &self.config.filter,
                &self.source,
                &mut self.seen,
                &mut self.analytics,
                now,
            )
            .await;

            // The pipeline records matched posts in analytics itself; here we
            // only collect them for notification.
            if let Outcome::Matched(matched_keywords) = outcome {
                info!(
                    "Keyword match in r/{}: {} (matched: {})",
                    subreddit,
                    post.title,
                    matched_keywords.join(", ")
                );
                matches.push(to_matched(&post, matched_keywords, MatchKind::Keyword));
            }
        }

        Ok(matches)
    }

    /// Run monitoring cycles forever, sleeping the configured interval
    /// between them and backing off briefly after a failed cycle. Stops
    /// cleanly on ctrl-c.
    pub async fn run(&mut self) -> Result<(), MonitorError> {
        info!(
            "Starting continuous monitoring, checking every {:?}",
            self.config.check_interval
        );

        loop {
            let delay = match self.run_once().await {
                Ok(()) => self.config.check_interval,
                Err(e) => {
                    error!("Monitoring cycle failed: {}", e);
                    self.notifier
                        .notify_error("monitoring cycle", &e.to_string())
                        .await;
                    ERROR_BACKOFF
                }
            };

            tokio::select! {
                _ = sleep(delay) => {}
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown requested, saving state");
                    let now = Utc::now();
                    if let Err(e) = self.seen.save(now) {
                        error!("Could not persist seen state on shutdown: {}", e);
                    }
                    if let Err(e) = self.analytics.save(now) {
                        error!("Could not persist analytics on shutdown: {}", e);
                    }
                    return Ok(());
                }
            }
        }
    }
}

fn to_matched(post: &Post, matched_keywords: Vec<String>, match_kind: MatchKind) -> MatchedPost {
    MatchedPost {
        id: post.id.clone(),
        title: post.title.clone(),
        author: post.author_or_unknown().to_string(),
        subreddit: post.subreddit.clone(),
        url: post.url(),
        created_utc: post.created_utc,
        matched_keywords,
        match_kind,
        score: post.score,
    }
}
