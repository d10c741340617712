use std::collections::HashSet;

use tracing::debug;

use crate::quality::Verdict;
use redmon_core::{FilterConfig, Post};
use state_store::SeenStore;

/// Same-author reposts are judged more strictly than cross-author overlap.
pub const SAME_AUTHOR_THRESHOLD: f64 = 0.6;

/// Word-set Jaccard similarity: intersection over union of the lowercase
/// whitespace-delimited tokens. Empty text on either side yields 0.
pub fn jaccard_similarity(a: &str, b: &str) -> f64 {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    let words_a: HashSet<&str> = a.split_whitespace().collect();
    let words_b: HashSet<&str> = b.split_whitespace().collect();
    if words_a.is_empty() || words_b.is_empty() {
        return 0.0;
    }
    let intersection = words_a.intersection(&words_b).count();
    let union = words_a.union(&words_b).count();
    intersection as f64 / union as f64
}

/// Linear scan against every retained seen record; the first record whose
/// similarity strictly exceeds the applicable threshold makes the post a
/// duplicate. History is time-bounded by eviction and per-run batches are
/// small, so O(n) per post is fine.
pub fn check(post: &Post, seen: &SeenStore, config: &FilterConfig) -> Verdict {
    if !config.enable_deduplication {
        return Verdict::Pass;
    }

    let text = post.search_text();
    let author = post.author_or_unknown();

    for (id, record) in seen.records() {
        let threshold = if author == record.author {
            SAME_AUTHOR_THRESHOLD
        } else {
            config.similarity_threshold
        };
        let similarity = jaccard_similarity(&text, &record.text);
        if similarity > threshold {
            debug!(
                post_id = %post.id,
                against = %id,
                similarity,
                threshold,
                "near-duplicate of seen post"
            );
            return Verdict::Exclude;
        }
    }
    Verdict::Pass
}
