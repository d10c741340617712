use redmon_core::{MatchKind, MatchedPost};

/// Telegram rejects messages longer than 4096 characters.
pub const TELEGRAM_MESSAGE_LIMIT: usize = 4096;
/// Leave headroom below the hard limit so HTML tags never get cut mid-entity.
const TELEGRAM_BUDGET: usize = 3800;

/// Discord webhook content is capped at 2000 characters.
pub const DISCORD_MESSAGE_LIMIT: usize = 2000;
/// Discord messages list at most this many posts.
pub const DISCORD_MAX_POSTS: usize = 5;

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", cut)
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn match_label(post: &MatchedPost) -> String {
    match post.match_kind {
        MatchKind::FlairPriority => "priority flair".to_string(),
        MatchKind::Keyword => post.matched_keywords.join(", "),
    }
}

/// Format matches as a Telegram HTML message, trimmed to the message limit.
pub fn telegram_message(posts: &[MatchedPost]) -> String {
    let mut message = format!("\u{1f3ab} <b>{} new match(es) found</b>\n\n", posts.len());

    for post in posts {
        let entry = format!(
            "<b>{}</b>\nr/{} \u{00b7} u/{} \u{00b7} score {}\nmatched: {}\n{}\n\n",
            escape_html(&post.title),
            post.subreddit,
            escape_html(&post.author),
            post.score,
            escape_html(&match_label(post)),
            post.url,
        );
        if message.chars().count() + entry.chars().count() > TELEGRAM_BUDGET {
            message.push_str("\u{2026} and more (message truncated)\n");
            break;
        }
        message.push_str(&entry);
    }

    truncate_chars(&message, TELEGRAM_MESSAGE_LIMIT)
}

/// Format matches for a Discord webhook, listing at most a handful of posts.
pub fn discord_message(posts: &[MatchedPost]) -> String {
    let mut message = format!("\u{1f3ab} **{} new match(es) found**\n", posts.len());

    for post in posts.iter().take(DISCORD_MAX_POSTS) {
        message.push_str(&format!(
            "**{}**\nr/{} \u{00b7} u/{} \u{00b7} matched: {}\n<{}>\n",
            truncate_chars(&post.title, 150),
            post.subreddit,
            post.author,
            match_label(post),
            post.url,
        ));
    }
    if posts.len() > DISCORD_MAX_POSTS {
        message.push_str(&format!(
            "\u{2026} and {} more\n",
            posts.len() - DISCORD_MAX_POSTS
        ));
    }

    truncate_chars(&message, DISCORD_MESSAGE_LIMIT)
}

/// Format matches for a Slack incoming webhook (mrkdwn).
pub fn slack_message(posts: &[MatchedPost]) -> String {
    let mut message = format!(":ticket: *{} new match(es) found*\n", posts.len());

    for post in posts {
        message.push_str(&format!(
            "*{}*\nr/{} \u{00b7} u/{} \u{00b7} matched: {}\n{}\n",
            truncate_chars(&post.title, 150),
            post.subreddit,
            post.author,
            match_label(post),
            post.url,
        ));
    }

    message
}

/// Short error notice sent to every channel when a monitoring run fails.
pub fn error_message(context: &str, error: &str) -> String {
    truncate_chars(
        &format!("\u{26a0} Monitor error during {}: {}", context, error),
        1000,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_post(title: &str) -> MatchedPost {
        MatchedPost {
            id: "1abc".to_string(),
            title: title.to_string(),
            author: "gig_goer".to_string(),
            subreddit: "glasgow".to_string(),
            url: "https://reddit.com/r/glasgow/comments/1abc/".to_string(),
            created_utc: Utc::now(),
            matched_keywords: vec!["free ticket".to_string()],
            match_kind: MatchKind::Keyword,
            score: 7,
        }
    }

    #[test]
    fn telegram_message_escapes_html() {
        let posts = vec![sample_post("Free <b>tickets</b> & more")];
        let message = telegram_message(&posts);
        assert!(message.contains("Free &lt;b&gt;tickets&lt;/b&gt; &amp; more"));
        assert!(message.contains("matched: free ticket"));
    }

    #[test]
    fn telegram_message_stays_under_limit() {
        let posts: Vec<_> = (0..200)
            .map(|i| sample_post(&format!("A very long ticket giveaway title number {}", i)))
            .collect();
        let message = telegram_message(&posts);
        assert!(message.chars().count() <= TELEGRAM_MESSAGE_LIMIT);
        assert!(message.contains("truncated"));
    }

    #[test]
    fn discord_message_lists_at_most_five_posts() {
        let posts: Vec<_> = (0..8).map(|i| sample_post(&format!("Post {}", i))).collect();
        let message = discord_message(&posts);
        assert!(message.contains("Post 4"));
        assert!(!message.contains("Post 5"));
        assert!(message.contains("and 3 more"));
        assert!(message.chars().count() <= DISCORD_MESSAGE_LIMIT);
    }

    #[test]
    fn flair_matches_are_labelled() {
        let mut post = sample_post("Spare ticket");
        post.match_kind = MatchKind::FlairPriority;
        post.matched_keywords = vec!["flair:Ticket share".to_string()];
        let message = slack_message(&[post]);
        assert!(message.contains("matched: priority flair"));
    }

    #[test]
    fn error_message_is_bounded() {
        let long_error = "x".repeat(5000);
        let message = error_message("subreddit sweep", &long_error);
        assert!(message.chars().count() <= 1000);
        assert!(message.starts_with('\u{26a0}'));
    }
}
