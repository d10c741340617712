use chrono::{DateTime, Utc};
use regex::{Regex, RegexBuilder};
use tracing::{debug, warn};

use redmon_core::FilterConfig;
use state_store::{Analytics, FilterStage};

/// How the keyword policy judged a piece of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeywordOutcome {
    /// An exclusion keyword occurred; inclusion keywords were never consulted.
    Excluded,
    /// At least one inclusion keyword matched, listed in configuration order.
    Matched(Vec<String>),
    NoMatch,
}

struct CompiledKeyword {
    keyword: String,
    pattern: Regex,
}

/// Inclusion patterns compiled once at configuration load. In literal mode
/// each keyword becomes a case-insensitive whole-word pattern; in regex mode
/// the keyword is compiled as written, and an invalid pattern is escaped and
/// matched literally after a one-time warning.
pub struct KeywordMatcher {
    includes: Vec<CompiledKeyword>,
    excludes: Vec<String>,
}

impl KeywordMatcher {
    pub fn compile(config: &FilterConfig) -> Self {
        let includes = config
            .keywords
            .iter()
            .map(|keyword| {
                let pattern = if config.regex_keywords {
                    match case_insensitive(keyword) {
                        Ok(re) => re,
                        Err(e) => {
                            warn!(
                                keyword = %keyword,
                                error = %e,
                                "invalid regex keyword, matching it as a literal"
                            );
                            literal(keyword)
                        }
                    }
                } else {
                    word_boundary(keyword)
                };
                CompiledKeyword {
                    keyword: keyword.clone(),
                    pattern,
                }
            })
            .collect();
        Self {
            includes,
            excludes: config.exclusion_keywords.clone(),
        }
    }

    /// Evaluate `text` against the keyword policy. Exclusion takes precedence
    /// over inclusion unconditionally. Matching keywords each bump their own
    /// counter; an exclusion bumps the excluded-by-keywords stage counter.
    pub fn evaluate(
        &self,
        text: &str,
        analytics: &mut Analytics,
        now: DateTime<Utc>,
    ) -> KeywordOutcome {
        if text.is_empty() {
            return KeywordOutcome::NoMatch;
        }

        let lower = text.to_lowercase();
        if let Some(hit) = self.excludes.iter().find(|ex| lower.contains(ex.as_str())) {
            debug!(keyword = %hit, "excluded by keyword");
            analytics.bump(FilterStage::ExcludedKeyword);
            return KeywordOutcome::Excluded;
        }

        let mut matched = Vec::new();
        for compiled in &self.includes {
            if compiled.pattern.is_match(text) {
                matched.push(compiled.keyword.clone());
                analytics.record_keyword_hit(&compiled.keyword, now);
            }
        }

        if matched.is_empty() {
            KeywordOutcome::NoMatch
        } else {
            analytics.bump(FilterStage::KeywordMatch);
            KeywordOutcome::Matched(matched)
        }
    }
}

fn case_insensitive(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern).case_insensitive(true).build()
}

fn literal(keyword: &str) -> Regex {
    case_insensitive(&regex::escape(keyword)).expect("escaped literal always compiles")
}

fn word_boundary(keyword: &str) -> Regex {
    case_insensitive(&format!(r"\b{}\b", regex::escape(keyword)))
        .expect("escaped literal always compiles")
}
