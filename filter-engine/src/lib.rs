pub mod dedupe;
pub mod keyword;
pub mod pipeline;
pub mod quality;

pub use keyword::{KeywordMatcher, KeywordOutcome};
pub use pipeline::{process_post, Outcome};
pub use quality::Verdict;
