pub mod analytics;
pub mod seen;

pub use analytics::*;
pub use seen::*;
