pub mod distance;
pub mod matcher;
pub mod may_context;
pub mod normalize;
pub mod text_scan;

pub use matcher::SpanMatcher;
pub use text_scan::detect_in_text;
