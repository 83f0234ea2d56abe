pub mod bleep;
pub mod text;
pub mod tone;

pub use bleep::{calculate_regions, merge_regions, BleepRegion};
pub use text::{RedactedTranscript, RedactionLogEntry, TextRedactor};
pub use tone::{apply_regions, generate_tone};
