pub mod audio;
pub mod config;
pub mod detection;
pub mod error;
pub mod lexicon;
pub mod pipeline;
pub mod redaction;
pub mod report;
pub mod types;
pub mod verification;

pub use config::{BleepConfig, DeidConfig, MatcherConfig, VerifierConfig};
pub use detection::{detect_in_text, SpanMatcher};
pub use error::{DeidError, Stage};
pub use lexicon::LexiconIndex;
pub use pipeline::batch::BatchOutcome;
pub use pipeline::builder::DeidPipelineBuilder;
pub use pipeline::defaults::{JsonTranscriptSource, LexiconDetector};
pub use pipeline::runtime::{ConversationOutput, DeidPipeline};
pub use pipeline::traits::{PiiDetector, Transcriber};
pub use redaction::{BleepRegion, RedactedTranscript, RedactionLogEntry, TextRedactor};
pub use report::{ManifestRow, ProcessingReport};
pub use types::{
    PiiCategory, PiiMatch, TextFinding, TranscriptSegment, TranscriptionResult, WordTimestamp,
};
pub use verification::{VerificationResult, VerificationStatus, Verifier};
