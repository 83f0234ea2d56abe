use std::path::PathBuf;
use std::sync::Arc;

use crate::config::DeidConfig;
use crate::error::DeidError;
use crate::pipeline::defaults::{JsonTranscriptSource, LexiconDetector};
use crate::pipeline::runtime::{DeidPipeline, DeidPipelineParts};
use crate::pipeline::traits::{PiiDetector, Transcriber};

pub struct DeidPipelineBuilder {
    config: DeidConfig,
    transcriber: Option<Box<dyn Transcriber>>,
    verification_transcriber: Option<Box<dyn Transcriber>>,
    detector: Option<Box<dyn PiiDetector>>,
}

impl DeidPipelineBuilder {
    pub fn new(config: DeidConfig) -> Self {
        Self {
            config,
            transcriber: None,
            verification_transcriber: None,
            detector: None,
        }
    }

    pub fn with_transcriber(mut self, transcriber: Box<dyn Transcriber>) -> Self {
        self.transcriber = Some(transcriber);
        self
    }

    /// Shorthand for a [`JsonTranscriptSource`] reading `<dir>/<id>.json`.
    pub fn with_transcript_dir(self, dir: impl Into<PathBuf>) -> Self {
        self.with_transcriber(Box::new(JsonTranscriptSource::new(dir)))
    }

    /// Engine used to re-transcribe redacted audio. Defaults to the main
    /// transcriber, which is only allowed when that transcriber listens to the
    /// audio it is given.
    pub fn with_verification_transcriber(mut self, transcriber: Box<dyn Transcriber>) -> Self {
        self.verification_transcriber = Some(transcriber);
        self
    }

    pub fn with_detector(mut self, detector: Box<dyn PiiDetector>) -> Self {
        self.detector = Some(detector);
        self
    }

    pub fn build(self) -> Result<DeidPipeline, DeidError> {
        let transcriber: Arc<dyn Transcriber> = self
            .transcriber
            .map(Arc::from)
            .ok_or_else(|| DeidError::invalid_input("no transcriber configured"))?;
        let verification_transcriber: Arc<dyn Transcriber> = match self.verification_transcriber {
            Some(t) => Arc::from(t),
            None if self.config.verify_audio && !transcriber.listens_to_audio() => {
                return Err(DeidError::invalid_input(
                    "audio verification needs a verification transcriber when transcripts are \
                     read from disk; the stored transcript describes the unredacted audio",
                ));
            }
            None => Arc::clone(&transcriber),
        };

        if self.config.save_outputs {
            for sub in ["audio", "transcripts_raw", "transcripts_deid", "metadata", "qa"] {
                let dir = self.config.output_dir.join(sub);
                std::fs::create_dir_all(&dir)
                    .map_err(|e| DeidError::io("create output directories", e))?;
            }
        }

        let detector = self.detector.unwrap_or_else(|| {
            Box::new(LexiconDetector::new(self.config.matcher.clone()))
        });

        tracing::debug!(
            output_dir = %self.config.output_dir.display(),
            save_outputs = self.config.save_outputs,
            verify_audio = self.config.verify_audio,
            "de-identification pipeline built"
        );

        Ok(DeidPipeline::from_parts(DeidPipelineParts {
            config: self.config,
            transcriber,
            verification_transcriber,
            detector,
        }))
    }
}
