use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeidError {
    #[error("input not found: {}", path.display())]
    InputNotFound { path: PathBuf },
    #[error("transcription failed: {message}")]
    Transcription { message: String },
    #[error("transcription timed out after {}s", timeout.as_secs_f64())]
    TranscriptionTimeout { timeout: Duration },
    #[error("audio error while {context}: {message}")]
    Audio {
        context: &'static str,
        message: String,
    },
    #[error("I/O error while {context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON error while {context}: {source}")]
    Json {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("{context}: {message}")]
    Runtime {
        context: &'static str,
        message: String,
    },
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
}

impl DeidError {
    pub(crate) fn io(context: &'static str, source: std::io::Error) -> Self {
        Self::Io { context, source }
    }

    pub(crate) fn json(context: &'static str, source: serde_json::Error) -> Self {
        Self::Json { context, source }
    }

    pub(crate) fn audio(context: &'static str, err: impl fmt::Display) -> Self {
        Self::Audio {
            context,
            message: err.to_string(),
        }
    }

    pub(crate) fn runtime(context: &'static str, err: impl fmt::Display) -> Self {
        Self::Runtime {
            context,
            message: err.to_string(),
        }
    }

    pub(crate) fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub(crate) fn input_not_found(path: impl Into<PathBuf>) -> Self {
        Self::InputNotFound { path: path.into() }
    }

    /// Errors raised by an external speech-to-text engine.
    pub fn transcription(err: impl fmt::Display) -> Self {
        Self::Transcription {
            message: err.to_string(),
        }
    }
}

/// Pipeline stage a per-file failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Transcription,
    Detection,
    TextRedaction,
    AudioRedaction,
    Verification,
    Persistence,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Transcription => "transcription",
            Self::Detection => "detection",
            Self::TextRedaction => "text_redaction",
            Self::AudioRedaction => "audio_redaction",
            Self::Verification => "verification",
            Self::Persistence => "persistence",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
