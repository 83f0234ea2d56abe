use std::path::{Path, PathBuf};

use crate::config::MatcherConfig;
use crate::detection::{detect_in_text, SpanMatcher};
use crate::error::DeidError;
use crate::lexicon::LexiconIndex;
use crate::pipeline::traits::{PiiDetector, Transcriber};
use crate::types::{PiiMatch, TextFinding, TranscriptionResult, WordTimestamp};

/// Detector backed by the shared lexicon index.
#[derive(Debug, Clone, Default)]
pub struct LexiconDetector {
    config: MatcherConfig,
}

impl LexiconDetector {
    pub fn new(config: MatcherConfig) -> Self {
        Self { config }
    }

    fn matcher(&self) -> SpanMatcher<'_> {
        SpanMatcher::new(LexiconIndex::shared(), &self.config)
    }
}

impl PiiDetector for LexiconDetector {
    fn detect(&self, words: &[WordTimestamp]) -> Vec<PiiMatch> {
        self.matcher().detect(words)
    }

    fn detect_in_text(&self, text: &str) -> Vec<TextFinding> {
        detect_in_text(text, LexiconIndex::shared(), self.matcher().may_rule())
    }
}

/// Serves transcripts produced ahead of time by an external engine, stored as
/// `<dir>/<audio file stem>.json`.
#[derive(Debug, Clone)]
pub struct JsonTranscriptSource {
    dir: PathBuf,
}

impl JsonTranscriptSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn transcript_path(&self, audio_path: &Path) -> Option<PathBuf> {
        let mut name = audio_path.file_stem()?.to_os_string();
        name.push(".json");
        Some(self.dir.join(name))
    }
}

impl Transcriber for JsonTranscriptSource {
    fn transcribe(&self, audio_path: &Path) -> Result<TranscriptionResult, DeidError> {
        let path = self.transcript_path(audio_path).ok_or_else(|| {
            DeidError::invalid_input(format!(
                "audio path has no file name: {}",
                audio_path.display()
            ))
        })?;
        if !path.exists() {
            return Err(DeidError::input_not_found(path));
        }

        let data = std::fs::read_to_string(&path)
            .map_err(|e| DeidError::transcription(format!("{}: {e}", path.display())))?;
        let mut transcript: TranscriptionResult = serde_json::from_str(&data)
            .map_err(|e| DeidError::transcription(format!("{}: {e}", path.display())))?;

        if transcript.conversation_id.is_empty() {
            transcript.conversation_id = audio_path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
        }
        transcript.audio_path = audio_path.display().to_string();
        // Whisper-style engines emit words with a leading space.
        for segment in &mut transcript.segments {
            segment.text = segment.text.trim().to_string();
            for word in &mut segment.words {
                word.word = word.word.trim().to_string();
            }
        }

        tracing::debug!(
            transcript = %path.display(),
            words = transcript.word_count(),
            "loaded transcript"
        );
        Ok(transcript)
    }

    fn listens_to_audio(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PiiCategory;

    #[test]
    fn lexicon_detector_detect_and_scan_agree() {
        let detector = LexiconDetector::default();
        let words = vec![
            WordTimestamp::new("meet", 0.0, 0.3),
            WordTimestamp::new("in", 0.4, 0.5),
            WordTimestamp::new("Boston", 0.6, 1.0),
        ];
        let matches = detector.detect(&words);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].category, PiiCategory::City);

        let findings = detector.detect_in_text("meet in Boston");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].text, "Boston");
    }

    #[test]
    fn json_source_loads_by_stem() {
        let dir = std::env::temp_dir().join(format!("speech_deid_json_src_{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("create dir");
        let json = r#"{"duration": 2.0, "segments": [
            {"text": "on Monday", "start": 0.0, "end": 1.0,
             "words": [{"word": "on", "start": 0.0, "end": 0.3},
                       {"word": "Monday", "start": 0.4, "end": 1.0}]}]}"#;
        std::fs::write(dir.join("call_01.json"), json).expect("write transcript");

        let source = JsonTranscriptSource::new(&dir);
        let transcript = source
            .transcribe(Path::new("/data/audio/call_01.flac"))
            .expect("transcribe");
        assert_eq!(transcript.conversation_id, "call_01");
        assert_eq!(transcript.audio_path, "/data/audio/call_01.flac");
        assert_eq!(transcript.word_count(), 2);

        let missing = source.transcribe(Path::new("/data/audio/call_02.flac"));
        assert!(matches!(missing, Err(DeidError::InputNotFound { .. })));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn json_source_trims_padded_words() {
        let dir =
            std::env::temp_dir().join(format!("speech_deid_json_pad_{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("create dir");
        let json = r#"{"duration": 2.0, "segments": [
            {"text": " the red car in Utah", "start": 0.0, "end": 2.0,
             "words": [{"word": " the", "start": 0.0, "end": 0.2},
                       {"word": " red", "start": 0.3, "end": 0.6},
                       {"word": " car", "start": 0.7, "end": 1.0},
                       {"word": " in", "start": 1.1, "end": 1.3},
                       {"word": " Utah", "start": 1.4, "end": 2.0}]}]}"#;
        std::fs::write(dir.join("padded.json"), json).expect("write transcript");

        let transcript = JsonTranscriptSource::new(&dir)
            .transcribe(Path::new("padded.wav"))
            .expect("transcribe");
        assert_eq!(transcript.segments[0].text, "the red car in Utah");
        assert_eq!(transcript.all_words()[1].word, "red");

        let matches = LexiconDetector::default().detect(&transcript.all_words());
        let found: Vec<(&str, bool)> = matches
            .iter()
            .map(|m| (m.text.as_str(), m.is_fuzzy))
            .collect();
        assert_eq!(found, vec![("red", false), ("Utah", false)]);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn json_source_reports_malformed_transcripts() {
        let dir =
            std::env::temp_dir().join(format!("speech_deid_json_bad_{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("create dir");
        std::fs::write(dir.join("broken.json"), "{not json").expect("write transcript");

        let result = JsonTranscriptSource::new(&dir).transcribe(Path::new("broken.wav"));
        assert!(matches!(result, Err(DeidError::Transcription { .. })));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
