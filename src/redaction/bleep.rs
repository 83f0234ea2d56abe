use serde::Serialize;

use crate::config::BleepConfig;
use crate::types::PiiMatch;

/// Audio window replaced by a tone. Times are seconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BleepRegion {
    pub start_time: f64,
    pub end_time: f64,
    /// Never below the configured minimum; recomputed whenever regions merge.
    pub bleep_duration: f64,
    pub pii_matches: Vec<PiiMatch>,
}

impl BleepRegion {
    fn new(start_time: f64, end_time: f64, min_duration: f64, pii_matches: Vec<PiiMatch>) -> Self {
        Self {
            start_time,
            end_time,
            bleep_duration: min_duration.max(end_time - start_time),
            pii_matches,
        }
    }

    pub fn span(&self) -> f64 {
        self.end_time - self.start_time
    }
}

/// One padded region per match, clamped to the recording, then merged.
pub fn calculate_regions(
    matches: &[PiiMatch],
    audio_duration: f64,
    config: &BleepConfig,
) -> Vec<BleepRegion> {
    let regions = matches
        .iter()
        .map(|m| {
            let start = (m.start_time - config.padding_before_secs).max(0.0);
            let end = (m.end_time + config.padding_after_secs).min(audio_duration);
            BleepRegion::new(start, end, config.min_bleep_secs, vec![m.clone()])
        })
        .collect();

    let merged = merge_regions(regions, config.merge_gap_secs, config.min_bleep_secs);
    tracing::debug!(
        matches = matches.len(),
        regions = merged.len(),
        "bleep regions calculated"
    );
    merged
}

/// Folds regions that overlap or sit within `min_gap` seconds of each other.
///
/// The result is sorted by start time and pairwise separated by more than
/// `min_gap`, so merging it again returns it unchanged.
pub fn merge_regions(
    mut regions: Vec<BleepRegion>,
    min_gap: f64,
    min_duration: f64,
) -> Vec<BleepRegion> {
    regions.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));

    let mut merged: Vec<BleepRegion> = Vec::with_capacity(regions.len());
    for region in regions {
        match merged.last_mut() {
            Some(last) if region.start_time <= last.end_time + min_gap => {
                last.end_time = last.end_time.max(region.end_time);
                last.pii_matches.extend(region.pii_matches);
            }
            _ => merged.push(region),
        }
    }

    for region in &mut merged {
        region.bleep_duration = min_duration.max(region.span());
    }
    merged
}
