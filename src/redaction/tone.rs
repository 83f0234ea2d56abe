use std::f64::consts::PI;

use crate::config::BleepConfig;
use crate::redaction::bleep::BleepRegion;

/// Sine tone with a linear fade in and out. The fade is skipped when the tone
/// is not longer than both ramps together.
pub fn generate_tone(duration_secs: f64, sample_rate: u32, config: &BleepConfig) -> Vec<f32> {
    let n = (duration_secs.max(0.0) * f64::from(sample_rate)) as usize;
    let step = 2.0 * PI * f64::from(config.tone_frequency_hz) / f64::from(sample_rate);
    let amplitude = f64::from(config.tone_amplitude);
    let mut tone: Vec<f32> = (0..n)
        .map(|i| (amplitude * (step * i as f64).sin()) as f32)
        .collect();

    let fade = (config.fade_secs * f64::from(sample_rate)) as usize;
    if fade > 0 && n > 2 * fade {
        for i in 0..fade {
            let gain = i as f32 / fade as f32;
            tone[i] *= gain;
            tone[n - 1 - i] *= gain;
        }
    }
    tone
}

/// Overwrites every region of `samples` with a tone of the region's bleep
/// duration. Longer tones are truncated to the region; shorter ones are
/// followed by silence up to the region end.
pub fn apply_regions(
    samples: &mut [f32],
    sample_rate: u32,
    regions: &[BleepRegion],
    config: &BleepConfig,
) {
    let rate = f64::from(sample_rate);
    for region in regions {
        let start = ((region.start_time * rate) as usize).min(samples.len());
        let end = ((region.end_time * rate) as usize).min(samples.len());
        if start >= end {
            continue;
        }

        let tone = generate_tone(region.bleep_duration, sample_rate, config);
        let target = &mut samples[start..end];
        let copied = tone.len().min(target.len());
        target[..copied].copy_from_slice(&tone[..copied]);
        target[copied..].fill(0.0);

        tracing::trace!(
            start_sample = start,
            end_sample = end,
            tone_samples = tone.len(),
            "bleep applied"
        );
    }
}
