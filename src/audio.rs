use std::path::Path;

use claxon::FlacReader;
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::error::DeidError;

/// Mono PCM audio normalized to [-1, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    pub sample_rate_hz: u32,
    pub samples: Vec<f32>,
}

impl AudioBuffer {
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate_hz == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / f64::from(self.sample_rate_hz)
    }
}

/// Reads a WAV or FLAC file, averaging all channels down to mono.
pub fn read_mono(path: &Path) -> Result<AudioBuffer, DeidError> {
    if !path.exists() {
        return Err(DeidError::input_not_found(path));
    }
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("wav") => read_wav_mono(path),
        Some("flac") => read_flac_mono(path),
        _ => Err(DeidError::audio(
            "select audio decoder",
            format!("unsupported audio format: {}", path.display()),
        )),
    }
}

fn int_scale(bits_per_sample: u32) -> f32 {
    if bits_per_sample > 1 {
        ((1_i64 << (bits_per_sample - 1)) - 1) as f32
    } else {
        1.0
    }
}

fn downmix(interleaved: impl Iterator<Item = f32>, channels: usize) -> Vec<f32> {
    if channels == 1 {
        return interleaved.collect();
    }
    let mut mono = Vec::new();
    let mut frame = Vec::with_capacity(channels);
    for sample in interleaved {
        frame.push(sample);
        if frame.len() == channels {
            mono.push(frame.iter().sum::<f32>() / channels as f32);
            frame.clear();
        }
    }
    mono
}

fn read_wav_mono(path: &Path) -> Result<AudioBuffer, DeidError> {
    let reader = WavReader::open(path).map_err(|e| DeidError::audio("open wav", e))?;
    let spec = reader.spec();
    let channels = usize::from(spec.channels);
    if channels == 0 {
        return Err(DeidError::audio("read wav", "zero channels"));
    }

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| DeidError::audio("read wav samples", e))?,
        SampleFormat::Int => {
            let scale = int_scale(u32::from(spec.bits_per_sample));
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()
                .map_err(|e| DeidError::audio("read wav samples", e))?
        }
    };

    Ok(AudioBuffer {
        sample_rate_hz: spec.sample_rate,
        samples: downmix(interleaved.into_iter(), channels),
    })
}

fn read_flac_mono(path: &Path) -> Result<AudioBuffer, DeidError> {
    let mut reader = FlacReader::open(path).map_err(|e| DeidError::audio("open flac", e))?;
    let streaminfo = reader.streaminfo();
    let channels = streaminfo.channels as usize;
    if channels == 0 {
        return Err(DeidError::audio("read flac", "zero channels"));
    }
    let scale = int_scale(streaminfo.bits_per_sample);

    let interleaved: Vec<f32> = reader
        .samples()
        .map(|s| s.map(|v| v as f32 / scale))
        .collect::<Result<_, _>>()
        .map_err(|e| DeidError::audio("read flac samples", e))?;

    Ok(AudioBuffer {
        sample_rate_hz: streaminfo.sample_rate,
        samples: downmix(interleaved.into_iter(), channels),
    })
}

/// Writes mono 32-bit float WAV at the buffer's sample rate.
pub fn write_wav(path: &Path, audio: &AudioBuffer) -> Result<(), DeidError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| DeidError::io("create audio directory", e))?;
    }
    let spec = WavSpec {
        channels: 1,
        sample_rate: audio.sample_rate_hz,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer = WavWriter::create(path, spec).map_err(|e| DeidError::audio("create wav", e))?;
    for &sample in &audio.samples {
        writer
            .write_sample(sample)
            .map_err(|e| DeidError::audio("write wav sample", e))?;
    }
    writer
        .finalize()
        .map_err(|e| DeidError::audio("finalize wav", e))
}
