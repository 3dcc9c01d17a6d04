//! Synthetic audio inputs for tests.

use std::path::Path;

use anyhow::{Context, Result};

use crate::container::{AUDIO_TAG, FORM_TAG};

const BITS_PER_SAMPLE: u16 = 16;

/// A minimal `FORM`/`AIFF` file with `COMM` and `SSND` chunks of 16-bit silence.
#[must_use]
pub fn silent_aiff(frames: u32, channels: u16, sample_rate: u32) -> Vec<u8> {
    let bytes_per_frame = u32::from(channels) * u32::from(BITS_PER_SAMPLE / 8);
    let data_len = frames.saturating_mul(bytes_per_frame) as usize;

    let mut body = Vec::with_capacity(64 + data_len);
    body.extend_from_slice(b"AIFF");

    body.extend_from_slice(b"COMM");
    body.extend_from_slice(&18_u32.to_be_bytes());
    body.extend_from_slice(&channels.to_be_bytes());
    body.extend_from_slice(&frames.to_be_bytes());
    body.extend_from_slice(&BITS_PER_SAMPLE.to_be_bytes());
    body.extend_from_slice(&extended_sample_rate(sample_rate));

    body.extend_from_slice(&AUDIO_TAG);
    let ssnd_len = u32::try_from(8 + data_len).unwrap_or(u32::MAX);
    body.extend_from_slice(&ssnd_len.to_be_bytes());
    body.extend_from_slice(&0_u32.to_be_bytes());
    body.extend_from_slice(&0_u32.to_be_bytes());
    body.resize(body.len() + data_len, 0);

    let mut bytes = Vec::with_capacity(8 + body.len());
    bytes.extend_from_slice(&FORM_TAG);
    let form_len = u32::try_from(body.len()).unwrap_or(u32::MAX);
    bytes.extend_from_slice(&form_len.to_be_bytes());
    bytes.extend_from_slice(&body);
    bytes
}

/// 80-bit IEEE extended encoding of an integer sample rate, as `COMM` stores it.
#[must_use]
pub fn extended_sample_rate(sample_rate: u32) -> [u8; 10] {
    let mut encoded = [0_u8; 10];
    if sample_rate == 0 {
        return encoded;
    }
    let highest_bit = 31 - sample_rate.leading_zeros();
    let exponent = 16_383 + u16::try_from(highest_bit).unwrap_or_default();
    let mantissa = u64::from(sample_rate) << (63 - highest_bit);
    encoded[..2].copy_from_slice(&exponent.to_be_bytes());
    encoded[2..].copy_from_slice(&mantissa.to_be_bytes());
    encoded
}

/// Write a mono 16-bit sine tone.
pub fn write_sine_wav(path: &Path, sample_rate: u32, frames: u32, frequency: f32) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: BITS_PER_SAMPLE,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)
        .with_context(|| format!("failed to create wav file: {}", path.display()))?;
    for frame in 0..frames {
        let phase = frame as f32 / sample_rate as f32 * frequency * std::f32::consts::TAU;
        let sample = (phase.sin() * f32::from(i16::MAX) * 0.5) as i16;
        writer
            .write_sample(sample)
            .context("failed to write wav sample")?;
    }
    writer.finalize().context("failed to finalize wav file")?;
    Ok(())
}
