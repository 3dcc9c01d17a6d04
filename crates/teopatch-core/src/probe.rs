use std::{fs::File, io::ErrorKind, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use symphonia::core::{
    audio::{AudioBufferRef, SampleBuffer},
    codecs::DecoderOptions,
    errors::Error as SymphoniaError,
    formats::FormatOptions,
    io::MediaSourceStream,
    meta::MetadataOptions,
    probe::Hint,
};
use tracing::{debug, instrument, warn};
use walkdir::WalkDir;

use crate::persistence::is_container_path;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AudioProbe {
    pub source_path: String,
    pub sample_rate: u32,
    pub channels: u16,
    pub total_frames: u64,
    pub duration_seconds: f64,
}

impl AudioProbe {
    fn new(path: &Path, sample_rate: u32, channels: u16, total_frames: u64) -> Self {
        let duration_seconds = if sample_rate == 0 {
            0.0
        } else {
            total_frames as f64 / f64::from(sample_rate)
        };
        Self {
            source_path: path.display().to_string(),
            sample_rate,
            channels,
            total_frames,
            duration_seconds,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PatchInput {
    pub path: String,
    pub extension: String,
    pub size_bytes: u64,
}

/// Sample rate, channel count and decoded frame count of any audio file symphonia reads.
#[instrument(fields(path = %path.display()))]
pub fn probe_audio_file(path: &Path) -> Result<AudioProbe> {
    let file = File::open(path)
        .with_context(|| format!("failed to open audio file: {}", path.display()))?;
    let source = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|value| value.to_str()) {
        hint.with_extension(extension);
    }

    let probed = symphonia::default::get_probe().format(
        &hint,
        source,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| anyhow::anyhow!("no default audio track found in {}", path.display()))?;
    let track_id = track.id;
    let mut decoder =
        symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
    let mut channels = track
        .codec_params
        .channels
        .map_or(0, |value| value.count() as u16);
    let mut total_frames = 0_u64;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(error)) if error.kind() == ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => {
                return Err(anyhow::anyhow!(
                    "audio stream reset required for {}",
                    path.display()
                ));
            }
            Err(error) => return Err(error.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(error)) => {
                warn!(error, "skipping undecodable packet");
                continue;
            }
            Err(error) => return Err(error.into()),
        };

        sample_rate = decoded.spec().rate;
        channels = decoded.spec().channels.count() as u16;
        total_frames += decoded_frames(decoded);
    }

    if total_frames == 0 {
        return Err(anyhow::anyhow!(
            "decoded zero frames from {}",
            path.display()
        ));
    }

    debug!(sample_rate, channels, total_frames, "audio probe complete");
    Ok(AudioProbe::new(path, sample_rate, channels, total_frames))
}

fn decoded_frames(decoded: AudioBufferRef<'_>) -> u64 {
    let spec = *decoded.spec();
    let channel_count = spec.channels.count().max(1);
    let mut sample_buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
    sample_buffer.copy_interleaved_ref(decoded);
    (sample_buffer.samples().len() / channel_count) as u64
}

/// Header-only probe for WAV files.
#[instrument(fields(path = %path.display()))]
pub fn probe_wav(path: &Path) -> Result<AudioProbe> {
    let reader = hound::WavReader::open(path)
        .with_context(|| format!("failed to open wav file: {}", path.display()))?;
    let spec = reader.spec();
    let total_frames = u64::from(reader.duration());
    debug!(
        sample_rate = spec.sample_rate,
        channels = spec.channels,
        total_frames,
        "wav probe complete"
    );
    Ok(AudioProbe::new(path, spec.sample_rate, spec.channels, total_frames))
}

/// Every `.aif`/`.aiff` file under `directory`, sorted by path.
#[instrument(fields(directory = %directory.display()))]
pub fn scan_patch_inputs(directory: &Path) -> Result<Vec<PatchInput>> {
    if !directory.is_dir() {
        return Err(anyhow::anyhow!(
            "patch input path is not a directory: {}",
            directory.display()
        ));
    }

    let mut inputs = Vec::new();
    for entry in WalkDir::new(directory).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) => {
                warn!(?error, "ignoring unreadable entry while scanning inputs");
                continue;
            }
        };

        if !entry.file_type().is_file() || !is_container_path(entry.path()) {
            continue;
        }

        let extension = entry
            .path()
            .extension()
            .and_then(|value| value.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        let size_bytes = entry.metadata().map(|meta| meta.len()).unwrap_or(0);
        inputs.push(PatchInput {
            path: entry.path().display().to_string(),
            extension,
            size_bytes,
        });
    }

    inputs.sort_by(|left, right| left.path.cmp(&right.path));
    debug!(count = inputs.len(), "patch input scan complete");
    Ok(inputs)
}
