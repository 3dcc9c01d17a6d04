//! Turn detector segments into drum-kit slot tables.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::{
    error::PatchError,
    model::{ASSIGNABLE_SLOTS, DrumPatch, SLOT_COUNT},
    time::SlotScale,
};

pub const MIN_SEGMENT_SECONDS: f64 = 0.1;
pub const MAX_GROUP_SECONDS: f64 = 11.5;
/// Shortest source audio a kit should be built from. Shorter inputs are reported.
pub const MIN_PATCH_SECONDS: f64 = 11.75;
/// Longest stretch of audio a multi-file kit addresses.
pub const KIT_MAX_SECONDS: u32 = 12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl Segment {
    #[must_use]
    pub fn new(start: f64, end: f64) -> Self {
        Self {
            start,
            end,
            source: None,
        }
    }

    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    #[must_use]
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Consecutive segments whose durations sum to at most the group cap.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentGroup {
    pub segments: Vec<Segment>,
}

impl SegmentGroup {
    #[must_use]
    pub fn duration(&self) -> f64 {
        self.segments.iter().fold(0.0, |total, segment| total + segment.duration())
    }

    #[must_use]
    pub fn start(&self) -> f64 {
        self.segments.first().map_or(0.0, |segment| segment.start)
    }

    #[must_use]
    pub fn end(&self) -> f64 {
        self.segments.last().map_or(0.0, |segment| segment.end)
    }

    /// Segments shifted so the group starts at zero, as in its own excerpt.
    #[must_use]
    pub fn rebased(&self) -> Vec<Segment> {
        let offset = self.start();
        self.segments
            .iter()
            .map(|segment| Segment {
                start: segment.start - offset,
                end: segment.end - offset,
                source: segment.source.clone(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapperConfig {
    pub min_segment_seconds: f64,
    pub max_group_seconds: f64,
    pub scale: SlotScale,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            min_segment_seconds: MIN_SEGMENT_SECONDS,
            max_group_seconds: MAX_GROUP_SECONDS,
            scale: SlotScale::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Inverted,
    PastKitEnd,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedSegment {
    pub index: usize,
    pub start_units: i64,
    pub end_units: i64,
    pub reason: SkipReason,
}

/// What happened to each segment during slot assignment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotAssignment {
    pub assigned: Vec<usize>,
    pub skipped: Vec<SkippedSegment>,
    /// Segments beyond the assignable slots.
    pub overflow: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedPatch {
    pub group: SegmentGroup,
    pub patch: DrumPatch,
    pub assignment: SlotAssignment,
}

/// Keep segments strictly longer than `min_seconds`.
#[must_use]
pub fn filter_short(segments: &[Segment], min_seconds: f64) -> Vec<Segment> {
    segments
        .iter()
        .filter(|segment| segment.duration() > min_seconds)
        .cloned()
        .collect()
}

/// Greedy, order-preserving packing of segments into groups of at most `cap` seconds.
///
/// Group boundaries fall on segment boundaries. A segment longer than the cap, or with a
/// non-finite duration, can't be placed and is an error.
#[instrument(skip(segments), fields(segments = segments.len()))]
pub fn pack_segments(segments: &[Segment], cap: f64) -> Result<Vec<SegmentGroup>, PatchError> {
    if !(cap.is_finite() && cap > 0.0) {
        return Err(PatchError::InvalidCap(cap));
    }

    let mut groups = Vec::new();
    let mut current: Vec<Segment> = Vec::new();
    let mut current_total = 0.0;

    for (index, segment) in segments.iter().enumerate() {
        let duration = segment.duration();
        if duration.is_nan() || duration > cap {
            return Err(PatchError::SegmentExceedsCap {
                index,
                duration,
                cap,
            });
        }

        if !current.is_empty() && current_total + duration > cap {
            groups.push(SegmentGroup {
                segments: std::mem::take(&mut current),
            });
            current_total = 0.0;
        }

        current_total += duration;
        current.push(segment.clone());
    }

    if !current.is_empty() {
        groups.push(SegmentGroup { segments: current });
    }

    debug!(groups = groups.len(), "segments packed");
    Ok(groups)
}

/// Write each segment into the slot with the same index.
///
/// Segments that would invert a slot or reach past the kit's final slot are skipped and
/// leave that slot untouched. The two reserved slots are never written.
#[instrument(skip(patch, segments, scale), fields(segments = segments.len()))]
pub fn assign_slots(patch: &mut DrumPatch, segments: &[Segment], scale: &SlotScale) -> SlotAssignment {
    let bound = patch.last_end();
    let mut assignment = SlotAssignment::default();

    for (index, segment) in segments.iter().enumerate() {
        if index >= ASSIGNABLE_SLOTS {
            assignment.overflow += 1;
            continue;
        }

        let start_units = scale.seconds_to_units(segment.start);
        let end_units = scale.seconds_to_units(segment.end);
        let reason = if start_units > end_units {
            Some(SkipReason::Inverted)
        } else if end_units > bound {
            Some(SkipReason::PastKitEnd)
        } else {
            None
        };

        if let Some(reason) = reason {
            warn!(index, start_units, end_units, ?reason, "segment skipped");
            assignment.skipped.push(SkippedSegment {
                index,
                start_units,
                end_units,
                reason,
            });
            continue;
        }

        patch.set_slot(index, start_units, end_units);
        assignment.assigned.push(index);
    }

    if assignment.overflow > 0 {
        debug!(overflow = assignment.overflow, "segments beyond slot limit dropped");
    }
    assignment
}

/// Map one recording's segments onto a single kit.
#[instrument(skip(segments, config), fields(segments = segments.len()))]
pub fn map_segments(
    segments: &[Segment],
    config: &MapperConfig,
) -> Result<(DrumPatch, SlotAssignment), PatchError> {
    let kept = usable_segments(segments, config)?;
    let mut patch = DrumPatch::new_default();
    let assignment = assign_slots(&mut patch, &kept, &config.scale);
    info!(assigned = assignment.assigned.len(), "drum slots mapped");
    Ok((patch, assignment))
}

/// Filter, pack and map segments into one kit per group.
///
/// Each group is expected to be rendered as its own excerpt, so its segment times are
/// rebased to the group start before slot assignment.
#[instrument(skip(segments, config), fields(segments = segments.len()))]
pub fn plan_drum_patches(
    segments: &[Segment],
    config: &MapperConfig,
) -> Result<Vec<PlannedPatch>, PatchError> {
    let kept = usable_segments(segments, config)?;
    let groups = pack_segments(&kept, config.max_group_seconds)?;

    let planned: Vec<PlannedPatch> = groups
        .into_iter()
        .map(|group| {
            let mut patch = DrumPatch::new_default();
            let assignment = assign_slots(&mut patch, &group.rebased(), &config.scale);
            PlannedPatch {
                group,
                patch,
                assignment,
            }
        })
        .collect();

    info!(patches = planned.len(), "drum patches planned");
    Ok(planned)
}

fn usable_segments(segments: &[Segment], config: &MapperConfig) -> Result<Vec<Segment>, PatchError> {
    if segments.is_empty() {
        return Err(PatchError::NoSegments);
    }
    let kept = filter_short(segments, config.min_segment_seconds);
    if kept.is_empty() {
        return Err(PatchError::NoSegments);
    }
    if kept.len() < segments.len() {
        debug!(dropped = segments.len() - kept.len(), "short segments filtered");
    }
    Ok(kept)
}

/// Seconds missing before `duration_seconds` of audio reaches `min_patch_seconds`.
#[must_use]
pub fn patch_shortfall(duration_seconds: f64, min_patch_seconds: f64) -> Option<f64> {
    let missing = min_patch_seconds - duration_seconds;
    (missing > 0.0).then_some(missing)
}

/// `splices` equal slices of a recording.
#[must_use]
pub fn equal_segments(duration: f64, splices: usize, source: Option<&str>) -> Vec<Segment> {
    (0..splices)
        .map(|index| {
            let start = duration * index as f64 / splices as f64;
            let end = duration * (index + 1) as f64 / splices as f64;
            Segment {
                start,
                end,
                source: source.map(str::to_string),
            }
        })
        .collect()
}

/// Kit for several recordings concatenated back to back, one recording per slot.
///
/// `sample_counts` are the decoded lengths of each recording. Boundaries past
/// [`KIT_MAX_SECONDS`] of audio are clamped to it.
#[must_use]
pub fn slots_from_sample_counts(sample_counts: &[u64], scale: &SlotScale) -> DrumPatch {
    let limit = u64::from(KIT_MAX_SECONDS) * u64::from(scale.sample_rate);
    let mut patch = DrumPatch::new_default();

    let mut cumulative = 0_u64;
    let mut previous_end = 0_u64;
    for (slot, count) in sample_counts.iter().take(SLOT_COUNT).enumerate() {
        cumulative = cumulative.saturating_add(*count);
        let end = cumulative.min(limit);
        patch.set_slot(
            slot,
            scale.samples_to_units(previous_end),
            scale.samples_to_units(end),
        );
        previous_end = end;
    }

    patch
}
