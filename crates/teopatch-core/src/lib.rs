pub mod batch;
pub mod config;
pub mod container;
pub mod detect;
pub mod diagnostics;
pub mod error;
pub mod fixtures;
pub mod generate;
pub mod model;
pub mod naming;
pub mod persistence;
pub mod probe;
pub mod schema;
pub mod segments;
pub mod time;

pub use batch::{BatchOutcome, BatchReport, run_batch};
pub use config::AppConfig;
pub use container::{
    ContainerLayout, SplicedContainer, patch_container, read_metadata, splice_metadata,
    strip_metadata,
};
pub use diagnostics::{TelemetryGuard, init_tracing, init_tracing_with_options};
pub use error::{PatchError, ValidationError};
pub use model::{DrumPatch, Patch, SynthBaseline, SynthPatch};
pub use naming::{HashidEncoder, PatchName};
pub use persistence::{
    load_drum_patch, load_synth_patch, save_drum_patch, save_patch, save_synth_patch,
};
pub use probe::{AudioProbe, PatchInput, probe_audio_file, probe_wav, scan_patch_inputs};
pub use schema::{AdsrSlot, Effect, Engine, Lfo, ParamField, ValueSet, Variant, range};
pub use segments::{
    MapperConfig, PlannedPatch, Segment, SegmentGroup, SlotAssignment, assign_slots,
    equal_segments, filter_short, map_segments, pack_segments, patch_shortfall, plan_drum_patches,
    slots_from_sample_counts,
};
pub use time::SlotScale;
