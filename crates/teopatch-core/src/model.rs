use std::sync::LazyLock;

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{
    error::{PatchError, ValidationError},
    schema::{AdsrSlot, Effect, Engine, Lfo, OCTAVE_MAX, OCTAVE_MIN, Variant},
};

pub const SLOT_COUNT: usize = 24;
/// The last two slots keep the factory mapping and are never assigned from segments.
pub const RESERVED_SLOTS: usize = 2;
pub const ASSIGNABLE_SLOTS: usize = SLOT_COUNT - RESERVED_SLOTS;
pub const SLOT_VALUE_MAX: i64 = 2_147_483_647;
pub const PARAM_COUNT: usize = 8;

const DEFAULT_DRUM_START: [i64; SLOT_COUNT] = [
    0, 97_647_201, 165_167_950, 211_911_835, 282_029_692, 313_450_641, 372_920_355, 413_171_470,
    454_136_790, 478_545_547, 492_553_698, 582_032_184, 582_032_184, 582_032_184, 582_032_184,
    582_032_184, 582_032_184, 582_032_184, 582_032_184, 582_032_184, 582_032_184, 582_032_184,
    582_032_184, 642_638_133,
];

const DEFAULT_DRUM_END: [i64; SLOT_COUNT] = [
    97_643_143, 165_163_892, 211_907_777, 282_025_634, 313_446_583, 372_916_297, 413_167_412,
    454_132_733, 478_541_489, 492_549_640, 582_028_126, 642_634_075, 642_634_075, 642_634_075,
    642_634_075, 642_634_075, 642_634_075, 642_634_075, 642_634_075, 642_634_075, 642_634_075,
    642_634_075, 642_634_075, 2_032_606_256,
];

static DEFAULT_DRUM_PATCH: LazyLock<DrumPatch> = LazyLock::new(|| DrumPatch {
    drum_version: 2,
    dyna_env: [0, 8192, 0, 8192, 0, 0, 0, 0],
    end: DEFAULT_DRUM_END,
    fx_active: false,
    fx_params: [8000; PARAM_COUNT],
    fx_type: Effect::Delay,
    lfo_active: false,
    lfo_params: [16000, 16000, 16000, 16000, 0, 0, 0, 0],
    lfo_type: Lfo::Tremolo,
    name: "boombap1".to_string(),
    octave: 0,
    pitch: [0; SLOT_COUNT],
    playmode: [8192; SLOT_COUNT],
    reverse: [8192; SLOT_COUNT],
    start: DEFAULT_DRUM_START,
    kind: DrumKind::Drum,
    volume: [8192; SLOT_COUNT],
});

static DEFAULT_OSCILLATOR_PATCH: LazyLock<SynthPatch> = LazyLock::new(|| SynthPatch {
    adsr: [64, 64, 0, 64, 14336, 64, 4000, 4000],
    fx_active: true,
    fx_params: [64, -14337, 4515, 7232, 0, 0, 0, 0],
    fx_type: Effect::Nitro,
    knobs: [3072, 0, 512, 3, 0, 0, 0, 0],
    lfo_active: false,
    lfo_params: [4608, 32767, 8448, 15360, 0, 0, 0, 0],
    lfo_type: Lfo::Value,
    name: "default".to_string(),
    octave: 0,
    synth_version: 2,
    engine: Engine::Cluster,
    base_freq: None,
});

static DEFAULT_SAMPLER_PATCH: LazyLock<SynthPatch> = LazyLock::new(|| SynthPatch {
    adsr: [512, 10746, 32767, 10000, 4000, 64, 4000, 4000],
    fx_active: false,
    fx_params: [4480, 15544, 10788, 12104, 0, 0, 0, 0],
    fx_type: Effect::Delay,
    knobs: [0, 0, 32767, 32767, 12000, 0, 0, 8304],
    lfo_active: false,
    lfo_params: [11840, 18431, 1024, 15144, 0, 0, 0, 0],
    lfo_type: Lfo::Random,
    name: "20150108_0251".to_string(),
    octave: 0,
    synth_version: 1,
    engine: Engine::Sampler,
    base_freq: Some(261.625_366_210_937_5),
});

/// Behaviour shared by every patch record that can be written into a container.
pub trait Patch: Serialize + DeserializeOwned {
    const LABEL: &'static str;

    /// Fails on the first field the hardware would reject.
    fn validate(&self) -> Result<(), ValidationError>;

    fn name(&self) -> &str;

    /// Canonical JSON, keys in declaration order.
    fn to_json_bytes(&self) -> Result<Vec<u8>, PatchError> {
        serde_json::to_vec(self).map_err(PatchError::Encoding)
    }

    fn from_json_bytes(bytes: &[u8]) -> Result<Self, PatchError> {
        serde_json::from_slice(bytes).map_err(PatchError::Decoding)
    }

    /// The bytes that go into the metadata chunk. Only a valid patch gets this far.
    fn metadata_bytes(&self) -> Result<Vec<u8>, PatchError> {
        self.validate()?;
        self.to_json_bytes()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DrumKind {
    Drum,
}

/// A 24-key sample kit. Each key plays `start[i]..end[i]` of the container's audio,
/// addressed in fixed-point sample units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrumPatch {
    pub drum_version: i64,
    pub dyna_env: [i64; PARAM_COUNT],
    pub end: [i64; SLOT_COUNT],
    pub fx_active: bool,
    pub fx_params: [i64; PARAM_COUNT],
    pub fx_type: Effect,
    pub lfo_active: bool,
    pub lfo_params: [i64; PARAM_COUNT],
    pub lfo_type: Lfo,
    pub name: String,
    pub octave: i64,
    pub pitch: [i64; SLOT_COUNT],
    pub playmode: [i64; SLOT_COUNT],
    pub reverse: [i64; SLOT_COUNT],
    pub start: [i64; SLOT_COUNT],
    #[serde(rename = "type")]
    pub kind: DrumKind,
    pub volume: [i64; SLOT_COUNT],
}

impl Default for DrumPatch {
    fn default() -> Self {
        Self::new_default()
    }
}

impl DrumPatch {
    /// The factory kit every generated drum patch starts from.
    #[must_use]
    pub fn new_default() -> Self {
        DEFAULT_DRUM_PATCH.clone()
    }

    /// Soft upper bound for assigned slots, taken from the final reserved slot.
    #[must_use]
    pub fn last_end(&self) -> i64 {
        self.end[SLOT_COUNT - 1]
    }

    /// Write a slot pair, clamping both ends into `0..=SLOT_VALUE_MAX`.
    pub fn set_slot(&mut self, slot: usize, start: i64, end: i64) {
        if slot >= SLOT_COUNT {
            return;
        }
        self.start[slot] = start.clamp(0, SLOT_VALUE_MAX);
        self.end[slot] = end.clamp(0, SLOT_VALUE_MAX);
    }

    #[must_use]
    pub fn slot(&self, slot: usize) -> Option<(i64, i64)> {
        (slot < SLOT_COUNT).then(|| (self.start[slot], self.end[slot]))
    }
}

impl Patch for DrumPatch {
    const LABEL: &'static str = "drum";

    fn validate(&self) -> Result<(), ValidationError> {
        check_octave(self.octave)?;
        self.fx_type.check(&self.fx_params)?;
        self.lfo_type.check(&self.lfo_params)?;

        for slot in 0..SLOT_COUNT {
            let (start, end) = (self.start[slot], self.end[slot]);
            for value in [start, end] {
                if !(0..=SLOT_VALUE_MAX).contains(&value) {
                    return Err(ValidationError::SlotOutOfRange {
                        slot,
                        value,
                        max: SLOT_VALUE_MAX,
                    });
                }
            }
            if start > end {
                return Err(ValidationError::SlotInverted { slot, start, end });
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Which compiled-in synth patch to start from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthBaseline {
    Oscillator,
    Sampler,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthPatch {
    pub adsr: [i32; PARAM_COUNT],
    pub fx_active: bool,
    pub fx_params: [i32; PARAM_COUNT],
    pub fx_type: Effect,
    pub knobs: [i32; PARAM_COUNT],
    pub lfo_active: bool,
    pub lfo_params: [i32; PARAM_COUNT],
    pub lfo_type: Lfo,
    pub name: String,
    pub octave: i32,
    pub synth_version: i32,
    #[serde(rename = "type")]
    pub engine: Engine,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_freq: Option<f64>,
}

impl Default for SynthPatch {
    fn default() -> Self {
        Self::oscillator()
    }
}

impl SynthPatch {
    #[must_use]
    pub fn new_default(baseline: SynthBaseline, base_freq: Option<f64>) -> Self {
        match baseline {
            SynthBaseline::Oscillator => Self::oscillator(),
            SynthBaseline::Sampler => Self::sampler(base_freq),
        }
    }

    #[must_use]
    pub fn oscillator() -> Self {
        DEFAULT_OSCILLATOR_PATCH.clone()
    }

    /// Sample-playback baseline, optionally retuned to the recording's pitch.
    #[must_use]
    pub fn sampler(base_freq: Option<f64>) -> Self {
        let mut patch = DEFAULT_SAMPLER_PATCH.clone();
        if let Some(freq) = base_freq {
            patch.base_freq = Some(freq);
        }
        patch
    }

    #[must_use]
    pub fn adsr_wide(&self) -> [i64; PARAM_COUNT] {
        self.adsr.map(i64::from)
    }

    #[must_use]
    pub fn knobs_wide(&self) -> [i64; PARAM_COUNT] {
        self.knobs.map(i64::from)
    }

    #[must_use]
    pub fn fx_params_wide(&self) -> [i64; PARAM_COUNT] {
        self.fx_params.map(i64::from)
    }

    #[must_use]
    pub fn lfo_params_wide(&self) -> [i64; PARAM_COUNT] {
        self.lfo_params.map(i64::from)
    }
}

impl Patch for SynthPatch {
    const LABEL: &'static str = "synth";

    fn validate(&self) -> Result<(), ValidationError> {
        check_octave(i64::from(self.octave))?;

        let adsr = self.adsr_wide();
        for slot in AdsrSlot::ALL {
            let allowed = slot.allowed();
            let value = adsr[slot.index()];
            if !allowed.within_bounds(value) {
                return Err(ValidationError::AdsrOutOfBounds {
                    index: slot.index(),
                    value,
                    min: allowed.min(),
                    max: allowed.max(),
                });
            }
        }

        self.engine.check(&self.knobs_wide())?;
        self.fx_type.check(&self.fx_params_wide())?;
        self.lfo_type.check(&self.lfo_params_wide())?;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn check_octave(octave: i64) -> Result<(), ValidationError> {
    if (OCTAVE_MIN..=OCTAVE_MAX).contains(&octave) {
        Ok(())
    } else {
        Err(ValidationError::OctaveOutOfRange {
            value: octave,
            min: OCTAVE_MIN,
            max: OCTAVE_MAX,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        DrumPatch::new_default()
            .validate()
            .expect("factory drum kit should validate");
        SynthPatch::oscillator()
            .validate()
            .expect("oscillator baseline should validate");
        SynthPatch::sampler(None)
            .validate()
            .expect("sampler baseline should validate");
    }

    #[test]
    fn defaults_are_independent_copies() {
        let mut first = DrumPatch::new_default();
        first.set_slot(0, 5, 10);
        let second = DrumPatch::new_default();
        assert_eq!(second.slot(0), Some((0, 97_643_143)));
    }

    #[test]
    fn sampler_base_freq_override() {
        let patch = SynthPatch::new_default(SynthBaseline::Sampler, Some(440.0));
        assert_eq!(patch.base_freq, Some(440.0));
        assert_eq!(patch.engine, Engine::Sampler);
        assert_eq!(SynthPatch::oscillator().base_freq, None);
    }

    #[test]
    fn set_slot_clamps_into_signed_32_bit_range() {
        let mut patch = DrumPatch::new_default();
        patch.set_slot(3, -40, i64::MAX);
        assert_eq!(patch.slot(3), Some((0, SLOT_VALUE_MAX)));
        patch.set_slot(SLOT_COUNT, 1, 2);
        assert_eq!(patch.slot(SLOT_COUNT), None);
    }

    #[test]
    fn octave_bounds_are_inclusive() {
        let mut patch = SynthPatch::oscillator();
        patch.octave = 2;
        assert!(patch.validate().is_ok());
        patch.octave = -3;
        assert_eq!(
            patch.validate(),
            Err(ValidationError::OctaveOutOfRange {
                value: -3,
                min: -2,
                max: 2,
            })
        );
    }

    #[test]
    fn inverted_drum_slot_fails_validation() {
        let mut patch = DrumPatch::new_default();
        patch.start[4] = patch.end[4] + 1;
        assert!(matches!(
            patch.validate(),
            Err(ValidationError::SlotInverted { slot: 4, .. })
        ));
    }

    #[test]
    fn json_keys_follow_wire_order() {
        let json = String::from_utf8(
            SynthPatch::oscillator()
                .to_json_bytes()
                .expect("serialization should work"),
        )
        .expect("json should be utf-8");
        assert!(json.starts_with(r#"{"adsr":[64,64,0,64,14336,64,4000,4000],"fx_active":true"#));
        assert!(json.contains(r#""type":"cluster""#));
        assert!(!json.contains("base_freq"));

        let sampler = String::from_utf8(
            SynthPatch::sampler(Some(440.0))
                .to_json_bytes()
                .expect("serialization should work"),
        )
        .expect("json should be utf-8");
        assert!(sampler.ends_with(r#""type":"sampler","base_freq":440.0}"#));
    }
}
