//! Legal parameter values for every synth engine, effect and LFO the hardware knows.
//!
//! Each variant owns an ordered table with one [`ValueSet`] per knob position. Positions
//! past the end of a table are not constrained.

use std::{fmt, str::FromStr};

use rand::{Rng, seq::SliceRandom};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

pub const OCTAVE_MIN: i64 = -2;
pub const OCTAVE_MAX: i64 = 2;

/// The permitted values for one parameter position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSet {
    /// Closed interval `start..=end`. `step` is the granularity the hardware was
    /// sampled at and only matters for display.
    Span { start: i64, end: i64, step: i64 },
    /// Explicit list of accepted values, in hardware order.
    Discrete(&'static [i64]),
}

#[must_use]
pub const fn span(start: i64, end: i64, step: i64) -> ValueSet {
    ValueSet::Span { start, end, step }
}

impl ValueSet {
    #[must_use]
    pub fn min(&self) -> i64 {
        match self {
            Self::Span { start, .. } => *start,
            Self::Discrete(values) => values.iter().copied().min().unwrap_or_default(),
        }
    }

    #[must_use]
    pub fn max(&self) -> i64 {
        match self {
            Self::Span { end, .. } => *end,
            Self::Discrete(values) => values.iter().copied().max().unwrap_or_default(),
        }
    }

    /// Value lies between the smallest and largest permitted value.
    #[must_use]
    pub fn within_bounds(&self, value: i64) -> bool {
        value >= self.min() && value <= self.max()
    }

    /// Value is one the hardware accepts at this position.
    #[must_use]
    pub fn contains(&self, value: i64) -> bool {
        match self {
            Self::Span { start, end, .. } => (*start..=*end).contains(&value),
            Self::Discrete(values) => values.contains(&value),
        }
    }

    #[must_use]
    pub fn values(&self) -> Vec<i64> {
        match self {
            Self::Span { start, end, step } => range(*start, *end, *step),
            Self::Discrete(values) => values.to_vec(),
        }
    }

    pub fn sample<R: Rng>(&self, rng: &mut R) -> i64 {
        match self {
            Self::Span { start, end, .. } if start <= end => rng.gen_range(*start..=*end),
            Self::Span { start, .. } => *start,
            Self::Discrete(values) => values.choose(rng).copied().unwrap_or_default(),
        }
    }
}

/// Every integer in `start..=end`.
///
/// The first element is always `start` and the last is always `end`. `step` is accepted
/// for table readability but the generated list stays dense, so a stride can never skip
/// the end value. An inverted interval yields an empty list.
#[must_use]
pub fn range(start: i64, end: i64, _step: i64) -> Vec<i64> {
    if start > end {
        return Vec::new();
    }
    (start..=end).collect()
}

/// Which parameter vector of a patch a table applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamField {
    Knob,
    Fx,
    Lfo,
}

impl fmt::Display for ParamField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Knob => "engine",
            Self::Fx => "fx",
            Self::Lfo => "lfo",
        };
        f.write_str(label)
    }
}

/// A named engine, effect or LFO type with its parameter table.
pub trait Variant: Copy + 'static {
    const KIND: &'static str;
    const FIELD: ParamField;
    const ALL: &'static [Self];

    fn name(self) -> &'static str;
    fn table(self) -> &'static [ValueSet];

    fn from_name(name: &str) -> Result<Self, ValidationError> {
        Self::ALL
            .iter()
            .copied()
            .find(|variant| variant.name() == name)
            .ok_or_else(|| ValidationError::UnknownVariant {
                kind: Self::KIND,
                name: name.to_string(),
            })
    }

    /// Check each constrained position of `params`, failing on the first violation.
    fn check(self, params: &[i64]) -> Result<(), ValidationError> {
        for (index, (allowed, value)) in self.table().iter().zip(params).enumerate() {
            if !allowed.contains(*value) {
                return Err(ValidationError::ParamNotAllowed {
                    field: Self::FIELD,
                    variant: self.name(),
                    index,
                    value: *value,
                    min: allowed.min(),
                    max: allowed.max(),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    Cluster,
    Digital,
    Dna,
    Drwave,
    Sampler,
}

impl Engine {
    /// Engines that synthesize sound rather than play back a recording.
    pub const OSCILLATORS: &'static [Self] = &[Self::Cluster, Self::Digital, Self::Dna, Self::Drwave];
}

const CLUSTER_KNOBS: &[ValueSet] = &[
    span(3072, 17408, 128),
    span(0, 32767, 128),
    span(512, 24064, 128),
    span(3, 1638, 128),
];

const DIGITAL_KNOBS: &[ValueSet] = &[
    span(0, 32767, 128),
    span(2048, 26624, 128),
    span(-32768, 32767, 128),
    span(0, 32767, 128),
];

const DNA_KNOBS: &[ValueSet] = &[
    span(-29491, 32767, 128),
    span(4608, 12800, 128),
    span(0, 32767, 128),
    span(0, 32767, 128),
];

const DRWAVE_KNOBS: &[ValueSet] = &[
    span(0, 32767, 128),
    span(0, 32767, 128),
    span(0, 32767, 128),
    span(0, 32767, 128),
    span(32000, 32000, 128),
];

const SAMPLER_KNOBS: &[ValueSet] = &[
    span(0, 32767, 128),
    span(0, 32767, 128),
    span(0, 32767, 128),
    span(0, 32767, 128),
];

impl Variant for Engine {
    const KIND: &'static str = "engine";
    const FIELD: ParamField = ParamField::Knob;
    const ALL: &'static [Self] = &[
        Self::Cluster,
        Self::Digital,
        Self::Dna,
        Self::Drwave,
        Self::Sampler,
    ];

    fn name(self) -> &'static str {
        match self {
            Self::Cluster => "cluster",
            Self::Digital => "digital",
            Self::Dna => "dna",
            Self::Drwave => "drwave",
            Self::Sampler => "sampler",
        }
    }

    fn table(self) -> &'static [ValueSet] {
        match self {
            Self::Cluster => CLUSTER_KNOBS,
            Self::Digital => DIGITAL_KNOBS,
            Self::Dna => DNA_KNOBS,
            Self::Drwave => DRWAVE_KNOBS,
            Self::Sampler => SAMPLER_KNOBS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    Nitro,
    Cwo,
    Delay,
    Grid,
}

const NITRO_PARAMS: &[ValueSet] = &[
    span(64, 16448, 128),
    span(-32768, 32768, 512),
    span(0, 20643, 128),
    span(64, 16448, 128),
];

const CWO_PARAMS: &[ValueSet] = &[
    span(0, 32767, 128),
    span(0, 32767, 128),
    span(0, 32767, 128),
    span(0, 32767, 128),
];

const DELAY_PARAMS: &[ValueSet] = &[
    span(1024, 11264, 128),
    span(3276, 32767, 128),
    span(0, 16384, 128),
    span(0, 32767, 128),
];

const GRID_PARAMS: &[ValueSet] = &[
    span(1344, 16704, 128),
    span(1344, 16704, 128),
    span(0, 32767, 128),
    span(0, 32767, 128),
    span(8000, 8000, 128),
    span(8000, 8000, 128),
    span(8000, 8000, 128),
    span(8000, 8000, 128),
];

impl Variant for Effect {
    const KIND: &'static str = "fx";
    const FIELD: ParamField = ParamField::Fx;
    const ALL: &'static [Self] = &[Self::Nitro, Self::Cwo, Self::Delay, Self::Grid];

    fn name(self) -> &'static str {
        match self {
            Self::Nitro => "nitro",
            Self::Cwo => "cwo",
            Self::Delay => "delay",
            Self::Grid => "grid",
        }
    }

    fn table(self) -> &'static [ValueSet] {
        match self {
            Self::Nitro => NITRO_PARAMS,
            Self::Cwo => CWO_PARAMS,
            Self::Delay => DELAY_PARAMS,
            Self::Grid => GRID_PARAMS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lfo {
    Element,
    #[serde(alias = "tremelo")]
    Tremolo,
    Value,
    Random,
}

const ELEMENT_PARAMS: &[ValueSet] = &[
    // sum, adsr, g, mic
    ValueSet::Discrete(&[7168, 5056, 5280, 2000, 2144]),
    span(-32767, 32767, 512),
    // wave, adsr, fx, sound
    ValueSet::Discrete(&[1024, 2000, 2448, 5056, 7168]),
    // blue, green, white, red
    ValueSet::Discrete(&[1024, 2000, 5056, 5824, 10526, 15360]),
];

// Speed reaches down to the factory drum kit's 16000.
const TREMOLO_PARAMS: &[ValueSet] = &[
    span(0, 32767, 512),
    span(-32767, 32767, 512),
    span(-32767, 32767, 512),
];

const VALUE_PARAMS: &[ValueSet] = &[
    span(0, 32767, 512),
    span(0, 32767, 512),
    span(0, 32767, 512),
    span(0, 32767, 512),
];

const RANDOM_PARAMS: &[ValueSet] = &[
    span(0, 32767, 512),
    span(0, 32767, 512),
    span(0, 32767, 512),
    span(0, 32767, 512),
];

impl Variant for Lfo {
    const KIND: &'static str = "lfo";
    const FIELD: ParamField = ParamField::Lfo;
    const ALL: &'static [Self] = &[Self::Element, Self::Tremolo, Self::Value, Self::Random];

    fn name(self) -> &'static str {
        match self {
            Self::Element => "element",
            Self::Tremolo => "tremolo",
            Self::Value => "value",
            Self::Random => "random",
        }
    }

    fn table(self) -> &'static [ValueSet] {
        match self {
            Self::Element => ELEMENT_PARAMS,
            Self::Tremolo => TREMOLO_PARAMS,
            Self::Value => VALUE_PARAMS,
            Self::Random => RANDOM_PARAMS,
        }
    }
}

macro_rules! impl_from_str {
    ($($variant:ty),*) => {
        $(
            impl FromStr for $variant {
                type Err = ValidationError;

                fn from_str(name: &str) -> Result<Self, Self::Err> {
                    Self::from_name(name)
                }
            }

            impl fmt::Display for $variant {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.name())
                }
            }
        )*
    };
}

impl_from_str!(Engine, Effect, Lfo);

/// Positions of the ADSR vector that carry a constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdsrSlot {
    Attack,
    Decay,
    Sustain,
    Release,
    Playmode,
    Portamento,
}

impl AdsrSlot {
    pub const ALL: [Self; 6] = [
        Self::Attack,
        Self::Decay,
        Self::Sustain,
        Self::Release,
        Self::Playmode,
        Self::Portamento,
    ];

    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[must_use]
    pub fn allowed(self) -> &'static ValueSet {
        &ADSR_TABLE[self.index()]
    }
}

const ADSR_TABLE: [ValueSet; 6] = [
    span(64, 16320, 512),
    span(64, 16320, 512),
    span(0, 32767, 512),
    span(64, 16320, 512),
    // poly, mono, legato, unison
    ValueSet::Discrete(&[2048, 5120, 11264, 14336]),
    // off, 1, 127
    ValueSet::Discrete(&[64, 192, 6140]),
];
