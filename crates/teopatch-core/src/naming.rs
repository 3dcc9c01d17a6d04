//! Deterministic short names for synth patches.

use std::{fmt, sync::LazyLock};

use harsh::{BuildError, Harsh};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::error;

use crate::{model::SynthPatch, schema::Variant};

const HASHID_SALT: &str = "op-1";
const DIGEST_PREFIX_LEN: usize = 8;
const NAME_DELIMITER: char = '-';

static PATCH_HASHIDS: LazyLock<HashidEncoder> = LazyLock::new(|| {
    HashidEncoder::new(HASHID_SALT).unwrap_or_else(|error| {
        error!(?error, "salted hashids encoder rejected, falling back to the unsalted one");
        HashidEncoder(Harsh::default())
    })
});

/// Hashids over the stock alphabet, as the hardware's own naming uses.
pub struct HashidEncoder(Harsh);

impl HashidEncoder {
    pub fn new(salt: &str) -> Result<Self, BuildError> {
        Harsh::builder().salt(salt).build().map(Self)
    }

    /// The encoder patch names are built with.
    #[must_use]
    pub fn patch_names() -> &'static Self {
        &PATCH_HASHIDS
    }

    #[must_use]
    pub fn encode(&self, numbers: &[u64]) -> String {
        if numbers.is_empty() {
            return String::new();
        }
        self.0.encode(numbers)
    }

    /// Encode signed values as `(sign flag, magnitude)` pairs; 1 marks non-negative.
    #[must_use]
    pub fn encode_signed(&self, values: &[i64]) -> String {
        let numbers: Vec<u64> = values
            .iter()
            .flat_map(|value| [u64::from(*value >= 0), value.unsigned_abs()])
            .collect();
        self.encode(&numbers)
    }
}

/// `<8 hex digest chars>-<descriptor>` identifier for a synth patch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PatchName(String);

impl PatchName {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The digest segment alone, short enough for the hardware's name field.
    #[must_use]
    pub fn digest(&self) -> &str {
        self.0
            .split_once(NAME_DELIMITER)
            .map_or(self.0.as_str(), |(digest, _)| digest)
    }

    #[must_use]
    pub fn descriptor(&self) -> &str {
        self.0
            .split_once(NAME_DELIMITER)
            .map_or("", |(_, descriptor)| descriptor)
    }
}

impl fmt::Display for PatchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Name a patch from the fields that shape its sound. Octave and name do not count.
#[must_use]
pub fn encode(patch: &SynthPatch) -> PatchName {
    let hashids = HashidEncoder::patch_names();

    let mut descriptor = String::from(patch.engine.name());
    descriptor.push_str(&hashids.encode_signed(&patch.knobs_wide()[..4]));
    descriptor.push(NAME_DELIMITER);
    descriptor.push_str(&hashids.encode_signed(&patch.adsr_wide()[..4]));

    descriptor.push(NAME_DELIMITER);
    if patch.fx_active {
        descriptor.push_str(patch.fx_type.name());
        descriptor.push_str(&hashids.encode_signed(&patch.fx_params_wide()[..4]));
    }

    if patch.lfo_active {
        descriptor.push(NAME_DELIMITER);
        descriptor.push_str(patch.lfo_type.name());
        descriptor.push_str(&hashids.encode_signed(&patch.lfo_params_wide()[..4]));
    }

    let digest = format!("{:x}", Sha256::digest(descriptor.as_bytes()));
    PatchName(format!(
        "{}{NAME_DELIMITER}{descriptor}",
        &digest[..DIGEST_PREFIX_LEN]
    ))
}

impl SynthPatch {
    #[must_use]
    pub fn encode(&self) -> PatchName {
        encode(self)
    }
}
