use rand::{Rng, SeedableRng, rngs::StdRng, seq::SliceRandom};
use tracing::{debug, instrument};

use crate::{
    model::SynthPatch,
    schema::{AdsrSlot, Effect, Engine, Lfo, ValueSet, Variant},
};

impl SynthPatch {
    /// A valid oscillator patch with every constrained parameter drawn at random.
    ///
    /// The same seed always yields the same patch.
    #[instrument]
    #[must_use]
    pub fn random(seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let patch = Self::random_with(&mut rng);
        debug!(name = %patch.name, engine = %patch.engine, "random synth patch generated");
        patch
    }

    pub fn random_with<R: Rng>(rng: &mut R) -> Self {
        let mut patch = Self::oscillator();

        for slot in AdsrSlot::ALL {
            patch.adsr[slot.index()] = draw(slot.allowed(), rng);
        }

        // An empty choice list keeps the baseline variant.
        pick(&mut patch.engine, Engine::OSCILLATORS, rng);
        fill(&mut patch.knobs, patch.engine.table(), rng);

        pick(&mut patch.fx_type, Effect::ALL, rng);
        fill(&mut patch.fx_params, patch.fx_type.table(), rng);
        patch.fx_active = true;

        pick(&mut patch.lfo_type, Lfo::ALL, rng);
        fill(&mut patch.lfo_params, patch.lfo_type.table(), rng);
        patch.lfo_active = true;

        patch.name = patch.encode().digest().to_string();
        patch
    }
}

fn pick<T: Copy, R: Rng>(slot: &mut T, choices: &[T], rng: &mut R) {
    if let Some(choice) = choices.choose(rng) {
        *slot = *choice;
    }
}

fn fill<R: Rng>(params: &mut [i32], table: &[ValueSet], rng: &mut R) {
    for (param, allowed) in params.iter_mut().zip(table) {
        *param = draw(allowed, rng);
    }
}

fn draw<R: Rng>(allowed: &ValueSet, rng: &mut R) -> i32 {
    // Table bounds all fit in i32.
    i32::try_from(allowed.sample(rng)).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use crate::model::Patch;

    use super::*;

    #[test]
    fn random_patches_validate() {
        for seed in 0..64 {
            let patch = SynthPatch::random(seed);
            patch
                .validate()
                .unwrap_or_else(|error| panic!("seed {seed} produced invalid patch: {error}"));
            assert!(patch.fx_active && patch.lfo_active);
            assert_ne!(patch.engine, Engine::Sampler);
        }
    }

    #[test]
    fn empty_choices_keep_the_current_value() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut engine = Engine::Cluster;
        pick(&mut engine, &[], &mut rng);
        assert_eq!(engine, Engine::Cluster);
        pick(&mut engine, &[Engine::Dna], &mut rng);
        assert_eq!(engine, Engine::Dna);
    }

    #[test]
    fn same_seed_same_patch() {
        assert_eq!(SynthPatch::random(43), SynthPatch::random(43));
        assert_eq!(SynthPatch::random(43).name.len(), 8);
    }
}
