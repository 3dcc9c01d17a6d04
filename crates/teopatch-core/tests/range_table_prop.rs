use proptest::prelude::*;
use rand::{SeedableRng, rngs::StdRng};
use teopatch_core::{AdsrSlot, Effect, Engine, Lfo, Patch, SynthPatch, ValueSet, Variant, range};

fn all_tables() -> Vec<&'static [ValueSet]> {
    let mut tables: Vec<&'static [ValueSet]> = Vec::new();
    tables.extend(Engine::ALL.iter().map(|engine| engine.table()));
    tables.extend(Effect::ALL.iter().map(|effect| effect.table()));
    tables.extend(Lfo::ALL.iter().map(|lfo| lfo.table()));
    tables
}

#[test]
fn every_variant_name_round_trips() {
    for engine in Engine::ALL {
        assert_eq!(Engine::from_name(engine.name()), Ok(*engine));
    }
    for effect in Effect::ALL {
        assert_eq!(Effect::from_name(effect.name()), Ok(*effect));
    }
    for lfo in Lfo::ALL {
        assert_eq!(Lfo::from_name(lfo.name()), Ok(*lfo));
    }
}

#[test]
fn table_bounds_are_ordered() {
    for table in all_tables() {
        for allowed in table {
            assert!(allowed.min() <= allowed.max());
            assert!(allowed.contains(allowed.min()));
            assert!(allowed.contains(allowed.max()));
        }
    }
    for slot in AdsrSlot::ALL {
        assert!(slot.allowed().min() <= slot.allowed().max());
    }
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        .. ProptestConfig::default()
    })]

    #[test]
    fn range_starts_and_ends_on_its_bounds(
        start in -40_000i64..40_000,
        width in 0i64..2_000,
        step in 1i64..1_024,
    ) {
        let end = start + width;
        let values = range(start, end, step);
        prop_assert_eq!(values.first().copied(), Some(start));
        prop_assert_eq!(values.last().copied(), Some(end));
        prop_assert_eq!(values.len() as i64, width + 1);
    }

    #[test]
    fn inverted_range_is_empty(start in -1_000i64..1_000, gap in 1i64..1_000) {
        prop_assert!(range(start, start - gap, 1).is_empty());
    }

    #[test]
    fn samples_stay_inside_their_value_set(seed in any::<u64>()) {
        let mut rng = StdRng::seed_from_u64(seed);
        for table in all_tables() {
            for allowed in table {
                let value = allowed.sample(&mut rng);
                prop_assert!(allowed.contains(value));
            }
        }
    }

    #[test]
    fn random_synth_patches_always_validate(seed in any::<u64>()) {
        let patch = SynthPatch::random(seed);
        prop_assert_eq!(patch.validate(), Ok(()));
        let encoded = patch.encode();
        prop_assert_eq!(patch.name.as_str(), encoded.digest());
    }
}
