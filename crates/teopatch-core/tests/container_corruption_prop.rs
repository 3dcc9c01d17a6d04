use proptest::prelude::*;
use teopatch_core::{
    ContainerLayout, DrumPatch, Patch,
    container::{patch_container, read_metadata, splice_metadata, strip_metadata},
    fixtures::silent_aiff,
    load_drum_patch,
};

fn patched_fixture() -> Vec<u8> {
    let metadata = DrumPatch::new_default()
        .metadata_bytes()
        .expect("default drum patch serializes");
    patch_container(&silent_aiff(256, 1, 44_100), &metadata, &ContainerLayout::default())
        .expect("fixture should patch")
        .bytes
}

fn no_panic_parse(bytes: &[u8]) -> bool {
    std::panic::catch_unwind(|| {
        let _ = strip_metadata(bytes);
        let _ = read_metadata(bytes);
        let _ = splice_metadata(bytes, b"{}", &ContainerLayout::default());
    })
    .is_ok()
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        .. ProptestConfig::default()
    })]

    #[test]
    fn random_container_bytes_do_not_panic(raw in prop::collection::vec(any::<u8>(), 0..4096)) {
        prop_assert!(no_panic_parse(&raw));
    }
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        .. ProptestConfig::default()
    })]

    #[test]
    fn truncated_patch_files_do_not_panic(prefix_len in 0usize..4096usize) {
        let mut payload = patched_fixture();
        let truncated_len = prefix_len.min(payload.len());
        payload.truncate(truncated_len);
        prop_assert!(no_panic_parse(&payload));

        let temp = tempfile::tempdir().expect("tempdir should be creatable");
        let path = temp.path().join("truncated.aif");
        std::fs::write(&path, &payload).expect("writing truncated payload should work");
        let no_panic = std::panic::catch_unwind(|| {
            let _ = load_drum_patch(&path);
        })
        .is_ok();
        prop_assert!(no_panic);
    }
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        .. ProptestConfig::default()
    })]

    #[test]
    fn mutated_patch_files_do_not_panic(index in 0usize..4096usize, delta in any::<u8>()) {
        let mut payload = patched_fixture();
        if !payload.is_empty() {
            let target = index % payload.len();
            payload[target] = payload[target].wrapping_add(delta);
        }
        prop_assert!(no_panic_parse(&payload));
    }
}

#[test]
fn corrupted_size_field_in_metadata_chunk_is_tolerated() {
    let mut payload = patched_fixture();
    let appl = teopatch_core::container::find_tag(&payload, b"APPL").expect("APPL present");
    payload[appl + 4..appl + 8].copy_from_slice(&u32::MAX.to_be_bytes());

    let stripped = strip_metadata(&payload).expect("SSND still present");
    assert!(teopatch_core::container::find_tag(&stripped, b"APPL").is_none());
    let json = read_metadata(&payload).expect("payload clamps to file end");
    assert!(json.ends_with(b"}"));
}
