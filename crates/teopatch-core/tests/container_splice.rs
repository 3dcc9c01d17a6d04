use proptest::prelude::*;
use teopatch_core::{
    ContainerLayout, DrumPatch, Patch, PatchError,
    container::{AUDIO_TAG, METADATA_TAG, find_tag, patch_container, read_metadata, splice_metadata},
    fixtures::silent_aiff,
};

fn form_size_field(bytes: &[u8]) -> usize {
    u32::from_be_bytes(bytes[4..8].try_into().expect("form header has a size field")) as usize
}

/// Filler growths needed when the first build leaves `first_total` unaligned.
fn expected_rounds(first_total: usize) -> usize {
    (4 - first_total % 4) % 4
}

/// Form size of the first build: one filler byte, chunk header and vendor magic.
fn first_total(input: &[u8], metadata_len: usize) -> usize {
    input.len() - 8 + 8 + 4 + metadata_len + 1
}

#[test]
fn spliced_container_keeps_size_and_audio_invariants() {
    let input = silent_aiff(441, 1, 44_100);
    let metadata = br#"{"name":"kick"}"#;
    let spliced = splice_metadata(&input, metadata, &ContainerLayout::default())
        .expect("splice should succeed");
    let output = &spliced.bytes;

    assert_eq!((output.len() - 8) % 4, 0);
    assert_eq!(form_size_field(output), output.len() - 8);
    assert_eq!(&output[..4], b"FORM");

    let input_audio = find_tag(&input, &AUDIO_TAG).expect("fixture has SSND");
    let chunk_end = spliced.metadata_offset + 8 + 4 + metadata.len() + spliced.filler_len;
    assert_eq!(&output[chunk_end..], &input[input_audio..]);
    assert_eq!(&output[8..input_audio], &input[8..input_audio]);
    assert_eq!(read_metadata(output).expect("metadata present"), metadata);
}

#[test]
fn residue_three_needs_exactly_one_filler_growth() {
    let input = silent_aiff(100, 1, 44_100);
    let metadata_len = (0..4)
        .find(|len| first_total(&input, *len) % 4 == 3)
        .expect("some length leaves residue 3");
    let metadata = vec![b'x'; metadata_len];

    let spliced = splice_metadata(&input, &metadata, &ContainerLayout::default())
        .expect("splice should succeed");
    assert_eq!(spliced.padding_rounds, 1);
    assert_eq!(spliced.filler_len, 2);
}

#[test]
fn padding_rounds_follow_first_build_residue() {
    let input = silent_aiff(100, 1, 44_100);
    for metadata_len in 0..12 {
        let metadata = vec![b'x'; metadata_len];
        let spliced = splice_metadata(&input, &metadata, &ContainerLayout::default())
            .expect("splice should succeed");
        let expected = expected_rounds(first_total(&input, metadata_len));
        assert_eq!(spliced.padding_rounds, expected, "metadata length {metadata_len}");
        assert!(spliced.padding_rounds <= 3);
        assert_eq!(spliced.filler_len, 1 + expected);
    }
}

#[test]
fn alignment_two_converges_in_one_round_at_most() {
    let input = silent_aiff(100, 2, 44_100);
    let layout = ContainerLayout {
        alignment: 2,
        ..ContainerLayout::default()
    };
    for metadata_len in 0..4 {
        let spliced = splice_metadata(&input, &vec![b'y'; metadata_len], &layout)
            .expect("splice should succeed");
        assert_eq!((spliced.bytes.len() - 8) % 2, 0);
        assert!(spliced.padding_rounds <= 1);
    }
}

#[test]
fn container_without_audio_chunk_is_rejected() {
    let mut input = silent_aiff(10, 1, 44_100);
    let audio = find_tag(&input, &AUDIO_TAG).expect("fixture has SSND");
    input.truncate(audio);

    let error = splice_metadata(&input, b"{}", &ContainerLayout::default())
        .expect_err("missing SSND must fail");
    assert!(matches!(error, PatchError::MissingChunk { tag: "SSND" }));
    assert_eq!(error.to_string(), "no SSND chunk found");
}

#[test]
fn repatching_replaces_previous_metadata() {
    let input = silent_aiff(64, 1, 44_100);
    let layout = ContainerLayout::default();
    let first = patch_container(&input, br#"{"name":"first"}"#, &layout).expect("first patch");
    let second = patch_container(&first.bytes, br#"{"name":"second, longer"}"#, &layout)
        .expect("second patch");

    let appl_count = second
        .bytes
        .windows(4)
        .filter(|window| *window == METADATA_TAG)
        .count();
    assert_eq!(appl_count, 1);
    assert_eq!(
        read_metadata(&second.bytes).expect("metadata present"),
        br#"{"name":"second, longer"}"#
    );
    assert_eq!(form_size_field(&second.bytes), second.bytes.len() - 8);

    let audio = find_tag(&input, &AUDIO_TAG).expect("fixture has SSND");
    assert!(second.bytes.ends_with(&input[audio..]));
}

#[test]
fn repatching_ignores_audio_tag_inside_previous_patch_json() {
    let input = silent_aiff(64, 1, 44_100);
    let layout = ContainerLayout::default();
    let mut tagged = DrumPatch::new_default();
    tagged.name = "SSND kit".to_string();
    let first = patch_container(
        &input,
        &tagged.metadata_bytes().expect("tagged kit serializes"),
        &layout,
    )
    .expect("first patch");

    let replacement = DrumPatch::new_default()
        .metadata_bytes()
        .expect("default kit serializes");
    let second = patch_container(&first.bytes, &replacement, &layout).expect("second patch");
    let output = &second.bytes;

    let audio_tags = output
        .windows(4)
        .filter(|window| *window == AUDIO_TAG)
        .count();
    assert_eq!(audio_tags, 1);
    assert_eq!(read_metadata(output).expect("metadata present"), replacement.as_slice());

    let input_audio = find_tag(&input, &AUDIO_TAG).expect("fixture has SSND");
    let chunk_end = second.metadata_offset + 8 + 4 + replacement.len() + second.filler_len;
    assert_eq!(&output[chunk_end..], &input[input_audio..]);
    assert_eq!(&output[..second.metadata_offset][8..], &input[8..input_audio]);
    assert_eq!(form_size_field(output), output.len() - 8);
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        .. ProptestConfig::default()
    })]

    #[test]
    fn splice_invariants_hold_for_any_payload(
        frames in 0u32..512,
        channels in 1u16..3,
        metadata in prop::collection::vec(any::<u8>(), 0..300),
    ) {
        let input = silent_aiff(frames, channels, 44_100);
        let spliced = splice_metadata(&input, &metadata, &ContainerLayout::default())
            .expect("splice should succeed");
        let output = &spliced.bytes;

        prop_assert_eq!((output.len() - 8) % 4, 0);
        prop_assert_eq!(form_size_field(output), output.len() - 8);
        prop_assert!(spliced.padding_rounds <= 3);

        let input_audio = find_tag(&input, &AUDIO_TAG).expect("fixture has SSND");
        prop_assert!(output.ends_with(&input[input_audio..]));
        let declared = u32::from_be_bytes(
            output[spliced.metadata_offset + 4..spliced.metadata_offset + 8]
                .try_into()
                .expect("chunk size field"),
        ) as usize;
        prop_assert_eq!(declared, 4 + metadata.len() + spliced.filler_len);
    }
}
