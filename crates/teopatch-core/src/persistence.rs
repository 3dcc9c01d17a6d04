use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use tracing::{debug, info, instrument};

use crate::{
    container::{self, ContainerLayout, SplicedContainer},
    error::PatchError,
    model::{DrumPatch, Patch, SynthPatch},
};

const CONTAINER_EXTENSIONS: [&str; 2] = ["aif", "aiff"];

#[must_use]
pub fn is_container_path(path: &Path) -> bool {
    path.extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| {
            CONTAINER_EXTENSIONS
                .iter()
                .any(|allowed| extension.eq_ignore_ascii_case(allowed))
        })
}

/// Validate `patch`, splice it into the audio container at `audio_path` and write the
/// result to `out_path`.
///
/// Nothing is written when validation or splicing fails. The output replaces any
/// existing file atomically.
#[instrument(
    skip(patch, layout),
    fields(kind = P::LABEL, name = patch.name(), audio = %audio_path.display(), out = %out_path.display())
)]
pub fn save_patch<P: Patch>(
    patch: &P,
    audio_path: &Path,
    out_path: &Path,
    layout: &ContainerLayout,
) -> Result<SplicedContainer, PatchError> {
    if !is_container_path(out_path) {
        return Err(PatchError::InvalidOutputPath(out_path.to_path_buf()));
    }

    let metadata = patch.metadata_bytes()?;
    let audio = fs::read(audio_path).map_err(|error| PatchError::io(audio_path, error))?;
    let spliced = container::patch_container(&audio, &metadata, layout)?;

    write_atomically(out_path, &spliced.bytes)?;
    info!(
        bytes = spliced.bytes.len(),
        padding_rounds = spliced.padding_rounds,
        "patch saved"
    );
    Ok(spliced)
}

pub fn save_drum_patch(
    patch: &DrumPatch,
    audio_path: &Path,
    out_path: &Path,
    layout: &ContainerLayout,
) -> Result<SplicedContainer, PatchError> {
    save_patch(patch, audio_path, out_path, layout)
}

pub fn save_synth_patch(
    patch: &SynthPatch,
    audio_path: &Path,
    out_path: &Path,
    layout: &ContainerLayout,
) -> Result<SplicedContainer, PatchError> {
    save_patch(patch, audio_path, out_path, layout)
}

/// Read and validate the patch carried by a patch file.
#[instrument(fields(kind = P::LABEL, path = %path.display()))]
pub fn load_patch<P: Patch>(path: &Path) -> Result<P, PatchError> {
    let bytes = fs::read(path).map_err(|error| PatchError::io(path, error))?;
    let patch = P::from_json_bytes(container::read_metadata(&bytes)?)?;
    patch.validate()?;
    debug!(name = patch.name(), "patch loaded");
    Ok(patch)
}

pub fn load_synth_patch(path: &Path) -> Result<SynthPatch, PatchError> {
    load_patch(path)
}

pub fn load_drum_patch(path: &Path) -> Result<DrumPatch, PatchError> {
    load_patch(path)
}

fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), PatchError> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    fs::create_dir_all(&parent).map_err(|error| PatchError::io(&parent, error))?;

    let mut temp_file =
        tempfile::NamedTempFile::new_in(&parent).map_err(|error| PatchError::io(&parent, error))?;
    temp_file
        .write_all(bytes)
        .map_err(|error| PatchError::io(temp_file.path(), error))?;
    temp_file
        .persist(path)
        .map_err(|error| PatchError::io(path, error.error))?;
    Ok(())
}
