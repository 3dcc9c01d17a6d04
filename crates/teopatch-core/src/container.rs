//! Splicing patch metadata into an IFF-style (`FORM`/`AIFF`) audio container.
//!
//! Only two chunks matter here: the vendor `APPL` chunk that carries the patch JSON and
//! the `SSND` audio chunk it must precede. Everything else is copied untouched.

use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};

use crate::error::PatchError;

pub const FORM_TAG: [u8; 4] = *b"FORM";
pub const METADATA_TAG: [u8; 4] = *b"APPL";
pub const AUDIO_TAG: [u8; 4] = *b"SSND";
pub const VENDOR_MAGIC: [u8; 4] = *b"op-1";
pub const FIRST_FILLER: u8 = 10;
pub const FILLER: u8 = 30;
pub const DEFAULT_ALIGNMENT: usize = 4;
pub const MAX_PADDING_ITERATIONS: usize = 8;

/// Tag plus big-endian size field, both for chunks and the form header.
const HEADER_LEN: usize = 8;
const FORM_SIZE_OFFSET: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerLayout {
    /// The form size (file length minus 8) must be a multiple of this.
    pub alignment: usize,
    /// Upper bound on rebuild attempts before the padding loop is declared broken.
    pub max_padding_iterations: usize,
}

impl Default for ContainerLayout {
    fn default() -> Self {
        Self {
            alignment: DEFAULT_ALIGNMENT,
            max_padding_iterations: MAX_PADDING_ITERATIONS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplicedContainer {
    pub bytes: Vec<u8>,
    /// Offset of the inserted `APPL` tag.
    pub metadata_offset: usize,
    pub filler_len: usize,
    /// Filler bytes added after the first build to reach alignment.
    pub padding_rounds: usize,
}

impl SplicedContainer {
    #[must_use]
    pub fn form_size(&self) -> Option<u32> {
        form_size(&self.bytes)
    }
}

/// Offset of the first occurrence of `tag`.
#[must_use]
pub fn find_tag(bytes: &[u8], tag: &[u8; 4]) -> Option<usize> {
    bytes.windows(tag.len()).position(|window| window == tag)
}

/// The big-endian size field at offset 4.
#[must_use]
pub fn form_size(bytes: &[u8]) -> Option<u32> {
    read_u32_be(bytes, FORM_SIZE_OFFSET)
}

fn read_u32_be(bytes: &[u8], offset: usize) -> Option<u32> {
    let field: [u8; 4] = bytes.get(offset..offset + 4)?.try_into().ok()?;
    Some(u32::from_be_bytes(field))
}

/// Offset of the first chunk header: past `FORM`, the form size and the form type.
const FIRST_CHUNK_OFFSET: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ChunkHeader {
    offset: usize,
    tag: [u8; 4],
    /// Offset of the following chunk header, pad byte included.
    next: usize,
}

/// Walks chunk headers from the first chunk onward.
///
/// Stops at the first header that is truncated or whose tag is not printable ASCII, so
/// a corrupted size field ends the walk instead of producing garbage chunks.
struct ChunkWalker<'a> {
    bytes: &'a [u8],
    offset: Option<usize>,
}

impl<'a> ChunkWalker<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            offset: Some(FIRST_CHUNK_OFFSET),
        }
    }

    fn looks_like_tag(&self, offset: usize) -> bool {
        self.bytes
            .get(offset..offset.saturating_add(4))
            .is_some_and(|tag| tag.iter().all(|byte| byte.is_ascii_graphic() || *byte == b' '))
    }
}

impl Iterator for ChunkWalker<'_> {
    type Item = ChunkHeader;

    fn next(&mut self) -> Option<ChunkHeader> {
        let offset = self.offset.take()?;
        if !self.looks_like_tag(offset) {
            return None;
        }
        let tag: [u8; 4] = self.bytes.get(offset..offset + 4)?.try_into().ok()?;
        let size = read_u32_be(self.bytes, offset + 4)? as usize;

        let unpadded = offset.checked_add(HEADER_LEN)?.checked_add(size)?;
        // Odd chunks may or may not carry the IFF pad byte.
        let next = if size % 2 == 1 && self.looks_like_tag(unpadded + 1) {
            unpadded + 1
        } else {
            unpadded
        };
        if next < self.bytes.len() {
            self.offset = Some(next);
        }
        Some(ChunkHeader { offset, tag, next })
    }
}

/// Position of the audio chunk.
///
/// Follows the chunk headers first, so tag bytes inside another chunk's payload are never
/// mistaken for the audio chunk. Falls back to a byte scan past the form header when the
/// headers are broken before the audio chunk.
fn audio_chunk_offset(container: &[u8]) -> Result<usize, PatchError> {
    if let Some(chunk) = ChunkWalker::new(container).find(|chunk| chunk.tag == AUDIO_TAG) {
        return Ok(chunk.offset);
    }
    container
        .get(HEADER_LEN..)
        .and_then(|body| find_tag(body, &AUDIO_TAG))
        .map(|offset| offset + HEADER_LEN)
        .ok_or(PatchError::MissingChunk { tag: "SSND" })
}

/// Remove a metadata chunk that sits before the audio chunk.
///
/// The chunk is removed by its declared size. A size running past the audio chunk is
/// clamped to it. The form size is left as it was; [`splice_metadata`] rewrites it.
#[instrument(skip(container), fields(len = container.len()))]
pub fn strip_metadata(container: &[u8]) -> Result<Vec<u8>, PatchError> {
    let audio = audio_chunk_offset(container)?;
    let walked = ChunkWalker::new(container)
        .take_while(|chunk| chunk.offset < audio)
        .find(|chunk| chunk.tag == METADATA_TAG)
        .map(|chunk| (chunk.offset, chunk.next));
    let scanned = || {
        let metadata = find_tag(&container[HEADER_LEN..audio], &METADATA_TAG)? + HEADER_LEN;
        let declared =
            read_u32_be(container, metadata + 4).map_or(usize::MAX, |size| size as usize);
        Some((
            metadata,
            metadata.saturating_add(HEADER_LEN).saturating_add(declared),
        ))
    };
    let Some((metadata, end)) = walked.or_else(scanned) else {
        return Ok(container.to_vec());
    };
    let end = end.min(audio);

    let mut stripped = Vec::with_capacity(container.len() - (end - metadata));
    stripped.extend_from_slice(&container[..metadata]);
    stripped.extend_from_slice(&container[end..]);
    debug!(removed = end - metadata, "existing metadata chunk removed");
    Ok(stripped)
}

/// Insert a metadata chunk right before the audio chunk and fix up the form size.
///
/// The chunk is `APPL`, a size of `4 + metadata + filler`, the vendor magic, the
/// metadata and the filler. Filler starts as one byte and grows one byte per round
/// until the form size is aligned.
#[instrument(skip(container, metadata), fields(container_len = container.len(), metadata_len = metadata.len()))]
pub fn splice_metadata(
    container: &[u8],
    metadata: &[u8],
    layout: &ContainerLayout,
) -> Result<SplicedContainer, PatchError> {
    let audio = audio_chunk_offset(container)?;
    let alignment = layout.alignment.max(1);

    let mut filler = vec![FIRST_FILLER];
    for round in 0..layout.max_padding_iterations {
        let bytes = build_spliced(container, audio, metadata, &filler)?;
        let total = bytes.len() - HEADER_LEN;
        if total % alignment == 0 {
            debug!(total, filler = filler.len(), round, "metadata spliced");
            return Ok(SplicedContainer {
                bytes,
                metadata_offset: audio,
                filler_len: filler.len(),
                padding_rounds: round,
            });
        }
        filler.push(FILLER);
    }

    error!(
        iterations = layout.max_padding_iterations,
        alignment, "container padding failed to converge"
    );
    Err(PatchError::AlignmentDiverged {
        iterations: layout.max_padding_iterations,
        alignment,
    })
}

fn build_spliced(
    container: &[u8],
    audio: usize,
    metadata: &[u8],
    filler: &[u8],
) -> Result<Vec<u8>, PatchError> {
    let chunk_len = VENDOR_MAGIC.len() + metadata.len() + filler.len();
    let chunk_size =
        u32::try_from(chunk_len).map_err(|_| PatchError::ContainerTooLarge { len: chunk_len })?;

    let mut bytes = Vec::with_capacity(container.len() + HEADER_LEN + chunk_len);
    bytes.extend_from_slice(&container[..audio]);
    bytes.extend_from_slice(&METADATA_TAG);
    bytes.extend_from_slice(&chunk_size.to_be_bytes());
    bytes.extend_from_slice(&VENDOR_MAGIC);
    bytes.extend_from_slice(metadata);
    bytes.extend_from_slice(filler);
    bytes.extend_from_slice(&container[audio..]);

    let total_len = bytes.len() - HEADER_LEN;
    let total =
        u32::try_from(total_len).map_err(|_| PatchError::ContainerTooLarge { len: bytes.len() })?;
    bytes[FORM_SIZE_OFFSET..HEADER_LEN].copy_from_slice(&total.to_be_bytes());
    Ok(bytes)
}

/// Replace whatever patch the container carries with `metadata`.
pub fn patch_container(
    container: &[u8],
    metadata: &[u8],
    layout: &ContainerLayout,
) -> Result<SplicedContainer, PatchError> {
    let stripped = strip_metadata(container)?;
    splice_metadata(&stripped, metadata, layout)
}

/// The patch JSON stored in the container's vendor metadata chunk, without filler.
///
/// Chunks reached by following the headers are tried first, then any `APPL` tag found by
/// scanning, so files with a damaged chunk size can still be read.
pub fn read_metadata(container: &[u8]) -> Result<&[u8], PatchError> {
    if let Some(json) = ChunkWalker::new(container)
        .filter(|chunk| chunk.tag == METADATA_TAG)
        .find_map(|chunk| metadata_payload(container, chunk.offset))
    {
        return Ok(json);
    }

    let mut search_from = 0;
    while let Some(found) = container
        .get(search_from..)
        .and_then(|rest| find_tag(rest, &METADATA_TAG))
    {
        let offset = search_from + found;
        search_from = offset + 1;
        if let Some(json) = metadata_payload(container, offset) {
            return Ok(json);
        }
    }

    Err(PatchError::MissingChunk { tag: "APPL" })
}

fn metadata_payload(container: &[u8], offset: usize) -> Option<&[u8]> {
    let payload_start = offset.checked_add(HEADER_LEN)?;
    let size = read_u32_be(container, offset + 4)?;
    let payload_end = payload_start
        .saturating_add(size as usize)
        .min(container.len());
    let json = container
        .get(payload_start..payload_end)?
        .strip_prefix(&VENDOR_MAGIC[..])?;

    let json_end = json
        .iter()
        .rposition(|byte| *byte == b'}')
        .map_or(json.len(), |index| index + 1);
    Some(&json[..json_end])
}
