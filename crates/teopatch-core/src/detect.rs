//! Parsers for the text output of external silence and onset detectors.

use tracing::{debug, instrument, trace};

use crate::{
    error::PatchError,
    segments::{MIN_SEGMENT_SECONDS, Segment, filter_short},
    time::parse_timestamp,
};

/// Segments shorter than this are folded into their predecessor at the end of a
/// recording, and dropped when they end in silence.
pub const SHORT_TAIL_SECONDS: f64 = 0.25;

const SILENCE_END_MARKER: &str = "silence_end: ";
const PROGRESS_MARKER: &str = "time=";

/// One onset time in seconds per line; the last segment runs to `duration`.
///
/// Lines that don't parse and onsets at zero are ignored.
#[instrument(skip(text), fields(len = text.len()))]
pub fn parse_onsets(
    text: &str,
    duration: f64,
    source: Option<&str>,
) -> Result<Vec<Segment>, PatchError> {
    let mut segments = Vec::new();
    let mut start = 0.0;

    for line in text.lines() {
        let Some(onset) = line
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
        else {
            if !line.trim().is_empty() {
                trace!(line, "unparseable onset line");
            }
            continue;
        };
        if onset == 0.0 {
            continue;
        }
        segments.push(segment(start, onset, source));
        start = onset;
    }

    if start < duration {
        segments.push(segment(start, duration, source));
    }

    keep_long_enough(&segments)
}

/// Segments between the `silence_end` markers of an ffmpeg `silencedetect` run.
///
/// `correction` shifts every silence end. The final `time=` progress value closes the
/// last segment; a tail under [`SHORT_TAIL_SECONDS`] extends the previous segment instead.
#[instrument(skip(text), fields(len = text.len()))]
pub fn parse_silencedetect(
    text: &str,
    correction: f64,
    source: Option<&str>,
) -> Result<Vec<Segment>, PatchError> {
    let mut segments: Vec<Segment> = Vec::new();
    let mut start = 0.0;
    let mut progress = None;

    for line in text.split(['\n', '\r']) {
        if let Some(seconds) = field_after(line, SILENCE_END_MARKER) {
            let end = seconds + correction;
            if end - start > SHORT_TAIL_SECONDS {
                segments.push(segment(start, end, source));
            }
            start = end;
        } else if let Some(seconds) = field_after(line, PROGRESS_MARKER) {
            progress = Some(seconds);
        }
    }

    if let Some(end) = progress {
        match segments.last_mut() {
            Some(last) if end - start < SHORT_TAIL_SECONDS => last.end = end,
            _ => segments.push(segment(start, end, source)),
        }
    }

    keep_long_enough(&segments)
}

fn field_after(line: &str, marker: &str) -> Option<f64> {
    let (_, rest) = line.split_once(marker)?;
    let value = rest.split_whitespace().next()?;
    parse_timestamp(value)
}

fn segment(start: f64, end: f64, source: Option<&str>) -> Segment {
    Segment {
        start,
        end,
        source: source.map(str::to_string),
    }
}

fn keep_long_enough(segments: &[Segment]) -> Result<Vec<Segment>, PatchError> {
    let kept = filter_short(segments, MIN_SEGMENT_SECONDS);
    debug!(found = segments.len(), kept = kept.len(), "detector output parsed");
    if kept.is_empty() {
        return Err(PatchError::NoSegments);
    }
    Ok(kept)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SILENCEDETECT: &str = "\
Input #0, wav, from 'loop.wav':
[silencedetect @ 0x1] silence_start: 1.2
[silencedetect @ 0x1] silence_end: 1.5 | silence_duration: 0.3
[silencedetect @ 0x1] silence_start: 3.9
[silencedetect @ 0x1] silence_end: 4.1 | silence_duration: 0.2
size=N/A time=00:00:04.90 bitrate=N/A speed= 300x
";

    #[test]
    fn onsets_split_until_duration() {
        let segments = parse_onsets("0\n0.5\n1.25\nbogus\n\n", 2.0, Some("a.wav"))
            .expect("onsets should parse");
        let bounds: Vec<(f64, f64)> = segments.iter().map(|s| (s.start, s.end)).collect();
        assert_eq!(bounds, vec![(0.0, 0.5), (0.5, 1.25), (1.25, 2.0)]);
        assert!(segments.iter().all(|s| s.source.as_deref() == Some("a.wav")));
    }

    #[test]
    fn non_finite_onsets_are_ignored() {
        let segments =
            parse_onsets("0.5\nnan\ninf\n1.5\n", 2.0, None).expect("finite onsets parse");
        let bounds: Vec<(f64, f64)> = segments.iter().map(|s| (s.start, s.end)).collect();
        assert_eq!(bounds, vec![(0.0, 0.5), (0.5, 1.5), (1.5, 2.0)]);
    }

    #[test]
    fn onsets_drop_short_segments() {
        let segments = parse_onsets("0.05\n1.0\n", 1.0, None).expect("one segment remains");
        assert_eq!(segments, vec![Segment::new(0.05, 1.0)]);
    }

    #[test]
    fn no_usable_onsets_is_an_error() {
        assert!(matches!(
            parse_onsets("0.05\n", 0.1, None),
            Err(PatchError::NoSegments)
        ));
    }

    #[test]
    fn silencedetect_segments_with_correction() {
        let segments =
            parse_silencedetect(SILENCEDETECT, 0.0, None).expect("silencedetect should parse");
        let bounds: Vec<(f64, f64)> = segments.iter().map(|s| (s.start, s.end)).collect();
        assert_eq!(bounds, vec![(0.0, 1.5), (1.5, 4.1), (4.1, 4.9)]);

        let shifted =
            parse_silencedetect(SILENCEDETECT, 0.1, None).expect("silencedetect should parse");
        assert!((shifted[0].end - 1.6).abs() < 1e-9);
        assert!((shifted[1].start - 1.6).abs() < 1e-9);
    }

    #[test]
    fn short_tail_extends_previous_segment() {
        let text = "silence_end: 2.0 | x\nsize=N/A time=00:00:02.10 bitrate=N/A\n";
        let segments = parse_silencedetect(text, 0.0, None).expect("one segment");
        assert_eq!(segments, vec![Segment::new(0.0, 2.1)]);
    }

    #[test]
    fn progress_carriage_returns_use_final_time() {
        let text = "silence_end: 1.0 | x\ntime=00:00:01.50 bitrate=1\rtime=00:00:03.00 bitrate=1\r\n";
        let segments = parse_silencedetect(text, 0.0, None).expect("segments");
        assert_eq!(segments, vec![Segment::new(0.0, 1.0), Segment::new(1.0, 3.0)]);
    }
}
