// Aggregation Logic
// Places detector findings on the analyzed content as non-overlapping spans

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::{BiasSegment, TextSpan};
use crate::services::text_processor::preview;

/// How a finding is located in the content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    /// Substring search; the first unclaimed occurrence wins.
    #[default]
    FirstOccurrence,
    /// Trust spans assigned from segmenter offsets; substring search is the fallback.
    SentenceOffsets,
}

/// NaN becomes unset, everything else is clamped to `[0, 1]`.
pub fn sanitize_score(score: Option<f64>) -> Option<f64> {
    match score {
        Some(v) if v.is_nan() => None,
        Some(v) => Some(v.clamp(0.0, 1.0)),
        None => None,
    }
}

fn is_claimed(claimed: &[TextSpan], span: &TextSpan) -> bool {
    claimed.iter().any(|c| c.overlaps(span))
}

fn valid_offset_span(content: &str, seg: &BiasSegment) -> Option<TextSpan> {
    let span = seg.span?;
    if span.is_empty() || span.end > content.len() {
        return None;
    }
    match content.get(span.start..span.end) {
        Some(slice) if slice == seg.text => Some(span),
        _ => None,
    }
}

fn claim_first_free(content: &str, text: &str, claimed: &[TextSpan]) -> Option<TextSpan> {
    content
        .match_indices(text)
        .map(|(start, m)| TextSpan::new(start, start + m.len()))
        .find(|span| !is_claimed(claimed, span))
}

/// Order findings by first occurrence, resolve overlaps and attach spans.
///
/// Findings are visited in reverse document order; each claims the first
/// occurrence of its text not overlapping an earlier claim. Findings that
/// cannot be placed are dropped. Output is sorted by span start.
pub fn aggregate_segments(
    content: &str,
    segments: Vec<BiasSegment>,
    placement: Placement,
) -> Vec<BiasSegment> {
    if content.is_empty() || segments.is_empty() {
        return Vec::new();
    }

    let mut keyed: Vec<(usize, BiasSegment)> = Vec::with_capacity(segments.len());
    for mut seg in segments {
        seg.score = sanitize_score(seg.score);
        if seg.text.trim().is_empty() {
            debug!("[AGGREGATION] dropping empty finding: {}", seg.reason);
            continue;
        }
        let key = match placement {
            Placement::SentenceOffsets => valid_offset_span(content, &seg).map(|s| s.start),
            Placement::FirstOccurrence => None,
        }
        .or_else(|| content.find(seg.text.as_str()));

        match key {
            Some(k) => keyed.push((k, seg)),
            None => debug!(
                "[AGGREGATION] finding not found in content, dropped: '{}'",
                preview(&seg.text, 60)
            ),
        }
    }

    // Stable: equal keys keep detector order.
    keyed.sort_by_key(|(k, _)| *k);

    let mut claimed: Vec<TextSpan> = Vec::with_capacity(keyed.len());
    let mut placed: Vec<BiasSegment> = Vec::with_capacity(keyed.len());

    for (_, mut seg) in keyed.into_iter().rev() {
        let offset_span = match placement {
            Placement::SentenceOffsets => valid_offset_span(content, &seg)
                .filter(|span| !is_claimed(&claimed, span)),
            Placement::FirstOccurrence => None,
        };
        let span = offset_span.or_else(|| claim_first_free(content, &seg.text, &claimed));

        match span {
            Some(span) => {
                claimed.push(span);
                seg.span = Some(span);
                placed.push(seg);
            }
            None => debug!(
                "[AGGREGATION] no free occurrence left, dropped: '{}'",
                preview(&seg.text, 60)
            ),
        }
    }

    placed.sort_by_key(|s| s.span.map(|sp| sp.start).unwrap_or(usize::MAX));
    placed
}
