// Sentence Segmenter
// Unicode (UAX #29) sentence boundaries with English abbreviation repair.
// Every sentence is a trimmed, verbatim slice of the input with exact byte offsets.

use serde::Serialize;
use unicode_segmentation::UnicodeSegmentation;

/// Abbreviations that never end a sentence: titles and in-sentence markers.
const ABBREVIATIONS: &[&str] = &[
    "mr.", "mrs.", "ms.", "dr.", "prof.", "st.", "gen.", "col.", "lt.", "sgt.", "capt.", "gov.",
    "sen.", "rep.", "rev.", "hon.", "pres.", "fig.", "vs.", "e.g.", "i.e.", "cf.", "mt.",
];

/// Abbreviations that may close a sentence; only lowercase or numeric text continues it.
const TERMINAL_ABBREVIATIONS: &[&str] = &[
    "etc.", "jr.", "sr.", "approx.", "ca.", "ft.", "inc.", "ltd.", "co.",
];

/// Capitalized words that usually open a new sentence rather than continue a name.
const SENTENCE_OPENERS: &[&str] = &[
    "a", "an", "the", "he", "she", "it", "they", "we", "i", "you", "this", "that", "these",
    "those", "there", "here", "his", "her", "its", "their", "our", "my", "but", "and", "or", "so",
    "yet", "however", "meanwhile", "then", "in", "on", "at", "after", "before", "when", "while",
    "if", "although", "some", "many", "most",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Sentence<'a> {
    pub text: &'a str,
    /// UTF-8 byte offset of the first non-whitespace byte.
    pub start: usize,
    /// UTF-8 byte offset, end-exclusive.
    pub end: usize,
}

/// Lazy sentence iterator. Cloning it yields an independent cursor, so the
/// sequence can be restarted or walked twice without re-reading the source.
#[derive(Debug, Clone)]
pub struct Sentences<'a> {
    text: &'a str,
    cursor: usize,
}

impl<'a> Sentences<'a> {
    /// Rewind to the start of the document.
    pub fn restart(&mut self) {
        self.cursor = 0;
    }

    pub fn source(&self) -> &'a str {
        self.text
    }
}

pub fn segment_sentences(text: &str) -> Sentences<'_> {
    Sentences { text, cursor: 0 }
}

pub fn count_sentences(text: &str) -> usize {
    segment_sentences(text).count()
}

fn is_initialism(word: &str) -> bool {
    // "J." or "U.S." style: single letters each followed by a dot.
    let chars: Vec<char> = word.chars().collect();
    if chars.len() < 2 || chars.len() % 2 != 0 {
        return false;
    }
    chars
        .chunks(2)
        .all(|pair| pair[0].is_alphabetic() && pair[1] == '.')
}

fn next_word(following: &str) -> &str {
    following
        .trim_start()
        .trim_start_matches(['(', '"', '\'', '[', '\u{201C}'])
        .split(|c: char| !c.is_alphanumeric())
        .next()
        .unwrap_or("")
}

fn continues_lowercase(word: &str) -> bool {
    word.chars()
        .next()
        .is_some_and(|c| c.is_lowercase() || c.is_ascii_digit())
}

/// Whether the boundary after `candidate` is a false split caused by a trailing abbreviation.
fn continues_past_abbreviation(candidate: &str, following: &str) -> bool {
    let Some(last) = candidate.split_whitespace().last() else {
        return false;
    };
    let last = last.trim_start_matches(['(', '"', '\'', '[']);
    let lower = last.to_lowercase();
    let next = next_word(following);

    if ABBREVIATIONS.contains(&lower.as_str()) {
        return true;
    }
    if TERMINAL_ABBREVIATIONS.contains(&lower.as_str()) {
        return continues_lowercase(next);
    }
    if is_initialism(last) {
        // "J. R. Tolkien": single initials belong to the name that follows.
        if last.chars().count() == 2 {
            return true;
        }
        // "U.S. Senate" continues, "the U.S. She stayed" does not.
        return continues_lowercase(next)
            || (!next.is_empty() && !SENTENCE_OPENERS.contains(&next.to_lowercase().as_str()));
    }
    false
}

impl<'a> Iterator for Sentences<'a> {
    type Item = Sentence<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.cursor < self.text.len() {
            let rest = &self.text[self.cursor..];
            let mut end_rel = 0usize;

            for (idx, piece) in rest.split_sentence_bound_indices() {
                end_rel = idx + piece.len();
                // Keep extending while the boundary sits right after an abbreviation.
                if !continues_past_abbreviation(&rest[..end_rel], &rest[end_rel..]) {
                    break;
                }
            }

            if end_rel == 0 {
                self.cursor = self.text.len();
                break;
            }

            let raw_start = self.cursor;
            self.cursor += end_rel;

            let chunk = &self.text[raw_start..self.cursor];
            let trimmed = chunk.trim();
            if trimmed.is_empty() {
                continue;
            }
            let lead = chunk.len() - chunk.trim_start().len();
            let start = raw_start + lead;
            return Some(Sentence {
                text: trimmed,
                start,
                end: start + trimmed.len(),
            });
        }
        None
    }
}
