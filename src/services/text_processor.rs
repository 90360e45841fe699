// Text Processing Service
// Normalization, word tokenization and word counting shared by all detectors

use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

fn space_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\u{3000}\u{00A0}\u{2007}\u{202F}]").expect("space regex"))
}

fn horizontal_ws_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[ \t\x0C\x0B]+").expect("whitespace regex"))
}

fn word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Internal hyphens and apostrophes stay inside the token ("game-changing", "don't").
    RE.get_or_init(|| {
        Regex::new(r"[\p{L}\p{N}]+(?:['\u{2019}-][\p{L}\p{N}]+)*").expect("word regex")
    })
}

/// Normalize typographic punctuation and whitespace in pasted text.
///
/// The engine itself never requires normalized input; this is offered to
/// callers that want stable lexicon matching on text copied from rich sources.
pub fn normalize_text(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let mut s = text
        .replace(['\u{201c}', '\u{201d}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace(['\u{2014}', '\u{2013}'], "-");

    s = space_re().replace_all(&s, " ").to_string();

    // Normalize line endings
    s = s.replace("\r\n", "\n").replace('\r', "\n");

    s = horizontal_ws_re().replace_all(&s, " ").to_string();

    s = s.lines().map(|ln| ln.trim()).collect::<Vec<_>>().join("\n");

    s.trim().to_string()
}

/// Word-level tokens in document order, lowercased, punctuation stripped.
pub fn word_tokens(text: &str) -> Vec<String> {
    word_re()
        .find_iter(text)
        .map(|m| m.as_str().replace('\u{2019}', "'").to_lowercase())
        .collect()
}

/// Number of whitespace-separated words, the denominator of the overall score.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Tokens made only of alphabetic characters.
pub fn is_alphabetic_token(token: &str) -> bool {
    !token.is_empty() && token.chars().all(char::is_alphabetic)
}

/// Parse a bundled word list: whitespace-separated entries, `;` starts a comment line.
pub fn parse_word_list(raw: &str) -> HashSet<String> {
    raw.lines()
        .map(str::trim)
        .filter(|ln| !ln.starts_with(';'))
        .flat_map(str::split_whitespace)
        .map(str::to_lowercase)
        .collect()
}

/// English stopwords, loaded once from the bundled list.
pub fn stopwords() -> &'static HashSet<String> {
    static WORDS: OnceLock<HashSet<String>> = OnceLock::new();
    WORDS.get_or_init(|| {
        parse_word_list(include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/stopwords.txt")))
    })
}

pub fn is_stopword(token: &str) -> bool {
    stopwords().contains(token)
}

/// Truncated single-line preview for log lines.
pub fn preview(s: &str, max_chars: usize) -> String {
    let mut out: String = s.chars().take(max_chars).collect();
    if s.chars().count() > max_chars {
        out.push_str("...");
    }
    out.replace('\n', " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_text() {
        let input = "Hello\u{201c}World\u{201d}\r\n  it\u{2019}s   fine\u{00A0}here ";
        let output = normalize_text(input);
        assert_eq!(output, "Hello\"World\"\nit's fine here");
    }

    #[test]
    fn test_word_tokens_keep_hyphens_and_strip_punctuation() {
        let tokens = word_tokens("This groundbreaking, game-changing technology won't fail!");
        assert_eq!(
            tokens,
            vec!["this", "groundbreaking", "game-changing", "technology", "won't", "fail"]
        );
    }

    #[test]
    fn test_word_tokens_curly_apostrophe() {
        assert_eq!(word_tokens("It\u{2019}s"), vec!["it's"]);
    }

    #[test]
    fn test_word_count() {
        assert_eq!(word_count(""), 0);
        assert_eq!(word_count("   \n\t "), 0);
        assert_eq!(word_count("The committee reviewed the budget on Tuesday."), 7);
    }

    #[test]
    fn test_is_alphabetic_token() {
        assert!(is_alphabetic_token("budget"));
        assert!(!is_alphabetic_token("2015"));
        assert!(!is_alphabetic_token("game-changing"));
        assert!(!is_alphabetic_token(""));
    }

    #[test]
    fn test_parse_word_list_skips_comments() {
        let words = parse_word_list("; header\nGood  fine\n\n;bad\nnice");
        assert_eq!(words.len(), 3);
        assert!(words.contains("good"));
        assert!(!words.contains("bad"));
    }

    #[test]
    fn test_stopwords() {
        assert!(is_stopword("the"));
        assert!(is_stopword("on"));
        assert!(!is_stopword("budget"));
    }

    #[test]
    fn test_preview() {
        assert_eq!(preview("abc\ndef", 10), "abc def");
        assert_eq!(preview("abcdef", 3), "abc...");
    }
}
