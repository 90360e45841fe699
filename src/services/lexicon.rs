// Lexicon Store
// Categorized bias vocabularies loaded once per process from the embedded catalog

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Arc, OnceLock};
use thiserror::Error;

use super::text_processor::word_tokens;

pub const LOADED_LANGUAGE: &str = "Loaded Language";
pub const PEACOCK_TERMS: &str = "Peacock Terms";
pub const CERTAINTY_AND_ABSOLUTES: &str = "Certainty and Absolutes";
pub const VAGUE_AUTHORITY: &str = "Appeal to Vague Authority";
pub const WEASEL_WORDS: &str = "Weasel Words";

#[derive(Error, Debug)]
pub enum LexiconError {
    #[error("lexicon JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("lexicon category '{0}' has no words")]
    EmptyCategory(String),
    #[error("lexicon category '{0}' is defined twice")]
    DuplicateCategory(String),
    #[error("lexicon has no categories")]
    NoCategories,
    #[error("unknown lexicon category '{0}'")]
    UnknownCategory(String),
}

/// How strongly a category signals bias; fixes the score of a lexicon finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryStrength {
    Strong,
    Hedging,
}

impl CategoryStrength {
    pub fn score(self) -> f64 {
        match self {
            Self::Strong => 0.75,
            Self::Hedging => 0.70,
        }
    }
}

#[derive(Debug, Deserialize)]
struct LexiconFile {
    version: String,
    #[allow(dead_code)]
    language: String,
    categories: Vec<CategoryEntry>,
}

#[derive(Debug, Deserialize)]
struct CategoryEntry {
    name: String,
    strength: CategoryStrength,
    color: String,
    explanation: String,
    words: Vec<String>,
}

#[derive(Debug, Clone)]
struct Phrase {
    entry: String,
    tokens: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct LexiconCategory {
    pub name: String,
    pub strength: CategoryStrength,
    pub color: String,
    pub explanation: String,
    words: HashSet<String>,
    // Multi-token entries, longest first.
    phrases: Vec<Phrase>,
}

impl LexiconCategory {
    fn from_entry(entry: CategoryEntry) -> Result<Self, LexiconError> {
        let mut words = HashSet::new();
        let mut phrases = Vec::new();

        for raw in &entry.words {
            let word = raw.trim().to_lowercase();
            if word.is_empty() {
                continue;
            }
            let tokens = word_tokens(&word.replace('-', " "));
            if tokens.len() > 1 {
                phrases.push(Phrase {
                    entry: word.clone(),
                    tokens,
                });
            }
            if !word.contains(' ') {
                words.insert(word);
            }
        }

        if words.is_empty() && phrases.is_empty() {
            return Err(LexiconError::EmptyCategory(entry.name));
        }
        phrases.sort_by(|a, b| b.tokens.len().cmp(&a.tokens.len()));

        Ok(Self {
            name: entry.name,
            strength: entry.strength,
            color: entry.color,
            explanation: entry.explanation,
            words,
            phrases,
        })
    }

    pub fn score(&self) -> f64 {
        self.strength.score()
    }

    pub fn contains(&self, term: &str) -> bool {
        let term = term.to_lowercase();
        self.words.contains(&term) || self.phrases.iter().any(|p| p.entry == term)
    }

    pub fn len(&self) -> usize {
        self.words.len() + self.phrases.iter().filter(|p| !self.words.contains(&p.entry)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn match_at(&self, tokens: &[String], idx: usize) -> Option<&str> {
        for phrase in &self.phrases {
            let end = idx + phrase.tokens.len();
            if end <= tokens.len() && tokens[idx..end] == phrase.tokens[..] {
                return Some(&phrase.entry);
            }
        }
        let token = &tokens[idx];
        self.words.get(token).map(String::as_str)
    }

    /// First lexicon entry found in sentence order, or `None`.
    pub fn first_match(&self, tokens: &[String]) -> Option<String> {
        (0..tokens.len()).find_map(|idx| self.match_at(tokens, idx).map(str::to_string))
    }

    /// Every distinct lexicon entry found, in sentence order.
    pub fn all_matches(&self, tokens: &[String]) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for idx in 0..tokens.len() {
            if let Some(term) = self.match_at(tokens, idx) {
                if seen.insert(term.to_string()) {
                    out.push(term.to_string());
                }
            }
        }
        out
    }
}

/// Term-level finding: one lexicon entry present in the text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TermMatch {
    pub term: String,
    pub category: String,
    pub color: String,
    pub explanation: String,
}

#[derive(Debug, Clone)]
pub struct LexiconStore {
    version: String,
    categories: Vec<LexiconCategory>,
}

static SHARED: OnceLock<Arc<LexiconStore>> = OnceLock::new();

impl LexiconStore {
    pub fn from_json(raw: &str) -> Result<Self, LexiconError> {
        let parsed: LexiconFile = serde_json::from_str(raw)?;
        if parsed.categories.is_empty() {
            return Err(LexiconError::NoCategories);
        }

        let mut names = HashSet::new();
        let mut categories = Vec::with_capacity(parsed.categories.len());
        for entry in parsed.categories {
            if !names.insert(entry.name.clone()) {
                return Err(LexiconError::DuplicateCategory(entry.name));
            }
            categories.push(LexiconCategory::from_entry(entry)?);
        }

        Ok(Self {
            version: parsed.version,
            categories,
        })
    }

    /// Process-wide store built from the embedded catalog on first use.
    pub fn shared() -> Arc<LexiconStore> {
        SHARED
            .get_or_init(|| {
                let raw = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/lexicons.json"));
                Arc::new(LexiconStore::from_json(raw).expect("embedded lexicons.json is invalid"))
            })
            .clone()
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Categories in catalog order.
    pub fn categories(&self) -> &[LexiconCategory] {
        &self.categories
    }

    pub fn category(&self, name: &str) -> Option<&LexiconCategory> {
        self.categories.iter().find(|c| c.name == name)
    }

    /// Catalog index of each named category, in the given order.
    pub fn resolve<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<usize>, LexiconError> {
        names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                self.categories
                    .iter()
                    .position(|c| c.name == name)
                    .ok_or_else(|| LexiconError::UnknownCategory(name.to_string()))
            })
            .collect()
    }

    /// Every category's matched terms with display metadata.
    pub fn scan_terms(&self, text: &str) -> Vec<TermMatch> {
        let tokens = word_tokens(text);
        if tokens.is_empty() {
            return Vec::new();
        }
        self.categories
            .iter()
            .flat_map(|category| {
                category
                    .all_matches(&tokens)
                    .into_iter()
                    .map(move |term| TermMatch {
                        term,
                        category: category.name.clone(),
                        color: category.color.clone(),
                        explanation: category.explanation.clone(),
                    })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_catalog_loads() {
        let store = LexiconStore::shared();
        let names: Vec<&str> = store.categories().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            vec![LOADED_LANGUAGE, PEACOCK_TERMS, CERTAINTY_AND_ABSOLUTES, VAGUE_AUTHORITY, WEASEL_WORDS]
        );
        let loaded = store.category(LOADED_LANGUAGE).unwrap();
        assert_eq!(loaded.score(), 0.75);
        assert_eq!(loaded.color, "#ff7979");
        assert_eq!(store.category(WEASEL_WORDS).unwrap().score(), 0.70);
    }

    #[test]
    fn test_first_match_follows_sentence_order() {
        let store = LexiconStore::shared();
        let loaded = store.category(LOADED_LANGUAGE).unwrap();
        let tokens = word_tokens("A robust and groundbreaking design.");
        assert_eq!(loaded.first_match(&tokens).as_deref(), Some("robust"));
    }

    #[test]
    fn test_hyphenated_entry_matches_both_forms() {
        let store = LexiconStore::shared();
        let certainty = store.category(CERTAINTY_AND_ABSOLUTES).unwrap();
        assert_eq!(
            certainty.first_match(&word_tokens("That is, in fact, wrong")).as_deref(),
            Some("in-fact")
        );
        let loaded = store.category(LOADED_LANGUAGE).unwrap();
        assert_eq!(
            loaded.first_match(&word_tokens("a world-class team")).as_deref(),
            Some("world-class")
        );
    }

    #[test]
    fn test_multi_word_phrase() {
        let store = LexiconStore::shared();
        let weasel = store.category(WEASEL_WORDS).unwrap();
        assert_eq!(
            weasel.first_match(&word_tokens("The plan is considered a success")).as_deref(),
            Some("is considered")
        );
        assert!(weasel.contains("It Is Said"));
    }

    #[test]
    fn test_scan_terms_reports_every_category() {
        let store = LexiconStore::shared();
        let terms = store.scan_terms("Experts say it is obviously a groundbreaking result.");
        let pairs: Vec<(&str, &str)> = terms
            .iter()
            .map(|t| (t.category.as_str(), t.term.as_str()))
            .collect();
        assert!(pairs.contains(&(LOADED_LANGUAGE, "groundbreaking")));
        assert!(pairs.contains(&(PEACOCK_TERMS, "groundbreaking")));
        assert!(pairs.contains(&(CERTAINTY_AND_ABSOLUTES, "obviously")));
        assert!(pairs.contains(&(VAGUE_AUTHORITY, "experts")));
        assert!(store.scan_terms("").is_empty());
    }

    #[test]
    fn test_invalid_catalogs_are_rejected() {
        assert!(matches!(
            LexiconStore::from_json(r#"{"version":"1","language":"en","categories":[]}"#),
            Err(LexiconError::NoCategories)
        ));
        let empty = r##"{"version":"1","language":"en","categories":[
            {"name":"X","strength":"strong","color":"#000","explanation":"","words":[" "]}]}"##;
        assert!(matches!(LexiconStore::from_json(empty), Err(LexiconError::EmptyCategory(_))));
        let dup = r##"{"version":"1","language":"en","categories":[
            {"name":"X","strength":"strong","color":"#000","explanation":"","words":["a"]},
            {"name":"X","strength":"hedging","color":"#000","explanation":"","words":["b"]}]}"##;
        assert!(matches!(LexiconStore::from_json(dup), Err(LexiconError::DuplicateCategory(_))));
        assert!(matches!(LexiconStore::from_json("not json"), Err(LexiconError::Parse(_))));
    }
}
