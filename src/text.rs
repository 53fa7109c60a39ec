//! Text normalization: word tokenization, stopword removal, lemmatization.
//!
//! The linguistic resources are explicit values rather than globals so a
//! caller (or a test) can swap in its own stopword list or lemmatizer:
//!
//! ```
//! use disaster_triage::text::TextNormalizer;
//!
//! let normalizer = TextNormalizer::english();
//! let tokens = normalizer.normalize("We need water and blankets in the shelters!");
//! assert_eq!(tokens, vec!["need", "water", "blanket", "shelter"]);
//! ```

use rayon::prelude::*;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

/// English stopwords (the standard 179-word list used by NLTK).
pub const ENGLISH_STOP_WORDS: &[&str] = &[
    "i", "me", "my", "myself", "we", "our", "ours", "ourselves", "you", "you're",
    "you've", "you'll", "you'd", "your", "yours", "yourself", "yourselves", "he", "him",
    "his", "himself", "she", "she's", "her", "hers", "herself", "it", "it's", "its",
    "itself", "they", "them", "their", "theirs", "themselves", "what", "which", "who",
    "whom", "this", "that", "that'll", "these", "those", "am", "is", "are", "was", "were",
    "be", "been", "being", "have", "has", "had", "having", "do", "does", "did", "doing",
    "a", "an", "the", "and", "but", "if", "or", "because", "as", "until", "while", "of",
    "at", "by", "for", "with", "about", "against", "between", "into", "through", "during",
    "before", "after", "above", "below", "to", "from", "up", "down", "in", "out", "on",
    "off", "over", "under", "again", "further", "then", "once", "here", "there", "when",
    "where", "why", "how", "all", "any", "both", "each", "few", "more", "most", "other",
    "some", "such", "no", "nor", "not", "only", "own", "same", "so", "than", "too", "very",
    "s", "t", "can", "will", "just", "don", "don't", "should", "should've", "now", "d",
    "ll", "m", "o", "re", "ve", "y", "ain", "aren", "aren't", "couldn", "couldn't",
    "didn", "didn't", "doesn", "doesn't", "hadn", "hadn't", "hasn", "hasn't", "haven",
    "haven't", "isn", "isn't", "ma", "mightn", "mightn't", "mustn", "mustn't", "needn",
    "needn't", "shan", "shan't", "shouldn", "shouldn't", "wasn", "wasn't", "weren",
    "weren't", "won", "won't", "wouldn", "wouldn't",
];

// Irregular noun plurals that suffix rules get wrong.
const IRREGULAR_NOUNS: &[(&str, &str)] = &[
    ("children", "child"),
    ("men", "man"),
    ("women", "woman"),
    ("people", "people"),
    ("feet", "foot"),
    ("teeth", "tooth"),
    ("geese", "goose"),
    ("mice", "mouse"),
    ("lives", "life"),
    ("wives", "wife"),
    ("knives", "knife"),
    ("leaves", "leaf"),
    ("halves", "half"),
    ("shelves", "shelf"),
    ("thieves", "thief"),
    ("wolves", "wolf"),
    ("loaves", "loaf"),
    ("calves", "calf"),
    ("data", "datum"),
    ("criteria", "criterion"),
    ("phenomena", "phenomenon"),
    ("analyses", "analysis"),
    ("crises", "crisis"),
    ("diagnoses", "diagnosis"),
    ("aches", "ache"),
    ("headaches", "headache"),
    ("caches", "cache"),
    ("niches", "niche"),
    ("avalanches", "avalanche"),
    ("buses", "bus"),
    ("gases", "gas"),
    ("viruses", "virus"),
    ("bonuses", "bonus"),
    ("campuses", "campus"),
    ("statuses", "status"),
    ("lenses", "lens"),
    ("atlases", "atlas"),
    ("news", "news"),
    ("series", "series"),
    ("species", "species"),
];

/// Maps a word to its base dictionary form.
pub trait Lemmatizer: Send + Sync {
    fn lemmatize(&self, word: &str) -> String;
}

/// Suffix-rule noun lemmatizer in the style of WordNet's `morphy`, with an
/// exception table for irregular plurals.
///
/// Without a dictionary to validate candidates, the rules stay conservative:
/// words of three letters or fewer and words ending in `ss`, `us`, `is` are
/// left alone.
pub struct RuleLemmatizer {
    exceptions: HashMap<String, String>,
}

impl RuleLemmatizer {
    pub fn new() -> Self {
        let exceptions = IRREGULAR_NOUNS
            .iter()
            .map(|(plural, lemma)| (plural.to_string(), lemma.to_string()))
            .collect();
        RuleLemmatizer { exceptions }
    }

    /// Add or replace an irregular form.
    pub fn with_exception(mut self, word: &str, lemma: &str) -> Self {
        self.exceptions.insert(word.to_string(), lemma.to_string());
        self
    }
}

impl Default for RuleLemmatizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Lemmatizer for RuleLemmatizer {
    fn lemmatize(&self, word: &str) -> String {
        if let Some(lemma) = self.exceptions.get(word) {
            return lemma.clone();
        }
        if word.chars().count() <= 3 || !word.ends_with('s') {
            return word.to_string();
        }
        if word.ends_with("ss") || word.ends_with("us") || word.ends_with("is") {
            return word.to_string();
        }

        let stem = &word[..word.len() - 1];
        if let Some(base) = word.strip_suffix("ies") {
            return format!("{}y", base);
        }
        if word.ends_with("sses")
            || word.ends_with("xes")
            || word.ends_with("zzes")
            || word.ends_with("ches")
            || word.ends_with("shes")
        {
            return word[..word.len() - 2].to_string();
        }
        stem.to_string()
    }
}

/// Lemmatizer that returns every word unchanged.
pub struct IdentityLemmatizer;

impl Lemmatizer for IdentityLemmatizer {
    fn lemmatize(&self, word: &str) -> String {
        word.to_string()
    }
}

/// A fixed set of words to drop during normalization. Lookups are exact and
/// the stored words are lower-cased.
#[derive(Debug, Clone)]
pub struct StopWords {
    words: HashSet<String>,
}

impl StopWords {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        StopWords {
            words: words
                .into_iter()
                .map(|w| w.as_ref().trim().to_lowercase())
                .collect(),
        }
    }

    pub fn english() -> Self {
        Self::new(ENGLISH_STOP_WORDS)
    }

    pub fn contains(&self, word: &str) -> bool {
        self.words.contains(word)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

fn word_pattern() -> &'static Regex {
    static WORD: OnceLock<Regex> = OnceLock::new();
    WORD.get_or_init(|| Regex::new(r"\w+").expect("word pattern is a valid regex"))
}

/// Converts raw message text into a normalized token sequence.
pub struct TextNormalizer {
    stop_words: StopWords,
    lemmatizer: Box<dyn Lemmatizer>,
}

impl TextNormalizer {
    pub fn new(stop_words: StopWords, lemmatizer: Box<dyn Lemmatizer>) -> Self {
        TextNormalizer {
            stop_words,
            lemmatizer,
        }
    }

    /// English stopwords plus the rule-based noun lemmatizer.
    pub fn english() -> Self {
        Self::new(StopWords::english(), Box::new(RuleLemmatizer::new()))
    }

    pub fn stop_words(&self) -> &StopWords {
        &self.stop_words
    }

    /// Tokenize, drop stopwords, lemmatize, lower-case and trim.
    ///
    /// Text with no word characters produces an empty vector.
    pub fn normalize(&self, text: &str) -> Vec<String> {
        word_pattern()
            .find_iter(text)
            .map(|m| m.as_str().trim().to_lowercase())
            .filter(|tok| !tok.is_empty() && !self.stop_words.contains(tok))
            .map(|tok| self.lemmatizer.lemmatize(&tok).to_lowercase().trim().to_string())
            .filter(|lemma| !lemma.is_empty() && !self.stop_words.contains(lemma))
            .collect()
    }

    /// Normalize a batch of documents in parallel. Output order matches input.
    pub fn normalize_all<S: AsRef<str> + Sync>(&self, texts: &[S]) -> Vec<Vec<String>> {
        texts
            .par_iter()
            .map(|text| self.normalize(text.as_ref()))
            .collect()
    }
}

impl Default for TextNormalizer {
    fn default() -> Self {
        Self::english()
    }
}
