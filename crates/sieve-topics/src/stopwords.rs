//! Built-in stop word lists.
//!
//! Lists are keyed by primary ISO 639-1 code. Region suffixes are ignored,
//! so `en-US` and `en_GB` both resolve to `en`.

use std::collections::{HashMap, HashSet};

const ENGLISH: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "he", "in", "is", "it",
    "its", "of", "on", "or", "that", "the", "to", "was", "were", "will", "with", "this", "they",
    "but", "have", "had", "what", "when", "where", "who", "which", "why", "how", "all", "each",
    "every", "both", "few", "more", "most", "other", "some", "such", "no", "nor", "not", "only",
    "own", "same", "so", "than", "too", "very", "can", "just", "should", "now", "also", "been",
    "being", "do", "does", "did", "doing", "would", "could", "might", "must", "shall", "about",
    "above", "after", "again", "against", "am", "any", "before", "below", "between", "into",
    "through", "during", "out", "over", "under", "up", "down", "then", "once", "here", "there",
    "if", "else", "while", "because", "until", "we", "you", "your", "our", "their", "him", "her",
    "them", "me", "my", "myself", "itself", "those", "these", "his", "she",
];

const SPANISH: &[&str] = &[
    "el", "la", "los", "las", "un", "una", "unos", "unas", "de", "del", "al", "y", "o", "en",
    "que", "por", "para", "con", "sin", "se", "su", "sus", "es", "son", "fue", "era", "como",
    "pero", "más", "mas", "muy", "ya", "no", "lo", "le", "les", "este", "esta", "estos", "estas",
    "ese", "esa", "hay", "sobre", "entre", "también", "cuando", "donde", "porque", "sí", "nos",
];

const GERMAN: &[&str] = &[
    "der", "die", "das", "den", "dem", "des", "ein", "eine", "einer", "eines", "einem", "einen",
    "und", "oder", "aber", "in", "im", "auf", "mit", "von", "zu", "zum", "zur", "für", "ist",
    "sind", "war", "waren", "nicht", "auch", "als", "wie", "bei", "aus", "nach", "sich", "es",
    "er", "sie", "wir", "ihr", "noch", "nur", "so", "dass", "wird", "werden", "hat", "haben",
    "über", "um",
];

const FRENCH: &[&str] = &[
    "le", "la", "les", "un", "une", "des", "du", "de", "et", "ou", "en", "au", "aux", "dans",
    "sur", "pour", "par", "avec", "sans", "est", "sont", "était", "que", "qui", "ne", "pas",
    "plus", "ce", "cette", "ces", "il", "elle", "ils", "elles", "nous", "vous", "se", "sa", "son",
    "ses", "leur", "leurs", "mais", "comme", "été", "être", "avoir", "fait", "entre",
];

/// Language-keyed stop word sets.
#[derive(Debug, Clone, Default)]
pub struct StopWords {
    lists: HashMap<String, HashSet<String>>,
}

impl StopWords {
    /// English, Spanish, German and French.
    pub fn builtin() -> Self {
        Self::empty()
            .with_language("en", ENGLISH.iter().copied())
            .with_language("es", SPANISH.iter().copied())
            .with_language("de", GERMAN.iter().copied())
            .with_language("fr", FRENCH.iter().copied())
    }

    /// No stop words for any language.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Add or replace the list for a language.
    pub fn with_language<'a>(
        mut self,
        code: &str,
        words: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        self.lists.insert(
            primary_code(code),
            words.into_iter().map(|w| w.to_lowercase()).collect(),
        );
        self
    }

    /// Stop words for a language tag, if a list exists.
    pub fn for_language(&self, language: &str) -> Option<&HashSet<String>> {
        self.lists.get(&primary_code(language))
    }

    /// Whether a list exists for a language tag.
    pub fn supports(&self, language: &str) -> bool {
        self.for_language(language).is_some()
    }
}

/// `"EN-us"` -> `"en"`.
fn primary_code(tag: &str) -> String {
    tag.trim()
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_lowercase()
}
