//! Keyword-based topic labels.
//!
//! Produces the label used whenever remote synthesis is unavailable, plus
//! the keyword list attached to every cluster.

use crate::config::LabelingConfig;
use crate::error::TopicsError;
use crate::stopwords::StopWords;
use crate::tfidf::{tokenize, TfIdf};

/// Label used when a cluster yields no keywords at all.
pub const UNKNOWN_TOPIC: &str = "Unknown Topic";

/// Document within a cluster for labeling.
#[derive(Debug, Clone)]
pub struct ClusterDocument {
    /// Document identifier
    pub doc_id: String,
    /// Full text content
    pub text: String,
    /// Language tag, if known
    pub language: Option<String>,
}

impl ClusterDocument {
    /// Create a new cluster document.
    pub fn new(doc_id: impl Into<String>, text: impl Into<String>, language: Option<String>) -> Self {
        Self {
            doc_id: doc_id.into(),
            text: text.into(),
            language,
        }
    }
}

/// Generated topic label with metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct TopicLabel {
    /// Human-readable label
    pub label: String,
    /// Top keywords for this topic, best first
    pub keywords: Vec<String>,
    /// Confidence score (0.0 - 1.0)
    pub confidence: f32,
}

/// Keyword-based topic labeler using TF-IDF.
pub struct KeywordLabeler {
    config: LabelingConfig,
    stop_words: StopWords,
}

impl KeywordLabeler {
    /// Create a new keyword labeler.
    pub fn new(config: LabelingConfig, stop_words: StopWords) -> Self {
        Self { config, stop_words }
    }

    /// Configuration in use.
    pub fn config(&self) -> &LabelingConfig {
        &self.config
    }

    /// Label a cluster from its members' text.
    ///
    /// Keywords are the top TF-IDF terms over the members, ties broken
    /// lexicographically; the label joins them and is cut at a word boundary.
    pub fn label_cluster(&self, documents: &[ClusterDocument]) -> Result<TopicLabel, TopicsError> {
        if documents.is_empty() {
            return Err(TopicsError::InvalidInput(
                "Cannot label empty cluster".to_string(),
            ));
        }

        let keywords = self.extract_keywords(documents);
        let label = self.generate_label(&keywords);
        let confidence = calculate_confidence(&keywords);

        Ok(TopicLabel {
            label,
            keywords: keywords.into_iter().map(|(word, _)| word).collect(),
            confidence,
        })
    }

    fn extract_keywords(&self, documents: &[ClusterDocument]) -> Vec<(String, f32)> {
        let tokens: Vec<Vec<String>> = documents
            .iter()
            .map(|doc| {
                let stop = doc
                    .language
                    .as_deref()
                    .and_then(|l| self.stop_words.for_language(l));
                tokenize(&doc.text, stop)
            })
            .collect();

        TfIdf::from_tokens(tokens).top_terms(self.config.top_keywords)
    }

    fn generate_label(&self, keywords: &[(String, f32)]) -> String {
        if keywords.is_empty() {
            return UNKNOWN_TOPIC.to_string();
        }
        let label = keywords
            .iter()
            .map(|(word, _)| word.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        truncate_at_word(&label, self.config.max_label_length)
    }
}

/// Higher when the top keyword dominates the rest. Scaled into 0.5-1.0.
fn calculate_confidence(keywords: &[(String, f32)]) -> f32 {
    if keywords.is_empty() {
        return 0.0;
    }
    if keywords.len() == 1 {
        return keywords[0].1.min(1.0);
    }

    let top_score = keywords[0].1;
    let total_score: f32 = keywords.iter().map(|(_, s)| s).sum();
    if total_score == 0.0 {
        return 0.0;
    }
    0.5 + (top_score / total_score) * 0.5
}

/// Truncate to at most `max_chars` characters, preferring a word boundary.
///
/// Counts characters, not bytes, so multi-byte text never splits mid-char.
pub fn truncate_at_word(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let end = text
        .char_indices()
        .nth(max_chars)
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    let truncated = &text[..end];

    if text[end..].starts_with(char::is_whitespace) {
        return truncated.trim_end().to_string();
    }
    match truncated.rfind(char::is_whitespace) {
        Some(last_space) if last_space > 0 => truncated[..last_space].trim_end().to_string(),
        _ => truncated.to_string(),
    }
}

/// Representative strings for remote label synthesis.
///
/// Takes members in order, collapses whitespace, skips blank text and caps
/// each string at `max_chars`.
pub fn candidate_strings(
    documents: &[ClusterDocument],
    max_candidates: usize,
    max_chars: usize,
) -> Vec<String> {
    documents
        .iter()
        .map(|doc| doc.text.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|text| !text.is_empty())
        .take(max_candidates)
        .map(|text| truncate_at_word(&text, max_chars))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn make_doc(id: &str, text: &str) -> ClusterDocument {
        ClusterDocument::new(id, text, Some("en".to_string()))
    }

    fn labeler() -> KeywordLabeler {
        KeywordLabeler::new(LabelingConfig::default(), StopWords::builtin())
    }

    #[test]
    fn test_label_cluster_basic() {
        let docs = vec![
            make_doc("1", "Rust memory safety and ownership"),
            make_doc("2", "Rust borrowing and lifetimes"),
            make_doc("3", "Rust ownership model"),
        ];
        let label = labeler().label_cluster(&docs).unwrap();
        assert_eq!(label.keywords[0], "rust");
        assert!(label.label.starts_with("rust"));
        assert!(label.keywords.len() <= 5);
        assert!(label.confidence > 0.5);
    }

    #[test]
    fn test_label_is_deterministic() {
        let docs = vec![
            make_doc("1", "alpha beta gamma delta"),
            make_doc("2", "epsilon zeta eta theta"),
        ];
        let a = labeler().label_cluster(&docs).unwrap();
        let b = labeler().label_cluster(&docs).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.keywords, vec!["alpha", "beta", "delta", "epsilon", "eta"]);
    }

    #[test]
    fn test_label_empty_cluster() {
        assert!(labeler().label_cluster(&[]).is_err());
    }

    #[test]
    fn test_stopword_only_cluster() {
        let docs = vec![make_doc("1", "the and of"), make_doc("2", "is it")];
        let label = labeler().label_cluster(&docs).unwrap();
        assert_eq!(label.label, UNKNOWN_TOPIC);
        assert!(label.keywords.is_empty());
        assert_eq!(label.confidence, 0.0);
    }

    #[test]
    fn test_label_respects_max_length() {
        let config = LabelingConfig {
            max_label_length: 12,
            ..Default::default()
        };
        let labeler = KeywordLabeler::new(config, StopWords::builtin());
        let docs = vec![make_doc("1", "programming languages compilers interpreters")];
        let label = labeler.label_cluster(&docs).unwrap();
        assert!(label.label.chars().count() <= 12);
    }

    #[test]
    fn test_truncate_at_word() {
        assert_eq!(truncate_at_word("short", 10), "short");
        assert_eq!(truncate_at_word("hello world foo", 12), "hello world");
        assert_eq!(truncate_at_word("hello world", 5), "hello");
        assert_eq!(truncate_at_word("abcdefghij", 4), "abcd");
    }

    #[test]
    fn test_truncate_multibyte() {
        assert_eq!(truncate_at_word("ñandú über", 7), "ñandú");
        assert_eq!(truncate_at_word("日本語のテキスト", 3), "日本語");
    }

    #[test]
    fn test_candidate_strings() {
        let docs = vec![
            make_doc("1", "  first   text  here "),
            make_doc("2", "   "),
            make_doc("3", "second text is rather long indeed"),
            make_doc("4", "third"),
        ];
        let candidates = candidate_strings(&docs, 2, 15);
        assert_eq!(candidates, vec!["first text here", "second text is"]);
    }
}
