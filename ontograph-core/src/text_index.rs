//! Token index with field-weighted scoring
//!
//! Each concept contributes the tokens of its preferred label, alternate
//! labels and definition. A token that occurs in several fields of the same
//! concept is credited once, at the weight of its strongest field.
//!
//! The index is patched per concept: the token list each concept contributed
//! is remembered so that re-indexing or removing it only touches its own
//! postings. Tokens and ids are interned `Arc<str>` keys shared by every
//! clone, and posting lists are copied only when written.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Weight multipliers for the different match fields
const WEIGHT_LABEL: u32 = 3;
const WEIGHT_ALT_LABEL: u32 = 2;
const WEIGHT_DEFINITION: u32 = 1;

/// Field a token was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchField {
    Label,
    AltLabel,
    Definition,
}

impl MatchField {
    pub fn weight(&self) -> u32 {
        match self {
            MatchField::Label => WEIGHT_LABEL,
            MatchField::AltLabel => WEIGHT_ALT_LABEL,
            MatchField::Definition => WEIGHT_DEFINITION,
        }
    }

    fn stronger(self, other: MatchField) -> MatchField {
        if other.weight() > self.weight() {
            other
        } else {
            self
        }
    }
}

/// One scored match from [`TokenIndex::search`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSearchResult {
    pub id: String,
    pub score: u32,
    /// Strongest field any query token matched in
    pub match_field: MatchField,
}

/// Postings for one token: concept id -> strongest field.
type PostingList = Arc<BTreeMap<Arc<str>, MatchField>>;

/// Inverted index from token to concepts.
#[derive(Debug, Clone, Default)]
pub struct TokenIndex {
    inverted: HashMap<Arc<str>, PostingList>,
    /// Tokens each concept contributed, for incremental removal
    contributions: HashMap<Arc<str>, Arc<Vec<Arc<str>>>>,
}

impl TokenIndex {
    /// Create a new empty token index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Index a concept's text, replacing whatever it contributed before.
    pub fn add_document(
        &mut self,
        id: &str,
        label: &str,
        alt_labels: &[String],
        definition: Option<&str>,
    ) {
        self.remove_document(id);

        let mut fields: BTreeMap<String, MatchField> = BTreeMap::new();
        let mut credit = |text: &str, field: MatchField| {
            for token in tokenize(text) {
                fields
                    .entry(token)
                    .and_modify(|existing| *existing = existing.stronger(field))
                    .or_insert(field);
            }
        };

        credit(label, MatchField::Label);
        for alt in alt_labels {
            credit(alt, MatchField::AltLabel);
        }
        if let Some(definition) = definition {
            credit(definition, MatchField::Definition);
        }

        let id: Arc<str> = Arc::from(id);
        let mut tokens = Vec::with_capacity(fields.len());
        for (token, field) in fields {
            let token = match self.inverted.get_key_value(token.as_str()) {
                Some((key, _)) => Arc::clone(key),
                None => Arc::from(token),
            };
            Arc::make_mut(self.inverted.entry(Arc::clone(&token)).or_default())
                .insert(Arc::clone(&id), field);
            tokens.push(token);
        }
        self.contributions.insert(id, Arc::new(tokens));
    }

    /// Drop every posting contributed by `id`.
    pub fn remove_document(&mut self, id: &str) {
        let Some(tokens) = self.contributions.remove(id) else {
            return;
        };
        for token in tokens.iter() {
            if let Some(postings) = self.inverted.get_mut(&**token) {
                let postings_mut = Arc::make_mut(postings);
                postings_mut.remove(id);
                if postings_mut.is_empty() {
                    self.inverted.remove(&**token);
                }
            }
        }
    }

    /// Score every concept sharing at least one token with `query`.
    ///
    /// Results are ordered by descending score, ties by ascending id.
    /// The full ranked list is returned; callers truncate.
    pub fn search(&self, query: &str) -> Vec<TextSearchResult> {
        let mut tokens = tokenize(query);
        tokens.sort_unstable();
        tokens.dedup();

        let mut scores: HashMap<&str, (u32, MatchField)> = HashMap::new();
        for token in &tokens {
            let Some(postings) = self.inverted.get(token.as_str()) else {
                continue;
            };
            for (id, field) in postings.iter() {
                let entry = scores.entry(&**id).or_insert((0, *field));
                entry.0 += field.weight();
                entry.1 = entry.1.stronger(*field);
            }
        }

        let mut results: Vec<TextSearchResult> = scores
            .into_iter()
            .map(|(id, (score, match_field))| TextSearchResult {
                id: id.to_string(),
                score,
                match_field,
            })
            .collect();

        results.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        results
    }

    /// Get the number of indexed concepts.
    pub fn document_count(&self) -> usize {
        self.contributions.len()
    }

    /// Get the number of unique tokens.
    pub fn token_count(&self) -> usize {
        self.inverted.len()
    }

    /// Check if a term exists in the index.
    pub fn has_term(&self, term: &str) -> bool {
        self.inverted.contains_key(term.to_lowercase().as_str())
    }
}

/// Lower-case `text` and split it on non-alphanumeric boundaries.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_of(docs: &[(&str, &str, &[&str], Option<&str>)]) -> TokenIndex {
        let mut index = TokenIndex::new();
        for (id, label, alts, definition) in docs {
            let alts: Vec<String> = alts.iter().map(|s| s.to_string()).collect();
            index.add_document(id, label, &alts, *definition);
        }
        index
    }

    fn ids(results: &[TextSearchResult]) -> Vec<&str> {
        results.iter().map(|r| r.id.as_str()).collect()
    }

    // ============================================
    // Tokenization Tests
    // ============================================

    #[test]
    fn test_tokenize_simple() {
        assert_eq!(tokenize("hello world"), vec!["hello", "world"]);
    }

    #[test]
    fn test_tokenize_lowercases() {
        assert_eq!(tokenize("Machine LEARNING"), vec!["machine", "learning"]);
    }

    #[test]
    fn test_tokenize_special_chars() {
        assert_eq!(
            tokenize("k-means_clustering (v2.0)"),
            vec!["k", "means", "clustering", "v2", "0"]
        );
    }

    #[test]
    fn test_tokenize_empty() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("--- ...").is_empty());
    }

    #[test]
    fn test_tokenize_unicode() {
        assert_eq!(tokenize("Régression linéaire"), vec!["régression", "linéaire"]);
    }

    // ============================================
    // Indexing Tests
    // ============================================

    #[test]
    fn test_add_document_indexes_all_fields() {
        let index = index_of(&[(
            "ml",
            "Machine Learning",
            &["Statistical learning"],
            Some("Algorithms that improve with data"),
        )]);
        assert_eq!(index.document_count(), 1);
        for term in ["machine", "learning", "statistical", "algorithms", "data"] {
            assert!(index.has_term(term), "{term}");
        }
    }

    #[test]
    fn test_reindex_replaces_old_tokens() {
        let mut index = index_of(&[("a", "Old Name", &[], None)]);
        index.add_document("a", "New Name", &[], None);
        assert!(!index.has_term("old"));
        assert!(index.has_term("new"));
        assert!(index.has_term("name"));
        assert_eq!(index.document_count(), 1);
    }

    #[test]
    fn test_remove_document_leaves_others() {
        let mut index = index_of(&[
            ("a", "shared alpha", &[], None),
            ("b", "shared beta", &[], None),
        ]);
        index.remove_document("a");
        assert!(!index.has_term("alpha"));
        assert!(index.has_term("shared"));
        assert_eq!(ids(&index.search("shared")), vec!["b"]);
    }

    #[test]
    fn test_remove_unknown_document_is_noop() {
        let mut index = index_of(&[("a", "alpha", &[], None)]);
        index.remove_document("zzz");
        assert_eq!(index.document_count(), 1);
    }

    // ============================================
    // Search Tests
    // ============================================

    #[test]
    fn test_search_empty_query() {
        let index = index_of(&[("a", "alpha", &[], None)]);
        assert!(index.search("").is_empty());
        assert!(index.search("  ?! ").is_empty());
    }

    #[test]
    fn test_search_no_match() {
        let index = index_of(&[("a", "alpha", &[], None)]);
        assert!(index.search("database").is_empty());
    }

    #[test]
    fn test_search_case_insensitive() {
        let index = index_of(&[("a", "Regression", &[], None)]);
        assert_eq!(ids(&index.search("REGRESSION")), vec!["a"]);
    }

    #[test]
    fn test_search_field_weights() {
        let index = index_of(&[
            ("by_definition", "Other", &[], Some("about regression")),
            ("by_alt", "Other", &["regression"], None),
            ("by_label", "Regression", &[], None),
        ]);
        let results = index.search("regression");
        assert_eq!(ids(&results), vec!["by_label", "by_alt", "by_definition"]);
        assert_eq!(results[0].score, 3);
        assert_eq!(results[1].score, 2);
        assert_eq!(results[2].score, 1);
        assert_eq!(results[0].match_field, MatchField::Label);
        assert_eq!(results[2].match_field, MatchField::Definition);
    }

    #[test]
    fn test_search_token_counted_once_at_best_field() {
        let index = index_of(&[(
            "a",
            "Regression",
            &["regression analysis"],
            Some("regression regression"),
        )]);
        let results = index.search("regression");
        assert_eq!(results[0].score, 3);
    }

    #[test]
    fn test_search_multi_token_accumulates() {
        let index = index_of(&[
            ("a", "linear regression", &[], None),
            ("b", "logistic regression", &[], None),
        ]);
        let results = index.search("linear regression");
        assert_eq!(ids(&results), vec!["a", "b"]);
        assert_eq!(results[0].score, 6);
        assert_eq!(results[1].score, 3);
    }

    #[test]
    fn test_search_repeated_query_tokens_not_double_counted() {
        let index = index_of(&[("a", "regression", &[], None)]);
        assert_eq!(index.search("regression regression")[0].score, 3);
    }

    #[test]
    fn test_search_ties_broken_by_id() {
        let index = index_of(&[
            ("zeta", "test", &[], None),
            ("alpha", "test", &[], None),
            ("mid", "test", &[], None),
        ]);
        assert_eq!(ids(&index.search("test")), vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_clone_isolated() {
        let published = index_of(&[("a", "alpha", &[], None)]);
        let mut working = published.clone();
        working.add_document("b", "alpha beta", &[], None);
        assert_eq!(published.search("alpha").len(), 1);
        assert_eq!(working.search("alpha").len(), 2);
    }

    #[test]
    fn test_clone_shares_untouched_postings() {
        let published = index_of(&[
            ("a", "alpha", &[], None),
            ("b", "beta", &[], None),
        ]);
        let mut working = published.clone();
        working.add_document("c", "gamma beta", &[], None);

        assert!(Arc::ptr_eq(&published.inverted["alpha"], &working.inverted["alpha"]));
        assert!(Arc::ptr_eq(&published.contributions["a"], &working.contributions["a"]));
        let (published_token, _) = published.inverted.get_key_value("beta").unwrap();
        let (working_token, _) = working.inverted.get_key_value("beta").unwrap();
        assert!(Arc::ptr_eq(published_token, working_token));

        assert!(!Arc::ptr_eq(&published.inverted["beta"], &working.inverted["beta"]));
        assert!(!published.has_term("gamma"));
    }

    #[test]
    fn test_performance_large_index() {
        let mut index = TokenIndex::new();
        for i in 0..1000 {
            index.add_document(
                &format!("concept{i}"),
                &format!("concept {i}"),
                &[],
                Some(&format!("Definition for concept {i}")),
            );
        }
        assert_eq!(index.document_count(), 1000);

        let start = std::time::Instant::now();
        let results = index.search("concept");
        let search_time = start.elapsed();

        assert!(
            search_time.as_millis() < 50,
            "Search took too long: {search_time:?}"
        );
        assert_eq!(results.len(), 1000);
    }
}
