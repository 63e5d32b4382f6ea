//! Secondary indexes for fast concept lookups.
//!
//! All indexes are patched per concept: [`IndexSet::insert`] and
//! [`IndexSet::remove`] only touch the entries of the concept involved. Keys
//! and claimant lists are shared `Arc`s, so a cloned index set copies no
//! strings and no buckets until a batch writes them.

use std::collections::HashMap;
use std::sync::Arc;

use crate::concept::{normalize_label, Concept};
use crate::text_index::TokenIndex;

/// Identity, label, notation and token indexes over one graph version.
#[derive(Debug, Clone, Default)]
pub struct IndexSet {
    /// Id -> concept.
    identity: HashMap<Arc<str>, Arc<Concept>>,

    /// Normalized label -> claimants, oldest first. The last claimant owns
    /// the label; earlier ones take over if it goes away.
    labels: HashMap<Arc<str>, Arc<Vec<Arc<str>>>>,

    /// Notation code -> id (exact match).
    notations: HashMap<Arc<str>, Arc<str>>,

    /// Token -> concepts, for search.
    tokens: TokenIndex,
}

impl IndexSet {
    /// Create a new empty index set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Index `concept`, replacing `previous` (the record it supersedes).
    pub fn insert(&mut self, concept: &Arc<Concept>, previous: Option<&Arc<Concept>>) {
        let id = self
            .identity
            .get_key_value(concept.id.as_str())
            .map(|(key, _)| Arc::clone(key))
            .unwrap_or_else(|| Arc::from(concept.id.as_str()));

        if let Some(previous) = previous {
            self.unindex(previous);
        }

        self.identity.insert(Arc::clone(&id), Arc::clone(concept));

        for label in concept.normalized_labels() {
            match self.labels.get_mut(label.as_str()) {
                Some(claimants) => {
                    let claimants = Arc::make_mut(claimants);
                    claimants.retain(|claimant| claimant != &id);
                    claimants.push(Arc::clone(&id));
                }
                None => {
                    self.labels
                        .insert(Arc::from(label), Arc::new(vec![Arc::clone(&id)]));
                }
            }
        }

        if let Some(notation) = &concept.notation {
            self.notations
                .insert(Arc::from(notation.as_str()), Arc::clone(&id));
        }

        self.tokens.add_document(
            &id,
            &concept.pref_label,
            &concept.alt_labels,
            concept.definition.as_deref(),
        );
    }

    /// Drop every entry contributed by `concept`.
    pub fn remove(&mut self, concept: &Arc<Concept>) {
        self.unindex(concept);
    }

    fn unindex(&mut self, concept: &Concept) {
        let id = concept.id.as_str();
        self.identity.remove(id);

        for label in concept.normalized_labels() {
            if let Some(claimants) = self.labels.get_mut(label.as_str()) {
                let claimants_mut = Arc::make_mut(claimants);
                claimants_mut.retain(|claimant| &**claimant != id);
                if claimants_mut.is_empty() {
                    self.labels.remove(label.as_str());
                }
            }
        }

        if let Some(notation) = &concept.notation {
            if self.find_by_notation(notation) == Some(id) {
                self.notations.remove(notation.as_str());
            }
        }

        self.tokens.remove_document(id);
    }

    /// Look up a concept by identifier.
    pub fn by_id(&self, id: &str) -> Option<&Arc<Concept>> {
        self.identity.get(id)
    }

    /// Concept currently owning `label` (case-insensitive), if any.
    pub fn find_by_label(&self, label: &str) -> Option<&str> {
        self.labels
            .get(normalize_label(label).as_str())
            .and_then(|claimants| claimants.last())
            .map(|id| &**id)
    }

    /// Concept holding the notation code, if any.
    pub fn find_by_notation(&self, notation: &str) -> Option<&str> {
        self.notations.get(notation).map(|id| &**id)
    }

    pub fn tokens(&self) -> &TokenIndex {
        &self.tokens
    }

    pub fn label_count(&self) -> usize {
        self.labels.len()
    }

    pub fn notation_count(&self) -> usize {
        self.notations.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arc(concept: Concept) -> Arc<Concept> {
        Arc::new(concept)
    }

    #[test]
    fn test_insert_indexes_labels_case_insensitive() {
        let mut index = IndexSet::new();
        let ml = arc(Concept::new("ml", "Machine Learning").with_alt_label("ML"));
        index.insert(&ml, None);

        assert_eq!(index.find_by_label("machine learning"), Some("ml"));
        assert_eq!(index.find_by_label("MACHINE LEARNING"), Some("ml"));
        assert_eq!(index.find_by_label(" ml "), Some("ml"));
        assert!(index.by_id("ml").is_some());
    }

    #[test]
    fn test_label_collision_last_write_wins() {
        let mut index = IndexSet::new();
        let first = arc(Concept::new("stats", "Statistics").with_alt_label("Data Analysis"));
        let second = arc(Concept::new("analysis", "Data Analysis"));
        index.insert(&first, None);
        index.insert(&second, None);

        assert_eq!(index.find_by_label("data analysis"), Some("analysis"));
        // The losing concept keeps its other labels
        assert_eq!(index.find_by_label("statistics"), Some("stats"));
    }

    #[test]
    fn test_label_falls_back_when_winner_removed() {
        let mut index = IndexSet::new();
        let first = arc(Concept::new("a", "Shared"));
        let second = arc(Concept::new("b", "Shared"));
        index.insert(&first, None);
        index.insert(&second, None);

        index.remove(&second);
        assert_eq!(index.find_by_label("shared"), Some("a"));

        index.remove(&first);
        assert_eq!(index.find_by_label("shared"), None);
        assert_eq!(index.label_count(), 0);
    }

    #[test]
    fn test_reupsert_reclaims_label() {
        let mut index = IndexSet::new();
        let a = arc(Concept::new("a", "Shared"));
        let b = arc(Concept::new("b", "Shared"));
        index.insert(&a, None);
        index.insert(&b, None);

        let a2 = arc(Concept::new("a", "Shared").with_definition("again"));
        index.insert(&a2, Some(&a));
        assert_eq!(index.find_by_label("shared"), Some("a"));
    }

    #[test]
    fn test_replacement_drops_old_labels() {
        let mut index = IndexSet::new();
        let old = arc(Concept::new("a", "Old Label").with_notation("X1"));
        index.insert(&old, None);
        let new = arc(Concept::new("a", "New Label").with_notation("X2"));
        index.insert(&new, Some(&old));

        assert_eq!(index.find_by_label("old label"), None);
        assert_eq!(index.find_by_label("new label"), Some("a"));
        assert_eq!(index.find_by_notation("X1"), None);
        assert_eq!(index.find_by_notation("X2"), Some("a"));
        assert!(!index.tokens().has_term("old"));
    }

    #[test]
    fn test_notation_exact_match() {
        let mut index = IndexSet::new();
        let c = arc(Concept::new("c", "C").with_notation("CS-101"));
        index.insert(&c, None);
        assert_eq!(index.find_by_notation("CS-101"), Some("c"));
        assert_eq!(index.find_by_notation("cs-101"), None);
    }

    #[test]
    fn test_remove_clears_everything() {
        let mut index = IndexSet::new();
        let c = arc(
            Concept::new("c", "Clustering")
                .with_notation("ML-3")
                .with_definition("grouping"),
        );
        index.insert(&c, None);
        index.remove(&c);

        assert!(index.by_id("c").is_none());
        assert_eq!(index.find_by_label("clustering"), None);
        assert_eq!(index.find_by_notation("ML-3"), None);
        assert_eq!(index.tokens().document_count(), 0);
        assert_eq!(index.tokens().token_count(), 0);
    }

    #[test]
    fn test_clone_shares_untouched_buckets() {
        let mut published = IndexSet::new();
        let a = arc(Concept::new("a", "Shared").with_notation("A1"));
        let b = arc(Concept::new("b", "Beta"));
        published.insert(&a, None);
        published.insert(&b, None);

        let mut working = published.clone();
        let c = arc(Concept::new("c", "Shared"));
        working.insert(&c, None);

        assert!(Arc::ptr_eq(&published.labels["beta"], &working.labels["beta"]));
        assert!(Arc::ptr_eq(&published.identity["b"], &working.identity["b"]));
        let (published_key, _) = published.identity.get_key_value("a").unwrap();
        let (working_key, _) = working.identity.get_key_value("a").unwrap();
        assert!(Arc::ptr_eq(published_key, working_key));
        assert!(Arc::ptr_eq(&published.notations["A1"], &working.notations["A1"]));

        // Only the written claimant list diverged
        assert!(!Arc::ptr_eq(&published.labels["shared"], &working.labels["shared"]));
        assert_eq!(published.find_by_label("shared"), Some("a"));
        assert_eq!(working.find_by_label("shared"), Some("c"));
    }
}
