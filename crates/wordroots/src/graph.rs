//! Morphological relation graph and its bounded two-hop closure.

use std::collections::BTreeSet;

use lexicon_db::WordNet;
use lexicon_morphy::Morphy;
use lexicon_types::Pos;

/// Number of first-hop terms whose own relations are followed.
pub const HOP1_EXPANSION_CAP: usize = 50;

/// On-demand source of derivationally related forms.
pub trait RelationGraph: Send + Sync {
    /// Terms related to `term` when it is read as `pos`.
    fn related_forms(&self, term: &str, pos: Pos) -> BTreeSet<String>;
}

/// [`RelationGraph`] backed by a loaded WordNet dictionary.
pub struct WordNetGraph {
    wordnet: WordNet,
    morphy: Morphy,
}

impl WordNetGraph {
    pub fn new(wordnet: WordNet, morphy: Morphy) -> Self {
        Self { wordnet, morphy }
    }
}

impl RelationGraph for WordNetGraph {
    fn related_forms(&self, term: &str, pos: Pos) -> BTreeSet<String> {
        let exists = |pos, lemma: &str| self.wordnet.lemma_exists(pos, lemma);
        let mut related = BTreeSet::new();
        for lemma in self.morphy.base_forms(pos, term, exists) {
            for sid in self.wordnet.synsets_for_lemma(pos, &lemma) {
                related.extend(self.wordnet.derived_words(*sid).map(str::to_string));
            }
        }
        related
    }
}

/// Related forms of `term` across every part of speech.
pub fn related_any_pos(graph: &dyn RelationGraph, term: &str) -> BTreeSet<String> {
    Pos::ALL
        .iter()
        .flat_map(|pos| graph.related_forms(term, *pos))
        .collect()
}

/// Two-hop closure around `base`.
///
/// All first-hop terms are included, but only the first `hop1_cap` of them
/// (in lexical order) are expanded a second time. `base` is always part of
/// the result, even when nothing relates to it.
pub fn expand_closure(graph: &dyn RelationGraph, base: &str, hop1_cap: usize) -> BTreeSet<String> {
    let first = related_any_pos(graph, base);
    let mut forms = BTreeSet::from([base.to_string()]);
    for term in first.iter().take(hop1_cap) {
        forms.extend(related_any_pos(graph, term));
    }
    forms.extend(first);
    forms
}
