//! Derivation collection: closure, cleanup, pre-trim, oracle evidence,
//! admission and grouping.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::RangeInclusive;
use std::sync::Arc;

use lexicon_types::{Pos, is_multiword, normalize_term};
use tracing::debug;

use crate::error::DerivationError;
use crate::frequency::{DEFAULT_LOCALE, FrequencyTable};
use crate::graph::{HOP1_EXPANSION_CAP, expand_closure};
use crate::model::{DerivationItem, DerivationsGrouped, Source};
use crate::oracle::{Evidence, FanOutLimits, PosOracle, lookup_all};
use crate::provider::GraphProvider;
use crate::rules::{AFFIX_PREFIX, affix_forms};

pub const DEFAULT_MAX_DERIVATIONS: usize = 100;
pub const MAX_DERIVATIONS_RANGE: RangeInclusive<usize> = 10..=500;
/// Zipf value a candidate without part-of-speech evidence needs to be reported.
pub const MIN_ZIPF: f64 = 2.5;

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub locale: String,
    pub hop1_cap: usize,
    pub admission_threshold: f64,
    pub oracle: FanOutLimits,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            locale: DEFAULT_LOCALE.to_string(),
            hop1_cap: HOP1_EXPANSION_CAP,
            admission_threshold: MIN_ZIPF,
            oracle: FanOutLimits::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerivationRequest {
    pub max_derivations: usize,
    pub include_rules: bool,
}

impl DerivationRequest {
    /// Effective candidate cap, clamped into [`MAX_DERIVATIONS_RANGE`].
    pub fn limit(&self) -> usize {
        self.max_derivations.clamp(
            *MAX_DERIVATIONS_RANGE.start(),
            *MAX_DERIVATIONS_RANGE.end(),
        )
    }
}

impl Default for DerivationRequest {
    fn default() -> Self {
        Self {
            max_derivations: DEFAULT_MAX_DERIVATIONS,
            include_rules: false,
        }
    }
}

pub struct DerivationEngine {
    graph: Arc<GraphProvider>,
    oracle: Arc<dyn PosOracle>,
    frequencies: Arc<FrequencyTable>,
    settings: EngineSettings,
}

impl DerivationEngine {
    pub fn new(
        graph: Arc<GraphProvider>,
        oracle: Arc<dyn PosOracle>,
        frequencies: Arc<FrequencyTable>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            graph,
            oracle,
            frequencies,
            settings,
        }
    }

    pub fn graph(&self) -> &GraphProvider {
        &self.graph
    }

    /// Collect the grouped derivations of `base`.
    ///
    /// Only an unavailable relation graph is an error; oracle problems fall
    /// back to local frequency estimates.
    pub async fn collect(
        &self,
        base: &str,
        request: DerivationRequest,
    ) -> Result<DerivationsGrouped, DerivationError> {
        let base = normalize_term(base);
        let graph = self.graph.ensure_ready().await?;

        let closure = expand_closure(graph.as_ref(), &base, self.settings.hop1_cap);
        let rule_forms = if request.include_rules {
            affix_forms(&base)
        } else {
            BTreeSet::new()
        };
        let mut pool = CandidatePool::new(&base, closure, rule_forms);
        let gathered = pool.len();

        pool.drop_multiword();
        pool.pre_trim(request.limit(), |term| self.local_estimate(term));
        debug!(
            "{base:?}: {gathered} candidates gathered, {} kept for lookup",
            pool.len()
        );

        let terms = pool.terms();
        let evidence = lookup_all(self.oracle.as_ref(), &terms, self.settings.oracle, |term| {
            self.local_estimate(term)
        })
        .await;

        let items = pool.admit(&evidence, self.settings.admission_threshold, |term| {
            self.local_estimate(term)
        });
        let grouped = group_items(items);
        debug!("{base:?}: {} derivations admitted", grouped.total());
        Ok(grouped)
    }

    fn local_estimate(&self, term: &str) -> Option<f64> {
        self.frequencies.estimate(term, &self.settings.locale)
    }
}

/// In-flight candidates keyed by term, in lexical order. The flag marks
/// terms produced by the affix rule.
#[derive(Debug)]
pub(crate) struct CandidatePool {
    base: String,
    candidates: BTreeMap<String, bool>,
}

impl CandidatePool {
    /// Merge closure and rule forms. The closure always contains the base.
    pub(crate) fn new(base: &str, closure: BTreeSet<String>, rule_forms: BTreeSet<String>) -> Self {
        let mut candidates: BTreeMap<String, bool> = BTreeMap::new();
        candidates.insert(base.to_string(), false);
        for term in closure {
            candidates.entry(term).or_default();
        }
        for term in rule_forms {
            candidates.insert(term, true);
        }
        Self {
            base: base.to_string(),
            candidates,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.candidates.len()
    }

    pub(crate) fn terms(&self) -> Vec<String> {
        self.candidates.keys().cloned().collect()
    }

    /// Remove empty and multi-word candidates other than the base.
    pub(crate) fn drop_multiword(&mut self) {
        let base = &self.base;
        self.candidates
            .retain(|term, _| term == base || !(term.is_empty() || is_multiword(term)));
    }

    /// Shrink an oversized pool to exactly `max` entries: the base plus the
    /// `max - 1` other candidates with the highest local estimate.
    pub(crate) fn pre_trim<F>(&mut self, max: usize, local: F)
    where
        F: Fn(&str) -> Option<f64>,
    {
        if self.candidates.len() <= max {
            return;
        }
        let mut ranked: Vec<(String, f64)> = self
            .candidates
            .keys()
            .filter(|term| **term != self.base)
            .map(|term| (term.clone(), local(term).unwrap_or(0.0)))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        let keep: BTreeSet<String> = ranked
            .into_iter()
            .take(max.saturating_sub(1))
            .map(|(term, _)| term)
            .collect();

        let base = &self.base;
        self.candidates
            .retain(|term, _| term == base || keep.contains(term));
    }

    /// Turn surviving candidates into items.
    ///
    /// The base is always admitted; any other candidate needs oracle tags or a
    /// local estimate of at least `threshold`. Every item carries the
    /// `wordnet` source; `rule` is added on top for affix forms.
    pub(crate) fn admit<F>(
        &self,
        evidence: &HashMap<String, Evidence>,
        threshold: f64,
        local: F,
    ) -> Vec<DerivationItem>
    where
        F: Fn(&str) -> Option<f64>,
    {
        let mut items = Vec::with_capacity(self.candidates.len());
        for (term, &from_rule) in &self.candidates {
            let found = evidence.get(term).cloned().unwrap_or_default();
            if *term != self.base
                && found.tags.is_empty()
                && local(term).is_none_or(|zipf| zipf < threshold)
            {
                continue;
            }

            let mut sources = vec![Source::Wordnet];
            if !found.tags.is_empty() {
                sources.push(Source::Datamuse);
            }
            if from_rule {
                sources.push(Source::Rule);
            }
            items.push(DerivationItem {
                word: term.clone(),
                pos: found.tags,
                sources,
                affix: from_rule.then(|| AFFIX_PREFIX.to_string()),
                frequency: found.frequency,
            });
        }
        items
    }
}

/// Rank items (frequency descending, then word) and split them by their
/// strongest part of speech: adjective, noun, verb, adverb, then other.
pub fn group_items(mut items: Vec<DerivationItem>) -> DerivationsGrouped {
    items.sort_by(compare_items);
    let mut grouped = DerivationsGrouped::default();
    for item in items {
        let has = |pos: Pos| item.pos.contains(&pos);
        let group = if has(Pos::Adj) {
            &mut grouped.adjectives
        } else if has(Pos::Noun) {
            &mut grouped.nouns
        } else if has(Pos::Verb) {
            &mut grouped.verbs
        } else if has(Pos::Adv) {
            &mut grouped.adverbs
        } else {
            &mut grouped.other
        };
        group.push(item);
    }
    grouped
}

fn compare_items(a: &DerivationItem, b: &DerivationItem) -> Ordering {
    let freq = |item: &DerivationItem| item.frequency.unwrap_or(0.0);
    freq(b)
        .total_cmp(&freq(a))
        .then_with(|| a.word.cmp(&b.word))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(words: &[&str]) -> BTreeSet<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    fn item(word: &str, pos: &[Pos], frequency: Option<f64>) -> DerivationItem {
        DerivationItem {
            word: word.to_string(),
            pos: pos.to_vec(),
            sources: vec![Source::Wordnet],
            affix: None,
            frequency,
        }
    }

    fn evidence(tags: &[Pos], frequency: Option<f64>) -> Evidence {
        Evidence {
            tags: tags.to_vec(),
            frequency,
        }
    }

    #[test]
    fn cleanup_keeps_base_even_when_multiword() {
        let mut pool = CandidatePool::new(
            "ice cream",
            set(&["ice cream", "ice-cream", "", "sundae maker"]),
            BTreeSet::new(),
        );
        pool.drop_multiword();
        assert_eq!(pool.terms(), ["ice cream", "ice-cream"]);
    }

    #[test]
    fn pre_trim_keeps_base_and_best_estimates() {
        let mut pool = CandidatePool::new("base", set(&["a", "b", "c", "d", "e"]), BTreeSet::new());
        let scores = HashMap::from([("a", 1.0), ("b", 4.0), ("d", 4.0), ("e", 2.0)]);
        pool.pre_trim(3, |t| scores.get(t).copied());
        // `b` and `d` tie; lexical order decides
        assert_eq!(pool.terms(), ["b", "base", "d"]);
    }

    #[test]
    fn pre_trim_leaves_small_pools_alone() {
        let mut pool = CandidatePool::new("base", set(&["a", "b"]), BTreeSet::new());
        pool.pre_trim(3, |_| None);
        assert_eq!(pool.len(), 3);
    }

    #[test]
    fn admission_requires_tags_or_common_word() {
        let pool = CandidatePool::new(
            "vision",
            set(&["vision", "visional", "visionary", "visioning"]),
            set(&["envision"]),
        );
        let found = HashMap::from([
            ("visionary".to_string(), evidence(&[Pos::Noun, Pos::Adj], Some(3.3))),
            ("visional".to_string(), evidence(&[], Some(1.2))),
            ("visioning".to_string(), evidence(&[], Some(2.7))),
            ("envision".to_string(), evidence(&[Pos::Verb], Some(3.1))),
            ("vision".to_string(), evidence(&[], None)),
        ]);
        let local = HashMap::from([("visional", 1.2), ("visioning", 2.7), ("envision", 3.1)]);
        let items = pool.admit(&found, MIN_ZIPF, |t| local.get(t).copied());
        let words: Vec<&str> = items.iter().map(|i| i.word.as_str()).collect();
        assert_eq!(words, ["envision", "vision", "visionary", "visioning"]);

        let envision = &items[0];
        assert_eq!(envision.sources, [Source::Wordnet, Source::Datamuse, Source::Rule]);
        assert_eq!(envision.affix.as_deref(), Some("en"));
        let visionary = &items[2];
        assert_eq!(visionary.sources, [Source::Wordnet, Source::Datamuse]);
        assert_eq!(visionary.affix, None);
    }

    #[test]
    fn rule_form_without_tags_keeps_wordnet_source() {
        let pool = CandidatePool::new("vision", BTreeSet::new(), set(&["envision"]));
        let items = pool.admit(&HashMap::new(), MIN_ZIPF, |t| (t == "envision").then_some(2.9));
        assert_eq!(items[0].word, "envision");
        assert_eq!(items[0].sources, [Source::Wordnet, Source::Rule]);
        assert_eq!(items[1].sources, [Source::Wordnet]);
    }

    #[test]
    fn request_limit_is_clamped() {
        let request = |max_derivations| DerivationRequest {
            max_derivations,
            include_rules: false,
        };
        assert_eq!(request(0).limit(), 10);
        assert_eq!(request(1).limit(), 10);
        assert_eq!(request(250).limit(), 250);
        assert_eq!(request(10_000).limit(), 500);
        assert_eq!(DerivationRequest::default().limit(), DEFAULT_MAX_DERIVATIONS);
    }

    #[test]
    fn oracle_score_does_not_count_towards_admission() {
        let pool = CandidatePool::new("base", set(&["rare"]), BTreeSet::new());
        let found = HashMap::from([("rare".to_string(), evidence(&[], Some(900.0)))]);
        let items = pool.admit(&found, MIN_ZIPF, |_| None);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].word, "base");
    }

    #[test]
    fn grouping_uses_precedence_and_ranking() {
        let items = vec![
            item("zeal", &[], Some(3.0)),
            item("quick", &[Pos::Adv, Pos::Adj], Some(4.0)),
            item("run", &[Pos::Verb, Pos::Noun], Some(5.0)),
            item("walk", &[Pos::Verb], None),
            item("swiftly", &[Pos::Adv], Some(2.0)),
            item("brisk", &[Pos::Adj], Some(4.0)),
        ];
        let grouped = group_items(items.clone());
        let words = |group: &[DerivationItem]| -> Vec<String> {
            group.iter().map(|i| i.word.clone()).collect()
        };
        assert_eq!(words(&grouped.adjectives), ["brisk", "quick"]);
        assert_eq!(words(&grouped.nouns), ["run"]);
        assert_eq!(words(&grouped.verbs), ["walk"]);
        assert_eq!(words(&grouped.adverbs), ["swiftly"]);
        assert_eq!(words(&grouped.other), ["zeal"]);

        let mut reversed = items;
        reversed.reverse();
        assert_eq!(group_items(reversed), grouped);
    }
}
