//! Response types of the word endpoint.

use std::collections::BTreeMap;

use lexicon_types::Pos;
use serde::{Serialize, Serializer};

/// Where a derivation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Wordnet,
    Datamuse,
    Rule,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivationItem {
    pub word: String,
    /// Part-of-speech evidence in oracle order, serialized as `n`/`v`/`adj`/`adv`.
    #[serde(serialize_with = "pos_tags")]
    pub pos: Vec<Pos>,
    pub sources: Vec<Source>,
    pub affix: Option<String>,
    pub frequency: Option<f64>,
}

fn pos_tags<S: Serializer>(pos: &[Pos], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(pos.iter().map(|p| p.tag()))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DerivationsGrouped {
    pub adjectives: Vec<DerivationItem>,
    pub nouns: Vec<DerivationItem>,
    pub verbs: Vec<DerivationItem>,
    pub adverbs: Vec<DerivationItem>,
    pub other: Vec<DerivationItem>,
}

impl DerivationsGrouped {
    /// Number of items across all groups.
    pub fn total(&self) -> usize {
        [
            &self.adjectives,
            &self.nouns,
            &self.verbs,
            &self.adverbs,
            &self.other,
        ]
        .iter()
        .map(|group| group.len())
        .sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Titles {
    pub films: Vec<String>,
    pub music: Vec<String>,
    pub books: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Meta {
    pub sources: BTreeMap<String, bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WordResponse {
    pub base: String,
    pub normalized: String,
    pub derivations: DerivationsGrouped,
    pub titles: Titles,
    pub meta: Meta,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn item_serializes_tags_and_sources() {
        let item = DerivationItem {
            word: "envision".into(),
            pos: vec![Pos::Verb, Pos::Noun],
            sources: vec![Source::Wordnet, Source::Rule],
            affix: Some("en".into()),
            frequency: None,
        };
        assert_eq!(
            serde_json::to_value(&item).unwrap(),
            json!({
                "word": "envision",
                "pos": ["v", "n"],
                "sources": ["wordnet", "rule"],
                "affix": "en",
                "frequency": null,
            })
        );
    }

    #[test]
    fn total_counts_every_group() {
        let item = |word: &str| DerivationItem {
            word: word.into(),
            pos: Vec::new(),
            sources: vec![Source::Wordnet],
            affix: None,
            frequency: None,
        };
        let grouped = DerivationsGrouped {
            nouns: vec![item("b")],
            adjectives: vec![item("a")],
            other: vec![item("c"), item("d")],
            ..Default::default()
        };
        assert_eq!(grouped.total(), 4);
        assert_eq!(DerivationsGrouped::default().total(), 0);
    }
}
