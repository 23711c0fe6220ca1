//! Morphy: reduce an inflected surface form to the lemmas WordNet indexes.
//!
//! Lookups follow the classic order: the surface form itself, then the
//! per-POS exception lists (`*.exc`), then suffix-substitution rules. Every
//! candidate is checked against a caller-supplied existence predicate, so
//! this crate never depends on a particular dictionary loader.
//!
//! ```no_run
//! use lexicon_db::WordNet;
//! use lexicon_morphy::Morphy;
//! use lexicon_types::Pos;
//!
//! # fn main() -> anyhow::Result<()> {
//! let dict = "/path/to/wordnet";
//! let wn = WordNet::load(dict)?;
//! let morphy = Morphy::load(dict)?;
//! let lemmas = morphy.base_forms(Pos::Noun, "visions", |pos, l| wn.lemma_exists(pos, l));
//! assert_eq!(lemmas, vec!["vision".to_string()]);
//! # Ok(()) }
//! ```

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use lexicon_types::Pos;

/// Exception list file names, one per part of speech.
pub const EXCEPTION_FILES: [&str; 4] = ["noun.exc", "verb.exc", "adj.exc", "adv.exc"];

/// Exception lists keyed by part of speech, then by surface form.
#[derive(Debug, Default)]
pub struct Morphy {
    exceptions: HashMap<Pos, HashMap<String, Vec<String>>>,
}

impl Morphy {
    /// Morphy without exception lists; only suffix rules apply.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load `*.exc` files from a WordNet dict directory. Missing files count as empty.
    pub fn load(dict_dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dict_dir.as_ref();
        let mut exceptions = HashMap::new();
        for pos in Pos::ALL {
            let path = dir.join(format!("{}.exc", pos.file_suffix()));
            if path.exists() {
                exceptions.insert(pos, load_exceptions(&path)?);
            }
        }
        Ok(Self { exceptions })
    }

    /// Register one exception mapping.
    pub fn with_exception(mut self, pos: Pos, surface: &str, lemma: &str) -> Self {
        self.exceptions
            .entry(pos)
            .or_default()
            .entry(exception_key(surface))
            .or_default()
            .push(exception_key(lemma));
        self
    }

    /// Total number of surface forms with exceptions, across all POS.
    pub fn exception_count(&self) -> usize {
        self.exceptions.values().map(HashMap::len).sum()
    }

    /// Lemmas of `surface` under `pos`, in lookup order and without duplicates.
    ///
    /// Returned lemmas use the index spelling (lower-case, `_` between tokens).
    pub fn base_forms<F>(&self, pos: Pos, surface: &str, lemma_exists: F) -> Vec<String>
    where
        F: Fn(Pos, &str) -> bool,
    {
        let surface = exception_key(surface);
        if surface.is_empty() {
            return Vec::new();
        }

        let exceptions = self
            .exceptions
            .get(&pos)
            .and_then(|map| map.get(&surface))
            .into_iter()
            .flatten()
            .cloned();
        let rules = suffix_rules(pos)
            .iter()
            .flat_map(|(suffix, replacement)| apply_rule(&surface, suffix, replacement));

        let mut out: Vec<String> = Vec::new();
        for candidate in std::iter::once(surface.clone()).chain(exceptions).chain(rules) {
            if !out.contains(&candidate) && lemma_exists(pos, &candidate) {
                out.push(candidate);
            }
        }
        out
    }
}

fn load_exceptions(path: &Path) -> Result<HashMap<String, Vec<String>>> {
    let file = File::open(path).with_context(|| format!("open exception file {}", path.display()))?;
    let mut map = HashMap::new();
    for (lineno, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("read line {} in {}", lineno + 1, path.display()))?;
        let mut parts = line.split_whitespace().map(exception_key);
        let Some(surface) = parts.next() else {
            continue;
        };
        let lemmas: Vec<String> = parts.collect();
        if !lemmas.is_empty() {
            map.insert(surface, lemmas);
        }
    }
    Ok(map)
}

fn exception_key(text: &str) -> String {
    text.trim().to_lowercase().replace(' ', "_")
}

/// Candidates produced by one suffix rule: the plain substitution, plus the
/// un-doubled stem when the rule strips a suffix after a doubled consonant
/// ("running" -> "runn", "run"; "balls" -> "ball", "bal").
fn apply_rule(surface: &str, suffix: &str, replacement: &str) -> Vec<String> {
    let Some(stem) = surface.strip_suffix(suffix) else {
        return Vec::new();
    };
    if stem.is_empty() {
        return Vec::new();
    }
    let candidate = format!("{stem}{replacement}");
    let undoubled = replacement
        .is_empty()
        .then(|| undouble(&candidate))
        .flatten();
    std::iter::once(candidate).chain(undoubled).collect()
}

fn undouble(word: &str) -> Option<String> {
    let mut tail = word.chars().rev();
    let (last, prev) = (tail.next()?, tail.next()?);
    if last != prev || "aeiou".contains(last) {
        return None;
    }
    let mut out = word.to_string();
    out.pop();
    Some(out)
}

fn suffix_rules(pos: Pos) -> &'static [(&'static str, &'static str)] {
    match pos {
        Pos::Noun => &[
            ("s", ""),
            ("ses", "s"),
            ("xes", "x"),
            ("zes", "z"),
            ("ches", "ch"),
            ("shes", "sh"),
            ("men", "man"),
            ("ies", "y"),
        ],
        Pos::Verb => &[
            ("s", ""),
            ("ies", "y"),
            ("es", "e"),
            ("es", ""),
            ("ed", "e"),
            ("ed", ""),
            ("ing", "e"),
            ("ing", ""),
        ],
        Pos::Adj => &[("er", ""), ("est", ""), ("er", "e"), ("est", "e")],
        Pos::Adv => &[],
    }
}
