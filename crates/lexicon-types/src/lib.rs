//! Vocabulary shared by the lexicon crates and the derivation service.
//!
//! [`Pos`] speaks three dialects: WordNet file characters (`n`, `v`, `a`/`s`,
//! `r`), the short tags returned by part-of-speech oracles (`n`, `v`, `adj`,
//! `adv`) and human-readable names. [`SynsetId`] keys synsets across the
//! `data.*` files, and [`normalize_term`] / [`lemma_to_term`] turn raw input
//! and WordNet lemmas into comparable terms.
//!
//! ```rust
//! use lexicon_types::{Pos, lemma_to_term, normalize_term};
//!
//! assert_eq!(Pos::from_tag("adj"), Some(Pos::Adj));
//! assert_eq!(normalize_term("  Vision "), "vision");
//! assert_eq!(lemma_to_term("ice_cream"), "ice cream");
//! ```

use std::fmt;

/// Part of speech as understood by WordNet and the oracle.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum Pos {
    Noun,
    Verb,
    Adj,
    Adv,
}

impl Pos {
    /// Every part of speech, in WordNet file order.
    pub const ALL: [Pos; 4] = [Pos::Noun, Pos::Verb, Pos::Adj, Pos::Adv];

    /// Parse a WordNet POS character; satellites (`s`) fold into adjectives.
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'n' => Some(Pos::Noun),
            'v' => Some(Pos::Verb),
            'a' | 's' => Some(Pos::Adj),
            'r' => Some(Pos::Adv),
            _ => None,
        }
    }

    /// Character used in `index.*`/`data.*`.
    pub fn to_char(self) -> char {
        match self {
            Pos::Noun => 'n',
            Pos::Verb => 'v',
            Pos::Adj => 'a',
            Pos::Adv => 'r',
        }
    }

    /// Parse an oracle tag. Anything outside `n`, `v`, `adj`, `adv` is rejected.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "n" => Some(Pos::Noun),
            "v" => Some(Pos::Verb),
            "adj" => Some(Pos::Adj),
            "adv" => Some(Pos::Adv),
            _ => None,
        }
    }

    /// Oracle tag for this part of speech.
    pub fn tag(self) -> &'static str {
        match self {
            Pos::Noun => "n",
            Pos::Verb => "v",
            Pos::Adj => "adj",
            Pos::Adv => "adv",
        }
    }

    /// File suffix WordNet uses for this part of speech (`index.noun`, ...).
    pub fn file_suffix(self) -> &'static str {
        match self {
            Pos::Noun => "noun",
            Pos::Verb => "verb",
            Pos::Adj => "adj",
            Pos::Adv => "adv",
        }
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Pos::Noun => "noun",
            Pos::Verb => "verb",
            Pos::Adj => "adjective",
            Pos::Adv => "adverb",
        })
    }
}

/// `(pos, offset)` pair identifying a synset within the WordNet files.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct SynsetId {
    pub pos: Pos,
    pub offset: u32,
}

/// Decode the four-hex source/target field of a pointer block.
///
/// High byte is the source word number, low byte the target word number.
/// Zero means the pointer is semantic (applies to the whole synset).
pub fn decode_st(hex4: &str) -> (Option<u16>, Option<u16>) {
    if hex4.len() != 4 {
        return (None, None);
    }
    let Ok(val) = u16::from_str_radix(hex4, 16) else {
        return (None, None);
    };
    let word = |n: u16| (n != 0).then_some(n);
    (word(val >> 8), word(val & 0x00FF))
}

/// Normalize raw input into a term: surrounding whitespace trimmed, lower-cased.
pub fn normalize_term(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Convert a WordNet lemma (`ice_cream`, `galore(ip)`) into a term.
pub fn lemma_to_term(lemma: &str) -> String {
    let bare = match lemma.find('(') {
        Some(idx) if idx > 0 && lemma.ends_with(')') => &lemma[..idx],
        _ => lemma,
    };
    normalize_term(&bare.replace('_', " "))
}

/// Multi-token terms are kept out of derivation results.
pub fn is_multiword(term: &str) -> bool {
    term.contains(' ')
}
