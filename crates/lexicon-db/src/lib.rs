//! Load the parts of a WordNet dictionary needed to walk derivations.
//!
//! Only the `index.*` and `data.*` files are read. Each index entry becomes a
//! `(pos, lemma) -> synsets` mapping, and each data line keeps its member
//! words plus its derivationally-related-form pointers (`+`). Glosses, frames
//! and every other pointer type are skipped during parsing, which keeps the
//! in-memory graph small enough to hold for the lifetime of a server.
//!
//! Files are read either through a memory map or into owned buffers; see
//! [`LoadMode`]. The buffers are only needed while parsing.
//!
//! # Example
//! ```no_run
//! use lexicon_db::{LoadMode, WordNet};
//! use lexicon_types::Pos;
//!
//! # fn main() -> anyhow::Result<()> {
//! let wn = WordNet::load_with_mode("/path/to/wordnet", LoadMode::Mmap)?;
//! for sid in wn.synsets_for_lemma(Pos::Noun, "vision") {
//!     for word in wn.derived_words(*sid) {
//!         println!("vision -> {word}");
//!     }
//! }
//! # Ok(()) }
//! ```

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use memmap2::Mmap;
use lexicon_types::{Pos, SynsetId, decode_st, lemma_to_term};

/// Pointer symbol for "derivationally related form".
pub const DERIVATION_POINTER: &str = "+";

/// Files that must be present for [`WordNet::load`] to succeed.
pub const REQUIRED_FILES: [&str; 8] = [
    "data.noun",
    "data.verb",
    "data.adj",
    "data.adv",
    "index.noun",
    "index.verb",
    "index.adj",
    "index.adv",
];

/// Strategy for reading dictionary files.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LoadMode {
    /// Memory-map each file.
    Mmap,
    /// Read each file into an owned buffer (portable fallback).
    Owned,
}

enum Buffer {
    Mmap(Mmap),
    Owned(Vec<u8>),
}

impl Buffer {
    fn as_slice(&self) -> &[u8] {
        match self {
            Buffer::Mmap(m) => m.as_ref(),
            Buffer::Owned(v) => v.as_slice(),
        }
    }
}

/// Lexical pointer from one word of a synset to one word of another.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DerivationLink {
    pub source_word: Option<u16>,
    pub target: SynsetId,
    pub target_word: Option<u16>,
}

struct SynsetRecord {
    words: Vec<String>,
    derivations: Vec<DerivationLink>,
}

/// Derivation-oriented view of a WordNet dictionary.
pub struct WordNet {
    lemmas: HashMap<(Pos, String), Vec<SynsetId>>,
    synsets: HashMap<SynsetId, SynsetRecord>,
}

impl WordNet {
    /// Load from a directory containing `data.*` and `index.*`, memory-mapped.
    pub fn load(dict_dir: impl AsRef<Path>) -> Result<Self> {
        Self::load_with_mode(dict_dir, LoadMode::Mmap)
    }

    /// Load choosing between mmap and owned buffers at runtime.
    pub fn load_with_mode(dict_dir: impl AsRef<Path>, mode: LoadMode) -> Result<Self> {
        let dir = dict_dir.as_ref();
        if let Some(path) = Self::missing_files(dir).first() {
            bail!("missing required WordNet file: {}", path.display());
        }

        let mut lemmas = HashMap::new();
        let mut synsets = HashMap::new();
        for pos in Pos::ALL {
            let index_name = format!("index.{}", pos.file_suffix());
            let index = read_file(dir.join(&index_name), mode)?;
            parse_index(index.as_slice(), pos, &mut lemmas)
                .with_context(|| format!("parse {index_name}"))?;

            let data_name = format!("data.{}", pos.file_suffix());
            let data = read_file(dir.join(&data_name), mode)?;
            parse_data(data.as_slice(), pos, &mut synsets)
                .with_context(|| format!("parse {data_name}"))?;
        }

        Ok(Self { lemmas, synsets })
    }

    /// Required files absent from `dict_dir`, in [`REQUIRED_FILES`] order.
    pub fn missing_files(dict_dir: impl AsRef<Path>) -> Vec<PathBuf> {
        let dir = dict_dir.as_ref();
        REQUIRED_FILES
            .iter()
            .map(|name| dir.join(name))
            .filter(|path| !path.exists())
            .collect()
    }

    /// Whether the index lists `lemma` under `pos`.
    pub fn lemma_exists(&self, pos: Pos, lemma: &str) -> bool {
        self.lemmas.contains_key(&(pos, index_key(lemma)))
    }

    /// Synsets of a lemma in sense order, or an empty slice.
    pub fn synsets_for_lemma(&self, pos: Pos, lemma: &str) -> &[SynsetId] {
        self.lemmas
            .get(&(pos, index_key(lemma)))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Member words of a synset as terms (`ice_cream` becomes `ice cream`).
    pub fn synset_words(&self, id: SynsetId) -> &[String] {
        self.synsets
            .get(&id)
            .map(|s| s.words.as_slice())
            .unwrap_or(&[])
    }

    /// Raw derivation pointers leaving a synset.
    pub fn derivation_links(&self, id: SynsetId) -> &[DerivationLink] {
        self.synsets
            .get(&id)
            .map(|s| s.derivations.as_slice())
            .unwrap_or(&[])
    }

    /// Target words of every derivation pointer leaving `id`.
    ///
    /// Pointers whose target synset or word number cannot be resolved are
    /// skipped.
    pub fn derived_words(&self, id: SynsetId) -> impl Iterator<Item = &str> + '_ {
        self.derivation_links(id).iter().filter_map(|link| {
            let word_number = usize::from(link.target_word?);
            self.synset_words(link.target)
                .get(word_number.checked_sub(1)?)
                .map(String::as_str)
        })
    }

    /// Number of `(pos, lemma)` keys.
    pub fn lemma_count(&self) -> usize {
        self.lemmas.len()
    }

    /// Number of synsets.
    pub fn synset_count(&self) -> usize {
        self.synsets.len()
    }
}

fn read_file(path: PathBuf, mode: LoadMode) -> Result<Buffer> {
    let mut file = File::open(&path).with_context(|| format!("open {}", path.display()))?;
    match mode {
        LoadMode::Mmap => unsafe { Mmap::map(&file) }
            .map(Buffer::Mmap)
            .with_context(|| format!("mmap {}", path.display())),
        LoadMode::Owned => {
            let mut buf = Vec::new();
            file.read_to_end(&mut buf)
                .with_context(|| format!("read {}", path.display()))?;
            Ok(Buffer::Owned(buf))
        }
    }
}

/// Yield `(line number, text)` for every content line; the license header
/// lines WordNet prefixes with spaces are skipped.
fn content_lines(bytes: &[u8]) -> impl Iterator<Item = (usize, Result<&str>)> {
    bytes
        .split(|b| *b == b'\n')
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.strip_suffix(b"\r").unwrap_or(line)))
        .filter(|(_, line)| !line.is_empty() && !matches!(line.first(), Some(b' ' | b'\t')))
        .map(|(lineno, line)| {
            let text = std::str::from_utf8(line)
                .map_err(|e| anyhow!("line {lineno}: invalid utf-8: {e}"));
            (lineno, text)
        })
}

fn parse_index(
    bytes: &[u8],
    pos: Pos,
    lemmas: &mut HashMap<(Pos, String), Vec<SynsetId>>,
) -> Result<()> {
    for (lineno, line) in content_lines(bytes) {
        let tokens: Vec<&str> = line?.split_ascii_whitespace().collect();
        // lemma pos synset_cnt p_cnt [ptr_symbol...] sense_cnt tagsense_cnt offset...
        if tokens.len() < 6 {
            bail!("line {lineno}: malformed index line (too few tokens)");
        }
        let synset_cnt: usize = tokens[2]
            .parse()
            .with_context(|| format!("line {lineno}: synset_cnt"))?;
        let p_cnt: usize = tokens[3]
            .parse()
            .with_context(|| format!("line {lineno}: p_cnt"))?;
        let offsets_start = 4 + p_cnt + 2;
        if tokens.len() != offsets_start + synset_cnt {
            bail!(
                "line {lineno}: expected {synset_cnt} synset offsets after {p_cnt} pointer symbols"
            );
        }
        let ids = tokens[offsets_start..]
            .iter()
            .map(|t| {
                t.parse::<u32>()
                    .map(|offset| SynsetId { pos, offset })
                    .with_context(|| format!("line {lineno}: synset offset {t}"))
            })
            .collect::<Result<Vec<_>>>()?;
        lemmas.insert((pos, index_key(tokens[0])), ids);
    }
    Ok(())
}

fn parse_data(
    bytes: &[u8],
    pos: Pos,
    synsets: &mut HashMap<SynsetId, SynsetRecord>,
) -> Result<()> {
    for (lineno, line) in content_lines(bytes) {
        let line = line?;
        let fields = line.split_once('|').map_or(line, |(left, _gloss)| left);
        let tokens: Vec<&str> = fields.split_ascii_whitespace().collect();
        // offset lex_filenum ss_type w_cnt [word lex_id...] p_cnt [ptr...] ...
        if tokens.len() < 4 {
            bail!("line {lineno}: malformed data line");
        }
        let offset: u32 = tokens[0]
            .parse()
            .with_context(|| format!("line {lineno}: offset"))?;
        let w_cnt = usize::from_str_radix(tokens[3], 16)
            .with_context(|| format!("line {lineno}: w_cnt"))?;

        let words_end = 4 + w_cnt * 2;
        let Some(word_tokens) = tokens.get(4..words_end) else {
            bail!("line {lineno}: expected {w_cnt} word/lex_id pairs");
        };
        let words = word_tokens
            .chunks_exact(2)
            .map(|pair| lemma_to_term(pair[0]))
            .collect();

        let p_cnt: usize = tokens
            .get(words_end)
            .ok_or_else(|| anyhow!("line {lineno}: missing pointer count"))?
            .parse()
            .with_context(|| format!("line {lineno}: p_cnt"))?;
        let pointers_start = words_end + 1;
        let Some(pointer_tokens) = tokens.get(pointers_start..pointers_start + p_cnt * 4) else {
            bail!("line {lineno}: expected {p_cnt} pointer blocks");
        };

        let mut derivations = Vec::new();
        for block in pointer_tokens.chunks_exact(4) {
            if block[0] != DERIVATION_POINTER {
                continue;
            }
            let target_offset: u32 = block[1]
                .parse()
                .with_context(|| format!("line {lineno}: pointer target offset"))?;
            let target_pos = block[2]
                .chars()
                .next()
                .and_then(Pos::from_char)
                .ok_or_else(|| anyhow!("line {lineno}: pointer target pos {}", block[2]))?;
            let (source_word, target_word) = decode_st(block[3]);
            derivations.push(DerivationLink {
                source_word,
                target: SynsetId {
                    pos: target_pos,
                    offset: target_offset,
                },
                target_word,
            });
        }

        synsets.insert(SynsetId { pos, offset }, SynsetRecord { words, derivations });
    }
    Ok(())
}

fn index_key(lemma: &str) -> String {
    lemma.trim().to_lowercase().replace(' ', "_")
}
