use std::collections::BTreeSet;
use std::env;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use lexicon_db::{LoadMode, WordNet};
use lexicon_types::Pos;

fn main() -> Result<()> {
    let mut args = env::args().skip(1);
    let dict_dir = args
        .next()
        .map(PathBuf::from)
        .context("usage: cargo run -p lexicon-db --example related -- <dict> <word>...")?;

    let start = Instant::now();
    let wn = WordNet::load_with_mode(&dict_dir, LoadMode::Mmap)
        .with_context(|| format!("loading WordNet from {}", dict_dir.display()))?;
    println!(
        "Loaded {} lemmas / {} synsets in {} ms",
        wn.lemma_count(),
        wn.synset_count(),
        start.elapsed().as_millis()
    );

    for word in args {
        for pos in Pos::ALL {
            let related: BTreeSet<&str> = wn
                .synsets_for_lemma(pos, &word)
                .iter()
                .flat_map(|sid| wn.derived_words(*sid))
                .collect();
            if !related.is_empty() {
                println!("{word} ({pos}): {}", related.into_iter().collect::<Vec<_>>().join(", "));
            }
        }
    }

    Ok(())
}
