use std::env;
use std::path::PathBuf;

use lexicon_db::{LoadMode, WordNet};
use lexicon_morphy::Morphy;
use lexicon_types::Pos;

fn fixture_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../lexicon-db/tests/fixtures/wn")
}

#[test]
fn resolves_inflections_against_fixture_dictionary() {
    let dir = fixture_dir();
    let wn = WordNet::load(&dir).expect("load fixtures");
    let morphy = Morphy::load(&dir).expect("load exceptions");
    let exists = |pos, lemma: &str| wn.lemma_exists(pos, lemma);

    assert_eq!(morphy.exception_count(), 3);
    assert_eq!(morphy.base_forms(Pos::Noun, "visions", &exists), vec!["vision"]);
    assert_eq!(morphy.base_forms(Pos::Verb, "envisaged", &exists), vec!["envision"]);
    assert_eq!(morphy.base_forms(Pos::Verb, "visualizes", &exists), vec!["visualize"]);
    assert_eq!(morphy.base_forms(Pos::Noun, "Ice Cream", &exists), vec!["ice_cream"]);
}

#[test]
fn resolves_demo_words_against_full_wordnet() {
    let Some(dir) = env::var("WORDNET_DIR").ok().map(PathBuf::from) else {
        eprintln!("skipping: WORDNET_DIR not set");
        return;
    };
    let wn = WordNet::load_with_mode(&dir, LoadMode::Mmap).expect("load wordnet");
    let morphy = Morphy::load(&dir).expect("load exceptions");
    let exists = |pos, lemma: &str| wn.lemma_exists(pos, lemma);

    assert!(morphy.base_forms(Pos::Verb, "running", &exists).contains(&"run".to_string()));
    assert!(morphy.base_forms(Pos::Noun, "children", &exists).contains(&"child".to_string()));
    assert!(!morphy.base_forms(Pos::Adj, "better", &exists).is_empty());
}
