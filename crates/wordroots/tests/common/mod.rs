#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::Router;
use lexicon_types::Pos;
use tokio::net::TcpListener;
use wordroots::oracle::{OracleError, OracleHit, PosOracle};
use wordroots::{DerivationItem, DerivationsGrouped, RelationGraph};

/// Relation graph backed by an explicit adjacency list.
#[derive(Default)]
pub struct MapGraph(HashMap<(String, Pos), BTreeSet<String>>);

impl MapGraph {
    pub fn link(mut self, from: &str, pos: Pos, to: &[&str]) -> Self {
        self.0
            .entry((from.to_string(), pos))
            .or_default()
            .extend(to.iter().map(|s| s.to_string()));
        self
    }
}

impl RelationGraph for MapGraph {
    fn related_forms(&self, term: &str, pos: Pos) -> BTreeSet<String> {
        self.0
            .get(&(term.to_string(), pos))
            .cloned()
            .unwrap_or_default()
    }
}

/// Oracle answering from a fixed table; unknown terms get `OracleError::Empty`.
#[derive(Default)]
pub struct TableOracle {
    answers: HashMap<String, OracleHit>,
    pub calls: AtomicUsize,
}

impl TableOracle {
    pub fn answer(mut self, term: &str, tags: &[Pos], score: Option<f64>) -> Self {
        self.answers.insert(
            term.to_string(),
            OracleHit {
                tags: tags.to_vec(),
                score,
            },
        );
        self
    }
}

#[async_trait]
impl PosOracle for TableOracle {
    async fn lookup(&self, term: &str) -> Result<OracleHit, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answers.get(term).cloned().ok_or(OracleError::Empty)
    }
}

/// Oracle that is never reachable.
pub struct DownOracle;

#[async_trait]
impl PosOracle for DownOracle {
    async fn lookup(&self, _term: &str) -> Result<OracleHit, OracleError> {
        Err(OracleError::Transport("connection refused".into()))
    }
}

pub fn graph(graph: MapGraph) -> Arc<dyn RelationGraph> {
    Arc::new(graph)
}

/// Serve `app` on an ephemeral local port and return its base URL.
pub async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

pub fn fixture_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../lexicon-db/tests/fixtures/wn")
}

/// Lookups across all groups of a grouped result.
pub trait GroupedExt {
    fn items(&self) -> Vec<&DerivationItem>;

    fn len(&self) -> usize {
        self.items().len()
    }

    fn find(&self, word: &str) -> Option<&DerivationItem> {
        self.items().into_iter().find(|item| item.word == word)
    }
}

impl GroupedExt for DerivationsGrouped {
    fn items(&self) -> Vec<&DerivationItem> {
        [
            &self.adjectives,
            &self.nouns,
            &self.verbs,
            &self.adverbs,
            &self.other,
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}
