//! One-time readiness gate for the relation graph.
//!
//! [`GraphProvider`] owns the process-wide graph. The first caller of
//! [`GraphProvider::ensure_ready`] loads it (installing the dataset when the
//! local copy is missing or broken); concurrent callers wait for that single
//! attempt. A failed attempt leaves the provider empty so the next request
//! tries again.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use flate2::read::GzDecoder;
use lexicon_db::{LoadMode, REQUIRED_FILES, WordNet};
use lexicon_morphy::{EXCEPTION_FILES, Morphy};
use lexicon_types::Pos;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::error::DerivationError;
use crate::graph::{RelationGraph, WordNetGraph};

/// Canonical WordNet dictionary tarball.
pub const DEFAULT_ARCHIVE_URL: &str = "https://wordnetcode.princeton.edu/wn3.1.dict.tar.gz";

const SMOKE_TEST_TERM: &str = "test";

/// How the relation graph is obtained.
#[async_trait]
pub trait GraphLoader: Send + Sync {
    /// Build the graph from local storage. Called on a blocking thread.
    fn load(&self) -> Result<Arc<dyn RelationGraph>>;

    /// Fetch the dataset so that a following [`GraphLoader::load`] can succeed.
    async fn install(&self) -> Result<()>;
}

pub struct GraphProvider {
    loader: Arc<dyn GraphLoader>,
    graph: OnceCell<Arc<dyn RelationGraph>>,
}

impl GraphProvider {
    pub fn new(loader: Arc<dyn GraphLoader>) -> Self {
        Self {
            loader,
            graph: OnceCell::new(),
        }
    }

    /// Provider whose graph is already available.
    pub fn ready(graph: Arc<dyn RelationGraph>) -> Self {
        Self {
            loader: Arc::new(Preloaded(Arc::clone(&graph))),
            graph: OnceCell::new_with(Some(graph)),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.graph.initialized()
    }

    /// Return the graph, initializing it on first use.
    pub async fn ensure_ready(&self) -> Result<Arc<dyn RelationGraph>, DerivationError> {
        self.graph
            .get_or_try_init(|| self.initialize())
            .await
            .cloned()
    }

    async fn initialize(&self) -> Result<Arc<dyn RelationGraph>, DerivationError> {
        let start = Instant::now();
        let graph = match self.load().await {
            Ok(graph) => graph,
            Err(err) => {
                warn!("relation graph not loadable ({err:#}); installing dataset");
                self.loader
                    .install()
                    .await
                    .map_err(|e| DerivationError::unavailable(&e))?;
                self.load()
                    .await
                    .map_err(|e| DerivationError::unavailable(&e))?
            }
        };

        let sample = graph.related_forms(SMOKE_TEST_TERM, Pos::Noun);
        debug!("smoke test: {SMOKE_TEST_TERM:?} has {} related forms", sample.len());
        info!("relation graph ready in {} ms", start.elapsed().as_millis());
        Ok(graph)
    }

    async fn load(&self) -> Result<Arc<dyn RelationGraph>> {
        let loader = Arc::clone(&self.loader);
        tokio::task::spawn_blocking(move || loader.load())
            .await
            .context("relation graph loader panicked")?
    }
}

struct Preloaded(Arc<dyn RelationGraph>);

#[async_trait]
impl GraphLoader for Preloaded {
    fn load(&self) -> Result<Arc<dyn RelationGraph>> {
        Ok(Arc::clone(&self.0))
    }

    async fn install(&self) -> Result<()> {
        Ok(())
    }
}

/// Loads WordNet + morphy exceptions from a directory, downloading the
/// dictionary tarball into it when needed.
pub struct WordNetLoader {
    dict_dir: PathBuf,
    mode: LoadMode,
    archive_url: String,
    client: reqwest::Client,
}

impl WordNetLoader {
    pub fn new(
        dict_dir: impl Into<PathBuf>,
        mode: LoadMode,
        archive_url: impl Into<String>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            dict_dir: dict_dir.into(),
            mode,
            archive_url: archive_url.into(),
            client,
        }
    }
}

#[async_trait]
impl GraphLoader for WordNetLoader {
    fn load(&self) -> Result<Arc<dyn RelationGraph>> {
        let start = Instant::now();
        let wordnet = WordNet::load_with_mode(&self.dict_dir, self.mode)
            .with_context(|| format!("load WordNet from {}", self.dict_dir.display()))?;
        let morphy = Morphy::load(&self.dict_dir)?;
        info!(
            "wordnet loaded in {} ms ({} lemmas, {} synsets, {} exceptions, mode {:?})",
            start.elapsed().as_millis(),
            wordnet.lemma_count(),
            wordnet.synset_count(),
            morphy.exception_count(),
            self.mode
        );
        Ok(Arc::new(WordNetGraph::new(wordnet, morphy)))
    }

    async fn install(&self) -> Result<()> {
        info!("fetching WordNet archive from {}", self.archive_url);
        let archive = self
            .client
            .get(&self.archive_url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .with_context(|| format!("download {}", self.archive_url))?
            .bytes()
            .await
            .context("read WordNet archive body")?;

        let dir = self.dict_dir.clone();
        let written = tokio::task::spawn_blocking(move || unpack_dictionary(&archive, &dir))
            .await
            .context("archive unpacker panicked")??;
        info!(
            "installed {written} WordNet files into {}",
            self.dict_dir.display()
        );
        Ok(())
    }
}

/// Extract dictionary files from a `.tar.gz` into `dict_dir`, flattening any
/// directory prefix. Returns the number of files written.
pub fn unpack_dictionary(archive: &[u8], dict_dir: &Path) -> Result<usize> {
    fs::create_dir_all(dict_dir).with_context(|| format!("create {}", dict_dir.display()))?;

    let mut bundle = tar::Archive::new(GzDecoder::new(archive));
    let mut written = 0usize;
    for entry in bundle.entries().context("read WordNet archive")? {
        let mut entry = entry.context("read archive entry")?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let name = entry
            .path()
            .context("archive entry path")?
            .file_name()
            .map(|n| n.to_string_lossy().into_owned());
        let Some(name) = name.filter(|n| is_dictionary_file(n)) else {
            continue;
        };

        let target = dict_dir.join(&name);
        let mut out =
            File::create(&target).with_context(|| format!("create {}", target.display()))?;
        io::copy(&mut entry, &mut out).with_context(|| format!("write {}", target.display()))?;
        written += 1;
    }

    if let Some(path) = WordNet::missing_files(dict_dir).first() {
        bail!("archive did not provide {}", path.display());
    }
    Ok(written)
}

fn is_dictionary_file(name: &str) -> bool {
    REQUIRED_FILES.contains(&name) || EXCEPTION_FILES.contains(&name)
}
