//! Part-of-speech / frequency oracle and the bounded lookup fan-out.
//!
//! Every oracle call yields an explicit [`Result`]; [`resolve_evidence`]
//! turns it into [`Evidence`] using the local frequency estimate as the
//! fallback. [`lookup_all`] therefore always answers for every candidate.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use lexicon_types::Pos;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::debug;

pub const DEFAULT_DATAMUSE_URL: &str = "https://api.datamuse.com/words";
pub const DEFAULT_CONCURRENCY: usize = 8;
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Successful oracle answer for one term.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OracleHit {
    pub tags: Vec<Pos>,
    pub score: Option<f64>,
}

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle request failed: {0}")]
    Transport(String),
    #[error("oracle answered with status {0}")]
    Status(u16),
    #[error("malformed oracle response: {0}")]
    Malformed(String),
    #[error("oracle has no entry for the term")]
    Empty,
    #[error("oracle call timed out after {0:?}")]
    Timeout(Duration),
}

#[async_trait]
pub trait PosOracle: Send + Sync {
    async fn lookup(&self, term: &str) -> Result<OracleHit, OracleError>;
}

/// Datamuse `/words` client (`sp=<term>&md=pf&max=1`).
pub struct DatamuseOracle {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Deserialize)]
struct DatamuseEntry {
    #[serde(default)]
    tags: Vec<String>,
    score: Option<f64>,
}

impl DatamuseOracle {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl PosOracle for DatamuseOracle {
    async fn lookup(&self, term: &str) -> Result<OracleHit, OracleError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("sp", term), ("md", "pf"), ("max", "1")])
            .send()
            .await
            .map_err(|e| OracleError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(OracleError::Status(status.as_u16()));
        }
        let body = response
            .bytes()
            .await
            .map_err(|e| OracleError::Transport(e.to_string()))?;
        let entries: Vec<DatamuseEntry> =
            serde_json::from_slice(&body).map_err(|e| OracleError::Malformed(e.to_string()))?;

        let entry = entries.into_iter().next().ok_or(OracleError::Empty)?;
        Ok(OracleHit {
            tags: pos_tags(&entry.tags),
            score: entry.score,
        })
    }
}

/// Keep the part-of-speech tags (`n`, `v`, `adj`, `adv`) in first-seen order.
fn pos_tags(raw: &[String]) -> Vec<Pos> {
    let mut tags = Vec::new();
    for pos in raw.iter().filter_map(|t| Pos::from_tag(t)) {
        if !tags.contains(&pos) {
            tags.push(pos);
        }
    }
    tags
}

/// What the pipeline knows about a candidate after the oracle phase.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Evidence {
    pub tags: Vec<Pos>,
    pub frequency: Option<f64>,
}

/// Combine an oracle outcome with the local estimate.
///
/// The local estimate is preferred as the frequency; the oracle score is only
/// used when no local estimate exists. Failures contribute nothing but the
/// local estimate.
pub fn resolve_evidence(outcome: Result<OracleHit, OracleError>, local: Option<f64>) -> Evidence {
    match outcome {
        Ok(hit) => Evidence {
            tags: hit.tags,
            frequency: local.or(hit.score),
        },
        Err(_) => Evidence {
            tags: Vec::new(),
            frequency: local,
        },
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FanOutLimits {
    pub concurrency: usize,
    pub call_timeout: Duration,
}

impl Default for FanOutLimits {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }
}

/// Query the oracle for every candidate, at most `limits.concurrency` at a
/// time, each call bounded by `limits.call_timeout`.
///
/// The returned map has an entry for every candidate.
pub async fn lookup_all<F>(
    oracle: &dyn PosOracle,
    candidates: &[String],
    limits: FanOutLimits,
    local_estimate: F,
) -> HashMap<String, Evidence>
where
    F: Fn(&str) -> Option<f64>,
{
    let permits = Semaphore::new(limits.concurrency.max(1));
    let calls = candidates.iter().map(|term| {
        let permits = &permits;
        async move {
            let outcome = match permits.acquire().await {
                Ok(_permit) => call_with_timeout(oracle, term, limits.call_timeout).await,
                Err(closed) => Err(OracleError::Transport(closed.to_string())),
            };
            (term, outcome)
        }
    });

    let mut failures = 0usize;
    let evidence: HashMap<String, Evidence> = join_all(calls)
        .await
        .into_iter()
        .map(|(term, outcome)| {
            if let Err(err) = &outcome {
                failures += 1;
                debug!("oracle lookup for {term:?} fell back to local frequency: {err}");
            }
            (term.clone(), resolve_evidence(outcome, local_estimate(term)))
        })
        .collect();

    debug!(
        "oracle answered {} of {} candidates",
        candidates.len() - failures,
        candidates.len()
    );
    evidence
}

async fn call_with_timeout(
    oracle: &dyn PosOracle,
    term: &str,
    limit: Duration,
) -> Result<OracleHit, OracleError> {
    tokio::time::timeout(limit, oracle.lookup(term))
        .await
        .unwrap_or(Err(OracleError::Timeout(limit)))
}
