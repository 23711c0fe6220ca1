//! Offline word-frequency estimates on the Zipf scale.
//!
//! A Zipf value is `log10` of a word's occurrences per billion words: `7`
//! for the most common function words, about `3` for words seen once per
//! million, and below `1` for rarities. Tables are built from plain
//! `word count` listings, one table per locale. A missing listing is
//! downloaded once and kept on disk, see [`FrequencyTable::load_or_install`].

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::Path;

use thiserror::Error;
use tracing::info;

pub const DEFAULT_LOCALE: &str = "en";
/// English subtitle-corpus counts (50k most frequent words), `word count` per line.
pub const DEFAULT_FREQUENCY_URL: &str =
    "https://raw.githubusercontent.com/hermitdave/FrequencyWords/master/content/2018/en/en_50k.txt";

#[derive(Debug, Error)]
pub enum FrequencyError {
    #[error("failed to read frequency list: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {line}: {reason}")]
    Malformed { line: usize, reason: String },
    #[error("failed to download frequency list from {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

#[derive(Debug, Clone, Default)]
pub struct FrequencyTable {
    locales: HashMap<String, HashMap<String, f64>>,
}

impl FrequencyTable {
    /// Table with no estimates at all.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a locale from precomputed Zipf values.
    pub fn with_zipf<I, S>(mut self, locale: &str, entries: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: AsRef<str>,
    {
        let table = self.locales.entry(locale.to_string()).or_default();
        for (word, zipf) in entries {
            table.insert(normalize_key(word.as_ref()), zipf);
        }
        self
    }

    /// Build a locale from raw corpus counts.
    pub fn with_counts<I, S>(self, locale: &str, entries: I) -> Self
    where
        I: IntoIterator<Item = (S, u64)>,
        S: AsRef<str>,
    {
        let mut merged: HashMap<String, u64> = HashMap::new();
        for (word, count) in entries {
            *merged.entry(normalize_key(word.as_ref())).or_default() += count;
        }
        let total: u64 = merged.values().sum();
        self.with_zipf(
            locale,
            merged
                .into_iter()
                .map(|(word, count)| (word, zipf_from_count(count, total))),
        )
    }

    /// Load a `word count` listing for `locale`.
    ///
    /// Blank lines and lines starting with `#` are ignored; repeated words
    /// have their counts summed.
    pub fn load(path: impl AsRef<Path>, locale: &str) -> Result<Self, FrequencyError> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        let mut entries = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            entries.push(parse_line(trimmed, idx + 1)?);
        }
        let table = Self::empty().with_counts(locale, entries);
        info!(
            "loaded {} frequency entries for locale {locale} from {}",
            table.len(locale),
            path.display()
        );
        Ok(table)
    }

    /// Load `path`, first downloading the listing from `url` when the file
    /// does not exist yet.
    pub async fn load_or_install(
        path: impl AsRef<Path>,
        locale: &str,
        client: &reqwest::Client,
        url: &str,
    ) -> Result<Self, FrequencyError> {
        let path = path.as_ref();
        if !path.exists() {
            install_listing(client, url, path).await?;
        }
        Self::load(path, locale)
    }

    /// Zipf estimate for `term`, or `None` when unknown or vanishingly rare.
    pub fn estimate(&self, term: &str, locale: &str) -> Option<f64> {
        self.locales
            .get(locale)?
            .get(&normalize_key(term))
            .copied()
            .filter(|zipf| *zipf > 0.0)
    }

    /// Number of words known for `locale`.
    pub fn len(&self, locale: &str) -> usize {
        self.locales.get(locale).map_or(0, HashMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.locales.values().all(HashMap::is_empty)
    }
}

/// Zipf value of `count` occurrences in a corpus of `total` words, rounded to
/// two decimals.
pub fn zipf_from_count(count: u64, total: u64) -> f64 {
    if count == 0 || total == 0 {
        return 0.0;
    }
    let per_billion = count as f64 * 1e9 / total as f64;
    (per_billion.log10() * 100.0).round() / 100.0
}

async fn install_listing(
    client: &reqwest::Client,
    url: &str,
    path: &Path,
) -> Result<(), FrequencyError> {
    info!("fetching frequency list from {url}");
    let download = |source| FrequencyError::Download {
        url: url.to_string(),
        source,
    };
    let body = client
        .get(url)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(download)?
        .bytes()
        .await
        .map_err(download)?;

    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    // a partial write must not look like an installed listing
    let staging = path.with_extension("part");
    fs::write(&staging, &body)?;
    fs::rename(&staging, path)?;
    info!("installed frequency list at {} ({} bytes)", path.display(), body.len());
    Ok(())
}

fn parse_line(line: &str, lineno: usize) -> Result<(String, u64), FrequencyError> {
    let mut parts = line.split_whitespace();
    let (Some(word), Some(count), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(FrequencyError::Malformed {
            line: lineno,
            reason: "expected `word count`".to_string(),
        });
    };
    let count = count.parse::<u64>().map_err(|e| FrequencyError::Malformed {
        line: lineno,
        reason: format!("invalid count {count:?}: {e}"),
    })?;
    Ok((word.to_string(), count))
}

fn normalize_key(word: &str) -> String {
    word.trim().to_lowercase()
}
