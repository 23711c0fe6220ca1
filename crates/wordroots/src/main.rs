use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use axum::http::HeaderName;
use lexicon_db::LoadMode;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{Level, info, warn};
use tracing_subscriber::EnvFilter;

use wordroots::frequency::{DEFAULT_FREQUENCY_URL, DEFAULT_LOCALE, FrequencyError, FrequencyTable};
use wordroots::oracle::{DEFAULT_DATAMUSE_URL, DatamuseOracle};
use wordroots::provider::DEFAULT_ARCHIVE_URL;
use wordroots::rate_limit::{DEFAULT_CLIENT_HEADER, RateLimiterLayer};
use wordroots::titles::{CatalogEndpoints, TitleCatalogs, USER_AGENT, catalog_client};
use wordroots::{AppState, DerivationEngine, EngineSettings, GraphProvider, WordNetLoader, router};

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_WORDNET_PATH: &str = "wordnet";
const DEFAULT_FREQUENCY_PATH: &str = "frequencies.txt";
const DEFAULT_RATE_LIMIT_RPS: u32 = 5;
const DEFAULT_RATE_LIMIT_BURST: u32 = 10;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = load_config()?;
    info!("binding to {}:{}", config.host, config.port);
    info!(
        "using wordnet at {} (mode: {:?})",
        config.wordnet_path.display(),
        config.wordnet_mode
    );
    if config.disable_cache {
        info!("cache headers disabled");
    }
    info!(
        "rate limit: {} req/s (burst {}) keyed on {}",
        config.rate_limit_rps, config.rate_limit_burst, config.rate_limit_header
    );

    let http = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .context("build HTTP client")?;
    let frequencies = load_frequencies(&config, &http).await?;
    let loader = WordNetLoader::new(
        &config.wordnet_path,
        config.wordnet_mode,
        &config.archive_url,
        http.clone(),
    );
    let provider = Arc::new(GraphProvider::new(Arc::new(loader)));
    let oracle = Arc::new(DatamuseOracle::new(http, &config.datamuse_url));
    let settings = EngineSettings {
        locale: config.frequency_locale.clone(),
        ..EngineSettings::default()
    };
    let engine = Arc::new(DerivationEngine::new(
        provider,
        oracle,
        Arc::new(frequencies),
        settings,
    ));

    let catalogs = TitleCatalogs::new(
        catalog_client().context("build catalog client")?,
        CatalogEndpoints::default(),
        config.tmdb_api_key.clone(),
    );
    if config.tmdb_api_key.is_none() {
        info!("TMDB_API_KEY not set; film titles disabled");
    }

    let warm = Arc::clone(&engine);
    tokio::spawn(async move {
        if let Err(err) = warm.graph().ensure_ready().await {
            warn!("relation graph warm-up failed: {err}");
        }
    });

    let state = AppState {
        engine,
        titles: Arc::new(catalogs),
        disable_cache: config.disable_cache,
    };

    let rate_limiter = RateLimiterLayer::new(config.rate_limit_rps, config.rate_limit_burst)
        .with_client_header(config.rate_limit_header.clone());
    let app = router(state)
        .layer(rate_limiter)
        .layer(TraceLayer::new_for_http());
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", config.host, config.port))?;
    let listener = TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

#[derive(Debug, Clone)]
struct Config {
    host: String,
    port: u16,
    wordnet_path: PathBuf,
    wordnet_mode: LoadMode,
    archive_url: String,
    frequency_path: PathBuf,
    frequency_url: String,
    frequency_locale: String,
    datamuse_url: String,
    tmdb_api_key: Option<String>,
    disable_cache: bool,
    rate_limit_rps: u32,
    rate_limit_burst: u32,
    rate_limit_header: HeaderName,
}

/// CLI flags override the environment, which overrides the defaults.
fn load_config() -> anyhow::Result<Config> {
    let flags = parse_flags(env::args().skip(1));

    let rate_limit_header = env_or("RATE_LIMIT_HEADER", DEFAULT_CLIENT_HEADER);
    let rate_limit_header = HeaderName::try_from(rate_limit_header.to_ascii_lowercase())
        .with_context(|| format!("invalid RATE_LIMIT_HEADER {rate_limit_header:?}"))?;

    Ok(Config {
        host: env_or("HOST", DEFAULT_HOST),
        port: env_parse("PORT").unwrap_or(DEFAULT_PORT),
        wordnet_path: flags
            .wordnet_dir
            .unwrap_or_else(|| PathBuf::from(env_or("WORDNET_DIR", DEFAULT_WORDNET_PATH))),
        wordnet_mode: flags
            .wordnet_mode
            .or_else(|| env::var("WORDNET_LOAD_MODE").ok().as_deref().and_then(parse_load_mode))
            .unwrap_or(LoadMode::Mmap),
        archive_url: env_or("WORDNET_ARCHIVE_URL", DEFAULT_ARCHIVE_URL),
        frequency_path: PathBuf::from(env_or("FREQUENCY_PATH", DEFAULT_FREQUENCY_PATH)),
        frequency_url: env_or("FREQUENCY_URL", DEFAULT_FREQUENCY_URL),
        frequency_locale: env_or("FREQUENCY_LOCALE", DEFAULT_LOCALE),
        datamuse_url: env_or("DATAMUSE_URL", DEFAULT_DATAMUSE_URL),
        tmdb_api_key: env::var("TMDB_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty()),
        disable_cache: flags.disable_cache,
        rate_limit_rps: env_parse("RATE_LIMIT_RPS")
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_RATE_LIMIT_RPS),
        rate_limit_burst: env_parse("RATE_LIMIT_BURST")
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_RATE_LIMIT_BURST),
        rate_limit_header,
    })
}

#[derive(Debug, Default)]
struct Flags {
    disable_cache: bool,
    wordnet_dir: Option<PathBuf>,
    wordnet_mode: Option<LoadMode>,
}

fn parse_flags(args: impl IntoIterator<Item = String>) -> Flags {
    let mut flags = Flags::default();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        if arg == "--no-cache" {
            flags.disable_cache = true;
        } else if arg == "--wordnet-dir" {
            flags.wordnet_dir = args.next().map(PathBuf::from);
        } else if let Some(path) = arg.strip_prefix("--wordnet-dir=") {
            flags.wordnet_dir = Some(PathBuf::from(path));
        } else if let Some(mode) = arg.strip_prefix("--wordnet-mode=") {
            flags.wordnet_mode = parse_load_mode(mode);
        } else {
            warn!("ignoring unknown argument {arg:?}");
        }
    }
    flags
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// A listing that cannot be downloaded only disables local estimates; a
/// corrupt one on disk stops startup.
async fn load_frequencies(
    config: &Config,
    http: &reqwest::Client,
) -> anyhow::Result<FrequencyTable> {
    let loaded = FrequencyTable::load_or_install(
        &config.frequency_path,
        &config.frequency_locale,
        http,
        &config.frequency_url,
    )
    .await;
    match loaded {
        Ok(table) => Ok(table),
        Err(err @ FrequencyError::Download { .. }) => {
            warn!("{err}; local estimates disabled");
            Ok(FrequencyTable::empty())
        }
        Err(err) => Err(err).with_context(|| format!("load {}", config.frequency_path.display())),
    }
}

fn parse_load_mode(raw: &str) -> Option<LoadMode> {
    match raw.to_ascii_lowercase().as_str() {
        "mmap" => Some(LoadMode::Mmap),
        "owned" => Some(LoadMode::Owned),
        _ => None,
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let max_level = env_filter
        .max_level_hint()
        .and_then(|hint| hint.into_level())
        .unwrap_or(Level::INFO);
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_level(true)
        .with_max_level(max_level)
        .init();
}
