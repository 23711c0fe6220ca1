mod common;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use lexicon_types::Pos;
use tower::util::ServiceExt;
use wordroots::frequency::FrequencyTable;
use wordroots::provider::GraphLoader;
use wordroots::rate_limit::RateLimiterLayer;
use wordroots::titles::TitleLookup;
use wordroots::{
    AppState, DerivationEngine, EngineSettings, GraphProvider, RelationGraph, Titles, router,
};

use common::{MapGraph, TableOracle};

struct StubTitles;

#[async_trait]
impl TitleLookup for StubTitles {
    async fn collect(&self, base: &str) -> Titles {
        Titles {
            films: Vec::new(),
            music: vec![format!("{base} (live)")],
            books: vec![format!("The Book of {base}")],
        }
    }

    fn availability(&self) -> BTreeMap<String, bool> {
        BTreeMap::from([
            ("musicbrainz".to_string(), true),
            ("openlibrary".to_string(), true),
            ("tmdb".to_string(), false),
        ])
    }
}

fn make_state(provider: GraphProvider, disable_cache: bool) -> AppState {
    let oracle = TableOracle::default()
        .answer("visionary", &[Pos::Adj], None)
        .answer("envision", &[Pos::Verb], None);
    let engine = DerivationEngine::new(
        Arc::new(provider),
        Arc::new(oracle),
        Arc::new(FrequencyTable::empty().with_zipf("en", [("vision", 4.6)])),
        EngineSettings::default(),
    );
    AppState {
        engine: Arc::new(engine),
        titles: Arc::new(StubTitles),
        disable_cache,
    }
}

fn ready_state() -> AppState {
    let graph = MapGraph::default().link("vision", Pos::Noun, &["visionary", "visions of grandeur"]);
    make_state(GraphProvider::ready(common::graph(graph)), false)
}

async fn get(state: AppState, uri: &str) -> Response {
    router(state)
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn json_body(response: Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn healthz_ok() {
    let response = get(ready_state(), "/api/healthz").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, serde_json::json!({ "ok": true }));
}

#[tokio::test]
async fn word_endpoint_returns_grouped_derivations() {
    let response = get(ready_state(), "/api/word/Vision?include_rules=true").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CACHE_CONTROL).unwrap(),
        "public, max-age=300"
    );

    let body = json_body(response).await;
    assert_eq!(body["base"], "Vision");
    assert_eq!(body["normalized"], "vision");

    let derivations = &body["derivations"];
    assert_eq!(derivations["adjectives"][0]["word"], "visionary");
    assert_eq!(derivations["adjectives"][0]["pos"], serde_json::json!(["adj"]));
    assert_eq!(
        derivations["adjectives"][0]["sources"],
        serde_json::json!(["wordnet", "datamuse"])
    );
    assert_eq!(derivations["verbs"][0]["word"], "envision");
    assert_eq!(derivations["verbs"][0]["affix"], "en");
    assert_eq!(derivations["other"][0]["word"], "vision");
    assert_eq!(derivations["other"][0]["frequency"], 4.6);
    assert_eq!(derivations["nouns"], serde_json::json!([]));

    assert_eq!(body["titles"]["music"][0], "vision (live)");
    assert_eq!(body["titles"]["films"], serde_json::json!([]));
    let sources = &body["meta"]["sources"];
    assert_eq!(sources["wordnet"], true);
    assert_eq!(sources["datamuse"], true);
    assert_eq!(sources["tmdb"], false);
}

#[tokio::test]
async fn cache_headers_can_be_disabled() {
    let mut state = ready_state();
    state.disable_cache = true;
    let response = get(state, "/api/word/vision").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(header::CACHE_CONTROL).is_none());
}

#[tokio::test]
async fn word_endpoint_rejects_out_of_range_limits() {
    for uri in ["/api/word/vision?max_derivations=9", "/api/word/vision?max_derivations=501"] {
        let response = get(ready_state(), uri).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert!(body["error"].as_str().unwrap().contains("max_derivations"));
    }

    let response = get(ready_state(), "/api/word/vision?max_derivations=lots").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

struct MissingDictionary;

#[async_trait]
impl GraphLoader for MissingDictionary {
    fn load(&self) -> anyhow::Result<Arc<dyn RelationGraph>> {
        anyhow::bail!("index.noun not found")
    }

    async fn install(&self) -> anyhow::Result<()> {
        anyhow::bail!("download failed")
    }
}

#[tokio::test]
async fn unavailable_graph_is_503() {
    let state = make_state(GraphProvider::new(Arc::new(MissingDictionary)), false);
    let response = get(state, "/api/word/vision").await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = json_body(response).await;
    assert!(body["error"].as_str().unwrap().contains("unavailable"));
}

#[tokio::test]
async fn rate_limiter_throttles_forwarded_clients() {
    let app = router(ready_state()).layer(RateLimiterLayer::new(1, 1));
    let request = || {
        Request::builder()
            .uri("/api/healthz")
            .header("x-forwarded-for", "203.0.113.7")
            .body(Body::empty())
            .unwrap()
    };
    let first = app.clone().oneshot(request()).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let second = app.oneshot(request()).await.unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn spoofed_forwarded_hops_share_one_bucket() {
    let app = router(ready_state()).layer(RateLimiterLayer::new(1, 2));
    let request = |spoofed: &str| {
        Request::builder()
            .uri("/api/healthz")
            .header("x-forwarded-for", format!("{spoofed}, 198.51.100.4"))
            .body(Body::empty())
            .unwrap()
    };
    let mut statuses = Vec::new();
    for spoofed in ["10.0.0.1", "10.0.0.2", "10.0.0.3", "10.0.0.4"] {
        let response = app.clone().oneshot(request(spoofed)).await.unwrap();
        statuses.push(response.status());
    }
    assert_eq!(
        statuses,
        [
            StatusCode::OK,
            StatusCode::OK,
            StatusCode::TOO_MANY_REQUESTS,
            StatusCode::TOO_MANY_REQUESTS,
        ]
    );
}
