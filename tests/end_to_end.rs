use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::{Value, json};
use std::time::Duration;
use tokio_test::assert_ok;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use stream_aggregator::{
    cache::CacheRegistry,
    config::Config,
    models::{Locator, ResourceRequest, SourceSettings, StreamKind},
    pipeline::StreamService,
    web::{AppState, create_router},
};

const FILENAME: &str = "Movie.2023.1080p.BluRay.x264-GRP.mkv";

fn source(server: &MockServer, name: &str, prefix: &str, declared: bool) -> SourceSettings {
    SourceSettings {
        source_type: "generic".into(),
        name: name.into(),
        url: format!("{}/{}/manifest.json", server.uri(), prefix),
        timeout: Some(Duration::from_secs(2)),
        headers: Default::default(),
        resources: declared.then(|| vec!["stream".to_string()]),
        types: declared.then(|| vec!["movie".to_string()]),
        id_prefixes: None,
        enabled: true,
    }
}

/// Source A answers with a cached debrid link, source B with a torrent of
/// the same release. B is only known through its manifest.
async fn two_sources() -> (MockServer, Config) {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/a/stream/movie/tt1234567.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "streams": [{
                "name": "[RD+] Source A\n1080p",
                "title": format!("{FILENAME}\n💾 5 GB"),
                "url": "https://debrid.example/dl/abc/movie.mkv",
                "behaviorHints": {"filename": FILENAME}
            }]
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/b/manifest.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "org.example.b",
            "name": "Source B",
            "version": "1.0.0",
            "resources": ["stream"],
            "types": ["movie", "series"],
            "idPrefixes": ["tt"]
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/b/stream/movie/tt1234567.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "streams": [
                {
                    "name": "Source B\n1080p",
                    "title": format!("{FILENAME}\n👤 50"),
                    "infoHash": "abcdef0123456789abcdef0123456789abcdef01",
                    "fileIdx": 0
                },
                {"name": "broken entry without a locator"},
                "not an object"
            ]
        })))
        .mount(&server)
        .await;

    let config = Config {
        sources: vec![
            source(&server, "Source A", "a", true),
            source(&server, "Source B", "b", false),
        ],
        ..Default::default()
    };
    (server, config)
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(json!({})))
}

#[tokio::test]
async fn test_cached_debrid_and_p2p_copies_both_survive_cached_first() {
    let (_server, config) = two_sources().await;
    let service = assert_ok!(StreamService::new(&config, &CacheRegistry::default()));

    let output = assert_ok!(
        service
            .run(&ResourceRequest::stream("movie", "tt1234567"))
            .await
    );

    assert!(output.failures.is_empty());
    assert_eq!(output.records.len(), 2);

    let cached = &output.records[0];
    assert_eq!(cached.kind, StreamKind::Debrid);
    assert_eq!(cached.service_id(), Some("realdebrid"));
    assert_eq!(cached.filename.as_deref(), Some(FILENAME));

    let p2p = &output.records[1];
    assert_eq!(p2p.kind, StreamKind::P2p);
    assert!(matches!(p2p.locator, Some(Locator::Torrent { .. })));
    assert_eq!(p2p.filename.as_deref(), Some(FILENAME));
    assert_eq!(p2p.seeders, Some(50));
}

#[tokio::test]
async fn test_stream_route_returns_wire_streams() {
    let (_server, config) = two_sources().await;
    let app = create_router(assert_ok!(AppState::new(config)));

    let (status, body) = get_json(&app, "/stream/movie/tt1234567.json").await;
    assert_eq!(status, StatusCode::OK);

    let streams = body["streams"].as_array().unwrap();
    assert_eq!(streams.len(), 2);
    assert_eq!(streams[0]["url"], "https://debrid.example/dl/abc/movie.mkv");
    assert!(streams[0].get("infoHash").is_none());
    assert_eq!(streams[0]["behaviorHints"]["filename"], FILENAME);
    assert_eq!(
        streams[1]["infoHash"],
        "abcdef0123456789abcdef0123456789abcdef01"
    );
    assert!(streams[1].get("url").is_none());
}

#[tokio::test]
async fn test_failing_source_is_reported_as_error_stream() {
    let (server, mut config) = two_sources().await;
    config.sources.push(source(&server, "Source C", "c", true));

    let app = create_router(assert_ok!(AppState::new(config)));
    let (status, body) = get_json(&app, "/stream/movie/tt1234567.json").await;
    assert_eq!(status, StatusCode::OK);

    let streams = body["streams"].as_array().unwrap();
    assert_eq!(streams.len(), 3);
    let last = streams[2]["description"].as_str().unwrap();
    assert!(last.starts_with("Source C failed"));
}

#[tokio::test]
async fn test_manifest_and_health_routes() {
    let (_server, config) = two_sources().await;
    let app = create_router(assert_ok!(AppState::new(config)));

    let (status, manifest) = get_json(&app, "/manifest.json").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(manifest["resources"], json!(["stream"]));
    assert_eq!(manifest["types"], json!(["movie"]));

    let (status, health) = get_json(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["sources"], 2);
}

#[tokio::test]
async fn test_unresolvable_proxy_ip_is_a_single_error_response() {
    let (server, mut config) = two_sources().await;
    config.proxy_runtime.retry_delay = Duration::from_millis(1);
    config.profile.proxy.enabled = true;
    config.profile.proxy.url = server.uri();

    let app = create_router(assert_ok!(AppState::new(config)));
    let (status, body) = get_json(&app, "/stream/movie/tt1234567.json").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["fatal"], true);
}
