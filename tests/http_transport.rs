use std::sync::Arc;

use bytes::Bytes;
use futures::TryStreamExt;
use prospeed::{
    report::{FileHost, Host, ResultPayload, WebhookHost},
    speedtest::{
        transport::{HttpTransport, Transport},
        UpdateSink,
    },
    ClientContext, Settings, SpeedTest, SpeedTestError,
};
use serde_json::json;
use tokio::sync::watch;
use url::Url;
use wiremock::{
    matchers::{body_string, header, method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

fn transport_for(server: &MockServer) -> HttpTransport {
    HttpTransport::new(Url::parse(&server.uri()).unwrap()).unwrap()
}

async fn mount_speed_server(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/ping"))
        .respond_with(ResponseTemplate::new(200).set_body_string("pong"))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/download"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 256 * 1024]))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .respond_with(ResponseTemplate::new(200))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/get_geo_info"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user": {"ip": "198.51.100.4", "city": "Lima", "country": "Peru"},
            "server": {"ip": "192.0.2.1", "city": "Quito", "country": "Ecuador"}
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn ping_sends_cache_buster_and_no_cache_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ping"))
        .and(query_param("t", "1700000000000"))
        .and(header("cache-control", "no-store"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    transport_for(&server).ping(1_700_000_000_000).await.unwrap();
}

#[tokio::test]
async fn error_status_is_reported_with_its_code() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ping"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = transport_for(&server).ping(1).await.unwrap_err();
    assert!(matches!(err, SpeedTestError::Status(503)));
}

#[tokio::test]
async fn download_streams_the_requested_size() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/download"))
        .and(query_param("size", "65536"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 65536]))
        .mount(&server)
        .await;

    let stream = transport_for(&server).open_download(65536).await.unwrap();
    let chunks: Vec<Bytes> = stream.try_collect().await.unwrap();
    let total: usize = chunks.iter().map(Bytes::len).sum();
    assert_eq!(total, 65536);
}

#[tokio::test]
async fn upload_posts_octet_stream() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .and(header("content-type", "application/octet-stream"))
        .and(body_string("abc"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    transport_for(&server)
        .upload(Bytes::from_static(b"abc"))
        .await
        .unwrap();
}

#[tokio::test]
async fn geo_info_is_decoded() {
    let server = MockServer::start().await;
    mount_speed_server(&server).await;

    let geo = transport_for(&server).geo_info().await.unwrap();
    assert_eq!(geo.user.city, "Lima");
    assert_eq!(geo.server.country, "Ecuador");
}

#[tokio::test]
async fn webhook_host_posts_json() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/results"))
        .and(header("content-type", "application/json"))
        .and(body_string(r#"{"ping":"12 ms"}"#))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let host = WebhookHost::new(Url::parse(&format!("{}/results", server.uri())).unwrap()).unwrap();
    host.send_data(r#"{"ping":"12 ms"}"#).await.unwrap();
}

#[tokio::test]
async fn webhook_rejection_is_a_host_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let host = WebhookHost::new(Url::parse(&server.uri()).unwrap()).unwrap();
    let err = host.send_data("{}").await.unwrap_err();
    assert!(matches!(err, SpeedTestError::Host(_)));
}

#[tokio::test]
async fn full_session_against_mock_server() {
    let server = MockServer::start().await;
    mount_speed_server(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let report = dir.path().join("results.jsonl");
    let settings = Settings {
        server_url: server.uri(),
        duration_secs: 1,
        download_size_mib: 1,
        upload_chunk_kib: 64,
        ..Settings::default()
    };

    let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(settings.server().unwrap()).unwrap());
    let geo = transport.geo_info().await.unwrap();
    let context = ClientContext {
        client_info: geo.user,
        network_type: None,
    };
    let speedtest = SpeedTest::new(transport, Arc::new(FileHost::new(&report)), &settings);
    let (_duration_tx, duration_rx) = watch::channel(settings.duration_secs);

    let payload = speedtest
        .run_test(&context, &duration_rx, UpdateSink::disconnected())
        .await
        .expect("no other session is running");

    assert!(payload.metrics.ping_ok);
    assert!(payload.metrics.download_ok);
    assert!(payload.metrics.upload_ok);
    assert!(payload.metrics.download_mbps > 0.0);
    assert_eq!(payload.client_info.ip, "198.51.100.4");
    assert!(payload.network_type.is_none());

    let written = std::fs::read_to_string(&report).unwrap();
    let line = written.lines().next().unwrap();
    assert_eq!(ResultPayload::from_json(line).unwrap(), payload);
    assert!(!line.contains("networkType"));
}
