//! End-to-end tests: a daemon on ephemeral ports, real producer connections
//! over TCP, and consumer/operator queries over HTTP.

use std::net::SocketAddr;
use std::time::Duration;

use reqwest::StatusCode;
use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use waypoint_protocol::codec;
use waypoint_server::config::MetricsConfig;
use waypoint_server::{AppState, Config, Lookupd};

async fn start_daemon(tombstone_lifetime_ms: u64) -> (SocketAddr, SocketAddr) {
    let config = Config {
        tcp_address: "127.0.0.1:0".to_string(),
        http_address: "127.0.0.1:0".to_string(),
        broadcast_address: "lookup-test".to_string(),
        inactive_producer_timeout_ms: 300_000,
        tombstone_lifetime_ms,
        metrics: MetricsConfig {
            enabled: false,
            port: 0,
        },
    };

    let lookupd = Lookupd::bind(config).await.unwrap();
    let addrs = (lookupd.tcp_addr(), lookupd.http_addr());
    tokio::spawn(lookupd.run_until(std::future::pending()));
    addrs
}

/// A producer speaking the TCP protocol.
struct ProducerConn {
    stream: TcpStream,
}

impl ProducerConn {
    async fn connect(addr: SocketAddr) -> Self {
        Self {
            stream: TcpStream::connect(addr).await.unwrap(),
        }
    }

    async fn identify(&mut self, broadcast_address: &str, http_port: u16) -> Value {
        let body = json!({
            "broadcast_address": broadcast_address,
            "hostname": "h1",
            "tcp_port": 4150,
            "http_port": http_port,
            "version": "1.0",
        })
        .to_string();

        self.stream.write_all(b"IDENTIFY\n").await.unwrap();
        self.stream
            .write_all(&codec::encode_frame(body.as_bytes()))
            .await
            .unwrap();

        let response = codec::read_frame(&mut self.stream).await.unwrap();
        serde_json::from_slice(&response).unwrap()
    }

    async fn command(&mut self, line: &str) -> Vec<u8> {
        self.stream
            .write_all(format!("{line}\n").as_bytes())
            .await
            .unwrap();
        codec::read_frame(&mut self.stream).await.unwrap()
    }
}

async fn http_get(http_addr: SocketAddr, path_and_query: &str) -> (StatusCode, Value) {
    let response = reqwest::get(format!("http://{http_addr}{path_and_query}"))
        .await
        .unwrap();
    let status = response.status();
    let body = response.json().await.unwrap_or(Value::Null);
    (status, body)
}

async fn http_post(http_addr: SocketAddr, path_and_query: &str) -> (StatusCode, Value) {
    let response = reqwest::Client::new()
        .post(format!("http://{http_addr}{path_and_query}"))
        .send()
        .await
        .unwrap();
    let status = response.status();
    let body = response.json().await.unwrap_or(Value::Null);
    (status, body)
}

fn string_set(value: &Value) -> Vec<&str> {
    let mut items: Vec<&str> = value
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect();
    items.sort_unstable();
    items
}

#[tokio::test]
async fn test_basic_discovery() {
    let (tcp_addr, http_addr) = start_daemon(45_000).await;

    let mut producer = ProducerConn::connect(tcp_addr).await;
    let identify = producer.identify("p1", 4151).await;

    // The response describes the lookup service itself, with resolved ports.
    assert_eq!(identify["broadcast_address"], "lookup-test");
    assert_eq!(identify["tcp_port"], tcp_addr.port());
    assert_eq!(identify["http_port"], http_addr.port());
    assert_eq!(identify["version"], AppState::VERSION);
    assert!(identify["hostname"].is_string());

    assert_eq!(producer.command("REGISTER topicA channel1").await, b"OK");

    let (status, body) = http_get(http_addr, "/lookup?topic=topicA").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(string_set(&body["channels"]), vec!["channel1"]);
    let producers = body["producers"].as_array().unwrap();
    assert_eq!(producers.len(), 1);
    assert_eq!(producers[0]["broadcast_address"], "p1");
    assert_eq!(producers[0]["tcp_port"], 4150);
    assert_eq!(producers[0]["http_port"], 4151);
    assert_eq!(producers[0]["version"], "1.0");
}

#[tokio::test]
async fn test_disconnect_cleanup() {
    let (tcp_addr, http_addr) = start_daemon(45_000).await;

    let mut producer = ProducerConn::connect(tcp_addr).await;
    producer.identify("p1", 4151).await;
    assert_eq!(producer.command("REGISTER topicA channel1").await, b"OK");
    drop(producer);

    // Registrations persist with empty producer lists once cleanup runs.
    let mut producers_left = usize::MAX;
    for _ in 0..100 {
        let (status, body) = http_get(http_addr, "/lookup?topic=topicA").await;
        assert_eq!(status, StatusCode::OK);
        producers_left = body["producers"].as_array().unwrap().len();
        if producers_left == 0 {
            assert_eq!(string_set(&body["channels"]), vec!["channel1"]);
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(producers_left, 0);
}

#[tokio::test]
async fn test_ephemeral_channel_cleanup() {
    let (tcp_addr, http_addr) = start_daemon(45_000).await;

    let mut producer = ProducerConn::connect(tcp_addr).await;
    producer.identify("p1", 4151).await;

    assert_eq!(producer.command("REGISTER tA c1#ephemeral").await, b"OK");
    assert_eq!(producer.command("UNREGISTER tA c1#ephemeral").await, b"OK");

    let (status, body) = http_get(http_addr, "/channels?topic=tA").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["channels"].as_array().unwrap().is_empty());

    // A non-ephemeral channel keeps its registration after UNREGISTER.
    assert_eq!(producer.command("REGISTER tA c2").await, b"OK");
    assert_eq!(producer.command("UNREGISTER tA c2").await, b"OK");

    let (status, body) = http_get(http_addr, "/channels?topic=tA").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(string_set(&body["channels"]), vec!["c2"]);
}

#[tokio::test]
async fn test_tombstone() {
    let (tcp_addr, http_addr) = start_daemon(200).await;

    let mut p1 = ProducerConn::connect(tcp_addr).await;
    p1.identify("p1", 4151).await;
    assert_eq!(p1.command("REGISTER topicX").await, b"OK");

    let mut p2 = ProducerConn::connect(tcp_addr).await;
    p2.identify("p2", 4151).await;
    assert_eq!(p2.command("REGISTER topicX").await, b"OK");

    let (status, _) = http_post(http_addr, "/topic/tombstone?topic=topicX&node=p1:4151").await;
    assert_eq!(status, StatusCode::OK);

    // Tombstoned p1 is hidden from lookup.
    let (_, body) = http_get(http_addr, "/lookup?topic=topicX").await;
    let broadcasts: Vec<&str> = body["producers"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["broadcast_address"].as_str().unwrap())
        .collect();
    assert_eq!(broadcasts, vec!["p2"]);

    // /nodes keeps listing p1, marking the tombstoned topic.
    let (_, body) = http_get(http_addr, "/nodes").await;
    let nodes = body["producers"].as_array().unwrap();
    assert_eq!(nodes.len(), 2);
    for node in nodes {
        assert_eq!(node["topics"], json!(["topicX"]));
        let expected = node["broadcast_address"] == "p1";
        assert_eq!(node["tombstones"], json!([expected]));
    }

    // After the lifetime elapses, p1 reappears.
    tokio::time::sleep(Duration::from_millis(250)).await;
    let (_, body) = http_get(http_addr, "/lookup?topic=topicX").await;
    assert_eq!(body["producers"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_register_before_identify_is_fatal() {
    let (tcp_addr, _) = start_daemon(45_000).await;

    let mut conn = ProducerConn::connect(tcp_addr).await;
    let response = conn.command("REGISTER t c").await;
    assert_eq!(response, b"E_INVALID client must IDENTIFY");

    // The server closed the connection after the fatal reply.
    assert!(codec::read_frame(&mut conn.stream).await.is_err());
}

#[tokio::test]
async fn test_identify_twice_is_fatal() {
    let (tcp_addr, _) = start_daemon(45_000).await;

    let mut producer = ProducerConn::connect(tcp_addr).await;
    producer.identify("p1", 4151).await;

    producer.stream.write_all(b"IDENTIFY\n").await.unwrap();
    let response = codec::read_frame(&mut producer.stream).await.unwrap();
    assert_eq!(response, b"E_INVALID cannot IDENTIFY again");
    assert!(codec::read_frame(&mut producer.stream).await.is_err());
}

#[tokio::test]
async fn test_unknown_command_is_fatal() {
    let (tcp_addr, _) = start_daemon(45_000).await;

    let mut conn = ProducerConn::connect(tcp_addr).await;
    let response = conn.command("FOO").await;
    assert_eq!(response, b"E_INVALID invalid command FOO");
    assert!(codec::read_frame(&mut conn.stream).await.is_err());
}

#[tokio::test]
async fn test_ping_allowed_before_identify() {
    let (tcp_addr, _) = start_daemon(45_000).await;

    let mut conn = ProducerConn::connect(tcp_addr).await;
    assert_eq!(conn.command("PING").await, b"OK");
    // Connection stays open for further commands.
    assert_eq!(conn.command("PING").await, b"OK");
}

#[tokio::test]
async fn test_wildcard_topics_listing() {
    let (tcp_addr, http_addr) = start_daemon(45_000).await;

    let mut producers = Vec::new();
    for (i, topic) in ["t1", "t2", "t3"].iter().enumerate() {
        let mut p = ProducerConn::connect(tcp_addr).await;
        p.identify(&format!("p{i}"), 4151).await;
        assert_eq!(p.command(&format!("REGISTER {topic}")).await, b"OK");
        producers.push(p);
    }

    let (status, body) = http_get(http_addr, "/topics").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(string_set(&body["topics"]), vec!["t1", "t2", "t3"]);

    let (_, body) = http_get(http_addr, "/nodes").await;
    assert_eq!(body["producers"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_http_admin_endpoints() {
    let (_, http_addr) = start_daemon(45_000).await;

    // Create a topic and a channel administratively.
    let (status, _) = http_post(http_addr, "/topic/create?topic=adm").await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = http_post(http_addr, "/channel/create?topic=adm&channel=c1").await;
    assert_eq!(status, StatusCode::OK);

    // An administratively created topic is known with no producers.
    let (status, body) = http_get(http_addr, "/lookup?topic=adm").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(string_set(&body["channels"]), vec!["c1"]);
    assert!(body["producers"].as_array().unwrap().is_empty());

    // Channel delete removes only the channel keys.
    let (status, _) = http_post(http_addr, "/channel/delete?topic=adm&channel=c1").await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = http_get(http_addr, "/lookup?topic=adm").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["channels"].as_array().unwrap().is_empty());

    // Topic delete removes the topic entirely.
    let (status, _) = http_post(http_addr, "/topic/delete?topic=adm").await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = http_get(http_addr, "/lookup?topic=adm").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "TOPIC_NOT_FOUND");
}

#[tokio::test]
async fn test_http_error_codes() {
    let (_, http_addr) = start_daemon(45_000).await;

    let (status, body) = http_get(http_addr, "/channels").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "MISSING_ARG_TOPIC");

    let (status, body) = http_get(http_addr, "/lookup?topic=missing").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "TOPIC_NOT_FOUND");

    let (status, body) = http_post(http_addr, "/topic/create?topic=bad%20name").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "INVALID_ARG_TOPIC");

    let (status, body) = http_post(http_addr, "/channel/delete?topic=t&channel=missing").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "CHANNEL_NOT_FOUND");

    let (status, body) = http_post(http_addr, "/topic/tombstone?topic=t").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "MISSING_ARG_NODE");

    let (status, body) = http_get(http_addr, "/no/such/route").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "NOT_FOUND");
}

#[tokio::test]
async fn test_ping_info_and_headers() {
    let (_, http_addr) = start_daemon(45_000).await;

    let response = reqwest::get(format!("http://{http_addr}/ping")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "OK");

    let response = reqwest::get(format!("http://{http_addr}/info")).await.unwrap();
    assert_eq!(
        response
            .headers()
            .get("X-NSQ-Content-Type")
            .and_then(|v| v.to_str().ok()),
        Some("nsq; version=1.0")
    );
    assert_eq!(
        response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok()),
        Some("application/json; charset=utf-8")
    );
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["version"], AppState::VERSION);
}

#[tokio::test]
async fn test_debug_dump() {
    let (tcp_addr, http_addr) = start_daemon(45_000).await;

    let mut producer = ProducerConn::connect(tcp_addr).await;
    producer.identify("p1", 4151).await;
    assert_eq!(producer.command("REGISTER td cd").await, b"OK");

    let (status, body) = http_get(http_addr, "/debug").await;
    assert_eq!(status, StatusCode::OK);
    let map = body.as_object().unwrap();
    assert!(map.contains_key("client::"));
    assert!(map.contains_key("topic:td:"));
    assert!(map.contains_key("channel:td:cd"));

    let clients = map["client::"].as_array().unwrap();
    assert_eq!(clients.len(), 1);
    assert_eq!(clients[0]["broadcast_address"], "p1");
    assert_eq!(clients[0]["tombstoned"], false);
    assert!(clients[0]["last_update"].as_i64().unwrap() > 0);
}
