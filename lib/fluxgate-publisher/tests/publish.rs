//! End-to-end publishing against local UDP and HTTP endpoints.

use std::{sync::Arc, time::Duration};

use fluxgate_config::{ConfigurationLoader, GenericConfiguration};
use fluxgate_io::deser::{DecoderRegistry, CONTENT_TYPE_JSON};
use fluxgate_publisher::{transport::ClientRegistry, ErrorKind, Publisher};
use serde_json::{json, Value};
use tokio::{
    io::{AsyncReadExt as _, AsyncWriteExt as _},
    net::{TcpListener, TcpStream, UdpSocket},
    sync::mpsc,
};

const TIMESTAMP: &str = "2016-06-01T12:00:00Z";
const TIMESTAMP_SECS: &str = "1464782400";
const TIMESTAMP_NANOS: &str = "1464782400000000000";

struct CapturedRequest {
    request_line: String,
    body: String,
}

/// A minimal HTTP endpoint that answers every request with `status_line` and forwards what it received.
async fn http_endpoint(status_line: &'static str) -> (u16, mpsc::UnboundedReceiver<CapturedRequest>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        loop {
            let (stream, _) = listener.accept().await.unwrap();
            let tx = tx.clone();
            tokio::spawn(async move {
                if let Some(request) = handle_connection(stream, status_line).await {
                    let _ = tx.send(request);
                }
            });
        }
    });

    (port, rx)
}

async fn handle_connection(mut stream: TcpStream, status_line: &'static str) -> Option<CapturedRequest> {
    let mut raw = Vec::new();
    let mut chunk = [0u8; 4096];

    let (header_end, content_length) = loop {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        raw.extend_from_slice(&chunk[..n]);

        let text = String::from_utf8_lossy(&raw);
        if let Some(header_end) = text.find("\r\n\r\n") {
            let content_length = text[..header_end]
                .lines()
                .filter_map(|line| line.split_once(':'))
                .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            break (header_end, content_length);
        }
    };

    while raw.len() < header_end + 4 + content_length {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        raw.extend_from_slice(&chunk[..n]);
    }

    let text = String::from_utf8_lossy(&raw).to_string();
    let request_line = text.lines().next().unwrap_or_default().to_string();
    let body = text[header_end + 4..].to_string();

    let response = format!("HTTP/1.1 {}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n", status_line);
    stream.write_all(response.as_bytes()).await.ok()?;
    stream.shutdown().await.ok()?;

    Some(CapturedRequest { request_line, body })
}

async fn udp_endpoint() -> (u16, UdpSocket) {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = socket.local_addr().unwrap().port();
    (port, socket)
}

async fn recv_datagram(socket: &UdpSocket) -> String {
    let mut buf = vec![0u8; 65536];
    let (n, _) = tokio::time::timeout(Duration::from_secs(5), socket.recv_from(&mut buf))
        .await
        .expect("timed out waiting for datagram")
        .unwrap();
    String::from_utf8(buf[..n].to_vec()).unwrap()
}

async fn recv_request(rx: &mut mpsc::UnboundedReceiver<CapturedRequest>) -> CapturedRequest {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for request")
        .unwrap()
}

fn publisher() -> Publisher {
    Publisher::new(DecoderRegistry::default(), Arc::new(ClientRegistry::default()))
}

fn http_options(port: u16, extra: Value) -> GenericConfiguration {
    let mut values = json!({
        "host": "127.0.0.1",
        "port": port,
        "scheme": "http",
        "user": "root",
        "password": "root",
        "database": "test",
        "retention": "autogen",
        "precision": "s",
    });
    merge(&mut values, extra);
    ConfigurationLoader::default().from_values(values).unwrap().into_generic()
}

fn udp_options(port: u16, extra: Value) -> GenericConfiguration {
    let mut values = json!({
        "host": "127.0.0.1",
        "port": port,
        "scheme": "udp",
        "database": "test",
        "precision": "s",
    });
    merge(&mut values, extra);
    ConfigurationLoader::default().from_values(values).unwrap().into_generic()
}

fn merge(values: &mut Value, extra: Value) {
    if let (Some(values), Value::Object(extra)) = (values.as_object_mut(), extra) {
        values.extend(extra);
    }
}

fn static_ns(path: &[&str]) -> Value {
    Value::Array(
        path.iter()
            .map(|segment| json!({ "kind": "static", "value": segment }))
            .collect(),
    )
}

fn metric(namespace: Value, value: Value) -> Value {
    json!({
        "namespace": namespace,
        "timestamp": TIMESTAMP,
        "tags": { "zone": "red" },
        "unit": "some unit",
        "value": value,
    })
}

fn payload(metrics: Vec<Value>) -> Vec<u8> {
    serde_json::to_vec(&Value::Array(metrics)).unwrap()
}

fn typed_cases() -> Vec<(Value, &'static str)> {
    vec![
        (json!({ "type": "integer", "data": 99 }), "99i"),
        (json!({ "type": "float", "data": 3.141 }), "3.141"),
        (json!({ "type": "string", "data": "bar" }), "\"bar\""),
        (json!({ "type": "boolean", "data": true }), "true"),
        (json!({ "type": "nil" }), "\"\""),
    ]
}

#[tokio::test]
async fn every_value_type_over_http() {
    let (port, mut requests) = http_endpoint("204 No Content").await;
    let publisher = publisher();
    let options = http_options(port, json!({}));

    for (value, encoded) in typed_cases() {
        let payload = payload(vec![metric(static_ns(&["intel", "foo"]), value)]);
        publisher.publish(CONTENT_TYPE_JSON, &payload, &options).await.unwrap();

        let request = recv_request(&mut requests).await;
        assert_eq!(request.request_line, "POST /write?db=test&rp=autogen&precision=s HTTP/1.1");
        assert_eq!(request.body, format!("intel,zone=red foo={} {}", encoded, TIMESTAMP_SECS));
    }

    assert_eq!(publisher.registry().len(), 1);
}

#[tokio::test]
async fn every_value_type_over_udp() {
    let (port, socket) = udp_endpoint().await;
    let publisher = publisher();
    let options = udp_options(port, json!({}));

    for (value, encoded) in typed_cases() {
        let payload = payload(vec![metric(static_ns(&["intel", "foo"]), value)]);
        publisher.publish(CONTENT_TYPE_JSON, &payload, &options).await.unwrap();

        let datagram = recv_datagram(&socket).await;
        assert_eq!(datagram, format!("intel,zone=red foo={} {}\n", encoded, TIMESTAMP_NANOS));
    }
}

#[tokio::test]
async fn multi_field_grouping_with_duplicate_leaf() {
    let (port, socket) = udp_endpoint().await;
    let options = udp_options(port, json!({ "isMultiFields": true }));

    let payload = payload(vec![
        metric(static_ns(&["a", "b", "x"]), json!({ "type": "integer", "data": 1 })),
        metric(static_ns(&["a", "b", "y"]), json!({ "type": "float", "data": 2.5 })),
        metric(static_ns(&["a", "b", "z"]), json!({ "type": "integer", "data": 3 })),
        metric(static_ns(&["a", "b", "z"]), json!({ "type": "integer", "data": 4 })),
    ]);
    publisher().publish(CONTENT_TYPE_JSON, &payload, &options).await.unwrap();

    let datagram = recv_datagram(&socket).await;
    assert_eq!(datagram, format!("a/b,zone=red x=1i,y=2.5,z=4i {}\n", TIMESTAMP_NANOS));
}

#[tokio::test]
async fn dynamic_elements_become_tags() {
    let (port, mut requests) = http_endpoint("204 No Content").await;
    let options = http_options(port, json!({}));

    let one_dynamic = json!([
        { "kind": "static", "value": "foo" },
        { "kind": "dynamic", "name": "dyn", "description": "dynamic element", "value": "fooval" },
        { "kind": "static", "value": "bar" },
    ]);
    let two_dynamic = json!([
        { "kind": "static", "value": "foo" },
        { "kind": "dynamic", "name": "dyn1", "description": "", "value": "fooval" },
        { "kind": "dynamic", "name": "dyn2", "description": "", "value": "barval" },
        { "kind": "static", "value": "baz" },
    ]);
    let payload = payload(vec![
        metric(one_dynamic, json!({ "type": "integer", "data": 1 })),
        metric(two_dynamic, json!({ "type": "integer", "data": 2 })),
    ]);
    publisher().publish(CONTENT_TYPE_JSON, &payload, &options).await.unwrap();

    let request = recv_request(&mut requests).await;
    let lines = request.body.lines().collect::<Vec<_>>();
    assert_eq!(
        lines,
        vec![
            format!("foo,dyn=fooval,zone=red bar=1i {}", TIMESTAMP_SECS),
            format!("foo,dyn1=fooval,dyn2=barval,zone=red baz=2i {}", TIMESTAMP_SECS),
        ]
    );
}

#[tokio::test]
async fn same_input_over_both_transports() {
    let (http_port, mut requests) = http_endpoint("204 No Content").await;
    let (udp_port, socket) = udp_endpoint().await;
    let publisher = publisher();

    let payload = payload(vec![
        metric(static_ns(&["influx", "x"]), json!({ "type": "integer", "data": 1 })),
        metric(static_ns(&["influx", "y"]), json!({ "type": "string", "data": "two" })),
    ]);

    publisher
        .publish(CONTENT_TYPE_JSON, &payload, &http_options(http_port, json!({})))
        .await
        .unwrap();
    publisher
        .publish(CONTENT_TYPE_JSON, &payload, &udp_options(udp_port, json!({})))
        .await
        .unwrap();

    assert_eq!(recv_request(&mut requests).await.body.lines().count(), 2);
    assert_eq!(recv_datagram(&socket).await.lines().count(), 2);
    assert_eq!(publisher.registry().len(), 2);
}

#[tokio::test]
async fn empty_namespace_rejected_without_write() {
    let (port, socket) = udp_endpoint().await;
    let options = udp_options(port, json!({}));

    let payload = payload(vec![
        metric(static_ns(&["ok"]), json!({ "type": "integer", "data": 1 })),
        metric(json!([]), json!({ "type": "integer", "data": 2 })),
    ]);
    let err = publisher()
        .publish(CONTENT_TYPE_JSON, &payload, &options)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Resolution);

    let mut buf = [0u8; 1024];
    let received = tokio::time::timeout(Duration::from_millis(200), socket.recv_from(&mut buf)).await;
    assert!(received.is_err(), "no datagram should have been sent");
}

#[tokio::test]
async fn independent_metrics_one_point_each() {
    let (port, socket) = udp_endpoint().await;
    let options = udp_options(port, json!({ "isMultiFields": false }));

    let metrics = (0..6)
        .map(|i| {
            let leaf = format!("m{}", i);
            metric(static_ns(&["group", &leaf]), json!({ "type": "integer", "data": i }))
        })
        .collect();
    publisher().publish(CONTENT_TYPE_JSON, &payload(metrics), &options).await.unwrap();

    let datagram = recv_datagram(&socket).await;
    let lines = datagram.lines().collect::<Vec<_>>();
    assert_eq!(lines.len(), 6);
    for (i, line) in lines.iter().enumerate() {
        assert_eq!(*line, format!("group,zone=red m{}={}i {}", i, i, TIMESTAMP_NANOS));
    }
}

#[tokio::test]
async fn rejected_http_write_is_transport_error() {
    let (port, mut requests) = http_endpoint("401 Unauthorized").await;
    let options = http_options(port, json!({}));

    let payload = payload(vec![metric(static_ns(&["foo"]), json!({ "type": "integer", "data": 1 }))]);
    let err = publisher()
        .publish(CONTENT_TYPE_JSON, &payload, &options)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Transport);
    recv_request(&mut requests).await;
}

#[tokio::test]
async fn unsupported_content_type_is_decode_error() {
    let err = publisher()
        .publish("snap.gob", b"\x00\x01", &udp_options(4444, json!({})))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Decode);
}
