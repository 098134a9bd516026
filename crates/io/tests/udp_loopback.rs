//! UDP 어댑터 통합 테스트 (루프백)
//!
//! - 소스: 데이터그램 디코딩, 디코딩 실패 레코드 폐기, 정지 요청 시 종료
//! - 싱크: 인코딩 후 전송, 출력 채널로 계속 전달

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use evpipe_core::codec::CodecKind;
use evpipe_core::component::Component;
use evpipe_core::config::Options;
use evpipe_core::event::Event;
use evpipe_core::value::Value;
use evpipe_io::udp::{UdpInput, UdpOutput};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

const TIMEOUT: Duration = Duration::from_secs(5);

fn options(value: serde_json::Value) -> Options {
    let serde_json::Value::Object(map) = value else {
        panic!("options must be an object");
    };
    map
}

#[tokio::test]
async fn json_source_decodes_and_drops_garbage() {
    let (tx, mut rx) = mpsc::channel(8);
    let source = Arc::new(
        UdpInput::new(
            "UDPJSONInput",
            "IN-UDP-JSON",
            CodecKind::Json,
            None,
            Some(tx),
            &options(serde_json::json!({ "bind": "127.0.0.1", "port": 0 })),
        )
        .unwrap(),
    );
    let addr = source.local_addr().unwrap();
    let handle = tokio::spawn(Arc::clone(&source).run());

    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    client.send_to(br#"{"src": "10.0.0.1"}"#, addr).await.unwrap();
    client.send_to(b"definitely not json", addr).await.unwrap();
    client.send_to(b"{\"src\": \"10.0.0.2\"}\n", addr).await.unwrap();

    let first = tokio::time::timeout(TIMEOUT, rx.recv()).await.unwrap().unwrap();
    let second = tokio::time::timeout(TIMEOUT, rx.recv()).await.unwrap().unwrap();
    assert_eq!(first.get("src"), Some(&Value::from("10.0.0.1")));
    assert_eq!(second.get("src"), Some(&Value::from("10.0.0.2")));

    source.request_stop();
    tokio::time::timeout(TIMEOUT, handle)
        .await
        .expect("source should stop on request")
        .unwrap()
        .unwrap();
    assert_eq!(source.base().messages(), 2);
}

#[tokio::test]
async fn csv_source_converts_numbers() {
    let (tx, mut rx) = mpsc::channel(8);
    let source = Arc::new(
        UdpInput::new(
            "UDPCSVInput",
            "IN-UDP-CSV",
            CodecKind::Csv,
            None,
            Some(tx),
            &options(serde_json::json!({
                "bind": "127.0.0.1",
                "headers": ["src", "bytes"],
            })),
        )
        .unwrap(),
    );
    let addr = source.local_addr().unwrap();
    let handle = tokio::spawn(Arc::clone(&source).run());

    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    client.send_to(b"10.0.0.1,1500\n", addr).await.unwrap();

    let event = tokio::time::timeout(TIMEOUT, rx.recv()).await.unwrap().unwrap();
    assert_eq!(event.get("bytes"), Some(&Value::Int(1500)));

    source.request_stop();
    tokio::time::timeout(TIMEOUT, handle).await.unwrap().unwrap().unwrap();
}

#[tokio::test]
async fn json_sink_sends_and_forwards() {
    let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = receiver.local_addr().unwrap().port();

    let (in_tx, in_rx) = mpsc::channel(4);
    let (out_tx, mut out_rx) = mpsc::channel(4);
    let sink = Arc::new(
        UdpOutput::new(
            "UDPJSONOutput",
            "OUT-UDP-JSON",
            CodecKind::Json,
            Some(in_rx),
            Some(out_tx),
            &options(serde_json::json!({ "target": "127.0.0.1", "port": port })),
        )
        .unwrap(),
    );
    let handle = tokio::spawn(Arc::clone(&sink).run());

    in_tx
        .send(Event::from_json_str(r#"{"src": "10.0.0.1", "n": 7}"#).unwrap())
        .await
        .unwrap();

    let mut buf = [0u8; 1024];
    let (len, _) = tokio::time::timeout(TIMEOUT, receiver.recv_from(&mut buf))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&buf[..len], b"{\"n\":7,\"src\":\"10.0.0.1\"}\n");

    let forwarded = tokio::time::timeout(TIMEOUT, out_rx.recv()).await.unwrap().unwrap();
    assert_eq!(forwarded.get("n"), Some(&Value::Int(7)));

    drop(in_tx);
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn raw_sink_type_mismatch_still_forwards() {
    let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = receiver.local_addr().unwrap().port();

    let (in_tx, in_rx) = mpsc::channel(4);
    let (out_tx, mut out_rx) = mpsc::channel(4);
    let sink = Arc::new(
        UdpOutput::new(
            "UDPRawOutput",
            "OUT-UDP-RAW",
            CodecKind::Raw,
            Some(in_rx),
            Some(out_tx),
            &options(serde_json::json!({ "target": "127.0.0.1", "port": port })),
        )
        .unwrap(),
    );
    let handle = tokio::spawn(Arc::clone(&sink).run());

    let mut wrong = Event::default();
    wrong.set("bytes", "text, not bytes");
    in_tx.send(wrong).await.unwrap();

    let mut right = Event::default();
    right.set("bytes", Bytes::from_static(b"\x01\x02\x03"));
    in_tx.send(right).await.unwrap();

    // 첫 이벤트는 인코딩 실패로 전송되지 않고, 두 번째만 도착합니다.
    let mut buf = [0u8; 64];
    let (len, _) = tokio::time::timeout(TIMEOUT, receiver.recv_from(&mut buf))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&buf[..len], b"\x01\x02\x03");

    assert!(out_rx.recv().await.is_some());
    assert!(out_rx.recv().await.is_some());

    drop(in_tx);
    handle.await.unwrap().unwrap();
}
