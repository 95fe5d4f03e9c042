//! End-to-end tests for the tee pipeline over loopback sockets.

use std::net::SocketAddr;
use std::time::Duration;

use statsd_tee::config::{ConfigError, ConfigLoader, DestinationConfig, TeeConfig};
use statsd_tee::tee::{Tee, TeeError};
use tokio::net::UdpSocket;

fn destination(addr: SocketAddr, pattern: &str, replacement: &str) -> DestinationConfig {
    format!("{addr}:{pattern}:{replacement}").parse().unwrap()
}

fn loopback_config(destinations: Vec<DestinationConfig>) -> TeeConfig {
    let mut config = TeeConfig {
        destinations,
        ..TeeConfig::default()
    };
    config.tee.listen_address = "127.0.0.1:0".to_string();
    config
}

async fn recv_text(socket: &UdpSocket) -> String {
    let mut buf = [0u8; 512];
    let n = tokio::time::timeout(Duration::from_secs(2), socket.recv(&mut buf))
        .await
        .expect("timed out waiting for packet")
        .expect("recv failed");
    String::from_utf8_lossy(&buf[..n]).into_owned()
}

#[tokio::test]
async fn test_end_to_end_fanout() {
    let prod = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let dev = UdpSocket::bind("127.0.0.1:0").await.unwrap();

    let config = loopback_config(vec![
        destination(prod.local_addr().unwrap(), r"^stats\.", "prod.stats."),
        destination(dev.local_addr().unwrap(), r"^stats\.", "dev.stats."),
    ]);
    ConfigLoader::with_default_validators()
        .validate(&config)
        .unwrap();

    let tee = Tee::start(&config).await.unwrap();
    let addr = tee.local_addr();
    let handle = tokio::spawn(tee.run());

    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    client.send_to(b"stats.counter:5|c\n", addr).await.unwrap();

    assert_eq!(recv_text(&prod).await, "prod.stats.counter:5|c");
    assert_eq!(recv_text(&dev).await, "dev.stats.counter:5|c");

    handle.abort();
}

#[tokio::test]
async fn test_multi_record_datagram() {
    let sink = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let config = loopback_config(vec![destination(
        sink.local_addr().unwrap(),
        r"^app\.(\w+)\.",
        "svc.$1.",
    )]);

    let tee = Tee::start(&config).await.unwrap();
    let addr = tee.local_addr();
    let stats = tee.stats();
    let handle = tokio::spawn(tee.run());

    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    client
        .send_to(
            b"app.web.hits:1|c\nnot a metric\n\nother.gauge:3|g|@0.5\n",
            addr,
        )
        .await
        .unwrap();

    assert_eq!(recv_text(&sink).await, "svc.web.hits:1|c");
    assert_eq!(recv_text(&sink).await, "other.gauge:3|g|@0.5");

    let snapshot = stats.snapshot();
    assert_eq!(snapshot.datagrams_received, 1);
    assert_eq!(snapshot.packets_sent, 2);

    handle.abort();
}

#[tokio::test]
async fn test_zero_destinations_refused() {
    let config = loopback_config(Vec::new());

    let validation = ConfigLoader::with_default_validators().validate(&config);
    assert!(matches!(validation, Err(ConfigError::NoDestinations)));

    let result = Tee::start(&config).await;
    assert!(matches!(
        result,
        Err(TeeError::Config(ConfigError::NoDestinations))
    ));
}
