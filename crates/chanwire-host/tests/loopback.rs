//! Server and client hubs talking over the in-process transport.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;

use chanwire_core::{Message, Peer, Target};
use chanwire_host::config::{self, SideConfig};
use chanwire_host::demo::{self, Greeting, Welcome};
use chanwire_host::dispatch::MainThread;
use chanwire_host::hub::{ChannelHub, UNKNOWN_CHANNEL_LABEL};
use chanwire_host::transport::{run_endpoint, InboundPacket, MemoryNetwork, Transport};

const CONFIG: &str = r#"
version: 1
endpoint:
  queue_capacity: 16
channels:
  - name: "demo"
    limits: { max_packet_bytes: 64 }
"#;

fn hub(side: SideConfig) -> (ChannelHub, MainThread) {
    let mut cfg = config::load_from_str(CONFIG).unwrap();
    cfg.endpoint.side = side;
    let (hub, main) = ChannelHub::new(cfg).unwrap();
    demo::register(&hub.channel("demo").unwrap()).unwrap();
    (hub, main)
}

fn packet(from: Option<&str>, payload: Bytes) -> InboundPacket {
    InboundPacket {
        channel: Arc::from("demo"),
        from: from.map(Peer::new),
        payload,
    }
}

#[tokio::test]
async fn greeting_gets_welcome_on_client_main_thread() {
    let (server, _server_main) = hub(SideConfig::Server);
    let (client, mut client_main) = hub(SideConfig::Client);
    demo::serve_greetings(&server.channel("demo").unwrap(), "hello there");

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    client.channel("demo").unwrap().on::<Welcome, _>(move |w, _| {
        sink.lock()
            .unwrap()
            .push((w.motd.clone(), w.player_count, w.operator));
        Ok(())
    });

    let (net, server_inbox) = MemoryNetwork::new(16);
    let peer = Peer::new("p1");
    let client_inbox = net.connect(peer.clone());
    server.attach_sink(net.server_sink());
    client.attach_sink(net.client_sink(peer));
    tokio::spawn(run_endpoint(server.clone(), server_inbox));
    tokio::spawn(run_endpoint(client.clone(), client_inbox));

    let ctx = client.channel("demo").unwrap();
    let mut hello = Greeting::instantiate(Arc::clone(&ctx)).unwrap();
    hello.name = "alice".into();
    ctx.send(&hello, Target::Server).unwrap();

    let ran = tokio::time::timeout(Duration::from_secs(2), client_main.run_next())
        .await
        .expect("welcome timed out");
    assert!(ran);

    assert_eq!(
        seen.lock().unwrap().as_slice(),
        &[("hello there".to_string(), 1, true)]
    );

    let sm = server.metrics();
    assert_eq!(sm.packets_in.get(&[("channel", "demo")]), 1);
    assert_eq!(sm.packets_out.get(&[("channel", "demo")]), 1);
    assert_eq!(
        sm.dispatched.get(&[("channel", "demo"), ("mode", "async")]),
        1
    );
    let cm = client.metrics();
    assert_eq!(cm.packets_out.get(&[("channel", "demo")]), 1);
    assert_eq!(
        cm.dispatched.get(&[("channel", "demo"), ("mode", "main")]),
        1
    );
}

#[tokio::test]
async fn wrong_side_packet_is_counted_and_dropped() {
    let (server, _main) = hub(SideConfig::Server);
    let ctx = server.channel("demo").unwrap();
    let welcome = Welcome::instantiate(Arc::clone(&ctx)).unwrap();
    let payload = ctx.encode(&welcome).unwrap();

    let err = server
        .handle_inbound(packet(Some("p1"), payload))
        .unwrap_err();
    assert_eq!(err.code().as_str(), "WRONG_SIDE");
    assert_eq!(
        server
            .metrics()
            .packets_rejected
            .get(&[("channel", "demo"), ("reason", "WRONG_SIDE")]),
        1
    );
}

#[tokio::test]
async fn oversize_packet_is_dropped_before_decode() {
    let (server, _main) = hub(SideConfig::Server);
    let err = server
        .handle_inbound(packet(Some("p1"), Bytes::from(vec![0u8; 65])))
        .unwrap_err();
    assert_eq!(err.code().as_str(), "MALFORMED");
    assert_eq!(server.metrics().packets_in.get(&[("channel", "demo")]), 0);
}

#[tokio::test]
async fn unknown_channel_and_missing_sender_are_rejected() {
    let (server, _main) = hub(SideConfig::Server);

    let mut p = packet(Some("p1"), Bytes::from_static(&[0]));
    p.channel = Arc::from("nope");
    let err = server.handle_inbound(p).unwrap_err();
    assert_eq!(err.code().as_str(), "INVALID_CHANNEL");

    let err = server
        .handle_inbound(packet(None, Bytes::from_static(&[0])))
        .unwrap_err();
    assert_eq!(err.code().as_str(), "MALFORMED");
}

#[tokio::test]
async fn synchronous_types_wait_for_the_main_thread() {
    let (client, mut main) = hub(SideConfig::Client);
    let ctx = client.channel("demo").unwrap();
    let hits = Arc::new(Mutex::new(0u32));
    let counter = Arc::clone(&hits);
    ctx.on::<Welcome, _>(move |_, _| {
        *counter.lock().unwrap() += 1;
        Ok(())
    });

    let payload = ctx.encode(&Welcome::instantiate(Arc::clone(&ctx)).unwrap()).unwrap();
    client.handle_inbound(packet(None, payload.clone())).unwrap();
    client.handle_inbound(packet(None, payload)).unwrap();
    assert_eq!(*hits.lock().unwrap(), 0);

    assert_eq!(main.run_pending(), 2);
    assert_eq!(*hits.lock().unwrap(), 2);
}

#[tokio::test]
async fn broadcast_reaches_every_peer() {
    let (server, _main) = hub(SideConfig::Server);
    let (net, _server_inbox) = MemoryNetwork::new(16);
    let mut a = net.connect(Peer::new("a"));
    let mut b = net.connect(Peer::new("b"));
    server.attach_sink(net.server_sink());

    let ctx = server.channel("demo").unwrap();
    let mut w = Welcome::instantiate(Arc::clone(&ctx)).unwrap();
    w.motd = "all".into();
    ctx.send(&w, Target::AllPeers).unwrap();

    let id = ctx.id_of::<Welcome>().unwrap();
    for inbox in [&mut a, &mut b] {
        let got = inbox.recv().await.unwrap();
        assert_eq!(&*got.channel, "demo");
        assert!(got.from.is_none());
        assert_eq!(got.payload[0], id);
    }

    let err = ctx.send(&w, Target::Peer(Peer::new("ghost"))).unwrap_err();
    assert_eq!(err.code().as_str(), "INTERNAL");
}

#[tokio::test]
async fn unknown_channel_names_share_one_reject_series() {
    let (server, _main) = hub(SideConfig::Server);
    for i in 0..1000 {
        let mut p = packet(Some("p1"), Bytes::from_static(&[0]));
        p.channel = Arc::from(format!("bogus-{i}"));
        assert!(server.handle_inbound(p).is_err());
    }
    server
        .handle_inbound(packet(Some("p1"), Bytes::new()))
        .unwrap_err();

    let m = server.metrics();
    assert_eq!(
        m.packets_rejected.get(&[
            ("channel", UNKNOWN_CHANNEL_LABEL),
            ("reason", "INVALID_CHANNEL")
        ]),
        1000
    );
    assert_eq!(
        m.packets_rejected
            .get(&[("channel", "demo"), ("reason", "MALFORMED")]),
        1
    );
    let series = m
        .render()
        .lines()
        .filter(|l| l.starts_with("chanwire_packets_rejected_total{"))
        .count();
    assert_eq!(series, 2);
}

#[tokio::test]
async fn disconnected_peer_misses_broadcast() {
    let (server, _main) = hub(SideConfig::Server);
    let (net, _server_inbox) = MemoryNetwork::new(16);
    let mut stays = net.connect(Peer::new("stays"));
    let mut leaves = net.connect(Peer::new("leaves"));
    server.attach_sink(net.server_sink());

    assert!(net.disconnect(&Peer::new("leaves")));
    assert!(!net.disconnect(&Peer::new("leaves")));
    assert_eq!(net.peers(), vec![Peer::new("stays")]);

    let ctx = server.channel("demo").unwrap();
    let w = Welcome::instantiate(Arc::clone(&ctx)).unwrap();
    ctx.send(&w, Target::AllPeers).unwrap();

    assert!(stays.recv().await.is_some());
    assert!(leaves.recv().await.is_none());
}
