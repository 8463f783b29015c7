//! Integration tests for the connection handshake.
//!
//! A real TCP listener feeds the reactor; the test plays the client side of
//! the protocol on a plain `TcpStream`.

use std::net::SocketAddr;
use std::time::Duration;

use edgeshare_core::protocol::{
    decode_message, encode_message, options, Message, ProtocolVersion, ScreenInfo, PROTOCOL_VERSION,
};
use edgeshare_server::application::events::Scheduler;
use edgeshare_server::application::server_core::ServerCore;
use edgeshare_server::application::update_layout::{build_settings, build_topology};
use edgeshare_server::infrastructure::input_capture::headless::HeadlessPrimary;
use edgeshare_server::infrastructure::network::{bind, spawn_listener, WriterDrain};
use edgeshare_server::infrastructure::storage::config::{AppConfig, ScreenEntry};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::timeout;

// ── Helpers ───────────────────────────────────────────────────────────────────

fn desk_and_laptop() -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.server.name = "desk".into();
    let mut desk = ScreenEntry::new("desk");
    desk.jump_zone = 4;
    desk.right = Some("laptop".into());
    let mut laptop = ScreenEntry::new("laptop");
    laptop.width = 1280;
    laptop.height = 1024;
    laptop.left = Some("desk".into());
    cfg.screens = vec![desk, laptop];
    cfg
}

async fn start_server(cfg: &AppConfig) -> (Scheduler, ServerCore, SocketAddr, JoinHandle<()>) {
    let topology = build_topology(cfg).expect("topology");
    let settings = build_settings(cfg).expect("settings");
    let mut sched = Scheduler::new();
    let core = ServerCore::new(topology, &cfg.server.name, Box::new(HeadlessPrimary::new()), settings)
        .expect("core");
    ServerCore::install_handlers(&mut sched);
    let listener = bind("127.0.0.1:0".parse().unwrap()).await.expect("bind");
    let addr = listener.local_addr().unwrap();
    let accept = spawn_listener(listener, sched.sender(), WriterDrain::new().guard());
    (sched, core, addr, accept)
}

async fn read_message(stream: &mut TcpStream) -> Message {
    let mut prefix = [0u8; 4];
    timeout(Duration::from_secs(2), stream.read_exact(&mut prefix))
        .await
        .expect("timed out waiting for a frame")
        .expect("read length prefix");
    let len = u32::from_be_bytes(prefix) as usize;
    let mut frame = prefix.to_vec();
    frame.resize(4 + len, 0);
    stream.read_exact(&mut frame[4..]).await.expect("read payload");
    decode_message(&frame).expect("decode").0
}

async fn send(stream: &mut TcpStream, msg: &Message) {
    stream
        .write_all(&encode_message(msg).unwrap())
        .await
        .expect("write");
}

fn laptop_info() -> Message {
    Message::Info(ScreenInfo {
        x: 0,
        y: 0,
        width: 1280,
        height: 1024,
        jump_zone: 1,
        cursor_x: 640,
        cursor_y: 512,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_old_client_is_refused_without_ever_entering() {
    // Arrange
    let (mut sched, mut core, addr, accept) = start_server(&desk_and_laptop()).await;
    let quitter = sched.sender();

    // Act
    let client = async move {
        let mut stream = TcpStream::connect(addr).await.expect("connect");
        let hello = read_message(&mut stream).await;
        send(
            &mut stream,
            &Message::HelloBack {
                version: ProtocolVersion::new(0, 9),
                name: "laptop".into(),
            },
        )
        .await;
        let reply = read_message(&mut stream).await;
        let mut rest = Vec::new();
        timeout(Duration::from_secs(2), stream.read_to_end(&mut rest))
            .await
            .expect("server must close the connection")
            .expect("read to end");
        quitter.quit();
        (hello, reply, rest)
    };
    let ((), (hello, reply, rest)) = tokio::join!(sched.run(&mut core), client);
    accept.abort();

    // Assert
    assert_eq!(hello, Message::Hello(PROTOCOL_VERSION));
    assert_eq!(reply, Message::Incompatible(ProtocolVersion::new(0, 9)));
    assert!(rest.is_empty(), "nothing may follow EINC, got {} bytes", rest.len());
    assert!(!core.is_connected("laptop"));
    assert_eq!(core.session_count(), 0);
}

#[tokio::test]
async fn test_known_client_completes_handshake() {
    // Arrange
    let (mut sched, mut core, addr, accept) = start_server(&desk_and_laptop()).await;
    let quitter = sched.sender();

    // Act
    let client = async move {
        let mut stream = TcpStream::connect(addr).await.expect("connect");
        read_message(&mut stream).await;
        send(
            &mut stream,
            &Message::HelloBack {
                version: PROTOCOL_VERSION,
                name: "laptop".into(),
            },
        )
        .await;
        let query = read_message(&mut stream).await;
        send(&mut stream, &laptop_info()).await;
        let replies = [
            read_message(&mut stream).await,
            read_message(&mut stream).await,
            read_message(&mut stream).await,
        ];
        quitter.quit();
        (query, replies, stream)
    };
    let ((), (query, replies, _stream)) = tokio::join!(sched.run(&mut core), client);
    accept.abort();

    // Assert
    assert_eq!(query, Message::QueryInfo);
    assert_eq!(replies[0], Message::InfoAck);
    assert_eq!(replies[1], Message::ResetOptions);
    assert!(matches!(&replies[2], Message::SetOptions(opts) if opts.contains(&(options::HEARTBEAT, 3000))));
    assert!(core.is_connected("laptop"));
    assert_eq!(core.session_count(), 1);
}

#[tokio::test]
async fn test_second_client_with_same_name_is_busy() {
    // Arrange
    let (mut sched, mut core, addr, accept) = start_server(&desk_and_laptop()).await;
    let quitter = sched.sender();

    // Act
    let clients = async move {
        let mut first = TcpStream::connect(addr).await.expect("connect");
        read_message(&mut first).await;
        send(
            &mut first,
            &Message::HelloBack {
                version: PROTOCOL_VERSION,
                name: "laptop".into(),
            },
        )
        .await;
        read_message(&mut first).await;
        send(&mut first, &laptop_info()).await;
        for _ in 0..3 {
            read_message(&mut first).await;
        }

        let mut second = TcpStream::connect(addr).await.expect("connect");
        read_message(&mut second).await;
        send(
            &mut second,
            &Message::HelloBack {
                version: PROTOCOL_VERSION,
                name: "laptop".into(),
            },
        )
        .await;
        let reply = read_message(&mut second).await;
        quitter.quit();
        (reply, first)
    };
    let ((), (reply, _first)) = tokio::join!(sched.run(&mut core), clients);
    accept.abort();

    // Assert
    assert_eq!(reply, Message::Busy);
    assert!(core.is_connected("laptop"), "the first session survives");
}

#[tokio::test]
async fn test_unknown_client_name_is_refused() {
    // Arrange
    let (mut sched, mut core, addr, accept) = start_server(&desk_and_laptop()).await;
    let quitter = sched.sender();

    // Act
    let client = async move {
        let mut stream = TcpStream::connect(addr).await.expect("connect");
        read_message(&mut stream).await;
        send(
            &mut stream,
            &Message::HelloBack {
                version: PROTOCOL_VERSION,
                name: "tablet".into(),
            },
        )
        .await;
        let reply = read_message(&mut stream).await;
        quitter.quit();
        reply
    };
    let ((), reply) = tokio::join!(sched.run(&mut core), client);
    accept.abort();

    // Assert
    assert_eq!(reply, Message::UnknownClient);
}

#[tokio::test]
async fn test_shutdown_sends_close_to_connected_client() {
    // Arrange
    let (mut sched, mut core, addr, accept) = start_server(&desk_and_laptop()).await;
    let quitter = sched.sender();
    let client = async move {
        let mut stream = TcpStream::connect(addr).await.expect("connect");
        read_message(&mut stream).await;
        send(
            &mut stream,
            &Message::HelloBack {
                version: PROTOCOL_VERSION,
                name: "laptop".into(),
            },
        )
        .await;
        read_message(&mut stream).await;
        send(&mut stream, &laptop_info()).await;
        for _ in 0..3 {
            read_message(&mut stream).await;
        }
        quitter.quit();
        stream
    };
    let ((), mut stream) = tokio::join!(sched.run(&mut core), client);

    // Act
    core.shutdown();
    accept.abort();
    let goodbye = read_message(&mut stream).await;

    // Assert
    assert_eq!(goodbye, Message::Close);
}
