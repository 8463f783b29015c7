//! End-to-end switching tests.
//!
//! Local input comes from a `MockInputSource`, the primary screen is a
//! `FakePrimaryScreen`, and the secondary screen is a TCP client driven by
//! the test.  Everything else is the real server.

use std::net::SocketAddr;
use std::time::Duration;

use edgeshare_core::protocol::{decode_message, encode_message, Message, ScreenInfo, PROTOCOL_VERSION};
use edgeshare_core::ClipboardId;
use edgeshare_server::application::events::Scheduler;
use edgeshare_server::application::server_core::ServerCore;
use edgeshare_server::application::update_layout::{build_settings, build_topology};
use edgeshare_server::infrastructure::input_capture::mock::{FakePrimaryScreen, MockInputSource, PrimaryCall};
use edgeshare_server::infrastructure::input_capture::{forward_input, InputSource, LocalInput};
use edgeshare_server::infrastructure::network::{bind, spawn_listener, WriterDrain};
use edgeshare_server::infrastructure::storage::config::{AppConfig, ScreenEntry};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout, Instant};

// ── Helpers ───────────────────────────────────────────────────────────────────

/// `desk` (1920x1080, zone 4) with `laptop` (1280x1024) on its right.
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

/// Connects as `laptop` and completes the handshake.
async fn connect_laptop(addr: SocketAddr) -> TcpStream {
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
    send(
        &mut stream,
        &Message::Info(ScreenInfo {
            x: 0,
            y: 0,
            width: 1280,
            height: 1024,
            jump_zone: 1,
            cursor_x: 640,
            cursor_y: 512,
        }),
    )
    .await;
    // CIAK, CROP, DSOP
    for _ in 0..3 {
        read_message(&mut stream).await;
    }
    stream
}

/// Polls `fake` until `expected` was recorded or two seconds pass.
async fn wait_for_call(fake: &FakePrimaryScreen, expected: &PrimaryCall) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if fake.calls().contains(expected) {
            return true;
        }
        sleep(Duration::from_millis(10)).await;
    }
    false
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_cursor_crosses_to_laptop_and_returns_when_it_drops() {
    // Arrange
    let cfg = desk_and_laptop();
    let fake = FakePrimaryScreen::new();
    let mut sched = Scheduler::new();
    let mut core = ServerCore::new(
        build_topology(&cfg).unwrap(),
        "desk",
        Box::new(fake.clone()),
        build_settings(&cfg).unwrap(),
    )
    .unwrap();
    ServerCore::install_handlers(&mut sched);
    let listener = bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accept = spawn_listener(listener, sched.sender(), WriterDrain::new().guard());
    let source = MockInputSource::new();
    let input_thread = forward_input(source.start().unwrap(), sched.sender());
    let quitter = sched.sender();

    // Act
    let script = async {
        let mut laptop = connect_laptop(addr).await;

        source.inject_event(LocalInput::MotionPrimary { x: 1925, y: 540 });
        let enter = read_message(&mut laptop).await;

        source.inject_event(LocalInput::KeyDown {
            key: 0x61,
            mask: 0,
            button: 0x26,
        });
        let key = read_message(&mut laptop).await;

        drop(laptop);
        let returned = wait_for_call(
            &fake,
            &PrimaryCall::Enter {
                x: 960,
                y: 540,
                for_screensaver: false,
            },
        )
        .await;
        quitter.quit();
        (enter, key, returned)
    };
    let ((), (enter, key, returned)) = tokio::join!(sched.run(&mut core), script);
    accept.abort();
    source.stop();
    input_thread.join().expect("input thread");

    // Assert
    assert_eq!(
        enter,
        Message::Enter {
            x: 5,
            y: 512,
            seq: 1,
            mask: 0
        }
    );
    assert_eq!(
        key,
        Message::KeyDown {
            key: 0x61,
            mask: 0,
            button: 0x26
        }
    );
    assert!(returned, "input must return to the desk after the laptop drops");
    assert_eq!(core.active_screen(), "desk");
    assert!(!core.is_connected("laptop"));
    assert_eq!(fake.calls()[0], PrimaryCall::Leave);
}

#[tokio::test]
async fn test_clipboard_copied_on_laptop_reaches_desk() {
    // Arrange
    let cfg = desk_and_laptop();
    let fake = FakePrimaryScreen::new();
    let mut sched = Scheduler::new();
    let mut core = ServerCore::new(
        build_topology(&cfg).unwrap(),
        "desk",
        Box::new(fake.clone()),
        build_settings(&cfg).unwrap(),
    )
    .unwrap();
    ServerCore::install_handlers(&mut sched);
    let listener = bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accept = spawn_listener(listener, sched.sender(), WriterDrain::new().guard());
    let quitter = sched.sender();

    // Act
    let script = async {
        let mut laptop = connect_laptop(addr).await;
        send(
            &mut laptop,
            &Message::ClipboardGrab {
                id: ClipboardId::Clipboard,
                seq: 0,
            },
        )
        .await;
        send(
            &mut laptop,
            &Message::ClipboardData {
                id: ClipboardId::Clipboard,
                seq: 0,
                data: b"from laptop".to_vec(),
            },
        )
        .await;
        let delivered = wait_for_call(
            &fake,
            &PrimaryCall::SetClipboard {
                id: ClipboardId::Clipboard,
                data: b"from laptop".to_vec(),
            },
        )
        .await;
        quitter.quit();
        (delivered, laptop)
    };
    let ((), (delivered, _laptop)) = tokio::join!(sched.run(&mut core), script);
    accept.abort();

    // Assert
    assert!(delivered);
    assert!(fake
        .calls()
        .contains(&PrimaryCall::GrabClipboard(ClipboardId::Clipboard)));
    assert_eq!(
        core.clipboard(ClipboardId::Clipboard).owner.as_deref(),
        Some("laptop")
    );
}
