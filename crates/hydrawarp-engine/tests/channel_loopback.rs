use std::cell::RefCell;
use std::collections::HashMap;
use std::net::TcpListener;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use hydrawarp_engine::{
    AssetProvisioner, ConnectionState, ControlChannel, EngineError, InboundMessage, OutboundSink, ParamSink,
    SlotCommand, TransportConfig, TransportHandler, WebSocketCfg, WsTransport,
};
use tungstenite::Message;

#[derive(Default, Clone)]
struct MapSink {
    floats: Rc<RefCell<HashMap<i32, f32>>>,
}

impl ParamSink for MapSink {
    fn set_float(&mut self, index: i32, value: f32) -> bool {
        self.floats.borrow_mut().insert(index, value) != Some(value)
    }
    fn float_value(&self, index: i32) -> Option<f32> {
        self.floats.borrow().get(&index).copied()
    }
    fn set_vec4(&mut self, _index: i32, _components: [f32; 4]) {}
    fn select_slot(&mut self, _cmd: SlotCommand) {}
}

struct NoDirs;

impl AssetProvisioner for NoDirs {
    fn ensure_dir(&mut self, _rel: &str) -> Result<(), EngineError> {
        Ok(())
    }
}

fn channel_for(url: String) -> (ControlChannel, Rc<RefCell<HashMap<i32, f32>>>) {
    channel_with(WebSocketCfg {
        url: Some(url),
        ..WebSocketCfg::default()
    })
}

fn channel_with(cfg: WebSocketCfg) -> (ControlChannel, Rc<RefCell<HashMap<i32, f32>>>) {
    let sink = MapSink::default();
    let floats = sink.floats.clone();
    (ControlChannel::new(&cfg, Box::new(sink), Box::new(NoDirs)), floats)
}

/// Tick the channel until `done` holds or the deadline passes.
fn tick_until(ch: &mut ControlChannel, what: &str, mut done: impl FnMut(&mut ControlChannel) -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !done(ch) {
        assert!(Instant::now() < deadline, "timed out waiting for {what} (state {:?})", ch.state());
        ch.update();
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn loopback_session() {
    const LIVE: &str = "#version 330\nout vec4 c;\nvoid main(){ c = vec4(1.0); }";

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let server = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut ws = tungstenite::accept(stream).unwrap();

        ws.send(Message::Text(r#"{"params":[{"name":2,"value":0.75}]}"#.to_string())).unwrap();
        ws.send(Message::Text(r#"{"event":"frag","message":"void main(){}"}"#.to_string())).unwrap();
        ws.send(Message::Text(LIVE.to_string())).unwrap();

        let mut got = Vec::new();
        while got.len() < 2 {
            if let Message::Text(t) = ws.read().unwrap() {
                got.push(t);
            }
        }

        let _ = ws.close(None);
        while ws.read().is_ok() {}
        got
    });

    let (mut ch, floats) = channel_for(format!("ws://{addr}"));
    ch.connect();
    assert_eq!(ch.state(), ConnectionState::Connecting);

    tick_until(&mut ch, "open", |c| c.is_connected());
    assert_eq!(ch.take_status().as_deref(), Some("Connected"));

    tick_until(&mut ch, "frag", |c| c.has_received_shader());
    assert_eq!(ch.consume_fragment_shader(), "void main(){}");
    assert_eq!(floats.borrow().get(&2).copied(), Some(0.75));

    assert!(ch.change_shader_index(2, 3, 1));

    tick_until(&mut ch, "close", |c| c.state() == ConnectionState::Disconnected);
    assert_eq!(ch.status(), "Disconnected");

    let mut got = server.join().unwrap();
    got.sort();
    let mut want = vec![
        LIVE.to_string(),
        r#"{"cmd":[{"type":1,"warp":2,"shader":3,"slot":1}]}"#.to_string(),
    ];
    want.sort();
    assert_eq!(got, want);

    // Closed: sends are dropped again.
    assert!(!ch.send_json("{}"));
}

#[test]
fn refused_connection_reports_failure() {
    let addr = {
        let l = TcpListener::bind("127.0.0.1:0").unwrap();
        l.local_addr().unwrap()
    };

    let (mut ch, _) = channel_for(format!("ws://{addr}"));
    ch.connect();
    tick_until(&mut ch, "failure", |c| c.state() == ConnectionState::Disconnected);
    assert!(ch.status().starts_with("WS Error:"), "status: {}", ch.status());
}

#[test]
fn disconnect_closes_the_session() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let server = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut ws = tungstenite::accept(stream).unwrap();
        // Runs until the client's close handshake completes.
        loop {
            match ws.read() {
                Ok(Message::Close(_)) => {}
                Ok(_) => {}
                Err(_) => break,
            }
        }
    });

    let (mut ch, _) = channel_for(format!("ws://{addr}"));
    ch.connect();
    tick_until(&mut ch, "open", |c| c.is_connected());

    ch.disconnect();
    assert_eq!(ch.state(), ConnectionState::Disconnected);
    assert_eq!(ch.take_status().as_deref(), Some("Disconnected"));

    server.join().unwrap();
}

#[test]
fn interrupted_session_reconnects_on_one_attempt() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let accepted = Arc::new(AtomicUsize::new(0));
    let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(1);

    let server = {
        let accepted = accepted.clone();
        thread::spawn(move || {
            // First session: the peer vanishes without a close frame.
            let (stream, _) = listener.accept().unwrap();
            accepted.fetch_add(1, Ordering::SeqCst);
            drop(tungstenite::accept(stream).unwrap());

            // Second session: the handshake answer is held back until released.
            let (stream, _) = listener.accept().unwrap();
            accepted.fetch_add(1, Ordering::SeqCst);
            release_rx.recv().unwrap();
            let mut ws = tungstenite::accept(stream).unwrap();
            ws.send(Message::Text(r#"{"params":[{"name":5,"value":0.5}]}"#.to_string())).unwrap();
            while ws.read().is_ok() {}

            // No further dial came in while the handshake was held.
            listener.set_nonblocking(true).unwrap();
            listener.accept().is_err()
        })
    };

    let (mut ch, floats) = channel_for(format!("ws://{addr}"));
    ch.connect();
    tick_until(&mut ch, "interruption", |c| c.state() == ConnectionState::Interrupted);
    assert_eq!(ch.take_status().as_deref(), Some("WS Interrupted"));
    assert!(!ch.is_attempt_pending());

    ch.connect();
    assert_eq!(ch.state(), ConnectionState::Interrupted);
    assert!(ch.is_attempt_pending());
    tick_until(&mut ch, "second dial", |_| accepted.load(Ordering::SeqCst) == 2);

    // Repeated connects, as a reconnect timer would issue them, leave the slow handshake alone.
    for _ in 0..3 {
        ch.connect();
        ch.update();
        thread::sleep(Duration::from_millis(20));
    }
    assert!(ch.is_attempt_pending());
    assert_eq!(ch.state(), ConnectionState::Interrupted);
    release_tx.send(()).unwrap();

    tick_until(&mut ch, "reopen", |c| c.is_connected());
    assert_eq!(ch.take_status().as_deref(), Some("Connected"));
    tick_until(&mut ch, "params", |_| floats.borrow().get(&5).is_some());

    ch.disconnect();
    assert!(server.join().unwrap(), "a second attempt was dialed");
    assert_eq!(accepted.load(Ordering::SeqCst), 2);
}

#[test]
fn heartbeat_pings_while_connected() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let server = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut ws = tungstenite::accept(stream).unwrap();
        let mut pings = Vec::new();
        while pings.len() < 2 {
            if let Message::Ping(payload) = ws.read().unwrap() {
                pings.push(payload);
            }
        }
        let _ = ws.close(None);
        while ws.read().is_ok() {}
        pings
    });

    let (mut ch, _) = channel_with(WebSocketCfg {
        url: Some(format!("ws://{addr}")),
        ping_interval_ms: 20,
        ..WebSocketCfg::default()
    });
    ch.connect();
    tick_until(&mut ch, "open", |c| c.is_connected());
    tick_until(&mut ch, "close", |c| c.state() == ConnectionState::Disconnected);

    let pings = server.join().unwrap();
    assert_eq!(pings, vec![b"hydrawarp".to_vec(), b"hydrawarp".to_vec()]);
}

#[derive(Default)]
struct PongLog {
    payloads: Vec<String>,
}

impl TransportHandler for PongLog {
    fn on_ping(&mut self, payload: &str) {
        self.payloads.push(payload.to_string());
    }
    fn on_message(&mut self, _msg: &InboundMessage, _out: &mut dyn OutboundSink) {}
}

#[test]
fn pong_is_reported_through_on_ping() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let server = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut ws = tungstenite::accept(stream).unwrap();
        // Pings are answered inside read().
        while ws.read().is_ok() {}
    });

    let mut t = WsTransport::new(TransportConfig::default(), PongLog::default());
    t.connect(&format!("ws://{addr}"));

    let deadline = Instant::now() + Duration::from_secs(5);
    while !t.is_connected() {
        assert!(Instant::now() < deadline, "timed out waiting for open (state {:?})", t.state());
        t.poll();
        thread::sleep(Duration::from_millis(5));
    }

    assert!(t.ping());
    while t.handler().payloads.is_empty() {
        assert!(Instant::now() < deadline, "timed out waiting for pong");
        t.poll();
        thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(t.handler().payloads, vec!["hydrawarp".to_string()]);

    t.disconnect();
    server.join().unwrap();
}
