//! WebSocket transport.
//!
//! The socket lives on a named worker thread (`ws`) that does the blocking handshake and
//! interleaves reads (bounded by a short read timeout) with outbound commands. The host
//! thread never touches the socket: it talks to the worker over two crossbeam channels and
//! drains events from `poll()`, once per tick.
//!
//! Sends are fire-and-forget. Nothing is queued while disconnected and nothing is retried;
//! reconnecting is the host's call.

use std::collections::VecDeque;
use std::io::ErrorKind;
use std::net::TcpStream;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};
use tungstenite::client::IntoClientRequest;
use tungstenite::handshake::client::Request;
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Message, WebSocket};

use crate::events::{
    ConnectionState, InboundMessage, OutboundSink, TransportEvent, TransportHandler,
};
use crate::logw;

/// Payload of heartbeat pings; peers echo it back in the pong.
const PING_PAYLOAD: &[u8] = b"hydrawarp";

/// How long a graceful close waits for the peer's close frame.
const CLOSE_GRACE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Upper bound on how long the worker blocks in a read before servicing sends.
    pub read_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_millis(10),
        }
    }
}

enum WorkerCmd {
    Send(String),
    Ping(Vec<u8>),
    Close,
}

struct Worker {
    cmd_tx: Sender<WorkerCmd>,
    evt_rx: Receiver<TransportEvent>,
    join: Option<JoinHandle<()>>,
}

impl Worker {
    fn spawn(request: Request, cfg: TransportConfig) -> std::io::Result<Self> {
        let (cmd_tx, cmd_rx) = unbounded::<WorkerCmd>();
        let (evt_tx, evt_rx) = unbounded::<TransportEvent>();

        let join = std::thread::Builder::new()
            .name("ws".to_string())
            .spawn(move || run_worker(request, cfg, cmd_rx, evt_tx))?;

        Ok(Self {
            cmd_tx,
            evt_rx,
            join: Some(join),
        })
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(WorkerCmd::Close);
        if let Some(j) = self.join.take() {
            // A worker still inside the handshake exits on its own once it sees the Close;
            // the host is not held up waiting for it.
            if j.is_finished() {
                let _ = j.join();
            }
        }
    }
}

struct WorkerLink<'a> {
    cmd_tx: Option<&'a Sender<WorkerCmd>>,
}

impl OutboundSink for WorkerLink<'_> {
    fn send_text(&mut self, text: &str) -> bool {
        match self.cmd_tx {
            Some(tx) => tx.send(WorkerCmd::Send(text.to_string())).is_ok(),
            None => false,
        }
    }
}

/// Single-endpoint WebSocket client driven by `poll()`.
pub struct WsTransport<H: TransportHandler> {
    endpoint: String,
    cfg: TransportConfig,
    state: ConnectionState,
    worker: Option<Worker>,
    /// Events raised on the host thread itself (bad endpoint, spawn failure).
    local: VecDeque<TransportEvent>,
    next_seq: u64,
    handler: H,
}

impl<H: TransportHandler> WsTransport<H> {
    pub fn new(cfg: TransportConfig, handler: H) -> Self {
        Self {
            endpoint: String::new(),
            cfg,
            state: ConnectionState::Disconnected,
            worker: None,
            local: VecDeque::new(),
            next_seq: 0,
            handler,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// A worker is still establishing a connection: the state is Connecting, or Interrupted
    /// with a reconnect in flight.
    pub fn is_attempt_pending(&self) -> bool {
        self.worker.is_some() && self.state != ConnectionState::Connected
    }

    /// Endpoint of the current or most recent attempt.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    /// Start connecting to `endpoint`. No-op while connected or while an attempt is pending.
    ///
    /// The outcome arrives through `poll()` as `on_open` or `on_fail`.
    pub fn connect(&mut self, endpoint: &str) {
        if self.is_connected() || self.is_attempt_pending() {
            return;
        }

        // Whatever is left of a previous connection goes away with its undelivered events.
        self.worker = None;
        self.endpoint = endpoint.to_string();

        let request = match endpoint.into_client_request() {
            Ok(r) => r,
            Err(e) => {
                self.state = ConnectionState::Failed;
                self.local
                    .push_back(TransportEvent::Fail(format!("invalid endpoint '{endpoint}': {e}")));
                return;
            }
        };

        self.state = self.state.on_connect();
        match Worker::spawn(request, self.cfg.clone()) {
            Ok(w) => self.worker = Some(w),
            Err(e) => self
                .local
                .push_back(TransportEvent::Fail(format!("failed to start ws thread: {e}"))),
        }
    }

    /// Close the connection gracefully (best effort) and report `on_close` right away.
    pub fn disconnect(&mut self) {
        if self.worker.take().is_some() || self.state == ConnectionState::Interrupted {
            self.state = ConnectionState::Disconnected;
            self.handler.on_close();
        }
    }

    /// Send one text frame. Returns whether it was handed to the socket thread; this is not
    /// a delivery confirmation. Dropped silently unless connected.
    pub fn send(&mut self, text: &str) -> bool {
        if !self.is_connected() {
            return false;
        }
        self.link().send_text(text)
    }

    /// Protocol-level ping. No-op unless connected.
    pub fn ping(&mut self) -> bool {
        match (&self.worker, self.state) {
            (Some(w), ConnectionState::Connected) => w.cmd_tx.send(WorkerCmd::Ping(PING_PAYLOAD.to_vec())).is_ok(),
            _ => false,
        }
    }

    /// Drain everything buffered since the last call and dispatch it to the handler.
    ///
    /// Never blocks. Returns the number of events dispatched.
    pub fn poll(&mut self) -> usize {
        let mut events: Vec<TransportEvent> = self.local.drain(..).collect();

        let mut worker_gone = false;
        if let Some(w) = &self.worker {
            loop {
                match w.evt_rx.try_recv() {
                    Ok(ev) => events.push(ev),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        worker_gone = true;
                        break;
                    }
                }
            }
        }

        let n = events.len();
        for ev in events {
            self.dispatch(ev);
        }

        // A terminal event already released the worker. If it is still here, it ended
        // without reporting how, so it died.
        if worker_gone && self.worker.take().is_some() {
            self.dispatch(TransportEvent::Close);
            return n + 1;
        }
        n
    }

    fn link(&self) -> WorkerLink<'_> {
        WorkerLink {
            cmd_tx: match self.state {
                ConnectionState::Connected => self.worker.as_ref().map(|w| &w.cmd_tx),
                _ => None,
            },
        }
    }

    fn dispatch(&mut self, ev: TransportEvent) {
        self.state = self.state.on_event(&ev);
        if matches!(ev, TransportEvent::Close | TransportEvent::Fail(_) | TransportEvent::Interrupt) {
            // Last event a worker sends.
            self.worker = None;
        }
        match ev {
            TransportEvent::Open => self.handler.on_open(),
            TransportEvent::Close => self.handler.on_close(),
            TransportEvent::Fail(reason) => self.handler.on_fail(&reason),
            TransportEvent::Interrupt => self.handler.on_interrupt(),
            TransportEvent::Ping(payload) => self.handler.on_ping(&payload),
            TransportEvent::Message(text) => {
                let msg = InboundMessage {
                    seq: self.next_seq,
                    text,
                };
                self.next_seq += 1;
                let mut link = WorkerLink {
                    cmd_tx: match self.state {
                        ConnectionState::Connected => self.worker.as_ref().map(|w| &w.cmd_tx),
                        _ => None,
                    },
                };
                self.handler.on_message(&msg, &mut link);
            }
        }
    }
}

type Socket = WebSocket<MaybeTlsStream<TcpStream>>;

fn run_worker(
    request: Request,
    cfg: TransportConfig,
    cmd_rx: Receiver<WorkerCmd>,
    evt_tx: Sender<TransportEvent>,
) {
    let (mut socket, _response) = match tungstenite::connect(request) {
        Ok(ok) => ok,
        Err(e) => {
            let _ = evt_tx.send(TransportEvent::Fail(e.to_string()));
            return;
        }
    };

    if let Err(e) = set_read_timeout(&mut socket, cfg.read_timeout) {
        let _ = socket.close(None);
        let _ = evt_tx.send(TransportEvent::Fail(format!("socket setup failed: {e}")));
        return;
    }

    if evt_tx.send(TransportEvent::Open).is_err() {
        // Transport dropped while we were connecting.
        close_gracefully(&mut socket);
        return;
    }

    loop {
        loop {
            let sent = match cmd_rx.try_recv() {
                Ok(WorkerCmd::Send(text)) => socket.send(Message::Text(text)),
                Ok(WorkerCmd::Ping(payload)) => socket.send(Message::Ping(payload)),
                Ok(WorkerCmd::Close) | Err(TryRecvError::Disconnected) => {
                    close_gracefully(&mut socket);
                    let _ = evt_tx.send(TransportEvent::Close);
                    return;
                }
                Err(TryRecvError::Empty) => break,
            };
            if let Err(e) = sent {
                let _ = evt_tx.send(terminal_event(e));
                return;
            }
        }

        let event = match socket.read() {
            Ok(Message::Text(text)) => Some(TransportEvent::Message(text)),
            Ok(Message::Pong(payload)) => Some(TransportEvent::Ping(String::from_utf8_lossy(&payload).into_owned())),
            Ok(Message::Binary(data)) => {
                logw!("WS", "ignoring binary frame ({} bytes)", data.len());
                None
            }
            // Pings are answered by tungstenite; a peer Close is answered and then
            // surfaces as ConnectionClosed on a later read.
            Ok(Message::Ping(_)) | Ok(Message::Close(_)) | Ok(Message::Frame(_)) => None,
            Err(e) if is_timeout(&e) => None,
            Err(e) => {
                let _ = evt_tx.send(terminal_event(e));
                return;
            }
        };

        if let Some(ev) = event {
            if evt_tx.send(ev).is_err() {
                close_gracefully(&mut socket);
                return;
            }
        }
    }
}

fn set_read_timeout(socket: &mut Socket, timeout: Duration) -> std::io::Result<()> {
    let timeout = timeout.max(Duration::from_millis(1));
    match socket.get_mut() {
        MaybeTlsStream::Plain(s) => s.set_read_timeout(Some(timeout)),
        _ => Ok(()),
    }
}

fn is_timeout(e: &tungstenite::Error) -> bool {
    matches!(e, tungstenite::Error::Io(io) if matches!(io.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut))
}

fn terminal_event(e: tungstenite::Error) -> TransportEvent {
    use tungstenite::error::ProtocolError as WsProtocolError;
    match e {
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => TransportEvent::Close,
        tungstenite::Error::Io(io) => {
            logw!("WS", "socket error: {io}");
            TransportEvent::Interrupt
        }
        tungstenite::Error::Protocol(WsProtocolError::ResetWithoutClosingHandshake) => {
            logw!("WS", "peer went away without a close handshake");
            TransportEvent::Interrupt
        }
        other => TransportEvent::Fail(other.to_string()),
    }
}

/// Send our close frame and wait briefly for the peer's.
fn close_gracefully(socket: &mut Socket) {
    if socket.close(None).is_err() {
        return;
    }
    let deadline = Instant::now() + CLOSE_GRACE;
    while Instant::now() < deadline {
        match socket.read() {
            Ok(_) => {}
            Err(e) if is_timeout(&e) => {}
            Err(_) => break,
        }
    }
}
