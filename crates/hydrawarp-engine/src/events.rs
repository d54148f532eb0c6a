//! Transport events, connection state, and the handler interface the transport drives.

/// Lifecycle and data events produced by the transport worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Open,
    Close,
    Fail(String),
    /// The established socket broke (reset, broken pipe) without a close handshake.
    Interrupt,
    /// Pong received; payload as text.
    Ping(String),
    Message(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Interrupted,
    /// The endpoint itself is unusable; a new attempt needs a different endpoint or a retry.
    Failed,
}

impl ConnectionState {
    /// State after the host asks for a connection.
    pub fn on_connect(self) -> Self {
        match self {
            ConnectionState::Disconnected | ConnectionState::Failed => ConnectionState::Connecting,
            // Already up, already trying, or reconnecting after an interruption.
            other => other,
        }
    }

    /// State after a transport event.
    pub fn on_event(self, ev: &TransportEvent) -> Self {
        match ev {
            TransportEvent::Open => ConnectionState::Connected,
            TransportEvent::Close => ConnectionState::Disconnected,
            TransportEvent::Fail(_) => match self {
                ConnectionState::Failed => ConnectionState::Failed,
                _ => ConnectionState::Disconnected,
            },
            TransportEvent::Interrupt => match self {
                ConnectionState::Connected => ConnectionState::Interrupted,
                other => other,
            },
            TransportEvent::Ping(_) | TransportEvent::Message(_) => self,
        }
    }
}

/// One inbound text frame with its receipt order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub seq: u64,
    pub text: String,
}

/// Where a handler sends frames it wants to re-emit from inside `on_message`.
pub trait OutboundSink {
    /// Returns false when the frame was dropped (not connected).
    fn send_text(&mut self, text: &str) -> bool;
}

/// Callbacks invoked synchronously from `WsTransport::poll`, in arrival order.
pub trait TransportHandler {
    fn on_open(&mut self) {}
    fn on_close(&mut self) {}
    fn on_fail(&mut self, _reason: &str) {}
    fn on_interrupt(&mut self) {}
    fn on_ping(&mut self, _payload: &str) {}
    fn on_message(&mut self, msg: &InboundMessage, out: &mut dyn OutboundSink);
}

#[cfg(test)]
impl OutboundSink for Vec<String> {
    fn send_text(&mut self, text: &str) -> bool {
        self.push(text.to_string());
        true
    }
}
