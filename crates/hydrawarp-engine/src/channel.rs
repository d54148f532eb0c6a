//! The control channel: transport + parser + control state + encoder behind one facade.
//!
//! The host owns one `ControlChannel`, calls `update()` once per tick and then drains the
//! received values it cares about. Parameter updates never wait for the host: they go
//! straight to the registered [`ParamSink`] while the frame is being handled.

use std::time::{Duration, Instant};

use crate::assets::{ensure_shader_dirs, AssetProvisioner};
use crate::config::WebSocketCfg;
use crate::control::ControlState;
use crate::encoder::OutboundCommand;
use crate::events::{ConnectionState, InboundMessage, OutboundSink, TransportHandler};
use crate::protocol::{parse_frame, ParsedPayload, RemoteInputEvent, ShaderAsset, SlotCommand};
use crate::transport::{TransportConfig, WsTransport};
use crate::{loge, logi, logw};

/// Receiver of parameter updates decoded from the wire.
pub trait ParamSink {
    /// Store a float parameter. Returns whether the stored value changed.
    fn set_float(&mut self, index: i32, value: f32) -> bool;
    fn float_value(&self, index: i32) -> Option<f32>;
    fn set_vec4(&mut self, index: i32, components: [f32; 4]);
    fn select_slot(&mut self, cmd: SlotCommand);
}

/// How `change_float_value` derives the new value from the current one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FloatChange {
    Set(f32),
    /// +0.1, capped at 1.0
    Increase,
    /// -0.1, floored at 0.0
    Decrease,
    /// Anything above zero goes to 0, otherwise to 1.
    Toggle,
}

const STEP: f32 = 0.1;

impl FloatChange {
    pub fn apply(self, current: f32) -> f32 {
        match self {
            FloatChange::Set(v) => v,
            FloatChange::Increase => (current + STEP).min(1.0),
            FloatChange::Decrease => (current - STEP).max(0.0),
            FloatChange::Toggle => {
                if current > 0.0 {
                    0.0
                } else {
                    1.0
                }
            }
        }
    }
}

/// Transport callbacks for the channel. Owns the control state and the collaborators.
pub struct ChannelHandler {
    control: ControlState,
    params: Box<dyn ParamSink>,
    assets: Box<dyn AssetProvisioner>,
    relay_live_code: bool,
}

impl ChannelHandler {
    pub fn new(params: Box<dyn ParamSink>, assets: Box<dyn AssetProvisioner>) -> Self {
        Self {
            control: ControlState::new(),
            params,
            assets,
            relay_live_code: true,
        }
    }

    pub fn set_relay_live_code(&mut self, on: bool) {
        self.relay_live_code = on;
    }

    pub fn control(&self) -> &ControlState {
        &self.control
    }

    pub fn control_mut(&mut self) -> &mut ControlState {
        &mut self.control
    }

    pub fn params(&self) -> &dyn ParamSink {
        self.params.as_ref()
    }

    pub fn params_mut(&mut self) -> &mut dyn ParamSink {
        self.params.as_mut()
    }

    fn apply(&mut self, payload: ParsedPayload, out: &mut dyn OutboundSink) {
        match payload {
            ParsedPayload::ParamUpdate { index, value } => {
                self.params.set_float(index, value);
            }
            ParsedPayload::ParamUpdateVec { index, components } => {
                self.params.set_vec4(index, components);
            }
            ParsedPayload::SlotSelect(cmd) => self.params.select_slot(cmd),
            ParsedPayload::StreamFrame(b64) => self.control.record_stream_frame(b64),
            ParsedPayload::UniformDescriptor(text) => self.control.record_uniforms(text),
            ParsedPayload::FragmentShaderSource(text) => self.control.record_fragment_shader(text),
            ParsedPayload::ShaderAssetWrite(asset) => self.accept_shader_asset(asset),
            ParsedPayload::RawGlslRelay(text) => {
                if self.relay_live_code && !out.send_text(&text) {
                    logw!("WS", "live code not relayed ({} bytes): not connected", text.len());
                }
            }
            ParsedPayload::RemoteInput(RemoteInputEvent::OscLike { raw }) => {
                logi!("WS", "osc-style input: {raw}");
            }
            ParsedPayload::RemoteInput(RemoteInputEvent::RemoteUi(token)) => {
                logi!("WS", "remote ui input: {token:?}");
            }
            ParsedPayload::Batch(items) => {
                for item in items {
                    self.apply(item, out);
                }
            }
            ParsedPayload::Unrecognized => {}
        }
    }

    fn accept_shader_asset(&mut self, asset: ShaderAsset) {
        if let Err(e) = ensure_shader_dirs(self.assets.as_mut()) {
            loge!("ASSETS", "shader '{}' dropped: {e}", asset.title);
            return;
        }
        logi!(
            "ASSETS",
            "received shader '{}' ({} bytes, uniforms: {})",
            asset.title,
            asset.raw_text.len(),
            asset.has_uniforms
        );
        self.control.record_shader_asset(asset);
    }
}

/// Lifecycle callbacks only record the status line; the host decides what to show.
impl TransportHandler for ChannelHandler {
    fn on_open(&mut self) {
        self.control.record_status("Connected".to_string());
    }

    fn on_close(&mut self) {
        self.control.record_status("Disconnected".to_string());
    }

    fn on_fail(&mut self, reason: &str) {
        self.control.record_status(format!("WS Error: {reason}"));
    }

    fn on_interrupt(&mut self) {
        self.control.record_status("WS Interrupted".to_string());
    }

    fn on_ping(&mut self, payload: &str) {
        logi!("WS", "pong: {payload}");
    }

    fn on_message(&mut self, msg: &InboundMessage, out: &mut dyn OutboundSink) {
        let payload = parse_frame(&msg.text);
        self.apply(payload, out);
    }
}

/// Message-driven shader/parameter control channel.
pub struct ControlChannel {
    transport: WsTransport<ChannelHandler>,
    endpoint: String,
    ping_interval: Option<Duration>,
    last_ping: Instant,
}

impl ControlChannel {
    pub fn new(cfg: &WebSocketCfg, params: Box<dyn ParamSink>, assets: Box<dyn AssetProvisioner>) -> Self {
        let mut handler = ChannelHandler::new(params, assets);
        handler.set_relay_live_code(cfg.relay_live_code);

        let transport = WsTransport::new(
            TransportConfig {
                read_timeout: cfg.read_timeout(),
            },
            handler,
        );

        Self {
            transport,
            endpoint: cfg.endpoint(),
            ping_interval: cfg.ping_interval(),
            last_ping: Instant::now(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn state(&self) -> ConnectionState {
        self.transport.state()
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// See [`WsTransport::is_attempt_pending`].
    pub fn is_attempt_pending(&self) -> bool {
        self.transport.is_attempt_pending()
    }

    /// Connect to the configured endpoint. No-op while connected or while an attempt is
    /// pending, including a reconnect after an interruption.
    pub fn connect(&mut self) {
        if self.is_connected() || self.is_attempt_pending() {
            return;
        }
        logi!("WS", "connecting to {}", self.endpoint);
        self.transport.connect(&self.endpoint);
    }

    /// Switch endpoints and connect. An open connection to another endpoint is closed first.
    pub fn connect_to(&mut self, endpoint: &str) {
        if endpoint != self.endpoint {
            self.transport.disconnect();
            self.endpoint = endpoint.to_string();
        }
        self.connect();
    }

    pub fn disconnect(&mut self) {
        self.transport.disconnect();
    }

    /// Once per tick: dispatch everything received since the last call, then heartbeat.
    ///
    /// Returns the number of transport events handled.
    pub fn update(&mut self) -> usize {
        let n = self.transport.poll();

        if let Some(every) = self.ping_interval {
            if self.transport.is_connected() && self.last_ping.elapsed() >= every {
                self.transport.ping();
                self.last_ping = Instant::now();
            }
        }
        n
    }

    pub fn ping(&mut self) -> bool {
        self.transport.ping()
    }

    /// Send raw text. Dropped silently unless connected.
    pub fn send_json(&mut self, json: &str) -> bool {
        self.transport.send(json)
    }

    pub fn send_command(&mut self, cmd: &OutboundCommand) -> bool {
        match cmd.to_json() {
            Ok(json) => self.send_json(&json),
            Err(e) => {
                loge!("WS", "{e}");
                false
            }
        }
    }

    /// Push parameter values to the peer.
    pub fn update_params(&mut self, values: &[(i32, f32)]) -> bool {
        if values.is_empty() {
            return false;
        }
        self.send_command(&OutboundCommand::ParamsPush(values.to_vec()))
    }

    /// Change one float parameter locally and tell the peer when it changed (or always with
    /// `force_send`). Returns the new value.
    pub fn change_float_value(&mut self, index: i32, change: FloatChange, force_send: bool) -> f32 {
        let params = self.transport.handler_mut().params_mut();
        let current = params.float_value(index).unwrap_or(0.0);
        let next = change.apply(current);
        if !next.is_finite() {
            logw!("PARAMS", "ignoring non-finite value for param {index}");
            return current;
        }
        let changed = params.set_float(index, next);

        if changed || force_send {
            self.update_params(&[(index, next)]);
        }
        next
    }

    pub fn change_shader_index(&mut self, warp: u32, shader: u32, slot: u32) -> bool {
        self.send_command(&OutboundCommand::ShaderSlotSelect { warp, shader, slot })
    }

    pub fn change_warp_fbo_index(&mut self, warp: u32, fbo: u32, slot: u32) -> bool {
        self.send_command(&OutboundCommand::WarpFboSlotSelect { warp, fbo, slot })
    }

    pub fn change_fragment_shader(&mut self, text: &str) -> bool {
        self.send_command(&OutboundCommand::FragmentShaderPush(text.to_string()))
    }

    pub fn control(&self) -> &ControlState {
        self.transport.handler().control()
    }

    pub fn control_mut(&mut self) -> &mut ControlState {
        self.transport.handler_mut().control_mut()
    }

    pub fn params(&self) -> &dyn ParamSink {
        self.transport.handler().params()
    }

    pub fn has_received_shader(&self) -> bool {
        self.control().has_fragment_shader()
    }

    pub fn consume_fragment_shader(&mut self) -> String {
        self.control_mut().consume_fragment_shader()
    }

    pub fn take_fragment_shader(&mut self) -> Option<String> {
        self.control_mut().take_fragment_shader()
    }

    pub fn has_received_uniforms(&self) -> bool {
        self.control().has_uniforms()
    }

    pub fn consume_uniforms(&mut self) -> String {
        self.control_mut().consume_uniforms()
    }

    pub fn take_uniforms(&mut self) -> Option<String> {
        self.control_mut().take_uniforms()
    }

    pub fn has_received_stream(&self) -> bool {
        self.control().has_stream_frame()
    }

    pub fn consume_stream_frame(&mut self) -> String {
        self.control_mut().consume_stream_frame()
    }

    pub fn take_stream_frame(&mut self) -> Option<String> {
        self.control_mut().take_stream_frame()
    }

    pub fn has_received_shader_asset(&self) -> bool {
        self.control().has_shader_asset()
    }

    pub fn take_shader_asset(&mut self) -> Option<ShaderAsset> {
        self.control_mut().take_shader_asset()
    }

    /// Latest status line, fresh or not.
    pub fn status(&self) -> &str {
        self.control().status()
    }

    pub fn take_status(&mut self) -> Option<String> {
        self.control_mut().take_status()
    }
}
