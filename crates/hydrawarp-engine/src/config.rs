use std::path::PathBuf;
use std::time::Duration;

use serde_json::Value;

use crate::assets::{read_to_string_result, AssetsRoot};
use crate::error::EngineError;

/// How strictly to interpret/validate config files.
///
/// - `Lenient` is forward-compatible: unknown fields are ignored and missing optional
///   keys fall back to defaults.
/// - `Strict` is fail-fast: unknown fields and unsupported versions become errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigMode {
    Lenient,
    Strict,
}

/// Env var that replaces the configured endpoint outright.
pub const WS_URL_ENV: &str = "HYDRAWARP_WS_URL";

/// Typed view of `assets/channel(.<os>).json`.
///
/// Versioning: `version` defaults to 1 when omitted.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct ChannelConfig {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub websocket: WebSocketCfg,

    #[serde(default)]
    pub host: HostCfg,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct WebSocketCfg {
    #[serde(default = "default_protocol")]
    pub protocol: String,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,

    /// Full endpoint override. When set, protocol/host/port are ignored.
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default = "default_true")]
    pub auto_connect: bool,

    /// Host-side reconnect period after a close/failure. 0 disables reconnecting.
    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,

    /// Heartbeat ping period while connected. 0 = no heartbeat.
    #[serde(default)]
    pub ping_interval_ms: u64,

    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    /// Relay `#version` frames back to the peer.
    #[serde(default = "default_true")]
    pub relay_live_code: bool,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct HostCfg {
    #[serde(default = "default_tick_hz")]
    pub tick_hz: u32,

    /// Parameter smoothing, 0 (jump) .. 1 (frozen). Applied per tick by the host.
    #[serde(default)]
    pub smoothing: f32,
}

// Strict twins: same shape, unknown fields rejected.

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct ChannelConfigStrict {
    #[serde(default = "default_version")]
    version: u32,
    #[serde(default)]
    websocket: WebSocketCfgStrict,
    #[serde(default)]
    host: HostCfgStrict,
}

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct WebSocketCfgStrict {
    #[serde(default = "default_protocol")]
    protocol: String,
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default)]
    url: Option<String>,
    #[serde(default = "default_true")]
    auto_connect: bool,
    #[serde(default = "default_reconnect_interval_ms")]
    reconnect_interval_ms: u64,
    #[serde(default)]
    ping_interval_ms: u64,
    #[serde(default = "default_read_timeout_ms")]
    read_timeout_ms: u64,
    #[serde(default = "default_true")]
    relay_live_code: bool,
}

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct HostCfgStrict {
    #[serde(default = "default_tick_hz")]
    tick_hz: u32,
    #[serde(default)]
    smoothing: f32,
}

fn default_version() -> u32 { 1 }
fn default_protocol() -> String { "ws://".to_string() }
fn default_host() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 8088 }
fn default_true() -> bool { true }
fn default_reconnect_interval_ms() -> u64 { 2000 }
fn default_read_timeout_ms() -> u64 { 10 }
fn default_tick_hz() -> u32 { 60 }

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            websocket: WebSocketCfg::default(),
            host: HostCfg::default(),
        }
    }
}

impl Default for WebSocketCfg {
    fn default() -> Self {
        Self {
            protocol: default_protocol(),
            host: default_host(),
            port: default_port(),
            url: None,
            auto_connect: true,
            reconnect_interval_ms: default_reconnect_interval_ms(),
            ping_interval_ms: 0,
            read_timeout_ms: default_read_timeout_ms(),
            relay_live_code: true,
        }
    }
}

impl Default for HostCfg {
    fn default() -> Self {
        Self {
            tick_hz: default_tick_hz(),
            smoothing: 0.0,
        }
    }
}

impl Default for WebSocketCfgStrict {
    fn default() -> Self {
        WebSocketCfg::default().into()
    }
}

impl Default for HostCfgStrict {
    fn default() -> Self {
        Self {
            tick_hz: default_tick_hz(),
            smoothing: 0.0,
        }
    }
}

impl From<WebSocketCfg> for WebSocketCfgStrict {
    fn from(c: WebSocketCfg) -> Self {
        Self {
            protocol: c.protocol,
            host: c.host,
            port: c.port,
            url: c.url,
            auto_connect: c.auto_connect,
            reconnect_interval_ms: c.reconnect_interval_ms,
            ping_interval_ms: c.ping_interval_ms,
            read_timeout_ms: c.read_timeout_ms,
            relay_live_code: c.relay_live_code,
        }
    }
}

impl From<ChannelConfigStrict> for ChannelConfig {
    fn from(s: ChannelConfigStrict) -> Self {
        let w = s.websocket;
        Self {
            version: s.version,
            websocket: WebSocketCfg {
                protocol: w.protocol,
                host: w.host,
                port: w.port,
                url: w.url,
                auto_connect: w.auto_connect,
                reconnect_interval_ms: w.reconnect_interval_ms,
                ping_interval_ms: w.ping_interval_ms,
                read_timeout_ms: w.read_timeout_ms,
                relay_live_code: w.relay_live_code,
            },
            host: HostCfg {
                tick_hz: s.host.tick_hz,
                smoothing: s.host.smoothing,
            },
        }
    }
}

impl WebSocketCfg {
    /// Endpoint URL: `url` if set, else `<protocol><host>[:<port>]` (port 80 is left implicit).
    pub fn endpoint(&self) -> String {
        if let Some(url) = self.url.as_deref().filter(|u| !u.is_empty()) {
            return url.to_string();
        }
        if self.port == 80 {
            format!("{}{}", self.protocol, self.host)
        } else {
            format!("{}{}:{}", self.protocol, self.host, self.port)
        }
    }

    pub fn reconnect_interval(&self) -> Option<Duration> {
        (self.reconnect_interval_ms > 0).then(|| Duration::from_millis(self.reconnect_interval_ms))
    }

    pub fn ping_interval(&self) -> Option<Duration> {
        (self.ping_interval_ms > 0).then(|| Duration::from_millis(self.ping_interval_ms))
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms.max(1))
    }

    /// Apply `HYDRAWARP_WS_URL` if set and non-empty.
    pub fn apply_env_override(&mut self) -> bool {
        match std::env::var(WS_URL_ENV) {
            Ok(url) if !url.trim().is_empty() => {
                self.url = Some(url.trim().to_string());
                true
            }
            _ => false,
        }
    }
}

/// `channel.json` as loaded from disk.
#[derive(Debug, Clone)]
pub struct LoadedChannelConfig {
    pub path: PathBuf,
    pub config: ChannelConfig,
    /// Parsed JSON for validation; `None` when the file is absent and defaults were used.
    pub raw: Option<Value>,
}

/// Load `channel(.<os>).json` from the assets root. A missing file yields defaults.
pub fn load_channel_config(assets: &AssetsRoot, mode: ConfigMode) -> Result<LoadedChannelConfig, EngineError> {
    let path = assets.pick_platform_json("channel");
    if !path.exists() {
        return Ok(LoadedChannelConfig {
            path,
            config: ChannelConfig::default(),
            raw: None,
        });
    }

    let src = read_to_string_result(&path)?;
    let (config, raw) = parse_channel_config(&src, mode).map_err(|e| match e {
        ParseFailure::Json(source) => EngineError::Json {
            path: path.clone(),
            source,
        },
        ParseFailure::Invalid(msg) => EngineError::InvalidConfig {
            path: path.clone(),
            msg,
        },
    })?;

    Ok(LoadedChannelConfig {
        path,
        config,
        raw: Some(raw),
    })
}

enum ParseFailure {
    Json(serde_json::Error),
    Invalid(String),
}

fn parse_channel_config(src: &str, mode: ConfigMode) -> Result<(ChannelConfig, Value), ParseFailure> {
    let raw: Value = serde_json::from_str(src).map_err(ParseFailure::Json)?;
    if !raw.is_object() {
        return Err(ParseFailure::Invalid("channel.json must be a JSON object".to_string()));
    }

    let config: ChannelConfig = match mode {
        ConfigMode::Lenient => serde_json::from_value(raw.clone()).map_err(ParseFailure::Json)?,
        ConfigMode::Strict => serde_json::from_value::<ChannelConfigStrict>(raw.clone())
            .map_err(ParseFailure::Json)?
            .into(),
    };

    if mode == ConfigMode::Strict && config.version != 1 {
        return Err(ParseFailure::Invalid(format!(
            "unsupported channel.json version {} (expected 1)",
            config.version
        )));
    }

    Ok((config, raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::test_support::scratch_dir;

    fn parse(src: &str, mode: ConfigMode) -> Option<ChannelConfig> {
        parse_channel_config(src, mode).ok().map(|(c, _)| c)
    }

    #[test]
    fn defaults_match_the_loopback_endpoint() {
        let c = ChannelConfig::default();
        assert_eq!(c.websocket.endpoint(), "ws://127.0.0.1:8088");
        assert!(c.websocket.auto_connect);
        assert_eq!(c.websocket.reconnect_interval(), Some(Duration::from_millis(2000)));
        assert_eq!(c.websocket.ping_interval(), None);
        assert_eq!(c.websocket.read_timeout(), Duration::from_millis(10));
        assert_eq!(c.host.tick_hz, 60);
    }

    #[test]
    fn empty_object_is_all_defaults() {
        assert_eq!(parse("{}", ConfigMode::Strict), Some(ChannelConfig::default()));
        assert_eq!(parse("{}", ConfigMode::Lenient), Some(ChannelConfig::default()));
    }

    #[test]
    fn port_80_is_implicit_and_url_wins() {
        let mut ws = WebSocketCfg {
            host: "stage.local".into(),
            port: 80,
            ..WebSocketCfg::default()
        };
        assert_eq!(ws.endpoint(), "ws://stage.local");

        ws.url = Some("ws://10.0.0.2:9000/live".into());
        assert_eq!(ws.endpoint(), "ws://10.0.0.2:9000/live");

        ws.url = Some(String::new());
        assert_eq!(ws.endpoint(), "ws://stage.local");
    }

    #[test]
    fn strict_rejects_unknown_fields_lenient_ignores_them() {
        let src = r#"{ "websocket": { "port": 9001, "colour": "red" } }"#;
        assert!(parse(src, ConfigMode::Strict).is_none());
        let c = parse(src, ConfigMode::Lenient).unwrap();
        assert_eq!(c.websocket.port, 9001);
        assert_eq!(c.websocket.host, "127.0.0.1");
    }

    #[test]
    fn strict_rejects_other_versions() {
        assert!(parse(r#"{ "version": 2 }"#, ConfigMode::Strict).is_none());
        assert_eq!(parse(r#"{ "version": 2 }"#, ConfigMode::Lenient).map(|c| c.version), Some(2));
    }

    #[test]
    fn non_object_is_invalid() {
        assert!(matches!(
            parse_channel_config("[1,2]", ConfigMode::Lenient),
            Err(ParseFailure::Invalid(_))
        ));
    }

    #[test]
    fn missing_file_loads_defaults() {
        let root = AssetsRoot::create(scratch_dir("config-missing")).unwrap();
        let loaded = load_channel_config(&root, ConfigMode::Strict).unwrap();
        assert!(loaded.raw.is_none());
        assert_eq!(loaded.config, ChannelConfig::default());
        assert!(loaded.path.ends_with("channel.json"));
    }

    #[test]
    fn file_on_disk_is_loaded() {
        let root = AssetsRoot::create(scratch_dir("config-file")).unwrap();
        std::fs::write(
            root.join("channel.json"),
            r#"{ "version": 1, "websocket": { "host": "192.168.1.20", "ping_interval_ms": 500 }, "host": { "tick_hz": 30 } }"#,
        )
        .unwrap();

        let loaded = load_channel_config(&root, ConfigMode::Lenient).unwrap();
        assert!(loaded.raw.is_some());
        assert_eq!(loaded.config.websocket.endpoint(), "ws://192.168.1.20:8088");
        assert_eq!(loaded.config.websocket.ping_interval(), Some(Duration::from_millis(500)));
        assert_eq!(loaded.config.host.tick_hz, 30);
    }

    #[test]
    fn broken_json_is_reported_with_its_path() {
        let root = AssetsRoot::create(scratch_dir("config-broken")).unwrap();
        std::fs::write(root.join("channel.json"), "{ nope").unwrap();
        match load_channel_config(&root, ConfigMode::Lenient) {
            Err(EngineError::Json { path, .. }) => assert!(path.ends_with("channel.json")),
            other => panic!("unexpected {other:?}"),
        }
    }
}
