//! hydrawarp engine: the WebSocket shader/parameter control channel.
//!
//! The render-loop host owns a [`ControlChannel`], calls `update()` once per tick and reads
//! the received shader/uniform/stream values out of its mailboxes. Everything here is
//! renderer-agnostic.

pub mod logging;
pub mod assets;
pub mod channel;
pub mod config;
pub mod control;
pub mod encoder;
pub mod error;
pub mod events;
pub mod protocol;
pub mod transport;

pub use assets::{AssetProvisioner, AssetsRoot};
pub use channel::{ChannelHandler, ControlChannel, FloatChange, ParamSink};
pub use config::{load_channel_config, ChannelConfig, ConfigMode, LoadedChannelConfig, WebSocketCfg};
pub use control::ControlState;
pub use encoder::OutboundCommand;
pub use error::{EngineError, ProtocolError};
pub use events::{ConnectionState, InboundMessage, OutboundSink, TransportEvent, TransportHandler};
pub use protocol::{parse_frame, ParsedPayload, ShaderAsset, SlotCommand};
pub use transport::{TransportConfig, WsTransport};
