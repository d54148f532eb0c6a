//! Inbound wire protocol.
//!
//! One text frame in, exactly one [`ParsedPayload`] out. The grammar is chosen from the
//! frame's leading bytes by the ordered rule table in [`classify`]; each grammar has its
//! own decoder. Decoders are pure: nothing is applied until a frame decoded cleanly, so a
//! malformed frame never leaves half of its updates behind.

pub mod classify;
mod envelope;
mod header;
mod remote;

use crate::error::ProtocolError;
use crate::logw;

pub use classify::{classify, Grammar, Rule, RULES};

/// Include spliced into received shaders that declare no uniforms of their own.
pub const SHADERTOY_INCLUDE: &str = "#include shadertoy.inc";

/// Typed result of decoding one inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedPayload {
    ParamUpdate { index: i32, value: f32 },
    ParamUpdateVec { index: i32, components: [f32; 4] },
    /// Opaque base64 image text (`event: "canvas"`).
    StreamFrame(String),
    /// Uniform binding text (`event: "hydra"`).
    UniformDescriptor(String),
    FragmentShaderSource(String),
    ShaderAssetWrite(ShaderAsset),
    /// Live-coded GLSL to be re-broadcast unchanged.
    RawGlslRelay(String),
    RemoteInput(RemoteInputEvent),
    SlotSelect(SlotCommand),
    /// All recognized items of one envelope, in document order.
    Batch(Vec<ParsedPayload>),
    Unrecognized,
}

/// A shader pushed with a commented JSON header: `/* {"title": "..."} */<glsl>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderAsset {
    pub title: String,
    /// Text between `/*` and `*/`, verbatim.
    pub header: String,
    /// Everything after `*/`.
    pub body: String,
    /// The whole frame as received.
    pub raw_text: String,
    pub has_uniforms: bool,
}

impl ShaderAsset {
    /// Header comment, the shadertoy include when uniforms are missing, then the body.
    pub fn processed_content(&self) -> String {
        let mut out = String::with_capacity(self.raw_text.len() + SHADERTOY_INCLUDE.len());
        out.push_str("/*");
        out.push_str(&self.header);
        out.push_str("*/");
        if !self.has_uniforms {
            out.push_str(SHADERTOY_INCLUDE);
        }
        out.push_str(&self.body);
        out
    }
}

/// Remote control input that is recognized but not interpreted by the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteInputEvent {
    /// Slash-prefixed OSC-style text from a router. Carried raw.
    OscLike { raw: String },
    /// `Im*` tokens from a remote UI client.
    RemoteUi(RemoteUiToken),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteUiToken {
    Init,
    /// `ImMouseMove:<x>,<y>`; position is None when the coordinates don't parse.
    MouseMove(Option<(i32, i32)>),
    /// `ImMousePress:<a>,<b>`; `b == 1` is a right click.
    MousePress { right: bool },
    Unknown(String),
}

/// Shader or FBO source selection for one warp slot (A = 0, B = 1, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotCommand {
    Shader { warp: u32, shader: u32, slot: u32 },
    Fbo { warp: u32, fbo: u32, slot: u32 },
}

/// Decode one frame, collapsing every error to `Unrecognized`.
///
/// Errors are logged, except for frames no grammar claims, which are dropped silently.
pub fn parse_frame(text: &str) -> ParsedPayload {
    match try_parse_frame(text) {
        Ok(p) => p,
        Err(ProtocolError::UnrecognizedFrame) => ParsedPayload::Unrecognized,
        Err(e) => {
            logw!("PARSE", "{e} (frame dropped, {} bytes)", text.len());
            ParsedPayload::Unrecognized
        }
    }
}

/// Decode one frame, keeping the reason when nothing usable came out of it.
pub fn try_parse_frame(text: &str) -> Result<ParsedPayload, ProtocolError> {
    let rule = classify::rule_for(text).ok_or(ProtocolError::UnrecognizedFrame)?;
    (rule.decode)(text)
}
