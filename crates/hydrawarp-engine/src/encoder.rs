//! Outbound command encoding.
//!
//! Each command becomes one compact JSON line. Key order follows field order below and is
//! part of the wire format: peers may prefix-match on it.

use serde::Serialize;

use crate::error::EngineError;

#[derive(Debug, Clone, PartialEq)]
pub enum OutboundCommand {
    /// `{"params":[{"name":N,"value":V}, ...]}`
    ParamsPush(Vec<(i32, f32)>),
    /// `{"cmd":[{"type":1,"warp":W,"shader":S,"slot":L}]}`
    ShaderSlotSelect { warp: u32, shader: u32, slot: u32 },
    /// `{"cmd":[{"type":0,"warp":W,"fbo":F,"slot":L}]}`
    WarpFboSlotSelect { warp: u32, fbo: u32, slot: u32 },
    /// `{"event":"frag","message":"<text>"}`
    FragmentShaderPush(String),
}

#[derive(Serialize)]
struct ParamsWire {
    params: Vec<ParamWire>,
}

#[derive(Serialize)]
struct ParamWire {
    name: i32,
    value: f32,
}

#[derive(Serialize)]
struct CmdWire<T> {
    cmd: [T; 1],
}

#[derive(Serialize)]
struct ShaderSlotWire {
    #[serde(rename = "type")]
    kind: u8,
    warp: u32,
    shader: u32,
    slot: u32,
}

#[derive(Serialize)]
struct FboSlotWire {
    #[serde(rename = "type")]
    kind: u8,
    warp: u32,
    fbo: u32,
    slot: u32,
}

#[derive(Serialize)]
struct EventWire<'a> {
    event: &'a str,
    message: &'a str,
}

impl OutboundCommand {
    pub fn to_json(&self) -> Result<String, EngineError> {
        if let OutboundCommand::ParamsPush(values) = self {
            if let Some(&(name, _)) = values.iter().find(|(_, v)| !v.is_finite()) {
                return Err(EngineError::NonFiniteParam { name });
            }
        }

        let encoded = match self {
            OutboundCommand::ParamsPush(values) => serde_json::to_string(&ParamsWire {
                params: values
                    .iter()
                    .map(|&(name, value)| ParamWire { name, value })
                    .collect(),
            }),
            OutboundCommand::ShaderSlotSelect { warp, shader, slot } => serde_json::to_string(&CmdWire {
                cmd: [ShaderSlotWire {
                    kind: 1,
                    warp: *warp,
                    shader: *shader,
                    slot: *slot,
                }],
            }),
            OutboundCommand::WarpFboSlotSelect { warp, fbo, slot } => serde_json::to_string(&CmdWire {
                cmd: [FboSlotWire {
                    kind: 0,
                    warp: *warp,
                    fbo: *fbo,
                    slot: *slot,
                }],
            }),
            OutboundCommand::FragmentShaderPush(text) => serde_json::to_string(&EventWire {
                event: "frag",
                message: text,
            }),
        };
        encoded.map_err(|source| EngineError::Encode { source })
    }
}
