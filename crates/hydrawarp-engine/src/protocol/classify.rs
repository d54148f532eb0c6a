//! Grammar selection by leading bytes.
//!
//! The table is ordered and the first match wins, so `/*` must stay ahead of `/`.
//! Frames are matched as received; leading whitespace is not skipped.

use super::{envelope, header, remote, ParsedPayload};
use crate::error::ProtocolError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grammar {
    /// `{` JSON envelope
    Envelope,
    /// `/*` commented JSON header followed by GLSL
    ShaderHeader,
    /// `#version` raw GLSL from a live-coding client
    LiveCode,
    /// `/` OSC-style router token
    OscLike,
    /// `I` remote UI token
    RemoteUi,
}

pub struct Rule {
    pub grammar: Grammar,
    pub matches: fn(&str) -> bool,
    pub decode: fn(&str) -> Result<ParsedPayload, ProtocolError>,
}

pub const RULES: &[Rule] = &[
    Rule {
        grammar: Grammar::Envelope,
        matches: is_envelope,
        decode: envelope::decode_envelope,
    },
    Rule {
        grammar: Grammar::ShaderHeader,
        matches: is_shader_header,
        decode: header::decode_shader_header,
    },
    Rule {
        grammar: Grammar::LiveCode,
        matches: is_live_code,
        decode: decode_live_code,
    },
    Rule {
        grammar: Grammar::OscLike,
        matches: is_osc_like,
        decode: remote::decode_osc_like,
    },
    Rule {
        grammar: Grammar::RemoteUi,
        matches: is_remote_ui,
        decode: remote::decode_remote_ui,
    },
];

/// Which grammar claims `text`, if any.
pub fn classify(text: &str) -> Option<Grammar> {
    rule_for(text).map(|r| r.grammar)
}

pub(crate) fn rule_for(text: &str) -> Option<&'static Rule> {
    RULES.iter().find(|r| (r.matches)(text))
}

fn is_envelope(text: &str) -> bool {
    text.starts_with('{')
}

fn is_shader_header(text: &str) -> bool {
    text.starts_with("/*")
}

fn is_live_code(text: &str) -> bool {
    text.starts_with("#version")
}

fn is_osc_like(text: &str) -> bool {
    text.starts_with('/')
}

fn is_remote_ui(text: &str) -> bool {
    text.starts_with('I')
}

fn decode_live_code(text: &str) -> Result<ParsedPayload, ProtocolError> {
    Ok(ParsedPayload::RawGlslRelay(text.to_string()))
}
