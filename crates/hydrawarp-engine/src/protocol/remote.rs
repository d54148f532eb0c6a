//! Remote input tokens: OSC-style router text and `Im*` remote UI tokens.
//!
//! Neither is acted on by the channel; they are decoded far enough to be logged.

use super::{ParsedPayload, RemoteInputEvent, RemoteUiToken};
use crate::error::ProtocolError;

pub(super) fn decode_osc_like(text: &str) -> Result<ParsedPayload, ProtocolError> {
    Ok(ParsedPayload::RemoteInput(RemoteInputEvent::OscLike {
        raw: text.to_string(),
    }))
}

pub(super) fn decode_remote_ui(text: &str) -> Result<ParsedPayload, ProtocolError> {
    let token = if text.starts_with("ImInit") {
        RemoteUiToken::Init
    } else if let Some(rest) = text.strip_prefix("ImMouseMove") {
        RemoteUiToken::MouseMove(parse_xy(skip_separator(rest)))
    } else if let Some(rest) = text.strip_prefix("ImMousePress") {
        // "<pressed>,<right>"
        let right = skip_separator(rest)
            .rsplit(',')
            .next()
            .and_then(|s| s.trim().parse::<i32>().ok())
            == Some(1);
        RemoteUiToken::MousePress { right }
    } else {
        RemoteUiToken::Unknown(text.to_string())
    };
    Ok(ParsedPayload::RemoteInput(RemoteInputEvent::RemoteUi(token)))
}

fn skip_separator(rest: &str) -> &str {
    let mut chars = rest.chars();
    match chars.next() {
        Some(c) if !c.is_ascii_digit() && c != '-' => chars.as_str(),
        _ => rest,
    }
}

fn parse_xy(s: &str) -> Option<(i32, i32)> {
    let (x, y) = s.split_once(',')?;
    Some((x.trim().parse().ok()?, y.trim().parse().ok()?))
}
