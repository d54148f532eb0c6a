//! JSON envelope decoding.
//!
//! Recognized top-level keys are independent and decoded in a fixed order:
//! `params`, `k2`, `cmd`, then `event` + `message`.
//!
//! Numbers may arrive as JSON numbers or as numeric strings; web controllers send both.

use serde_json::Value;

use super::{ParsedPayload, SlotCommand};
use crate::error::ProtocolError;
use crate::{logi, logw};

/// `event: "params"` carries another envelope as text; this bounds how deep that goes.
const MAX_NESTING: usize = 4;

pub(super) fn decode_envelope(text: &str) -> Result<ParsedPayload, ProtocolError> {
    let root: Value = serde_json::from_str(text).map_err(|e| ProtocolError::envelope(e.to_string()))?;
    let mut items = Vec::new();
    decode_value(&root, 0, &mut items)?;
    if items.is_empty() {
        Ok(ParsedPayload::Unrecognized)
    } else {
        Ok(ParsedPayload::Batch(items))
    }
}

fn decode_value(root: &Value, depth: usize, items: &mut Vec<ParsedPayload>) -> Result<(), ProtocolError> {
    let obj = root
        .as_object()
        .ok_or_else(|| ProtocolError::envelope("top level is not an object"))?;

    if let Some(v) = obj.get("params") {
        for (i, el) in array(v, "params")?.iter().enumerate() {
            let index = field_i32(el, "name")
                .ok_or_else(|| ProtocolError::envelope(format!("params[{i}].name missing or not an integer")))?;
            let value = field_f32(el, "value")
                .ok_or_else(|| ProtocolError::envelope(format!("params[{i}].value missing or not a number")))?;
            items.push(ParsedPayload::ParamUpdate { index, value });
        }
    }

    if let Some(v) = obj.get("k2") {
        for (i, el) in array(v, "k2")?.iter().enumerate() {
            match decode_k2_element(el) {
                Ok(p) => items.push(p),
                Err(e) => logw!("PARSE", "k2[{i}] skipped: {e}"),
            }
        }
    }

    if let Some(v) = obj.get("cmd") {
        for (i, el) in array(v, "cmd")?.iter().enumerate() {
            if let Some(cmd) = decode_cmd_element(el, i)? {
                items.push(ParsedPayload::SlotSelect(cmd));
            }
        }
    }

    if let Some(ev) = obj.get("event") {
        let event = ev
            .as_str()
            .ok_or_else(|| ProtocolError::envelope("event is not a string"))?;
        if let Some(message) = obj.get("message") {
            decode_event(event, message, depth, items)?;
        }
    }

    Ok(())
}

fn decode_event(
    event: &str,
    message: &Value,
    depth: usize,
    items: &mut Vec<ParsedPayload>,
) -> Result<(), ProtocolError> {
    match event {
        "canvas" => items.push(ParsedPayload::StreamFrame(message_text(message)?.to_string())),
        "hydra" => items.push(ParsedPayload::UniformDescriptor(message_text(message)?.to_string())),
        "frag" => items.push(ParsedPayload::FragmentShaderSource(message_text(message)?.to_string())),
        "params" => {
            if depth + 1 > MAX_NESTING {
                return Err(ProtocolError::envelope("params envelopes nested too deeply"));
            }
            // Usually a string holding JSON; accept an inline object too.
            match message {
                Value::String(s) => {
                    let nested: Value = serde_json::from_str(s)
                        .map_err(|e| ProtocolError::envelope(format!("nested params: {e}")))?;
                    decode_value(&nested, depth + 1, items)?;
                }
                other => decode_value(other, depth + 1, items)?,
            }
        }
        other => {
            let e = ProtocolError::UnknownEventValue {
                event: other.to_string(),
            };
            logi!("PARSE", "{e}");
        }
    }
    Ok(())
}

fn decode_k2_element(el: &Value) -> Result<ParsedPayload, ProtocolError> {
    let index = field_i32(el, "name").ok_or_else(|| ProtocolError::envelope("k2 name missing or not an integer"))?;
    let text = el
        .get("value")
        .and_then(Value::as_str)
        .ok_or_else(|| ProtocolError::envelope("k2 value missing or not a string"))?;
    let components = parse_vec4(text).ok_or_else(|| ProtocolError::MalformedVectorLiteral {
        index,
        text: text.to_string(),
    })?;
    Ok(ParsedPayload::ParamUpdateVec { index, components })
}

/// `Ok(None)` for well-formed elements of a command type this side doesn't act on.
fn decode_cmd_element(el: &Value, i: usize) -> Result<Option<SlotCommand>, ProtocolError> {
    let missing = |field: &str| ProtocolError::envelope(format!("cmd[{i}].{field} missing or not an unsigned integer"));

    let kind = field_i32(el, "type").ok_or_else(|| missing("type"))?;
    let warp = field_u32(el, "warp").ok_or_else(|| missing("warp"))?;
    let slot = field_u32(el, "slot").ok_or_else(|| missing("slot"))?;
    match kind {
        1 => {
            let shader = field_u32(el, "shader").ok_or_else(|| missing("shader"))?;
            Ok(Some(SlotCommand::Shader { warp, shader, slot }))
        }
        0 => {
            let fbo = field_u32(el, "fbo").ok_or_else(|| missing("fbo"))?;
            Ok(Some(SlotCommand::Fbo { warp, fbo, slot }))
        }
        other => {
            logi!("PARSE", "cmd[{i}] type {other} ignored");
            Ok(None)
        }
    }
}

/// Exactly four comma-separated finite floats.
pub(super) fn parse_vec4(text: &str) -> Option<[f32; 4]> {
    let mut out = [0.0f32; 4];
    let mut parts = text.split(',');
    for slot in out.iter_mut() {
        let v: f32 = parts.next()?.trim().parse().ok()?;
        if !v.is_finite() {
            return None;
        }
        *slot = v;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(out)
}

fn array<'a>(v: &'a Value, key: &str) -> Result<&'a Vec<Value>, ProtocolError> {
    v.as_array()
        .ok_or_else(|| ProtocolError::envelope(format!("{key} is not an array")))
}

fn message_text(v: &Value) -> Result<&str, ProtocolError> {
    v.as_str()
        .ok_or_else(|| ProtocolError::envelope("message is not a string"))
}

fn field_i64(el: &Value, key: &str) -> Option<i64> {
    match el.get(key)? {
        Value::Number(n) => n.as_i64().or_else(|| {
            let f = n.as_f64()?;
            (f.fract() == 0.0 && f.abs() <= i64::MAX as f64).then_some(f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn field_i32(el: &Value, key: &str) -> Option<i32> {
    field_i64(el, key).and_then(|v| i32::try_from(v).ok())
}

fn field_u32(el: &Value, key: &str) -> Option<u32> {
    field_i64(el, key).and_then(|v| u32::try_from(v).ok())
}

fn field_f32(el: &Value, key: &str) -> Option<f32> {
    let v = match el.get(key)? {
        Value::Number(n) => n.as_f64()? as f32,
        Value::String(s) => s.trim().parse::<f32>().ok()?,
        _ => return None,
    };
    v.is_finite().then_some(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(text: &str) -> Vec<ParsedPayload> {
        match decode_envelope(text).unwrap() {
            ParsedPayload::Batch(items) => items,
            other => panic!("expected batch, got {other:?}"),
        }
    }

    #[test]
    fn params_keep_array_order() {
        let items = batch(r#"{"params":[{"name":12,"value":0.25},{"name":3,"value":1}]}"#);
        assert_eq!(
            items,
            vec![
                ParsedPayload::ParamUpdate { index: 12, value: 0.25 },
                ParsedPayload::ParamUpdate { index: 3, value: 1.0 },
            ]
        );
    }

    #[test]
    fn params_accept_numeric_strings() {
        let items = batch(r#"{"params":[{"name":"7","value":"0.5"}]}"#);
        assert_eq!(items, vec![ParsedPayload::ParamUpdate { index: 7, value: 0.5 }]);
    }

    #[test]
    fn params_element_missing_value_rejects_whole_envelope() {
        let r = decode_envelope(r#"{"params":[{"name":1,"value":0.1},{"name":2}],"event":"frag","message":"x"}"#);
        assert!(matches!(r, Err(ProtocolError::MalformedEnvelope { .. })));
    }

    #[test]
    fn k2_decodes_four_floats() {
        let items = batch(r#"{"k2":[{"name":5,"value":"0.1,0.2,0.3,0.4"}]}"#);
        let ParsedPayload::ParamUpdateVec { index, components } = &items[0] else {
            panic!("unexpected {items:?}");
        };
        assert_eq!(*index, 5);
        for (got, want) in components.iter().zip([0.1f32, 0.2, 0.3, 0.4]) {
            assert!((got - want).abs() < 1e-6, "{got} vs {want}");
        }
    }

    #[test]
    fn bad_k2_element_does_not_abort_siblings() {
        let items = batch(
            r#"{"k2":[{"name":1,"value":"0.1,oops,0.3,0.4"},{"name":2,"value":"1,2,3,4"},{"name":3,"value":"1,2,3"}]}"#,
        );
        assert_eq!(
            items,
            vec![ParsedPayload::ParamUpdateVec { index: 2, components: [1.0, 2.0, 3.0, 4.0] }]
        );
    }

    #[test]
    fn vec4_literal_edges() {
        assert_eq!(parse_vec4(" 1, 2 ,3,4 "), Some([1.0, 2.0, 3.0, 4.0]));
        assert_eq!(parse_vec4("1,2,3,4,5"), None);
        assert_eq!(parse_vec4("1,2,3,inf"), None);
        assert_eq!(parse_vec4(""), None);
    }

    #[test]
    fn events_map_to_their_payloads() {
        assert_eq!(
            batch(r#"{"event":"canvas","message":"aGVsbG8="}"#),
            vec![ParsedPayload::StreamFrame("aGVsbG8=".into())]
        );
        assert_eq!(
            batch(r#"{"event":"hydra","message":"osc(10).out()"}"#),
            vec![ParsedPayload::UniformDescriptor("osc(10).out()".into())]
        );
        assert_eq!(
            batch(r#"{"event":"frag","message":"void main(){}"}"#),
            vec![ParsedPayload::FragmentShaderSource("void main(){}".into())]
        );
    }

    #[test]
    fn nested_params_event_is_decoded_as_envelope() {
        let frame = r#"{"event":"params","message":"{\"params\" :[{\"name\" : 12,\"value\" :0.132}]}"}"#;
        assert_eq!(batch(frame), vec![ParsedPayload::ParamUpdate { index: 12, value: 0.132 }]);
    }

    #[test]
    fn nested_params_with_bad_json_rejects_frame() {
        let frame = r#"{"event":"params","message":"{\"params\":["}"#;
        assert!(decode_envelope(frame).is_err());
    }

    #[test]
    fn nesting_is_bounded() {
        let mut frame = r#"{"params":[{"name":1,"value":1}]}"#.to_string();
        for _ in 0..=MAX_NESTING {
            let quoted = serde_json::to_string(&frame).unwrap();
            frame = format!(r#"{{"event":"params","message":{quoted}}}"#);
        }
        assert!(decode_envelope(&frame).is_err());
    }

    #[test]
    fn unknown_event_or_missing_message_is_unrecognized() {
        assert_eq!(
            decode_envelope(r#"{"event":"editortext","message":"x"}"#).unwrap(),
            ParsedPayload::Unrecognized
        );
        assert_eq!(decode_envelope(r#"{"event":"frag"}"#).unwrap(), ParsedPayload::Unrecognized);
        assert_eq!(decode_envelope("{}").unwrap(), ParsedPayload::Unrecognized);
    }

    #[test]
    fn non_object_or_wrong_shape_is_malformed() {
        assert!(decode_envelope("{\"params\":3}").is_err());
        assert!(decode_envelope("{\"event\":7,\"message\":\"x\"}").is_err());
        assert!(decode_envelope("{\"event\":\"frag\",\"message\":7}").is_err());
    }

    #[test]
    fn independent_keys_are_all_decoded() {
        let items = batch(
            r#"{"event":"frag","message":"S","params":[{"name":1,"value":0.5}],"cmd":[{"type":0,"warp":1,"fbo":4,"slot":0}]}"#,
        );
        assert_eq!(
            items,
            vec![
                ParsedPayload::ParamUpdate { index: 1, value: 0.5 },
                ParsedPayload::SlotSelect(SlotCommand::Fbo { warp: 1, fbo: 4, slot: 0 }),
                ParsedPayload::FragmentShaderSource("S".into()),
            ]
        );
    }

    #[test]
    fn cmd_with_unknown_type_is_skipped() {
        assert_eq!(
            decode_envelope(r#"{"cmd":[{"type":7,"warp":0,"slot":0}]}"#).unwrap(),
            ParsedPayload::Unrecognized
        );
    }
}
