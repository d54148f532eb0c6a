//! `/* {"title": "..."} */<glsl>` frames.

use serde_json::Value;

use super::{ParsedPayload, ShaderAsset};
use crate::error::ProtocolError;

pub(super) fn decode_shader_header(text: &str) -> Result<ParsedPayload, ProtocolError> {
    let rest = text
        .strip_prefix("/*")
        .ok_or_else(|| ProtocolError::header("missing opening /*"))?;
    let close = rest
        .find("*/")
        .ok_or_else(|| ProtocolError::header("unterminated header comment"))?;

    let header = &rest[..close];
    let body = &rest[close + 2..];

    let json: Value = serde_json::from_str(header).map_err(|e| ProtocolError::header(e.to_string()))?;
    let title = json
        .get("title")
        .and_then(Value::as_str)
        .ok_or_else(|| ProtocolError::header("no string title"))?;

    Ok(ParsedPayload::ShaderAssetWrite(ShaderAsset {
        title: title.to_string(),
        header: header.to_string(),
        body: body.to_string(),
        raw_text: text.to_string(),
        has_uniforms: body.contains("uniform"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset(text: &str) -> ShaderAsset {
        match decode_shader_header(text).unwrap() {
            ParsedPayload::ShaderAssetWrite(a) => a,
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn splits_header_and_body() {
        let a = asset("/* {\"title\":\"demo\"} */\nvoid main(){}");
        assert_eq!(a.title, "demo");
        assert_eq!(a.header, " {\"title\":\"demo\"} ");
        assert_eq!(a.body, "\nvoid main(){}");
        assert!(!a.has_uniforms);
    }

    #[test]
    fn uniforms_are_detected_in_body() {
        let a = asset("/*{\"title\":\"lit\",\"author\":\"x\"}*/uniform vec3 iResolution;\nvoid main(){}");
        assert!(a.has_uniforms);
    }

    #[test]
    fn header_mentioning_uniform_does_not_count() {
        let a = asset("/*{\"title\":\"uniform\"}*/void main(){}");
        assert!(!a.has_uniforms);
    }

    #[test]
    fn rejects_headers_without_title_or_json() {
        assert!(decode_shader_header("/* {\"name\":\"demo\"} */void main(){}").is_err());
        assert!(decode_shader_header("/* {\"title\":3} */void main(){}").is_err());
        assert!(decode_shader_header("/* not json */void main(){}").is_err());
        assert!(decode_shader_header("/* {\"title\":\"demo\"} void main(){}").is_err());
    }
}
