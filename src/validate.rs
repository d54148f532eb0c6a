//! Config validation (friendly errors)
//!
//! Purpose:
//! - Catch common misconfigurations early
//! - Explain *what* is wrong, *where* it lives, and *what to do*
//! - Keep the host running where possible: the typed loader already fell back to defaults

use std::collections::BTreeSet;

use hydrawarp_engine::{loge, logi, logw};
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct ValidationIssue {
    pub level: IssueLevel,
    pub path: String,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueLevel {
    Warn,
    Error,
}

impl ValidationIssue {
    pub fn warn(path: impl Into<String>, message: impl Into<String>, hint: Option<String>) -> Self {
        Self { level: IssueLevel::Warn, path: path.into(), message: message.into(), hint }
    }
    pub fn error(path: impl Into<String>, message: impl Into<String>, hint: Option<String>) -> Self {
        Self { level: IssueLevel::Error, path: path.into(), message: message.into(), hint }
    }
}

pub fn emit_issues(tag: &str, issues: &[ValidationIssue]) {
    for it in issues {
        match it.level {
            IssueLevel::Warn => {
                if let Some(h) = &it.hint {
                    logw!(tag, "{}: {} (hint: {})", it.path, it.message, h);
                } else {
                    logw!(tag, "{}: {}", it.path, it.message);
                }
            }
            IssueLevel::Error => {
                if let Some(h) = &it.hint {
                    loge!(tag, "{}: {} (hint: {})", it.path, it.message, h);
                } else {
                    loge!(tag, "{}: {}", it.path, it.message);
                }
            }
        }
    }
}

/// Emit a one-line summary even when there are zero issues, so the log shows validation ran.
pub fn emit_summary(tag: &str, label: &str, issues: &[ValidationIssue]) {
    let warns = issues.iter().filter(|i| i.level == IssueLevel::Warn).count();
    let errs = issues.iter().filter(|i| i.level == IssueLevel::Error).count();
    if errs == 0 && warns == 0 {
        logi!(tag, "validation: {label} OK (0 issues)");
    } else {
        logw!(tag, "validation: {label} issues found (errors={errs} warnings={warns})");
    }
}

const TOP_KEYS: [&str; 3] = ["version", "websocket", "host"];
const WS_KEYS: [&str; 9] = [
    "protocol",
    "host",
    "port",
    "url",
    "auto_connect",
    "reconnect_interval_ms",
    "ping_interval_ms",
    "read_timeout_ms",
    "relay_live_code",
];
const HOST_KEYS: [&str; 2] = ["tick_hz", "smoothing"];

/// Validate the raw `channel.json` value:
/// - unknown keys (typos are silently ignored in lenient mode)
/// - endpoint pieces that cannot form a usable URL
/// - timing values the host will clamp or that make the channel sluggish
pub fn validate_channel_json(raw: &Value) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    let Some(top) = raw.as_object() else {
        issues.push(ValidationIssue::error(
            "channel.json:/",
            "top level must be an object",
            Some("expected: { \"version\": 1, \"websocket\": { ... }, \"host\": { ... } }".into()),
        ));
        return issues;
    };

    unknown_keys(&mut issues, "channel.json:", top.keys(), &TOP_KEYS);

    if let Some(v) = top.get("version").and_then(|v| v.as_u64()) {
        if v != 1 {
            issues.push(ValidationIssue::warn(
                "channel.json:/version",
                format!("unsupported version {v}"),
                Some("only version 1 is understood; --strict refuses to start with this file".into()),
            ));
        }
    }

    if let Some(ws) = top.get("websocket") {
        match ws.as_object() {
            Some(o) => {
                unknown_keys(&mut issues, "channel.json:/websocket", o.keys(), &WS_KEYS);
                validate_websocket(&mut issues, ws);
            }
            None => issues.push(ValidationIssue::error(
                "channel.json:/websocket",
                "must be an object",
                None,
            )),
        }
    }

    if let Some(host) = top.get("host") {
        match host.as_object() {
            Some(o) => {
                unknown_keys(&mut issues, "channel.json:/host", o.keys(), &HOST_KEYS);
                validate_host(&mut issues, host);
            }
            None => issues.push(ValidationIssue::error("channel.json:/host", "must be an object", None)),
        }
    }

    issues
}

fn validate_websocket(issues: &mut Vec<ValidationIssue>, ws: &Value) {
    if let Some(url) = ws.get("url").and_then(|v| v.as_str()) {
        if !url.is_empty() {
            check_scheme(issues, "channel.json:/websocket/url", url);
        }
    } else if let Some(proto) = ws.get("protocol").and_then(|v| v.as_str()) {
        if !proto.ends_with("://") {
            issues.push(ValidationIssue::error(
                "channel.json:/websocket/protocol",
                format!("protocol '{proto}' does not end with '://'"),
                Some("use \"ws://\"".into()),
            ));
        } else {
            check_scheme(issues, "channel.json:/websocket/protocol", proto);
        }
    }

    if ws.get("port").and_then(|v| v.as_u64()) == Some(0) {
        issues.push(ValidationIssue::error(
            "channel.json:/websocket/port",
            "port 0 is not connectable",
            Some("the controller listens on 8088 by default".into()),
        ));
    }

    if let Some(ms) = ws.get("read_timeout_ms").and_then(|v| v.as_u64()) {
        if ms > 100 {
            issues.push(ValidationIssue::warn(
                "channel.json:/websocket/read_timeout_ms",
                format!("{ms} ms read timeout delays outbound commands by up to that much"),
                Some("keep it at a few milliseconds".into()),
            ));
        }
    }

    if let Some(ms) = ws.get("ping_interval_ms").and_then(|v| v.as_u64()) {
        if ms > 0 && ms < 100 {
            issues.push(ValidationIssue::warn(
                "channel.json:/websocket/ping_interval_ms",
                format!("heartbeat every {ms} ms is very chatty"),
                Some("0 disables the heartbeat; 1000 or more is typical".into()),
            ));
        }
    }
}

fn check_scheme(issues: &mut Vec<ValidationIssue>, path: &str, url: &str) {
    if url.starts_with("wss://") {
        issues.push(ValidationIssue::warn(
            path,
            "wss:// needs TLS support, which this build does not include",
            Some("connect with ws:// through a local proxy instead".into()),
        ));
    } else if !url.starts_with("ws://") {
        issues.push(ValidationIssue::error(
            path,
            format!("'{url}' is not a ws:// endpoint"),
            Some("example: \"ws://127.0.0.1:8088\"".into()),
        ));
    }
}

fn validate_host(issues: &mut Vec<ValidationIssue>, host: &Value) {
    if let Some(hz) = host.get("tick_hz").and_then(|v| v.as_u64()) {
        if hz == 0 || hz > 1000 {
            issues.push(ValidationIssue::warn(
                "channel.json:/host/tick_hz",
                format!("tick rate {hz} is out of range"),
                Some("clamped to 1..=1000".into()),
            ));
        }
    }

    if let Some(s) = host.get("smoothing").and_then(|v| v.as_f64()) {
        if !(0.0..=1.0).contains(&s) {
            issues.push(ValidationIssue::warn(
                "channel.json:/host/smoothing",
                format!("smoothing {s} is outside 0..1"),
                Some("clamped; 0 = immediate, values near 1 are very slow".into()),
            ));
        }
    }
}

fn unknown_keys<'a>(
    issues: &mut Vec<ValidationIssue>,
    base: &str,
    keys: impl Iterator<Item = &'a String>,
    known: &[&str],
) {
    for k in keys {
        if !known.contains(&k.as_str()) {
            let avail: BTreeSet<String> = known.iter().map(|s| s.to_string()).collect();
            issues.push(ValidationIssue::warn(
                format!("{base}/{}", escape_ptr(k)),
                format!("unknown key '{k}' is ignored"),
                Some(format!("known keys: {}", join_set(&avail))),
            ));
        }
    }
}

fn join_set(set: &BTreeSet<String>) -> String {
    set.iter().cloned().collect::<Vec<_>>().join(", ")
}

// JSON Pointer escaping for friendly paths
fn escape_ptr(s: &str) -> String {
    s.replace('~', "~0").replace('/', "~1")
}
