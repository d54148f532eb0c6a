//! Received-value hand-off between the channel and the render-loop host.
//!
//! Each signal is a single-slot mailbox: a write overwrites whatever is there (read or not)
//! and marks it fresh; a read clears the mark. It is lossy on purpose: the host only ever
//! wants the newest shader/uniforms/frame, never a backlog.

use crate::protocol::ShaderAsset;

/// Single-slot, overwrite-on-write, clear-on-read cell.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mailbox<T> {
    value: T,
    fresh: bool,
}

impl<T: Clone> Mailbox<T> {
    pub fn new(value: T) -> Self {
        Self { value, fresh: false }
    }

    pub fn put(&mut self, value: T) {
        self.value = value;
        self.fresh = true;
    }

    pub fn is_fresh(&self) -> bool {
        self.fresh
    }

    /// Last stored value, fresh or not. Clears the fresh mark.
    pub fn consume(&mut self) -> T {
        self.fresh = false;
        self.value.clone()
    }

    /// The value only if it was written since the last read. Clears the fresh mark.
    pub fn take_fresh(&mut self) -> Option<T> {
        if self.fresh {
            Some(self.consume())
        } else {
            None
        }
    }

    pub fn peek(&self) -> &T {
        &self.value
    }
}

/// Everything the channel hands to the host between ticks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControlState {
    fragment_shader: Mailbox<String>,
    uniforms: Mailbox<String>,
    stream_frame: Mailbox<String>,
    shader_asset: Mailbox<Option<ShaderAsset>>,
    status: Mailbox<String>,
}

impl ControlState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_fragment_shader(&mut self, text: String) {
        self.fragment_shader.put(text);
    }

    pub fn has_fragment_shader(&self) -> bool {
        self.fragment_shader.is_fresh()
    }

    pub fn consume_fragment_shader(&mut self) -> String {
        self.fragment_shader.consume()
    }

    pub fn take_fragment_shader(&mut self) -> Option<String> {
        self.fragment_shader.take_fresh()
    }

    pub fn record_uniforms(&mut self, text: String) {
        self.uniforms.put(text);
    }

    pub fn has_uniforms(&self) -> bool {
        self.uniforms.is_fresh()
    }

    pub fn consume_uniforms(&mut self) -> String {
        self.uniforms.consume()
    }

    pub fn take_uniforms(&mut self) -> Option<String> {
        self.uniforms.take_fresh()
    }

    pub fn record_stream_frame(&mut self, base64: String) {
        self.stream_frame.put(base64);
    }

    pub fn has_stream_frame(&self) -> bool {
        self.stream_frame.is_fresh()
    }

    pub fn consume_stream_frame(&mut self) -> String {
        self.stream_frame.consume()
    }

    pub fn take_stream_frame(&mut self) -> Option<String> {
        self.stream_frame.take_fresh()
    }

    pub fn record_shader_asset(&mut self, asset: ShaderAsset) {
        self.shader_asset.put(Some(asset));
    }

    pub fn has_shader_asset(&self) -> bool {
        self.shader_asset.is_fresh()
    }

    pub fn take_shader_asset(&mut self) -> Option<ShaderAsset> {
        self.shader_asset.take_fresh().flatten()
    }

    pub fn record_status(&mut self, line: String) {
        self.status.put(line);
    }

    pub fn has_status(&self) -> bool {
        self.status.is_fresh()
    }

    /// Latest connection status line ("Connected", "WS Error: ...", ...).
    pub fn status(&self) -> &str {
        self.status.peek()
    }

    pub fn take_status(&mut self) -> Option<String> {
        self.status.take_fresh()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consume_returns_once_then_stale() {
        let mut c = ControlState::new();
        c.record_fragment_shader("S".into());
        assert!(c.has_fragment_shader());
        assert_eq!(c.consume_fragment_shader(), "S");
        assert!(!c.has_fragment_shader());

        // Nothing pending: the last value again, flag stays down.
        assert_eq!(c.consume_fragment_shader(), "S");
        assert!(!c.has_fragment_shader());
        assert_eq!(c.take_fragment_shader(), None);
    }

    #[test]
    fn newer_writes_overwrite_unread_ones() {
        let mut c = ControlState::new();
        c.record_uniforms("a".into());
        c.record_uniforms("b".into());
        assert_eq!(c.take_uniforms().as_deref(), Some("b"));
        assert_eq!(c.take_uniforms(), None);
    }

    #[test]
    fn signals_are_independent() {
        let mut c = ControlState::new();
        c.record_stream_frame("AAAA".into());
        assert!(c.has_stream_frame());
        assert!(!c.has_fragment_shader());
        assert!(!c.has_uniforms());
        assert!(!c.has_shader_asset());
        assert_eq!(c.consume_stream_frame(), "AAAA");
        assert!(!c.has_stream_frame());
    }

    #[test]
    fn empty_mailbox_consumes_default() {
        let mut m: Mailbox<String> = Mailbox::default();
        assert_eq!(m.consume(), "");
        assert!(!m.is_fresh());
    }
}
