//! Runtime parameter store.
//!
//! Parameters are keyed by the integer index the remote controller uses. Incoming values
//! set a target; `tick()` moves the live value toward it once per frame. The store is
//! shared with the control channel through `SharedParams`.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use hydrawarp_engine::{logi, ParamSink, SlotCommand};

/// Controller layout the remote side uses for its indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamGroup {
    /// 1..=8
    Slider,
    /// 11..=18
    Rotary,
    /// 41..=48
    LowRow,
}

impl ParamGroup {
    pub fn of(index: i32) -> Option<(ParamGroup, i32)> {
        match index {
            1..=8 => Some((ParamGroup::Slider, index)),
            11..=18 => Some((ParamGroup::Rotary, index - 10)),
            41..=48 => Some((ParamGroup::LowRow, index - 40)),
            _ => None,
        }
    }
}

/// Human-readable name for logs: `slider 3`, `rotary 1`, `param 27`.
pub fn label(index: i32) -> String {
    match ParamGroup::of(index) {
        Some((ParamGroup::Slider, n)) => format!("slider {n}"),
        Some((ParamGroup::Rotary, n)) => format!("rotary {n}"),
        Some((ParamGroup::LowRow, n)) => format!("low row {n}"),
        None => format!("param {index}"),
    }
}

/// What feeds one warp slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotSource {
    Shader(u32),
    Fbo(u32),
}

#[derive(Debug)]
pub struct ParamStore {
    values: BTreeMap<i32, f32>,
    targets: BTreeMap<i32, f32>,
    vec4: BTreeMap<i32, [f32; 4]>,
    slots: BTreeMap<(u32, u32), SlotSource>, // (warp, slot) -> source
    smoothing: f32,
}

impl ParamStore {
    pub fn new(smoothing: f32) -> Self {
        Self {
            values: BTreeMap::new(),
            targets: BTreeMap::new(),
            vec4: BTreeMap::new(),
            slots: BTreeMap::new(),
            smoothing: smoothing.clamp(0.0, 1.0),
        }
    }

    pub fn set_smoothing(&mut self, smoothing: f32) {
        self.smoothing = smoothing.clamp(0.0, 1.0);
    }

    /// Set a target. Returns whether it differs from the previous target.
    pub fn set_target(&mut self, index: i32, value: f32) -> bool {
        // First sighting starts at the target instead of easing in from zero.
        self.values.entry(index).or_insert(value);
        self.targets.insert(index, value) != Some(value)
    }

    pub fn target(&self, index: i32) -> Option<f32> {
        self.targets.get(&index).copied()
    }

    /// Smoothed values as the renderer would see them this frame, by index.
    pub fn values(&self) -> impl Iterator<Item = (i32, f32)> + '_ {
        self.values.iter().map(|(i, v)| (*i, *v))
    }

    #[cfg(test)]
    fn value(&self, index: i32) -> Option<f32> {
        self.values.get(&index).copied()
    }

    pub fn vec4_values(&self) -> impl Iterator<Item = (i32, [f32; 4])> + '_ {
        self.vec4.iter().map(|(i, v)| (*i, *v))
    }

    /// Current slot routing as `(warp, slot, source)`.
    pub fn slots(&self) -> impl Iterator<Item = (u32, u32, SlotSource)> + '_ {
        self.slots.iter().map(|(&(warp, slot), src)| (warp, slot, *src))
    }

    pub fn tick(&mut self) {
        let alpha = if self.smoothing <= 0.0 {
            1.0
        } else {
            (1.0 - self.smoothing).clamp(0.001, 1.0)
        };
        for (index, cur) in self.values.iter_mut() {
            let target = self.targets.get(index).copied().unwrap_or(*cur);
            *cur += (target - *cur) * alpha;
        }
    }
}

/// `ParamSink` over a store shared with the render loop.
#[derive(Debug, Clone)]
pub struct SharedParams(pub Arc<Mutex<ParamStore>>);

impl ParamSink for SharedParams {
    fn set_float(&mut self, index: i32, value: f32) -> bool {
        let changed = match self.0.lock() {
            Ok(mut s) => s.set_target(index, value),
            Err(_) => false,
        };
        if changed {
            logi!("PARAMS", "{} -> {value:.3}", label(index));
        }
        changed
    }

    fn float_value(&self, index: i32) -> Option<f32> {
        self.0.lock().ok().and_then(|s| s.target(index))
    }

    fn set_vec4(&mut self, index: i32, components: [f32; 4]) {
        if let Ok(mut s) = self.0.lock() {
            s.vec4.insert(index, components);
        }
    }

    fn select_slot(&mut self, cmd: SlotCommand) {
        let (warp, slot, source) = match cmd {
            SlotCommand::Shader { warp, shader, slot } => (warp, slot, SlotSource::Shader(shader)),
            SlotCommand::Fbo { warp, fbo, slot } => (warp, slot, SlotSource::Fbo(fbo)),
        };
        logi!("PARAMS", "warp {warp} slot {slot} <- {source:?}");
        if let Ok(mut s) = self.0.lock() {
            s.slots.insert((warp, slot), source);
        }
    }
}
