use super::handle::StateHandle;
use super::playback::NodeId;
use crate::{ClipRef, WrapMode};
use std::cell::Cell;

pub(crate) const WEIGHT_EPSILON: f32 = 1e-6;

pub(crate) fn approximately(a: f32, b: f32) -> bool {
    (a - b).abs() <= WEIGHT_EPSILON * a.abs().max(b.abs()).max(1.0)
}

/// Linear step from `current` toward `target`, never overshooting.
pub(crate) fn move_towards(current: f32, target: f32, max_delta: f32) -> f32 {
    let remaining = target - current;
    if max_delta.is_nan() || remaining.abs() <= max_delta {
        return target;
    }
    current + remaining.signum() * max_delta
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum FadeStep {
    Fading,
    /// The fade landed on its target this step; the payload is the snapped weight.
    Reached(f32),
}

/// One bound playback unit.
#[derive(Debug)]
pub struct Slot {
    pub(crate) index: usize,
    pub(crate) name: String,
    pub(crate) clip: ClipRef,
    pub(crate) wrap_mode: WrapMode,
    pub(crate) node: NodeId,

    pub(crate) enabled: bool,
    time: Cell<f32>,
    time_valid: Cell<bool>,

    pub(crate) weight: f32,
    pub(crate) target_weight: f32,
    pub(crate) fade_speed: f32,
    pub(crate) fading: bool,
    pub(crate) mix_weight: f32,

    pub(crate) is_clone: bool,
    pub(crate) parent: Option<StateHandle>,
    pub(crate) ready_for_cleanup: bool,

    pub(crate) weight_dirty: bool,
    pub(crate) enabled_dirty: bool,
}

impl Slot {
    pub(crate) fn new(index: usize, name: String, clip: ClipRef, node: NodeId) -> Self {
        let wrap_mode = clip.effective_wrap_mode();
        Self {
            index,
            name,
            clip,
            wrap_mode,
            node,
            enabled: false,
            time: Cell::new(0.0),
            time_valid: Cell::new(false),
            weight: 0.0,
            target_weight: 0.0,
            fade_speed: 0.0,
            fading: false,
            mix_weight: 0.0,
            is_clone: false,
            parent: None,
            ready_for_cleanup: false,
            weight_dirty: false,
            enabled_dirty: false,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn clip(&self) -> &ClipRef {
        &self.clip
    }

    pub fn wrap_mode(&self) -> WrapMode {
        self.wrap_mode
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn weight(&self) -> f32 {
        self.weight
    }

    pub fn target_weight(&self) -> f32 {
        self.target_weight
    }

    pub fn is_fading(&self) -> bool {
        self.fading
    }

    pub fn mix_weight(&self) -> f32 {
        self.mix_weight
    }

    pub fn is_clone(&self) -> bool {
        self.is_clone
    }

    pub(crate) fn enable(&mut self) {
        if self.enabled {
            return;
        }
        self.enabled = true;
        self.enabled_dirty = true;
    }

    pub(crate) fn disable(&mut self) {
        if !self.enabled {
            return;
        }
        self.enabled = false;
        self.enabled_dirty = true;
    }

    /// Jumps straight to `weight`, cancelling any fade.
    pub(crate) fn force_weight(&mut self, weight: f32) {
        self.weight = weight;
        self.target_weight = weight;
        self.fade_speed = 0.0;
        self.fading = false;
        self.weight_dirty = true;
    }

    pub(crate) fn fade_to(&mut self, target: f32, speed: f32) {
        self.target_weight = target;
        self.fade_speed = speed;
        self.fading = speed > 0.0;
    }

    /// Starts a fade toward `target` that lasts `duration` seconds.
    ///
    /// A repeated request toward the same target at a slower rate is ignored, so calling a
    /// crossfade every frame does not keep pushing its end back.
    pub(crate) fn setup_lerp(&mut self, target: f32, duration: f32) {
        let travel = (self.weight - target).abs();
        let speed = if duration != 0.0 {
            travel / duration
        } else {
            f32::INFINITY
        };
        if self.fading && approximately(self.target_weight, target) && speed < self.fade_speed {
            return;
        }
        self.fade_to(target, speed);
    }

    pub(crate) fn step_fade(&mut self, delta: f32) -> FadeStep {
        let step = if self.fade_speed.is_infinite() {
            f32::INFINITY
        } else {
            self.fade_speed * delta
        };
        let weight = move_towards(self.weight, self.target_weight, step);
        if weight != self.weight {
            self.weight = weight;
            self.weight_dirty = true;
        }
        if approximately(self.weight, self.target_weight) {
            self.force_weight(self.target_weight);
            return FadeStep::Reached(self.weight);
        }
        FadeStep::Fading
    }

    /// Clears playback state back to a stopped, zero-weight slot. Node-side reset is the
    /// caller's job.
    pub(crate) fn reset_stopped(&mut self) {
        self.fade_speed = 0.0;
        self.fading = false;
        self.weight = 0.0;
        self.target_weight = 0.0;
        self.store_time(0.0);
        self.enabled = false;
        self.enabled_dirty = true;
        self.weight_dirty = true;
    }

    pub(crate) fn set_as_clone_of(&mut self, parent: StateHandle) {
        self.is_clone = true;
        self.parent = Some(parent);
    }

    pub(crate) fn cached_time(&self) -> Option<f32> {
        self.time_valid.get().then(|| self.time.get())
    }

    pub(crate) fn store_time(&self, time: f32) {
        self.time.set(time);
        self.time_valid.set(true);
    }

    pub(crate) fn invalidate_time(&self) {
        self.time_valid.set(false);
    }

    pub(crate) fn reset_dirty_flags(&mut self) {
        self.weight_dirty = false;
        self.enabled_dirty = false;
    }
}
