use super::clock::LocalClock;
use super::handle::{StateCursor, StateHandle};
use super::playback::PlaybackBackend;
use super::slot::{FadeStep, Slot};
use super::slot_table::SlotTable;
use crate::model::same_clip;
use crate::{ClipRef, Error, MixerConfig, WrapMode};
use std::collections::VecDeque;

/// When a queued transition should start.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum QueueMode {
    /// Wait until every active slot has finished playing.
    #[default]
    CompleteOthers,
    /// Skip the queue and start right away.
    PlayNow,
}

#[derive(Clone, Copy, Debug)]
struct QueuedTransition {
    target: StateHandle,
    fade_duration: f32,
}

/// Receives the mixer's done notification: fired once whenever the mixer goes from having an
/// enabled slot to having none.
pub trait MixerListener<B: PlaybackBackend> {
    fn on_done(&mut self, mixer: &mut Mixer<B>);
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct SlotSnapshot {
    pub index: usize,
    pub name: String,
    pub clip_name: String,
    pub enabled: bool,
    pub weight: f32,
    pub target_weight: f32,
    pub mix_weight: f32,
    pub time: f32,
    pub speed: f32,
    pub is_clone: bool,
}

/// Per-object animation-slot multiplexer.
///
/// Structural calls (`add_clip`, `play`, `crossfade`, ...) take effect immediately; fades, queue
/// firing, completion and clone cleanup only advance in [`tick`](Self::tick), which must run once
/// per frame.
pub struct Mixer<B: PlaybackBackend = LocalClock> {
    backend: B,
    slots: SlotTable,
    queue: VecDeque<QueuedTransition>,
    config: MixerConfig,
    done: bool,
    /// Set when an enabled slot leaves the table, so the survivors get renormalized.
    weights_dirty: bool,
    listener: Option<Box<dyn MixerListener<B>>>,
}

impl<B: PlaybackBackend + std::fmt::Debug> std::fmt::Debug for Mixer<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mixer")
            .field("backend", &self.backend)
            .field("slots", &self.slots)
            .field("queue", &self.queue)
            .field("config", &self.config)
            .field("done", &self.done)
            .field("weights_dirty", &self.weights_dirty)
            .field("has_listener", &self.listener.is_some())
            .finish()
    }
}

impl Default for Mixer<LocalClock> {
    fn default() -> Self {
        Self::new(LocalClock::new())
    }
}

impl<B: PlaybackBackend> Mixer<B> {
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, MixerConfig::default())
    }

    pub fn with_config(backend: B, config: MixerConfig) -> Self {
        Self {
            backend,
            slots: SlotTable::new(),
            queue: VecDeque::new(),
            config,
            done: true,
            weights_dirty: false,
            listener: None,
        }
    }

    pub fn config(&self) -> &MixerConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn slots(&self) -> &SlotTable {
        &self.slots
    }

    pub fn set_listener<L: MixerListener<B> + 'static>(&mut self, listener: L) {
        self.listener = Some(Box::new(listener));
    }

    pub fn clear_listener(&mut self) {
        self.listener = None;
    }

    pub fn keep_stopped_connected(&self) -> bool {
        self.config.keep_stopped_connected
    }

    /// Switches the connection policy for disabled slots and reconciles every slot right away.
    pub fn set_keep_stopped_connected(&mut self, keep: bool) {
        if keep == self.config.keep_stopped_connected {
            return;
        }
        self.config.keep_stopped_connected = keep;
        for index in 0..self.slots.len() {
            let Some(slot) = self.slots.entry(index) else {
                continue;
            };
            if slot.enabled {
                continue;
            }
            let node = slot.node;
            if keep {
                self.backend.connect(node, index, slot.mix_weight);
            } else {
                self.disconnect_input(index);
            }
        }
    }

    /// `true` until something plays, and again once nothing is enabled.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Live slots, clones included.
    pub fn clip_count(&self) -> usize {
        self.slots.count()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_playing(&self) -> bool {
        self.slots.iter().any(|slot| slot.enabled)
    }

    /// Whether the named slot, or any clone made from it, is enabled.
    pub fn is_playing_named(&self, name: &str) -> bool {
        let Some(slot) = self.slots.find_by_name(name) else {
            return false;
        };
        slot.enabled
            || self
                .slots
                .iter()
                .any(|other| other.enabled && self.is_clone_of(other, slot.index))
    }

    pub fn get_state(&self, name: &str) -> Option<StateHandle> {
        self.slots
            .find_by_name(name)
            .map(|slot| StateHandle::new(slot.index, slot.node))
    }

    /// Versioned cursor over every live slot; see [`StateCursor`].
    pub fn get_states(&self) -> StateCursor {
        StateCursor::new(self.slots.version())
    }

    /// Handles for every live slot, in index order.
    pub fn states(&self) -> impl Iterator<Item = StateHandle> + '_ {
        self.slots
            .iter()
            .map(|slot| StateHandle::new(slot.index, slot.node))
    }

    pub fn snapshot(&self) -> Vec<SlotSnapshot> {
        self.slots
            .iter()
            .map(|slot| SlotSnapshot {
                index: slot.index,
                name: slot.name.clone(),
                clip_name: slot.clip.name.clone(),
                enabled: slot.enabled,
                weight: slot.weight,
                target_weight: slot.target_weight,
                mix_weight: slot.mix_weight,
                time: self.state_time(slot.index),
                speed: self.backend.speed(slot.node),
                is_clone: slot.is_clone,
            })
            .collect()
    }

    pub fn add_clip(&mut self, name: &str, clip: &ClipRef) -> Result<StateHandle, Error> {
        if self.slots.find_by_name(name).is_some() {
            return Err(Error::DuplicateName {
                name: name.to_string(),
            }
            .reported("add_clip"));
        }
        let handle = self.do_add_clip(name.to_string(), clip);
        self.update_done_status();
        Ok(handle)
    }

    /// Removes the named slot and stops every clone made from it.
    pub fn remove_clip(&mut self, name: &str) -> Result<(), Error> {
        let index = self.find_index(name, "remove_clip")?;
        self.remove_clones(index, None);
        self.remove_slot(index);
        self.prune_queue();
        Ok(())
    }

    /// Removes every slot, clones included, bound to `clip`. Returns whether anything was removed.
    pub fn remove_clip_ref(&mut self, clip: &ClipRef) -> bool {
        let bound = self
            .slots
            .iter()
            .filter(|slot| same_clip(&slot.clip, clip))
            .map(|slot| (slot.index, slot.is_clone))
            .collect::<Vec<_>>();
        for &(index, is_clone) in &bound {
            if !is_clone {
                self.remove_clones(index, None);
            }
            self.remove_slot(index);
        }
        self.prune_queue();
        !bound.is_empty()
    }

    /// Enables the named slot at full weight and stops every other slot.
    pub fn play(&mut self, name: &str) -> Result<(), Error> {
        let index = self.find_index(name, "play")?;
        self.play_index(index);
        Ok(())
    }

    /// Plays a fresh clone of the named slot, either now or once everything else finishes.
    /// Returns the clone's handle.
    pub fn play_queued(&mut self, name: &str, mode: QueueMode) -> Result<StateHandle, Error> {
        let index = self.find_index(name, "play_queued")?;
        let clone = self.clone_slot(index)?;
        match mode {
            QueueMode::PlayNow => self.play_index(clone.index()),
            QueueMode::CompleteOthers => self.enqueue(clone, 0.0),
        }
        Ok(clone)
    }

    /// Fades the named slot to full weight and every other enabled slot to zero over `duration`
    /// seconds. A zero duration is a plain [`play`](Self::play).
    pub fn crossfade(&mut self, name: &str, duration: f32) -> Result<(), Error> {
        check_duration(duration, "crossfade")?;
        let index = self.find_index(name, "crossfade")?;
        if duration == 0.0 {
            self.play_index(index);
        } else {
            self.crossfade_index(index, duration);
        }
        Ok(())
    }

    pub fn crossfade_queued(
        &mut self,
        name: &str,
        duration: f32,
        mode: QueueMode,
    ) -> Result<StateHandle, Error> {
        check_duration(duration, "crossfade_queued")?;
        let index = self.find_index(name, "crossfade_queued")?;
        let clone = self.clone_slot(index)?;
        match mode {
            QueueMode::PlayNow => self.crossfade_index(clone.index(), duration),
            QueueMode::CompleteOthers => self.enqueue(clone, duration),
        }
        Ok(clone)
    }

    /// Fades the named slot toward `target_weight` without touching other slots.
    pub fn blend(&mut self, name: &str, target_weight: f32, duration: f32) -> Result<(), Error> {
        if !target_weight.is_finite() || target_weight < 0.0 {
            return Err(Error::InvalidValue {
                message: "target weight must be finite and >= 0".to_string(),
            }
            .reported("blend"));
        }
        check_duration(duration, "blend")?;
        let index = self.find_index(name, "blend")?;
        if let Some(slot) = self.slots.entry_mut(index) {
            slot.enable();
            if duration == 0.0 {
                slot.force_weight(target_weight);
            } else {
                slot.setup_lerp(target_weight, duration);
            }
        }
        Ok(())
    }

    pub fn stop(&mut self, name: &str) -> Result<(), Error> {
        let index = self.find_index(name, "stop")?;
        self.do_stop(index, None);
        self.update_done_status();
        Ok(())
    }

    pub fn stop_all(&mut self) {
        for index in 0..self.slots.len() {
            self.do_stop(index, None);
        }
        self.update_done_status();
    }

    pub fn rewind(&mut self, name: &str) -> Result<(), Error> {
        let index = self.find_index(name, "rewind")?;
        self.set_state_time(index, 0.0);
        Ok(())
    }

    pub fn rewind_all(&mut self) {
        for index in 0..self.slots.len() {
            if self.slots.entry(index).is_some() {
                self.set_state_time(index, 0.0);
            }
        }
    }

    /// Drops every pending queue entry and stops the clones they were holding.
    pub fn clear_queue(&mut self) {
        let pending = self.queue.drain(..).collect::<Vec<_>>();
        for entry in pending {
            if self.resolve(entry.target).is_ok() {
                self.stop_slot(entry.target.index());
            }
        }
    }

    /// Evaluates the backend at the current times without advancing them.
    pub fn sample(&mut self) {
        self.backend.evaluate(0.0);
    }

    /// Runs one frame: [`tick`](Self::tick), then lets the backend advance `delta` seconds.
    pub fn update(&mut self, delta: f32) {
        if !delta.is_finite() || delta < 0.0 {
            return;
        }
        self.tick(delta);
        self.backend.evaluate(delta);
        self.invalidate_times();
    }

    /// Per-frame bookkeeping, in a fixed order: invalidate cached times, fire due queue entries,
    /// integrate fades and completions, refresh the done flag, then destroy finished clones.
    pub fn tick(&mut self, delta: f32) {
        if !delta.is_finite() || delta < 0.0 {
            return;
        }
        self.invalidate_times();
        self.update_queue();
        self.update_slots(delta);
        self.update_done_status();
        self.clean_clones();
    }

    pub(crate) fn resolve(&self, handle: StateHandle) -> Result<&Slot, Error> {
        self.slots
            .entry(handle.index())
            .filter(|slot| slot.node == handle.node() && self.backend.is_node_valid(slot.node))
            .ok_or(Error::InvalidHandle {
                index: handle.index(),
            })
    }

    pub(crate) fn resolve_mut(&mut self, handle: StateHandle) -> Result<&mut Slot, Error> {
        let node_alive = self.backend.is_node_valid(handle.node());
        self.slots
            .entry_mut(handle.index())
            .filter(|slot| node_alive && slot.node == handle.node())
            .ok_or(Error::InvalidHandle {
                index: handle.index(),
            })
    }

    /// Slot time, read from the node at most once per tick.
    pub(crate) fn state_time(&self, index: usize) -> f32 {
        let Some(slot) = self.slots.entry(index) else {
            return 0.0;
        };
        if let Some(time) = slot.cached_time() {
            return time;
        }
        let time = self.backend.time(slot.node);
        slot.store_time(time);
        time
    }

    pub(crate) fn set_state_time(&mut self, index: usize, time: f32) {
        let Some(slot) = self.slots.entry(index) else {
            return;
        };
        slot.store_time(time);
        let node = slot.node;
        self.backend.set_time(node, time);
        let duration = self.backend.duration(node);
        self.backend.set_done(node, time >= duration);
    }

    fn invalidate_times(&self) {
        for slot in self.slots.iter() {
            slot.invalidate_time();
        }
    }

    fn find_index(&self, name: &str, operation: &str) -> Result<usize, Error> {
        self.slots
            .find_by_name(name)
            .map(|slot| slot.index)
            .ok_or_else(|| {
                Error::UnknownState {
                    name: name.to_string(),
                }
                .reported(operation)
            })
    }

    fn do_add_clip(&mut self, name: String, clip: &ClipRef) -> StateHandle {
        let slot = self.slots.insert(name, clip, &mut self.backend);
        let (index, node, wrap_mode) = (slot.index, slot.node, slot.wrap_mode);
        if !clip.looping || wrap_mode == WrapMode::Once {
            self.backend.set_duration(node, clip.length);
        }
        self.backend.pause(node);
        if self.config.keep_stopped_connected {
            self.backend.connect(node, index, 0.0);
        }
        StateHandle::new(index, node)
    }

    fn clone_slot(&mut self, index: usize) -> Result<StateHandle, Error> {
        let (name, clip, parent) = {
            let parent_slot = self
                .slots
                .entry(index)
                .ok_or(Error::InvalidHandle { index })?;
            (
                format!("{} (queued)", parent_slot.name),
                parent_slot.clip.clone(),
                StateHandle::new(index, parent_slot.node),
            )
        };
        let clone = self.do_add_clip(name, &clip);
        if let Some(slot) = self.slots.entry_mut(clone.index()) {
            slot.set_as_clone_of(parent);
        }
        log::debug!("cloned slot {index} into {}", clone.index());
        Ok(clone)
    }

    fn enqueue(&mut self, target: StateHandle, fade_duration: f32) {
        self.queue.push_back(QueuedTransition {
            target,
            fade_duration,
        });
    }

    fn prune_queue(&mut self) {
        let queue = std::mem::take(&mut self.queue);
        let live = queue
            .into_iter()
            .filter(|entry| self.resolve(entry.target).is_ok())
            .collect::<VecDeque<_>>();
        self.queue = live;
    }

    fn is_clone_of(&self, slot: &Slot, parent_index: usize) -> bool {
        slot.is_clone
            && slot.parent.is_some_and(|parent| {
                parent.index() == parent_index && self.resolve(parent).is_ok()
            })
    }

    fn play_index(&mut self, index: usize) {
        for i in 0..self.slots.len() {
            if i == index {
                if let Some(slot) = self.slots.entry_mut(i) {
                    slot.enable();
                    slot.force_weight(1.0);
                }
            } else {
                self.do_stop(i, Some(index));
            }
        }
    }

    fn crossfade_index(&mut self, index: usize, duration: f32) {
        for slot in self.slots.iter_mut() {
            if slot.index == index {
                slot.enable();
            }
            if !slot.enabled {
                continue;
            }
            let target = if slot.index == index { 1.0 } else { 0.0 };
            slot.setup_lerp(target, duration);
        }
    }

    /// Stops a slot through the facade: a top-level slot also takes its clones down, except
    /// `spare`.
    fn do_stop(&mut self, index: usize, spare: Option<usize>) {
        let Some(slot) = self.slots.entry(index) else {
            return;
        };
        let is_clone = slot.is_clone;
        self.stop_slot(index);
        if !is_clone {
            self.remove_clones(index, spare);
        }
    }

    fn remove_clones(&mut self, parent_index: usize, spare: Option<usize>) {
        let clones = self
            .slots
            .iter()
            .filter(|slot| Some(slot.index) != spare && self.is_clone_of(slot, parent_index))
            .map(|slot| slot.index)
            .collect::<Vec<_>>();
        for index in clones {
            self.stop_slot(index);
        }
    }

    /// Resets a slot to stopped. Clones are disabled, dropped from the queue and left for the
    /// end-of-tick cleanup.
    fn stop_slot(&mut self, index: usize) {
        let Some(slot) = self.slots.entry_mut(index) else {
            return;
        };
        slot.reset_stopped();
        let node = slot.node;
        if slot.is_clone {
            slot.ready_for_cleanup = true;
            self.queue.retain(|entry| entry.target.index() != index);
        }
        self.backend.set_time(node, 0.0);
        self.backend.set_done(node, false);
        self.backend.pause(node);
    }

    fn remove_slot(&mut self, index: usize) {
        let removed = self.slots.remove_at(index, &mut self.backend);
        if removed.is_some_and(|slot| slot.enabled) {
            self.weights_dirty = true;
        }
    }

    fn disconnect_input(&mut self, index: usize) {
        if self.backend.input(index).is_some() {
            self.backend.disconnect(index);
        }
    }

    /// Longest time any enabled slot still needs to reach the end of its clip. Infinite as soon
    /// as one slot loops, `-inf` when nothing is enabled.
    fn remaining_time(&self) -> f32 {
        let mut longest = f32::NEG_INFINITY;
        for slot in self.slots.iter() {
            if !slot.enabled || !self.backend.is_node_valid(slot.node) {
                continue;
            }
            if slot.wrap_mode == WrapMode::Loop {
                return f32::INFINITY;
            }
            let speed = self.backend.speed(slot.node);
            let time = self.state_time(slot.index);
            let remaining = if speed > 0.0 {
                (slot.clip.length - time) / speed
            } else if speed < 0.0 {
                time / speed
            } else {
                f32::INFINITY
            };
            longest = longest.max(remaining);
        }
        longest
    }

    fn update_queue(&mut self) {
        let mut remaining: Option<f32> = None;
        while let Some(entry) = self.queue.front().copied() {
            if self.resolve(entry.target).is_err() {
                self.queue.pop_front();
                continue;
            }
            let remaining_time = *remaining.get_or_insert_with(|| self.remaining_time());
            if entry.fade_duration < remaining_time {
                break;
            }
            self.queue.pop_front();
            log::debug!(
                "firing queued transition to slot {} (fade {}s, remaining {}s)",
                entry.target.index(),
                entry.fade_duration,
                remaining_time
            );
            self.crossfade_index(entry.target.index(), entry.fade_duration);
            remaining = None;
        }
    }

    fn update_slots(&mut self, delta: f32) {
        let mut must_update_weights = std::mem::take(&mut self.weights_dirty);
        let mut total_weight = 0.0;

        for index in 0..self.slots.len() {
            let faded_out = match self.slots.entry_mut(index) {
                None => continue,
                Some(slot) if slot.enabled && slot.fading => {
                    slot.step_fade(delta) == FadeStep::Reached(0.0)
                }
                Some(_) => false,
            };
            if faded_out {
                log::trace!("slot {index} faded out");
                self.stop_slot(index);
            }

            if self.finished_once(index) {
                log::trace!("slot {index} reached its end");
                self.stop_slot(index);
            }

            self.reconcile_connection(index);

            if let Some(slot) = self.slots.entry_mut(index) {
                if slot.enabled {
                    total_weight += slot.weight;
                }
                if slot.weight_dirty || slot.enabled_dirty {
                    must_update_weights = true;
                }
                slot.reset_dirty_flags();
            }
        }

        if must_update_weights {
            for slot in self.slots.iter_mut() {
                slot.mix_weight = if slot.enabled && total_weight > 0.0 {
                    slot.weight / total_weight
                } else {
                    0.0
                };
                self.backend.set_input_weight(slot.index, slot.mix_weight);
            }
        }
    }

    /// Applies a pending enable/disable to the node and, when stopped slots are not kept
    /// connected, to the mix.
    fn reconcile_connection(&mut self, index: usize) {
        let keep = self.config.keep_stopped_connected;
        let Some(slot) = self.slots.entry(index) else {
            return;
        };
        if !slot.enabled_dirty {
            return;
        }
        let (node, enabled) = (slot.node, slot.enabled);
        if enabled {
            self.backend.play(node);
        } else {
            self.backend.pause(node);
        }
        if keep {
            return;
        }
        let connected = self.backend.input(index) == Some(node);
        if enabled && !connected {
            self.backend.connect(node, index, 0.0);
        } else if !enabled && connected {
            self.backend.disconnect(index);
        }
    }

    fn finished_once(&self, index: usize) -> bool {
        let Some(slot) = self.slots.entry(index) else {
            return false;
        };
        if !slot.enabled || slot.wrap_mode != WrapMode::Once {
            return false;
        }
        let node = slot.node;
        let speed = self.backend.speed(node);
        let time = self.state_time(index);
        let duration = self.backend.duration(node);
        self.backend.is_done(node) || (speed < 0.0 && time < 0.0) || (speed >= 0.0 && time >= duration)
    }

    fn update_done_status(&mut self) {
        if self.is_playing() {
            self.done = false;
            return;
        }
        if self.done {
            return;
        }
        self.done = true;
        let Some(mut listener) = self.listener.take() else {
            return;
        };
        listener.on_done(self);
        if self.listener.is_none() {
            self.listener = Some(listener);
        }
    }

    fn clean_clones(&mut self) {
        for index in (0..self.slots.len()).rev() {
            let finished = self
                .slots
                .entry(index)
                .is_some_and(|slot| slot.ready_for_cleanup && !slot.enabled);
            if finished {
                log::debug!("destroying finished clone in slot {index}");
                self.remove_slot(index);
            }
        }
        self.prune_queue();
    }
}

fn check_duration(duration: f32, operation: &str) -> Result<(), Error> {
    if !duration.is_finite() || duration < 0.0 {
        return Err(Error::InvalidValue {
            message: "fade duration must be finite and >= 0".to_string(),
        }
        .reported(operation));
    }
    Ok(())
}
