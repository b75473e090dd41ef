use super::mixer::Mixer;
use super::playback::{NodeId, PlaybackBackend};
use crate::{ClipRef, Error, WrapMode};

/// Reference to a slot by position and playback-node identity.
///
/// A handle stays usable across renames and unrelated inserts, and stops resolving once its slot
/// is removed, even if the position is later reused by another slot. Every accessor validates
/// first and returns [`Error::InvalidHandle`] instead of touching stale data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StateHandle {
    index: usize,
    node: NodeId,
}

impl StateHandle {
    pub(crate) fn new(index: usize, node: NodeId) -> Self {
        Self { index, node }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub(crate) fn node(&self) -> NodeId {
        self.node
    }

    pub fn is_valid<B: PlaybackBackend>(&self, mixer: &Mixer<B>) -> bool {
        mixer.resolve(*self).is_ok()
    }

    pub fn enabled<B: PlaybackBackend>(&self, mixer: &Mixer<B>) -> Result<bool, Error> {
        Ok(mixer.resolve(*self)?.enabled)
    }

    pub fn set_enabled<B: PlaybackBackend>(
        &self,
        mixer: &mut Mixer<B>,
        enabled: bool,
    ) -> Result<(), Error> {
        let slot = mixer.resolve_mut(*self)?;
        if enabled {
            slot.enable();
        } else {
            slot.disable();
        }
        Ok(())
    }

    pub fn time<B: PlaybackBackend>(&self, mixer: &Mixer<B>) -> Result<f32, Error> {
        mixer.resolve(*self)?;
        Ok(mixer.state_time(self.index))
    }

    /// Seeks the slot. Seeking at or past the end marks the node done; the slot itself only
    /// stops on the next tick.
    pub fn set_time<B: PlaybackBackend>(
        &self,
        mixer: &mut Mixer<B>,
        time: f32,
    ) -> Result<(), Error> {
        mixer.resolve(*self)?;
        mixer.set_state_time(self.index, time);
        Ok(())
    }

    pub fn normalized_time<B: PlaybackBackend>(&self, mixer: &Mixer<B>) -> Result<f32, Error> {
        let length = normalizing_length(self.length(mixer)?);
        Ok(mixer.state_time(self.index) / length)
    }

    pub fn set_normalized_time<B: PlaybackBackend>(
        &self,
        mixer: &mut Mixer<B>,
        normalized: f32,
    ) -> Result<(), Error> {
        let length = normalizing_length(self.length(mixer)?);
        mixer.set_state_time(self.index, normalized * length);
        Ok(())
    }

    pub fn speed<B: PlaybackBackend>(&self, mixer: &Mixer<B>) -> Result<f32, Error> {
        mixer.resolve(*self)?;
        Ok(mixer.backend().speed(self.node))
    }

    pub fn set_speed<B: PlaybackBackend>(
        &self,
        mixer: &mut Mixer<B>,
        speed: f32,
    ) -> Result<(), Error> {
        if speed.is_nan() {
            return Err(Error::InvalidValue {
                message: "speed must not be NaN".to_string(),
            });
        }
        mixer.resolve(*self)?;
        mixer.backend_mut().set_speed(self.node, speed);
        Ok(())
    }

    pub fn name<'a, B: PlaybackBackend>(&self, mixer: &'a Mixer<B>) -> Result<&'a str, Error> {
        Ok(mixer.resolve(*self)?.name.as_str())
    }

    /// Renames the slot. Existing handles, this one included, keep working.
    pub fn set_name<B: PlaybackBackend>(
        &self,
        mixer: &mut Mixer<B>,
        name: impl Into<String>,
    ) -> Result<(), Error> {
        let name = name.into();
        let is_clone = mixer.resolve(*self)?.is_clone;
        if !is_clone {
            let taken = mixer
                .slots()
                .find_by_name(&name)
                .is_some_and(|other| other.index != self.index);
            if taken {
                return Err(Error::DuplicateName { name });
            }
        }
        mixer.resolve_mut(*self)?.name = name;
        Ok(())
    }

    pub fn weight<B: PlaybackBackend>(&self, mixer: &Mixer<B>) -> Result<f32, Error> {
        Ok(mixer.resolve(*self)?.weight)
    }

    /// Sets the raw weight immediately, cancelling any fade in progress.
    pub fn set_weight<B: PlaybackBackend>(
        &self,
        mixer: &mut Mixer<B>,
        weight: f32,
    ) -> Result<(), Error> {
        if !weight.is_finite() || weight < 0.0 {
            return Err(Error::InvalidValue {
                message: "weights must be finite and >= 0".to_string(),
            });
        }
        mixer.resolve_mut(*self)?.force_weight(weight);
        Ok(())
    }

    pub fn target_weight<B: PlaybackBackend>(&self, mixer: &Mixer<B>) -> Result<f32, Error> {
        Ok(mixer.resolve(*self)?.target_weight)
    }

    pub fn is_fading<B: PlaybackBackend>(&self, mixer: &Mixer<B>) -> Result<bool, Error> {
        Ok(mixer.resolve(*self)?.fading)
    }

    /// Normalized weight pushed to the mix on the last tick.
    pub fn mix_weight<B: PlaybackBackend>(&self, mixer: &Mixer<B>) -> Result<f32, Error> {
        Ok(mixer.resolve(*self)?.mix_weight)
    }

    pub fn length<B: PlaybackBackend>(&self, mixer: &Mixer<B>) -> Result<f32, Error> {
        Ok(mixer.resolve(*self)?.clip.length)
    }

    pub fn clip<B: PlaybackBackend>(&self, mixer: &Mixer<B>) -> Result<ClipRef, Error> {
        Ok(mixer.resolve(*self)?.clip.clone())
    }

    pub fn wrap_mode<B: PlaybackBackend>(&self, mixer: &Mixer<B>) -> Result<WrapMode, Error> {
        Ok(mixer.resolve(*self)?.wrap_mode)
    }

    pub fn is_clone<B: PlaybackBackend>(&self, mixer: &Mixer<B>) -> Result<bool, Error> {
        Ok(mixer.resolve(*self)?.is_clone)
    }

    /// Slot this clone was made from, if it is a clone. The parent may since have been removed.
    pub fn parent<B: PlaybackBackend>(
        &self,
        mixer: &Mixer<B>,
    ) -> Result<Option<StateHandle>, Error> {
        Ok(mixer.resolve(*self)?.parent)
    }
}

fn normalizing_length(length: f32) -> f32 {
    if length == 0.0 { 1.0 } else { length }
}

/// Detached cursor over a mixer's live slots.
///
/// The cursor records the slot table's version when created; once any slot is inserted or
/// removed every call fails with [`Error::CollectionModified`].
#[derive(Clone, Copy, Debug)]
pub struct StateCursor {
    version: u64,
    position: Option<usize>,
}

impl StateCursor {
    pub(crate) fn new(version: u64) -> Self {
        Self {
            version,
            position: None,
        }
    }

    fn check<B: PlaybackBackend>(&self, mixer: &Mixer<B>) -> Result<(), Error> {
        if mixer.slots().version() != self.version {
            return Err(Error::CollectionModified);
        }
        Ok(())
    }

    /// Steps to the next live slot; `false` once past the last one.
    pub fn move_next<B: PlaybackBackend>(&mut self, mixer: &Mixer<B>) -> Result<bool, Error> {
        self.check(mixer)?;
        let slots = mixer.slots();
        let mut index = self.position.map_or(0, |p| p + 1);
        while index < slots.len() && slots.entry(index).is_none() {
            index += 1;
        }
        self.position = Some(index.min(slots.len()));
        Ok(index < slots.len())
    }

    pub fn current<B: PlaybackBackend>(&self, mixer: &Mixer<B>) -> Result<StateHandle, Error> {
        self.check(mixer)?;
        let slot = self
            .position
            .and_then(|index| mixer.slots().entry(index))
            .ok_or(Error::CursorOutOfRange)?;
        Ok(StateHandle::new(slot.index, slot.node))
    }

    pub fn reset<B: PlaybackBackend>(&mut self, mixer: &Mixer<B>) -> Result<(), Error> {
        self.check(mixer)?;
        self.position = None;
        Ok(())
    }
}
