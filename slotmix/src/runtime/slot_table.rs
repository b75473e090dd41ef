use super::playback::PlaybackBackend;
use super::slot::Slot;
use crate::{ClipRef, Error};

/// Sparse slot storage. Removed positions stay as holes and are refilled first-fit, so a live
/// slot's index never moves.
#[derive(Debug, Default)]
pub struct SlotTable {
    slots: Vec<Option<Slot>>,
    count: usize,
    version: u64,
}

impl SlotTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of positions, holes included.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Number of live slots.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Bumped on every insert and removal.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Slot at `index`, or `None` for a hole. Indexing past [`len`](Self::len) is an error.
    pub fn get(&self, index: usize) -> Result<Option<&Slot>, Error> {
        match self.slots.get(index) {
            Some(slot) => Ok(slot.as_ref()),
            None => Err(Error::IndexOutOfRange {
                index,
                len: self.slots.len(),
            }),
        }
    }

    pub fn get_mut(&mut self, index: usize) -> Result<Option<&mut Slot>, Error> {
        let len = self.slots.len();
        match self.slots.get_mut(index) {
            Some(slot) => Ok(slot.as_mut()),
            None => Err(Error::IndexOutOfRange { index, len }),
        }
    }

    pub(crate) fn entry(&self, index: usize) -> Option<&Slot> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    pub(crate) fn entry_mut(&mut self, index: usize) -> Option<&mut Slot> {
        self.slots.get_mut(index).and_then(Option::as_mut)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Slot> {
        self.slots.iter().filter_map(Option::as_ref)
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Slot> {
        self.slots.iter_mut().filter_map(Option::as_mut)
    }

    /// First top-level slot carrying `name`. Clones never match.
    pub fn find_by_name(&self, name: &str) -> Option<&Slot> {
        self.iter().find(|slot| !slot.is_clone && slot.name == name)
    }

    /// Creates a slot and its playback node in the lowest free position.
    pub(crate) fn insert<B: PlaybackBackend>(
        &mut self,
        name: String,
        clip: &ClipRef,
        backend: &mut B,
    ) -> &mut Slot {
        let index = self
            .slots
            .iter()
            .position(Option::is_none)
            .unwrap_or(self.slots.len());
        let node = backend.create_node(clip);
        let slot = Slot::new(index, name, clip.clone(), node);
        if index == self.slots.len() {
            self.slots.push(None);
        }
        self.count += 1;
        self.version = self.version.wrapping_add(1);
        self.slots[index].insert(slot)
    }

    /// Removes the slot at `index`, disconnecting and destroying its node.
    pub(crate) fn remove_at<B: PlaybackBackend>(
        &mut self,
        index: usize,
        backend: &mut B,
    ) -> Option<Slot> {
        let removed = self.slots.get_mut(index)?.take()?;
        if backend.input(index) == Some(removed.node) {
            backend.disconnect(index);
        }
        backend.destroy_node(removed.node);
        self.count -= 1;
        self.version = self.version.wrapping_add(1);
        Some(removed)
    }
}
