mod clock;
mod handle;
mod mixer;
mod playback;
mod slot;
mod slot_table;

pub use clock::LocalClock;
pub use handle::{StateCursor, StateHandle};
pub use mixer::{Mixer, MixerListener, QueueMode, SlotSnapshot};
pub use playback::{NodeId, PlaybackBackend};
pub use slot::Slot;
pub use slot_table::SlotTable;

#[cfg(test)]
mod handle_tests;
