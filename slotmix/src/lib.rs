//! Weighted animation-slot multiplexer.
//!
//! A [`Mixer`] owns a pool of independently timed playback slots, normalizes their weights into
//! a single mix, and schedules instant switches, crossfades, blends and queued transitions between
//! them. Curve sampling and pose output live behind the [`PlaybackBackend`] capability; this crate
//! only starts, stops, times and weights playback nodes.

#![forbid(unsafe_code)]

mod config;
mod error;
mod model;
mod runtime;

pub use config::*;
pub use error::*;
pub use model::*;
pub use runtime::*;
