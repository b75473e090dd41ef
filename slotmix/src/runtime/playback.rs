use crate::ClipRef;

/// Identity of a playback node owned by a backend.
///
/// The generation changes every time an arena position is reused, so a stale id never aliases a
/// newer node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId {
    pub index: u32,
    pub generation: u32,
}

/// Capability the mixer needs from an evaluation backend.
///
/// A node advances its own local time and applies its clip; the backend owns a mix whose indexed
/// inputs carry one node each. The mixer never samples curves itself.
pub trait PlaybackBackend {
    fn create_node(&mut self, clip: &ClipRef) -> NodeId;
    fn destroy_node(&mut self, node: NodeId);
    fn is_node_valid(&self, node: NodeId) -> bool;

    /// Connects `node` into mix input `input`, growing the mix if needed.
    fn connect(&mut self, node: NodeId, input: usize, weight: f32);
    fn disconnect(&mut self, input: usize);
    /// Node currently connected at `input`, if any.
    fn input(&self, input: usize) -> Option<NodeId>;
    fn set_input_weight(&mut self, input: usize, weight: f32);

    fn time(&self, node: NodeId) -> f32;
    fn set_time(&mut self, node: NodeId, time: f32);
    fn speed(&self, node: NodeId) -> f32;
    fn set_speed(&mut self, node: NodeId, speed: f32);
    fn play(&mut self, node: NodeId);
    fn pause(&mut self, node: NodeId);
    fn is_playing(&self, node: NodeId) -> bool;

    fn duration(&self, node: NodeId) -> f32;
    fn set_duration(&mut self, node: NodeId, duration: f32);
    fn is_done(&self, node: NodeId) -> bool;
    fn set_done(&mut self, node: NodeId, done: bool);

    /// Advances playing nodes by `delta` seconds and applies the weighted mix.
    /// `delta == 0.0` re-applies the current state without moving time.
    fn evaluate(&mut self, delta: f32);
}
