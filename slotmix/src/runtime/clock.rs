use super::playback::{NodeId, PlaybackBackend};
use crate::ClipRef;

#[derive(Clone, Debug)]
struct ClockNode {
    clip: ClipRef,
    time: f32,
    speed: f32,
    playing: bool,
    duration: f32,
    done: bool,
}

#[derive(Debug)]
struct NodeSlot {
    generation: u32,
    node: Option<ClockNode>,
}

#[derive(Clone, Copy, Debug)]
struct MixInput {
    node: NodeId,
    weight: f32,
}

/// Reference backend: nodes are plain clocks, the mix is a list of weighted inputs.
///
/// Useful for headless hosts and tests; a real renderer supplies its own [`PlaybackBackend`].
#[derive(Debug, Default)]
pub struct LocalClock {
    nodes: Vec<NodeSlot>,
    free_list: Vec<usize>,
    inputs: Vec<Option<MixInput>>,
    evaluations: u64,
}

impl LocalClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `evaluate` calls so far, including zero-delta samples.
    pub fn evaluations(&self) -> u64 {
        self.evaluations
    }

    pub fn live_nodes(&self) -> usize {
        self.nodes.iter().filter(|slot| slot.node.is_some()).count()
    }

    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_input_connected(&self, input: usize) -> bool {
        matches!(self.inputs.get(input), Some(Some(_)))
    }

    /// Weight of a connected input; `None` when nothing is connected there.
    pub fn input_weight(&self, input: usize) -> Option<f32> {
        self.inputs.get(input).copied().flatten().map(|i| i.weight)
    }

    pub fn node_clip(&self, node: NodeId) -> Option<&ClipRef> {
        self.node(node).map(|n| &n.clip)
    }

    fn node(&self, id: NodeId) -> Option<&ClockNode> {
        let slot = self.nodes.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_ref()
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut ClockNode> {
        let slot = self.nodes.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_mut()
    }
}

impl PlaybackBackend for LocalClock {
    fn create_node(&mut self, clip: &ClipRef) -> NodeId {
        let node = ClockNode {
            clip: clip.clone(),
            time: 0.0,
            speed: 1.0,
            playing: true,
            duration: f32::INFINITY,
            done: false,
        };
        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.nodes[index];
            slot.node = Some(node);
            NodeId {
                index: index as u32,
                generation: slot.generation,
            }
        } else {
            let index = self.nodes.len();
            self.nodes.push(NodeSlot {
                generation: 0,
                node: Some(node),
            });
            NodeId {
                index: index as u32,
                generation: 0,
            }
        }
    }

    fn destroy_node(&mut self, node: NodeId) {
        let Some(slot) = self.nodes.get_mut(node.index as usize) else {
            return;
        };
        if slot.generation != node.generation || slot.node.is_none() {
            return;
        }
        slot.node = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(node.index as usize);
        for input in &mut self.inputs {
            if input.is_some_and(|i| i.node == node) {
                *input = None;
            }
        }
    }

    fn is_node_valid(&self, node: NodeId) -> bool {
        self.node(node).is_some()
    }

    fn connect(&mut self, node: NodeId, input: usize, weight: f32) {
        if !self.is_node_valid(node) {
            return;
        }
        if input >= self.inputs.len() {
            self.inputs.resize(input + 1, None);
        }
        self.inputs[input] = Some(MixInput { node, weight });
    }

    fn disconnect(&mut self, input: usize) {
        if let Some(slot) = self.inputs.get_mut(input) {
            *slot = None;
        }
    }

    fn input(&self, input: usize) -> Option<NodeId> {
        self.inputs.get(input).copied().flatten().map(|i| i.node)
    }

    fn set_input_weight(&mut self, input: usize, weight: f32) {
        if let Some(Some(slot)) = self.inputs.get_mut(input) {
            slot.weight = weight;
        }
    }

    fn time(&self, node: NodeId) -> f32 {
        self.node(node).map(|n| n.time).unwrap_or(0.0)
    }

    fn set_time(&mut self, node: NodeId, time: f32) {
        if let Some(n) = self.node_mut(node) {
            n.time = time;
        }
    }

    fn speed(&self, node: NodeId) -> f32 {
        self.node(node).map(|n| n.speed).unwrap_or(0.0)
    }

    fn set_speed(&mut self, node: NodeId, speed: f32) {
        if let Some(n) = self.node_mut(node) {
            n.speed = speed;
        }
    }

    fn play(&mut self, node: NodeId) {
        if let Some(n) = self.node_mut(node) {
            n.playing = true;
        }
    }

    fn pause(&mut self, node: NodeId) {
        if let Some(n) = self.node_mut(node) {
            n.playing = false;
        }
    }

    fn is_playing(&self, node: NodeId) -> bool {
        self.node(node).is_some_and(|n| n.playing)
    }

    fn duration(&self, node: NodeId) -> f32 {
        self.node(node).map(|n| n.duration).unwrap_or(0.0)
    }

    fn set_duration(&mut self, node: NodeId, duration: f32) {
        if let Some(n) = self.node_mut(node) {
            n.duration = duration;
        }
    }

    fn is_done(&self, node: NodeId) -> bool {
        self.node(node).is_some_and(|n| n.done)
    }

    fn set_done(&mut self, node: NodeId, done: bool) {
        if let Some(n) = self.node_mut(node) {
            n.done = done;
        }
    }

    fn evaluate(&mut self, delta: f32) {
        self.evaluations += 1;
        if !delta.is_finite() || delta <= 0.0 {
            return;
        }
        for slot in &mut self.nodes {
            let Some(node) = slot.node.as_mut() else {
                continue;
            };
            if !node.playing {
                continue;
            }
            node.time += delta * node.speed;
            if node.duration.is_finite() && node.time >= node.duration {
                node.done = true;
            }
        }
    }
}
