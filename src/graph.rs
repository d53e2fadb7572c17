//! Audio graph - owns nodes, message queues and the frame clock

use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dasp_graph::{Buffer, Input, NodeData, Processor};
use hashbrown::HashMap;
use petgraph::stable_graph::{NodeIndex, StableGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use rtrb::{Consumer, Producer, RingBuffer};

use crate::node::{AudioNode, NodeId, ProcessContext};

/// Samples per block, fixed by dasp_graph's `Buffer`
pub const BLOCK_SIZE: usize = Buffer::LEN;

/// Internal handle to send messages to a node in an AudioGraph
pub(crate) struct NodeHandle<M: Send + 'static> {
    pub(crate) id: NodeId,
    pub(crate) sender: Producer<M>,
    pub(crate) _marker: PhantomData<M>,
}

impl<M: Send + 'static> NodeHandle<M> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Queue a message for the node, handing it back if the queue is full
    pub fn send(&mut self, msg: M) -> Result<(), M> {
        self.sender.push(msg).map_err(|rtrb::PushError::Full(m)| m)
    }
}

// Type-erased wrapper so we can store heterogeneous nodes
trait ErasedNode: Send {
    fn process_erased(&mut self, ctx: &ProcessContext, inputs: &[Input], outputs: &mut [Buffer]);
}

struct NodeWrapper<N: AudioNode> {
    node: N,
    receiver: Consumer<N::Message>,
}

impl<N: AudioNode> ErasedNode for NodeWrapper<N> {
    fn process_erased(&mut self, ctx: &ProcessContext, inputs: &[Input], outputs: &mut [Buffer]) {
        // Split borrow to avoid conflict between receiver and node
        let receiver = &mut self.receiver;
        let node = &mut self.node;

        let messages = core::iter::from_fn(|| receiver.pop().ok());
        node.process(ctx, messages, inputs, outputs);
    }
}

// Adapter for dasp_graph
struct DaspAdapter {
    node: Box<dyn ErasedNode>,
    sample_rate: u32,
    clock: Arc<AtomicU64>,
}

impl dasp_graph::Node for DaspAdapter {
    fn process(&mut self, inputs: &[Input], outputs: &mut [Buffer]) {
        let ctx = ProcessContext {
            sample_rate: self.sample_rate,
            buffer_size: BLOCK_SIZE,
            frame: self.clock.load(Ordering::Relaxed),
        };
        self.node.process_erased(&ctx, inputs, outputs);
    }
}

type InnerGraph = StableGraph<NodeData<DaspAdapter>, ()>;

/// An audio processing graph at a fixed sample rate.
///
/// Nodes live in a stable graph so sources can be removed and replaced while
/// the ids of every other node stay valid.
pub(crate) struct AudioGraph {
    graph: InnerGraph,
    processor: Processor<InnerGraph>,
    sample_rate: u32,

    /// Frame index of the next block to be processed
    clock: Arc<AtomicU64>,

    node_indices: HashMap<NodeId, NodeIndex>,
    next_node_id: u32,

    terminal: Option<NodeIndex>,
}

impl AudioGraph {
    /// Create a new graph with the given sample rate
    pub fn new(sample_rate: u32) -> Self {
        Self {
            graph: InnerGraph::with_capacity(64, 64),
            processor: Processor::with_capacity(64),
            sample_rate,
            clock: Arc::new(AtomicU64::new(0)),
            node_indices: HashMap::new(),
            next_node_id: 0,
            terminal: None,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Frames rendered so far; also the start frame of the next block
    pub fn frames_processed(&self) -> u64 {
        self.clock.load(Ordering::Relaxed)
    }

    /// Add a node, returns a handle for sending messages
    pub fn add<N: AudioNode>(&mut self, node: N) -> NodeHandle<N::Message> {
        self.add_with_queue_size(node, 256)
    }

    /// Add a node with a custom message queue size
    pub fn add_with_queue_size<N: AudioNode>(&mut self, node: N, queue_size: usize) -> NodeHandle<N::Message> {
        let id = NodeId(self.next_node_id);
        self.next_node_id += 1;

        let (producer, consumer) = RingBuffer::new(queue_size);

        let num_outputs = node.num_outputs();
        let wrapper = NodeWrapper { node, receiver: consumer };
        let adapter = DaspAdapter {
            node: Box::new(wrapper),
            sample_rate: self.sample_rate,
            clock: Arc::clone(&self.clock),
        };

        let node_data = match num_outputs {
            // 0 outputs = sink, but dasp_graph still needs a buffer for inputs
            0 | 1 => NodeData::new1(adapter),
            2 => NodeData::new2(adapter),
            n => NodeData::new(adapter, (0..n).map(|_| Buffer::default()).collect()),
        };

        let idx = self.graph.add_node(node_data);
        self.node_indices.insert(id, idx);

        NodeHandle {
            id,
            sender: producer,
            _marker: PhantomData,
        }
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.node_indices.contains_key(&id)
    }

    /// Connect output of `from` to input of `to`
    ///
    /// Returns false if either node is unknown.
    pub fn connect(&mut self, from: NodeId, to: NodeId) -> bool {
        let (Some(&from_idx), Some(&to_idx)) = (self.node_indices.get(&from), self.node_indices.get(&to)) else {
            return false;
        };
        if self.graph.find_edge(from_idx, to_idx).is_none() {
            self.graph.add_edge(from_idx, to_idx, ());
        }
        true
    }

    /// Remove every outgoing connection of `id`
    pub fn disconnect_outputs(&mut self, id: NodeId) {
        let Some(&idx) = self.node_indices.get(&id) else {
            return;
        };
        let edges: Vec<_> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| e.id())
            .collect();
        for edge in edges {
            self.graph.remove_edge(edge);
        }
    }

    /// Remove a node and all of its connections
    pub fn remove(&mut self, id: NodeId) -> bool {
        let Some(idx) = self.node_indices.remove(&id) else {
            return false;
        };
        if self.terminal == Some(idx) {
            self.terminal = None;
        }
        self.graph.remove_node(idx).is_some()
    }

    /// Set which node to process to (typically a sink)
    pub fn set_terminal(&mut self, id: NodeId) {
        self.terminal = self.node_indices.get(&id).copied();
    }

    /// Process one block of audio through the graph and advance the clock
    pub fn process(&mut self) {
        if let Some(terminal) = self.terminal {
            self.processor.process(&mut self.graph, terminal);
        }
        self.clock.fetch_add(BLOCK_SIZE as u64, Ordering::Relaxed);
    }
}
