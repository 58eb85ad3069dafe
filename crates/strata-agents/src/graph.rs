//! The run as data: nodes, edges and a small scheduler that executes them.
//!
//! Ready nodes run concurrently on a `JoinSet`. Each node sees a snapshot
//! of the state taken when it starts and returns a [`StatePatch`]; patches
//! are merged one at a time by the scheduler loop before any successor's
//! in-degree is decremented, so a node never starts before every
//! predecessor's contribution is visible.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use strata_models::{GroupId, RunState, StatePatch};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::error::AgentError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeId {
    Initializer,
    Group(GroupId),
    Join,
    FinalSynthesis,
    Review,
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeId::Initializer => f.write_str("initializer"),
            NodeId::Group(group) => f.write_str(group.node_name()),
            NodeId::Join => f.write_str("join"),
            NodeId::FinalSynthesis => f.write_str("final_synthesizer"),
            NodeId::Review => f.write_str("review"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskGraph {
    nodes: Vec<NodeId>,
    edges: Vec<(NodeId, NodeId)>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// `initializer -> {market, financial, sectoral, external} -> join -> strategy -> final_synthesizer [-> review]`
    pub fn standard(review: bool) -> Self {
        let mut graph = Self::new();
        graph.add_node(NodeId::Initializer);
        for group in GroupId::FIRST_TIER {
            graph.add_node(NodeId::Group(group));
            graph.add_edge(NodeId::Initializer, NodeId::Group(group));
        }
        graph.add_node(NodeId::Join);
        for group in GroupId::FIRST_TIER {
            graph.add_edge(NodeId::Group(group), NodeId::Join);
        }
        graph.add_node(NodeId::Group(GroupId::Strategy));
        graph.add_edge(NodeId::Join, NodeId::Group(GroupId::Strategy));
        graph.add_node(NodeId::FinalSynthesis);
        graph.add_edge(NodeId::Group(GroupId::Strategy), NodeId::FinalSynthesis);
        if review {
            graph.add_node(NodeId::Review);
            graph.add_edge(NodeId::FinalSynthesis, NodeId::Review);
        }
        graph
    }

    pub fn add_node(&mut self, node: NodeId) {
        self.nodes.push(node);
    }

    pub fn add_edge(&mut self, from: NodeId, to: NodeId) {
        self.edges.push((from, to));
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub fn edges(&self) -> &[(NodeId, NodeId)] {
        &self.edges
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains(&node)
    }

    pub fn successors(&self, node: NodeId) -> Vec<NodeId> {
        self.edges
            .iter()
            .filter(|(from, _)| *from == node)
            .map(|(_, to)| *to)
            .collect()
    }

    pub fn predecessors(&self, node: NodeId) -> Vec<NodeId> {
        self.edges
            .iter()
            .filter(|(_, to)| *to == node)
            .map(|(from, _)| *from)
            .collect()
    }

    /// Reject duplicate nodes, edges to undeclared nodes and cycles.
    pub fn validate(&self) -> Result<(), AgentError> {
        let mut seen = HashSet::new();
        for node in &self.nodes {
            if !seen.insert(*node) {
                return Err(AgentError::Graph(format!("node {node} declared twice")));
            }
        }
        for (from, to) in &self.edges {
            for endpoint in [from, to] {
                if !seen.contains(endpoint) {
                    return Err(AgentError::Graph(format!(
                        "edge {from} -> {to} references unknown node {endpoint}"
                    )));
                }
            }
        }
        self.layers().map(|_| ())
    }

    /// Topological layers (Kahn's algorithm): every node appears one layer
    /// after its last predecessor.
    pub fn layers(&self) -> Result<Vec<Vec<NodeId>>, AgentError> {
        let mut in_degree = self.in_degrees();
        let mut current: Vec<NodeId> = self
            .nodes
            .iter()
            .copied()
            .filter(|node| in_degree.get(node) == Some(&0))
            .collect();

        let mut layers = Vec::new();
        let mut placed = 0usize;
        while !current.is_empty() {
            placed += current.len();
            let mut next = Vec::new();
            for node in &current {
                for successor in self.successors(*node) {
                    if let Some(degree) = in_degree.get_mut(&successor) {
                        *degree -= 1;
                        if *degree == 0 {
                            next.push(successor);
                        }
                    }
                }
            }
            layers.push(current);
            current = next;
        }

        if placed != self.nodes.len() {
            return Err(AgentError::Graph("graph contains a cycle".to_string()));
        }
        Ok(layers)
    }

    fn in_degrees(&self) -> HashMap<NodeId, usize> {
        let mut in_degree: HashMap<NodeId, usize> =
            self.nodes.iter().map(|node| (*node, 0)).collect();
        for (_, to) in &self.edges {
            if let Some(degree) = in_degree.get_mut(to) {
                *degree += 1;
            }
        }
        in_degree
    }
}

/// Executes a single node against a state snapshot. Mockable for testing.
#[async_trait]
pub trait NodeRunner: Send + Sync {
    async fn run_node(&self, node: NodeId, snapshot: Arc<RunState>) -> StatePatch;
}

/// Run every node of `graph` once, respecting edges, and return the final state.
///
/// A node that panics contributes an empty patch. Cancelling `cancel`
/// aborts in-flight nodes and returns [`AgentError::Cancelled`].
pub async fn execute(
    graph: &TaskGraph,
    runner: Arc<dyn NodeRunner>,
    mut state: RunState,
    cancel: CancellationToken,
) -> Result<RunState, AgentError> {
    graph.validate()?;
    let start = Instant::now();

    let mut in_degree = graph.in_degrees();
    let mut ready: VecDeque<NodeId> = graph
        .nodes()
        .iter()
        .copied()
        .filter(|node| in_degree.get(node) == Some(&0))
        .collect();

    let mut running: JoinSet<(NodeId, StatePatch)> = JoinSet::new();
    let mut completed = 0usize;

    loop {
        while let Some(node) = ready.pop_front() {
            let snapshot = Arc::new(state.clone());
            let runner = Arc::clone(&runner);
            let token = cancel.child_token();
            debug!(node = %node, "Node scheduled");
            running.spawn(async move {
                let inner = tokio::spawn(async move {
                    tokio::select! {
                        patch = runner.run_node(node, snapshot) => patch,
                        _ = token.cancelled() => StatePatch::default(),
                    }
                });
                match inner.await {
                    Ok(patch) => (node, patch),
                    Err(e) => {
                        error!(node = %node, error = %e, "Node task panicked");
                        (node, StatePatch::default())
                    }
                }
            });
        }

        let joined = tokio::select! {
            _ = cancel.cancelled() => {
                running.abort_all();
                info!(completed, "Run cancelled");
                return Err(AgentError::Cancelled);
            }
            joined = running.join_next() => joined,
        };

        let Some(result) = joined else { break };
        let (node, patch) = match result {
            Ok(done) => done,
            Err(e) if e.is_cancelled() => return Err(AgentError::Cancelled),
            Err(e) => return Err(AgentError::Graph(format!("scheduler task failed: {e}"))),
        };

        state.merge(patch);
        completed += 1;
        debug!(node = %node, completed, "Node merged");

        for successor in graph.successors(node) {
            if let Some(degree) = in_degree.get_mut(&successor) {
                *degree -= 1;
                if *degree == 0 {
                    ready.push_back(successor);
                }
            }
        }
    }

    if completed != graph.nodes().len() {
        return Err(AgentError::Graph(format!(
            "only {completed} of {} nodes ran",
            graph.nodes().len()
        )));
    }

    info!(nodes = completed, elapsed_ms = start.elapsed().as_millis(), "Graph complete");
    Ok(state)
}
