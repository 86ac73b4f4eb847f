//! The node graph: registration, wiring, execution order and the tick loop.
//!
//! A `Script` is edited as plain data (node descriptions plus an adjacency
//! list) and turned into live nodes by [`Script::compile_nodes`]. Any edit
//! after that drops the live graph, so [`Script::run`] needs a fresh compile.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::error::{NodeId, RuntimeError, ScriptError};
use crate::node::{CombinerNode, InputNode, NodeRef, OutputNode, RegularNode};
use crate::vm::NodeState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Input,
    Output,
    Combiner,
    Regular,
}

/// Limits for [`Script::run_with`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Stop after this many ticks. `None` runs until the graph settles.
    pub max_ticks: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every node is idle, panicked or blocked with no way forward.
    Finished,
    TickLimit,
}

enum NodeSpec {
    Input { data: String },
    Output,
    Combiner,
    Regular { source: String },
}

impl NodeSpec {
    fn kind(&self) -> NodeKind {
        match self {
            NodeSpec::Input { .. } => NodeKind::Input,
            NodeSpec::Output => NodeKind::Output,
            NodeSpec::Combiner => NodeKind::Combiner,
            NodeSpec::Regular { .. } => NodeKind::Regular,
        }
    }
}

/// A live node, keeping its concrete type for kind-specific queries.
enum Handle {
    Input(Rc<RefCell<InputNode>>),
    Output(Rc<RefCell<OutputNode>>),
    Combiner(Rc<RefCell<CombinerNode>>),
    Regular(Rc<RefCell<RegularNode>>),
}

impl Handle {
    fn as_node(&self) -> NodeRef {
        match self {
            Handle::Input(node) => node.clone(),
            Handle::Output(node) => node.clone(),
            Handle::Combiner(node) => node.clone(),
            Handle::Regular(node) => node.clone(),
        }
    }
}

struct Compiled {
    handles: Vec<Handle>,
    // Nodes reachable from the input, breadth first, each once
    order: Vec<NodeId>,
}

#[derive(Default)]
pub struct Script {
    specs: Vec<NodeSpec>,
    edges: Vec<Vec<NodeId>>,
    input: Option<NodeId>,
    output: Option<NodeId>,
    compiled: Option<Compiled>,
    runtime_errors: Vec<(NodeId, RuntimeError)>,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================
    // Registration
    // =========================================================

    /// Adds the script's input node. Each line of `data` becomes one message.
    pub fn add_input_node(&mut self, data: &str) -> Result<NodeId, ScriptError> {
        if self.input.is_some() {
            return Err(ScriptError::DuplicateInput);
        }
        let id = self.push(NodeSpec::Input { data: data.to_string() });
        self.input = Some(id);
        Ok(id)
    }

    pub fn add_output_node(&mut self) -> Result<NodeId, ScriptError> {
        if self.output.is_some() {
            return Err(ScriptError::DuplicateOutput);
        }
        let id = self.push(NodeSpec::Output);
        self.output = Some(id);
        Ok(id)
    }

    pub fn add_combiner_node(&mut self) -> NodeId {
        self.push(NodeSpec::Combiner)
    }

    /// Adds a node running `source`. It is compiled by [`Script::compile_nodes`].
    pub fn add_regular_node(&mut self, source: &str) -> NodeId {
        self.push(NodeSpec::Regular { source: source.to_string() })
    }

    fn push(&mut self, spec: NodeSpec) -> NodeId {
        self.compiled = None;
        self.specs.push(spec);
        self.edges.push(Vec::new());
        self.specs.len() - 1
    }

    pub fn node_kind(&self, id: NodeId) -> Result<NodeKind, ScriptError> {
        self.specs.get(id).map(NodeSpec::kind).ok_or(ScriptError::InvalidNode(id))
    }

    /// Adds the edge `from -> to`. For a regular node, the n-th connection
    /// made is its PRINT channel `n`.
    pub fn connect_nodes(&mut self, from: NodeId, to: NodeId) -> Result<(), ScriptError> {
        let from_kind = self.node_kind(from)?;
        let to_kind = self.node_kind(to)?;

        if from == to {
            return Err(ScriptError::SelfConnection(from));
        }
        if to_kind == NodeKind::Input {
            return Err(ScriptError::IntoInput(to));
        }
        if from_kind == NodeKind::Output {
            return Err(ScriptError::FromOutput(from));
        }
        let targets = &mut self.edges[from];
        if targets.contains(&to) {
            return Err(ScriptError::DuplicateConnection { from, to });
        }
        if matches!(from_kind, NodeKind::Input | NodeKind::Combiner) && !targets.is_empty() {
            return Err(ScriptError::OutputTaken(from));
        }

        targets.push(to);
        self.compiled = None;
        Ok(())
    }

    /// Replaces the data of the input node `id`. A compiled graph keeps
    /// running with the new data from its first line.
    pub fn update_data(&mut self, id: NodeId, data: &str) -> Result<(), ScriptError> {
        match self.specs.get_mut(id) {
            Some(NodeSpec::Input { data: current }) => *current = data.to_string(),
            Some(_) => return Err(ScriptError::NotUpdatable(id)),
            None => return Err(ScriptError::InvalidNode(id)),
        }
        if let Some(Handle::Input(node)) = self.compiled.as_ref().and_then(|c| c.handles.get(id)) {
            node.borrow_mut().set_data(data);
        }
        Ok(())
    }

    // =========================================================
    // Compilation
    // =========================================================

    /// Compiles every regular node, wires the graph and derives the
    /// execution order.
    pub fn compile_nodes(&mut self) -> Result<(), ScriptError> {
        self.compiled = None;
        self.runtime_errors.clear();
        let input = self.input.ok_or(ScriptError::MissingInput)?;

        let mut handles = Vec::with_capacity(self.specs.len());
        for (id, spec) in self.specs.iter().enumerate() {
            let handle = match spec {
                NodeSpec::Input { data } => Handle::Input(Rc::new(RefCell::new(InputNode::new(data)))),
                NodeSpec::Output => Handle::Output(Rc::new(RefCell::new(OutputNode::new()))),
                NodeSpec::Combiner => Handle::Combiner(Rc::new(RefCell::new(CombinerNode::new()))),
                NodeSpec::Regular { source } => {
                    let chunk = crate::compile(source).map_err(|source| ScriptError::Compile { node: id, source })?;
                    tracing::debug!(node = id, bytes = chunk.code.len(), "compiled regular node");
                    Handle::Regular(Rc::new(RefCell::new(RegularNode::new(chunk))))
                }
            };
            handles.push(handle);
        }

        for (handle, targets) in handles.iter().zip(&self.edges) {
            let outputs = targets.iter().map(|&to| handles[to].as_node()).collect();
            handle.as_node().borrow_mut().connect(outputs);
        }

        let order = self.execution_order(input);
        tracing::debug!(nodes = handles.len(), reachable = order.len(), "graph compiled");
        self.compiled = Some(Compiled { handles, order });
        Ok(())
    }

    fn execution_order(&self, start: NodeId) -> Vec<NodeId> {
        let mut seen = vec![false; self.specs.len()];
        let mut queue = VecDeque::from([start]);
        let mut order = Vec::new();
        seen[start] = true;

        while let Some(id) = queue.pop_front() {
            order.push(id);
            for &next in &self.edges[id] {
                if !seen[next] {
                    seen[next] = true;
                    queue.push_back(next);
                }
            }
        }
        order
    }

    // =========================================================
    // Execution
    // =========================================================

    /// Runs until the graph settles.
    pub fn run(&mut self) -> Result<RunOutcome, ScriptError> {
        self.run_with(RunOptions::default())
    }

    /// Steps every reachable node once per tick, in execution order.
    ///
    /// The run finishes when a tick ends with no node running and either
    /// nothing blocked or every state unchanged since the previous tick.
    /// Runtime errors panic their node and are collected, not returned.
    pub fn run_with(&mut self, options: RunOptions) -> Result<RunOutcome, ScriptError> {
        let compiled = self.compiled.as_ref().ok_or(ScriptError::NotCompiled)?;
        let mut previous: Vec<NodeState> = Vec::new();
        let mut ticks = 0u64;

        loop {
            if options.max_ticks.is_some_and(|max| ticks >= max) {
                tracing::debug!(ticks, "tick limit reached");
                return Ok(RunOutcome::TickLimit);
            }
            ticks += 1;

            for &id in &compiled.order {
                let node = compiled.handles[id].as_node();
                let result = node.borrow_mut().step_line();
                if let Err(error) = result {
                    tracing::warn!(node = id, line = error.line, error = %error.kind, "node panicked");
                    self.runtime_errors.push((id, error));
                }
            }

            let states: Vec<NodeState> = compiled
                .order
                .iter()
                .map(|&id| compiled.handles[id].as_node().borrow().state())
                .collect();
            let running = states.contains(&NodeState::Running);
            let blocked = states.contains(&NodeState::Blocked);

            if !running && (!blocked || states == previous) {
                tracing::debug!(ticks, blocked, "run finished");
                return Ok(RunOutcome::Finished);
            }
            previous = states;
        }
    }

    /// Everything the output node has received so far.
    pub fn output(&self) -> String {
        match (self.compiled.as_ref(), self.output) {
            (Some(compiled), Some(id)) => match &compiled.handles[id] {
                Handle::Output(node) => node.borrow().output().to_string(),
                _ => String::new(),
            },
            _ => String::new(),
        }
    }

    /// Source line of the last instruction the regular node `id` started.
    pub fn current_line(&self, id: NodeId) -> Result<usize, ScriptError> {
        if self.node_kind(id)? != NodeKind::Regular {
            return Err(ScriptError::NotRegular(id));
        }
        let compiled = self.compiled.as_ref().ok_or(ScriptError::NotCompiled)?;
        match &compiled.handles[id] {
            Handle::Regular(node) => Ok(node.borrow().current_line()),
            _ => Err(ScriptError::NotRegular(id)),
        }
    }

    pub fn is_panicked(&self, id: NodeId) -> Result<bool, ScriptError> {
        if self.node_kind(id)? != NodeKind::Regular {
            return Err(ScriptError::NotRegular(id));
        }
        let compiled = self.compiled.as_ref().ok_or(ScriptError::NotCompiled)?;
        match &compiled.handles[id] {
            Handle::Regular(node) => Ok(node.borrow().is_panicked()),
            _ => Err(ScriptError::NotRegular(id)),
        }
    }

    /// Returns every node to its post-compile state and forgets runtime
    /// errors. Input data is replayed from its first line.
    pub fn reset(&mut self) {
        self.runtime_errors.clear();
        if let Some(compiled) = &self.compiled {
            for handle in &compiled.handles {
                handle.as_node().borrow_mut().reset();
            }
        }
    }

    /// Runtime errors since the last compile or reset, in the order raised.
    pub fn runtime_errors(&self) -> &[(NodeId, RuntimeError)] {
        &self.runtime_errors
    }
}
