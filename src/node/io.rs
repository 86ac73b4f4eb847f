use super::{Node, NodeRef};
use crate::error::RuntimeError;
use crate::vm::{Delivery, NodeState, OutputPort};

/// Feeds its data, one line per tick, to its single output.
pub struct InputNode {
    lines: Vec<String>,
    next: usize,
    blocked: bool,
    outputs: Vec<NodeRef>,
}

impl InputNode {
    pub fn new(data: &str) -> Self {
        InputNode {
            lines: data.lines().map(String::from).collect(),
            next: 0,
            blocked: false,
            outputs: Vec::new(),
        }
    }

    /// Replaces the data and rewinds.
    pub fn set_data(&mut self, data: &str) {
        self.lines = data.lines().map(String::from).collect();
        self.next = 0;
        self.blocked = false;
    }
}

impl Node for InputNode {
    fn state(&self) -> NodeState {
        match (self.next < self.lines.len(), self.blocked) {
            (false, _) => NodeState::Idle,
            (true, false) => NodeState::Running,
            (true, true) => NodeState::Blocked,
        }
    }

    fn push_input(&mut self, _line: &str) -> bool {
        false
    }

    fn step_line(&mut self) -> Result<(), RuntimeError> {
        let Some(line) = self.lines.get(self.next) else {
            return Ok(());
        };
        self.blocked = self.outputs.deliver(0, line) != Delivery::Accepted;
        if !self.blocked {
            self.next += 1;
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.next = 0;
        self.blocked = false;
    }

    fn output_nodes(&self) -> &[NodeRef] {
        &self.outputs
    }

    fn connect(&mut self, outputs: Vec<NodeRef>) {
        self.outputs = outputs;
    }
}

/// Collects every line it receives; never refuses.
#[derive(Default)]
pub struct OutputNode {
    buffer: String,
}

impl OutputNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn output(&self) -> &str {
        &self.buffer
    }
}

impl Node for OutputNode {
    fn state(&self) -> NodeState {
        NodeState::Idle
    }

    fn push_input(&mut self, line: &str) -> bool {
        self.buffer.push_str(line);
        self.buffer.push('\n');
        true
    }

    fn step_line(&mut self) -> Result<(), RuntimeError> {
        Ok(())
    }

    fn reset(&mut self) {
        self.buffer.clear();
    }

    fn output_nodes(&self) -> &[NodeRef] {
        &[]
    }

    fn connect(&mut self, _outputs: Vec<NodeRef>) {}
}

/// Merges several producers into one consumer through a one-line slot.
#[derive(Default)]
pub struct CombinerNode {
    pending: Option<String>,
    blocked: bool,
    outputs: Vec<NodeRef>,
}

impl CombinerNode {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Node for CombinerNode {
    fn state(&self) -> NodeState {
        match (&self.pending, self.blocked) {
            (None, _) => NodeState::Idle,
            (Some(_), false) => NodeState::Running,
            (Some(_), true) => NodeState::Blocked,
        }
    }

    fn push_input(&mut self, line: &str) -> bool {
        if self.pending.is_some() {
            return false;
        }
        self.pending = Some(line.to_string());
        true
    }

    fn step_line(&mut self) -> Result<(), RuntimeError> {
        if let Some(line) = &self.pending {
            self.blocked = self.outputs.deliver(0, line) != Delivery::Accepted;
            if !self.blocked {
                self.pending = None;
            }
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.pending = None;
        self.blocked = false;
    }

    fn output_nodes(&self) -> &[NodeRef] {
        &self.outputs
    }

    fn connect(&mut self, outputs: Vec<NodeRef>) {
        self.outputs = outputs;
    }
}
