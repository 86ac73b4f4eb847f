pub mod call;
pub mod debug;
pub mod env;
pub mod exec;
pub mod runtime;

pub use debug::disassemble;

use crate::compiler::Chunk;
use crate::value::Value;

pub const INPUT_SLOT: usize = 0;
pub const MEM_SLOT: usize = 1;
pub const INPUT_NAME: &str = "input";
pub const MEM_NAME: &str = "mem";

/// Scheduling state observed by the script driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Waiting for input; the only state in which input is accepted.
    Idle,
    Running,
    /// Parked on a PRINT whose target refused the line.
    Blocked,
}

/// Outcome of offering a line to an output channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Accepted,
    Rejected,
    Disconnected,
}

/// Where PRINT sends its lines.
pub trait OutputPort {
    fn deliver(&mut self, channel: i32, line: &str) -> Delivery;
}

pub struct Vm {
    chunk: Chunk,

    // Operand stack
    stack: Vec<Value>,

    // One entry per compiler slot; `None` until written
    variables: Vec<Option<Value>>,

    // Bytecode execution state
    pointer: usize,
    instruction_start: usize,
    state: NodeState,
    panicked: bool,
}

impl Vm {
    pub fn new(chunk: Chunk) -> Self {
        let mut vm = Self {
            variables: vec![None; chunk.slot_count()],
            chunk,
            stack: Vec::new(),
            pointer: 0,
            instruction_start: 0,
            state: NodeState::Idle,
            panicked: false,
        };
        vm.init_globals();
        vm
    }

    /// Starts an invocation with `line` bound to `input`.
    ///
    /// Refused unless the VM is idle and not panicked; the caller keeps the
    /// line and offers it again later.
    pub fn push_input(&mut self, line: &str) -> bool {
        if self.panicked || self.state != NodeState::Idle {
            return false;
        }
        self.set_slot(INPUT_SLOT, Value::Str(line.to_string()));
        self.pointer = 0;
        self.stack.clear();
        self.state = NodeState::Running;
        true
    }

    /// Back to the state right after construction, panic cleared.
    pub fn reset(&mut self) {
        self.state = NodeState::Idle;
        self.panicked = false;
        self.pointer = 0;
        self.instruction_start = 0;
        self.stack.clear();
        self.variables.iter_mut().for_each(|v| *v = None);
        self.init_globals();
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    pub fn is_panicked(&self) -> bool {
        self.panicked
    }

    /// Source line of the most recently started instruction.
    pub fn current_line(&self) -> usize {
        self.chunk.line_at(self.instruction_start)
    }

    /// Current value of a named variable, if it has one.
    #[cfg(test)]
    pub(crate) fn variable(&self, name: &str) -> Option<&Value> {
        let slot = self.chunk.variable_names.iter().position(|n| n == name)?;
        self.variables.get(slot)?.as_ref()
    }
}
