use super::{Node, NodeRef};
use crate::compiler::Chunk;
use crate::error::RuntimeError;
use crate::vm::{NodeState, Vm};

/// A node running a compiled script. PRINT channel `n` is `output_nodes()[n]`.
pub struct RegularNode {
    vm: Vm,
    outputs: Vec<NodeRef>,
}

impl RegularNode {
    pub fn new(chunk: Chunk) -> Self {
        RegularNode {
            vm: Vm::new(chunk),
            outputs: Vec::new(),
        }
    }

    pub fn current_line(&self) -> usize {
        self.vm.current_line()
    }

    pub fn is_panicked(&self) -> bool {
        self.vm.is_panicked()
    }
}

impl Node for RegularNode {
    fn state(&self) -> NodeState {
        self.vm.state()
    }

    fn push_input(&mut self, line: &str) -> bool {
        self.vm.push_input(line)
    }

    fn step_line(&mut self) -> Result<(), RuntimeError> {
        self.vm.step_line(&mut self.outputs)
    }

    fn reset(&mut self) {
        self.vm.reset();
    }

    fn output_nodes(&self) -> &[NodeRef] {
        &self.outputs
    }

    fn connect(&mut self, outputs: Vec<NodeRef>) {
        self.outputs = outputs;
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::node::OutputNode;

    #[test]
    fn prints_to_the_channel_index() {
        let chunk = crate::compile("PRINT 1, input;\nPRINT 0, \"done\";").unwrap();
        let first = Rc::new(RefCell::new(OutputNode::new()));
        let second = Rc::new(RefCell::new(OutputNode::new()));
        let mut node = RegularNode::new(chunk);
        node.connect(vec![first.clone() as NodeRef, second.clone() as NodeRef]);

        assert!(node.push_input("hello"));
        while node.state() != NodeState::Idle {
            node.step_line().unwrap();
        }
        assert_eq!(first.borrow().output(), "done\n");
        assert_eq!(second.borrow().output(), "hello\n");
        assert_eq!(node.output_nodes().len(), 2);
    }

    #[test]
    fn unconnected_channel_panics_the_node() {
        let chunk = crate::compile("PRINT 0, input;").unwrap();
        let mut node = RegularNode::new(chunk);
        node.push_input("x");
        let err = node.step_line().unwrap_err();
        assert_eq!(err.line, 1);
        assert!(node.is_panicked());
        assert!(!node.push_input("y"));
        node.reset();
        assert!(node.push_input("y"));
    }
}
