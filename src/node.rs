//! Dataflow graph participants.
//!
//! Every node moves single lines of text. A producer offers a line with
//! [`Node::push_input`] and keeps it until the consumer accepts, so each
//! edge behaves as a mailbox of capacity one.

pub mod io;
pub mod regular;

use std::cell::RefCell;
use std::rc::Rc;

pub use io::{CombinerNode, InputNode, OutputNode};
pub use regular::RegularNode;

use crate::error::RuntimeError;
use crate::vm::{Delivery, NodeState, OutputPort};

pub type NodeRef = Rc<RefCell<dyn Node>>;

pub trait Node {
    fn state(&self) -> NodeState;

    /// Offers one line. `false` means "not now"; the caller retries later.
    fn push_input(&mut self, line: &str) -> bool;

    /// Advances the node by one scheduling tick.
    fn step_line(&mut self) -> Result<(), RuntimeError>;

    fn reset(&mut self);

    /// Successors, indexed by output channel.
    fn output_nodes(&self) -> &[NodeRef];

    fn connect(&mut self, outputs: Vec<NodeRef>);
}

impl OutputPort for Vec<NodeRef> {
    fn deliver(&mut self, channel: i32, line: &str) -> Delivery {
        let Some(target) = usize::try_from(channel).ok().and_then(|i| self.get(i)) else {
            return Delivery::Disconnected;
        };
        // A node already borrowed further up the call chain is busy.
        match target.try_borrow_mut() {
            Ok(mut node) => {
                if node.push_input(line) {
                    Delivery::Accepted
                } else {
                    Delivery::Rejected
                }
            }
            Err(_) => Delivery::Rejected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivery_through_a_port() {
        let out = Rc::new(RefCell::new(OutputNode::new()));
        let combiner = Rc::new(RefCell::new(CombinerNode::new()));
        let mut port: Vec<NodeRef> = vec![out.clone() as NodeRef, combiner.clone() as NodeRef];

        assert_eq!(port.deliver(0, "a"), Delivery::Accepted);
        assert_eq!(port.deliver(1, "b"), Delivery::Accepted);
        assert_eq!(port.deliver(1, "c"), Delivery::Rejected);
        assert_eq!(port.deliver(2, "d"), Delivery::Disconnected);
        assert_eq!(port.deliver(-1, "e"), Delivery::Disconnected);
        assert_eq!(out.borrow().output(), "a\n");
        assert_eq!(combiner.borrow().state(), NodeState::Running);
    }
}
