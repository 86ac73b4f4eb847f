use super::{Delivery, NodeState, OutputPort, Vm};
use crate::error::{RuntimeError, RuntimeErrorKind};
use crate::grammar::{OpCode, UnaryOperator};
use crate::value::Value;

impl Vm {
    /// Executes instructions up to and including the next line-ending opcode.
    ///
    /// Does nothing while idle or panicked. A runtime error panics the VM,
    /// leaves it idle and is returned with the source line of the failing
    /// instruction.
    pub fn step_line(&mut self, outputs: &mut dyn OutputPort) -> Result<(), RuntimeError> {
        if self.panicked || self.state == NodeState::Idle {
            return Ok(());
        }

        loop {
            self.instruction_start = self.pointer;
            match self.execute(outputs) {
                Ok(true) => return Ok(()),
                Ok(false) => {}
                Err(kind) => {
                    let line = self.current_line();
                    tracing::debug!(line, state = %self.dump_state(), "runtime error");
                    self.panicked = true;
                    self.state = NodeState::Idle;
                    self.stack.clear();
                    return Err(RuntimeError { line, kind });
                }
            }
        }
    }

    /// Runs one instruction; `Ok(true)` when it ended the source line.
    fn execute(&mut self, outputs: &mut dyn OutputPort) -> Result<bool, RuntimeErrorKind> {
        let byte = self.read_u8()?;
        let op = OpCode::from_byte(byte).ok_or(RuntimeErrorKind::MalformedCode(self.instruction_start))?;
        tracing::trace!(offset = self.instruction_start, ?op, depth = self.stack.len(), "execute");

        match op {
            OpCode::Constant => {
                let index = self.read_u16()? as usize;
                let value = self
                    .chunk
                    .constants
                    .get(index)
                    .cloned()
                    .ok_or(RuntimeErrorKind::MalformedCode(self.instruction_start))?;
                self.stack.push(value);
            }
            OpCode::True => self.stack.push(Value::Bool(true)),
            OpCode::False => self.stack.push(Value::Bool(false)),
            OpCode::Get => {
                let slot = self.read_u16()? as usize;
                let value = self.get_slot(slot)?;
                self.stack.push(value);
            }
            OpCode::Set => {
                let slot = self.read_u16()? as usize;
                let value = self.pop()?;
                self.set_slot(slot, value);
            }
            OpCode::Negate | OpCode::NegateI => self.exec_unary(UnaryOperator::Negate)?,
            OpCode::Not | OpCode::NotB => self.exec_unary(UnaryOperator::Not)?,
            OpCode::Print | OpCode::PrintIS => self.exec_print(outputs)?,
            OpCode::Jump => {
                let offset = self.read_u16()? as usize;
                self.pointer += offset;
            }
            OpCode::JumpIfFalse => {
                let offset = self.read_u16()? as usize;
                if !self.pop()?.is_truthy() {
                    self.pointer += offset;
                }
            }
            OpCode::Call | OpCode::CallTypeKnown => {
                let id = self.read_u8()?;
                let argc = self.read_u8()?;
                self.exec_call(id, argc, op == OpCode::CallTypeKnown)?;
            }
            OpCode::Return => {
                self.end_invocation();
                self.stack.clear();
                self.pointer = 0;
                self.state = NodeState::Idle;
            }
            OpCode::Endif | OpCode::Nop => {}
            _ => {
                let operator = op
                    .operator()
                    .ok_or(RuntimeErrorKind::MalformedCode(self.instruction_start))?;
                self.exec_binary(op, operator)?;
            }
        }

        Ok(op.ends_line())
    }

    /// Offers the payload to its channel. On refusal both operands go back
    /// on the stack and the pointer returns to this PRINT, so the next step
    /// retries it without re-running the rest of the line.
    fn exec_print(&mut self, outputs: &mut dyn OutputPort) -> Result<(), RuntimeErrorKind> {
        let payload = self.pop()?;
        let channel = self.pop_int()?;
        let line = Self::render(&payload)?;

        match outputs.deliver(channel, &line) {
            Delivery::Accepted => self.state = NodeState::Running,
            Delivery::Rejected => {
                self.stack.push(Value::Int(channel));
                self.stack.push(payload);
                self.pointer = self.instruction_start;
                self.state = NodeState::Blocked;
            }
            Delivery::Disconnected => return Err(RuntimeErrorKind::NoOutput(channel)),
        }
        Ok(())
    }
}
