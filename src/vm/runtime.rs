use super::Vm;
use crate::error::RuntimeErrorKind;
use crate::grammar::{OpCode, Operator, UnaryOperator};
use crate::value::{Value, ValueType, int_binary, mismatch};

impl Vm {
    // =========================================================
    // Stack helpers
    // =========================================================

    pub(crate) fn pop(&mut self) -> Result<Value, RuntimeErrorKind> {
        self.stack.pop().ok_or(RuntimeErrorKind::StackUnderflow)
    }

    pub(crate) fn pop_int(&mut self) -> Result<i32, RuntimeErrorKind> {
        match self.pop()? {
            Value::Int(n) => Ok(n),
            other => Err(mismatch(ValueType::Int, &other)),
        }
    }

    pub(crate) fn pop_bool(&mut self) -> Result<bool, RuntimeErrorKind> {
        match self.pop()? {
            Value::Bool(b) => Ok(b),
            other => Err(mismatch(ValueType::Bool, &other)),
        }
    }

    /// Pops `argc` values, first argument first.
    pub(crate) fn pop_args(&mut self, argc: usize) -> Result<Vec<Value>, RuntimeErrorKind> {
        let start = self
            .stack
            .len()
            .checked_sub(argc)
            .ok_or(RuntimeErrorKind::StackUnderflow)?;
        Ok(self.stack.split_off(start))
    }

    // =========================================================
    // Operand decoding
    // =========================================================

    pub(crate) fn read_u8(&mut self) -> Result<u8, RuntimeErrorKind> {
        let byte = *self
            .chunk
            .code
            .get(self.pointer)
            .ok_or(RuntimeErrorKind::MalformedCode(self.pointer))?;
        self.pointer += 1;
        Ok(byte)
    }

    pub(crate) fn read_u16(&mut self) -> Result<u16, RuntimeErrorKind> {
        let hi = self.read_u8()?;
        let lo = self.read_u8()?;
        Ok(u16::from_be_bytes([hi, lo]))
    }

    // =========================================================
    // Operators
    // =========================================================

    /// Suffixed opcodes were chosen from proven operand types and take the
    /// direct path; the generic ones check types dynamically.
    pub(crate) fn exec_binary(&mut self, code: OpCode, op: Operator) -> Result<(), RuntimeErrorKind> {
        let result = match code {
            OpCode::GreaterI
            | OpCode::GreaterEqualI
            | OpCode::LessI
            | OpCode::LessEqualI
            | OpCode::AddI
            | OpCode::SubtractI
            | OpCode::MultiplyI
            | OpCode::DivideI => {
                let b = self.pop_int()?;
                let a = self.pop_int()?;
                int_binary(op, a, b)?
            }
            OpCode::AndB | OpCode::OrB => {
                let b = self.pop_bool()?;
                let a = self.pop_bool()?;
                Value::Bool(if op == Operator::And { a && b } else { a || b })
            }
            _ => {
                let b = self.pop()?;
                let a = self.pop()?;
                Value::binary(op, a, b)?
            }
        };
        self.stack.push(result);
        Ok(())
    }

    pub(crate) fn exec_unary(&mut self, op: UnaryOperator) -> Result<(), RuntimeErrorKind> {
        let operand = self.pop()?;
        let result = Value::unary(op, operand)?;
        self.stack.push(result);
        Ok(())
    }

    // =========================================================
    // Printing
    // =========================================================

    /// Text sent for a PRINT payload. Integers are rendered in decimal.
    pub(crate) fn render(payload: &Value) -> Result<String, RuntimeErrorKind> {
        match payload {
            Value::Str(s) => Ok(s.clone()),
            Value::Int(n) => Ok(n.to_string()),
            other => Err(mismatch(ValueType::Str, other)),
        }
    }
}
