use indexmap::IndexSet;

use crate::error::Diagnostics;
use crate::grammar::{Expr, ExprKind, OpCode, Operation, OperationKind, Operator, UnaryOperator};
use crate::native;
use crate::value::{Value, ValueType};
use crate::vm::{INPUT_NAME, MEM_NAME};

/// Placeholder operand of a jump until [`Compiler::patch_jumps`] runs.
const UNPATCHED: u16 = 0xFFFF;

/// Compiled program handed to the VM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub code: Vec<u8>,
    pub constants: Vec<Value>,
    /// Slot index to variable name; slots 0 and 1 are `input` and `mem`.
    pub variable_names: Vec<String>,
    /// `line_ends[i]` is the code length after source line `i` was emitted.
    pub line_ends: Vec<u32>,
}

impl Chunk {
    pub fn slot_count(&self) -> usize {
        self.variable_names.len()
    }

    /// 1-based source line of the instruction starting at `offset`.
    pub fn line_at(&self, offset: usize) -> usize {
        let line = self.line_ends.partition_point(|&end| end as usize <= offset) + 1;
        line.min(self.line_ends.len().max(1))
    }
}

struct Compiler {
    code: Vec<u8>,
    constants: IndexSet<Value>,
    slots: IndexSet<String>,
    line_ends: Vec<u32>,
}

type EmitResult = Result<(), String>;

impl Compiler {
    fn new() -> Self {
        let slots = IndexSet::from([INPUT_NAME.to_string(), MEM_NAME.to_string()]);
        Compiler {
            code: Vec::new(),
            constants: IndexSet::new(),
            slots,
            line_ends: Vec::new(),
        }
    }

    fn emit(&mut self, op: OpCode) {
        self.code.push(op as u8);
    }

    fn emit_u16(&mut self, op: OpCode, operand: u16) {
        self.emit(op);
        self.code.extend_from_slice(&operand.to_be_bytes());
    }

    fn constant(&mut self, value: Value) -> Result<u16, String> {
        let (index, _) = self.constants.insert_full(value);
        u16::try_from(index).map_err(|_| "Too many constants".to_string())
    }

    fn slot(&mut self, name: &str) -> Result<u16, String> {
        let index = match self.slots.get_index_of(name) {
            Some(index) => index,
            None => self.slots.insert_full(name.to_string()).0,
        };
        u16::try_from(index).map_err(|_| "Too many variables".to_string())
    }

    // =========================================================
    // Operations
    // =========================================================

    fn compile_line(&mut self, op: &Operation) -> EmitResult {
        let line_start = self.code.len();
        for expr in &op.operands {
            self.compile_expr(expr)?;
        }

        match op.kind {
            OperationKind::Set => self.move_target_to_end(line_start)?,
            OperationKind::Print => {
                let specialised = op.operands[0].ty == ValueType::Int && op.operands[1].ty == ValueType::Str;
                self.emit(if specialised { OpCode::PrintIS } else { OpCode::Print });
            }
            OperationKind::If => self.emit_u16(OpCode::JumpIfFalse, UNPATCHED),
            OperationKind::Else => self.emit_u16(OpCode::Jump, UNPATCHED),
            OperationKind::Endif => self.emit(OpCode::Endif),
            OperationKind::Return => self.emit(OpCode::Return),
            OperationKind::Nop => self.emit(OpCode::Nop),
        }
        Ok(())
    }

    /// The SET target was emitted as an ordinary `Get`; turn the first `Get`
    /// of the line into a trailing `Set` on the same slot.
    fn move_target_to_end(&mut self, line_start: usize) -> EmitResult {
        let mut pos = line_start;
        while pos < self.code.len() {
            let op = OpCode::from_byte(self.code[pos]).ok_or("Unknown opcode")?;
            if op == OpCode::Get {
                let slot: Vec<u8> = self.code.drain(pos..pos + 3).skip(1).collect();
                self.emit(OpCode::Set);
                self.code.extend_from_slice(&slot);
                return Ok(());
            }
            pos += 1 + op.operand_width();
        }
        Err("No identifier for set command".to_string())
    }

    // =========================================================
    // Expressions
    // =========================================================

    fn compile_expr(&mut self, expr: &Expr) -> EmitResult {
        match &expr.kind {
            ExprKind::Literal(Value::Bool(true)) => self.emit(OpCode::True),
            ExprKind::Literal(Value::Bool(false)) => self.emit(OpCode::False),
            ExprKind::Literal(value) => {
                let index = self.constant(value.clone())?;
                self.emit_u16(OpCode::Constant, index);
            }
            ExprKind::Variable(name) => {
                let slot = self.slot(name)?;
                self.emit_u16(OpCode::Get, slot);
            }
            ExprKind::Grouping(inner) => self.compile_expr(inner)?,
            ExprKind::Unary(op, operand) => {
                self.compile_expr(operand)?;
                self.emit(unary_opcode(*op, operand.ty));
            }
            ExprKind::Binary(left, op, right) => {
                self.compile_expr(left)?;
                self.compile_expr(right)?;
                self.emit(binary_opcode(*op, left.ty, right.ty));
            }
            ExprKind::Call(name, args) => {
                for arg in args {
                    self.compile_expr(arg)?;
                }
                self.emit_call(name, args.iter().map(|a| a.ty).collect())?;
            }
            ExprKind::Index(target, args) => {
                self.compile_expr(target)?;
                for arg in args {
                    self.compile_expr(arg)?;
                }
                let name = if args.len() == 1 { native::ELEMENT_AT } else { native::SLICE };
                let types = std::iter::once(target.ty).chain(args.iter().map(|a| a.ty)).collect();
                self.emit_call(name, types)?;
            }
        }
        Ok(())
    }

    fn emit_call(&mut self, name: &str, arg_types: Vec<ValueType>) -> EmitResult {
        let argc = u8::try_from(arg_types.len()).map_err(|_| "Can't have more than 255 arguments.".to_string())?;
        let (op, id) = if let Some((id, _)) = native::typed(name, &arg_types) {
            (OpCode::CallTypeKnown, id)
        } else if let Some((id, _)) = native::generic(name) {
            (OpCode::Call, id)
        } else {
            return Err(format!("Function {name} does not exist"));
        };
        self.emit(op);
        self.code.extend_from_slice(&[id, argc]);
        Ok(())
    }

    // =========================================================
    // Jump patching
    // =========================================================

    /// Resolves every IF/ELSE placeholder. Offsets are relative to the byte
    /// after the jump operand. On failure returns the offending code offset.
    fn patch_jumps(&mut self) -> Result<(), (usize, String)> {
        let mut pending_ifs: Vec<(usize, bool)> = Vec::new();
        let mut pending_elses: Vec<usize> = Vec::new();

        let mut pos = 0;
        while pos < self.code.len() {
            let Some(op) = OpCode::from_byte(self.code[pos]) else {
                return Err((pos, format!("Unknown opcode {}", self.code[pos])));
            };
            match op {
                OpCode::JumpIfFalse => pending_ifs.push((pos + 1, false)),
                OpCode::Jump => {
                    let Some((if_operand, has_else)) = pending_ifs.pop() else {
                        return Err((pos, "ELSE without corresponding IF".to_string()));
                    };
                    if has_else {
                        return Err((pos, "Duplicate ELSE".to_string()));
                    }
                    self.patch(if_operand, pos + 3)?;
                    pending_ifs.push((if_operand, true));
                    pending_elses.push(pos + 1);
                }
                OpCode::Endif => {
                    let Some((if_operand, has_else)) = pending_ifs.pop() else {
                        return Err((pos, "ENDIF without corresponding IF".to_string()));
                    };
                    let operand = if has_else {
                        pending_elses
                            .pop()
                            .ok_or_else(|| (pos, "ENDIF without corresponding IF".to_string()))?
                    } else {
                        if_operand
                    };
                    self.patch(operand, pos)?;
                }
                _ => {}
            }
            pos += 1 + op.operand_width();
        }

        match pending_ifs.last() {
            Some(&(operand, _)) => Err((operand - 1, "IF without corresponding ENDIF".to_string())),
            None => Ok(()),
        }
    }

    /// An overflow is blamed on the jump itself, not on its target.
    fn patch(&mut self, operand: usize, target: usize) -> Result<(), (usize, String)> {
        let offset = target - (operand + 2);
        let offset = u16::try_from(offset).map_err(|_| (operand - 1, "Too much code to jump over".to_string()))?;
        self.code[operand..operand + 2].copy_from_slice(&offset.to_be_bytes());
        Ok(())
    }

    fn finish(self) -> Chunk {
        Chunk {
            code: self.code,
            constants: self.constants.into_iter().collect(),
            variable_names: self.slots.into_iter().collect(),
            line_ends: self.line_ends,
        }
    }
}

fn unary_opcode(op: UnaryOperator, operand: ValueType) -> OpCode {
    match (op, operand) {
        (UnaryOperator::Negate, ValueType::Int) => OpCode::NegateI,
        (UnaryOperator::Negate, _) => OpCode::Negate,
        (UnaryOperator::Not, ValueType::Bool) => OpCode::NotB,
        (UnaryOperator::Not, _) => OpCode::Not,
    }
}

/// Picks the specialised opcode when both operand types are known to fit it.
fn binary_opcode(op: Operator, left: ValueType, right: ValueType) -> OpCode {
    use ValueType::*;
    let same = if left == right { Some(left) } else { None };
    match (op, same) {
        (Operator::Equal, _) => OpCode::Equal,
        (Operator::NotEqual, _) => OpCode::NotEqual,
        (Operator::Greater, Some(Int)) => OpCode::GreaterI,
        (Operator::Greater, _) => OpCode::Greater,
        (Operator::GreaterEqual, Some(Int)) => OpCode::GreaterEqualI,
        (Operator::GreaterEqual, _) => OpCode::GreaterEqual,
        (Operator::Less, Some(Int)) => OpCode::LessI,
        (Operator::Less, _) => OpCode::Less,
        (Operator::LessEqual, Some(Int)) => OpCode::LessEqualI,
        (Operator::LessEqual, _) => OpCode::LessEqual,
        (Operator::Addition, Some(Int)) => OpCode::AddI,
        (Operator::Addition, Some(Str)) => OpCode::AddS,
        (Operator::Addition, Some(StrArray)) => OpCode::AddA,
        (Operator::Addition, _) => OpCode::Add,
        (Operator::Subtraction, Some(Int)) => OpCode::SubtractI,
        (Operator::Subtraction, _) => OpCode::Subtract,
        (Operator::Multiplication, Some(Int)) => OpCode::MultiplyI,
        (Operator::Multiplication, _) => OpCode::Multiply,
        (Operator::Division, Some(Int)) => OpCode::DivideI,
        (Operator::Division, _) => OpCode::Divide,
        (Operator::And, Some(Bool)) => OpCode::AndB,
        (Operator::And, _) => OpCode::And,
        (Operator::Or, Some(Bool)) => OpCode::OrB,
        (Operator::Or, _) => OpCode::Or,
    }
}

/// Lowers a validated, optimised program to bytecode.
///
/// Returns `None` when anything was reported; `diagnostics` then holds the
/// reasons.
pub fn compile(program: &[Option<Operation>], diagnostics: &mut Diagnostics) -> Option<Chunk> {
    let mut compiler = Compiler::new();

    for (line, op) in program.iter().enumerate() {
        if let Some(op) = op {
            if let Err(message) = compiler.compile_line(op) {
                diagnostics.report(line, message);
            }
        }
        compiler.line_ends.push(compiler.code.len() as u32);
    }

    // Every path ends in RETURN; it belongs to the last source line.
    compiler.emit(OpCode::Return);
    match compiler.line_ends.last_mut() {
        Some(end) => *end = compiler.code.len() as u32,
        None => compiler.line_ends.push(compiler.code.len() as u32),
    }

    if diagnostics.has_errors() {
        return None;
    }

    if let Err((offset, message)) = compiler.patch_jumps() {
        let line = compiler.line_ends.partition_point(|&end| end as usize <= offset);
        diagnostics.report(line.min(compiler.line_ends.len().saturating_sub(1)), message);
        return None;
    }

    let chunk = compiler.finish();
    tracing::debug!(
        bytes = chunk.code.len(),
        constants = chunk.constants.len(),
        slots = chunk.slot_count(),
        "compiled"
    );
    Some(chunk)
}
