use std::fmt::Write;

use super::Vm;
use crate::compiler::Chunk;
use crate::grammar::OpCode;
use crate::native;

impl Vm {
    // =========================================================
    // Debug helpers
    // =========================================================

    pub(crate) fn dump_state(&self) -> String {
        let stack: Vec<String> = self.stack.iter().map(|v| format!("{v:?}")).collect();
        let initialized: Vec<&str> = self
            .variables
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_some())
            .map(|(slot, _)| self.slot_name(slot))
            .collect();
        format!(
            "ip={} state={:?} panicked={} stack={stack:?} initialized={initialized:?}",
            self.pointer, self.state, self.panicked
        )
    }
}

/// Renders `chunk` one instruction per line: offset, source line, mnemonic
/// and decoded operands.
pub fn disassemble(chunk: &Chunk) -> String {
    let mut out = String::new();
    let mut pos = 0;
    let code = &chunk.code;

    while pos < code.len() {
        let line = chunk.line_at(pos);
        let Some(op) = OpCode::from_byte(code[pos]) else {
            let _ = writeln!(out, "{pos:04} {line:4} <bad opcode {}>", code[pos]);
            pos += 1;
            continue;
        };
        let width = op.operand_width();
        let Some(operands) = code.get(pos + 1..pos + 1 + width) else {
            let _ = writeln!(out, "{pos:04} {line:4} {op:?} <truncated>");
            break;
        };

        let detail = match op {
            OpCode::Constant => {
                let index = u16::from_be_bytes([operands[0], operands[1]]) as usize;
                match chunk.constants.get(index) {
                    Some(value) => format!("{index} ({value:?})"),
                    None => format!("{index} (?)"),
                }
            }
            OpCode::Get | OpCode::Set => {
                let slot = u16::from_be_bytes([operands[0], operands[1]]) as usize;
                let name = chunk.variable_names.get(slot).map_or("?", String::as_str);
                format!("{slot} ({name})")
            }
            OpCode::Jump | OpCode::JumpIfFalse => {
                let offset = u16::from_be_bytes([operands[0], operands[1]]) as usize;
                format!("{offset} -> {:04}", pos + 3 + offset)
            }
            OpCode::Call => {
                let name = native::generic_by_id(operands[0]).map_or("?", |f| f.name);
                format!("{name}/{}", operands[1])
            }
            OpCode::CallTypeKnown => match native::typed_by_id(operands[0]) {
                Some(f) => {
                    let params: Vec<String> = f.params.iter().map(|t| t.to_string()).collect();
                    format!("{}({})/{}", f.name, params.join(", "), operands[1])
                }
                None => format!("?/{}", operands[1]),
            },
            _ => String::new(),
        };

        let _ = writeln!(out, "{pos:04} {line:4} {:<14} {detail}", format!("{op:?}"));
        pos += 1 + width;
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_every_instruction_with_operands() {
        let chunk = crate::compile("SET x = length(input);\nIF x > 2;\nPRINT 0, \"long\";\nENDIF;").unwrap();
        let text = disassemble(&chunk);
        let lines: Vec<&str> = text.lines().collect();

        assert!(lines[0].starts_with("0000    1 Get"), "{text}");
        assert!(lines[0].ends_with("0 (input)"));
        assert!(lines[1].contains("CallTypeKnown  length(string)/1"), "{text}");
        assert!(lines[2].contains(" Set ") && lines[2].ends_with("2 (x)"), "{text}");
        assert!(text.contains("JumpIfFalse"));
        assert!(text.contains("-> "));
        assert!(lines.last().is_some_and(|l| l.contains("Return")));
    }
}
