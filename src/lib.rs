//! NodeScript: a line-oriented scripting language compiled to bytecode and
//! run by a stack VM inside a dataflow graph of nodes.
//!
//! [`compile`] runs the whole front end on one source text. [`script::Script`]
//! wires compiled nodes together and schedules them.

pub mod compiler;
pub mod error;
pub mod grammar;
pub mod native;
pub mod node;
pub mod optimizer;
pub mod parser;
pub mod script;
pub mod tokenizer;
pub mod validator;
pub mod value;
pub mod vm;

pub use compiler::Chunk;
pub use error::{CompileError, Diagnostic, Diagnostics, NodeId, RuntimeError, RuntimeErrorKind, ScriptError};
pub use script::{NodeKind, RunOptions, RunOutcome, Script};
pub use value::{Value, ValueType};
pub use vm::{NodeState, Vm, disassemble};

/// Compiles `source` into bytecode, collecting every diagnostic of the first
/// failing phase.
pub fn compile(source: &str) -> Result<Chunk, CompileError> {
    compile_with(source, Diagnostics::new())
}

/// Like [`compile`], reporting through a caller-supplied sink (for example
/// one built with [`Diagnostics::with_handler`]).
pub fn compile_with(source: &str, mut diagnostics: Diagnostics) -> Result<Chunk, CompileError> {
    let tokens = tokenizer::tokenize(source, &mut diagnostics);
    if diagnostics.has_errors() {
        return Err(diagnostics.into_error());
    }

    let mut program = parser::parse(source, &tokens, &mut diagnostics);
    if diagnostics.has_errors() {
        return Err(diagnostics.into_error());
    }

    validator::validate(&mut program, &mut diagnostics);
    if diagnostics.has_errors() {
        return Err(diagnostics.into_error());
    }

    optimizer::optimize(&mut program, &mut diagnostics);
    if diagnostics.has_errors() {
        return Err(diagnostics.into_error());
    }

    compiler::compile(&program, &mut diagnostics).ok_or_else(|| diagnostics.into_error())
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    #[test]
    fn stops_at_the_first_failing_phase() {
        // a lexing error on line 1 hides the parse error on line 2
        let err = compile("SET x = 1 # 2;\nSET = ;").unwrap_err();
        assert_eq!(err.diagnostics.len(), 1);
        assert_eq!(err.diagnostics[0].line, 1);
        assert!(err.diagnostics[0].message.contains("Unexpected character"));
    }

    #[test]
    fn handler_sees_each_diagnostic() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let diagnostics = Diagnostics::with_handler(move |d| sink.borrow_mut().push(d.line));

        let err = compile_with("IF TRUE;\nPRINT 0, \"x\";", diagnostics).unwrap_err();
        assert_eq!(*seen.borrow(), vec![err.diagnostics[0].line]);
        assert_eq!(err.messages().next(), Some("IF statements do not match ENDIF statements"));
    }

    #[test]
    fn empty_source_compiles_to_a_return() {
        let chunk = compile("").unwrap();
        assert_eq!(chunk.code, vec![grammar::OpCode::Return as u8]);
    }
}
