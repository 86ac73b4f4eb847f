use std::fmt;

use thiserror::Error;

use crate::value::ValueType;

/// One compile-time problem, attributed to a 1-based source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub line: usize,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

/// Error sink shared by every compiler phase.
///
/// Phases keep going after reporting where they can (the tokenizer collects
/// every bad character), but the pipeline checks [`Diagnostics::has_errors`]
/// after each phase and stops there.
#[derive(Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
    handler: Option<Box<dyn FnMut(&Diagnostic)>>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also forwards every diagnostic to `handler` as it is reported.
    pub fn with_handler(handler: impl FnMut(&Diagnostic) + 'static) -> Self {
        Self {
            items: Vec::new(),
            handler: Some(Box::new(handler)),
        }
    }

    /// `line_index` is the zero-based index of the source line.
    pub fn report(&mut self, line_index: usize, message: impl Into<String>) {
        let diagnostic = Diagnostic {
            line: line_index + 1,
            message: message.into(),
        };
        tracing::debug!(line = diagnostic.line, message = %diagnostic.message, "compile error");
        if let Some(handler) = self.handler.as_mut() {
            handler(&diagnostic);
        }
        self.items.push(diagnostic);
    }

    pub fn has_errors(&self) -> bool {
        !self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn into_error(self) -> CompileError {
        CompileError {
            diagnostics: self.items,
        }
    }
}

impl fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Diagnostics").field("items", &self.items).finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("compilation failed with {} error(s)", .diagnostics.len())]
pub struct CompileError {
    pub diagnostics: Vec<Diagnostic>,
}

impl CompileError {
    pub fn messages(&self) -> impl Iterator<Item = &str> {
        self.diagnostics.iter().map(|d| d.message.as_str())
    }
}

/// A runtime failure. The node that raised it is panicked until reset.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {kind}")]
pub struct RuntimeError {
    pub line: usize,
    pub kind: RuntimeErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeErrorKind {
    #[error("arguments must be of type {expected}, found {found}")]
    TypeMismatch { expected: ValueType, found: ValueType },
    #[error("tried to get a variable not yet initialized: `{0}`")]
    Uninitialized(String),
    #[error("cannot divide by 0")]
    DivisionByZero,
    /// Failure message returned by a native function.
    #[error("{0}")]
    Message(String),
    #[error("function #{0} does not exist")]
    UnknownFunction(u8),
    #[error("no output connected on channel {0}")]
    NoOutput(i32),
    #[error("operand stack underflow")]
    StackUnderflow,
    #[error("malformed bytecode at offset {0}")]
    MalformedCode(usize),
}

pub type NodeId = usize;

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("no node with id {0}")]
    InvalidNode(NodeId),
    #[error("script already has an input node")]
    DuplicateInput,
    #[error("script already has an output node")]
    DuplicateOutput,
    #[error("node {0} cannot connect to itself")]
    SelfConnection(NodeId),
    #[error("node {0} is an input node and cannot receive connections")]
    IntoInput(NodeId),
    #[error("node {0} is an output node and cannot have outputs")]
    FromOutput(NodeId),
    #[error("node {0} already has its single output")]
    OutputTaken(NodeId),
    #[error("node {from} is already connected to node {to}")]
    DuplicateConnection { from: NodeId, to: NodeId },
    #[error("node {0} has no data to update")]
    NotUpdatable(NodeId),
    #[error("node {0} is not a regular node")]
    NotRegular(NodeId),
    #[error("script has no input node")]
    MissingInput,
    #[error("script has not been compiled")]
    NotCompiled,
    #[error("node {node} failed to compile")]
    Compile {
        node: NodeId,
        #[source]
        source: CompileError,
    },
}
