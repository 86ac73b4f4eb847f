// program        ::= line ("\n" line)*
// line           ::= operation? comment?

// operation      ::= "SET" identifier "=" expression ";"
//                  | "PRINT" expression "," expression ";"
//                  | "IF" expression ";"
//                  | "ELSE" ";"
//                  | "ENDIF" ";"
//                  | "RETURN" ";"
//                  | "NOP" ";"

// expression     ::= or_expr
// or_expr        ::= and_expr ("OR" and_expr)*
// and_expr       ::= equality ("AND" equality)*
// equality       ::= comparison (("==" | "!=") comparison)*
// comparison     ::= term (("<" | "<=" | ">" | ">=") term)*
// term           ::= factor (("+" | "-") factor)*
// factor         ::= unary (("*" | "/") unary)*
// unary          ::= ("!" | "-") unary | postfix
// postfix        ::= primary ( "(" arguments? ")" | "[" expression ((":" | ",") expression)? "]" )*
// arguments      ::= expression ("," expression)*
// primary        ::= number | string | "TRUE" | "FALSE" | identifier | "(" expression ")"

// identifier     ::= [a-zA-Z_][a-zA-Z0-9_]*
// number         ::= [0-9]+
// string         ::= '"' [^"\n]* '"'
// comment        ::= "//" .*

use std::fmt;

use crate::value::{Value, ValueType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    LeftParen,
    RightParen,
    LeftSquare,
    RightSquare,
    Comma,
    Dot,
    Minus,
    Plus,
    Slash,
    Star,
    Colon,
    Semicolon,

    Bang,
    BangEqual,
    Equal,
    EqualEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,

    Identifier,
    String,
    Number,

    And,
    Or,
    If,
    Else,
    Endif,
    Set,
    Print,
    Return,
    True,
    False,
    Nop,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    Int(i32),
    Str(String),
}

/// A token with its byte span in the source. Tokens are grouped per source
/// line, so the line is the index of the containing group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
    pub literal: Option<Literal>,
}

impl Token {
    pub fn lexeme<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start..self.end]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Addition,
    Subtraction,
    Multiplication,
    Division,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
    Equal,
    NotEqual,
    And,
    Or,
}

impl Operator {
    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Addition => "+",
            Operator::Subtraction => "-",
            Operator::Multiplication => "*",
            Operator::Division => "/",
            Operator::Greater => ">",
            Operator::GreaterEqual => ">=",
            Operator::Less => "<",
            Operator::LessEqual => "<=",
            Operator::Equal => "==",
            Operator::NotEqual => "!=",
            Operator::And => "AND",
            Operator::Or => "OR",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Negate,
    Not,
}

/// Expression tree node. `ty` starts out as [`ValueType::Unknown`] and is
/// filled in by the validator; literals know their type from the start.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: ValueType,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal(Value),
    Variable(String),
    Unary(UnaryOperator, Box<Expr>),
    Binary(Box<Expr>, Operator, Box<Expr>),
    Call(String, Vec<Expr>),
    /// `name[a]` or `name[a:b]`.
    Index(Box<Expr>, Vec<Expr>),
    Grouping(Box<Expr>),
}

impl Expr {
    pub fn new(kind: ExprKind) -> Self {
        let ty = match &kind {
            ExprKind::Literal(value) => value.value_type(),
            _ => ValueType::Unknown,
        };
        Expr { kind, ty }
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        Self::new(ExprKind::Literal(value.into()))
    }

    pub fn variable(name: impl Into<String>) -> Self {
        Self::new(ExprKind::Variable(name.into()))
    }

    pub fn as_literal(&self) -> Option<&Value> {
        match &self.kind {
            ExprKind::Literal(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_variable(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Variable(name) => Some(name),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Set,
    Print,
    If,
    Else,
    Endif,
    Return,
    Nop,
}

impl OperationKind {
    /// Number of operand expressions the operation takes.
    pub fn arity(self) -> usize {
        match self {
            OperationKind::Set | OperationKind::Print => 2,
            OperationKind::If => 1,
            OperationKind::Else | OperationKind::Endif | OperationKind::Return | OperationKind::Nop => 0,
        }
    }

    /// Token separating consecutive operands.
    pub fn separator(self) -> TokenKind {
        match self {
            OperationKind::Set => TokenKind::Equal,
            _ => TokenKind::Comma,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationKind::Set => "SET",
            OperationKind::Print => "PRINT",
            OperationKind::If => "IF",
            OperationKind::Else => "ELSE",
            OperationKind::Endif => "ENDIF",
            OperationKind::Return => "RETURN",
            OperationKind::Nop => "NOP",
        };
        f.write_str(name)
    }
}

/// One parsed source line.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub kind: OperationKind,
    pub operands: Vec<Expr>,
}

/// Parsed program: one slot per source line, `None` for blank lines.
pub type Program = Vec<Option<Operation>>;

/// Bytecode instruction set.
///
/// Suffixed variants (`I` int, `S` string, `A` string array, `B` bool) are
/// emitted when both operand types are known statically and skip the
/// runtime type check of their generic counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    Constant,
    True,
    False,
    Get,
    Set,
    Equal,
    NotEqual,
    Greater,
    GreaterI,
    GreaterEqual,
    GreaterEqualI,
    Less,
    LessI,
    LessEqual,
    LessEqualI,
    Add,
    AddI,
    AddS,
    AddA,
    Subtract,
    SubtractI,
    Multiply,
    MultiplyI,
    Divide,
    DivideI,
    And,
    AndB,
    Or,
    OrB,
    Negate,
    NegateI,
    Not,
    NotB,
    Print,
    PrintIS,
    Jump,
    JumpIfFalse,
    Call,
    CallTypeKnown,
    Return,
    Endif,
    Nop,
}

impl OpCode {
    pub const ALL: [OpCode; 42] = [
        OpCode::Constant,
        OpCode::True,
        OpCode::False,
        OpCode::Get,
        OpCode::Set,
        OpCode::Equal,
        OpCode::NotEqual,
        OpCode::Greater,
        OpCode::GreaterI,
        OpCode::GreaterEqual,
        OpCode::GreaterEqualI,
        OpCode::Less,
        OpCode::LessI,
        OpCode::LessEqual,
        OpCode::LessEqualI,
        OpCode::Add,
        OpCode::AddI,
        OpCode::AddS,
        OpCode::AddA,
        OpCode::Subtract,
        OpCode::SubtractI,
        OpCode::Multiply,
        OpCode::MultiplyI,
        OpCode::Divide,
        OpCode::DivideI,
        OpCode::And,
        OpCode::AndB,
        OpCode::Or,
        OpCode::OrB,
        OpCode::Negate,
        OpCode::NegateI,
        OpCode::Not,
        OpCode::NotB,
        OpCode::Print,
        OpCode::PrintIS,
        OpCode::Jump,
        OpCode::JumpIfFalse,
        OpCode::Call,
        OpCode::CallTypeKnown,
        OpCode::Return,
        OpCode::Endif,
        OpCode::Nop,
    ];

    pub fn from_byte(byte: u8) -> Option<OpCode> {
        Self::ALL.get(byte as usize).copied()
    }

    /// Bytes of inline operands following the opcode byte.
    pub fn operand_width(self) -> usize {
        match self {
            OpCode::Constant | OpCode::Get | OpCode::Set | OpCode::Jump | OpCode::JumpIfFalse => 2,
            // registry index, argument count
            OpCode::Call | OpCode::CallTypeKnown => 2,
            _ => 0,
        }
    }

    /// Every source line compiles to exactly one of these as its last instruction.
    pub fn ends_line(self) -> bool {
        matches!(
            self,
            OpCode::Set
                | OpCode::Print
                | OpCode::PrintIS
                | OpCode::Jump
                | OpCode::JumpIfFalse
                | OpCode::Return
                | OpCode::Endif
                | OpCode::Nop
        )
    }

    /// Operator evaluated by a binary opcode, generic or specialised.
    pub fn operator(self) -> Option<Operator> {
        use OpCode::*;
        Some(match self {
            Equal => Operator::Equal,
            NotEqual => Operator::NotEqual,
            Greater | GreaterI => Operator::Greater,
            GreaterEqual | GreaterEqualI => Operator::GreaterEqual,
            Less | LessI => Operator::Less,
            LessEqual | LessEqualI => Operator::LessEqual,
            Add | AddI | AddS | AddA => Operator::Addition,
            Subtract | SubtractI => Operator::Subtraction,
            Multiply | MultiplyI => Operator::Multiplication,
            Divide | DivideI => Operator::Division,
            And | AndB => Operator::And,
            Or | OrB => Operator::Or,
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_table_matches_discriminants() {
        for (i, op) in OpCode::ALL.iter().enumerate() {
            assert_eq!(*op as usize, i);
            assert_eq!(OpCode::from_byte(i as u8), Some(*op));
        }
        assert_eq!(OpCode::from_byte(OpCode::ALL.len() as u8), None);
    }

    #[test]
    fn arity_per_operation() {
        assert_eq!(OperationKind::Set.arity(), 2);
        assert_eq!(OperationKind::Print.arity(), 2);
        assert_eq!(OperationKind::If.arity(), 1);
        assert_eq!(OperationKind::Endif.arity(), 0);
    }
}
