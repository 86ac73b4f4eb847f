use std::fmt;

use crate::error::RuntimeErrorKind;
use crate::grammar::{Operator, UnaryOperator};

/// Static type of an expression, assigned by the validator.
///
/// `Unknown` marks a value whose type could not be resolved statically
/// (for instance a variable assigned different types in the two arms of an
/// `IF`). Unknown operands pass validation and are checked by the VM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Int,
    Bool,
    Str,
    StrArray,
    Unknown,
}

impl ValueType {
    /// True when `self` is `expected` or unresolved.
    pub fn accepts(self, expected: ValueType) -> bool {
        self == expected || self == ValueType::Unknown
    }

    pub fn name(self) -> &'static str {
        match self {
            ValueType::Int => "int",
            ValueType::Bool => "bool",
            ValueType::Str => "string",
            ValueType::StrArray => "string[]",
            ValueType::Unknown => "object",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A runtime value on the operand stack, in a variable slot or in the constant pool.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Int(i32),
    Bool(bool),
    Str(String),
    StrArray(Vec<String>),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Int(_) => ValueType::Int,
            Value::Bool(_) => ValueType::Bool,
            Value::Str(_) => ValueType::Str,
            Value::StrArray(_) => ValueType::StrArray,
        }
    }

    /// `false`, `0`, `""` and `[]` are falsey, everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Int(n) => *n != 0,
            Value::Bool(b) => *b,
            Value::Str(s) => !s.is_empty(),
            Value::StrArray(a) => !a.is_empty(),
        }
    }

    /// Dynamically checked binary operator, shared by the generic opcodes
    /// and the constant folder.
    pub fn binary(op: Operator, left: Value, right: Value) -> Result<Value, RuntimeErrorKind> {
        use Operator::*;
        match op {
            Equal => Ok(Value::Bool(left == right)),
            NotEqual => Ok(Value::Bool(left != right)),
            And | Or => match (left, right) {
                (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(if op == And { a & b } else { a | b })),
                (Value::Bool(_), other) | (other, _) => Err(mismatch(ValueType::Bool, &other)),
            },
            Addition => match (left, right) {
                (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_add(b))),
                (Value::Str(a), Value::Str(b)) => Ok(Value::Str(a + &b)),
                (Value::StrArray(mut a), Value::StrArray(b)) => {
                    a.extend(b);
                    Ok(Value::StrArray(a))
                }
                (Value::Bool(_), _) => Err(RuntimeErrorKind::Message(
                    "Arguments must be either int, string or string[]".into(),
                )),
                (left, right) => Err(mismatch(left.value_type(), &right)),
            },
            Subtraction | Multiplication | Division | Greater | GreaterEqual | Less | LessEqual => {
                match (left, right) {
                    (Value::Int(a), Value::Int(b)) => int_binary(op, a, b),
                    (Value::Int(_), other) | (other, _) => Err(mismatch(ValueType::Int, &other)),
                }
            }
        }
    }

    pub fn unary(op: UnaryOperator, operand: Value) -> Result<Value, RuntimeErrorKind> {
        match (op, operand) {
            (UnaryOperator::Negate, Value::Int(n)) => Ok(Value::Int(n.wrapping_neg())),
            (UnaryOperator::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
            (UnaryOperator::Negate, other) => Err(mismatch(ValueType::Int, &other)),
            (UnaryOperator::Not, other) => Err(mismatch(ValueType::Bool, &other)),
        }
    }
}

/// Integer arithmetic and comparison. Overflow wraps; division by zero is an error.
pub(crate) fn int_binary(op: Operator, a: i32, b: i32) -> Result<Value, RuntimeErrorKind> {
    use Operator::*;
    Ok(match op {
        Addition => Value::Int(a.wrapping_add(b)),
        Subtraction => Value::Int(a.wrapping_sub(b)),
        Multiplication => Value::Int(a.wrapping_mul(b)),
        Division => {
            if b == 0 {
                return Err(RuntimeErrorKind::DivisionByZero);
            }
            Value::Int(a.wrapping_div(b))
        }
        Greater => Value::Bool(a > b),
        GreaterEqual => Value::Bool(a >= b),
        Less => Value::Bool(a < b),
        LessEqual => Value::Bool(a <= b),
        Equal => Value::Bool(a == b),
        NotEqual => Value::Bool(a != b),
        And | Or => return Err(RuntimeErrorKind::TypeMismatch { expected: ValueType::Bool, found: ValueType::Int }),
    })
}

pub(crate) fn mismatch(expected: ValueType, found: &Value) -> RuntimeErrorKind {
    RuntimeErrorKind::TypeMismatch { expected, found: found.value_type() }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{n}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Str(s) => f.write_str(s),
            Value::StrArray(items) => write!(f, "[{}]", items.join(", ")),
        }
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Vec<String>> for Value {
    fn from(items: Vec<String>) -> Self {
        Value::StrArray(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness() {
        assert!(!Value::Int(0).is_truthy());
        assert!(Value::Int(-3).is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(!Value::StrArray(vec![]).is_truthy());
        assert!(Value::Bool(true).is_truthy());
    }

    #[test]
    fn addition_is_overloaded_but_not_mixed() {
        assert_eq!(Value::binary(Operator::Addition, 2.into(), 3.into()), Ok(Value::Int(5)));
        assert_eq!(Value::binary(Operator::Addition, "a".into(), "b".into()), Ok(Value::from("ab")));
        assert!(Value::binary(Operator::Addition, "a".into(), 1.into()).is_err());
    }

    #[test]
    fn division_by_zero_is_reported() {
        assert_eq!(
            Value::binary(Operator::Division, 10.into(), 0.into()),
            Err(RuntimeErrorKind::DivisionByZero)
        );
        assert_eq!(Value::binary(Operator::Division, i32::MIN.into(), (-1).into()), Ok(Value::Int(i32::MIN)));
    }

    #[test]
    fn logic_requires_bools() {
        assert_eq!(Value::binary(Operator::And, true.into(), false.into()), Ok(Value::Bool(false)));
        assert_eq!(
            Value::binary(Operator::Or, true.into(), 1.into()),
            Err(RuntimeErrorKind::TypeMismatch { expected: ValueType::Bool, found: ValueType::Int })
        );
    }

    #[test]
    fn unknown_accepts_everything() {
        assert!(ValueType::Unknown.accepts(ValueType::Int));
        assert!(ValueType::Int.accepts(ValueType::Int));
        assert!(!ValueType::Str.accepts(ValueType::Int));
    }
}
