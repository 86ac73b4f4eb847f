//! Built-in functions callable from scripts.
//!
//! Two static tables: [`GENERIC`] entries accept any values and check their
//! arguments themselves; [`TYPED`] entries are chosen by the compiler when
//! the static argument types are known and match `params` exactly. The
//! bytecode refers to an entry by its index in the table.

use crate::value::{Value, ValueType};

pub type NativeFn = fn(&[Value]) -> Result<Value, String>;

pub struct NativeFunction {
    pub name: &'static str,
    pub arity: usize,
    pub returns: ValueType,
    pub func: NativeFn,
}

pub struct TypedNative {
    pub name: &'static str,
    pub params: &'static [ValueType],
    pub returns: ValueType,
    pub func: NativeFn,
}

use ValueType::{Bool, Int, Str, StrArray, Unknown};

pub static GENERIC: &[NativeFunction] = &[
    NativeFunction { name: "length", arity: 1, returns: Int, func: length },
    NativeFunction { name: "split", arity: 2, returns: StrArray, func: split },
    NativeFunction { name: "join", arity: 2, returns: Str, func: join },
    NativeFunction { name: "index_of", arity: 2, returns: Int, func: index_of },
    NativeFunction { name: "slice", arity: 3, returns: Unknown, func: slice },
    NativeFunction { name: "element_at", arity: 2, returns: Str, func: element_at },
    NativeFunction { name: "to_string", arity: 1, returns: Str, func: to_string },
    NativeFunction { name: "parse_int", arity: 1, returns: Int, func: parse_int },
    NativeFunction { name: "can_parse", arity: 1, returns: Bool, func: can_parse },
    NativeFunction { name: "remove_at", arity: 2, returns: StrArray, func: remove_at },
    NativeFunction { name: "trim", arity: 1, returns: Str, func: trim },
];

pub static TYPED: &[TypedNative] = &[
    TypedNative { name: "length", params: &[Str], returns: Int, func: length },
    TypedNative { name: "length", params: &[StrArray], returns: Int, func: length },
    TypedNative { name: "split", params: &[Str, Str], returns: StrArray, func: split },
    TypedNative { name: "join", params: &[Str, StrArray], returns: Str, func: join },
    TypedNative { name: "index_of", params: &[Str, Str], returns: Int, func: index_of },
    TypedNative { name: "slice", params: &[Str, Int, Int], returns: Str, func: slice },
    TypedNative { name: "slice", params: &[StrArray, Int, Int], returns: StrArray, func: slice },
    TypedNative { name: "element_at", params: &[Str, Int], returns: Str, func: element_at },
    TypedNative { name: "element_at", params: &[StrArray, Int], returns: Str, func: element_at },
    TypedNative { name: "parse_int", params: &[Str], returns: Int, func: parse_int },
    TypedNative { name: "can_parse", params: &[Str], returns: Bool, func: can_parse },
    TypedNative { name: "remove_at", params: &[StrArray, Int], returns: StrArray, func: remove_at },
    TypedNative { name: "trim", params: &[Str], returns: Str, func: trim },
];

/// Name used for `x[i]`.
pub const ELEMENT_AT: &str = "element_at";
/// Name used for `x[a:b]`.
pub const SLICE: &str = "slice";

pub fn generic(name: &str) -> Option<(u8, &'static NativeFunction)> {
    GENERIC
        .iter()
        .enumerate()
        .find(|(_, f)| f.name == name)
        .map(|(i, f)| (i as u8, f))
}

/// Looks up the specialised entry for `name` applied to exactly `args`.
pub fn typed(name: &str, args: &[ValueType]) -> Option<(u8, &'static TypedNative)> {
    TYPED
        .iter()
        .enumerate()
        .find(|(_, f)| f.name == name && f.params == args)
        .map(|(i, f)| (i as u8, f))
}

pub fn generic_by_id(id: u8) -> Option<&'static NativeFunction> {
    GENERIC.get(id as usize)
}

pub fn typed_by_id(id: u8) -> Option<&'static TypedNative> {
    TYPED.get(id as usize)
}

/// Static return type of a call: the typed signature when one matches,
/// the generic return type otherwise.
pub fn return_type(name: &str, args: &[ValueType]) -> ValueType {
    if let Some((_, f)) = typed(name, args) {
        return f.returns;
    }
    generic(name).map_or(Unknown, |(_, f)| f.returns)
}

// =========================================================
// Implementations
// =========================================================

fn length(args: &[Value]) -> Result<Value, String> {
    let [x] = args else {
        return Err("length takes exactly one parameter".into());
    };
    match x {
        Value::Int(_) => Err("Cannot find the length of an integer".into()),
        Value::Bool(_) => Err("Cannot find the length of a boolean".into()),
        Value::Str(s) => Ok(Value::Int(char_count(s))),
        Value::StrArray(a) => Ok(Value::Int(a.len() as i32)),
    }
}

fn split(args: &[Value]) -> Result<Value, String> {
    let [sep, s] = args else {
        return Err("split takes two parameters".into());
    };
    let (Value::Str(sep), Value::Str(s)) = (sep, s) else {
        return Err("Both parameters for split must be a string".into());
    };
    let pieces: Vec<String> = if sep.is_empty() {
        vec![s.trim().to_string()]
    } else {
        s.split(sep.as_str()).map(str::trim).map(String::from).collect()
    };
    Ok(Value::StrArray(pieces.into_iter().filter(|p| !p.is_empty()).collect()))
}

fn join(args: &[Value]) -> Result<Value, String> {
    match args {
        [Value::Str(sep), Value::StrArray(items)] => Ok(Value::Str(items.join(sep))),
        [_, _] => Err("join takes one string and one string array".into()),
        _ => Err("join takes two parameters".into()),
    }
}

fn index_of(args: &[Value]) -> Result<Value, String> {
    match args {
        [Value::Str(needle), Value::Str(haystack)] => Ok(Value::Int(
            haystack
                .find(needle.as_str())
                .map_or(-1, |byte| char_count(&haystack[..byte])),
        )),
        [_, _] => Err("index_of takes two strings".into()),
        _ => Err("index_of takes two parameters".into()),
    }
}

fn slice(args: &[Value]) -> Result<Value, String> {
    let [x, start, end] = args else {
        return Err("slice takes three parameters".into());
    };
    let bad_args = || "slice takes one string or string array and two ints".to_string();
    let (Value::Int(start), Value::Int(end)) = (start, end) else {
        return Err(bad_args());
    };
    match x {
        Value::Str(s) => {
            let (start, end) = slice_range(*start, *end, char_count(s))?;
            Ok(Value::Str(s.chars().skip(start).take(end - start).collect()))
        }
        Value::StrArray(items) => {
            let (start, end) = slice_range(*start, *end, items.len() as i32)?;
            Ok(Value::StrArray(items[start..end].to_vec()))
        }
        _ => Err(bad_args()),
    }
}

fn slice_range(start: i32, end: i32, len: i32) -> Result<(usize, usize), String> {
    if end <= start {
        return Err("slice: end value must be larger than start value".into());
    }
    if start < 0 {
        return Err("slice: start must be non-negative".into());
    }
    if end > len {
        return Err(format!("slice: string is only length {len}"));
    }
    Ok((start as usize, end as usize))
}

fn element_at(args: &[Value]) -> Result<Value, String> {
    let [x, index] = args else {
        return Err("element_at takes two parameters".into());
    };
    let Value::Int(index) = index else {
        return Err("element_at takes one string or string array and one int".into());
    };
    let found = match x {
        Value::Str(s) => usize::try_from(*index)
            .ok()
            .and_then(|i| s.chars().nth(i))
            .map(String::from),
        Value::StrArray(a) => usize::try_from(*index).ok().and_then(|i| a.get(i)).cloned(),
        _ => return Err("element_at takes one string or string array and one int".into()),
    };
    found.map(Value::Str).ok_or_else(|| "index out of bounds".to_string())
}

fn to_string(args: &[Value]) -> Result<Value, String> {
    match args {
        [x] => Ok(Value::Str(x.to_string())),
        _ => Err("to_string takes one parameter".into()),
    }
}

fn parse_int(args: &[Value]) -> Result<Value, String> {
    match args {
        [Value::Str(s)] => s
            .trim()
            .parse::<i32>()
            .map(Value::Int)
            .map_err(|_| "Failed to parse int".to_string()),
        [_] => Err("parse_int takes in a single string".into()),
        _ => Err("parse_int takes one parameter".into()),
    }
}

fn can_parse(args: &[Value]) -> Result<Value, String> {
    match args {
        [Value::Str(s)] => Ok(Value::Bool(s.trim().parse::<i32>().is_ok())),
        [_] => Ok(Value::Bool(false)),
        _ => Err("can_parse takes one parameter".into()),
    }
}

fn remove_at(args: &[Value]) -> Result<Value, String> {
    match args {
        [Value::StrArray(items), Value::Int(i)] => {
            let index = usize::try_from(*i)
                .ok()
                .filter(|&index| index < items.len())
                .ok_or_else(|| format!("array does not have index {i}"))?;
            let mut items = items.clone();
            items.remove(index);
            Ok(Value::StrArray(items))
        }
        [_, _] => Err("remove_at takes in a string array and an int".into()),
        _ => Err("remove_at takes two parameters".into()),
    }
}

fn trim(args: &[Value]) -> Result<Value, String> {
    match args {
        [Value::Str(s)] => Ok(Value::Str(s.trim().to_string())),
        [_] => Err("trim takes in a string".into()),
        _ => Err("trim takes one parameter".into()),
    }
}

fn char_count(s: &str) -> i32 {
    s.chars().count() as i32
}
