//! Static checks between parsing and optimisation.
//!
//! Runs three passes over the program: a structural pass (IF/ENDIF balance,
//! every called function exists with the right argument count), a
//! flow-sensitive type inference pass that annotates every expression with
//! its [`ValueType`], and a type validation pass over the annotated trees.

use std::collections::HashMap;

use crate::error::Diagnostics;
use crate::grammar::{Expr, ExprKind, Operation, OperationKind, Operator, UnaryOperator};
use crate::native;
use crate::value::ValueType;
use crate::vm::{INPUT_NAME, MEM_NAME};

type TypeMap = HashMap<String, ValueType>;

pub fn validate(program: &mut [Option<Operation>], diagnostics: &mut Diagnostics) {
    check_structure(program, diagnostics);
    if diagnostics.has_errors() {
        return;
    }
    infer_types(program);
    check_types(program, diagnostics);
    tracing::debug!(errors = diagnostics.has_errors(), "validated");
}

// =========================================================
// Structure
// =========================================================

fn check_structure(program: &[Option<Operation>], diagnostics: &mut Diagnostics) {
    let mut depth: i32 = 0;
    for (line, op) in program.iter().enumerate() {
        let Some(op) = op else { continue };
        match op.kind {
            OperationKind::If => depth += 1,
            OperationKind::Endif => {
                depth -= 1;
                if depth < 0 {
                    diagnostics.report(line, "IF statements do not match ENDIF statements");
                    depth = 0;
                }
            }
            _ => {}
        }
        for expr in &op.operands {
            check_calls(expr, line, diagnostics);
        }
    }
    if depth != 0 {
        diagnostics.report(program.len().saturating_sub(1), "IF statements do not match ENDIF statements");
    }
}

fn check_calls(expr: &Expr, line: usize, diagnostics: &mut Diagnostics) {
    match &expr.kind {
        ExprKind::Literal(_) | ExprKind::Variable(_) => {}
        ExprKind::Unary(_, operand) | ExprKind::Grouping(operand) => check_calls(operand, line, diagnostics),
        ExprKind::Binary(left, _, right) => {
            check_calls(left, line, diagnostics);
            check_calls(right, line, diagnostics);
        }
        ExprKind::Index(target, args) => {
            check_calls(target, line, diagnostics);
            args.iter().for_each(|a| check_calls(a, line, diagnostics));
        }
        ExprKind::Call(name, args) => {
            match native::generic(name) {
                None => diagnostics.report(line, format!("Function {name} does not exist")),
                Some((_, f)) if f.arity != args.len() => diagnostics.report(
                    line,
                    format!("{name} takes {} parameter(s) but was given {}", f.arity, args.len()),
                ),
                Some(_) => {}
            }
            args.iter().for_each(|a| check_calls(a, line, diagnostics));
        }
    }
}

// =========================================================
// Inference
// =========================================================

/// The two speculative variable maps of one open IF.
struct Branch {
    then_types: TypeMap,
    else_types: TypeMap,
    in_else: bool,
}

struct Scopes {
    root: TypeMap,
    branches: Vec<Branch>,
}

impl Scopes {
    fn new() -> Self {
        let root = TypeMap::from([
            (INPUT_NAME.to_string(), ValueType::Str),
            (MEM_NAME.to_string(), ValueType::Str),
        ]);
        Scopes { root, branches: Vec::new() }
    }

    fn active(&mut self) -> &mut TypeMap {
        match self.branches.last_mut() {
            Some(branch) if branch.in_else => &mut branch.else_types,
            Some(branch) => &mut branch.then_types,
            None => &mut self.root,
        }
    }

    fn open_if(&mut self) {
        let current = self.active().clone();
        self.branches.push(Branch {
            then_types: current.clone(),
            else_types: current,
            in_else: false,
        });
    }

    fn enter_else(&mut self) {
        if let Some(branch) = self.branches.last_mut() {
            branch.in_else = true;
        }
    }

    fn close_if(&mut self) {
        if let Some(branch) = self.branches.pop() {
            *self.active() = merge(branch.then_types, branch.else_types);
        }
    }
}

/// Same type in both arms survives, conflicting types become unknown, and
/// a variable assigned in only one arm keeps that arm's type.
fn merge(then_types: TypeMap, mut else_types: TypeMap) -> TypeMap {
    let mut merged = TypeMap::with_capacity(then_types.len().max(else_types.len()));
    for (name, ty) in then_types {
        let ty = match else_types.remove(&name) {
            Some(other) if other != ty => ValueType::Unknown,
            _ => ty,
        };
        merged.insert(name, ty);
    }
    merged.extend(else_types);
    merged
}

fn infer_types(program: &mut [Option<Operation>]) {
    let mut scopes = Scopes::new();
    for op in program.iter_mut().flatten() {
        match op.kind {
            OperationKind::Set => {
                let ty = infer(&mut op.operands[1], scopes.active());
                if let Some(name) = op.operands[0].as_variable() {
                    let name = name.to_string();
                    op.operands[0].ty = ty;
                    scopes.active().insert(name, ty);
                }
            }
            OperationKind::If => {
                infer(&mut op.operands[0], scopes.active());
                scopes.open_if();
            }
            OperationKind::Else => scopes.enter_else(),
            OperationKind::Endif => scopes.close_if(),
            OperationKind::Print | OperationKind::Return | OperationKind::Nop => {
                let types = scopes.active();
                for expr in &mut op.operands {
                    infer(expr, types);
                }
            }
        }
    }
}

fn infer(expr: &mut Expr, types: &TypeMap) -> ValueType {
    let ty = match &mut expr.kind {
        ExprKind::Literal(value) => value.value_type(),
        // Never assigned on this path: left to the VM's initialisation check.
        ExprKind::Variable(name) => types.get(name.as_str()).copied().unwrap_or(ValueType::Unknown),
        ExprKind::Grouping(inner) => infer(inner, types),
        ExprKind::Unary(op, operand) => {
            infer(operand, types);
            match op {
                UnaryOperator::Negate => ValueType::Int,
                UnaryOperator::Not => ValueType::Bool,
            }
        }
        ExprKind::Binary(left, op, right) => {
            let l = infer(left, types);
            let r = infer(right, types);
            match op {
                Operator::Addition => {
                    let either = |t| l == t || r == t;
                    if either(ValueType::Int) {
                        ValueType::Int
                    } else if either(ValueType::Str) {
                        ValueType::Str
                    } else if either(ValueType::StrArray) {
                        ValueType::StrArray
                    } else {
                        ValueType::Unknown
                    }
                }
                Operator::Subtraction | Operator::Multiplication | Operator::Division => ValueType::Int,
                _ => ValueType::Bool,
            }
        }
        ExprKind::Call(name, args) => {
            let arg_types: Vec<ValueType> = args.iter_mut().map(|a| infer(a, types)).collect();
            native::return_type(name, &arg_types)
        }
        ExprKind::Index(target, args) => {
            for arg in args.iter_mut() {
                infer(arg, types);
            }
            match infer(target, types) {
                ValueType::Str => ValueType::Str,
                ValueType::StrArray if args.len() == 1 => ValueType::Str,
                ValueType::StrArray => ValueType::StrArray,
                _ => ValueType::Unknown,
            }
        }
    };
    expr.ty = ty;
    ty
}

// =========================================================
// Validation
// =========================================================

fn check_types(program: &mut [Option<Operation>], diagnostics: &mut Diagnostics) {
    for (line, op) in program.iter_mut().enumerate() {
        let Some(op) = op else { continue };
        for expr in &op.operands {
            check(expr, line, diagnostics);
        }

        match op.kind {
            OperationKind::Print => {
                let channel = op.operands[0].ty;
                let payload = op.operands[1].ty;
                let printable = payload.accepts(ValueType::Str) || payload == ValueType::Int;
                if !channel.accepts(ValueType::Int) || !printable {
                    diagnostics.report(line, "PRINT must be of the form: PRINT <int>, <string>");
                } else if payload == ValueType::Int {
                    let inner = op.operands.remove(1);
                    let mut call = Expr::new(ExprKind::Call("to_string".to_string(), vec![inner]));
                    call.ty = ValueType::Str;
                    op.operands.push(call);
                }
            }
            OperationKind::Set => {
                if let Some(name) = op.operands[0].as_variable() {
                    if (name == INPUT_NAME || name == MEM_NAME) && !op.operands[1].ty.accepts(ValueType::Str) {
                        diagnostics.report(line, format!("{name} must be set to a string"));
                    }
                }
            }
            _ => {}
        }
    }
}

fn check(expr: &Expr, line: usize, diagnostics: &mut Diagnostics) {
    match &expr.kind {
        ExprKind::Literal(_) | ExprKind::Variable(_) => {}
        ExprKind::Grouping(inner) => check(inner, line, diagnostics),
        ExprKind::Call(_, args) => args.iter().for_each(|a| check(a, line, diagnostics)),
        ExprKind::Unary(op, operand) => {
            check(operand, line, diagnostics);
            let (expected, verb) = match op {
                UnaryOperator::Negate => (ValueType::Int, "negate"),
                UnaryOperator::Not => (ValueType::Bool, "not"),
            };
            if !operand.ty.accepts(expected) {
                diagnostics.report(line, format!("Cannot {verb} type {}", operand.ty));
            }
        }
        ExprKind::Index(target, args) => {
            check(target, line, diagnostics);
            args.iter().for_each(|a| check(a, line, diagnostics));
            if !args.iter().all(|a| a.ty.accepts(ValueType::Int)) {
                diagnostics.report(line, "Cannot index with non-integer type");
            }
            if !matches!(target.ty, ValueType::Str | ValueType::StrArray | ValueType::Unknown) {
                diagnostics.report(line, format!("Cannot index into type {}", target.ty));
            }
        }
        ExprKind::Binary(left, op, right) => {
            check(left, line, diagnostics);
            check(right, line, diagnostics);
            let (l, r) = (left.ty, right.ty);
            match op {
                Operator::Equal | Operator::NotEqual => {}
                Operator::And | Operator::Or => {
                    if !l.accepts(ValueType::Bool) || !r.accepts(ValueType::Bool) {
                        diagnostics.report(
                            line,
                            format!("Operator {} requires bool operands, found {l} and {r}", op.symbol()),
                        );
                    }
                }
                Operator::Addition => {
                    if l == ValueType::Bool || r == ValueType::Bool {
                        diagnostics.report(line, "Arguments must be either int, string or string[]");
                    } else if !l.accepts(expr.ty) || !r.accepts(expr.ty) {
                        diagnostics.report(line, format!("Cannot add {l} and {r}"));
                    }
                }
                _ => {
                    if !l.accepts(ValueType::Int) || !r.accepts(ValueType::Int) {
                        diagnostics.report(
                            line,
                            format!("Operator {} requires int operands, found {l} and {r}", op.symbol()),
                        );
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::tokenizer::tokenize;

    fn run(source: &str) -> (Vec<Option<Operation>>, Vec<String>) {
        let mut diagnostics = Diagnostics::new();
        let lines = tokenize(source, &mut diagnostics);
        let mut program = parse(source, &lines, &mut diagnostics);
        assert!(!diagnostics.has_errors(), "{diagnostics:?}");
        validate(&mut program, &mut diagnostics);
        let errors = diagnostics.iter().map(|d| d.to_string()).collect();
        (program, errors)
    }

    fn errors(source: &str) -> Vec<String> {
        run(source).1
    }

    fn value_type(program: &[Option<Operation>], line: usize, operand: usize) -> ValueType {
        program[line].as_ref().expect("operation").operands[operand].ty
    }

    #[test]
    fn unbalanced_if_endif() {
        assert_eq!(errors("ENDIF;"), vec!["line 1: IF statements do not match ENDIF statements"]);
        assert_eq!(
            errors("IF TRUE;\nNOP;"),
            vec!["line 2: IF statements do not match ENDIF statements"]
        );
    }

    #[test]
    fn unknown_function_and_arity() {
        assert_eq!(errors("SET x = foo(1);"), vec!["line 1: Function foo does not exist"]);
        assert_eq!(
            errors("SET x = trim(\"a\", \"b\");"),
            vec!["line 1: trim takes 1 parameter(s) but was given 2"]
        );
    }

    #[test]
    fn same_type_in_both_arms_survives_merge() {
        let (program, errs) = run("IF input == \"go\";\nSET x = 1;\nELSE;\nSET x = 2;\nENDIF;\nSET y = x * 2;");
        assert!(errs.is_empty(), "{errs:?}");
        assert_eq!(value_type(&program, 5, 1), ValueType::Int);
        assert_eq!(program[5].as_ref().map(|op| op.operands[1].ty), Some(ValueType::Int));
        let ExprKind::Binary(left, _, _) = &program[5].as_ref().unwrap().operands[1].kind else {
            panic!("expected binary");
        };
        assert_eq!(left.ty, ValueType::Int);
    }

    #[test]
    fn conflicting_arms_become_unknown() {
        let (program, errs) = run("IF TRUE;\nSET x = 1;\nELSE;\nSET x = \"a\";\nENDIF;\nSET y = 10 / x;");
        assert!(errs.is_empty(), "{errs:?}");
        let ExprKind::Binary(_, _, divisor) = &program[5].as_ref().unwrap().operands[1].kind else {
            panic!("expected binary");
        };
        assert_eq!(divisor.ty, ValueType::Unknown);
    }

    #[test]
    fn one_armed_assignment_keeps_its_type() {
        let (program, errs) = run("IF TRUE;\nSET z = \"a\";\nENDIF;\nPRINT 0, z;");
        assert!(errs.is_empty(), "{errs:?}");
        assert_eq!(value_type(&program, 3, 1), ValueType::Str);
    }

    #[test]
    fn merge_writes_into_enclosing_else_arm() {
        let source = "IF TRUE;\nSET a = 1;\nELSE;\nIF TRUE;\nSET a = \"s\";\nENDIF;\nSET b = a;\nENDIF;";
        let (program, errs) = run(source);
        assert!(errs.is_empty(), "{errs:?}");
        assert_eq!(value_type(&program, 6, 1), ValueType::Str);
    }

    #[test]
    fn arithmetic_rejects_strings() {
        assert_eq!(
            errors("SET x = \"a\" * 2;"),
            vec!["line 1: Operator * requires int operands, found string and int"]
        );
        assert_eq!(errors("SET x = \"a\" + 1;"), vec!["line 1: Cannot add string and int"]);
        assert_eq!(
            errors("SET x = TRUE + TRUE;"),
            vec!["line 1: Arguments must be either int, string or string[]"]
        );
        assert_eq!(
            errors("SET x = 1 AND TRUE;"),
            vec!["line 1: Operator AND requires bool operands, found int and bool"]
        );
    }

    #[test]
    fn unary_operand_types() {
        assert_eq!(errors("SET x = -\"a\";"), vec!["line 1: Cannot negate type string"]);
        assert_eq!(errors("SET x = !1;"), vec!["line 1: Cannot not type int"]);
    }

    #[test]
    fn index_types() {
        let (program, errs) = run("SET a = split(\",\", input);\nSET b = a[0];\nSET c = a[0:1];\nSET d = input[1];");
        assert!(errs.is_empty(), "{errs:?}");
        assert_eq!(value_type(&program, 0, 1), ValueType::StrArray);
        assert_eq!(value_type(&program, 1, 1), ValueType::Str);
        assert_eq!(value_type(&program, 2, 1), ValueType::StrArray);
        assert_eq!(value_type(&program, 3, 1), ValueType::Str);
        assert_eq!(errors("SET b = input[\"x\"];"), vec!["line 1: Cannot index with non-integer type"]);
        assert_eq!(errors("SET n = 3;\nSET b = n[0];"), vec!["line 2: Cannot index into type int"]);
    }

    #[test]
    fn print_payload_rules() {
        let (program, errs) = run("PRINT 0, 5;");
        assert!(errs.is_empty(), "{errs:?}");
        let payload = &program[0].as_ref().unwrap().operands[1];
        assert!(matches!(&payload.kind, ExprKind::Call(name, _) if name == "to_string"));
        assert_eq!(payload.ty, ValueType::Str);

        assert_eq!(errors("PRINT 0, TRUE;"), vec!["line 1: PRINT must be of the form: PRINT <int>, <string>"]);
        assert_eq!(errors("PRINT \"a\", \"b\";"), vec!["line 1: PRINT must be of the form: PRINT <int>, <string>"]);
        assert!(errors("PRINT 0, never_set;").is_empty());
    }

    #[test]
    fn reserved_variables_hold_strings() {
        assert_eq!(errors("SET mem = 1;"), vec!["line 1: mem must be set to a string"]);
        assert!(errors("SET mem = input + \"!\";").is_empty());
    }
}
