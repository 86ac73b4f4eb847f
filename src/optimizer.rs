use crate::error::Diagnostics;
use crate::grammar::{Expr, ExprKind, Operation, Operator};
use crate::native;
use crate::value::Value;

/// Folds constant sub-expressions in place, one line at a time.
///
/// Operators and calls whose operands are all literals are evaluated now.
/// A native call that fails on literal arguments is a compile error on its
/// line. Division by a literal zero is left for the VM to report.
pub fn optimize(program: &mut [Option<Operation>], diagnostics: &mut Diagnostics) {
    let mut folded = 0usize;
    for (line, op) in program.iter_mut().enumerate() {
        let Some(op) = op else { continue };
        for expr in &mut op.operands {
            if let Err(message) = fold(expr, &mut folded) {
                diagnostics.report(line, message);
            }
        }
    }
    tracing::debug!(folded, "optimized");
}

fn fold(expr: &mut Expr, folded: &mut usize) -> Result<(), String> {
    let value = match &mut expr.kind {
        ExprKind::Literal(_) | ExprKind::Variable(_) => return Ok(()),
        ExprKind::Grouping(inner) => {
            fold(inner, folded)?;
            let inner = std::mem::replace(inner.as_mut(), Expr::literal(false));
            *expr = inner;
            return Ok(());
        }
        ExprKind::Index(_, args) => {
            for arg in args.iter_mut() {
                fold(arg, folded)?;
            }
            return Ok(());
        }
        ExprKind::Unary(op, operand) => {
            fold(operand, folded)?;
            let Some(value) = operand.as_literal() else {
                return Ok(());
            };
            Value::unary(*op, value.clone()).map_err(|e| e.to_string())?
        }
        ExprKind::Binary(left, op, right) => {
            fold(left, folded)?;
            fold(right, folded)?;
            let (Some(l), Some(r)) = (left.as_literal(), right.as_literal()) else {
                return Ok(());
            };
            if *op == Operator::Division && *r == Value::Int(0) {
                return Ok(());
            }
            Value::binary(*op, l.clone(), r.clone()).map_err(|e| e.to_string())?
        }
        ExprKind::Call(name, args) => {
            for arg in args.iter_mut() {
                fold(arg, folded)?;
            }
            let Some(values) = args.iter().map(|a| a.as_literal().cloned()).collect::<Option<Vec<_>>>() else {
                return Ok(());
            };
            let Some((_, function)) = native::generic(name) else {
                return Ok(());
            };
            (function.func)(&values)?
        }
    };
    *expr = Expr::literal(value);
    *folded += 1;
    Ok(())
}
