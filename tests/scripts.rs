//! Whole scripts driven through the node graph.

mod common;

use common::*;
use nodescript::grammar::OpCode;
use nodescript::{RunOptions, Value, ValueType};

const BRANCHING: &str = "\
SET x = 0;
IF input == \"go\";
SET x = 1;
ELSE;
SET x = 2;
ENDIF;
PRINT 0, x;
RETURN;";

// =============================================================================
// Language behaviour
// =============================================================================

#[test]
fn branching_scenario() {
    assert_eq!(run_source(BRANCHING, "go"), "1\n");
    assert_eq!(run_source(BRANCHING, "stop"), "2\n");
    assert_eq!(run_source(BRANCHING, "go\nstop\ngo"), "1\n2\n1\n");
}

#[test]
fn constant_folding_leaves_no_arithmetic() {
    let chunk = nodescript::compile("SET x = 2 + 3;").unwrap();
    assert_eq!(chunk.constants, vec![Value::Int(5)]);
    assert!(!chunk.code.contains(&(OpCode::AddI as u8)));
    assert!(!chunk.code.contains(&(OpCode::Add as u8)));

    let chunk = nodescript::compile("PRINT 0, \"a\" + \"b\";").unwrap();
    assert_eq!(chunk.constants, vec![Value::Int(0), Value::from("ab")]);
    assert!(!chunk.code.contains(&(OpCode::AddS as u8)));
}

#[test]
fn string_functions() {
    let source = "\
SET parts = split(\",\", input);
SET text = trim(input);
PRINT 0, join(\"-\", parts);
PRINT 0, parts[1];
PRINT 0, to_string(length(parts)) + \" \" + text[0:3];";
    assert_eq!(run_source(source, "ab, c,,d "), "ab-c-d\nc\n3 ab,\n");
}

#[test]
fn mem_accumulates_across_invocations() {
    let source = "SET mem = mem + input;\nPRINT 0, mem;";
    assert_eq!(run_source(source, "a\nb\nc"), "a\nab\nabc\n");
}

#[test]
fn comments_and_blank_lines_keep_line_numbers() {
    let source = "// leading comment\n\nSET x = 1; // trailing\nPRINT 0, to_string(x / 0);";
    let (mut script, node) = pipeline(source, "go");
    script.run().unwrap();
    assert_eq!(script.runtime_errors()[0], (node, RuntimeError { line: 4, kind: RuntimeErrorKind::DivisionByZero }));
}

// =============================================================================
// Runtime errors
// =============================================================================

#[test]
fn division_by_zero_reports_its_line_and_prints_nothing() {
    let (mut script, node) = pipeline("PRINT 0, 10 / 0;", "x");
    assert_eq!(script.run().unwrap(), RunOutcome::Finished);

    assert_eq!(script.output(), "");
    let [(id, error)] = script.runtime_errors() else {
        panic!("expected one error, got {:?}", script.runtime_errors());
    };
    assert_eq!(*id, node);
    assert_eq!(error.line, 1);
    assert_eq!(error.kind, RuntimeErrorKind::DivisionByZero);
}

#[test]
fn uninitialized_read_is_not_a_type_error() {
    let (mut script, _) = pipeline("PRINT 0, y;", "x");
    script.run().unwrap();

    let (_, error) = &script.runtime_errors()[0];
    assert_eq!(error.kind, RuntimeErrorKind::Uninitialized("y".into()));
    assert!(error.to_string().contains("not yet initialized"));
    assert!(!matches!(error.kind, RuntimeErrorKind::TypeMismatch { .. }));
}

#[test]
fn merged_branch_types_are_checked_at_runtime() {
    let source = "\
IF input == \"n\";
SET x = 2;
ELSE;
SET x = \"s\";
ENDIF;
SET y = 10 / x;
PRINT 0, to_string(y);";
    assert!(compile_errors(source).is_empty());

    let (mut script, _) = pipeline(source, "n\ns");
    script.run().unwrap();
    assert_eq!(script.output(), "5\n");
    let (_, error) = &script.runtime_errors()[0];
    assert_eq!(error.line, 6);
    assert_eq!(error.kind, RuntimeErrorKind::TypeMismatch { expected: ValueType::Int, found: ValueType::Str });
}

#[test]
fn panicked_node_stays_down_until_reset() {
    let (mut script, node) = pipeline("SET n = parse_int(input);\nPRINT 0, n;", "1\nx\n2");
    assert_eq!(script.run().unwrap(), RunOutcome::Finished);
    assert_eq!(script.output(), "1\n");
    assert!(script.is_panicked(node).unwrap());
    assert_eq!(script.runtime_errors().len(), 1);

    script.reset();
    script.update_data(0, "3\n4").unwrap();
    assert_eq!(script.run().unwrap(), RunOutcome::Finished);
    assert_eq!(script.output(), "3\n4\n");
    assert!(script.runtime_errors().is_empty());
}

// =============================================================================
// Compile errors
// =============================================================================

#[test]
fn unmatched_else_and_endif_produce_no_bytecode() {
    for source in ["ELSE;", "IF TRUE;\nENDIF;\nENDIF;", "IF TRUE;\nNOP;", "IF TRUE;\nELSE;\nELSE;\nENDIF;"] {
        assert!(nodescript::compile(source).is_err(), "{source:?} compiled");
    }
    assert_eq!(compile_errors("ELSE;"), vec!["line 1: ELSE without corresponding IF"]);
    assert_eq!(
        compile_errors("IF TRUE;\nENDIF;\nENDIF;"),
        vec!["line 3: IF statements do not match ENDIF statements"]
    );
}

#[test]
fn compile_failure_is_attributed_to_its_node() {
    let mut script = Script::new();
    let input = script.add_input_node("").unwrap();
    let node = script.add_regular_node("SET x = length(1, 2);");
    script.connect_nodes(input, node).unwrap();

    let Err(ScriptError::Compile { node: failed, source }) = script.compile_nodes() else {
        panic!("expected a compile error");
    };
    assert_eq!(failed, node);
    assert_eq!(source.messages().collect::<Vec<_>>(), vec!["length takes 1 parameter(s) but was given 2"]);
}

// =============================================================================
// Scheduling and backpressure
// =============================================================================

#[test]
fn blocked_print_resumes_without_repeating_the_line() {
    // the consumer needs three ticks per message, so the producer parks on
    // its PRINT; mem must still grow by exactly one input per invocation
    let mut script = Script::new();
    let input = script.add_input_node("a\nb\nc").unwrap();
    let producer = script.add_regular_node("SET mem = mem + input;\nPRINT 0, mem;");
    let consumer = script.add_regular_node("SET a = 1;\nSET b = a;\nPRINT 0, input;");
    let output = script.add_output_node().unwrap();
    script.connect_nodes(input, producer).unwrap();
    script.connect_nodes(producer, consumer).unwrap();
    script.connect_nodes(consumer, output).unwrap();
    script.compile_nodes().unwrap();

    assert_eq!(script.run().unwrap(), RunOutcome::Finished);
    assert_eq!(script.output(), "a\nab\nabc\n");
}

#[test]
fn combiner_merges_two_producers() {
    let mut script = Script::new();
    let input = script.add_input_node("a\nb\nc").unwrap();
    let fan_out = script.add_regular_node("PRINT 0, input;\nPRINT 1, input;");
    let left = script.add_regular_node("PRINT 0, \"L:\" + input;");
    let right = script.add_regular_node("PRINT 0, \"R:\" + input;");
    let combiner = script.add_combiner_node();
    let output = script.add_output_node().unwrap();
    script.connect_nodes(input, fan_out).unwrap();
    script.connect_nodes(fan_out, left).unwrap();
    script.connect_nodes(fan_out, right).unwrap();
    script.connect_nodes(left, combiner).unwrap();
    script.connect_nodes(right, combiner).unwrap();
    script.connect_nodes(combiner, output).unwrap();
    script.compile_nodes().unwrap();

    assert_eq!(script.run().unwrap(), RunOutcome::Finished);
    let text = script.output();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 6, "{text}");

    let from_left: Vec<&str> = lines.iter().filter_map(|l| l.strip_prefix("L:")).collect();
    let from_right: Vec<&str> = lines.iter().filter_map(|l| l.strip_prefix("R:")).collect();
    assert_eq!(from_left, vec!["a", "b", "c"]);
    assert_eq!(from_right, vec!["a", "b", "c"]);
    assert!(script.runtime_errors().is_empty());
}

#[test]
fn one_line_per_tick() {
    let (mut script, node) = pipeline("SET a = 1;\nSET b = 2;\nPRINT 0, input;", "q");

    let outcome = script.run_with(RunOptions { max_ticks: Some(2) }).unwrap();
    assert_eq!(outcome, RunOutcome::TickLimit);
    assert_eq!(script.current_line(node).unwrap(), 2);
    assert_eq!(script.output(), "");

    assert_eq!(script.run().unwrap(), RunOutcome::Finished);
    assert_eq!(script.output(), "q\n");
}

#[test]
fn graph_edits_require_recompilation() {
    let (mut script, node) = pipeline("PRINT 0, input;", "x");
    script.run().unwrap();

    let extra = script.add_regular_node("PRINT 0, input;");
    assert!(matches!(script.run(), Err(ScriptError::NotCompiled)));
    assert!(matches!(script.connect_nodes(node, extra), Ok(())));
    script.compile_nodes().unwrap();
    assert_eq!(script.output(), "");
}
