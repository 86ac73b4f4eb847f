//! Shared helpers for NodeScript integration tests.
//!
//! In a test file:
//! ```ignore
//! mod common;
//! use common::*;
//! ```

#[allow(unused_imports)]
pub use nodescript::{NodeId, RunOutcome, RuntimeError, RuntimeErrorKind, Script, ScriptError};

/// Builds `input -> regular(source) -> output` and compiles it.
///
/// Returns the script and the id of the regular node.
pub fn pipeline(source: &str, data: &str) -> (Script, NodeId) {
    let mut script = Script::new();
    let input = script.add_input_node(data).unwrap();
    let node = script.add_regular_node(source);
    let output = script.add_output_node().unwrap();
    script.connect_nodes(input, node).unwrap();
    script.connect_nodes(node, output).unwrap();
    if let Err(e) = script.compile_nodes() {
        panic!("compile failed: {e:?}");
    }
    (script, node)
}

/// Runs `source` over `data` and returns what reached the output node.
#[must_use]
#[allow(dead_code)]
pub fn run_source(source: &str, data: &str) -> String {
    let (mut script, _) = pipeline(source, data);
    assert_eq!(script.run().unwrap(), RunOutcome::Finished);
    script.output()
}

/// Compile error messages for `source`, or an empty list if it compiles.
#[allow(dead_code)]
pub fn compile_errors(source: &str) -> Vec<String> {
    match nodescript::compile(source) {
        Ok(_) => Vec::new(),
        Err(e) => e.diagnostics.iter().map(|d| d.to_string()).collect(),
    }
}
