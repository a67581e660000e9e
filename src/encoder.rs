//! This module renders a program back to canonical flat-dialect text, so
//! programs can be stored or shared in one normalized form regardless of
//! the dialect they were written in.

use crate::parser::{parse, Dialect};
use crate::types::{Program, SyntaxError};

/// Encodes a program as flat-dialect text.
///
/// Configuration lines come first, then one two-line record per transition
/// in table order. Decoding the result yields the same transition table.
pub fn encode(program: &Program) -> String {
    let mut out = String::new();
    if !program.name.is_empty() {
        out.push_str("name: ");
        out.push_str(&program.name);
        out.push('\n');
    }
    out.push_str("init: ");
    out.push_str(&program.initial_state);
    out.push('\n');
    if !program.accept_states.is_empty() {
        let accept: Vec<&str> = program.accept_states.iter().map(String::as_str).collect();
        out.push_str("accept: ");
        out.push_str(&accept.join(", "));
        out.push('\n');
    }

    for ((state, read), transition) in &program.transitions {
        out.push('\n');
        out.push_str(&format!("{state}, {read}\n"));
        out.push_str(&format!(
            "{}, {}, {}\n",
            transition.next_state, transition.write, transition.movement
        ));
    }

    out
}

/// Parses flat-dialect text, typically produced by `encode`.
pub fn decode(input: &str) -> (Program, Vec<SyntaxError>) {
    parse(input, Dialect::Flat)
}
