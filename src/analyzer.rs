//! This module provides the semantic analyzer that validates a parsed
//! program for completeness, reachability, and structural soundness before
//! it may be executed.
//!
//! Findings are appended to the program's diagnostics in place. Errors are
//! fatal (the engine refuses the program); warnings are informational. All
//! checks iterate the transition table in source order, so identical input
//! produces identical diagnostics in identical order.

use crate::types::{Program, RawSymbol, Symbol};

/// Analyzes a program and records every finding in its diagnostics.
///
/// The checks, in order:
///
/// 1. every source state handles all three band symbols (errors);
/// 2. the initial state appears as a transition source (error);
/// 3. every accept state is entered by some transition (error);
/// 4. next states that are neither sources nor accept states act as
///    non-accepting sinks (warning, once per state);
/// 5. source states that are never entered and are not the initial state
///    are unused (warning, once per state);
/// 6. accept states have no outgoing transitions (error);
/// 7. every read and write symbol is a band symbol (error).
pub fn analyze(program: &mut Program) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    check_completeness(program, &mut errors);
    check_initial_state(program, &mut errors);
    check_accept_reachability(program, &mut errors);
    check_dangling_next_states(program, &mut warnings);
    check_isolated_states(program, &mut warnings);
    check_accept_terminal(program, &mut errors);
    check_alphabet(program, &mut errors);

    program.diagnostics.errors.extend(errors);
    program.diagnostics.warnings.extend(warnings);
}

/// Every `(state, symbol)` combination of a source state must exist.
fn check_completeness(program: &Program, errors: &mut Vec<String>) {
    for state in program.source_states() {
        for symbol in Symbol::ALL {
            if program.transition(state, symbol).is_none() {
                errors.push(format!(
                    "missing transition for state '{state}' and symbol '{symbol}'"
                ));
            }
        }
    }
}

/// The initial state must be defined as a transition source.
fn check_initial_state(program: &Program, errors: &mut Vec<String>) {
    let initial = &program.initial_state;
    if !program.source_states().contains(initial.as_str()) {
        errors.push(format!(
            "initial state '{initial}' is not defined by any transition"
        ));
    }
}

/// Every declared accept state must be some transition's next state.
fn check_accept_reachability(program: &Program, errors: &mut Vec<String>) {
    let next_states = program.next_states();
    for accept in &program.accept_states {
        if !next_states.contains(accept.as_str()) {
            errors.push(format!(
                "accept state '{accept}' is never entered by any transition"
            ));
        }
    }
}

/// A next state that is neither a source nor an accept state acts as an
/// implicit non-accepting sink.
fn check_dangling_next_states(program: &Program, warnings: &mut Vec<String>) {
    let sources = program.source_states();
    let mut seen = indexmap::IndexSet::new();
    for transition in program.transitions.values() {
        let next = transition.next_state.as_str();
        if !sources.contains(next)
            && !program.accept_states.contains(next)
            && seen.insert(next)
        {
            warnings.push(format!(
                "next state '{next}' is neither defined nor an accept state \
                 and will act as a non-accepting sink"
            ));
        }
    }
}

/// A source state that is never entered and is not the initial state is
/// unused.
fn check_isolated_states(program: &Program, warnings: &mut Vec<String>) {
    let next_states = program.next_states();
    for state in program.source_states() {
        if state != program.initial_state && !next_states.contains(state) {
            warnings.push(format!("state '{state}' is defined but never entered"));
        }
    }
}

/// Acceptance is terminal: an accept state must not have outgoing
/// transitions.
fn check_accept_terminal(program: &Program, errors: &mut Vec<String>) {
    let sources = program.source_states();
    for accept in &program.accept_states {
        if sources.contains(accept.as_str()) {
            errors.push(format!("accept state '{accept}' has outgoing transitions"));
        }
    }
}

/// Read and write symbols must belong to the band alphabet.
fn check_alphabet(program: &Program, errors: &mut Vec<String>) {
    for ((state, read), transition) in &program.transitions {
        if let RawSymbol::Other(token) = read {
            errors.push(format!(
                "symbol '{token}' read in state '{state}' is not allowed; use '0', '1' or '_'"
            ));
        }
        if let RawSymbol::Other(token) = &transition.write {
            errors.push(format!(
                "write symbol '{token}' in state '{state}' is not allowed; use '0', '1' or '_'"
            ));
        }
    }
}
