//! This module defines the core data structures shared by the dialect parsers,
//! the semantic analyzer, and the execution engine: the band alphabet, head
//! movement, the transition table, and program diagnostics.

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Number of positions on the physical band.
pub const DEFAULT_BAND_LENGTH: usize = 16;
/// Motor micro-steps between two adjacent band positions.
pub const DEFAULT_STEPS_PER_POSITION: u32 = 64;
/// Toggle attempts per write before the band counts as unresponsive.
pub const DEFAULT_TOGGLE_RETRIES: u32 = 5;

/// The name of a machine state, as written in program text.
pub type StateId = String;

/// The composite lookup key of the transition table.
pub type TransitionKey = (StateId, RawSymbol);

/// A symbol on the ternary band.
///
/// Positions physically render as red (`Zero`), blue (`One`), or unlit
/// (`Blank`); translating symbols to colors is the hardware driver's concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Symbol {
    Zero,
    One,
    Blank,
}

impl Symbol {
    /// All band symbols, in the order the analyzer reports missing
    /// transitions.
    pub const ALL: [Symbol; 3] = [Symbol::Zero, Symbol::One, Symbol::Blank];

    /// Maps a source token to a band symbol: `0`, `1`, and `_` or an empty
    /// token for the blank symbol. Surrounding single quotes are stripped.
    pub fn from_token(token: &str) -> Option<Symbol> {
        match token.trim().trim_matches('\'').trim() {
            "0" => Some(Symbol::Zero),
            "1" => Some(Symbol::One),
            "_" | "" => Some(Symbol::Blank),
            _ => None,
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = match self {
            Symbol::Zero => '0',
            Symbol::One => '1',
            Symbol::Blank => '_',
        };
        write!(f, "{c}")
    }
}

/// A head movement command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Move {
    Left,
    Right,
    Hold,
}

impl Move {
    /// Maps a flat-dialect operator (`<`, `>`, `-`) to a movement.
    pub fn from_operator(op: &str) -> Option<Move> {
        match op.trim() {
            "<" => Some(Move::Left),
            ">" => Some(Move::Right),
            "-" => Some(Move::Hold),
            _ => None,
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = match self {
            Move::Left => '<',
            Move::Right => '>',
            Move::Hold => '-',
        };
        write!(f, "{c}")
    }
}

/// A symbol as it was written in program text.
///
/// Tokens that do not map to a band symbol survive parsing verbatim as
/// `Other` and are rejected by the semantic analyzer, not by the parsers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RawSymbol {
    Symbol(Symbol),
    Other(String),
}

impl RawSymbol {
    /// Maps a source token, falling back to the verbatim token.
    pub fn from_token(token: &str) -> RawSymbol {
        match Symbol::from_token(token) {
            Some(symbol) => RawSymbol::Symbol(symbol),
            None => RawSymbol::Other(token.trim().trim_matches('\'').to_string()),
        }
    }

    /// The band symbol, if the token mapped to one.
    pub fn symbol(&self) -> Option<Symbol> {
        match self {
            RawSymbol::Symbol(symbol) => Some(*symbol),
            RawSymbol::Other(_) => None,
        }
    }
}

impl From<Symbol> for RawSymbol {
    fn from(symbol: Symbol) -> Self {
        RawSymbol::Symbol(symbol)
    }
}

impl fmt::Display for RawSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawSymbol::Symbol(symbol) => symbol.fmt(f),
            RawSymbol::Other(token) => f.write_str(token),
        }
    }
}

/// A single transition rule.
///
/// Looked up by `(current_state, read_symbol)`; yields the next state, the
/// symbol to write at the current position, and a head movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub next_state: StateId,
    pub write: RawSymbol,
    pub movement: Move,
}

/// Accumulated findings about a program.
///
/// Errors make the program unrunnable; warnings are informational. Both
/// lists preserve the order in which the findings were produced, which for
/// identical input is the same on every run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl Diagnostics {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// A parsed Turing machine program.
///
/// Built by the dialect parsers, annotated by the semantic analyzer, and
/// immutable afterwards. A program whose diagnostics contain errors must
/// never reach the execution engine; `Engine::new` enforces this.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    pub name: String,
    pub initial_state: StateId,
    pub accept_states: IndexSet<StateId>,
    /// Transition table in source order. Keys are unique; a duplicate
    /// definition in the source overwrites the earlier one.
    pub transitions: IndexMap<TransitionKey, Transition>,
    pub diagnostics: Diagnostics,
}

impl Program {
    /// Looks up the transition for a state and an observed band symbol.
    pub fn transition(&self, state: &str, symbol: Symbol) -> Option<&Transition> {
        self.transitions
            .get(&(state.to_owned(), RawSymbol::Symbol(symbol)))
    }

    /// Source states in order of first appearance.
    pub fn source_states(&self) -> IndexSet<&str> {
        self.transitions
            .keys()
            .map(|(state, _)| state.as_str())
            .collect()
    }

    /// Next states in order of first appearance.
    pub fn next_states(&self) -> IndexSet<&str> {
        self.transitions
            .values()
            .map(|transition| transition.next_state.as_str())
            .collect()
    }

    /// True when the program may be handed to the execution engine.
    pub fn is_runnable(&self) -> bool {
        self.diagnostics.is_clean()
    }
}

/// A malformed piece of program text.
///
/// Recoverable: the offending record is skipped and parsing continues, but
/// the program is still rejected while any of these remain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("syntax error (line {line}): {message}")]
pub struct SyntaxError {
    pub line: usize,
    pub message: String,
}

impl SyntaxError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_mapping() {
        assert_eq!(Symbol::from_token("0"), Some(Symbol::Zero));
        assert_eq!(Symbol::from_token("1"), Some(Symbol::One));
        assert_eq!(Symbol::from_token("_"), Some(Symbol::Blank));
        assert_eq!(Symbol::from_token(""), Some(Symbol::Blank));
        assert_eq!(Symbol::from_token("' '"), Some(Symbol::Blank));
        assert_eq!(Symbol::from_token("'1'"), Some(Symbol::One));
        assert_eq!(Symbol::from_token("x"), None);
    }

    #[test]
    fn test_raw_symbol_keeps_unmapped_tokens() {
        assert_eq!(
            RawSymbol::from_token("0"),
            RawSymbol::Symbol(Symbol::Zero)
        );
        assert_eq!(
            RawSymbol::from_token("abc"),
            RawSymbol::Other("abc".to_string())
        );
        assert_eq!(RawSymbol::from_token("abc").symbol(), None);
    }

    #[test]
    fn test_move_operators() {
        assert_eq!(Move::from_operator("<"), Some(Move::Left));
        assert_eq!(Move::from_operator(">"), Some(Move::Right));
        assert_eq!(Move::from_operator("-"), Some(Move::Hold));
        assert_eq!(Move::from_operator("R"), None);
    }

    #[test]
    fn test_display_round_trip() {
        for symbol in Symbol::ALL {
            assert_eq!(Symbol::from_token(&symbol.to_string()), Some(symbol));
        }
        for movement in [Move::Left, Move::Right, Move::Hold] {
            assert_eq!(
                Move::from_operator(&movement.to_string()),
                Some(movement)
            );
        }
    }

    #[test]
    fn test_program_transition_lookup() {
        let mut program = Program::default();
        program.transitions.insert(
            ("s0".to_string(), RawSymbol::Symbol(Symbol::Zero)),
            Transition {
                next_state: "s1".to_string(),
                write: RawSymbol::Symbol(Symbol::One),
                movement: Move::Right,
            },
        );

        let hit = program.transition("s0", Symbol::Zero);
        assert!(hit.is_some());
        assert_eq!(hit.map(|t| t.next_state.as_str()), Some("s1"));
        assert!(program.transition("s0", Symbol::One).is_none());
        assert!(program.transition("s1", Symbol::Zero).is_none());
    }

    #[test]
    fn test_syntax_error_display() {
        let error = SyntaxError::new(7, "malformed transition record: a,b");
        assert_eq!(
            error.to_string(),
            "syntax error (line 7): malformed transition record: a,b"
        );
    }
}
