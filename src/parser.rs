//! This module provides the two dialect front ends that turn raw program
//! text into a `Program` plus a list of recoverable, line-numbered syntax
//! errors.
//!
//! File structure (comments, sections, record continuation across physical
//! lines) is handled by plain line scanners; the record-level syntax of each
//! dialect is parsed with `pest` against `grammar.pest`. A record that fails
//! to parse produces a `SyntaxError` for its line and is skipped — parsing
//! always continues to the end of the input.

use crate::types::{
    Move, Program, RawSymbol, StateId, Symbol, SyntaxError, Transition, TransitionKey,
};
use pest::iterators::Pair;
use pest::Parser as PestParser;
use pest_derive::Parser as PestParser;

/// Derives the pest parser for the record-level grammar of both dialects.
#[derive(PestParser)]
#[grammar = "grammar.pest"]
pub struct RecordParser;

/// The two supported program-text grammars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// Sectioned `start state:` / `accept states:` / `table:` syntax with
    /// per-state blocks and bracketed symbol sets.
    Tabular,
    /// `name:` / `init:` / `accept:` configuration lines followed by
    /// 5-field comma-joined transition records.
    Flat,
}

/// Parses the given input into a `Program`.
///
/// Syntax errors are recoverable per record: each one is reported with its
/// line number and the record is skipped. They are also mirrored into the
/// program's diagnostics, so a program that produced any syntax error is
/// not runnable. Semantic validation is a separate pass (`analyzer`).
///
/// # Arguments
///
/// * `input` - The program text.
/// * `dialect` - The grammar the text is written in.
///
/// # Returns
///
/// The parsed program together with all syntax errors encountered.
pub fn parse(input: &str, dialect: Dialect) -> (Program, Vec<SyntaxError>) {
    let mut program = Program::default();
    let mut errors = Vec::new();

    match dialect {
        Dialect::Tabular => parse_tabular(input, &mut program, &mut errors),
        Dialect::Flat => parse_flat(input, &mut program, &mut errors),
    }

    for error in &errors {
        program.diagnostics.errors.push(error.to_string());
    }
    check_structure(&mut program, dialect);

    (program, errors)
}

/// Structural requirements checked once the whole input was consumed.
///
/// The tabular dialect carries no name line (callers name the program after
/// its source) and declares accept states optionally.
fn check_structure(program: &mut Program, dialect: Dialect) {
    if dialect == Dialect::Flat && program.name.is_empty() {
        program
            .diagnostics
            .errors
            .push("program name is missing".to_string());
    }
    if program.initial_state.is_empty() {
        program
            .diagnostics
            .errors
            .push("initial state is missing".to_string());
    }
    if dialect == Dialect::Flat && program.accept_states.is_empty() {
        program
            .diagnostics
            .errors
            .push("no accept states declared".to_string());
    }
    if program.transitions.is_empty() {
        program
            .diagnostics
            .errors
            .push("no transitions defined".to_string());
    }
}

// ---- tabular dialect -------------------------------------------------

fn parse_tabular(input: &str, program: &mut Program, errors: &mut Vec<SyntaxError>) {
    let mut in_table = false;
    let mut current_state: Option<StateId> = None;

    for (index, raw_line) in input.lines().enumerate() {
        let line_no = index + 1;
        // `#` comments are stripped before tokenizing.
        let line = raw_line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }

        if let Some(value) = line.strip_prefix("start state:") {
            program.initial_state = value.trim().to_string();
            continue;
        }
        if let Some(value) = line.strip_prefix("accept states:") {
            insert_states(&mut program.accept_states, value);
            continue;
        }
        if line == "table:" {
            in_table = true;
            continue;
        }
        if !in_table {
            errors.push(SyntaxError::new(
                line_no,
                format!("unexpected line outside the table section: {line}"),
            ));
            continue;
        }

        // `ident:` opens a state block.
        if let Some(state) = parse_state_line(line) {
            current_state = Some(state);
            continue;
        }

        let Some(state) = current_state.clone() else {
            errors.push(SyntaxError::new(
                line_no,
                format!("table entry before any state block: {line}"),
            ));
            continue;
        };

        match parse_table_entry(line, &state) {
            Ok(entries) => {
                for (read, transition) in entries {
                    program.transitions.insert((state.clone(), read), transition);
                }
            }
            Err(message) => errors.push(SyntaxError::new(line_no, message)),
        }
    }
}

fn insert_states(set: &mut indexmap::IndexSet<StateId>, list: &str) {
    for state in list.split(',') {
        let state = state.trim();
        if !state.is_empty() {
            set.insert(state.to_string());
        }
    }
}

fn parse_state_line(line: &str) -> Option<StateId> {
    let mut pairs = RecordParser::parse(Rule::state_line, line).ok()?;
    let root = pairs.next()?;
    root.into_inner()
        .find(|pair| pair.as_rule() == Rule::identifier)
        .map(|pair| pair.as_str().to_string())
}

/// A table entry's right-hand side before it is bound to a read symbol.
struct TabularAction {
    /// `None` writes the read symbol back.
    write: Option<RawSymbol>,
    movement: Move,
    next_state: StateId,
}

impl TabularAction {
    fn bind(&self, read: &RawSymbol) -> Transition {
        Transition {
            next_state: self.next_state.clone(),
            write: self.write.clone().unwrap_or_else(|| read.clone()),
            movement: self.movement,
        }
    }
}

/// Parses one table entry line into one transition per symbol in its set.
fn parse_table_entry(
    line: &str,
    current_state: &str,
) -> Result<Vec<(RawSymbol, Transition)>, String> {
    let mut pairs = RecordParser::parse(Rule::entry_line, line)
        .map_err(|_| format!("invalid table entry: {line}"))?;
    let root = pairs
        .next()
        .ok_or_else(|| format!("invalid table entry: {line}"))?;

    let mut symbols = Vec::new();
    let mut instruction = None;
    for pair in root.into_inner() {
        match pair.as_rule() {
            Rule::symbol_set => symbols = parse_symbol_set(pair),
            Rule::instruction => instruction = Some(pair),
            _ => {}
        }
    }
    let instruction = instruction.ok_or_else(|| format!("invalid table entry: {line}"))?;
    let action = parse_instruction(instruction, current_state)?;

    Ok(symbols
        .into_iter()
        .map(|read| {
            let transition = action.bind(&read);
            (read, transition)
        })
        .collect())
}

/// Expands a bracketed symbol set; a single symbol yields one entry.
fn parse_symbol_set(pair: Pair<Rule>) -> Vec<RawSymbol> {
    let Some(inner) = pair.into_inner().next() else {
        return Vec::new();
    };
    match inner.as_rule() {
        Rule::bracket_set => inner
            .into_inner()
            .filter(|pair| pair.as_rule() == Rule::symbol)
            .map(|pair| RawSymbol::from_token(pair.as_str()))
            .collect(),
        Rule::symbol => vec![RawSymbol::from_token(inner.as_str())],
        _ => Vec::new(),
    }
}

fn parse_instruction(pair: Pair<Rule>, current_state: &str) -> Result<TabularAction, String> {
    let inner = pair
        .into_inner()
        .next()
        .ok_or_else(|| "empty instruction".to_string())?;
    match inner.as_rule() {
        // `R` / `L`: move without changing state or symbol.
        Rule::shorthand => Ok(TabularAction {
            write: None,
            movement: shorthand_move(inner.as_str()),
            next_state: current_state.to_string(),
        }),
        Rule::action => parse_action(inner, current_state),
        _ => Err("invalid instruction".to_string()),
    }
}

/// Parses `{write: <sym>, <L|R>[: <state>]}`.
///
/// An omitted write symbol writes the read symbol back; an omitted target
/// state keeps the current one.
fn parse_action(pair: Pair<Rule>, current_state: &str) -> Result<TabularAction, String> {
    let mut write = None;
    let mut movement = None;
    let mut next_state = None;

    for field in pair.into_inner() {
        let Some(field) = field.into_inner().next() else {
            continue;
        };
        match field.as_rule() {
            Rule::write_field => {
                let symbol = field
                    .into_inner()
                    .find(|pair| pair.as_rule() == Rule::symbol);
                write = Some(match symbol {
                    Some(pair) => RawSymbol::from_token(pair.as_str()),
                    None => RawSymbol::Symbol(Symbol::Blank),
                });
            }
            Rule::move_field => {
                let mut parts = field.into_inner();
                let letter = parts
                    .next()
                    .ok_or_else(|| "malformed move field".to_string())?;
                movement = Some(shorthand_move(letter.as_str()));
                next_state = Some(
                    parts
                        .find(|pair| pair.as_rule() == Rule::identifier)
                        .map_or_else(|| current_state.to_string(), |pair| {
                            pair.as_str().to_string()
                        }),
                );
            }
            _ => {}
        }
    }

    let movement = movement.ok_or_else(|| "action is missing a move".to_string())?;
    Ok(TabularAction {
        write,
        movement,
        next_state: next_state.unwrap_or_else(|| current_state.to_string()),
    })
}

fn shorthand_move(letter: &str) -> Move {
    if letter == "L" {
        Move::Left
    } else {
        Move::Right
    }
}

// ---- flat dialect ----------------------------------------------------

fn parse_flat(input: &str, program: &mut Program, errors: &mut Vec<SyntaxError>) {
    // A record's 5 fields may span one or two physical lines; the first
    // line is held here until the record is complete.
    let mut pending: Option<(usize, String)> = None;

    for (index, raw_line) in input.lines().enumerate() {
        let line_no = index + 1;
        let line = match raw_line.find("//") {
            Some(at) => &raw_line[..at],
            None => raw_line,
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(value) = line.strip_prefix("name:") {
            program.name = value.trim().to_string();
            continue;
        }
        if let Some(value) = line.strip_prefix("init:") {
            program.initial_state = value.trim().to_string();
            continue;
        }
        if let Some(value) = line.strip_prefix("accept:") {
            insert_states(&mut program.accept_states, value);
            continue;
        }

        let joined = match pending.take() {
            Some((start, first)) => (start, format!("{first},{line}")),
            None => (line_no, line.to_string()),
        };
        match joined.1.split(',').count() {
            count if count < 5 => pending = Some(joined),
            5 => match parse_record(&joined.1) {
                Ok((key, transition)) => {
                    program.transitions.insert(key, transition);
                }
                Err(message) => errors.push(SyntaxError::new(line_no, message)),
            },
            _ => errors.push(SyntaxError::new(
                line_no,
                format!("malformed transition record: {}", joined.1),
            )),
        }
    }

    if let Some((line_no, rest)) = pending {
        errors.push(SyntaxError::new(
            line_no,
            format!("incomplete transition record: {rest}"),
        ));
    }
}

/// Parses a joined `state, read, next_state, write, move` record.
fn parse_record(record: &str) -> Result<(TransitionKey, Transition), String> {
    let mut pairs = RecordParser::parse(Rule::record_line, record)
        .map_err(|_| format!("malformed transition record: {record}"))?;
    let root = pairs
        .next()
        .ok_or_else(|| format!("malformed transition record: {record}"))?;

    let mut idents: Vec<String> = Vec::new();
    let mut read = None;
    let mut write = None;
    let mut movement = None;
    for pair in root.into_inner() {
        match pair.as_rule() {
            Rule::identifier => idents.push(pair.as_str().to_string()),
            Rule::read_symbol => read = Some(RawSymbol::from_token(pair.as_str())),
            Rule::write_symbol => write = Some(RawSymbol::from_token(pair.as_str())),
            Rule::move_op => movement = Move::from_operator(pair.as_str()),
            _ => {}
        }
    }

    match (idents.first(), idents.get(1), read, write, movement) {
        (Some(state), Some(next_state), Some(read), Some(write), Some(movement)) => Ok((
            (state.clone(), read),
            Transition {
                next_state: next_state.clone(),
                write,
                movement,
            },
        )),
        _ => Err(format!("malformed transition record: {record}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Move, RawSymbol, Symbol};

    fn key(state: &str, symbol: Symbol) -> (String, RawSymbol) {
        (state.to_string(), RawSymbol::Symbol(symbol))
    }

    #[test]
    fn test_parse_tabular_program() {
        let input = r#"
# Walk right over the input.
start state: scan
accept states: stop

table:
  scan:
    [0, 1]: R          # shorthand keeps the state
    _: {write: _, L: stop}
"#;
        let (program, errors) = parse(input, Dialect::Tabular);
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(program.initial_state, "scan");
        assert!(program.accept_states.contains("stop"));
        assert_eq!(program.transitions.len(), 3);

        let zero = &program.transitions[&key("scan", Symbol::Zero)];
        assert_eq!(zero.next_state, "scan");
        assert_eq!(zero.write, RawSymbol::Symbol(Symbol::Zero));
        assert_eq!(zero.movement, Move::Right);

        let one = &program.transitions[&key("scan", Symbol::One)];
        assert_eq!(one.write, RawSymbol::Symbol(Symbol::One));

        let blank = &program.transitions[&key("scan", Symbol::Blank)];
        assert_eq!(blank.next_state, "stop");
        assert_eq!(blank.write, RawSymbol::Symbol(Symbol::Blank));
        assert_eq!(blank.movement, Move::Left);
    }

    #[test]
    fn test_parse_tabular_action_defaults() {
        let input = r#"
start state: a
accept states: z
table:
  a:
    0: {L: z}
    1: {write: 0, R}
"#;
        let (program, errors) = parse(input, Dialect::Tabular);
        assert!(errors.is_empty(), "{errors:?}");

        // Omitted write keeps the read symbol.
        let zero = &program.transitions[&key("a", Symbol::Zero)];
        assert_eq!(zero.write, RawSymbol::Symbol(Symbol::Zero));
        assert_eq!(zero.next_state, "z");

        // Omitted target state keeps the current one.
        let one = &program.transitions[&key("a", Symbol::One)];
        assert_eq!(one.write, RawSymbol::Symbol(Symbol::Zero));
        assert_eq!(one.next_state, "a");
        assert_eq!(one.movement, Move::Right);
    }

    #[test]
    fn test_parse_tabular_bad_entry_is_recoverable() {
        let input = r#"
start state: a
table:
  a:
    R
    0: R
"#;
        let (program, errors) = parse(input, Dialect::Tabular);
        // The bare shorthand line has no symbol and is rejected; the next
        // entry still parses.
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].line, 5);
        assert_eq!(program.transitions.len(), 1);
        assert!(!program.is_runnable());
    }

    #[test]
    fn test_parse_tabular_entry_outside_state_block() {
        let input = r#"
start state: a
table:
  0: R
"#;
        let (_, errors) = parse(input, Dialect::Tabular);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("before any state block"));
    }

    #[test]
    fn test_parse_tabular_unknown_symbol_passes_through() {
        let input = r#"
start state: a
table:
  a:
    x: R
"#;
        let (program, errors) = parse(input, Dialect::Tabular);
        assert!(errors.is_empty());
        let entry = program
            .transitions
            .get(&("a".to_string(), RawSymbol::Other("x".to_string())));
        assert!(entry.is_some());
    }

    #[test]
    fn test_parse_flat_program() {
        let input = r#"
name: Bit inverter
init: inv
accept: done

// Flip every bit, then park on the first blank.
inv, 0
inv, 1, >

inv, 1
inv, 0, >

inv, _
done, _, -
"#;
        let (program, errors) = parse(input, Dialect::Flat);
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(program.name, "Bit inverter");
        assert_eq!(program.initial_state, "inv");
        assert!(program.accept_states.contains("done"));
        assert_eq!(program.transitions.len(), 3);

        let zero = &program.transitions[&key("inv", Symbol::Zero)];
        assert_eq!(zero.next_state, "inv");
        assert_eq!(zero.write, RawSymbol::Symbol(Symbol::One));
        assert_eq!(zero.movement, Move::Right);

        let blank = &program.transitions[&key("inv", Symbol::Blank)];
        assert_eq!(blank.next_state, "done");
        assert_eq!(blank.movement, Move::Hold);
    }

    #[test]
    fn test_parse_flat_single_line_record() {
        let input = r#"
name: Compact
init: a
accept: z
a, 0, z, 1, <
"#;
        let (program, errors) = parse(input, Dialect::Flat);
        assert!(errors.is_empty(), "{errors:?}");
        let entry = &program.transitions[&key("a", Symbol::Zero)];
        assert_eq!(entry.next_state, "z");
        assert_eq!(entry.write, RawSymbol::Symbol(Symbol::One));
        assert_eq!(entry.movement, Move::Left);
    }

    #[test]
    fn test_parse_flat_empty_fields_are_blank() {
        let input = r#"
name: Blanks
init: a
accept: z
a,,z,,-
"#;
        let (program, errors) = parse(input, Dialect::Flat);
        assert!(errors.is_empty(), "{errors:?}");
        let entry = &program.transitions[&key("a", Symbol::Blank)];
        assert_eq!(entry.write, RawSymbol::Symbol(Symbol::Blank));
    }

    #[test]
    fn test_parse_flat_bad_move_operator() {
        let input = r#"
name: Broken
init: a
accept: z
a, 0
z, 1, ?
a, 1, z, 1, >
"#;
        let (program, errors) = parse(input, Dialect::Flat);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("malformed transition record"));
        // Parsing continued past the bad record.
        assert!(program.transitions.contains_key(&key("a", Symbol::One)));
        assert!(!program.is_runnable());
    }

    #[test]
    fn test_parse_flat_dangling_record() {
        let input = r#"
name: Dangling
init: a
accept: z
a, 1, z, 1, >
a, 0
"#;
        let (_, errors) = parse(input, Dialect::Flat);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("incomplete transition record"));
    }

    #[test]
    fn test_parse_flat_too_many_fields() {
        let input = r#"
name: Overfull
init: a
accept: z
a, 0, z
z, 1, >, extra
"#;
        let (_, errors) = parse(input, Dialect::Flat);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("malformed transition record"));
    }

    #[test]
    fn test_parse_flat_missing_sections() {
        let (program, errors) = parse("a, 0, z, 1, >", Dialect::Flat);
        assert!(errors.is_empty());
        let diagnostics = &program.diagnostics.errors;
        assert!(diagnostics.iter().any(|e| e.contains("name is missing")));
        assert!(diagnostics
            .iter()
            .any(|e| e.contains("initial state is missing")));
        assert!(diagnostics
            .iter()
            .any(|e| e.contains("no accept states declared")));
    }

    #[test]
    fn test_parse_tabular_missing_sections() {
        let (program, _) = parse("", Dialect::Tabular);
        let diagnostics = &program.diagnostics.errors;
        assert!(diagnostics
            .iter()
            .any(|e| e.contains("initial state is missing")));
        assert!(diagnostics.iter().any(|e| e.contains("no transitions")));
        // The tabular dialect has no name line; its absence is not an error.
        assert!(!diagnostics.iter().any(|e| e.contains("name")));
    }

    #[test]
    fn test_syntax_errors_mirrored_into_diagnostics() {
        let input = "name: X\ninit: a\naccept: z\na, 0\nz, 1, ?\n";
        let (program, errors) = parse(input, Dialect::Flat);
        assert_eq!(errors.len(), 1);
        assert!(program
            .diagnostics
            .errors
            .iter()
            .any(|e| e.contains("syntax error (line 5)")));
    }

    #[test]
    fn test_duplicate_key_overwrites() {
        let input = r#"
name: Dup
init: a
accept: z
a, 0, z, 1, >
a, 0, z, 0, <
"#;
        let (program, errors) = parse(input, Dialect::Flat);
        assert!(errors.is_empty());
        assert_eq!(program.transitions.len(), 1);
        let entry = &program.transitions[&key("a", Symbol::Zero)];
        assert_eq!(entry.movement, Move::Left);
    }
}
