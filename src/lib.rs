//! This crate provides the core logic for a Turing machine band robot.
//! It includes parsers for the two supported program dialects, a semantic
//! analyzer that validates programs before execution, and a concurrent
//! execution engine that drives a stepper-motor carriage over a
//! ternary-colored band through an abstract hardware interface.

pub mod analyzer;
pub mod encoder;
pub mod engine;
pub mod hardware;
pub mod loader;
pub mod observer;
pub mod parser;
pub mod programs;
pub mod types;

/// Re-exports the `analyze` function from the analyzer module.
pub use analyzer::analyze;
/// Re-exports the encoding functions from the encoder module.
pub use encoder::{decode, encode};
/// Re-exports the execution engine and its state types.
pub use engine::{Engine, EngineConfig, EngineError, ExecutionState, Phase};
/// Re-exports the hardware boundary and the simulator.
pub use hardware::{Hardware, SimulatedBand};
/// Re-exports the `ProgramLoader` struct from the loader module.
pub use loader::{LoadError, ProgramLoader};
/// Re-exports the observer surface.
pub use observer::{ObserverSet, RunObserver, RunSnapshot};
/// Re-exports the `parse` function and dialect selector.
pub use parser::{parse, Dialect};
/// Re-exports the embedded program registry.
pub use programs::{ProgramInfo, ProgramManager, PROGRAMS};
/// Re-exports the core data types.
pub use types::{
    Diagnostics, Move, Program, RawSymbol, StateId, Symbol, SyntaxError, Transition,
};
