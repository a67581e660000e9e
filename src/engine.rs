//! This module implements the execution engine: a concurrent state machine
//! that homes the robot, locates the start of the input, and walks a
//! validated transition table against live sensor readings, driving the
//! motor through the abstract `Hardware` boundary.
//!
//! The engine runs each active run on one dedicated worker thread. All
//! externally visible state lives in a single `ExecutionState` behind one
//! mutex; pause, resume, stop, and speed changes go through that lock, and
//! the worker applies every mutation under it as well. After each mutation
//! the guard is released and an immutable snapshot is fanned out to the
//! registered observers.

use crate::hardware::Hardware;
use crate::observer::{ObserverSet, RunObserver, RunSnapshot};
use crate::types::{Move, Program, RawSymbol, StateId, Symbol};
use crate::types::{DEFAULT_BAND_LENGTH, DEFAULT_STEPS_PER_POSITION, DEFAULT_TOGGLE_RETRIES};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Lifecycle phases of a run. The last four are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Idle,
    Homing,
    Seeking,
    Stepping,
    Accepted,
    Rejected,
    UserStopped,
    Failed,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Phase::Accepted | Phase::Rejected | Phase::UserStopped | Phase::Failed
        )
    }
}

/// Mutable run state, owned by the engine and mutated only under its lock.
#[derive(Debug, Clone)]
pub struct ExecutionState {
    pub phase: Phase,
    pub current_state: StateId,
    pub step_count: u64,
    /// 1-based band position; meaningful from the end of homing onwards
    /// and always within `1..=band_length` while the run is live.
    pub band_position: usize,
    pub speed: u8,
    pub running: bool,
    pub paused: bool,
    pub stop_requested: bool,
    pub errors: Vec<String>,
}

impl ExecutionState {
    fn fresh(initial_state: &str, speed: u8) -> Self {
        Self {
            phase: Phase::Idle,
            current_state: initial_state.to_string(),
            step_count: 0,
            band_position: 1,
            speed,
            running: false,
            paused: false,
            stop_requested: false,
            errors: Vec::new(),
        }
    }
}

/// Tunables for the engine and the band geometry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Number of positions on the band.
    pub band_length: usize,
    /// Motor micro-steps between two adjacent band positions.
    pub steps_per_position: u32,
    /// Toggle attempts per write before the band counts as unresponsive.
    pub toggle_retries: u32,
    /// Re-reads of an unreadable sensor before the run fails.
    pub sensor_retries: u32,
    /// Micro-step granularities of the homing passes, coarsest first.
    pub homing_passes: Vec<u32>,
    /// Poll interval of the pause/stop checkpoints.
    pub pause_poll: Duration,
    /// Speed used until a caller sets one.
    pub default_speed: u8,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            band_length: DEFAULT_BAND_LENGTH,
            steps_per_position: DEFAULT_STEPS_PER_POSITION,
            toggle_retries: DEFAULT_TOGGLE_RETRIES,
            sensor_retries: 3,
            homing_passes: vec![
                DEFAULT_STEPS_PER_POSITION,
                DEFAULT_STEPS_PER_POSITION / 4,
                DEFAULT_STEPS_PER_POSITION / 16,
            ],
            pause_poll: Duration::from_millis(20),
            default_speed: 5,
        }
    }
}

/// Errors surfaced by the engine's control surface.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The program still carries diagnostic errors and may not run.
    #[error("program '{name}' has {count} unresolved error(s) and cannot run")]
    InvalidProgram { name: String, count: usize },
    #[error("speed {0} is outside the valid range 1..=10")]
    InvalidSpeed(u8),
    #[error("failed to spawn the engine worker: {0}")]
    WorkerSpawn(#[from] io::Error),
}

/// State shared between the engine handle and its worker thread.
struct Shared {
    program_name: String,
    state: Mutex<ExecutionState>,
    observers: ObserverSet,
}

impl Shared {
    /// Applies a state mutation under the lock, then fans the resulting
    /// snapshot out to observers with the lock released.
    fn apply<F: FnOnce(&mut ExecutionState)>(&self, mutate: F) {
        let snapshot = {
            let mut state = self.state.lock();
            mutate(&mut state);
            RunSnapshot::capture(&self.program_name, &state)
        };
        self.observers.notify(&snapshot);
    }
}

/// Drives one validated program against one hardware interface.
///
/// An engine instance runs at most one worker at a time; `start` stops and
/// joins any previous run before spawning the next one. Orchestrators that
/// hold several engines must still make sure only one of them owns the
/// real hardware at any moment.
pub struct Engine {
    program: Arc<Program>,
    config: EngineConfig,
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl Engine {
    /// Creates an engine for a parsed and analyzed program.
    ///
    /// Programs whose diagnostics contain errors are refused here, before
    /// any hardware is touched.
    pub fn new(program: Program, config: EngineConfig) -> Result<Self, EngineError> {
        if !program.is_runnable() {
            return Err(EngineError::InvalidProgram {
                name: program.name.clone(),
                count: program.diagnostics.errors.len(),
            });
        }
        let shared = Arc::new(Shared {
            program_name: program.name.clone(),
            state: Mutex::new(ExecutionState::fresh(
                &program.initial_state,
                config.default_speed,
            )),
            observers: ObserverSet::default(),
        });
        Ok(Self {
            program: Arc::new(program),
            config,
            shared,
            worker: None,
        })
    }

    /// Registers an observer; it sees every state mutation from then on.
    pub fn subscribe(&self, observer: Arc<dyn RunObserver>) {
        self.shared.observers.subscribe(observer);
    }

    /// Starts a run on a dedicated worker thread.
    ///
    /// Any previous run of this engine is stopped cooperatively and joined
    /// first, so the hardware is never driven by two workers at once. The
    /// speed survives across runs; everything else is reset.
    pub fn start(&mut self, hardware: Box<dyn Hardware>) -> Result<(), EngineError> {
        self.stop_and_join();

        let initial_state = self.program.initial_state.clone();
        let speed = self.shared.state.lock().speed;
        self.shared.apply(|state| {
            *state = ExecutionState::fresh(&initial_state, speed);
            state.phase = Phase::Homing;
            state.running = true;
        });

        let worker = Worker {
            program: Arc::clone(&self.program),
            config: self.config.clone(),
            shared: Arc::clone(&self.shared),
            hardware,
        };
        self.worker = Some(
            thread::Builder::new()
                .name("band-engine".to_string())
                .spawn(move || worker.run())?,
        );
        Ok(())
    }

    /// Requests a pause; the worker blocks at its next checkpoint. Does
    /// not abort a hardware command already in flight.
    pub fn pause(&self) {
        self.shared.apply(|state| {
            if state.running {
                state.paused = true;
            }
        });
    }

    pub fn resume(&self) {
        self.shared.apply(|state| state.paused = false);
    }

    /// Requests a cooperative stop, honored at the next phase boundary.
    pub fn stop(&self) {
        self.shared.apply(|state| {
            if state.running {
                state.stop_requested = true;
            }
        });
    }

    /// Sets the speed for all following motor commands.
    pub fn set_speed(&self, speed: u8) -> Result<(), EngineError> {
        if !(1..=10).contains(&speed) {
            return Err(EngineError::InvalidSpeed(speed));
        }
        self.shared.apply(|state| state.speed = speed);
        Ok(())
    }

    /// A point-in-time snapshot of the run state.
    pub fn snapshot(&self) -> RunSnapshot {
        RunSnapshot::capture(&self.shared.program_name, &self.shared.state.lock())
    }

    /// Blocks until the current run, if any, has ended.
    pub fn join(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }

    /// Cooperative stop followed by a join. Idempotent.
    pub fn stop_and_join(&mut self) {
        if self.worker.is_some() {
            self.stop();
            self.join();
        }
    }

    pub fn program(&self) -> &Program {
        &self.program
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

/// How a run ended; carried out of the phase loops via `Result`.
struct Halt {
    phase: Phase,
    message: Option<String>,
}

impl Halt {
    fn accepted() -> Self {
        Self {
            phase: Phase::Accepted,
            message: None,
        }
    }

    fn rejected(message: impl Into<String>) -> Self {
        Self {
            phase: Phase::Rejected,
            message: Some(message.into()),
        }
    }

    fn stopped() -> Self {
        Self {
            phase: Phase::UserStopped,
            message: Some("run stopped by user".to_string()),
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            phase: Phase::Failed,
            message: Some(message.into()),
        }
    }
}

/// The run loop; owns the hardware for the duration of one run.
struct Worker {
    program: Arc<Program>,
    config: EngineConfig,
    shared: Arc<Shared>,
    hardware: Box<dyn Hardware>,
}

impl Worker {
    fn run(mut self) {
        info!(program = %self.program.name, "run started");
        let halt = match self.drive() {
            Ok(halt) | Err(halt) => halt,
        };
        match halt.phase {
            Phase::Accepted => info!(program = %self.program.name, "run accepted"),
            Phase::UserStopped => info!(program = %self.program.name, "run stopped by user"),
            _ => warn!(
                program = %self.program.name,
                phase = ?halt.phase,
                message = halt.message.as_deref().unwrap_or(""),
                "run ended abnormally"
            ),
        }
        self.shared.apply(|state| {
            state.phase = halt.phase;
            if let Some(message) = halt.message {
                state.errors.push(message);
            }
            state.running = false;
            state.paused = false;
            state.stop_requested = false;
        });
    }

    fn drive(&mut self) -> Result<Halt, Halt> {
        self.home()?;
        self.seek()?;
        self.step_loop()
    }

    /// Pause/stop checkpoint, called at the top of every phase loop
    /// iteration: blocks while paused, leaves the phase when a stop was
    /// requested.
    fn checkpoint(&self) -> Result<(), Halt> {
        loop {
            {
                let state = self.shared.state.lock();
                if state.stop_requested {
                    return Err(Halt::stopped());
                }
                if !state.paused {
                    return Ok(());
                }
            }
            thread::sleep(self.config.pause_poll);
        }
    }

    fn speed(&self) -> u8 {
        self.shared.state.lock().speed
    }

    fn position(&self) -> usize {
        self.shared.state.lock().band_position
    }

    fn enter_phase(&self, phase: Phase) {
        debug!(phase = ?phase, "phase change");
        self.shared.apply(|state| state.phase = phase);
    }

    fn read_symbol(&mut self) -> Result<Symbol, Halt> {
        for _ in 0..=self.config.sensor_retries {
            if let Some(symbol) = self.hardware.read_symbol() {
                return Ok(symbol);
            }
        }
        Err(Halt::failed("color sensor is unreadable"))
    }

    fn read_home_sensor(&mut self) -> Result<bool, Halt> {
        for _ in 0..=self.config.sensor_retries {
            if let Some(triggered) = self.hardware.read_home_sensor() {
                return Ok(triggered);
            }
        }
        Err(Halt::failed("home sensor is unreadable"))
    }

    /// Drives the carriage to the home stop in passes of decreasing
    /// granularity, finishing with the light barrier triggered at the
    /// finest one. A pass that exhausts its travel budget fails the run.
    fn home(&mut self) -> Result<(), Halt> {
        self.enter_phase(Phase::Homing);
        let travel = self.config.band_length as u32 * self.config.steps_per_position;
        let passes = if self.config.homing_passes.is_empty() {
            vec![1]
        } else {
            self.config.homing_passes.clone()
        };

        for (index, granularity) in passes.iter().enumerate() {
            let granularity = (*granularity).max(1);
            let mut budget = travel / granularity + 4;

            loop {
                self.checkpoint()?;
                if self.read_home_sensor()? {
                    break;
                }
                if budget == 0 {
                    return Err(Halt::failed(
                        "homing failed: home sensor not reached within the travel range",
                    ));
                }
                budget -= 1;
                let speed = self.speed();
                if !self.hardware.move_robot(Move::Left, speed, granularity) {
                    return Err(Halt::failed("homing failed: motor rejected a move command"));
                }
            }

            // Back off so the next, finer pass re-approaches the barrier.
            if index + 1 < passes.len() {
                let mut backoff = 8u32;
                while backoff > 0 && self.read_home_sensor()? {
                    self.checkpoint()?;
                    backoff -= 1;
                    let speed = self.speed();
                    if !self.hardware.move_robot(Move::Right, speed, granularity) {
                        return Err(Halt::failed(
                            "homing failed: motor rejected a move command",
                        ));
                    }
                }
            }
        }

        // The carriage sits at the reference stop: position 1.
        self.shared.apply(|state| state.band_position = 1);
        info!("homing complete");
        Ok(())
    }

    /// Walks right to the first non-blank position. A fully blank band
    /// recenters the carriage to the band midpoint instead of running off
    /// the end; the input is then empty.
    fn seek(&mut self) -> Result<(), Halt> {
        self.enter_phase(Phase::Seeking);
        loop {
            self.checkpoint()?;
            if self.read_symbol()? != Symbol::Blank {
                info!(position = self.position(), "input found");
                return Ok(());
            }
            if self.position() >= self.config.band_length {
                return self.recenter();
            }
            self.move_one(Move::Right)?;
        }
    }

    fn recenter(&mut self) -> Result<(), Halt> {
        let midpoint = (self.config.band_length + 1) / 2;
        info!(midpoint, "band is blank, recentering");
        while self.position() > midpoint {
            self.checkpoint()?;
            self.move_one(Move::Left)?;
        }
        Ok(())
    }

    /// Steps the machine until it enters an accept state.
    fn step_loop(&mut self) -> Result<Halt, Halt> {
        self.enter_phase(Phase::Stepping);
        loop {
            self.checkpoint()?;

            let current = self.shared.state.lock().current_state.clone();
            if self.program.accept_states.contains(&current) {
                return Ok(Halt::accepted());
            }

            let symbol = self.read_symbol()?;
            let Some(transition) = self.program.transition(&current, symbol).cloned() else {
                return Err(Halt::rejected(format!(
                    "reject state reached: no transition for state '{current}' reading '{symbol}'"
                )));
            };
            debug!(
                state = %current,
                read = %symbol,
                next = %transition.next_state,
                "step"
            );

            self.shared
                .apply(|state| state.current_state = transition.next_state.clone());
            self.write_symbol(&transition.write)?;
            self.move_one(transition.movement)?;
            self.shared.apply(|state| state.step_count += 1);
        }
    }

    /// Toggles the band until the sensor observes `target`, bounded by the
    /// configured retry count.
    fn write_symbol(&mut self, target: &RawSymbol) -> Result<(), Halt> {
        let target = match target.symbol() {
            Some(symbol) => symbol,
            None => {
                return Err(Halt::failed(format!(
                    "write symbol '{target}' is not a band symbol"
                )))
            }
        };
        let mut toggles = 0;
        loop {
            if self.read_symbol()? == target {
                return Ok(());
            }
            if toggles >= self.config.toggle_retries {
                return Err(Halt::failed(
                    "band unresponsive: toggling did not produce the requested symbol",
                ));
            }
            toggles += 1;
            if !self.hardware.toggle_band() {
                return Err(Halt::failed("band toggle command failed"));
            }
        }
    }

    /// Moves exactly one band position, bounds-checked before the motor is
    /// commanded so the position invariant can never be violated.
    fn move_one(&mut self, direction: Move) -> Result<(), Halt> {
        if direction == Move::Hold {
            return Ok(());
        }
        let position = self.position();
        let target = match direction {
            Move::Left => position.checked_sub(1),
            Move::Right => Some(position + 1),
            Move::Hold => Some(position),
        };
        let target = match target {
            Some(target) if (1..=self.config.band_length).contains(&target) => target,
            _ => return Err(Halt::failed("program exceeds the band capacity")),
        };
        let speed = self.speed();
        if !self
            .hardware
            .move_robot(direction, speed, self.config.steps_per_position)
        {
            return Err(Halt::failed("motor rejected a move command"));
        }
        self.shared.apply(|state| state.band_position = target);
        Ok(())
    }
}
