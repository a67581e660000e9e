//! This module defines the hardware capability boundary the execution
//! engine drives, plus a deterministic simulated band for tests and
//! non-hardware environments.

use crate::types::{Move, Symbol};

/// Capabilities the execution engine needs from a band robot driver.
///
/// Concrete implementations wrap a serial, GPIO, or I2C transport — or the
/// in-process `SimulatedBand`. Every call is synchronous and may block up
/// to the driver's own timeout. Faults are typed, never silent: an actuator
/// fault surfaces as `false`, a sensor fault as `None`.
pub trait Hardware: Send {
    /// Commands a motor move of `micro_steps` micro-steps in `direction`
    /// at `speed` (1..=10). `Hold` is a no-op that must succeed.
    fn move_robot(&mut self, direction: Move, speed: u8, micro_steps: u32) -> bool;

    /// Advances the color at the current band position by one toggle.
    fn toggle_band(&mut self) -> bool;

    /// Reads the symbol under the color sensor.
    fn read_symbol(&mut self) -> Option<Symbol>;

    /// Reads the homing light barrier (`true` when blocked).
    fn read_home_sensor(&mut self) -> Option<bool>;
}

/// Deterministic in-process band.
///
/// The carriage is tracked in motor micro-steps from the home stop; band
/// position `n` (1-based) sits at micro-step `(n - 1) * steps_per_position`.
/// The light barrier triggers at the left stop, which also acts as a hard
/// stop the carriage cannot pass. Toggling cycles a cell through
/// Zero → One → Blank → Zero.
#[derive(Debug)]
pub struct SimulatedBand {
    cells: Vec<Symbol>,
    steps_per_position: u32,
    /// Micro-steps from the home stop.
    carriage: i64,
    jam_toggle: bool,
    fail_moves_after: Option<u32>,
    blind_sensors: bool,
    moves: u32,
    toggles: u32,
}

impl SimulatedBand {
    /// A blank band of `length` positions with the carriage parked in the
    /// middle, as a robot left behind by a previous run would be.
    pub fn new(length: usize, steps_per_position: u32) -> Self {
        Self::with_cells(vec![Symbol::Blank; length], steps_per_position)
    }

    pub fn with_cells(cells: Vec<Symbol>, steps_per_position: u32) -> Self {
        let start = (cells.len() as i64 / 2) * i64::from(steps_per_position);
        Self {
            cells,
            steps_per_position,
            carriage: start,
            jam_toggle: false,
            fail_moves_after: None,
            blind_sensors: false,
            moves: 0,
            toggles: 0,
        }
    }

    /// Writes a cell directly, bypassing the toggle mechanism. 1-based.
    pub fn write_cell(&mut self, position: usize, symbol: Symbol) {
        if position >= 1 && position <= self.cells.len() {
            self.cells[position - 1] = symbol;
        }
    }

    pub fn cells(&self) -> &[Symbol] {
        &self.cells
    }

    /// Toggle commands get acknowledged but the band never changes.
    pub fn jam_toggle(mut self) -> Self {
        self.jam_toggle = true;
        self
    }

    /// Move commands start failing after `count` successful ones.
    pub fn fail_moves_after(mut self, count: u32) -> Self {
        self.fail_moves_after = Some(count);
        self
    }

    /// Both sensors return unreadable values.
    pub fn blind_sensors(mut self) -> Self {
        self.blind_sensors = true;
        self
    }

    pub fn toggle_count(&self) -> u32 {
        self.toggles
    }

    pub fn move_count(&self) -> u32 {
        self.moves
    }

    fn cell_index(&self) -> Option<usize> {
        let index = (self.carriage / i64::from(self.steps_per_position)) as usize;
        (index < self.cells.len()).then_some(index)
    }
}

impl Hardware for SimulatedBand {
    fn move_robot(&mut self, direction: Move, _speed: u8, micro_steps: u32) -> bool {
        if direction == Move::Hold {
            return true;
        }
        if let Some(limit) = self.fail_moves_after {
            if self.moves >= limit {
                return false;
            }
        }
        self.moves += 1;
        let delta = i64::from(micro_steps);
        match direction {
            Move::Left => self.carriage = (self.carriage - delta).max(0),
            Move::Right => self.carriage += delta,
            Move::Hold => {}
        }
        true
    }

    fn toggle_band(&mut self) -> bool {
        self.toggles += 1;
        if self.jam_toggle {
            return true;
        }
        if let Some(index) = self.cell_index() {
            self.cells[index] = match self.cells[index] {
                Symbol::Zero => Symbol::One,
                Symbol::One => Symbol::Blank,
                Symbol::Blank => Symbol::Zero,
            };
        }
        true
    }

    fn read_symbol(&mut self) -> Option<Symbol> {
        if self.blind_sensors {
            return None;
        }
        // Past the last cell the sensor sees unlit strip.
        Some(self.cell_index().map_or(Symbol::Blank, |i| self.cells[i]))
    }

    fn read_home_sensor(&mut self) -> Option<bool> {
        if self.blind_sensors {
            return None;
        }
        Some(self.carriage <= 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_homing_reaches_the_stop() {
        let mut band = SimulatedBand::new(8, 10);
        assert_eq!(band.read_home_sensor(), Some(false));
        for _ in 0..8 {
            assert!(band.move_robot(Move::Left, 5, 10));
        }
        assert_eq!(band.read_home_sensor(), Some(true));
        // The stop is hard: further left moves stay put.
        assert!(band.move_robot(Move::Left, 5, 10));
        assert_eq!(band.read_home_sensor(), Some(true));
    }

    #[test]
    fn test_read_follows_carriage() {
        let mut band = SimulatedBand::with_cells(
            vec![Symbol::Zero, Symbol::One, Symbol::Blank],
            10,
        );
        while band.read_home_sensor() != Some(true) {
            band.move_robot(Move::Left, 5, 10);
        }
        assert_eq!(band.read_symbol(), Some(Symbol::Zero));
        band.move_robot(Move::Right, 5, 10);
        assert_eq!(band.read_symbol(), Some(Symbol::One));
        band.move_robot(Move::Right, 5, 10);
        assert_eq!(band.read_symbol(), Some(Symbol::Blank));
        // Off the end of the strip the sensor sees blank.
        band.move_robot(Move::Right, 5, 10);
        assert_eq!(band.read_symbol(), Some(Symbol::Blank));
    }

    #[test]
    fn test_toggle_cycles_symbols() {
        let mut band = SimulatedBand::with_cells(vec![Symbol::Zero], 10);
        while band.read_home_sensor() != Some(true) {
            band.move_robot(Move::Left, 5, 10);
        }
        assert!(band.toggle_band());
        assert_eq!(band.read_symbol(), Some(Symbol::One));
        assert!(band.toggle_band());
        assert_eq!(band.read_symbol(), Some(Symbol::Blank));
        assert!(band.toggle_band());
        assert_eq!(band.read_symbol(), Some(Symbol::Zero));
        assert_eq!(band.toggle_count(), 3);
    }

    #[test]
    fn test_jammed_toggle_acknowledges_without_effect() {
        let mut band = SimulatedBand::with_cells(vec![Symbol::Zero], 10).jam_toggle();
        while band.read_home_sensor() != Some(true) {
            band.move_robot(Move::Left, 5, 10);
        }
        assert!(band.toggle_band());
        assert_eq!(band.read_symbol(), Some(Symbol::Zero));
    }

    #[test]
    fn test_failing_moves() {
        let mut band = SimulatedBand::new(8, 10).fail_moves_after(2);
        assert!(band.move_robot(Move::Right, 5, 10));
        assert!(band.move_robot(Move::Right, 5, 10));
        assert!(!band.move_robot(Move::Right, 5, 10));
        // Hold never touches the motor and still succeeds.
        assert!(band.move_robot(Move::Hold, 5, 10));
    }

    #[test]
    fn test_blind_sensors() {
        let mut band = SimulatedBand::new(8, 10).blind_sensors();
        assert_eq!(band.read_symbol(), None);
        assert_eq!(band.read_home_sensor(), None);
    }
}
