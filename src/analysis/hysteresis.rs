use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateEvent {
    Opened,
    Closed,
}

/// Two-threshold energy gate
///
/// Opens when energy reaches `enter`, and closes only once energy drops
/// below `exit` (with `exit < enter`). Energy that hovers between the two
/// levels never changes the gate state.
#[derive(Debug, Clone)]
pub struct EnergyGate {
    enter: f32,
    exit: f32,
    open: bool,
    last_energy: f32,
    transitions: u64,
}

impl EnergyGate {
    pub fn new(enter: f32, exit: f32) -> Result<Self, ConfigError> {
        if !(exit < enter) || !enter.is_finite() || !exit.is_finite() {
            return Err(ConfigError::HysteresisOrder { enter, exit });
        }
        Ok(Self {
            enter,
            exit,
            open: false,
            last_energy: 0.0,
            transitions: 0,
        })
    }

    /// Reset to the closed state (e.g. when the stream restarts)
    pub fn reset(&mut self) {
        self.open = false;
        self.last_energy = 0.0;
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn last_energy(&self) -> f32 {
        self.last_energy
    }

    /// Number of open/close flips since construction
    pub fn transitions(&self) -> u64 {
        self.transitions
    }

    /// Feed one energy observation; non-finite values count as silence
    pub fn process(&mut self, energy: f32) -> Option<GateEvent> {
        let energy = if energy.is_finite() { energy } else { 0.0 };
        self.last_energy = energy;

        let event = if !self.open && energy >= self.enter {
            self.open = true;
            Some(GateEvent::Opened)
        } else if self.open && energy < self.exit {
            self.open = false;
            Some(GateEvent::Closed)
        } else {
            None
        };

        if event.is_some() {
            self.transitions += 1;
        }
        event
    }
}
