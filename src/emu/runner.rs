use log::info;

use super::{CycleResult, Machine, MachineError};

pub const DEFAULT_SPEED: f64 = 400.0;
pub const MIN_SPEED: f64 = 200.0;
pub const MAX_SPEED: f64 = 5000.0;

/// Pacing configuration for [`Runner`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RunnerConfig {
    /// Instructions executed per second of wall time.
    pub speed: f64,
}

impl RunnerConfig {
    pub fn with_speed(speed: f64) -> Self {
        Self {
            speed: clamp_speed(speed),
        }
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            speed: DEFAULT_SPEED,
        }
    }
}

/// What a call to [`Runner::update`] did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunnerStatus {
    /// Number of cycles executed.
    pub cycles: u32,
    /// True if any of those cycles cleared or drew to the framebuffer.
    pub display_updated: bool,
}

/// High-level driver that runs a [`Machine`] at a fixed instruction rate.
pub struct Runner {
    machine: Machine,
    config: RunnerConfig,
    paused: bool,
    cpu_dt_accumulator: f64,
}

impl Runner {
    pub fn new(machine: Machine, config: RunnerConfig) -> Self {
        Self {
            machine,
            config: RunnerConfig::with_speed(config.speed),
            paused: false,
            cpu_dt_accumulator: 0.0,
        }
    }

    /// Update emulator by delta time.
    ///
    /// Runs as many cycles as fit in the accumulated time `dt` (in seconds). A fault
    /// stops the batch and is returned; the machine is left as the fault found it.
    pub fn update(&mut self, dt: f64) -> Result<RunnerStatus, MachineError> {
        let mut status = RunnerStatus::default();
        if self.paused {
            return Ok(status);
        }

        let time_step = 1.0 / self.config.speed;
        self.cpu_dt_accumulator += dt;

        while self.cpu_dt_accumulator >= time_step {
            self.cpu_dt_accumulator -= time_step;

            if self.machine.cycle()? == CycleResult::DisplayUpdated {
                status.display_updated = true;
            }
            status.cycles += 1;
        }

        Ok(status)
    }

    /// Resets the machine and loads a new program into it.
    pub fn load_rom(&mut self, rom: &[u8]) -> Result<(), MachineError> {
        self.machine.reset();
        self.cpu_dt_accumulator = 0.0;
        self.machine.load(rom)
    }

    pub fn pause(&mut self) {
        self.paused = true;
        self.cpu_dt_accumulator = 0.0;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn speed(&self) -> f64 {
        self.config.speed
    }

    /// Changes the instruction rate, clamped to `MIN_SPEED..=MAX_SPEED`.
    pub fn set_speed(&mut self, speed: f64) {
        self.config.speed = clamp_speed(speed);
        info!("Speed set to {} Hz", self.config.speed);
    }

    /// Set the state of a key on the keypad.
    pub fn set_key(&mut self, key: u8, pressed: bool) -> Result<(), MachineError> {
        if pressed {
            self.machine.set_key(key)
        } else {
            self.machine.clear_key(key)
        }
    }

    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    pub fn machine_mut(&mut self) -> &mut Machine {
        &mut self.machine
    }
}

fn clamp_speed(speed: f64) -> f64 {
    if speed.is_nan() {
        DEFAULT_SPEED
    } else {
        speed.clamp(MIN_SPEED, MAX_SPEED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 0x200: V0 += 1, 0x202: jump 0x200
    const COUNTER: [u8; 4] = [0x70, 0x01, 0x12, 0x00];

    fn runner(speed: f64) -> Runner {
        let mut runner = Runner::new(Machine::with_seed(1), RunnerConfig::with_speed(speed));
        runner.load_rom(&COUNTER).unwrap();
        runner
    }

    #[test]
    fn speed_is_clamped() {
        assert_eq!(RunnerConfig::with_speed(10.0).speed, MIN_SPEED);
        assert_eq!(RunnerConfig::with_speed(9000.0).speed, MAX_SPEED);
        assert_eq!(RunnerConfig::with_speed(f64::NAN).speed, DEFAULT_SPEED);
        assert_eq!(RunnerConfig::default().speed, 400.0);
    }

    #[test]
    fn update_runs_cycles_for_elapsed_time() {
        let mut runner = runner(400.0);
        let status = runner.update(0.1001).unwrap();
        assert_eq!(status.cycles, 40);
        assert!(!status.display_updated);
        assert_eq!(runner.machine().registers()[0], 20);
    }

    #[test]
    fn update_carries_leftover_time() {
        let mut runner = runner(200.0);
        // Half a step each
        assert_eq!(runner.update(0.0025).unwrap().cycles, 0);
        assert_eq!(runner.update(0.0026).unwrap().cycles, 1);
    }

    #[test]
    fn paused_runner_does_nothing() {
        let mut runner = runner(400.0);
        runner.pause();
        assert!(runner.is_paused());
        assert_eq!(runner.update(1.0).unwrap().cycles, 0);

        runner.resume();
        assert_eq!(runner.update(0.0101).unwrap().cycles, 4);
    }

    #[test]
    fn set_speed_changes_rate() {
        let mut runner = runner(400.0);
        runner.set_speed(1000.0);
        assert_eq!(runner.speed(), 1000.0);
        assert_eq!(runner.update(0.0101).unwrap().cycles, 10);
    }

    #[test]
    fn reports_display_updates() {
        let mut runner = Runner::new(Machine::with_seed(1), RunnerConfig::default());
        // clear screen, jump to self
        runner.load_rom(&[0x00, 0xE0, 0x12, 0x02]).unwrap();
        let status = runner.update(0.01).unwrap();
        assert!(status.display_updated);
    }

    #[test]
    fn load_rom_resets_first() {
        let mut runner = runner(400.0);
        runner.update(0.1).unwrap();
        runner.set_key(3, true).unwrap();

        runner.load_rom(&COUNTER).unwrap();

        assert_eq!(runner.machine().pc(), 0x200);
        assert_eq!(runner.machine().registers()[0], 0);
        assert!(!runner.machine().keypad()[3]);
    }

    #[test]
    fn faults_stop_the_batch() {
        let mut runner = Runner::new(Machine::with_seed(1), RunnerConfig::default());
        runner.load_rom(&[0x00, 0xEE]).unwrap();
        assert!(matches!(
            runner.update(1.0),
            Err(MachineError::StackUnderflow { .. })
        ));
    }

    #[test]
    fn invalid_keys_are_reported() {
        let mut runner = runner(400.0);
        assert_eq!(
            runner.set_key(0x10, false),
            Err(MachineError::InvalidKey { key: 0x10 })
        );
    }
}
