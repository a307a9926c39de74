use log::{info, trace, warn};
use rand::{SeedableRng, rngs::StdRng};

use super::{
    CycleResult, DISPLAY_SIZE, DISPLAY_X, DISPLAY_Y, FONT, FONT_END_ADDRESS, FONT_START_ADDRESS,
    Framebuffer, MachineError, Opcode, PIXEL_OFF, PIXEL_ON,
};
use crate::u4;

// Fixed by the CHIP-8 memory map
pub(crate) const ROM_START_ADDRESS: usize = 0x200;
pub const MEMORY_SIZE: usize = 4096;
pub const MAX_PROGRAM_SIZE: usize = MEMORY_SIZE - ROM_START_ADDRESS;
/// Maximum number of nested subroutine calls.
pub const STACK_DEPTH: usize = 16;

/// CHIP-8 virtual machine state
pub struct Machine {
    /// 4KB memory array
    pub(crate) memory: [u8; MEMORY_SIZE],
    /// Display buffer: 64x32 pixels, each `PIXEL_ON` or `PIXEL_OFF`
    pub(crate) display: Framebuffer,

    /// Program counter: address of the next instruction to execute
    pub(crate) pc: u16,
    /// Index register: used for memory operations
    pub(crate) i: u16,
    /// General-purpose registers V0-VF (VF is used as a flag register)
    pub(crate) v: [u8; 16],
    /// Call stack for subroutine returns
    pub(crate) stack: Vec<u16>,

    /// Delay timer: decrements once per cycle until it reaches 0
    pub(crate) delay_timer: u8,
    /// Sound timer: decrements once per cycle until it reaches 0
    pub(crate) sound_timer: u8,

    /// Keypad state: 16 keys mapped as booleans (true = pressed)
    pub(crate) keypad: [bool; 16],
    /// Raw word of the instruction currently executing
    pub(crate) opcode: u16,

    /// Random source for Cxkk
    pub(crate) rng: StdRng,
}

impl Machine {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }

    /// Creates a machine whose random source is seeded with `seed`, so `Cxkk`
    /// produces the same sequence on every run.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        let mut machine = Machine {
            memory: [0; MEMORY_SIZE],
            display: [PIXEL_OFF; DISPLAY_SIZE],
            pc: ROM_START_ADDRESS as u16,
            i: 0,
            v: [0; 16],
            stack: Vec::with_capacity(STACK_DEPTH),
            delay_timer: 0,
            sound_timer: 0,
            keypad: [false; 16],
            opcode: 0,
            rng,
        };
        machine.seed_font();
        machine
    }

    /// Returns every register, memory byte, timer, pixel and key to the power-on
    /// state. Program memory is wiped too, so a program has to be loaded again.
    pub fn reset(&mut self) {
        self.memory = [0; MEMORY_SIZE];
        self.display = [PIXEL_OFF; DISPLAY_SIZE];
        self.pc = ROM_START_ADDRESS as u16;
        self.i = 0;
        self.v = [0; 16];
        self.stack.clear();
        self.delay_timer = 0;
        self.sound_timer = 0;
        self.keypad = [false; 16];
        self.opcode = 0;
        self.seed_font();

        info!("Machine reset");
    }

    /// Copies a program into memory at 0x200. Nothing else is touched.
    pub fn load(&mut self, rom: &[u8]) -> Result<(), MachineError> {
        let rom_end = ROM_START_ADDRESS + rom.len();
        self.memory
            .get_mut(ROM_START_ADDRESS..rom_end)
            .ok_or(MachineError::ProgramTooLarge {
                size: rom.len(),
                max_size: MAX_PROGRAM_SIZE,
            })?
            .copy_from_slice(rom);

        info!("Loaded {} byte program at {:#06X}", rom.len(), ROM_START_ADDRESS);
        Ok(())
    }

    /// Executes a single cycle: fetch, advance PC, decode, execute, then tick
    /// both timers.
    ///
    /// A faulting instruction aborts the cycle before the timers tick.
    pub fn cycle(&mut self) -> Result<CycleResult, MachineError> {
        let opcode = self.fetch()?;
        self.opcode = opcode;
        self.pc = self.pc.wrapping_add(2);

        let decoded_opcode = Opcode::decode(opcode);
        trace!("{:#06X}: {opcode:04X} {decoded_opcode:?}", self.instruction_address());

        let result = self.execute(decoded_opcode).inspect_err(|err| {
            warn!("Cycle aborted: {err}");
        })?;

        self.timers_cycle();
        Ok(result)
    }

    /// Marks `key` as pressed.
    pub fn set_key(&mut self, key: u8) -> Result<(), MachineError> {
        self.update_key(key, true)
    }

    /// Marks `key` as released.
    pub fn clear_key(&mut self, key: u8) -> Result<(), MachineError> {
        self.update_key(key, false)
    }

    pub fn framebuffer(&self) -> &Framebuffer {
        &self.display
    }

    /// Get the state of a pixel on the display (true = on, false = off).
    pub fn pixel(&self, x: usize, y: usize) -> bool {
        x < DISPLAY_X && y < DISPLAY_Y && self.display[y * DISPLAY_X + x] == PIXEL_ON
    }

    /// Returns true if the sound timer is greater than zero.
    pub fn should_beep(&self) -> bool {
        self.sound_timer > 0
    }

    pub fn pc(&self) -> u16 {
        self.pc
    }

    pub fn index(&self) -> u16 {
        self.i
    }

    pub fn registers(&self) -> &[u8; 16] {
        &self.v
    }

    pub fn stack(&self) -> &[u16] {
        &self.stack
    }

    pub fn delay_timer(&self) -> u8 {
        self.delay_timer
    }

    pub fn sound_timer(&self) -> u8 {
        self.sound_timer
    }

    pub fn keypad(&self) -> &[bool; 16] {
        &self.keypad
    }

    pub fn memory(&self) -> &[u8; MEMORY_SIZE] {
        &self.memory
    }

    fn seed_font(&mut self) {
        self.memory[FONT_START_ADDRESS..FONT_END_ADDRESS].copy_from_slice(&FONT);
    }

    fn update_key(&mut self, key: u8, pressed: bool) -> Result<(), MachineError> {
        let key = u4::try_from(key).map_err(|key| MachineError::InvalidKey { key })?;
        self.keypad[key] = pressed;
        Ok(())
    }

    fn timers_cycle(&mut self) {
        self.delay_timer = self.delay_timer.saturating_sub(1);
        self.sound_timer = self.sound_timer.saturating_sub(1);
    }

    /// Fetches the 16-bit big-endian opcode at PC.
    fn fetch(&self) -> Result<u16, MachineError> {
        let word = self.mem_slice(self.pc, 2)?;
        Ok(u16::from_be_bytes([word[0], word[1]]))
    }

    /// Address of the instruction being executed. Only meaningful once PC has
    /// been advanced past it.
    pub(crate) fn instruction_address(&self) -> u16 {
        self.pc.wrapping_sub(2)
    }

    /// Bounds checked view of `len` bytes of memory starting at `addr`.
    pub(crate) fn mem_slice(&self, addr: u16, len: usize) -> Result<&[u8], MachineError> {
        let start = addr as usize;
        self.memory
            .get(start..start + len)
            .ok_or(out_of_bounds(start))
    }

    /// Mutable counterpart of [`Machine::mem_slice`].
    pub(crate) fn mem_slice_mut(
        &mut self,
        addr: u16,
        len: usize,
    ) -> Result<&mut [u8], MachineError> {
        let start = addr as usize;
        self.memory
            .get_mut(start..start + len)
            .ok_or(out_of_bounds(start))
    }
}

/// Error for an access starting at `start` that runs off the end of memory,
/// reporting the first address that does not exist.
fn out_of_bounds(start: usize) -> MachineError {
    MachineError::MemoryOutOfBounds {
        address: start.max(MEMORY_SIZE) as u16,
    }
}

impl Default for Machine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_machine_seeds_font_and_starts_at_program() {
        let machine = Machine::with_seed(0);
        assert_eq!(machine.pc(), 0x200);
        assert_eq!(&machine.memory()[0x50..0xA0], &FONT);
        assert!(machine.memory()[..0x50].iter().all(|&b| b == 0));
        assert!(machine.memory()[0xA0..].iter().all(|&b| b == 0));
        assert!(machine.framebuffer().iter().all(|&p| p == PIXEL_OFF));
        assert_eq!(machine.registers(), &[0; 16]);
        assert!(machine.stack().is_empty());
    }

    #[test]
    fn load_copies_program_without_touching_other_state() {
        let mut machine = Machine::with_seed(0);
        machine.pc = 0x300;
        machine.v[3] = 9;

        machine.load(&[0xDE, 0xAD, 0xBE, 0xEF]).unwrap();

        assert_eq!(&machine.memory()[0x200..0x204], &[0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(machine.pc(), 0x300);
        assert_eq!(machine.registers()[3], 9);
    }

    #[test]
    fn load_accepts_exactly_max_size() {
        let mut machine = Machine::with_seed(0);
        let rom = vec![0xAB; MAX_PROGRAM_SIZE];
        assert!(machine.load(&rom).is_ok());
        assert_eq!(machine.memory()[MEMORY_SIZE - 1], 0xAB);
    }

    #[test]
    fn load_rejects_oversized_program_and_keeps_memory() {
        let mut machine = Machine::with_seed(0);
        machine.load(&[0x12, 0x34]).unwrap();
        let before = *machine.memory();

        let err = machine.load(&vec![0xFF; MAX_PROGRAM_SIZE + 1]).unwrap_err();

        assert_eq!(
            err,
            MachineError::ProgramTooLarge {
                size: 3585,
                max_size: 3584
            }
        );
        assert_eq!(machine.memory(), &before);
    }

    #[test]
    fn keys_outside_hex_range_are_rejected() {
        let mut machine = Machine::with_seed(0);
        assert_eq!(machine.set_key(16), Err(MachineError::InvalidKey { key: 16 }));
        assert_eq!(machine.clear_key(200), Err(MachineError::InvalidKey { key: 200 }));
        assert!(machine.keypad().iter().all(|&k| !k));
    }

    #[test]
    fn set_and_clear_key() {
        let mut machine = Machine::with_seed(0);
        machine.set_key(0xA).unwrap();
        assert!(machine.keypad()[0xA]);
        machine.clear_key(0xA).unwrap();
        assert!(!machine.keypad()[0xA]);
    }

    #[test]
    fn reset_restores_power_on_state() {
        let mut machine = Machine::with_seed(0);
        machine.load(&[0x60, 0x05]).unwrap();
        machine.memory[0x50] = 0;
        machine.display[10] = PIXEL_ON;
        machine.pc = 0x400;
        machine.i = 0x123;
        machine.v[0xF] = 1;
        machine.stack.push(0x202);
        machine.delay_timer = 3;
        machine.sound_timer = 4;
        machine.keypad[2] = true;

        machine.reset();

        assert_eq!(machine.pc(), 0x200);
        assert_eq!(machine.index(), 0);
        assert_eq!(machine.registers(), &[0; 16]);
        assert!(machine.stack().is_empty());
        assert_eq!(machine.delay_timer(), 0);
        assert_eq!(machine.sound_timer(), 0);
        assert!(machine.keypad().iter().all(|&k| !k));
        assert!(machine.framebuffer().iter().all(|&p| p == PIXEL_OFF));
        assert_eq!(&machine.memory()[0x50..0xA0], &FONT);
        assert_eq!(&machine.memory()[0x200..0x202], &[0, 0]);
    }

    #[test]
    fn cycle_fetches_big_endian_and_advances_pc() {
        let mut machine = Machine::with_seed(0);
        machine.load(&[0x61, 0x2A]).unwrap();

        assert_eq!(machine.cycle(), Ok(CycleResult::Continue));
        assert_eq!(machine.registers()[1], 0x2A);
        assert_eq!(machine.pc(), 0x202);
    }

    #[test]
    fn fetch_at_end_of_memory_is_a_fault() {
        let mut machine = Machine::with_seed(0);
        machine.pc = (MEMORY_SIZE - 1) as u16;
        assert_eq!(
            machine.cycle(),
            Err(MachineError::MemoryOutOfBounds { address: 0x1000 })
        );
        assert_eq!(machine.pc(), 0x0FFF);
    }

    #[test]
    fn fetch_of_last_full_word_succeeds() {
        let mut machine = Machine::with_seed(0);
        // 0x200: jump 0xFFE, 0xFFE: V2 = 0x33
        machine.load(&[0x1F, 0xFE]).unwrap();
        machine.memory[0xFFE] = 0x62;
        machine.memory[0xFFF] = 0x33;

        assert_eq!(machine.cycle(), Ok(CycleResult::Continue));
        assert_eq!(machine.cycle(), Ok(CycleResult::Continue));
        assert_eq!(machine.registers()[2], 0x33);
        assert_eq!(machine.pc(), 0x1000);
    }

    #[test]
    fn timers_tick_once_per_cycle_and_saturate() {
        let mut machine = Machine::with_seed(0);
        // 1200: jump to self
        machine.load(&[0x12, 0x00]).unwrap();
        machine.delay_timer = 2;
        machine.sound_timer = 1;

        machine.cycle().unwrap();
        assert_eq!(machine.delay_timer(), 1);
        assert_eq!(machine.sound_timer(), 0);
        assert!(!machine.should_beep());

        machine.cycle().unwrap();
        machine.cycle().unwrap();
        assert_eq!(machine.delay_timer(), 0);
        assert_eq!(machine.sound_timer(), 0);
    }

    #[test]
    fn pixel_readout_is_row_major() {
        let mut machine = Machine::with_seed(0);
        machine.display[2 * DISPLAY_X + 5] = PIXEL_ON;
        assert!(machine.pixel(5, 2));
        assert!(!machine.pixel(2, 5));
        assert!(!machine.pixel(DISPLAY_X, 0));
    }
}
