pub const DISPLAY_X: usize = 64;
pub const DISPLAY_Y: usize = 32;
pub const DISPLAY_SIZE: usize = DISPLAY_X * DISPLAY_Y;

/// Framebuffer value of a lit pixel.
pub const PIXEL_ON: u32 = 0xFFFF_FFFF;
/// Framebuffer value of a dark pixel.
pub const PIXEL_OFF: u32 = 0x0000_0000;

/// Row-major 64x32 framebuffer, index = `y * DISPLAY_X + x`.
pub type Framebuffer = [u32; DISPLAY_SIZE];

/// Outcome of a single `Machine::cycle`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CycleResult {
    /// The instruction executed and nothing visible changed.
    Continue,
    /// The framebuffer was cleared or drawn to.
    DisplayUpdated,
    /// `Fx0A` found no pressed key and rewound PC to poll again next cycle.
    WaitingForKey,
}

/// Error types that can occur while loading or running a program
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum MachineError {
    #[error("Program is too large ({size} bytes), max size is {max_size} bytes")]
    ProgramTooLarge { size: usize, max_size: usize },

    #[error("Invalid key index {key}, expected 0x0-0xF")]
    InvalidKey { key: u8 },

    #[error("Stack underflow: return with empty call stack at {address:#06X} (opcode {opcode:#06X})")]
    StackUnderflow { address: u16, opcode: u16 },

    #[error("Stack overflow: call depth exceeded at {address:#06X} (opcode {opcode:#06X})")]
    StackOverflow { address: u16, opcode: u16 },

    #[error("Memory access out of bounds at address {address:#06X}")]
    MemoryOutOfBounds { address: u16 },
}
