//! A CHIP-8 interpreter core.
//!
//! [`Machine`] holds the complete interpreter state and executes one instruction per
//! [`Machine::cycle`]. [`Runner`] paces a machine from wall-clock time for hosts that
//! want a fixed instruction rate.

pub mod emu;
mod nibble;

pub use emu::*;
pub use nibble::u4;
