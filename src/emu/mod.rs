mod execute;
mod font;
mod machine;
mod opcode;
mod runner;
mod types;

pub(crate) use font::*;
pub use machine::*;
pub use opcode::*;
pub use runner::*;
pub use types::*;
