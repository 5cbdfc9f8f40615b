mod chip8;
mod execute;
mod font;
mod nibble;
mod opcode;
mod runner;
mod types;

pub use chip8::Chip8;
pub use nibble::u4;
pub use opcode::{AluOp, Opcode};
pub use runner::{DEFAULT_CLOCK_HZ, Runner};
pub use types::{Chip8Error, DISPLAY_X, DISPLAY_Y, FrameBuffer, StepOutcome};
