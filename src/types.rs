pub const DISPLAY_X: usize = 64;
pub const DISPLAY_Y: usize = 32;

/// Monochrome framebuffer, row-major: indexed as `[y][x]`.
pub type FrameBuffer = [[bool; DISPLAY_X]; DISPLAY_Y];

/// Result of a single interpreter cycle.
#[derive(Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// The cycle completed without touching the framebuffer.
    Continue,
    /// The framebuffer was mutated; the display should be refreshed
    /// before more cycles run.
    Redraw,
}

/// Faults the interpreter reports to its driver.
#[derive(Debug, thiserror::Error)]
pub enum Chip8Error {
    #[error("program is too large ({size} bytes), max size is {max_size} bytes")]
    RomTooLarge { size: usize, max_size: usize },

    #[error("call stack overflow: subroutine nesting exceeds {depth} levels")]
    StackOverflow { depth: usize },

    #[error("call stack underflow: return executed with no saved address")]
    StackUnderflow,

    #[error("unknown opcode: {opcode:#06X}")]
    UnknownOpcode { opcode: u16 },
}
