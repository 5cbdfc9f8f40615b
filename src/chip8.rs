use crate::font::{FONT, FONT_START_ADDRESS};
use crate::opcode::Opcode;
use crate::types::{Chip8Error, DISPLAY_X, DISPLAY_Y, FrameBuffer, StepOutcome};

pub(crate) const MEMORY_SIZE: usize = 4096;
pub(crate) const ROM_START_ADDRESS: usize = 0x200;
pub(crate) const STACK_DEPTH: usize = 16;

/// Number of cycles a reported key press stays observable before it expires.
///
/// Bridges a slow input-polling cadence and the machine's own cycle rate:
/// a press remains visible to the interpreter until an opcode consumes it
/// or this many cycles pass.
pub(crate) const KEY_HOLD_CYCLES: u8 = 100;

/// Memory addresses are 12 bits wide; the index register may transiently
/// exceed this but is masked wherever it is used as an address.
const ADDRESS_MASK: u16 = 0x0FFF;

/// The CHIP-8 virtual machine.
///
/// Owns all machine state and is driven entirely from outside: the caller
/// decides the cycle cadence via [`Chip8::step`], injects input via
/// [`Chip8::set_keys`], and drains the framebuffer and sound level through
/// the read-only observation methods.
pub struct Chip8 {
    pub(crate) memory: [u8; MEMORY_SIZE],
    pub(crate) framebuffer: FrameBuffer,
    /// Set whenever the framebuffer is mutated, cleared by `take_redraw`.
    pub(crate) redraw: bool,

    /// Address of the next instruction to execute.
    pub(crate) pc: u16,
    /// Index register, used by the memory-indexed opcodes.
    pub(crate) i: u16,
    /// General-purpose registers V0-VF. VF doubles as the flag register.
    pub(crate) v: [u8; 16],
    pub(crate) stack: [u16; STACK_DEPTH],
    pub(crate) sp: u8,

    pub(crate) delay_timer: u8,
    pub(crate) sound_timer: u8,

    /// Per-key debounce counters. A key is logically down while its
    /// counter is positive; consuming opcodes zero it so one physical
    /// press is observed at most once.
    pub(crate) keypad: [u8; 16],
}

impl Chip8 {
    pub fn new() -> Self {
        let mut chip8 = Chip8 {
            memory: [0; MEMORY_SIZE],
            framebuffer: [[false; DISPLAY_X]; DISPLAY_Y],
            redraw: false,
            pc: 0,
            i: 0,
            v: [0; 16],
            stack: [0; STACK_DEPTH],
            sp: 0,
            delay_timer: 0,
            sound_timer: 0,
            keypad: [0; 16],
        };
        chip8.reset();
        chip8
    }

    /// Resets the machine to its power-on state.
    ///
    /// Zeroes registers, stack, timers and the keypad latch, clears the
    /// framebuffer, writes the built-in digit glyphs into low memory and
    /// points the program counter at the ROM start address. Loaded program
    /// bytes are left in place; call [`Chip8::load`] afterwards to replace
    /// them.
    pub fn reset(&mut self) {
        self.pc = ROM_START_ADDRESS as u16;
        self.i = 0;
        self.v = [0; 16];
        self.stack = [0; STACK_DEPTH];
        self.sp = 0;
        self.delay_timer = 0;
        self.sound_timer = 0;
        self.keypad = [0; 16];

        let font_end = FONT_START_ADDRESS + FONT.len();
        self.memory[FONT_START_ADDRESS..font_end].copy_from_slice(&FONT);

        self.framebuffer = [[false; DISPLAY_X]; DISPLAY_Y];
        self.redraw = true;
    }

    /// Copies a program into memory starting at 0x200.
    ///
    /// The supported sequence is reset-then-load; loading over a running
    /// machine reuses whatever state exists.
    pub fn load(&mut self, rom: &[u8]) -> Result<(), Chip8Error> {
        let rom_end = ROM_START_ADDRESS + rom.len();
        self.memory
            .get_mut(ROM_START_ADDRESS..rom_end)
            .ok_or(Chip8Error::RomTooLarge {
                size: rom.len(),
                max_size: MEMORY_SIZE - ROM_START_ADDRESS,
            })?
            .copy_from_slice(rom);

        Ok(())
    }

    /// Executes exactly one machine cycle.
    ///
    /// One cycle is fetch, decode, execute, then aging of both timers and
    /// of every armed keypad counter. The caller controls cadence; nothing
    /// is scheduled internally.
    ///
    /// An unknown opcode leaves the program counter in place and surfaces
    /// as [`Chip8Error::UnknownOpcode`]; a driver that keeps stepping will
    /// see the same fault every cycle. Timers and the keypad age even on a
    /// faulted cycle.
    pub fn step(&mut self) -> Result<StepOutcome, Chip8Error> {
        let word = self.fetch();
        let outcome = self.execute(Opcode::decode(word));

        self.delay_timer = self.delay_timer.saturating_sub(1);
        self.sound_timer = self.sound_timer.saturating_sub(1);
        for counter in &mut self.keypad {
            *counter = counter.saturating_sub(1);
        }

        outcome
    }

    /// Injects one snapshot of the pressed state of all 16 keys.
    ///
    /// Every reported key is re-armed to the full debounce duration; keys
    /// not reported keep aging from wherever the step cycle left them.
    pub fn set_keys(&mut self, pressed: &[bool; 16]) {
        for (counter, &down) in self.keypad.iter_mut().zip(pressed) {
            if down {
                *counter = KEY_HOLD_CYCLES;
            }
        }
    }

    /// Observes and clears the redraw flag.
    pub fn take_redraw(&mut self) -> bool {
        std::mem::take(&mut self.redraw)
    }

    /// Read-only view of the 64x32 framebuffer.
    pub fn framebuffer(&self) -> &FrameBuffer {
        &self.framebuffer
    }

    /// State of a single pixel (true = lit).
    pub fn pixel(&self, y: usize, x: usize) -> bool {
        self.framebuffer[y][x]
    }

    /// Current sound-timer value; 0 means silent.
    pub fn sound_level(&self) -> u8 {
        self.sound_timer
    }

    /// True while the audio sink should play a tone.
    pub fn should_beep(&self) -> bool {
        self.sound_timer > 0
    }

    /// Fetches the 16-bit instruction word at the program counter,
    /// high byte first.
    fn fetch(&self) -> u16 {
        let high = self.mem(self.pc);
        let low = self.mem(self.pc.wrapping_add(1));

        u16::from_be_bytes([high, low])
    }

    pub(crate) fn mem(&self, addr: u16) -> u8 {
        self.memory[(addr & ADDRESS_MASK) as usize]
    }

    pub(crate) fn mem_set(&mut self, addr: u16, value: u8) {
        self.memory[(addr & ADDRESS_MASK) as usize] = value;
    }
}

impl Default for Chip8 {
    fn default() -> Self {
        Self::new()
    }
}
