use crate::chip8::Chip8;
use crate::types::{Chip8Error, StepOutcome};
use crate::u4;

/// Nominal instruction rate used when the driver does not override it.
pub const DEFAULT_CLOCK_HZ: f32 = 700.0;

/// Delta-time driver around a [`Chip8`].
///
/// The engine never schedules time on its own; this is the external driver
/// that converts wall-clock time into cycles at a fixed clock rate and
/// applies one key snapshot per tick.
pub struct Runner {
    chip8: Chip8,
    keys: [bool; 16],
    cycle_accumulator: f32,
    cycle_time_step: f32,
}

impl Runner {
    pub fn new(chip8: Chip8) -> Self {
        Self::with_clock(chip8, DEFAULT_CLOCK_HZ)
    }

    pub fn with_clock(chip8: Chip8, clock_hz: f32) -> Self {
        Self {
            chip8,
            keys: [false; 16],
            cycle_accumulator: 0.0,
            cycle_time_step: 1.0 / clock_hz,
        }
    }

    /// Advances the machine by `dt` seconds of wall-clock time.
    ///
    /// Injects the current key snapshot once, then runs as many cycles as
    /// the elapsed time covers. A cycle that mutated the framebuffer ends
    /// the batch so drawing stays paced to the display frame; the leftover
    /// time is dropped to avoid catching up in a burst.
    pub fn update(&mut self, dt: f32) -> Result<(), Chip8Error> {
        self.chip8.set_keys(&self.keys);

        self.cycle_accumulator += dt;
        while self.cycle_accumulator >= self.cycle_time_step {
            self.cycle_accumulator -= self.cycle_time_step;

            match self.chip8.step()? {
                StepOutcome::Redraw => {
                    self.cycle_accumulator = 0.0;
                    break;
                }
                StepOutcome::Continue => {}
            }
        }

        Ok(())
    }

    /// Records a key transition to be injected on the next update.
    pub fn set_key(&mut self, key: u4, pressed: bool) {
        self.keys[key] = pressed;
    }

    /// Observes and clears the engine's redraw flag.
    pub fn take_redraw(&mut self) -> bool {
        self.chip8.take_redraw()
    }

    /// State of a single display pixel (true = lit).
    pub fn pixel(&self, y: usize, x: usize) -> bool {
        self.chip8.pixel(y, x)
    }

    /// True while the audio sink should play a tone.
    pub fn should_beep(&self) -> bool {
        self.chip8.should_beep()
    }

    pub fn chip8(&self) -> &Chip8 {
        &self.chip8
    }

    pub fn chip8_mut(&mut self) -> &mut Chip8 {
        &mut self.chip8
    }
}
