use crate::chip8::{Chip8, STACK_DEPTH};
use crate::font::FONT_START_ADDRESS;
use crate::opcode::{AluOp, Opcode};
use crate::types::{Chip8Error, DISPLAY_X, DISPLAY_Y, StepOutcome};
use crate::u4;

impl Chip8 {
    /// Applies one decoded instruction to the machine state.
    ///
    /// The program counter is advanced past the instruction up front; skip
    /// opcodes advance it once more, jumps and calls replace it, and the
    /// stalling and faulting paths rewind it so the same instruction is
    /// re-fetched next cycle.
    pub(crate) fn execute(&mut self, opcode: Opcode) -> Result<StepOutcome, Chip8Error> {
        self.pc = self.pc.wrapping_add(2);

        match opcode {
            Opcode::ClearScreen => {
                self.framebuffer = [[false; DISPLAY_X]; DISPLAY_Y];
                self.redraw = true;
            }
            Opcode::Return => {
                self.sp = self.sp.checked_sub(1).ok_or(Chip8Error::StackUnderflow)?;
                self.pc = self.stack[usize::from(self.sp)];
            }
            Opcode::Jump { nnn } => {
                self.pc = nnn;
            }
            Opcode::JumpV0 { nnn } => {
                self.pc = nnn.wrapping_add(self.v[0].into());
            }
            Opcode::Call { nnn } => {
                if usize::from(self.sp) == STACK_DEPTH {
                    return Err(Chip8Error::StackOverflow { depth: STACK_DEPTH });
                }
                self.stack[usize::from(self.sp)] = self.pc;
                self.sp += 1;
                self.pc = nnn;
            }
            Opcode::SkipEqImm { x, nn } => {
                if self.v[x] == nn {
                    self.pc = self.pc.wrapping_add(2);
                }
            }
            Opcode::SkipNeImm { x, nn } => {
                if self.v[x] != nn {
                    self.pc = self.pc.wrapping_add(2);
                }
            }
            Opcode::SkipEqReg { x, y } => {
                if self.v[x] == self.v[y] {
                    self.pc = self.pc.wrapping_add(2);
                }
            }
            Opcode::SkipNeReg { x, y } => {
                if self.v[x] != self.v[y] {
                    self.pc = self.pc.wrapping_add(2);
                }
            }
            Opcode::LoadImm { x, nn } => {
                self.v[x] = nn;
            }
            Opcode::AddImm { x, nn } => {
                self.v[x] = self.v[x].wrapping_add(nn);
            }
            Opcode::Alu { x, y, op } => {
                self.execute_alu(x, y, op);
            }
            Opcode::Rand { x, nn } => {
                let byte: u8 = rand::random();
                self.v[x] = byte & nn;
            }
            Opcode::LoadIndex { nnn } => {
                self.i = nnn;
            }
            Opcode::AddIndex { x } => {
                // The register itself may exceed 0xFFF; the overflow flag
                // reads the unmasked sum and addresses are masked at use.
                self.i = self.i.wrapping_add(self.v[x].into());
                self.v[0xF] = u8::from(self.i > 0x0FFF);
            }
            Opcode::Draw { x, y, n } => {
                return Ok(self.execute_draw(x, y, n));
            }
            Opcode::SkipKeyDown { x } => {
                let key = usize::from(self.v[x] & 0x0F);
                if self.keypad[key] > 0 {
                    self.keypad[key] = 0;
                    self.pc = self.pc.wrapping_add(2);
                }
            }
            Opcode::SkipKeyUp { x } => {
                let key = usize::from(self.v[x] & 0x0F);
                if self.keypad[key] == 0 {
                    self.pc = self.pc.wrapping_add(2);
                } else {
                    // Observed as down on the fall-through path, so the
                    // press is still consumed.
                    self.keypad[key] = 0;
                }
            }
            Opcode::WaitKey { x } => {
                self.execute_wait_key(x);
            }
            Opcode::ReadDelay { x } => {
                self.v[x] = self.delay_timer;
            }
            Opcode::SetDelay { x } => {
                self.delay_timer = self.v[x];
            }
            Opcode::SetSound { x } => {
                self.sound_timer = self.v[x];
            }
            Opcode::GlyphAddr { x } => {
                let digit = self.v[x] & 0x0F;
                self.i = FONT_START_ADDRESS as u16 + u16::from(digit) * 5;
            }
            Opcode::Bcd { x } => {
                let value = self.v[x];
                self.mem_set(self.i, value / 100);
                self.mem_set(self.i.wrapping_add(1), (value / 10) % 10);
                self.mem_set(self.i.wrapping_add(2), value % 10);
            }
            Opcode::StoreRegs { x } => {
                for reg in 0..=usize::from(x) {
                    self.mem_set(self.i.wrapping_add(reg as u16), self.v[reg]);
                }
            }
            Opcode::LoadRegs { x } => {
                for reg in 0..=usize::from(x) {
                    self.v[reg] = self.mem(self.i.wrapping_add(reg as u16));
                }
            }
            Opcode::Unknown(word) => {
                // Rewound so the driver observes the fault at the faulting
                // address on every subsequent cycle.
                self.pc = self.pc.wrapping_sub(2);
                return Err(Chip8Error::UnknownOpcode { opcode: word });
            }
        };

        Ok(StepOutcome::Continue)
    }

    fn execute_alu(&mut self, x: u4, y: u4, op: AluOp) {
        match op {
            AluOp::Copy => self.v[x] = self.v[y],
            AluOp::Or => self.v[x] |= self.v[y],
            AluOp::And => self.v[x] &= self.v[y],
            AluOp::Xor => self.v[x] ^= self.v[y],
            AluOp::Add => {
                let (result, carry) = self.v[x].overflowing_add(self.v[y]);
                self.v[x] = result;
                self.v[0xF] = u8::from(carry);
            }
            AluOp::Sub => {
                // Not-borrow is 1 only for a strictly greater minuend;
                // equal operands give 0.
                let not_borrow = self.v[x] > self.v[y];
                self.v[x] = self.v[x].wrapping_sub(self.v[y]);
                self.v[0xF] = u8::from(not_borrow);
            }
            AluOp::SubRev => {
                let not_borrow = self.v[y] > self.v[x];
                self.v[x] = self.v[y].wrapping_sub(self.v[x]);
                self.v[0xF] = u8::from(not_borrow);
            }
            AluOp::Shr => {
                let evicted = self.v[x] & 1;
                self.v[x] >>= 1;
                self.v[0xF] = evicted;
            }
            AluOp::Shl => {
                let evicted = self.v[x] >> 7;
                self.v[x] <<= 1;
                self.v[0xF] = evicted;
            }
        }
    }

    /// XOR-blits an `n`-row sprite read from memory at I to (Vx, Vy).
    ///
    /// The origin wraps once at draw start; a sprite extending past the
    /// right or bottom edge is clipped. VF reports whether any lit pixel
    /// was turned off.
    fn execute_draw(&mut self, x: u4, y: u4, n: u4) -> StepOutcome {
        let x_pos = usize::from(self.v[x]) % DISPLAY_X;
        let y_pos = usize::from(self.v[y]) % DISPLAY_Y;

        let rows = usize::from(n).min(DISPLAY_Y - y_pos);
        let cols = 8.min(DISPLAY_X - x_pos);

        let mut collision = false;
        for row in 0..rows {
            let sprite_byte = self.mem(self.i.wrapping_add(row as u16));

            for col in 0..cols {
                if sprite_byte & (0x80 >> col) != 0 {
                    let pixel = &mut self.framebuffer[y_pos + row][x_pos + col];
                    if *pixel {
                        collision = true;
                    }
                    *pixel ^= true;
                }
            }
        }

        self.v[0xF] = u8::from(collision);
        self.redraw = true;
        StepOutcome::Redraw
    }

    fn execute_wait_key(&mut self, x: u4) {
        // The first armed key in index order wins and is consumed, so a
        // single press satisfies at most one wait.
        for key in 0..16u8 {
            if self.keypad[usize::from(key)] > 0 {
                self.keypad[usize::from(key)] = 0;
                self.v[x] = key;
                return;
            }
        }

        // No key armed: rewind so this instruction re-executes next cycle.
        self.pc = self.pc.wrapping_sub(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::FONT;

    /// Fresh machine with `program` loaded at 0x200.
    fn machine(program: &[u8]) -> Chip8 {
        let mut chip8 = Chip8::new();
        chip8.load(program).unwrap();
        chip8
    }

    fn press(chip8: &mut Chip8, key: usize) {
        let mut pressed = [false; 16];
        pressed[key] = true;
        chip8.set_keys(&pressed);
    }

    #[test]
    fn load_then_add_immediate() {
        // LD V0, 5; ADD V0, 3
        let mut chip8 = machine(&[0x60, 0x05, 0x70, 0x03]);

        chip8.step().unwrap();
        chip8.step().unwrap();

        assert_eq!(chip8.v[0], 8);
        assert_eq!(chip8.pc, 0x204);
    }

    #[test]
    fn add_immediate_wraps_modulo_256() {
        // ADD V0, 0xFF repeated; value must wrap, never clamp.
        let mut chip8 = machine(&[0x70, 0xFF, 0x70, 0xFF]);

        chip8.step().unwrap();
        assert_eq!(chip8.v[0], 0xFF);

        chip8.step().unwrap();
        assert_eq!(chip8.v[0], 0xFE);
        // No carry flag for the immediate add.
        assert_eq!(chip8.v[0xF], 0);
    }

    #[test]
    fn add_reg_sets_carry_iff_sum_exceeds_255() {
        for (a, b) in [(200u8, 55u8), (200, 56), (255, 255), (0, 0), (1, 255)] {
            let mut chip8 = machine(&[0x80, 0x14]);
            chip8.v[0] = a;
            chip8.v[1] = b;

            chip8.step().unwrap();

            let sum = u16::from(a) + u16::from(b);
            assert_eq!(chip8.v[0], (sum & 0xFF) as u8, "result for {a} + {b}");
            assert_eq!(chip8.v[0xF], u8::from(sum > 255), "carry for {a} + {b}");
        }
    }

    #[test]
    fn sub_reg_sets_not_borrow_iff_strictly_greater() {
        for (a, b) in [(10u8, 5u8), (5, 10), (7, 7), (0, 1), (255, 0)] {
            let mut chip8 = machine(&[0x80, 0x15]);
            chip8.v[0] = a;
            chip8.v[1] = b;

            chip8.step().unwrap();

            assert_eq!(chip8.v[0], a.wrapping_sub(b), "result for {a} - {b}");
            assert_eq!(chip8.v[0xF], u8::from(a > b), "flag for {a} - {b}");
        }
    }

    #[test]
    fn sub_reverse_uses_swapped_operands() {
        let mut chip8 = machine(&[0x80, 0x17]);
        chip8.v[0] = 5;
        chip8.v[1] = 12;

        chip8.step().unwrap();

        assert_eq!(chip8.v[0], 7);
        assert_eq!(chip8.v[0xF], 1);
    }

    #[test]
    fn shr_evicts_low_bit() {
        let mut chip8 = machine(&[0x80, 0x16]);
        chip8.v[0] = 0b0000_0101;

        chip8.step().unwrap();

        assert_eq!(chip8.v[0], 0b0000_0010);
        assert_eq!(chip8.v[0xF], 1);
    }

    #[test]
    fn shl_uses_canonical_left_shift() {
        // 8xyE shifts left and evicts bit 7; the source-observed duplicate
        // right shift is treated as a defect and not reproduced.
        let mut chip8 = machine(&[0x80, 0x0E, 0x80, 0x0E]);
        chip8.v[0] = 0b1000_0001;

        chip8.step().unwrap();
        assert_eq!(chip8.v[0], 0b0000_0010);
        assert_eq!(chip8.v[0xF], 1);

        chip8.step().unwrap();
        assert_eq!(chip8.v[0], 0b0000_0100);
        assert_eq!(chip8.v[0xF], 0);
    }

    #[test]
    fn logical_ops_leave_flag_register_alone() {
        for low in [0x01u8, 0x02, 0x03] {
            let mut chip8 = machine(&[0x80, 0x10 | low]);
            chip8.v[0] = 0x0F;
            chip8.v[1] = 0x3C;
            chip8.v[0xF] = 0xAA;

            chip8.step().unwrap();

            assert_eq!(chip8.v[0xF], 0xAA, "VF clobbered by 8xy{low:X}");
        }
    }

    #[test]
    fn skip_eq_imm_takes_both_branches() {
        // LD V0, 5; SE V0, 5 -> taken
        let mut chip8 = machine(&[0x60, 0x05, 0x30, 0x05]);
        chip8.step().unwrap();
        chip8.step().unwrap();
        assert_eq!(chip8.pc, 0x206);

        // LD V0, 5; SE V0, 6 -> not taken
        let mut chip8 = machine(&[0x60, 0x05, 0x30, 0x06]);
        chip8.step().unwrap();
        chip8.step().unwrap();
        assert_eq!(chip8.pc, 0x204);
    }

    #[test]
    fn call_and_return_round_trip() {
        // CALL 0x208; ...; at 0x208: RET
        let mut chip8 = machine(&[0x22, 0x08, 0, 0, 0, 0, 0, 0, 0x00, 0xEE]);

        chip8.step().unwrap();
        assert_eq!(chip8.pc, 0x208);
        assert_eq!(chip8.sp, 1);

        chip8.step().unwrap();
        assert_eq!(chip8.pc, 0x202);
        assert_eq!(chip8.sp, 0);
    }

    #[test]
    fn call_past_sixteen_levels_overflows() {
        // CALL 0x200 repeatedly: each call re-enters itself.
        let mut chip8 = machine(&[0x22, 0x00]);

        for _ in 0..16 {
            chip8.step().unwrap();
        }

        assert!(matches!(
            chip8.step(),
            Err(Chip8Error::StackOverflow { depth: 16 })
        ));
    }

    #[test]
    fn return_on_empty_stack_underflows() {
        let mut chip8 = machine(&[0x00, 0xEE]);

        assert!(matches!(chip8.step(), Err(Chip8Error::StackUnderflow)));
    }

    #[test]
    fn jump_v0_adds_register_offset() {
        let mut chip8 = machine(&[0xB2, 0x10]);
        chip8.v[0] = 0x04;

        chip8.step().unwrap();

        assert_eq!(chip8.pc, 0x214);
    }

    #[test]
    fn rand_is_masked_by_immediate() {
        // With mask 0x00 every outcome collapses to zero.
        let mut chip8 = machine(&[0xC0, 0x00]);
        chip8.v[0] = 0xFF;

        chip8.step().unwrap();

        assert_eq!(chip8.v[0], 0);
    }

    #[test]
    fn draw_glyph_zero_at_origin() {
        // LD I, 0x000; DRW V0, V1, 5 -- the digit-0 glyph on a blank screen.
        let mut chip8 = machine(&[0xA0, 0x00, 0xD0, 0x15]);

        chip8.step().unwrap();
        let outcome = chip8.step().unwrap();

        assert_eq!(outcome, StepOutcome::Redraw);
        assert_eq!(chip8.v[0xF], 0, "no collision on a blank screen");
        assert!(chip8.take_redraw());

        for (row, &glyph_byte) in FONT[..5].iter().enumerate() {
            for col in 0..8 {
                let expected = glyph_byte & (0x80 >> col) != 0;
                assert_eq!(
                    chip8.pixel(row, col),
                    expected,
                    "pixel mismatch at ({row}, {col})"
                );
            }
        }
    }

    #[test]
    fn double_draw_restores_screen_and_reports_collision() {
        let program = [0xA0, 0x00, 0xD0, 0x15, 0xD0, 0x15];
        let mut chip8 = machine(&program);

        chip8.step().unwrap();
        chip8.step().unwrap();
        assert_eq!(chip8.v[0xF], 0);

        chip8.step().unwrap();
        assert_eq!(chip8.v[0xF], 1, "second identical draw must collide");
        assert_eq!(
            chip8.framebuffer(),
            &[[false; DISPLAY_X]; DISPLAY_Y],
            "double XOR must restore every pixel"
        );
    }

    #[test]
    fn draw_clips_at_bottom_edge() {
        // Draw an 8-row sprite of solid bytes starting at y = 30.
        let mut chip8 = machine(&[0xA2, 0x10, 0xD0, 0x18]);
        chip8.v[1] = 30;
        for addr in 0x210..0x218 {
            chip8.memory[addr] = 0xFF;
        }

        chip8.step().unwrap();
        chip8.step().unwrap();

        // Rows 30 and 31 are drawn, nothing wraps back to the top.
        assert!(chip8.pixel(30, 0) && chip8.pixel(31, 0));
        assert!(!chip8.pixel(0, 0));
    }

    #[test]
    fn draw_wraps_origin_coordinates_once() {
        let mut chip8 = machine(&[0xA0, 0x00, 0xD0, 0x15]);
        chip8.v[0] = 64; // wraps to column 0
        chip8.v[1] = 32; // wraps to row 0

        chip8.step().unwrap();
        chip8.step().unwrap();

        assert!(chip8.pixel(0, 0), "glyph 0 starts with a lit corner pixel");
    }

    #[test]
    fn skip_key_down_consumes_the_press() {
        // SKP V0; filler; SKP V0 again at the skip target. V0 = 5.
        let mut chip8 = machine(&[0xE0, 0x9E, 0x12, 0x02, 0xE0, 0x9E]);
        chip8.v[0] = 5;
        press(&mut chip8, 5);

        chip8.step().unwrap();
        assert_eq!(chip8.pc, 0x204, "armed key: skip taken");
        assert_eq!(chip8.keypad[5], 0, "press consumed");

        chip8.step().unwrap();
        assert_eq!(chip8.pc, 0x206, "consumed key observed as up");
    }

    #[test]
    fn skip_key_up_consumes_only_on_fall_through() {
        // SKNP V0 with the key armed: no skip, but the press is consumed.
        let mut chip8 = machine(&[0xE0, 0xA1]);
        chip8.v[0] = 3;
        press(&mut chip8, 3);

        chip8.step().unwrap();
        assert_eq!(chip8.pc, 0x202);
        assert_eq!(chip8.keypad[3], 0);

        // SKNP V0 with no key armed: skip, nothing to consume.
        let mut chip8 = machine(&[0xE0, 0xA1]);
        chip8.v[0] = 3;

        chip8.step().unwrap();
        assert_eq!(chip8.pc, 0x204);
    }

    #[test]
    fn wait_key_stalls_until_a_key_is_armed() {
        let mut chip8 = machine(&[0xF5, 0x0A]);
        chip8.delay_timer = 10;

        for _ in 0..3 {
            chip8.step().unwrap();
            assert_eq!(chip8.pc, 0x200, "stall must not advance the pc");
        }
        // The machine stalls but timers keep aging.
        assert_eq!(chip8.delay_timer, 7);

        press(&mut chip8, 0xB);
        chip8.step().unwrap();

        assert_eq!(chip8.v[5], 0xB);
        assert_eq!(chip8.pc, 0x202);
        assert_eq!(chip8.keypad[0xB], 0, "press consumed by the wait");
    }

    #[test]
    fn wait_key_picks_lowest_armed_index() {
        let mut chip8 = machine(&[0xF0, 0x0A]);
        let mut pressed = [false; 16];
        pressed[0x9] = true;
        pressed[0x2] = true;
        chip8.set_keys(&pressed);

        chip8.step().unwrap();

        assert_eq!(chip8.v[0], 0x2);
        assert!(chip8.keypad[0x9] > 0, "other press stays armed");
    }

    #[test]
    fn delay_timer_decays_to_zero_and_stays() {
        // LD DT, V0 with V0 = 5, then jump-to-self as filler.
        let mut chip8 = machine(&[0x60, 0x05, 0xF0, 0x15, 0x12, 0x04]);

        chip8.step().unwrap(); // LD V0, 5
        chip8.step().unwrap(); // LD DT, V0; ages to 4 in the same cycle

        for _ in 0..4 {
            chip8.step().unwrap();
        }
        assert_eq!(chip8.delay_timer, 0);

        chip8.step().unwrap();
        assert_eq!(chip8.delay_timer, 0, "timer must not underflow");
    }

    #[test]
    fn read_delay_reflects_timer_value() {
        let mut chip8 = machine(&[0xF3, 0x07]);
        chip8.delay_timer = 42;

        chip8.step().unwrap();

        assert_eq!(chip8.v[3], 42);
    }

    #[test]
    fn sound_timer_drives_beep_signal() {
        let mut chip8 = machine(&[0x60, 0x03, 0xF0, 0x18, 0x12, 0x04]);

        chip8.step().unwrap();
        chip8.step().unwrap();
        assert!(chip8.should_beep());
        assert_eq!(chip8.sound_level(), 2);

        chip8.step().unwrap();
        chip8.step().unwrap();
        assert!(!chip8.should_beep());
    }

    #[test]
    fn add_index_reports_overflow_past_0xfff() {
        let mut chip8 = machine(&[0xF0, 0x1E]);
        chip8.i = 0xFFF;
        chip8.v[0] = 1;

        chip8.step().unwrap();

        assert_eq!(chip8.i, 0x1000);
        assert_eq!(chip8.v[0xF], 1);

        let mut chip8 = machine(&[0xF0, 0x1E]);
        chip8.i = 0xFF0;
        chip8.v[0] = 1;

        chip8.step().unwrap();

        assert_eq!(chip8.v[0xF], 0);
    }

    #[test]
    fn glyph_addr_uses_low_nibble_times_five() {
        let mut chip8 = machine(&[0xF0, 0x29]);
        chip8.v[0] = 0x2A; // digit A

        chip8.step().unwrap();

        assert_eq!(chip8.i, 5 * 0xA);
    }

    #[test]
    fn bcd_extracts_decimal_digits() {
        let mut chip8 = machine(&[0xF0, 0x33]);
        chip8.v[0] = 247;
        chip8.i = 0x300;

        chip8.step().unwrap();

        assert_eq!(chip8.memory[0x300], 2);
        assert_eq!(chip8.memory[0x301], 4);
        assert_eq!(chip8.memory[0x302], 7);
    }

    #[test]
    fn store_and_load_regs_leave_index_unchanged() {
        let mut chip8 = machine(&[0xF3, 0x55]);
        chip8.v[..4].copy_from_slice(&[10, 20, 30, 40]);
        chip8.i = 0x300;

        chip8.step().unwrap();

        assert_eq!(&chip8.memory[0x300..0x304], &[10, 20, 30, 40]);
        assert_eq!(chip8.i, 0x300);

        let mut chip8 = machine(&[0xF3, 0x65]);
        chip8.memory[0x300..0x304].copy_from_slice(&[1, 2, 3, 4]);
        chip8.i = 0x300;

        chip8.step().unwrap();

        assert_eq!(&chip8.v[..4], &[1, 2, 3, 4]);
        assert_eq!(chip8.i, 0x300);
    }

    #[test]
    fn unknown_opcode_faults_without_advancing_pc() {
        let mut chip8 = machine(&[0x01, 0x23]);
        chip8.delay_timer = 2;

        let err = chip8.step().unwrap_err();
        assert!(matches!(err, Chip8Error::UnknownOpcode { opcode: 0x0123 }));
        assert_eq!(chip8.pc, 0x200);
        // The faulted cycle still ages the timers.
        assert_eq!(chip8.delay_timer, 1);

        // Stepping again reports the same fault.
        assert!(chip8.step().is_err());
        assert_eq!(chip8.pc, 0x200);
    }
}
