use crate::u4;

/// Decoded CHIP-8 instructions.
///
/// The fields (x, y, n, nn, nnn) are the operand fields encoded in the
/// 16-bit instruction word.
#[derive(Debug, PartialEq, Eq)]
pub enum Opcode {
    /// 00E0 - Clear the display.
    ClearScreen,
    /// 00EE - Return from a subroutine.
    Return,

    /// 1nnn - Jump to address nnn.
    Jump { nnn: u16 },
    /// Bnnn - Jump to address nnn + V0.
    JumpV0 { nnn: u16 },
    /// 2nnn - Call subroutine at nnn.
    Call { nnn: u16 },

    /// 3xnn - Skip next instruction if Vx == nn.
    SkipEqImm { x: u4, nn: u8 },
    /// 4xnn - Skip next instruction if Vx != nn.
    SkipNeImm { x: u4, nn: u8 },
    /// 5xy0 - Skip next instruction if Vx == Vy.
    SkipEqReg { x: u4, y: u4 },
    /// 9xy0 - Skip next instruction if Vx != Vy.
    SkipNeReg { x: u4, y: u4 },

    /// 6xnn - Set Vx = nn.
    LoadImm { x: u4, nn: u8 },
    /// 7xnn - Set Vx = Vx + nn, no carry flag.
    AddImm { x: u4, nn: u8 },

    /// 8xyN - Register-register ALU operations.
    Alu { x: u4, y: u4, op: AluOp },
    /// Cxnn - Set Vx = random byte AND nn.
    Rand { x: u4, nn: u8 },

    /// Annn - Set I = nnn.
    LoadIndex { nnn: u16 },
    /// Fx1E - Set I = I + Vx, VF = 1 on overflow past 0xFFF.
    AddIndex { x: u4 },

    /// Dxyn - XOR-draw an n-byte sprite at (Vx, Vy), VF = collision.
    Draw { x: u4, y: u4, n: u4 },

    /// Ex9E - Skip next instruction if the key in Vx is down.
    SkipKeyDown { x: u4 },
    /// ExA1 - Skip next instruction if the key in Vx is up.
    SkipKeyUp { x: u4 },
    /// Fx0A - Stall until any key is down, store it in Vx.
    WaitKey { x: u4 },

    /// Fx07 - Set Vx = delay timer.
    ReadDelay { x: u4 },
    /// Fx15 - Set delay timer = Vx.
    SetDelay { x: u4 },
    /// Fx18 - Set sound timer = Vx.
    SetSound { x: u4 },

    /// Fx29 - Set I = glyph address for the low nibble of Vx.
    GlyphAddr { x: u4 },
    /// Fx33 - Store the BCD digits of Vx at I, I+1, I+2.
    Bcd { x: u4 },

    /// Fx55 - Store V0..=Vx into memory starting at I.
    StoreRegs { x: u4 },
    /// Fx65 - Load V0..=Vx from memory starting at I.
    LoadRegs { x: u4 },

    /// An instruction word that matches no table entry.
    Unknown(u16),
}

/// Sub-operations of the 8xyN family.
#[derive(Debug, PartialEq, Eq)]
pub enum AluOp {
    /// 8xy0 - Vx = Vy
    Copy,
    /// 8xy1 - Vx |= Vy
    Or,
    /// 8xy2 - Vx &= Vy
    And,
    /// 8xy3 - Vx ^= Vy
    Xor,
    /// 8xy4 - Vx += Vy, VF = carry
    Add,
    /// 8xy5 - Vx -= Vy, VF = not borrow
    Sub,
    /// 8xy6 - Vx >>= 1, VF = evicted bit
    Shr,
    /// 8xy7 - Vx = Vy - Vx, VF = not borrow
    SubRev,
    /// 8xyE - Vx <<= 1, VF = evicted bit
    Shl,
}

impl Opcode {
    /// Decodes a 16-bit instruction word into its table entry.
    ///
    /// Pure function of the word; anything that matches no entry at the top
    /// level or a nested sub-dispatch becomes [`Opcode::Unknown`].
    pub fn decode(word: u16) -> Self {
        let nibble = (
            ((word & 0xF000) >> 12) as u8,
            ((word & 0x0F00) >> 8) as u8,
            ((word & 0x00F0) >> 4) as u8,
            (word & 0x000F) as u8,
        );

        let x = u4::new(nibble.1);
        let y = u4::new(nibble.2);
        let n = u4::new(nibble.3);
        let nn = (word & 0x00FF) as u8;
        let nnn = word & 0x0FFF;

        match nibble {
            (0x0, 0x0, 0xE, 0x0) => Opcode::ClearScreen,
            (0x0, 0x0, 0xE, 0xE) => Opcode::Return,
            (0x1, _, _, _) => Opcode::Jump { nnn },
            (0x2, _, _, _) => Opcode::Call { nnn },
            (0x3, _, _, _) => Opcode::SkipEqImm { x, nn },
            (0x4, _, _, _) => Opcode::SkipNeImm { x, nn },
            (0x5, _, _, 0x0) => Opcode::SkipEqReg { x, y },
            (0x6, _, _, _) => Opcode::LoadImm { x, nn },
            (0x7, _, _, _) => Opcode::AddImm { x, nn },
            (0x8, _, _, _) => {
                let op = match nibble.3 {
                    0x0 => AluOp::Copy,
                    0x1 => AluOp::Or,
                    0x2 => AluOp::And,
                    0x3 => AluOp::Xor,
                    0x4 => AluOp::Add,
                    0x5 => AluOp::Sub,
                    0x6 => AluOp::Shr,
                    0x7 => AluOp::SubRev,
                    0xE => AluOp::Shl,
                    _ => return Opcode::Unknown(word),
                };
                Opcode::Alu { x, y, op }
            }
            (0x9, _, _, 0x0) => Opcode::SkipNeReg { x, y },
            (0xA, _, _, _) => Opcode::LoadIndex { nnn },
            (0xB, _, _, _) => Opcode::JumpV0 { nnn },
            (0xC, _, _, _) => Opcode::Rand { x, nn },
            (0xD, _, _, _) => Opcode::Draw { x, y, n },
            (0xE, _, 0x9, 0xE) => Opcode::SkipKeyDown { x },
            (0xE, _, 0xA, 0x1) => Opcode::SkipKeyUp { x },
            (0xF, _, 0x0, 0x7) => Opcode::ReadDelay { x },
            (0xF, _, 0x0, 0xA) => Opcode::WaitKey { x },
            (0xF, _, 0x1, 0x5) => Opcode::SetDelay { x },
            (0xF, _, 0x1, 0x8) => Opcode::SetSound { x },
            (0xF, _, 0x1, 0xE) => Opcode::AddIndex { x },
            (0xF, _, 0x2, 0x9) => Opcode::GlyphAddr { x },
            (0xF, _, 0x3, 0x3) => Opcode::Bcd { x },
            (0xF, _, 0x5, 0x5) => Opcode::StoreRegs { x },
            (0xF, _, 0x6, 0x5) => Opcode::LoadRegs { x },

            _ => Opcode::Unknown(word),
        }
    }
}
