use crate::u4;

/// CHIP-8 instruction opcodes.
///
/// The fields (x, y, n, kk, nnn) correspond to the operands encoded in the opcode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Opcode {
    /// 00E0 - Clear the display.
    ClearDisplay,
    /// 00EE - Return from a subroutine.
    Return,

    /// 1nnn - Jump to location nnn.
    Jump { nnn: u16 },
    /// Bnnn - Jump to location nnn + V0.
    JumpWithOffset { nnn: u16 },
    /// 2nnn - Call subroutine at nnn.
    Call { nnn: u16 },

    /// 3xkk - Skip next instruction if Vx == kk.
    SkipRegEqualImm { x: u4, kk: u8 },
    /// 4xkk - Skip next instruction if Vx != kk.
    SkipRegNotEqualImm { x: u4, kk: u8 },
    /// 5xy0 - Skip next instruction if Vx == Vy.
    SkipRegEqualReg { x: u4, y: u4 },
    /// 9xy0 - Skip next instruction if Vx != Vy.
    SkipRegNotEqualReg { x: u4, y: u4 },

    /// 6xkk - Set Vx = kk.
    SetRegImm { x: u4, kk: u8 },
    /// 7xkk - Set Vx = Vx + kk.
    AddRegImm { x: u4, kk: u8 },

    /// 8xyN - Register to register ALU operations.
    Alu { x: u4, y: u4, op: AluOp },

    /// Annn - Set I = nnn.
    SetIndexImm { nnn: u16 },
    /// Fx1E - Set I = I + Vx.
    AddIndexReg { x: u4 },

    /// Cxkk - Set Vx = random byte AND kk.
    Random { x: u4, kk: u8 },
    /// Dxyn - Draw an n-byte sprite at (Vx, Vy), set VF = collision.
    Draw { x: u4, y: u4, n: u4 },

    /// Ex9E - Skip next instruction if key Vx is pressed.
    SkipIfPressed { x: u4 },
    /// ExA1 - Skip next instruction if key Vx is not pressed.
    SkipIfNotPressed { x: u4 },
    /// Fx0A - Poll for a pressed key and store it in Vx, re-executing until one is down.
    WaitForKey { x: u4 },

    /// Fx07 - Set Vx = delay timer value.
    ReadDelayTimer { x: u4 },
    /// Fx15 - Set delay timer = Vx.
    SetDelayTimer { x: u4 },
    /// Fx18 - Set sound timer = Vx.
    SetSoundTimer { x: u4 },

    /// Fx29 - Set I = location of the font glyph for digit Vx.
    FontChar { x: u4 },
    /// Fx33 - Store BCD representation of Vx in memory locations I, I+1, and I+2.
    Bcd { x: u4 },
    /// Fx55 - Store registers V0 through Vx in memory starting at location I.
    StoreRegs { x: u4 },
    /// Fx65 - Read registers V0 through Vx from memory starting at location I.
    LoadRegs { x: u4 },

    /// Any word that matches no operation. Executes as a no-op.
    Unknown(u16),
}

/// ALU operations for the 8xyN instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AluOp {
    /// 8xy0 - Vx = Vy
    Set,
    /// 8xy1 - Vx = Vx OR Vy
    Or,
    /// 8xy2 - Vx = Vx AND Vy
    And,
    /// 8xy3 - Vx = Vx XOR Vy
    Xor,
    /// 8xy4 - Vx = Vx + Vy, VF = carry
    Add,
    /// 8xy5 - Vx = Vx - Vy, VF = Vx > Vy
    Sub,
    /// 8xy6 - Vx = Vx SHR 1, VF = shifted out bit
    ShiftRight,
    /// 8xy7 - Vx = Vy - Vx, VF = Vy > Vx
    SubReverse,
    /// 8xyE - Vx = Vx SHL 1, VF = shifted out bit
    ShiftLeft,
}

impl Opcode {
    /// Decode a 16-bit raw opcode into an `Opcode` enum variant.
    ///
    /// Families are selected by the top nibble alone, except 0, 8, E and F which
    /// look at the low byte (or the low nibble for 8).
    pub fn decode(opcode: u16) -> Self {
        let nibble = (
            ((opcode & 0xF000) >> 12) as u8,
            ((opcode & 0x0F00) >> 8) as u8,
            ((opcode & 0x00F0) >> 4) as u8,
            (opcode & 0x000F) as u8,
        );

        let x = u4::new(nibble.1);
        let y = u4::new(nibble.2);
        let n = u4::new(nibble.3);
        let kk = (opcode & 0x00FF) as u8;
        let nnn = opcode & 0x0FFF;

        match (nibble.0, kk) {
            (0x0, 0xE0) => Opcode::ClearDisplay,
            (0x0, 0xEE) => Opcode::Return,
            (0x1, _) => Opcode::Jump { nnn },
            (0x2, _) => Opcode::Call { nnn },
            (0x3, _) => Opcode::SkipRegEqualImm { x, kk },
            (0x4, _) => Opcode::SkipRegNotEqualImm { x, kk },
            (0x5, _) => Opcode::SkipRegEqualReg { x, y },
            (0x6, _) => Opcode::SetRegImm { x, kk },
            (0x7, _) => Opcode::AddRegImm { x, kk },
            (0x8, _) => Opcode::Alu {
                x,
                y,
                op: match nibble.3 {
                    0x0 => AluOp::Set,
                    0x1 => AluOp::Or,
                    0x2 => AluOp::And,
                    0x3 => AluOp::Xor,
                    0x4 => AluOp::Add,
                    0x5 => AluOp::Sub,
                    0x6 => AluOp::ShiftRight,
                    0x7 => AluOp::SubReverse,
                    0xE => AluOp::ShiftLeft,
                    _ => return Opcode::Unknown(opcode),
                },
            },
            (0x9, _) => Opcode::SkipRegNotEqualReg { x, y },
            (0xA, _) => Opcode::SetIndexImm { nnn },
            (0xB, _) => Opcode::JumpWithOffset { nnn },
            (0xC, _) => Opcode::Random { x, kk },
            (0xD, _) => Opcode::Draw { x, y, n },
            (0xE, 0x9E) => Opcode::SkipIfPressed { x },
            (0xE, 0xA1) => Opcode::SkipIfNotPressed { x },
            (0xF, 0x07) => Opcode::ReadDelayTimer { x },
            (0xF, 0x0A) => Opcode::WaitForKey { x },
            (0xF, 0x15) => Opcode::SetDelayTimer { x },
            (0xF, 0x18) => Opcode::SetSoundTimer { x },
            (0xF, 0x1E) => Opcode::AddIndexReg { x },
            (0xF, 0x29) => Opcode::FontChar { x },
            (0xF, 0x33) => Opcode::Bcd { x },
            (0xF, 0x55) => Opcode::StoreRegs { x },
            (0xF, 0x65) => Opcode::LoadRegs { x },

            _ => Opcode::Unknown(opcode),
        }
    }
}
