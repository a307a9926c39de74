use log::debug;
use rand::Rng;

use super::{
    AluOp, CycleResult, DISPLAY_SIZE, DISPLAY_X, DISPLAY_Y, FONT_GLYPH_SIZE, FONT_START_ADDRESS,
    Machine, MachineError, Opcode, PIXEL_OFF, PIXEL_ON, STACK_DEPTH,
};
use crate::u4;

/// Flag register index.
const VF: usize = 0xF;

impl Machine {
    /// Applies one decoded instruction. PC already points past it.
    pub(crate) fn execute(&mut self, opcode: Opcode) -> Result<CycleResult, MachineError> {
        match opcode {
            Opcode::ClearDisplay => {
                self.display = [PIXEL_OFF; DISPLAY_SIZE];
                return Ok(CycleResult::DisplayUpdated);
            }
            Opcode::Return => {
                self.pc = self.stack.pop().ok_or(MachineError::StackUnderflow {
                    address: self.instruction_address(),
                    opcode: self.opcode,
                })?;
            }
            Opcode::Jump { nnn } => {
                self.pc = nnn;
            }
            Opcode::JumpWithOffset { nnn } => {
                self.pc = nnn.wrapping_add(self.v[0].into());
            }
            Opcode::Call { nnn } => {
                if self.stack.len() >= STACK_DEPTH {
                    return Err(MachineError::StackOverflow {
                        address: self.instruction_address(),
                        opcode: self.opcode,
                    });
                }
                self.stack.push(self.pc);
                self.pc = nnn;
            }
            Opcode::SkipRegEqualImm { x, kk } => {
                self.skip_if(self.v[x] == kk);
            }
            Opcode::SkipRegNotEqualImm { x, kk } => {
                self.skip_if(self.v[x] != kk);
            }
            Opcode::SkipRegEqualReg { x, y } => {
                self.skip_if(self.v[x] == self.v[y]);
            }
            Opcode::SkipRegNotEqualReg { x, y } => {
                self.skip_if(self.v[x] != self.v[y]);
            }
            Opcode::SetRegImm { x, kk } => {
                self.v[x] = kk;
            }
            Opcode::AddRegImm { x, kk } => {
                self.v[x] = self.v[x].wrapping_add(kk);
            }
            Opcode::Alu { x, y, op } => {
                self.execute_alu(x, y, op);
            }
            Opcode::SetIndexImm { nnn } => {
                self.i = nnn;
            }
            Opcode::AddIndexReg { x } => {
                self.i = self.i.wrapping_add(self.v[x].into());
            }
            Opcode::Random { x, kk } => {
                let rand_byte: u8 = self.rng.random();
                self.v[x] = rand_byte & kk;
            }
            Opcode::Draw { x, y, n } => {
                return self.execute_draw(x, y, n);
            }
            Opcode::SkipIfPressed { x } => {
                self.skip_if(self.is_key_pressed(self.v[x]));
            }
            Opcode::SkipIfNotPressed { x } => {
                self.skip_if(!self.is_key_pressed(self.v[x]));
            }
            Opcode::WaitForKey { x } => {
                return Ok(self.execute_wait_for_key(x));
            }
            Opcode::ReadDelayTimer { x } => {
                self.v[x] = self.delay_timer;
            }
            Opcode::SetDelayTimer { x } => {
                self.delay_timer = self.v[x];
            }
            Opcode::SetSoundTimer { x } => {
                self.sound_timer = self.v[x];
            }
            Opcode::FontChar { x } => {
                self.i = FONT_START_ADDRESS as u16 + FONT_GLYPH_SIZE * u16::from(self.v[x]);
            }
            Opcode::Bcd { x } => {
                let value = self.v[x];
                let digits = self.mem_slice_mut(self.i, 3)?;
                digits[0] = value / 100;
                digits[1] = (value / 10) % 10;
                digits[2] = value % 10;
            }
            Opcode::StoreRegs { x } => {
                let count = usize::from(x) + 1;
                let regs = self.v;
                self.mem_slice_mut(self.i, count)?.copy_from_slice(&regs[..count]);
            }
            Opcode::LoadRegs { x } => {
                let count = usize::from(x) + 1;
                let mut regs = self.v;
                regs[..count].copy_from_slice(self.mem_slice(self.i, count)?);
                self.v = regs;
            }
            Opcode::Unknown(opcode) => {
                debug!(
                    "Ignoring unknown opcode {opcode:#06X} at {:#06X}",
                    self.instruction_address()
                );
            }
        };

        Ok(CycleResult::Continue)
    }

    fn skip_if(&mut self, condition: bool) {
        if condition {
            self.pc = self.pc.wrapping_add(2);
        }
    }

    /// Values above 0xF name no key and are never pressed.
    fn is_key_pressed(&self, key: u8) -> bool {
        self.keypad.get(usize::from(key)).copied().unwrap_or(false)
    }

    fn execute_alu(&mut self, x: u4, y: u4, op: AluOp) {
        match op {
            AluOp::Set => self.v[x] = self.v[y],
            AluOp::Or => self.v[x] |= self.v[y],
            AluOp::And => self.v[x] &= self.v[y],
            AluOp::Xor => self.v[x] ^= self.v[y],
            AluOp::Add => {
                let (res, overflow) = self.v[x].overflowing_add(self.v[y]);
                self.v[x] = res;
                self.v[VF] = u8::from(overflow);
            }
            AluOp::Sub => {
                // VF is set only on a strictly greater minuend, so equal operands give 0
                let flag = u8::from(self.v[x] > self.v[y]);
                self.v[x] = self.v[x].wrapping_sub(self.v[y]);
                self.v[VF] = flag;
            }
            AluOp::SubReverse => {
                let flag = u8::from(self.v[y] > self.v[x]);
                self.v[x] = self.v[y].wrapping_sub(self.v[x]);
                self.v[VF] = flag;
            }
            AluOp::ShiftRight => {
                let lsb = self.v[x] & 1;
                self.v[VF] = lsb;
                self.v[x] >>= 1;
            }
            AluOp::ShiftLeft => {
                let msb = (self.v[x] & 0x80) >> 7;
                self.v[VF] = msb;
                self.v[x] <<= 1;
            }
        }
    }

    fn execute_draw(&mut self, x: u4, y: u4, n: u4) -> Result<CycleResult, MachineError> {
        let x_pos = self.v[x] as usize % DISPLAY_X;
        let y_pos = self.v[y] as usize % DISPLAY_Y;

        // Only the origin wraps, sprites clip at the right and bottom edges
        let row_count = std::cmp::min(usize::from(n), DISPLAY_Y - y_pos);
        let col_count = std::cmp::min(8, DISPLAY_X - x_pos);

        // Read every row up front so a bad I leaves the display untouched
        let mut sprite = [0u8; 15];
        sprite[..row_count].copy_from_slice(self.mem_slice(self.i, row_count)?);

        let mut any_erased = false;
        for (row, &sprite_byte) in sprite[..row_count].iter().enumerate() {
            for col in 0..col_count {
                // If current sprite bit is non-zero
                if (sprite_byte & (0x80 >> col)) != 0 {
                    let pixel = &mut self.display[(y_pos + row) * DISPLAY_X + x_pos + col];

                    if *pixel == PIXEL_ON {
                        any_erased = true;
                    }

                    // Flip the pixel
                    *pixel ^= PIXEL_ON;
                }
            }
        }

        self.v[VF] = u8::from(any_erased);
        Ok(CycleResult::DisplayUpdated)
    }

    /// Polls the keypad once. With nothing pressed PC is rewound so the next
    /// cycle fetches this same instruction again.
    fn execute_wait_for_key(&mut self, x: u4) -> CycleResult {
        match self.keypad.iter().position(|&pressed| pressed) {
            Some(key) => {
                self.v[x] = key as u8;
                CycleResult::Continue
            }
            None => {
                self.pc = self.pc.wrapping_sub(2);
                CycleResult::WaitingForKey
            }
        }
    }
}
