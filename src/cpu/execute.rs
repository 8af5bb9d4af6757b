//! One-instruction fetch/decode/execute step (§4.D). `step` is the hot
//! path: the state-word check happens once per call, and nothing between
//! fetch and commit allocates.

use super::{csr, decode, fp};
use crate::error::EmulatorFault;
use crate::rvc;
use crate::syscall;
use crate::Emulator;

const OP_LOAD: u32 = 0x03;
const OP_LOAD_FP: u32 = 0x07;
const OP_MISC_MEM: u32 = 0x0F;
const OP_OP_IMM: u32 = 0x13;
const OP_AUIPC: u32 = 0x17;
const OP_OP_IMM_32: u32 = 0x1B;
const OP_STORE: u32 = 0x23;
const OP_STORE_FP: u32 = 0x27;
const OP_AMO: u32 = 0x2F;
const OP_OP: u32 = 0x33;
const OP_LUI: u32 = 0x37;
const OP_OP_32: u32 = 0x3B;
const OP_FMADD: u32 = 0x43;
const OP_FMSUB: u32 = 0x47;
const OP_FNMSUB: u32 = 0x4B;
const OP_FNMADD: u32 = 0x4F;
const OP_OP_FP: u32 = 0x53;
const OP_BRANCH: u32 = 0x63;
const OP_JALR: u32 = 0x67;
const OP_JAL: u32 = 0x6F;
const OP_SYSTEM: u32 = 0x73;

/// What happened after executing one instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Continue,
    Exit(i32),
}

/// Fetches, (if needed) expands, decodes, and executes one instruction.
pub fn step(emu: &mut Emulator) -> Result<StepOutcome, EmulatorFault> {
    let pc = emu.cpu.pc;
    let half = emu.image.read_u16(pc)?;
    let (raw, next_pc, compressed) = if half & 0b11 == 0b11 {
        let word = emu.image.read_u32(pc)?;
        (word, pc + 4, false)
    } else {
        let expanded = rvc::expand_cached(half).ok_or(EmulatorFault::IllegalInstruction {
            pc,
            raw: u32::from(half),
        })?;
        (expanded, pc + 2, true)
    };

    if emu.state.trace_enabled && emu.process.trace_instructions {
        emu.sink.instruction(crate::trace::InstructionEvent {
            pc,
            raw,
            compressed,
        });
    }

    // Default to the sequential successor; jump and taken-branch arms
    // overwrite `emu.cpu.pc` before returning.
    emu.cpu.pc = next_pc;
    let outcome = execute_one(emu, raw, pc, next_pc)?;
    emu.cpu.cycle += 1;
    Ok(outcome)
}

#[allow(clippy::too_many_lines)]
fn execute_one(emu: &mut Emulator, raw: u32, pc: u64, next_pc: u64) -> Result<StepOutcome, EmulatorFault> {
    let illegal = || EmulatorFault::IllegalInstruction { pc, raw };
    let opcode = decode::opcode(raw);
    let rd = decode::rd(raw);
    let rs1 = decode::rs1(raw);
    let rs2 = decode::rs2(raw);
    let funct3 = decode::funct3(raw);

    match opcode {
        OP_LUI => {
            emu.cpu.set_reg(rd, (decode::u_imm(raw) << 12) as u64);
        }
        OP_AUIPC => {
            emu.cpu
                .set_reg(rd, pc.wrapping_add((decode::u_imm(raw) << 12) as u64));
        }
        OP_JAL => {
            if rd != 0 {
                emu.cpu.set_reg(rd, next_pc);
            }
            emu.cpu.pc = pc.wrapping_add(decode::j_imm(raw) as u64);
            return Ok(StepOutcome::Continue);
        }
        OP_JALR => {
            let target = (emu.cpu.reg(rs1) as i64).wrapping_add(decode::i_imm(raw)) as u64 & !1;
            if rd != 0 {
                emu.cpu.set_reg(rd, next_pc);
            }
            emu.cpu.pc = target;
            return Ok(StepOutcome::Continue);
        }
        OP_BRANCH => {
            let a = emu.cpu.reg(rs1);
            let b = emu.cpu.reg(rs2);
            let taken = match funct3 {
                0b000 => a == b,
                0b001 => a != b,
                0b100 => (a as i64) < (b as i64),
                0b101 => (a as i64) >= (b as i64),
                0b110 => a < b,
                0b111 => a >= b,
                _ => return Err(illegal()),
            };
            if taken {
                emu.cpu.pc = pc.wrapping_add(decode::b_imm(raw) as u64);
                return Ok(StepOutcome::Continue);
            }
        }
        OP_LOAD => {
            let addr = (emu.cpu.reg(rs1) as i64).wrapping_add(decode::i_imm(raw)) as u64;
            let value: u64 = match funct3 {
                0b000 => emu.image.read_u8(addr)? as i8 as i64 as u64,
                0b001 => emu.image.read_u16(addr)? as i16 as i64 as u64,
                0b010 => emu.image.read_u32(addr)? as i32 as i64 as u64,
                0b011 => emu.image.read_u64(addr)?,
                0b100 => u64::from(emu.image.read_u8(addr)?),
                0b101 => u64::from(emu.image.read_u16(addr)?),
                0b110 => u64::from(emu.image.read_u32(addr)?),
                _ => return Err(illegal()),
            };
            emu.cpu.set_reg(rd, value);
        }
        OP_STORE => {
            let addr = (emu.cpu.reg(rs1) as i64).wrapping_add(decode::s_imm(raw)) as u64;
            let value = emu.cpu.reg(rs2);
            match funct3 {
                0b000 => emu.image.write_u8(addr, value as u8)?,
                0b001 => emu.image.write_u16(addr, value as u16)?,
                0b010 => emu.image.write_u32(addr, value as u32)?,
                0b011 => emu.image.write_u64(addr, value)?,
                _ => return Err(illegal()),
            }
        }
        OP_OP_IMM => execute_op_imm(emu, raw, rd, rs1, funct3)?,
        OP_OP_IMM_32 => execute_op_imm_32(emu, raw, rd, rs1, funct3)?,
        OP_OP => execute_op(emu, raw, rd, rs1, rs2, funct3, decode::funct7(raw))?,
        OP_OP_32 => execute_op_32(emu, rd, rs1, rs2, funct3, decode::funct7(raw))?,
        OP_MISC_MEM => {} // FENCE / FENCE.I: no-op (§5, single hart)
        OP_AMO => execute_amo(emu, raw, rd, rs1, rs2, funct3)?,
        OP_LOAD_FP => {
            let addr = (emu.cpu.reg(rs1) as i64).wrapping_add(decode::i_imm(raw)) as u64;
            match funct3 {
                0b010 => {
                    let bits = emu.image.read_u32(addr)?;
                    emu.cpu.set_freg_f32(rd, f32::from_bits(bits));
                }
                0b011 => {
                    let bits = emu.image.read_u64(addr)?;
                    emu.cpu.set_freg_bits(rd, bits);
                }
                _ => return Err(illegal()),
            }
        }
        OP_STORE_FP => {
            let addr = (emu.cpu.reg(rs1) as i64).wrapping_add(decode::s_imm(raw)) as u64;
            match funct3 {
                0b010 => emu.image.write_u32(addr, emu.cpu.freg_f32(rs2).to_bits())?,
                0b011 => emu.image.write_u64(addr, emu.cpu.freg_bits(rs2))?,
                _ => return Err(illegal()),
            }
        }
        OP_FMADD | OP_FMSUB | OP_FNMSUB | OP_FNMADD => {
            execute_fused_multiply_add(emu, raw, opcode, rd, rs1, rs2)?;
        }
        OP_OP_FP => execute_op_fp(emu, raw, rd, rs1, rs2, funct3)?,
        OP_SYSTEM => {
            if funct3 == 0 {
                let imm = decode::i_imm(raw);
                if imm == 0 {
                    // ECALL: returns to pc + 4, already arranged via next_pc.
                    return syscall::dispatch(emu).map(|result| match result {
                        syscall::DispatchResult::Continue => StepOutcome::Continue,
                        syscall::DispatchResult::Exit(status) => StepOutcome::Exit(status),
                    });
                } else if imm == 1 {
                    // EBREAK: no-op.
                } else {
                    return Err(illegal());
                }
            } else {
                execute_csr(emu, raw, rd, rs1, funct3)?;
            }
        }
        _ => return Err(illegal()),
    }
    Ok(StepOutcome::Continue)
}

fn execute_op_imm(
    emu: &mut Emulator,
    raw: u32,
    rd: u32,
    rs1: u32,
    funct3: u32,
) -> Result<(), EmulatorFault> {
    let a = emu.cpu.reg(rs1) as i64;
    let imm = decode::i_imm(raw);
    let value: u64 = match funct3 {
        0b000 => a.wrapping_add(imm) as u64,
        0b010 => u64::from(a < imm),
        0b011 => u64::from((a as u64) < (imm as u64)),
        0b100 => (a ^ imm) as u64,
        0b110 => (a | imm) as u64,
        0b111 => (a & imm) as u64,
        0b001 => ((a as u64) << decode::shamt6(raw)) as u64,
        0b101 => {
            let shamt = decode::shamt6(raw);
            if (raw >> 26) & 1 != 0 {
                (a >> shamt) as u64
            } else {
                ((a as u64) >> shamt) as u64
            }
        }
        _ => return Err(EmulatorFault::IllegalInstruction { pc: emu.cpu.pc, raw }),
    };
    emu.cpu.set_reg(rd, value);
    Ok(())
}

fn execute_op_imm_32(
    emu: &mut Emulator,
    raw: u32,
    rd: u32,
    rs1: u32,
    funct3: u32,
) -> Result<(), EmulatorFault> {
    let a = emu.cpu.reg(rs1) as u32 as i32;
    let imm = decode::i_imm(raw) as i32;
    let value: i32 = match funct3 {
        0b000 => a.wrapping_add(imm),
        0b001 => a.wrapping_shl(decode::shamt5(raw)),
        0b101 => {
            let shamt = decode::shamt5(raw);
            if (raw >> 25) & 0x7F != 0 {
                a.wrapping_shr(shamt)
            } else {
                (a as u32).wrapping_shr(shamt) as i32
            }
        }
        _ => return Err(EmulatorFault::IllegalInstruction { pc: emu.cpu.pc, raw }),
    };
    emu.cpu.set_reg(rd, i64::from(value) as u64);
    Ok(())
}

fn execute_op(
    emu: &mut Emulator,
    raw: u32,
    rd: u32,
    rs1: u32,
    rs2: u32,
    funct3: u32,
    funct7: u32,
) -> Result<(), EmulatorFault> {
    let a = emu.cpu.reg(rs1) as i64;
    let b = emu.cpu.reg(rs2) as i64;
    if funct7 == 0x01 {
        emu.cpu.set_reg(rd, mul_div(a, b, funct3));
        return Ok(());
    }
    let value: u64 = match (funct3, funct7) {
        (0b000, 0x00) => a.wrapping_add(b) as u64,
        (0b000, 0x20) => a.wrapping_sub(b) as u64,
        (0b001, _) => ((a as u64) << (b as u64 & 0x3F)) as u64,
        (0b010, _) => u64::from(a < b),
        (0b011, _) => u64::from((a as u64) < (b as u64)),
        (0b100, _) => (a ^ b) as u64,
        (0b101, 0x00) => ((a as u64) >> (b as u64 & 0x3F)) as u64,
        (0b101, 0x20) => (a >> (b as u64 & 0x3F)) as u64,
        (0b110, _) => (a | b) as u64,
        (0b111, _) => (a & b) as u64,
        _ => return Err(EmulatorFault::IllegalInstruction { pc: emu.cpu.pc, raw }),
    };
    emu.cpu.set_reg(rd, value);
    Ok(())
}

fn mul_div(a: i64, b: i64, funct3: u32) -> u64 {
    match funct3 {
        0b000 => a.wrapping_mul(b) as u64,
        0b001 => ((i128::from(a) * i128::from(b)) >> 64) as u64,
        0b010 => ((i128::from(a) * i128::from(b as u64)) >> 64) as u64,
        0b011 => (((a as u64 as u128) * (b as u64 as u128)) >> 64) as u64,
        0b100 => {
            if b == 0 {
                u64::MAX
            } else if a == i64::MIN && b == -1 {
                a as u64
            } else {
                a.wrapping_div(b) as u64
            }
        }
        0b101 => {
            if b == 0 {
                u64::MAX
            } else {
                (a as u64).wrapping_div(b as u64)
            }
        }
        0b110 => {
            if b == 0 {
                a as u64
            } else if a == i64::MIN && b == -1 {
                0
            } else {
                a.wrapping_rem(b) as u64
            }
        }
        0b111 => {
            if b == 0 {
                a as u64
            } else {
                (a as u64).wrapping_rem(b as u64)
            }
        }
        _ => unreachable!("funct3 is 3 bits"),
    }
}

fn execute_op_32(
    emu: &mut Emulator,
    rd: u32,
    rs1: u32,
    rs2: u32,
    funct3: u32,
    funct7: u32,
) -> Result<(), EmulatorFault> {
    let a = emu.cpu.reg(rs1) as u32 as i32;
    let b = emu.cpu.reg(rs2) as u32 as i32;
    let value: i32 = if funct7 == 0x01 {
        match funct3 {
            0b000 => a.wrapping_mul(b),
            0b100 => {
                if b == 0 {
                    -1
                } else if a == i32::MIN && b == -1 {
                    a
                } else {
                    a.wrapping_div(b)
                }
            }
            0b101 => {
                if b == 0 {
                    -1
                } else {
                    ((a as u32).wrapping_div(b as u32)) as i32
                }
            }
            0b110 => {
                if b == 0 {
                    a
                } else if a == i32::MIN && b == -1 {
                    0
                } else {
                    a.wrapping_rem(b)
                }
            }
            0b111 => {
                if b == 0 {
                    a
                } else {
                    ((a as u32).wrapping_rem(b as u32)) as i32
                }
            }
            _ => {
                return Err(EmulatorFault::IllegalInstruction {
                    pc: emu.cpu.pc,
                    raw: 0,
                })
            }
        }
    } else {
        match (funct3, funct7) {
            (0b000, 0x00) => a.wrapping_add(b),
            (0b000, 0x20) => a.wrapping_sub(b),
            (0b001, _) => a.wrapping_shl(b as u32 & 0x1F),
            (0b101, 0x00) => (a as u32).wrapping_shr(b as u32 & 0x1F) as i32,
            (0b101, 0x20) => a.wrapping_shr(b as u32 & 0x1F),
            _ => {
                return Err(EmulatorFault::IllegalInstruction {
                    pc: emu.cpu.pc,
                    raw: 0,
                })
            }
        }
    };
    emu.cpu.set_reg(rd, i64::from(value) as u64);
    Ok(())
}

fn execute_amo(
    emu: &mut Emulator,
    raw: u32,
    rd: u32,
    rs1: u32,
    rs2: u32,
    funct3: u32,
) -> Result<(), EmulatorFault> {
    let addr = emu.cpu.reg(rs1);
    let funct5 = decode::funct5(raw);
    let is_double = funct3 == 0b011;

    // LR/SC: single-hart, so SC always succeeds (writes 0 for success).
    if funct5 == 0b00010 {
        let value = if is_double {
            emu.image.read_u64(addr)?
        } else {
            emu.image.read_u32(addr)? as i32 as i64 as u64
        };
        emu.cpu.set_reg(rd, value);
        return Ok(());
    }
    if funct5 == 0b00011 {
        if is_double {
            emu.image.write_u64(addr, emu.cpu.reg(rs2))?;
        } else {
            emu.image.write_u32(addr, emu.cpu.reg(rs2) as u32)?;
        }
        emu.cpu.set_reg(rd, 0);
        return Ok(());
    }

    let operand = emu.cpu.reg(rs2);
    if is_double {
        let original = emu.image.read_u64(addr)?;
        let result = amo_compute(funct5, original, operand);
        emu.image.write_u64(addr, result)?;
        emu.cpu.set_reg(rd, original);
    } else {
        let original_raw = emu.image.read_u32(addr)?;
        let original = i64::from(original_raw as i32) as u64;
        let result = amo_compute(funct5, original, (operand as u32) as i32 as i64 as u64) as u32;
        emu.image.write_u32(addr, result)?;
        emu.cpu.set_reg(rd, original);
    }
    Ok(())
}

fn amo_compute(funct5: u32, original: u64, operand: u64) -> u64 {
    match funct5 {
        0b00001 => operand,                                                  // AMOSWAP
        0b00000 => (original as i64).wrapping_add(operand as i64) as u64,    // AMOADD
        0b00100 => original ^ operand,                                       // AMOXOR
        0b01100 => original & operand,                                       // AMOAND
        0b01000 => original | operand,                                       // AMOOR
        0b10000 => (original as i64).min(operand as i64) as u64,             // AMOMIN
        0b10100 => (original as i64).max(operand as i64) as u64,             // AMOMAX
        0b11000 => original.min(operand),                                    // AMOMINU
        0b11100 => original.max(operand),                                    // AMOMAXU
        _ => original,
    }
}

fn execute_csr(
    emu: &mut Emulator,
    raw: u32,
    rd: u32,
    rs1: u32,
    funct3: u32,
) -> Result<(), EmulatorFault> {
    let csr = raw >> 20;
    let old = csr::read(csr, emu.cpu.cycle, emu.start_time)
        .ok_or(EmulatorFault::IllegalInstruction { pc: emu.cpu.pc, raw })?;

    // Bit 2 of funct3 selects the immediate (CSRRWI/CSRRSI/CSRRCI) forms,
    // where rs1's field position instead carries a 5-bit zero-extended
    // immediate; bits 0-1 select write/set/clear.
    let source = if funct3 & 0b100 != 0 {
        u64::from(rs1)
    } else {
        emu.cpu.reg(rs1)
    };
    let write_value = match funct3 & 0b011 {
        0b01 => source,
        0b10 => old | source,
        0b11 => old & !source,
        _ => return Err(EmulatorFault::IllegalInstruction { pc: emu.cpu.pc, raw }),
    };

    // CSRRS/CSRRC (and their immediate forms) with rs1 == 0 read without
    // writing, per the RISC-V spec.
    let should_write = matches!(funct3 & 0b011, 0b01) || rs1 != 0;
    if should_write {
        let _ = csr::write(csr, write_value);
    }
    emu.cpu.set_reg(rd, old);
    Ok(())
}

fn f32_operands(emu: &Emulator, rs1: u32, rs2: u32) -> (f32, f32) {
    (emu.cpu.freg_f32(rs1), emu.cpu.freg_f32(rs2))
}

fn f64_operands(emu: &Emulator, rs1: u32, rs2: u32) -> (f64, f64) {
    (emu.cpu.freg_f64(rs1), emu.cpu.freg_f64(rs2))
}

#[allow(clippy::too_many_lines)]
fn execute_op_fp(
    emu: &mut Emulator,
    raw: u32,
    rd: u32,
    rs1: u32,
    rs2: u32,
    funct3: u32,
) -> Result<(), EmulatorFault> {
    let funct7 = decode::funct7(raw);
    let double = funct7 & 1 != 0;
    let illegal = || EmulatorFault::IllegalInstruction { pc: emu.cpu.pc, raw };

    match funct7 >> 1 {
        0b0000000 => {
            // FADD
            if double {
                let (a, b) = f64_operands(emu, rs1, rs2);
                emu.cpu.set_freg_f64(rd, a + b);
            } else {
                let (a, b) = f32_operands(emu, rs1, rs2);
                emu.cpu.set_freg_f32(rd, a + b);
            }
        }
        0b0000010 => {
            // FSUB
            if double {
                let (a, b) = f64_operands(emu, rs1, rs2);
                emu.cpu.set_freg_f64(rd, a - b);
            } else {
                let (a, b) = f32_operands(emu, rs1, rs2);
                emu.cpu.set_freg_f32(rd, a - b);
            }
        }
        0b0000100 => {
            // FMUL
            if double {
                let (a, b) = f64_operands(emu, rs1, rs2);
                emu.cpu.set_freg_f64(rd, a * b);
            } else {
                let (a, b) = f32_operands(emu, rs1, rs2);
                emu.cpu.set_freg_f32(rd, a * b);
            }
        }
        0b0000110 => {
            // FDIV
            if double {
                let (a, b) = f64_operands(emu, rs1, rs2);
                emu.cpu.set_freg_f64(rd, a / b);
            } else {
                let (a, b) = f32_operands(emu, rs1, rs2);
                emu.cpu.set_freg_f32(rd, a / b);
            }
        }
        0b0010110 => {
            // FSQRT
            if double {
                emu.cpu.set_freg_f64(rd, emu.cpu.freg_f64(rs1).sqrt());
            } else {
                emu.cpu.set_freg_f32(rd, emu.cpu.freg_f32(rs1).sqrt());
            }
        }
        0b0001000 => {
            // FSGNJ family
            if double {
                let (a, b) = f64_operands(emu, rs1, rs2);
                let result = match funct3 {
                    0b000 => fp::sgnj_f64(a, b),
                    0b001 => fp::sgnjn_f64(a, b),
                    0b010 => fp::sgnjx_f64(a, b),
                    _ => return Err(illegal()),
                };
                emu.cpu.set_freg_f64(rd, result);
            } else {
                let (a, b) = f32_operands(emu, rs1, rs2);
                let result = match funct3 {
                    0b000 => fp::sgnj_f32(a, b),
                    0b001 => fp::sgnjn_f32(a, b),
                    0b010 => fp::sgnjx_f32(a, b),
                    _ => return Err(illegal()),
                };
                emu.cpu.set_freg_f32(rd, result);
            }
        }
        0b0001010 => {
            // FMIN/FMAX
            if double {
                let (a, b) = f64_operands(emu, rs1, rs2);
                emu.cpu
                    .set_freg_f64(rd, if funct3 == 0 { a.min(b) } else { a.max(b) });
            } else {
                let (a, b) = f32_operands(emu, rs1, rs2);
                emu.cpu
                    .set_freg_f32(rd, if funct3 == 0 { a.min(b) } else { a.max(b) });
            }
        }
        0b1100000 => {
            // FCVT.{W,WU,L,LU}.S/D
            let value = if double {
                emu.cpu.freg_f64(rs1)
            } else {
                f64::from(emu.cpu.freg_f32(rs1))
            };
            let result: u64 = match rs2 {
                0b00000 => (value as i32 as i64) as u64,
                0b00001 => u64::from(value as u32),
                0b00010 => value as i64 as u64,
                0b00011 => value as u64,
                _ => return Err(illegal()),
            };
            emu.cpu.set_reg(rd, result);
        }
        0b1101000 => {
            // FCVT.S/D.{W,WU,L,LU}
            let source = emu.cpu.reg(rs1);
            let value: f64 = match rs2 {
                0b00000 => f64::from(source as u32 as i32),
                0b00001 => f64::from(source as u32),
                0b00010 => (source as i64) as f64,
                0b00011 => source as f64,
                _ => return Err(illegal()),
            };
            if double {
                emu.cpu.set_freg_f64(rd, value);
            } else {
                emu.cpu.set_freg_f32(rd, value as f32);
            }
        }
        0b1110000 if funct3 == 0b000 && rs2 == 0 => {
            // FMV.X.W / FMV.X.D
            let bits = if double {
                emu.cpu.freg_bits(rs1)
            } else {
                u64::from(emu.cpu.freg_f32(rs1).to_bits())
            };
            emu.cpu.set_reg(rd, bits);
        }
        0b1110000 if funct3 == 0b001 && rs2 == 0 => {
            // FCLASS
            let class = if double {
                fp::fclass_f64(emu.cpu.freg_f64(rs1))
            } else {
                fp::fclass_f32(emu.cpu.freg_f32(rs1))
            };
            emu.cpu.set_reg(rd, class);
        }
        0b1111000 if funct3 == 0b000 && rs2 == 0 => {
            // FMV.W.X / FMV.D.X
            let bits = emu.cpu.reg(rs1);
            if double {
                emu.cpu.set_freg_bits(rd, bits);
            } else {
                emu.cpu.set_freg_f32(rd, f32::from_bits(bits as u32));
            }
        }
        0b1010000 => {
            // FEQ/FLT/FLE
            let result = if double {
                let (a, b) = f64_operands(emu, rs1, rs2);
                match funct3 {
                    0b010 => a == b,
                    0b001 => a < b,
                    0b000 => a <= b,
                    _ => return Err(illegal()),
                }
            } else {
                let (a, b) = f32_operands(emu, rs1, rs2);
                match funct3 {
                    0b010 => a == b,
                    0b001 => a < b,
                    0b000 => a <= b,
                    _ => return Err(illegal()),
                }
            };
            emu.cpu.set_reg(rd, u64::from(result));
        }
        0b0100000 => {
            // FCVT.S.D
            let value = emu.cpu.freg_f64(rs1);
            emu.cpu.set_freg_f32(rd, value as f32);
        }
        0b0100001 => {
            // FCVT.D.S
            let value = emu.cpu.freg_f32(rs1);
            emu.cpu.set_freg_f64(rd, f64::from(value));
        }
        _ => return Err(illegal()),
    }
    Ok(())
}

fn execute_fused_multiply_add(
    emu: &mut Emulator,
    raw: u32,
    opcode: u32,
    rd: u32,
    rs1: u32,
    rs2: u32,
) -> Result<(), EmulatorFault> {
    let rs3 = decode::rs3(raw);
    let double = (raw >> 25) & 0x3 == 1;
    if double {
        let (a, b, c) = (
            emu.cpu.freg_f64(rs1),
            emu.cpu.freg_f64(rs2),
            emu.cpu.freg_f64(rs3),
        );
        let result = match opcode {
            OP_FMADD => a.mul_add(b, c),
            OP_FMSUB => a.mul_add(b, -c),
            OP_FNMSUB => -(a.mul_add(b, -c)),
            OP_FNMADD => -(a.mul_add(b, c)),
            _ => unreachable!("caller only passes fused-multiply-add opcodes"),
        };
        emu.cpu.set_freg_f64(rd, result);
    } else {
        let (a, b, c) = (
            emu.cpu.freg_f32(rs1),
            emu.cpu.freg_f32(rs2),
            emu.cpu.freg_f32(rs3),
        );
        let result = match opcode {
            OP_FMADD => a.mul_add(b, c),
            OP_FMSUB => a.mul_add(b, -c),
            OP_FNMSUB => -(a.mul_add(b, -c)),
            OP_FNMADD => -(a.mul_add(b, c)),
            _ => unreachable!("caller only passes fused-multiply-add opcodes"),
        };
        emu.cpu.set_freg_f32(rd, result);
    }
    Ok(())
}
