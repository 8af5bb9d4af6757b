//! The 16-bit RISC-V compressed instruction (RVC) expander: maps any
//! quadrant-00/01/10 half-word to its architecturally equivalent 32-bit
//! RV64 encoding, which [`crate::cpu`] then executes uniformly.
//!
//! The runtime path is a dense 65,536-entry lookup table (§4.C), built once
//! from [`expand`] and cached in a `OnceLock`. `expand` itself is kept
//! around rather than deleted once the table exists, so the table can be
//! regenerated for a target with different needs.

use std::sync::OnceLock;

const OP_LOAD: u32 = 0x03;
const OP_LOAD_FP: u32 = 0x07;
const OP_STORE: u32 = 0x23;
const OP_STORE_FP: u32 = 0x27;
const OP_OP_IMM: u32 = 0x13;
const OP_OP_IMM_32: u32 = 0x1B;
const OP_OP: u32 = 0x33;
const OP_OP_32: u32 = 0x3B;
const OP_JAL: u32 = 0x6F;
const OP_JALR: u32 = 0x67;
const OP_BRANCH: u32 = 0x63;
const OP_LUI: u32 = 0x37;
const OP_SYSTEM: u32 = 0x73;

fn bit(v: u16, i: u32) -> u32 {
    u32::from((v >> i) & 1)
}

fn bits(v: u16, hi: u32, lo: u32) -> u32 {
    u32::from(v) >> lo & ((1 << (hi - lo + 1)) - 1)
}

fn sext(value: u32, bits: u32) -> i64 {
    let shift = 64 - bits;
    ((i64::from(value as i32)) << shift) >> shift
}

fn creg(field: u32) -> u32 {
    field + 8
}

fn enc_r(funct7: u32, rs2: u32, rs1: u32, funct3: u32, rd: u32, opcode: u32) -> u32 {
    (funct7 << 25) | (rs2 << 20) | (rs1 << 15) | (funct3 << 12) | (rd << 7) | opcode
}

fn enc_i(imm: i64, rs1: u32, funct3: u32, rd: u32, opcode: u32) -> u32 {
    (((imm as u32) & 0xFFF) << 20) | (rs1 << 15) | (funct3 << 12) | (rd << 7) | opcode
}

fn enc_s(imm: i64, rs2: u32, rs1: u32, funct3: u32, opcode: u32) -> u32 {
    let imm = imm as u32;
    (((imm >> 5) & 0x7F) << 25)
        | (rs2 << 20)
        | (rs1 << 15)
        | (funct3 << 12)
        | ((imm & 0x1F) << 7)
        | opcode
}

fn enc_b(imm: i64, rs2: u32, rs1: u32, funct3: u32, opcode: u32) -> u32 {
    let imm = imm as u32;
    (((imm >> 12) & 1) << 31)
        | (((imm >> 5) & 0x3F) << 25)
        | (rs2 << 20)
        | (rs1 << 15)
        | (funct3 << 12)
        | (((imm >> 1) & 0xF) << 8)
        | (((imm >> 11) & 1) << 7)
        | opcode
}

fn enc_u(imm: i64, rd: u32, opcode: u32) -> u32 {
    ((imm as u32) & 0xFFFF_F000) | (rd << 7) | opcode
}

fn enc_j(imm: i64, rd: u32, opcode: u32) -> u32 {
    let imm = imm as u32;
    (((imm >> 20) & 1) << 31)
        | (((imm >> 1) & 0x3FF) << 21)
        | (((imm >> 11) & 1) << 20)
        | (((imm >> 12) & 0xFF) << 12)
        | (rd << 7)
        | opcode
}

/// Expands a 16-bit RVC half-word (`instr & 0b11 != 0b11`) into its
/// equivalent 32-bit RV64GC encoding. Returns `None` for encodings that are
/// reserved/illegal (the table maps these to 0).
#[allow(clippy::too_many_lines)]
#[must_use]
pub fn expand(instr: u16) -> Option<u32> {
    let quadrant = bits(instr, 1, 0);
    let funct3 = bits(instr, 15, 13);

    match quadrant {
        0 => {
            let rd_ = creg(bits(instr, 4, 2));
            let rs1_ = creg(bits(instr, 9, 7));
            let rs2_ = creg(bits(instr, 4, 2));
            match funct3 {
                0b000 => {
                    // C.ADDI4SPN
                    let nzuimm = (bits(instr, 10, 7) << 6)
                        | (bits(instr, 12, 11) << 4)
                        | (bit(instr, 5) << 3)
                        | (bit(instr, 6) << 2);
                    if nzuimm == 0 {
                        return None;
                    }
                    Some(enc_i(i64::from(nzuimm), 2, 0, rd_, OP_OP_IMM))
                }
                0b001 => {
                    // C.FLD
                    let off = (bits(instr, 6, 5) << 6) | (bits(instr, 12, 10) << 3);
                    Some(enc_i(i64::from(off), rs1_, 0b011, rd_, OP_LOAD_FP))
                }
                0b010 => {
                    // C.LW
                    let off =
                        (bit(instr, 5) << 6) | (bits(instr, 12, 10) << 3) | (bit(instr, 6) << 2);
                    Some(enc_i(i64::from(off), rs1_, 0b010, rd_, OP_LOAD))
                }
                0b011 => {
                    // C.LD
                    let off = (bits(instr, 6, 5) << 6) | (bits(instr, 12, 10) << 3);
                    Some(enc_i(i64::from(off), rs1_, 0b011, rd_, OP_LOAD))
                }
                0b101 => {
                    // C.FSD
                    let off = (bits(instr, 6, 5) << 6) | (bits(instr, 12, 10) << 3);
                    Some(enc_s(i64::from(off), rs2_, rs1_, 0b011, OP_STORE_FP))
                }
                0b110 => {
                    // C.SW
                    let off =
                        (bit(instr, 5) << 6) | (bits(instr, 12, 10) << 3) | (bit(instr, 6) << 2);
                    Some(enc_s(i64::from(off), rs2_, rs1_, 0b010, OP_STORE))
                }
                0b111 => {
                    // C.SD
                    let off = (bits(instr, 6, 5) << 6) | (bits(instr, 12, 10) << 3);
                    Some(enc_s(i64::from(off), rs2_, rs1_, 0b011, OP_STORE))
                }
                _ => None,
            }
        }
        1 => {
            let rd = bits(instr, 11, 7);
            match funct3 {
                0b000 => {
                    // C.ADDI / C.NOP
                    let imm = sext(bit(instr, 12) << 5 | bits(instr, 6, 2), 6);
                    Some(enc_i(imm, rd, 0, rd, OP_OP_IMM))
                }
                0b001 => {
                    // C.ADDIW (rd must be != 0; illegal otherwise)
                    if rd == 0 {
                        return None;
                    }
                    let imm = sext(bit(instr, 12) << 5 | bits(instr, 6, 2), 6);
                    Some(enc_i(imm, rd, 0, rd, OP_OP_IMM_32))
                }
                0b010 => {
                    // C.LI
                    let imm = sext(bit(instr, 12) << 5 | bits(instr, 6, 2), 6);
                    Some(enc_i(imm, 0, 0, rd, OP_OP_IMM))
                }
                0b011 => {
                    if rd == 2 {
                        // C.ADDI16SP
                        let imm = sext(
                            bit(instr, 12) << 9
                                | bit(instr, 4) << 8
                                | bit(instr, 3) << 7
                                | bit(instr, 5) << 6
                                | bit(instr, 6) << 4
                                | bit(instr, 2) << 5,
                            10,
                        );
                        if imm == 0 {
                            return None;
                        }
                        Some(enc_i(imm, 2, 0, 2, OP_OP_IMM))
                    } else if rd != 0 {
                        // C.LUI
                        let imm = sext(bit(instr, 12) << 17 | bits(instr, 6, 2) << 12, 18);
                        if imm == 0 {
                            return None;
                        }
                        Some(enc_u(imm, rd, OP_LUI))
                    } else {
                        None
                    }
                }
                0b100 => {
                    let rd_ = creg(bits(instr, 9, 7));
                    let rs2_ = creg(bits(instr, 4, 2));
                    match bits(instr, 11, 10) {
                        0b00 => {
                            // C.SRLI
                            let shamt = bit(instr, 12) << 5 | bits(instr, 6, 2);
                            Some(enc_i(i64::from(shamt), rd_, 0b101, rd_, OP_OP_IMM))
                        }
                        0b01 => {
                            // C.SRAI
                            let shamt = bit(instr, 12) << 5 | bits(instr, 6, 2);
                            Some(enc_i(
                                i64::from(shamt | (0x20 << 5)),
                                rd_,
                                0b101,
                                rd_,
                                OP_OP_IMM,
                            ))
                        }
                        0b10 => {
                            // C.ANDI
                            let imm = sext(bit(instr, 12) << 5 | bits(instr, 6, 2), 6);
                            Some(enc_i(imm, rd_, 0b111, rd_, OP_OP_IMM))
                        }
                        0b11 => {
                            let funct2 = bits(instr, 6, 5);
                            if bit(instr, 12) == 0 {
                                let (funct7, funct3) = match funct2 {
                                    0b00 => (0x20, 0b000), // SUB
                                    0b01 => (0x00, 0b100), // XOR
                                    0b10 => (0x00, 0b110), // OR
                                    _ => (0x00, 0b111),    // AND
                                };
                                Some(enc_r(funct7, rs2_, rd_, funct3, rd_, OP_OP))
                            } else {
                                match funct2 {
                                    0b00 => Some(enc_r(0x20, rs2_, rd_, 0b000, rd_, OP_OP_32)), // SUBW
                                    0b01 => Some(enc_r(0x00, rs2_, rd_, 0b000, rd_, OP_OP_32)), // ADDW
                                    _ => None,
                                }
                            }
                        }
                        _ => unreachable!(),
                    }
                }
                0b101 => {
                    // C.J
                    let off = sext(
                        bit(instr, 12) << 11
                            | bit(instr, 11) << 4
                            | bits(instr, 10, 9) << 8
                            | bit(instr, 8) << 10
                            | bit(instr, 7) << 6
                            | bit(instr, 6) << 7
                            | bits(instr, 5, 3) << 1
                            | bit(instr, 2) << 5,
                        12,
                    );
                    Some(enc_j(off, 0, OP_JAL))
                }
                0b110 | 0b111 => {
                    // C.BEQZ / C.BNEZ
                    let rs1_ = creg(bits(instr, 9, 7));
                    let off = sext(
                        bit(instr, 12) << 8
                            | bits(instr, 11, 10) << 3
                            | bits(instr, 6, 5) << 6
                            | bits(instr, 4, 3) << 1
                            | bit(instr, 2) << 5,
                        9,
                    );
                    let branch_funct3 = if funct3 == 0b110 { 0b000 } else { 0b001 };
                    Some(enc_b(off, 0, rs1_, branch_funct3, OP_BRANCH))
                }
                _ => None,
            }
        }
        2 => {
            let rd = bits(instr, 11, 7);
            let rs2 = bits(instr, 6, 2);
            match funct3 {
                0b000 => {
                    // C.SLLI
                    if rd == 0 {
                        return None;
                    }
                    let shamt = bit(instr, 12) << 5 | bits(instr, 6, 2);
                    Some(enc_i(i64::from(shamt), rd, 0b001, rd, OP_OP_IMM))
                }
                0b001 => {
                    // C.FLDSP
                    let off = bit(instr, 12) << 5 | bits(instr, 6, 5) << 3 | bits(instr, 4, 2) << 6;
                    Some(enc_i(i64::from(off), 2, 0b011, rd, OP_LOAD_FP))
                }
                0b010 => {
                    // C.LWSP
                    if rd == 0 {
                        return None;
                    }
                    let off = bit(instr, 12) << 5 | bits(instr, 6, 4) << 2 | bits(instr, 3, 2) << 6;
                    Some(enc_i(i64::from(off), 2, 0b010, rd, OP_LOAD))
                }
                0b011 => {
                    // C.LDSP
                    if rd == 0 {
                        return None;
                    }
                    let off = bit(instr, 12) << 5 | bits(instr, 6, 5) << 3 | bits(instr, 4, 2) << 6;
                    Some(enc_i(i64::from(off), 2, 0b011, rd, OP_LOAD))
                }
                0b100 => {
                    if bit(instr, 12) == 0 {
                        if rs2 == 0 {
                            // C.JR
                            if rd == 0 {
                                return None;
                            }
                            Some(enc_i(0, rd, 0, 0, OP_JALR))
                        } else {
                            // C.MV
                            Some(enc_r(0, rs2, 0, 0, rd, OP_OP))
                        }
                    } else if rd == 0 && rs2 == 0 {
                        // C.EBREAK
                        Some(enc_i(1, 0, 0, 0, OP_SYSTEM))
                    } else if rs2 == 0 {
                        // C.JALR
                        Some(enc_i(0, rd, 0, 1, OP_JALR))
                    } else {
                        // C.ADD
                        Some(enc_r(0, rs2, rd, 0, rd, OP_OP))
                    }
                }
                0b101 => {
                    // C.FSDSP
                    let off = bits(instr, 12, 10) << 3 | bits(instr, 9, 7) << 6;
                    Some(enc_s(i64::from(off), rs2, 2, 0b011, OP_STORE_FP))
                }
                0b110 => {
                    // C.SWSP
                    let off = bits(instr, 12, 9) << 2 | bits(instr, 8, 7) << 6;
                    Some(enc_s(i64::from(off), rs2, 2, 0b010, OP_STORE))
                }
                0b111 => {
                    // C.SDSP
                    let off = bits(instr, 12, 9) << 3 | bits(instr, 8, 7) << 6;
                    Some(enc_s(i64::from(off), rs2, 2, 0b011, OP_STORE))
                }
                _ => None,
            }
        }
        _ => None,
    }
}

static TABLE: OnceLock<Vec<u32>> = OnceLock::new();

/// Returns the dense 65,536-entry expansion table, building it on first use.
fn table() -> &'static [u32] {
    TABLE.get_or_init(|| {
        (0..=u16::MAX)
            .map(|raw| expand(raw).unwrap_or(0))
            .collect()
    })
}

/// Looks up the 32-bit expansion of `instr` via the cached table. Returns
/// `None` for an illegal/reserved encoding (table entry 0).
#[must_use]
pub fn expand_cached(instr: u16) -> Option<u32> {
    match table()[instr as usize] {
        0 => None,
        expanded => Some(expanded),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn c_li_expands_to_addi_from_zero() {
        // c.li x5, 7: 0001 01 00111 01 01 -> encode manually
        // funct3=010, imm[5]=0, rd=5, imm[4:0]=7(00111)
        let instr: u16 = 0b010_0_00101_00111_01;
        let expanded = expand(instr).expect("valid c.li");
        assert_eq!(expanded & 0x7F, 0x13); // OP-IMM
        assert_eq!((expanded >> 7) & 0x1F, 5); // rd
        assert_eq!((expanded >> 15) & 0x1F, 0); // rs1 = x0
        assert_eq!(((expanded as i32) >> 20), 7); // imm
    }

    #[test]
    fn cached_table_matches_direct_expansion() {
        for raw in [0u16, 1, 0x4501, 0x8082, 0x0001, 0xFFFF] {
            assert_eq!(expand(raw), expand_cached(raw));
        }
    }

    #[test]
    fn c_addi4spn_zero_immediate_is_illegal() {
        // all-zero imm bits with quadrant 00 funct3 000
        let instr: u16 = 0b000_00000_000_00;
        assert_eq!(expand(instr), None);
    }

    #[test]
    fn c_jr_expands_to_jalr_zero_offset() {
        // c.jr x1: funct3=100, bit12=0, rd=1, rs2=0
        let instr: u16 = 0b100_0_00001_00000_10;
        let expanded = expand(instr).expect("valid c.jr");
        assert_eq!(expanded & 0x7F, 0x67); // JALR
        assert_eq!((expanded >> 15) & 0x1F, 1); // rs1 = x1
        assert_eq!((expanded >> 7) & 0x1F, 0); // rd = x0
    }
}
