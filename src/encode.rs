//! Instruction encoding
//!
//! Builders and macros for constructing the raw instruction words of
//! the simulated subset. The test suites use these to assemble
//! programs instead of spelling out hex words.

use crate::utils::extract_field;

pub use crate::opcodes::*;

/// 64-bit operand size selector (bit 31). All register and immediate
/// forms here are X-register forms, so the encoders set it. The
/// variable shifts and BR are matched on bit 31 too, so those
/// encoders leave the opcode exactly as the classifier expects it.
pub const SF: u32 = 1 << 31;

/// Make an R-form (register-register) instruction
pub fn rform(opcode: u32, rm: u32, rn: u32, rd: u32) -> u32 {
    opcode | rm << 16 | rn << 5 | rd
}

/// Make an I-form (register-immediate) instruction. The shift
/// selector moves the 12-bit immediate up by 12 when it is 1.
pub fn iform(opcode: u32, shift: u32, imm12: u32, rn: u32, rd: u32) -> u32 {
    opcode | shift << 22 | (imm12 & 0xfff) << 10 | rn << 5 | rd
}

/// Make a D-form (load/store) instruction with an unsigned 9-bit
/// byte offset
pub fn dform(opcode: u32, imm9: u32, rn: u32, rt: u32) -> u32 {
    opcode | (imm9 & 0x1ff) << 12 | rn << 5 | rt
}

/// Make a B-form instruction from a byte offset (a multiple of 4)
pub fn bform(opcode: u32, byte_offset: i64) -> u32 {
    let imm26 = extract_field((byte_offset >> 2) as u32, 25, 0);
    opcode | imm26
}

/// Make a CB-form or B.cond instruction from a byte offset (a
/// multiple of 4). The low five bits hold rt for cbz/cbnz and the
/// condition code for b.cond.
pub fn cbform(opcode: u32, low: u32, byte_offset: i64) -> u32 {
    let imm19 = extract_field((byte_offset >> 2) as u32, 18, 0);
    opcode | imm19 << 5 | low
}

/// Convert an AArch64 register name (e.g. x3, or xzr for the zero
/// register) to the register number (e.g. 3)
pub fn reg_num_impl(reg_name: &str) -> Result<u32, &'static str> {
    if reg_name == "xzr" {
        return Ok(31);
    }
    if reg_name.len() != 2 && reg_name.len() != 3 {
        return Err("register name must be exactly two or three characters");
    }
    let mut characters = reg_name.chars();
    if characters.next().unwrap() != 'x' {
        return Err("register name must begin with x");
    }
    let n = characters
        .collect::<String>()
        .parse::<u32>()
        .expect("Final one or two digits of register name should be numbers");
    Ok(n)
}

#[macro_export]
macro_rules! reg_num {
    ($reg:expr) => {
        reg_num_impl(std::stringify!($reg))?
    };
}
pub use reg_num;

macro_rules! rform_instr {
    ($instruction:ident, $opcode:expr) => {
        #[macro_export]
        macro_rules! $instruction {
            ($rd:expr, $rn:expr, $rm:expr) => {{
                let rd = reg_num!($rd);
                let rn = reg_num!($rn);
                let rm = reg_num!($rm);
                rform($opcode, rm, rn, rd)
            }};
        }
        pub use $instruction;
    };
}

rform_instr!(adds, SF | OP_ADDS_REG);
rform_instr!(subs, SF | OP_SUBS_REG);
rform_instr!(ands, SF | OP_ANDS_REG);
rform_instr!(eor, SF | OP_EOR_REG);
rform_instr!(orr, SF | OP_ORR_REG);
rform_instr!(mul, SF | OP_MUL);
rform_instr!(lsl, OP_LSL_REG);
rform_instr!(lsr, OP_LSR_REG);

macro_rules! iform_instr {
    ($instruction:ident, $opcode:expr) => {
        #[macro_export]
        macro_rules! $instruction {
            ($rd:expr, $rn:expr, $imm:expr) => {{
                let rd = reg_num!($rd);
                let rn = reg_num!($rn);
                iform($opcode, 0, $imm, rn, rd)
            }};
            ($rd:expr, $rn:expr, $imm:expr, lsl12) => {{
                let rd = reg_num!($rd);
                let rn = reg_num!($rn);
                iform($opcode, 1, $imm, rn, rd)
            }};
        }
        pub use $instruction;
    };
}

iform_instr!(adds_imm, SF | OP_ADDS_IMM);
iform_instr!(subs_imm, SF | OP_SUBS_IMM);
iform_instr!(add_imm, SF | OP_ADD_IMM);

/// cmp is subs with the destination pinned to xzr
#[macro_export]
macro_rules! cmp_imm {
    ($rn:expr, $imm:expr) => {{
        let rn = reg_num!($rn);
        iform(SF | OP_SUBS_IMM, 0, $imm, rn, 31)
    }};
}
pub use cmp_imm;

// The wide moves carry their immediate in the generic imm12 field
// here, which is where this machine reads it. An assembler packs a
// 16-bit immediate into bits [20:5] instead, so these words differ
// from assembler output.

#[macro_export]
macro_rules! movz {
    ($rd:expr, $imm:expr) => {{
        let rd = reg_num!($rd);
        iform(SF | OP_MOVZ, 0, $imm, 0, rd)
    }};
}
pub use movz;

#[macro_export]
macro_rules! movk {
    ($rd:expr, $imm:expr) => {{
        let rd = reg_num!($rd);
        iform(SF | OP_MOVK, 0, $imm, 0, rd)
    }};
}
pub use movk;

macro_rules! dform_instr {
    ($instruction:ident, $opcode:expr) => {
        #[macro_export]
        macro_rules! $instruction {
            ($rt:expr, $rn:expr, $imm:expr) => {{
                let rt = reg_num!($rt);
                let rn = reg_num!($rn);
                dform($opcode, $imm, rn, rt)
            }};
        }
        pub use $instruction;
    };
}

dform_instr!(ldur, OP_LDUR);
dform_instr!(ldurb, OP_LDURB);
dform_instr!(ldurh, OP_LDURH);
dform_instr!(stur, OP_STUR);
dform_instr!(sturb, OP_STURB);
dform_instr!(sturh, OP_STURH);

#[macro_export]
macro_rules! b {
    ($offset:expr) => {
        bform(OP_B, $offset)
    };
}
pub use b;

#[macro_export]
macro_rules! cbz {
    ($rt:expr, $offset:expr) => {{
        let rt = reg_num!($rt);
        cbform(OP_CBZ, rt, $offset)
    }};
}
pub use cbz;

#[macro_export]
macro_rules! cbnz {
    ($rt:expr, $offset:expr) => {{
        let rt = reg_num!($rt);
        cbform(OP_CBNZ, rt, $offset)
    }};
}
pub use cbnz;

#[macro_export]
macro_rules! b_cond {
    ($cond:expr, $offset:expr) => {
        cbform(OP_B_COND, $cond, $offset)
    };
}
pub use b_cond;

#[macro_export]
macro_rules! br {
    ($rn:expr) => {{
        let rn = reg_num!($rn);
        OP_BR | rn << 5
    }};
}
pub use br;

#[macro_export]
macro_rules! hlt {
    () => {
        OP_HLT
    };
}
pub use hlt;

#[cfg(test)]
mod tests {

    use super::*;

    // Unless noted, the expected words below were produced by an
    // assembler

    #[test]
    fn check_encode_rform() -> Result<(), &'static str> {
        assert_eq!(adds!(x1, x2, x3), 0xab23_0041);
        assert_eq!(subs!(x4, x5, x6), 0xeb26_00a4);
        assert_eq!(mul!(x1, x2, x3), 0x9b03_7c41);
        Ok(())
    }

    #[test]
    fn check_encode_iform() -> Result<(), &'static str> {
        assert_eq!(adds_imm!(x0, x1, 1), 0xb100_0420);
        assert_eq!(subs_imm!(x12, x0, 1), 0xf100_040c);
        assert_eq!(cmp_imm!(x1, 1), 0xf100_043f);
        assert_eq!(add_imm!(x2, x3, 5, lsl12), 0x9140_1462);
        Ok(())
    }

    #[test]
    fn check_encode_movz() -> Result<(), &'static str> {
        // imm12 field, not the assembler's wide-move field
        assert_eq!(movz!(x0, 1), 0xd280_0400);
        assert_eq!(movk!(x0, 1), 0xf280_0400);
        Ok(())
    }

    #[test]
    fn check_encode_dform() -> Result<(), &'static str> {
        assert_eq!(ldur!(x1, x3, 16), 0xf841_0061);
        assert_eq!(sturb!(x2, x3, 0), 0x3800_0062);
        Ok(())
    }

    #[test]
    fn check_encode_branches() -> Result<(), &'static str> {
        assert_eq!(b!(-16), 0x17ff_fffc);
        assert_eq!(cbz!(x5, 0), 0xb400_0005);
        assert_eq!(cbz!(x5, 8), 0xb400_0045);
        assert_eq!(b_cond!(COND_EQ, 8), 0x5400_0040);
        assert_eq!(br!(x3), 0xd61f_0060);
        assert_eq!(hlt!(), 0xd440_0000);
        Ok(())
    }

    #[test]
    fn check_zero_register_name() -> Result<(), &'static str> {
        assert_eq!(orr!(x1, x2, xzr), 0xaa1f_0041);
        Ok(())
    }
}
