//! Named-field extraction from AArch64 instruction words
//!
//! Every encoding family lays its operand fields out at fixed bit
//! positions in the 32-bit word. The macros here pull a single field
//! out of a raw word; the decoder composes them per family.

/// Make a bit-mask of n bits using mask!(n)
#[macro_export]
macro_rules! mask {
    ($n:expr) => {
        (1 << $n) - 1
    };
}
pub use mask;

/// Return val[end:start]
#[macro_export]
macro_rules! extract_field {
    ($val:expr, $end:expr, $start:expr) => {{
        mask!($end - $start + 1) & ($val >> $start)
    }};
}
pub use extract_field;

/// Destination register, bits [4:0] of R- and I-form words
#[macro_export]
macro_rules! rd {
    ($instr:expr) => {{
        let rd: u8 = extract_field!($instr, 4, 0).try_into().unwrap();
        rd
    }};
}
pub use rd;

/// First source (or base) register, bits [9:5]
#[macro_export]
macro_rules! rn {
    ($instr:expr) => {{
        let rn: u8 = extract_field!($instr, 9, 5).try_into().unwrap();
        rn
    }};
}
pub use rn;

/// Second source register, bits [20:16] of R-form words
#[macro_export]
macro_rules! rm {
    ($instr:expr) => {{
        let rm: u8 = extract_field!($instr, 20, 16).try_into().unwrap();
        rm
    }};
}
pub use rm;

/// Transfer register of loads, stores and compare-and-branch,
/// bits [4:0]
#[macro_export]
macro_rules! rt {
    ($instr:expr) => {{
        let rt: u8 = extract_field!($instr, 4, 0).try_into().unwrap();
        rt
    }};
}
pub use rt;

/// 12-bit immediate of I-form words, bits [21:10]
#[macro_export]
macro_rules! imm12 {
    ($instr:expr) => {{
        let imm12: u16 = extract_field!($instr, 21, 10).try_into().unwrap();
        imm12
    }};
}
pub use imm12;

/// Immediate shift selector of I-form words, bits [23:22]
#[macro_export]
macro_rules! imm_shift {
    ($instr:expr) => {{
        let shift: u8 = extract_field!($instr, 23, 22).try_into().unwrap();
        shift
    }};
}
pub use imm_shift;

/// 9-bit byte offset of D-form words, bits [20:12]. Interpreted as
/// unsigned (0..511) throughout this simulator.
#[macro_export]
macro_rules! imm9 {
    ($instr:expr) => {{
        let imm9: u16 = extract_field!($instr, 20, 12).try_into().unwrap();
        imm9
    }};
}
pub use imm9;

/// 19-bit word offset of CB-form and B.cond words, bits [23:5]
#[macro_export]
macro_rules! imm19 {
    ($instr:expr) => {
        extract_field!($instr, 23, 5)
    };
}
pub use imm19;

/// 26-bit word offset of B-form words, bits [25:0]
#[macro_export]
macro_rules! imm26 {
    ($instr:expr) => {
        extract_field!($instr, 25, 0)
    };
}
pub use imm26;

/// Condition code of B.cond words, bits [3:0]
#[macro_export]
macro_rules! cond {
    ($instr:expr) => {
        extract_field!($instr, 3, 0)
    };
}
pub use cond;

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn check_rform_fields() {
        // adds x1, x2, x3
        let word: u32 = 0xab23_0041;
        assert_eq!(rd!(word), 1);
        assert_eq!(rn!(word), 2);
        assert_eq!(rm!(word), 3);
    }

    #[test]
    fn check_iform_fields() {
        // subs x12, x0, #1
        let word: u32 = 0xf100_040c;
        assert_eq!(rd!(word), 12);
        assert_eq!(rn!(word), 0);
        assert_eq!(imm12!(word), 1);
        assert_eq!(imm_shift!(word), 0);
    }

    #[test]
    fn check_dform_fields() {
        // ldur x1, [x3, #16]
        let word: u32 = 0xf841_0061;
        assert_eq!(rt!(word), 1);
        assert_eq!(rn!(word), 3);
        assert_eq!(imm9!(word), 16);
    }

    #[test]
    fn check_branch_fields() {
        // b .-16
        let word: u32 = 0x17ff_fffc;
        assert_eq!(imm26!(word), 0x3ff_fffc);

        // b.eq .+8
        let word: u32 = 0x5400_0040;
        assert_eq!(imm19!(word), 2);
        assert_eq!(cond!(word), 0);
    }
}
