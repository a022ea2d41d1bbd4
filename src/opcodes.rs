//! Opcode masks and values for the simulated AArch64 subset
//!
//! Unlike RISC-V, the AArch64 encoding families do not share a single
//! opcode field; each family is recognised by masking the word and
//! comparing with an opcode value. The masks below zero out every
//! operand field of the family, leaving only encoding bits. Bit 31
//! (the sf width selector) is excluded from the R- and I-form masks,
//! since all register forms here are 64-bit.

// Family masks
pub const RFORM_MASK: u32 = 0x7fe0_fc00;
pub const IFORM_MASK: u32 = 0x7fc0_0000;
pub const DFORM_MASK: u32 = 0xffc0_0000;
pub const BFORM_MASK: u32 = 0xfc00_0000;
pub const CBFORM_MASK: u32 = 0xfe00_0000;
pub const BCOND_MASK: u32 = 0xfe00_0000;

// R-form opcodes (register-register arithmetic and logic)
pub const OP_ADDS_REG: u32 = 0x2b20_0000;
pub const OP_SUBS_REG: u32 = 0x6b20_0000;
pub const OP_ANDS_REG: u32 = 0x6a00_0000;
pub const OP_EOR_REG: u32 = 0x4a00_0000;
pub const OP_ORR_REG: u32 = 0x2a00_0000;

// Variable shifts carry their sub-opcode in bits [15:10], so they are
// matched with a wider mask that includes bit 31
pub const SHIFT_MASK: u32 = 0xffe0_fc00;
pub const OP_LSL_REG: u32 = 0x1ac0_2000;
pub const OP_LSR_REG: u32 = 0x1ac0_2400;

// MUL (MADD with the accumulator fixed to XZR) is recognised by its
// top byte together with bits [9:0]
pub const MUL_CLASS_MASK: u32 = 0x1f00_0000;
pub const MUL_CLASS: u32 = 0x1b00_0000;
pub const MUL_LOW_MASK: u32 = 0x0000_03ff;
pub const MUL_LOW: u32 = 0x0000_007c;
pub const OP_MUL: u32 = 0x1b00_7c00;

// I-form opcodes (register-immediate arithmetic and moves)
pub const OP_ADDS_IMM: u32 = 0x3100_0000;
pub const OP_SUBS_IMM: u32 = 0x7100_0000;
pub const OP_ADD_IMM: u32 = 0x1100_0000;
pub const OP_MOVZ: u32 = 0x5280_0000;
pub const OP_MOVK: u32 = 0x7280_0000;

// CMP is SUBS with the destination fixed to XZR, so its mask also
// pins the rd field
pub const CMP_IMM_MASK: u32 = 0x7fc0_001f;
pub const OP_CMP_IMM: u32 = 0x7100_001f;

// D-form opcodes (loads and stores with a 9-bit unsigned offset)
pub const OP_LDUR: u32 = 0xf840_0000;
pub const OP_LDURB: u32 = 0x3840_0000;
pub const OP_LDURH: u32 = 0x7840_0000;
pub const OP_STUR: u32 = 0xf800_0000;
pub const OP_STURB: u32 = 0x3800_0000;
pub const OP_STURH: u32 = 0x7800_0000;

// Branches
pub const OP_B: u32 = 0x1400_0000;
pub const OP_CBZ: u32 = 0xb400_0000;
pub const OP_CBNZ: u32 = 0xb500_0000;
pub const OP_B_COND: u32 = 0x5400_0000;

pub const BR_MASK: u32 = 0xffe0_fc00;
pub const OP_BR: u32 = 0xd61f_0000;

// HLT with a zero payload; the low five bits are ignored
pub const HLT_MASK: u32 = 0xffff_ffe0;
pub const OP_HLT: u32 = 0xd440_0000;

// Condition codes for B.cond
pub const COND_EQ: u32 = 0x0;
pub const COND_NE: u32 = 0x1;
pub const COND_GE: u32 = 0xa;
pub const COND_LT: u32 = 0xb;
pub const COND_GT: u32 = 0xc;
pub const COND_LE: u32 = 0xd;
