//! Opcode enumeration and the fixed-mask encoding tables.
//!
//! Short (16-bit) words:
//!
//! ```text
//!  15 | 14..13 | 12..9 | 8..6 | 5..3 | 2..0
//!   0 | class  |  opc  |  A   |  B   |  C
//! ```
//!
//! Long (32-bit) words keep the same low half with bit 15 set, and add a high
//! half of `000 | X(28..25) | A_hi(24..22) | B_hi(21..19) | C_hi(18..16)`.

/// Instruction class field (bits 14..13).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum InstructionClass {
    Alu = 0b00,
    Memory = 0b01,
    ControlFlow = 0b10,
}

/// Every encoding the decoder recognizes, short and long forms listed separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum Opcode {
    NopShort,
    Nop,
    AddShort,
    Add,
    Addc,
    SubShort,
    Sub,
    Subc,
    AndShort,
    And,
    Andi,
    OrShort,
    Or,
    Ori,
    XorShort,
    Xor,
    Xori,
    AsrShort,
    Asr,
    LslShort,
    Lsl,
    LsrShort,
    Lsr,
    MovShort,
    Mov,
    AddiShort,
    Addi,
    SubiShort,
    Subi,
    AsriShort,
    Asri,
    LsliShort,
    Lsli,
    LsriShort,
    Lsri,
    MoviShort,
    Movi,
    LdbShort,
    Ldb,
    LdbPostincShort,
    LdbPostinc,
    LdbPredecShort,
    LdbPredec,
    LdwShort,
    Ldw,
    LdwPostincShort,
    LdwPostinc,
    LdwPredecShort,
    LdwPredec,
    StbShort,
    Stb,
    StbPostincShort,
    StbPostinc,
    StbPredecShort,
    StbPredec,
    StwShort,
    Stw,
    StwPostincShort,
    StwPostinc,
    StwPredecShort,
    StwPredec,
    BraShort,
    Bra,
    BalShort,
    Bal,
    BeqShort,
    Beq,
    BneShort,
    Bne,
    BltsShort,
    Blts,
    BgtsShort,
    Bgts,
    BltuShort,
    Bltu,
    BgtuShort,
    Bgtu,
    JmpShort,
    Jmp,
    JalShort,
    Jal,
    JeqShort,
    Jeq,
    JneShort,
    Jne,
    JltsShort,
    Jlts,
    JgtsShort,
    Jgts,
    JltuShort,
    Jltu,
    JgtuShort,
    Jgtu,
}

impl Opcode {
    /// Encoded size of this instruction in bytes.
    #[must_use]
    pub const fn size(self) -> u8 {
        if self.is_short() {
            2
        } else {
            4
        }
    }

    /// Returns true for 16-bit encodings.
    #[must_use]
    pub const fn is_short(self) -> bool {
        matches!(
            self,
            Self::NopShort
                | Self::AddShort
                | Self::SubShort
                | Self::AndShort
                | Self::OrShort
                | Self::XorShort
                | Self::AsrShort
                | Self::LslShort
                | Self::LsrShort
                | Self::MovShort
                | Self::AddiShort
                | Self::SubiShort
                | Self::AsriShort
                | Self::LsliShort
                | Self::LsriShort
                | Self::MoviShort
                | Self::LdbShort
                | Self::LdbPostincShort
                | Self::LdbPredecShort
                | Self::LdwShort
                | Self::LdwPostincShort
                | Self::LdwPredecShort
                | Self::StbShort
                | Self::StbPostincShort
                | Self::StbPredecShort
                | Self::StwShort
                | Self::StwPostincShort
                | Self::StwPredecShort
                | Self::BraShort
                | Self::BalShort
                | Self::BeqShort
                | Self::BneShort
                | Self::BltsShort
                | Self::BgtsShort
                | Self::BltuShort
                | Self::BgtuShort
                | Self::JmpShort
                | Self::JalShort
                | Self::JeqShort
                | Self::JneShort
                | Self::JltsShort
                | Self::JgtsShort
                | Self::JltuShort
                | Self::JgtuShort
        )
    }
}

/// Bits 15..9: length bit, class and opcode of a short word.
pub const SHORT_OPCODE_MASK: u32 = 0x0000_FE00;
/// Bits 31..29 plus the low-half length, class and opcode bits of a long word.
pub const LONG_OPCODE_MASK: u32 = 0xE000_FE00;
/// Length bit marking a 32-bit instruction.
pub const LONG_FORM_BIT: u32 = 0x0000_8000;

/// `A` field (bits 8..6).
pub const FIELD_A: u32 = 0x0000_01C0;
/// `B` field (bits 5..3).
pub const FIELD_B: u32 = 0x0000_0038;
/// `C` field (bits 2..0).
pub const FIELD_C: u32 = 0x0000_0007;
/// `X` extension field (bits 28..25).
pub const FIELD_X: u32 = 0x1E00_0000;
/// Top bit of `X`, selecting the bitwise-immediate forms.
pub const FIELD_X_TOP: u32 = 0x1000_0000;
/// `A_hi` field (bits 24..22).
pub const FIELD_A_HI: u32 = 0x01C0_0000;
/// `B_hi` field (bits 21..19).
pub const FIELD_B_HI: u32 = 0x0038_0000;
/// `C_hi` field (bits 18..16).
pub const FIELD_C_HI: u32 = 0x0007_0000;

const X_ONE: u32 = 1 << 25;

/// One row of a mask/match decode table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Encoding {
    /// Opcode produced when the row matches.
    pub opcode: Opcode,
    /// Bits that must equal `bits` for the row to match.
    pub mask: u32,
    /// Expected values of the masked bits.
    pub bits: u32,
}

impl Encoding {
    /// Returns true when `word` carries this encoding.
    #[must_use]
    pub const fn matches(self, word: u32) -> bool {
        word & self.mask == self.bits
    }

    /// Returns true when some word could match both rows.
    #[must_use]
    pub const fn overlaps(self, other: Self) -> bool {
        (self.bits ^ other.bits) & (self.mask & other.mask) == 0
    }
}

const fn short(opcode: Opcode, class: InstructionClass, opc: u32, zero: u32) -> Encoding {
    Encoding {
        opcode,
        mask: SHORT_OPCODE_MASK | zero,
        bits: ((class as u32) << 13) | (opc << 9),
    }
}

const fn long(
    opcode: Opcode,
    class: InstructionClass,
    opc: u32,
    fixed_mask: u32,
    fixed_bits: u32,
) -> Encoding {
    Encoding {
        opcode,
        mask: LONG_OPCODE_MASK | fixed_mask,
        bits: LONG_FORM_BIT | ((class as u32) << 13) | (opc << 9) | fixed_bits,
    }
}

use InstructionClass::{Alu, ControlFlow, Memory};

const NONE: u32 = 0;
const SHORT_B_C: u32 = FIELD_B | FIELD_C;
const LONG_B_C: u32 = FIELD_X | FIELD_B | FIELD_C | FIELD_B_HI | FIELD_C_HI;
const LONG_B: u32 = FIELD_X | FIELD_B | FIELD_B_HI;

/// 16-bit encodings, tried in order against the first instruction word.
pub const SHORT_ENCODINGS: &[Encoding] = &[
    short(Opcode::NopShort, Alu, 0x0, NONE),
    short(Opcode::AddShort, Alu, 0x1, NONE),
    short(Opcode::SubShort, Alu, 0x2, NONE),
    short(Opcode::AndShort, Alu, 0x3, NONE),
    short(Opcode::OrShort, Alu, 0x4, NONE),
    short(Opcode::XorShort, Alu, 0x5, NONE),
    short(Opcode::AsrShort, Alu, 0x6, NONE),
    short(Opcode::LslShort, Alu, 0x7, NONE),
    short(Opcode::LsrShort, Alu, 0x8, NONE),
    short(Opcode::MovShort, Alu, 0x9, FIELD_C),
    short(Opcode::AddiShort, Alu, 0xA, NONE),
    short(Opcode::SubiShort, Alu, 0xB, NONE),
    short(Opcode::AsriShort, Alu, 0xC, NONE),
    short(Opcode::LsliShort, Alu, 0xD, NONE),
    short(Opcode::LsriShort, Alu, 0xE, NONE),
    short(Opcode::MoviShort, Alu, 0xF, NONE),
    short(Opcode::LdbShort, Memory, 0x0, NONE),
    short(Opcode::LdbPostincShort, Memory, 0x1, NONE),
    short(Opcode::LdbPredecShort, Memory, 0x2, NONE),
    short(Opcode::LdwShort, Memory, 0x4, NONE),
    short(Opcode::LdwPostincShort, Memory, 0x5, NONE),
    short(Opcode::LdwPredecShort, Memory, 0x6, NONE),
    short(Opcode::StbShort, Memory, 0x8, NONE),
    short(Opcode::StbPostincShort, Memory, 0x9, NONE),
    short(Opcode::StbPredecShort, Memory, 0xA, NONE),
    short(Opcode::StwShort, Memory, 0xC, NONE),
    short(Opcode::StwPostincShort, Memory, 0xD, NONE),
    short(Opcode::StwPredecShort, Memory, 0xE, NONE),
    short(Opcode::BraShort, ControlFlow, 0x0, NONE),
    short(Opcode::BalShort, ControlFlow, 0x1, NONE),
    short(Opcode::BeqShort, ControlFlow, 0x2, NONE),
    short(Opcode::BneShort, ControlFlow, 0x3, NONE),
    short(Opcode::BltsShort, ControlFlow, 0x4, NONE),
    short(Opcode::BgtsShort, ControlFlow, 0x5, NONE),
    short(Opcode::BltuShort, ControlFlow, 0x6, NONE),
    short(Opcode::BgtuShort, ControlFlow, 0x7, NONE),
    short(Opcode::JmpShort, ControlFlow, 0x8, SHORT_B_C),
    short(Opcode::JalShort, ControlFlow, 0x9, FIELD_B),
    short(Opcode::JeqShort, ControlFlow, 0xA, NONE),
    short(Opcode::JneShort, ControlFlow, 0xB, NONE),
    short(Opcode::JltsShort, ControlFlow, 0xC, NONE),
    short(Opcode::JgtsShort, ControlFlow, 0xD, NONE),
    short(Opcode::JltuShort, ControlFlow, 0xE, NONE),
    short(Opcode::JgtuShort, ControlFlow, 0xF, NONE),
];

/// 32-bit encodings, tried in order when no short encoding matched.
pub const LONG_ENCODINGS: &[Encoding] = &[
    long(Opcode::Nop, Alu, 0x0, FIELD_X, 0),
    long(Opcode::Add, Alu, 0x1, FIELD_X, 0),
    long(Opcode::Addc, Alu, 0x1, FIELD_X, X_ONE),
    long(Opcode::Sub, Alu, 0x2, FIELD_X, 0),
    long(Opcode::Subc, Alu, 0x2, FIELD_X, X_ONE),
    long(Opcode::And, Alu, 0x3, FIELD_X, 0),
    long(Opcode::Andi, Alu, 0x3, FIELD_X_TOP, FIELD_X_TOP),
    long(Opcode::Or, Alu, 0x4, FIELD_X, 0),
    long(Opcode::Ori, Alu, 0x4, FIELD_X_TOP, FIELD_X_TOP),
    long(Opcode::Xor, Alu, 0x5, FIELD_X, 0),
    long(Opcode::Xori, Alu, 0x5, FIELD_X_TOP, FIELD_X_TOP),
    long(Opcode::Asr, Alu, 0x6, FIELD_X, 0),
    long(Opcode::Lsl, Alu, 0x7, FIELD_X, 0),
    long(Opcode::Lsr, Alu, 0x8, FIELD_X, 0),
    long(Opcode::Mov, Alu, 0x9, FIELD_X | FIELD_C | FIELD_C_HI, 0),
    long(Opcode::Addi, Alu, 0xA, NONE, 0),
    long(Opcode::Subi, Alu, 0xB, NONE, 0),
    long(Opcode::Asri, Alu, 0xC, FIELD_X, 0),
    long(Opcode::Lsli, Alu, 0xD, FIELD_X, 0),
    long(Opcode::Lsri, Alu, 0xE, FIELD_X, 0),
    long(Opcode::Movi, Alu, 0xF, NONE, 0),
    long(Opcode::Ldb, Memory, 0x0, NONE, 0),
    long(Opcode::LdbPostinc, Memory, 0x1, NONE, 0),
    long(Opcode::LdbPredec, Memory, 0x2, NONE, 0),
    long(Opcode::Ldw, Memory, 0x4, NONE, 0),
    long(Opcode::LdwPostinc, Memory, 0x5, NONE, 0),
    long(Opcode::LdwPredec, Memory, 0x6, NONE, 0),
    long(Opcode::Stb, Memory, 0x8, NONE, 0),
    long(Opcode::StbPostinc, Memory, 0x9, NONE, 0),
    long(Opcode::StbPredec, Memory, 0xA, NONE, 0),
    long(Opcode::Stw, Memory, 0xC, NONE, 0),
    long(Opcode::StwPostinc, Memory, 0xD, NONE, 0),
    long(Opcode::StwPredec, Memory, 0xE, NONE, 0),
    long(Opcode::Bra, ControlFlow, 0x0, FIELD_X, 0),
    long(Opcode::Bal, ControlFlow, 0x1, NONE, 0),
    long(Opcode::Beq, ControlFlow, 0x2, NONE, 0),
    long(Opcode::Bne, ControlFlow, 0x3, NONE, 0),
    long(Opcode::Blts, ControlFlow, 0x4, NONE, 0),
    long(Opcode::Bgts, ControlFlow, 0x5, NONE, 0),
    long(Opcode::Bltu, ControlFlow, 0x6, NONE, 0),
    long(Opcode::Bgtu, ControlFlow, 0x7, NONE, 0),
    long(Opcode::Jmp, ControlFlow, 0x8, LONG_B_C, 0),
    long(Opcode::Jal, ControlFlow, 0x9, LONG_B, 0),
    long(Opcode::Jeq, ControlFlow, 0xA, FIELD_X, 0),
    long(Opcode::Jne, ControlFlow, 0xB, FIELD_X, 0),
    long(Opcode::Jlts, ControlFlow, 0xC, FIELD_X, 0),
    long(Opcode::Jgts, ControlFlow, 0xD, FIELD_X, 0),
    long(Opcode::Jltu, ControlFlow, 0xE, FIELD_X, 0),
    long(Opcode::Jgtu, ControlFlow, 0xF, FIELD_X, 0),
];

/// Looks up the short encoding carried by a 16-bit word.
#[must_use]
pub fn match_short(word: u16) -> Option<Opcode> {
    let word = u32::from(word);
    SHORT_ENCODINGS
        .iter()
        .find(|encoding| encoding.matches(word))
        .map(|encoding| encoding.opcode)
}

/// Looks up the long encoding carried by a 32-bit word.
#[must_use]
pub fn match_long(word: u32) -> Option<Opcode> {
    LONG_ENCODINGS
        .iter()
        .find(|encoding| encoding.matches(word))
        .map(|encoding| encoding.opcode)
}
