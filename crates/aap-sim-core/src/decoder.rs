//! Instruction decoder for the AAP instruction set.
//!
//! Turns a little-endian byte stream into a tagged [`Instruction`] plus its
//! encoded size. Decoding never touches machine state.

#![allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]

use crate::encoding::{
    match_long, match_short, Opcode, FIELD_A, FIELD_A_HI, FIELD_B, FIELD_B_HI, FIELD_C,
    FIELD_C_HI, FIELD_X,
};
use crate::fault::{DecodeError, DecodeFailure, RegisterClass};
use crate::state::Reg;

const fn register_table<const N: usize>() -> [Reg; N] {
    let mut table = [Reg::R0; N];
    let mut index = 0;
    while index < N {
        table[index] = match Reg::new(index as u8) {
            Some(reg) => reg,
            None => Reg::R0,
        };
        index += 1;
    }
    table
}

/// Narrow register class: 3-bit fields map 1:1 onto `r0..r7`.
pub const NARROW_REGISTERS: [Reg; 8] = register_table::<8>();

/// Full register class: 6-bit fields map 1:1 onto `r0..r63`.
pub const FULL_REGISTERS: [Reg; 64] = register_table::<64>();

/// Maps a register field through the lookup table of `class`.
///
/// # Errors
///
/// Returns [`DecodeError::RegisterOutOfRange`] when `index` is past the end
/// of the class table.
pub fn decode_register(class: RegisterClass, index: u32) -> Result<Reg, DecodeError> {
    let table: &[Reg] = match class {
        RegisterClass::Narrow => &NARROW_REGISTERS,
        RegisterClass::Full => &FULL_REGISTERS,
    };
    usize::try_from(index)
        .ok()
        .and_then(|slot| table.get(slot))
        .copied()
        .ok_or(DecodeError::RegisterOutOfRange { class, index })
}

/// Two's-complement sign extension of the low `bits` bits of `value`.
#[must_use]
pub const fn sign_extend(value: u32, bits: u32) -> i32 {
    let shift = 32 - bits;
    ((value << shift) as i32) >> shift
}

/// Decodes a short memory operand packed as `reg << 16 | offset`.
///
/// The register uses the narrow class and the offset is a 3-bit signed value.
///
/// # Errors
///
/// Propagates register-class lookup failures.
pub fn decode_mem_src3(operand: u32) -> Result<(Reg, i32), DecodeError> {
    let reg = decode_register(RegisterClass::Narrow, (operand >> 16) & 0x7)?;
    Ok((reg, sign_extend(operand & 0xFFFF, 3)))
}

/// Decodes a long memory operand packed as `reg << 16 | offset`.
///
/// The register uses the full class and the offset is a 10-bit signed value.
///
/// # Errors
///
/// Propagates register-class lookup failures.
pub fn decode_mem_src10(operand: u32) -> Result<(Reg, i32), DecodeError> {
    let reg = decode_register(RegisterClass::Full, (operand >> 16) & 0x3F)?;
    Ok((reg, sign_extend(operand & 0xFFFF, 10)))
}

/// Decodes a 3-bit signed branch offset.
#[must_use]
pub const fn decode_off3(operand: u32) -> i32 {
    sign_extend(operand, 3)
}

/// Decodes a 10-bit signed branch offset.
#[must_use]
pub const fn decode_off10(operand: u32) -> i32 {
    sign_extend(operand, 10)
}

/// Decodes a shift-amount field, which stores `amount - 1`.
#[must_use]
pub const fn decode_shift(operand: u32) -> u32 {
    operand + 1
}

/// Two-source arithmetic, logical and shift operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum AluOp {
    Add,
    AddWithCarry,
    Sub,
    SubWithBorrow,
    And,
    Or,
    Xor,
    Asr,
    Lsl,
    Lsr,
}

/// Data memory access width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessWidth {
    /// One byte.
    Byte,
    /// Two bytes, little-endian.
    Word,
}

impl AccessWidth {
    /// Number of bytes moved, which is also the pointer step of the
    /// post-increment and pre-decrement modes.
    #[must_use]
    pub const fn bytes(self) -> u16 {
        match self {
            Self::Byte => 1,
            Self::Word => 2,
        }
    }
}

/// Pointer update performed around a memory access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressingMode {
    /// `[base, offset]`.
    Plain,
    /// `[base+, offset]`: base advances by the access width after the access.
    PostIncrement,
    /// `[-base, offset]`: base retreats by the access width before the access.
    PreDecrement,
}

/// Register comparison used by conditional branches and jumps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Condition {
    /// `ra == rb`.
    Equal,
    /// `ra != rb`.
    NotEqual,
    /// Signed `ra < rb`.
    LessSigned,
    /// Signed `ra > rb`.
    GreaterSigned,
    /// Unsigned `ra < rb`.
    LessUnsigned,
    /// Unsigned `ra > rb`.
    GreaterUnsigned,
}

impl Condition {
    /// Evaluates the relation over two 16-bit register values.
    #[must_use]
    pub const fn holds(self, a: u16, b: u16) -> bool {
        match self {
            Self::Equal => a == b,
            Self::NotEqual => a != b,
            Self::LessSigned => (a as i16) < (b as i16),
            Self::GreaterSigned => (a as i16) > (b as i16),
            Self::LessUnsigned => a < b,
            Self::GreaterUnsigned => a > b,
        }
    }
}

/// Operation family with its decoded operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum Operation {
    /// Syscall-style NOP: `command` selects breakpoint, quit or character output.
    Nop { reg: Reg, command: u16 },
    Move { rd: Reg, rs: Reg },
    MoveImmediate { rd: Reg, imm: u32 },
    Alu { op: AluOp, rd: Reg, ra: Reg, rb: Reg },
    AluImmediate { op: AluOp, rd: Reg, ra: Reg, imm: u32 },
    Load {
        width: AccessWidth,
        mode: AddressingMode,
        rd: Reg,
        base: Reg,
        offset: i32,
    },
    Store {
        width: AccessWidth,
        mode: AddressingMode,
        base: Reg,
        offset: i32,
        rs: Reg,
    },
    /// PC-relative call; `link` receives the address of the next instruction.
    BranchAndLink { offset: i32, link: Reg },
    /// Register-indirect call; `link` receives the address of the next instruction.
    JumpAndLink { target: Reg, link: Reg },
    Branch {
        cond: Condition,
        offset: i32,
        ra: Reg,
        rb: Reg,
    },
    BranchAlways { offset: i32 },
    Jump { target: Reg },
    /// Conditional register jump. Recognized by the decoder but not executable.
    JumpConditional {
        cond: Condition,
        target: Reg,
        ra: Reg,
        rb: Reg,
    },
}

/// A decoded instruction: the encoding it came from plus its operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    /// Encoding that matched.
    pub opcode: Opcode,
    /// Operation family and operands.
    pub operation: Operation,
}

impl Instruction {
    /// Encoded size in bytes (2 or 4).
    #[must_use]
    pub const fn size(&self) -> u8 {
        self.opcode.size()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Form {
    Short,
    Long,
}

impl Form {
    const fn field_bits(self) -> u32 {
        match self {
            Self::Short => 3,
            Self::Long => 6,
        }
    }

    const fn register_class(self) -> RegisterClass {
        match self {
            Self::Short => RegisterClass::Narrow,
            Self::Long => RegisterClass::Full,
        }
    }
}

/// Right-aligned value of the bits selected by a contiguous `mask`.
const fn field(word: u32, mask: u32) -> u32 {
    (word & mask) >> mask.trailing_zeros()
}

/// `A`, `B`, `C` widened to 6 bits for long forms; `X` is zero for short forms.
#[derive(Debug, Clone, Copy)]
struct Fields {
    form: Form,
    a: u32,
    b: u32,
    c: u32,
    x: u32,
}

impl Fields {
    const fn short(word: u16) -> Self {
        let word = word as u32;
        Self {
            form: Form::Short,
            a: field(word, FIELD_A),
            b: field(word, FIELD_B),
            c: field(word, FIELD_C),
            x: 0,
        }
    }

    const fn long(word: u32) -> Self {
        Self {
            form: Form::Long,
            a: (field(word, FIELD_A_HI) << 3) | field(word, FIELD_A),
            b: (field(word, FIELD_B_HI) << 3) | field(word, FIELD_B),
            c: (field(word, FIELD_C_HI) << 3) | field(word, FIELD_C),
            x: field(word, FIELD_X),
        }
    }

    fn reg(self, field: u32) -> Result<Reg, DecodeError> {
        decode_register(self.form.register_class(), field)
    }

    const fn width(self) -> u32 {
        self.form.field_bits()
    }

    fn mem_operand(self, reg_field: u32) -> Result<(Reg, i32), DecodeError> {
        let offset = (self.x << 6) | self.c;
        match self.form {
            Form::Short => decode_mem_src3((reg_field << 16) | offset),
            Form::Long => decode_mem_src10((reg_field << 16) | offset),
        }
    }

    const fn branch_offset(self) -> i32 {
        match self.form {
            Form::Short => decode_off3(self.a),
            Form::Long => decode_off10((self.x << 6) | self.a),
        }
    }

    const fn shift_amount(self) -> u32 {
        decode_shift(self.c)
    }
}

/// Instruction decoder for the AAP instruction set.
pub struct Decoder;

impl Decoder {
    /// Decodes the instruction at the start of `bytes`.
    ///
    /// `address` is the byte address of `bytes[0]`, used only for failure
    /// reporting. A 16-bit decode is attempted first, then a 32-bit one.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeFailure`] whose `size` is `0` when the stream is too
    /// short to hold the next candidate word, and `2` when no encoding matched,
    /// so a caller can resynchronize by skipping one short instruction.
    pub fn decode(bytes: &[u8], address: u32) -> Result<Instruction, DecodeFailure> {
        let &[b0, b1, ref rest @ ..] = bytes else {
            return Err(DecodeFailure::new(DecodeError::Truncated, 0, address));
        };

        let short = u16::from_le_bytes([b0, b1]);
        let short_error = match match_short(short) {
            Some(opcode) => match decode_operation(opcode, Fields::short(short)) {
                Ok(operation) => return Ok(Instruction { opcode, operation }),
                Err(error) => error,
            },
            None => DecodeError::NoMatchingEncoding,
        };

        let &[b2, b3, ..] = rest else {
            return Err(DecodeFailure::new(DecodeError::Truncated, 0, address));
        };

        let long = u32::from_le_bytes([b0, b1, b2, b3]);
        let error = match match_long(long) {
            Some(opcode) => match decode_operation(opcode, Fields::long(long)) {
                Ok(operation) => return Ok(Instruction { opcode, operation }),
                Err(error) => error,
            },
            None => short_error,
        };

        Err(DecodeFailure::new(error, 2, address))
    }
}

#[allow(clippy::too_many_lines)]
fn decode_operation(opcode: Opcode, f: Fields) -> Result<Operation, DecodeError> {
    let alu = |op| -> Result<Operation, DecodeError> {
        Ok(Operation::Alu {
            op,
            rd: f.reg(f.a)?,
            ra: f.reg(f.b)?,
            rb: f.reg(f.c)?,
        })
    };
    let alu_imm = |op, imm| -> Result<Operation, DecodeError> {
        Ok(Operation::AluImmediate {
            op,
            rd: f.reg(f.a)?,
            ra: f.reg(f.b)?,
            imm,
        })
    };
    let load = |width, mode| -> Result<Operation, DecodeError> {
        let (base, offset) = f.mem_operand(f.b)?;
        Ok(Operation::Load {
            width,
            mode,
            rd: f.reg(f.a)?,
            base,
            offset,
        })
    };
    let store = |width, mode| -> Result<Operation, DecodeError> {
        let (base, offset) = f.mem_operand(f.a)?;
        Ok(Operation::Store {
            width,
            mode,
            base,
            offset,
            rs: f.reg(f.b)?,
        })
    };
    let branch = |cond| -> Result<Operation, DecodeError> {
        Ok(Operation::Branch {
            cond,
            offset: f.branch_offset(),
            ra: f.reg(f.b)?,
            rb: f.reg(f.c)?,
        })
    };
    let jump_cond = |cond| -> Result<Operation, DecodeError> {
        Ok(Operation::JumpConditional {
            cond,
            target: f.reg(f.a)?,
            ra: f.reg(f.b)?,
            rb: f.reg(f.c)?,
        })
    };

    let w = f.width();
    let bitwise_imm = ((f.x & 0x7) << 6) | f.c;

    use AccessWidth::{Byte, Word};
    use AddressingMode::{Plain, PostIncrement, PreDecrement};

    match opcode {
        Opcode::NopShort | Opcode::Nop => Ok(Operation::Nop {
            reg: f.reg(f.a)?,
            command: ((f.b << w) | f.c) as u16,
        }),
        Opcode::MovShort | Opcode::Mov => Ok(Operation::Move {
            rd: f.reg(f.a)?,
            rs: f.reg(f.b)?,
        }),
        Opcode::MoviShort | Opcode::Movi => Ok(Operation::MoveImmediate {
            rd: f.reg(f.a)?,
            imm: (f.x << 12) | (f.b << w) | f.c,
        }),
        Opcode::AddShort | Opcode::Add => alu(AluOp::Add),
        Opcode::Addc => alu(AluOp::AddWithCarry),
        Opcode::SubShort | Opcode::Sub => alu(AluOp::Sub),
        Opcode::Subc => alu(AluOp::SubWithBorrow),
        Opcode::AndShort | Opcode::And => alu(AluOp::And),
        Opcode::OrShort | Opcode::Or => alu(AluOp::Or),
        Opcode::XorShort | Opcode::Xor => alu(AluOp::Xor),
        Opcode::AsrShort | Opcode::Asr => alu(AluOp::Asr),
        Opcode::LslShort | Opcode::Lsl => alu(AluOp::Lsl),
        Opcode::LsrShort | Opcode::Lsr => alu(AluOp::Lsr),
        Opcode::AddiShort | Opcode::Addi => alu_imm(AluOp::Add, (f.x << 6) | f.c),
        Opcode::SubiShort | Opcode::Subi => alu_imm(AluOp::Sub, (f.x << 6) | f.c),
        Opcode::Andi => alu_imm(AluOp::And, bitwise_imm),
        Opcode::Ori => alu_imm(AluOp::Or, bitwise_imm),
        Opcode::Xori => alu_imm(AluOp::Xor, bitwise_imm),
        Opcode::AsriShort | Opcode::Asri => alu_imm(AluOp::Asr, f.shift_amount()),
        Opcode::LsliShort | Opcode::Lsli => alu_imm(AluOp::Lsl, f.shift_amount()),
        Opcode::LsriShort | Opcode::Lsri => alu_imm(AluOp::Lsr, f.shift_amount()),
        Opcode::LdbShort | Opcode::Ldb => load(Byte, Plain),
        Opcode::LdbPostincShort | Opcode::LdbPostinc => load(Byte, PostIncrement),
        Opcode::LdbPredecShort | Opcode::LdbPredec => load(Byte, PreDecrement),
        Opcode::LdwShort | Opcode::Ldw => load(Word, Plain),
        Opcode::LdwPostincShort | Opcode::LdwPostinc => load(Word, PostIncrement),
        Opcode::LdwPredecShort | Opcode::LdwPredec => load(Word, PreDecrement),
        Opcode::StbShort | Opcode::Stb => store(Byte, Plain),
        Opcode::StbPostincShort | Opcode::StbPostinc => store(Byte, PostIncrement),
        Opcode::StbPredecShort | Opcode::StbPredec => store(Byte, PreDecrement),
        Opcode::StwShort | Opcode::Stw => store(Word, Plain),
        Opcode::StwPostincShort | Opcode::StwPostinc => store(Word, PostIncrement),
        Opcode::StwPredecShort | Opcode::StwPredec => store(Word, PreDecrement),
        Opcode::BraShort | Opcode::Bra => Ok(Operation::BranchAlways {
            offset: sign_extend((f.a << (2 * w)) | (f.b << w) | f.c, 3 * w),
        }),
        Opcode::BalShort => Ok(Operation::BranchAndLink {
            offset: sign_extend((f.a << w) | f.b, 2 * w),
            link: f.reg(f.c)?,
        }),
        Opcode::Bal => Ok(Operation::BranchAndLink {
            offset: sign_extend((f.x << 12) | (f.a << w) | f.b, 16),
            link: f.reg(f.c)?,
        }),
        Opcode::BeqShort | Opcode::Beq => branch(Condition::Equal),
        Opcode::BneShort | Opcode::Bne => branch(Condition::NotEqual),
        Opcode::BltsShort | Opcode::Blts => branch(Condition::LessSigned),
        Opcode::BgtsShort | Opcode::Bgts => branch(Condition::GreaterSigned),
        Opcode::BltuShort | Opcode::Bltu => branch(Condition::LessUnsigned),
        Opcode::BgtuShort | Opcode::Bgtu => branch(Condition::GreaterUnsigned),
        Opcode::JmpShort | Opcode::Jmp => Ok(Operation::Jump {
            target: f.reg(f.a)?,
        }),
        Opcode::JalShort | Opcode::Jal => Ok(Operation::JumpAndLink {
            target: f.reg(f.a)?,
            link: f.reg(f.c)?,
        }),
        Opcode::JeqShort | Opcode::Jeq => jump_cond(Condition::Equal),
        Opcode::JneShort | Opcode::Jne => jump_cond(Condition::NotEqual),
        Opcode::JltsShort | Opcode::Jlts => jump_cond(Condition::LessSigned),
        Opcode::JgtsShort | Opcode::Jgts => jump_cond(Condition::GreaterSigned),
        Opcode::JltuShort | Opcode::Jltu => jump_cond(Condition::LessUnsigned),
        Opcode::JgtuShort | Opcode::Jgtu => jump_cond(Condition::GreaterUnsigned),
    }
}
