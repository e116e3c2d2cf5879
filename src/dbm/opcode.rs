//! # Opcodes and Instructions
//!
//! A program is a finite array of instructions. Each carries an opcode,
//! three signed 32-bit operands, and an optional string operand `p4`.
//! The opcode set is a closed enumeration; dispatch is a match over it.

/// The closed opcode set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Noop,
    OpenRead,
    OpenWrite,
    Close,
    Rewind,
    Next,
    Prev,
    Seek,
    SeekGt,
    SeekGe,
    Column,
    Key,
    Integer,
    String,
    Null,
    ResultRow,
    MakeRecord,
    Insert,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    IdxGt,
    IdxGe,
    IdxLt,
    IdxLe,
    IdxKey,
    IdxInsert,
    CreateTable,
    CreateIndex,
    Copy,
    SCopy,
    Halt,
}

/// The fourth operand: unused for most opcodes, a string constant for
/// `String` and the `Halt` error message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum P4 {
    #[default]
    None,
    Str(String),
}

/// One program instruction.
#[derive(Debug, Clone)]
pub struct Instruction {
    pub opcode: Opcode,
    pub p1: i32,
    pub p2: i32,
    pub p3: i32,
    pub p4: P4,
}

impl Instruction {
    pub fn new(opcode: Opcode, p1: i32, p2: i32, p3: i32) -> Self {
        Self {
            opcode,
            p1,
            p2,
            p3,
            p4: P4::None,
        }
    }

    pub fn with_p4(opcode: Opcode, p1: i32, p2: i32, p3: i32, p4: impl Into<String>) -> Self {
        Self {
            opcode,
            p1,
            p2,
            p3,
            p4: P4::Str(p4.into()),
        }
    }
}
