//! # Database Machine
//!
//! A register-based virtual machine that executes compiled query plans
//! against the B-tree engine. Programs are finite instruction arrays; the
//! machine dispatches on each opcode until a handler yields a result row or
//! halts.
//!
//! ## Machine Shape
//!
//! ```text
//! +--------------------------------------------+
//! | program counter                            |
//! | sparse register file (null/int/str/binary) |
//! | cursor table (positions within B-trees)    |
//! | the B-tree file                            |
//! +--------------------------------------------+
//! ```
//!
//! ## A Full-Scan Program
//!
//! ```text
//! 0  Integer   1  0        ; register 0 = root page
//! 1  OpenRead  0  0  1     ; cursor 0 over that tree, 1 column
//! 2  Rewind    0  5        ; empty table -> jump to Halt
//! 3  Column    0  0  1     ; register 1 = column 0 of current row
//! 4  ResultRow 1  1        ; yield registers [1, 2)
//! 5  Next      0  3        ; more rows -> jump back to Column
//! 6  Halt      0  0
//! ```
//!
//! Each [`Machine::step`] runs until the `ResultRow` yields, then resumes
//! after it on the following call.
//!
//! ## Module Organization
//!
//! - `opcode`: the closed opcode set and instruction shape
//! - `cursor`: ordered traversal over table and index trees
//! - `machine`: registers, cursor table, the dispatch driver
//! - `ops`: one handler per opcode

mod cursor;
mod machine;
mod opcode;
mod ops;

pub use cursor::{Cursor, Entry, SeekMode};
pub use machine::{Machine, Register, StepResult};
pub use opcode::{Instruction, Opcode, P4};
