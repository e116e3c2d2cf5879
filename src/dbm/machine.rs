//! # Machine State and Driver
//!
//! The database machine is a stack-less register VM. Its state is a program
//! counter, a sparse register file, a cursor table, and the B-tree file it
//! operates on. [`Machine::step`] runs the dispatch loop until a handler
//! yields a result row or the program terminates.
//!
//! ## Stepping Contract
//!
//! ```text
//! loop {
//!     match machine.step()? {
//!         StepResult::Row  => consume machine.row(),
//!         StepResult::Done => break,
//!     }
//! }
//! ```
//!
//! Handlers return a [`Flow`]: `Advance` moves to the next instruction,
//! `Jump` writes the program counter directly, `Row` surfaces a result row,
//! and `Halt` ends the program. Running past the last instruction behaves
//! like a clean halt.

use hashbrown::HashMap;

use crate::btree::Btree;
use crate::errors::Result;

use super::cursor::Cursor;
use super::opcode::Instruction;
use super::ops;

/// A register value. Registers spring into existence as `Null` on first
/// touch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Register {
    #[default]
    Null,
    Integer(i32),
    String(String),
    Binary(Vec<u8>),
}

/// What a step produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    /// A result row is available via [`Machine::row`].
    Row,
    /// The program has terminated.
    Done,
}

/// Handler outcome, internal to the dispatch loop.
pub(crate) enum Flow {
    Advance,
    Jump(usize),
    Row,
    Halt,
}

/// An executable program instance bound to a database file.
pub struct Machine {
    pub(crate) btree: Btree,
    program: Vec<Instruction>,
    pc: usize,
    pub(crate) registers: HashMap<u32, Register>,
    pub(crate) cursors: Vec<Option<Cursor>>,
    pub(crate) row: Option<(u32, u32)>,
    halted: bool,
}

impl Machine {
    pub fn new(btree: Btree, program: Vec<Instruction>) -> Self {
        Self {
            btree,
            program,
            pc: 0,
            registers: HashMap::new(),
            cursors: Vec::new(),
            row: None,
            halted: false,
        }
    }

    pub fn btree(&self) -> &Btree {
        &self.btree
    }

    /// Consumes the machine, handing the database back.
    pub fn into_btree(self) -> Btree {
        self.btree
    }

    /// Executes instructions until a row is produced or the program ends.
    pub fn step(&mut self) -> Result<StepResult> {
        self.row = None;
        loop {
            if self.halted || self.pc >= self.program.len() {
                self.halted = true;
                return Ok(StepResult::Done);
            }
            let insn = self.program[self.pc].clone();
            match ops::execute(self, &insn)? {
                Flow::Advance => self.pc += 1,
                Flow::Jump(target) => self.pc = target,
                Flow::Row => {
                    self.pc += 1;
                    return Ok(StepResult::Row);
                }
                Flow::Halt => {
                    self.halted = true;
                    return Ok(StepResult::Done);
                }
            }
        }
    }

    /// The registers yielded by the last `ResultRow`, if the previous
    /// [`step`](Machine::step) returned [`StepResult::Row`].
    pub fn row(&self) -> Option<Vec<Register>> {
        let (start, count) = self.row?;
        Some((start..start + count).map(|i| self.reg(i).clone()).collect())
    }

    /// Reads a register. Untouched registers read as `Null`.
    pub fn reg(&self, index: u32) -> &Register {
        static NULL: Register = Register::Null;
        self.registers.get(&index).unwrap_or(&NULL)
    }

    pub(crate) fn reg_mut(&mut self, index: u32) -> &mut Register {
        self.registers.entry(index).or_default()
    }

    pub(crate) fn set_cursor(&mut self, index: usize, cursor: Cursor) {
        if self.cursors.len() <= index {
            self.cursors.resize_with(index + 1, || None);
        }
        self.cursors[index] = Some(cursor);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dbm::opcode::Opcode;
    use crate::errors::DbError;
    use crate::records::{build_record, Value};
    use tempfile::tempdir;

    fn insn(opcode: Opcode, p1: i32, p2: i32, p3: i32) -> Instruction {
        Instruction::new(opcode, p1, p2, p3)
    }

    fn scratch_btree(name: &str) -> (tempfile::TempDir, Btree) {
        let dir = tempdir().unwrap();
        let bt = Btree::open(dir.path().join(name)).unwrap();
        (dir, bt)
    }

    fn seed_table(bt: &mut Btree, rows: &[(u32, &[Value])]) {
        for (key, values) in rows {
            let record = build_record(values).unwrap();
            bt.insert_in_table(1, *key, &record).unwrap();
        }
    }

    #[test]
    fn full_scan_yields_each_row() {
        let (_dir, mut bt) = scratch_btree("scan.db");
        seed_table(
            &mut bt,
            &[
                (10, &[Value::Text("a".into())]),
                (20, &[Value::Text("b".into())]),
            ],
        );

        let program = vec![
            insn(Opcode::Integer, 1, 0, 0),
            insn(Opcode::OpenRead, 0, 0, 1),
            insn(Opcode::Rewind, 0, 5, 0),
            insn(Opcode::Column, 0, 0, 1),
            insn(Opcode::ResultRow, 1, 1, 0),
            insn(Opcode::Next, 0, 3, 0),
            insn(Opcode::Halt, 0, 0, 0),
        ];
        let mut machine = Machine::new(bt, program);

        assert_eq!(machine.step().unwrap(), StepResult::Row);
        assert_eq!(
            machine.row().unwrap(),
            vec![Register::String("a".into())]
        );

        assert_eq!(machine.step().unwrap(), StepResult::Row);
        assert_eq!(
            machine.row().unwrap(),
            vec![Register::String("b".into())]
        );

        assert_eq!(machine.step().unwrap(), StepResult::Done);
        assert!(machine.row().is_none());
    }

    #[test]
    fn rewind_on_empty_table_jumps_out() {
        let (_dir, bt) = scratch_btree("empty.db");

        let program = vec![
            insn(Opcode::Integer, 1, 0, 0),
            insn(Opcode::OpenRead, 0, 0, 1),
            insn(Opcode::Rewind, 0, 5, 0),
            insn(Opcode::Column, 0, 0, 1),
            insn(Opcode::ResultRow, 1, 1, 0),
            insn(Opcode::Halt, 0, 0, 0),
        ];
        let mut machine = Machine::new(bt, program);

        assert_eq!(machine.step().unwrap(), StepResult::Done);
    }

    #[test]
    fn insert_through_the_machine_lands_in_the_tree() {
        let (_dir, bt) = scratch_btree("insert.db");

        let program = vec![
            insn(Opcode::Integer, 1, 0, 0),
            insn(Opcode::OpenWrite, 0, 0, 2),
            insn(Opcode::Integer, 7, 1, 0),
            Instruction::with_p4(Opcode::String, 0, 2, 0, "seven"),
            insn(Opcode::MakeRecord, 1, 2, 3),
            insn(Opcode::Integer, 99, 4, 0),
            insn(Opcode::Insert, 0, 3, 4),
            insn(Opcode::Halt, 0, 0, 0),
        ];
        let mut machine = Machine::new(bt, program);
        assert_eq!(machine.step().unwrap(), StepResult::Done);

        let bt = machine.into_btree();
        let payload = bt.find(1, 99).unwrap();
        let expected = build_record(&[Value::Int(7), Value::Text("seven".into())]).unwrap();
        assert_eq!(payload, expected);
    }

    #[test]
    fn key_opcode_reports_the_rowid() {
        let (_dir, mut bt) = scratch_btree("key.db");
        seed_table(&mut bt, &[(42, &[Value::Null])]);

        let program = vec![
            insn(Opcode::Integer, 1, 0, 0),
            insn(Opcode::OpenRead, 0, 0, 1),
            insn(Opcode::Rewind, 0, 5, 0),
            insn(Opcode::Key, 0, 1, 0),
            insn(Opcode::ResultRow, 1, 1, 0),
            insn(Opcode::Halt, 0, 0, 0),
        ];
        let mut machine = Machine::new(bt, program);

        assert_eq!(machine.step().unwrap(), StepResult::Row);
        assert_eq!(machine.row().unwrap(), vec![Register::Integer(42)]);
    }

    #[test]
    fn seek_hits_and_misses_drive_the_jump() {
        let (_dir, mut bt) = scratch_btree("seek.db");
        seed_table(
            &mut bt,
            &[
                (10, &[Value::Int(1)]),
                (20, &[Value::Int(2)]),
                (30, &[Value::Int(3)]),
            ],
        );

        // Seek 20 hits; Seek 25 jumps to the String at 8.
        let program = vec![
            insn(Opcode::Integer, 1, 0, 0),
            insn(Opcode::OpenRead, 0, 0, 1),
            insn(Opcode::Integer, 20, 1, 0),
            insn(Opcode::Seek, 0, 10, 1),
            insn(Opcode::Integer, 25, 2, 0),
            insn(Opcode::Seek, 0, 8, 2),
            Instruction::with_p4(Opcode::String, 0, 3, 0, "found-25"),
            insn(Opcode::Halt, 0, 0, 0),
            Instruction::with_p4(Opcode::String, 0, 3, 0, "missed-25"),
            insn(Opcode::ResultRow, 3, 1, 0),
            insn(Opcode::Halt, 0, 0, 0),
        ];
        let mut machine = Machine::new(bt, program);

        assert_eq!(machine.step().unwrap(), StepResult::Row);
        assert_eq!(
            machine.row().unwrap(),
            vec![Register::String("missed-25".into())]
        );
    }

    #[test]
    fn comparisons_jump_when_the_predicate_holds() {
        let (_dir, bt) = scratch_btree("cmp.db");

        let program = vec![
            insn(Opcode::Integer, 5, 0, 0),
            insn(Opcode::Integer, 9, 1, 0),
            insn(Opcode::Lt, 0, 4, 1),
            insn(Opcode::Halt, 1, 0, 0),
            insn(Opcode::Ge, 0, 6, 1),
            insn(Opcode::Noop, 0, 0, 0),
            insn(Opcode::Halt, 0, 0, 0),
        ];
        // 5 < 9 jumps over the failing halt; 5 >= 9 falls through to Noop.
        let mut machine = Machine::new(bt, program);
        assert_eq!(machine.step().unwrap(), StepResult::Done);
    }

    #[test]
    fn comparing_mismatched_types_is_misuse() {
        let (_dir, bt) = scratch_btree("cmperr.db");

        let program = vec![
            insn(Opcode::Integer, 5, 0, 0),
            Instruction::with_p4(Opcode::String, 0, 1, 0, "five"),
            insn(Opcode::Eq, 0, 3, 1),
            insn(Opcode::Halt, 0, 0, 0),
        ];
        let mut machine = Machine::new(bt, program);
        assert!(matches!(machine.step(), Err(DbError::Misuse(_))));
    }

    #[test]
    fn create_table_allocates_a_fresh_root() {
        let (_dir, bt) = scratch_btree("create.db");

        let program = vec![
            insn(Opcode::CreateTable, 0, 0, 0),
            insn(Opcode::ResultRow, 0, 1, 0),
            insn(Opcode::Halt, 0, 0, 0),
        ];
        let mut machine = Machine::new(bt, program);

        assert_eq!(machine.step().unwrap(), StepResult::Row);
        let row = machine.row().unwrap();
        let Register::Integer(npage) = row[0] else {
            panic!("expected an integer register");
        };
        assert_eq!(npage, 2);

        let bt = machine.into_btree();
        let node = bt.get_node_by_page(npage as u32).unwrap();
        assert_eq!(node.kind(), crate::btree::NodeType::TableLeaf);
    }

    #[test]
    fn index_roundtrip_through_the_machine() {
        let (_dir, bt) = scratch_btree("idx.db");

        // Create an index, insert (5, 500), rewind, and read the pk back.
        let program = vec![
            insn(Opcode::CreateIndex, 0, 0, 0),
            insn(Opcode::OpenWrite, 0, 0, 0),
            insn(Opcode::Integer, 5, 1, 0),
            insn(Opcode::Integer, 500, 2, 0),
            insn(Opcode::IdxInsert, 0, 1, 2),
            insn(Opcode::Rewind, 0, 8, 0),
            insn(Opcode::IdxKey, 0, 3, 0),
            insn(Opcode::ResultRow, 3, 1, 0),
            insn(Opcode::Halt, 0, 0, 0),
        ];
        let mut machine = Machine::new(bt, program);

        assert_eq!(machine.step().unwrap(), StepResult::Row);
        assert_eq!(machine.row().unwrap(), vec![Register::Integer(500)]);
    }

    #[test]
    fn halt_with_nonzero_status_is_an_error() {
        let (_dir, bt) = scratch_btree("halt.db");

        let program = vec![Instruction::with_p4(Opcode::Halt, 1, 0, 0, "boom")];
        let mut machine = Machine::new(bt, program);

        match machine.step() {
            Err(DbError::Halt { code, message }) => {
                assert_eq!(code, 1);
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected result {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn duplicate_insert_surfaces_through_step() {
        let (_dir, mut bt) = scratch_btree("dup.db");
        seed_table(&mut bt, &[(1, &[Value::Int(1)])]);

        let program = vec![
            insn(Opcode::Integer, 1, 0, 0),
            insn(Opcode::OpenWrite, 0, 0, 1),
            insn(Opcode::Integer, 1, 1, 0),
            insn(Opcode::MakeRecord, 2, 1, 3),
            insn(Opcode::Insert, 0, 3, 1),
            insn(Opcode::Halt, 0, 0, 0),
        ];
        let mut machine = Machine::new(bt, program);
        assert!(matches!(machine.step(), Err(DbError::Duplicate)));
    }

    #[test]
    fn writing_through_a_read_cursor_is_misuse() {
        let (_dir, bt) = scratch_btree("rdonly.db");

        let program = vec![
            insn(Opcode::Integer, 1, 0, 0),
            insn(Opcode::OpenRead, 0, 0, 1),
            insn(Opcode::Integer, 2, 1, 0),
            insn(Opcode::MakeRecord, 2, 1, 3),
            insn(Opcode::Insert, 0, 3, 1),
            insn(Opcode::Halt, 0, 0, 0),
        ];
        let mut machine = Machine::new(bt, program);
        assert!(matches!(machine.step(), Err(DbError::Misuse(_))));
    }

    #[test]
    fn copy_duplicates_a_register() {
        let (_dir, bt) = scratch_btree("copy.db");

        let program = vec![
            Instruction::with_p4(Opcode::String, 0, 0, 0, "x"),
            insn(Opcode::Copy, 0, 1, 0),
            insn(Opcode::SCopy, 1, 2, 0),
            insn(Opcode::ResultRow, 0, 3, 0),
            insn(Opcode::Halt, 0, 0, 0),
        ];
        let mut machine = Machine::new(bt, program);

        assert_eq!(machine.step().unwrap(), StepResult::Row);
        assert_eq!(
            machine.row().unwrap(),
            vec![
                Register::String("x".into()),
                Register::String("x".into()),
                Register::String("x".into()),
            ]
        );
    }

    #[test]
    fn running_off_the_end_terminates_cleanly() {
        let (_dir, bt) = scratch_btree("end.db");

        let program = vec![insn(Opcode::Noop, 0, 0, 0)];
        let mut machine = Machine::new(bt, program);

        assert_eq!(machine.step().unwrap(), StepResult::Done);
        assert_eq!(machine.step().unwrap(), StepResult::Done);
    }
}
