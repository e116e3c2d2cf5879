//! # Opcode Handlers
//!
//! One function per opcode, dispatched by [`execute`] through a match over
//! the closed [`Opcode`] enumeration. Handlers receive the machine and the
//! decoded instruction and return a [`Flow`] telling the driver how the
//! program counter moves.
//!
//! Operand conventions follow the instruction shape: `p1` is a cursor or
//! register number, `p2` is a jump target or destination register, `p3` is a
//! register, and `p4` carries string constants. Negative operands where an
//! index is expected are misuse, as are wrong register or cursor kinds.

use std::cmp::Ordering;

use crate::btree::NodeType;
use crate::errors::{DbError, Result};
use crate::records::{build_record, RecordView, Value};

use super::cursor::{Cursor, Entry, SeekMode};
use super::machine::{Flow, Machine, Register};
use super::opcode::{Instruction, Opcode, P4};

pub(crate) fn execute(m: &mut Machine, insn: &Instruction) -> Result<Flow> {
    match insn.opcode {
        Opcode::Noop => Ok(Flow::Advance),
        Opcode::OpenRead => op_open(m, insn, false),
        Opcode::OpenWrite => op_open(m, insn, true),
        Opcode::Close => op_close(m, insn),
        Opcode::Rewind => op_rewind(m, insn),
        Opcode::Next => op_next(m, insn),
        Opcode::Prev => op_prev(m, insn),
        Opcode::Seek => op_seek(m, insn, SeekMode::Exact),
        Opcode::SeekGt => op_seek(m, insn, SeekMode::Gt),
        Opcode::SeekGe => op_seek(m, insn, SeekMode::Ge),
        Opcode::Column => op_column(m, insn),
        Opcode::Key => op_key(m, insn),
        Opcode::Integer => op_integer(m, insn),
        Opcode::String => op_string(m, insn),
        Opcode::Null => op_null(m, insn),
        Opcode::ResultRow => op_result_row(m, insn),
        Opcode::MakeRecord => op_make_record(m, insn),
        Opcode::Insert => op_insert(m, insn),
        Opcode::Eq => op_compare(m, insn, |o| o == Ordering::Equal),
        Opcode::Ne => op_compare(m, insn, |o| o != Ordering::Equal),
        Opcode::Lt => op_compare(m, insn, |o| o == Ordering::Less),
        Opcode::Le => op_compare(m, insn, |o| o != Ordering::Greater),
        Opcode::Gt => op_compare(m, insn, |o| o == Ordering::Greater),
        Opcode::Ge => op_compare(m, insn, |o| o != Ordering::Less),
        Opcode::IdxGt => op_idx_compare(m, insn, |o| o == Ordering::Greater),
        Opcode::IdxGe => op_idx_compare(m, insn, |o| o != Ordering::Less),
        Opcode::IdxLt => op_idx_compare(m, insn, |o| o == Ordering::Less),
        Opcode::IdxLe => op_idx_compare(m, insn, |o| o != Ordering::Greater),
        Opcode::IdxKey => op_idx_key(m, insn),
        Opcode::IdxInsert => op_idx_insert(m, insn),
        Opcode::CreateTable => op_create(m, insn, NodeType::TableLeaf),
        Opcode::CreateIndex => op_create(m, insn, NodeType::IndexLeaf),
        Opcode::Copy => op_copy(m, insn),
        Opcode::SCopy => op_copy(m, insn),
        Opcode::Halt => op_halt(insn),
    }
}

fn op_open(m: &mut Machine, insn: &Instruction, writable: bool) -> Result<Flow> {
    let root = match m.reg(reg_index(insn.p2)?) {
        Register::Integer(v) if *v > 0 => *v as u32,
        _ => {
            return Err(DbError::Misuse(
                "root page register must hold a positive integer",
            ))
        }
    };
    let n_cols =
        usize::try_from(insn.p3).map_err(|_| DbError::Misuse("negative column count"))?;
    let index = cursor_index(insn.p1)?;
    m.set_cursor(index, Cursor::new(root, n_cols, writable));
    Ok(Flow::Advance)
}

fn op_close(m: &mut Machine, insn: &Instruction) -> Result<Flow> {
    let index = cursor_index(insn.p1)?;
    if let Some(slot) = m.cursors.get_mut(index) {
        *slot = None;
    }
    Ok(Flow::Advance)
}

fn op_rewind(m: &mut Machine, insn: &Instruction) -> Result<Flow> {
    let target = jump_target(insn.p2)?;
    let cursor = open_cursor_mut(&mut m.cursors, insn.p1)?;
    let moved = cursor.move_to_first(&m.btree)?;
    if moved {
        Ok(Flow::Advance)
    } else {
        Ok(Flow::Jump(target))
    }
}

fn op_next(m: &mut Machine, insn: &Instruction) -> Result<Flow> {
    let target = jump_target(insn.p2)?;
    let cursor = open_cursor_mut(&mut m.cursors, insn.p1)?;
    let moved = cursor.next(&m.btree)?;
    if moved {
        Ok(Flow::Jump(target))
    } else {
        Ok(Flow::Advance)
    }
}

fn op_prev(m: &mut Machine, insn: &Instruction) -> Result<Flow> {
    let target = jump_target(insn.p2)?;
    let cursor = open_cursor_mut(&mut m.cursors, insn.p1)?;
    let moved = cursor.prev(&m.btree)?;
    if moved {
        Ok(Flow::Jump(target))
    } else {
        Ok(Flow::Advance)
    }
}

fn op_seek(m: &mut Machine, insn: &Instruction, mode: SeekMode) -> Result<Flow> {
    let target = jump_target(insn.p2)?;
    let key = key_register(m, insn.p3)?;
    let cursor = open_cursor_mut(&mut m.cursors, insn.p1)?;
    let found = cursor.seek(&m.btree, key, mode)?;
    if found {
        Ok(Flow::Advance)
    } else {
        Ok(Flow::Jump(target))
    }
}

fn op_column(m: &mut Machine, insn: &Instruction) -> Result<Flow> {
    let dst = reg_index(insn.p3)?;
    let column =
        usize::try_from(insn.p2).map_err(|_| DbError::Misuse("negative column index"))?;

    let cursor = open_cursor(&m.cursors, insn.p1)?;
    if column >= cursor.n_cols() {
        return Err(DbError::Misuse("column index out of range"));
    }
    let Entry::Table { payload, .. } = cursor.entry(&m.btree)? else {
        return Err(DbError::Misuse("column access requires a table cursor"));
    };

    let view = RecordView::parse(&payload)?;
    let value = match view.value(column)? {
        Value::Null => Register::Null,
        Value::Int(v) => Register::Integer(v),
        Value::Text(s) => Register::String(s),
    };
    *m.reg_mut(dst) = value;
    Ok(Flow::Advance)
}

fn op_key(m: &mut Machine, insn: &Instruction) -> Result<Flow> {
    let dst = reg_index(insn.p2)?;
    let cursor = open_cursor(&m.cursors, insn.p1)?;
    let Entry::Table { key, .. } = cursor.entry(&m.btree)? else {
        return Err(DbError::Misuse("key requires a table cursor"));
    };
    *m.reg_mut(dst) = Register::Integer(key as i32);
    Ok(Flow::Advance)
}

fn op_integer(m: &mut Machine, insn: &Instruction) -> Result<Flow> {
    let dst = reg_index(insn.p2)?;
    *m.reg_mut(dst) = Register::Integer(insn.p1);
    Ok(Flow::Advance)
}

fn op_string(m: &mut Machine, insn: &Instruction) -> Result<Flow> {
    let dst = reg_index(insn.p2)?;
    let P4::Str(s) = &insn.p4 else {
        return Err(DbError::Misuse("string constant missing from p4"));
    };
    *m.reg_mut(dst) = Register::String(s.clone());
    Ok(Flow::Advance)
}

fn op_null(m: &mut Machine, insn: &Instruction) -> Result<Flow> {
    let dst = reg_index(insn.p2)?;
    *m.reg_mut(dst) = Register::Null;
    Ok(Flow::Advance)
}

fn op_result_row(m: &mut Machine, insn: &Instruction) -> Result<Flow> {
    let start = reg_index(insn.p1)?;
    let count =
        u32::try_from(insn.p2).map_err(|_| DbError::Misuse("negative register count"))?;
    m.row = Some((start, count));
    Ok(Flow::Row)
}

fn op_make_record(m: &mut Machine, insn: &Instruction) -> Result<Flow> {
    let start = reg_index(insn.p1)?;
    let count =
        u32::try_from(insn.p2).map_err(|_| DbError::Misuse("negative register count"))?;
    let dst = reg_index(insn.p3)?;

    let mut values = Vec::with_capacity(count as usize);
    for i in start..start + count {
        values.push(match m.reg(i) {
            Register::Null => Value::Null,
            Register::Integer(v) => Value::Int(*v),
            Register::String(s) => Value::Text(s.clone()),
            Register::Binary(_) => {
                return Err(DbError::Misuse("cannot nest a record inside a record"))
            }
        });
    }
    let record = build_record(&values)?;
    *m.reg_mut(dst) = Register::Binary(record);
    Ok(Flow::Advance)
}

fn op_insert(m: &mut Machine, insn: &Instruction) -> Result<Flow> {
    let key = key_register(m, insn.p3)?;
    let record = match m.reg(reg_index(insn.p2)?) {
        Register::Binary(bytes) => bytes.clone(),
        _ => {
            return Err(DbError::Misuse(
                "record register must hold a binary record",
            ))
        }
    };
    let (root, writable) = {
        let cursor = open_cursor(&m.cursors, insn.p1)?;
        (cursor.root_page(), cursor.writable())
    };
    if !writable {
        return Err(DbError::Misuse("cursor is not writable"));
    }

    m.btree.insert_in_table(root, key, &record)?;
    open_cursor_mut(&mut m.cursors, insn.p1)?.invalidate();
    Ok(Flow::Advance)
}

fn op_idx_insert(m: &mut Machine, insn: &Instruction) -> Result<Flow> {
    let key_idx = key_register(m, insn.p2)?;
    let key_pk = key_register(m, insn.p3)?;
    let (root, writable) = {
        let cursor = open_cursor(&m.cursors, insn.p1)?;
        (cursor.root_page(), cursor.writable())
    };
    if !writable {
        return Err(DbError::Misuse("cursor is not writable"));
    }

    m.btree.insert_in_index(root, key_idx, key_pk)?;
    open_cursor_mut(&mut m.cursors, insn.p1)?.invalidate();
    Ok(Flow::Advance)
}

fn op_compare(m: &mut Machine, insn: &Instruction, pred: fn(Ordering) -> bool) -> Result<Flow> {
    let target = jump_target(insn.p2)?;
    let a = m.reg(reg_index(insn.p1)?);
    let b = m.reg(reg_index(insn.p3)?);
    let ord = match (a, b) {
        (Register::Integer(x), Register::Integer(y)) => x.cmp(y),
        (Register::String(x), Register::String(y)) => x.cmp(y),
        _ => {
            return Err(DbError::Misuse(
                "comparison requires two integers or two strings",
            ))
        }
    };
    if pred(ord) {
        Ok(Flow::Jump(target))
    } else {
        Ok(Flow::Advance)
    }
}

fn op_idx_compare(
    m: &mut Machine,
    insn: &Instruction,
    pred: fn(Ordering) -> bool,
) -> Result<Flow> {
    let target = jump_target(insn.p2)?;
    let value = key_register(m, insn.p3)?;
    let cursor = open_cursor(&m.cursors, insn.p1)?;
    let Entry::Index { key_idx, .. } = cursor.entry(&m.btree)? else {
        return Err(DbError::Misuse(
            "index comparison requires an index cursor",
        ));
    };
    if pred(key_idx.cmp(&value)) {
        Ok(Flow::Jump(target))
    } else {
        Ok(Flow::Advance)
    }
}

fn op_idx_key(m: &mut Machine, insn: &Instruction) -> Result<Flow> {
    let dst = reg_index(insn.p2)?;
    let cursor = open_cursor(&m.cursors, insn.p1)?;
    let Entry::Index { key_pk, .. } = cursor.entry(&m.btree)? else {
        return Err(DbError::Misuse("idxkey requires an index cursor"));
    };
    *m.reg_mut(dst) = Register::Integer(key_pk as i32);
    Ok(Flow::Advance)
}

fn op_create(m: &mut Machine, insn: &Instruction, kind: NodeType) -> Result<Flow> {
    let dst = reg_index(insn.p1)?;
    let npage = m.btree.new_node(kind)?;
    *m.reg_mut(dst) = Register::Integer(npage as i32);
    Ok(Flow::Advance)
}

/// `Copy` and `SCopy` share an implementation: registers hold values, so a
/// shallow copy is not observable.
fn op_copy(m: &mut Machine, insn: &Instruction) -> Result<Flow> {
    let src = reg_index(insn.p1)?;
    let dst = reg_index(insn.p2)?;
    let value = m.reg(src).clone();
    *m.reg_mut(dst) = value;
    Ok(Flow::Advance)
}

fn op_halt(insn: &Instruction) -> Result<Flow> {
    if insn.p1 == 0 {
        return Ok(Flow::Halt);
    }
    let message = match &insn.p4 {
        P4::Str(s) => s.clone(),
        P4::None => String::new(),
    };
    Err(DbError::Halt {
        code: insn.p1,
        message,
    })
}

fn reg_index(p: i32) -> Result<u32> {
    u32::try_from(p).map_err(|_| DbError::Misuse("negative register index"))
}

fn cursor_index(p: i32) -> Result<usize> {
    usize::try_from(p).map_err(|_| DbError::Misuse("negative cursor number"))
}

fn jump_target(p: i32) -> Result<usize> {
    usize::try_from(p).map_err(|_| DbError::Misuse("negative jump target"))
}

fn int_register(m: &Machine, p: i32) -> Result<i32> {
    match m.reg(reg_index(p)?) {
        Register::Integer(v) => Ok(*v),
        _ => Err(DbError::Misuse("register does not hold an integer")),
    }
}

fn key_register(m: &Machine, p: i32) -> Result<u32> {
    let v = int_register(m, p)?;
    u32::try_from(v).map_err(|_| DbError::Misuse("key register must be non-negative"))
}

fn open_cursor<'a>(cursors: &'a [Option<Cursor>], p: i32) -> Result<&'a Cursor> {
    let index = cursor_index(p)?;
    cursors
        .get(index)
        .and_then(|slot| slot.as_ref())
        .ok_or(DbError::Misuse("cursor is not open"))
}

fn open_cursor_mut<'a>(cursors: &'a mut [Option<Cursor>], p: i32) -> Result<&'a mut Cursor> {
    let index = cursor_index(p)?;
    cursors
        .get_mut(index)
        .and_then(|slot| slot.as_mut())
        .ok_or(DbError::Misuse("cursor is not open"))
}
