//! # Native Opcode Table
//!
//! Native functions are selected by a fixed integer opcode and exposed
//! to programs as `package.function` names. The table is closed: the
//! name map and the opcode enum below are the whole contract between
//! the program model and the runtime's dispatch table.
//!
//! ## Opcode families
//! - 0x00-0x03: core (IDENTITY, JMP, EXIT, PANIC)
//! - 0x10-0x15: arithmetic (ADD, SUB, MUL, DIV, MOD, NEG)
//! - 0x20-0x24: bitwise/shift (BITAND, BITOR, BITXOR, SHL, SHR)
//! - 0x30-0x35: comparison (EQ, NE, LT, GT, LTEQ, GTEQ)
//! - 0x40-0x42: boolean logic (AND, OR, NOT)
//! - 0x48: conversion (CAST)
//! - 0x50-0x53: memory/slice (LEN, APPEND, RESIZE, COPY)
//! - 0x60-0x61: formatting (PRINTF, SPRINTF)
//! - 0x70-0x71: OS bridges (RUN, ENV)
//! - 0x80-0x81: images (SERIALIZE, DESERIALIZE)
//! - 0x90: affordances (QUERY)

use crate::ast::{Function, Program};
use serde::{Deserialize, Serialize};

/// Native opcode (stable integer values).
#[repr(u16)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opcode {
    // ========== Core (0x00-0x03) ==========
    /// Assignment; honors the output operand's pass-by convention.
    Identity = 0x00,
    /// Relative jump: `line += then_lines` when the optional input is
    /// true (or absent), `line += else_lines` otherwise.
    Jmp = 0x01,
    /// Terminate the program.
    Exit = 0x02,
    /// Raise a runtime panic with the input message.
    Panic = 0x03,

    // ========== Arithmetic (0x10-0x15) ==========
    /// Numeric addition; concatenation on `str`.
    Add = 0x10,
    Sub = 0x11,
    Mul = 0x12,
    Div = 0x13,
    Mod = 0x14,
    Neg = 0x15,

    // ========== Bitwise / shift (0x20-0x24) ==========
    BitAnd = 0x20,
    BitOr = 0x21,
    BitXor = 0x22,
    Shl = 0x23,
    Shr = 0x24,

    // ========== Comparison (0x30-0x35) ==========
    Eq = 0x30,
    Ne = 0x31,
    Lt = 0x32,
    Gt = 0x33,
    LtEq = 0x34,
    GtEq = 0x35,

    // ========== Boolean logic (0x40-0x42) ==========
    And = 0x40,
    Or = 0x41,
    Not = 0x42,

    // ========== Conversion (0x48) ==========
    /// Convert the input to the output operand's primitive type.
    Cast = 0x48,

    // ========== Memory / slices (0x50-0x53) ==========
    /// Length of a slice, string, or array.
    Len = 0x50,
    /// Append one element to a slice, growing its object if needed.
    Append = 0x51,
    /// Set a slice's length, reallocating if capacity is exceeded.
    Resize = 0x52,
    /// Copy elements between slices; yields the copied count.
    Copy = 0x53,

    // ========== Formatting (0x60-0x61) ==========
    Printf = 0x60,
    Sprintf = 0x61,

    // ========== OS bridges (0x70-0x71) ==========
    /// Spawn a shell command; yields an `os.RUN_*` status and stdout.
    OsRun = 0x70,
    /// Environment variable lookup; empty string when unset.
    OsEnv = 0x71,

    // ========== Program images (0x80-0x81) ==========
    /// Freeze the running program into a byte slice.
    Serialize = 0x80,
    /// Validate a frozen image held in a byte slice.
    Deserialize = 0x81,

    // ========== Affordances (0x90) ==========
    /// Render the signature of a named function.
    AffQuery = 0x90,
}

impl Opcode {
    /// Try to convert from the stable integer value.
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0x00 => Some(Opcode::Identity),
            0x01 => Some(Opcode::Jmp),
            0x02 => Some(Opcode::Exit),
            0x03 => Some(Opcode::Panic),
            0x10 => Some(Opcode::Add),
            0x11 => Some(Opcode::Sub),
            0x12 => Some(Opcode::Mul),
            0x13 => Some(Opcode::Div),
            0x14 => Some(Opcode::Mod),
            0x15 => Some(Opcode::Neg),
            0x20 => Some(Opcode::BitAnd),
            0x21 => Some(Opcode::BitOr),
            0x22 => Some(Opcode::BitXor),
            0x23 => Some(Opcode::Shl),
            0x24 => Some(Opcode::Shr),
            0x30 => Some(Opcode::Eq),
            0x31 => Some(Opcode::Ne),
            0x32 => Some(Opcode::Lt),
            0x33 => Some(Opcode::Gt),
            0x34 => Some(Opcode::LtEq),
            0x35 => Some(Opcode::GtEq),
            0x40 => Some(Opcode::And),
            0x41 => Some(Opcode::Or),
            0x42 => Some(Opcode::Not),
            0x48 => Some(Opcode::Cast),
            0x50 => Some(Opcode::Len),
            0x51 => Some(Opcode::Append),
            0x52 => Some(Opcode::Resize),
            0x53 => Some(Opcode::Copy),
            0x60 => Some(Opcode::Printf),
            0x61 => Some(Opcode::Sprintf),
            0x70 => Some(Opcode::OsRun),
            0x71 => Some(Opcode::OsEnv),
            0x80 => Some(Opcode::Serialize),
            0x81 => Some(Opcode::Deserialize),
            0x90 => Some(Opcode::AffQuery),
            _ => None,
        }
    }

    pub const fn to_u16(self) -> u16 {
        self as u16
    }

    /// The closed `"package.function" → opcode` table.
    pub const NAMES: &'static [(&'static str, Opcode)] = &[
        ("core.identity", Opcode::Identity),
        ("core.jmp", Opcode::Jmp),
        ("core.exit", Opcode::Exit),
        ("core.panic", Opcode::Panic),
        ("core.add", Opcode::Add),
        ("core.sub", Opcode::Sub),
        ("core.mul", Opcode::Mul),
        ("core.div", Opcode::Div),
        ("core.mod", Opcode::Mod),
        ("core.neg", Opcode::Neg),
        ("core.bitand", Opcode::BitAnd),
        ("core.bitor", Opcode::BitOr),
        ("core.bitxor", Opcode::BitXor),
        ("core.shl", Opcode::Shl),
        ("core.shr", Opcode::Shr),
        ("core.eq", Opcode::Eq),
        ("core.ne", Opcode::Ne),
        ("core.lt", Opcode::Lt),
        ("core.gt", Opcode::Gt),
        ("core.lteq", Opcode::LtEq),
        ("core.gteq", Opcode::GtEq),
        ("core.and", Opcode::And),
        ("core.or", Opcode::Or),
        ("core.not", Opcode::Not),
        ("core.cast", Opcode::Cast),
        ("core.len", Opcode::Len),
        ("core.append", Opcode::Append),
        ("core.resize", Opcode::Resize),
        ("core.copy", Opcode::Copy),
        ("fmt.printf", Opcode::Printf),
        ("fmt.sprintf", Opcode::Sprintf),
        ("os.run", Opcode::OsRun),
        ("os.env", Opcode::OsEnv),
        ("prog.serialize", Opcode::Serialize),
        ("prog.deserialize", Opcode::Deserialize),
        ("aff.query", Opcode::AffQuery),
    ];

    /// Look an opcode up by its qualified `package.function` name.
    pub fn from_qualified_name(name: &str) -> Option<Self> {
        Self::NAMES
            .iter()
            .find(|(n, _)| *n == name)
            .map(|&(_, op)| op)
    }

    /// The qualified name of this opcode.
    pub fn qualified_name(self) -> &'static str {
        Self::NAMES
            .iter()
            .find(|&&(_, op)| op == self)
            .map(|&(n, _)| n)
            .expect("opcode present in name table")
    }
}

/// Install the builtin packages: native function entries for every
/// opcode, plus the constant globals of `os` and `json`.
pub fn register_core_packages(prog: &mut Program) {
    let previous = prog.current_package;

    for &(qualified, op) in Opcode::NAMES {
        let (pkg_name, fn_name) = qualified
            .split_once('.')
            .expect("qualified opcode name");
        let pkg = prog.add_package(pkg_name);
        if prog.get_function(fn_name, pkg).is_none() {
            prog.add_function(pkg, Function::native(fn_name, pkg, op));
        }
    }

    let os = prog.add_package("os");
    for (name, value) in [
        ("RUN_SUCCESS", 0),
        ("RUN_EMPTY_CMD", 1),
        ("RUN_PANIC", 2),
        ("RUN_START_FAILED", 3),
        ("RUN_WAIT_FAILED", 4),
        ("RUN_TIMEOUT", 5),
        ("SEEK_SET", 0),
        ("SEEK_CUR", 1),
        ("SEEK_END", 2),
        ("FILEMODE_APPEND", 1 << 30),
        ("FILEMODE_EXCLUSIVE", 1 << 29),
        ("FILEMODE_TEMPORARY", 1 << 28),
        ("FILEMODE_SYMLINK", 1 << 27),
        ("FILEMODE_DEVICE", 1 << 26),
        ("FILEMODE_NAMED_PIPE", 1 << 25),
        ("FILEMODE_SOCKET", 1 << 24),
        ("FILEMODE_SETUID", 1 << 23),
        ("FILEMODE_SETGID", 1 << 22),
        ("FILEMODE_CHAR_DEVICE", 1 << 21),
        ("FILEMODE_STICKY", 1 << 20),
        ("FILEMODE_IRREGULAR", 1 << 19),
        ("FILEMODE_PERM", 0o777),
    ] {
        if prog.get_global(name, os).is_none() {
            prog.add_const_i32(os, name, value);
        }
    }

    let json = prog.add_package("json");
    for (name, value) in [
        ("TOKEN_NULL", 0),
        ("TOKEN_DELIM", 1),
        ("TOKEN_BOOL", 2),
        ("TOKEN_F64", 3),
        ("TOKEN_NUMBER", 4),
        ("TOKEN_STR", 5),
        ("DELIM_CURLY_LEFT", i32::from(b'{')),
        ("DELIM_CURLY_RIGHT", i32::from(b'}')),
        ("DELIM_SQUARE_LEFT", i32::from(b'[')),
        ("DELIM_SQUARE_RIGHT", i32::from(b']')),
    ] {
        if prog.get_global(name, json).is_none() {
            prog.add_const_i32(json, name, value);
        }
    }

    prog.current_package = previous;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MachineConfig;

    #[test]
    fn test_opcode_round_trip() {
        for &(_, op) in Opcode::NAMES {
            assert_eq!(Opcode::from_u16(op.to_u16()), Some(op));
        }
        assert!(Opcode::from_u16(0xFFFF).is_none());
    }

    #[test]
    fn test_name_table_is_bijective() {
        for &(name, op) in Opcode::NAMES {
            assert_eq!(Opcode::from_qualified_name(name), Some(op));
            assert_eq!(op.qualified_name(), name);
        }
        assert!(Opcode::from_qualified_name("core.nope").is_none());
    }

    #[test]
    fn test_register_core_packages() {
        let mut prog = Program::new(&MachineConfig::default());
        register_core_packages(&mut prog);

        let core = prog.get_package("core").unwrap();
        let add = prog.get_function("add", core).unwrap();
        let f = prog.function(add);
        assert!(f.is_native);
        assert_eq!(f.opcode, Some(Opcode::Add));

        let os = prog.get_package("os").unwrap();
        let seek_end = prog.get_global("SEEK_END", os).unwrap();
        let off = prog.arg(seek_end).offset;
        assert_eq!(
            i32::from_le_bytes(prog.memory[off..off + 4].try_into().unwrap()),
            2
        );

        let json = prog.get_package("json").unwrap();
        assert!(prog.get_global("DELIM_CURLY_LEFT", json).is_some());
    }

    #[test]
    fn test_register_is_idempotent() {
        let mut prog = Program::new(&MachineConfig::default());
        register_core_packages(&mut prog);
        let n_args = prog.args.len();
        register_core_packages(&mut prog);
        assert_eq!(prog.args.len(), n_args);
    }
}
