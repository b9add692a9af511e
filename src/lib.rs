//! # Sable
//!
//! A small statically-typed language runtime: compiler-facing program
//! model ([`sable_spec`]), stack-based interpreter over a flat
//! byte-addressed memory with a mark-compact collector
//! ([`sable_runtime`]), and a bit-exact program image format
//! ([`sable_codec`]).
//!
//! This crate is the host-embedding surface. The textual parser, CLI,
//! and playground wrappers are external collaborators; they target the
//! builder API re-exported here and hand back fully resolved programs.
//!
//! ```no_run
//! use sable::{make_program, Machine, MachineConfig};
//!
//! let mut program = make_program();
//! // ... populate via the builder or a front-end ...
//! program.add_init_function();
//! let mut machine = Machine::new(program, MachineConfig::default());
//! machine.run().unwrap();
//! ```

pub use sable_codec::{deserialize, digest, serialize, CodecError};
pub use sable_runtime::{Io, Machine, RuntimeError, Value};
pub use sable_spec::{
    register_core_packages, validation, ArgId, Argument, CallFrame, Expression, FunRef, Function,
    MachineConfig, Opcode, Operator, Package, PkgId, Program, ScopeOp, SpecError, Struct,
    StructRef, TypeCode,
};

/// An empty program with stack and heap allocated and the builtin
/// packages installed.
pub fn make_program() -> Program {
    make_program_with(&MachineConfig::default())
}

/// As [`make_program`], with explicit limits.
pub fn make_program_with(config: &MachineConfig) -> Program {
    let mut prog = Program::new(config);
    register_core_packages(&mut prog);
    prog
}

/// Execute a program until termination or error. Convenience wrapper
/// over [`Machine::run`].
pub fn run_compiled(machine: &mut Machine) -> Result<(), RuntimeError> {
    machine.run()
}
