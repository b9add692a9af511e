//! Operand access for native opcode handlers.
//!
//! The dispatcher hands every handler an [`OpCtx`]: the program, the
//! current frame, and typed read/write helpers that go through the
//! canonical final-offset computation. Assignment semantics live here
//! too, shared by `core.identity`, call-input copying, and return-value
//! copy-back: pass-by-reference operands transfer their resolved
//! address, pass-by-value operands transfer their bytes.

use crate::error::{Result, RuntimeError};
use crate::heap;
use crate::io::Io;
use crate::memory;
use crate::offset::final_offset;
use crate::value::Value;
use sable_spec::{
    ArgId, Argument, DerefOp, Expression, FunRef, MachineConfig, PassBy, Program, TypeCode,
    POINTER_SIZE,
};

/// How the bytes at an operand's final offset are to be interpreted,
/// after the dereference chain has been consumed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SiteKind {
    /// A scalar of the site's type code.
    Scalar,
    /// A 4-byte reference to a string object.
    StrObject,
    /// A 4-byte reference cell (slice, pointer, func, aff).
    RefCell,
    /// Opaque bytes (whole structs, whole arrays).
    Blob,
}

/// Resolved value site of an operand.
#[derive(Clone, Copy, Debug)]
pub struct Site {
    pub kind: SiteKind,
    pub type_code: TypeCode,
    /// Byte width of the value at the final offset.
    pub size: usize,
}

/// Classify what an operand's final offset addresses. Field selectors
/// shift the site to the last selected field.
pub fn site_of(prog: &Program, outer: &Argument) -> Site {
    let site: &Argument = match outer.fields.last() {
        Some(&f) => prog.arg(f),
        None => outer,
    };
    let chain_has = |op: DerefOp| {
        outer.deref_operations.iter().any(|&o| o == op)
            || site.deref_operations.iter().any(|&o| o == op)
    };

    if site.tags.slice && !chain_has(DerefOp::Slice) {
        return Site {
            kind: SiteKind::RefCell,
            type_code: TypeCode::Slice,
            size: POINTER_SIZE,
        };
    }
    if site.tags.pointer && !chain_has(DerefOp::Pointer) {
        return Site {
            kind: SiteKind::RefCell,
            type_code: TypeCode::Pointer,
            size: POINTER_SIZE,
        };
    }
    if site.tags.array && !chain_has(DerefOp::ArrayIndex) {
        return Site {
            kind: SiteKind::Blob,
            type_code: site.type_code,
            size: site.total_size,
        };
    }
    match site.type_code {
        TypeCode::Str | TypeCode::Aff => Site {
            kind: SiteKind::StrObject,
            type_code: site.type_code,
            size: POINTER_SIZE,
        },
        TypeCode::Custom => Site {
            kind: SiteKind::Blob,
            type_code: TypeCode::Custom,
            size: site.total_size,
        },
        TypeCode::Slice | TypeCode::Pointer | TypeCode::Func => Site {
            kind: SiteKind::RefCell,
            type_code: site.type_code,
            size: POINTER_SIZE,
        },
        tc => Site {
            kind: SiteKind::Scalar,
            type_code: tc,
            size: tc.size(),
        },
    }
}

/// Read an operand into a typed value.
pub fn read_arg_value(prog: &Program, fp: usize, id: ArgId) -> Result<Value> {
    let arg = prog.arg(id);
    let site = site_of(prog, arg);
    let off = final_offset(prog, fp, id)?;
    match site.kind {
        SiteKind::StrObject => {
            let obj = if arg.pass_by == PassBy::Reference {
                off as u32
            } else {
                memory::read_u32(&prog.memory, off)?
            };
            Ok(Value::Str(heap::read_str(&prog.memory, obj)?))
        }
        _ if arg.pass_by == PassBy::Reference => Ok(Value::Ref(off as u32)),
        SiteKind::RefCell => Ok(Value::Ref(memory::read_u32(&prog.memory, off)?)),
        SiteKind::Blob => Ok(Value::Bytes(memory::read_bytes(
            &prog.memory,
            off,
            site.size,
        )?)),
        SiteKind::Scalar => Value::decode(&prog.memory, off, site.type_code),
    }
}

/// Write a typed value back through an operand. Strings allocate their
/// object first; the destination offset is resolved afterwards because
/// a collection during allocation may rewrite intermediate references.
pub fn write_arg_value(
    prog: &mut Program,
    config: &MachineConfig,
    fp: usize,
    id: ArgId,
    value: Value,
) -> Result<()> {
    match value {
        Value::Str(s) => {
            let obj = heap::write_str_object(prog, config, &s)?;
            let off = final_offset(prog, fp, id)?;
            memory::write_u32(&mut prog.memory, off, obj as u32)
        }
        v => {
            let off = final_offset(prog, fp, id)?;
            v.encode(&mut prog.memory, off)
        }
    }
}

/// Raw bytes an assignment of this operand would transfer: the resolved
/// address for pass-by-reference operands, the value bytes otherwise.
pub fn read_assignable_bytes(prog: &Program, fp: usize, id: ArgId) -> Result<Vec<u8>> {
    let arg = prog.arg(id);
    let off = final_offset(prog, fp, id)?;
    if arg.pass_by == PassBy::Reference {
        return Ok((off as u32).to_le_bytes().to_vec());
    }
    let site = site_of(prog, arg);
    memory::read_bytes(&prog.memory, off, site.size)
}

/// Move one operand into another (`core.identity`, parameter passing,
/// return copy-back).
pub fn assign(
    prog: &mut Program,
    src_fp: usize,
    src_id: ArgId,
    dst_fp: usize,
    dst_id: ArgId,
) -> Result<()> {
    let bytes = read_assignable_bytes(prog, src_fp, src_id)?;
    let dst_off = final_offset(prog, dst_fp, dst_id)?;
    memory::write_bytes(&mut prog.memory, dst_off, &bytes)
}

/// Everything a native opcode handler can touch.
pub struct OpCtx<'a> {
    pub prog: &'a mut Program,
    pub config: &'a MachineConfig,
    pub io: &'a mut Io,
    /// Function owning the current expression.
    pub fun: FunRef,
    /// Expression index within the function.
    pub line: usize,
    /// Current frame pointer.
    pub fp: usize,
    /// Relative jump requested by a control-flow opcode; the machine
    /// advances by one line when unset.
    pub jump: Option<i32>,
}

impl<'a> OpCtx<'a> {
    pub fn expr(&self) -> &Expression {
        &self.prog.function(self.fun).expressions[self.line]
    }

    pub fn n_inputs(&self) -> usize {
        self.expr().inputs.len()
    }

    pub fn n_outputs(&self) -> usize {
        self.expr().outputs.len()
    }

    pub fn input_id(&self, index: usize) -> Result<ArgId> {
        self.expr()
            .inputs
            .get(index)
            .copied()
            .ok_or(RuntimeError::MissingOperand { op: "input", index })
    }

    pub fn output_id(&self, index: usize) -> Result<ArgId> {
        self.expr()
            .outputs
            .get(index)
            .copied()
            .ok_or(RuntimeError::MissingOperand { op: "output", index })
    }

    pub fn input_arg(&self, index: usize) -> Result<&Argument> {
        Ok(self.prog.arg(self.input_id(index)?))
    }

    pub fn output_arg(&self, index: usize) -> Result<&Argument> {
        Ok(self.prog.arg(self.output_id(index)?))
    }

    /// Read input `index` into a typed value.
    pub fn read(&self, index: usize) -> Result<Value> {
        read_arg_value(self.prog, self.fp, self.input_id(index)?)
    }

    /// Raw assignable bytes of input `index`.
    pub fn read_raw(&self, index: usize) -> Result<Vec<u8>> {
        read_assignable_bytes(self.prog, self.fp, self.input_id(index)?)
    }

    /// Resolved final offset of input `index`.
    pub fn input_offset(&self, index: usize) -> Result<usize> {
        final_offset(self.prog, self.fp, self.input_id(index)?)
    }

    /// Resolved final offset of output `index`.
    pub fn output_offset(&self, index: usize) -> Result<usize> {
        final_offset(self.prog, self.fp, self.output_id(index)?)
    }

    /// Write a typed value to output `index`.
    pub fn write(&mut self, index: usize, value: Value) -> Result<()> {
        let id = self.output_id(index)?;
        write_arg_value(self.prog, self.config, self.fp, id, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sable_spec::{Function, MachineConfig};

    fn setup() -> (Program, MachineConfig) {
        let config = MachineConfig::new(1024, 4096, 16384, 8).unwrap();
        (Program::new(&config), config)
    }

    #[test]
    fn test_read_write_scalar_local() {
        let (mut prog, config) = setup();
        let pkg = prog.add_package("main");
        let fun = prog.add_function(pkg, Function::new("f", pkg));
        let x = prog.declare_local(fun, Argument::new("x", TypeCode::I32));

        write_arg_value(&mut prog, &config, 16, x, Value::I32(-5)).unwrap();
        assert_eq!(read_arg_value(&prog, 16, x).unwrap(), Value::I32(-5));
        // a different frame sees its own cell
        assert_eq!(read_arg_value(&prog, 64, x).unwrap(), Value::I32(0));
    }

    #[test]
    fn test_str_literal_reads_as_string() {
        let (mut prog, config) = setup();
        let lit = prog.str_literal_arg("hello");
        assert_eq!(
            read_arg_value(&prog, 0, lit).unwrap(),
            Value::Str("hello".to_string())
        );
        let _ = config;
    }

    #[test]
    fn test_str_assignment_copies_reference() {
        let (mut prog, config) = setup();
        let pkg = prog.add_package("main");
        let fun = prog.add_function(pkg, Function::new("f", pkg));
        let lit = prog.str_literal_arg("shared");
        let x = prog.declare_local(fun, Argument::new("x", TypeCode::Str));

        assign(&mut prog, 0, lit, 0, x).unwrap();
        // x now holds the literal object's address
        let cell = final_offset(&prog, 0, x).unwrap();
        let held = memory::read_u32(&prog.memory, cell).unwrap() as usize;
        assert_eq!(held, prog.arg(lit).offset);
        assert_eq!(
            read_arg_value(&prog, 0, x).unwrap(),
            Value::Str("shared".to_string())
        );
        let _ = config;
    }

    #[test]
    fn test_write_str_allocates_object() {
        let (mut prog, config) = setup();
        let pkg = prog.add_package("main");
        let fun = prog.add_function(pkg, Function::new("f", pkg));
        let x = prog.declare_local(fun, Argument::new("x", TypeCode::Str));

        let hp = prog.heap_pointer;
        write_arg_value(&mut prog, &config, 0, x, Value::Str("fresh".into())).unwrap();
        assert!(prog.heap_pointer > hp);
        assert_eq!(
            read_arg_value(&prog, 0, x).unwrap(),
            Value::Str("fresh".to_string())
        );
    }

    #[test]
    fn test_slice_variable_reads_as_ref() {
        let (mut prog, _config) = setup();
        let pkg = prog.add_package("main");
        let fun = prog.add_function(pkg, Function::new("f", pkg));
        let s = prog.declare_local(fun, Argument::slice_of("s", TypeCode::I32));
        assert_eq!(read_arg_value(&prog, 0, s).unwrap(), Value::Ref(0));

        let site = site_of(&prog, prog.arg(s));
        assert_eq!(site.kind, SiteKind::RefCell);
        assert_eq!(site.size, POINTER_SIZE);
    }

    #[test]
    fn test_slice_element_site_is_scalar() {
        let (mut prog, _config) = setup();
        let pkg = prog.add_package("main");
        let fun = prog.add_function(pkg, Function::new("f", pkg));
        let s = prog.declare_local(fun, Argument::slice_of("s", TypeCode::I32));
        let idx = prog.i32_literal_arg(0);
        let elem = {
            let derived = prog.arg(s).indexed(idx);
            prog.alloc_arg(derived)
        };
        let site = site_of(&prog, prog.arg(elem));
        assert_eq!(site.kind, SiteKind::Scalar);
        assert_eq!(site.type_code, TypeCode::I32);
        assert_eq!(site.size, 4);
    }

    #[test]
    fn test_struct_blob_assignment() {
        let (mut prog, config) = setup();
        let pkg = prog.add_package("main");
        let sref = prog.add_struct(pkg, "Pair");
        prog.add_field(sref, Argument::new("a", TypeCode::I32)).unwrap();
        prog.add_field(sref, Argument::new("b", TypeCode::I32)).unwrap();
        let size = prog.strct(sref).size;

        let fun = prog.add_function(pkg, Function::new("f", pkg));
        let p = prog.declare_local(fun, Argument::struct_of("p", sref, size));
        let q = prog.declare_local(fun, Argument::struct_of("q", sref, size));

        write_arg_value(&mut prog, &config, 0, p, Value::Bytes(vec![1, 0, 0, 0, 2, 0, 0, 0]))
            .unwrap();
        assign(&mut prog, 0, p, 0, q).unwrap();
        assert_eq!(
            read_arg_value(&prog, 0, q).unwrap(),
            Value::Bytes(vec![1, 0, 0, 0, 2, 0, 0, 0])
        );
    }
}
