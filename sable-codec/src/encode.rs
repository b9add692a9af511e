//! Image encoding.
//!
//! The image is a fixed-layout header followed by length-prefixed
//! tables of fixed-width little-endian records. Variable-length lists
//! flatten into a shared integer pool; strings into a shared names
//! blob; both are referenced by `(offset, length)` pairs, and every
//! cross-reference is an index, which is how cyclic package imports
//! and shared operand descriptors survive the round trip.
//!
//! Layout:
//! ```text
//! [magic u32][version u32]
//! [program record]
//! [packages][structs][functions][expressions][arguments]   tables
//! [integers pool][calls table]
//! [names blob][memory blob]
//! ```

use crate::NONE;
use sable_spec::{Argument, ArgTags, Expression, ExprTags, Operator, Program};

/// Little-endian record writer.
pub(crate) struct Writer {
    pub buf: Vec<u8>,
    count: u32,
}

impl Writer {
    pub fn new() -> Self {
        Self {
            buf: Vec::new(),
            count: 0,
        }
    }

    pub fn begin_record(&mut self) {
        self.count += 1;
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn pair(&mut self, (off, len): (u32, u32)) {
        self.u32(off);
        self.u32(len);
    }
}

/// Shared pools accumulated while records are emitted.
#[derive(Default)]
pub(crate) struct Pools {
    pub names: Vec<u8>,
    pub integers: Vec<i64>,
}

impl Pools {
    pub fn name(&mut self, s: &str) -> (u32, u32) {
        let off = self.names.len() as u32;
        self.names.extend_from_slice(s.as_bytes());
        (off, s.len() as u32)
    }

    pub fn ints<I: IntoIterator<Item = i64>>(&mut self, values: I) -> (u32, u32) {
        let off = self.integers.len() as u32;
        self.integers.extend(values);
        (off, self.integers.len() as u32 - off)
    }
}

pub(crate) fn expr_tags_bits(tags: &ExprTags) -> u32 {
    (tags.method_call as u32)
        | (tags.struct_literal as u32) << 1
        | (tags.array_literal as u32) << 2
        | (tags.break_loop as u32) << 3
        | (tags.continue_loop as u32) << 4
        | (tags.und_type as u32) << 5
}

pub(crate) fn arg_tags_bits(tags: &ArgTags) -> u32 {
    (tags.slice as u32)
        | (tags.array as u32) << 1
        | (tags.array_first as u32) << 2
        | (tags.pointer as u32) << 3
        | (tags.reference as u32) << 4
        | (tags.dereference_first as u32) << 5
        | (tags.strct as u32) << 6
        | (tags.rest as u32) << 7
        | (tags.local_declaration as u32) << 8
        | (tags.short_declaration as u32) << 9
        | (tags.inner_reference as u32) << 10
        | (tags.previously_declared as u32) << 11
        | (tags.escapes as u32) << 12
}

fn encode_argument(w: &mut Writer, pools: &mut Pools, arg: &Argument) {
    w.begin_record();
    let name = pools.name(&arg.name);
    w.pair(name);
    w.u32(arg.type_code as u32);
    w.u64(arg.size as u64);
    w.u64(arg.total_size as u64);
    w.u64(arg.offset as u64);
    let lengths = pools.ints(arg.lengths.iter().map(|&v| v as i64));
    w.pair(lengths);
    let decls = pools.ints(arg.decl_specifiers.iter().map(|&d| d as u8 as i64));
    w.pair(decls);
    let derefs = pools.ints(arg.deref_operations.iter().map(|&d| d as u8 as i64));
    w.pair(derefs);
    let indexes = pools.ints(arg.indexes.iter().map(|a| a.0 as i64));
    w.pair(indexes);
    let fields = pools.ints(arg.fields.iter().map(|a| a.0 as i64));
    w.pair(fields);
    let inputs = pools.ints(arg.inputs.iter().map(|a| a.0 as i64));
    w.pair(inputs);
    let outputs = pools.ints(arg.outputs.iter().map(|a| a.0 as i64));
    w.pair(outputs);
    w.u32(arg.indirection_levels as u32);
    w.u32(arg.dereference_levels as u32);
    w.u32(arg.pass_by as u32);
    match arg.custom_type {
        Some(sref) => {
            w.u32(sref.pkg.0);
            w.u32(sref.strct);
        }
        None => {
            w.u32(NONE);
            w.u32(NONE);
        }
    }
    w.u32(arg.pkg.map(|p| p.0).unwrap_or(NONE));
    w.u32(arg_tags_bits(&arg.tags));
    let file = pools.name(&arg.file);
    w.pair(file);
    w.u32(arg.line as u32);
}

fn encode_expression(w: &mut Writer, pools: &mut Pools, expr: &Expression) {
    w.begin_record();
    match expr.operator {
        None => {
            w.u32(0);
            w.u32(0);
            w.u32(0);
        }
        Some(Operator::Native(op)) => {
            w.u32(1);
            w.u32(op.to_u16() as u32);
            w.u32(0);
        }
        Some(Operator::Defined(f)) => {
            w.u32(2);
            w.u32(f.pkg.0);
            w.u32(f.fun);
        }
    }
    let inputs = pools.ints(expr.inputs.iter().map(|a| a.0 as i64));
    w.pair(inputs);
    let outputs = pools.ints(expr.outputs.iter().map(|a| a.0 as i64));
    w.pair(outputs);
    let label = pools.name(&expr.label);
    w.pair(label);
    w.i32(expr.then_lines);
    w.i32(expr.else_lines);
    w.i32(expr.scope_op.to_i8() as i32);
    w.u32(expr_tags_bits(&expr.tags));
    let file = pools.name(&expr.file);
    w.pair(file);
    w.u32(expr.line as u32);
}

/// Encode a full program plus its memory into an image.
pub fn serialize(prog: &Program) -> Vec<u8> {
    let mut pools = Pools::default();
    let mut args_w = Writer::new();
    let mut pkgs_w = Writer::new();
    let mut structs_w = Writer::new();
    let mut funs_w = Writer::new();
    let mut exprs_w = Writer::new();
    let mut calls_w = Writer::new();

    for arg in &prog.args {
        encode_argument(&mut args_w, &mut pools, arg);
    }

    for pkg in &prog.packages {
        pkgs_w.begin_record();
        let name = pools.name(&pkg.name);
        pkgs_w.pair(name);
        let imports = pools.ints(pkg.imports.iter().map(|p| p.0 as i64));
        pkgs_w.pair(imports);

        let structs_start = structs_w.count();
        for strct in &pkg.structs {
            structs_w.begin_record();
            let sname = pools.name(&strct.name);
            structs_w.pair(sname);
            structs_w.u32(strct.pkg.0);
            structs_w.u64(strct.size as u64);
            let fields = pools.ints(strct.fields.iter().map(|a| a.0 as i64));
            structs_w.pair(fields);
        }
        pkgs_w.u32(structs_start);
        pkgs_w.u32(pkg.structs.len() as u32);

        let funs_start = funs_w.count();
        for fun in &pkg.functions {
            let exprs_start = exprs_w.count();
            for expr in &fun.expressions {
                encode_expression(&mut exprs_w, &mut pools, expr);
            }
            funs_w.begin_record();
            let fname = pools.name(&fun.name);
            funs_w.pair(fname);
            funs_w.u32(fun.pkg.0);
            funs_w.u32(fun.is_native as u32);
            funs_w.u32(fun.opcode.map(|op| op.to_u16() as u32).unwrap_or(NONE));
            let inputs = pools.ints(fun.inputs.iter().map(|a| a.0 as i64));
            funs_w.pair(inputs);
            let outputs = pools.ints(fun.outputs.iter().map(|a| a.0 as i64));
            funs_w.pair(outputs);
            funs_w.u32(exprs_start);
            funs_w.u32(fun.expressions.len() as u32);
            funs_w.u32(fun.length as u32);
            funs_w.u64(fun.size as u64);
            let pointers = pools.ints(fun.list_of_pointers.iter().map(|a| a.0 as i64));
            funs_w.pair(pointers);
            let file = pools.name(&fun.file);
            funs_w.pair(file);
            funs_w.u32(fun.line as u32);
        }
        pkgs_w.u32(funs_start);
        pkgs_w.u32(pkg.functions.len() as u32);

        let globals = pools.ints(pkg.globals.iter().map(|a| a.0 as i64));
        pkgs_w.pair(globals);
    }

    for call in &prog.call_stack {
        calls_w.begin_record();
        calls_w.u32(call.operator.pkg.0);
        calls_w.u32(call.operator.fun);
        calls_w.u64(call.line as u64);
        calls_w.u64(call.frame_pointer as u64);
    }

    // program record (name refs appended to the pools built above)
    let mut prog_w = Writer::new();
    let path = pools.name(&prog.path);
    prog_w.pair(path);
    let version = pools.name(&prog.version);
    prog_w.pair(version);
    prog_w.u64(prog.stack_size as u64);
    prog_w.u64(prog.stack_pointer as u64);
    prog_w.u64(prog.data_size as u64);
    prog_w.u64(prog.heap_size as u64);
    prog_w.u64(prog.heap_start as u64);
    prog_w.u64(prog.heap_pointer as u64);
    prog_w.u32(prog.call_stack_capacity as u32);
    prog_w.u32(prog.terminated as u32);
    prog_w.u32(prog.current_package.map(|p| p.0).unwrap_or(NONE));
    let inputs = pools.ints(prog.inputs.iter().map(|a| a.0 as i64));
    prog_w.pair(inputs);
    let outputs = pools.ints(prog.outputs.iter().map(|a| a.0 as i64));
    prog_w.pair(outputs);

    // assembly
    let mut out = Vec::new();
    out.extend_from_slice(&crate::MAGIC.to_le_bytes());
    out.extend_from_slice(&crate::VERSION.to_le_bytes());
    out.extend_from_slice(&prog_w.buf);
    for table in [&pkgs_w, &structs_w, &funs_w, &exprs_w, &args_w] {
        out.extend_from_slice(&table.count().to_le_bytes());
        out.extend_from_slice(&table.buf);
    }
    out.extend_from_slice(&(pools.integers.len() as u32).to_le_bytes());
    for v in &pools.integers {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out.extend_from_slice(&calls_w.count().to_le_bytes());
    out.extend_from_slice(&calls_w.buf);
    out.extend_from_slice(&(pools.names.len() as u64).to_le_bytes());
    out.extend_from_slice(&pools.names);
    out.extend_from_slice(&(prog.memory.len() as u64).to_le_bytes());
    out.extend_from_slice(&prog.memory);
    out
}
