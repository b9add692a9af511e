//! Image decoding: rebuild a [`Program`] from the table/pool layout
//! produced by [`crate::encode`]. Indexes are resolved back into the
//! program's arenas; the memory blob is restored verbatim.

use crate::error::{CodecError, Result};
use crate::NONE;
use sable_spec::{
    ArgId, ArgTags, Argument, CallFrame, DeclSpecifier, DerefOp, Expression, ExprTags, FunRef,
    Function, Opcode, Operator, Package, PassBy, PkgId, Program, ScopeOp, Struct, StructRef,
    TypeCode,
};

/// Little-endian cursor over an image.
struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let slice = self
            .bytes
            .get(self.pos..self.pos + len)
            .ok_or(CodecError::Truncated { offset: self.pos })?;
        self.pos += len;
        Ok(slice)
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().expect("sized")))
    }

    fn i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.take(4)?.try_into().expect("sized")))
    }

    fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.take(8)?.try_into().expect("sized")))
    }

    fn i64(&mut self) -> Result<i64> {
        Ok(i64::from_le_bytes(self.take(8)?.try_into().expect("sized")))
    }

    fn pair(&mut self) -> Result<(u32, u32)> {
        Ok((self.u32()?, self.u32()?))
    }
}

/// Pools read back from the image, with checked resolution.
struct Pools {
    names: Vec<u8>,
    integers: Vec<i64>,
}

impl Pools {
    fn name(&self, (off, len): (u32, u32)) -> Result<String> {
        let bytes = self
            .names
            .get(off as usize..(off + len) as usize)
            .ok_or_else(|| malformed("name", "reference outside the names blob"))?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| malformed("name", "invalid utf-8 in names blob"))
    }

    fn ints(&self, (off, len): (u32, u32)) -> Result<&[i64]> {
        self.integers
            .get(off as usize..(off + len) as usize)
            .ok_or_else(|| malformed("integers", "range outside the integer pool"))
    }

    fn arg_ids(&self, range: (u32, u32)) -> Result<Vec<ArgId>> {
        self.ints(range)?
            .iter()
            .map(|&v| {
                u32::try_from(v)
                    .map(ArgId)
                    .map_err(|_| malformed("argument", "negative operand index"))
            })
            .collect()
    }
}

fn malformed(record: &'static str, reason: &str) -> CodecError {
    CodecError::MalformedRecord {
        record,
        reason: reason.to_string(),
    }
}

// Raw records hold unresolved pool references until the pools arrive.

struct RawProgram {
    path: (u32, u32),
    version: (u32, u32),
    stack_size: u64,
    stack_pointer: u64,
    data_size: u64,
    heap_size: u64,
    heap_start: u64,
    heap_pointer: u64,
    call_stack_capacity: u32,
    terminated: u32,
    current_package: u32,
    inputs: (u32, u32),
    outputs: (u32, u32),
}

struct RawPackage {
    name: (u32, u32),
    imports: (u32, u32),
    structs: (u32, u32),
    functions: (u32, u32),
    globals: (u32, u32),
}

struct RawStruct {
    name: (u32, u32),
    pkg: u32,
    size: u64,
    fields: (u32, u32),
}

struct RawFunction {
    name: (u32, u32),
    pkg: u32,
    is_native: u32,
    opcode: u32,
    inputs: (u32, u32),
    outputs: (u32, u32),
    exprs: (u32, u32),
    length: u32,
    size: u64,
    pointers: (u32, u32),
    file: (u32, u32),
    line: u32,
}

struct RawExpression {
    op_kind: u32,
    op_a: u32,
    op_b: u32,
    inputs: (u32, u32),
    outputs: (u32, u32),
    label: (u32, u32),
    then_lines: i32,
    else_lines: i32,
    scope_op: i32,
    tags: u32,
    file: (u32, u32),
    line: u32,
}

struct RawArgument {
    name: (u32, u32),
    type_code: u32,
    size: u64,
    total_size: u64,
    offset: u64,
    lengths: (u32, u32),
    decls: (u32, u32),
    derefs: (u32, u32),
    indexes: (u32, u32),
    fields: (u32, u32),
    inputs: (u32, u32),
    outputs: (u32, u32),
    indirection: u32,
    deref_levels: u32,
    pass_by: u32,
    custom_pkg: u32,
    custom_idx: u32,
    pkg: u32,
    tags: u32,
    file: (u32, u32),
    line: u32,
}

fn expr_tags(bits: u32) -> ExprTags {
    ExprTags {
        method_call: bits & 1 != 0,
        struct_literal: bits & 2 != 0,
        array_literal: bits & 4 != 0,
        break_loop: bits & 8 != 0,
        continue_loop: bits & 16 != 0,
        und_type: bits & 32 != 0,
    }
}

fn arg_tags(bits: u32) -> ArgTags {
    ArgTags {
        slice: bits & 1 != 0,
        array: bits & 2 != 0,
        array_first: bits & 4 != 0,
        pointer: bits & 8 != 0,
        reference: bits & 16 != 0,
        dereference_first: bits & 32 != 0,
        strct: bits & 64 != 0,
        rest: bits & 128 != 0,
        local_declaration: bits & 256 != 0,
        short_declaration: bits & 512 != 0,
        inner_reference: bits & 1024 != 0,
        previously_declared: bits & 2048 != 0,
        escapes: bits & 4096 != 0,
    }
}

fn option_u32(v: u32) -> Option<u32> {
    (v != NONE).then_some(v)
}

/// Decode an image into a full program.
pub fn deserialize(bytes: &[u8]) -> Result<Program> {
    let mut r = Reader::new(bytes);

    let magic = r.u32()?;
    if magic != crate::MAGIC {
        return Err(CodecError::BadMagic { found: magic });
    }
    let version = r.u32()?;
    if version != crate::VERSION {
        return Err(CodecError::VersionMismatch {
            found: version,
            expected: crate::VERSION,
        });
    }

    let raw_prog = RawProgram {
        path: r.pair()?,
        version: r.pair()?,
        stack_size: r.u64()?,
        stack_pointer: r.u64()?,
        data_size: r.u64()?,
        heap_size: r.u64()?,
        heap_start: r.u64()?,
        heap_pointer: r.u64()?,
        call_stack_capacity: r.u32()?,
        terminated: r.u32()?,
        current_package: r.u32()?,
        inputs: r.pair()?,
        outputs: r.pair()?,
    };

    let n_pkgs = r.u32()?;
    let mut raw_pkgs = Vec::with_capacity(n_pkgs as usize);
    for _ in 0..n_pkgs {
        raw_pkgs.push(RawPackage {
            name: r.pair()?,
            imports: r.pair()?,
            structs: r.pair()?,
            functions: r.pair()?,
            globals: r.pair()?,
        });
    }

    let n_structs = r.u32()?;
    let mut raw_structs = Vec::with_capacity(n_structs as usize);
    for _ in 0..n_structs {
        raw_structs.push(RawStruct {
            name: r.pair()?,
            pkg: r.u32()?,
            size: r.u64()?,
            fields: r.pair()?,
        });
    }

    let n_funs = r.u32()?;
    let mut raw_funs = Vec::with_capacity(n_funs as usize);
    for _ in 0..n_funs {
        raw_funs.push(RawFunction {
            name: r.pair()?,
            pkg: r.u32()?,
            is_native: r.u32()?,
            opcode: r.u32()?,
            inputs: r.pair()?,
            outputs: r.pair()?,
            exprs: r.pair()?,
            length: r.u32()?,
            size: r.u64()?,
            pointers: r.pair()?,
            file: r.pair()?,
            line: r.u32()?,
        });
    }

    let n_exprs = r.u32()?;
    let mut raw_exprs = Vec::with_capacity(n_exprs as usize);
    for _ in 0..n_exprs {
        raw_exprs.push(RawExpression {
            op_kind: r.u32()?,
            op_a: r.u32()?,
            op_b: r.u32()?,
            inputs: r.pair()?,
            outputs: r.pair()?,
            label: r.pair()?,
            then_lines: r.i32()?,
            else_lines: r.i32()?,
            scope_op: r.i32()?,
            tags: r.u32()?,
            file: r.pair()?,
            line: r.u32()?,
        });
    }

    let n_args = r.u32()?;
    let mut raw_args = Vec::with_capacity(n_args as usize);
    for _ in 0..n_args {
        raw_args.push(RawArgument {
            name: r.pair()?,
            type_code: r.u32()?,
            size: r.u64()?,
            total_size: r.u64()?,
            offset: r.u64()?,
            lengths: r.pair()?,
            decls: r.pair()?,
            derefs: r.pair()?,
            indexes: r.pair()?,
            fields: r.pair()?,
            inputs: r.pair()?,
            outputs: r.pair()?,
            indirection: r.u32()?,
            deref_levels: r.u32()?,
            pass_by: r.u32()?,
            custom_pkg: r.u32()?,
            custom_idx: r.u32()?,
            pkg: r.u32()?,
            tags: r.u32()?,
            file: r.pair()?,
            line: r.u32()?,
        });
    }

    let n_ints = r.u32()?;
    let mut integers = Vec::with_capacity(n_ints as usize);
    for _ in 0..n_ints {
        integers.push(r.i64()?);
    }

    let n_calls = r.u32()?;
    let mut calls = Vec::with_capacity(n_calls as usize);
    for _ in 0..n_calls {
        calls.push(CallFrame {
            operator: FunRef {
                pkg: PkgId(r.u32()?),
                fun: r.u32()?,
            },
            line: r.u64()? as usize,
            frame_pointer: r.u64()? as usize,
        });
    }

    let names_len = r.u64()? as usize;
    let names = r.take(names_len)?.to_vec();
    let memory_len = r.u64()? as usize;
    let memory = r.take(memory_len)?.to_vec();

    let pools = Pools { names, integers };

    // resolve arguments
    let mut args = Vec::with_capacity(raw_args.len());
    for raw in &raw_args {
        args.push(resolve_argument(raw, &pools)?);
    }

    // resolve expressions, then functions, then structs, then packages
    let mut expressions = Vec::with_capacity(raw_exprs.len());
    for raw in &raw_exprs {
        expressions.push(resolve_expression(raw, &pools)?);
    }

    let take_range = |start: u32, count: u32, total: usize, what: &'static str| {
        let end = start as usize + count as usize;
        if end > total {
            Err(malformed(what, "table range out of bounds"))
        } else {
            Ok(start as usize..end)
        }
    };

    let mut functions = Vec::with_capacity(raw_funs.len());
    for raw in &raw_funs {
        let exprs_range = take_range(raw.exprs.0, raw.exprs.1, expressions.len(), "function")?;
        functions.push(Function {
            name: pools.name(raw.name)?,
            pkg: PkgId(raw.pkg),
            is_native: raw.is_native != 0,
            opcode: match option_u32(raw.opcode) {
                Some(v) => Some(
                    Opcode::from_u16(v as u16)
                        .ok_or_else(|| malformed("function", "unknown opcode"))?,
                ),
                None => None,
            },
            inputs: pools.arg_ids(raw.inputs)?,
            outputs: pools.arg_ids(raw.outputs)?,
            expressions: expressions[exprs_range].to_vec(),
            length: raw.length as usize,
            size: raw.size as usize,
            list_of_pointers: pools.arg_ids(raw.pointers)?,
            file: pools.name(raw.file)?,
            line: raw.line as usize,
        });
    }

    let mut structs = Vec::with_capacity(raw_structs.len());
    for raw in &raw_structs {
        structs.push(Struct {
            name: pools.name(raw.name)?,
            pkg: PkgId(raw.pkg),
            size: raw.size as usize,
            fields: pools.arg_ids(raw.fields)?,
        });
    }

    let mut packages = Vec::with_capacity(raw_pkgs.len());
    for raw in &raw_pkgs {
        let structs_range = take_range(raw.structs.0, raw.structs.1, structs.len(), "package")?;
        let funs_range = take_range(raw.functions.0, raw.functions.1, functions.len(), "package")?;
        packages.push(Package {
            name: pools.name(raw.name)?,
            imports: pools
                .ints(raw.imports)?
                .iter()
                .map(|&v| PkgId(v as u32))
                .collect(),
            structs: structs[structs_range].to_vec(),
            functions: functions[funs_range].to_vec(),
            globals: pools.arg_ids(raw.globals)?,
            current_function: None,
            current_struct: None,
        });
    }

    Ok(Program {
        path: pools.name(raw_prog.path)?,
        version: pools.name(raw_prog.version)?,
        packages,
        args,
        inputs: pools.arg_ids(raw_prog.inputs)?,
        outputs: pools.arg_ids(raw_prog.outputs)?,
        memory,
        stack_size: raw_prog.stack_size as usize,
        stack_pointer: raw_prog.stack_pointer as usize,
        data_size: raw_prog.data_size as usize,
        heap_size: raw_prog.heap_size as usize,
        heap_start: raw_prog.heap_start as usize,
        heap_pointer: raw_prog.heap_pointer as usize,
        call_stack: calls,
        call_stack_capacity: raw_prog.call_stack_capacity as usize,
        terminated: raw_prog.terminated != 0,
        current_package: option_u32(raw_prog.current_package).map(PkgId),
    })
}

fn resolve_expression(raw: &RawExpression, pools: &Pools) -> Result<Expression> {
    let operator = match raw.op_kind {
        0 => None,
        1 => Some(Operator::Native(
            Opcode::from_u16(raw.op_a as u16)
                .ok_or_else(|| malformed("expression", "unknown opcode"))?,
        )),
        2 => Some(Operator::Defined(FunRef {
            pkg: PkgId(raw.op_a),
            fun: raw.op_b,
        })),
        _ => return Err(malformed("expression", "unknown operator kind")),
    };
    Ok(Expression {
        inputs: pools.arg_ids(raw.inputs)?,
        outputs: pools.arg_ids(raw.outputs)?,
        operator,
        label: pools.name(raw.label)?,
        scope_op: ScopeOp::from_i8(raw.scope_op as i8)
            .ok_or_else(|| malformed("expression", "bad scope operation"))?,
        tags: expr_tags(raw.tags),
        then_lines: raw.then_lines,
        else_lines: raw.else_lines,
        file: pools.name(raw.file)?,
        line: raw.line as usize,
    })
}

fn resolve_argument(raw: &RawArgument, pools: &Pools) -> Result<Argument> {
    let type_code = TypeCode::from_u8(raw.type_code as u8)
        .ok_or_else(|| malformed("argument", "unknown type code"))?;
    let decl_specifiers = pools
        .ints(raw.decls)?
        .iter()
        .map(|&v| {
            DeclSpecifier::from_u8(v as u8)
                .ok_or_else(|| malformed("argument", "unknown declaration specifier"))
        })
        .collect::<Result<Vec<_>>>()?;
    let deref_operations = pools
        .ints(raw.derefs)?
        .iter()
        .map(|&v| {
            DerefOp::from_u8(v as u8)
                .ok_or_else(|| malformed("argument", "unknown dereference operation"))
        })
        .collect::<Result<Vec<_>>>()?;
    let custom_type = match (option_u32(raw.custom_pkg), raw.custom_idx) {
        (Some(pkg), idx) => Some(StructRef {
            pkg: PkgId(pkg),
            strct: idx,
        }),
        (None, _) => None,
    };
    Ok(Argument {
        lengths: pools.ints(raw.lengths)?.iter().map(|&v| v as usize).collect(),
        decl_specifiers,
        deref_operations,
        indexes: pools.arg_ids(raw.indexes)?,
        fields: pools.arg_ids(raw.fields)?,
        inputs: pools.arg_ids(raw.inputs)?,
        outputs: pools.arg_ids(raw.outputs)?,
        name: pools.name(raw.name)?,
        type_code,
        size: raw.size as usize,
        total_size: raw.total_size as usize,
        offset: raw.offset as usize,
        indirection_levels: raw.indirection as u8,
        dereference_levels: raw.deref_levels as u8,
        pass_by: PassBy::from_u8(raw.pass_by as u8)
            .ok_or_else(|| malformed("argument", "bad pass-by convention"))?,
        custom_type,
        pkg: option_u32(raw.pkg).map(PkgId),
        tags: arg_tags(raw.tags),
        file: pools.name(raw.file)?,
        line: raw.line as usize,
    })
}
