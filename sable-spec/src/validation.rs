//! # Pre-run Validation
//!
//! Structural checks over a complete program. Front-ends mark type and
//! semantic problems on operands and expressions; this pass turns them
//! into hard errors before the interpreter touches the program, and
//! re-checks the cross-reference and segment invariants that a
//! deserialized image must also satisfy.

use crate::ast::{ArgId, Expression, FunRef, Operator, PkgId, Program};
use crate::error::SpecError;
use crate::types::TypeCode;

/// Validate a program. An `Err` means the program must not be run.
pub fn validate(prog: &Program) -> Result<(), SpecError> {
    validate_segments(prog)?;
    for (p, pkg) in prog.packages.iter().enumerate() {
        let pkg_id = PkgId(p as u32);
        for &imp in &pkg.imports {
            check_pkg(prog, imp)?;
        }
        for strct in &pkg.structs {
            validate_struct(prog, &strct.name, &strct.fields, strct.size)?;
        }
        for f in 0..pkg.functions.len() {
            let fun_ref = FunRef {
                pkg: pkg_id,
                fun: f as u32,
            };
            validate_function(prog, fun_ref)?;
        }
        for &g in &pkg.globals {
            check_arg(prog, g)?;
        }
    }
    for frame in &prog.call_stack {
        check_fun(prog, frame.operator)?;
        if frame.frame_pointer > prog.stack_size {
            return Err(malformed("call frame outside the stack segment"));
        }
    }
    Ok(())
}

fn validate_segments(prog: &Program) -> Result<(), SpecError> {
    if prog.heap_start != prog.stack_size + prog.data_size {
        return Err(malformed("heap start does not follow the data segment"));
    }
    if prog.memory.len() != prog.stack_size + prog.data_size + prog.heap_size {
        return Err(malformed("memory length disagrees with segment sizes"));
    }
    if prog.stack_pointer > prog.stack_size {
        return Err(malformed("stack pointer beyond the stack segment"));
    }
    if prog.heap_pointer > prog.heap_size {
        return Err(malformed("heap pointer beyond the heap segment"));
    }
    if prog.call_stack.len() > prog.call_stack_capacity {
        return Err(malformed("active frames exceed call stack capacity"));
    }
    Ok(())
}

fn validate_struct(
    prog: &Program,
    name: &str,
    fields: &[ArgId],
    size: usize,
) -> Result<(), SpecError> {
    let mut expected_offset = 0usize;
    for &f in fields {
        check_arg(prog, f)?;
        let field = prog.arg(f);
        if field.offset != expected_offset {
            return Err(malformed(&format!(
                "struct '{}': field '{}' offset {} != packed offset {}",
                name, field.name, field.offset, expected_offset
            )));
        }
        expected_offset += field.total_size;
    }
    if expected_offset != size {
        return Err(malformed(&format!(
            "struct '{}': size {} != sum of field sizes {}",
            name, size, expected_offset
        )));
    }
    Ok(())
}

fn validate_function(prog: &Program, fun_ref: FunRef) -> Result<(), SpecError> {
    let fun = prog.function(fun_ref);
    if fun.is_native && fun.opcode.is_none() {
        return Err(malformed(&format!(
            "native function '{}' has no opcode",
            fun.name
        )));
    }
    if !fun.is_native && fun.length != fun.expressions.len() {
        return Err(malformed(&format!(
            "function '{}': pre-computed length {} != expression count {}",
            fun.name,
            fun.length,
            fun.expressions.len()
        )));
    }
    for &a in fun.inputs.iter().chain(&fun.outputs).chain(&fun.list_of_pointers) {
        check_arg(prog, a)?;
    }
    for (line, expr) in fun.expressions.iter().enumerate() {
        validate_expression(prog, &fun.name, line, fun.expressions.len(), expr)?;
    }
    Ok(())
}

fn validate_expression(
    prog: &Program,
    fun_name: &str,
    line: usize,
    length: usize,
    expr: &Expression,
) -> Result<(), SpecError> {
    if expr.tags.und_type {
        return Err(SpecError::UndefinedType(format!(
            "{fun_name}:{line}: expression of undefined type"
        )));
    }
    if let Some(Operator::Defined(f)) = expr.operator {
        check_fun(prog, f)?;
    }
    for &a in expr.inputs.iter().chain(&expr.outputs) {
        check_arg(prog, a)?;
        let arg = prog.arg(a);
        if matches!(arg.type_code, TypeCode::Undefined | TypeCode::Identifier) {
            return Err(SpecError::UndefinedType(if arg.name.is_empty() {
                format!("{fun_name}:{line}: unnamed operand")
            } else {
                arg.name.clone()
            }));
        }
    }
    if matches!(expr.operator, Some(Operator::Native(crate::opcode::Opcode::Jmp))) {
        // jumping to `length` is the fall-through return
        for delta in [expr.then_lines, expr.else_lines] {
            let target = line as i64 + delta as i64;
            if target < 0 || target > length as i64 {
                return Err(malformed(&format!(
                    "{fun_name}:{line}: jump target {target} exits the function"
                )));
            }
        }
    }
    Ok(())
}

fn check_pkg(prog: &Program, pkg: PkgId) -> Result<(), SpecError> {
    if (pkg.0 as usize) < prog.packages.len() {
        Ok(())
    } else {
        Err(malformed(&format!("package index {} out of range", pkg.0)))
    }
}

fn check_fun(prog: &Program, fun: FunRef) -> Result<(), SpecError> {
    check_pkg(prog, fun.pkg)?;
    if (fun.fun as usize) < prog.package(fun.pkg).functions.len() {
        Ok(())
    } else {
        Err(malformed(&format!(
            "function index {} out of range in package {}",
            fun.fun,
            prog.package(fun.pkg).name
        )))
    }
}

fn check_arg(prog: &Program, arg: ArgId) -> Result<(), SpecError> {
    if (arg.0 as usize) >= prog.args.len() {
        return Err(malformed(&format!("operand index {} out of range", arg.0)));
    }
    let a = prog.arg(arg);
    for &sub in a.indexes.iter().chain(&a.fields).chain(&a.inputs).chain(&a.outputs) {
        if (sub.0 as usize) >= prog.args.len() {
            return Err(malformed(&format!(
                "sub-operand index {} out of range",
                sub.0
            )));
        }
    }
    if let Some(sref) = a.custom_type {
        check_pkg(prog, sref.pkg)?;
        if (sref.strct as usize) >= prog.package(sref.pkg).structs.len() {
            return Err(malformed(&format!(
                "struct index {} out of range in package {}",
                sref.strct,
                prog.package(sref.pkg).name
            )));
        }
    }
    Ok(())
}

fn malformed(reason: &str) -> SpecError {
    SpecError::MalformedProgram {
        reason: reason.to_string(),
    }
}
