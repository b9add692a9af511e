//! The closed native opcode dispatch table.
//!
//! Handlers are pure functions over the typed value wrappers in
//! [`crate::value`]; they receive an explicit [`OpCtx`] rather than
//! consulting any process-wide program state.

mod aff;
mod arith;
mod compare;
mod convert;
mod fmt;
mod image;
mod mem;
mod os;

use crate::error::{Result, RuntimeError};
use crate::execute::{assign, OpCtx};
use sable_spec::Opcode;

/// Dispatch one native opcode.
pub fn dispatch(ctx: &mut OpCtx, op: Opcode) -> Result<()> {
    match op {
        Opcode::Identity => identity(ctx),
        Opcode::Jmp => jmp(ctx),
        Opcode::Exit => {
            ctx.prog.terminated = true;
            Ok(())
        }
        Opcode::Panic => panic_op(ctx),

        Opcode::Add
        | Opcode::Sub
        | Opcode::Mul
        | Opcode::Div
        | Opcode::Mod
        | Opcode::BitAnd
        | Opcode::BitOr
        | Opcode::BitXor
        | Opcode::Shl
        | Opcode::Shr => arith::binary(ctx, op),
        Opcode::Neg => arith::unary(ctx, op),

        Opcode::Eq | Opcode::Ne | Opcode::Lt | Opcode::Gt | Opcode::LtEq | Opcode::GtEq => {
            compare::compare(ctx, op)
        }
        Opcode::And | Opcode::Or | Opcode::Not => compare::logic(ctx, op),

        Opcode::Cast => convert::cast(ctx),

        Opcode::Len => mem::len(ctx),
        Opcode::Append => mem::append(ctx),
        Opcode::Resize => mem::resize(ctx),
        Opcode::Copy => mem::copy(ctx),

        Opcode::Printf => fmt::printf(ctx),
        Opcode::Sprintf => fmt::sprintf(ctx),

        Opcode::OsRun => os::run(ctx),
        Opcode::OsEnv => os::env(ctx),

        Opcode::Serialize => image::serialize(ctx),
        Opcode::Deserialize => image::deserialize(ctx),

        Opcode::AffQuery => aff::query(ctx),
    }
}

/// `core.identity`: assignment with pass-by semantics.
fn identity(ctx: &mut OpCtx) -> Result<()> {
    let src = ctx.input_id(0)?;
    let dst = ctx.output_id(0)?;
    assign(ctx.prog, ctx.fp, src, ctx.fp, dst)
}

/// `core.jmp`: relative branch, unconditional without an input.
fn jmp(ctx: &mut OpCtx) -> Result<()> {
    let predicate = if ctx.n_inputs() == 0 {
        true
    } else {
        ctx.read(0)?.as_bool()?
    };
    let (then_lines, else_lines) = {
        let expr = ctx.expr();
        (expr.then_lines, expr.else_lines)
    };
    ctx.jump = Some(if predicate { then_lines } else { else_lines });
    Ok(())
}

/// `core.panic`: raise a runtime panic with the optional message.
fn panic_op(ctx: &mut OpCtx) -> Result<()> {
    let message = if ctx.n_inputs() == 0 {
        "panic".to_string()
    } else {
        ctx.read(0)?.as_str()?.to_string()
    };
    Err(RuntimeError::Panic { message })
}
