//! `prog.serialize` / `prog.deserialize`: program images as
//! in-language byte slices.

use crate::error::Result;
use crate::heap;
use crate::memory;
use crate::execute::OpCtx;
use sable_spec::{validation, OBJECT_HEADER_SIZE, SLICE_HEADER_SIZE};

/// `prog.serialize() -> []ui8`
///
/// The image is taken before the output slice is allocated, so the
/// snapshot does not contain its own byte buffer.
pub fn serialize(ctx: &mut OpCtx) -> Result<()> {
    let image = sable_codec::serialize(ctx.prog);

    let obj = heap::new_slice(ctx.prog, ctx.config, image.len(), 1)?;
    heap::slice_set_len(&mut ctx.prog.memory, obj, image.len())?;
    memory::write_bytes(
        &mut ctx.prog.memory,
        obj + OBJECT_HEADER_SIZE + SLICE_HEADER_SIZE,
        &image,
    )?;

    let out = ctx.output_offset(0)?;
    memory::write_u32(&mut ctx.prog.memory, out, obj as u32)
}

/// `prog.deserialize(bytes)`: decode and validate an image held in a
/// byte slice. Malformed images are runtime errors; the running
/// program is left untouched.
pub fn deserialize(ctx: &mut OpCtx) -> Result<()> {
    let obj = ctx.read(0)?.as_ref_offset()? as usize;
    let bytes = if obj == 0 {
        Vec::new()
    } else {
        let len = heap::slice_len(&ctx.prog.memory, obj)?;
        memory::read_bytes(
            &ctx.prog.memory,
            obj + OBJECT_HEADER_SIZE + SLICE_HEADER_SIZE,
            len,
        )?
    };
    let thawed = sable_codec::deserialize(&bytes)?;
    validation::validate(&thawed).map_err(crate::error::RuntimeError::Spec)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::execute::read_arg_value;
    use crate::heap;
    use crate::machine::Machine;
    use sable_spec::{Argument, Expression, Function, MachineConfig, Opcode, Program, TypeCode};
    use sable_spec::{OBJECT_HEADER_SIZE, SLICE_HEADER_SIZE};

    #[test]
    fn test_serialize_then_deserialize_in_language() {
        let config = MachineConfig::new(1024, 1 << 16, 1 << 22, 8).unwrap();
        let mut prog = Program::new(&config);
        let pkg = prog.add_package("main");
        let fun = prog.add_function(pkg, Function::new("main", pkg));
        let img = prog.declare_local(fun, Argument::slice_of("img", TypeCode::UI8));
        prog.add_expression(
            fun,
            Expression::native(Opcode::Serialize).with_outputs(vec![img]),
        );
        prog.add_expression(
            fun,
            Expression::native(Opcode::Deserialize).with_inputs(vec![img]),
        );

        let mut m = Machine::new(prog, config).with_captured_output();
        m.boot().unwrap();
        m.step().unwrap(); // serialize
        let obj = read_arg_value(&m.program, 0, img)
            .unwrap()
            .as_ref_offset()
            .unwrap() as usize;
        let len = heap::slice_len(&m.program.memory, obj).unwrap();
        assert!(len > 0);
        // the payload decodes back into a program
        let bytes = crate::memory::read_bytes(
            &m.program.memory,
            obj + OBJECT_HEADER_SIZE + SLICE_HEADER_SIZE,
            len,
        )
        .unwrap();
        let thawed = sable_codec::deserialize(&bytes).unwrap();
        assert_eq!(thawed.packages.len(), m.program.packages.len());

        m.step().unwrap(); // in-language deserialize validates
    }
}
