//! `aff.query`, the affordance query: what can be done with a named
//! function. Renders its input/output signature; unknown names yield
//! the empty string.

use crate::error::Result;
use crate::execute::OpCtx;
use crate::value::Value;
use sable_spec::Program;

fn signature(prog: &Program, pkg_name: &str, fn_name: &str) -> String {
    let Some(pkg) = prog.get_package(pkg_name) else {
        return String::new();
    };
    let Some(fun_ref) = prog.get_function(fn_name, pkg) else {
        return String::new();
    };
    let fun = prog.function(fun_ref);

    let render = |ids: &[sable_spec::ArgId]| {
        ids.iter()
            .map(|&id| {
                let arg = prog.arg(id);
                let type_name = match arg.custom_type {
                    Some(sref) => prog.strct(sref).name.clone(),
                    None => arg.type_code.name().to_string(),
                };
                if arg.name.is_empty() {
                    type_name
                } else {
                    format!("{} {}", arg.name, type_name)
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    };

    format!(
        "func {}.{}({}) ({})",
        pkg_name,
        fun.name,
        render(&fun.inputs),
        render(&fun.outputs)
    )
}

/// `aff.query(pkg, fn) -> str`
pub fn query(ctx: &mut OpCtx) -> Result<()> {
    let pkg_name = ctx.read(0)?.as_str()?.to_string();
    let fn_name = ctx.read(1)?.as_str()?.to_string();
    let sig = signature(ctx.prog, &pkg_name, &fn_name);
    ctx.write(0, Value::Str(sig))
}
