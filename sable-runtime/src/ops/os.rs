//! OS bridge opcodes: `os.run`, `os.env`.
//!
//! Host-boundary failures are not runtime errors; they come back to the
//! program as `os.RUN_*` status codes.

use crate::error::Result;
use crate::execute::OpCtx;
use crate::value::Value;
use std::process::Command;

/// `os.RUN_*` status codes, mirrored by the constants registered in
/// the `os` package.
pub mod status {
    pub const SUCCESS: i32 = 0;
    pub const EMPTY_CMD: i32 = 1;
    pub const PANIC: i32 = 2;
    pub const START_FAILED: i32 = 3;
    pub const WAIT_FAILED: i32 = 4;
    pub const TIMEOUT: i32 = 5;
}

/// `os.run(cmd) -> (status, stdout)`
pub fn run(ctx: &mut OpCtx) -> Result<()> {
    let cmd = ctx.read(0)?.as_str()?.to_string();

    let (code, stdout) = if cmd.trim().is_empty() {
        (status::EMPTY_CMD, String::new())
    } else {
        match Command::new("sh").arg("-c").arg(&cmd).output() {
            Ok(output) => {
                let code = if output.status.success() {
                    status::SUCCESS
                } else {
                    status::PANIC
                };
                (code, String::from_utf8_lossy(&output.stdout).into_owned())
            }
            Err(_) => (status::START_FAILED, String::new()),
        }
    };

    ctx.write(0, Value::I32(code))?;
    if ctx.n_outputs() > 1 {
        ctx.write(1, Value::Str(stdout))?;
    }
    Ok(())
}

/// `os.env(name) -> str`; empty string when unset.
pub fn env(ctx: &mut OpCtx) -> Result<()> {
    let name = ctx.read(0)?.as_str()?.to_string();
    let value = std::env::var(&name).unwrap_or_default();
    ctx.write(0, Value::Str(value))
}
