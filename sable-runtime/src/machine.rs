//! The interpreter: a call-stack driven dispatch loop that advances one
//! expression per step.
//!
//! A frame is pushed with line 0 and a frame pointer equal to the
//! caller's stack pointer; the callee's pre-computed size is added to
//! the stack pointer. Reaching the end of a function's expression list
//! pops the frame, copies the callee's outputs back into the caller's
//! call expression, and resumes at the caller's next line. Execution
//! ends when the call stack empties or a native opcode terminates the
//! program.
//!
//! The machine is single-threaded and non-reentrant. A failed run
//! poisons the program value; hosts discard and rebuild.

use crate::error::{Result, RuntimeError};
use crate::execute::{assign, OpCtx};
use crate::io::Io;
use crate::ops;
use sable_spec::validation;
use sable_spec::{CallFrame, FunRef, MachineConfig, Operator, Program};

/// One program plus its execution resources.
pub struct Machine {
    pub program: Program,
    pub config: MachineConfig,
    pub io: Io,
}

impl Machine {
    pub fn new(program: Program, config: MachineConfig) -> Self {
        Self {
            program,
            config,
            io: Io::passthrough(),
        }
    }

    /// Capture program output instead of writing to stdout.
    pub fn with_captured_output(mut self) -> Self {
        self.io = Io::capture();
        self
    }

    /// Validate and push the entry frame. Not needed when resuming a
    /// thawed mid-execution image, whose call stack is already live.
    pub fn boot(&mut self) -> Result<()> {
        validation::validate(&self.program)?;
        let main = self.program.main_function().ok_or(RuntimeError::NoEntryPoint)?;
        self.push_frame(main)
    }

    /// Run until the call stack empties or the program terminates.
    pub fn run(&mut self) -> Result<()> {
        if self.program.call_stack.is_empty() && !self.program.terminated {
            self.boot()?;
        } else {
            validation::validate(&self.program)?;
        }
        while self.step()? {}
        Ok(())
    }

    /// Advance one expression. Returns `false` once execution is done.
    pub fn step(&mut self) -> Result<bool> {
        if self.program.terminated {
            return Ok(false);
        }
        let Some(&frame) = self.program.call_stack.last() else {
            return Ok(false);
        };

        let fun = self.program.function(frame.operator);
        if frame.line >= fun.length {
            self.pop_frame()?;
            return Ok(true);
        }

        tracing::trace!(
            function = %fun.name,
            line = frame.line,
            fp = frame.frame_pointer,
            "step"
        );

        self.eval(frame).map_err(|err| {
            let fun = self.program.function(frame.operator);
            let expr = &fun.expressions[frame.line.min(fun.expressions.len().saturating_sub(1))];
            let file = if expr.file.is_empty() { &fun.file } else { &expr.file };
            err.at(file, expr.line)
        })?;
        Ok(true)
    }

    fn eval(&mut self, frame: CallFrame) -> Result<()> {
        let operator = self.program.function(frame.operator).expressions[frame.line].operator;
        match operator {
            None => {
                // pure data: declarations, literal anchors, scope tags
                self.advance_line();
                Ok(())
            }
            Some(Operator::Native(op)) => {
                let mut ctx = OpCtx {
                    prog: &mut self.program,
                    config: &self.config,
                    io: &mut self.io,
                    fun: frame.operator,
                    line: frame.line,
                    fp: frame.frame_pointer,
                    jump: None,
                };
                ops::dispatch(&mut ctx, op)?;
                match ctx.jump {
                    Some(delta) => self.jump_line(delta),
                    None => self.advance_line(),
                }
                Ok(())
            }
            Some(Operator::Defined(callee)) => self.call(frame, callee),
        }
    }

    /// Push a frame for a user function call and copy the caller's
    /// expression inputs into the callee's parameters.
    fn call(&mut self, frame: CallFrame, callee: FunRef) -> Result<()> {
        let prog = &mut self.program;
        if prog.call_stack.len() >= prog.call_stack_capacity {
            return Err(RuntimeError::CallStackOverflow {
                capacity: prog.call_stack_capacity,
            });
        }
        let size = prog.function(callee).size;
        let new_fp = prog.stack_pointer;
        if new_fp + size > prog.stack_size {
            return Err(RuntimeError::StackOverflow {
                stack_size: prog.stack_size,
            });
        }

        let params = prog.function(callee).inputs.clone();
        let call_inputs = prog.function(frame.operator).expressions[frame.line]
            .inputs
            .clone();
        for (param, input) in params.iter().zip(call_inputs.iter()) {
            assign(prog, frame.frame_pointer, *input, new_fp, *param)?;
        }

        prog.call_stack.push(CallFrame {
            operator: callee,
            line: 0,
            frame_pointer: new_fp,
        });
        prog.stack_pointer = new_fp + size;
        Ok(())
    }

    /// Pop the finished frame: copy its outputs into the caller's call
    /// expression, zero the frame, restore the stack pointer, and
    /// resume the caller at its next line.
    fn pop_frame(&mut self) -> Result<()> {
        let prog = &mut self.program;
        let Some(callee) = prog.call_stack.pop() else {
            return Ok(());
        };
        let callee_size = prog.function(callee.operator).size;

        if let Some(&caller) = prog.call_stack.last() {
            let outputs = prog.function(callee.operator).outputs.clone();
            let expr_outputs = prog.function(caller.operator).expressions[caller.line]
                .outputs
                .clone();
            for (out, dst) in outputs.iter().zip(expr_outputs.iter()) {
                assign(prog, callee.frame_pointer, *out, caller.frame_pointer, *dst)?;
            }
            if let Some(top) = prog.call_stack.last_mut() {
                top.line += 1;
            }
        }

        // stale frame bytes would read as live roots on frame reuse
        let fp = callee.frame_pointer;
        prog.memory[fp..fp + callee_size].fill(0);
        prog.stack_pointer = fp;
        Ok(())
    }

    fn push_frame(&mut self, fun: FunRef) -> Result<()> {
        let prog = &mut self.program;
        if prog.call_stack.len() >= prog.call_stack_capacity {
            return Err(RuntimeError::CallStackOverflow {
                capacity: prog.call_stack_capacity,
            });
        }
        let size = prog.function(fun).size;
        let fp = prog.stack_pointer;
        if fp + size > prog.stack_size {
            return Err(RuntimeError::StackOverflow {
                stack_size: prog.stack_size,
            });
        }
        prog.call_stack.push(CallFrame {
            operator: fun,
            line: 0,
            frame_pointer: fp,
        });
        prog.stack_pointer = fp + size;
        Ok(())
    }

    fn advance_line(&mut self) {
        if let Some(frame) = self.program.call_stack.last_mut() {
            frame.line += 1;
        }
    }

    fn jump_line(&mut self, delta: i32) {
        if let Some(frame) = self.program.call_stack.last_mut() {
            frame.line = (frame.line as i64 + delta as i64).max(0) as usize;
        }
    }

    /// Captured output, when capture mode is on.
    pub fn output(&self) -> String {
        self.io.output_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sable_spec::{
        register_core_packages, Argument, Expression, Function, Opcode, TypeCode,
    };

    fn machine() -> Machine {
        let config = MachineConfig::new(4096, 8192, 32768, 16).unwrap();
        let mut prog = Program::new(&config);
        register_core_packages(&mut prog);
        Machine::new(prog, config).with_captured_output()
    }

    #[test]
    fn test_empty_main_runs_to_completion() {
        let mut m = machine();
        let pkg = m.program.add_package("main");
        m.program.add_function(pkg, Function::new("main", pkg));
        m.run().unwrap();
        assert!(m.program.call_stack.is_empty());
        assert_eq!(m.program.stack_pointer, 0);
    }

    #[test]
    fn test_missing_entry_point() {
        let mut m = machine();
        assert!(matches!(m.run(), Err(RuntimeError::NoEntryPoint)));
    }

    #[test]
    fn test_identity_assignment() {
        // frames are zeroed on pop, so step manually and inspect
        let mut m = machine();
        let pkg = m.program.add_package("main");
        let fun = m.program.add_function(pkg, Function::new("main", pkg));
        let x = m.program.declare_local(fun, Argument::new("x", TypeCode::I32));
        let lit = m.program.i32_literal_arg(41);
        m.program.add_expression(
            fun,
            Expression::native(Opcode::Identity)
                .with_inputs(vec![lit])
                .with_outputs(vec![x]),
        );
        m.boot().unwrap();
        m.step().unwrap();
        let off = crate::offset::final_offset(&m.program, 0, x).unwrap();
        assert_eq!(crate::memory::read_i32(&m.program.memory, off).unwrap(), 41);
    }

    #[test]
    fn test_jmp_skips_expressions() {
        let mut m = machine();
        let pkg = m.program.add_package("main");
        let fun = m.program.add_function(pkg, Function::new("main", pkg));
        let x = m.program.declare_local(fun, Argument::new("x", TypeCode::I32));
        let one = m.program.i32_literal_arg(1);
        let two = m.program.i32_literal_arg(2);

        // unconditional jump over the first assignment
        m.program
            .add_expression(fun, Expression::native(Opcode::Jmp).with_jumps(2, 2));
        m.program.add_expression(
            fun,
            Expression::native(Opcode::Identity)
                .with_inputs(vec![one])
                .with_outputs(vec![x]),
        );
        m.program.add_expression(
            fun,
            Expression::native(Opcode::Identity)
                .with_inputs(vec![two])
                .with_outputs(vec![x]),
        );

        m.boot().unwrap();
        m.step().unwrap(); // jmp
        m.step().unwrap(); // second identity
        let off = crate::offset::final_offset(&m.program, 0, x).unwrap();
        assert_eq!(crate::memory::read_i32(&m.program.memory, off).unwrap(), 2);
    }

    #[test]
    fn test_call_stack_overflow() {
        let mut m = machine();
        let pkg = m.program.add_package("main");
        let fun = m.program.add_function(pkg, Function::new("main", pkg));
        // main calls itself forever
        m.program.add_expression(fun, Expression::call(fun));
        let err = m.run().unwrap_err();
        assert!(matches!(
            err.root(),
            RuntimeError::CallStackOverflow { capacity: 16 }
        ));
    }

    #[test]
    fn test_exit_terminates() {
        let mut m = machine();
        let pkg = m.program.add_package("main");
        let fun = m.program.add_function(pkg, Function::new("main", pkg));
        m.program.add_expression(fun, Expression::native(Opcode::Exit));
        m.program.add_expression(fun, Expression::native(Opcode::Panic));
        m.run().unwrap();
        assert!(m.program.terminated);
    }
}
