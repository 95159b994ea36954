// ABOUTME: Stack machine: fetch-decode-execute over compiled instruction blocks

use crate::code::{CodeHandle, Instr, Opcode};
use crate::cons;
use crate::context::Context;
use crate::env::{Environment, VarPos};
use crate::error::{LangError, Result};
use crate::package;
use crate::value::{Closure, ReturnAddress, Val};
use std::rc::Rc;

/// Machine registers for one execution.
#[derive(Debug)]
pub struct State {
    pub stack: Vec<Val>,
    pub env: Option<Rc<Environment>>,
    pub func: Rc<Closure>,
    pub pc: usize,
    pub argcount: usize,
    pub done: bool,
}

/// Run `closure` with `args` to completion and return the result.
///
/// Macro expansion re-enters this function from inside the compiler with a
/// fresh state; re-entrancy is plain host-stack recursion.
pub fn execute(ctx: &Context, closure: Rc<Closure>, args: &[Val]) -> Result<Val> {
    let mut state = State {
        stack: args.to_vec(),
        env: closure.env.clone(),
        func: closure,
        pc: 0,
        argcount: args.len(),
        done: false,
    };
    let mut instrs = fetch(ctx, state.func.code)?;

    while !state.done {
        if state.pc >= instrs.len() {
            return Err(LangError::RunawayCode.into());
        }
        let instr = instrs[state.pc].clone();
        trace(ctx, &state, &instr);
        state.pc += 1;

        match instr.op {
            Opcode::Label => {}

            Opcode::PushConst => state.stack.push(instr.a.clone()),

            Opcode::LocalGet => {
                let pos = var_pos(&instr)?;
                let env = current_env(&state, pos)?;
                let value = env.get(pos)?;
                state.stack.push(value);
            }

            Opcode::LocalSet => {
                let pos = var_pos(&instr)?;
                let value = top(&state)?.clone();
                current_env(&state, pos)?.set(pos, value)?;
            }

            Opcode::GlobalGet => {
                let sym = symbol_operand(&instr)?;
                state
                    .stack
                    .push(package::symbol_value(sym).unwrap_or(Val::Nil));
            }

            Opcode::GlobalSet => {
                let sym = symbol_operand(&instr)?;
                let value = top(&state)?.clone();
                package::set_symbol_value(sym, value);
            }

            Opcode::Pop => {
                pop(&mut state)?;
            }

            Opcode::Dup => {
                let value = top(&state)?.clone();
                state.stack.push(value);
            }

            Opcode::JmpIfTrue => {
                let value = pop(&mut state)?;
                if value.cast_to_bool() {
                    state.pc = jump_target(&instr, instrs.len())?;
                }
            }

            Opcode::JmpIfFalse => {
                let value = pop(&mut state)?;
                if !value.cast_to_bool() {
                    state.pc = jump_target(&instr, instrs.len())?;
                }
            }

            Opcode::Jmp => {
                state.pc = jump_target(&instr, instrs.len())?;
            }

            Opcode::MakeEnv => {
                let size = count_operand(&instr)?;
                if state.argcount != size {
                    return Err(LangError::WrongArgCount {
                        expected: size.to_string(),
                        actual: state.argcount,
                    }
                    .into());
                }
                let frame = Environment::with_size(size, state.env.clone());
                for slot in (0..size).rev() {
                    let value = pop(&mut state)?;
                    frame.set(VarPos { frame: 0, slot }, value)?;
                }
                state.env = Some(frame);
            }

            Opcode::MakeEnvDot => {
                let named = count_operand(&instr)?;
                if state.argcount < named {
                    return Err(LangError::WrongArgCount {
                        expected: format!("at least {}", named),
                        actual: state.argcount,
                    }
                    .into());
                }
                let frame = Environment::with_size(named + 1, state.env.clone());
                let mut rest = Val::Nil;
                for _ in 0..(state.argcount - named) {
                    rest = cons::cons(pop(&mut state)?, rest);
                }
                frame.set(
                    VarPos {
                        frame: 0,
                        slot: named,
                    },
                    rest,
                )?;
                for slot in (0..named).rev() {
                    let value = pop(&mut state)?;
                    frame.set(VarPos { frame: 0, slot }, value)?;
                }
                state.env = Some(frame);
            }

            Opcode::MakeClosure => {
                let template = match &instr.a {
                    Val::Closure(c) => c,
                    other => return Err(LangError::NotAClosure(other.to_string()).into()),
                };
                state
                    .stack
                    .push(Val::Closure(Rc::new(template.instantiate(state.env.clone()))));
            }

            Opcode::SaveReturn => {
                let target = jump_target(&instr, instrs.len())?;
                let text = state
                    .func
                    .name
                    .borrow()
                    .clone()
                    .unwrap_or_else(|| state.func.code.to_string());
                state.stack.push(Val::Return(Rc::new(ReturnAddress {
                    func: state.func.clone(),
                    pc: target,
                    env: state.env.clone(),
                    text,
                })));
            }

            Opcode::JmpClosure => {
                let argc = count_operand(&instr)?;
                let callee = pop(&mut state)?;
                let closure = match callee {
                    Val::Closure(c) => c,
                    other => return Err(LangError::NotAClosure(other.to_string()).into()),
                };
                // The frame holding the just-computed arguments is dropped;
                // the arguments themselves are already on the value stack.
                state.env = closure.env.clone();
                state.func = closure;
                state.argcount = argc;
                state.pc = 0;
                instrs = fetch(ctx, state.func.code)?;
            }

            Opcode::Return => match state.stack.len() {
                0 => return Err(LangError::StackUnderflow.into()),
                1 => state.done = true,
                _ => {
                    let value = pop(&mut state)?;
                    let address = match pop(&mut state)? {
                        Val::Return(r) => r,
                        _ => return Err(LangError::ReturnWithoutAddress.into()),
                    };
                    state.stack.push(value);
                    state.func = address.func.clone();
                    state.env = address.env.clone();
                    state.pc = address.pc;
                    instrs = fetch(ctx, state.func.code)?;
                }
            },

            Opcode::CallPrimop => {
                let name = match &instr.a {
                    Val::Str(s) => s.to_string(),
                    other => return Err(LangError::UnknownPrimitive(other.to_string()).into()),
                };
                let argc = match &instr.b {
                    // A nil count means "use the argcount register"; this is
                    // how the primitive closure stubs stay variadic.
                    Val::Nil => state.argcount,
                    other => count_operand_val(other)?,
                };
                let mut args = Vec::with_capacity(argc);
                for _ in 0..argc {
                    args.push(pop(&mut state)?);
                }
                args.reverse();

                let prim = ctx
                    .primitives()
                    .get(&name)
                    .ok_or_else(|| LangError::UnknownPrimitive(name.clone()))?;
                if !prim.accepts(argc) {
                    return Err(LangError::arity_error(&name, prim.arity_text(), argc).into());
                }
                let result = (prim.func)(ctx, &args)?;
                state.stack.push(result);
            }
        }
    }

    state
        .stack
        .pop()
        .ok_or_else(|| LangError::StackUnderflow.into())
}

fn fetch(ctx: &Context, handle: CodeHandle) -> Result<Rc<[Instr]>> {
    ctx.code()
        .instrs(handle)
        .ok_or_else(|| LangError::InvalidCodeHandle(handle.0).into())
}

fn trace(ctx: &Context, state: &State, instr: &Instr) {
    let logger = ctx.logger();
    if logger.instructions {
        logger.log(&format!("{:>4} : {}", state.pc, instr));
    }
    if logger.stack {
        let rendered: Vec<String> = state.stack.iter().map(Val::to_string).collect();
        logger.log(&format!("       stack: [{}]", rendered.join(" ")));
    }
}

fn top(state: &State) -> Result<&Val> {
    state
        .stack
        .last()
        .ok_or_else(|| LangError::StackUnderflow.into())
}

fn pop(state: &mut State) -> Result<Val> {
    state
        .stack
        .pop()
        .ok_or_else(|| LangError::StackUnderflow.into())
}

fn var_pos(instr: &Instr) -> Result<VarPos> {
    match (&instr.a, &instr.b) {
        (Val::Int(frame), Val::Int(slot)) if *frame >= 0 && *slot >= 0 => Ok(VarPos {
            frame: *frame as usize,
            slot: *slot as usize,
        }),
        _ => Err(LangError::InvalidVarPos { frame: 0, slot: 0 }.into()),
    }
}

fn current_env<'s>(state: &'s State, pos: VarPos) -> Result<&'s Rc<Environment>> {
    state.env.as_ref().ok_or_else(|| {
        LangError::InvalidVarPos {
            frame: pos.frame,
            slot: pos.slot,
        }
        .into()
    })
}

fn symbol_operand(instr: &Instr) -> Result<&Rc<crate::symbol::Symbol>> {
    match &instr.a {
        Val::Symbol(sym) => Ok(sym),
        other => Err(LangError::TypeMismatch {
            function: instr.op.to_string(),
            expected: "symbol".to_string(),
            actual: other.type_name().to_string(),
            position: 1,
        }
        .into()),
    }
}

fn count_operand(instr: &Instr) -> Result<usize> {
    count_operand_val(&instr.a)
}

fn count_operand_val(value: &Val) -> Result<usize> {
    match value {
        Val::Int(n) if *n >= 0 => Ok(*n as usize),
        other => Err(LangError::BadJumpTarget(match other {
            Val::Int(n) => i64::from(*n),
            _ => -1,
        })
        .into()),
    }
}

fn jump_target(instr: &Instr, len: usize) -> Result<usize> {
    match &instr.b {
        Val::Int(n) if *n >= 0 && (*n as usize) < len => Ok(*n as usize),
        Val::Int(n) => Err(LangError::BadJumpTarget(i64::from(*n)).into()),
        _ => Err(LangError::BadJumpTarget(-1).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::Compiler;
    use crate::logger::Logger;

    fn ctx() -> Context {
        Context::new(false, Logger::quiet()).expect("context")
    }

    fn run(ctx: &Context, src: &str) -> Result<Val> {
        let mut parser = crate::parser::Parser::new();
        parser.add_string(src);
        let mut last = Val::Nil;
        while let Some(expr) = parser.parse_next(ctx.packages())? {
            let unit = Compiler::new(ctx).compile(&expr)?;
            last = execute(ctx, unit.closure, &[])?;
        }
        Ok(last)
    }

    fn eval(ctx: &Context, src: &str) -> Val {
        run(ctx, src).expect("evaluation")
    }

    #[test]
    fn test_constants_and_globals() {
        let ctx = ctx();
        assert_eq!(eval(&ctx, "42"), Val::Int(42));
        assert_eq!(eval(&ctx, "(begin (set! x 5) x)"), Val::Int(5));
        // GLOBAL_GET of an unbound symbol pushes nil.
        assert_eq!(eval(&ctx, "never-bound"), Val::Nil);
    }

    #[test]
    fn test_global_set_nil_deletes_binding() {
        let ctx = ctx();
        eval(&ctx, "(set! x 5)");
        assert_eq!(eval(&ctx, "x"), Val::Int(5));
        eval(&ctx, "(set! x ())");
        assert_eq!(eval(&ctx, "x"), Val::Nil);
    }

    #[test]
    fn test_lambda_call_binds_arguments() {
        let ctx = ctx();
        assert_eq!(eval(&ctx, "((lambda (a b) b) 1 2)"), Val::Int(2));
    }

    #[test]
    fn test_wrong_arity_is_language_error() {
        let ctx = ctx();
        let err = run(&ctx, "((lambda (a) a) 1 2)").unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Lang(LangError::WrongArgCount { .. })
        ));
    }

    #[test]
    fn test_envdot_collects_extras_in_order() {
        let ctx = ctx();
        assert_eq!(
            eval(&ctx, "((lambda (a . b) b) 5 6 7 8)").to_string(),
            "(6 7 8)"
        );
        assert_eq!(eval(&ctx, "((lambda (a . b) b) 5)"), Val::Nil);
    }

    #[test]
    fn test_calling_non_closure_fails() {
        let ctx = ctx();
        let err = run(&ctx, "(1 2)").unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Lang(LangError::NotAClosure(_))
        ));
    }

    #[test]
    fn test_if_branches_at_runtime() {
        let ctx = ctx();
        eval(&ctx, "(set! flag #f)");
        assert_eq!(eval(&ctx, "(if flag 1 2)"), Val::Int(2));
        eval(&ctx, "(set! flag 0)");
        assert_eq!(eval(&ctx, "(if flag 1 2)"), Val::Int(1));
        // nil tests false at runtime.
        eval(&ctx, "(set! flag ())");
        assert_eq!(eval(&ctx, "(if flag 1 2)"), Val::Int(2));
    }

    #[test]
    fn test_if_star_returns_truthy_predicate() {
        let ctx = ctx();
        assert_eq!(eval(&ctx, "(if* 7 2)"), Val::Int(7));
        assert_eq!(eval(&ctx, "(if* #f 2)"), Val::Int(2));
    }

    #[test]
    fn test_while_loop_runs_and_leaves_last_value() {
        let ctx = ctx();
        assert_eq!(
            eval(
                &ctx,
                "(begin (set! x 0) (while (< x 5) (set! x (+ x 1))) x)"
            ),
            Val::Int(5)
        );
        assert_eq!(eval(&ctx, "(while #f 1)"), Val::Nil);
    }

    #[test]
    fn test_closure_captures_environment() {
        let ctx = ctx();
        eval(
            &ctx,
            "(set! counter ((lambda (n) (lambda () (set! n (+ n 1)) n)) 0))",
        );
        assert_eq!(eval(&ctx, "(counter)"), Val::Int(1));
        assert_eq!(eval(&ctx, "(counter)"), Val::Int(2));
        assert_eq!(eval(&ctx, "(counter)"), Val::Int(3));
    }

    #[test]
    fn test_closures_share_captured_frames() {
        let ctx = ctx();
        eval(
            &ctx,
            "(begin \
               (set! pair ((lambda (n) \
                 (list (lambda () (set! n (+ n 1)) n) (lambda () n))) 0)) \
               (set! bump (first pair)) \
               (set! peek (first (rest pair))))",
        );
        eval(&ctx, "(bump)");
        eval(&ctx, "(bump)");
        assert_eq!(eval(&ctx, "(peek)"), Val::Int(2));
    }

    #[test]
    fn test_primitive_closure_stub_is_first_class() {
        let ctx = ctx();
        // Calling through a variable defeats the fast path and goes through
        // the closure stub.
        assert_eq!(eval(&ctx, "((lambda (f) (f 1 2)) +)"), Val::Int(3));
    }

    #[test]
    fn test_deep_recursion_in_tail_position_is_flat() {
        let ctx = ctx();
        eval(
            &ctx,
            "(set! loop (lambda (n) (if (= n 0) 'ok (loop (- n 1)))))",
        );
        let result = eval(&ctx, "(loop 100000)");
        assert_eq!(result.to_string(), "ok");
    }

    #[test]
    fn test_runaway_code_is_detected() {
        let ctx = ctx();
        let handle = ctx
            .code_mut()
            .add(vec![Instr::with_a(Opcode::PushConst, Val::Int(1))], "bad");
        let closure = Rc::new(Closure::new(handle, None, Val::Nil));
        let err = execute(&ctx, closure, &[]).unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Lang(LangError::RunawayCode)
        ));
    }

    #[test]
    fn test_stack_underflow_is_detected() {
        let ctx = ctx();
        let handle = ctx
            .code_mut()
            .add(vec![Instr::new(Opcode::Pop)], "bad");
        let closure = Rc::new(Closure::new(handle, None, Val::Nil));
        let err = execute(&ctx, closure, &[]).unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Lang(LangError::StackUnderflow)
        ));
    }

    #[test]
    fn test_bad_jump_target_is_detected() {
        let ctx = ctx();
        let handle = ctx.code_mut().add(
            vec![Instr::with_ab(Opcode::Jmp, Val::string("L1"), Val::Int(99))],
            "bad",
        );
        let closure = Rc::new(Closure::new(handle, None, Val::Nil));
        let err = execute(&ctx, closure, &[]).unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Lang(LangError::BadJumpTarget(99))
        ));
    }

    #[test]
    fn test_local_set_does_not_pop() {
        let ctx = ctx();
        // set! in tail position returns the assigned value.
        assert_eq!(eval(&ctx, "((lambda (x) (set! x 9)) 1)"), Val::Int(9));
    }
}
