//! Pipeline re-entry and miscellany: eval, macroexpand, apply, error,
//! gensym, printing, disassembly

use super::Registry;
use crate::compiler::Compiler;
use crate::cons;
use crate::context::Context;
use crate::error::{LangError, Result, RuntimeError};
use crate::value::Val;
use crate::vm;

/// Compile and run an expression value through the shared context.
pub fn prim_eval(ctx: &Context, args: &[Val]) -> Result<Val> {
    let unit = Compiler::new(ctx).compile(&args[0])?;
    vm::execute(ctx, unit.closure, &[])
}

pub fn prim_macroexpand_1(ctx: &Context, args: &[Val]) -> Result<Val> {
    let (expanded, _) = Compiler::new(ctx).macroexpand_1(&args[0])?;
    Ok(expanded)
}

pub fn prim_macroexpand(ctx: &Context, args: &[Val]) -> Result<Val> {
    Compiler::new(ctx).macroexpand_full(&args[0])
}

/// `(apply f args)`: call a closure with a list of arguments.
pub fn prim_apply(ctx: &Context, args: &[Val]) -> Result<Val> {
    let closure = args[0]
        .as_closure()
        .ok_or_else(|| LangError::NotAClosure(args[0].to_string()))?
        .clone();
    let (items, tail) = cons::to_vec(&args[1]);
    if !tail.is_nil() {
        return Err(LangError::type_error("apply", "proper list", &args[1], 2).into());
    }
    vm::execute(ctx, closure, &items)
}

/// `(error …)`: raise a runtime error from user code.
pub fn prim_error(_ctx: &Context, args: &[Val]) -> Result<Val> {
    let message = args
        .iter()
        .map(Val::to_string)
        .collect::<Vec<_>>()
        .join(" ");
    Err(RuntimeError::Raised(message).into())
}

pub fn prim_gensym(ctx: &Context, args: &[Val]) -> Result<Val> {
    let prefix = match args.first() {
        Some(Val::Str(s)) => s.to_string(),
        Some(Val::Symbol(s)) => s.name().to_string(),
        Some(other) => {
            return Err(LangError::type_error("gensym", "string or symbol", other, 1).into())
        }
        None => "G__".to_string(),
    };
    Ok(Val::Symbol(ctx.gensym(&prefix)))
}

pub fn prim_print(ctx: &Context, args: &[Val]) -> Result<Val> {
    let rendered = args
        .iter()
        .map(Val::to_string)
        .collect::<Vec<_>>()
        .join(" ");
    ctx.write_output(&rendered, false);
    Ok(Val::Nil)
}

pub fn prim_println(ctx: &Context, args: &[Val]) -> Result<Val> {
    let rendered = args
        .iter()
        .map(Val::to_string)
        .collect::<Vec<_>>()
        .join(" ");
    ctx.write_output(&rendered, true);
    Ok(Val::Nil)
}

/// Instruction listing of a closure's code block.
pub fn prim_disassemble(ctx: &Context, args: &[Val]) -> Result<Val> {
    let closure = args[0]
        .as_closure()
        .ok_or_else(|| LangError::type_error("disassemble", "closure", &args[0], 1))?;
    Ok(Val::string(&ctx.code().disassemble(closure.code)))
}

/// Register the pipeline re-entry primitives
pub fn register(registry: &mut Registry) {
    registry.add("eval", 1, Some(1), prim_eval);
    registry.add("macroexpand-1", 1, Some(1), prim_macroexpand_1);
    registry.add("macroexpand", 1, Some(1), prim_macroexpand);
    registry.add("apply", 2, Some(2), prim_apply);
    registry.add("error", 1, None, prim_error);
    registry.add("gensym", 0, Some(1), prim_gensym);
    registry.add("print", 0, None, prim_print);
    registry.add("println", 0, None, prim_println);
    registry.add("disassemble", 1, Some(1), prim_disassemble);
}
