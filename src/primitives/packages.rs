//! Package operations: creation, the current package, exports

use super::Registry;
use crate::context::Context;
use crate::error::{LangError, Result, RuntimeError};
use crate::value::Val;

fn name_arg(function: &str, args: &[Val], position: usize) -> Result<String> {
    match &args[position - 1] {
        Val::Str(s) => Ok(s.to_string()),
        Val::Symbol(s) => Ok(s.name().to_string()),
        other => Err(LangError::type_error(function, "string or symbol", other, position).into()),
    }
}

/// `(make-package "name")`: create (or find) a named package importing core.
pub fn prim_make_package(ctx: &Context, args: &[Val]) -> Result<Val> {
    let name = name_arg("make-package", args, 1)?;
    ctx.packages().get_or_create(&name);
    Ok(Val::string(&name))
}

/// `(in-package "name")`: switch the reader's current package.
pub fn prim_in_package(ctx: &Context, args: &[Val]) -> Result<Val> {
    let name = name_arg("in-package", args, 1)?;
    let package = ctx
        .packages()
        .find(&name)
        .ok_or_else(|| RuntimeError::Raised(format!("unknown package \"{}\"", name)))?;
    ctx.packages().set_current(package);
    Ok(Val::string(&name))
}

/// `(export 'sym …)`: mark symbols visible through imports.
pub fn prim_export(_ctx: &Context, args: &[Val]) -> Result<Val> {
    for (position, arg) in args.iter().enumerate() {
        match arg {
            Val::Symbol(sym) => sym.set_exported(true),
            other => {
                return Err(LangError::type_error("export", "symbol", other, position + 1).into())
            }
        }
    }
    Ok(Val::Nil)
}

/// `(package-name)`: current package name, or nil for the global package.
pub fn prim_package_name(ctx: &Context, args: &[Val]) -> Result<Val> {
    match args.first() {
        None => Ok(ctx
            .packages()
            .current()
            .borrow()
            .name()
            .map(Val::string)
            .unwrap_or(Val::Nil)),
        Some(Val::Symbol(sym)) => Ok(sym
            .package()
            .and_then(|pkg| pkg.borrow().name().map(Val::string))
            .unwrap_or(Val::Nil)),
        Some(other) => Err(LangError::type_error("package-name", "symbol", other, 1).into()),
    }
}

/// Register all package primitives
pub fn register(registry: &mut Registry) {
    registry.add("make-package", 1, Some(1), prim_make_package);
    registry.add("in-package", 1, Some(1), prim_in_package);
    registry.add("export", 1, None, prim_export);
    registry.add("package-name", 0, Some(1), prim_package_name);
}
