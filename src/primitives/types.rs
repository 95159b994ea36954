//! Type predicates and symbol accessors

use super::Registry;
use crate::context::Context;
use crate::error::{LangError, Result};
use crate::value::Val;

macro_rules! predicate {
    ($name:ident, $pattern:pat) => {
        pub fn $name(_ctx: &Context, args: &[Val]) -> Result<Val> {
            Ok(Val::Bool(matches!(&args[0], $pattern)))
        }
    };
}

predicate!(prim_nil_p, Val::Nil);
predicate!(prim_cons_p, Val::Cons(_));
predicate!(prim_symbol_p, Val::Symbol(_));
predicate!(prim_string_p, Val::Str(_));
predicate!(prim_bool_p, Val::Bool(_));
predicate!(prim_vector_p, Val::Vector(_));
predicate!(prim_map_p, Val::Map(_));
predicate!(prim_closure_p, Val::Closure(_));
predicate!(
    prim_integer_p,
    Val::Int(_) | Val::Int64(_) | Val::UInt(_) | Val::UInt64(_)
);
predicate!(prim_float_p, Val::Float(_) | Val::Double(_));

pub fn prim_number_p(_ctx: &Context, args: &[Val]) -> Result<Val> {
    Ok(Val::Bool(args[0].is_number()))
}

pub fn prim_symbol_name(_ctx: &Context, args: &[Val]) -> Result<Val> {
    match &args[0] {
        Val::Symbol(sym) => Ok(Val::string(sym.name())),
        other => Err(LangError::type_error("symbol-name", "symbol", other, 1).into()),
    }
}

/// Home package name of a symbol; nil for the unnamed global package and
/// for uninterned symbols.
pub fn prim_symbol_package(_ctx: &Context, args: &[Val]) -> Result<Val> {
    match &args[0] {
        Val::Symbol(sym) => Ok(sym
            .package()
            .and_then(|pkg| pkg.borrow().name().map(Val::string))
            .unwrap_or(Val::Nil)),
        other => Err(LangError::type_error("symbol-package", "symbol", other, 1).into()),
    }
}

/// Register all type predicates
pub fn register(registry: &mut Registry) {
    registry.add("nil?", 1, Some(1), prim_nil_p);
    registry.add("cons?", 1, Some(1), prim_cons_p);
    registry.add("symbol?", 1, Some(1), prim_symbol_p);
    registry.add("string?", 1, Some(1), prim_string_p);
    registry.add("bool?", 1, Some(1), prim_bool_p);
    registry.add("vector?", 1, Some(1), prim_vector_p);
    registry.add("map?", 1, Some(1), prim_map_p);
    registry.add("closure?", 1, Some(1), prim_closure_p);
    registry.add("integer?", 1, Some(1), prim_integer_p);
    registry.add("float?", 1, Some(1), prim_float_p);
    registry.add("number?", 1, Some(1), prim_number_p);
    registry.add("symbol-name", 1, Some(1), prim_symbol_name);
    registry.add("symbol-package", 1, Some(1), prim_symbol_package);
}
