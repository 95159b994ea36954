//! Comparisons: numeric ordering, identity, structural equality, and `not`

use super::Registry;
use crate::context::Context;
use crate::error::{LangError, Result};
use crate::value::Val;
use std::cmp::Ordering;

fn is_integer(value: &Val) -> bool {
    matches!(
        value,
        Val::Int(_) | Val::UInt(_) | Val::Int64(_) | Val::UInt64(_)
    )
}

fn as_i128(value: &Val) -> i128 {
    match value {
        Val::Int(n) => i128::from(*n),
        Val::UInt(n) => i128::from(*n),
        Val::Int64(n) => i128::from(*n),
        Val::UInt64(n) => i128::from(*n),
        _ => 0,
    }
}

fn as_f64(value: &Val) -> f64 {
    match value {
        Val::Int(n) => f64::from(*n),
        Val::UInt(n) => f64::from(*n),
        Val::Int64(n) => *n as f64,
        Val::UInt64(n) => *n as f64,
        Val::Float(n) => f64::from(*n),
        Val::Double(n) => *n,
        _ => 0.0,
    }
}

fn compare(function: &str, a: &Val, b: &Val) -> Result<Option<Ordering>> {
    if !a.is_number() {
        return Err(LangError::type_error(function, "number", a, 1).into());
    }
    if !b.is_number() {
        return Err(LangError::type_error(function, "number", b, 2).into());
    }
    if is_integer(a) && is_integer(b) {
        Ok(Some(as_i128(a).cmp(&as_i128(b))))
    } else {
        Ok(as_f64(a).partial_cmp(&as_f64(b)))
    }
}

fn chain(
    function: &str,
    args: &[Val],
    accept: fn(Option<Ordering>) -> bool,
) -> Result<Val> {
    for pair in args.windows(2) {
        if !accept(compare(function, &pair[0], &pair[1])?) {
            return Ok(Val::Bool(false));
        }
    }
    Ok(Val::Bool(true))
}

pub fn prim_num_eq(_ctx: &Context, args: &[Val]) -> Result<Val> {
    chain("=", args, |o| o == Some(Ordering::Equal))
}

pub fn prim_num_ne(_ctx: &Context, args: &[Val]) -> Result<Val> {
    chain("/=", args, |o| matches!(o, Some(c) if c != Ordering::Equal))
}

pub fn prim_lt(_ctx: &Context, args: &[Val]) -> Result<Val> {
    chain("<", args, |o| o == Some(Ordering::Less))
}

pub fn prim_le(_ctx: &Context, args: &[Val]) -> Result<Val> {
    chain(
        "<=",
        args,
        |o| matches!(o, Some(Ordering::Less | Ordering::Equal)),
    )
}

pub fn prim_gt(_ctx: &Context, args: &[Val]) -> Result<Val> {
    chain(">", args, |o| o == Some(Ordering::Greater))
}

pub fn prim_ge(_ctx: &Context, args: &[Val]) -> Result<Val> {
    chain(
        ">=",
        args,
        |o| matches!(o, Some(Ordering::Greater | Ordering::Equal)),
    )
}

/// Identity equality per the data model: bitwise for numbers and booleans,
/// structural for strings and maps, reference for the rest.
pub fn prim_eq(_ctx: &Context, args: &[Val]) -> Result<Val> {
    Ok(Val::Bool(args[0] == args[1]))
}

/// Deep structural equality, recursing through conses and vectors.
pub fn prim_equal(_ctx: &Context, args: &[Val]) -> Result<Val> {
    Ok(Val::Bool(args[0].equal(&args[1])))
}

pub fn prim_not(_ctx: &Context, args: &[Val]) -> Result<Val> {
    Ok(Val::Bool(!args[0].cast_to_bool()))
}

/// Register all comparison primitives
pub fn register(registry: &mut Registry) {
    registry.add("=", 2, None, prim_num_eq);
    registry.add("/=", 2, None, prim_num_ne);
    registry.add("<", 2, None, prim_lt);
    registry.add("<=", 2, None, prim_le);
    registry.add(">", 2, None, prim_gt);
    registry.add(">=", 2, None, prim_ge);
    registry.add("eq?", 2, Some(2), prim_eq);
    registry.add("equal?", 2, Some(2), prim_equal);
    registry.add("not", 1, Some(1), prim_not);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cons;
    use crate::logger::Logger;

    fn ctx() -> Context {
        Context::new(false, Logger::quiet()).expect("context")
    }

    #[test]
    fn test_numeric_equality_promotes() {
        let ctx = ctx();
        assert_eq!(
            prim_num_eq(&ctx, &[Val::Int(1), Val::Int64(1)]).unwrap(),
            Val::Bool(true)
        );
        assert_eq!(
            prim_num_eq(&ctx, &[Val::Int(1), Val::Double(1.0)]).unwrap(),
            Val::Bool(true)
        );
        assert_eq!(
            prim_num_eq(&ctx, &[Val::Int(1), Val::Int(2)]).unwrap(),
            Val::Bool(false)
        );
    }

    #[test]
    fn test_ordering_chains() {
        let ctx = ctx();
        assert_eq!(
            prim_lt(&ctx, &[Val::Int(1), Val::Int(2), Val::Int(3)]).unwrap(),
            Val::Bool(true)
        );
        assert_eq!(
            prim_lt(&ctx, &[Val::Int(1), Val::Int(3), Val::Int(2)]).unwrap(),
            Val::Bool(false)
        );
        assert_eq!(
            prim_le(&ctx, &[Val::Int(2), Val::Int(2)]).unwrap(),
            Val::Bool(true)
        );
        assert_eq!(
            prim_ge(&ctx, &[Val::Double(2.5), Val::Int(2)]).unwrap(),
            Val::Bool(true)
        );
    }

    #[test]
    fn test_comparison_requires_numbers() {
        let ctx = ctx();
        assert!(prim_lt(&ctx, &[Val::Int(1), Val::string("2")]).is_err());
    }

    #[test]
    fn test_eq_is_identity_equal_is_structural() {
        let ctx = ctx();
        let a = cons::list_from(vec![Val::Int(1)]);
        let b = cons::list_from(vec![Val::Int(1)]);
        assert_eq!(prim_eq(&ctx, &[a.clone(), b.clone()]).unwrap(), Val::Bool(false));
        assert_eq!(prim_equal(&ctx, &[a, b]).unwrap(), Val::Bool(true));
    }

    #[test]
    fn test_not_follows_truthiness() {
        let ctx = ctx();
        assert_eq!(prim_not(&ctx, &[Val::Bool(false)]).unwrap(), Val::Bool(true));
        assert_eq!(prim_not(&ctx, &[Val::Nil]).unwrap(), Val::Bool(true));
        assert_eq!(prim_not(&ctx, &[Val::Int(0)]).unwrap(), Val::Bool(false));
    }
}
