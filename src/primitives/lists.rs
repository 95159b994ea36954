//! List primitives: cons cells, construction, traversal, and mutation

use super::Registry;
use crate::cons;
use crate::context::Context;
use crate::error::{LangError, Result};
use crate::value::Val;

pub fn prim_cons(_ctx: &Context, args: &[Val]) -> Result<Val> {
    Ok(cons::cons(args[0].clone(), args[1].clone()))
}

/// First element; lenient on nil like the rest of the list operations.
pub fn prim_first(_ctx: &Context, args: &[Val]) -> Result<Val> {
    match &args[0] {
        Val::Cons(cell) => Ok(cell.first()),
        Val::Nil => Ok(Val::Nil),
        other => Err(LangError::type_error("first", "list", other, 1).into()),
    }
}

pub fn prim_rest(_ctx: &Context, args: &[Val]) -> Result<Val> {
    match &args[0] {
        Val::Cons(cell) => Ok(cell.rest()),
        Val::Nil => Ok(Val::Nil),
        other => Err(LangError::type_error("rest", "list", other, 1).into()),
    }
}

pub fn prim_set_first(_ctx: &Context, args: &[Val]) -> Result<Val> {
    match &args[0] {
        Val::Cons(cell) => {
            cell.set_first(args[1].clone());
            Ok(args[0].clone())
        }
        other => Err(LangError::type_error("set-first!", "cons", other, 1).into()),
    }
}

pub fn prim_set_rest(_ctx: &Context, args: &[Val]) -> Result<Val> {
    match &args[0] {
        Val::Cons(cell) => {
            cell.set_rest(args[1].clone());
            Ok(args[0].clone())
        }
        other => Err(LangError::type_error("set-rest!", "cons", other, 1).into()),
    }
}

pub fn prim_list(_ctx: &Context, args: &[Val]) -> Result<Val> {
    Ok(cons::list_from(args.to_vec()))
}

pub fn prim_length(_ctx: &Context, args: &[Val]) -> Result<Val> {
    match cons::length(&args[0]) {
        Some(n) => Ok(Val::Int(n as i32)),
        None => Err(LangError::type_error("length", "proper list", &args[0], 1).into()),
    }
}

pub fn prim_reverse(_ctx: &Context, args: &[Val]) -> Result<Val> {
    match cons::reverse(&args[0]) {
        Some(reversed) => Ok(reversed),
        None => Err(LangError::type_error("reverse", "proper list", &args[0], 1).into()),
    }
}

/// Concatenate lists. All but the last argument must be proper lists; the
/// last is shared as the tail of the result, so `(append '(1) 2)` is a
/// dotted list — this is what unquote-splicing relies on.
pub fn prim_append(_ctx: &Context, args: &[Val]) -> Result<Val> {
    match args.split_last() {
        None => Ok(Val::Nil),
        Some((last, init)) => {
            let mut elements = Vec::new();
            for (position, arg) in init.iter().enumerate() {
                let (items, tail) = cons::to_vec(arg);
                if !tail.is_nil() {
                    return Err(
                        LangError::type_error("append", "proper list", arg, position + 1).into(),
                    );
                }
                elements.extend(items);
            }
            Ok(cons::list_from_dotted(elements, last.clone()))
        }
    }
}

pub fn prim_list_p(_ctx: &Context, args: &[Val]) -> Result<Val> {
    Ok(Val::Bool(cons::is_proper_list(&args[0])))
}

/// Register all list primitives
pub fn register(registry: &mut Registry) {
    registry.add("cons", 2, Some(2), prim_cons);
    registry.add("first", 1, Some(1), prim_first);
    registry.add("rest", 1, Some(1), prim_rest);
    registry.add("set-first!", 2, Some(2), prim_set_first);
    registry.add("set-rest!", 2, Some(2), prim_set_rest);
    registry.add("list", 0, None, prim_list);
    registry.add("length", 1, Some(1), prim_length);
    registry.add("reverse", 1, Some(1), prim_reverse);
    registry.add("append", 0, None, prim_append);
    registry.add("list?", 1, Some(1), prim_list_p);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::Logger;

    fn ctx() -> Context {
        Context::new(false, Logger::quiet()).expect("context")
    }

    #[test]
    fn test_cons_first_rest() {
        let ctx = ctx();
        let pair = prim_cons(&ctx, &[Val::Int(1), Val::Int(2)]).unwrap();
        assert_eq!(pair.to_string(), "(1 . 2)");
        assert_eq!(prim_first(&ctx, &[pair.clone()]).unwrap(), Val::Int(1));
        assert_eq!(prim_rest(&ctx, &[pair]).unwrap(), Val::Int(2));
    }

    #[test]
    fn test_first_rest_of_nil() {
        let ctx = ctx();
        assert_eq!(prim_first(&ctx, &[Val::Nil]).unwrap(), Val::Nil);
        assert_eq!(prim_rest(&ctx, &[Val::Nil]).unwrap(), Val::Nil);
    }

    #[test]
    fn test_list_and_length() {
        let ctx = ctx();
        let list = prim_list(&ctx, &[Val::Int(1), Val::Int(2), Val::Int(3)]).unwrap();
        assert_eq!(prim_length(&ctx, &[list]).unwrap(), Val::Int(3));
        assert_eq!(prim_list(&ctx, &[]).unwrap(), Val::Nil);
    }

    #[test]
    fn test_length_of_dotted_list_fails() {
        let ctx = ctx();
        let dotted = prim_cons(&ctx, &[Val::Int(1), Val::Int(2)]).unwrap();
        assert!(prim_length(&ctx, &[dotted]).is_err());
    }

    #[test]
    fn test_append_shares_last_argument() {
        let ctx = ctx();
        let a = prim_list(&ctx, &[Val::Int(1), Val::Int(2)]).unwrap();
        let b = prim_list(&ctx, &[Val::Int(3)]).unwrap();
        let joined = prim_append(&ctx, &[a, b]).unwrap();
        assert_eq!(joined.to_string(), "(1 2 3)");

        assert_eq!(prim_append(&ctx, &[]).unwrap(), Val::Nil);
        let single = prim_append(&ctx, &[Val::Int(5)]).unwrap();
        assert_eq!(single, Val::Int(5));
    }

    #[test]
    fn test_mutation_primitives() {
        let ctx = ctx();
        let pair = prim_cons(&ctx, &[Val::Int(1), Val::Nil]).unwrap();
        prim_set_first(&ctx, &[pair.clone(), Val::Int(9)]).unwrap();
        prim_set_rest(&ctx, &[pair.clone(), Val::Int(8)]).unwrap();
        assert_eq!(pair.to_string(), "(9 . 8)");
    }

    #[test]
    fn test_list_predicate() {
        let ctx = ctx();
        assert_eq!(prim_list_p(&ctx, &[Val::Nil]).unwrap(), Val::Bool(true));
        let proper = prim_list(&ctx, &[Val::Int(1)]).unwrap();
        assert_eq!(prim_list_p(&ctx, &[proper]).unwrap(), Val::Bool(true));
        let dotted = prim_cons(&ctx, &[Val::Int(1), Val::Int(2)]).unwrap();
        assert_eq!(prim_list_p(&ctx, &[dotted]).unwrap(), Val::Bool(false));
        assert_eq!(prim_list_p(&ctx, &[Val::Int(1)]).unwrap(), Val::Bool(false));
    }
}
