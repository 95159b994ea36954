//! Vector primitives: mutable indexed sequences

use super::Registry;
use crate::cons;
use crate::context::Context;
use crate::error::{LangError, Result};
use crate::value::Val;
use std::cell::RefCell;
use std::rc::Rc;

fn vector_arg<'a>(
    function: &str,
    args: &'a [Val],
    position: usize,
) -> Result<&'a Rc<RefCell<Vec<Val>>>> {
    match &args[position - 1] {
        Val::Vector(v) => Ok(v),
        other => Err(LangError::type_error(function, "vector", other, position).into()),
    }
}

fn index_arg(function: &str, args: &[Val], position: usize) -> Result<usize> {
    match &args[position - 1] {
        Val::Int(n) if *n >= 0 => Ok(*n as usize),
        Val::Int64(n) if *n >= 0 => Ok(*n as usize),
        Val::UInt(n) => Ok(*n as usize),
        Val::UInt64(n) => Ok(*n as usize),
        other => {
            Err(LangError::type_error(function, "non-negative integer", other, position).into())
        }
    }
}

pub fn prim_vector(_ctx: &Context, args: &[Val]) -> Result<Val> {
    Ok(Val::Vector(Rc::new(RefCell::new(args.to_vec()))))
}

pub fn prim_make_vector(_ctx: &Context, args: &[Val]) -> Result<Val> {
    let size = index_arg("make-vector", args, 1)?;
    let fill = args.get(1).cloned().unwrap_or(Val::Nil);
    Ok(Val::Vector(Rc::new(RefCell::new(vec![fill; size]))))
}

pub fn prim_vector_length(_ctx: &Context, args: &[Val]) -> Result<Val> {
    let vector = vector_arg("vector-length", args, 1)?;
    Ok(Val::Int(vector.borrow().len() as i32))
}

pub fn prim_vector_get(_ctx: &Context, args: &[Val]) -> Result<Val> {
    let vector = vector_arg("vector-get", args, 1)?;
    let index = index_arg("vector-get", args, 2)?;
    let items = vector.borrow();
    items.get(index).cloned().ok_or_else(|| {
        LangError::IndexOutOfBounds {
            function: "vector-get".to_string(),
            index,
            length: items.len(),
        }
        .into()
    })
}

pub fn prim_vector_set(_ctx: &Context, args: &[Val]) -> Result<Val> {
    let vector = vector_arg("vector-set!", args, 1)?;
    let index = index_arg("vector-set!", args, 2)?;
    let mut items = vector.borrow_mut();
    let length = items.len();
    match items.get_mut(index) {
        Some(slot) => {
            *slot = args[2].clone();
            Ok(args[0].clone())
        }
        None => Err(LangError::IndexOutOfBounds {
            function: "vector-set!".to_string(),
            index,
            length,
        }
        .into()),
    }
}

pub fn prim_vector_push(_ctx: &Context, args: &[Val]) -> Result<Val> {
    let vector = vector_arg("vector-push!", args, 1)?;
    vector.borrow_mut().push(args[1].clone());
    Ok(args[0].clone())
}

pub fn prim_vector_to_list(_ctx: &Context, args: &[Val]) -> Result<Val> {
    let vector = vector_arg("vector->list", args, 1)?;
    Ok(cons::list_from(vector.borrow().clone()))
}

pub fn prim_list_to_vector(_ctx: &Context, args: &[Val]) -> Result<Val> {
    let (items, tail) = cons::to_vec(&args[0]);
    if !tail.is_nil() {
        return Err(LangError::type_error("list->vector", "proper list", &args[0], 1).into());
    }
    Ok(Val::Vector(Rc::new(RefCell::new(items))))
}

/// Register all vector primitives
pub fn register(registry: &mut Registry) {
    registry.add("vector", 0, None, prim_vector);
    registry.add("make-vector", 1, Some(2), prim_make_vector);
    registry.add("vector-length", 1, Some(1), prim_vector_length);
    registry.add("vector-get", 2, Some(2), prim_vector_get);
    registry.add("vector-set!", 3, Some(3), prim_vector_set);
    registry.add("vector-push!", 2, Some(2), prim_vector_push);
    registry.add("vector->list", 1, Some(1), prim_vector_to_list);
    registry.add("list->vector", 1, Some(1), prim_list_to_vector);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::Logger;

    fn ctx() -> Context {
        Context::new(false, Logger::quiet()).expect("context")
    }

    #[test]
    fn test_vector_construction_and_display() {
        let ctx = ctx();
        let v = prim_vector(&ctx, &[Val::Int(1), Val::Int(2)]).unwrap();
        assert_eq!(v.to_string(), "[Vector 1 2]");
        assert_eq!(prim_vector_length(&ctx, &[v]).unwrap(), Val::Int(2));
    }

    #[test]
    fn test_make_vector_with_fill() {
        let ctx = ctx();
        let v = prim_make_vector(&ctx, &[Val::Int(3), Val::Int(7)]).unwrap();
        assert_eq!(v.to_string(), "[Vector 7 7 7]");
        let empty_fill = prim_make_vector(&ctx, &[Val::Int(2)]).unwrap();
        assert_eq!(empty_fill.to_string(), "[Vector () ()]");
    }

    #[test]
    fn test_get_set_and_bounds() {
        let ctx = ctx();
        let v = prim_vector(&ctx, &[Val::Int(1), Val::Int(2)]).unwrap();
        assert_eq!(
            prim_vector_get(&ctx, &[v.clone(), Val::Int(1)]).unwrap(),
            Val::Int(2)
        );
        prim_vector_set(&ctx, &[v.clone(), Val::Int(0), Val::Int(9)]).unwrap();
        assert_eq!(v.to_string(), "[Vector 9 2]");
        assert!(prim_vector_get(&ctx, &[v, Val::Int(5)]).is_err());
    }

    #[test]
    fn test_push_mutates_in_place() {
        let ctx = ctx();
        let v = prim_vector(&ctx, &[Val::Int(1)]).unwrap();
        prim_vector_push(&ctx, &[v.clone(), Val::Int(2)]).unwrap();
        assert_eq!(v.to_string(), "[Vector 1 2]");
    }

    #[test]
    fn test_list_conversions() {
        let ctx = ctx();
        let list = cons::list_from(vec![Val::Int(1), Val::Int(2)]);
        let v = prim_list_to_vector(&ctx, &[list]).unwrap();
        assert_eq!(v.to_string(), "[Vector 1 2]");
        let back = prim_vector_to_list(&ctx, &[v]).unwrap();
        assert_eq!(back.to_string(), "(1 2)");
    }
}
