//! Map primitives: immutable key→value maps

use super::Registry;
use crate::cons;
use crate::context::Context;
use crate::error::{LangError, Result};
use crate::value::{LispMap, Val};
use std::rc::Rc;

fn map_arg<'a>(function: &str, args: &'a [Val], position: usize) -> Result<&'a Rc<LispMap>> {
    match &args[position - 1] {
        Val::Map(m) => Ok(m),
        other => Err(LangError::type_error(function, "map", other, position).into()),
    }
}

pub fn prim_make_map(_ctx: &Context, args: &[Val]) -> Result<Val> {
    if args.len() % 2 != 0 {
        return Err(LangError::arity_error("make-map", "an even number of", args.len()).into());
    }
    let entries = args
        .chunks(2)
        .map(|pair| (pair[0].clone(), pair[1].clone()))
        .collect();
    Ok(Val::Map(Rc::new(LispMap::from_entries(entries))))
}

pub fn prim_map_get(_ctx: &Context, args: &[Val]) -> Result<Val> {
    let map = map_arg("map-get", args, 1)?;
    let fallback = args.get(2).cloned().unwrap_or(Val::Nil);
    Ok(map.get(&args[1]).cloned().unwrap_or(fallback))
}

pub fn prim_map_put(_ctx: &Context, args: &[Val]) -> Result<Val> {
    let map = map_arg("map-put", args, 1)?;
    Ok(Val::Map(Rc::new(map.put(args[1].clone(), args[2].clone()))))
}

pub fn prim_map_remove(_ctx: &Context, args: &[Val]) -> Result<Val> {
    let map = map_arg("map-remove", args, 1)?;
    Ok(Val::Map(Rc::new(map.remove(&args[1]))))
}

pub fn prim_map_count(_ctx: &Context, args: &[Val]) -> Result<Val> {
    let map = map_arg("map-count", args, 1)?;
    Ok(Val::Int(map.len() as i32))
}

pub fn prim_map_keys(_ctx: &Context, args: &[Val]) -> Result<Val> {
    let map = map_arg("map-keys", args, 1)?;
    Ok(cons::list_from(
        map.iter().map(|(k, _)| k.clone()).collect(),
    ))
}

pub fn prim_map_vals(_ctx: &Context, args: &[Val]) -> Result<Val> {
    let map = map_arg("map-vals", args, 1)?;
    Ok(cons::list_from(
        map.iter().map(|(_, v)| v.clone()).collect(),
    ))
}

/// Register all map primitives
pub fn register(registry: &mut Registry) {
    registry.add("make-map", 0, None, prim_make_map);
    registry.add("map-get", 2, Some(3), prim_map_get);
    registry.add("map-put", 3, Some(3), prim_map_put);
    registry.add("map-remove", 2, Some(2), prim_map_remove);
    registry.add("map-count", 1, Some(1), prim_map_count);
    registry.add("map-keys", 1, Some(1), prim_map_keys);
    registry.add("map-vals", 1, Some(1), prim_map_vals);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::Logger;

    fn ctx() -> Context {
        Context::new(false, Logger::quiet()).expect("context")
    }

    fn sample(ctx: &Context) -> Val {
        prim_make_map(
            ctx,
            &[
                Val::string("a"),
                Val::Int(1),
                Val::string("b"),
                Val::Int(2),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_make_map_requires_even_arguments() {
        let ctx = ctx();
        assert!(prim_make_map(&ctx, &[Val::Int(1)]).is_err());
        assert_eq!(prim_make_map(&ctx, &[]).unwrap().to_string(), "{}");
    }

    #[test]
    fn test_get_with_structural_keys() {
        let ctx = ctx();
        let map = sample(&ctx);
        // A freshly allocated string key still matches: map keys compare
        // structurally, not by identity.
        assert_eq!(
            prim_map_get(&ctx, &[map.clone(), Val::string("a")]).unwrap(),
            Val::Int(1)
        );
        assert_eq!(
            prim_map_get(&ctx, &[map.clone(), Val::string("z")]).unwrap(),
            Val::Nil
        );
        assert_eq!(
            prim_map_get(&ctx, &[map, Val::string("z"), Val::Int(42)]).unwrap(),
            Val::Int(42)
        );
    }

    #[test]
    fn test_put_is_persistent() {
        let ctx = ctx();
        let original = sample(&ctx);
        let updated =
            prim_map_put(&ctx, &[original.clone(), Val::string("a"), Val::Int(9)]).unwrap();
        assert_eq!(
            prim_map_get(&ctx, &[original, Val::string("a")]).unwrap(),
            Val::Int(1)
        );
        assert_eq!(
            prim_map_get(&ctx, &[updated, Val::string("a")]).unwrap(),
            Val::Int(9)
        );
    }

    #[test]
    fn test_remove_count_keys_vals() {
        let ctx = ctx();
        let map = sample(&ctx);
        assert_eq!(prim_map_count(&ctx, &[map.clone()]).unwrap(), Val::Int(2));

        let smaller = prim_map_remove(&ctx, &[map.clone(), Val::string("a")]).unwrap();
        assert_eq!(prim_map_count(&ctx, &[smaller]).unwrap(), Val::Int(1));

        assert_eq!(
            prim_map_keys(&ctx, &[map.clone()]).unwrap().to_string(),
            "(\"a\" \"b\")"
        );
        assert_eq!(prim_map_vals(&ctx, &[map]).unwrap().to_string(), "(1 2)");
    }
}
