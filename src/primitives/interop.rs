//! Host-object interop seam
//!
//! Host objects are opaque `[Native type value]` handles. The engine only
//! knows how to recognize them and read their type tag; actual member
//! dispatch is host-specific and lives with the embedder, which registers
//! its own primitives over the same registry.

use super::Registry;
use crate::context::Context;
use crate::error::{InteropError, Result};
use crate::value::{NativeObject, Val};
use std::rc::Rc;

fn native_arg<'a>(args: &'a [Val], function: &str) -> Result<&'a Rc<NativeObject>> {
    match &args[0] {
        Val::Native(obj) => Ok(obj),
        other => Err(InteropError::Reflection(format!(
            "{}: not a host object: {}",
            function, other
        ))
        .into()),
    }
}

pub fn prim_native_p(_ctx: &Context, args: &[Val]) -> Result<Val> {
    Ok(Val::Bool(matches!(&args[0], Val::Native(_))))
}

pub fn prim_native_type(_ctx: &Context, args: &[Val]) -> Result<Val> {
    let obj = native_arg(args, "native-type")?;
    Ok(Val::string(&obj.type_name))
}

pub fn prim_native_repr(_ctx: &Context, args: &[Val]) -> Result<Val> {
    let obj = native_arg(args, "native-repr")?;
    Ok(Val::string(&obj.repr))
}

/// Register the interop primitives
pub fn register(registry: &mut Registry) {
    registry.add("native?", 1, Some(1), prim_native_p);
    registry.add("native-type", 1, Some(1), prim_native_type);
    registry.add("native-repr", 1, Some(1), prim_native_repr);
}
