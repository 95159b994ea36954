//! # Primitives
//!
//! Built-in functions registered in the `core` package, organized by
//! category. Each category module has a `register` function that adds its
//! entries to the registry.
//!
//! - **[arithmetic]**: `+ - * / %` with numeric promotion
//! - **[comparison]**: `= /= < <= > >= eq? equal? not`
//! - **[lists]**: `cons first rest set-first! set-rest! list length reverse append list?`
//! - **[vectors]**: construction, indexed access, conversion
//! - **[maps]**: immutable key→value maps
//! - **[types]**: type predicates and symbol accessors
//! - **[core_ops]**: `eval`, `macroexpand`, `apply`, `error`, `gensym`, printing
//! - **[packages]**: package creation, current package, exports
//! - **[interop]**: opaque host-object operations
//!
//! Primitives are called two ways: the compiler emits `CALL_PRIMOP name argc`
//! directly when the head of a call resolves to an unshadowed core binding
//! with a matching arity, and every primitive is also bound in `core` to a
//! closure stub whose body is a dynamic-count `CALL_PRIMOP`, which makes it
//! first-class.

use crate::context::Context;
use crate::error::Result;
use crate::value::Val;
use std::collections::HashMap;

pub mod arithmetic;
pub mod comparison;
pub mod core_ops;
pub mod interop;
pub mod lists;
pub mod maps;
pub mod packages;
pub mod types;
pub mod vectors;

pub type PrimFn = fn(&Context, &[Val]) -> Result<Val>;

/// A registered built-in function with its accepted argument counts.
pub struct Primitive {
    pub name: &'static str,
    pub min: usize,
    pub max: Option<usize>,
    pub func: PrimFn,
}

impl Primitive {
    pub fn accepts(&self, argc: usize) -> bool {
        argc >= self.min && self.max.map(|max| argc <= max).unwrap_or(true)
    }

    pub fn arity_text(&self) -> String {
        match self.max {
            Some(max) if max == self.min => max.to_string(),
            Some(max) => format!("{}-{}", self.min, max),
            None if self.min == 0 => "any number of".to_string(),
            None => format!("at least {}", self.min),
        }
    }
}

impl std::fmt::Debug for Primitive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Primitive")
            .field("name", &self.name)
            .field("min", &self.min)
            .field("max", &self.max)
            .finish()
    }
}

/// Per-context registry of primitives, keyed by name.
#[derive(Debug, Default)]
pub struct Registry {
    map: HashMap<&'static str, Primitive>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    pub fn add(&mut self, name: &'static str, min: usize, max: Option<usize>, func: PrimFn) {
        self.map.insert(
            name,
            Primitive {
                name,
                min,
                max,
                func,
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<&Primitive> {
        self.map.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Primitive> {
        self.map.values()
    }
}

/// Registry with every built-in category registered.
pub fn default_registry() -> Registry {
    let mut registry = Registry::new();
    arithmetic::register(&mut registry);
    comparison::register(&mut registry);
    lists::register(&mut registry);
    vectors::register(&mut registry);
    maps::register(&mut registry);
    types::register(&mut registry);
    core_ops::register(&mut registry);
    packages::register(&mut registry);
    interop::register(&mut registry);
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arity_text() {
        let exact = Primitive {
            name: "cons",
            min: 2,
            max: Some(2),
            func: |_, _| Ok(Val::Nil),
        };
        assert_eq!(exact.arity_text(), "2");
        assert!(exact.accepts(2));
        assert!(!exact.accepts(1));

        let range = Primitive {
            name: "map-get",
            min: 2,
            max: Some(3),
            func: |_, _| Ok(Val::Nil),
        };
        assert_eq!(range.arity_text(), "2-3");

        let open = Primitive {
            name: "-",
            min: 1,
            max: None,
            func: |_, _| Ok(Val::Nil),
        };
        assert_eq!(open.arity_text(), "at least 1");
        assert!(open.accepts(100));
    }

    #[test]
    fn test_default_registry_covers_core_names() {
        let registry = default_registry();
        for name in ["+", "cons", "list", "append", "eval", "macroexpand-1"] {
            assert!(registry.get(name).is_some(), "missing primitive {}", name);
        }
    }
}
