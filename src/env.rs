// ABOUTME: Chained fixed-width frames binding lexical variables to slots

use crate::error::LangError;
use crate::symbol::Symbol;
use crate::value::Val;
use std::cell::RefCell;
use std::rc::Rc;

/// Coordinates of a lexical variable: `frame` parent hops from the current
/// frame, then `slot` within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VarPos {
    pub frame: usize,
    pub slot: usize,
}

/// One frame of lexical scope: parallel `symbols`/`values` arrays plus a
/// parent pointer. Symbol names are compile-time metadata only; runtime
/// access goes through `VarPos` coordinates.
#[derive(Debug)]
pub struct Environment {
    symbols: Vec<Rc<Symbol>>,
    values: RefCell<Vec<Val>>,
    parent: Option<Rc<Environment>>,
}

impl Environment {
    /// Compile-time frame carrying the declared symbols.
    pub fn with_symbols(symbols: Vec<Rc<Symbol>>, parent: Option<Rc<Environment>>) -> Rc<Self> {
        let values = vec![Val::Nil; symbols.len()];
        Rc::new(Environment {
            symbols,
            values: RefCell::new(values),
            parent,
        })
    }

    /// Runtime frame of `size` nil slots.
    pub fn with_size(size: usize, parent: Option<Rc<Environment>>) -> Rc<Self> {
        Rc::new(Environment {
            symbols: Vec::new(),
            values: RefCell::new(vec![Val::Nil; size]),
            parent,
        })
    }

    pub fn parent(&self) -> Option<&Rc<Environment>> {
        self.parent.as_ref()
    }

    pub fn size(&self) -> usize {
        self.values.borrow().len()
    }

    fn frame_at(&self, frame: usize) -> Option<&Environment> {
        let mut current = self;
        for _ in 0..frame {
            current = current.parent.as_deref()?;
        }
        Some(current)
    }

    pub fn get(&self, pos: VarPos) -> Result<Val, LangError> {
        self.frame_at(pos.frame)
            .and_then(|frame| frame.values.borrow().get(pos.slot).cloned())
            .ok_or(LangError::InvalidVarPos {
                frame: pos.frame,
                slot: pos.slot,
            })
    }

    pub fn set(&self, pos: VarPos, value: Val) -> Result<(), LangError> {
        let frame = self.frame_at(pos.frame).ok_or(LangError::InvalidVarPos {
            frame: pos.frame,
            slot: pos.slot,
        })?;
        let mut values = frame.values.borrow_mut();
        match values.get_mut(pos.slot) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(LangError::InvalidVarPos {
                frame: pos.frame,
                slot: pos.slot,
            }),
        }
    }

    /// The declared symbol at `pos`, if this is a compile-time frame.
    pub fn symbol_at(&self, pos: VarPos) -> Option<Rc<Symbol>> {
        self.frame_at(pos.frame)
            .and_then(|frame| frame.symbols.get(pos.slot).cloned())
    }

    /// Compile-time lookup: walk the frame chain for `sym` by identity.
    pub fn lookup(&self, sym: &Rc<Symbol>) -> Option<VarPos> {
        let mut current = Some(self);
        let mut frame = 0;
        while let Some(env) = current {
            for (slot, bound) in env.symbols.iter().enumerate() {
                if Rc::ptr_eq(bound, sym) {
                    return Some(VarPos { frame, slot });
                }
            }
            current = env.parent.as_deref();
            frame += 1;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::Symbol;

    fn syms(names: &[&str]) -> Vec<Rc<Symbol>> {
        names.iter().map(|n| Symbol::uninterned(*n)).collect()
    }

    #[test]
    fn test_lookup_in_own_frame() {
        let symbols = syms(&["a", "b"]);
        let b = symbols[1].clone();
        let env = Environment::with_symbols(symbols, None);

        let pos = env.lookup(&b).expect("b is bound");
        assert_eq!(pos, VarPos { frame: 0, slot: 1 });
        assert!(Rc::ptr_eq(&env.symbol_at(pos).unwrap(), &b));
    }

    #[test]
    fn test_lookup_walks_parents() {
        let outer_syms = syms(&["x"]);
        let x = outer_syms[0].clone();
        let outer = Environment::with_symbols(outer_syms, None);
        let inner = Environment::with_symbols(syms(&["y"]), Some(outer));

        let pos = inner.lookup(&x).expect("x visible from inner");
        assert_eq!(pos, VarPos { frame: 1, slot: 0 });
        assert!(Rc::ptr_eq(&inner.symbol_at(pos).unwrap(), &x));
    }

    #[test]
    fn test_shadowing_picks_nearest_frame() {
        let outer_syms = syms(&["x"]);
        let outer = Environment::with_symbols(outer_syms, None);
        let inner_syms = syms(&["x"]);
        let inner_x = inner_syms[0].clone();
        let inner = Environment::with_symbols(inner_syms, Some(outer));

        let pos = inner.lookup(&inner_x).expect("inner x");
        assert_eq!(pos, VarPos { frame: 0, slot: 0 });
    }

    #[test]
    fn test_get_and_set_by_coordinates() {
        let env = Environment::with_size(2, None);
        let pos = VarPos { frame: 0, slot: 1 };
        env.set(pos, Val::Int(7)).unwrap();
        assert_eq!(env.get(pos).unwrap(), Val::Int(7));
    }

    #[test]
    fn test_set_through_parent_is_shared() {
        let outer = Environment::with_size(1, None);
        let inner = Environment::with_size(0, Some(outer.clone()));

        inner
            .set(VarPos { frame: 1, slot: 0 }, Val::Int(3))
            .unwrap();
        assert_eq!(outer.get(VarPos { frame: 0, slot: 0 }).unwrap(), Val::Int(3));
    }

    #[test]
    fn test_invalid_coordinates() {
        let env = Environment::with_size(1, None);
        assert!(matches!(
            env.get(VarPos { frame: 0, slot: 5 }),
            Err(LangError::InvalidVarPos { .. })
        ));
        assert!(matches!(
            env.get(VarPos { frame: 3, slot: 0 }),
            Err(LangError::InvalidVarPos { .. })
        ));
    }
}
