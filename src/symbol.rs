// ABOUTME: Interned symbols tied to their home package

use crate::package::Package;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

/// An interned identifier. Two symbols with the same name and package are
/// the same `Rc`; comparison is by reference. The back-reference to the home
/// package is weak so package → symbol → package cycles do not leak.
#[derive(Debug)]
pub struct Symbol {
    name: String,
    package: Weak<RefCell<Package>>,
    exported: Cell<bool>,
}

impl Symbol {
    pub fn new(name: impl Into<String>, package: Weak<RefCell<Package>>) -> Rc<Symbol> {
        Rc::new(Symbol {
            name: name.into(),
            package,
            exported: Cell::new(false),
        })
    }

    /// An uninterned symbol with no home package (gensym).
    pub fn uninterned(name: impl Into<String>) -> Rc<Symbol> {
        Symbol::new(name, Weak::new())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn package(&self) -> Option<Rc<RefCell<Package>>> {
        self.package.upgrade()
    }

    pub fn is_exported(&self) -> bool {
        self.exported.get()
    }

    pub fn set_exported(&self, exported: bool) {
        self.exported.set(exported);
    }

    /// `package_name:name`, or just `name` for the unnamed global package
    /// and for uninterned symbols. Keyword symbols render as `:name`.
    pub fn qualified_name(&self) -> String {
        match self.package() {
            Some(pkg) => match pkg.borrow().name() {
                None => self.name.clone(),
                Some("") => format!(":{}", self.name),
                Some(pkg_name) => format!("{}:{}", pkg_name, self.name),
            },
            None => self.name.clone(),
        }
    }

    /// The form the printer uses: symbols visible from the default package
    /// (global and core) print short, keywords as `:name`, the rest fully
    /// qualified.
    pub fn printed_name(&self) -> String {
        match self.package() {
            Some(pkg) => match pkg.borrow().name() {
                None | Some(crate::package::CORE) => self.name.clone(),
                Some("") => format!(":{}", self.name),
                Some(pkg_name) => format!("{}:{}", pkg_name, self.name),
            },
            None => self.name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uninterned_symbol_prints_short() {
        let sym = Symbol::uninterned("g1");
        assert_eq!(sym.name(), "g1");
        assert_eq!(sym.qualified_name(), "g1");
        assert!(sym.package().is_none());
    }

    #[test]
    fn test_exported_flag() {
        let sym = Symbol::uninterned("x");
        assert!(!sym.is_exported());
        sym.set_exported(true);
        assert!(sym.is_exported());
    }
}
