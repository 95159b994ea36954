// ABOUTME: Packages: interning tables, value bindings, macro tables, imports

use crate::symbol::Symbol;
use crate::value::{Closure, Val};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Name of the package holding the primitives.
pub const CORE: &str = "core";
/// Lookup prefix of the keywords package (`:foo` style symbols).
pub const KEYWORDS: &str = "";

/// A compile-time macro: a closure the compiler runs on the unevaluated
/// argument forms.
#[derive(Debug)]
pub struct Macro {
    pub name: Rc<Symbol>,
    pub args: Val,
    pub body: Rc<Closure>,
}

/// A namespace of symbols with value bindings, a macro table, and an
/// ordered import list.
#[derive(Debug)]
pub struct Package {
    name: Option<String>,
    symbols: HashMap<String, Rc<Symbol>>,
    bindings: HashMap<String, Val>,
    macros: HashMap<String, Rc<Macro>>,
    imports: Vec<Rc<RefCell<Package>>>,
}

impl Package {
    fn new(name: Option<String>) -> Rc<RefCell<Package>> {
        Rc::new(RefCell::new(Package {
            name,
            symbols: HashMap::new(),
            bindings: HashMap::new(),
            macros: HashMap::new(),
            imports: Vec::new(),
        }))
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn is_keywords(&self) -> bool {
        self.name() == Some(KEYWORDS)
    }

    /// Symbol interned in this package, ignoring imports.
    pub fn find_shallow(&self, name: &str) -> Option<Rc<Symbol>> {
        self.symbols.get(name).cloned()
    }

    pub fn add_import(&mut self, package: Rc<RefCell<Package>>) {
        self.imports.push(package);
    }

    pub fn get_value(&self, name: &str) -> Option<Val> {
        self.bindings.get(name).cloned()
    }

    /// Bind `name` in this package; a nil value deletes the binding.
    pub fn set_value(&mut self, name: &str, value: Val) {
        if value.is_nil() {
            self.bindings.remove(name);
        } else {
            self.bindings.insert(name.to_string(), value);
        }
    }

    pub fn get_macro(&self, name: &str) -> Option<Rc<Macro>> {
        self.macros.get(name).cloned()
    }

    pub fn set_macro(&mut self, name: &str, definition: Rc<Macro>) {
        self.macros.insert(name.to_string(), definition);
    }
}

/// Intern `name` in `package`, creating the symbol if needed. Interning into
/// the keywords package binds the symbol to itself and exports it, which is
/// what makes `:foo` self-evaluating.
pub fn intern(package: &Rc<RefCell<Package>>, name: &str) -> Rc<Symbol> {
    if let Some(existing) = package.borrow().find_shallow(name) {
        return existing;
    }
    let symbol = Symbol::new(name, Rc::downgrade(package));
    let mut pkg = package.borrow_mut();
    pkg.symbols.insert(name.to_string(), symbol.clone());
    if pkg.is_keywords() {
        symbol.set_exported(true);
        pkg.bindings
            .insert(name.to_string(), Val::Symbol(symbol.clone()));
    }
    symbol
}

/// Find `name` in `package`: shallow first, then the imports in order, where
/// only exported symbols are visible.
pub fn find(package: &Rc<RefCell<Package>>, name: &str) -> Option<Rc<Symbol>> {
    if let Some(symbol) = package.borrow().find_shallow(name) {
        return Some(symbol);
    }
    let imports = package.borrow().imports.clone();
    for import in imports {
        if let Some(symbol) = import.borrow().find_shallow(name) {
            if symbol.is_exported() {
                return Some(symbol);
            }
        }
    }
    None
}

/// Resolve `name` through imports, interning it here if unknown.
pub fn find_or_intern(package: &Rc<RefCell<Package>>, name: &str) -> Rc<Symbol> {
    find(package, name).unwrap_or_else(|| intern(package, name))
}

/// Value bound to `sym` in its home package, searching the home package's
/// imports for exported bindings.
pub fn symbol_value(sym: &Rc<Symbol>) -> Option<Val> {
    let home = sym.package()?;
    if let Some(value) = home.borrow().get_value(sym.name()) {
        return Some(value);
    }
    let imports = home.borrow().imports.clone();
    for import in imports {
        let imported = import.borrow();
        if let Some(owned) = imported.find_shallow(sym.name()) {
            if owned.is_exported() {
                if let Some(value) = imported.get_value(sym.name()) {
                    return Some(value);
                }
            }
        }
    }
    None
}

/// Write `value` to the binding for `sym` in its home package.
pub fn set_symbol_value(sym: &Rc<Symbol>, value: Val) {
    if let Some(home) = sym.package() {
        home.borrow_mut().set_value(sym.name(), value);
    }
}

/// Macro bound to `sym` in its home package.
pub fn symbol_macro(sym: &Rc<Symbol>) -> Option<Rc<Macro>> {
    sym.package()?.borrow().get_macro(sym.name())
}

/// The per-context package registry. Three packages exist at startup: core
/// (primitives), the unnamed global package (imports core), and the
/// keywords package (empty name).
#[derive(Debug)]
pub struct Packages {
    map: RefCell<HashMap<String, Rc<RefCell<Package>>>>,
    core: Rc<RefCell<Package>>,
    keywords: Rc<RefCell<Package>>,
    global: Rc<RefCell<Package>>,
    current: RefCell<Rc<RefCell<Package>>>,
}

impl Default for Packages {
    fn default() -> Self {
        Self::new()
    }
}

impl Packages {
    pub fn new() -> Self {
        let core = Package::new(Some(CORE.to_string()));
        let keywords = Package::new(Some(KEYWORDS.to_string()));
        let global = Package::new(None);
        global.borrow_mut().add_import(core.clone());

        let mut map = HashMap::new();
        map.insert(CORE.to_string(), core.clone());
        map.insert(KEYWORDS.to_string(), keywords.clone());

        Packages {
            map: RefCell::new(map),
            core,
            keywords,
            current: RefCell::new(global.clone()),
            global,
        }
    }

    pub fn find(&self, name: &str) -> Option<Rc<RefCell<Package>>> {
        self.map.borrow().get(name).cloned()
    }

    /// Find or create a named package; fresh packages import core.
    pub fn get_or_create(&self, name: &str) -> Rc<RefCell<Package>> {
        if let Some(existing) = self.find(name) {
            return existing;
        }
        let package = Package::new(Some(name.to_string()));
        package.borrow_mut().add_import(self.core());
        self.map
            .borrow_mut()
            .insert(name.to_string(), package.clone());
        package
    }

    pub fn core(&self) -> Rc<RefCell<Package>> {
        self.core.clone()
    }

    pub fn keywords(&self) -> Rc<RefCell<Package>> {
        self.keywords.clone()
    }

    pub fn global(&self) -> Rc<RefCell<Package>> {
        self.global.clone()
    }

    pub fn current(&self) -> Rc<RefCell<Package>> {
        self.current.borrow().clone()
    }

    pub fn set_current(&self, package: Rc<RefCell<Package>>) {
        *self.current.borrow_mut() = package;
    }
}
