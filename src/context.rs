// ABOUTME: Context: packages, code arena, primitives, parser, and logging

use crate::code::{CodeArena, CodeHandle, Instr, Opcode};
use crate::compiler::Compiler;
use crate::error::Result;
use crate::logger::Logger;
use crate::package::{self, Packages};
use crate::parser::Parser;
use crate::primitives::{default_registry, Registry};
use crate::symbol::Symbol;
use crate::value::{Closure, Val};
use crate::vm;
use std::cell::{Cell, Ref, RefCell, RefMut};
use std::rc::Rc;
use std::time::{Duration, Instant};

/// The reserved special-form symbols, interned once in the global package
/// so the compiler can dispatch on reference identity.
#[derive(Debug)]
pub struct Reserved {
    pub quote: Rc<Symbol>,
    pub begin: Rc<Symbol>,
    pub set: Rc<Symbol>,
    pub if_: Rc<Symbol>,
    pub if_star: Rc<Symbol>,
    pub while_: Rc<Symbol>,
    pub lambda: Rc<Symbol>,
    pub defmacro: Rc<Symbol>,
    pub dot: Rc<Symbol>,
}

impl Reserved {
    fn intern(packages: &Packages) -> Reserved {
        let global = packages.global();
        Reserved {
            quote: package::intern(&global, "quote"),
            begin: package::intern(&global, "begin"),
            set: package::intern(&global, "set!"),
            if_: package::intern(&global, "if"),
            if_star: package::intern(&global, "if*"),
            while_: package::intern(&global, "while"),
            lambda: package::intern(&global, "lambda"),
            defmacro: package::intern(&global, "defmacro"),
            dot: package::intern(&global, "."),
        }
    }
}

/// Result of evaluating one expression from a source string.
#[derive(Debug)]
pub struct EvalOutcome {
    /// The expression as read.
    pub input: Val,
    /// Code blocks this expression's compilation added to the arena.
    pub blocks: Vec<CodeHandle>,
    pub value: Val,
    pub elapsed: Duration,
}

/// Everything one engine instance owns: the package registry, the code
/// arena, the primitive registry, the parser buffer, and the logger. All
/// state is per-context; nothing is process-global. A context is strictly
/// single-threaded and runs one machine call at a time (macro expansion
/// nests a second call on the host stack).
#[derive(Debug)]
pub struct Context {
    packages: Packages,
    code: RefCell<CodeArena>,
    primitives: Registry,
    logger: RefCell<Logger>,
    parser: RefCell<Parser>,
    reserved: Reserved,
    gensym_counter: Cell<u64>,
}

impl Context {
    /// Build a context: construct packages, register primitives in `core`,
    /// and optionally load the bundled library through the normal pipeline.
    pub fn new(load_std_libs: bool, logger: Logger) -> Result<Context> {
        let packages = Packages::new();
        let reserved = Reserved::intern(&packages);
        let ctx = Context {
            packages,
            code: RefCell::new(CodeArena::new()),
            primitives: default_registry(),
            logger: RefCell::new(logger),
            parser: RefCell::new(Parser::new()),
            reserved,
            gensym_counter: Cell::new(0),
        };
        ctx.install_primitives();
        if load_std_libs {
            ctx.load_stdlib()?;
        }
        Ok(ctx)
    }

    /// Bind every registered primitive in `core` as an exported closure
    /// stub. The stub body is a dynamic-count CALL_PRIMOP, so primitives
    /// are first-class and work through the ordinary call path.
    fn install_primitives(&self) {
        let core = self.packages.core();
        for prim in self.primitives.iter() {
            let sym = package::intern(&core, prim.name);
            sym.set_exported(true);

            let stub = vec![
                Instr::with_ab(Opcode::CallPrimop, Val::string(prim.name), Val::Nil),
                Instr::new(Opcode::Return),
            ];
            let handle = self
                .code
                .borrow_mut()
                .add(stub, format!("primitive {}", prim.name));
            let closure = Rc::new(Closure::new(handle, None, Val::Nil));
            *closure.name.borrow_mut() = Some(prim.name.to_string());
            package::set_symbol_value(&sym, Val::Closure(closure));
        }
    }

    /// The bundled library defines the derived forms. It is loaded with the
    /// current package set to core so its definitions land there; the
    /// library exports what it wants visible.
    fn load_stdlib(&self) -> Result<()> {
        let previous = self.packages.current();
        self.packages.set_current(self.packages.core());
        let result = self.load_source(include_str!("stdlib/core.lisp"));
        self.packages.set_current(previous);
        result
    }

    /// Run source through the pipeline without touching the main parser
    /// buffer or collecting outcomes.
    pub fn load_source(&self, src: &str) -> Result<()> {
        let mut parser = Parser::new();
        parser.add_string(src);
        while let Some(expr) = parser.parse_next(&self.packages)? {
            let unit = Compiler::new(self).compile(&expr)?;
            vm::execute(self, unit.closure, &[])?;
        }
        Ok(())
    }

    /// Append `src` to the parser buffer, then compile and execute every
    /// complete expression in it. An error aborts the current expression
    /// (side effects of earlier ones remain) but leaves the context usable.
    pub fn compile_and_execute(&self, src: &str) -> Result<Vec<EvalOutcome>> {
        self.parser.borrow_mut().add_string(src);
        let mut outcomes = Vec::new();
        loop {
            let next = self.parser.borrow_mut().parse_next(&self.packages)?;
            let Some(expr) = next else {
                return Ok(outcomes);
            };
            {
                let logger = self.logger.borrow();
                if logger.parsing {
                    logger.log(&format!("parsed: {}", expr));
                }
            }

            let unit = Compiler::new(self).compile(&expr)?;
            {
                let logger = self.logger.borrow();
                if logger.instructions {
                    for handle in &unit.blocks {
                        logger.log(&self.code.borrow().disassemble(*handle));
                    }
                }
            }

            let start = Instant::now();
            let value = vm::execute(self, unit.closure.clone(), &[])?;
            outcomes.push(EvalOutcome {
                input: expr,
                blocks: unit.blocks,
                value,
                elapsed: start.elapsed(),
            });
        }
    }

    pub fn packages(&self) -> &Packages {
        &self.packages
    }

    pub fn code(&self) -> Ref<'_, CodeArena> {
        self.code.borrow()
    }

    pub fn code_mut(&self) -> RefMut<'_, CodeArena> {
        self.code.borrow_mut()
    }

    pub fn primitives(&self) -> &Registry {
        &self.primitives
    }

    pub fn logger(&self) -> Ref<'_, Logger> {
        self.logger.borrow()
    }

    pub fn logger_mut(&self) -> RefMut<'_, Logger> {
        self.logger.borrow_mut()
    }

    pub fn reserved(&self) -> &Reserved {
        &self.reserved
    }

    /// Fresh uninterned symbol; unique by identity and by name within this
    /// context.
    pub fn gensym(&self, prefix: &str) -> Rc<Symbol> {
        let n = self.gensym_counter.get() + 1;
        self.gensym_counter.set(n);
        Symbol::uninterned(format!("{}{}", prefix, n))
    }

    /// Sink for the print primitives.
    pub fn write_output(&self, text: &str, newline: bool) {
        if newline {
            println!("{}", text);
        } else {
            print!("{}", text);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn ctx() -> Context {
        Context::new(false, Logger::quiet()).expect("context")
    }

    fn eval_last(ctx: &Context, src: &str) -> Val {
        ctx.compile_and_execute(src)
            .expect("evaluation")
            .pop()
            .expect("at least one expression")
            .value
    }

    #[test]
    fn test_compile_and_execute_collects_outcomes() {
        let ctx = ctx();
        let outcomes = ctx.compile_and_execute("(+ 1 2) (+ 3 4)").unwrap();
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].value, Val::Int(3));
        assert_eq!(outcomes[1].value, Val::Int(7));
        assert_eq!(outcomes[0].input.to_string(), "(+ 1 2)");
        assert!(!outcomes[0].blocks.is_empty());
    }

    #[test]
    fn test_incomplete_input_spans_calls() {
        let ctx = ctx();
        assert!(ctx.compile_and_execute("(+ 1").unwrap().is_empty());
        let outcomes = ctx.compile_and_execute(" 2)").unwrap();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].value, Val::Int(3));
    }

    #[test]
    fn test_error_leaves_context_usable() {
        let ctx = ctx();
        assert!(matches!(
            ctx.compile_and_execute("(error \"boom\")"),
            Err(Error::Runtime(_))
        ));
        assert_eq!(eval_last(&ctx, "(+ 1 1)"), Val::Int(2));
    }

    #[test]
    fn test_side_effects_before_error_remain() {
        let ctx = ctx();
        let result = ctx.compile_and_execute("(set! x 1) (error \"boom\") (set! x 2)");
        assert!(result.is_err());
        assert_eq!(eval_last(&ctx, "x"), Val::Int(1));
    }

    #[test]
    fn test_every_compiled_handle_is_live_in_arena() {
        let ctx = ctx();
        let outcomes = ctx
            .compile_and_execute("(lambda (x) x) (+ 1 2)")
            .unwrap();
        for outcome in &outcomes {
            for handle in &outcome.blocks {
                assert!(handle.is_valid());
                assert!(ctx.code().get(*handle).is_some());
            }
        }
    }

    #[test]
    fn test_stdlib_loads_through_pipeline() {
        let ctx = Context::new(true, Logger::quiet()).expect("context with stdlib");
        assert_eq!(eval_last(&ctx, "(map (lambda (x) (* x 2)) '(1 2 3))").to_string(), "(2 4 6)");
        assert_eq!(
            eval_last(&ctx, "(let ((a 1) (b 2)) (+ a b))"),
            Val::Int(3)
        );
    }
}
