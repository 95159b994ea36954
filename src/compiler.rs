// ABOUTME: Compiler: s-expressions to instruction blocks, with macro expansion

use crate::code::{CodeHandle, Instr, Opcode};
use crate::cons;
use crate::context::Context;
use crate::env::Environment;
use crate::error::{CompileError, Result};
use crate::package::{self, Macro};
use crate::symbol::Symbol;
use crate::value::{Closure, Val};
use crate::vm;
use std::collections::HashMap;
use std::rc::Rc;

type CompileEnv = Option<Rc<Environment>>;

/// Result of compiling one top-level expression: a zero-argument closure
/// wrapping it, plus the handles of every code block the compilation added.
#[derive(Debug)]
pub struct CompiledUnit {
    pub closure: Rc<Closure>,
    pub blocks: Vec<CodeHandle>,
}

/// Translates expressions into instructions.
///
/// Two booleans thread through every sub-expression: `used` (false when the
/// value will be discarded, in which case constants and variable references
/// compile to nothing) and `more` (false in tail position, where every
/// value-producing form is followed by RETURN). Macros run on the machine
/// mid-compilation, so the compiler and the machine recurse into each other
/// through the shared context.
pub struct Compiler<'ctx> {
    ctx: &'ctx Context,
    labels: usize,
    new_blocks: Vec<CodeHandle>,
}

impl<'ctx> Compiler<'ctx> {
    pub fn new(ctx: &'ctx Context) -> Self {
        Compiler {
            ctx,
            labels: 0,
            new_blocks: Vec::new(),
        }
    }

    /// Compile `expr` as the body of a synthetic zero-argument lambda.
    pub fn compile(&mut self, expr: &Val) -> Result<CompiledUnit> {
        let closure =
            self.lambda_template(&Val::Nil, std::slice::from_ref(expr), &None, None, expr)?;
        Ok(CompiledUnit {
            closure,
            blocks: std::mem::take(&mut self.new_blocks),
        })
    }

    /// One macro expansion step; the bool reports whether anything happened.
    pub fn macroexpand_1(&mut self, expr: &Val) -> Result<(Val, bool)> {
        if let Val::Cons(cell) = expr {
            if let Val::Symbol(sym) = cell.first() {
                if let Some(makro) = package::symbol_macro(&sym) {
                    let (args, _) = cons::to_vec(&cell.rest());
                    let expanded = self.expand_macro(&makro, &args, &sym)?;
                    return Ok((expanded, true));
                }
            }
        }
        Ok((expr.clone(), false))
    }

    /// Expand the head until it is no longer a macro call, then recurse into
    /// each element of the resulting list.
    pub fn macroexpand_full(&mut self, expr: &Val) -> Result<Val> {
        let mut current = expr.clone();
        loop {
            let (next, expanded) = self.macroexpand_1(&current)?;
            current = next;
            if !expanded {
                break;
            }
        }
        if let Val::Cons(_) = &current {
            let (items, tail) = cons::to_vec(&current);
            let mut expanded = Vec::with_capacity(items.len());
            for item in &items {
                expanded.push(self.macroexpand_full(item)?);
            }
            current = cons::list_from_dotted(expanded, tail);
        }
        Ok(current)
    }

    fn new_label(&mut self) -> String {
        self.labels += 1;
        format!("L{}", self.labels)
    }

    fn expand_macro(&mut self, makro: &Rc<Macro>, args: &[Val], sym: &Rc<Symbol>) -> Result<Val> {
        vm::execute(self.ctx, makro.body.clone(), args).map_err(|e| {
            CompileError::MacroExpansion {
                name: sym.name().to_string(),
                message: e.to_string(),
            }
            .into()
        })
    }

    // ========================================================================
    // Expression dispatch
    // ========================================================================

    fn compile_expr(
        &mut self,
        expr: &Val,
        env: &CompileEnv,
        used: bool,
        more: bool,
        out: &mut Vec<Instr>,
    ) -> Result<()> {
        match expr {
            Val::Symbol(sym) => {
                self.compile_variable(sym, env, used, more, out);
                Ok(())
            }
            Val::Cons(_) => self.compile_form(expr, env, used, more, out),
            _ => {
                self.compile_constant(expr, used, more, out);
                Ok(())
            }
        }
    }

    fn compile_constant(&mut self, value: &Val, used: bool, more: bool, out: &mut Vec<Instr>) {
        if !used {
            return;
        }
        out.push(Instr::with_a(Opcode::PushConst, value.clone()));
        if !more {
            out.push(Instr::new(Opcode::Return));
        }
    }

    fn compile_variable(
        &mut self,
        sym: &Rc<Symbol>,
        env: &CompileEnv,
        used: bool,
        more: bool,
        out: &mut Vec<Instr>,
    ) {
        if !used {
            return;
        }
        match lookup(env, sym) {
            Some(pos) => out.push(
                Instr::with_ab(
                    Opcode::LocalGet,
                    Val::Int(pos.frame as i32),
                    Val::Int(pos.slot as i32),
                )
                .text(sym.name()),
            ),
            None => out.push(Instr::with_a(Opcode::GlobalGet, Val::Symbol(sym.clone()))),
        }
        if !more {
            out.push(Instr::new(Opcode::Return));
        }
    }

    fn compile_form(
        &mut self,
        expr: &Val,
        env: &CompileEnv,
        used: bool,
        more: bool,
        out: &mut Vec<Instr>,
    ) -> Result<()> {
        let (items, tail) = cons::to_vec(expr);
        if !tail.is_nil() {
            return Err(CompileError::NotCallable(expr.to_string()).into());
        }

        if let Val::Symbol(sym) = &items[0] {
            // Macros win over special forms.
            if let Some(makro) = package::symbol_macro(sym) {
                let expansion = self.expand_macro(&makro, &items[1..], sym)?;
                return self.compile_expr(&expansion, env, used, more, out);
            }

            let reserved = self.ctx.reserved();
            if Rc::ptr_eq(sym, &reserved.quote) {
                return self.compile_quote(&items, used, more, out);
            }
            if Rc::ptr_eq(sym, &reserved.begin) {
                return self.compile_begin(&items[1..], env, used, more, out);
            }
            if Rc::ptr_eq(sym, &reserved.set) {
                return self.compile_set(&items, env, used, more, out);
            }
            if Rc::ptr_eq(sym, &reserved.if_) {
                return self.compile_if(&items, env, used, more, out);
            }
            if Rc::ptr_eq(sym, &reserved.if_star) {
                return self.compile_if_star(&items, env, used, more, out);
            }
            if Rc::ptr_eq(sym, &reserved.while_) {
                return self.compile_while(&items, env, used, more, out);
            }
            if Rc::ptr_eq(sym, &reserved.lambda) {
                if items.len() < 2 {
                    return Err(arity("lambda", "at least 1", items.len() - 1));
                }
                return self.compile_lambda(&items[1], &items[2..], env, used, more, None, out);
            }
            if Rc::ptr_eq(sym, &reserved.defmacro) {
                return self.compile_defmacro(expr, &items, env, used, more, out);
            }
        }

        self.compile_call(&items, env, used, more, out)
    }

    // ========================================================================
    // Special forms
    // ========================================================================

    fn compile_quote(
        &mut self,
        items: &[Val],
        used: bool,
        more: bool,
        out: &mut Vec<Instr>,
    ) -> Result<()> {
        if items.len() != 2 {
            return Err(arity("quote", "1", items.len() - 1));
        }
        self.compile_constant(&items[1], used, more, out);
        Ok(())
    }

    fn compile_begin(
        &mut self,
        forms: &[Val],
        env: &CompileEnv,
        used: bool,
        more: bool,
        out: &mut Vec<Instr>,
    ) -> Result<()> {
        match forms.split_last() {
            None => {
                self.compile_constant(&Val::Nil, used, more, out);
                Ok(())
            }
            Some((last, preceding)) => {
                for form in preceding {
                    self.compile_expr(form, env, false, true, out)?;
                }
                self.compile_expr(last, env, used, more, out)
            }
        }
    }

    fn compile_set(
        &mut self,
        items: &[Val],
        env: &CompileEnv,
        used: bool,
        more: bool,
        out: &mut Vec<Instr>,
    ) -> Result<()> {
        if items.len() != 3 {
            return Err(arity("set!", "2", items.len() - 1));
        }
        let sym = items[1]
            .as_symbol()
            .ok_or_else(|| CompileError::InvalidSetTarget(items[1].to_string()))?
            .clone();

        // Name the closure when the value is a literal lambda so it prints
        // as [Closure/name].
        match self.as_lambda_form(&items[2]) {
            Some((args, body)) => self.compile_lambda(
                &args,
                &body,
                env,
                true,
                true,
                Some(sym.name().to_string()),
                out,
            )?,
            None => self.compile_expr(&items[2], env, true, true, out)?,
        }

        match lookup(env, &sym) {
            Some(pos) => out.push(
                Instr::with_ab(
                    Opcode::LocalSet,
                    Val::Int(pos.frame as i32),
                    Val::Int(pos.slot as i32),
                )
                .text(sym.name()),
            ),
            None => out.push(Instr::with_a(Opcode::GlobalSet, Val::Symbol(sym.clone()))),
        }
        if !used {
            out.push(Instr::new(Opcode::Pop));
        }
        if !more {
            out.push(Instr::new(Opcode::Return));
        }
        Ok(())
    }

    fn as_lambda_form(&self, expr: &Val) -> Option<(Val, Vec<Val>)> {
        let cell = expr.as_cons()?;
        let head = cell.first();
        let sym = head.as_symbol()?.clone();
        if !Rc::ptr_eq(&sym, &self.ctx.reserved().lambda) {
            return None;
        }
        let (items, tail) = cons::to_vec(&cell.rest());
        if items.is_empty() || !tail.is_nil() {
            return None;
        }
        Some((items[0].clone(), items[1..].to_vec()))
    }

    fn compile_if(
        &mut self,
        items: &[Val],
        env: &CompileEnv,
        used: bool,
        more: bool,
        out: &mut Vec<Instr>,
    ) -> Result<()> {
        if items.len() != 3 && items.len() != 4 {
            return Err(arity("if", "2-3", items.len() - 1));
        }
        let pred = &items[1];
        let else_expr = items.get(3).cloned().unwrap_or(Val::Nil);

        // Constant folding on literal predicates. Literal nil is not folded;
        // it reaches the runtime branch where it tests false.
        match pred {
            Val::Bool(false) => return self.compile_expr(&else_expr, env, used, more, out),
            Val::Bool(true)
            | Val::Int(_)
            | Val::Int64(_)
            | Val::UInt(_)
            | Val::UInt64(_)
            | Val::Float(_)
            | Val::Double(_)
            | Val::Str(_) => return self.compile_expr(&items[2], env, used, more, out),
            _ => {}
        }

        let else_label = self.new_label();

        // Compile both branches from the same label counter so structurally
        // identical branches produce identical instruction lists.
        let labels_before = self.labels;
        let mut then_code = Vec::new();
        self.compile_expr(&items[2], env, used, more, &mut then_code)?;
        let labels_after_then = self.labels;

        self.labels = labels_before;
        let mut else_code = Vec::new();
        self.compile_expr(&else_expr, env, used, more, &mut else_code)?;

        if then_code == else_code {
            // (if p x x) ≡ (begin p x)
            self.labels = labels_after_then;
            self.compile_expr(pred, env, false, true, out)?;
            out.extend(then_code);
            return Ok(());
        }

        // The branches differ: recompile the else branch with fresh labels
        // so they do not collide with the then branch's.
        self.labels = labels_after_then;
        else_code.clear();
        self.compile_expr(&else_expr, env, used, more, &mut else_code)?;

        self.compile_expr(pred, env, true, true, out)?;
        out.push(Instr::with_a(Opcode::JmpIfFalse, Val::string(&else_label)));
        out.extend(then_code);
        let end_label = if more { Some(self.new_label()) } else { None };
        if let Some(end) = &end_label {
            out.push(Instr::with_a(Opcode::Jmp, Val::string(end)));
        }
        out.push(Instr::with_a(Opcode::Label, Val::string(&else_label)));
        out.extend(else_code);
        if let Some(end) = &end_label {
            out.push(Instr::with_a(Opcode::Label, Val::string(end)));
        }
        Ok(())
    }

    /// `(if* p e)`: if the predicate is truthy it is the result, else `e`.
    fn compile_if_star(
        &mut self,
        items: &[Val],
        env: &CompileEnv,
        used: bool,
        more: bool,
        out: &mut Vec<Instr>,
    ) -> Result<()> {
        if items.len() != 3 {
            return Err(arity("if*", "2", items.len() - 1));
        }
        let done_label = self.new_label();

        self.compile_expr(&items[1], env, true, true, out)?;
        out.push(Instr::new(Opcode::Dup));
        out.push(Instr::with_a(Opcode::JmpIfTrue, Val::string(&done_label)));
        out.push(Instr::new(Opcode::Pop));
        self.compile_expr(&items[2], env, true, true, out)?;
        out.push(Instr::with_a(Opcode::Label, Val::string(&done_label)));
        if !used {
            out.push(Instr::new(Opcode::Pop));
        }
        if !more {
            out.push(Instr::new(Opcode::Return));
        }
        Ok(())
    }

    /// `(while p body…)`: leaves the last body value (or nil) on the stack.
    fn compile_while(
        &mut self,
        items: &[Val],
        env: &CompileEnv,
        used: bool,
        more: bool,
        out: &mut Vec<Instr>,
    ) -> Result<()> {
        if items.len() < 2 {
            return Err(arity("while", "at least 1", items.len() - 1));
        }
        let loop_label = self.new_label();
        let end_label = self.new_label();
        let body = &items[2..];

        out.push(Instr::with_a(Opcode::PushConst, Val::Nil));
        out.push(Instr::with_a(Opcode::Label, Val::string(&loop_label)));
        self.compile_expr(&items[1], env, true, true, out)?;
        out.push(Instr::with_a(Opcode::JmpIfFalse, Val::string(&end_label)));
        if let Some((last, preceding)) = body.split_last() {
            out.push(Instr::new(Opcode::Pop));
            for form in preceding {
                self.compile_expr(form, env, false, true, out)?;
            }
            self.compile_expr(last, env, true, true, out)?;
        }
        out.push(Instr::with_a(Opcode::Jmp, Val::string(&loop_label)));
        out.push(Instr::with_a(Opcode::Label, Val::string(&end_label)));
        if !used {
            out.push(Instr::new(Opcode::Pop));
        }
        if !more {
            out.push(Instr::new(Opcode::Return));
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn compile_lambda(
        &mut self,
        args: &Val,
        body: &[Val],
        env: &CompileEnv,
        used: bool,
        more: bool,
        name: Option<String>,
        out: &mut Vec<Instr>,
    ) -> Result<()> {
        // An unused lambda has no effect at all.
        if !used {
            return Ok(());
        }
        let source = cons::list_from_dotted(
            std::iter::once(Val::Symbol(self.ctx.reserved().lambda.clone()))
                .chain(std::iter::once(args.clone()))
                .chain(body.iter().cloned())
                .collect(),
            Val::Nil,
        );
        let template = self.lambda_template(args, body, env, name, &source)?;
        out.push(Instr::with_a(Opcode::MakeClosure, Val::Closure(template)));
        if !more {
            out.push(Instr::new(Opcode::Return));
        }
        Ok(())
    }

    fn compile_defmacro(
        &mut self,
        expr: &Val,
        items: &[Val],
        env: &CompileEnv,
        used: bool,
        more: bool,
        out: &mut Vec<Instr>,
    ) -> Result<()> {
        if items.len() < 3 {
            return Err(arity("defmacro", "at least 2", items.len() - 1));
        }
        let name_sym = items[1]
            .as_symbol()
            .ok_or_else(|| CompileError::InvalidMacroName(items[1].to_string()))?
            .clone();

        let body = self.lambda_template(
            &items[2],
            &items[3..],
            env,
            Some(name_sym.name().to_string()),
            expr,
        )?;
        let makro = Rc::new(Macro {
            name: name_sym.clone(),
            args: items[2].clone(),
            body,
        });
        // Installation happens now, at compile time.
        if let Some(home) = name_sym.package() {
            home.borrow_mut().set_macro(name_sym.name(), makro);
        }

        self.compile_constant(&Val::Nil, used, more, out);
        Ok(())
    }

    // ========================================================================
    // Calls and lambda bodies
    // ========================================================================

    fn compile_call(
        &mut self,
        items: &[Val],
        env: &CompileEnv,
        used: bool,
        more: bool,
        out: &mut Vec<Instr>,
    ) -> Result<()> {
        let callee = &items[0];
        let args = &items[1..];

        // Direct primitive call: the head resolves to an unshadowed core
        // primitive and the call-site arity is registered for it.
        if let Val::Symbol(sym) = callee {
            if lookup(env, sym).is_none() && is_core_symbol(sym) {
                if let Some(prim) = self.ctx.primitives().get(sym.name()) {
                    if prim.accepts(args.len()) {
                        for arg in args {
                            self.compile_expr(arg, env, true, true, out)?;
                        }
                        out.push(Instr::with_ab(
                            Opcode::CallPrimop,
                            Val::string(sym.name()),
                            Val::Int(args.len() as i32),
                        ));
                        if !used {
                            out.push(Instr::new(Opcode::Pop));
                        }
                        if !more {
                            out.push(Instr::new(Opcode::Return));
                        }
                        return Ok(());
                    }
                }
            }
        }

        if more {
            let return_label = self.new_label();
            out.push(
                Instr::with_a(Opcode::SaveReturn, Val::string(&return_label))
                    .text(callee.to_string()),
            );
            for arg in args {
                self.compile_expr(arg, env, true, true, out)?;
            }
            self.compile_expr(callee, env, true, true, out)?;
            out.push(Instr::with_a(Opcode::JmpClosure, Val::Int(args.len() as i32)));
            out.push(Instr::with_a(Opcode::Label, Val::string(&return_label)));
            if !used {
                out.push(Instr::new(Opcode::Pop));
            }
        } else {
            // Tail call: no return address, the callee returns for us.
            for arg in args {
                self.compile_expr(arg, env, true, true, out)?;
            }
            self.compile_expr(callee, env, true, true, out)?;
            out.push(Instr::with_a(Opcode::JmpClosure, Val::Int(args.len() as i32)));
        }
        Ok(())
    }

    /// Compile a lambda body into a fresh code block and return the closure
    /// template (captured environment filled in by MAKE_CLOSURE at runtime).
    fn lambda_template(
        &mut self,
        args: &Val,
        body: &[Val],
        env: &CompileEnv,
        name: Option<String>,
        source: &Val,
    ) -> Result<Rc<Closure>> {
        let mut params: Vec<Rc<Symbol>> = Vec::new();
        let mut rest_param: Option<Rc<Symbol>> = None;
        match args {
            Val::Nil => {}
            Val::Symbol(sym) => rest_param = Some(sym.clone()),
            Val::Cons(_) => {
                let (names, tail) = cons::to_vec(args);
                for name in &names {
                    match name {
                        Val::Symbol(sym) => params.push(sym.clone()),
                        other => {
                            return Err(
                                CompileError::InvalidParameterList(other.to_string()).into()
                            )
                        }
                    }
                }
                match tail {
                    Val::Nil => {}
                    Val::Symbol(sym) => rest_param = Some(sym),
                    other => {
                        return Err(CompileError::InvalidParameterList(other.to_string()).into())
                    }
                }
            }
            other => return Err(CompileError::InvalidParameterList(other.to_string()).into()),
        }

        let named = params.len();
        let dotted = rest_param.is_some();
        let mut frame_symbols = params;
        if let Some(rest) = rest_param {
            frame_symbols.push(rest);
        }
        let child = Some(Environment::with_symbols(frame_symbols, env.clone()));

        let mut code = Vec::new();
        let make = if dotted {
            Opcode::MakeEnvDot
        } else {
            Opcode::MakeEnv
        };
        code.push(Instr::with_a(make, Val::Int(named as i32)));

        match body.split_last() {
            None => self.compile_constant(&Val::Nil, true, false, &mut code),
            Some((last, preceding)) => {
                for form in preceding {
                    self.compile_expr(form, &child, false, true, &mut code)?;
                }
                self.compile_expr(last, &child, true, false, &mut code)?;
            }
        }

        let code = assemble(code)?;
        let handle = self
            .ctx
            .code_mut()
            .add(code, source.to_string());
        self.new_blocks.push(handle);

        let closure = Rc::new(Closure::new(handle, None, args.clone()));
        if let Some(name) = name {
            *closure.name.borrow_mut() = Some(name);
        }
        Ok(closure)
    }
}

fn lookup(env: &CompileEnv, sym: &Rc<Symbol>) -> Option<crate::env::VarPos> {
    env.as_ref()?.lookup(sym)
}

fn is_core_symbol(sym: &Rc<Symbol>) -> bool {
    sym.package()
        .map(|pkg| pkg.borrow().name() == Some(package::CORE))
        .unwrap_or(false)
}

fn arity(form: &str, expected: &str, actual: usize) -> crate::error::Error {
    CompileError::SpecialFormArity {
        form: form.to_string(),
        expected: expected.to_string(),
        actual,
    }
    .into()
}

/// Collect label positions, then rewrite every jump-family instruction so
/// its second operand holds the integer target.
fn assemble(mut instrs: Vec<Instr>) -> Result<Vec<Instr>> {
    let mut positions: HashMap<String, usize> = HashMap::new();
    for (index, instr) in instrs.iter().enumerate() {
        if instr.op == Opcode::Label {
            if let Val::Str(name) = &instr.a {
                positions.insert(name.to_string(), index);
            }
        }
    }
    for instr in &mut instrs {
        if instr.op.is_jump_family() {
            let label = match &instr.a {
                Val::Str(name) => name.to_string(),
                other => return Err(CompileError::UnresolvedLabel(other.to_string()).into()),
            };
            let target = positions
                .get(&label)
                .ok_or_else(|| CompileError::UnresolvedLabel(label.clone()))?;
            instr.b = Val::Int(*target as i32);
        }
    }
    Ok(instrs)
}
