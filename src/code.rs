// ABOUTME: Instructions, code blocks, and the arena of stable code handles

use crate::value::Val;
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Label,
    PushConst,
    LocalGet,
    LocalSet,
    GlobalGet,
    GlobalSet,
    Pop,
    Dup,
    JmpIfTrue,
    JmpIfFalse,
    Jmp,
    MakeEnv,
    MakeEnvDot,
    MakeClosure,
    SaveReturn,
    JmpClosure,
    Return,
    CallPrimop,
}

impl Opcode {
    /// Instructions whose first operand is a label resolved by assembly.
    pub fn is_jump_family(self) -> bool {
        matches!(
            self,
            Opcode::Jmp | Opcode::JmpIfTrue | Opcode::JmpIfFalse | Opcode::SaveReturn
        )
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Opcode::Label => "LABEL",
            Opcode::PushConst => "PUSH_CONST",
            Opcode::LocalGet => "LOCAL_GET",
            Opcode::LocalSet => "LOCAL_SET",
            Opcode::GlobalGet => "GLOBAL_GET",
            Opcode::GlobalSet => "GLOBAL_SET",
            Opcode::Pop => "POP",
            Opcode::Dup => "DUP",
            Opcode::JmpIfTrue => "JMP_IF_TRUE",
            Opcode::JmpIfFalse => "JMP_IF_FALSE",
            Opcode::Jmp => "JMP",
            Opcode::MakeEnv => "MAKE_ENV",
            Opcode::MakeEnvDot => "MAKE_ENVDOT",
            Opcode::MakeClosure => "MAKE_CLOSURE",
            Opcode::SaveReturn => "SAVE_RETURN",
            Opcode::JmpClosure => "JMP_CLOSURE",
            Opcode::Return => "RETURN",
            Opcode::CallPrimop => "CALL_PRIMOP",
        };
        write!(f, "{}", name)
    }
}

/// One instruction: opcode plus two value operands and optional debug text.
/// For the jump family, operand `a` carries the label and operand `b` is
/// overwritten with the resolved offset during assembly.
#[derive(Debug, Clone)]
pub struct Instr {
    pub op: Opcode,
    pub a: Val,
    pub b: Val,
    pub text: Option<String>,
}

impl Instr {
    pub fn new(op: Opcode) -> Instr {
        Instr {
            op,
            a: Val::Nil,
            b: Val::Nil,
            text: None,
        }
    }

    pub fn with_a(op: Opcode, a: Val) -> Instr {
        Instr {
            op,
            a,
            b: Val::Nil,
            text: None,
        }
    }

    pub fn with_ab(op: Opcode, a: Val, b: Val) -> Instr {
        Instr {
            op,
            a,
            b,
            text: None,
        }
    }

    pub fn text(mut self, text: impl Into<String>) -> Instr {
        self.text = Some(text.into());
        self
    }
}

/// Equality is tag plus value equality of both operands; debug text is
/// ignored so identical branches compare equal.
impl PartialEq for Instr {
    fn eq(&self, other: &Instr) -> bool {
        self.op == other.op && self.a == other.a && self.b == other.b
    }
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<14}", self.op.to_string())?;
        if !self.a.is_nil() || !self.b.is_nil() {
            write!(f, " {}", self.a)?;
        }
        if !self.b.is_nil() {
            write!(f, " {}", self.b)?;
        }
        if let Some(text) = &self.text {
            write!(f, " ; {}", text)?;
        }
        Ok(())
    }
}

/// Stable, dense, 1-based handle into the code arena. Index 0 is reserved
/// as invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CodeHandle(pub usize);

impl CodeHandle {
    pub const INVALID: CodeHandle = CodeHandle(0);

    pub fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for CodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#<code:{}>", self.0)
    }
}

/// A compiled block: its handle, instructions, and the debug text of the
/// source form it came from.
#[derive(Debug, Clone)]
pub struct CodeBlock {
    pub handle: CodeHandle,
    pub instrs: Rc<[Instr]>,
    pub text: String,
}

/// Arena of code blocks. Handles are never renumbered; removing a block
/// leaves a hole.
#[derive(Debug, Default)]
pub struct CodeArena {
    blocks: Vec<Option<CodeBlock>>,
}

impl CodeArena {
    pub fn new() -> Self {
        CodeArena {
            blocks: vec![None],
        }
    }

    pub fn add(&mut self, instrs: Vec<Instr>, text: impl Into<String>) -> CodeHandle {
        let handle = CodeHandle(self.blocks.len());
        self.blocks.push(Some(CodeBlock {
            handle,
            instrs: instrs.into(),
            text: text.into(),
        }));
        handle
    }

    pub fn get(&self, handle: CodeHandle) -> Option<&CodeBlock> {
        self.blocks.get(handle.0)?.as_ref()
    }

    pub fn instrs(&self, handle: CodeHandle) -> Option<Rc<[Instr]>> {
        self.get(handle).map(|block| block.instrs.clone())
    }

    pub fn remove(&mut self, handle: CodeHandle) {
        if handle.is_valid() {
            if let Some(slot) = self.blocks.get_mut(handle.0) {
                *slot = None;
            }
        }
    }

    /// Number of live blocks.
    pub fn len(&self) -> usize {
        self.blocks.iter().filter(|b| b.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn disassemble(&self, handle: CodeHandle) -> String {
        match self.get(handle) {
            Some(block) => {
                let mut out = format!("{} {}\n", block.handle, block.text);
                for (index, instr) in block.instrs.iter().enumerate() {
                    out.push_str(&format!("  {:>4} : {}\n", index, instr));
                }
                out
            }
            None => format!("{} <empty>\n", handle),
        }
    }
}
