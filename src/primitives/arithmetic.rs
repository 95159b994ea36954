//! Arithmetic operations: +, -, *, /, %
//!
//! Binary steps promote to the higher-ranked operand type
//! (int < uint < int64 < uint64 < float < double); two integer operands
//! stay integer, anything involving a float promotes to floating point.

use super::Registry;
use crate::context::Context;
use crate::error::{LangError, Result};
use crate::value::Val;

#[derive(Clone, Copy)]
enum Op {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

fn rank(value: &Val) -> Option<u8> {
    match value {
        Val::Int(_) => Some(0),
        Val::UInt(_) => Some(1),
        Val::Int64(_) => Some(2),
        Val::UInt64(_) => Some(3),
        Val::Float(_) => Some(4),
        Val::Double(_) => Some(5),
        _ => None,
    }
}

fn as_i128(value: &Val) -> i128 {
    match value {
        Val::Int(n) => i128::from(*n),
        Val::UInt(n) => i128::from(*n),
        Val::Int64(n) => i128::from(*n),
        Val::UInt64(n) => i128::from(*n),
        _ => 0,
    }
}

fn as_f64(value: &Val) -> f64 {
    match value {
        Val::Int(n) => f64::from(*n),
        Val::UInt(n) => f64::from(*n),
        Val::Int64(n) => *n as f64,
        Val::UInt64(n) => *n as f64,
        Val::Float(n) => f64::from(*n),
        Val::Double(n) => *n,
        _ => 0.0,
    }
}

fn integer_result(value: i128, rank: u8) -> Val {
    match rank {
        0 => Val::Int(value as i32),
        1 => Val::UInt(value as u32),
        2 => Val::Int64(value as i64),
        _ => Val::UInt64(value as u64),
    }
}

fn check_number(function: &str, value: &Val, position: usize) -> Result<()> {
    if value.is_number() {
        Ok(())
    } else {
        Err(LangError::type_error(function, "number", value, position).into())
    }
}

fn binary(op: Op, a: &Val, b: &Val) -> Result<Val> {
    let rank_a = rank(a).unwrap_or(0);
    let rank_b = rank(b).unwrap_or(0);
    let result_rank = rank_a.max(rank_b);

    if result_rank >= 4 {
        let (x, y) = (as_f64(a), as_f64(b));
        let value = match op {
            Op::Add => x + y,
            Op::Sub => x - y,
            Op::Mul => x * y,
            Op::Div => x / y,
            Op::Rem => x % y,
        };
        return Ok(if result_rank == 4 {
            Val::Float(value as f32)
        } else {
            Val::Double(value)
        });
    }

    let (x, y) = (as_i128(a), as_i128(b));
    if matches!(op, Op::Div | Op::Rem) && y == 0 {
        return Err(LangError::DivisionByZero.into());
    }
    let value = match op {
        Op::Add => x + y,
        Op::Sub => x - y,
        Op::Mul => x * y,
        Op::Div => x / y,
        Op::Rem => x % y,
    };
    Ok(integer_result(value, result_rank))
}

fn fold(function: &str, op: Op, seed: Val, args: &[Val]) -> Result<Val> {
    for (position, arg) in args.iter().enumerate() {
        check_number(function, arg, position + 1)?;
    }
    match args.split_first() {
        None => Ok(seed),
        Some((first, rest)) => {
            let mut acc = first.clone();
            for arg in rest {
                acc = binary(op, &acc, arg)?;
            }
            Ok(acc)
        }
    }
}

pub fn prim_add(_ctx: &Context, args: &[Val]) -> Result<Val> {
    fold("+", Op::Add, Val::Int(0), args)
}

pub fn prim_sub(_ctx: &Context, args: &[Val]) -> Result<Val> {
    check_number("-", &args[0], 1)?;
    if args.len() == 1 {
        return binary(Op::Sub, &Val::Int(0), &args[0]);
    }
    fold("-", Op::Sub, Val::Int(0), args)
}

pub fn prim_mul(_ctx: &Context, args: &[Val]) -> Result<Val> {
    fold("*", Op::Mul, Val::Int(1), args)
}

pub fn prim_div(_ctx: &Context, args: &[Val]) -> Result<Val> {
    check_number("/", &args[0], 1)?;
    if args.len() == 1 {
        return binary(Op::Div, &Val::Int(1), &args[0]);
    }
    fold("/", Op::Div, Val::Int(1), args)
}

pub fn prim_mod(_ctx: &Context, args: &[Val]) -> Result<Val> {
    check_number("%", &args[0], 1)?;
    check_number("%", &args[1], 2)?;
    binary(Op::Rem, &args[0], &args[1])
}

/// Register all arithmetic primitives
pub fn register(registry: &mut Registry) {
    registry.add("+", 0, None, prim_add);
    registry.add("-", 1, None, prim_sub);
    registry.add("*", 0, None, prim_mul);
    registry.add("/", 1, None, prim_div);
    registry.add("%", 2, Some(2), prim_mod);
}
