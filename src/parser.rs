// ABOUTME: Reader: append-only source buffer to s-expression values

use nom::{
    branch::alt,
    bytes::complete::{take_while, take_while1},
    character::complete::char,
    combinator::value,
    multi::many0,
    IResult, Parser as NomParser,
};

use crate::cons;
use crate::error::{Error, ParseError, Result};
use crate::package::{self, Packages};
use crate::value::{LispMap, Val};

// ============================================================================
// Surface grammar
// ============================================================================

/// Raw parse tree before interning and reader rewrites.
#[derive(Debug, Clone, PartialEq)]
enum Sexpr {
    Atom(String),
    Str(String),
    List(Vec<Sexpr>, Option<Box<Sexpr>>),
    Map(Vec<Sexpr>),
    Quote(Box<Sexpr>),
    Backquote(Box<Sexpr>),
    Comma(Box<Sexpr>),
    CommaAt(Box<Sexpr>),
}

/// Surface-level failures. `Incomplete` means the buffer ended inside a
/// form and the caller should wait for more input.
#[derive(Debug, Clone, PartialEq)]
enum Surface {
    Incomplete,
    Unexpected(char),
    BadDot,
    Nom(nom::error::ErrorKind),
}

impl<'a> nom::error::ParseError<&'a str> for Surface {
    fn from_error_kind(_input: &'a str, kind: nom::error::ErrorKind) -> Self {
        Surface::Nom(kind)
    }

    fn append(_input: &'a str, _kind: nom::error::ErrorKind, other: Self) -> Self {
        other
    }
}

type SResult<'a, T> = IResult<&'a str, T, Surface>;

fn whitespace(input: &str) -> SResult<'_, ()> {
    value((), take_while1(char::is_whitespace)).parse(input)
}

fn line_comment(input: &str) -> SResult<'_, ()> {
    let (input, _) = char(';')(input)?;
    let (input, _) = take_while(|c| c != '\n')(input)?;
    Ok((input, ()))
}

/// Skip whitespace and `;` line comments.
fn ws_and_comments(input: &str) -> SResult<'_, ()> {
    value((), many0(alt((whitespace, line_comment)))).parse(input)
}

fn skip_ws(input: &str) -> &str {
    match ws_and_comments(input) {
        Ok((rest, _)) => rest,
        Err(_) => input,
    }
}

fn is_atom_char(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, '(' | ')' | '{' | '}' | '"' | ';' | '\'' | '`' | ',')
}

fn parse_atom(input: &str) -> SResult<'_, Sexpr> {
    let (rest, text) = take_while1::<_, _, Surface>(is_atom_char)(input)?;
    Ok((rest, Sexpr::Atom(text.to_string())))
}

/// Parse a string body after the opening quote. `\x` reads as `x` except
/// for the control escapes n, t, r. Running out of input is incomplete.
fn parse_string(input: &str) -> SResult<'_, Sexpr> {
    let mut out = String::new();
    let mut chars = input.char_indices();
    while let Some((index, c)) = chars.next() {
        match c {
            '"' => return Ok((&input[index + c.len_utf8()..], Sexpr::Str(out))),
            '\\' => match chars.next() {
                Some((_, 'n')) => out.push('\n'),
                Some((_, 't')) => out.push('\t'),
                Some((_, 'r')) => out.push('\r'),
                Some((_, escaped)) => out.push(escaped),
                None => return Err(nom::Err::Error(Surface::Incomplete)),
            },
            _ => out.push(c),
        }
    }
    Err(nom::Err::Error(Surface::Incomplete))
}

/// Parse list elements after the opening paren, handling the `.` dotted
/// tail notation.
fn parse_list(mut input: &str) -> SResult<'_, Sexpr> {
    let mut items = Vec::new();
    loop {
        input = skip_ws(input);
        match input.chars().next() {
            None => return Err(nom::Err::Error(Surface::Incomplete)),
            Some(')') => return Ok((&input[1..], Sexpr::List(items, None))),
            _ => {}
        }

        let (rest, expr) = sexpr(input)?;
        if matches!(&expr, Sexpr::Atom(a) if a == ".") && !items.is_empty() {
            let rest = skip_ws(rest);
            if rest.is_empty() {
                return Err(nom::Err::Error(Surface::Incomplete));
            }
            if rest.starts_with(')') {
                return Err(nom::Err::Failure(Surface::BadDot));
            }
            let (rest, tail) = sexpr(rest)?;
            let rest = skip_ws(rest);
            return match rest.chars().next() {
                None => Err(nom::Err::Error(Surface::Incomplete)),
                Some(')') => Ok((&rest[1..], Sexpr::List(items, Some(Box::new(tail))))),
                Some(_) => Err(nom::Err::Failure(Surface::BadDot)),
            };
        }

        items.push(expr);
        input = rest;
    }
}

/// Parse map elements after the opening brace.
fn parse_map(mut input: &str) -> SResult<'_, Sexpr> {
    let mut items = Vec::new();
    loop {
        input = skip_ws(input);
        match input.chars().next() {
            None => return Err(nom::Err::Error(Surface::Incomplete)),
            Some('}') => return Ok((&input[1..], Sexpr::Map(items))),
            _ => {}
        }
        let (rest, expr) = sexpr(input)?;
        items.push(expr);
        input = rest;
    }
}

/// Main expression parser: dispatch on the first significant character.
fn sexpr(input: &str) -> SResult<'_, Sexpr> {
    let input = skip_ws(input);
    match input.chars().next() {
        None => Err(nom::Err::Error(Surface::Incomplete)),
        Some('\'') => {
            let (rest, inner) = sexpr(&input[1..])?;
            Ok((rest, Sexpr::Quote(Box::new(inner))))
        }
        Some('`') => {
            let (rest, inner) = sexpr(&input[1..])?;
            Ok((rest, Sexpr::Backquote(Box::new(inner))))
        }
        Some(',') => {
            if let Some(stripped) = input[1..].strip_prefix('@') {
                let (rest, inner) = sexpr(stripped)?;
                Ok((rest, Sexpr::CommaAt(Box::new(inner))))
            } else {
                let (rest, inner) = sexpr(&input[1..])?;
                Ok((rest, Sexpr::Comma(Box::new(inner))))
            }
        }
        Some('(') => parse_list(&input[1..]),
        Some(')') => Err(nom::Err::Failure(Surface::Unexpected(')'))),
        Some('{') => parse_map(&input[1..]),
        Some('}') => Err(nom::Err::Failure(Surface::Unexpected('}'))),
        Some('"') => parse_string(&input[1..]),
        Some(_) => parse_atom(input),
    }
}

fn surface_error(kind: Surface) -> ParseError {
    match kind {
        Surface::Unexpected(c) => ParseError::UnexpectedClose(c),
        Surface::BadDot => ParseError::BadDot,
        Surface::Incomplete => ParseError::Malformed("incomplete input".to_string()),
        Surface::Nom(k) => ParseError::Malformed(format!("unparseable input ({:?})", k)),
    }
}

// ============================================================================
// Reader: surface tree → values
// ============================================================================

/// Names that always intern in the global package, whatever the current
/// package is.
const RESERVED: &[&str] = &[
    "quote", "begin", "set!", "if", "if*", "while", "lambda", "defmacro", ".",
];

fn read_symbol(name: &str, packages: &Packages) -> std::result::Result<Val, ParseError> {
    if RESERVED.contains(&name) {
        return Ok(Val::Symbol(package::find_or_intern(
            &packages.global(),
            name,
        )));
    }
    if let Some((pkg_name, sym_name)) = name.split_once(':') {
        let pkg = packages
            .find(pkg_name)
            .ok_or_else(|| ParseError::UnknownPackage(pkg_name.to_string()))?;
        return Ok(Val::Symbol(package::find_or_intern(&pkg, sym_name)));
    }
    Ok(Val::Symbol(package::find_or_intern(
        &packages.current(),
        name,
    )))
}

fn read_number(text: &str) -> Option<Val> {
    if text == "+" || text == "-" {
        return None;
    }
    if let Ok(n) = text.parse::<i32>() {
        return Some(Val::Int(n));
    }
    if let Ok(n) = text.parse::<i64>() {
        return Some(Val::Int64(n));
    }
    if let Ok(n) = text.parse::<f64>() {
        return Some(Val::Double(n));
    }
    None
}

fn read_atom(text: &str, packages: &Packages) -> std::result::Result<Val, ParseError> {
    if text == "#t" || text == "#T" {
        return Ok(Val::Bool(true));
    }
    if text.starts_with('#') {
        return Ok(Val::Bool(false));
    }
    let first = text.chars().next().unwrap_or(' ');
    if first == '+' || first == '-' || first.is_ascii_digit() {
        if let Some(number) = read_number(text) {
            return Ok(number);
        }
    }
    read_symbol(text, packages)
}

fn read_value(sx: &Sexpr, packages: &Packages) -> std::result::Result<Val, ParseError> {
    match sx {
        Sexpr::Atom(text) => read_atom(text, packages),
        Sexpr::Str(text) => Ok(Val::string(text)),
        Sexpr::List(items, tail) => {
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                values.push(read_value(item, packages)?);
            }
            let tail = match tail {
                Some(t) => read_value(t, packages)?,
                None => Val::Nil,
            };
            Ok(cons::list_from_dotted(values, tail))
        }
        Sexpr::Map(items) => {
            if items.len() % 2 != 0 {
                return Err(ParseError::OddMapLiteral);
            }
            let mut entries = Vec::with_capacity(items.len() / 2);
            for pair in items.chunks(2) {
                let key = read_value(&pair[0], packages)?;
                let value = read_value(&pair[1], packages)?;
                entries.push((key, value));
            }
            Ok(Val::Map(std::rc::Rc::new(LispMap::from_entries(entries))))
        }
        Sexpr::Quote(inner) => {
            let quote = read_symbol("quote", packages)?;
            Ok(cons::list_from(vec![quote, read_value(inner, packages)?]))
        }
        Sexpr::Backquote(inner) => qq_expand(inner, packages),
        Sexpr::Comma(_) | Sexpr::CommaAt(_) => Err(ParseError::UnquoteOutsideBackquote),
    }
}

/// Expand one backquoted form into `quote`/`list`/`append` code, with the
/// all-list peephole collapsing `(append (list …) …)` into one `(list …)`.
fn qq_expand(sx: &Sexpr, packages: &Packages) -> std::result::Result<Val, ParseError> {
    let quote = read_symbol("quote", packages)?;
    match sx {
        Sexpr::Comma(inner) => read_value(inner, packages),
        Sexpr::CommaAt(_) => Err(ParseError::UnquoteOutsideBackquote),
        Sexpr::List(items, None) => qq_expand_list(items, packages),
        Sexpr::List(_, Some(_)) => Err(ParseError::DottedBackquote),
        Sexpr::Quote(inner) => {
            let desugared = vec![Sexpr::Atom("quote".to_string()), (**inner).clone()];
            qq_expand_list(&desugared, packages)
        }
        Sexpr::Backquote(inner) => {
            let form = qq_expand(inner, packages)?;
            Ok(cons::list_from(vec![quote, form]))
        }
        Sexpr::Atom(_) | Sexpr::Str(_) | Sexpr::Map(_) => {
            let datum = read_value(sx, packages)?;
            Ok(cons::list_from(vec![quote, datum]))
        }
    }
}

fn qq_expand_list(
    items: &[Sexpr],
    packages: &Packages,
) -> std::result::Result<Val, ParseError> {
    let list_sym = read_symbol("list", packages)?;
    let append_sym = read_symbol("append", packages)?;

    let mut parts = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Sexpr::Comma(inner) => {
                parts.push(cons::list_from(vec![
                    list_sym.clone(),
                    read_value(inner, packages)?,
                ]));
            }
            Sexpr::CommaAt(inner) => parts.push(read_value(inner, packages)?),
            other => {
                parts.push(cons::list_from(vec![
                    list_sym.clone(),
                    qq_expand(other, packages)?,
                ]));
            }
        }
    }

    // Peephole: (append (list a…) (list b…)) ≡ (list a… b…).
    let all_list_forms = parts.iter().all(|part| {
        part.as_cons()
            .map(|cell| cell.first() == list_sym)
            .unwrap_or(false)
    });
    if all_list_forms {
        let mut merged = vec![list_sym];
        for part in &parts {
            let (elements, _) = cons::to_vec(part);
            merged.extend(elements.into_iter().skip(1));
        }
        return Ok(cons::list_from(merged));
    }

    let mut form = vec![append_sym];
    form.extend(parts);
    Ok(cons::list_from(form))
}

// ============================================================================
// The buffered parser
// ============================================================================

/// Append-only character buffer with a single savepoint. `parse_next`
/// returns one expression, or `None` (the EOF sentinel) when the buffer has
/// no complete expression, restoring the savepoint for incomplete input.
#[derive(Debug, Default)]
pub struct Parser {
    buffer: String,
    pos: usize,
}

impl Parser {
    pub fn new() -> Self {
        Parser::default()
    }

    pub fn add_string(&mut self, src: &str) {
        self.buffer.push_str(src);
    }

    pub fn parse_next(&mut self, packages: &Packages) -> Result<Option<Val>> {
        let save = self.pos;
        let input = &self.buffer[self.pos..];

        if skip_ws(input).is_empty() {
            self.pos = self.buffer.len();
            self.compact();
            return Ok(None);
        }

        match sexpr(input) {
            Ok((rest, parsed)) => {
                self.pos += input.len() - rest.len();
                let result = read_value(&parsed, packages);
                self.compact();
                result.map(Some).map_err(Error::from)
            }
            Err(nom::Err::Error(Surface::Incomplete))
            | Err(nom::Err::Failure(Surface::Incomplete))
            | Err(nom::Err::Incomplete(_)) => {
                self.pos = save;
                Ok(None)
            }
            Err(nom::Err::Error(kind)) | Err(nom::Err::Failure(kind)) => {
                // The stream position after a failure is unspecified; drop
                // the rest of the buffer so the next call starts clean.
                self.pos = self.buffer.len();
                self.compact();
                Err(surface_error(kind).into())
            }
        }
    }

    /// Drain every complete expression from the buffer.
    pub fn parse_all(&mut self, packages: &Packages) -> Result<Vec<Val>> {
        let mut values = Vec::new();
        while let Some(value) = self.parse_next(packages)? {
            values.push(value);
        }
        Ok(values)
    }

    fn compact(&mut self) {
        if self.pos > 0 {
            self.buffer.drain(..self.pos);
            self.pos = 0;
        }
    }
}
