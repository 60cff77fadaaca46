//! Parser for the assembly source syntax, producing the intermediate
//! form the assembler consumes.
//!
//! The parser doesn't recognize specific instructions or directives
//! and doesn't know how many arguments each one expects; that is
//! checked at the next level, which keeps the grammar general.

use core::fmt;

use crate::error::ParseError;
use crate::lexer::{tokenize, Token};

/// A parsed operand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    /// Numeric literal.
    Number(i64),
    /// Identifier: a label, a defined constant or a register spelling.
    Id(String),
    /// String literal, as raw bytes.
    Str(Vec<u8>),
    /// `offset(base)` memory reference; the offset is a number or an
    /// identifier, the base is a register spelling.
    MemRef {
        /// Offset part, `Number` or `Id`.
        offset: Box<Arg>,
        /// Base register spelling.
        base: String,
    },
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Number(num) => write!(f, "{num}"),
            Arg::Id(id) => write!(f, "{id}"),
            Arg::Str(_) => write!(f, "<string>"),
            Arg::MemRef { offset, base } => write!(f, "{offset}({base})"),
        }
    }
}

/// One parsed source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    /// An instruction line. A bare `label:` line is an `Instruction`
    /// with no mnemonic.
    Instruction {
        /// Label defined on this line, if any.
        label: Option<String>,
        /// The mnemonic; `None` for a bare label line.
        mnemonic: Option<String>,
        /// Operands as written.
        args: Vec<Arg>,
        /// 1-based source line number.
        lineno: u32,
    },
    /// A directive line.
    Directive {
        /// Label defined on this line, if any.
        label: Option<String>,
        /// Directive name including the leading dot.
        name: String,
        /// Arguments as written.
        args: Vec<Arg>,
        /// 1-based source line number.
        lineno: u32,
    },
}

impl Line {
    /// The label defined on this line, if any.
    pub fn label(&self) -> Option<&str> {
        match self {
            Line::Instruction { label, .. } | Line::Directive { label, .. } => label.as_deref(),
        }
    }

    /// The source line number.
    pub fn lineno(&self) -> u32 {
        match self {
            Line::Instruction { lineno, .. } | Line::Directive { lineno, .. } => *lineno,
        }
    }
}

/// Parses assembly source into intermediate form, skipping empty
/// lines.
pub fn parse(source: &str) -> Result<Vec<Line>, ParseError> {
    let tokens = tokenize(source)?;
    let mut lines = Vec::new();
    for group in tokens.split(|(token, _)| *token == Token::Newline) {
        if let Some(line) = parse_line(group)? {
            lines.push(line);
        }
    }
    Ok(lines)
}

fn unexpected(group: &[(Token, u32)], pos: usize) -> ParseError {
    match group.get(pos) {
        Some((token, line)) => ParseError::Unexpected {
            found: token.to_string(),
            line: *line,
        },
        None => ParseError::Unexpected {
            found: "end of line".to_string(),
            // group is non-empty whenever this is reached
            line: group.last().map(|(_, line)| *line).unwrap_or(0),
        },
    }
}

fn parse_line(group: &[(Token, u32)]) -> Result<Option<Line>, ParseError> {
    if group.is_empty() {
        return Ok(None);
    }
    let lineno = group[0].1;
    let mut pos = 0;

    let label = match (&group[0].0, group.get(1).map(|(t, _)| t)) {
        (Token::Id(id), Some(Token::Colon)) => {
            pos = 2;
            Some(id.clone())
        }
        _ => None,
    };

    let line = match group.get(pos).map(|(t, _)| t) {
        None => {
            // A lone `label:`; anything else empty was filtered above.
            match label {
                Some(label) => Line::Instruction {
                    label: Some(label),
                    mnemonic: None,
                    args: Vec::new(),
                    lineno,
                },
                None => return Err(unexpected(group, pos)),
            }
        }
        Some(Token::Directive(name)) => {
            let name = name.clone();
            pos += 1;
            let args = parse_args(group, &mut pos)?;
            Line::Directive {
                label,
                name,
                args,
                lineno,
            }
        }
        Some(Token::Id(name)) => {
            let name = name.clone();
            pos += 1;
            let args = parse_args(group, &mut pos)?;
            Line::Instruction {
                label,
                mnemonic: Some(name),
                args,
                lineno,
            }
        }
        Some(_) => return Err(unexpected(group, pos)),
    };

    if pos != group.len() {
        return Err(unexpected(group, pos));
    }
    Ok(Some(line))
}

fn parse_args(group: &[(Token, u32)], pos: &mut usize) -> Result<Vec<Arg>, ParseError> {
    let mut args = Vec::new();
    if *pos == group.len() {
        return Ok(args);
    }
    args.push(parse_arg(group, pos)?);
    while let Some((Token::Comma, _)) = group.get(*pos) {
        *pos += 1;
        args.push(parse_arg(group, pos)?);
    }
    Ok(args)
}

fn parse_arg(group: &[(Token, u32)], pos: &mut usize) -> Result<Arg, ParseError> {
    let arg = match group.get(*pos).map(|(t, _)| t) {
        Some(Token::Number(num)) => Arg::Number(*num),
        Some(Token::Id(id)) => Arg::Id(id.clone()),
        Some(Token::Str(bytes)) => Arg::Str(bytes.clone()),
        _ => return Err(unexpected(group, *pos)),
    };
    *pos += 1;

    // `offset(base)` applies to number and identifier offsets only.
    if !matches!(arg, Arg::Number(_) | Arg::Id(_)) {
        return Ok(arg);
    }
    if let Some((Token::LParen, _)) = group.get(*pos) {
        *pos += 1;
        let base = match group.get(*pos).map(|(t, _)| t) {
            Some(Token::Id(id)) => id.clone(),
            _ => return Err(unexpected(group, *pos)),
        };
        *pos += 1;
        match group.get(*pos).map(|(t, _)| t) {
            Some(Token::RParen) => *pos += 1,
            _ => return Err(unexpected(group, *pos)),
        }
        return Ok(Arg::MemRef {
            offset: Box::new(arg),
            base,
        });
    }
    Ok(arg)
}
