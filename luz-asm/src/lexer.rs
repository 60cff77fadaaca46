//! Tokenizer for the assembly source syntax.
//!
//! Line-oriented: newlines are tokens, `#` comments run to end of
//! line, identifiers and directives are lowercased on the way in.

use core::fmt;
use std::iter::Peekable;
use std::str::Chars;

use crate::error::LexError;

/// A single lexical token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Identifier, lowercased. Register spellings arrive here too.
    Id(String),
    /// Directive name including the leading dot, lowercased.
    Directive(String),
    /// Decimal or hexadecimal numeric literal, optionally negative.
    Number(i64),
    /// Double-quoted string literal, translated to raw bytes.
    Str(Vec<u8>),
    /// `:`
    Colon,
    /// `,`
    Comma,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// End of a source line.
    Newline,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Id(id) => write!(f, "'{id}'"),
            Token::Directive(name) => write!(f, "'{name}'"),
            Token::Number(num) => write!(f, "'{num}'"),
            Token::Str(_) => write!(f, "string"),
            Token::Colon => write!(f, "':'"),
            Token::Comma => write!(f, "','"),
            Token::LParen => write!(f, "'('"),
            Token::RParen => write!(f, "')'"),
            Token::Newline => write!(f, "end of line"),
        }
    }
}

/// Tokenizes a whole source text, pairing each token with its line
/// number (1-based).
pub fn tokenize(source: &str) -> Result<Vec<(Token, u32)>, LexError> {
    Lexer {
        chars: source.chars().peekable(),
        line: 1,
    }
    .run()
}

struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    line: u32,
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_ident_cont(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

impl Lexer<'_> {
    fn run(mut self) -> Result<Vec<(Token, u32)>, LexError> {
        let mut tokens = Vec::new();
        while let Some(&c) = self.chars.peek() {
            match c {
                ' ' | '\t' | '\r' => {
                    self.chars.next();
                }
                '\n' => {
                    self.chars.next();
                    tokens.push((Token::Newline, self.line));
                    self.line += 1;
                }
                '#' => {
                    while let Some(&c) = self.chars.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.chars.next();
                    }
                }
                ':' => tokens.push((self.single(Token::Colon), self.line)),
                ',' => tokens.push((self.single(Token::Comma), self.line)),
                '(' => tokens.push((self.single(Token::LParen), self.line)),
                ')' => tokens.push((self.single(Token::RParen), self.line)),
                '"' => {
                    let token = self.string()?;
                    tokens.push((token, self.line));
                }
                '-' => {
                    self.chars.next();
                    match self.chars.peek() {
                        Some(d) if d.is_ascii_digit() => {
                            let token = self.number(true)?;
                            tokens.push((token, self.line));
                        }
                        _ => {
                            return Err(LexError::IllegalChar {
                                found: '-',
                                line: self.line,
                            })
                        }
                    }
                }
                c if c.is_ascii_digit() => {
                    let token = self.number(false)?;
                    tokens.push((token, self.line));
                }
                '.' => {
                    self.chars.next();
                    match self.chars.peek() {
                        Some(&c) if is_ident_start(c) => {
                            let mut name = String::from(".");
                            name.push_str(&self.ident());
                            tokens.push((Token::Directive(name), self.line));
                        }
                        _ => {
                            return Err(LexError::IllegalChar {
                                found: '.',
                                line: self.line,
                            })
                        }
                    }
                }
                c if is_ident_start(c) => {
                    let id = self.ident();
                    tokens.push((Token::Id(id), self.line));
                }
                other => {
                    return Err(LexError::IllegalChar {
                        found: other,
                        line: self.line,
                    })
                }
            }
        }
        Ok(tokens)
    }

    fn single(&mut self, token: Token) -> Token {
        self.chars.next();
        token
    }

    fn ident(&mut self) -> String {
        let mut id = String::new();
        // First char may be '$'; continuation chars may not.
        if let Some(&c) = self.chars.peek() {
            if is_ident_start(c) {
                id.push(c.to_ascii_lowercase());
                self.chars.next();
            }
        }
        while let Some(&c) = self.chars.peek() {
            if !is_ident_cont(c) {
                break;
            }
            id.push(c.to_ascii_lowercase());
            self.chars.next();
        }
        id
    }

    fn number(&mut self, negative: bool) -> Result<Token, LexError> {
        let mut digits = String::new();
        let mut hex = false;
        if let Some(&'0') = self.chars.peek() {
            digits.push('0');
            self.chars.next();
            if let Some(&c) = self.chars.peek() {
                if c == 'x' || c == 'X' {
                    hex = true;
                    digits.clear();
                    self.chars.next();
                }
            }
        }
        while let Some(&c) = self.chars.peek() {
            if (hex && c.is_ascii_hexdigit()) || (!hex && c.is_ascii_digit()) {
                digits.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        if hex && digits.is_empty() {
            return Err(LexError::IllegalChar {
                found: 'x',
                line: self.line,
            });
        }
        let radix = if hex { 16 } else { 10 };
        let value = i64::from_str_radix(&digits, radix)
            .map_err(|_| LexError::NumberOutOfRange { line: self.line })?;
        Ok(Token::Number(if negative { -value } else { value }))
    }

    fn string(&mut self) -> Result<Token, LexError> {
        self.chars.next(); // opening quote
        let mut bytes = Vec::new();
        loop {
            match self.chars.next() {
                None | Some('\n') => return Err(LexError::UnterminatedString { line: self.line }),
                Some('"') => return Ok(Token::Str(bytes)),
                Some('\\') => match self.chars.next() {
                    Some('n') => bytes.push(b'\n'),
                    Some('t') => bytes.push(b'\t'),
                    Some('\\') => bytes.push(b'\\'),
                    Some('"') => bytes.push(b'"'),
                    Some(other) => {
                        return Err(LexError::UnknownEscape {
                            escape: other,
                            line: self.line,
                        })
                    }
                    None => return Err(LexError::UnterminatedString { line: self.line }),
                },
                Some(c) => {
                    let mut buf = [0u8; 4];
                    bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
                }
            }
        }
    }
}
