use std::fmt;
use std::iter::Peekable;
use std::str::CharIndices;

use crate::diagnostic::{LineIndex, Location};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Ident(String),
    /// `'...'` or `"..."`, unescaped contents.
    Str(String),
    /// `'''...'''`, may span lines.
    MultiStr(String),
    /// `` `...` `` expression, contents without backticks.
    Expr(String),
    Num(String),
    /// `#` followed by hex digits, `#` included.
    Color(String),

    LBrace,   // {
    RBrace,   // }
    LParen,   // (
    RParen,   // )
    LBracket, // [
    RBracket, // ]
    Comma,    // ,
    Colon,    // :
    Dot,      // .
    Gt,       // >
    Lt,       // <
    LtGt,     // <>
    Dash,     // -
    Newline,

    /// Anything else, including an unterminated single-line quote.
    Stray(char),
}

impl Token {
    /// Text of a quoted token (`'..'`, `".."`, `'''..'''`, `` `..` ``).
    pub fn quoted(&self) -> Option<&str> {
        match self {
            Token::Str(s) | Token::MultiStr(s) | Token::Expr(s) => Some(s),
            _ => None,
        }
    }

    /// Text of a token usable as a name segment: bare word or quoted name.
    pub fn name(&self) -> Option<&str> {
        match self {
            Token::Ident(s) | Token::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self, Token::Ident(s) if s.eq_ignore_ascii_case(keyword))
    }

    /// Relationship operator spelled by this token.
    pub fn operator(&self) -> Option<&'static str> {
        match self {
            Token::Gt => Some(">"),
            Token::Lt => Some("<"),
            Token::LtGt => Some("<>"),
            Token::Dash => Some("-"),
            _ => None,
        }
    }
}

/// A byte-offset span in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    /// Inclusive start byte offset.
    pub start: usize,
    /// Exclusive end byte offset.
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LexError {
    #[error("Unterminated multi-line string starting at {0}")]
    UnterminatedString(Location),
}

pub struct Lexer<'a> {
    input: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
        }
    }

    fn offset(&mut self) -> usize {
        self.chars.peek().map_or(self.input.len(), |&(i, _)| i)
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, c)| c)
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek_char() {
                Some('\n') => break,
                Some(c) if c.is_whitespace() => {
                    self.chars.next();
                }
                Some('/') => {
                    let rest = &self.input[self.offset()..];
                    if rest.starts_with("//") {
                        // Leave the newline for the token stream.
                        while let Some(c) = self.peek_char() {
                            if c == '\n' {
                                break;
                            }
                            self.chars.next();
                        }
                    } else if rest.starts_with("/*") {
                        self.chars.next();
                        self.chars.next();
                        let mut prev = '\0';
                        for (_, c) in self.chars.by_ref() {
                            if prev == '*' && c == '/' {
                                break;
                            }
                            prev = c;
                        }
                    } else {
                        break;
                    }
                }
                _ => break,
            }
        }
    }

    fn read_ident(&mut self, first: char) -> String {
        let mut s = String::from(first);
        while let Some(c) = self.peek_char() {
            if c.is_alphanumeric() || c == '_' {
                s.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        s
    }

    fn read_number(&mut self, first: char) -> String {
        let mut s = String::from(first);
        let mut seen_dot = false;
        while let Some(c) = self.peek_char() {
            if c.is_ascii_digit() {
                s.push(c);
                self.chars.next();
            } else if c == '.' && !seen_dot {
                // Only a fractional part if a digit follows the dot.
                let mut ahead = self.chars.clone();
                ahead.next();
                if !matches!(ahead.peek(), Some(&(_, d)) if d.is_ascii_digit()) {
                    break;
                }
                seen_dot = true;
                s.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        s
    }

    /// Read a quoted run on a single line. Returns `None` (without consuming
    /// anything) when the line ends before the closing quote.
    fn read_quoted(&mut self, quote: char) -> Option<String> {
        let checkpoint = self.chars.clone();
        let mut s = String::new();
        loop {
            match self.chars.next() {
                Some((_, c)) if c == quote => return Some(s),
                Some((_, '\\')) if quote != '`' => match self.chars.next() {
                    Some((_, 'n')) => s.push('\n'),
                    Some((_, 't')) => s.push('\t'),
                    Some((_, 'r')) => s.push('\r'),
                    Some((_, '\n')) | None => break,
                    Some((_, c)) => s.push(c),
                },
                Some((_, '\n')) | None => break,
                Some((_, c)) => s.push(c),
            }
        }
        self.chars = checkpoint;
        None
    }

    fn read_multi_string(&mut self, start: usize) -> Result<String, LexError> {
        // Opening quotes were already consumed.
        let body_start = self.offset();
        match self.input[body_start..].find("'''") {
            Some(len) => {
                let end = body_start + len;
                while self.offset() < end + 3 {
                    self.chars.next();
                }
                Ok(self.input[body_start..end].trim().to_string())
            }
            None => Err(LexError::UnterminatedString(
                LineIndex::new(self.input).location(start),
            )),
        }
    }

    fn read_color(&mut self) -> Option<String> {
        let mut s = String::from('#');
        while let Some(c) = self.peek_char() {
            if c.is_ascii_alphanumeric() {
                s.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        (s.len() > 1).then_some(s)
    }

    pub fn next_token(&mut self) -> Result<Option<Spanned>, LexError> {
        self.skip_whitespace_and_comments();

        let (start, c) = match self.chars.next() {
            Some(next) => next,
            None => return Ok(None),
        };

        let tok = match c {
            '\n' => Token::Newline,
            '{' => Token::LBrace,
            '}' => Token::RBrace,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            ',' => Token::Comma,
            ':' => Token::Colon,
            '.' => Token::Dot,
            '>' => Token::Gt,
            '-' => Token::Dash,
            '<' => {
                if self.peek_char() == Some('>') {
                    self.chars.next();
                    Token::LtGt
                } else {
                    Token::Lt
                }
            }
            '\'' if self.input[start..].starts_with("'''") => {
                self.chars.next();
                self.chars.next();
                Token::MultiStr(self.read_multi_string(start)?)
            }
            '\'' | '"' => match self.read_quoted(c) {
                Some(s) => Token::Str(s),
                None => Token::Stray(c),
            },
            '`' => match self.read_quoted('`') {
                Some(s) => Token::Expr(s),
                None => Token::Stray(c),
            },
            '#' => match self.read_color() {
                Some(s) => Token::Color(s),
                None => Token::Stray(c),
            },
            c if c.is_ascii_digit() => Token::Num(self.read_number(c)),
            c if c.is_alphabetic() || c == '_' => Token::Ident(self.read_ident(c)),
            c => Token::Stray(c),
        };

        let end = self.offset();
        Ok(Some(Spanned {
            token: tok,
            span: Span::new(start, end),
        }))
    }

    pub fn tokenize(mut self) -> Result<Vec<Spanned>, LexError> {
        let mut tokens = Vec::new();
        while let Some(tok) = self.next_token()? {
            tokens.push(tok);
        }
        Ok(tokens)
    }
}
