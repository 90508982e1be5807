//! Brace-depth block scanner.
//!
//! Splits a token stream into a tree of [`Segment`]s: balanced `{ ... }`
//! blocks with their header, and the plain lines between them. Quoted
//! strings are single tokens, so braces inside notes never affect depth.

use std::ops::Range;

use crate::diagnostic::{Diagnostic, LineIndex, Location};
use crate::lexer::{LexError, Lexer, Span, Spanned, Token};

/// Deepest block nesting the scanner descends into.
pub const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScanError {
    #[error("Unterminated {keyword} block starting at {location}")]
    UnterminatedBlock { keyword: String, location: Location },
    #[error("Blocks nested deeper than {MAX_DEPTH} levels at {location}")]
    TooDeep { location: Location },
}

/// The tokenized document plus the original text the spans point into.
pub struct TokenStream<'a> {
    text: &'a str,
    tokens: Vec<Spanned>,
    lines: LineIndex<'a>,
}

impl<'a> TokenStream<'a> {
    pub fn new(text: &'a str) -> Result<Self, LexError> {
        let tokens = Lexer::new(text).tokenize()?;
        Ok(Self {
            text,
            tokens,
            lines: LineIndex::new(text),
        })
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn token(&self, i: usize) -> Option<&Token> {
        self.tokens.get(i).map(|t| &t.token)
    }

    /// Tokens of a range, without spans.
    pub fn tokens(&self, range: Range<usize>) -> impl Iterator<Item = &Token> + '_ {
        self.tokens[range].iter().map(|t| &t.token)
    }

    /// Original text covered by a token range, from the first token's start
    /// to the last token's end.
    pub fn text(&self, range: Range<usize>) -> &'a str {
        if range.is_empty() {
            return "";
        }
        let start = self.tokens[range.start].span.start;
        let end = self.tokens[range.end - 1].span.end;
        &self.text[start..end]
    }

    /// Whether token `i` starts right where token `i - 1` ends.
    pub fn adjacent(&self, i: usize) -> bool {
        i > 0 && i < self.tokens.len() && self.tokens[i - 1].span.end == self.tokens[i].span.start
    }

    pub fn span(&self, i: usize) -> Option<Span> {
        self.tokens.get(i).map(|t| t.span)
    }

    /// A diagnostic located at token `i`.
    pub fn diagnostic(&self, i: usize, reason: impl Into<String>) -> Diagnostic {
        let diagnostic = Diagnostic {
            location: self.location(i),
            reason: reason.into(),
        };
        tracing::trace!(location = %diagnostic.location, reason = %diagnostic.reason, "skipped");
        diagnostic
    }

    pub fn location(&self, i: usize) -> Location {
        let offset = self
            .tokens
            .get(i)
            .map_or(self.text.len(), |t| t.span.start);
        self.lines.location(offset)
    }

    /// Index of the bracket closing the one at `open`, bounded by `end`.
    pub fn matching(&self, open: usize, end: usize, left: &Token, right: &Token) -> Option<usize> {
        let mut depth = 0usize;
        for i in open..end {
            let tok = &self.tokens[i].token;
            if tok == left {
                depth += 1;
            } else if tok == right {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(i);
                }
            }
        }
        None
    }

    /// Scan the whole document into top-level segments.
    pub fn scan(&self) -> Result<Vec<Segment>, ScanError> {
        self.scan_range(0..self.tokens.len(), 0)
    }

    /// `depth` is the nesting level of the block owning `range`, 0 at top level.
    fn scan_range(&self, range: Range<usize>, depth: usize) -> Result<Vec<Segment>, ScanError> {
        let mut segments = Vec::new();
        let mut i = range.start;

        while i < range.end {
            if self.tokens[i].token == Token::Newline {
                i += 1;
                continue;
            }

            let line_end = self.line_end(i, range.end);
            let open = self
                .find_open_brace(i..line_end)
                .or_else(|| self.brace_on_next_line(i, line_end, range.end));

            match open {
                Some(open) => {
                    let close = self
                        .matching(open, range.end, &Token::LBrace, &Token::RBrace)
                        .ok_or_else(|| ScanError::UnterminatedBlock {
                            keyword: self.keyword_text(i),
                            location: self.location(i),
                        })?;
                    segments.push(Segment::Block(self.block(i, open, close, depth + 1)?));
                    i = close + 1;
                }
                None => {
                    segments.push(Segment::Line(i..line_end));
                    i = line_end;
                }
            }
        }

        Ok(segments)
    }

    fn line_end(&self, start: usize, end: usize) -> usize {
        (start..end)
            .find(|&j| self.tokens[j].token == Token::Newline)
            .unwrap_or(end)
    }

    /// `Table users` followed by a line starting with `{`: the brace opens
    /// the keyword's block. Lines with a `:` outside `[...]` are statements,
    /// not headers.
    fn brace_on_next_line(&self, start: usize, line_end: usize, end: usize) -> Option<usize> {
        if matches!(BlockKind::from_token(&self.tokens[start].token), BlockKind::Other(_)) {
            return None;
        }
        let mut brackets = 0usize;
        for j in start..line_end {
            match self.tokens[j].token {
                Token::LBracket => brackets += 1,
                Token::RBracket => brackets = brackets.saturating_sub(1),
                Token::Colon if brackets == 0 => return None,
                _ => {}
            }
        }
        let next = (line_end..end).find(|&j| self.tokens[j].token != Token::Newline)?;
        (self.tokens[next].token == Token::LBrace).then_some(next)
    }

    /// First `{` on the line that is not inside a `[...]` settings list.
    fn find_open_brace(&self, line: Range<usize>) -> Option<usize> {
        let mut brackets = 0usize;
        for i in line {
            match self.tokens[i].token {
                Token::LBracket => brackets += 1,
                Token::RBracket => brackets = brackets.saturating_sub(1),
                Token::LBrace if brackets == 0 => return Some(i),
                _ => {}
            }
        }
        None
    }

    fn keyword_text(&self, start: usize) -> String {
        match &self.tokens[start].token {
            Token::Ident(s) => s.clone(),
            _ => "anonymous".to_string(),
        }
    }

    fn block(
        &self,
        start: usize,
        open: usize,
        close: usize,
        depth: usize,
    ) -> Result<Block, ScanError> {
        let kind = match self.token(start) {
            Some(tok) => BlockKind::from_token(tok),
            None => BlockKind::Other(String::new()),
        };
        let header = self.header(start + 1..open, &kind);
        let body = open + 1..close;

        let children = match kind {
            BlockKind::Other(_) => Vec::new(),
            _ if depth > MAX_DEPTH => {
                return Err(ScanError::TooDeep {
                    location: self.location(start),
                });
            }
            _ => self.scan_range(body.clone(), depth)?,
        };

        tracing::trace!(
            keyword = kind.as_str(),
            name = header.name.as_deref().unwrap_or(""),
            line = self.location(start).line,
            "scanned block"
        );

        Ok(Block {
            kind,
            start,
            header,
            open,
            close,
            children,
        })
    }

    fn header(&self, range: Range<usize>, kind: &BlockKind) -> Header {
        let mut header = Header::default();
        let mut i = range.start;

        // Only keyword blocks carry a name; `{` alone has none.
        if !matches!(kind, BlockKind::Other(k) if k.is_empty()) {
            let mut parts = Vec::new();
            while let Some(name) = self.name_at(i, range.end) {
                parts.push(name.to_string());
                i += 1;
                if i < range.end && self.tokens[i].token == Token::Dot {
                    i += 1;
                } else {
                    break;
                }
            }
            header.name_parts = parts;
        }

        if i + 1 < range.end && self.tokens[i].token.is_keyword("as") {
            header.alias = self.name_at(i + 1, range.end).map(str::to_string);
            i += 2;
        }

        if i < range.end && self.tokens[i].token == Token::LBracket {
            if let Some(close) = self.matching(i, range.end, &Token::LBracket, &Token::RBracket) {
                header.settings = Some(i + 1..close);
            }
        }

        header.name = (!header.name_parts.is_empty()).then(|| header.name_parts.join("."));
        header
    }

    fn name_at(&self, i: usize, end: usize) -> Option<&str> {
        if i >= end {
            return None;
        }
        self.tokens[i].token.name()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Block(Block),
    /// Token range of one non-empty line, newline excluded.
    Line(Range<usize>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub kind: BlockKind,
    /// Index of the first header token (normally the keyword).
    pub start: usize,
    pub header: Header,
    /// Index of the opening `{`.
    pub open: usize,
    /// Index of the matching `}`.
    pub close: usize,
    pub children: Vec<Segment>,
}

impl Block {
    /// Token range strictly between the braces.
    pub fn body(&self) -> Range<usize> {
        self.open + 1..self.close
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Header {
    /// Dotted name split into segments, e.g. `["auth", "users"]`.
    pub name_parts: Vec<String>,
    pub name: Option<String>,
    pub alias: Option<String>,
    /// Token range inside the `[...]` following the name.
    pub settings: Option<Range<usize>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockKind {
    Table,
    TableGroup,
    Ref,
    Project,
    Note,
    Indexes,
    Other(String),
}

impl BlockKind {
    fn from_token(tok: &Token) -> Self {
        let Token::Ident(word) = tok else {
            return Self::Other(String::new());
        };
        [
            ("Table", Self::Table),
            ("TableGroup", Self::TableGroup),
            ("Ref", Self::Ref),
            ("Project", Self::Project),
            ("Note", Self::Note),
            ("indexes", Self::Indexes),
        ]
        .into_iter()
        .find(|(kw, _)| word.eq_ignore_ascii_case(kw))
        .map_or_else(|| Self::Other(word.clone()), |(_, kind)| kind)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Table => "Table",
            Self::TableGroup => "TableGroup",
            Self::Ref => "Ref",
            Self::Project => "Project",
            Self::Note => "Note",
            Self::Indexes => "indexes",
            Self::Other(word) => word,
        }
    }
}
