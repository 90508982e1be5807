//! Table body parsing: columns, column settings, notes and indexes.

use std::ops::Range;

use crate::ast::{Column, Index, RelationKind, Relationship, Table, table_key};
use crate::color;
use crate::diagnostic::Diagnostic;
use crate::lexer::Token;
use crate::refs;
use crate::scanner::{Block, BlockKind, Header, Segment, TokenStream};
use crate::settings::{self, Setting};

/// A table as declared, before group membership and color are settled.
#[derive(Debug, Clone, PartialEq)]
pub struct TableDecl {
    pub name: String,
    pub schema: Option<String>,
    pub alias: Option<String>,
    pub columns: Vec<Column>,
    pub indexes: Vec<Index>,
    pub note: Option<String>,
    pub header_color: Option<String>,
    pub color: Option<String>,
    /// Relationships from inline `ref:` settings, in column order.
    pub relationships: Vec<Relationship>,
}

impl TableDecl {
    pub fn key(&self) -> String {
        table_key(self.schema.as_deref(), &self.name)
    }

    /// Finish the record. Color precedence: `headercolor`, `color`, the
    /// group's color, then the generated fallback.
    pub fn finish(
        self,
        group_id: Option<String>,
        group_color: Option<&str>,
    ) -> (Table, Vec<Relationship>) {
        let key = self.key();
        let color = color::resolve(
            [self.header_color.as_deref(), self.color.as_deref()],
            group_color,
            &key,
        );
        let table = Table {
            name: self.name,
            schema: self.schema,
            alias: self.alias,
            columns: self.columns,
            indexes: self.indexes,
            note: self.note,
            group_id,
            color,
        };
        (table, self.relationships)
    }
}

/// Parse one `Table` block. Returns `None` when the block has no name or an
/// empty body.
pub fn parse_table(
    stream: &TokenStream,
    block: &Block,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<TableDecl> {
    let Some((schema, name)) = split_name(&block.header) else {
        diagnostics.push(stream.diagnostic(block.start, "table block has no name; skipped"));
        return None;
    };

    let empty_body = match (stream.span(block.open), stream.span(block.close)) {
        (Some(open), Some(close)) => open.end == close.start,
        _ => true,
    };
    if empty_body {
        diagnostics.push(stream.diagnostic(
            block.start,
            format!("table `{name}` has an empty body; skipped"),
        ));
        return None;
    }

    let mut decl = TableDecl {
        name,
        schema,
        alias: block.header.alias.clone(),
        columns: Vec::new(),
        indexes: Vec::new(),
        note: None,
        header_color: None,
        color: None,
        relationships: Vec::new(),
    };

    let mut setting_note = None;
    if let Some(range) = block.header.settings.clone() {
        for setting in settings::parse(stream, range) {
            match setting {
                Setting::Pair { key, value, at } => match key.as_str() {
                    "headercolor" => decl.header_color = settings::color_text(stream, value),
                    "color" => decl.color = settings::color_text(stream, value),
                    "note" => setting_note = settings::quoted_text(stream, value),
                    _ => diagnostics.push(stream.diagnostic(
                        at,
                        format!("unknown table setting `{key}`"),
                    )),
                },
                Setting::Flag { words, at } => {
                    diagnostics.push(stream.diagnostic(
                        at,
                        format!("unknown table setting `{words}`"),
                    ))
                }
                Setting::Invalid { at } => diagnostics.push(stream.diagnostic(
                    at,
                    "malformed table setting",
                )),
            }
        }
    }

    let key = decl.key();
    for segment in &block.children {
        match segment {
            Segment::Line(line) => body_line(stream, line.clone(), &key, &mut decl, diagnostics),
            Segment::Block(child) => match child.kind {
                BlockKind::Note => {
                    if let Some(note) = block_note(stream, child) {
                        decl.note = Some(note);
                    }
                }
                BlockKind::Indexes => parse_indexes(stream, child, &mut decl, diagnostics),
                _ => diagnostics.push(stream.diagnostic(
                    child.start,
                    format!(
                        "unexpected `{}` block inside table `{key}`; skipped",
                        child.kind.as_str()
                    ),
                )),
            },
        }
    }

    if decl.note.is_none() {
        decl.note = setting_note;
    }

    tracing::trace!(
        table = %key,
        columns = decl.columns.len(),
        refs = decl.relationships.len(),
        "parsed table"
    );
    Some(decl)
}

/// `schema.name` or `name`; extra leading segments stay in the schema.
fn split_name(header: &Header) -> Option<(Option<String>, String)> {
    let (name, schema) = header.name_parts.split_last()?;
    let schema = (!schema.is_empty()).then(|| schema.join("."));
    Some((schema, name.clone()))
}

/// First quoted string in a `Note { ... }` block.
pub fn block_note(stream: &TokenStream, block: &Block) -> Option<String> {
    stream.tokens(block.body()).find_map(Token::quoted).map(str::to_string)
}

/// `Note: '<text>'` on one line. `Some(None)` when the line is a note line
/// whose value is not quoted.
pub fn note_line(stream: &TokenStream, line: Range<usize>) -> Option<Option<String>> {
    let is_note = stream.token(line.start)?.is_keyword("Note")
        && line.len() > 1
        && stream.token(line.start + 1) == Some(&Token::Colon);
    is_note.then(|| settings::quoted_text(stream, line.start + 2..line.end))
}

fn body_line(
    stream: &TokenStream,
    line: Range<usize>,
    key: &str,
    decl: &mut TableDecl,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if let Some(note) = note_line(stream, line.clone()) {
        match note {
            Some(note) => decl.note = Some(note),
            None => diagnostics.push(stream.diagnostic(
                line.start,
                "table note must be a quoted string",
            )),
        }
        return;
    }
    // Collected with the standalone references, in document order.
    if refs::short_form(stream, line.clone()).is_some() {
        return;
    }
    match parse_column(stream, line.clone(), key, diagnostics) {
        Some((column, relationship)) => {
            decl.columns.push(column);
            decl.relationships.extend(relationship);
        }
        None => diagnostics.push(stream.diagnostic(
            line.start,
            "unrecognized line in table body; skipped",
        )),
    }
}

/// `<name> <type> [settings]?`
fn parse_column(
    stream: &TokenStream,
    line: Range<usize>,
    table: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<(Column, Option<Relationship>)> {
    let name = stream.token(line.start)?.name()?.to_string();
    let (typ, after_type) = parse_type(stream, line.start + 1, line.end)?;

    let mut column = Column {
        name,
        typ,
        ..Default::default()
    };
    let mut relationship = None;

    let Some(open) = (after_type..line.end).find(|&i| stream.token(i) == Some(&Token::LBracket))
    else {
        return Some((column, None));
    };
    let close = match stream.matching(open, line.end, &Token::LBracket, &Token::RBracket) {
        Some(close) => close,
        None => {
            diagnostics.push(stream.diagnostic(
                open,
                format!("unclosed settings on column `{}`", column.name),
            ));
            line.end
        }
    };

    for setting in settings::parse(stream, open + 1..close) {
        match setting {
            Setting::Flag { words, at } => match words.as_str() {
                "primary key" | "pk" => column.pk = true,
                "unique" => column.unique = true,
                "not null" => column.not_null = true,
                "null" => {}
                "increment" => column.increment = true,
                _ => diagnostics.push(stream.diagnostic(
                    at,
                    format!("unknown column setting `{words}`"),
                )),
            },
            Setting::Pair { key, value, at } => match key.as_str() {
                "default" => column.default_value = settings::value_text(stream, value),
                "note" => match settings::quoted_text(stream, value) {
                    Some(note) => column.note = Some(note),
                    None => diagnostics.push(stream.diagnostic(
                        at,
                        "column note must be a quoted string",
                    )),
                },
                "ref" if column.reference.is_some() => diagnostics.push(stream.diagnostic(
                    at,
                    format!("column `{}` declares more than one ref; extra ignored", column.name),
                )),
                "ref" => match inline_ref(stream, value) {
                    Some((kind, target)) => {
                        let raw = stream.text(target.clone()).to_string();
                        let to = refs::endpoint(stream, target);
                        if to.malformed {
                            diagnostics.push(stream.diagnostic(
                                at,
                                format!(
                                    "ref target `{raw}` has no table; using `{}`",
                                    refs::UNKNOWN_TABLE
                                ),
                            ));
                        }
                        relationship = Some(refs::inline(table, &column.name, kind, to));
                        column.reference = Some(raw);
                    }
                    None => diagnostics.push(stream.diagnostic(at, "malformed ref setting")),
                },
                _ => diagnostics.push(stream.diagnostic(
                    at,
                    format!("unknown column setting `{key}`"),
                )),
            },
            Setting::Invalid { at } => diagnostics.push(stream.diagnostic(
                at,
                "malformed column setting",
            )),
        }
    }

    Some((column, relationship))
}

/// The type token: a quoted string, or a run of adjacent tokens where
/// parenthesised arguments may contain spaces and a trailing `[]` belongs
/// to the type.
fn parse_type(stream: &TokenStream, start: usize, end: usize) -> Option<(String, usize)> {
    match stream.token(start).filter(|_| start < end)? {
        Token::Str(s) => return Some((s.clone(), start + 1)),
        Token::Ident(_) | Token::Num(_) => {}
        _ => return None,
    }

    let mut j = start + 1;
    while j < end && stream.adjacent(j) {
        match stream.token(j) {
            Some(Token::LParen) => {
                j = stream
                    .matching(j, end, &Token::LParen, &Token::RParen)
                    .map_or(end, |close| close + 1);
            }
            Some(Token::LBracket)
                if stream.token(j + 1) == Some(&Token::RBracket) && j + 1 < end =>
            {
                j += 2;
            }
            Some(Token::LBracket) => break,
            _ => j += 1,
        }
    }

    Some((stream.text(start..j).to_string(), j))
}

/// `<op> <target>` from a `ref:` value; the target as a token range.
fn inline_ref(stream: &TokenStream, value: Range<usize>) -> Option<(RelationKind, Range<usize>)> {
    let kind = stream
        .token(value.start)
        .filter(|_| !value.is_empty())
        .and_then(Token::operator)
        .and_then(RelationKind::from_operator)?;
    let target = value.start + 1..value.end;
    (!target.is_empty()).then_some((kind, target))
}

fn parse_indexes(
    stream: &TokenStream,
    block: &Block,
    decl: &mut TableDecl,
    diagnostics: &mut Vec<Diagnostic>,
) {
    for segment in &block.children {
        let Segment::Line(line) = segment else {
            continue;
        };
        match parse_index(stream, line.clone(), diagnostics) {
            Ok(index) => {
                if index.pk {
                    let named = |c: &&mut Column| index.columns.contains(&c.name);
                    for column in decl.columns.iter_mut().filter(named) {
                        column.pk = true;
                    }
                }
                decl.indexes.push(index);
            }
            Err(reason) => diagnostics.push(stream.diagnostic(line.start, reason)),
        }
    }
}

fn parse_index(
    stream: &TokenStream,
    line: Range<usize>,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<Index, &'static str> {
    let mut index = Index::default();

    let settings_at = match stream.token(line.start) {
        Some(Token::LParen) => {
            let close = stream
                .matching(line.start, line.end, &Token::LParen, &Token::RParen)
                .ok_or("unclosed index column list")?;
            for item in stream.tokens(line.start + 1..close) {
                match item {
                    Token::Ident(name) | Token::Str(name) => index.columns.push(name.clone()),
                    Token::Comma => {}
                    Token::Expr(_) => return Err("expression index not supported; skipped"),
                    _ => return Err("malformed index column list"),
                }
            }
            close + 1
        }
        Some(Token::Expr(_)) => return Err("expression index not supported; skipped"),
        Some(tok) => {
            let name = tok.name().ok_or("malformed index declaration")?;
            index.columns.push(name.to_string());
            line.start + 1
        }
        None => return Err("empty index declaration"),
    };

    if index.columns.is_empty() {
        return Err("index has no columns");
    }

    if settings_at < line.end && stream.token(settings_at) == Some(&Token::LBracket) {
        let close = stream
            .matching(settings_at, line.end, &Token::LBracket, &Token::RBracket)
            .unwrap_or(line.end);
        for setting in settings::parse(stream, settings_at + 1..close) {
            match setting {
                Setting::Flag { words, at } => match words.as_str() {
                    "pk" | "primary key" => index.pk = true,
                    "unique" => index.unique = true,
                    _ => diagnostics.push(stream.diagnostic(
                        at,
                        format!("unknown index setting `{words}`"),
                    )),
                },
                Setting::Pair { key, value, at } => match key.as_str() {
                    "name" => index.name = settings::value_text(stream, value),
                    "type" => index.index_type = settings::value_text(stream, value),
                    "note" => index.note = settings::quoted_text(stream, value),
                    _ => diagnostics.push(stream.diagnostic(
                        at,
                        format!("unknown index setting `{key}`"),
                    )),
                },
                Setting::Invalid { at } => diagnostics.push(stream.diagnostic(
                    at,
                    "malformed index setting",
                )),
            }
        }
    }

    Ok(index)
}
