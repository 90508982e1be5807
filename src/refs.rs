//! Relationship extraction from inline `ref:` settings and `Ref` statements.

use std::ops::Range;

use crate::ast::{RelationKind, Relationship};
use crate::lexer::Token;
use crate::scanner::TokenStream;
use crate::settings::{self, Setting};

/// Table used when a reference target has no table segment.
pub const UNKNOWN_TABLE: &str = "unknown";

/// Schema that collapses to an unqualified table name in reference targets.
pub const DEFAULT_SCHEMA: &str = "public";

/// One side of a relationship, normalized to an identity key and column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub table: String,
    pub column: String,
    /// The target had no usable `table.column` shape and took the fallback.
    pub malformed: bool,
}

/// Split a raw target on `.`.
///
/// - `schema.table.column`: `schema.table`, or bare `table` when the schema
///   is empty or [`DEFAULT_SCHEMA`]
/// - `table.column`
/// - anything else: [`UNKNOWN_TABLE`] with the raw target as the column
pub fn split_target(target: &str) -> Endpoint {
    let parts: Vec<&str> = target.split('.').collect();
    from_parts(&parts, target)
}

/// Endpoint from the tokens of a target. Quoted segments lose their quotes,
/// so `"order items".id` points at the table keyed `order items`.
pub fn endpoint(stream: &TokenStream, range: Range<usize>) -> Endpoint {
    let raw = stream.text(range.clone()).trim();
    match name_parts(stream, range) {
        Some(parts) => {
            let parts: Vec<&str> = parts.iter().map(String::as_str).collect();
            from_parts(&parts, raw)
        }
        None => from_parts(&[], raw),
    }
}

/// Segments of `name(.name)*`, or `None` for any other token shape.
pub fn name_parts(stream: &TokenStream, range: Range<usize>) -> Option<Vec<String>> {
    let mut parts = Vec::new();
    let mut expect_name = true;
    for tok in stream.tokens(range) {
        match (expect_name, tok) {
            (true, tok) => parts.push(tok.name()?.to_string()),
            (false, Token::Dot) => {}
            (false, _) => return None,
        }
        expect_name = !expect_name;
    }
    (!parts.is_empty() && !expect_name).then_some(parts)
}

fn from_parts(parts: &[&str], raw: &str) -> Endpoint {
    match parts {
        [schema, table, column] => {
            let table = if schema.is_empty() || *schema == DEFAULT_SCHEMA {
                table.to_string()
            } else {
                format!("{schema}.{table}")
            };
            Endpoint {
                table,
                column: column.to_string(),
                malformed: false,
            }
        }
        [table, column] => Endpoint {
            table: table.to_string(),
            column: column.to_string(),
            malformed: false,
        },
        _ => Endpoint {
            table: UNKNOWN_TABLE.to_string(),
            column: raw.to_string(),
            malformed: true,
        },
    }
}

/// Relationship declared by a column's `ref: <op> <target>` setting.
pub fn inline(
    from_table: &str,
    from_column: &str,
    kind: RelationKind,
    to: Endpoint,
) -> Relationship {
    Relationship {
        from_table: from_table.to_string(),
        from_column: from_column.to_string(),
        to_table: to.table,
        to_column: to.column,
        kind,
        name: None,
        on_delete: None,
        on_update: None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RefError {
    #[error("reference has no relationship operator")]
    MissingOperator,
    #[error("reference is missing an endpoint")]
    MissingEndpoint,
}

/// A parsed reference expression and whether either side took the fallback.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRef {
    pub relationship: Relationship,
    pub malformed: bool,
}

/// If the line is a short-form `Ref [name]: ...` statement, return the
/// optional name and the token range after the colon.
pub fn short_form(
    stream: &TokenStream,
    line: Range<usize>,
) -> Option<(Option<String>, Range<usize>)> {
    if !stream.token(line.start)?.is_keyword("Ref") {
        return None;
    }
    let mut i = line.start + 1;
    let mut name = None;
    if let Some(n) = stream.token(i).filter(|_| i < line.end).and_then(Token::name) {
        name = Some(n.to_string());
        i += 1;
    }
    if i < line.end && stream.token(i) == Some(&Token::Colon) {
        Some((name, i + 1..line.end))
    } else {
        None
    }
}

/// Parse `<ref1> <op> <ref2> [settings]?`.
pub fn expression(
    stream: &TokenStream,
    range: Range<usize>,
    name: Option<&str>,
) -> Result<ParsedRef, RefError> {
    let settings_start = (range.clone())
        .find(|&i| stream.token(i) == Some(&Token::LBracket))
        .unwrap_or(range.end);
    let op_at = (range.start..settings_start)
        .find(|&i| stream.token(i).and_then(Token::operator).is_some())
        .ok_or(RefError::MissingOperator)?;
    let kind = stream
        .token(op_at)
        .and_then(Token::operator)
        .and_then(RelationKind::from_operator)
        .ok_or(RefError::MissingOperator)?;

    let left = range.start..op_at;
    let right = op_at + 1..settings_start;
    if left.is_empty() || right.is_empty() {
        return Err(RefError::MissingEndpoint);
    }

    let from = endpoint(stream, left);
    let to = endpoint(stream, right);
    let mut relationship = Relationship {
        from_table: from.table,
        from_column: from.column,
        to_table: to.table,
        to_column: to.column,
        kind,
        name: name.map(str::to_string),
        on_delete: None,
        on_update: None,
    };

    if settings_start < range.end {
        let close = stream
            .matching(settings_start, range.end, &Token::LBracket, &Token::RBracket)
            .unwrap_or(range.end);
        for setting in settings::parse(stream, settings_start + 1..close) {
            if let Setting::Pair { key, value, .. } = setting {
                match key.as_str() {
                    "delete" => relationship.on_delete = settings::value_text(stream, value),
                    "update" => relationship.on_update = settings::value_text(stream, value),
                    _ => {}
                }
            }
        }
    }

    Ok(ParsedRef {
        relationship,
        malformed: from.malformed || to.malformed,
    })
}
