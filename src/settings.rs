//! `[...]` settings lists: `pk, not null, default: 0, note: 'x'`.

use std::ops::Range;

use crate::lexer::Token;
use crate::scanner::TokenStream;

#[derive(Debug, Clone, PartialEq)]
pub enum Setting {
    /// Bare words, e.g. `primary key`, `not null`.
    Flag { words: String, at: usize },
    /// `key: value`; `value` is the token range after the colon.
    Pair {
        key: String,
        value: Range<usize>,
        at: usize,
    },
    /// An item that is neither shape.
    Invalid { at: usize },
}

/// Split a settings token range into items.
pub fn parse(stream: &TokenStream, range: Range<usize>) -> Vec<Setting> {
    split_commas(stream, range)
        .into_iter()
        .filter(|item| !item.is_empty())
        .map(|item| classify(stream, item))
        .collect()
}

fn split_commas(stream: &TokenStream, range: Range<usize>) -> Vec<Range<usize>> {
    let mut items = Vec::new();
    let mut depth = 0usize;
    let mut start = range.start;
    for i in range.clone() {
        match stream.token(i) {
            Some(Token::LParen) => depth += 1,
            Some(Token::RParen) => depth = depth.saturating_sub(1),
            Some(Token::Comma) if depth == 0 => {
                items.push(start..i);
                start = i + 1;
            }
            _ => {}
        }
    }
    items.push(start..range.end);
    items
}

fn classify(stream: &TokenStream, item: Range<usize>) -> Setting {
    let at = item.start;
    let first = stream.token(item.start);
    let second = stream.token(item.start + 1).filter(|_| item.len() > 1);

    if let (Some(Token::Ident(key)), Some(Token::Colon)) = (first, second) {
        return Setting::Pair {
            key: key.clone(),
            value: item.start + 2..item.end,
            at,
        };
    }

    let words: Option<Vec<&str>> = stream
        .tokens(item)
        .map(|tok| match tok {
            Token::Ident(w) => Some(w.as_str()),
            _ => None,
        })
        .collect();
    match words {
        Some(words) => Setting::Flag {
            words: words.join(" "),
            at,
        },
        None => Setting::Invalid { at },
    }
}

/// Literal value text: quoted contents with the quote markers stripped,
/// otherwise the raw source text (`-1`, `now()`, `true`).
pub fn value_text(stream: &TokenStream, value: Range<usize>) -> Option<String> {
    if value.len() == 1 {
        if let Some(text) = stream.token(value.start).and_then(Token::quoted) {
            return Some(text.to_string());
        }
    }
    let raw = stream.text(value).trim();
    (!raw.is_empty()).then(|| raw.to_string())
}

/// Contents of a quoted value; `None` for bare values.
pub fn quoted_text(stream: &TokenStream, value: Range<usize>) -> Option<String> {
    if value.len() != 1 {
        return None;
    }
    stream
        .token(value.start)
        .and_then(Token::quoted)
        .map(str::to_string)
}

/// Color value normalized to start with `#`.
pub fn color_text(stream: &TokenStream, value: Range<usize>) -> Option<String> {
    let text = value_text(stream, value)?;
    let text = text.trim();
    if text.is_empty() {
        None
    } else if text.starts_with('#') {
        Some(text.to_string())
    } else {
        Some(format!("#{text}"))
    }
}
