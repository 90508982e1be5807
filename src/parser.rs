use std::collections::{HashMap, HashSet};
use std::ops::Range;

use crate::ast::*;
use crate::color;
use crate::diagnostic::Diagnostic;
use crate::lexer::{LexError, Token};
use crate::refs;
use crate::scanner::{Block, BlockKind, ScanError, Segment, TokenStream};
use crate::settings::{self, Setting};
use crate::table::{self, TableDecl};

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Lex error: {0}")]
    Lex(#[from] LexError),
    #[error("Scan error: {0}")]
    Scan(#[from] ScanError),
    #[error("Strict mode: {0}")]
    Strict(Diagnostic),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseOptions {
    /// Fail on the first diagnostic instead of skipping.
    pub strict: bool,
}

pub struct Parser<'a> {
    stream: TokenStream<'a>,
    options: ParseOptions,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a str) -> Result<Self, ParseError> {
        Self::with_options(input, ParseOptions::default())
    }

    pub fn with_options(input: &'a str, options: ParseOptions) -> Result<Self, ParseError> {
        let stream = TokenStream::new(input)?;
        Ok(Self {
            stream,
            options,
            diagnostics: Vec::new(),
        })
    }

    /// Lines and blocks skipped or degraded by the last `parse`, in document
    /// order.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn parse(&mut self) -> Result<ParsedDatabase, ParseError> {
        self.diagnostics.clear();
        let segments = self.stream.scan()?;

        let mut assembler = Assembler::new(&self.stream);
        let database = assembler.assemble(&segments);

        let mut diagnostics = assembler.diagnostics;
        diagnostics.sort_by_key(|d| d.location);
        self.diagnostics = diagnostics;

        if self.options.strict {
            if let Some(first) = self.diagnostics.first() {
                return Err(ParseError::Strict(first.clone()));
            }
        }

        tracing::debug!(
            tables = database.tables.len(),
            relationships = database.relationships.len(),
            groups = database.table_groups.len(),
            diagnostics = self.diagnostics.len(),
            "parsed document"
        );
        Ok(database)
    }
}

/// Parse a document with default options.
pub fn parse(input: &str) -> Result<ParsedDatabase, ParseError> {
    Parser::new(input)?.parse()
}

/// Merges scanned blocks into one `ParsedDatabase`.
struct Assembler<'s, 'a> {
    stream: &'s TokenStream<'a>,
    tables: Vec<Table>,
    defined: HashSet<String>,
    /// Table key -> index of the group that claimed it first.
    owners: HashMap<String, usize>,
    /// Header token of every table block that was dropped.
    discarded: HashSet<usize>,
    groups: Vec<TableGroup>,
    relationships: Vec<Relationship>,
    project: Option<Project>,
    diagnostics: Vec<Diagnostic>,
}

impl<'s, 'a> Assembler<'s, 'a> {
    fn new(stream: &'s TokenStream<'a>) -> Self {
        Self {
            stream,
            tables: Vec::new(),
            defined: HashSet::new(),
            owners: HashMap::new(),
            discarded: HashSet::new(),
            groups: Vec::new(),
            relationships: Vec::new(),
            project: None,
            diagnostics: Vec::new(),
        }
    }

    fn assemble(&mut self, segments: &[Segment]) -> ParsedDatabase {
        // Group-scoped tables are canonical, so groups go first.
        for segment in segments {
            if let Segment::Block(block) = segment {
                if block.kind == BlockKind::TableGroup {
                    self.group(block);
                }
            }
        }

        for segment in segments {
            let Segment::Block(block) = segment else {
                continue;
            };
            match &block.kind {
                BlockKind::Table => self.top_level_table(block),
                BlockKind::Project => self.project(block),
                BlockKind::TableGroup | BlockKind::Ref => {}
                kind => self.diagnostics.push(self.stream.diagnostic(
                    block.start,
                    format!("unsupported `{}` block skipped", kind.as_str()),
                )),
            }
        }

        self.standalone_refs(segments, true);
        self.resolve_aliases();

        ParsedDatabase {
            tables: std::mem::take(&mut self.tables),
            relationships: std::mem::take(&mut self.relationships),
            table_groups: std::mem::take(&mut self.groups),
            project: self.project.take(),
        }
    }

    fn group(&mut self, block: &Block) {
        let index = match block.header.name.clone() {
            Some(name) => Some(self.open_group(block, name)),
            None => {
                self.diagnostics.push(self.stream.diagnostic(
                    block.start,
                    "table group has no name; its tables are ungrouped",
                ));
                None
            }
        };

        let mut body_note = None;
        for segment in &block.children {
            match segment {
                Segment::Block(child) => match child.kind {
                    BlockKind::Table => self.group_table(child, index),
                    BlockKind::Note => {
                        body_note = table::block_note(self.stream, child).or(body_note)
                    }
                    _ => self.diagnostics.push(self.stream.diagnostic(
                        child.start,
                        format!(
                            "unexpected `{}` block inside table group; skipped",
                            child.kind.as_str()
                        ),
                    )),
                },
                Segment::Line(line) => {
                    if let Some(note) = table::note_line(self.stream, line.clone()) {
                        body_note = note.or(body_note);
                    } else if refs::short_form(self.stream, line.clone()).is_some() {
                        // Collected with the standalone references.
                    } else if let Some(parts) = refs::name_parts(self.stream, line.clone()) {
                        if let Some(index) = index {
                            self.claim_by_name(index, parts.join("."), line.start);
                        }
                    } else {
                        self.diagnostics.push(self.stream.diagnostic(
                            line.start,
                            "unrecognized line in table group; skipped",
                        ));
                    }
                }
            }
        }

        if let (Some(index), Some(note)) = (index, body_note) {
            self.groups[index].note = Some(note);
        }
    }

    fn open_group(&mut self, block: &Block, name: String) -> usize {
        let mut explicit_color = None;
        let mut note = None;
        if let Some(range) = block.header.settings.clone() {
            for setting in settings::parse(self.stream, range) {
                match setting {
                    Setting::Pair { key, value, .. } if key == "color" => {
                        explicit_color = settings::color_text(self.stream, value)
                    }
                    Setting::Pair { key, value, .. } if key == "note" => {
                        note = settings::quoted_text(self.stream, value)
                    }
                    other => {
                        let at = match other {
                            Setting::Flag { at, .. }
                            | Setting::Pair { at, .. }
                            | Setting::Invalid { at } => at,
                        };
                        self.diagnostics
                            .push(self.stream.diagnostic(at, "unknown table group setting"));
                    }
                }
            }
        }

        let id = group_id(&name);
        if self.groups.iter().any(|g| g.id == id) {
            self.diagnostics.push(
                self.stream
                    .diagnostic(block.start, format!("duplicate table group id `{id}`")),
            );
        }

        let color = color::resolve([explicit_color.as_deref()], None, &name);
        self.groups.push(TableGroup {
            id,
            name,
            note,
            color,
            tables: Vec::new(),
        });
        self.groups.len() - 1
    }

    /// First claim wins; later claims are reported and ignored.
    fn claim(&mut self, index: usize, key: &str) -> usize {
        if let Some(&owner) = self.owners.get(key) {
            return owner;
        }
        self.owners.insert(key.to_string(), index);
        self.groups[index].tables.push(key.to_string());
        index
    }

    fn claim_by_name(&mut self, index: usize, key: String, at: usize) {
        let owner = self.claim(index, &key);
        if owner != index {
            let owner_id = self.groups[owner].id.clone();
            self.diagnostics.push(
                self.stream
                    .diagnostic(at, format!("table `{key}` already belongs to `{owner_id}`")),
            );
        }
    }

    fn group_table(&mut self, block: &Block, index: Option<usize>) {
        let Some(decl) = table::parse_table(self.stream, block, &mut self.diagnostics) else {
            self.discarded.insert(block.start);
            return;
        };
        let key = decl.key();
        if self.defined.contains(&key) {
            self.duplicate(block, &key);
            return;
        }
        let owner = match index {
            Some(index) => {
                let owner = self.claim(index, &key);
                if owner != index {
                    let owner_id = self.groups[owner].id.clone();
                    self.diagnostics.push(self.stream.diagnostic(
                        block.start,
                        format!("table `{key}` already belongs to `{owner_id}`"),
                    ));
                }
                Some(owner)
            }
            None => None,
        };
        self.add_table(decl, owner);
    }

    fn top_level_table(&mut self, block: &Block) {
        let Some(decl) = table::parse_table(self.stream, block, &mut self.diagnostics) else {
            self.discarded.insert(block.start);
            return;
        };
        let key = decl.key();
        if self.defined.contains(&key) {
            self.duplicate(block, &key);
            return;
        }
        let owner = self.owners.get(&key).copied();
        self.add_table(decl, owner);
    }

    fn duplicate(&mut self, block: &Block, key: &str) {
        self.discarded.insert(block.start);
        self.diagnostics.push(
            self.stream
                .diagnostic(block.start, format!("duplicate table `{key}` ignored")),
        );
    }

    fn add_table(&mut self, decl: TableDecl, owner: Option<usize>) {
        let (group_id, group_color) = match owner {
            Some(owner) => {
                let group = &self.groups[owner];
                (Some(group.id.clone()), Some(group.color.clone()))
            }
            None => (None, None),
        };
        self.defined.insert(decl.key());
        let (table, relationships) = decl.finish(group_id, group_color.as_deref());
        self.tables.push(table);
        self.relationships.extend(relationships);
    }

    fn project(&mut self, block: &Block) {
        let Some(name) = block.header.name.clone() else {
            self.diagnostics
                .push(self.stream.diagnostic(block.start, "project block has no name; skipped"));
            return;
        };
        if self.project.is_some() {
            self.diagnostics
                .push(self.stream.diagnostic(block.start, "duplicate project block ignored"));
            return;
        }

        let mut project = Project {
            name,
            database_type: None,
            note: None,
        };
        for segment in &block.children {
            match segment {
                Segment::Block(child) if child.kind == BlockKind::Note => {
                    project.note = table::block_note(self.stream, child);
                }
                Segment::Block(_) => {}
                Segment::Line(line) => {
                    if let Some(note) = table::note_line(self.stream, line.clone()) {
                        project.note = note;
                    } else if self
                        .stream
                        .token(line.start)
                        .is_some_and(|t| t.is_keyword("database_type"))
                        && self.stream.token(line.start + 1) == Some(&Token::Colon)
                    {
                        let value = line.start + 2..line.end;
                        project.database_type = settings::value_text(self.stream, value);
                    }
                }
            }
        }
        self.project = Some(project);
    }

    /// Walk the segment tree in document order collecting `Ref` statements.
    fn standalone_refs(&mut self, segments: &[Segment], top_level: bool) {
        for segment in segments {
            match segment {
                Segment::Line(line) => {
                    if let Some((name, rest)) = refs::short_form(self.stream, line.clone()) {
                        self.standalone_ref(line.start, rest, name.as_deref());
                    } else if top_level {
                        self.diagnostics.push(self.stream.diagnostic(
                            line.start,
                            "unrecognized top-level statement; skipped",
                        ));
                    }
                }
                Segment::Block(block) => match block.kind {
                    BlockKind::Ref => {
                        for child in &block.children {
                            match child {
                                Segment::Line(line) => self.standalone_ref(
                                    line.start,
                                    line.clone(),
                                    block.header.name.as_deref(),
                                ),
                                Segment::Block(inner) => {
                                    self.diagnostics.push(self.stream.diagnostic(
                                        inner.start,
                                        "unexpected block inside Ref; skipped",
                                    ))
                                }
                            }
                        }
                    }
                    BlockKind::Table if self.discarded.contains(&block.start) => {}
                    BlockKind::Table | BlockKind::TableGroup => {
                        self.standalone_refs(&block.children, false)
                    }
                    _ => {}
                },
            }
        }
    }

    /// Point endpoints written with a table alias at the aliased table.
    /// A table whose key equals the name wins over an alias.
    fn resolve_aliases(&mut self) {
        let keys: HashSet<String> = self.tables.iter().map(Table::key).collect();
        let aliases: HashMap<&str, String> = self
            .tables
            .iter()
            .filter_map(|t| t.alias.as_deref().map(|alias| (alias, t.key())))
            .filter(|(alias, _)| !keys.contains(*alias))
            .collect();
        if aliases.is_empty() {
            return;
        }
        for rel in &mut self.relationships {
            for table in [&mut rel.from_table, &mut rel.to_table] {
                if let Some(key) = aliases.get(table.as_str()) {
                    *table = key.clone();
                }
            }
        }
    }

    fn standalone_ref(&mut self, at: usize, range: Range<usize>, name: Option<&str>) {
        match refs::expression(self.stream, range, name) {
            Ok(parsed) => {
                if parsed.malformed {
                    self.diagnostics.push(self.stream.diagnostic(
                        at,
                        format!("reference endpoint has no table; using `{}`", refs::UNKNOWN_TABLE),
                    ));
                }
                self.relationships.push(parsed.relationship);
            }
            Err(e) => self
                .diagnostics
                .push(self.stream.diagnostic(at, format!("{e}; skipped"))),
        }
    }
}
