//! DBML schema parser for ER diagram renderers.
//!
//! Turns a document of `Table`, `TableGroup` and `Ref` declarations into a
//! [`ParsedDatabase`]: tables with their columns, relationships between
//! columns, and table groups, with every table and group carrying a color.
//!
//! ```
//! let db = dbmlerd::parse("Table posts { user_id integer [ref: > users.id] }").unwrap();
//! assert_eq!(db.tables[0].name, "posts");
//! assert_eq!(db.relationships[0].to_table, "users");
//! ```

pub mod ast;
pub mod color;
pub mod diagnostic;
pub mod lexer;
pub mod parser;
pub mod refs;
pub mod scanner;
pub mod settings;
pub mod table;

use serde::Serialize;
use wasm_bindgen::prelude::*;

pub use ast::{
    Column, Index, ParsedDatabase, Project, RelationKind, Relationship, Table, TableGroup,
};
pub use diagnostic::{Diagnostic, Location};
pub use parser::{ParseError, ParseOptions, Parser, parse};

/// A parse result together with everything that was skipped on the way.
#[derive(Debug, Clone, Serialize)]
pub struct ParseReport {
    #[serde(flatten)]
    pub database: ParsedDatabase,
    pub diagnostics: Vec<Diagnostic>,
}

/// Parse with diagnostics collected.
pub fn parse_report(source: &str, options: ParseOptions) -> Result<ParseReport, ParseError> {
    let mut parser = Parser::with_options(source, options)?;
    let database = parser.parse()?;
    Ok(ParseReport {
        database,
        diagnostics: parser.diagnostics().to_vec(),
    })
}

/// Initialize panic hook for better error messages in WASM
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();
}

/// Parse DBML source into the diagram model, serialized as JSON
#[wasm_bindgen(js_name = "parseDbml")]
pub fn parse_dbml(source: &str) -> Result<String, String> {
    let database = parse(source).map_err(|e| e.to_string())?;
    serde_json::to_string(&database).map_err(|e| e.to_string())
}

/// Like `parseDbml`, with a `diagnostics` array listing skipped lines
#[wasm_bindgen(js_name = "parseDbmlReport")]
pub fn parse_dbml_report(source: &str, strict: Option<bool>) -> Result<String, String> {
    let options = ParseOptions {
        strict: strict.unwrap_or(false),
    };
    let report = parse_report(source, options).map_err(|e| e.to_string())?;
    serde_json::to_string(&report).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dbml_json() {
        let json = parse_dbml("Table users { id integer [primary key] }").unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["tables"][0]["name"], "users");
        assert_eq!(value["tables"][0]["columns"][0]["pk"], true);
        assert_eq!(value["tableGroups"], serde_json::json!([]));
        assert!(value.get("project").is_none());
    }

    #[test]
    fn test_parse_dbml_error_message() {
        let err = parse_dbml("Table broken { id integer").unwrap_err();
        assert!(err.contains("Unterminated Table block"));
    }

    #[test]
    fn test_report_flattens_database() {
        let json = parse_dbml_report("Table t {\n  id int\n  ???\n}", None).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["tables"][0]["name"], "t");
        assert_eq!(value["diagnostics"][0]["location"]["line"], 3);
    }

    #[test]
    fn test_report_strict() {
        assert!(parse_dbml_report("Table t {\n  ???\n}", Some(true)).is_err());
    }

    #[test]
    fn test_json_round_trip() {
        let db = parse("TableGroup G { Table a { id int [ref: <> b.id] } }").unwrap();
        let json = serde_json::to_string(&db).unwrap();
        let back: ParsedDatabase = serde_json::from_str(&json).unwrap();
        assert_eq!(db, back);
    }
}
