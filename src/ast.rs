use std::fmt;

use serde::{Deserialize, Serialize};

/// The complete result of parsing one DSL document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedDatabase {
    pub tables: Vec<Table>,
    pub relationships: Vec<Relationship>,
    pub table_groups: Vec<TableGroup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<Project>,
}

impl ParsedDatabase {
    /// Look up a table by its identity key (`schema.name` or `name`).
    pub fn table(&self, key: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.key() == key)
    }

    pub fn group(&self, id: &str) -> Option<&TableGroup> {
        self.table_groups.iter().find(|g| g.id == id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    pub columns: Vec<Column>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indexes: Vec<Index>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    pub color: String,
}

impl Table {
    /// Identity key used for deduplication and cross-references.
    pub fn key(&self) -> String {
        table_key(self.schema.as_deref(), &self.name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// Build an identity key from an optional schema and a table name.
pub fn table_key(schema: Option<&str>, name: &str) -> String {
    match schema {
        Some(schema) => format!("{schema}.{name}"),
        None => name.to_string(),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub typ: String,
    pub pk: bool,
    pub unique: bool,
    pub not_null: bool,
    #[serde(default)]
    pub increment: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Raw target of an inline `ref:` setting, e.g. `users.id`.
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "ref")]
    pub reference: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Index {
    pub columns: Vec<String>,
    pub unique: bool,
    pub pk: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "type")]
    pub index_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    pub from_table: String,
    pub from_column: String,
    pub to_table: String,
    pub to_column: String,
    #[serde(rename = "type")]
    pub kind: RelationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_delete: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_update: Option<String>,
}

/// Directionality operator between two columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationKind {
    /// `>`
    #[serde(rename = ">")]
    ManyToOne,
    /// `<`
    #[serde(rename = "<")]
    OneToMany,
    /// `-`
    #[serde(rename = "-")]
    OneToOne,
    /// `<>`
    #[serde(rename = "<>")]
    ManyToMany,
}

impl RelationKind {
    pub fn from_operator(op: &str) -> Option<Self> {
        match op {
            ">" => Some(Self::ManyToOne),
            "<" => Some(Self::OneToMany),
            "-" => Some(Self::OneToOne),
            "<>" => Some(Self::ManyToMany),
            _ => None,
        }
    }

    pub fn operator(self) -> &'static str {
        match self {
            Self::ManyToOne => ">",
            Self::OneToMany => "<",
            Self::OneToOne => "-",
            Self::ManyToMany => "<>",
        }
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.operator())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableGroup {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub color: String,
    /// Identity keys of member tables, in claim order.
    pub tables: Vec<String>,
}

/// Group id derived from its declared name.
pub fn group_id(name: &str) -> String {
    format!("group_{}", name.to_lowercase())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_key() {
        assert_eq!(table_key(None, "users"), "users");
        assert_eq!(table_key(Some("auth"), "users"), "auth.users");
    }

    #[test]
    fn test_group_id_lowercases() {
        assert_eq!(group_id("E_Commerce"), "group_e_commerce");
    }

    #[test]
    fn test_relation_kind_operators() {
        for op in [">", "<", "-", "<>"] {
            let kind = RelationKind::from_operator(op).unwrap();
            assert_eq!(kind.operator(), op);
        }
        assert_eq!(RelationKind::from_operator("->"), None);
    }

    #[test]
    fn test_json_shape() {
        let rel = Relationship {
            from_table: "posts".into(),
            from_column: "user_id".into(),
            to_table: "users".into(),
            to_column: "id".into(),
            kind: RelationKind::ManyToOne,
            name: None,
            on_delete: None,
            on_update: None,
        };
        let json = serde_json::to_value(&rel).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "fromTable": "posts",
                "fromColumn": "user_id",
                "toTable": "users",
                "toColumn": "id",
                "type": ">",
            })
        );
    }

    #[test]
    fn test_column_json_keys() {
        let col = Column {
            name: "created_at".into(),
            typ: "timestamp".into(),
            not_null: true,
            default_value: Some("now()".into()),
            ..Default::default()
        };
        let json = serde_json::to_value(&col).unwrap();
        assert_eq!(json["type"], "timestamp");
        assert_eq!(json["notNull"], true);
        assert_eq!(json["defaultValue"], "now()");
        assert!(json.get("ref").is_none());
    }
}
