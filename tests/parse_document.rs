use dbmlerd::{ParseError, Parser, RelationKind, parse};
use dbmlerd::refs::UNKNOWN_TABLE;
use dbmlerd::scanner::ScanError;

/// The document an editor starts with.
const DEFAULT_DOCUMENT: &str = r#"TableGroup E_Commerce {
  Table users {
    id integer [primary key]
    username varchar(255) [not null, unique]
    email varchar(255) [not null, unique]
    full_name varchar(255)
    created_at timestamp [default: `now()`]
    updated_at timestamp [default: `now()`]
  }

  Table posts {
    id integer [primary key]
    title varchar(255) [not null]
    body text
    user_id integer [ref: > users.id]
    created_at timestamp [default: `now()`]
    updated_at timestamp [default: `now()`]
  }

  Table comments {
    id integer [primary key]
    content text [not null]
    post_id integer [ref: > posts.id]
    user_id integer [ref: > users.id]
    created_at timestamp [default: `now()`]
  }
}

Table categories {
  id integer [primary key]
  name varchar(255) [not null]
  description text
  created_at timestamp [default: `now()`]
}"#;

#[test]
fn parse_default_document() {
    let mut parser = Parser::new(DEFAULT_DOCUMENT).expect("lexes");
    let db = parser.parse().expect("default document should parse");
    assert!(parser.diagnostics().is_empty(), "{:?}", parser.diagnostics());

    let names: Vec<_> = db.tables.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["users", "posts", "comments", "categories"]);

    assert_eq!(db.table_groups.len(), 1);
    let group = &db.table_groups[0];
    assert_eq!(group.id, "group_e_commerce");
    assert_eq!(group.name, "E_Commerce");
    assert_eq!(group.tables, vec!["users", "posts", "comments"]);
    assert_eq!(group.color, "#F0E68C");

    for name in ["users", "posts", "comments"] {
        let table = db.table(name).unwrap();
        assert_eq!(table.group_id.as_deref(), Some("group_e_commerce"));
        assert_eq!(table.color, group.color);
    }
    let categories = db.table("categories").unwrap();
    assert_eq!(categories.group_id, None);
    assert_eq!(categories.color, "#FF6B6B");

    let users = db.table("users").unwrap();
    assert_eq!(users.columns.len(), 6);
    let username = users.column("username").unwrap();
    assert_eq!(username.typ, "varchar(255)");
    assert!(username.not_null && username.unique && !username.pk);
    assert_eq!(
        users.column("created_at").unwrap().default_value.as_deref(),
        Some("now()")
    );

    let rels: Vec<_> = db
        .relationships
        .iter()
        .map(|r| {
            (
                r.from_table.as_str(),
                r.from_column.as_str(),
                r.to_table.as_str(),
                r.to_column.as_str(),
                r.kind,
            )
        })
        .collect();
    assert_eq!(
        rels,
        vec![
            ("posts", "user_id", "users", "id", RelationKind::ManyToOne),
            ("comments", "post_id", "posts", "id", RelationKind::ManyToOne),
            ("comments", "user_id", "users", "id", RelationKind::ManyToOne),
        ]
    );
}

#[test]
fn every_inline_ref_has_one_relationship() {
    let db = parse(DEFAULT_DOCUMENT).unwrap();
    let inline: Vec<_> = db
        .tables
        .iter()
        .flat_map(|t| t.columns.iter().map(move |c| (t, c)))
        .filter(|(_, c)| c.reference.is_some())
        .collect();
    assert_eq!(inline.len(), db.relationships.len());
    for (table, column) in inline {
        let matching = db
            .relationships
            .iter()
            .filter(|r| r.from_table == table.key() && r.from_column == column.name)
            .count();
        assert_eq!(matching, 1, "{}.{}", table.name, column.name);
    }
}

#[test]
fn full_feature_document() {
    let input = r#"
Project blog {
  database_type: 'PostgreSQL'
  Note: 'Blogging platform'
}

// Authentication lives in its own schema.
TableGroup Identity [color: #2ECC71, note: 'Who is who'] {
  Table auth.accounts as A [headercolor: #34495E] {
    id uuid [pk]
    email varchar(320) [unique, not null, note: 'login { address }']
    balance decimal(12, 2) [default: 0]
    Note: '''
      Accounts, one per person.
    '''
  }
  Table auth.sessions {
    id uuid [pk]
    account_id uuid [ref: > auth.accounts.id]
    expires_at timestamptz
  }
}

Table public.articles {
  id bigint [pk, increment]
  author_id uuid
  tags "text[]"
  status varchar [default: 'draft']

  indexes {
    (author_id, status) [name: 'idx_author_status']
    id [pk]
  }
}

Enum status {
  draft
  published
}

Ref author_fk: public.articles.author_id > auth.accounts.id [delete: cascade]
Ref: articles.id <> tags.article_id
Ref legacy {
  articles.id - archive
}
"#;
    let mut parser = Parser::new(input).unwrap();
    let db = parser.parse().unwrap();

    let project = db.project.as_ref().unwrap();
    assert_eq!(project.name, "blog");
    assert_eq!(project.database_type.as_deref(), Some("PostgreSQL"));

    let group = db.group("group_identity").unwrap();
    assert_eq!(group.color, "#2ECC71");
    assert_eq!(group.note.as_deref(), Some("Who is who"));
    assert_eq!(group.tables, vec!["auth.accounts", "auth.sessions"]);

    let accounts = db.table("auth.accounts").unwrap();
    assert_eq!(accounts.schema.as_deref(), Some("auth"));
    assert_eq!(accounts.alias.as_deref(), Some("A"));
    assert_eq!(accounts.color, "#34495E");
    assert_eq!(accounts.note.as_deref(), Some("Accounts, one per person."));
    assert_eq!(
        accounts.column("email").unwrap().note.as_deref(),
        Some("login { address }")
    );
    assert_eq!(accounts.column("balance").unwrap().typ, "decimal(12, 2)");
    assert_eq!(db.table("auth.sessions").unwrap().color, "#2ECC71");

    let articles = db.table("public.articles").unwrap();
    assert_eq!(articles.group_id, None);
    assert!(articles.column("id").unwrap().increment);
    assert_eq!(articles.column("tags").unwrap().typ, "text[]");
    assert_eq!(articles.indexes.len(), 2);
    assert_eq!(articles.indexes[0].name.as_deref(), Some("idx_author_status"));

    let rels = &db.relationships;
    assert_eq!(rels.len(), 4);
    assert_eq!(rels[0].from_table, "auth.sessions");
    assert_eq!(rels[0].to_table, "auth.accounts");

    assert_eq!(rels[1].name.as_deref(), Some("author_fk"));
    assert_eq!(rels[1].from_table, "articles");
    assert_eq!(rels[1].on_delete.as_deref(), Some("cascade"));

    assert_eq!(rels[2].kind, RelationKind::ManyToMany);
    assert_eq!(rels[2].to_table, "tags");

    assert_eq!(rels[3].name.as_deref(), Some("legacy"));
    assert_eq!(rels[3].to_table, UNKNOWN_TABLE);
    assert_eq!(rels[3].to_column, "archive");

    let reasons: Vec<_> = parser.diagnostics().iter().map(|d| d.reason.as_str()).collect();
    assert_eq!(reasons.len(), 2, "{reasons:?}");
    assert!(reasons[0].contains("Enum"));
    assert!(reasons[1].contains(UNKNOWN_TABLE));
}

#[test]
fn brace_in_note_inside_group_does_not_end_group() {
    let input = r#"
TableGroup Billing {
  Table invoices {
    Note: 'totals are shown as {amount}'
    id int
  }
  Table payments {
    id int
  }
}
"#;
    let db = parse(input).unwrap();
    assert_eq!(db.tables.len(), 2);
    assert!(db.tables.iter().all(|t| t.group_id.as_deref() == Some("group_billing")));
    assert_eq!(db.tables[0].note.as_deref(), Some("totals are shown as {amount}"));
}

#[test]
fn deeply_nested_unknown_blocks_are_skipped() {
    let input = "Table t {\n  id int\n  checks {\n    { { nested } }\n  }\n}\nTable u { id int }";
    let db = parse(input).unwrap();
    assert_eq!(db.tables.len(), 2);
    assert_eq!(db.tables[0].columns.len(), 1);
}

#[test]
fn unterminated_block_inside_document() {
    let input = "Table ok { id int }\n\nTableGroup G {\n  Table t {\n    id int\n  }\n";
    match parse(input) {
        Err(ParseError::Scan(ScanError::UnterminatedBlock { keyword, location })) => {
            assert_eq!(keyword, "TableGroup");
            assert_eq!(location.line, 3);
        }
        other => panic!("expected unterminated block, got {other:?}"),
    }
}

#[test]
fn unterminated_multi_line_note_fails() {
    let err = parse("Table t {\n  Note: '''never closed\n}").unwrap_err();
    assert!(matches!(err, ParseError::Lex(_)));
}
