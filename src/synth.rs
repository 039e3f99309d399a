//! SQL text from decoded row changes and statements.
//!
//! | change | forward | flashback |
//! |---|---|---|
//! | INSERT | `INSERT INTO t (cols) VALUES (after)` | `DELETE FROM t WHERE <after>` |
//! | UPDATE | `UPDATE t SET <after> WHERE <before>` | `UPDATE t SET <before> WHERE <after>` |
//! | DELETE | `DELETE FROM t WHERE <before>` | `INSERT INTO t (cols) VALUES (before)` |
//! | QUERY | verbatim | nothing |
//!
//! An empty string means "nothing to emit".

use binlog_core::{RowChange, RowImage, TableDescriptor, Value};
use mysql_types::{qualified_table_name, quote_identifier, sql_literal};

/// SQL for one row change, inverted when `flashback` is set.
pub fn synthesize(change: &RowChange, table: &TableDescriptor, flashback: bool) -> String {
    let name = qualified_table_name(&table.schema, &table.table);
    match (change, flashback) {
        (RowChange::Insert { after: image }, false) | (RowChange::Delete { before: image }, true) => {
            insert(&name, image)
        }
        (RowChange::Delete { before: image }, false) | (RowChange::Insert { after: image }, true) => {
            delete(&name, image)
        }
        (RowChange::Update { before, after }, false) => update(&name, after, before),
        (RowChange::Update { before, after }, true) => update(&name, before, after),
    }
}

/// SQL for a statement event; flashback cannot invert statements.
pub fn synthesize_query(query: &str, flashback: bool) -> String {
    if flashback {
        return String::new();
    }
    let query = query.trim();
    if query.is_empty() || is_transaction_marker(query) {
        return String::new();
    }
    query.to_string()
}

fn is_transaction_marker(query: &str) -> bool {
    query.eq_ignore_ascii_case("BEGIN") || query.eq_ignore_ascii_case("COMMIT")
}

fn insert(table: &str, image: &RowImage) -> String {
    if image.is_empty() {
        return String::new();
    }
    let columns: Vec<String> = image.names().map(quote_identifier).collect();
    let values: Vec<String> = image.values().map(sql_literal).collect();
    format!(
        "INSERT INTO {table} ({}) VALUES ({})",
        columns.join(","),
        values.join(",")
    )
}

fn delete(table: &str, image: &RowImage) -> String {
    if image.is_empty() {
        return String::new();
    }
    format!("DELETE FROM {table} WHERE {}", predicate(image))
}

fn update(table: &str, set: &RowImage, filter: &RowImage) -> String {
    if set.is_empty() || filter.is_empty() {
        return String::new();
    }
    let assignments: Vec<String> = set
        .iter()
        .map(|(name, value)| format!("{}={}", quote_identifier(name), sql_literal(value)))
        .collect();
    format!(
        "UPDATE {table} SET {} WHERE {}",
        assignments.join(","),
        predicate(filter)
    )
}

fn predicate(image: &RowImage) -> String {
    image
        .iter()
        .map(|(name, value)| match value {
            Value::Null => format!("{} IS NULL", quote_identifier(name)),
            value => format!("{}={}", quote_identifier(name), sql_literal(value)),
        })
        .collect::<Vec<_>>()
        .join(" AND ")
}
