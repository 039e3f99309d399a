//! Table descriptors keyed by table id.
//!
//! Populated from TABLE_MAP events. Column names come from the event's
//! optional metadata when the server writes it, otherwise from the column
//! catalog, otherwise they are positional (`@1`, `@2`, ...).

use binlog_core::{TableDescriptor, TableMapEvent};
use mysql_binlog_source::{CatalogColumn, ColumnCatalog};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Statement prefixes that may change a table's column layout.
const SCHEMA_CHANGE_PREFIXES: [&str; 5] = ["ALTER", "CREATE", "DROP", "RENAME", "TRUNCATE"];

/// Whether a statement may change table layouts.
pub fn is_schema_change(sql: &str) -> bool {
    let first_word = skip_leading_comments(sql)
        .split(|c: char| c.is_whitespace() || c == '(')
        .next()
        .unwrap_or_default();
    SCHEMA_CHANGE_PREFIXES
        .iter()
        .any(|prefix| first_word.eq_ignore_ascii_case(prefix))
}

/// Strip whitespace and `/* */`, `#` and `-- ` comments from the front.
///
/// `/*!NNNNN ... */` is executed by the server, so its body is kept.
fn skip_leading_comments(mut sql: &str) -> &str {
    loop {
        sql = sql.trim_start();
        if let Some(rest) = sql.strip_prefix("/*!") {
            return rest.trim_start_matches(|c: char| c.is_ascii_digit()).trim_start();
        }
        if let Some(rest) = sql.strip_prefix("/*") {
            sql = rest.split_once("*/").map_or("", |(_, after)| after);
        } else if is_line_comment(sql) {
            sql = sql.split_once('\n').map_or("", |(_, after)| after);
        } else {
            return sql;
        }
    }
}

fn is_line_comment(sql: &str) -> bool {
    sql.starts_with('#')
        || sql
            .strip_prefix("--")
            .is_some_and(|rest| rest.is_empty() || rest.starts_with(char::is_whitespace))
}

pub struct TableMetadataCache {
    tables: HashMap<u64, TableDescriptor>,
    catalog: Option<Box<dyn ColumnCatalog>>,
    /// Catalog answers per `(schema, table)`; `None` records a failed lookup
    memo: HashMap<(String, String), Option<Vec<CatalogColumn>>>,
}

impl Default for TableMetadataCache {
    fn default() -> Self {
        Self::new()
    }
}

impl TableMetadataCache {
    /// A cache that never consults a catalog.
    pub fn new() -> Self {
        Self {
            tables: HashMap::new(),
            catalog: None,
            memo: HashMap::new(),
        }
    }

    pub fn with_catalog(catalog: Box<dyn ColumnCatalog>) -> Self {
        Self {
            catalog: Some(catalog),
            ..Self::new()
        }
    }

    pub fn get(&self, table_id: u64) -> Option<&TableDescriptor> {
        self.tables.get(&table_id)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Forget catalog answers; descriptors already built are kept.
    pub fn invalidate_catalog(&mut self) {
        if !self.memo.is_empty() {
            debug!("Clearing {} memoised catalog entries", self.memo.len());
            self.memo.clear();
        }
    }

    /// Build (or replace) the descriptor announced by `event`.
    pub async fn on_table_map(&mut self, event: &TableMapEvent) -> &TableDescriptor {
        let column_count = event.column_types.len();
        let has_names = event
            .column_names
            .as_ref()
            .is_some_and(|names| names.len() == column_count);

        let descriptor = if has_names {
            TableDescriptor::from_table_map(event, None, None, None)
        } else {
            match self.catalog_columns(&event.schema, &event.table).await {
                Some(columns) if columns.len() == column_count => {
                    let names: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();
                    let unsigned: Vec<bool> = columns.iter().map(|c| c.unsigned).collect();
                    let labels: Vec<Option<Vec<String>>> =
                        columns.iter().map(|c| c.labels.clone()).collect();
                    // Signedness written by the server describes the row images exactly
                    let unsigned = event.signedness.is_none().then_some(unsigned.as_slice());
                    let labels = event.labels.is_none().then_some(labels.as_slice());
                    TableDescriptor::from_table_map(event, Some(&names), unsigned, labels)
                }
                Some(columns) => {
                    warn!(
                        "Catalog lists {} columns for {}.{} but the binlog has {}, using positional names",
                        columns.len(),
                        event.schema,
                        event.table,
                        column_count
                    );
                    TableDescriptor::from_table_map(event, None, None, None)
                }
                None => {
                    warn!(
                        "No column names for {}.{}, using positional names",
                        event.schema, event.table
                    );
                    TableDescriptor::from_table_map(event, None, None, None)
                }
            }
        };

        debug!(
            table_id = event.table_id,
            "Table map {}.{} ({} columns)",
            event.schema,
            event.table,
            column_count
        );
        self.tables.insert(event.table_id, descriptor);
        &self.tables[&event.table_id]
    }

    async fn catalog_columns(&mut self, schema: &str, table: &str) -> Option<Vec<CatalogColumn>> {
        let catalog = self.catalog.as_ref()?;
        let key = (schema.to_string(), table.to_string());
        if let Some(cached) = self.memo.get(&key) {
            return cached.clone();
        }

        let columns = match catalog.columns(schema, table).await {
            Ok(columns) if columns.is_empty() => {
                warn!("Catalog has no columns for {schema}.{table}");
                None
            }
            Ok(columns) => Some(columns),
            Err(e) => {
                warn!("Column catalog lookup for {schema}.{table} failed: {e:#}");
                None
            }
        };
        self.memo.insert(key, columns.clone());
        columns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use binlog_core::ColumnType;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FixedCatalog {
        columns: Vec<CatalogColumn>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ColumnCatalog for FixedCatalog {
        async fn columns(&self, _schema: &str, _table: &str) -> anyhow::Result<Vec<CatalogColumn>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.columns.clone())
        }
    }

    struct FailingCatalog;

    #[async_trait]
    impl ColumnCatalog for FailingCatalog {
        async fn columns(&self, _schema: &str, _table: &str) -> anyhow::Result<Vec<CatalogColumn>> {
            anyhow::bail!("connection refused")
        }
    }

    fn table_map(table_id: u64, names: Option<Vec<&str>>) -> TableMapEvent {
        TableMapEvent {
            table_id,
            schema: "shop".to_string(),
            table: "t".to_string(),
            column_types: vec![ColumnType::Long, ColumnType::Varchar],
            column_meta: vec![0, 80],
            null_bitmap: vec![0b10],
            signedness: None,
            column_names: names.map(|n| n.into_iter().map(String::from).collect()),
            labels: None,
        }
    }

    fn catalog(columns: Vec<CatalogColumn>) -> (Box<dyn ColumnCatalog>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Box::new(FixedCatalog {
                columns,
                calls: calls.clone(),
            }),
            calls,
        )
    }

    fn names(descriptor: &TableDescriptor) -> Vec<&str> {
        descriptor.columns.iter().map(|c| c.name.as_str()).collect()
    }

    #[test]
    fn test_is_schema_change() {
        assert!(is_schema_change("ALTER TABLE t ADD COLUMN y INT"));
        assert!(is_schema_change("  create table t(id int)"));
        assert!(is_schema_change("DROP TABLE t"));
        assert!(!is_schema_change("BEGIN"));
        assert!(!is_schema_change("INSERT INTO t VALUES (1)"));
        assert!(!is_schema_change("ALTERED"));
    }

    #[test]
    fn test_is_schema_change_skips_leading_comments() {
        assert!(is_schema_change("/* app:migrate */ ALTER TABLE t ADD y INT"));
        assert!(is_schema_change("# drop it\nDROP TABLE t"));
        assert!(is_schema_change("-- rename\n  /* twice */RENAME TABLE a TO b"));
        assert!(!is_schema_change("/* ALTER */ INSERT INTO t VALUES (1)"));
        assert!(!is_schema_change("-- ALTER TABLE t"));
        assert!(!is_schema_change("/* unterminated ALTER"));
        assert!(!is_schema_change("--ALTER"));
        assert!(is_schema_change("/*!40000 ALTER TABLE t DISABLE KEYS */"));
    }

    #[tokio::test]
    async fn test_names_from_event_skip_catalog() {
        let (catalog, calls) = catalog(vec![CatalogColumn::new("x"), CatalogColumn::new("y")]);
        let mut cache = TableMetadataCache::with_catalog(catalog);

        let descriptor = cache.on_table_map(&table_map(7, Some(vec!["id", "name"]))).await;
        assert_eq!(names(descriptor), vec!["id", "name"]);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_catalog_names_are_memoised_until_schema_change() {
        let mut id = CatalogColumn::new("id");
        id.unsigned = true;
        let (catalog, calls) = catalog(vec![id, CatalogColumn::new("name")]);
        let mut cache = TableMetadataCache::with_catalog(catalog);

        let descriptor = cache.on_table_map(&table_map(7, None)).await;
        assert_eq!(names(descriptor), vec!["id", "name"]);
        assert!(descriptor.columns[0].unsigned);

        cache.on_table_map(&table_map(8, None)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        cache.invalidate_catalog();
        cache.on_table_map(&table_map(9, None)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 3);
    }

    #[tokio::test]
    async fn test_column_count_disagreement_falls_back_to_positional() {
        let (catalog, _) = catalog(vec![CatalogColumn::new("only")]);
        let mut cache = TableMetadataCache::with_catalog(catalog);

        let descriptor = cache.on_table_map(&table_map(7, None)).await;
        assert_eq!(names(descriptor), vec!["@1", "@2"]);
    }

    #[tokio::test]
    async fn test_catalog_failure_falls_back_to_positional() {
        let mut cache = TableMetadataCache::with_catalog(Box::new(FailingCatalog));
        let descriptor = cache.on_table_map(&table_map(7, None)).await;
        assert_eq!(names(descriptor), vec!["@1", "@2"]);
    }

    #[tokio::test]
    async fn test_same_table_id_replaces_descriptor() {
        let mut cache = TableMetadataCache::new();
        cache.on_table_map(&table_map(7, None)).await;
        cache.on_table_map(&table_map(7, Some(vec!["id", "name"]))).await;

        assert_eq!(cache.len(), 1);
        assert_eq!(names(cache.get(7).unwrap()), vec!["id", "name"]);
    }
}
