//! Column names from `INFORMATION_SCHEMA.COLUMNS`.
//!
//! Servers running with `binlog_row_metadata=MINIMAL` omit column names from
//! TABLE_MAP events; the catalog fills them in.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use mysql_async::prelude::*;
use mysql_async::{Pool, Row};
use mysql_types::{catalog_column_is_unsigned, catalog_column_labels};
use tracing::debug;

/// A column as the server's catalog describes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogColumn {
    pub name: String,
    pub unsigned: bool,
    /// ENUM/SET labels in declaration order
    pub labels: Option<Vec<String>>,
}

impl CatalogColumn {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            unsigned: false,
            labels: None,
        }
    }
}

/// Looks up a table's columns in ordinal order.
#[async_trait]
pub trait ColumnCatalog: Send + Sync {
    async fn columns(&self, schema: &str, table: &str) -> Result<Vec<CatalogColumn>>;
}

/// [`ColumnCatalog`] backed by a live server.
pub struct MySqlColumnCatalog {
    pool: Pool,
}

impl MySqlColumnCatalog {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ColumnCatalog for MySqlColumnCatalog {
    async fn columns(&self, schema: &str, table: &str) -> Result<Vec<CatalogColumn>> {
        let mut conn = self.pool.get_conn().await?;
        let rows: Vec<Row> = conn
            .exec(
                "SELECT COLUMN_NAME, DATA_TYPE, COLUMN_TYPE
                 FROM INFORMATION_SCHEMA.COLUMNS
                 WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?
                 ORDER BY ORDINAL_POSITION",
                (schema, table),
            )
            .await
            .with_context(|| format!("Failed to read columns of {schema}.{table}"))?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            let name: String = row
                .get(0)
                .ok_or_else(|| anyhow!("Missing column name"))?;
            let data_type: String = row
                .get(1)
                .ok_or_else(|| anyhow!("Missing data type"))?;
            let column_type: String = row
                .get(2)
                .ok_or_else(|| anyhow!("Missing column type"))?;
            columns.push(CatalogColumn {
                name,
                unsigned: catalog_column_is_unsigned(&column_type),
                labels: catalog_column_labels(&data_type, &column_type),
            });
        }
        debug!("Catalog lists {} columns for {schema}.{table}", columns.len());
        Ok(columns)
    }
}
