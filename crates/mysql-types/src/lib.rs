//! MySQL type handling for binlog-core types.
//!
//! This crate turns the raw row buffers of ROW-format binlog events into
//! logical values and renders those values back as MySQL literals.
//!
//! # Structure
//!
//! - `decode`: Row buffer → `RowChange` list, driven by a `TableDescriptor`
//! - `decimal`, `temporal`, `json`: Packed encodings of individual column types
//! - `literal`: `Value` → SQL literal, identifier quoting
//! - `zone`: Local or fixed-offset rendering of instants
//! - `schema`: INFORMATION_SCHEMA column type helpers
//!
//! # Example
//!
//! ```rust,ignore
//! use mysql_types::{decode_rows, DecodeOptions, sql_literal};
//!
//! let changes = decode_rows(&rows_event, &descriptor, &DecodeOptions::default())?;
//! let literal = sql_literal(&Value::Text("it's".into()));
//! assert_eq!(literal, r"'it\'s'");
//! ```

pub mod decimal;
pub mod decode;
pub mod json;
pub mod literal;
pub mod reader;
pub mod schema;
pub mod temporal;
pub mod zone;

pub use decode::{decode_rows, DecodeError, DecodeOptions};
pub use literal::{escape_string, quote_identifier, qualified_table_name, sql_literal};
pub use reader::RowReader;
pub use schema::{catalog_column_labels, catalog_column_is_unsigned};
pub use zone::DisplayZone;
