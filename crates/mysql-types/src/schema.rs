//! MySQL INFORMATION_SCHEMA column type helpers.
//!
//! TABLE_MAP events without full row metadata carry neither signedness nor
//! ENUM/SET labels. These helpers recover both from the `COLUMN_TYPE`
//! string reported by `information_schema.columns` (e.g. `int(10) unsigned`,
//! `enum('small','large')`).

/// Whether a catalog column type is an unsigned numeric type.
///
/// # Example
///
/// ```
/// use mysql_types::catalog_column_is_unsigned;
///
/// assert!(catalog_column_is_unsigned("int(10) unsigned"));
/// assert!(catalog_column_is_unsigned("BIGINT UNSIGNED ZEROFILL"));
/// assert!(!catalog_column_is_unsigned("varchar(20)"));
/// ```
pub fn catalog_column_is_unsigned(column_type: &str) -> bool {
    column_type
        .to_ascii_lowercase()
        .split_whitespace()
        .skip(1)
        .any(|word| word == "unsigned")
}

/// ENUM or SET labels declared by a catalog column, in declaration order.
///
/// Returns `None` for every other data type.
pub fn catalog_column_labels(data_type: &str, column_type: &str) -> Option<Vec<String>> {
    match data_type.to_ascii_uppercase().as_str() {
        "ENUM" | "SET" => Some(extract_set_or_enum_values(column_type)),
        _ => None,
    }
}

/// Extract values from a MySQL SET or ENUM column type string.
///
/// E.g., "set('a','b','c')" -> vec!["a", "b", "c"]
/// E.g., "enum('it''s','x,y')" -> vec!["it's", "x,y"]
fn extract_set_or_enum_values(column_type: &str) -> Vec<String> {
    let (Some(start), Some(end)) = (column_type.find('('), column_type.rfind(')')) else {
        return Vec::new();
    };
    if start >= end {
        return Vec::new();
    }

    let mut values = Vec::new();
    let mut chars = column_type[start + 1..end].chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\'' {
            continue;
        }
        // Quoted label; '' and \' are literal quotes
        let mut value = String::new();
        while let Some(c) = chars.next() {
            match c {
                '\'' if chars.peek() == Some(&'\'') => {
                    chars.next();
                    value.push('\'');
                }
                '\'' => break,
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        value.push(escaped);
                    }
                }
                c => value.push(c),
            }
        }
        values.push(value);
    }
    values
}
