//! Per-column type coercion from raw TSV strings to typed staging values.

use std::path::Path;

use imdb_common::{Error, Result};

use crate::reader::RawRow;

/// The literal IMDb null sentinel.
pub const NULL_SENTINEL: &str = "\\N";

/// A column's logical type, driving how its raw string is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Bool,
    Int,
    Float,
    String,
}

/// Declares how one staging column is coerced.
#[derive(Debug, Clone)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub column_type: ColumnType,
    pub nullable: bool,
    /// Optional length cap, enforced at ingest time: exceeding it is a
    /// coercion error, not a silent truncation. `None` means no cap.
    pub max_len: Option<usize>,
}

impl ColumnSpec {
    #[must_use]
    pub const fn new(name: &'static str, column_type: ColumnType, nullable: bool) -> Self {
        Self { name, column_type, nullable, max_len: None }
    }

    #[must_use]
    pub const fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = Some(max_len);
        self
    }
}

/// A coerced staging value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

/// Coerce every column of `raw` per `columns`, attaching `path`/`row_number`
/// to any fatal error and to the non-null-violation warning (testable
/// property 2 requires the warning to identify "column and offending row").
pub fn coerce_row(
    columns: &[ColumnSpec],
    raw: &RawRow,
    path: &Path,
    row_number: u64,
) -> Result<Vec<(&'static str, Value)>> {
    columns
        .iter()
        .map(|spec| {
            let raw_value = raw.get(spec.name).map(String::as_str).unwrap_or_default();
            let (value, substituted_null) =
                coerce_value_inner(spec, raw_value).map_err(|e| e.at_row(path, row_number))?;
            if substituted_null {
                tracing::warn!(
                    column = spec.name,
                    path = %path.display(),
                    row_number,
                    "null sentinel on non-null column, substituting zero value"
                );
            }
            Ok((spec.name, value))
        })
        .collect()
}

/// Coerce a single raw string per the column descriptor's rules.
///
/// 1. `\N` on a nullable column → [`Value::Null`].
/// 2. `\N` on a non-nullable column → the type's zero value, plus a warning.
/// 3. Otherwise parse per `column_type`; malformed input is a fatal [`Error`].
///
/// Called directly (outside a row's column loop) this has no row number to
/// attach to the warning it emits; [`coerce_row`] calls [`coerce_value_inner`]
/// instead so the warning can carry the source path and row number.
pub fn coerce_value(spec: &ColumnSpec, raw_value: &str) -> Result<Value> {
    let (value, substituted_null) = coerce_value_inner(spec, raw_value)?;
    if substituted_null {
        tracing::warn!(column = spec.name, "null sentinel on non-null column, substituting zero value");
    }
    Ok(value)
}

/// Shared coercion logic. Returns whether the null sentinel was substituted
/// on a non-nullable column, so callers with row context can log accordingly
/// instead of this function logging blind.
fn coerce_value_inner(spec: &ColumnSpec, raw_value: &str) -> Result<(Value, bool)> {
    if raw_value == NULL_SENTINEL {
        return if spec.nullable { Ok((Value::Null, false)) } else { Ok((zero_value(spec.column_type), true)) };
    }

    if let Some(max_len) = spec.max_len {
        if raw_value.len() > max_len {
            return Err(Error::database(format!(
                "column \"{}\" value exceeds max length {} ({} bytes)",
                spec.name,
                max_len,
                raw_value.len()
            )));
        }
    }

    let value = match spec.column_type {
        ColumnType::Bool => match raw_value {
            "1" => Ok(Value::Bool(true)),
            "0" => Ok(Value::Bool(false)),
            other => Err(Error::database(format!(
                "column \"{}\": expected \"0\" or \"1\", got {other:?}",
                spec.name
            ))),
        },
        ColumnType::Int => raw_value.parse::<i64>().map(Value::Int).map_err(|e| {
            Error::database(format!("column \"{}\": cannot parse int from {raw_value:?}: {e}", spec.name))
        }),
        ColumnType::Float => raw_value.parse::<f64>().map(Value::Float).map_err(|e| {
            Error::database(format!("column \"{}\": cannot parse float from {raw_value:?}: {e}", spec.name))
        }),
        ColumnType::String => Ok(Value::Text(raw_value.to_string())),
    }?;
    Ok((value, false))
}

fn zero_value(column_type: ColumnType) -> Value {
    match column_type {
        ColumnType::Bool => Value::Bool(false),
        ColumnType::Int => Value::Int(0),
        ColumnType::Float => Value::Float(0.0),
        ColumnType::String => Value::Text(String::new()),
    }
}

/// Parse `raw_value` as a JSON array of strings (used for
/// `title_principals.characters`). Fatal on parse failure or non-array.
pub fn parse_json_string_array(raw_value: &str) -> Result<Vec<String>> {
    let parsed: serde_json::Value = serde_json::from_str(raw_value)?;
    match parsed {
        serde_json::Value::Array(items) => items
            .into_iter()
            .map(|v| {
                v.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| Error::database(format!("expected string array element, got {v}")))
            })
            .collect(),
        other => Err(Error::database(format!("expected JSON array, got {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_sentinel_on_nullable_column() {
        let spec = ColumnSpec::new("endYear", ColumnType::Int, true);
        assert_eq!(coerce_value(&spec, "\\N").unwrap(), Value::Null);
    }

    #[test]
    fn test_null_sentinel_on_non_null_column_substitutes_zero() {
        let spec = ColumnSpec::new("isAdult", ColumnType::Bool, false);
        assert_eq!(coerce_value(&spec, "\\N").unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_boolean_coercion() {
        let spec = ColumnSpec::new("isAdult", ColumnType::Bool, false);
        assert_eq!(coerce_value(&spec, "1").unwrap(), Value::Bool(true));
        assert_eq!(coerce_value(&spec, "0").unwrap(), Value::Bool(false));
        assert!(coerce_value(&spec, "2").is_err());
    }

    #[test]
    fn test_int_and_float_parsing() {
        let int_spec = ColumnSpec::new("startYear", ColumnType::Int, true);
        assert_eq!(coerce_value(&int_spec, "1894").unwrap(), Value::Int(1894));
        assert!(coerce_value(&int_spec, "nineteen").is_err());

        let float_spec = ColumnSpec::new("averageRating", ColumnType::Float, true);
        assert_eq!(coerce_value(&float_spec, "7.5").unwrap(), Value::Float(7.5));
    }

    #[test]
    fn test_empty_string_passes_through_on_string_column() {
        let spec = ColumnSpec::new("job", ColumnType::String, true);
        assert_eq!(coerce_value(&spec, "").unwrap(), Value::Text(String::new()));
    }

    #[test]
    fn test_max_len_cap_rejects_overlong_value() {
        let spec = ColumnSpec::new("characters", ColumnType::String, true).with_max_len(8);
        assert!(coerce_value(&spec, "this value is definitely too long").is_err());
        assert!(coerce_value(&spec, "short").is_ok());
    }

    #[test]
    fn test_json_string_array_parse() {
        assert_eq!(
            parse_json_string_array(r#"["Alice","Bob"]"#).unwrap(),
            vec!["Alice".to_string(), "Bob".to_string()]
        );
        assert!(parse_json_string_array("not-json").is_err());
        assert!(parse_json_string_array(r#"{"a": 1}"#).is_err());
    }

    #[test]
    fn test_coerce_row_attaches_row_number_on_failure() {
        let columns = vec![ColumnSpec::new("isAdult", ColumnType::Bool, false)];
        let mut raw = RawRow::new();
        raw.insert("isAdult".to_string(), "maybe".to_string());
        let err = coerce_row(&columns, &raw, Path::new("title.basics.tsv"), 7).unwrap_err();
        match err {
            imdb_common::Error::RowParse { row_number, path, .. } => {
                assert_eq!(row_number, 7);
                assert_eq!(path, Path::new("title.basics.tsv"));
            }
            other => panic!("expected RowParse, got {other:?}"),
        }
    }

    #[test]
    fn test_coerce_row_substitutes_zero_for_null_sentinel_on_non_null_column() {
        let columns = vec![ColumnSpec::new("isAdult", ColumnType::Bool, false)];
        let mut raw = RawRow::new();
        raw.insert("isAdult".to_string(), NULL_SENTINEL.to_string());
        let coerced = coerce_row(&columns, &raw, Path::new("title.basics.tsv"), 3).unwrap();
        assert_eq!(coerced, vec![("isAdult", Value::Bool(false))]);
    }
}
