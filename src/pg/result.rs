//! Result decoding.

use smallvec::SmallVec;

use super::configuration::Configuration;
use super::transport::ResultHandle;
use super::types::{Oid, Value};
use crate::error::EncodingError;

/// A decoded row: column names mapped to values, in column order.
///
/// Names are unique within a row. When a result repeats a column name the
/// later value replaces the earlier one (in the earlier column's position),
/// so positional data under a duplicated name is lost.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    // inline for rows of up to 16 columns
    entries: SmallVec<[(String, Value); 16]>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(columns: usize) -> Self {
        Self {
            entries: SmallVec::with_capacity(columns),
        }
    }

    /// Set `name` to `value`, returning the value it replaced.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        let name = name.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((name, value));
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn into_object(self) -> Value {
        Value::Object(self.entries.into_iter().collect())
    }
}

impl IntoIterator for Row {
    type Item = (String, Value);
    type IntoIter = smallvec::IntoIter<[(String, Value); 16]>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Decode every row of a result, in server order.
pub fn decode_rows<R: ResultHandle + ?Sized>(
    result: &R,
    config: &Configuration,
) -> Result<Vec<Row>, EncodingError> {
    let columns: Vec<(&str, Oid)> = (0..result.column_count())
        .map(|c| (result.column_name(c), result.column_type(c)))
        .collect();

    let mut rows = Vec::with_capacity(result.row_count());
    for r in 0..result.row_count() {
        let mut row = Row::with_capacity(columns.len());

        for (c, &(name, oid)) in columns.iter().enumerate() {
            let value = match result.cell(r, c) {
                Some(data) => Value::decode_binary(oid, data, config)?,
                None => Value::Null,
            };
            if row.insert(name, value).is_some() {
                tracing::trace!(column = name, "duplicate column name, keeping the later value");
            }
        }

        rows.push(row);
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_is_last_write_wins() {
        let mut row = Row::new();
        assert_eq!(row.insert("a", Value::Int4(1)), None);
        assert_eq!(row.insert("b", Value::Int4(2)), None);
        assert_eq!(row.insert("a", Value::Int4(3)), Some(Value::Int4(1)));

        assert_eq!(row.len(), 2);
        assert_eq!(row.columns().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(row.get("a"), Some(&Value::Int4(3)));
    }

    #[test]
    fn test_into_object() {
        let mut row = Row::new();
        row.insert("id", Value::Int8(1));
        row.insert("name", Value::Null);

        let object = row.into_object();
        let members = object.as_object().unwrap();
        assert_eq!(members.len(), 2);
        assert_eq!(members["id"], Value::Int8(1));
        assert!(members["name"].is_null());
    }
}
