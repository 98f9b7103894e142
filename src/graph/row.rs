//! Row and streaming types for query results.
//!
//! The store hands back loosely-typed columns. [`Row`] keeps them as JSON and
//! converts into the crate's typed models at the repository boundary, either
//! column by column ([`Row::get`]) or whole-row ([`Row::decode`]).

use crate::error::AppError;
use futures::Stream;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;
use std::pin::Pin;

/// Parameters for Cypher statements, keyed by name without the `$` prefix.
pub type Params = HashMap<String, JsonValue>;

/// A stream of rows from a query result.
///
/// Rows are pulled on demand, so large membership scans never have to be
/// materialised by the executor itself.
pub type RowStream<'a> = Pin<Box<dyn Stream<Item = Result<Row, AppError>> + Send + 'a>>;

/// A single result row: column name to JSON value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    data: HashMap<String, JsonValue>,
}

impl Row {
    /// Creates a row from a map of column names to values.
    pub fn new(data: HashMap<String, JsonValue>) -> Self {
        Self { data }
    }

    /// Builds a row from `(column, value)` pairs.
    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, JsonValue)>,
        K: Into<String>,
    {
        Self {
            data: pairs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Gets a required column, deserializing it to `T`.
    ///
    /// A missing column or a JSON `null` is an error; use [`get_opt`](Row::get_opt)
    /// for nullable columns.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T, AppError> {
        let value = self
            .data
            .get(key)
            .ok_or_else(|| AppError::Internal(format!("column not found: {}", key)))?;
        serde_json::from_value(value.clone())
            .map_err(|e| AppError::Internal(format!("failed to deserialize '{}': {}", key, e)))
    }

    /// Gets a nullable column. Missing and `null` both yield `None`.
    pub fn get_opt<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, AppError> {
        match self.data.get(key) {
            None | Some(JsonValue::Null) => Ok(None),
            Some(v) => serde_json::from_value(v.clone())
                .map(Some)
                .map_err(|e| AppError::Internal(format!("failed to deserialize '{}': {}", key, e))),
        }
    }

    /// Deserializes the whole row into `T`, treating columns as struct fields.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, AppError> {
        let object: Map<String, JsonValue> = self
            .data
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        serde_json::from_value(JsonValue::Object(object))
            .map_err(|e| AppError::Internal(format!("failed to decode row: {}", e)))
    }
}

impl From<HashMap<String, JsonValue>> for Row {
    fn from(data: HashMap<String, JsonValue>) -> Self {
        Self::new(data)
    }
}
