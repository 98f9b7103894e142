//! Scripted in-memory executor for repository and service tests.
//!
//! Rules match on a substring of the statement; the first matching rule
//! answers. Statements with no matching rule succeed with no rows. Every call
//! is recorded for later assertions.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::AppError;
use crate::graph::row::{Params, Row, RowStream};
use crate::graph::traits::CypherExecutor;

type Responder = Box<dyn Fn(&Params) -> Result<Vec<Row>, AppError> + Send + Sync>;

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub cypher: String,
    pub params: Params,
}

pub struct MockExecutor {
    rules: Vec<(String, Responder)>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Answer statements containing `needle` with a fixed set of rows.
    pub fn on(self, needle: &str, rows: Vec<Row>) -> Self {
        self.on_with(needle, move |_| Ok(rows.clone()))
    }

    /// Answer statements containing `needle` by calling `f` with the parameters.
    pub fn on_with<F>(mut self, needle: &str, f: F) -> Self
    where
        F: Fn(&Params) -> Result<Vec<Row>, AppError> + Send + Sync + 'static,
    {
        self.rules.push((needle.to_string(), Box::new(f)));
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_matching(&self, needle: &str) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.cypher.contains(needle))
            .collect()
    }

    pub fn last_call(&self) -> Option<RecordedCall> {
        self.calls.lock().unwrap().last().cloned()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn respond(&self, cypher: &str, params: Params) -> Result<Vec<Row>, AppError> {
        let result = self
            .rules
            .iter()
            .find(|(needle, _)| cypher.contains(needle.as_str()))
            .map(|(_, f)| f(&params))
            .unwrap_or_else(|| Ok(Vec::new()));

        self.calls.lock().unwrap().push(RecordedCall {
            cypher: cypher.to_string(),
            params,
        });
        result
    }
}

#[async_trait]
impl CypherExecutor for MockExecutor {
    async fn execute_cypher(
        &self,
        cypher: &str,
        params: Params,
    ) -> Result<RowStream<'_>, AppError> {
        let rows = self.respond(cypher, params)?;
        Ok(Box::pin(futures::stream::iter(rows.into_iter().map(Ok))))
    }

    async fn run_cypher(&self, cypher: &str, params: Params) -> Result<(), AppError> {
        self.respond(cypher, params).map(|_| ())
    }
}
