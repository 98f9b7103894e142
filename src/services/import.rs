//! Batched, idempotent import of protein records.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::config::{Config, ImportConfig};
use crate::di::FromContext;
use crate::error::AppError;
use crate::models::ProteinRecord;
use crate::repositories::ProteinRepository;
use crate::source::RecordSource;

/// One row that could not be imported.
#[derive(Debug, Clone, Serialize)]
pub struct ImportFailure {
    /// The row's id when it could be read, otherwise its position.
    pub row: String,
    pub message: String,
}

/// Outcome of an import run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    pub rows_read: usize,
    pub rows_written: usize,
    pub rows_failed: usize,
    pub batches: usize,
    /// Batches that fell back to row-by-row writes.
    pub batches_split: usize,
    pub retries: usize,
    pub failures: Vec<ImportFailure>,
}

impl ImportReport {
    fn fail(&mut self, row: impl Into<String>, error: &AppError) {
        let row = row.into();
        tracing::warn!(row = %row, code = error.code(), "Skipping row: {}", error);
        self.rows_failed += 1;
        self.failures.push(ImportFailure {
            row,
            message: error.to_string(),
        });
    }
}

/// Service writing record-source rows into the graph in bounded batches.
#[derive(FromContext, Clone)]
pub struct ImportService {
    proteins: ProteinRepository,
    config: Arc<Config>,
}

impl ImportService {
    /// Imports every row of `source`.
    ///
    /// Malformed rows and rows the store rejects are counted and skipped.
    /// Connectivity failures that outlast the retry budget and constraint
    /// violations abort the run.
    pub async fn import(&self, source: &dyn RecordSource) -> Result<ImportReport, AppError> {
        self.config.validate()?;
        let settings = &self.config.import;
        tracing::info!(
            source = %source.describe(),
            batch_size = settings.batch_size,
            "Importing proteins"
        );

        let mut report = ImportReport::default();
        let mut batch: Vec<ProteinRecord> = Vec::with_capacity(settings.batch_size);

        for (position, row) in source.open()?.enumerate() {
            report.rows_read += 1;
            match row {
                Ok(record) => batch.push(record),
                Err(e @ AppError::Io(_)) => return Err(e),
                Err(e) => report.fail(format!("#{}", position + 1), &e),
            }
            if batch.len() >= settings.batch_size {
                self.flush(&mut batch, settings, &mut report).await?;
            }
        }
        self.flush(&mut batch, settings, &mut report).await?;

        tracing::info!(
            read = report.rows_read,
            written = report.rows_written,
            failed = report.rows_failed,
            batches = report.batches,
            "Import complete"
        );
        Ok(report)
    }

    async fn flush(
        &self,
        batch: &mut Vec<ProteinRecord>,
        settings: &ImportConfig,
        report: &mut ImportReport,
    ) -> Result<(), AppError> {
        if batch.is_empty() {
            return Ok(());
        }
        report.batches += 1;

        match self.write_with_retry(batch, settings, report).await {
            Ok(()) => report.rows_written += batch.len(),
            Err(e) if is_fatal(&e) => return Err(e),
            Err(e) => {
                tracing::warn!(
                    rows = batch.len(),
                    "Batch failed ({}), retrying row by row",
                    e
                );
                report.batches_split += 1;
                for record in batch.iter() {
                    match self.proteins.upsert(record).await {
                        Ok(()) => report.rows_written += 1,
                        Err(e) if is_fatal(&e) => return Err(e),
                        Err(e) => report.fail(record.uniprot_id.clone(), &e),
                    }
                }
            }
        }

        batch.clear();
        Ok(())
    }

    /// Writes a batch, retrying it wholesale on retryable failures. Merge
    /// semantics make a repeated batch harmless.
    async fn write_with_retry(
        &self,
        batch: &[ProteinRecord],
        settings: &ImportConfig,
        report: &mut ImportReport,
    ) -> Result<(), AppError> {
        let mut attempt = 0u32;
        loop {
            match self.proteins.upsert_batch(batch).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_retryable() && attempt < settings.max_retries => {
                    attempt += 1;
                    report.retries += 1;
                    let backoff = Duration::from_millis(settings.retry_backoff_ms * u64::from(attempt));
                    tracing::warn!(
                        attempt,
                        max = settings.max_retries,
                        backoff_ms = backoff.as_millis() as u64,
                        "Batch write failed: {}",
                        e
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Errors that end the whole import rather than a single row.
fn is_fatal(error: &AppError) -> bool {
    error.is_retryable() || matches!(error, AppError::ConstraintViolation(_))
}
