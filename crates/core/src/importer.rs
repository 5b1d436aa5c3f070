//! Batch importer.
//!
//! A run goes LoadInput -> HeaderCheck -> RowLoop -> Finalize. The two input
//! checks are fatal and happen before any write. Inside the loop every row
//! ends up inserted, duplicate, invalid or failed; a bad row never stops the
//! run. All inserts of a run are committed together at the end.
//!
//! The importer knows nothing about where it runs. Progress goes to an
//! [`ImportObserver`] and cancellation comes in through a
//! [`CancellationToken`].

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::duplicate_detection::{DuplicateChecker, DuplicateMatch, IdentityKey};
use crate::employee::{Field, RawRecord};
use crate::import_source::{self, ImportTable, SourceFormat};
use crate::store::EmployeeStore;
use crate::types::EmployeeId;
use crate::validation::{validate_record, Rejection, RejectionReason, ValidationOutcome};
use crate::writer::insert_with_fresh_id;

/// Spreadsheet row number of the first data row (the header is row 1).
pub const FIRST_DATA_ROW: usize = 2;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A run-level failure. No row of the run is committed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ImportError {
    #[error("Failed to read the import file: {0}")]
    Unreadable(String),

    #[error("The following required headers are missing: {}", .0.join(", "))]
    MissingHeaders(Vec<String>),

    #[error("Import cancelled after {processed} rows")]
    Cancelled { processed: usize },

    #[error("Failed to commit changes: {0}")]
    Commit(String),

    /// No store session could be opened for the run.
    #[error("Record store unavailable: {0}")]
    Unavailable(String),
}

// ---------------------------------------------------------------------------
// Header mapping
// ---------------------------------------------------------------------------

/// Fail with every catalogue header absent from `headers`.
pub fn check_headers(headers: &[String]) -> Result<(), ImportError> {
    let missing: Vec<String> = Field::ALL
        .into_iter()
        .map(Field::header)
        .filter(|h| !headers.iter().any(|present| present == h))
        .map(str::to_string)
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ImportError::MissingHeaders(missing))
    }
}

/// Rename a row's header keys to column names. Unknown headers are dropped.
pub fn map_row(row: &RawRecord) -> RawRecord {
    row.iter()
        .filter_map(|(header, value)| {
            Field::from_header(header).map(|f| (f.column().to_string(), value.clone()))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Accounting
// ---------------------------------------------------------------------------

/// What happened to one row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RowOutcome {
    Inserted {
        id: EmployeeId,
    },
    Duplicate {
        identity: IdentityKey,
        matched: DuplicateMatch,
    },
    Invalid {
        rejection: Rejection,
    },
    /// The store failed on this row; the row was skipped.
    Failed {
        message: String,
    },
}

/// One row's outcome, tagged with its spreadsheet row number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowReport {
    pub row_number: usize,
    #[serde(flatten)]
    pub outcome: RowOutcome,
}

impl RowReport {
    /// One summary line, e.g. `Row 4: Ada Lovelace, NAVY`.
    pub fn describe(&self) -> String {
        let detail = match &self.outcome {
            RowOutcome::Inserted { id } => format!("Inserted as {id}"),
            RowOutcome::Duplicate { identity, .. } => identity.to_string(),
            RowOutcome::Invalid { rejection } => {
                let verb = match rejection.reason {
                    RejectionReason::MissingRequiredName => "Missing",
                    RejectionReason::InvalidFormat => "Invalid",
                };
                format!("{verb} {}", rejection.field_labels().join(", "))
            }
            RowOutcome::Failed { message } => format!("Failed: {message}"),
        };
        format!("Row {}: {detail}", self.row_number)
    }
}

/// Per-run accounting: totals plus every row outcome in input order.
///
/// `inserted + duplicate + invalid + failed == processed`, and a completed
/// run has `processed == total_rows`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportAccounting {
    pub total_rows: usize,
    pub inserted: usize,
    pub duplicate: usize,
    pub invalid: usize,
    pub failed: usize,
    pub rows: Vec<RowReport>,
}

impl ImportAccounting {
    pub fn new(total_rows: usize) -> Self {
        Self {
            total_rows,
            ..Self::default()
        }
    }

    pub fn record(&mut self, report: RowReport) {
        match report.outcome {
            RowOutcome::Inserted { .. } => self.inserted += 1,
            RowOutcome::Duplicate { .. } => self.duplicate += 1,
            RowOutcome::Invalid { .. } => self.invalid += 1,
            RowOutcome::Failed { .. } => self.failed += 1,
        }
        self.rows.push(report);
    }

    pub fn processed(&self) -> usize {
        self.rows.len()
    }

    pub fn duplicates(&self) -> impl Iterator<Item = &RowReport> {
        self.rows
            .iter()
            .filter(|r| matches!(r.outcome, RowOutcome::Duplicate { .. }))
    }

    pub fn invalid_rows(&self) -> impl Iterator<Item = &RowReport> {
        self.rows
            .iter()
            .filter(|r| matches!(r.outcome, RowOutcome::Invalid { .. }))
    }

    pub fn failed_rows(&self) -> impl Iterator<Item = &RowReport> {
        self.rows
            .iter()
            .filter(|r| matches!(r.outcome, RowOutcome::Failed { .. }))
    }

    /// Human-readable report of the run.
    pub fn summary(&self) -> String {
        let mut out = format!(
            "Imported {} of {} rows ({} duplicate, {} invalid, {} failed).",
            self.inserted, self.total_rows, self.duplicate, self.invalid, self.failed
        );
        let sections: [(&str, Vec<&RowReport>); 3] = [
            ("Rows not added due to invalid fields:", self.invalid_rows().collect()),
            ("Rows not added because they already exist:", self.duplicates().collect()),
            ("Rows not added due to a store error:", self.failed_rows().collect()),
        ];
        for (title, reports) in sections {
            if reports.is_empty() {
                continue;
            }
            out.push_str("\n\n");
            out.push_str(title);
            for report in reports {
                out.push_str("\n  ");
                out.push_str(&report.describe());
            }
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Progress after one row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportProgress {
    pub processed: usize,
    pub total: usize,
    pub row_number: usize,
    pub outcome: RowOutcome,
}

impl ImportProgress {
    /// Completion in `[0, 1]`.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.processed as f64 / self.total as f64
        }
    }
}

/// Receives progress after every row.
pub trait ImportObserver: Send {
    /// Called once the headers check out, before the first row.
    fn started(&mut self, _total: usize) {}

    fn on_row(&mut self, progress: &ImportProgress);
}

impl<F> ImportObserver for F
where
    F: FnMut(&ImportProgress) + Send,
{
    fn on_row(&mut self, progress: &ImportProgress) {
        self(progress)
    }
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

/// Parse `data` and import it. An unparseable source is
/// [`ImportError::Unreadable`].
pub async fn load_and_import<S, O>(
    store: &mut S,
    format: SourceFormat,
    data: &str,
    observer: &mut O,
    cancel: &CancellationToken,
) -> Result<ImportAccounting, ImportError>
where
    S: EmployeeStore + ?Sized,
    O: ImportObserver + ?Sized,
{
    let table = import_source::load(format, data).map_err(|e| {
        tracing::error!(format = format.as_str(), error = %e, "Import source unreadable");
        ImportError::Unreadable(e.to_string())
    })?;
    run_import(store, &table, observer, cancel).await
}

/// Import every row of `table` through `store`, then commit once.
///
/// `store` should be a transactional session so that a cancelled or failed
/// run leaves nothing behind.
pub async fn run_import<S, O>(
    store: &mut S,
    table: &ImportTable,
    observer: &mut O,
    cancel: &CancellationToken,
) -> Result<ImportAccounting, ImportError>
where
    S: EmployeeStore + ?Sized,
    O: ImportObserver + ?Sized,
{
    if let Err(e) = check_headers(&table.headers) {
        tracing::error!(error = %e, "Import aborted before the first row");
        return Err(e);
    }

    let total = table.len();
    let mut checker = DuplicateChecker::new();
    let mut accounting = ImportAccounting::new(total);
    tracing::info!(total, "Import run started");
    observer.started(total);

    for (index, row) in table.rows.iter().enumerate() {
        if cancel.is_cancelled() {
            discard(store).await;
            tracing::warn!(processed = index, total, "Import run cancelled");
            return Err(ImportError::Cancelled { processed: index });
        }

        let row_number = index + FIRST_DATA_ROW;
        let outcome = import_row(store, &mut checker, &map_row(row), row_number).await;

        accounting.record(RowReport {
            row_number,
            outcome: outcome.clone(),
        });
        observer.on_row(&ImportProgress {
            processed: index + 1,
            total,
            row_number,
            outcome,
        });
    }

    if let Err(e) = store.commit().await {
        tracing::error!(error = %e, "Import commit failed");
        discard(store).await;
        return Err(ImportError::Commit(e.to_string()));
    }

    tracing::info!(
        total,
        inserted = accounting.inserted,
        duplicate = accounting.duplicate,
        invalid = accounting.invalid,
        failed = accounting.failed,
        "Import run completed"
    );
    Ok(accounting)
}

async fn discard<S>(store: &mut S)
where
    S: EmployeeStore + ?Sized,
{
    if let Err(e) = store.rollback().await {
        tracing::error!(error = %e, "Import rollback failed");
    }
}

/// Validate -> duplicate check -> insert for one mapped row.
async fn import_row<S>(
    store: &mut S,
    checker: &mut DuplicateChecker,
    raw: &RawRecord,
    row_number: usize,
) -> RowOutcome
where
    S: EmployeeStore + ?Sized,
{
    let fields = match validate_record(raw) {
        ValidationOutcome::Accepted(fields) => fields,
        ValidationOutcome::Rejected(rejection) => {
            tracing::warn!(
                row = row_number,
                fields = ?rejection.field_labels(),
                "Row rejected"
            );
            return RowOutcome::Invalid { rejection };
        }
    };

    let identity = IdentityKey::of(&fields);
    match checker.check(store, &identity).await {
        Ok(Some(matched)) => {
            tracing::info!(row = row_number, identity = %identity, "Duplicate row skipped");
            return RowOutcome::Duplicate { identity, matched };
        }
        Ok(None) => {}
        Err(e) => {
            tracing::error!(row = row_number, error = %e, "Duplicate check failed");
            return RowOutcome::Failed {
                message: e.to_string(),
            };
        }
    }

    match insert_with_fresh_id(store, fields).await {
        Ok(employee) => {
            tracing::debug!(row = row_number, id = employee.id, "Row inserted");
            checker.remember(identity, row_number);
            RowOutcome::Inserted { id: employee.id }
        }
        Err(e) => {
            tracing::error!(row = row_number, error = %e, "Row insert failed");
            RowOutcome::Failed {
                message: e.to_string(),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
