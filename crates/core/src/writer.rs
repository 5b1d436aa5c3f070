//! Single-record writer: create, edit, delete and look up one employee.
//!
//! Every mutation validates first and performs at most one store write, so
//! a rejection or failure never leaves a partial record behind.

use crate::employee::{generate_employee_id, Employee, EmployeeFields, RawRecord};
use crate::store::{EmployeeFilter, EmployeeStore, StoreError};
use crate::types::EmployeeId;
use crate::validation::{validate_record, Rejection};

/// How many identifiers are drawn before giving up on an insert.
pub const MAX_ID_ATTEMPTS: usize = 5;

/// Failure of a single-record operation.
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    /// The record failed validation; nothing was written.
    #[error("{0}")]
    Rejected(Rejection),

    #[error("Employee with id {0} not found")]
    NotFound(EmployeeId),

    /// The store refused the write on an integrity constraint.
    #[error("Constraint violation: {0}")]
    Constraint(String),

    /// Every drawn identifier was already taken.
    #[error("No free identifier found after {0} attempts")]
    IdCollision(usize),

    #[error("Store failure: {0}")]
    Store(String),
}

impl From<StoreError> for WriteError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateId(id) => {
                Self::Constraint(format!("identifier {id} is already in use"))
            }
            StoreError::Constraint(msg) => Self::Constraint(msg),
            StoreError::General(msg) => Self::Store(msg),
        }
    }
}

/// Insert `fields` under a freshly drawn identifier, redrawing when the
/// store reports the identifier as taken.
pub async fn insert_with_fresh_id<S>(
    store: &mut S,
    fields: EmployeeFields,
) -> Result<Employee, WriteError>
where
    S: EmployeeStore + ?Sized,
{
    let mut employee = Employee::new(generate_employee_id(), fields);
    for attempt in 1..=MAX_ID_ATTEMPTS {
        match store.insert(&employee).await {
            Ok(()) => return Ok(employee),
            Err(StoreError::DuplicateId(id)) => {
                tracing::warn!(id, attempt, "Employee id collision, drawing a new id");
                employee.id = generate_employee_id();
            }
            Err(e) => return Err(e.into()),
        }
    }
    Err(WriteError::IdCollision(MAX_ID_ATTEMPTS))
}

/// Validate and insert one new employee.
pub async fn create_employee<S>(store: &mut S, raw: &RawRecord) -> Result<Employee, WriteError>
where
    S: EmployeeStore + ?Sized,
{
    let fields = validate_record(raw)
        .into_result()
        .map_err(WriteError::Rejected)?;

    let employee = insert_with_fresh_id(store, fields).await?;
    store.commit().await?;

    tracing::info!(
        id = employee.id,
        name = %employee.display_name(),
        "Employee record added"
    );
    Ok(employee)
}

/// Validate an edited record and replace every field of employee `id`.
pub async fn update_employee<S>(
    store: &mut S,
    id: EmployeeId,
    raw: &RawRecord,
) -> Result<Employee, WriteError>
where
    S: EmployeeStore + ?Sized,
{
    let fields = validate_record(raw)
        .into_result()
        .map_err(WriteError::Rejected)?;

    if !store.update(id, &fields).await? {
        return Err(WriteError::NotFound(id));
    }
    store.commit().await?;

    tracing::info!(id, "Employee record updated");
    Ok(Employee::new(id, fields))
}

/// Delete employee `id`.
pub async fn delete_employee<S>(store: &mut S, id: EmployeeId) -> Result<(), WriteError>
where
    S: EmployeeStore + ?Sized,
{
    if !store.delete(id).await? {
        return Err(WriteError::NotFound(id));
    }
    store.commit().await?;

    tracing::info!(id, "Employee record deleted");
    Ok(())
}

/// Fetch employee `id`.
pub async fn find_employee<S>(store: &mut S, id: EmployeeId) -> Result<Employee, WriteError>
where
    S: EmployeeStore + ?Sized,
{
    store
        .find_by_id(id)
        .await?
        .ok_or(WriteError::NotFound(id))
}

/// Run a lookup query.
pub async fn search_employees<S>(
    store: &mut S,
    filter: &EmployeeFilter,
) -> Result<Vec<Employee>, WriteError>
where
    S: EmployeeStore + ?Sized,
{
    Ok(store.query(filter).await?)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
