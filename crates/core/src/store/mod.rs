//! The store capability the roster logic is written against.
//!
//! [`EmployeeStore`] is one session on the record store: the writer and the
//! importer receive a session and never see SQL. A [`StoreProvider`] hands
//! out sessions; auto-commit sessions back interactive requests and
//! transactional sessions back import runs.

pub mod memory;

use async_trait::async_trait;
use serde::Deserialize;

use crate::duplicate_detection::IdentityKey;
use crate::employee::{Employee, EmployeeFields, Field};
use crate::types::EmployeeId;

/// Failure reported by a store operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The identifier is already taken by another record.
    #[error("Identifier {0} is already in use")]
    DuplicateId(EmployeeId),

    /// Any other integrity constraint rejected the write.
    #[error("Constraint violation: {0}")]
    Constraint(String),

    /// Connection, protocol or unexpected database failure.
    #[error("Store failure: {0}")]
    General(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

/// A single condition on one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Exact, case-sensitive equality.
    Equals(Field, String),
    /// Case-insensitive substring match.
    Contains(Field, String),
}

/// Conditions for [`EmployeeStore::query`].
///
/// Predicates are ANDed. The wildcard term, when set, must appear
/// (case-insensitively) in at least one field or in the identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmployeeFilter {
    pub predicates: Vec<Predicate>,
    pub wildcard: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl EmployeeFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn equals(mut self, field: Field, value: impl Into<String>) -> Self {
        self.predicates.push(Predicate::Equals(field, value.into()));
        self
    }

    /// Add a substring predicate. Empty values are ignored, matching a blank
    /// search box.
    pub fn contains(mut self, field: Field, value: impl Into<String>) -> Self {
        let value = value.into();
        if !value.is_empty() {
            self.predicates.push(Predicate::Contains(field, value));
        }
        self
    }

    /// Set the any-field term. Empty values are ignored.
    pub fn wildcard(mut self, term: impl Into<String>) -> Self {
        let term = term.into();
        self.wildcard = (!term.is_empty()).then_some(term);
        self
    }

    pub fn paginate(mut self, limit: Option<i64>, offset: Option<i64>) -> Self {
        self.limit = limit;
        self.offset = offset;
        self
    }

    /// Evaluate the predicates and wildcard against one record in memory.
    pub fn matches(&self, employee: &Employee) -> bool {
        let predicates_hold = self.predicates.iter().all(|p| match p {
            Predicate::Equals(field, value) => employee.fields.get(*field) == value,
            Predicate::Contains(field, value) => {
                contains_ignore_case(employee.fields.get(*field), value)
            }
        });
        if !predicates_hold {
            return false;
        }
        match &self.wildcard {
            None => true,
            Some(term) => {
                Field::ALL
                    .into_iter()
                    .any(|f| contains_ignore_case(employee.fields.get(f), term))
                    || employee.id.to_string().contains(term.as_str())
            }
        }
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Escape `%`, `_` and `\` so a user term is matched literally inside a
/// `LIKE` pattern, then wrap it in `%...%`.
pub fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Search parameters as they arrive from the lookup surface.
///
/// Every field is an optional substring; `q` is the any-field term.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchParams {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub primary_govt_org: Option<String>,
    pub civilian_company: Option<String>,
    pub callsign_nickname: Option<String>,
    pub rank: Option<String>,
    pub duty_position: Option<String>,
    pub country: Option<String>,
    pub q: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Default page size for searches.
pub const DEFAULT_SEARCH_LIMIT: i64 = 50;

/// Maximum page size for searches.
pub const MAX_SEARCH_LIMIT: i64 = 500;

impl SearchParams {
    pub fn into_filter(self) -> EmployeeFilter {
        let limit = self
            .limit
            .unwrap_or(DEFAULT_SEARCH_LIMIT)
            .clamp(1, MAX_SEARCH_LIMIT);
        let offset = self.offset.unwrap_or(0).max(0);

        let searchable = [
            (Field::FirstName, self.first_name),
            (Field::LastName, self.last_name),
            (Field::PrimaryGovtOrg, self.primary_govt_org),
            (Field::CivilianCompany, self.civilian_company),
            (Field::CallsignNickname, self.callsign_nickname),
            (Field::Rank, self.rank),
            (Field::DutyPosition, self.duty_position),
            (Field::Country, self.country),
        ];
        searchable
            .into_iter()
            .fold(EmployeeFilter::new(), |filter, (field, value)| match value {
                Some(v) => filter.contains(field, v),
                None => filter,
            })
            .wildcard(self.q.unwrap_or_default())
            .paginate(Some(limit), Some(offset))
    }
}

// ---------------------------------------------------------------------------
// Capability traits
// ---------------------------------------------------------------------------

/// One session on the record store.
///
/// Methods take `&mut self`: a session runs at most one statement at a time.
#[async_trait]
pub trait EmployeeStore: Send {
    /// Records matching `filter`, ordered by last name, first name, id.
    async fn query(&mut self, filter: &EmployeeFilter) -> StoreResult<Vec<Employee>>;

    async fn find_by_id(&mut self, id: EmployeeId) -> StoreResult<Option<Employee>>;

    /// Whether a record with exactly this (first, last, org) triple exists.
    async fn exists_with_identity(&mut self, key: &IdentityKey) -> StoreResult<bool>;

    async fn insert(&mut self, employee: &Employee) -> StoreResult<()>;

    /// Replace every mutable field. Returns `false` if no such record.
    async fn update(&mut self, id: EmployeeId, fields: &EmployeeFields) -> StoreResult<bool>;

    /// Returns `false` if no such record.
    async fn delete(&mut self, id: EmployeeId) -> StoreResult<bool>;

    /// Make pending writes durable. A no-op on auto-commit sessions.
    async fn commit(&mut self) -> StoreResult<()>;

    /// Discard pending writes. A no-op on auto-commit sessions.
    async fn rollback(&mut self) -> StoreResult<()>;
}

/// Source of store sessions.
#[async_trait]
pub trait StoreProvider: Send + Sync {
    /// A session whose writes are durable immediately.
    async fn session(&self) -> StoreResult<Box<dyn EmployeeStore>>;

    /// A session whose writes become visible to others only on `commit`.
    async fn import_session(&self) -> StoreResult<Box<dyn EmployeeStore>>;

    /// Cheap reachability check.
    async fn ping(&self) -> StoreResult<()>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
