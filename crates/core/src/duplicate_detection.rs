//! Exact duplicate detection for employee records.
//!
//! Two records are duplicates when their (first name, last name, primary
//! organization) triples are equal. Comparison against persisted rows uses
//! the store's own text comparison; comparison against rows already inserted
//! in the same import run is byte-exact.

use std::collections::HashMap;

use serde::Serialize;

use crate::employee::EmployeeFields;
use crate::store::{EmployeeStore, StoreResult};

/// The identifying triple used for duplicate detection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct IdentityKey {
    pub first_name: String,
    pub last_name: String,
    pub primary_govt_org: String,
}

impl IdentityKey {
    pub fn of(fields: &EmployeeFields) -> Self {
        Self {
            first_name: fields.first_name.clone(),
            last_name: fields.last_name.clone(),
            primary_govt_org: fields.primary_govt_org.clone(),
        }
    }
}

impl std::fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {}, {}",
            self.first_name, self.last_name, self.primary_govt_org
        )
    }
}

/// Where the matching record was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DuplicateMatch {
    /// A record already in the store before this run.
    Existing,
    /// A row inserted earlier in the same import run.
    EarlierRow { row_number: usize },
}

/// Check the store for an exact identity match.
pub async fn is_duplicate<S>(store: &mut S, key: &IdentityKey) -> StoreResult<bool>
where
    S: EmployeeStore + ?Sized,
{
    store.exists_with_identity(key).await
}

/// Duplicate checker for one import run.
///
/// Remembers every identity inserted during the run so two rows that
/// duplicate each other are caught even when the store cannot yet see the
/// first insert.
#[derive(Debug, Default)]
pub struct DuplicateChecker {
    inserted: HashMap<IdentityKey, usize>,
}

impl DuplicateChecker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look for a match, earlier rows of this run first, then the store.
    pub async fn check<S>(
        &self,
        store: &mut S,
        key: &IdentityKey,
    ) -> StoreResult<Option<DuplicateMatch>>
    where
        S: EmployeeStore + ?Sized,
    {
        if let Some(&row_number) = self.inserted.get(key) {
            return Ok(Some(DuplicateMatch::EarlierRow { row_number }));
        }
        if is_duplicate(store, key).await? {
            return Ok(Some(DuplicateMatch::Existing));
        }
        Ok(None)
    }

    /// Record that `key` was inserted from `row_number`.
    pub fn remember(&mut self, key: IdentityKey, row_number: usize) {
        self.inserted.entry(key).or_insert(row_number);
    }

    pub fn inserted_count(&self) -> usize {
        self.inserted.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::employee::Employee;
    use crate::store::memory::MemoryStore;
    use crate::store::StoreProvider;

    fn fields(first: &str, last: &str, org: &str) -> EmployeeFields {
        EmployeeFields {
            first_name: first.into(),
            last_name: last.into(),
            primary_govt_org: org.into(),
            ..Default::default()
        }
    }

    #[test]
    fn identity_display() {
        let key = IdentityKey::of(&fields("Grace", "Hopper", "NAVY"));
        assert_eq!(key.to_string(), "Grace Hopper, NAVY");
    }

    #[tokio::test]
    async fn detects_existing_exact_match_only() {
        let store = MemoryStore::with_employees([Employee::new(
            1000001,
            fields("Grace", "Hopper", "NAVY"),
        )])
        .await;
        let mut session = store.session().await.unwrap();
        let checker = DuplicateChecker::new();

        let same = IdentityKey::of(&fields("Grace", "Hopper", "NAVY"));
        let other_org = IdentityKey::of(&fields("Grace", "Hopper", "ARMY"));
        let other_case = IdentityKey::of(&fields("grace", "Hopper", "NAVY"));

        assert_eq!(
            checker.check(session.as_mut(), &same).await.unwrap(),
            Some(DuplicateMatch::Existing)
        );
        assert_eq!(checker.check(session.as_mut(), &other_org).await.unwrap(), None);
        assert_eq!(checker.check(session.as_mut(), &other_case).await.unwrap(), None);
    }

    #[tokio::test]
    async fn remembers_rows_from_the_same_run() {
        let store = MemoryStore::new();
        let mut session = store.session().await.unwrap();
        let mut checker = DuplicateChecker::new();
        let key = IdentityKey::of(&fields("Ada", "Lovelace", ""));

        assert_eq!(checker.check(session.as_mut(), &key).await.unwrap(), None);
        checker.remember(key.clone(), 2);
        checker.remember(key.clone(), 5);

        assert_eq!(
            checker.check(session.as_mut(), &key).await.unwrap(),
            Some(DuplicateMatch::EarlierRow { row_number: 2 })
        );
        assert_eq!(checker.inserted_count(), 1);
    }
}
