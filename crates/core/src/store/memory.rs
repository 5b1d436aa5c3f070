//! In-memory [`EmployeeStore`] for tests and embedding.
//!
//! Transactional sessions work on a private copy of the table and keep a
//! journal of their writes; `commit` replays the journal onto the shared
//! table atomically, `rollback` throws it away.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::duplicate_detection::IdentityKey;
use crate::employee::{Employee, EmployeeFields};
use crate::store::{EmployeeFilter, EmployeeStore, StoreError, StoreProvider, StoreResult};
use crate::types::EmployeeId;

type Table = BTreeMap<EmployeeId, Employee>;

/// Shared in-memory employee table.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    rows: Arc<Mutex<Table>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-populated with `employees`. Later duplicates of an
    /// id replace earlier ones.
    pub async fn with_employees(employees: impl IntoIterator<Item = Employee>) -> Self {
        let store = Self::new();
        {
            let mut rows = store.rows.lock().await;
            for employee in employees {
                rows.insert(employee.id, employee);
            }
        }
        store
    }

    /// Snapshot of every committed record, ordered by id.
    pub async fn all(&self) -> Vec<Employee> {
        self.rows.lock().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.rows.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.lock().await.is_empty()
    }

    /// An auto-commit session.
    pub fn auto_commit(&self) -> MemorySession {
        MemorySession {
            shared: Arc::clone(&self.rows),
            tx: None,
        }
    }

    /// A transactional session.
    pub async fn transaction(&self) -> MemorySession {
        let working = self.rows.lock().await.clone();
        MemorySession {
            shared: Arc::clone(&self.rows),
            tx: Some(Transaction {
                working,
                journal: Vec::new(),
            }),
        }
    }
}

#[derive(Debug, Clone)]
enum Change {
    Insert(Employee),
    Update(EmployeeId, EmployeeFields),
    Delete(EmployeeId),
}

#[derive(Debug)]
struct Transaction {
    working: Table,
    journal: Vec<Change>,
}

fn apply(table: &mut Table, change: &Change) -> StoreResult<bool> {
    match change {
        Change::Insert(employee) => {
            if table.contains_key(&employee.id) {
                return Err(StoreError::DuplicateId(employee.id));
            }
            table.insert(employee.id, employee.clone());
            Ok(true)
        }
        Change::Update(id, fields) => match table.get_mut(id) {
            Some(existing) => {
                existing.fields = fields.clone();
                Ok(true)
            }
            None => Ok(false),
        },
        Change::Delete(id) => Ok(table.remove(id).is_some()),
    }
}

/// One session on a [`MemoryStore`].
#[derive(Debug)]
pub struct MemorySession {
    shared: Arc<Mutex<Table>>,
    tx: Option<Transaction>,
}

impl MemorySession {
    async fn read<R>(&self, f: impl FnOnce(&Table) -> R) -> R {
        match &self.tx {
            Some(tx) => f(&tx.working),
            None => f(&*self.shared.lock().await),
        }
    }

    async fn write(&mut self, change: Change) -> StoreResult<bool> {
        match &mut self.tx {
            Some(tx) => {
                let applied = apply(&mut tx.working, &change)?;
                if applied {
                    tx.journal.push(change);
                }
                Ok(applied)
            }
            None => apply(&mut *self.shared.lock().await, &change),
        }
    }
}

#[async_trait]
impl EmployeeStore for MemorySession {
    async fn query(&mut self, filter: &EmployeeFilter) -> StoreResult<Vec<Employee>> {
        let mut matched: Vec<Employee> = self
            .read(|t| t.values().filter(|e| filter.matches(e)).cloned().collect())
            .await;
        matched.sort_by(|a, b| {
            (&a.fields.last_name, &a.fields.first_name, a.id).cmp(&(
                &b.fields.last_name,
                &b.fields.first_name,
                b.id,
            ))
        });

        let offset = usize::try_from(filter.offset.unwrap_or(0)).unwrap_or(0);
        let limit = filter
            .limit
            .and_then(|l| usize::try_from(l).ok())
            .unwrap_or(usize::MAX);
        Ok(matched.into_iter().skip(offset).take(limit).collect())
    }

    async fn find_by_id(&mut self, id: EmployeeId) -> StoreResult<Option<Employee>> {
        Ok(self.read(|t| t.get(&id).cloned()).await)
    }

    async fn exists_with_identity(&mut self, key: &IdentityKey) -> StoreResult<bool> {
        Ok(self
            .read(|t| t.values().any(|e| IdentityKey::of(&e.fields) == *key))
            .await)
    }

    async fn insert(&mut self, employee: &Employee) -> StoreResult<()> {
        self.write(Change::Insert(employee.clone())).await.map(|_| ())
    }

    async fn update(&mut self, id: EmployeeId, fields: &EmployeeFields) -> StoreResult<bool> {
        self.write(Change::Update(id, fields.clone())).await
    }

    async fn delete(&mut self, id: EmployeeId) -> StoreResult<bool> {
        self.write(Change::Delete(id)).await
    }

    async fn commit(&mut self) -> StoreResult<()> {
        let Some(tx) = &mut self.tx else {
            return Ok(());
        };
        let mut shared = self.shared.lock().await;
        let mut next = shared.clone();
        for change in &tx.journal {
            apply(&mut next, change)?;
        }
        *shared = next.clone();
        tx.working = next;
        tx.journal.clear();
        Ok(())
    }

    async fn rollback(&mut self) -> StoreResult<()> {
        let Some(tx) = &mut self.tx else {
            return Ok(());
        };
        tx.working = self.shared.lock().await.clone();
        tx.journal.clear();
        Ok(())
    }
}

#[async_trait]
impl StoreProvider for MemoryStore {
    async fn session(&self) -> StoreResult<Box<dyn EmployeeStore>> {
        Ok(Box::new(self.auto_commit()))
    }

    async fn import_session(&self) -> StoreResult<Box<dyn EmployeeStore>> {
        Ok(Box::new(self.transaction().await))
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::employee::Field;

    fn employee(id: EmployeeId, first: &str, last: &str) -> Employee {
        Employee::new(
            id,
            EmployeeFields {
                first_name: first.into(),
                last_name: last.into(),
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn auto_commit_writes_are_visible_immediately() {
        let store = MemoryStore::new();
        let mut session = store.auto_commit();
        session.insert(&employee(1000001, "Ada", "Lovelace")).await.unwrap();
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn duplicate_id_is_rejected() {
        let store = MemoryStore::new();
        let mut session = store.auto_commit();
        session.insert(&employee(1000001, "Ada", "Lovelace")).await.unwrap();
        let err = session
            .insert(&employee(1000001, "Grace", "Hopper"))
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::DuplicateId(1000001));
    }

    #[tokio::test]
    async fn transaction_is_private_until_commit() {
        let store = MemoryStore::new();
        let mut tx = store.transaction().await;
        tx.insert(&employee(1000001, "Ada", "Lovelace")).await.unwrap();

        assert!(tx.find_by_id(1000001).await.unwrap().is_some());
        assert!(store.is_empty().await);

        tx.commit().await.unwrap();
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn rollback_discards_pending_writes() {
        let store = MemoryStore::with_employees([employee(1000001, "Ada", "Lovelace")]).await;
        let mut tx = store.transaction().await;
        tx.delete(1000001).await.unwrap();
        tx.insert(&employee(1000002, "Grace", "Hopper")).await.unwrap();
        tx.rollback().await.unwrap();

        assert!(tx.find_by_id(1000001).await.unwrap().is_some());
        assert!(tx.find_by_id(1000002).await.unwrap().is_none());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn update_and_delete_report_missing_rows() {
        let store = MemoryStore::new();
        let mut session = store.auto_commit();
        assert!(!session.update(1000001, &EmployeeFields::default()).await.unwrap());
        assert!(!session.delete(1000001).await.unwrap());
    }

    #[tokio::test]
    async fn query_orders_and_paginates() {
        let store = MemoryStore::with_employees([
            employee(1000003, "Zed", "Adams"),
            employee(1000001, "Amy", "Baker"),
            employee(1000002, "Amy", "Adams"),
        ])
        .await;
        let mut session = store.auto_commit();

        let all = session.query(&EmployeeFilter::new()).await.unwrap();
        let ids: Vec<_> = all.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1000002, 1000003, 1000001]);

        let page = session
            .query(&EmployeeFilter::new().paginate(Some(1), Some(1)))
            .await
            .unwrap();
        assert_eq!(page[0].id, 1000003);

        let adams = session
            .query(&EmployeeFilter::new().contains(Field::LastName, "adam"))
            .await
            .unwrap();
        assert_eq!(adams.len(), 2);
    }
}
