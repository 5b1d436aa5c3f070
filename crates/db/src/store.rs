//! [`EmployeeStore`] backed by PostgreSQL.
//!
//! An auto-commit session holds one pooled connection. A transactional
//! session holds at most one open transaction and wraps every insert in a
//! savepoint, so a failed row does not poison the rest of the import. Commit
//! and rollback release the connection; the next statement begins anew.

use async_trait::async_trait;
use roster_core::duplicate_detection::IdentityKey;
use roster_core::employee::{Employee, EmployeeFields};
use roster_core::store::{EmployeeFilter, EmployeeStore, StoreError, StoreProvider, StoreResult};
use roster_core::types::EmployeeId;
use sqlx::pool::PoolConnection;
use sqlx::{Connection, PgConnection, Postgres, Transaction};

use crate::repositories::EmployeeRepo;
use crate::DbPool;

/// Primary key constraint name of the `employees` table.
const PRIMARY_KEY_CONSTRAINT: &str = "employees_pkey";

/// Map a sqlx error to the store's error kinds.
///
/// A unique violation on the primary key is an identifier collision; any
/// other integrity violation (SQLSTATE class 23) is a constraint failure.
pub fn classify_store_error(err: sqlx::Error, id: Option<EmployeeId>) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        let code = db_err.code();
        let code = code.as_deref().unwrap_or_default();
        let constraint = db_err.constraint().unwrap_or("unknown");
        if code == "23505" && constraint == PRIMARY_KEY_CONSTRAINT {
            if let Some(id) = id {
                return StoreError::DuplicateId(id);
            }
        }
        if code.starts_with("23") {
            return StoreError::Constraint(format!("{constraint}: {}", db_err.message()));
        }
    }
    StoreError::General(err.to_string())
}

fn general(err: sqlx::Error) -> StoreError {
    classify_store_error(err, None)
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

enum Conn {
    AutoCommit(PoolConnection<Postgres>),
    /// `None` between a commit or rollback and the next statement.
    Transaction(Option<Transaction<'static, Postgres>>),
}

/// One session on the PostgreSQL store.
pub struct PgSession {
    pool: DbPool,
    conn: Conn,
}

impl PgSession {
    /// The connection for the next statement. A transactional session whose
    /// previous transaction has ended begins a new one here.
    async fn connection(&mut self) -> StoreResult<&mut PgConnection> {
        match &mut self.conn {
            Conn::AutoCommit(conn) => Ok(&mut **conn),
            Conn::Transaction(slot) => {
                if slot.is_none() {
                    *slot = Some(self.pool.begin().await.map_err(general)?);
                }
                slot.as_deref_mut()
                    .ok_or_else(|| StoreError::General("transaction not open".into()))
            }
        }
    }

    fn in_transaction(&self) -> bool {
        matches!(self.conn, Conn::Transaction(_))
    }
}

#[async_trait]
impl EmployeeStore for PgSession {
    async fn query(&mut self, filter: &EmployeeFilter) -> StoreResult<Vec<Employee>> {
        let rows = EmployeeRepo::search(self.connection().await?, filter)
            .await
            .map_err(general)?;
        Ok(rows.into_iter().map(Employee::from).collect())
    }

    async fn find_by_id(&mut self, id: EmployeeId) -> StoreResult<Option<Employee>> {
        let row = EmployeeRepo::find_by_id(self.connection().await?, id)
            .await
            .map_err(general)?;
        Ok(row.map(Employee::from))
    }

    async fn exists_with_identity(&mut self, key: &IdentityKey) -> StoreResult<bool> {
        EmployeeRepo::exists_with_identity(self.connection().await?, key)
            .await
            .map_err(general)
    }

    async fn insert(&mut self, employee: &Employee) -> StoreResult<()> {
        let id = employee.id;
        let in_transaction = self.in_transaction();
        let conn = self.connection().await?;
        if !in_transaction {
            EmployeeRepo::insert(conn, employee)
                .await
                .map_err(|e| classify_store_error(e, Some(id)))?;
            return Ok(());
        }

        let mut savepoint = Connection::begin(conn).await.map_err(general)?;
        match EmployeeRepo::insert(&mut *savepoint, employee).await {
            Ok(_) => savepoint.commit().await.map_err(general),
            Err(e) => {
                savepoint.rollback().await.map_err(general)?;
                tracing::debug!(id, error = %e, "Insert rolled back to savepoint");
                Err(classify_store_error(e, Some(id)))
            }
        }
    }

    async fn update(&mut self, id: EmployeeId, fields: &EmployeeFields) -> StoreResult<bool> {
        let row = EmployeeRepo::update(self.connection().await?, id, fields)
            .await
            .map_err(|e| classify_store_error(e, Some(id)))?;
        Ok(row.is_some())
    }

    async fn delete(&mut self, id: EmployeeId) -> StoreResult<bool> {
        EmployeeRepo::delete(self.connection().await?, id)
            .await
            .map_err(general)
    }

    async fn commit(&mut self) -> StoreResult<()> {
        if let Conn::Transaction(slot) = &mut self.conn {
            if let Some(tx) = slot.take() {
                tx.commit().await.map_err(general)?;
            }
        }
        Ok(())
    }

    async fn rollback(&mut self) -> StoreResult<()> {
        if let Conn::Transaction(slot) = &mut self.conn {
            if let Some(tx) = slot.take() {
                tx.rollback().await.map_err(general)?;
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// Hands out [`PgSession`]s from a connection pool.
#[derive(Clone)]
pub struct PgStoreProvider {
    pool: DbPool,
}

impl PgStoreProvider {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn auto_commit(&self) -> Result<PgSession, sqlx::Error> {
        let conn = self.pool.acquire().await?;
        Ok(PgSession {
            pool: self.pool.clone(),
            conn: Conn::AutoCommit(conn),
        })
    }

    pub async fn transaction(&self) -> Result<PgSession, sqlx::Error> {
        let tx = self.pool.begin().await?;
        Ok(PgSession {
            pool: self.pool.clone(),
            conn: Conn::Transaction(Some(tx)),
        })
    }
}

#[async_trait]
impl StoreProvider for PgStoreProvider {
    async fn session(&self) -> StoreResult<Box<dyn EmployeeStore>> {
        Ok(Box::new(self.auto_commit().await.map_err(general)?))
    }

    async fn import_session(&self) -> StoreResult<Box<dyn EmployeeStore>> {
        Ok(Box::new(self.transaction().await.map_err(general)?))
    }

    async fn ping(&self) -> StoreResult<()> {
        crate::health_check(&self.pool).await.map_err(general)
    }
}
