//! Repository for the `employees` table.
//!
//! Methods take a `&mut PgConnection` so the same queries run on a pooled
//! connection or inside a transaction. Column names come only from the
//! [`Field`] catalogue; every value is bound.

use roster_core::duplicate_detection::IdentityKey;
use roster_core::employee::{Employee, EmployeeFields, Field};
use roster_core::store::{like_pattern, EmployeeFilter, Predicate};
use roster_core::types::EmployeeId;
use sqlx::{PgConnection, Postgres, QueryBuilder};

use crate::models::employee::EmployeeRow;

/// Column list for `employees` queries.
const COLUMNS: &str = "\
    id, primary_govt_org, directorate, dept_div_branch, secondary_govt_org, \
    civilian_company, first_name, last_name, callsign_nickname, rank, \
    duty_position, commercial_number, cell_number, svoip, company_email, \
    nipr_email, sipr_email, country, created_at, updated_at";

/// Provides CRUD and search for employee records.
pub struct EmployeeRepo;

impl EmployeeRepo {
    /// Search with ANDed predicates and an optional any-field term, ordered
    /// by last name, first name, id.
    pub async fn search(
        conn: &mut PgConnection,
        filter: &EmployeeFilter,
    ) -> Result<Vec<EmployeeRow>, sqlx::Error> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {COLUMNS} FROM employees WHERE TRUE"));

        for predicate in &filter.predicates {
            match predicate {
                Predicate::Equals(field, value) => {
                    qb.push(" AND ")
                        .push(field.column())
                        .push(" = ")
                        .push_bind(value.clone());
                }
                Predicate::Contains(field, value) => {
                    qb.push(" AND ")
                        .push(field.column())
                        .push(" ILIKE ")
                        .push_bind(like_pattern(value));
                }
            }
        }

        if let Some(term) = &filter.wildcard {
            let pattern = like_pattern(term);
            qb.push(" AND (id::TEXT LIKE ").push_bind(pattern.clone());
            for field in Field::ALL {
                qb.push(" OR ")
                    .push(field.column())
                    .push(" ILIKE ")
                    .push_bind(pattern.clone());
            }
            qb.push(")");
        }

        qb.push(" ORDER BY last_name, first_name, id");
        if let Some(limit) = filter.limit {
            qb.push(" LIMIT ").push_bind(limit);
        }
        if let Some(offset) = filter.offset {
            qb.push(" OFFSET ").push_bind(offset);
        }

        qb.build_query_as::<EmployeeRow>().fetch_all(conn).await
    }

    /// Find an employee by id.
    pub async fn find_by_id(
        conn: &mut PgConnection,
        id: EmployeeId,
    ) -> Result<Option<EmployeeRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM employees WHERE id = $1");
        sqlx::query_as::<_, EmployeeRow>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    /// Whether a row with exactly this (first, last, org) triple exists.
    pub async fn exists_with_identity(
        conn: &mut PgConnection,
        key: &IdentityKey,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (\
                SELECT 1 FROM employees \
                WHERE first_name = $1 AND last_name = $2 AND primary_govt_org = $3)",
        )
        .bind(&key.first_name)
        .bind(&key.last_name)
        .bind(&key.primary_govt_org)
        .fetch_one(conn)
        .await
    }

    /// Insert a new employee with a caller-chosen id.
    pub async fn insert(
        conn: &mut PgConnection,
        employee: &Employee,
    ) -> Result<EmployeeRow, sqlx::Error> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("INSERT INTO employees (id");
        for field in Field::ALL {
            qb.push(", ").push(field.column());
        }
        qb.push(") VALUES (").push_bind(employee.id);
        for field in Field::ALL {
            qb.push(", ")
                .push_bind(employee.fields.get(field).to_string());
        }
        qb.push(format!(") RETURNING {COLUMNS}"));

        qb.build_query_as::<EmployeeRow>().fetch_one(conn).await
    }

    /// Replace every mutable field. Returns `None` if no row has this id.
    pub async fn update(
        conn: &mut PgConnection,
        id: EmployeeId,
        fields: &EmployeeFields,
    ) -> Result<Option<EmployeeRow>, sqlx::Error> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE employees SET ");
        let mut assignments = qb.separated(", ");
        for field in Field::ALL {
            assignments
                .push(format!("{} = ", field.column()))
                .push_bind_unseparated(fields.get(field).to_string());
        }
        qb.push(" WHERE id = ")
            .push_bind(id)
            .push(format!(" RETURNING {COLUMNS}"));

        qb.build_query_as::<EmployeeRow>()
            .fetch_optional(conn)
            .await
    }

    /// Delete an employee. Returns `true` if a row was removed.
    pub async fn delete(conn: &mut PgConnection, id: EmployeeId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM employees WHERE id = $1")
            .bind(id)
            .execute(conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Total number of rows.
    pub async fn count(conn: &mut PgConnection) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM employees")
            .fetch_one(conn)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_list_follows_the_catalogue() {
        let columns: Vec<&str> = COLUMNS.split(',').map(str::trim).collect();
        let mut expected = vec!["id"];
        expected.extend(Field::ALL.iter().map(|f| f.column()));
        expected.extend(["created_at", "updated_at"]);
        assert_eq!(columns, expected);
    }
}
