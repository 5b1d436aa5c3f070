//! Row model for the `employees` table.

use roster_core::employee::{Employee, EmployeeFields};
use roster_core::types::{EmployeeId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `employees` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct EmployeeRow {
    pub id: EmployeeId,
    pub primary_govt_org: String,
    pub directorate: String,
    pub dept_div_branch: String,
    pub secondary_govt_org: String,
    pub civilian_company: String,
    pub first_name: String,
    pub last_name: String,
    pub callsign_nickname: String,
    pub rank: String,
    pub duty_position: String,
    pub commercial_number: String,
    pub cell_number: String,
    pub svoip: String,
    pub company_email: String,
    pub nipr_email: String,
    pub sipr_email: String,
    pub country: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<EmployeeRow> for Employee {
    fn from(row: EmployeeRow) -> Self {
        Employee::new(
            row.id,
            EmployeeFields {
                primary_govt_org: row.primary_govt_org,
                directorate: row.directorate,
                dept_div_branch: row.dept_div_branch,
                secondary_govt_org: row.secondary_govt_org,
                civilian_company: row.civilian_company,
                first_name: row.first_name,
                last_name: row.last_name,
                callsign_nickname: row.callsign_nickname,
                rank: row.rank,
                duty_position: row.duty_position,
                commercial_number: row.commercial_number,
                cell_number: row.cell_number,
                svoip: row.svoip,
                company_email: row.company_email,
                nipr_email: row.nipr_email,
                sipr_email: row.sipr_email,
                country: row.country,
            },
        )
    }
}
