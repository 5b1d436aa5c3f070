//! Employee record model and the field catalogue.
//!
//! Every field has three names: the database column (also the key used in
//! raw records), the spreadsheet header used by bulk imports, and a display
//! label used in validation messages. [`Field`] is the single source for all
//! three.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::types::EmployeeId;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Smallest identifier that can be drawn.
pub const MIN_EMPLOYEE_ID: EmployeeId = 1_000_000;

/// Largest identifier that can be drawn.
pub const MAX_EMPLOYEE_ID: EmployeeId = 9_999_999;

/// Countries offered as suggestions on entry forms. The field is free text.
pub const PREFERRED_COUNTRIES: &[&str] = &[
    "United States",
    "Australia",
    "France",
    "New Zealand",
    "United Kingdom",
];

/// A raw record keyed by column name, as received from a form or a mapped
/// spreadsheet row.
pub type RawRecord = serde_json::Map<String, serde_json::Value>;

// ---------------------------------------------------------------------------
// Field catalogue
// ---------------------------------------------------------------------------

/// One mutable attribute of an employee record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    PrimaryGovtOrg,
    Directorate,
    DeptDivBranch,
    SecondaryGovtOrg,
    CivilianCompany,
    FirstName,
    LastName,
    CallsignNickname,
    Rank,
    DutyPosition,
    CommercialNumber,
    CellNumber,
    Svoip,
    CompanyEmail,
    NiprEmail,
    SiprEmail,
    Country,
}

impl Field {
    /// All fields in storage order.
    pub const ALL: [Field; 17] = [
        Self::PrimaryGovtOrg,
        Self::Directorate,
        Self::DeptDivBranch,
        Self::SecondaryGovtOrg,
        Self::CivilianCompany,
        Self::FirstName,
        Self::LastName,
        Self::CallsignNickname,
        Self::Rank,
        Self::DutyPosition,
        Self::CommercialNumber,
        Self::CellNumber,
        Self::Svoip,
        Self::CompanyEmail,
        Self::NiprEmail,
        Self::SiprEmail,
        Self::Country,
    ];

    /// Email fields, in the order validation reports them.
    pub const EMAILS: [Field; 3] = [Self::CompanyEmail, Self::NiprEmail, Self::SiprEmail];

    /// Phone fields subject to normalization and validation.
    pub const PHONES: [Field; 2] = [Self::CommercialNumber, Self::CellNumber];

    /// Column name in the `employees` table and key in raw records.
    pub fn column(self) -> &'static str {
        match self {
            Self::PrimaryGovtOrg => "primary_govt_org",
            Self::Directorate => "directorate",
            Self::DeptDivBranch => "dept_div_branch",
            Self::SecondaryGovtOrg => "secondary_govt_org",
            Self::CivilianCompany => "civilian_company",
            Self::FirstName => "first_name",
            Self::LastName => "last_name",
            Self::CallsignNickname => "callsign_nickname",
            Self::Rank => "rank",
            Self::DutyPosition => "duty_position",
            Self::CommercialNumber => "commercial_number",
            Self::CellNumber => "cell_number",
            Self::Svoip => "svoip",
            Self::CompanyEmail => "company_email",
            Self::NiprEmail => "nipr_email",
            Self::SiprEmail => "sipr_email",
            Self::Country => "country",
        }
    }

    /// Header expected in spreadsheet exports.
    pub fn header(self) -> &'static str {
        match self {
            Self::PrimaryGovtOrg => "Primary Gov't Org",
            Self::Directorate => "Directorate",
            Self::DeptDivBranch => "Dept/Div/Branch",
            Self::SecondaryGovtOrg => "Secondary Gov't Org",
            Self::CivilianCompany => "Civ. Company",
            Self::FirstName => "First Name",
            Self::LastName => "Last Name",
            Self::CallsignNickname => "Callsign/Nickname",
            Self::Rank => "Rank",
            Self::DutyPosition => "Duty Position",
            Self::CommercialNumber => "Commercial #",
            Self::CellNumber => "Cell #",
            Self::Svoip => "SVOIP",
            Self::CompanyEmail => "Company Email",
            Self::NiprEmail => "NIPR Email",
            Self::SiprEmail => "SIPR Email",
            Self::Country => "Country",
        }
    }

    /// Human-readable label used in messages.
    pub fn label(self) -> &'static str {
        match self {
            Self::CivilianCompany => "Civilian Company",
            Self::CommercialNumber => "Commercial Number",
            Self::CellNumber => "Cell Number",
            other => other.header(),
        }
    }

    /// Look a field up by column name.
    pub fn from_column(column: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.column() == column)
    }

    /// Look a field up by spreadsheet header.
    pub fn from_header(header: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.header() == header)
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// The mutable attributes of an employee. Empty string means "not set".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeFields {
    #[serde(default)]
    pub primary_govt_org: String,
    #[serde(default)]
    pub directorate: String,
    #[serde(default)]
    pub dept_div_branch: String,
    #[serde(default)]
    pub secondary_govt_org: String,
    #[serde(default)]
    pub civilian_company: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub callsign_nickname: String,
    #[serde(default)]
    pub rank: String,
    #[serde(default)]
    pub duty_position: String,
    #[serde(default)]
    pub commercial_number: String,
    #[serde(default)]
    pub cell_number: String,
    #[serde(default)]
    pub svoip: String,
    #[serde(default)]
    pub company_email: String,
    #[serde(default)]
    pub nipr_email: String,
    #[serde(default)]
    pub sipr_email: String,
    #[serde(default)]
    pub country: String,
}

impl EmployeeFields {
    pub fn get(&self, field: Field) -> &str {
        match field {
            Field::PrimaryGovtOrg => &self.primary_govt_org,
            Field::Directorate => &self.directorate,
            Field::DeptDivBranch => &self.dept_div_branch,
            Field::SecondaryGovtOrg => &self.secondary_govt_org,
            Field::CivilianCompany => &self.civilian_company,
            Field::FirstName => &self.first_name,
            Field::LastName => &self.last_name,
            Field::CallsignNickname => &self.callsign_nickname,
            Field::Rank => &self.rank,
            Field::DutyPosition => &self.duty_position,
            Field::CommercialNumber => &self.commercial_number,
            Field::CellNumber => &self.cell_number,
            Field::Svoip => &self.svoip,
            Field::CompanyEmail => &self.company_email,
            Field::NiprEmail => &self.nipr_email,
            Field::SiprEmail => &self.sipr_email,
            Field::Country => &self.country,
        }
    }

    pub fn get_mut(&mut self, field: Field) -> &mut String {
        match field {
            Field::PrimaryGovtOrg => &mut self.primary_govt_org,
            Field::Directorate => &mut self.directorate,
            Field::DeptDivBranch => &mut self.dept_div_branch,
            Field::SecondaryGovtOrg => &mut self.secondary_govt_org,
            Field::CivilianCompany => &mut self.civilian_company,
            Field::FirstName => &mut self.first_name,
            Field::LastName => &mut self.last_name,
            Field::CallsignNickname => &mut self.callsign_nickname,
            Field::Rank => &mut self.rank,
            Field::DutyPosition => &mut self.duty_position,
            Field::CommercialNumber => &mut self.commercial_number,
            Field::CellNumber => &mut self.cell_number,
            Field::Svoip => &mut self.svoip,
            Field::CompanyEmail => &mut self.company_email,
            Field::NiprEmail => &mut self.nipr_email,
            Field::SiprEmail => &mut self.sipr_email,
            Field::Country => &mut self.country,
        }
    }

    /// Render as a raw record keyed by column name.
    pub fn to_raw(&self) -> RawRecord {
        Field::ALL
            .into_iter()
            .map(|f| (f.column().to_string(), self.get(f).into()))
            .collect()
    }
}

/// A persisted employee: identifier plus fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: EmployeeId,
    #[serde(flatten)]
    pub fields: EmployeeFields,
}

impl Employee {
    pub fn new(id: EmployeeId, fields: EmployeeFields) -> Self {
        Self { id, fields }
    }

    /// `"First Last"` for log lines and summaries.
    pub fn display_name(&self) -> String {
        format!("{} {}", self.fields.first_name, self.fields.last_name)
    }
}

/// Draw a fresh identifier uniformly from
/// `[MIN_EMPLOYEE_ID, MAX_EMPLOYEE_ID]`.
///
/// Uniqueness is not checked here; the store rejects collisions and callers
/// redraw.
pub fn generate_employee_id() -> EmployeeId {
    rand::rng().random_range(MIN_EMPLOYEE_ID..=MAX_EMPLOYEE_ID)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
