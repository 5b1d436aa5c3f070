//! Record validator: turns a raw record into a canonical one or a rejection.
//!
//! Pure logic, no database access. The same path serves interactive entry,
//! edits and every row of a batch import.

use serde::Serialize;

use crate::employee::{EmployeeFields, Field, RawRecord};
use crate::normalizer::{coerce_text, normalize_phone, validate_email, validate_phone};

/// Why a record was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    /// First or last name is empty.
    MissingRequiredName,
    /// One or more populated email/phone fields failed their format rule.
    InvalidFormat,
}

/// A rejected record: the reason plus every field that failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rejection {
    pub reason: RejectionReason,
    pub fields: Vec<Field>,
}

impl Rejection {
    /// Display labels of the failing fields, in report order.
    pub fn field_labels(&self) -> Vec<&'static str> {
        self.fields.iter().map(|f| f.label()).collect()
    }

    /// One-line description suitable for an error response or a log line.
    pub fn message(&self) -> String {
        match self.reason {
            RejectionReason::MissingRequiredName => {
                "First name and last name are required".to_string()
            }
            RejectionReason::InvalidFormat => format!(
                "The following fields have invalid formats: {}",
                self.field_labels().join(", ")
            ),
        }
    }
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message())
    }
}

/// Result of validating one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Accepted(EmployeeFields),
    Rejected(Rejection),
}

impl ValidationOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }

    pub fn into_result(self) -> Result<EmployeeFields, Rejection> {
        match self {
            Self::Accepted(fields) => Ok(fields),
            Self::Rejected(rejection) => Err(rejection),
        }
    }
}

/// Coerce every field to text, normalize phones and trim emails.
///
/// Keys that are not column names are ignored; missing keys become empty.
pub fn canonicalize(raw: &RawRecord) -> EmployeeFields {
    let mut fields = EmployeeFields::default();
    for field in Field::ALL {
        *fields.get_mut(field) = coerce_text(raw.get(field.column()));
    }
    for field in Field::PHONES {
        let normalized = normalize_phone(fields.get(field));
        *fields.get_mut(field) = normalized;
    }
    for field in Field::EMAILS {
        let trimmed = fields.get(field).trim().to_string();
        *fields.get_mut(field) = trimmed;
    }
    fields
}

/// Validate a raw record.
///
/// Missing first or last name dominates: such records are always rejected
/// with [`RejectionReason::MissingRequiredName`], whatever else they contain.
pub fn validate_record(raw: &RawRecord) -> ValidationOutcome {
    validate_canonical(canonicalize(raw))
}

/// Validate an already-canonicalized record.
pub fn validate_canonical(fields: EmployeeFields) -> ValidationOutcome {
    let missing: Vec<Field> = [Field::FirstName, Field::LastName]
        .into_iter()
        .filter(|f| fields.get(*f).is_empty())
        .collect();
    if !missing.is_empty() {
        return ValidationOutcome::Rejected(Rejection {
            reason: RejectionReason::MissingRequiredName,
            fields: missing,
        });
    }

    let bad_emails = Field::EMAILS.into_iter().filter(|f| {
        let value = fields.get(*f);
        !value.is_empty() && !validate_email(value)
    });
    let bad_phones = Field::PHONES.into_iter().filter(|f| {
        let value = fields.get(*f);
        !value.is_empty() && !validate_phone(value)
    });
    let invalid: Vec<Field> = bad_emails.chain(bad_phones).collect();

    if invalid.is_empty() {
        ValidationOutcome::Accepted(fields)
    } else {
        ValidationOutcome::Rejected(Rejection {
            reason: RejectionReason::InvalidFormat,
            fields: invalid,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
