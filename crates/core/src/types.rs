/// Integer primary keys.
pub type DbId = i64;

/// Employee identifiers are seven-digit integers drawn at creation time.
pub type EmployeeId = DbId;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
