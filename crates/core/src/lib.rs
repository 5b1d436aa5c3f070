//! Domain logic for the personnel roster.
//!
//! Everything here is storage-agnostic: field normalization, record
//! validation, duplicate detection, the single-record writer and the batch
//! importer all talk to the database through the [`store::EmployeeStore`]
//! capability so they can run against PostgreSQL or the in-memory store.

pub mod duplicate_detection;
pub mod employee;
pub mod error;
pub mod import_source;
pub mod import_status;
pub mod importer;
pub mod normalizer;
pub mod store;
pub mod types;
pub mod validation;
pub mod writer;
