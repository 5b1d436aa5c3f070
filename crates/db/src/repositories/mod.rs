//! Repository layer: one unit struct per table, static async methods.

pub mod employee_repo;

pub use employee_repo::EmployeeRepo;
