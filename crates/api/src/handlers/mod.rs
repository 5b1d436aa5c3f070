pub mod employees;
pub mod imports;
