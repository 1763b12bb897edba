pub mod chart_types;
pub mod classify_types;
pub mod file_types;
