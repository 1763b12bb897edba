pub mod display_store;
pub mod file_store;
pub mod notice;

pub use file_store::{FileCollection, FileStore, IntakePolicy};
