pub mod chart;
pub mod classifier;
pub mod files;
