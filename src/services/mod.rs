pub mod chart_service;
pub mod classifier;
pub mod fs_service;
pub mod intake;
pub mod thumbnail_service;
