pub mod batch;
pub mod client;
pub mod settings;

pub use client::{Classify, ClientConfig, InferenceClient};
pub use settings::{CandidateLabels, ModelType, Settings};
