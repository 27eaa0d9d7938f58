// src/lib.rs
// Public library surface for the server binary, the client binary and
// integration tests.

pub mod api;
pub mod assets;
pub mod config;
pub mod encoder;
pub mod metrics;
pub mod model;
pub mod preprocess;
pub mod risk;
pub mod service;
pub mod vocab;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, router, AppState};
pub use crate::assets::{ModelContext, StartupError};
pub use crate::risk::{classify, AnalysisResult, RiskLevel};
pub use crate::service::{AnalysisError, AnalysisRequest, AnalysisService};
