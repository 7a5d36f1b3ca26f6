use std::sync::Arc;

use promptsmith_store::Repository;

use crate::config::Settings;
use crate::engine::compare::CompareOrchestrator;
use crate::engine::eval::EvalOrchestrator;
use crate::engine::generate::GenerationService;

/// Shared application state available to all Axum handlers via
/// `State<AppState>`.
///
/// Cheaply cloneable: every service sits behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Process configuration.
    pub settings: Arc<Settings>,
    /// Filesystem repository (tables + blob store).
    pub repository: Arc<Repository>,
    /// Single-shot generation service.
    pub generation: Arc<GenerationService>,
    /// Three-signal compare pipeline.
    pub compare: Arc<CompareOrchestrator>,
    /// Multi-stage eval pipeline and its run registry.
    pub eval: Arc<EvalOrchestrator>,
}
