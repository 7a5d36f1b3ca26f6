//! The orchestration engine: run state, the eval pipeline, the compare
//! pipeline, and the single-shot generation service.

pub mod compare;
pub mod eval;
pub mod generate;
pub mod run;
